use crate::draw::layer::AnnotationLayer;
use crate::draw::model::Color;
use crate::draw::registration::{DisplaySize, ScaleFilter};
use crate::draw::render::blend_pixel;
use crate::error::AnnotationError;
use image::{imageops, RgbaImage};
use std::io::Cursor;

/// Fill used when the base image cannot be shown.
pub const PLACEHOLDER_FILL: Color = Color::rgba(32, 32, 32, 255);

/// Returns the layer content as a standalone bitmap, transparent where nothing
/// was drawn.
pub fn flatten(layer: &AnnotationLayer) -> RgbaImage {
    layer.image().clone()
}

/// True when no pixel of the layer carries any alpha.
pub fn detect_empty(layer: &AnnotationLayer) -> bool {
    layer.image().chunks_exact(4).all(|px| px[3] == 0)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, AnnotationError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|err| AnnotationError::Encode(err.to_string()))?;
    Ok(bytes)
}

/// Decodes a PNG or JPEG raster into RGBA8.
pub fn decode_raster(bytes: &[u8]) -> Result<RgbaImage, AnnotationError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Resizes `image` to `size`; an image already at that size is copied as is.
///
/// Interpolating filters run on premultiplied pixels so transparent areas do
/// not darken the edges of what is painted next to them.
pub fn scale_raster(image: &RgbaImage, size: DisplaySize, filter: ScaleFilter) -> RgbaImage {
    if image.dimensions() == (size.width, size.height) {
        return image.clone();
    }
    match filter {
        ScaleFilter::Nearest => {
            imageops::resize(image, size.width, size.height, filter.to_filter_type())
        }
        ScaleFilter::Triangle => {
            let mut scaled = imageops::resize(
                &premultiplied(image),
                size.width,
                size.height,
                filter.to_filter_type(),
            );
            unpremultiply_in_place(&mut scaled);
            scaled
        }
    }
}

fn premultiplied(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    out
}

fn unpremultiply_in_place(image: &mut RgbaImage) {
    for px in image.chunks_exact_mut(4) {
        let a = px[3] as u16;
        match a {
            0 => px.copy_from_slice(&[0, 0, 0, 0]),
            255 => {}
            _ => {
                for c in &mut px[..3] {
                    *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

/// The base image alone, at the size a viewer displays it.
pub fn render_base(base: &RgbaImage, target: Option<DisplaySize>, filter: ScaleFilter) -> RgbaImage {
    match target {
        Some(size) => scale_raster(base, size, filter),
        None => base.clone(),
    }
}

/// Layers `annotation` over `base`. Both are mapped onto the same target
/// rectangle (the base's natural size when `target` is `None`), base first,
/// annotation above at full opacity.
pub fn compose_for_viewing(
    base: &RgbaImage,
    annotation: Option<&RgbaImage>,
    target: Option<DisplaySize>,
    filter: ScaleFilter,
) -> RgbaImage {
    let mut output = render_base(base, target, filter);
    let Some(annotation) = annotation else {
        return output;
    };

    let size = DisplaySize::new(output.width(), output.height());
    let overlay = scale_raster(annotation, size, filter);
    blend_in_place(&mut output, &overlay);
    output
}

/// Neutral raster shown in place of an undecodable base image.
pub fn placeholder(size: DisplaySize) -> RgbaImage {
    RgbaImage::from_pixel(
        size.width.max(1),
        size.height.max(1),
        image::Rgba(PLACEHOLDER_FILL.to_rgba_array()),
    )
}

fn blend_in_place(base: &mut RgbaImage, top: &RgbaImage) {
    debug_assert_eq!(base.dimensions(), top.dimensions());

    for (dst, src) in base.chunks_exact_mut(4).zip(top.chunks_exact(4)) {
        let blended = blend_pixel(
            Color::from_rgba_array([dst[0], dst[1], dst[2], dst[3]]),
            Color::from_rgba_array([src[0], src[1], src[2], src[3]]),
        );
        dst.copy_from_slice(&blended.to_rgba_array());
    }
}
