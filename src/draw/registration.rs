//! Sizing the annotation layer to the displayed base image and bringing a
//! previously saved annotation back into it.
//!
//! Registration holds because the layer always has the base image's displayed
//! size, and every stored annotation is stretched onto exactly that size when
//! it is restored or composed.

use crate::draw::composite::{decode_raster, scale_raster};
use crate::draw::layer::AnnotationLayer;
use crate::draw::model::Point;
use crate::error::AnnotationError;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFilter {
    /// Pixel replication; keeps marking edges hard.
    #[default]
    Nearest,
    /// Bilinear.
    Triangle,
}

impl ScaleFilter {
    pub fn to_filter_type(self) -> FilterType {
        match self {
            ScaleFilter::Nearest => FilterType::Nearest,
            ScaleFilter::Triangle => FilterType::Triangle,
        }
    }
}

/// Sizes recorded when the layer was allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerGeometry {
    pub natural: DisplaySize,
    pub layer: DisplaySize,
}

impl LayerGeometry {
    /// Maps a pointer position reported in `viewport` coordinates into layer
    /// space. The layer size never changes during a session, so after a
    /// resize the input is rescaled instead.
    pub fn pointer_to_layer(&self, point: Point, viewport: DisplaySize) -> Point {
        if viewport.is_empty() || viewport == self.layer {
            return point;
        }
        Point::new(
            point.x * self.layer.width as f32 / viewport.width as f32,
            point.y * self.layer.height as f32 / viewport.height as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No stored annotation; the layer starts empty.
    Blank,
    /// The stored annotation was drawn in, from a raster of `source` size.
    Restored { source: DisplaySize },
    /// The stored annotation could not be decoded; the layer starts empty.
    DecodeFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistrationResolver {
    filter: ScaleFilter,
}

impl RegistrationResolver {
    pub fn new(filter: ScaleFilter) -> Self {
        Self { filter }
    }

    /// Called once the base image is loaded and laid out.
    pub fn on_base_image_ready(
        &self,
        natural: DisplaySize,
        displayed: DisplaySize,
    ) -> Result<PendingLayer, AnnotationError> {
        if natural.is_empty() || displayed.is_empty() {
            return Err(AnnotationError::BaseImageUnavailable {
                reason: format!(
                    "base image has no usable size (natural {}x{}, displayed {}x{})",
                    natural.width, natural.height, displayed.width, displayed.height
                ),
            });
        }
        tracing::debug!(
            natural_w = natural.width,
            natural_h = natural.height,
            layer_w = displayed.width,
            layer_h = displayed.height,
            "annotation layer allocated"
        );
        Ok(PendingLayer {
            geometry: LayerGeometry {
                natural,
                layer: displayed,
            },
            layer: AnnotationLayer::new(displayed.width, displayed.height),
            filter: self.filter,
        })
    }
}

/// An allocated layer that cannot be drawn on until any stored annotation
/// has been restored into it.
#[derive(Debug)]
pub struct PendingLayer {
    geometry: LayerGeometry,
    layer: AnnotationLayer,
    filter: ScaleFilter,
}

#[derive(Debug)]
pub struct RestoredLayer {
    pub layer: AnnotationLayer,
    pub geometry: LayerGeometry,
    pub outcome: RestoreOutcome,
}

impl PendingLayer {
    pub fn geometry(&self) -> LayerGeometry {
        self.geometry
    }

    /// Draws the stored annotation (if any) into the layer, stretched to the
    /// layer size. Decode failures are logged and leave the layer blank.
    pub fn restore_persisted(self, artifact: Option<&[u8]>) -> RestoredLayer {
        let Some(bytes) = artifact else {
            return self.finish(RestoreOutcome::Blank);
        };

        match decode_raster(bytes) {
            Ok(stored) => {
                let source = DisplaySize::new(stored.width(), stored.height());
                let scaled = scale_raster(&stored, self.geometry.layer, self.filter);
                let layer = AnnotationLayer::from_image(scaled);
                tracing::debug!(
                    source_w = source.width,
                    source_h = source.height,
                    "stored annotation restored"
                );
                RestoredLayer {
                    layer,
                    geometry: self.geometry,
                    outcome: RestoreOutcome::Restored { source },
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored annotation unreadable, starting blank");
                self.finish(RestoreOutcome::DecodeFailed)
            }
        }
    }

    fn finish(self, outcome: RestoreOutcome) -> RestoredLayer {
        RestoredLayer {
            layer: self.layer,
            geometry: self.geometry,
            outcome,
        }
    }
}
