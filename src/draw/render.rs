use crate::draw::model::{BlendMode, Color, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DirtyRect {
    pub fn from_points(a: Point, b: Point, pad: i32) -> Self {
        let min_x = a.x.min(b.x).floor() as i32 - pad;
        let max_x = a.x.max(b.x).ceil() as i32 + pad;
        let min_y = a.y.min(b.y).floor() as i32 - pad;
        let max_y = a.y.max(b.y).ceil() as i32 + pad;
        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x + 1).max(1),
            height: (max_y - min_y + 1).max(1),
        }
    }

    pub fn union(self, other: DirtyRect) -> DirtyRect {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        DirtyRect {
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(1),
            height: (max_y - min_y).max(1),
        }
    }

    pub fn clamp(self, width: u32, height: u32) -> Option<DirtyRect> {
        let max_w = width as i32;
        let max_h = height as i32;
        let x0 = self.x.clamp(0, max_w);
        let y0 = self.y.clamp(0, max_h);
        let x1 = (self.x + self.width).clamp(0, max_w);
        let y1 = (self.y + self.height).clamp(0, max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(DirtyRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Pixels already blended by the stroke in progress. Keeps overlapping
/// segments and joints from compositing the same pixel twice.
///
/// The bitmap is allocated on the first mark, so a stroke that never paints
/// costs nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeMask {
    width: u32,
    height: u32,
    touched: Vec<bool>,
}

impl StrokeMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            touched: Vec::new(),
        }
    }

    /// Marks `(x, y)`; returns `false` when it was already marked.
    fn mark(&mut self, x: u32, y: u32) -> bool {
        if self.touched.is_empty() {
            self.touched = vec![false; (self.width as usize).saturating_mul(self.height as usize)];
        }
        let idx = y as usize * self.width as usize + x as usize;
        match self.touched.get_mut(idx) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }
}

/// Stroke parameters fixed for the lifetime of one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub mode: BlendMode,
    pub color: Color,
    pub width: u32,
}

impl Brush {
    fn radius(&self) -> f32 {
        self.width.max(1) as f32 * 0.5
    }

    fn pad(&self) -> i32 {
        self.radius().ceil() as i32 + 1
    }
}

/// Rasterizes the straight segment `start -> end` with butt ends.
///
/// Returns the clamped region that may have changed.
pub fn render_segment(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    mask: &mut StrokeMask,
    brush: Brush,
    start: Point,
    end: Point,
) -> Option<DirtyRect> {
    let bounds = DirtyRect::from_points(start, end, brush.pad()).clamp(width, height)?;
    let radius_sq = brush.radius() * brush.radius();
    for y in bounds.y..(bounds.y + bounds.height) {
        for x in bounds.x..(bounds.x + bounds.width) {
            let covered = segment_body_distance_sq((x as f32, y as f32), start, end)
                .is_some_and(|d| d <= radius_sq);
            if covered {
                apply_brush(pixels, width, mask, brush, x as u32, y as u32);
            }
        }
    }
    Some(bounds)
}

/// Fills a disc of the brush diameter around `center`. Used at the joints
/// between consecutive segments.
pub fn render_joint(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    mask: &mut StrokeMask,
    brush: Brush,
    center: Point,
) -> Option<DirtyRect> {
    let bounds = DirtyRect::from_points(center, center, brush.pad()).clamp(width, height)?;
    let radius_sq = brush.radius() * brush.radius();
    for y in bounds.y..(bounds.y + bounds.height) {
        for x in bounds.x..(bounds.x + bounds.width) {
            let dx = x as f32 - center.x;
            let dy = y as f32 - center.y;
            if dx * dx + dy * dy <= radius_sq {
                apply_brush(pixels, width, mask, brush, x as u32, y as u32);
            }
        }
    }
    Some(bounds)
}

/// Squared distance from `point` to the segment, or `None` when the point
/// projects outside the segment (beyond either end) or the segment is empty.
fn segment_body_distance_sq(point: (f32, f32), start: Point, end: Point) -> Option<f32> {
    let vx = end.x - start.x;
    let vy = end.y - start.y;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return None;
    }
    let wx = point.0 - start.x;
    let wy = point.1 - start.y;
    let t = (wx * vx + wy * vy) / len_sq;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let dx = wx - vx * t;
    let dy = wy - vy * t;
    Some(dx * dx + dy * dy)
}

fn apply_brush(pixels: &mut [u8], width: u32, mask: &mut StrokeMask, brush: Brush, x: u32, y: u32) {
    if !mask.mark(x, y) {
        return;
    }
    let idx = ((y as usize * width as usize) + x as usize) * 4;
    let Some(px) = pixels.get_mut(idx..idx + 4) else {
        return;
    };
    match brush.mode {
        BlendMode::PaintOver => {
            let dst = Color::from_rgba_array([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&blend_pixel(dst, brush.color).to_rgba_array());
        }
        BlendMode::Erase => px.copy_from_slice(&[0, 0, 0, 0]),
    }
}

/// Straight-alpha source-over of `top` onto `bottom`.
pub fn blend_pixel(bottom: Color, top: Color) -> Color {
    if top.a == 255 {
        return top;
    }
    if top.a == 0 {
        return bottom;
    }
    let sa = top.a as f32 / 255.0;
    let da = bottom.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return Color::TRANSPARENT;
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Color {
        r: blend(top.r, bottom.r),
        g: blend(top.g, bottom.g),
        b: blend(top.b, bottom.b),
        a: (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(width: u32) -> Brush {
        Brush {
            mode: BlendMode::PaintOver,
            color: Color::RED,
            width,
        }
    }

    fn alpha_at(pixels: &[u8], width: u32, x: u32, y: u32) -> u8 {
        pixels[((y * width + x) * 4 + 3) as usize]
    }

    #[test]
    fn horizontal_segment_has_butt_ends() {
        let (w, h) = (20, 10);
        let mut pixels = vec![0_u8; (w * h * 4) as usize];
        let mut mask = StrokeMask::new(w, h);
        render_segment(
            &mut pixels,
            w,
            h,
            &mut mask,
            pen(3),
            Point::new(5.0, 5.0),
            Point::new(10.0, 5.0),
        );
        for x in 5..=10 {
            for y in 4..=6 {
                assert_eq!(alpha_at(&pixels, w, x, y), 255, "({x},{y})");
            }
            assert_eq!(alpha_at(&pixels, w, x, 3), 0);
            assert_eq!(alpha_at(&pixels, w, x, 7), 0);
        }
        assert_eq!(alpha_at(&pixels, w, 4, 5), 0);
        assert_eq!(alpha_at(&pixels, w, 11, 5), 0);
    }

    #[test]
    fn degenerate_segment_paints_nothing() {
        let mut pixels = vec![0_u8; 4 * 4 * 4];
        let mut mask = StrokeMask::new(4, 4);
        let p = Point::new(2.0, 2.0);
        render_segment(&mut pixels, 4, 4, &mut mask, pen(3), p, p);
        assert!(pixels.iter().all(|b| *b == 0));
    }

    #[test]
    fn joint_disc_is_round() {
        let (w, h) = (9, 9);
        let mut pixels = vec![0_u8; (w * h * 4) as usize];
        let mut mask = StrokeMask::new(w, h);
        render_joint(&mut pixels, w, h, &mut mask, pen(5), Point::new(4.0, 4.0));
        assert_eq!(alpha_at(&pixels, w, 4, 2), 255);
        assert_eq!(alpha_at(&pixels, w, 2, 4), 255);
        assert_eq!(alpha_at(&pixels, w, 2, 2), 0);
    }

    #[test]
    fn translucent_pen_blends_once_per_stroke() {
        let (w, h) = (10, 10);
        let mut pixels = vec![0_u8; (w * h * 4) as usize];
        let mut mask = StrokeMask::new(w, h);
        let brush = Brush {
            mode: BlendMode::PaintOver,
            color: Color::rgba(0, 0, 255, 128),
            width: 3,
        };
        let a = Point::new(1.0, 5.0);
        let b = Point::new(5.0, 5.0);
        render_segment(&mut pixels, w, h, &mut mask, brush, a, b);
        render_joint(&mut pixels, w, h, &mut mask, brush, b);
        render_segment(&mut pixels, w, h, &mut mask, brush, b, Point::new(8.0, 5.0));
        assert_eq!(alpha_at(&pixels, w, 5, 5), 128);
    }

    #[test]
    fn stroke_mask_allocates_on_first_mark() {
        let mut mask = StrokeMask::new(4000, 3000);
        assert_eq!(mask.touched.capacity(), 0);

        let mut pixels = vec![0_u8; 4 * 4 * 4];
        let p = Point::new(2.0, 2.0);
        render_segment(&mut pixels, 4, 4, &mut mask, pen(3), p, p);
        assert_eq!(mask.touched.capacity(), 0);

        assert!(mask.mark(3, 2));
        assert!(!mask.mark(3, 2));
        assert_eq!(mask.touched.len(), 4000 * 3000);
    }

    #[test]
    fn segment_outside_layer_is_skipped() {
        let mut pixels = vec![0_u8; 4 * 4 * 4];
        let mut mask = StrokeMask::new(4, 4);
        let dirty = render_segment(
            &mut pixels,
            4,
            4,
            &mut mask,
            pen(1),
            Point::new(50.0, 50.0),
            Point::new(60.0, 50.0),
        );
        assert_eq!(dirty, None);
    }

    #[test]
    fn blend_pixel_matches_straight_alpha_source_over() {
        let out = blend_pixel(
            Color::rgba(100, 100, 100, 255),
            Color::rgba(200, 0, 0, 128),
        );
        assert_eq!(out, Color::rgba(150, 50, 50, 255));
        let base = Color::rgba(7, 8, 9, 200);
        assert_eq!(blend_pixel(base, Color::TRANSPARENT), base);
    }

    #[test]
    fn dirty_rect_clamps_to_layer() {
        let rect = DirtyRect::from_points(Point::new(-3.0, -3.0), Point::new(2.0, 2.0), 1);
        assert_eq!(
            rect.clamp(10, 10),
            Some(DirtyRect {
                x: 0,
                y: 0,
                width: 4,
                height: 4
            })
        );
        assert!(rect.contains(-4, -4));
    }
}
