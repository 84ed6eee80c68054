use crate::draw::layer::AnnotationLayer;
use crate::draw::model::{Point, Tool};
use crate::draw::render::{render_joint, render_segment, Brush, DirtyRect, StrokeMask};

/// A path in progress. Only its effect on the layer outlives it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    tool: Tool,
    points: Vec<Point>,
    mask: StrokeMask,
}

impl Stroke {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    fn brush(&self) -> Brush {
        Brush {
            mode: self.tool.blend_mode(),
            color: self.tool.color().unwrap_or_default(),
            width: self.tool.width(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SurfaceState {
    #[default]
    Idle,
    Drawing(Stroke),
}

/// Turns pointer input into strokes on an [`AnnotationLayer`].
///
/// The layer is passed into every call; the controller only tracks the path
/// in progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceController {
    state: SurfaceState,
}

impl SurfaceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, SurfaceState::Drawing(_))
    }

    /// Tool of the open stroke, if any.
    pub fn active_tool(&self) -> Option<Tool> {
        match &self.state {
            SurfaceState::Drawing(stroke) => Some(stroke.tool),
            SurfaceState::Idle => None,
        }
    }

    /// Opens a new path at `point`. The tool is captured for the whole path;
    /// an already open path is closed first.
    pub fn start_stroke(&mut self, layer: &AnnotationLayer, point: Point, tool: Tool) {
        if self.is_drawing() {
            tracing::debug!("stroke started while another was open; closing the previous one");
        }
        let (width, height) = layer.dimensions();
        self.state = SurfaceState::Drawing(Stroke {
            tool,
            points: vec![point.clamp_to(width, height)],
            mask: StrokeMask::new(width, height),
        });
    }

    /// Connects the last point of the open path to `point` with a straight
    /// segment. No-op when idle.
    pub fn extend_stroke(&mut self, layer: &mut AnnotationLayer, point: Point) -> Option<DirtyRect> {
        let SurfaceState::Drawing(stroke) = &mut self.state else {
            return None;
        };
        let (width, height) = layer.dimensions();
        let point = point.clamp_to(width, height);
        let last = *stroke.points.last()?;
        if last == point {
            return None;
        }

        let brush = stroke.brush();
        let pixels = layer.pixels_mut();
        let mut dirty = None;
        if stroke.points.len() > 1 {
            dirty = render_joint(pixels, width, height, &mut stroke.mask, brush, last);
        }
        let segment = render_segment(pixels, width, height, &mut stroke.mask, brush, last, point);
        stroke.points.push(point);

        match (dirty, segment) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        }
    }

    /// Closes the open path; returns it for inspection. No-op when idle.
    pub fn end_stroke(&mut self) -> Option<Stroke> {
        match std::mem::take(&mut self.state) {
            SurfaceState::Drawing(stroke) => Some(stroke),
            SurfaceState::Idle => None,
        }
    }

    /// Empties the whole layer and abandons any open path.
    pub fn clear(&mut self, layer: &mut AnnotationLayer) {
        self.state = SurfaceState::Idle;
        layer.clear();
    }
}
