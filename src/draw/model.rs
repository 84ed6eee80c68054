use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard upper bound for any stroke width, regardless of settings.
pub const MAX_STROKE_WIDTH: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Self = Self::rgba(255, 0, 0, 255);
    pub const GREEN: Self = Self::rgba(0, 255, 0, 255);
    pub const BLUE: Self = Self::rgba(0, 0, 255, 255);
    pub const YELLOW: Self = Self::rgba(255, 255, 0, 255);
    pub const MAGENTA: Self = Self::rgba(255, 0, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Toolbar palette, in display order.
    pub const PALETTE: [Self; 5] = [
        Self::RED,
        Self::GREEN,
        Self::BLUE,
        Self::YELLOW,
        Self::MAGENTA,
    ];

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_rgba_array(color: [u8; 4]) -> Self {
        Self::rgba(color[0], color[1], color[2], color[3])
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(value: &str) -> Result<Self, ParseColorError> {
        let hex = value.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(ParseColorError(value.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParseColorError(value.to_string()))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color {:?}, expected #RRGGBB or #RRGGBBAA", self.0)
    }
}

impl std::error::Error for ParseColorError {}

/// How a stroke's coverage is combined with the layer underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Source-over: the stroke color is composited on top.
    PaintOver,
    /// Destination-out: covered pixels lose their alpha.
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Pen { color: Color, width: u32 },
    Eraser { width: u32 },
}

impl Tool {
    pub fn blend_mode(self) -> BlendMode {
        match self {
            Tool::Pen { .. } => BlendMode::PaintOver,
            Tool::Eraser { .. } => BlendMode::Erase,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            Tool::Pen { width, .. } | Tool::Eraser { width } => width,
        }
    }

    /// Color laid down by the tool. Erasers carry no color.
    pub fn color(self) -> Option<Color> {
        match self {
            Tool::Pen { color, .. } => Some(color),
            Tool::Eraser { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Pen,
    Eraser,
}

/// A pointer position in layer space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamps the point onto the pixel grid of a `width x height` layer.
    /// Pixel centres sit on integer coordinates.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let x = if self.x.is_finite() { self.x } else { 0.0 };
        let y = if self.y.is_finite() { self.y } else { 0.0 };
        Self {
            x: x.clamp(0.0, width.saturating_sub(1) as f32),
            y: y.clamp(0.0, height.saturating_sub(1) as f32),
        }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x as f32, y as f32)
    }
}

/// Toolbar state: which tool is selected plus the color and line width shared
/// by the pen and the eraser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolState {
    kind: ToolKind,
    color: Color,
    line_width: u32,
    max_line_width: u32,
    eraser_multiplier: u32,
    /// Eraser width requested through `set_tool`; dropped when the line width
    /// is edited again.
    eraser_width: Option<u32>,
}

impl Default for ToolState {
    fn default() -> Self {
        Self::new(Color::RED, 3, 64, 3)
    }
}

impl ToolState {
    pub fn new(color: Color, line_width: u32, max_line_width: u32, eraser_multiplier: u32) -> Self {
        let max_line_width = max_line_width.clamp(1, MAX_STROKE_WIDTH);
        Self {
            kind: ToolKind::Pen,
            color,
            line_width: line_width.clamp(1, max_line_width),
            max_line_width,
            eraser_multiplier: eraser_multiplier.max(1),
            eraser_width: None,
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn line_width(&self) -> u32 {
        self.line_width
    }

    /// Tool the next stroke will be drawn with.
    pub fn active(&self) -> Tool {
        match self.kind {
            ToolKind::Pen => Tool::Pen {
                color: self.color,
                width: self.line_width,
            },
            ToolKind::Eraser => Tool::Eraser {
                width: self.eraser_width.unwrap_or_else(|| {
                    self.line_width
                        .saturating_mul(self.eraser_multiplier)
                        .min(MAX_STROKE_WIDTH)
                }),
            },
        }
    }

    /// Adopts `tool` for the next stroke. An eraser keeps its exact width
    /// until the line width is changed.
    pub fn set_tool(&mut self, tool: Tool) {
        match tool {
            Tool::Pen { color, width } => {
                self.kind = ToolKind::Pen;
                self.color = color;
                self.set_line_width(width);
            }
            Tool::Eraser { width } => {
                self.kind = ToolKind::Eraser;
                self.eraser_width = Some(width.clamp(1, MAX_STROKE_WIDTH));
            }
        }
    }

    pub fn select_pen(&mut self) {
        self.kind = ToolKind::Pen;
    }

    pub fn select_eraser(&mut self) {
        self.kind = ToolKind::Eraser;
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_line_width(&mut self, width: u32) {
        self.line_width = width.clamp(1, self.max_line_width);
        self.eraser_width = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_with_and_without_alpha() {
        assert_eq!(Color::from_hex("#FF0000"), Ok(Color::RED));
        assert_eq!(
            Color::from_hex("00ff0080"),
            Ok(Color::rgba(0, 255, 0, 128))
        );
        assert!(Color::from_hex("#F00").is_err());
        assert!(Color::from_hex("#GG0000").is_err());
        assert_eq!(Color::MAGENTA.to_hex(), "#FF00FF");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_hex(), "#01020304");
    }

    #[test]
    fn eraser_uses_widened_line_width() {
        let mut tools = ToolState::default();
        tools.select_eraser();
        assert_eq!(tools.active(), Tool::Eraser { width: 9 });
        assert_eq!(tools.active().blend_mode(), BlendMode::Erase);

        tools.select_pen();
        assert_eq!(
            tools.active(),
            Tool::Pen {
                color: Color::RED,
                width: 3
            }
        );
    }

    #[test]
    fn set_tool_round_trips_through_active() {
        let mut tools = ToolState::default();
        let pen = Tool::Pen {
            color: Color::BLUE,
            width: 5,
        };
        tools.set_tool(pen);
        assert_eq!(tools.active(), pen);

        tools.set_tool(Tool::Eraser { width: 12 });
        assert_eq!(tools.active(), Tool::Eraser { width: 12 });
        assert_eq!(tools.color(), Color::BLUE);
    }

    #[test]
    fn set_tool_keeps_exact_eraser_width() {
        let mut tools = ToolState::default();
        for width in [1, 4, 10] {
            tools.set_tool(Tool::Eraser { width });
            assert_eq!(tools.active(), Tool::Eraser { width });
        }
        assert_eq!(tools.line_width(), 3);

        tools.set_line_width(2);
        assert_eq!(tools.active(), Tool::Eraser { width: 6 });
    }

    #[test]
    fn widths_are_clamped() {
        let mut tools = ToolState::new(Color::RED, 0, 10, 3);
        assert_eq!(tools.line_width(), 1);
        tools.set_line_width(500);
        assert_eq!(tools.line_width(), 10);
    }

    #[test]
    fn points_clamp_into_bounds() {
        let p = Point::new(-5.0, 900.0).clamp_to(800, 600);
        assert_eq!(p, Point::new(0.0, 599.0));
        let nan = Point::new(f32::NAN, 10.0).clamp_to(800, 600);
        assert_eq!(nan, Point::new(0.0, 10.0));
    }
}
