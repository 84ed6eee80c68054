use crate::draw::model::{Color, ToolState};
use crate::draw::registration::{RegistrationResolver, ScaleFilter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSettings {
    #[serde(default = "default_color")]
    pub default_color: Color,
    #[serde(default = "default_line_width")]
    pub default_line_width: u32,
    #[serde(default = "default_max_line_width")]
    pub max_line_width: u32,
    /// The eraser is this many times wider than the pen line width.
    #[serde(default = "default_eraser_width_multiplier")]
    pub eraser_width_multiplier: u32,
    #[serde(default)]
    pub restore_filter: ScaleFilter,
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_color() -> Color {
    Color::RED
}

fn default_line_width() -> u32 {
    3
}

fn default_max_line_width() -> u32 {
    64
}

fn default_eraser_width_multiplier() -> u32 {
    3
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            default_color: default_color(),
            default_line_width: default_line_width(),
            max_line_width: default_max_line_width(),
            eraser_width_multiplier: default_eraser_width_multiplier(),
            restore_filter: ScaleFilter::default(),
            data_root: default_data_root(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl AnnotationSettings {
    /// Missing or empty files yield the defaults; malformed JSON is an error.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn tool_state(&self) -> ToolState {
        ToolState::new(
            self.default_color,
            self.default_line_width,
            self.max_line_width,
            self.eraser_width_multiplier,
        )
    }

    pub fn resolver(&self) -> RegistrationResolver {
        RegistrationResolver::new(self.restore_filter)
    }
}
