use std::path::PathBuf;
use std::time::Duration;

use magalia_core::config::{AppConfig, ExportConfig};

/// Width of one image column in a two-up block.
pub const COLUMN_WIDTH_CM: f64 = 7.3;
pub const COLUMN_HEIGHT_CM: f64 = 5.14;
pub const IMAGE_DPI: u32 = 150;
pub const JPEG_QUALITY: u8 = 80;
pub const JPEG_MIN_QUALITY: u8 = 50;
pub const JPEG_QUALITY_STEP: u8 = 5;
pub const MAX_IMAGE_BYTES: usize = 900_000;

const CM_PER_INCH: f64 = 2.54;

pub fn cm_to_px(cm: f64, dpi: u32) -> u32 {
    ((cm / CM_PER_INCH) * f64::from(dpi)).round().max(1.0) as u32
}

/// Runtime knobs for both exporters.
#[derive(Clone, Debug)]
pub struct ExportSettings {
    pub word_template_path: PathBuf,
    pub image_timeout: Duration,
    pub image_user_agent: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default().export)
    }
}

impl From<&ExportConfig> for ExportSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            word_template_path: config.word_template_path.clone(),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            image_user_agent: config.image_user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cm_to_px, ExportSettings, COLUMN_HEIGHT_CM, COLUMN_WIDTH_CM, IMAGE_DPI};

    #[test]
    fn column_size_in_pixels_at_print_density() {
        assert_eq!(cm_to_px(COLUMN_WIDTH_CM, IMAGE_DPI), 431);
        assert_eq!(cm_to_px(COLUMN_HEIGHT_CM, IMAGE_DPI), 304);
    }

    #[test]
    fn defaults_follow_export_config() {
        let settings = ExportSettings::default();
        assert_eq!(settings.image_timeout.as_secs(), 5);
        assert_eq!(settings.image_user_agent, "Mozilla/5.0");
        assert!(settings.word_template_path.ends_with("Essential_Travel_Itinerary_Template.docx"));
    }
}
