//! Viewer configuration
//!
//! Static viewer options: base images per eye side, the overlay catalog
//! backing the UI buttons, fade timing, and the target material name. The
//! active overlay selection itself is deliberately not persisted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::{EyeSide, MATERIAL_BACK};

/// One catalog overlay offered as a UI action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPreset {
    /// Button label
    pub label: String,
    /// Image path or data URI
    pub path: String,
    /// Blend weight applied when toggled on
    #[serde(default = "default_weight")]
    pub weight: f32,
}

/// Viewer settings loaded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base fundus image shown for the left eye
    pub left_base_image: String,
    /// Base fundus image shown for the right eye
    pub right_base_image: String,
    /// Overlays offered in the side panel
    pub overlays: Vec<OverlayPreset>,
    /// Group fade time in seconds
    pub fade_duration: f32,
    /// Material name the composite installs on
    pub target_material: String,
    /// Weight used for operator-picked files outside the catalog
    pub default_overlay_weight: f32,
}

fn default_weight() -> f32 {
    0.85
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            left_base_image: "left.jpg".to_string(),
            right_base_image: "right.jpg".to_string(),
            overlays: Vec::new(),
            fade_duration: 0.4,
            target_material: MATERIAL_BACK.to_string(),
            default_overlay_weight: default_weight(),
        }
    }
}

impl ViewerConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Write the current settings as pretty JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// The base image configured for an eye side.
    pub fn base_image_for(&self, side: EyeSide) -> &str {
        match side {
            EyeSide::Left => &self.left_base_image,
            EyeSide::Right => &self.right_base_image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ViewerConfig::load(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.target_material, MATERIAL_BACK);
    }

    #[test]
    fn test_round_trip() {
        let mut config = ViewerConfig::default();
        config.overlays.push(OverlayPreset {
            label: "Lesion markers".to_string(),
            path: "lesions.png".to_string(),
            weight: 0.5,
        });

        let json = serde_json::to_string(&config).unwrap();
        let back: ViewerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{"left_base_image": "l.png"}"#).unwrap();
        assert_eq!(config.left_base_image, "l.png");
        assert_eq!(config.right_base_image, "right.jpg");
        assert!((config.default_overlay_weight - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_base_image_for_side() {
        let config = ViewerConfig::default();
        assert_eq!(config.base_image_for(EyeSide::Left), "left.jpg");
        assert_eq!(config.base_image_for(EyeSide::Right), "right.jpg");
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join("fundus-viewer-config-test.json");
        let mut config = ViewerConfig::default();
        config.fade_duration = 1.5;

        config.save(&path).unwrap();
        let back = ViewerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back, config);
    }
}
