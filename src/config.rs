//! Run configuration
//!
//! Stored as pretty-printed JSON. Missing fields take their defaults, so a
//! config file only needs the settings it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    pub width: u32,
    pub height: u32,
    /// Backing-store pixels per logical pixel
    pub pixel_density: u32,
    /// Target frames per second for the animation driver
    pub frame_rate: f32,
    pub vsync: bool,
    /// Wait for the host to report the surface size before the first frame
    pub defer_layout: bool,
    /// Follow every touch on the primary pointer with mouse events
    pub touch_emulates_mouse: bool,
    /// Fixed seed for `random`; seeded from the clock when absent
    pub random_seed: Option<u64>,
    pub noise_seed: Option<u64>,
    /// Directory `load_image` and `request_image` resolve names against
    pub data_dir: String,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            pixel_density: 1,
            frame_rate: 60.0,
            vsync: true,
            defer_layout: false,
            touch_emulates_mouse: true,
            random_seed: None,
            noise_seed: None,
            data_dir: "data".into(),
        }
    }
}

impl SketchConfig {
    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let json = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&json).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SketchConfig =
            serde_json::from_str(r#"{ "width": 320, "random_seed": 7 }"#).unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 360);
        assert_eq!(config.random_seed, Some(7));
        assert!(config.touch_emulates_mouse);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("pixelsketch-config-{}.json", std::process::id()));
        let config = SketchConfig {
            frame_rate: 30.0,
            defer_layout: true,
            ..SketchConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = SketchConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(SketchConfig::load("/nonexistent/pixelsketch.json").is_err());
    }
}
