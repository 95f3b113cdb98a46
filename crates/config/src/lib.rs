//! Configuration loader for the depth camera runner
//!
//! Loads and parses TOML configuration files. Every field of the schema is
//! required; a missing key or a wrong type is a fatal load error. The only
//! exception is `model.smooth_input`, which may be omitted (off).

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SizeCfg {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelCfg {
    /// Compiled model artifact (HEF).
    pub hef_path: String,
    /// Vendor runtime shim shared library.
    pub shim_lib: String,
    /// Apply a 3x3 box smoothing to the camera frame before the model
    /// resize. Absent means off.
    pub smooth_input: Option<bool>,
    pub input_size: SizeCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoOutputCfg {
    pub width: u32,
    pub height: u32,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoCfg {
    pub framerate: u32,
    pub input: SizeCfg,
    pub output: VideoOutputCfg,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EncoderCfg {
    /// x264 speed preset index, 1 (ultrafast) .. 10 (placebo).
    pub speed_preset: u32,
    /// x264 tune bitmask: 1 = stillimage, 2 = fastdecode, 4 = zerolatency.
    pub tune: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingCfg {
    pub timing_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub device: String,
    pub model: ModelCfg,
    pub video: VideoCfg,
    pub encoder: EncoderCfg,
    pub logging: LoggingCfg,
}

impl AppConfig {
    /// Parse a configuration document without touching the filesystem.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        Ok(config)
    }

    pub fn smooth_input(&self) -> bool {
        self.model.smooth_input.unwrap_or(false)
    }
}

pub fn load_config(path: &str) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read config file '{}': {}", path, e))?;

    let config = AppConfig::from_toml_str(&content)
        .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path, e))?;

    // Validate required paths
    if !std::path::Path::new(&config.model.hef_path).exists() {
        return Err(anyhow!("Model HEF not found: {}", config.model.hef_path));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
device = "/dev/video0"

[model]
hef_path = "hefs/depth.hef"
shim_lib = "libhailort_shim.so"

[model.input_size]
width = 256
height = 256

[video]
framerate = 30

[video.input]
width = 640
height = 480

[video.output]
width = 640
height = 480
file = "output.mp4"

[encoder]
speed_preset = 1
tune = 4

[logging]
timing_log = "timing_log.csv"
"#;

    #[test]
    fn test_round_trip_full_config() {
        let cfg = AppConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(cfg.device, "/dev/video0");
        assert_eq!(cfg.model.hef_path, "hefs/depth.hef");
        assert_eq!(cfg.model.shim_lib, "libhailort_shim.so");
        assert_eq!(cfg.model.input_size.width, 256);
        assert_eq!(cfg.model.input_size.height, 256);
        assert_eq!(cfg.video.framerate, 30);
        assert_eq!(cfg.video.input.width, 640);
        assert_eq!(cfg.video.input.height, 480);
        assert_eq!(cfg.video.output.width, 640);
        assert_eq!(cfg.video.output.height, 480);
        assert_eq!(cfg.video.output.file, "output.mp4");
        assert_eq!(cfg.encoder.speed_preset, 1);
        assert_eq!(cfg.encoder.tune, 4);
        assert_eq!(cfg.logging.timing_log, "timing_log.csv");
    }

    #[test]
    fn test_smooth_input_defaults_off() {
        let cfg = AppConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(cfg.model.smooth_input, None);
        assert!(!cfg.smooth_input());
    }

    #[test]
    fn test_smooth_input_explicit() {
        let with_smoothing = FULL_CONFIG.replace(
            "shim_lib = \"libhailort_shim.so\"",
            "shim_lib = \"libhailort_shim.so\"\nsmooth_input = true",
        );
        let cfg = AppConfig::from_toml_str(&with_smoothing).unwrap();
        assert!(cfg.smooth_input());
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let without_device = FULL_CONFIG.replace("device = \"/dev/video0\"\n", "");
        assert!(AppConfig::from_toml_str(&without_device).is_err());

        let without_file = FULL_CONFIG.replace("file = \"output.mp4\"\n", "");
        assert!(AppConfig::from_toml_str(&without_file).is_err());
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let bad_framerate = FULL_CONFIG.replace("framerate = 30", "framerate = \"fast\"");
        assert!(AppConfig::from_toml_str(&bad_framerate).is_err());
    }

    #[test]
    fn test_load_config_requires_existing_hef() {
        let dir = std::env::temp_dir().join("depthcam_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let cfg_path = dir.join("config.toml");
        std::fs::write(&cfg_path, FULL_CONFIG).unwrap();

        // hef_path points at a file that does not exist
        let err = load_config(cfg_path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("HEF not found"));
    }
}
