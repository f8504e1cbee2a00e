// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::pipeline::AnalysisConfig;
use crate::backends::camera::{BindOptions, CameraSelector, SensorRotation, ZoomBackend};
use crate::constants::{analysis, app_info};
use crate::errors::{AppError, AppResult};
use crate::frame_processor::{DecoderOptions, SymbolFormat};
use crate::permission::PermissionBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistent settings
///
/// Missing keys take their default, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera to use: a `/dev/video*` path or an enumeration index
    pub camera: Option<String>,
    /// Analysis frame width
    pub analysis_width: u32,
    /// Analysis frame height
    pub analysis_height: u32,
    /// Clockwise sensor rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
    /// Symbologies passed to the decoder
    pub symbol_formats: Vec<SymbolFormat>,
    /// Keep searching after the first decoded symbol
    pub search_all_regions: bool,
    /// Longest image side handed to the decoder (0 = no limit)
    pub max_decode_dimension: u32,
    /// Decodes allowed to run at once
    pub max_in_flight_decodes: usize,
    /// Zoom implementation
    pub zoom_backend: ZoomBackend,
    /// How camera access is requested
    pub permission: PermissionBackend,
    /// Mirror the terminal preview horizontally
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: None,
            analysis_width: analysis::TARGET_WIDTH,
            analysis_height: analysis::TARGET_HEIGHT,
            rotation: 0,
            symbol_formats: SymbolFormat::ALL.to_vec(),
            search_all_regions: true,
            max_decode_dimension: analysis::MAX_DECODE_DIMENSION,
            max_in_flight_decodes: analysis::DEFAULT_IN_FLIGHT_DECODES,
            zoom_backend: ZoomBackend::Auto,
            permission: PermissionBackend::Auto,
            mirror_preview: false,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_ID).join("config.json"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.normalize();

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Pull out-of-range values back into what the scanner can run with
    pub fn normalize(&mut self) {
        let in_flight = self
            .max_in_flight_decodes
            .clamp(1, analysis::MAX_IN_FLIGHT_DECODES);
        if in_flight != self.max_in_flight_decodes {
            warn!(
                configured = self.max_in_flight_decodes,
                using = in_flight,
                "max_in_flight_decodes out of range"
            );
            self.max_in_flight_decodes = in_flight;
        }
    }

    /// Load from the explicit path or the default location
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) => Self::load_from(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn camera_selector(&self) -> CameraSelector {
        self.camera
            .as_deref()
            .map(CameraSelector::parse)
            .unwrap_or_default()
    }

    pub fn sensor_rotation(&self) -> SensorRotation {
        SensorRotation::from_degrees_int(self.rotation)
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            formats: self.symbol_formats.clone(),
            search_all_regions: self.search_all_regions,
        }
    }

    pub fn bind_options(&self) -> BindOptions {
        BindOptions {
            analysis: AnalysisConfig {
                width: self.analysis_width,
                height: self.analysis_height,
                rotation: self.sensor_rotation(),
            },
            zoom: self.zoom_backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{ "rotation": 90, "zoom_backend": "digital" }"#).unwrap();
        assert_eq!(config.sensor_rotation(), SensorRotation::Rotate90);
        assert_eq!(config.zoom_backend, ZoomBackend::Digital);
        assert_eq!(config.analysis_width, 1280);
        assert_eq!(config.symbol_formats.len(), 13);
    }

    #[test]
    fn test_camera_selector() {
        let mut config = Config::default();
        assert_eq!(config.camera_selector(), CameraSelector::Default);
        config.camera = Some("2".into());
        assert_eq!(config.camera_selector(), CameraSelector::Index(2));
        config.camera = Some("/dev/video4".into());
        assert_eq!(config.camera_selector(), CameraSelector::Path("/dev/video4".into()));
    }
}
