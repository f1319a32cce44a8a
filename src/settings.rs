use crate::errors::{Result, ViewerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest zoom or settle animation accepted from a settings file.
pub const MAX_ANIMATION_SECS: f32 = 10.0;

fn positive_finite(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Zoom limits
    pub max_scale: f32,
    pub min_scale: f32,
    pub double_tap_scale: f32,

    // Animation timing, in seconds
    pub zoom_animation_secs: f32,
    pub pan_settle_secs: f32,

    // Rendering
    /// Physical pixels per view point.
    pub device_density: f32,
    /// Background raster threads; 0 picks one per core.
    pub render_workers: usize,
    pub clear_color: [f32; 4],

    // Diagnostics
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_scale: 5.0,
            min_scale: 1.0,
            double_tap_scale: 2.0,

            zoom_animation_secs: 0.3,
            pan_settle_secs: 0.2,

            device_density: 2.0,
            render_workers: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],

            debug_logging: false,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "zoomview", "ZoomView")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads the user settings, falling back to defaults on any problem.
    pub fn load() -> Self {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                match Self::load_from(&config_path) {
                    Ok(settings) => return settings,
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring unreadable settings")
                    }
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        if let Some(config_path) = Self::config_path() {
            if let Err(e) = self.save_to(&config_path) {
                tracing::warn!(path = %config_path.display(), error = %e, "failed to save settings");
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Repairs values that would break the zoom math.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !positive_finite(self.min_scale) {
            self.min_scale = defaults.min_scale;
        }
        if !positive_finite(self.max_scale) {
            self.max_scale = defaults.max_scale;
        }
        if self.min_scale > self.max_scale {
            std::mem::swap(&mut self.min_scale, &mut self.max_scale);
        }
        if !positive_finite(self.double_tap_scale) {
            self.double_tap_scale = defaults.double_tap_scale;
        }
        if !positive_finite(self.device_density) {
            self.device_density = defaults.device_density;
        }
        self.zoom_animation_secs = sanitize_secs(self.zoom_animation_secs, defaults.zoom_animation_secs);
        self.pan_settle_secs = sanitize_secs(self.pan_settle_secs, defaults.pan_settle_secs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_scale > 0.0) || !self.max_scale.is_finite() || self.max_scale < self.min_scale {
            return Err(ViewerError::SettingsError {
                message: format!(
                    "scale limits must satisfy 0 < min <= max (min {}, max {})",
                    self.min_scale, self.max_scale
                ),
            });
        }
        for (name, secs) in [
            ("zoom_animation_secs", self.zoom_animation_secs),
            ("pan_settle_secs", self.pan_settle_secs),
        ] {
            if !(0.0..=MAX_ANIMATION_SECS).contains(&secs) {
                return Err(ViewerError::SettingsError {
                    message: format!("{} must be between 0 and {} (got {})", name, MAX_ANIMATION_SECS, secs),
                });
            }
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        if self.render_workers == 0 {
            num_cpus::get().max(2)
        } else {
            self.render_workers
        }
    }
}

/// NaN and negative values fall back to `default`; huge ones are capped.
fn sanitize_secs(secs: f32, default: f32) -> f32 {
    if secs.is_nan() || secs < 0.0 {
        default
    } else {
        secs.min(MAX_ANIMATION_SECS)
    }
}
