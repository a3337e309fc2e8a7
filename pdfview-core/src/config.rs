use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `[viewer]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub zoom_min: f32,
    pub zoom_max: f32,
    /// Factor applied by one zoom-in / zoom-out step.
    pub zoom_step: f32,
    /// Explicit pdfium shared library; the system library is used otherwise.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom_min: 0.25,
            zoom_max: 8.0,
            zoom_step: std::f32::consts::SQRT_2,
            pdfium_library: None,
        }
    }
}

impl ViewerConfig {
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        let (min, max) = if self.zoom_min <= self.zoom_max {
            (self.zoom_min, self.zoom_max)
        } else {
            (self.zoom_max, self.zoom_min)
        };
        if zoom.is_finite() {
            zoom.clamp(min, max)
        } else {
            1.0_f32.clamp(min, max)
        }
    }

    pub fn zoom_step(&self) -> f32 {
        if self.zoom_step.is_finite() && self.zoom_step > 1.0 {
            self.zoom_step
        } else {
            std::f32::consts::SQRT_2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_zoom_respects_bounds() {
        let config = ViewerConfig::default();
        assert_eq!(config.clamp_zoom(100.0), 8.0);
        assert_eq!(config.clamp_zoom(0.01), 0.25);
        assert_eq!(config.clamp_zoom(f32::NAN), 1.0);
    }

    #[test]
    fn degenerate_step_falls_back_to_default() {
        let config = ViewerConfig {
            zoom_step: 0.5,
            ..ViewerConfig::default()
        };
        assert_eq!(config.zoom_step(), std::f32::consts::SQRT_2);
    }
}
