//! Grid configuration and validation.
//!
//! Every setting is independently changeable on a running [`LayoutEngine`]
//! and each change triggers a full re-layout. Values are checked here, at the
//! boundary, so the packing and normalization passes can assume sane input.
//!
//! [`LayoutEngine`]: crate::layout::LayoutEngine

use crate::error::ConfigError;
use crate::viewport::{CullMode, ZoomDamping};

/// Smallest zoom factor the viewport accepts.
pub const MIN_ZOOM: f64 = 0.2;

/// Largest zoom factor the viewport accepts.
pub const MAX_ZOOM: f64 = 1.5;

/// Extra viewport heights pre-rendered below the fold.
pub const DEFAULT_OVERSCAN_RATIO: f64 = 0.9;

/// Default target row height before zoom, in pixels.
pub const DEFAULT_MAX_TILE_HEIGHT: f64 = 220.0;

/// Default fallback tile width, in pixels.
pub const DEFAULT_MAX_TILE_WIDTH: f64 = 330.0;

/// Clamps a zoom factor into `[MIN_ZOOM, MAX_ZOOM]`.
pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Layout and viewport configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Gap between tiles and between rows, in pixels (default: 4)
    pub padding: f64,
    /// Row height at zoom 1.0; also the fallback height for unavailable media (default: 220)
    pub max_tile_height: f64,
    /// Fallback width for unavailable media (default: 330)
    pub max_tile_width: f64,
    /// Fraction of an overflowing tile that must fit for it to stay in the row (default: 0.5)
    pub line_break_threshold: f64,
    /// Zoom factor, clamped to [0.2, 1.5] (default: 1.0)
    pub zoom_factor: f64,
    /// Container width in pixels (default: 1280)
    pub viewport_width: f64,
    /// Container height in pixels (default: 800)
    pub viewport_height: f64,
    /// Over-scan margin as a multiple of the viewport height (default: 0.9)
    pub overscan_ratio: f64,
    /// How continuous zoom gestures are damped
    pub zoom_damping: ZoomDamping,
    /// Visibility test used when culling
    pub cull_mode: CullMode,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            padding: 4.0,
            max_tile_height: DEFAULT_MAX_TILE_HEIGHT,
            max_tile_width: DEFAULT_MAX_TILE_WIDTH,
            line_break_threshold: 0.5,
            zoom_factor: 1.0,
            viewport_width: 1280.0,
            viewport_height: 800.0,
            overscan_ratio: DEFAULT_OVERSCAN_RATIO,
            zoom_damping: ZoomDamping::default(),
            cull_mode: CullMode::default(),
        }
    }
}

impl GridConfig {
    /// Checks every field. Zoom is not rejected when out of range, only when
    /// it is not a finite number; [`GridConfig::normalized`] clamps it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_padding(self.padding)?;
        validate_positive("max_tile_height", self.max_tile_height)?;
        validate_positive("max_tile_width", self.max_tile_width)?;
        validate_threshold(self.line_break_threshold)?;
        validate_finite("zoom_factor", self.zoom_factor)?;
        validate_positive("viewport_width", self.viewport_width)?;
        validate_positive("viewport_height", self.viewport_height)?;
        validate_finite("overscan_ratio", self.overscan_ratio)?;
        if self.overscan_ratio < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "overscan_ratio",
                value: self.overscan_ratio,
            });
        }
        validate_damping(self.zoom_damping)
    }

    /// Validates and returns a copy with the zoom factor clamped.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        self.zoom_factor = clamp_zoom(self.zoom_factor);
        Ok(self)
    }

    /// Row height the packer fits tiles to.
    pub fn target_row_height(&self) -> f64 {
        self.max_tile_height * self.zoom_factor
    }
}

pub(crate) fn validate_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

pub(crate) fn validate_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    validate_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

pub(crate) fn validate_padding(padding: f64) -> Result<(), ConfigError> {
    validate_finite("padding", padding)?;
    if padding < 0.0 {
        return Err(ConfigError::NegativePadding(padding));
    }
    Ok(())
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    validate_finite("line_break_threshold", threshold)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::ThresholdOutOfRange(threshold));
    }
    Ok(())
}

pub(crate) fn validate_damping(damping: ZoomDamping) -> Result<(), ConfigError> {
    match damping {
        ZoomDamping::Smoothing { exponent } if !(exponent > 0.0 && exponent <= 1.0) => {
            Err(ConfigError::SmoothingExponentOutOfRange(exponent))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GridConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.target_row_height() - DEFAULT_MAX_TILE_HEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_negative_padding() {
        let config = GridConfig {
            padding: -1.0,
            ..GridConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NegativePadding(-1.0)));
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        let config = GridConfig {
            viewport_width: 0.0,
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "viewport_width",
                ..
            })
        ));

        let config = GridConfig {
            max_tile_height: -10.0,
            ..GridConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let config = GridConfig {
            line_break_threshold: 1.5,
            ..GridConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange(1.5))
        );
    }

    #[test]
    fn test_rejects_nan() {
        let config = GridConfig {
            zoom_factor: f64::NAN,
            ..GridConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotFinite {
                field: "zoom_factor"
            })
        );
    }

    #[test]
    fn test_rejects_bad_smoothing_exponent() {
        for exponent in [f64::NAN, f64::INFINITY, 0.0, -0.5, 1.5] {
            let config = GridConfig {
                zoom_damping: ZoomDamping::Smoothing { exponent },
                ..GridConfig::default()
            };
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::SmoothingExponentOutOfRange(_))
                ),
                "exponent {} accepted",
                exponent
            );
        }

        let config = GridConfig {
            zoom_damping: ZoomDamping::Smoothing { exponent: 1.0 },
            ..GridConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalized_clamps_zoom() {
        let config = GridConfig {
            zoom_factor: 4.0,
            ..GridConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.zoom_factor, MAX_ZOOM);

        let config = GridConfig {
            zoom_factor: 0.01,
            ..GridConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.zoom_factor, MIN_ZOOM);
    }
}
