//! Conditioning canvas configuration.
//!
//! A [`CanvasConfig`] is an ordinary value owned by the caller and passed
//! into [`render`](crate::render::render); there is no global renderer
//! state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default canvas width in pixels.
pub const DEFAULT_WIDTH: u32 = 512;

/// Default canvas height in pixels.
pub const DEFAULT_HEIGHT: u32 = 512;

/// Default background (black, as expected by OpenPose ControlNets).
pub const DEFAULT_BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];

/// Default minimum joint confidence for drawing.
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.3;

/// Default joint marker radius in pixels.
pub const DEFAULT_JOINT_RADIUS: u32 = 4;

/// Default connection stroke width in pixels.
pub const DEFAULT_LINE_THICKNESS: u32 = 4;

/// Size, colors and gating for one rendered conditioning image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// RGB fill of the blank canvas.
    pub background_color: [u8; 3],
    /// Joints with confidence strictly below this value are not drawn.
    pub conf_threshold: f32,
    /// Marker radius in pixels. `0` marks only the joint's own pixel.
    pub joint_radius: u32,
    pub line_thickness: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            background_color: DEFAULT_BACKGROUND_COLOR,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            joint_radius: DEFAULT_JOINT_RADIUS,
            line_thickness: DEFAULT_LINE_THICKNESS,
        }
    }
}

impl CanvasConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `CANVAS_WIDTH`            | `512`   |
    /// | `CANVAS_HEIGHT`           | `512`   |
    /// | `CANVAS_BACKGROUND_COLOR` | `0,0,0` |
    /// | `CANVAS_CONF_THRESHOLD`   | `0.3`   |
    /// | `CANVAS_JOINT_RADIUS`     | `4`     |
    /// | `CANVAS_LINE_THICKNESS`   | `4`     |
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let background_color = match std::env::var("CANVAS_BACKGROUND_COLOR") {
            Ok(raw) => parse_rgb(&raw)?,
            Err(_) => defaults.background_color,
        };

        let config = Self {
            width: env_or("CANVAS_WIDTH", defaults.width)?,
            height: env_or("CANVAS_HEIGHT", defaults.height)?,
            background_color,
            conf_threshold: env_or("CANVAS_CONF_THRESHOLD", defaults.conf_threshold)?,
            joint_radius: env_or("CANVAS_JOINT_RADIUS", defaults.joint_radius)?,
            line_thickness: env_or("CANVAS_LINE_THICKNESS", defaults.line_thickness)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful image.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::Configuration(format!(
                "canvas dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.line_thickness == 0 {
            return Err(CoreError::Configuration(
                "line_thickness must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(CoreError::Configuration(format!(
                "conf_threshold must be within [0, 1], got {}",
                self.conf_threshold
            )));
        }
        Ok(())
    }
}

/// Read and parse an env var, falling back to `default` when it is unset.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Configuration(format!("{key} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

/// Parse an `r,g,b` triple.
pub fn parse_rgb(raw: &str) -> Result<[u8; 3], CoreError> {
    let invalid = || CoreError::Configuration(format!("expected 'r,g,b' color, got '{raw}'"));

    let channels: Vec<u8> = raw
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    <[u8; 3]>::try_from(channels).map_err(|_| invalid())
}
