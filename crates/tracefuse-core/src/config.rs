//! Per-session tuning knobs.
//!
//! Every distance here is in **screen units** and is divided by the
//! current [`Scale`] before use, so snapping and marker sizes feel the
//! same at every zoom level.

use serde::{Deserialize, Serialize};

use crate::types::{Scale, TraceError};

/// Configuration shared by the compute host and the draw state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Snap distance for nearest-endpoint queries.
    ///
    /// The world-space attach radius is `attach_distance / scale`.
    pub attach_distance: f64,

    /// Minimum distance between consecutive clicks in the draw state
    /// machine. Closer clicks are ignored or rejected.
    pub min_point_spacing: f64,

    /// Radius of an endpoint marker.
    pub marker_radius: f64,

    /// Stroke width of a fragment outline.
    pub outline_width: f64,

    /// Stroke width of the invisible hit-test overlay drawn over each
    /// fragment.
    pub hit_width: f64,

    /// Number of buckets a nearest-endpoint scan visits before the host
    /// checks for newer requests.
    pub scan_chunk: usize,
}

impl SessionConfig {
    /// Default snap distance.
    pub const DEFAULT_ATTACH_DISTANCE: f64 = 10.0;
    /// Default minimum click spacing.
    pub const DEFAULT_MIN_POINT_SPACING: f64 = 2.0;
    /// Default endpoint marker radius.
    pub const DEFAULT_MARKER_RADIUS: f64 = 4.0;
    /// Default outline stroke width.
    pub const DEFAULT_OUTLINE_WIDTH: f64 = 1.0;
    /// Default hit-test overlay stroke width.
    pub const DEFAULT_HIT_WIDTH: f64 = 10.0;
    /// Default scan chunk size.
    pub const DEFAULT_SCAN_CHUNK: usize = 256;

    /// World-space snap radius at the given zoom.
    #[must_use]
    pub fn attach_radius(&self, scale: Scale) -> f64 {
        scale.world_length(self.attach_distance)
    }

    /// World-space minimum click spacing at the given zoom.
    #[must_use]
    pub fn point_spacing(&self, scale: Scale) -> f64 {
        scale.world_length(self.min_point_spacing)
    }

    /// Check that every distance is finite and positive and the scan
    /// chunk is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), TraceError> {
        let distances = [
            ("attach_distance", self.attach_distance),
            ("min_point_spacing", self.min_point_spacing),
            ("marker_radius", self.marker_radius),
            ("outline_width", self.outline_width),
            ("hit_width", self.hit_width),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value <= 0.0 {
                return Err(TraceError::InvalidConfig(format!(
                    "{name} must be finite and greater than zero, got {value}"
                )));
            }
        }
        if self.scan_chunk == 0 {
            return Err(TraceError::InvalidConfig(
                "scan_chunk must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attach_distance: Self::DEFAULT_ATTACH_DISTANCE,
            min_point_spacing: Self::DEFAULT_MIN_POINT_SPACING,
            marker_radius: Self::DEFAULT_MARKER_RADIUS,
            outline_width: Self::DEFAULT_OUTLINE_WIDTH,
            hit_width: Self::DEFAULT_HIT_WIDTH,
            scan_chunk: Self::DEFAULT_SCAN_CHUNK,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn attach_radius_shrinks_when_zoomed_in() {
        let config = SessionConfig::default();
        let near = config.attach_radius(Scale::new(4.0).unwrap());
        let far = config.attach_radius(Scale::new(0.5).unwrap());
        assert!((near - 2.5).abs() < f64::EPSILON);
        assert!((far - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_names_bad_field() {
        let config = SessionConfig {
            hit_width: -1.0,
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hit_width"), "{err}");

        let config = SessionConfig {
            scan_chunk: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"attach_distance": 6.0}"#).unwrap();
        assert!((config.attach_distance - 6.0).abs() < f64::EPSILON);
        assert_eq!(config.scan_chunk, SessionConfig::DEFAULT_SCAN_CHUNK);
    }
}
