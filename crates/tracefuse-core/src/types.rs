//! Shared types for the tracefuse fragment engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of decimal digits coordinates are rounded to on ingest.
pub const ROUND_DECIMALS: i32 = 5;

/// `10^ROUND_DECIMALS`, the rounding scale factor.
const ROUND_SCALE: f64 = 100_000.0;

/// A 2D point in drawing units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Round both coordinates to [`ROUND_DECIMALS`] decimal digits.
    ///
    /// Negative zero is normalized to positive zero so that rounded
    /// points compare and hash identically.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self::new(round_coord(self.x), round_coord(self.y))
    }

    /// Reflect `self` through `anchor`: `2 * anchor - self`.
    ///
    /// Used to derive a mirrored handle that keeps a curve C1-continuous
    /// across `anchor`.
    #[must_use]
    pub fn reflect_about(self, anchor: Self) -> Self {
        Self::new(2.0f64.mul_add(anchor.x, -self.x), 2.0f64.mul_add(anchor.y, -self.y))
    }

    /// Offset both coordinates by the same amount.
    #[must_use]
    pub fn offset(self, delta: f64) -> Self {
        Self::new(self.x + delta, self.y + delta)
    }

    /// Coordinates as an `[x, y]` array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<kurbo::Point> for Point {
    fn from(p: kurbo::Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Point> for kurbo::Point {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Round a single coordinate to [`ROUND_DECIMALS`] decimal digits.
#[must_use]
pub fn round_coord(value: f64) -> f64 {
    let rounded = (value * ROUND_SCALE).round() / ROUND_SCALE;
    // -0.0 == 0.0 but the two format and quantize differently.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Sequential identifier of a fragment within one drawing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(pub u32);

impl FragmentId {
    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of a fragment an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// The first point of the fragment.
    Start,
    /// The last point of the fragment.
    End,
}

impl EndpointRole {
    /// Lowercase name, as used in markup data attributes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fragment endpoint: a fragment id paired with the endpoint's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// The fragment this endpoint belongs to.
    pub fragment: FragmentId,
    /// Whether this is the fragment's start or end.
    pub role: EndpointRole,
}

impl Owner {
    /// Create a new owner entry.
    #[must_use]
    pub const fn new(fragment: FragmentId, role: EndpointRole) -> Self {
        Self { fragment, role }
    }
}

/// View zoom factor.
///
/// Always finite and strictly positive, so world-space radii derived by
/// dividing screen-space distances by the scale stay finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Scale(f64);

impl Scale {
    /// Unit zoom.
    pub const IDENTITY: Self = Self(1.0);

    /// Create a validated scale.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::InvalidScale`] if `value` is not finite or
    /// not strictly positive.
    pub fn new(value: f64) -> Result<Self, TraceError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(TraceError::InvalidScale(value))
        }
    }

    /// The raw zoom factor.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Convert a screen-space length into drawing units at this zoom.
    #[must_use]
    pub fn world_length(self, screen: f64) -> f64 {
        screen / self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TryFrom<f64> for Scale {
    type Error = TraceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scale> for f64 {
    fn from(scale: Scale) -> Self {
        scale.0
    }
}

/// Errors produced by the fragment engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum TraceError {
    /// A fragment was built from fewer than 2 or more than 4 points.
    #[error("a fragment needs 2 to 4 points, got {0}")]
    InvalidPointCount(usize),

    /// A zoom factor was zero, negative, or not finite.
    #[error("invalid scale {0}: must be finite and greater than zero")]
    InvalidScale(f64),

    /// Session configuration is invalid.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}
