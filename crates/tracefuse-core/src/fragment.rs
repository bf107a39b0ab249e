//! Fragments: 2-4 point curve segments.
//!
//! The point count decides the curve kind: 2 points form a line, 3 a
//! quadratic Bézier, 4 a cubic Bézier. The first and last points are the
//! fragment's endpoints; anything between them is a control point.

use kurbo::{CubicBez, Line, ParamCurveNearest, PathSeg, QuadBez};
use serde::{Deserialize, Serialize};

use crate::types::{EndpointRole, FragmentId, Point, TraceError};

/// Smallest number of points a fragment can hold.
pub const MIN_POINTS: usize = 2;

/// Largest number of points a fragment can hold.
pub const MAX_POINTS: usize = 4;

/// Accuracy passed to kurbo's parametric nearest-point solver.
const NEAREST_ACCURACY: f64 = 1e-6;

/// Curve kind implied by a fragment's point count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// 2 points.
    Line,
    /// 3 points.
    Quadratic,
    /// 4 points.
    Cubic,
}

/// A 2-4 point curve segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FragmentRepr")]
pub struct Fragment {
    id: FragmentId,
    points: Vec<Point>,
    closed: bool,
    /// Outgoing handle shown while the end anchor's handle is dragged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handle: Option<Point>,
}

/// Unvalidated wire form of [`Fragment`].
#[derive(Deserialize)]
struct FragmentRepr {
    id: FragmentId,
    points: Vec<Point>,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    handle: Option<Point>,
}

impl TryFrom<FragmentRepr> for Fragment {
    type Error = TraceError;

    fn try_from(repr: FragmentRepr) -> Result<Self, Self::Error> {
        let mut fragment = Self::new(repr.id, repr.points, repr.closed)?;
        fragment.handle = repr.handle;
        Ok(fragment)
    }
}

impl Fragment {
    /// Create a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::InvalidPointCount`] unless `points` holds
    /// between [`MIN_POINTS`] and [`MAX_POINTS`] points.
    pub fn new(id: FragmentId, points: Vec<Point>, closed: bool) -> Result<Self, TraceError> {
        if !(MIN_POINTS..=MAX_POINTS).contains(&points.len()) {
            return Err(TraceError::InvalidPointCount(points.len()));
        }
        Ok(Self {
            id,
            points,
            closed,
            handle: None,
        })
    }

    /// The fragment's identifier.
    #[must_use]
    pub const fn id(&self) -> FragmentId {
        self.id
    }

    /// All points, endpoints included.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Whether the fragment was produced by a close-path command.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The live outgoing handle set by [`redraw_curve`](Self::redraw_curve).
    #[must_use]
    pub const fn handle(&self) -> Option<Point> {
        self.handle
    }

    /// Curve kind implied by the point count.
    #[must_use]
    pub fn kind(&self) -> FragmentKind {
        match self.points.len() {
            2 => FragmentKind::Line,
            3 => FragmentKind::Quadratic,
            _ => FragmentKind::Cubic,
        }
    }

    /// First point.
    #[must_use]
    pub fn start(&self) -> Point {
        self.points[0]
    }

    /// Last point.
    #[must_use]
    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    /// The endpoint with the given role.
    #[must_use]
    pub fn endpoint(&self, role: EndpointRole) -> Point {
        match role {
            EndpointRole::Start => self.start(),
            EndpointRole::End => self.end(),
        }
    }

    /// The fragment as a kurbo path segment.
    #[must_use]
    pub fn to_curve(&self) -> PathSeg {
        let p = |i: usize| kurbo::Point::from(self.points[i]);
        match self.kind() {
            FragmentKind::Line => PathSeg::Line(Line::new(p(0), p(1))),
            FragmentKind::Quadratic => PathSeg::Quad(QuadBez::new(p(0), p(1), p(2))),
            FragmentKind::Cubic => PathSeg::Cubic(CubicBez::new(p(0), p(1), p(2), p(3))),
        }
    }

    /// Euclidean distance from `(x, y)` to the closest point on the curve.
    ///
    /// Projects the query onto the parametric curve rather than the
    /// control polygon, so it is exact for hover and hit testing
    /// independent of the endpoint index.
    #[must_use]
    pub fn distance_detection(&self, x: f64, y: f64) -> f64 {
        self.to_curve()
            .nearest(kurbo::Point::new(x, y), NEAREST_ACCURACY)
            .distance_sq
            .sqrt()
    }

    /// Live update while the end anchor's outgoing handle is dragged to
    /// `(x, y)`.
    ///
    /// The control point just before the end anchor is set to the
    /// reflection of `(x, y)` through the anchor, so the handle pair
    /// stays symmetric. Lines have no control point to mirror and are
    /// left untouched.
    ///
    /// Returns `true` if the fragment changed.
    pub fn redraw_curve(&mut self, x: f64, y: f64) -> bool {
        if self.kind() == FragmentKind::Line {
            return false;
        }
        let dragged = Point::new(x, y);
        let last = self.points.len() - 1;
        let anchor = self.points[last];
        self.points[last - 1] = dragged.reflect_about(anchor);
        self.handle = Some(dragged);
        true
    }

    /// Drop the live handle once a drag ends.
    pub const fn clear_handle(&mut self) {
        self.handle = None;
    }
}
