//! Click-driven fragment construction with live mirrored-handle preview.
//!
//! The machine accumulates a pending fragment: its first end point
//! followed by any number of control points. Placing the next end point
//! emits the pending fragment through the completion callback and
//! immediately starts a new one at that end point, so consecutive
//! fragments chain without re-clicking the joint.
//!
//! Only the last two control points shape the emitted fragment (so it is
//! a line, quadratic, or cubic); earlier ones are kept for rendering the
//! pending polyline only.
//!
//! Closing onto the pending fragment's own start (the new end point equals
//! the point two positions back) discards the pending fragment instead of
//! emitting it.

use crate::config::SessionConfig;
use crate::fragment::{Fragment, MAX_POINTS};
use crate::types::{FragmentId, Point, Scale};

/// Role of a placed point in the pending fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointRole {
    /// An anchor the curve passes through.
    End,
    /// A curve control point.
    Control,
}

/// A point placed by a click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedPoint {
    /// Where the click landed.
    pub point: Point,
    /// How the point shapes the fragment.
    pub role: PointRole,
}

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    /// Nothing pending.
    Empty,
    /// A fragment is pending with this many control points after its
    /// first end point.
    Accumulating { controls: usize },
}

/// Result of [`InteractiveDrawStateMachine::set_end_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndPointOutcome {
    /// Nothing was pending; a new fragment starts here.
    Started,
    /// Too close to the previously placed point. The caller must not
    /// advance.
    Rejected,
    /// The point closed onto the pending fragment's own start; the
    /// pending fragment was thrown away without being emitted.
    Discarded,
    /// A fragment with this id was emitted and a new one starts here.
    Completed(FragmentId),
}

impl EndPointOutcome {
    /// Whether the click was taken (everything except [`Self::Rejected`]).
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// What to draw while the pointer hovers with a fragment pending.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPreview {
    /// The fragment that would be emitted if the hover point were
    /// clicked as an end point.
    pub points: Vec<Point>,
    /// `2 * last_control - hover`: the outgoing handle that would keep
    /// the next fragment C1-continuous. `None` when no control point is
    /// pending.
    pub mirrored_handle: Option<Point>,
}

/// Foreground state machine turning clicks into completed fragments.
///
/// Independent of the compute host: it never touches the endpoint index.
pub struct InteractiveDrawStateMachine<F> {
    config: SessionConfig,
    scale: Scale,
    pending: Vec<PlacedPoint>,
    last_controls: Vec<Point>,
    next_id: FragmentId,
    on_complete: F,
}

impl<F> std::fmt::Debug for InteractiveDrawStateMachine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveDrawStateMachine")
            .field("scale", &self.scale)
            .field("pending", &self.pending)
            .field("last_controls", &self.last_controls)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<F: FnMut(Fragment)> InteractiveDrawStateMachine<F> {
    /// A machine that hands each completed fragment to `on_complete`.
    pub const fn new(config: SessionConfig, scale: Scale, on_complete: F) -> Self {
        Self {
            config,
            scale,
            pending: Vec::new(),
            last_controls: Vec::new(),
            next_id: FragmentId(0),
            on_complete,
        }
    }

    /// Start numbering emitted fragments at `id`.
    #[must_use]
    pub const fn with_first_id(mut self, id: FragmentId) -> Self {
        self.next_id = id;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DrawState {
        if self.pending.is_empty() {
            DrawState::Empty
        } else {
            DrawState::Accumulating {
                controls: self.pending.len() - 1,
            }
        }
    }

    /// Points of the fragment under construction, in click order.
    #[must_use]
    pub fn pending_points(&self) -> &[PlacedPoint] {
        &self.pending
    }

    /// Points of the most recently emitted fragment.
    #[must_use]
    pub fn last_controls(&self) -> &[Point] {
        &self.last_controls
    }

    /// Change the zoom; spacing and attach radius follow.
    pub const fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    /// World-space snap radius at the current zoom.
    #[must_use]
    pub fn attach_radius(&self) -> f64 {
        self.config.attach_radius(self.scale)
    }

    /// World-space minimum click spacing at the current zoom.
    #[must_use]
    pub fn point_spacing(&self) -> f64 {
        self.config.point_spacing(self.scale)
    }

    fn too_close(&self, point: Point) -> bool {
        self.pending
            .last()
            .is_some_and(|last| last.point.distance(point) < self.point_spacing())
    }

    /// Place a control point.
    ///
    /// Ignored (returns `false`) when nothing is pending or when the
    /// point is closer than the minimum spacing to the last placed point.
    pub fn set_control_point(&mut self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        if self.pending.is_empty() || self.too_close(point) {
            return false;
        }
        self.pending.push(PlacedPoint {
            point,
            role: PointRole::Control,
        });
        true
    }

    /// Place an end point.
    pub fn set_end_point(&mut self, x: f64, y: f64) -> EndPointOutcome {
        let point = Point::new(x, y);
        if self.pending.is_empty() {
            self.start_at(point);
            return EndPointOutcome::Started;
        }
        if self.too_close(point) {
            return EndPointOutcome::Rejected;
        }
        if self.pending.len() >= 2 && self.pending[self.pending.len() - 2].point == point {
            tracing::debug!(?point, "pending fragment closed onto its start; discarded");
            self.pending.clear();
            return EndPointOutcome::Discarded;
        }

        let points = self.shaped_points(point);
        let id = self.next_id;
        let fragment = match Fragment::new(id, points, false) {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!(error = %e, "could not build fragment from clicks");
                return EndPointOutcome::Rejected;
            }
        };
        self.last_controls = fragment.points().to_vec();
        self.next_id = id.next();
        (self.on_complete)(fragment);
        self.start_at(point);
        EndPointOutcome::Completed(id)
    }

    /// Throw away the pending fragment. Returns `true` if one existed.
    pub fn cancel(&mut self) -> bool {
        let had_pending = !self.pending.is_empty();
        self.pending.clear();
        had_pending
    }

    /// Preview for the pointer hovering at `(x, y)`.
    #[must_use]
    pub fn hover(&self, x: f64, y: f64) -> Option<DrawPreview> {
        if self.pending.is_empty() {
            return None;
        }
        let hover = Point::new(x, y);
        let mirrored_handle = self
            .pending
            .iter()
            .rev()
            .find(|p| p.role == PointRole::Control)
            .map(|control| hover.reflect_about(control.point));
        Some(DrawPreview {
            points: self.shaped_points(hover),
            mirrored_handle,
        })
    }

    fn start_at(&mut self, point: Point) {
        self.pending.clear();
        self.pending.push(PlacedPoint {
            point,
            role: PointRole::End,
        });
    }

    /// First pending point, the last two controls, then `end`.
    fn shaped_points(&self, end: Point) -> Vec<Point> {
        let mut points = Vec::with_capacity(MAX_POINTS);
        if let Some(first) = self.pending.first() {
            points.push(first.point);
        }
        let controls: Vec<Point> = self
            .pending
            .iter()
            .skip(1)
            .filter(|p| p.role == PointRole::Control)
            .map(|p| p.point)
            .collect();
        let keep = controls.len().saturating_sub(MAX_POINTS - 2);
        points.extend_from_slice(&controls[keep..]);
        points.push(end);
        points
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::fragment::FragmentKind;

    type Emitted = Rc<RefCell<Vec<Fragment>>>;

    fn machine() -> (InteractiveDrawStateMachine<impl FnMut(Fragment)>, Emitted) {
        let emitted: Emitted = Rc::default();
        let sink = Rc::clone(&emitted);
        let machine = InteractiveDrawStateMachine::new(
            SessionConfig::default(),
            Scale::IDENTITY,
            move |fragment| sink.borrow_mut().push(fragment),
        );
        (machine, emitted)
    }

    #[test]
    fn closing_onto_own_start_discards_the_fragment() {
        let (mut m, emitted) = machine();
        assert_eq!(m.set_end_point(0.0, 0.0), EndPointOutcome::Started);
        assert!(m.set_control_point(5.0, 5.0));
        assert_eq!(m.set_end_point(0.0, 0.0), EndPointOutcome::Discarded);
        assert!(emitted.borrow().is_empty());
        assert_eq!(m.state(), DrawState::Empty);
        assert!(m.pending_points().is_empty());
    }

    #[test]
    fn end_points_chain_fragments() {
        let (mut m, emitted) = machine();
        m.set_end_point(0.0, 0.0);
        assert_eq!(m.set_end_point(10.0, 0.0), EndPointOutcome::Completed(FragmentId(0)));
        m.set_control_point(15.0, 5.0);
        assert_eq!(m.set_end_point(20.0, 0.0), EndPointOutcome::Completed(FragmentId(1)));

        let emitted = emitted.borrow();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].kind(), FragmentKind::Line);
        assert_eq!(emitted[1].kind(), FragmentKind::Quadratic);
        assert_eq!(emitted[1].start(), emitted[0].end());
        assert_eq!(m.last_controls(), emitted[1].points());
        assert_eq!(m.state(), DrawState::Accumulating { controls: 0 });
        assert_eq!(m.pending_points()[0].point, Point::new(20.0, 0.0));
    }

    #[test]
    fn end_point_too_close_is_rejected() {
        let (mut m, emitted) = machine();
        m.set_end_point(0.0, 0.0);
        m.set_control_point(5.0, 0.0);
        let outcome = m.set_end_point(6.0, 0.0);
        assert_eq!(outcome, EndPointOutcome::Rejected);
        assert!(!outcome.is_accepted());
        assert!(emitted.borrow().is_empty());
        assert_eq!(m.state(), DrawState::Accumulating { controls: 1 });
    }

    #[test]
    fn control_point_needs_a_pending_fragment_and_spacing() {
        let (mut m, _) = machine();
        assert!(!m.set_control_point(1.0, 1.0));
        m.set_end_point(0.0, 0.0);
        assert!(!m.set_control_point(1.0, 1.0));
        assert!(m.set_control_point(3.0, 0.0));
    }

    #[test]
    fn spacing_shrinks_as_zoom_grows() {
        let (mut m, _) = machine();
        m.set_end_point(0.0, 0.0);
        assert!(!m.set_control_point(1.0, 0.0));
        m.set_scale(Scale::new(4.0).unwrap());
        assert!((m.point_spacing() - 0.5).abs() < 1e-12);
        assert!((m.attach_radius() - 2.5).abs() < 1e-12);
        assert!(m.set_control_point(1.0, 0.0));
    }

    #[test]
    fn only_the_last_two_controls_shape_the_fragment() {
        let (mut m, emitted) = machine();
        m.set_end_point(0.0, 0.0);
        m.set_control_point(10.0, 10.0);
        m.set_control_point(20.0, 10.0);
        m.set_control_point(30.0, 10.0);
        m.set_end_point(40.0, 0.0);

        let emitted = emitted.borrow();
        assert_eq!(
            emitted[0].points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(20.0, 10.0),
                Point::new(30.0, 10.0),
                Point::new(40.0, 0.0),
            ],
        );
    }

    #[test]
    fn hover_previews_with_mirrored_handle() {
        let (mut m, _) = machine();
        assert!(m.hover(1.0, 1.0).is_none());

        m.set_end_point(0.0, 0.0);
        let preview = m.hover(10.0, 0.0).unwrap();
        assert_eq!(preview.points, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(preview.mirrored_handle, None);

        m.set_control_point(5.0, 5.0);
        let preview = m.hover(10.0, 0.0).unwrap();
        assert_eq!(preview.points.len(), 3);
        assert_eq!(preview.mirrored_handle, Some(Point::new(0.0, 10.0)));
    }

    #[test]
    fn cancel_drops_pending_state() {
        let (mut m, emitted) = machine();
        assert!(!m.cancel());
        m.set_end_point(0.0, 0.0);
        m.set_control_point(5.0, 5.0);
        assert!(m.cancel());
        assert_eq!(m.state(), DrawState::Empty);
        assert_eq!(m.set_end_point(3.0, 3.0), EndPointOutcome::Started);
        assert!(emitted.borrow().is_empty());
    }

    #[test]
    fn ids_continue_from_the_configured_start() {
        let (m, emitted) = machine();
        let mut m = m.with_first_id(FragmentId(7));
        m.set_end_point(0.0, 0.0);
        m.set_end_point(5.0, 0.0);
        assert_eq!(emitted.borrow()[0].id(), FragmentId(7));
    }
}
