//! Path decomposition: absolute draw commands to fragments.
//!
//! Walks the command list tracking the current point and the start of the
//! current subpath. Every drawing command becomes one fragment whose first
//! point is the current point; `H`/`V` borrow the missing axis from the
//! current point and `Z` draws back to the subpath start. Coordinates are
//! rounded to [`ROUND_DECIMALS`](crate::types::ROUND_DECIMALS) before any
//! comparison, and fragments whose rounded start equals their rounded end
//! are dropped.
//!
//! Each kept fragment gets the next sequential id and both its endpoints
//! are recorded in the [`SpatialEndpointIndex`].

use crate::fragment::Fragment;
use crate::index::SpatialEndpointIndex;
use crate::normalize::{self, DrawCommand};
use crate::types::{EndpointRole, FragmentId, Owner, Point};

/// Stateful walker over one command list.
#[derive(Debug)]
pub struct PathDecomposer<'a> {
    index: &'a mut SpatialEndpointIndex,
    current: Point,
    start: Point,
    next_id: FragmentId,
    fragments: Vec<Fragment>,
}

impl<'a> PathDecomposer<'a> {
    /// A decomposer that records endpoints into `index`.
    ///
    /// Ids start at 0; the index is not cleared.
    pub const fn new(index: &'a mut SpatialEndpointIndex) -> Self {
        Self {
            index,
            current: Point::new(0.0, 0.0),
            start: Point::new(0.0, 0.0),
            next_id: FragmentId(0),
            fragments: Vec::new(),
        }
    }

    /// Decompose `commands`, returning the fragments in command order.
    pub fn decompose(mut self, commands: &[DrawCommand]) -> Vec<Fragment> {
        for command in commands {
            self.push(*command);
        }
        tracing::debug!(
            commands = commands.len(),
            fragments = self.fragments.len(),
            buckets = self.index.len(),
            "path decomposed"
        );
        self.fragments
    }

    fn push(&mut self, command: DrawCommand) {
        let current = self.current;
        match command {
            DrawCommand::Move(to) => {
                let to = to.rounded();
                self.current = to;
                self.start = to;
            }
            DrawCommand::Line(to) => self.emit(vec![current, to.rounded()], false),
            DrawCommand::HorizontalLine(x) => {
                let to = Point::new(x, current.y).rounded();
                self.emit(vec![current, to], false);
            }
            DrawCommand::VerticalLine(y) => {
                let to = Point::new(current.x, y).rounded();
                self.emit(vec![current, to], false);
            }
            DrawCommand::CubicCurve { ctrl1, ctrl2, to } => self.emit(
                vec![current, ctrl1.rounded(), ctrl2.rounded(), to.rounded()],
                false,
            ),
            DrawCommand::QuadraticCurve { ctrl, to } => {
                self.emit(vec![current, ctrl.rounded(), to.rounded()], false);
            }
            DrawCommand::ClosePath => self.emit(vec![current, self.start], true),
        }
    }

    fn emit(&mut self, points: Vec<Point>, closed: bool) {
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return;
        };
        self.current = last;
        if first == last {
            tracing::trace!(?first, "dropping degenerate fragment");
            return;
        }
        let id = self.next_id;
        match Fragment::new(id, points, closed) {
            Ok(fragment) => {
                self.index.insert(first, Owner::new(id, EndpointRole::Start));
                self.index.insert(last, Owner::new(id, EndpointRole::End));
                self.fragments.push(fragment);
                self.next_id = id.next();
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed fragment"),
        }
    }
}

/// Normalize a raw path string and decompose it into `index`.
///
/// Convenience over [`normalize::normalize`] followed by
/// [`PathDecomposer::decompose`].
pub fn decompose_path(
    path: &str,
    transform: Option<&str>,
    index: &mut SpatialEndpointIndex,
) -> Vec<Fragment> {
    let commands = normalize::normalize(path, transform);
    PathDecomposer::new(index).decompose(&commands)
}
