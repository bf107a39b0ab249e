//! Path normalization: raw path-drawing strings to absolute draw commands.
//!
//! Accepts the full mini-language (`M L H V C S Q T A Z`, absolute and
//! relative) plus an optional transform list, and produces the
//! absolute-coordinate command list [`decompose`](crate::decompose)
//! expects:
//!
//! - relative coordinates are resolved against the current point,
//! - `S` / `T` are expanded by reflecting the previous control point
//!   (or using the current point when the previous command was not of
//!   the same curve family),
//! - arcs are approximated by cubic curves,
//! - the transform is applied to every emitted point.
//!
//! `H` / `V` stay axis-aligned commands only when the transform has no
//! rotation or skew; otherwise they are emitted as plain lines.
//!
//! Parsing is permissive: everything parsed before the first syntax error
//! is kept and the remainder is dropped with a warning.

use std::str::FromStr;

use kurbo::{Affine, Arc, PathEl, SvgArc, Vec2};
use svgtypes::{PathParser, PathSegment};

use crate::types::Point;

/// Flattening tolerance for arc-to-cubic conversion, in drawing units.
const ARC_TOLERANCE: f64 = 0.01;

/// An absolute-coordinate drawing command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// Start a new subpath.
    Move(Point),
    /// Straight line to a point.
    Line(Point),
    /// Horizontal line to an `x`; `y` stays at the current point's.
    HorizontalLine(f64),
    /// Vertical line to a `y`; `x` stays at the current point's.
    VerticalLine(f64),
    /// Cubic Bézier.
    CubicCurve {
        /// First control point.
        ctrl1: Point,
        /// Second control point.
        ctrl2: Point,
        /// End point.
        to: Point,
    },
    /// Quadratic Bézier.
    QuadraticCurve {
        /// Control point.
        ctrl: Point,
        /// End point.
        to: Point,
    },
    /// Line back to the subpath start.
    ClosePath,
}

/// Parse a transform list such as `"translate(10 20) scale(2)"`.
///
/// Returns `None` (and logs a warning) if the string does not parse.
#[must_use]
pub fn parse_transform(transform: &str) -> Option<Affine> {
    match svgtypes::Transform::from_str(transform) {
        Ok(t) => Some(Affine::new([t.a, t.b, t.c, t.d, t.e, t.f])),
        Err(e) => {
            tracing::warn!(%transform, error = %e, "ignoring unparsable transform");
            None
        }
    }
}

/// Normalize `path` into absolute draw commands, applying `transform`
/// (an unparsable transform is treated as identity).
#[must_use]
pub fn normalize(path: &str, transform: Option<&str>) -> Vec<DrawCommand> {
    let affine = transform
        .and_then(parse_transform)
        .unwrap_or(Affine::IDENTITY);
    Normalizer::new(affine).run(path)
}

/// Previous curve control point, remembered for `S` / `T` reflection.
#[derive(Debug, Clone, Copy)]
enum LastControl {
    None,
    Cubic(kurbo::Point),
    Quadratic(kurbo::Point),
}

struct Normalizer {
    affine: Affine,
    axis_aligned: bool,
    current: kurbo::Point,
    start: kurbo::Point,
    last_control: LastControl,
    out: Vec<DrawCommand>,
}

impl Normalizer {
    fn new(affine: Affine) -> Self {
        let [_, b, c, _, _, _] = affine.as_coeffs();
        Self {
            affine,
            axis_aligned: b == 0.0 && c == 0.0,
            current: kurbo::Point::ZERO,
            start: kurbo::Point::ZERO,
            last_control: LastControl::None,
            out: Vec::new(),
        }
    }

    fn run(mut self, path: &str) -> Vec<DrawCommand> {
        for segment in PathParser::from(path) {
            match segment {
                Ok(segment) => self.push(segment),
                Err(e) => {
                    tracing::warn!(error = %e, parsed = self.out.len(), "path data truncated at syntax error");
                    break;
                }
            }
        }
        self.out
    }

    fn tx(&self, p: kurbo::Point) -> Point {
        Point::from(self.affine * p)
    }

    fn resolve(&self, abs: bool, x: f64, y: f64) -> kurbo::Point {
        if abs {
            kurbo::Point::new(x, y)
        } else {
            kurbo::Point::new(self.current.x + x, self.current.y + y)
        }
    }

    fn reflected(&self, cubic: bool) -> kurbo::Point {
        match (self.last_control, cubic) {
            (LastControl::Cubic(c), true) | (LastControl::Quadratic(c), false) => {
                kurbo::Point::new(2.0f64.mul_add(self.current.x, -c.x), 2.0f64.mul_add(self.current.y, -c.y))
            }
            _ => self.current,
        }
    }

    fn line_to(&mut self, to: kurbo::Point) {
        self.out.push(DrawCommand::Line(self.tx(to)));
        self.current = to;
        self.last_control = LastControl::None;
    }

    fn cubic_to(&mut self, ctrl1: kurbo::Point, ctrl2: kurbo::Point, to: kurbo::Point) {
        self.out.push(DrawCommand::CubicCurve {
            ctrl1: self.tx(ctrl1),
            ctrl2: self.tx(ctrl2),
            to: self.tx(to),
        });
        self.current = to;
        self.last_control = LastControl::Cubic(ctrl2);
    }

    fn quad_to(&mut self, ctrl: kurbo::Point, to: kurbo::Point) {
        self.out.push(DrawCommand::QuadraticCurve {
            ctrl: self.tx(ctrl),
            to: self.tx(to),
        });
        self.current = to;
        self.last_control = LastControl::Quadratic(ctrl);
    }

    #[allow(clippy::too_many_lines)]
    fn push(&mut self, segment: PathSegment) {
        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                let to = self.resolve(abs, x, y);
                self.out.push(DrawCommand::Move(self.tx(to)));
                self.current = to;
                self.start = to;
                self.last_control = LastControl::None;
            }
            PathSegment::LineTo { abs, x, y } => {
                let to = self.resolve(abs, x, y);
                self.line_to(to);
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                let x = if abs { x } else { self.current.x + x };
                let to = kurbo::Point::new(x, self.current.y);
                if self.axis_aligned {
                    self.out.push(DrawCommand::HorizontalLine(self.tx(to).x));
                    self.current = to;
                    self.last_control = LastControl::None;
                } else {
                    self.line_to(to);
                }
            }
            PathSegment::VerticalLineTo { abs, y } => {
                let y = if abs { y } else { self.current.y + y };
                let to = kurbo::Point::new(self.current.x, y);
                if self.axis_aligned {
                    self.out.push(DrawCommand::VerticalLine(self.tx(to).y));
                    self.current = to;
                    self.last_control = LastControl::None;
                } else {
                    self.line_to(to);
                }
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let ctrl1 = self.resolve(abs, x1, y1);
                let ctrl2 = self.resolve(abs, x2, y2);
                let to = self.resolve(abs, x, y);
                self.cubic_to(ctrl1, ctrl2, to);
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let ctrl1 = self.reflected(true);
                let ctrl2 = self.resolve(abs, x2, y2);
                let to = self.resolve(abs, x, y);
                self.cubic_to(ctrl1, ctrl2, to);
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let ctrl = self.resolve(abs, x1, y1);
                let to = self.resolve(abs, x, y);
                self.quad_to(ctrl, to);
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let ctrl = self.reflected(false);
                let to = self.resolve(abs, x, y);
                self.quad_to(ctrl, to);
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let to = self.resolve(abs, x, y);
                let arc = SvgArc {
                    from: self.current,
                    to,
                    radii: Vec2::new(rx, ry),
                    x_rotation: x_axis_rotation.to_radians(),
                    large_arc,
                    sweep,
                };
                self.arc_to(&arc);
            }
            PathSegment::ClosePath { .. } => {
                self.out.push(DrawCommand::ClosePath);
                self.current = self.start;
                self.last_control = LastControl::None;
            }
        }
    }

    fn arc_to(&mut self, arc: &SvgArc) {
        if arc.is_straight_line() {
            self.line_to(arc.to);
            return;
        }
        let end = arc.to;
        let Some(arc) = Arc::from_svg_arc(arc) else {
            self.line_to(end);
            return;
        };
        for el in arc.append_iter(ARC_TOLERANCE) {
            if let PathEl::CurveTo(ctrl1, ctrl2, to) = el {
                self.cubic_to(ctrl1, ctrl2, to);
            }
        }
        // Snap to the exact end so later relative commands resolve
        // against it rather than the last cubic's rounded end.
        self.current = end;
        self.last_control = LastControl::None;
    }
}
