//! Nearest-endpoint query with scale-aware radius and deterministic
//! tie-breaking.
//!
//! The scan is a linear pass over every bucket. It can run to completion
//! in one call ([`NearestEndpointQuery::find`]) or incrementally in
//! chunks ([`NearestEndpointQuery::step`]) so the compute host can notice
//! newer requests between chunks.
//!
//! # Supersession
//!
//! Entering a query marks the component busy and bumps its generation.
//! A scan whose generation is no longer current when it next steps is
//! **aborted** and resolves to "nothing found", even if a genuine nearest
//! endpoint exists. Callers issuing queries back to back (e.g. on every
//! pointer move) must tolerate empty results.

use serde::{Deserialize, Serialize};

use crate::index::{Bucket, SpatialEndpointIndex};
use crate::types::Point;

/// Distance difference under which two candidates count as equidistant.
/// The candidate with the smaller `x` then wins.
pub const TIE_EPSILON: f64 = 2e-7;

/// Outcome of a nearest-endpoint query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestResult {
    /// Nearest bucket strictly inside the attach radius, if any.
    pub bucket: Option<Bucket>,
    /// Distance to `bucket`, or the attach radius when nothing was found.
    pub distance: f64,
}

impl NearestResult {
    /// A result with nothing found inside `radius`.
    #[must_use]
    pub const fn none(radius: f64) -> Self {
        Self {
            bucket: None,
            distance: radius,
        }
    }
}

/// Proof that a query entered the component, carrying its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTicket(u64);

impl QueryTicket {
    /// Start scanning for the nearest bucket to `cursor` strictly inside
    /// `radius`.
    #[must_use]
    pub const fn scan(self, cursor: Point, radius: f64) -> NearestScan {
        NearestScan {
            ticket: self,
            cursor,
            radius,
            position: 0,
            best: None,
            best_distance: radius,
        }
    }
}

/// State of one in-progress scan.
#[derive(Debug, Clone)]
pub struct NearestScan {
    ticket: QueryTicket,
    cursor: Point,
    radius: f64,
    position: usize,
    best: Option<Bucket>,
    best_distance: f64,
}

impl NearestScan {
    /// The query point.
    #[must_use]
    pub const fn cursor(&self) -> Point {
        self.cursor
    }

    /// The attach radius this scan was started with.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    fn consider(&mut self, bucket: &Bucket) {
        let distance = self.cursor.distance(bucket.coordinate);
        if let Some(best) = &self.best
            && (distance - self.best_distance).abs() <= TIE_EPSILON
        {
            if bucket.coordinate.x < best.coordinate.x {
                self.best = Some(bucket.clone());
                self.best_distance = distance;
            }
            return;
        }
        if distance < self.best_distance {
            self.best = Some(bucket.clone());
            self.best_distance = distance;
        }
    }
}

/// Re-entrancy-guarded nearest-endpoint search.
#[derive(Debug, Clone, Default)]
pub struct NearestEndpointQuery {
    busy: bool,
    generation: u64,
}

impl NearestEndpointQuery {
    /// A fresh, idle query component.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a scan is currently in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Register a new query. Any scan still in flight is voided.
    pub fn enter(&mut self) -> QueryTicket {
        if self.busy {
            tracing::debug!(
                generation = self.generation,
                "nearest query superseded by a newer one"
            );
        }
        self.busy = true;
        self.generation += 1;
        QueryTicket(self.generation)
    }

    /// Whether `scan` has been voided by a newer query.
    #[must_use]
    pub const fn is_superseded(&self, scan: &NearestScan) -> bool {
        scan.ticket.0 != self.generation
    }

    /// Visit up to `budget` more buckets.
    ///
    /// Returns `None` while buckets remain. Returns the result once the
    /// scan has visited every bucket, or an empty result immediately if
    /// the scan was superseded.
    pub fn step(
        &mut self,
        index: &SpatialEndpointIndex,
        scan: &mut NearestScan,
        budget: usize,
    ) -> Option<NearestResult> {
        if self.is_superseded(scan) {
            return Some(NearestResult::none(scan.radius));
        }
        let end = scan.position.saturating_add(budget).min(index.len());
        while scan.position < end {
            if let Some(bucket) = index.get_index(scan.position) {
                scan.consider(bucket);
            }
            scan.position += 1;
        }
        if scan.position < index.len() {
            return None;
        }
        self.busy = false;
        Some(NearestResult {
            bucket: scan.best.take(),
            distance: scan.best_distance,
        })
    }

    /// Run a complete query in one call.
    pub fn find(
        &mut self,
        index: &SpatialEndpointIndex,
        cursor: Point,
        radius: f64,
    ) -> NearestResult {
        let ticket = self.enter();
        let mut scan = ticket.scan(cursor, radius);
        loop {
            if let Some(result) = self.step(index, &mut scan, usize::MAX) {
                return result;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EndpointRole, FragmentId, Owner};

    fn index_of(points: &[(f64, f64)]) -> SpatialEndpointIndex {
        let mut index = SpatialEndpointIndex::new();
        for (i, &(x, y)) in points.iter().enumerate() {
            let id = FragmentId(u32::try_from(i).unwrap());
            index.insert(Point::new(x, y), Owner::new(id, EndpointRole::Start));
        }
        index
    }

    #[test]
    fn finds_closest_inside_radius() {
        let index = index_of(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let mut query = NearestEndpointQuery::new();
        let result = query.find(&index, Point::new(0.5, 0.5), 5.0);
        let bucket = result.bucket.unwrap();
        assert_eq!(bucket.coordinate, Point::new(0.0, 0.0));
        assert!((result.distance - 0.5f64.hypot(0.5)).abs() < 1e-12);
        assert!(!query.is_busy());
    }

    #[test]
    fn nothing_inside_radius_reports_the_radius() {
        let index = index_of(&[(0.0, 0.0)]);
        let mut query = NearestEndpointQuery::new();
        let result = query.find(&index, Point::new(3.0, 4.0), 5.0);
        // Exactly on the radius is not strictly inside.
        assert_eq!(result, NearestResult::none(5.0));
    }

    #[test]
    fn empty_index_finds_nothing() {
        let mut query = NearestEndpointQuery::new();
        let result = query.find(&SpatialEndpointIndex::new(), Point::new(0.0, 0.0), 1.0);
        assert!(result.bucket.is_none());
    }

    #[test]
    fn equidistant_tie_prefers_smaller_x_in_any_order() {
        for points in [[(-1.0, 0.0), (1.0, 0.0)], [(1.0, 0.0), (-1.0, 0.0)]] {
            let index = index_of(&points);
            let mut query = NearestEndpointQuery::new();
            let result = query.find(&index, Point::new(0.0, 0.0), 5.0);
            assert_eq!(result.bucket.unwrap().coordinate, Point::new(-1.0, 0.0));
        }
    }

    #[test]
    fn near_tie_within_epsilon_prefers_smaller_x() {
        // (2, 0) is 1e-7 closer than (-2, 0) but within the tie epsilon.
        let index = index_of(&[(2.0 - 1e-7, 0.0), (-2.0, 0.0)]);
        let mut query = NearestEndpointQuery::new();
        let result = query.find(&index, Point::new(0.0, 0.0), 5.0);
        assert_eq!(result.bucket.unwrap().coordinate, Point::new(-2.0, 0.0));
    }

    #[test]
    fn chunked_scan_matches_single_pass() {
        let points: Vec<(f64, f64)> = (0..50).map(|i| (f64::from(i), 0.5)).collect();
        let index = index_of(&points);
        let cursor = Point::new(20.3, 5.9);

        let mut query = NearestEndpointQuery::new();
        let whole = query.find(&index, cursor, 100.0);

        let ticket = query.enter();
        let mut scan = ticket.scan(cursor, 100.0);
        let mut steps = 0;
        let chunked = loop {
            steps += 1;
            if let Some(result) = query.step(&index, &mut scan, 8) {
                break result;
            }
            assert!(query.is_busy());
        };
        assert_eq!(steps, 7);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn newer_query_voids_in_flight_scan() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (f64::from(i), 0.0)).collect();
        let index = index_of(&points);
        let mut query = NearestEndpointQuery::new();

        let first = query.enter();
        let mut older = first.scan(Point::new(0.0, 0.0), 5.0);
        assert!(query.step(&index, &mut older, 3).is_none());

        let second = query.enter();
        let mut newer = second.scan(Point::new(9.0, 0.0), 5.0);

        // The older scan resolves empty even though (0, 0) is a hit.
        assert_eq!(
            query.step(&index, &mut older, usize::MAX),
            Some(NearestResult::none(5.0)),
        );
        assert!(query.is_busy());

        let result = query.step(&index, &mut newer, usize::MAX).unwrap();
        assert_eq!(result.bucket.unwrap().coordinate, Point::new(9.0, 0.0));
        assert!(!query.is_busy());
    }
}
