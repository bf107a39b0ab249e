//! Spatial endpoint index: fragment endpoints bucketed by a quantized
//! coordinate key.
//!
//! # Key formula
//!
//! `key(x, y) = x * 100000 + y * 1000000`
//!
//! This is a deliberately cheap, low-collision hash for the coordinate
//! ranges a drawing uses. It is **not** injective: `(x + 10, y - 1)`
//! lands on the same key as `(x, y)`, and such collisions share a bucket
//! whose representative coordinate is whichever arrived first. The
//! formula value is stored as fixed point at 1/100 resolution
//! ([`KEY_RESOLUTION`]) so the `1e-7` fusion offset still produces a
//! distinct key, while coordinates rounded to 5 decimals map to exact
//! integers.
//!
//! Buckets iterate in insertion order so that markup and scans are
//! deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{FragmentId, Owner, Point};

/// Multiplier applied to `x` in the key formula.
pub const KEY_X_FACTOR: f64 = 100_000.0;

/// Multiplier applied to `y` in the key formula.
pub const KEY_Y_FACTOR: f64 = 1_000_000.0;

/// Fixed-point resolution of the stored key value.
pub const KEY_RESOLUTION: f64 = 100.0;

/// Quantized coordinate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(i64);

impl BucketKey {
    /// Quantize a coordinate.
    ///
    /// Identical floats always produce identical keys.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // saturating float-to-int cast is intended
    pub fn quantize(point: Point) -> Self {
        let value = point.x.mul_add(KEY_X_FACTOR, point.y * KEY_Y_FACTOR);
        Self((value * KEY_RESOLUTION).round() as i64)
    }

    /// The raw fixed-point key value.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }
}

/// The set of fragment endpoints considered coincident at one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Coordinate of the first endpoint that created this bucket.
    pub coordinate: Point,
    /// Endpoints located here, in insertion order, without duplicates.
    pub owners: Vec<Owner>,
}

impl Bucket {
    /// A bucket holding no owners yet.
    #[must_use]
    pub const fn new(coordinate: Point) -> Self {
        Self {
            coordinate,
            owners: Vec::new(),
        }
    }

    /// This bucket's key.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        BucketKey::quantize(self.coordinate)
    }

    /// Add an owner unless the same `(fragment, role)` pair is already
    /// present. Returns `true` if the owner was added.
    pub fn push_owner(&mut self, owner: Owner) -> bool {
        if self.owners.contains(&owner) {
            return false;
        }
        self.owners.push(owner);
        true
    }

    /// Whether any owner belongs to the given fragment.
    #[must_use]
    pub fn has_fragment(&self, fragment: FragmentId) -> bool {
        self.owners.iter().any(|o| o.fragment == fragment)
    }
}

/// Map from [`BucketKey`] to [`Bucket`].
///
/// Owned exclusively by one compute host; never shared across sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialEndpointIndex {
    buckets: IndexMap<BucketKey, Bucket>,
}

impl SpatialEndpointIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` at `point`.
    ///
    /// Appends to the existing bucket at `point`'s key, or creates a new
    /// bucket with `point` as its representative coordinate. Returns the
    /// key used.
    pub fn insert(&mut self, point: Point, owner: Owner) -> BucketKey {
        let key = BucketKey::quantize(point);
        self.buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(point))
            .push_owner(owner);
        key
    }

    /// Bucket stored under `key`.
    #[must_use]
    pub fn get(&self, key: BucketKey) -> Option<&Bucket> {
        self.buckets.get(&key)
    }

    /// Bucket whose key matches `point`'s key.
    #[must_use]
    pub fn bucket_at(&self, point: Point) -> Option<&Bucket> {
        self.get(BucketKey::quantize(point))
    }

    /// Bucket at insertion position `position`.
    #[must_use]
    pub fn get_index(&self, position: usize) -> Option<&Bucket> {
        self.buckets.get_index(position).map(|(_, bucket)| bucket)
    }

    /// Remove and return the bucket stored under `key`, preserving the
    /// order of the remaining buckets.
    pub fn remove(&mut self, key: BucketKey) -> Option<Bucket> {
        self.buckets.shift_remove(&key)
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the index holds no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    /// Drop every bucket.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
