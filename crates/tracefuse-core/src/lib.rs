//! tracefuse-core: Path-fragment spatial index and endpoint fusion (sans-IO).
//!
//! Turns path-drawing strings into 2-4 point curve fragments, indexes
//! their endpoints by a quantized coordinate key, answers scale-aware
//! nearest-endpoint queries, and merges endpoints when one is dragged
//! onto another:
//!
//! path string -> normalize -> decompose -> endpoint index ->
//! nearest query / fusion.
//!
//! This crate has **no I/O dependencies** and spawns nothing. The
//! background compute context that owns an index lives in
//! `tracefuse-host`; markup rendering lives in `tracefuse-markup`.

pub mod config;
pub mod decompose;
pub mod draw;
pub mod fragment;
pub mod fusion;
pub mod index;
pub mod nearest;
pub mod normalize;
pub mod types;

pub use config::SessionConfig;
pub use decompose::{PathDecomposer, decompose_path};
pub use draw::{DrawPreview, DrawState, EndPointOutcome, InteractiveDrawStateMachine, PointRole};
pub use fragment::{Fragment, FragmentKind};
pub use fusion::{EndpointFusion, FusionOutcome};
pub use index::{Bucket, BucketKey, SpatialEndpointIndex};
pub use nearest::{NearestEndpointQuery, NearestResult};
pub use normalize::{DrawCommand, normalize};
pub use types::{EndpointRole, FragmentId, Owner, Point, Scale, TraceError};

/// Decompose `path` into a fresh index and return both.
///
/// # Example
///
/// ```
/// use tracefuse_core::{Point, trace};
///
/// let (fragments, index) = trace("M 0 0 L 10 0 L 10 10 Z", None);
/// assert_eq!(fragments.len(), 3);
/// assert_eq!(index.len(), 3);
/// assert_eq!(index.bucket_at(Point::new(0.0, 0.0)).map(|b| b.owners.len()), Some(2));
/// ```
#[must_use]
pub fn trace(path: &str, transform: Option<&str>) -> (Vec<Fragment>, SpatialEndpointIndex) {
    let mut index = SpatialEndpointIndex::new();
    let fragments = decompose_path(path, transform, &mut index);
    (fragments, index)
}
