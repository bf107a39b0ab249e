//! Endpoint fusion: relocate or merge a dragged endpoint bucket on
//! release.
//!
//! 1. The origin bucket is removed from the index.
//! 2. The drop coordinate is quantized.
//! 3. No bucket there: the origin's owners move to a new bucket at the
//!    drop coordinate.
//! 4. A bucket is already there: the first origin owner whose fragment
//!    is **not** among the target's owners moves to a new bucket at
//!    `drop + (FUSION_OFFSET, FUSION_OFFSET)`, so the two points render
//!    coincident while keeping distinct keys. Other origin owners whose
//!    fragment is also absent from the target join the target bucket;
//!    the rest are dropped, so no fragment ever owns two endpoints of one
//!    bucket.
//!
//! When every origin owner shares a fragment with the target, nothing is
//! inserted and the origin's owners are lost. That data loss is kept as
//! observed behavior; [`FusionOutcome::Dropped`] reports which owners
//! went missing.

use crate::index::{Bucket, BucketKey, SpatialEndpointIndex};
use crate::types::{Owner, Point};

/// Offset applied to both axes when a merged endpoint is placed next to
/// an existing bucket.
pub const FUSION_OFFSET: f64 = 1e-7;

/// What a fusion did to the index.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionOutcome {
    /// The drop coordinate was free; all owners moved there.
    Relocated {
        /// Key of the new bucket.
        key: BucketKey,
    },
    /// The drop landed on an existing bucket and one owner was fused
    /// alongside it.
    Merged {
        /// Key of the bucket the endpoint was dropped on.
        target: BucketKey,
        /// Key of the offset bucket holding the fused owner.
        fused: BucketKey,
        /// The owner placed in the offset bucket.
        owner: Owner,
        /// Owners that were appended to the target bucket.
        joined: Vec<Owner>,
        /// Owners whose fragment already had an endpoint in the target;
        /// they no longer appear anywhere in the index.
        lost: Vec<Owner>,
    },
    /// Every origin owner already had a fragment in the target bucket;
    /// the origin's owners were removed and not reinserted.
    Dropped {
        /// Key of the bucket the endpoint was dropped on.
        target: BucketKey,
        /// Owners that no longer appear anywhere in the index.
        lost: Vec<Owner>,
    },
}

/// Merge and relocation of endpoint buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointFusion;

impl EndpointFusion {
    /// Apply a drag-release of `origin` at `drop`.
    pub fn fuse(index: &mut SpatialEndpointIndex, origin: &Bucket, drop: Point) -> FusionOutcome {
        index.remove(origin.key());

        let target_key = BucketKey::quantize(drop);
        let Some(target) = index.get(target_key) else {
            for owner in &origin.owners {
                index.insert(drop, *owner);
            }
            tracing::debug!(?drop, owners = origin.owners.len(), "endpoint relocated");
            return FusionOutcome::Relocated { key: target_key };
        };

        let Some(position) = origin
            .owners
            .iter()
            .position(|owner| !target.has_fragment(owner.fragment))
        else {
            tracing::warn!(
                ?drop,
                lost = origin.owners.len(),
                "dropped endpoint shares every fragment with the target; owners discarded"
            );
            return FusionOutcome::Dropped {
                target: target_key,
                lost: origin.owners.clone(),
            };
        };

        let mut remaining = origin.owners.clone();
        let owner = remaining.remove(position);
        let (joined, lost): (Vec<Owner>, Vec<Owner>) = remaining
            .into_iter()
            .partition(|other| !target.has_fragment(other.fragment));

        let fused = index.insert(drop.offset(FUSION_OFFSET), owner);
        for other in &joined {
            index.insert(drop, *other);
        }
        if lost.is_empty() {
            tracing::debug!(?drop, fragment = %owner.fragment, "endpoint fused");
        } else {
            tracing::warn!(
                ?drop,
                fragment = %owner.fragment,
                lost = lost.len(),
                "endpoint fused; owners sharing a fragment with the target discarded"
            );
        }
        FusionOutcome::Merged {
            target: target_key,
            fused,
            owner,
            joined,
            lost,
        }
    }
}
