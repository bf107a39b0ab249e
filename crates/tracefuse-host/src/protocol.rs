//! Request/response messages exchanged with the compute host.
//!
//! Every request carries a [`RequestId`] chosen by the controller; the
//! host echoes it on the matching [`Reply`]. All payloads are serde
//! types so they can also cross a JSON boundary (the CLI prints them).

use serde::{Deserialize, Serialize};
use tracefuse_core::{Bucket, EndpointRole, Fragment, FragmentId, NearestResult, Owner, Point, Scale};

/// Per-request identifier, unique within one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

/// Artwork to decompose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSpec {
    /// Transform list applied to every point before decomposition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Path-drawing string (`M L H V C S Q T A Z`, absolute or relative).
    pub path: String,
    /// View zoom at load time.
    #[serde(default)]
    pub scale: Scale,
}

impl PathSpec {
    /// A spec with no transform at unit zoom.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            transform: None,
            path: path.into(),
            scale: Scale::IDENTITY,
        }
    }
}

/// Operations the compute host performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    /// Clear all state and decompose new artwork.
    InitPath(PathSpec),
    /// Change the zoom used for attach radius and marker sizes.
    UpdateScale {
        /// New zoom.
        scale: Scale,
    },
    /// Find the nearest endpoint bucket to `(x, y)`.
    FindNearestPoint {
        /// Cursor x.
        x: f64,
        /// Cursor y.
        y: f64,
    },
    /// Release a dragged endpoint at `(x, y)`.
    UpdateEndPoint {
        /// The bucket being dragged, as last reported by a nearest query.
        origin: NearestPoint,
        /// Drop x.
        x: f64,
        /// Drop y.
        y: f64,
    },
    /// Re-render the endpoint-marker layer from the current index.
    RenderEndpoints,
}

/// A bucket as seen across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestPoint {
    /// Representative coordinate as `[x, y]`.
    pub coordinate: [f64; 2],
    /// `[fragment_id, role]` pairs.
    pub owners: Vec<(FragmentId, EndpointRole)>,
}

impl From<&Bucket> for NearestPoint {
    fn from(bucket: &Bucket) -> Self {
        Self {
            coordinate: bucket.coordinate.to_array(),
            owners: bucket.owners.iter().map(|o| (o.fragment, o.role)).collect(),
        }
    }
}

impl From<&NearestPoint> for Bucket {
    fn from(point: &NearestPoint) -> Self {
        Self {
            coordinate: Point::from(point.coordinate),
            owners: point
                .owners
                .iter()
                .map(|&(fragment, role)| Owner::new(fragment, role))
                .collect(),
        }
    }
}

/// Result of [`Request::FindNearestPoint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestResponse {
    /// Nearest bucket strictly inside the attach radius.
    pub nearest_point: Option<NearestPoint>,
    /// Distance to it, or the attach radius when nothing was found.
    pub distance: f64,
}

impl From<NearestResult> for NearestResponse {
    fn from(result: NearestResult) -> Self {
        Self {
            nearest_point: result.bucket.as_ref().map(NearestPoint::from),
            distance: result.distance,
        }
    }
}

/// Result of [`Request::InitPath`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPathResponse {
    /// Fragments in decomposition order.
    pub fragments: Vec<Fragment>,
    /// Visible outlines, one `<path>` per fragment.
    pub outline_markup: String,
    /// Wide transparent hit-test paths, one per fragment.
    pub hit_overlay_markup: String,
    /// One marker per bucket.
    pub endpoint_marker_markup: String,
}

/// Payload of a [`Reply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Response {
    /// Answer to [`Request::InitPath`].
    InitPath(InitPathResponse),
    /// Answer to [`Request::FindNearestPoint`].
    Nearest(NearestResponse),
    /// Answer to [`Request::RenderEndpoints`].
    EndpointMarkup(String),
    /// Answer to requests with no payload.
    Ack,
}

/// Host-to-controller message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Echo of the request id.
    pub id: RequestId,
    /// Result.
    pub response: Response,
}

/// Controller-to-host message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Perform a request.
    Call {
        /// Echoed on the reply.
        id: RequestId,
        /// The operation.
        request: Request,
    },
    /// Stop the host as soon as possible, dropping queued work.
    Shutdown,
}
