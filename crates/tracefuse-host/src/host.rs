//! The compute host: sole owner of one drawing's fragments and endpoint
//! index.
//!
//! [`ComputeHost`] exposes the operations synchronously for direct use
//! and tests. [`ComputeHost::spawn`] moves it onto a dedicated thread
//! that serves [`HostMessage`]s in arrival order, so decomposition and
//! endpoint scans never block the caller.
//!
//! While a nearest-point scan runs, the host checks its inbox every
//! [`SessionConfig::scan_chunk`] buckets. Newly arrived nearest-point
//! requests are registered with the query component on receipt, which
//! voids the scan in progress: it completes with an empty result, and
//! the newer request is answered in turn.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracefuse_core::nearest::QueryTicket;
use tracefuse_core::{
    Bucket, EndpointFusion, Fragment, FusionOutcome, NearestEndpointQuery, Point, Scale,
    SessionConfig, SpatialEndpointIndex, decompose_path,
};
use web_time::Instant;

use crate::error::HostError;
use crate::protocol::{
    HostMessage, InitPathResponse, NearestPoint, NearestResponse, PathSpec, Reply, RequestId,
    Request, Response,
};

/// Name of the background thread.
pub const THREAD_NAME: &str = "tracefuse-host";

/// One drawing's compute state.
#[derive(Debug)]
pub struct ComputeHost {
    config: SessionConfig,
    scale: Scale,
    fragments: Vec<Fragment>,
    index: SpatialEndpointIndex,
    query: NearestEndpointQuery,
}

/// Channels and thread of a spawned host.
#[derive(Debug)]
pub struct HostHandle {
    pub(crate) sender: Sender<HostMessage>,
    pub(crate) replies: Receiver<Reply>,
    pub(crate) thread: JoinHandle<()>,
}

/// Queued work, one variant per request. Nearest-point requests hold
/// the ticket they were given on receipt.
enum Job {
    Init(RequestId, PathSpec),
    Rescale(RequestId, Scale),
    Find {
        id: RequestId,
        ticket: QueryTicket,
        cursor: Point,
    },
    Release {
        id: RequestId,
        origin: NearestPoint,
        to: Point,
    },
    Render(RequestId),
}

impl ComputeHost {
    /// An empty host.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Trace`] if `config` is invalid.
    pub fn new(config: SessionConfig) -> Result<Self, HostError> {
        config.validate()?;
        Ok(Self {
            config,
            scale: Scale::IDENTITY,
            fragments: Vec::new(),
            index: SpatialEndpointIndex::new(),
            query: NearestEndpointQuery::new(),
        })
    }

    /// Current zoom.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Fragments from the last [`init_path`](Self::init_path).
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The endpoint index.
    #[must_use]
    pub const fn index(&self) -> &SpatialEndpointIndex {
        &self.index
    }

    /// World-space snap radius at the current zoom.
    #[must_use]
    pub fn attach_radius(&self) -> f64 {
        self.config.attach_radius(self.scale)
    }

    /// Clear all state, then decompose `spec` and render its layers.
    pub fn init_path(&mut self, spec: &PathSpec) -> InitPathResponse {
        self.index.clear();
        self.scale = spec.scale;
        self.fragments = decompose_path(&spec.path, spec.transform.as_deref(), &mut self.index);
        tracing::info!(
            fragments = self.fragments.len(),
            buckets = self.index.len(),
            "path loaded"
        );
        InitPathResponse {
            fragments: self.fragments.clone(),
            outline_markup: tracefuse_markup::outline_markup(&self.fragments, self.scale, &self.config),
            hit_overlay_markup: tracefuse_markup::hit_overlay_markup(
                &self.fragments,
                self.scale,
                &self.config,
            ),
            endpoint_marker_markup: self.render_endpoints(),
        }
    }

    /// Change the zoom. The index is untouched.
    pub const fn update_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    /// Nearest bucket to `(x, y)` strictly inside the attach radius,
    /// scanned in one pass.
    pub fn find_nearest_point(&mut self, x: f64, y: f64) -> NearestResponse {
        let radius = self.attach_radius();
        self.query
            .find(&self.index, Point::new(x, y), radius)
            .into()
    }

    /// Release the dragged `origin` bucket at `(x, y)`.
    pub fn update_end_point(&mut self, origin: &NearestPoint, x: f64, y: f64) -> FusionOutcome {
        EndpointFusion::fuse(&mut self.index, &Bucket::from(origin), Point::new(x, y))
    }

    /// Marker layer for the current index at the current zoom.
    #[must_use]
    pub fn render_endpoints(&self) -> String {
        tracefuse_markup::endpoint_marker_markup(&self.index, self.scale, &self.config)
    }

    /// Move the host onto a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Spawn`] if the thread cannot be created.
    pub fn spawn(self) -> Result<HostHandle, HostError> {
        let (sender, inbox) = mpsc::channel();
        let (outbox, replies) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || self.serve(&inbox, &outbox))
            .map_err(|e| HostError::Spawn(e.to_string()))?;
        Ok(HostHandle {
            sender,
            replies,
            thread,
        })
    }

    /// Serve requests until [`HostMessage::Shutdown`] arrives, the inbox
    /// closes with nothing left queued, or the reply channel closes.
    pub fn serve(mut self, inbox: &Receiver<HostMessage>, outbox: &Sender<Reply>) {
        tracing::info!("compute host started");
        let mut backlog = VecDeque::new();
        let mut open = true;
        loop {
            if backlog.is_empty() {
                if !open {
                    break;
                }
                let Ok(message) = inbox.recv() else {
                    break;
                };
                if self.admit(message, &mut backlog).is_break() {
                    break;
                }
            }
            if self.drain(inbox, &mut backlog, &mut open).is_break() {
                break;
            }
            let Some(job) = backlog.pop_front() else {
                continue;
            };
            let ControlFlow::Continue(reply) = self.run(job, inbox, &mut backlog, &mut open) else {
                break;
            };
            if outbox.send(reply).is_err() {
                tracing::debug!("controller gone; stopping");
                break;
            }
        }
        tracing::info!(dropped = backlog.len(), "compute host stopped");
    }

    /// Queue an incoming message. Nearest-point requests enter the query
    /// component right away so that they void any scan in progress.
    fn admit(&mut self, message: HostMessage, backlog: &mut VecDeque<Job>) -> ControlFlow<()> {
        match message {
            HostMessage::Shutdown => return ControlFlow::Break(()),
            HostMessage::Call { id, request } => backlog.push_back(match request {
                Request::InitPath(spec) => Job::Init(id, spec),
                Request::UpdateScale { scale } => Job::Rescale(id, scale),
                Request::FindNearestPoint { x, y } => Job::Find {
                    id,
                    ticket: self.query.enter(),
                    cursor: Point::new(x, y),
                },
                Request::UpdateEndPoint { origin, x, y } => Job::Release {
                    id,
                    origin,
                    to: Point::new(x, y),
                },
                Request::RenderEndpoints => Job::Render(id),
            }),
        }
        ControlFlow::Continue(())
    }

    fn drain(
        &mut self,
        inbox: &Receiver<HostMessage>,
        backlog: &mut VecDeque<Job>,
        open: &mut bool,
    ) -> ControlFlow<()> {
        while *open {
            match inbox.try_recv() {
                Ok(message) => {
                    if self.admit(message, backlog).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => *open = false,
            }
        }
        ControlFlow::Continue(())
    }

    fn run(
        &mut self,
        job: Job,
        inbox: &Receiver<HostMessage>,
        backlog: &mut VecDeque<Job>,
        open: &mut bool,
    ) -> ControlFlow<(), Reply> {
        let started = Instant::now();
        let (id, op, response) = match job {
            Job::Find { id, ticket, cursor } => {
                let mut scan = ticket.scan(cursor, self.attach_radius());
                let result = loop {
                    if let Some(result) = self.query.step(&self.index, &mut scan, self.config.scan_chunk)
                    {
                        break result;
                    }
                    if self.drain(inbox, backlog, open).is_break() {
                        return ControlFlow::Break(());
                    }
                };
                (id, "findNearestPoint", Response::Nearest(result.into()))
            }
            Job::Init(id, spec) => (id, "initPath", Response::InitPath(self.init_path(&spec))),
            Job::Rescale(id, scale) => {
                self.update_scale(scale);
                (id, "updateScale", Response::Ack)
            }
            Job::Release { id, origin, to } => {
                let outcome = self.update_end_point(&origin, to.x, to.y);
                tracing::debug!(?outcome, "endpoint released");
                (id, "updateEndPoint", Response::Ack)
            }
            Job::Render(id) => (
                id,
                "renderEndpoints",
                Response::EndpointMarkup(self.render_endpoints()),
            ),
        };
        tracing::debug!(
            id = id.0,
            op,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "request served"
        );
        ControlFlow::Continue(Reply { id, response })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tracefuse_core::{EndpointRole, FragmentId};

    use super::*;

    const SQUARE: &str = "M 0 0 L 10 0 L 10 10 Z";

    fn host() -> ComputeHost {
        ComputeHost::new(SessionConfig::default()).unwrap()
    }

    fn call(id: u64, request: Request) -> HostMessage {
        HostMessage::Call {
            id: RequestId(id),
            request,
        }
    }

    /// Feed `messages` to a host on the current thread and collect its
    /// replies.
    fn serve_all(host: ComputeHost, messages: Vec<HostMessage>) -> Vec<Reply> {
        let (sender, inbox) = mpsc::channel();
        let (outbox, replies) = mpsc::channel();
        for message in messages {
            sender.send(message).unwrap();
        }
        drop(sender);
        host.serve(&inbox, &outbox);
        drop(outbox);
        replies.iter().collect()
    }

    #[test]
    fn init_path_builds_fragments_and_markup() {
        let mut host = host();
        let response = host.init_path(&PathSpec::new(SQUARE));
        assert_eq!(response.fragments.len(), 3);
        assert_eq!(response.outline_markup.matches("<path").count(), 3);
        assert_eq!(response.hit_overlay_markup.matches("<path").count(), 3);
        assert_eq!(response.endpoint_marker_markup.matches("<circle").count(), 3);
    }

    #[test]
    fn init_path_replaces_previous_state() {
        let mut host = host();
        host.init_path(&PathSpec::new(SQUARE));
        host.init_path(&PathSpec::new("M 100 100 L 200 100"));
        assert_eq!(host.fragments().len(), 1);
        assert_eq!(host.index().len(), 2);
        assert!(host.find_nearest_point(0.0, 0.0).nearest_point.is_none());
    }

    #[test]
    fn nearest_point_in_square() {
        let mut host = host();
        host.init_path(&PathSpec::new(SQUARE));
        let response = host.find_nearest_point(0.5, 0.5);
        let nearest = response.nearest_point.unwrap();
        assert_eq!(nearest.coordinate, [0.0, 0.0]);
        assert_eq!(
            nearest.owners,
            vec![
                (FragmentId(0), EndpointRole::Start),
                (FragmentId(2), EndpointRole::End),
            ],
        );
    }

    #[test]
    fn attach_radius_follows_scale() {
        let mut host = host();
        host.init_path(&PathSpec::new(SQUARE));
        // 6 units away: inside the default radius of 10 at unit zoom...
        assert!(host.find_nearest_point(6.0, 0.0).nearest_point.is_some());
        // ...but outside 10 / 2 = 5 once zoomed in.
        host.update_scale(Scale::new(2.0).unwrap());
        let response = host.find_nearest_point(-6.0, 0.0);
        assert!(response.nearest_point.is_none());
        assert!((response.distance - 5.0).abs() < f64::EPSILON);
        // The index itself is untouched by zoom.
        assert_eq!(host.index().len(), 3);
    }

    #[test]
    fn update_end_point_merges_and_rerenders() {
        let mut host = host();
        host.init_path(&PathSpec::new("M 0 0 L 10 0 M 20 0 L 30 0"));
        let origin = host.find_nearest_point(10.0, 0.0).nearest_point.unwrap();

        let outcome = host.update_end_point(&origin, 20.0, 0.0);

        assert!(matches!(outcome, FusionOutcome::Merged { .. }));
        assert!(host.index().bucket_at(Point::new(10.0, 0.0)).is_none());
        // Target plus the offset bucket: two markers drawn on one spot.
        assert_eq!(host.index().len(), 4);
        assert_eq!(host.render_endpoints().matches("<circle").count(), 4);
    }

    #[test]
    fn served_requests_reply_in_order() {
        let replies = serve_all(
            host(),
            vec![
                call(1, Request::InitPath(PathSpec::new(SQUARE))),
                call(2, Request::UpdateScale {
                    scale: Scale::new(2.0).unwrap(),
                }),
                call(3, Request::RenderEndpoints),
            ],
        );
        let ids: Vec<u64> = replies.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(matches!(replies[0].response, Response::InitPath(_)));
        assert_eq!(replies[1].response, Response::Ack);
        let Response::EndpointMarkup(markup) = &replies[2].response else {
            unreachable!();
        };
        assert!(markup.contains(r#"r="2""#));
    }

    #[test]
    fn newer_nearest_request_voids_the_queued_one() {
        let replies = serve_all(
            host(),
            vec![
                call(1, Request::InitPath(PathSpec::new(SQUARE))),
                call(2, Request::FindNearestPoint { x: 0.5, y: 0.5 }),
                call(3, Request::FindNearestPoint { x: 9.5, y: 9.5 }),
            ],
        );
        let Response::Nearest(older) = &replies[1].response else {
            unreachable!();
        };
        let Response::Nearest(newer) = &replies[2].response else {
            unreachable!();
        };
        // Both requests are answered; the superseded one finds nothing.
        assert!(older.nearest_point.is_none());
        assert_eq!(newer.nearest_point.as_ref().unwrap().coordinate, [10.0, 10.0]);
    }

    #[test]
    fn lookup_queued_behind_a_release_sees_the_fused_index() {
        let origin = NearestPoint {
            coordinate: [10.0, 0.0],
            owners: vec![(FragmentId(0), EndpointRole::End)],
        };
        let replies = serve_all(
            host(),
            vec![
                call(1, Request::InitPath(PathSpec::new("M 0 0 L 10 0 M 20 0 L 30 0"))),
                call(2, Request::UpdateEndPoint {
                    origin,
                    x: 20.0,
                    y: 0.0,
                }),
                call(3, Request::FindNearestPoint { x: 9.0, y: 0.0 }),
                call(4, Request::RenderEndpoints),
            ],
        );
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[1].response, Response::Ack);
        let Response::Nearest(found) = &replies[2].response else {
            unreachable!();
        };
        // (10, 0) moved away, so the closest endpoint is now the origin.
        assert_eq!(found.nearest_point.as_ref().unwrap().coordinate, [0.0, 0.0]);
        let Response::EndpointMarkup(markup) = &replies[3].response else {
            unreachable!();
        };
        assert_eq!(markup.matches("<circle").count(), 4);
    }

    #[test]
    fn shutdown_drops_queued_work() {
        let replies = serve_all(
            host(),
            vec![
                call(1, Request::RenderEndpoints),
                HostMessage::Shutdown,
                call(2, Request::RenderEndpoints),
            ],
        );
        assert!(replies.is_empty());
    }
}
