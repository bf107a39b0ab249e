//! Foreground proxy for one editing session's compute host.
//!
//! [`DrawSessionController`] spawns its [`ComputeHost`] lazily on the
//! first request, tags each request with a fresh [`RequestId`], and keeps
//! a one-shot subscription per request. [`poll`](DrawSessionController::poll)
//! hands ready replies to their subscriptions on the calling thread and
//! tears each subscription down once delivered. It never blocks.
//!
//! Issuing a request does not cancel an earlier one of the same kind:
//! both are answered, and the caller observes whichever reply is
//! delivered last.

use std::collections::HashMap;
use std::sync::mpsc::TryRecvError;

use tracefuse_core::{Scale, SessionConfig};

use crate::error::HostError;
use crate::host::{ComputeHost, HostHandle};
use crate::protocol::{
    HostMessage, InitPathResponse, NearestPoint, NearestResponse, PathSpec, Reply, Request,
    RequestId, Response,
};

/// One-shot receiver for a reply.
enum Subscription {
    InitPath(Box<dyn FnOnce(InitPathResponse)>),
    Nearest(Box<dyn FnOnce(NearestResponse)>),
    EndpointMarkup(Box<dyn FnOnce(String)>),
    Ack,
}

impl Subscription {
    /// Hand `response` to the callback. Returns `false` if the reply kind
    /// does not match what was subscribed for.
    fn deliver(self, response: Response) -> bool {
        match (self, response) {
            (Self::InitPath(callback), Response::InitPath(r)) => callback(r),
            (Self::Nearest(callback), Response::Nearest(r)) => callback(r),
            (Self::EndpointMarkup(callback), Response::EndpointMarkup(r)) => callback(r),
            (Self::Ack, Response::Ack) => {}
            _ => return false,
        }
        true
    }
}

/// Lifecycle of the controller's host.
#[derive(Debug)]
enum HostState {
    /// Not spawned yet.
    Idle,
    Running(HostHandle),
    /// The host thread went away on its own.
    Lost,
    Terminated,
}

/// Per-session proxy to a background [`ComputeHost`].
///
/// Dropping the controller terminates the host.
pub struct DrawSessionController {
    config: SessionConfig,
    state: HostState,
    next_id: u64,
    subscriptions: HashMap<RequestId, Subscription>,
}

impl std::fmt::Debug for DrawSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawSessionController")
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .field("pending", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl DrawSessionController {
    /// A controller whose host will run with `config`. Nothing is spawned
    /// until the first request.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Trace`] if `config` is invalid.
    pub fn new(config: SessionConfig) -> Result<Self, HostError> {
        config.validate()?;
        Ok(Self {
            config,
            state: HostState::Idle,
            next_id: 0,
            subscriptions: HashMap::new(),
        })
    }

    /// Whether the host thread has been spawned and is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(&self.state, HostState::Running(handle) if !handle.thread.is_finished())
    }

    /// Number of requests still waiting for a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.subscriptions.len()
    }

    /// Clear and rebuild the host's state from `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot be reached.
    pub fn init_path(
        &mut self,
        spec: PathSpec,
        on_done: impl FnOnce(InitPathResponse) + 'static,
    ) -> Result<RequestId, HostError> {
        self.request(
            Request::InitPath(spec),
            Subscription::InitPath(Box::new(on_done)),
        )
    }

    /// Change the host's zoom.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot be reached.
    pub fn update_scale(&mut self, scale: Scale) -> Result<RequestId, HostError> {
        self.request(Request::UpdateScale { scale }, Subscription::Ack)
    }

    /// Look up the nearest endpoint to `(x, y)`.
    ///
    /// The reply may be empty if a newer lookup superseded this one.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot be reached.
    pub fn find_nearest_point(
        &mut self,
        x: f64,
        y: f64,
        on_done: impl FnOnce(NearestResponse) + 'static,
    ) -> Result<RequestId, HostError> {
        self.request(
            Request::FindNearestPoint { x, y },
            Subscription::Nearest(Box::new(on_done)),
        )
    }

    /// Release the dragged `origin` endpoint at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot be reached.
    pub fn update_end_point(
        &mut self,
        origin: NearestPoint,
        x: f64,
        y: f64,
    ) -> Result<RequestId, HostError> {
        self.request(Request::UpdateEndPoint { origin, x, y }, Subscription::Ack)
    }

    /// Re-render the endpoint-marker layer.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot be reached.
    pub fn render_endpoints(
        &mut self,
        on_done: impl FnOnce(String) + 'static,
    ) -> Result<RequestId, HostError> {
        self.request(
            Request::RenderEndpoints,
            Subscription::EndpointMarkup(Box::new(on_done)),
        )
    }

    /// Drop the subscription for `id`; its reply will be discarded.
    /// Returns `true` if the request was still pending.
    pub fn unsubscribe(&mut self, id: RequestId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Deliver every reply that is ready. Returns how many callbacks ran.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Disconnected`] if the host has gone away; the
    /// session cannot be recovered. Returns [`HostError::Terminated`]
    /// after [`terminate`](Self::terminate).
    pub fn poll(&mut self) -> Result<usize, HostError> {
        let mut ready = Vec::new();
        let disconnected = match &self.state {
            HostState::Idle => return Ok(0),
            HostState::Lost => return Err(HostError::Disconnected),
            HostState::Terminated => return Err(HostError::Terminated),
            HostState::Running(handle) => loop {
                match handle.replies.try_recv() {
                    Ok(reply) => ready.push(reply),
                    Err(TryRecvError::Empty) => break false,
                    Err(TryRecvError::Disconnected) => break true,
                }
            },
        };

        let mut delivered = 0;
        for reply in ready {
            if self.dispatch(reply) {
                delivered += 1;
            }
        }

        if disconnected {
            self.lose();
            return Err(HostError::Disconnected);
        }
        Ok(delivered)
    }

    /// Dispose of the host. Queued and in-flight requests are dropped
    /// along with their subscriptions. Later requests fail with
    /// [`HostError::Terminated`].
    pub fn terminate(&mut self) {
        if let HostState::Running(handle) = std::mem::replace(&mut self.state, HostState::Terminated)
        {
            // The host may already be gone; either way it is finished.
            let _ = handle.sender.send(HostMessage::Shutdown);
            tracing::info!(dropped = self.subscriptions.len(), "draw session terminated");
        }
        self.subscriptions.clear();
    }

    fn dispatch(&mut self, Reply { id, response }: Reply) -> bool {
        let Some(subscription) = self.subscriptions.remove(&id) else {
            tracing::debug!(id = id.0, "discarding reply with no subscriber");
            return false;
        };
        let delivered = subscription.deliver(response);
        if !delivered {
            tracing::warn!(id = id.0, "reply kind does not match its request");
        }
        delivered
    }

    fn lose(&mut self) {
        tracing::warn!(dropped = self.subscriptions.len(), "compute host disconnected");
        self.state = HostState::Lost;
        self.subscriptions.clear();
    }

    fn host(&mut self) -> Result<&HostHandle, HostError> {
        if matches!(self.state, HostState::Idle) {
            let handle = ComputeHost::new(self.config.clone())?.spawn()?;
            self.state = HostState::Running(handle);
        }
        match &self.state {
            HostState::Running(handle) => Ok(handle),
            HostState::Terminated => Err(HostError::Terminated),
            HostState::Idle | HostState::Lost => Err(HostError::Disconnected),
        }
    }

    fn request(
        &mut self,
        request: Request,
        subscription: Subscription,
    ) -> Result<RequestId, HostError> {
        let id = RequestId(self.next_id);
        let sent = self
            .host()?
            .sender
            .send(HostMessage::Call { id, request })
            .is_ok();
        if !sent {
            self.lose();
            return Err(HostError::Disconnected);
        }
        self.next_id += 1;
        self.subscriptions.insert(id, subscription);
        Ok(id)
    }
}

impl Drop for DrawSessionController {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    /// A controller wired to channels the test controls, standing in for
    /// a host thread that has already exited.
    fn session_over(handle: HostHandle) -> DrawSessionController {
        let mut session = DrawSessionController::new(SessionConfig::default()).unwrap();
        session.state = HostState::Running(handle);
        session
    }

    fn dead_thread() -> thread::JoinHandle<()> {
        let thread = thread::spawn(|| {});
        while !thread.is_finished() {
            thread::yield_now();
        }
        thread
    }

    #[test]
    fn crashed_host_is_fatal_to_the_session() {
        let (sender, inbox) = mpsc::channel();
        let (outbox, replies) = mpsc::channel::<Reply>();
        // The host went away without answering.
        drop(outbox);
        let mut session = session_over(HostHandle {
            sender,
            replies,
            thread: dead_thread(),
        });

        let delivered = Rc::new(Cell::new(false));
        let flag = Rc::clone(&delivered);
        session
            .render_endpoints(move |_| flag.set(true))
            .unwrap();
        assert_eq!(session.pending(), 1);
        assert!(!session.is_running());

        assert_eq!(session.poll(), Err(HostError::Disconnected));
        assert_eq!(session.pending(), 0);
        assert!(!delivered.get());

        // Every later call fails the same way.
        assert_eq!(session.poll(), Err(HostError::Disconnected));
        assert_eq!(
            session.find_nearest_point(0.0, 0.0, |_| {}),
            Err(HostError::Disconnected)
        );
        assert_eq!(session.pending(), 0);
        drop(inbox);
    }

    #[test]
    fn closed_inbox_fails_the_request() {
        let (sender, inbox) = mpsc::channel();
        let (_outbox, replies) = mpsc::channel::<Reply>();
        drop(inbox);
        let mut session = session_over(HostHandle {
            sender,
            replies,
            thread: dead_thread(),
        });

        assert_eq!(
            session.update_scale(Scale::IDENTITY),
            Err(HostError::Disconnected)
        );
        assert_eq!(session.pending(), 0);
        assert_eq!(session.poll(), Err(HostError::Disconnected));
    }

    #[test]
    fn replies_ready_before_the_crash_are_still_delivered() {
        let (sender, _inbox) = mpsc::channel();
        let (outbox, replies) = mpsc::channel();
        let mut session = session_over(HostHandle {
            sender,
            replies,
            thread: dead_thread(),
        });

        let markup = Rc::new(Cell::new(None));
        let sink = Rc::clone(&markup);
        let id = session
            .render_endpoints(move |m| sink.set(Some(m)))
            .unwrap();
        outbox
            .send(Reply {
                id,
                response: Response::EndpointMarkup(String::from("<g/>")),
            })
            .unwrap();
        drop(outbox);

        assert_eq!(session.poll(), Err(HostError::Disconnected));
        assert_eq!(markup.take().as_deref(), Some("<g/>"));
        assert_eq!(session.pending(), 0);
    }
}
