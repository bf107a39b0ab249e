//! tracefuse-host: Background compute host for one drawing session.
//!
//! [`ComputeHost`] owns a drawing's fragments, endpoint index,
//! nearest-endpoint query, and zoom, and runs on its own thread so that
//! decomposing large artwork or scanning many endpoints never blocks the
//! interactive surface. [`DrawSessionController`] is the foreground side:
//! it spawns the host on first use, turns each operation into a request
//! with a one-shot subscription, and delivers replies from
//! [`poll`](DrawSessionController::poll).
//!
//! Exactly one host exists per controller; opening another drawing means
//! building another controller. A lost host is fatal to its session.
//!
//! # Example
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tracefuse_core::SessionConfig;
//! use tracefuse_host::{DrawSessionController, PathSpec};
//!
//! let mut session = DrawSessionController::new(SessionConfig::default())?;
//! let loaded = Rc::new(RefCell::new(None));
//! let sink = Rc::clone(&loaded);
//! session.init_path(PathSpec::new("M 0 0 L 10 0 L 10 10 Z"), move |response| {
//!     *sink.borrow_mut() = Some(response);
//! })?;
//! while loaded.borrow().is_none() {
//!     session.poll()?;
//! }
//! session.terminate();
//! # Ok::<(), tracefuse_host::HostError>(())
//! ```

pub mod controller;
pub mod error;
pub mod host;
pub mod protocol;

pub use controller::DrawSessionController;
pub use error::HostError;
pub use host::{ComputeHost, HostHandle};
pub use protocol::{
    HostMessage, InitPathResponse, NearestPoint, NearestResponse, PathSpec, Reply, Request,
    RequestId, Response,
};
