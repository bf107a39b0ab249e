use serde::{Deserialize, Serialize};
use tracefuse_core::TraceError;

/// Errors surfaced by the compute host and its controller.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum HostError {
    /// The background thread could not be started.
    #[error("failed to spawn compute host: {0}")]
    Spawn(String),

    /// The compute host stopped or crashed. The session is lost; build a
    /// new controller.
    #[error("compute host disconnected")]
    Disconnected,

    /// [`terminate`](crate::DrawSessionController::terminate) was called.
    #[error("draw session was terminated")]
    Terminated,

    /// Invalid scale or configuration.
    #[error(transparent)]
    Trace(#[from] TraceError),
}
