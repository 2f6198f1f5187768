//! One-shot readiness gate awaited by every query and event entry point.

use crate::errors::SearchError;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
enum GateState {
    Pending,
    Ready,
    Failed(String),
}

/// Settled exactly once; later settle attempts are ignored.
///
/// Waiters observe the settled outcome forever after: a failed gate rejects
/// every call with the same reason until the process restarts.
#[derive(Debug)]
pub struct ReadinessGate {
    state: watch::Sender<GateState>,
}

impl ReadinessGate {
    /// A pending gate.
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Pending);
        Self { state }
    }

    /// Mark the gate ready. Returns `false` if it was already settled.
    pub fn resolve(&self) -> bool {
        self.settle(GateState::Ready)
    }

    /// Fail the gate permanently. Returns `false` if it was already settled.
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.settle(GateState::Failed(reason.into()))
    }

    fn settle(&self, outcome: GateState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::Pending {
                *state = outcome;
                true
            } else {
                false
            }
        })
    }

    /// Whether the gate resolved.
    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == GateState::Ready
    }

    /// Whether the gate resolved or failed.
    pub fn is_settled(&self) -> bool {
        *self.state.borrow() != GateState::Pending
    }

    /// Wait until the gate settles.
    pub async fn wait(&self) -> Result<(), SearchError> {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|state| *state != GateState::Pending)
            .await
            .map_err(|_| SearchError::NotReady {
                reason: "readiness gate closed before settling".to_string(),
            })?
            .clone();

        match settled {
            GateState::Ready => Ok(()),
            GateState::Failed(reason) => Err(SearchError::NotReady { reason }),
            GateState::Pending => Err(SearchError::NotReady {
                reason: "readiness gate is still pending".to_string(),
            }),
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
