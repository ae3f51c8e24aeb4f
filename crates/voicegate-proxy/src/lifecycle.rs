//! Session state machine and the one-shot shutdown latch.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    /// Created; pumps not yet running.
    Connecting = 0,
    /// Both pumps running.
    Relaying = 1,
    /// Teardown in progress.
    Closing = 2,
    /// Both connections closed.
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Relaying,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Lowercase name used in logs and the sessions listing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Relaying => "relaying",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free lifecycle of one session.
///
/// `Closing` is entered exactly once; the caller that wins [`begin_close`]
/// owns teardown. Entering `Closing` also cancels the shutdown token that
/// the pump loops race against.
///
/// [`begin_close`]: Lifecycle::begin_close
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    shutdown: CancellationToken,
    closed: CancellationToken,
}

impl Lifecycle {
    /// Start in `Connecting` with a fresh shutdown token.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Start in `Connecting`, shutting down when `shutdown` is cancelled.
    pub fn with_token(shutdown: CancellationToken) -> Self {
        Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
            shutdown,
            closed: CancellationToken::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Connecting -> Relaying`. Fails if the session already moved on.
    pub fn start_relaying(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Relaying as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Enter `Closing`. Returns `true` for exactly one caller.
    pub fn begin_close(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= SessionState::Closing as u8 {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.shutdown.cancel();
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// `Closing -> Closed`, once teardown finished. Wakes [`closed`] waiters.
    ///
    /// [`closed`]: Lifecycle::closed
    pub fn finish_close(&self) {
        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
        self.closed.cancel();
    }

    /// Resolves once the session reached `Closed`.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Token cancelled when the session starts closing.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
