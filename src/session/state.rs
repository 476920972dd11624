//! Live Session State

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::frame::FrameId;
use crate::session::keys::{KeyHandle, KeyRegistry};
use crate::widget::controls::Disposer;
use crate::widget::GameWidget;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Which host protocol a session reports through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// `minigame:start` entry; reports `minigame:result` with trace and proof.
    Standard,
    /// `inside_open` entry; reports a boolean result or a cancel.
    Inside,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No session.
    Idle,
    /// A session is running.
    Active,
    /// The session's outcome has been fixed and it is being torn down.
    Finalizing,
}

/// Cleanup action run once at teardown.
pub enum SessionDisposer {
    /// Remove a key handler.
    ReleaseKey(KeyHandle),
    /// Widget-supplied cleanup.
    Custom(Disposer),
}

/// One minigame attempt, from start command to teardown.
pub struct Session {
    /// Session identity, compared against frame tickets.
    pub id: SessionId,
    /// Widget variant.
    pub game_id: String,
    /// Difficulty tier (1 = easiest).
    pub difficulty: i64,
    /// Seed text for every stream in this session.
    pub seed: String,
    /// Opaque host signature over the seed, passed through.
    pub seed_signature: String,
    /// Display label only.
    pub tier: String,
    /// Monotonic start time (ms).
    pub started_at: f64,
    /// `started_at + time_limit_ms`.
    pub deadline: f64,
    /// Clamped countdown length (ms).
    pub time_limit_ms: u64,
    /// Set once the outcome is fixed; never cleared.
    pub finalized: bool,
    /// Result protocol.
    pub mode: SessionMode,
    /// Key handler sets.
    pub keys: KeyRegistry,
    /// Cleanup actions, run in order.
    pub disposers: Vec<SessionDisposer>,
    /// Pending countdown frame.
    pub timer_frame: Option<FrameId>,
    /// Pending widget frame.
    pub widget_frame: Option<FrameId>,
    /// Mounted widget.
    pub widget: Box<dyn GameWidget>,
}

impl Session {
    /// Remaining time at `now_ms`, never negative.
    pub fn remaining_ms(&self, now_ms: f64) -> f64 {
        (self.deadline - now_ms).max(0.0)
    }

    /// Remaining fraction of the limit, in `[0, 1]`.
    pub fn ratio(&self, now_ms: f64) -> f64 {
        if self.time_limit_ms == 0 {
            return 0.0;
        }
        (self.remaining_ms(now_ms) / self.time_limit_ms as f64).clamp(0.0, 1.0)
    }

    /// Whole milliseconds since start, never negative.
    pub fn elapsed_ms(&self, now_ms: f64) -> u64 {
        (now_ms - self.started_at).round().max(0.0) as u64
    }
}
