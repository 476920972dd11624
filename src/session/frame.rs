//! Cooperative Frame Scheduler
//!
//! Stand-in for the display's "next frame" callback. A request is a ticket
//! tagged with the session that asked for it; the controller drains all
//! pending tickets once per pump and drops any whose session is no longer
//! the live one.

use std::collections::BTreeMap;

use crate::session::state::SessionId;

/// Frame request identifier.
pub type FrameId = u64;

/// Who asked for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    /// The session countdown.
    Countdown,
    /// The mounted widget's own loop.
    Widget,
}

/// A pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFrame {
    /// Request id.
    pub id: FrameId,
    /// Session that requested the frame.
    pub session: SessionId,
    /// Callback to run.
    pub target: FrameTarget,
}

/// Pending frame requests.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: FrameId,
    pending: BTreeMap<FrameId, ScheduledFrame>,
}

impl FrameScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a frame for the next pump.
    pub fn request(&mut self, session: SessionId, target: FrameTarget) -> FrameId {
        self.next_id += 1;
        let id = self.next_id;
        self.pending.insert(id, ScheduledFrame { id, session, target });
        id
    }

    /// Cancel a pending request. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: FrameId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Cancel every request made by a session.
    pub fn cancel_session(&mut self, session: SessionId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, frame| frame.session != session);
        before - self.pending.len()
    }

    /// Take every pending request, in request order.
    ///
    /// Requests made while the drained frames run land in the next batch.
    pub fn drain(&mut self) -> Vec<ScheduledFrame> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    /// Peek at pending requests.
    pub fn pending(&self) -> impl Iterator<Item = &ScheduledFrame> {
        self.pending.values()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
