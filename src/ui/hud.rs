//! HUD View Model

use serde::{Deserialize, Serialize};

/// Overlay tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Green acknowledgement.
    Success,
    /// Red acknowledgement.
    Danger,
}

/// Transient result overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Message text.
    pub message: String,
    /// Visual tone.
    pub tone: Tone,
    /// Monotonic time (ms) at which the overlay hides itself.
    pub hide_at_ms: f64,
}

/// Countdown display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerDisplay {
    /// Remaining time (ms), never negative.
    pub remaining_ms: f64,
    /// Fill ratio in `[0, 1]`.
    pub ratio: f64,
}

impl Default for TimerDisplay {
    fn default() -> Self {
        Self { remaining_ms: 0.0, ratio: 1.0 }
    }
}

impl TimerDisplay {
    /// Build a display, clamping both values.
    pub fn new(remaining_ms: f64, ratio: f64) -> Self {
        Self {
            remaining_ms: remaining_ms.max(0.0),
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    /// Seconds with one decimal, e.g. `20.0`.
    ///
    /// Exact ties round up (`0.25` s shows `0.3`); everything else rounds to
    /// the nearest tenth of the stored value.
    pub fn label(&self) -> String {
        let secs = self.remaining_ms / 1000.0;
        let halves = (secs * 20.0).round();
        let exact_tie = halves % 2.0 == 1.0 && secs.mul_add(20.0, -halves) == 0.0;
        if exact_tie {
            return format!("{:.1}", (halves + 1.0) / 20.0);
        }
        format!("{:.1}", secs)
    }
}

/// Sound requested by the controller or a widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    /// Session passed.
    Success,
    /// Session failed or was cancelled.
    Fail,
    /// Short widget feedback tone.
    Hint {
        /// Loudness/pitch hint in `[0, 1]`.
        intensity: f32,
    },
}

/// Everything the overlay shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hud {
    /// Whether the overlay app is shown at all.
    pub visible: bool,
    /// Tier badge.
    pub tier: String,
    /// Game title.
    pub title: String,
    /// Status line.
    pub status: String,
    /// Footnote line.
    pub footnote: String,
    /// Countdown.
    pub timer: TimerDisplay,
    /// Result overlay, when shown.
    pub overlay: Option<Overlay>,
    /// Focus-lost indicator.
    pub focus_lost: bool,
    /// Game currently mounted in the game root, if any.
    pub mounted: Option<String>,
}

impl Default for Hud {
    fn default() -> Self {
        Self::idle()
    }
}

impl Hud {
    /// The idle screen shown between sessions.
    pub fn idle() -> Self {
        Self {
            visible: false,
            tier: String::new(),
            title: "MINIGAME READY".to_string(),
            status: "WAITING FOR SIGNAL".to_string(),
            footnote: "Stand by for server instructions".to_string(),
            timer: TimerDisplay::new(0.0, 1.0),
            overlay: None,
            focus_lost: false,
            mounted: None,
        }
    }

    /// Reset labels, timer, overlay and game root to the idle screen.
    ///
    /// Visibility and focus state are left alone.
    pub fn render_idle(&mut self) {
        let idle = Self::idle();
        self.tier = idle.tier;
        self.title = idle.title;
        self.status = idle.status;
        self.footnote = idle.footnote;
        self.timer = idle.timer;
        self.overlay = None;
        self.mounted = None;
    }

    /// Update the countdown.
    pub fn set_timer(&mut self, remaining_ms: f64, ratio: f64) {
        self.timer = TimerDisplay::new(remaining_ms, ratio);
    }

    /// Show the overlay until `now_ms + timeout_ms`, replacing any current one.
    pub fn show_overlay(&mut self, message: impl Into<String>, tone: Tone, now_ms: f64, timeout_ms: f64) {
        self.overlay = Some(Overlay {
            message: message.into(),
            tone,
            hide_at_ms: now_ms + timeout_ms,
        });
    }

    /// Hide the overlay.
    pub fn hide_overlay(&mut self) {
        self.overlay = None;
    }

    /// Hide the overlay once its time is up. Returns true if it was hidden.
    pub fn expire_overlay(&mut self, now_ms: f64) -> bool {
        match &self.overlay {
            Some(overlay) if now_ms >= overlay.hide_at_ms => {
                self.overlay = None;
                true
            }
            _ => false,
        }
    }
}
