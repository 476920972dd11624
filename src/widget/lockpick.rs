//! Lockpick
//!
//! A pointer sweeps back and forth along a track. Each pin owns a window on
//! the track; setting the pin while the pointer is inside the window clears
//! it. A miss knocks the pointer back and reverses its sweep.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tracing::debug;

use super::{borrow_state, Controls, GameWidget, WidgetError, WidgetSetup};

/// Narrowest allowed pin window (track fraction).
const MIN_WIDTH: f64 = 0.08;
/// Widest allowed pin window (track fraction).
const MAX_WIDTH: f64 = 0.32;
/// Windows never start closer to the track edge than this.
const MIN_WINDOW_START: f64 = 0.04;
/// How far a miss knocks the pointer back.
const MISS_KNOCKBACK: f64 = 0.12;

/// One pin's target window on the track, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinWindow {
    /// Left edge.
    pub start: f64,
    /// Right edge.
    pub end: f64,
}

impl PinWindow {
    /// Whether `pos` is inside the window (edges included).
    pub fn contains(&self, pos: f64) -> bool {
        pos >= self.start && pos <= self.end
    }
}

#[derive(Debug, Default)]
struct LockState {
    windows: Vec<PinWindow>,
    current: usize,
    attempts: u32,
    pointer: f64,
    direction: f64,
    speed: f64,
    last_tick: Option<f64>,
    active: bool,
}

impl LockState {
    fn pin_label(&self) -> String {
        format!("PIN {} / {}", self.current + 1, self.windows.len())
    }

    fn attempt(&mut self, controls: &mut Controls<'_>) {
        if !self.active {
            return;
        }
        self.attempts += 1;
        let Some(window) = self.windows.get(self.current).copied() else {
            return;
        };

        if !window.contains(self.pointer) {
            controls.set_status("PIN MISSED - RESETTING");
            controls.play_hint(0.25);
            let knock = if self.direction > 0.0 { -MISS_KNOCKBACK } else { MISS_KNOCKBACK };
            self.pointer = (self.pointer + knock).clamp(0.0, 1.0);
            self.direction = -self.direction;
            return;
        }

        self.current += 1;
        if self.current < self.windows.len() {
            controls.set_status(self.pin_label());
            return;
        }

        self.active = false;
        debug!(attempts = self.attempts, pins = self.windows.len(), "cylinder unlocked");
        controls.set_status("CYLINDER UNLOCKED");
        controls.complete(json!({
            "code": "lockpick_clear",
            "attempts": self.attempts,
            "pins": self.windows.len(),
        }));
    }

    /// Move the pointer to `now_ms`, bouncing at both ends.
    fn advance(&mut self, now_ms: f64) {
        let last = *self.last_tick.get_or_insert(now_ms);
        let delta = now_ms - last;
        self.last_tick = Some(now_ms);

        self.pointer += delta * self.speed * self.direction;
        if self.pointer >= 1.0 {
            self.pointer = 1.0;
            self.direction = -1.0;
        } else if self.pointer <= 0.0 {
            self.pointer = 0.0;
            self.direction = 1.0;
        }
    }
}

/// Lockpick widget.
#[derive(Default)]
pub struct LockpickWidget {
    state: Rc<RefCell<LockState>>,
}

impl LockpickWidget {
    /// Unstarted widget.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameWidget for LockpickWidget {
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let hard = setup.difficulty >= 2;
        let pin_count = setup
            .config_f64("pinCount")
            .unwrap_or(if hard { 6.0 } else { 4.0 })
            .round()
            .clamp(3.0, 8.0) as usize;
        let width = setup
            .config_f64("windowWidth")
            .unwrap_or(if hard { 0.16 } else { 0.22 })
            .clamp(MIN_WIDTH, MAX_WIDTH);

        let mut rng = setup.rng;
        let pointer = rng.next_f64().clamp(0.0, 1.0);
        let spacing = 1.0 - width;
        let windows = (0..pin_count)
            .map(|_| {
                let start = (rng.next_f64() * spacing).clamp(MIN_WINDOW_START, spacing);
                let end = (start + width).clamp(width, 1.0);
                PinWindow { start, end }
            })
            .collect();

        {
            let mut state = borrow_state(&self.state, "lockpick")?;
            *state = LockState {
                windows,
                pointer,
                direction: if pointer > 0.5 { -1.0 } else { 1.0 },
                speed: if hard { 0.0012 } else { 0.0009 },
                active: true,
                ..LockState::default()
            };
            controls.set_status(state.pin_label());
        }

        let shared = Rc::clone(&self.state);
        controls.register_key_down(move |event, controls| {
            if event.is_space() {
                borrow_state(&shared, "lockpick")?.attempt(controls);
            }
            Ok(())
        });

        controls.set_footnote(controls.translate("foot.lockpick", "SPACE or CLICK to set the pin. ESC to exit"));
        controls.request_frame();
        Ok(())
    }

    fn on_frame(&mut self, now_ms: f64, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "lockpick")?;
        if !state.active {
            return Ok(());
        }
        state.advance(now_ms);
        controls.request_frame();
        Ok(())
    }

    fn on_pointer(&mut self, target: Option<&str>, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        if matches!(target, None | Some("track")) {
            borrow_state(&self.state, "lockpick")?.attempt(controls);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "lockpick")?;
        state.active = false;
        state.last_tick = None;
        Ok(())
    }
}
