//! Safe Dial
//!
//! Turn the dial to each number of the combination, alternating direction,
//! and confirm while the dial sits inside the number's band. The dial moves
//! in fixed angular steps while a direction key is held.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tracing::debug;

use super::{borrow_state, Controls, GameWidget, WidgetError, WidgetSetup};
use crate::session::keys::KeyEvent;

const LEFT_KEYS: [&str; 3] = ["ArrowLeft", "a", "A"];
const RIGHT_KEYS: [&str; 3] = ["ArrowRight", "d", "D"];

/// Dial tuning per difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafePreset {
    /// Numbers in the combination.
    pub step_count: usize,
    /// Dial detent (degrees).
    pub step_size_deg: f64,
    /// Confirmable distance from the target number.
    pub band_width: u32,
    /// Distance at which the near-miss hint plays.
    pub tolerance: u32,
    /// Turn rate (degrees per second).
    pub speed: f64,
}

impl SafePreset {
    /// Preset for a difficulty, clamped to `1..=3`.
    pub fn for_difficulty(difficulty: i64) -> Self {
        match difficulty.clamp(1, 3) {
            1 => SafePreset { step_count: 3, step_size_deg: 4.0, band_width: 8, tolerance: 6, speed: 150.0 },
            2 => SafePreset { step_count: 4, step_size_deg: 3.5, band_width: 6, tolerance: 5, speed: 180.0 },
            _ => SafePreset { step_count: 5, step_size_deg: 3.0, band_width: 5, tolerance: 4, speed: 210.0 },
        }
    }
}

/// Turn direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Counter-clockwise; the dial number rises.
    Left,
    /// Clockwise; the dial number falls.
    Right,
}

impl Turn {
    fn label(self) -> &'static str {
        match self {
            Turn::Left => "LEFT",
            Turn::Right => "RIGHT",
        }
    }

    fn flip(self) -> Self {
        match self {
            Turn::Left => Turn::Right,
            Turn::Right => Turn::Left,
        }
    }
}

/// One combination number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialStep {
    /// Target number, `0..100`.
    pub value: u32,
    /// Direction the dial must be turning.
    pub direction: Turn,
}

/// Angle folded into `[0, 360)`.
fn normalize_angle(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Number under the pointer for a dial angle. May round up to 100.
pub fn dial_value(angle_deg: f64) -> u32 {
    ((100.0 - normalize_angle(angle_deg) / 3.6 + 1000.0) % 100.0).round() as u32
}

/// Distance between two dial numbers, the short way round.
fn dial_distance(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b);
    diff.min(100u32.saturating_sub(diff))
}

#[derive(Debug)]
struct SafeState {
    preset: SafePreset,
    steps: Vec<DialStep>,
    current: usize,
    raw_angle: f64,
    angle: f64,
    last_direction: Option<Turn>,
    left: bool,
    right: bool,
    in_band: bool,
    last_tick: Option<f64>,
    active: bool,
}

impl Default for SafeState {
    fn default() -> Self {
        Self {
            preset: SafePreset::for_difficulty(1),
            steps: Vec::new(),
            current: 0,
            raw_angle: 0.0,
            angle: 0.0,
            last_direction: None,
            left: false,
            right: false,
            in_band: false,
            last_tick: None,
            active: false,
        }
    }
}

impl SafeState {
    fn describe(&self, step: &DialStep) -> String {
        format!(
            "STEP {}/{}: TURN {} TO {:02}",
            self.current + 1,
            self.steps.len(),
            step.direction.label(),
            step.value
        )
    }

    fn set_band(&mut self, in_band: bool, controls: &mut Controls<'_>) {
        if self.in_band == in_band {
            return;
        }
        self.in_band = in_band;
        if in_band {
            controls.play_hint(0.12);
        }
    }

    /// Turn for `delta_ms`. Returns true when the dial moved a detent.
    fn rotate(&mut self, delta_ms: f64) -> bool {
        let turn = match (self.left, self.right) {
            (true, false) => Turn::Left,
            (false, true) => Turn::Right,
            _ => return false,
        };
        let sign = if turn == Turn::Left { -1.0 } else { 1.0 };
        self.last_direction = Some(turn);
        self.raw_angle += sign * self.preset.speed * delta_ms / 1000.0;
        if self.raw_angle.abs() > 1440.0 {
            self.raw_angle = normalize_angle(self.raw_angle);
        }
        let step = self.preset.step_size_deg;
        let stepped = (self.raw_angle / step).round() * step;
        if stepped == self.angle {
            return false;
        }
        self.angle = stepped;
        true
    }

    fn evaluate(&mut self, ticked: bool, controls: &mut Controls<'_>) {
        let Some(step) = self.steps.get(self.current).copied() else {
            return;
        };
        let distance = dial_distance(dial_value(self.angle), step.value);
        let in_direction = self.last_direction == Some(step.direction);
        self.set_band(distance <= self.preset.band_width && in_direction, controls);
        if ticked && in_direction && distance <= self.preset.tolerance {
            controls.play_hint(0.08);
        }
    }

    fn confirm(&mut self, controls: &mut Controls<'_>) {
        if !self.active || !self.in_band {
            return;
        }
        let Some(step) = self.steps.get(self.current).copied() else {
            return;
        };
        if self.last_direction != Some(step.direction) {
            return;
        }

        let normalized = normalize_angle(self.angle);
        debug!(step = self.current + 1, angle = normalized, "dial step confirmed");
        self.current += 1;
        self.set_band(false, controls);

        match self.steps.get(self.current) {
            Some(next) => controls.set_status(self.describe(next)),
            None => {
                self.active = false;
                controls.set_status("SAFE CRACKED");
                controls.complete(json!({
                    "code": "safe_clear",
                    "bandWidth": self.preset.band_width,
                    "angle": format!("{normalized:.2}"),
                    "steps": self.steps.len(),
                }));
            }
        }
    }

    fn key_down(&mut self, event: &KeyEvent, controls: &mut Controls<'_>) {
        if event.is_any(&LEFT_KEYS) {
            self.left = true;
        }
        if event.is_any(&RIGHT_KEYS) {
            self.right = true;
        }
        if event.is_space() {
            self.confirm(controls);
        }
    }

    fn key_up(&mut self, event: &KeyEvent) {
        if event.is_any(&LEFT_KEYS) {
            self.left = false;
        }
        if event.is_any(&RIGHT_KEYS) {
            self.right = false;
        }
    }
}

/// Safe dial widget.
#[derive(Default)]
pub struct SafeWidget {
    state: Rc<RefCell<SafeState>>,
}

impl SafeWidget {
    /// Unstarted widget.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameWidget for SafeWidget {
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let preset = SafePreset::for_difficulty(setup.difficulty);
        let mut rng = setup.rng;
        let mut direction = Turn::Left;
        let steps = (0..preset.step_count)
            .map(|_| {
                let step = DialStep { value: rng.next_index(100) as u32, direction };
                direction = direction.flip();
                step
            })
            .collect();

        {
            let mut state = borrow_state(&self.state, "safe")?;
            *state = SafeState { preset, steps, active: true, ..SafeState::default() };
            if let Some(first) = state.steps.first() {
                controls.set_status(state.describe(first));
            }
        }
        controls.set_footnote(controls.translate("foot.safe", "A/D or arrow keys rotate. Space confirms. ESC cancels."));

        let down = Rc::clone(&self.state);
        controls.register_key_down(move |event, controls| {
            borrow_state(&down, "safe")?.key_down(event, controls);
            Ok(())
        });
        let up = Rc::clone(&self.state);
        controls.register_key_up(move |event, _| {
            borrow_state(&up, "safe")?.key_up(event);
            Ok(())
        });

        controls.request_frame();
        Ok(())
    }

    fn on_frame(&mut self, now_ms: f64, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "safe")?;
        if !state.active {
            return Ok(());
        }
        let last = *state.last_tick.get_or_insert(now_ms);
        state.last_tick = Some(now_ms);
        let ticked = state.rotate(now_ms - last);
        state.evaluate(ticked, controls);
        controls.request_frame();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "safe")?;
        state.active = false;
        state.left = false;
        state.right = false;
        state.in_band = false;
        state.last_tick = None;
        Ok(())
    }
}
