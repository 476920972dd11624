//! Laser Room
//!
//! The `inside` variant: walk a top-down room with WASD or the arrow keys,
//! pick up every key item and reach the exit in the far corner without
//! touching a laser.
//!
//! ## Laser Kinds
//!
//! ```text
//! ┌───────────┬───────────────────────────────────────────────┐
//! │ linear    │ full-width beam sweeping along one axis        │
//! │ variable  │ linear, re-rolls its speed every 2 s           │
//! │ pulse     │ linear, 800 ms on / 300 ms off                 │
//! │ rotating  │ arm spinning around the room centre            │
//! │ random    │ short beam roaming the room, turning every 1.5s│
//! └───────────┴───────────────────────────────────────────────┘
//! ```

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use serde_json::json;
use tracing::debug;

use super::{borrow_state, Controls, GameWidget, WidgetContext, WidgetError, WidgetSetup};
use crate::core::rng::SeededRng;
use crate::session::keys::KeyEvent;

const PLAYER_START: (f64, f64) = (40.0, 40.0);
const PLAYER_RADIUS: f64 = 15.0;
/// Gap kept between the player and the walls.
const WALL_MARGIN: f64 = 4.0;
/// Extra reach of every beam beyond the player radius.
const BEAM_REACH: f64 = 3.0;
const ITEM_RADIUS: f64 = 12.0;
/// Exit sits this far in from the bottom-right corner.
const GOAL_INSET: f64 = 50.0;
const GOAL_REACH: f64 = 30.0;
/// Sweeping beams spawn at least this far from the walls.
const SPAWN_MARGIN: f64 = 60.0;
/// Sweeping beams turn around this far from the walls.
const SWEEP_MARGIN: f64 = 30.0;
/// Roaming beams stay this far from the walls.
const ROAM_MARGIN: f64 = 50.0;
/// Rotating arms start this far from the centre.
const ARM_OFFSET: f64 = 10.0;
const VARIABLE_INTERVAL_MS: f64 = 2000.0;
const PULSE_ON_MS: f64 = 800.0;
const PULSE_OFF_MS: f64 = 300.0;
const ROAM_INTERVAL_MS: f64 = 1500.0;

const UP_KEYS: [&str; 3] = ["ArrowUp", "w", "W"];
const DOWN_KEYS: [&str; 3] = ["ArrowDown", "s", "S"];
const LEFT_KEYS: [&str; 3] = ["ArrowLeft", "a", "A"];
const RIGHT_KEYS: [&str; 3] = ["ArrowRight", "d", "D"];

/// How hard an item spawn point is to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTier {
    /// Near the start.
    Easy,
    /// Mid-room.
    Medium,
    /// Deep in the room.
    Hard,
}

/// Laser behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserKind {
    /// Constant-speed sweep.
    Linear,
    /// Spinning arm.
    Rotating,
    /// Sweep with changing speed.
    Variable,
    /// Sweep that blinks.
    Pulse,
    /// Roaming short beam.
    Random,
}

/// Room layout and tuning for one difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomPreset {
    /// Room width.
    pub width: f64,
    /// Room height.
    pub height: f64,
    /// In-room time limit (ms).
    pub time_limit_ms: f64,
    /// Items to collect.
    pub item_count: usize,
    /// Spawn tiers items may use.
    pub spawn_tiers: &'static [SpawnTier],
    /// Lasers in the room.
    pub laser_count: usize,
    /// Kinds lasers are drawn from.
    pub laser_kinds: &'static [LaserKind],
    /// Laser speed range (units per second).
    pub laser_speed: (f64, f64),
    /// Player speed (units per second).
    pub player_speed: f64,
}

impl RoomPreset {
    /// Preset for a difficulty, clamped to `1..=4`.
    pub fn for_difficulty(difficulty: i64) -> Self {
        use LaserKind::*;
        use SpawnTier::*;
        match difficulty.clamp(1, 4) {
            1 => RoomPreset {
                width: 500.0,
                height: 400.0,
                time_limit_ms: 25_000.0,
                item_count: 2,
                spawn_tiers: &[Easy],
                laser_count: 3,
                laser_kinds: &[Linear],
                laser_speed: (80.0, 100.0),
                player_speed: 180.0,
            },
            2 => RoomPreset {
                width: 650.0,
                height: 500.0,
                time_limit_ms: 30_000.0,
                item_count: 3,
                spawn_tiers: &[Easy, Medium],
                laser_count: 5,
                laser_kinds: &[Linear, Rotating, Variable],
                laser_speed: (100.0, 140.0),
                player_speed: 170.0,
            },
            3 => RoomPreset {
                width: 800.0,
                height: 600.0,
                time_limit_ms: 35_000.0,
                item_count: 3,
                spawn_tiers: &[Medium, Hard],
                laser_count: 7,
                laser_kinds: &[Linear, Rotating, Variable, Pulse],
                laser_speed: (120.0, 180.0),
                player_speed: 160.0,
            },
            _ => RoomPreset {
                width: 900.0,
                height: 700.0,
                time_limit_ms: 40_000.0,
                item_count: 4,
                spawn_tiers: &[Easy, Medium, Hard],
                laser_count: 9,
                laser_kinds: &[Linear, Rotating, Variable, Pulse, Random],
                laser_speed: (150.0, 220.0),
                player_speed: 150.0,
            },
        }
    }

    /// Candidate item positions.
    pub fn spawn_points(&self) -> [(f64, f64, SpawnTier); 8] {
        let (w, h) = (self.width, self.height);
        [
            (w * 0.3, h * 0.2, SpawnTier::Easy),
            (w * 0.7, h * 0.2, SpawnTier::Easy),
            (w * 0.2, h * 0.5, SpawnTier::Medium),
            (w * 0.5, h * 0.3, SpawnTier::Medium),
            (w * 0.8, h * 0.5, SpawnTier::Medium),
            (w * 0.3, h * 0.7, SpawnTier::Hard),
            (w * 0.6, h * 0.7, SpawnTier::Hard),
            (w * 0.5, h * 0.6, SpawnTier::Medium),
        ]
    }

    /// Exit position.
    pub fn goal(&self) -> (f64, f64) {
        (self.width - GOAL_INSET, self.height - GOAL_INSET)
    }
}

/// Axis a sweeping beam spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Beam spans the room width and moves vertically.
    Horizontal,
    /// Beam spans the room height and moves horizontally.
    Vertical,
}

/// Extra behaviour on top of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepStyle {
    /// Constant speed.
    Steady,
    /// Speed re-rolled within `[min, max)` every interval.
    Variable {
        /// Lowest speed.
        min: f64,
        /// Highest speed.
        max: f64,
        /// Time of the last re-roll (ms).
        last_change_ms: f64,
    },
    /// Blinks on and off.
    Pulse,
}

/// A laser in the room.
#[derive(Debug, Clone, PartialEq)]
pub enum Laser {
    /// Full-length beam sweeping along one axis.
    Sweep {
        /// Beam orientation.
        axis: Axis,
        /// Beam coordinate on the moving axis.
        pos: f64,
        /// Units per second.
        speed: f64,
        /// `1.0` or `-1.0`.
        direction: f64,
        /// Variant behaviour.
        style: SweepStyle,
        /// Whether the beam is lit.
        visible: bool,
    },
    /// Arm spinning about the room centre.
    Rotating {
        /// Centre.
        center: (f64, f64),
        /// Arm length.
        length: f64,
        /// Current angle (radians).
        angle: f64,
        /// Radians per second.
        angular_speed: f64,
    },
    /// Short beam wandering the room.
    Roaming {
        /// Beam origin.
        origin: (f64, f64),
        /// Heading (radians).
        angle: f64,
        /// Units per second.
        speed: f64,
        /// Beam length.
        length: f64,
        /// Time of the last heading change (ms).
        last_change_ms: f64,
    },
}

impl Laser {
    fn spawn(kind: LaserKind, preset: &RoomPreset, rng: &mut SeededRng, layout: &mut SeededRng) -> Self {
        let (w, h) = (preset.width, preset.height);
        let speed = rng.range(preset.laser_speed.0, preset.laser_speed.1);
        match kind {
            LaserKind::Linear => Self::sweep(SweepStyle::Steady, speed, preset, rng, layout),
            LaserKind::Variable => {
                let style = SweepStyle::Variable {
                    min: speed * 0.6,
                    max: speed * 1.6,
                    last_change_ms: 0.0,
                };
                Self::sweep(style, speed, preset, rng, layout)
            }
            LaserKind::Pulse => Self::sweep(SweepStyle::Pulse, speed, preset, rng, layout),
            LaserKind::Rotating => {
                let radius = w.min(h) * 0.4;
                Laser::Rotating {
                    center: (w / 2.0, h / 2.0),
                    length: radius,
                    angle: rng.range(0.0, TAU),
                    angular_speed: speed * 0.5 / radius,
                }
            }
            LaserKind::Random => Laser::Roaming {
                origin: (rng.range(SPAWN_MARGIN, w - SPAWN_MARGIN), rng.range(SPAWN_MARGIN, h - SPAWN_MARGIN)),
                angle: rng.range(0.0, TAU),
                speed,
                length: w * 0.3,
                last_change_ms: 0.0,
            },
        }
    }

    fn sweep(style: SweepStyle, speed: f64, preset: &RoomPreset, rng: &mut SeededRng, layout: &mut SeededRng) -> Self {
        let axis = if layout.next_f64() < 0.5 { Axis::Horizontal } else { Axis::Vertical };
        let extent = if axis == Axis::Horizontal { preset.height } else { preset.width };
        Laser::Sweep {
            axis,
            pos: rng.range(SPAWN_MARGIN, extent - SPAWN_MARGIN),
            speed,
            direction: 1.0,
            style,
            visible: true,
        }
    }

    fn update(&mut self, delta_ms: f64, now_ms: f64, preset: &RoomPreset, rng: &mut SeededRng) {
        let dt = delta_ms / 1000.0;
        match self {
            Laser::Sweep { axis, pos, speed, direction, style, visible } => {
                match style {
                    SweepStyle::Steady => {}
                    SweepStyle::Variable { min, max, last_change_ms } => {
                        if now_ms - *last_change_ms > VARIABLE_INTERVAL_MS {
                            *speed = rng.range(*min, *max);
                            *last_change_ms = now_ms;
                        }
                    }
                    SweepStyle::Pulse => {
                        *visible = now_ms.rem_euclid(PULSE_ON_MS + PULSE_OFF_MS) < PULSE_ON_MS;
                    }
                }
                let extent = if *axis == Axis::Horizontal { preset.height } else { preset.width };
                *pos += *direction * *speed * dt;
                if *pos <= SWEEP_MARGIN || *pos >= extent - SWEEP_MARGIN {
                    *direction = -*direction;
                }
            }
            Laser::Rotating { angle, angular_speed, .. } => {
                *angle += *angular_speed * dt;
            }
            Laser::Roaming { origin, angle, speed, last_change_ms, .. } => {
                if now_ms - *last_change_ms > ROAM_INTERVAL_MS {
                    *angle = rng.range(0.0, TAU);
                    *last_change_ms = now_ms;
                }
                origin.0 += angle.cos() * *speed * dt;
                origin.1 += angle.sin() * *speed * dt;
                let (min_x, max_x) = (ROAM_MARGIN, preset.width - ROAM_MARGIN);
                let (min_y, max_y) = (ROAM_MARGIN, preset.height - ROAM_MARGIN);
                if origin.0 < min_x || origin.0 > max_x {
                    *angle = std::f64::consts::PI - *angle;
                    origin.0 = origin.0.clamp(min_x, max_x);
                }
                if origin.1 < min_y || origin.1 > max_y {
                    *angle = -*angle;
                    origin.1 = origin.1.clamp(min_y, max_y);
                }
            }
        }
    }

    /// Whether a circle of `radius` at `(x, y)` touches the beam.
    pub fn hits(&self, x: f64, y: f64, radius: f64) -> bool {
        let reach = radius + BEAM_REACH;
        match self {
            Laser::Sweep { visible: false, .. } => false,
            Laser::Sweep { axis: Axis::Horizontal, pos, .. } => (y - pos).abs() < reach,
            Laser::Sweep { axis: Axis::Vertical, pos, .. } => (x - pos).abs() < reach,
            Laser::Rotating { center, length, angle, .. } => {
                let (cos, sin) = (angle.cos(), angle.sin());
                let start = (center.0 + cos * ARM_OFFSET, center.1 + sin * ARM_OFFSET);
                let end = (center.0 + cos * (ARM_OFFSET + length), center.1 + sin * (ARM_OFFSET + length));
                distance_to_segment((x, y), start, end) < reach
            }
            Laser::Roaming { origin, angle, length, .. } => {
                let end = (origin.0 + angle.cos() * length, origin.1 + angle.sin() * length);
                distance_to_segment((x, y), *origin, end) < reach
            }
        }
    }
}

/// Distance from point `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (cx, cy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = cx * cx + cy * cy;
    let t = if len_sq == 0.0 {
        -1.0
    } else {
        ((p.0 - a.0) * cx + (p.1 - a.1) * cy) / len_sq
    };
    let nearest = if t < 0.0 {
        a
    } else if t > 1.0 {
        b
    } else {
        (a.0 + t * cx, a.1 + t * cy)
    };
    (p.0 - nearest.0).hypot(p.1 - nearest.1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Item {
    x: f64,
    y: f64,
    collected: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Held {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl Held {
    fn apply(&mut self, event: &KeyEvent, pressed: bool) {
        if event.is_any(&UP_KEYS) {
            self.up = pressed;
        }
        if event.is_any(&DOWN_KEYS) {
            self.down = pressed;
        }
        if event.is_any(&LEFT_KEYS) {
            self.left = pressed;
        }
        if event.is_any(&RIGHT_KEYS) {
            self.right = pressed;
        }
    }

    /// Unit-length heading, or zero.
    fn heading(&self) -> (f64, f64) {
        let dx = f64::from(i8::from(self.right) - i8::from(self.left));
        let dy = f64::from(i8::from(self.down) - i8::from(self.up));
        if dx != 0.0 && dy != 0.0 {
            let magnitude = dx.hypot(dy);
            return (dx / magnitude, dy / magnitude);
        }
        (dx, dy)
    }
}

struct RoomState {
    preset: RoomPreset,
    rng: SeededRng,
    player: (f64, f64),
    held: Held,
    lasers: Vec<Laser>,
    items: Vec<Item>,
    collected: usize,
    started_at: f64,
    last_frame: f64,
    running: bool,
}

impl RoomState {
    fn tick(&mut self, now_ms: f64, controls: &mut Controls<'_>) {
        let delta = now_ms - self.last_frame;
        self.last_frame = now_ms;
        let remaining = self.preset.time_limit_ms - (now_ms - self.started_at);

        if remaining <= 0.0 {
            self.running = false;
            controls.set_status("TIME OUT");
            controls.play_hint(0.8);
            controls.fail(json!({
                "code": "time_out",
                "reason": "time_out",
                "itemsCollected": self.collected,
            }));
            return;
        }

        self.move_player(delta);
        let preset = self.preset;
        for laser in &mut self.lasers {
            laser.update(delta, now_ms, &preset, &mut self.rng);
        }

        let (x, y) = self.player;
        if self.lasers.iter().any(|laser| laser.hits(x, y, PLAYER_RADIUS)) {
            self.running = false;
            debug!(x, y, items = self.collected, "laser hit");
            controls.play_hint(0.8);
            controls.set_status("SECURITY BREACH");
            controls.fail(json!({
                "code": "laser_hit",
                "reason": "laser_hit",
                "itemsCollected": self.collected,
            }));
            return;
        }

        self.collect_items(controls);

        if self.at_goal() {
            self.running = false;
            controls.set_status("GAME SUCCESS");
            controls.play_hint(0.3);
            controls.complete(json!({
                "code": "laser_grid_clear",
                "timeRemaining": remaining.max(0.0).round() as u64,
                "itemsCollected": self.collected,
                "perfectRun": true,
            }));
            return;
        }

        controls.request_frame();
    }

    fn move_player(&mut self, delta_ms: f64) {
        let (dx, dy) = self.held.heading();
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let step = self.preset.player_speed * delta_ms / 1000.0;
        let low = PLAYER_RADIUS + WALL_MARGIN;
        self.player.0 = (self.player.0 + dx * step).clamp(low, self.preset.width - low);
        self.player.1 = (self.player.1 + dy * step).clamp(low, self.preset.height - low);
    }

    fn collect_items(&mut self, controls: &mut Controls<'_>) {
        let (x, y) = self.player;
        for item in self.items.iter_mut().filter(|item| !item.collected) {
            if (x - item.x).hypot(y - item.y) < PLAYER_RADIUS + ITEM_RADIUS {
                item.collected = true;
                self.collected += 1;
                controls.play_hint(0.3);
                if self.collected >= self.preset.item_count {
                    controls.set_status("REACH THE EXIT");
                }
            }
        }
    }

    fn at_goal(&self) -> bool {
        if self.collected < self.preset.item_count {
            return false;
        }
        let (gx, gy) = self.preset.goal();
        (self.player.0 - gx).hypot(self.player.1 - gy) < PLAYER_RADIUS + GOAL_REACH
    }
}

/// Laser room widget.
pub struct LaserRoomWidget {
    ctx: WidgetContext,
    state: Option<Rc<RefCell<RoomState>>>,
}

impl LaserRoomWidget {
    /// Unstarted widget. Beam orientations come from the context's
    /// `lasers` stream.
    pub fn new(ctx: WidgetContext) -> Self {
        Self { ctx, state: None }
    }

    fn shared(&self) -> Result<&Rc<RefCell<RoomState>>, WidgetError> {
        self.state
            .as_ref()
            .ok_or_else(|| WidgetError::Busy("laser room not started".to_string()))
    }
}

impl GameWidget for LaserRoomWidget {
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let preset = RoomPreset::for_difficulty(setup.difficulty);
        let mut rng = setup.rng;
        let mut layout = self.ctx.make_rng("lasers");

        let mut candidates: Vec<(f64, f64)> = preset
            .spawn_points()
            .iter()
            .filter(|(_, _, tier)| preset.spawn_tiers.contains(tier))
            .map(|(x, y, _)| (*x, *y))
            .collect();
        let mut items = Vec::with_capacity(preset.item_count);
        while items.len() < preset.item_count && !candidates.is_empty() {
            let (x, y) = candidates.remove(rng.next_index(candidates.len()));
            items.push(Item { x, y, collected: false });
        }

        let lasers = (0..preset.laser_count)
            .map(|_| {
                let kind = preset.laser_kinds[rng.next_index(preset.laser_kinds.len())];
                Laser::spawn(kind, &preset, &mut rng, &mut layout)
            })
            .collect();

        let now = controls.now_ms();
        let state = Rc::new(RefCell::new(RoomState {
            preset,
            rng,
            player: PLAYER_START,
            held: Held::default(),
            lasers,
            items,
            collected: 0,
            started_at: now,
            last_frame: now,
            running: true,
        }));

        controls.set_status("COLLECT ALL KEYS");
        controls.set_footnote(controls.translate("foot.laser", "WASD or Arrow Keys to move | ESC to cancel"));
        controls.play_hint(0.18);

        let down = Rc::clone(&state);
        controls.register_key_down(move |event, _| {
            borrow_state(&down, "laser room")?.held.apply(event, true);
            Ok(())
        });
        let up = Rc::clone(&state);
        controls.register_key_up(move |event, _| {
            borrow_state(&up, "laser room")?.held.apply(event, false);
            Ok(())
        });

        self.state = Some(state);
        controls.request_frame();
        Ok(())
    }

    fn on_frame(&mut self, now_ms: f64, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let mut state = borrow_state(self.shared()?, "laser room")?;
        if state.running {
            state.tick(now_ms, controls);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WidgetError> {
        if let Some(shared) = &self.state {
            let mut state = borrow_state(shared, "laser room")?;
            state.running = false;
            state.held = Held::default();
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), WidgetError> {
        self.state = None;
        Ok(())
    }
}
