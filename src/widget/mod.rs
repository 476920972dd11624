//! Game Widgets
//!
//! One pluggable minigame per variant. A widget is started once per session,
//! talks back only through [`Controls`], and may drive its own loop by
//! requesting frames.
//!
//! ## Variants
//!
//! ```text
//! ┌────────────┬─────────────────────────────────────────────┐
//! │ lockpick   │ time the sweeping pointer into each pin     │
//! │ keypad     │ enter (or repeat) a digit code              │
//! │ safe       │ turn the dial left/right onto each number   │
//! │ wire       │ cut the wires in the shown color order      │
//! │ inside     │ cross the laser room, grab keys, reach exit │
//! └────────────┴─────────────────────────────────────────────┘
//! ```

pub mod controls;
pub mod keypad;
pub mod laser;
pub mod lockpick;
pub mod safe;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::rng::{child_seed, SeededRng};

pub use controls::{Controls, Disposer, KeyHandler};

/// Widget errors. Always logged by the controller, never propagated.
#[derive(Debug, Clone, Error)]
pub enum WidgetError {
    /// Widget state was in use by another callback.
    #[error("widget state busy: {0}")]
    Busy(String),

    /// Configuration could not be used.
    #[error("invalid widget config: {0}")]
    InvalidConfig(String),

    /// Cleanup step failed.
    #[error("cleanup failed: {0}")]
    Cleanup(String),
}

/// Per-session values a widget starts from.
#[derive(Debug, Clone)]
pub struct WidgetSetup {
    /// Difficulty tier (1 = easiest).
    pub difficulty: i64,
    /// Session seed text.
    pub seed: String,
    /// Free-form host configuration (`config` or `params`).
    pub config: Value,
    /// Countdown length (ms).
    pub time_limit_ms: u64,
    /// Display tier label.
    pub tier: String,
    /// The session's `main` stream.
    pub rng: SeededRng,
}

impl WidgetSetup {
    /// Config member as a float, if numeric.
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }

    /// Config member, if present and not null.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }
}

/// What a factory gets to build a widget.
#[derive(Debug, Clone)]
pub struct WidgetContext {
    /// `seed:game_id:difficulty`.
    pub base_seed: String,
}

impl WidgetContext {
    /// Independent stream for `salt`.
    pub fn make_rng(&self, salt: &str) -> SeededRng {
        SeededRng::new(&child_seed(&self.base_seed, salt))
    }
}

/// The widget capability interface.
pub trait GameWidget {
    /// Build state, register input, and kick off any loop.
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError>;

    /// One requested frame. `now_ms` is the frame timestamp.
    fn on_frame(&mut self, _now_ms: f64, _controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        Ok(())
    }

    /// Pointer press, optionally on a named target.
    fn on_pointer(&mut self, _target: Option<&str>, _controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        Ok(())
    }

    /// Halt loops. Called at teardown before `destroy`.
    fn stop(&mut self) -> Result<(), WidgetError> {
        Ok(())
    }

    /// Release everything. Called once at teardown.
    fn destroy(&mut self) -> Result<(), WidgetError> {
        Ok(())
    }
}

/// Builds a widget for one session.
pub type WidgetFactory = Box<dyn Fn(&WidgetContext) -> Box<dyn GameWidget>>;

/// Widget factories by game id.
#[derive(Default)]
pub struct WidgetRegistry {
    factories: BTreeMap<String, WidgetFactory>,
}

impl WidgetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in widget.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("lockpick", |_| Box::new(lockpick::LockpickWidget::new()));
        registry.register("keypad", |_| Box::new(keypad::KeypadWidget::new()));
        registry.register("safe", |_| Box::new(safe::SafeWidget::new()));
        registry.register("wire", |_| Box::new(wire::WireWidget::new()));
        registry.register("inside", |ctx| Box::new(laser::LaserRoomWidget::new(ctx.clone())));
        registry
    }

    /// Register (or replace) a factory. Ids are case-insensitive.
    pub fn register<F>(&mut self, game_id: &str, factory: F)
    where
        F: Fn(&WidgetContext) -> Box<dyn GameWidget> + 'static,
    {
        self.factories.insert(game_id.to_lowercase(), Box::new(factory));
    }

    /// Whether a game id is known.
    pub fn contains(&self, game_id: &str) -> bool {
        self.factories.contains_key(&game_id.to_lowercase())
    }

    /// Build a widget, if the id is known.
    pub fn build(&self, game_id: &str, ctx: &WidgetContext) -> Option<Box<dyn GameWidget>> {
        self.factories.get(&game_id.to_lowercase()).map(|factory| factory(ctx))
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Borrow widget state shared with key handlers.
pub(crate) fn borrow_state<'a, T>(
    state: &'a std::cell::RefCell<T>,
    name: &str,
) -> Result<std::cell::RefMut<'a, T>, WidgetError> {
    state
        .try_borrow_mut()
        .map_err(|_| WidgetError::Busy(name.to_string()))
}
