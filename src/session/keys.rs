//! Key Handler Registry
//!
//! Two handler sets per session, one for keydown and one for keyup.
//! Every registration gets a fresh handle, so membership is unique by
//! construction; releasing a handle twice is harmless.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::widget::controls::KeyHandler;

/// Which key event a handler listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPhase {
    /// Key pressed.
    Down,
    /// Key released.
    Up,
}

/// A keyboard event forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Logical key value (`"a"`, `"ArrowLeft"`, `" "`, `"Escape"`).
    pub key: String,
    /// Physical key code (`"KeyA"`, `"Space"`), if known.
    #[serde(default)]
    pub code: String,
    /// Whether this keydown is an auto-repeat.
    #[serde(default)]
    pub repeat: bool,
}

impl KeyEvent {
    /// Build a non-repeating event with no physical code.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: String::new(),
            repeat: false,
        }
    }

    /// Mark as auto-repeat.
    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Whether this is the Escape key.
    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }

    /// Whether this is the space bar.
    pub fn is_space(&self) -> bool {
        self.code == "Space" || self.key == " " || self.key == "Spacebar" || self.key == "Space"
    }

    /// Whether the key is one of `keys`.
    pub fn is_any(&self, keys: &[&str]) -> bool {
        keys.contains(&self.key.as_str())
    }
}

/// Handle to a registered key handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyHandle {
    /// Set the handler lives in.
    pub phase: KeyPhase,
    /// Registration id, unique per controller.
    pub id: u64,
}

/// Keydown and keyup handler sets for one session.
#[derive(Default)]
pub struct KeyRegistry {
    down: BTreeMap<u64, KeyHandler>,
    up: BTreeMap<u64, KeyHandler>,
}

impl KeyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, phase: KeyPhase) -> &BTreeMap<u64, KeyHandler> {
        match phase {
            KeyPhase::Down => &self.down,
            KeyPhase::Up => &self.up,
        }
    }

    fn set_mut(&mut self, phase: KeyPhase) -> &mut BTreeMap<u64, KeyHandler> {
        match phase {
            KeyPhase::Down => &mut self.down,
            KeyPhase::Up => &mut self.up,
        }
    }

    /// Add a handler under its handle.
    pub fn insert(&mut self, handle: KeyHandle, handler: KeyHandler) {
        self.set_mut(handle.phase).insert(handle.id, handler);
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn remove(&mut self, handle: KeyHandle) -> bool {
        self.set_mut(handle.phase).remove(&handle.id).is_some()
    }

    /// Whether a handle is still registered.
    pub fn contains(&self, handle: KeyHandle) -> bool {
        self.set(handle.phase).contains_key(&handle.id)
    }

    /// Number of handlers in one set.
    pub fn len(&self, phase: KeyPhase) -> usize {
        self.set(phase).len()
    }

    /// Total handlers across both sets.
    pub fn total(&self) -> usize {
        self.down.len() + self.up.len()
    }

    /// Whether both sets are empty.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.down.clear();
        self.up.clear();
    }

    /// Mutable iteration over one set, for dispatch.
    pub fn handlers_mut(&mut self, phase: KeyPhase) -> impl Iterator<Item = (&u64, &mut KeyHandler)> {
        self.set_mut(phase).iter_mut()
    }
}
