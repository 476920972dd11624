//! Headless UI Surface
//!
//! The controller never touches a real display. It writes into a [`Hud`]
//! view model that a front end mirrors, and records [`AudioCue`]s instead of
//! synthesizing sound.

pub mod hud;
pub mod locale;

pub use hud::{AudioCue, Hud, Overlay, TimerDisplay, Tone};
pub use locale::{LocaleError, Translations};
