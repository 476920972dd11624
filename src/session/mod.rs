//! Session Layer
//!
//! Everything about one minigame attempt: the live [`Session`], its key
//! handlers and frame tickets, the countdown clock, and the
//! [`SessionController`] that owns it all.
//!
//! ## Lifecycle
//!
//! ```text
//!   start / inside_open          complete / fail / timeout / escape
//! Idle ───────────────────► Active ─────────────────────────────► Finalizing
//!  ▲                                                                   │
//!  └──────────────────────────── teardown ◄────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod controller;
pub mod detail;
pub mod frame;
pub mod keys;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SessionConfig, TimeWindow};
pub use controller::SessionController;
pub use detail::{Detail, DetailValue};
pub use frame::{FrameId, FrameScheduler, FrameTarget, ScheduledFrame};
pub use keys::{KeyEvent, KeyHandle, KeyPhase, KeyRegistry};
pub use state::{ControllerState, Session, SessionDisposer, SessionId, SessionMode};
