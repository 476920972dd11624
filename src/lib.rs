//! # Minigame Host
//!
//! Headless host for timed skill minigames: seeds each session
//! deterministically, runs one pluggable widget under a countdown, and
//! reports exactly one result with a trace and client proof.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MINIGAME HOST                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── hash.rs     - FNV-1a over UTF-16 code units            │
//! │  └── rng.rs      - Seeded mulberry32 streams                │
//! │                                                             │
//! │  proof/          - Outcome trace and client proof           │
//! │                                                             │
//! │  session/        - One minigame attempt                     │
//! │  ├── controller.rs - Lifecycle, finalize, teardown          │
//! │  ├── keys.rs     - Key handler sets                         │
//! │  ├── frame.rs    - Frame tickets                            │
//! │  └── clock.rs    - Monotonic time source                    │
//! │                                                             │
//! │  widget/         - lockpick, keypad, safe, wire, inside     │
//! │  ui/             - HUD view model, audio cues, locales      │
//! │                                                             │
//! │  network/        - Host protocol and WebSocket endpoint     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Every random choice a widget makes comes from a [`SeededRng`] derived
//! from `seed:game_id:difficulty:salt`. The same seed reproduces the same
//! puzzle on any platform, and [`verify_client_proof`] lets an authority
//! holding the seed check a reported result.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod network;
pub mod proof;
pub mod session;
pub mod ui;
pub mod widget;

// Re-export commonly used types
pub use crate::core::rng::SeededRng;
pub use network::{HostBridge, HostCommand, HostEvent, HostServer, ServerConfig};
pub use proof::{build_client_proof, build_trace, verify_client_proof, Verdict};
pub use session::{SessionConfig, SessionController};
pub use widget::{Controls, GameWidget, WidgetRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
