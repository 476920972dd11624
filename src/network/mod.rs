//! Network Layer
//!
//! Everything between the controller and the host process: the JSON
//! protocol, the fire-and-forget result bridge, and the WebSocket endpoint.
//! Nothing in here decides a session outcome.

pub mod bridge;
pub mod protocol;
pub mod server;

pub use bridge::{ChannelBridge, HostBridge, RecordingBridge};
pub use protocol::{
    HostCommand, HostEvent, InsideCancel, InsideFinish, InsidePayload, MinigameResult, StartRequest,
    UiUpdate,
};
pub use server::{HostServer, HostServerError, ServerConfig};
