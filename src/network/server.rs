//! WebSocket Host Endpoint
//!
//! The host process connects here, sends [`HostCommand`]s as JSON text
//! frames and receives [`HostEvent`]s plus [`UiUpdate`] mirror frames.
//! Connections are served one at a time; each gets a fresh controller that
//! is closed when the socket goes away.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::bridge::ChannelBridge;
use crate::network::protocol::{HostCommand, HostEvent, UiUpdate};
use crate::session::{SessionConfig, SessionController, SystemClock};
use crate::ui::Hud;
use crate::widget::WidgetRegistry;

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Frame pump rate (Hz).
    pub frame_rate: u32,
    /// Directory holding `{locale}.json` tables.
    pub locale_dir: Option<PathBuf>,
    /// Locale loaded for each connection.
    pub locale: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 30120)),
            frame_rate: 60,
            locale_dir: None,
            locale: "en".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `MINIGAME_*` environment variables.
    ///
    /// Unparseable values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let frame_rate = parse_or(&lookup, "MINIGAME_FRAME_RATE", defaults.frame_rate);
        Self {
            bind_addr: parse_or(&lookup, "MINIGAME_BIND_ADDR", defaults.bind_addr),
            frame_rate: if frame_rate == 0 {
                warn!("MINIGAME_FRAME_RATE must be positive, using {}", defaults.frame_rate);
                defaults.frame_rate
            } else {
                frame_rate
            },
            locale_dir: lookup("MINIGAME_LOCALE_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            locale: lookup("MINIGAME_LOCALE")
                .filter(|locale| !locale.is_empty())
                .unwrap_or(defaults.locale),
        }
    }

    /// Time between frame pumps.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    /// Controller configuration for one connection.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            locale_dir: self.locale_dir.clone(),
            default_locale: self.locale.clone(),
            ..SessionConfig::default()
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {} {:?} ({}), using {}", key, raw, e, default);
            default
        }),
        None => default,
    }
}

/// Host server errors.
#[derive(Debug, thiserror::Error)]
pub enum HostServerError {
    /// Socket bind or accept failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The host-facing WebSocket server.
pub struct HostServer {
    config: ServerConfig,
}

impl HostServer {
    /// Create a server.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve forever.
    pub async fn run(&self) -> Result<(), HostServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("Minigame host listening on {}", self.config.bind_addr);
        self.serve_listener(listener).await
    }

    /// Accept connections from an already-bound listener, one at a time.
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), HostServerError> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Host connected from {}", addr);
                    if let Err(e) = self.serve(stream, addr).await {
                        warn!("Connection {} ended with error: {}", addr, e);
                    }
                    info!("Host {} disconnected", addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Serve one host connection until it closes.
    pub async fn serve(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), HostServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (bridge, mut events) = ChannelBridge::channel();
        let mut controller = SessionController::new(
            self.config.session_config(),
            WidgetRegistry::with_defaults(),
            SystemClock::new(),
            bridge,
        );

        let mut frames = interval(self.config.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_hud: Option<Hud> = None;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match HostCommand::from_json(&text) {
                            Ok(command) => controller.handle_command(command),
                            Err(e) => warn!("Invalid message from {}: {}", addr, e),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Host {} closed the socket", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = frames.tick() => controller.pump_frames(),
            }

            if let Err(e) = flush(&mut ws_sender, &mut events, &mut controller, &mut last_hud).await {
                warn!("Failed to write to {}: {}", addr, e);
                break;
            }
        }

        controller.close();
        Ok(())
    }
}

/// Write host events, then audio cues, then the HUD if it changed.
async fn flush<S>(
    sink: &mut S,
    events: &mut mpsc::UnboundedReceiver<HostEvent>,
    controller: &mut SessionController,
    last_hud: &mut Option<Hud>,
) -> Result<(), HostServerError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Ok(event) = events.try_recv() {
        debug!(action = event.action(), "sending host event");
        sink.send(Message::Text(event.to_json()?)).await?;
    }
    for cue in controller.take_cues() {
        sink.send(Message::Text(UiUpdate::Cue(cue).to_json()?)).await?;
    }
    if last_hud.as_ref() != Some(controller.hud()) {
        let hud = controller.hud().clone();
        sink.send(Message::Text(UiUpdate::Hud(hud.clone()).to_json()?)).await?;
        *last_hud = Some(hud);
    }
    Ok(())
}
