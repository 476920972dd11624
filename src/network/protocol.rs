//! Protocol Messages
//!
//! JSON messages exchanged with the host process. Inbound commands are
//! tagged by `action`; outbound events carry `action` plus a `body`, the
//! same shape as the host's NUI callback (action = callback name, body =
//! JSON payload).
//!
//! Inbound fields are deliberately loose (`serde_json::Value`) because the
//! host sends numbers as strings, omits fields, or sends `null`; the
//! accessors below apply the defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proof::Verdict;
use crate::session::detail::Detail;
use crate::session::keys::KeyEvent;
use crate::ui::{AudioCue, Hud};

// =============================================================================
// HOST -> CONTROLLER
// =============================================================================

/// Commands from the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum HostCommand {
    /// Start a standard-mode session.
    #[serde(rename = "minigame:start")]
    Start(StartRequest),

    /// Fail the current session (or cancel it, in inside mode on escape).
    #[serde(rename = "minigame:stop")]
    Stop {
        /// Failure code; defaults to `server`.
        #[serde(default)]
        reason: Option<String>,
    },

    /// Hide the overlay and drop any session without reporting.
    #[serde(rename = "minigame:close")]
    Close,

    /// Start an inside-mode session.
    #[serde(rename = "inside_open")]
    InsideOpen {
        /// Session parameters.
        #[serde(default)]
        payload: InsidePayload,
    },

    /// Same as `minigame:close`.
    #[serde(rename = "inside_close")]
    InsideClose,

    /// Switch translation table.
    #[serde(rename = "minigame:set-locale")]
    SetLocale {
        /// Locale name, e.g. `en`.
        #[serde(default)]
        locale: Option<String>,
    },

    /// Key pressed.
    #[serde(rename = "input:keydown")]
    KeyDown(KeyEvent),

    /// Key released.
    #[serde(rename = "input:keyup")]
    KeyUp(KeyEvent),

    /// Overlay window lost focus.
    #[serde(rename = "input:blur")]
    Blur,

    /// Overlay window regained focus.
    #[serde(rename = "input:focus")]
    Focus,

    /// Pointer pressed, optionally on a named widget target.
    #[serde(rename = "input:pointer")]
    Pointer {
        /// Widget target name (`"red"`, `"track"`, `"7"`).
        #[serde(default)]
        target: Option<String>,
    },

    /// Anything else. Ignored.
    #[serde(other)]
    Unknown,
}

impl HostCommand {
    /// Parse a JSON text frame.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// `minigame:start` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartRequest {
    /// Widget variant.
    pub game_id: Option<String>,
    /// Difficulty; number or numeric string, default 1.
    pub difficulty: Option<Value>,
    /// Countdown length in ms, clamped by the controller.
    pub time_limit_ms: Option<Value>,
    /// Tier label; inferred from difficulty when not a string.
    pub tier: Option<Value>,
    /// Seed text.
    pub seed: Option<Value>,
    /// Host signature over the seed.
    #[serde(alias = "seed_signature")]
    pub seed_signature: Option<Value>,
    /// Widget configuration.
    #[serde(alias = "payload")]
    pub config: Option<Value>,
}

impl StartRequest {
    /// Lower-cased game id, empty when absent.
    pub fn game_id(&self) -> String {
        self.seed_game_id().to_lowercase()
    }

    /// Game id exactly as sent; seeds are derived from this spelling.
    pub fn seed_game_id(&self) -> &str {
        self.game_id.as_deref().unwrap_or_default()
    }

    /// Difficulty, defaulting to 1 for missing, zero or non-numeric values.
    pub fn difficulty(&self) -> i64 {
        normalize_difficulty(self.difficulty.as_ref())
    }

    /// Requested limit; `None` when absent so the default applies.
    pub fn time_limit_ms(&self) -> Option<f64> {
        requested_limit(self.time_limit_ms.as_ref())
    }

    /// Tier label, if sent as a string.
    pub fn tier(&self) -> Option<String> {
        self.tier.as_ref().and_then(Value::as_str).map(str::to_string)
    }

    /// Seed text; empty when absent or falsy.
    pub fn seed(&self) -> String {
        value_to_text(self.seed.as_ref())
    }

    /// Seed signature; empty when absent or falsy.
    pub fn seed_signature(&self) -> String {
        value_to_text(self.seed_signature.as_ref())
    }

    /// Widget configuration; empty object when absent.
    pub fn config(&self) -> Value {
        match &self.config {
            Some(value) if !value.is_null() => value.clone(),
            _ => Value::Object(Default::default()),
        }
    }
}

/// `inside_open` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsidePayload {
    /// Requested widget; falls back to `inside`.
    pub game_id: Option<String>,
    /// Difficulty label (`EASY`, `NORMAL`, `HARD`, `EXPERT`).
    pub difficulty: Option<Value>,
    /// Widget parameters; also carries `timeLimitMs` / `timeLimitSec`.
    pub params: Option<Value>,
    /// Tier label; defaults to the difficulty label.
    pub tier: Option<Value>,
    /// Title override.
    pub title: Option<String>,
    /// Status override.
    pub subtitle: Option<String>,
    /// Footnote override.
    pub footnote: Option<String>,
    /// Seed text; generated when absent.
    pub seed: Option<Value>,
}

impl InsidePayload {
    /// Lower-cased requested game id.
    pub fn game_id(&self) -> String {
        self.game_id.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Upper-cased difficulty label, `EASY` when not a string.
    pub fn difficulty_label(&self) -> String {
        self.difficulty
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_uppercase)
            .unwrap_or_else(|| "EASY".to_string())
    }

    /// Numeric tier for the difficulty label.
    pub fn difficulty(&self) -> i64 {
        match self.difficulty_label().as_str() {
            "EXPERT" => 4,
            "HARD" => 3,
            "NORMAL" => 2,
            _ => 1,
        }
    }

    /// Widget parameters; empty object when absent.
    pub fn params(&self) -> Value {
        match &self.params {
            Some(value) if value.is_object() => value.clone(),
            _ => Value::Object(Default::default()),
        }
    }

    /// Requested limit from `timeLimitMs`, else `timeLimitSec * 1000`.
    pub fn time_limit_ms(&self) -> Option<f64> {
        let params = self.params();
        if let Some(ms) = params.get("timeLimitMs").filter(|v| !v.is_null()) {
            return Some(coerce_number(ms).unwrap_or(0.0));
        }
        params
            .get("timeLimitSec")
            .filter(|v| !v.is_null())
            .map(|sec| coerce_number(sec).map(|s| s * 1000.0).unwrap_or(0.0))
    }

    /// Tier label, if sent as a string.
    pub fn tier(&self) -> Option<String> {
        self.tier.as_ref().and_then(Value::as_str).map(str::to_string)
    }

    /// Seed text, if sent and not falsy.
    pub fn seed(&self) -> Option<String> {
        Some(value_to_text(self.seed.as_ref())).filter(|s| !s.is_empty())
    }
}

/// Loose numeric coercion: numbers, numeric strings, booleans.
///
/// Returns `None` for anything that is not a finite number.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn normalize_difficulty(value: Option<&Value>) -> i64 {
    let raw = value.and_then(coerce_number).unwrap_or(1.0);
    match raw.round() as i64 {
        0 => 1,
        d => d,
    }
}

fn requested_limit(value: Option<&Value>) -> Option<f64> {
    value
        .filter(|v| !v.is_null())
        .map(|v| coerce_number(v).unwrap_or(0.0))
}

fn value_to_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => crate::session::detail::format_number(n),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

// =============================================================================
// CONTROLLER -> HOST
// =============================================================================

/// Results reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "body")]
pub enum HostEvent {
    /// Standard-mode result.
    #[serde(rename = "minigame:result")]
    Result(MinigameResult),

    /// Inside-mode result.
    #[serde(rename = "insideMiniFinish")]
    InsideFinish(InsideFinish),

    /// Inside-mode cancellation.
    #[serde(rename = "insideMiniCancel")]
    InsideCancel(InsideCancel),
}

impl HostEvent {
    /// Callback name.
    pub fn action(&self) -> &'static str {
        match self {
            HostEvent::Result(_) => "minigame:result",
            HostEvent::InsideFinish(_) => "insideMiniFinish",
            HostEvent::InsideCancel(_) => "insideMiniCancel",
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `minigame:result` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameResult {
    /// Outcome.
    pub result: Verdict,
    /// Sanitized widget detail.
    pub detail: Detail,
    /// Whole ms from start to finalize.
    pub elapsed_ms: u64,
    /// `game|result|code|stage|difficulty|attempt`.
    pub trace: String,
    /// 8 hex digits over seed, trace and elapsed time.
    pub client_proof: String,
    /// Session seed.
    pub seed: String,
    /// Host seed signature, echoed.
    pub seed_signature: String,
    /// Widget variant.
    pub game_id: String,
    /// Difficulty tier.
    pub difficulty: i64,
}

/// `insideMiniFinish` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsideFinish {
    /// True on pass.
    pub result: bool,
    /// Sanitized widget detail.
    pub detail: Detail,
}

/// `insideMiniCancel` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsideCancel {
    /// Why the session was abandoned.
    pub reason: String,
}

/// Mirror frames for a front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "body")]
pub enum UiUpdate {
    /// Full HUD snapshot.
    #[serde(rename = "ui:hud")]
    Hud(Hud),

    /// Sound to play.
    #[serde(rename = "ui:cue")]
    Cue(AudioCue),
}

impl UiUpdate {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start() {
        let cmd = HostCommand::from_json(
            r#"{"action":"minigame:start","gameId":"LockPick","difficulty":"2",
                "timeLimitMs":15000,"seed":"abc","seed_signature":"sig","payload":{"pinCount":5}}"#,
        )
        .unwrap();

        let HostCommand::Start(req) = cmd else { panic!("expected start") };
        assert_eq!(req.game_id(), "lockpick");
        assert_eq!(req.seed_game_id(), "LockPick");
        assert_eq!(req.difficulty(), 2);
        assert_eq!(req.time_limit_ms(), Some(15000.0));
        assert_eq!(req.seed(), "abc");
        assert_eq!(req.seed_signature(), "sig");
        assert_eq!(req.config(), json!({ "pinCount": 5 }));
        assert_eq!(req.tier(), None);
    }

    #[test]
    fn test_start_defaults() {
        let HostCommand::Start(req) = HostCommand::from_json(r#"{"action":"minigame:start"}"#).unwrap() else {
            panic!("expected start")
        };
        assert_eq!(req.game_id(), "");
        assert_eq!(req.difficulty(), 1);
        assert_eq!(req.time_limit_ms(), None);
        assert_eq!(req.seed(), "");
        assert_eq!(req.config(), json!({}));
    }

    #[test]
    fn test_difficulty_coercion() {
        let parse = |v: Value| normalize_difficulty(Some(&v));
        assert_eq!(parse(json!(0)), 1);
        assert_eq!(parse(json!("abc")), 1);
        assert_eq!(parse(json!(3)), 3);
        assert_eq!(parse(json!(2.5)), 3);
        assert_eq!(parse(json!("2.4")), 2);
        assert_eq!(parse(json!(null)), 1);
    }

    #[test]
    fn test_non_numeric_limit_counts_as_zero() {
        assert_eq!(requested_limit(Some(&json!("soon"))), Some(0.0));
        assert_eq!(requested_limit(Some(&json!(null))), None);
    }

    #[test]
    fn test_parse_inside_open() {
        let cmd = HostCommand::from_json(
            r#"{"action":"inside_open","payload":{"difficulty":"hard","params":{"timeLimitSec":12},"seed":"s1"}}"#,
        )
        .unwrap();
        let HostCommand::InsideOpen { payload } = cmd else { panic!("expected inside_open") };
        assert_eq!(payload.difficulty_label(), "HARD");
        assert_eq!(payload.difficulty(), 3);
        assert_eq!(payload.time_limit_ms(), Some(12000.0));
        assert_eq!(payload.seed().as_deref(), Some("s1"));
    }

    #[test]
    fn test_parse_unknown_and_unit_actions() {
        assert!(matches!(
            HostCommand::from_json(r#"{"action":"shop:open","items":[]}"#).unwrap(),
            HostCommand::Unknown
        ));
        assert!(matches!(
            HostCommand::from_json(r#"{"action":"minigame:close"}"#).unwrap(),
            HostCommand::Close
        ));
        assert!(matches!(
            HostCommand::from_json(r#"{"action":"minigame:stop"}"#).unwrap(),
            HostCommand::Stop { reason: None }
        ));
    }

    #[test]
    fn test_parse_key_event() {
        let cmd = HostCommand::from_json(r#"{"action":"input:keydown","key":"a","code":"KeyA"}"#).unwrap();
        let HostCommand::KeyDown(event) = cmd else { panic!("expected keydown") };
        assert_eq!(event.key, "a");
        assert!(!event.repeat);
    }

    #[test]
    fn test_result_wire_shape() {
        let event = HostEvent::Result(MinigameResult {
            result: Verdict::Pass,
            detail: Detail::new().with("score", 5i64),
            elapsed_ms: 1500,
            trace: "lockpick|PASS|ok|final|1|0".to_string(),
            client_proof: "65219ad9".to_string(),
            seed: "abc".to_string(),
            seed_signature: String::new(),
            game_id: "lockpick".to_string(),
            difficulty: 1,
        });

        let json: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["action"], "minigame:result");
        assert_eq!(json["body"]["result"], "PASS");
        assert_eq!(json["body"]["elapsedMs"], 1500);
        assert_eq!(json["body"]["clientProof"], "65219ad9");
        assert_eq!(json["body"]["seedSignature"], "");
        assert_eq!(json["body"]["detail"], json!({ "score": 5 }));
    }

    #[test]
    fn test_inside_wire_shapes() {
        let finish = HostEvent::InsideFinish(InsideFinish { result: false, detail: Detail::new() });
        let json: Value = serde_json::from_str(&finish.to_json().unwrap()).unwrap();
        assert_eq!(json, json!({ "action": "insideMiniFinish", "body": { "result": false, "detail": {} } }));

        let cancel = HostEvent::InsideCancel(InsideCancel { reason: "escape".to_string() });
        assert_eq!(cancel.action(), "insideMiniCancel");
        let json: Value = serde_json::from_str(&cancel.to_json().unwrap()).unwrap();
        assert_eq!(json["body"]["reason"], "escape");
    }
}
