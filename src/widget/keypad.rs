//! Keypad
//!
//! Enter a digit code. In `memory` mode the code is first played back one
//! key at a time and has to be repeated from memory. Wrong entries cost a
//! mistake; running out of mistakes locks the pad.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use tracing::debug;

use super::{borrow_state, Controls, GameWidget, WidgetError, WidgetSetup};
use crate::session::detail::format_number;

/// Each previewed key stays lit this long.
const PREVIEW_STEP_MS: f64 = 420.0;
/// Pause between the last previewed key and accepting input.
const PREVIEW_TAIL_MS: f64 = 240.0;
/// Pause between a wrong entry and the retry prompt.
const RETRY_DELAY_MS: f64 = 220.0;
/// Longest accepted code.
const MAX_CODE_LEN: usize = 8;

/// Entry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypadMode {
    /// The code is known to the player.
    #[default]
    Code,
    /// The code is shown once, then repeated from memory.
    Memory,
}

impl KeypadMode {
    fn parse(raw: &str) -> Self {
        if raw == "memory" {
            KeypadMode::Memory
        } else {
            KeypadMode::Code
        }
    }
}

/// A pad press after key mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Press {
    Digit(char),
    Delete,
    Clear,
}

impl Press {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "Backspace" => Some(Press::Delete),
            "Delete" => Some(Press::Clear),
            _ => single_digit(key).map(Press::Digit),
        }
    }

    fn from_target(target: &str) -> Option<Self> {
        match target {
            "DEL" => Some(Press::Delete),
            "CLR" => Some(Press::Clear),
            _ => single_digit(target).map(Press::Digit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Timed {
    /// Light code position `n`, or finish the preview past the end.
    Preview(usize),
    /// Open the pad after the preview.
    Accept,
    /// Prompt for another try.
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    due_ms: f64,
    action: Timed,
}

#[derive(Debug, Default)]
struct KeypadState {
    code: Vec<char>,
    entered: Vec<char>,
    accepting: bool,
    mistakes: u32,
    allowed_mistakes: f64,
    timers: Vec<Timer>,
    lit: Option<char>,
    footnote: String,
}

impl KeypadState {
    fn schedule(&mut self, now_ms: f64, delay_ms: f64, action: Timed) {
        self.timers.push(Timer { due_ms: now_ms + delay_ms, action });
    }

    fn press(&mut self, press: Press, controls: &mut Controls<'_>) {
        match press {
            Press::Clear => self.entered.clear(),
            Press::Delete => {
                self.entered.pop();
            }
            Press::Digit(_) if !self.accepting => {}
            Press::Digit(_) if self.entered.len() >= self.code.len() => {}
            Press::Digit(digit) => {
                self.entered.push(digit);
                if self.entered.len() == self.code.len() {
                    self.evaluate(controls);
                }
            }
        }
    }

    fn evaluate(&mut self, controls: &mut Controls<'_>) {
        if self.entered == self.code {
            self.accepting = false;
            controls.set_status("ACCESS ACCEPTED");
            controls.complete(json!({
                "code": "keypad_clear",
                "length": self.code.len(),
                "mistakes": self.mistakes,
            }));
            return;
        }

        self.mistakes += 1;
        controls.play_hint(0.35);
        if f64::from(self.mistakes) > self.allowed_mistakes {
            self.accepting = false;
            debug!(mistakes = self.mistakes, "keypad locked out");
            controls.set_status("LOCKED OUT");
            controls.fail(json!({ "code": "keypad_lockout", "mistakes": self.mistakes }));
            return;
        }

        controls.set_status("INCORRECT - RESET");
        self.entered.clear();
        self.schedule(controls.now_ms(), RETRY_DELAY_MS, Timed::Retry);
    }

    fn preview(&mut self, index: usize, now_ms: f64, controls: &mut Controls<'_>) {
        self.accepting = false;
        match self.code.get(index).copied() {
            Some(digit) => {
                self.lit = Some(digit);
                controls.set_footnote(digit.to_string());
                self.schedule(now_ms, PREVIEW_STEP_MS, Timed::Preview(index + 1));
            }
            None => {
                self.lit = None;
                self.schedule(now_ms, PREVIEW_TAIL_MS, Timed::Accept);
            }
        }
    }

    /// Fire every timer due by `now_ms`, earliest first.
    fn run_timers(&mut self, now_ms: f64, controls: &mut Controls<'_>) {
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, timer)| timer.due_ms <= now_ms)
                .min_by(|a, b| a.1.due_ms.total_cmp(&b.1.due_ms))
                .map(|(idx, _)| idx);
            let Some(idx) = due else {
                break;
            };
            let timer = self.timers.remove(idx);
            match timer.action {
                Timed::Preview(index) => self.preview(index, now_ms, controls),
                Timed::Accept => {
                    self.entered.clear();
                    self.accepting = true;
                    controls.set_status("REPEAT PATTERN");
                    controls.set_footnote(self.footnote.clone());
                }
                Timed::Retry => controls.set_status("TRY AGAIN"),
            }
        }
    }
}

/// Keypad widget.
#[derive(Default)]
pub struct KeypadWidget {
    state: Rc<RefCell<KeypadState>>,
}

impl KeypadWidget {
    /// Unstarted widget.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameWidget for KeypadWidget {
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let hard = setup.difficulty >= 2;
        let mode = match setup.config_value("mode") {
            Some(Value::String(raw)) if !raw.is_empty() => KeypadMode::parse(raw),
            _ if hard => KeypadMode::Memory,
            _ => KeypadMode::Code,
        };
        let allowed_mistakes = setup
            .config_f64("allowedMistakes")
            .unwrap_or(if hard { 1.0 } else { 2.0 });
        let length = setup
            .config_f64("sequenceLength")
            .filter(|len| *len != 0.0)
            .unwrap_or(if hard { 6.0 } else { 4.0 })
            .floor()
            .clamp(3.0, MAX_CODE_LEN as f64) as usize;

        let code = configured_code(&setup.config).unwrap_or_else(|| {
            let mut rng = setup.rng.clone();
            (0..length).map(|_| rng.next_digit()).collect()
        });
        let preview = mode == KeypadMode::Memory
            && setup.config.get("preview") != Some(&Value::Bool(false))
            && !code.is_empty();
        let footnote = controls.translate("foot.keypad", "Use keypad buttons or number keys. ESC closes.");

        {
            let mut state = borrow_state(&self.state, "keypad")?;
            *state = KeypadState {
                code,
                allowed_mistakes,
                footnote: footnote.clone(),
                ..KeypadState::default()
            };
            controls.set_status(if preview { "WATCH THE PATTERN" } else { "ENTER THE CODE" });
            controls.set_footnote(footnote);
            if preview {
                state.preview(0, controls.now_ms(), controls);
                controls.request_frame();
            } else {
                state.accepting = true;
            }
        }

        let shared = Rc::clone(&self.state);
        controls.register_key_down(move |event, controls| {
            if let Some(press) = Press::from_key(&event.key) {
                borrow_state(&shared, "keypad")?.press(press, controls);
                controls.request_frame();
            }
            Ok(())
        });
        Ok(())
    }

    fn on_frame(&mut self, now_ms: f64, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "keypad")?;
        state.run_timers(now_ms, controls);
        if !state.timers.is_empty() {
            controls.request_frame();
        }
        Ok(())
    }

    fn on_pointer(&mut self, target: Option<&str>, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        if let Some(press) = target.and_then(Press::from_target) {
            borrow_state(&self.state, "keypad")?.press(press, controls);
            controls.request_frame();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WidgetError> {
        let mut state = borrow_state(&self.state, "keypad")?;
        state.timers.clear();
        state.accepting = false;
        Ok(())
    }
}

fn single_digit(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Some(c),
        _ => None,
    }
}

/// Digits from a string, number or array; `None` unless at least 3.
fn normalize_digits(source: &Value) -> Option<Vec<char>> {
    let parts: Vec<String> = match source {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Number(n) => format_number(n),
                _ => String::new(),
            })
            .collect(),
        Value::String(s) => s.chars().map(String::from).collect(),
        Value::Number(n) => format_number(n).chars().map(String::from).collect(),
        _ => return None,
    };
    let mut digits: Vec<char> = parts.iter().filter_map(|part| single_digit(part.trim())).collect();
    if digits.len() < 3 {
        return None;
    }
    digits.truncate(MAX_CODE_LEN);
    Some(digits)
}

/// First usable code among `serverCode`, `code`, `digits`, `sequence`.
fn configured_code(config: &Value) -> Option<Vec<char>> {
    ["serverCode", "code", "digits", "sequence"]
        .iter()
        .filter_map(|key| config.get(*key))
        .find_map(normalize_digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SeededRng;
    use crate::widget::testing::Harness;

    fn setup(difficulty: i64, config: Value) -> WidgetSetup {
        WidgetSetup {
            difficulty,
            seed: "abc".to_string(),
            config,
            time_limit_ms: 20_000,
            tier: "CHEAP".to_string(),
            rng: SeededRng::new("abc:keypad:1:main"),
        }
    }

    fn started(difficulty: i64, config: Value) -> (KeypadWidget, Harness) {
        let mut widget = KeypadWidget::new();
        let mut harness = Harness::new();
        harness.call(|c| widget.start(setup(difficulty, config), c));
        (widget, harness)
    }

    fn type_code(harness: &mut Harness, code: &str) {
        for ch in code.chars() {
            harness.key_down(&ch.to_string());
        }
    }

    #[test]
    fn test_normalize_digits() {
        assert_eq!(normalize_digits(&json!("1234")), Some(vec!['1', '2', '3', '4']));
        assert_eq!(normalize_digits(&json!(["9", 8, " 7 "])), Some(vec!['9', '8', '7']));
        assert_eq!(normalize_digits(&json!("12")), None);
        assert_eq!(normalize_digits(&json!("1a2b3")), Some(vec!['1', '2', '3']));
        assert_eq!(normalize_digits(&json!("1234567890")).map(|d| d.len()), Some(8));
        assert_eq!(normalize_digits(&json!(true)), None);
    }

    #[test]
    fn test_configured_code_precedence() {
        let config = json!({ "code": "999", "serverCode": "12", "digits": "4567" });
        assert_eq!(configured_code(&config), Some(vec!['9', '9', '9']));
    }

    #[test]
    fn test_generated_code_is_deterministic() {
        let (a, _) = started(1, json!({}));
        let (b, _) = started(1, json!({}));
        let code = a.state.borrow().code.clone();
        assert_eq!(code.len(), 4);
        assert_eq!(code, b.state.borrow().code);
        assert!(code.iter().all(char::is_ascii_digit));
    }

    #[test]
    fn test_code_mode_success() {
        let (_widget, mut harness) = started(1, json!({ "code": "4812" }));
        assert_eq!(harness.last_status(), Some("ENTER THE CODE"));

        type_code(&mut harness, "4812");

        assert_eq!(harness.last_status(), Some("ACCESS ACCEPTED"));
        assert_eq!(harness.completed, vec![json!({ "code": "keypad_clear", "length": 4, "mistakes": 0 })]);
    }

    #[test]
    fn test_wrong_entry_then_lockout() {
        let (mut widget, mut harness) = started(1, json!({ "code": "4812", "allowedMistakes": 1 }));

        type_code(&mut harness, "0000");
        assert_eq!(harness.last_status(), Some("INCORRECT - RESET"));
        assert!(widget.state.borrow().entered.is_empty());
        assert_eq!(harness.hints, vec![0.35]);

        harness.run_frames(&mut widget, RETRY_DELAY_MS, 5);
        assert_eq!(harness.last_status(), Some("TRY AGAIN"));

        type_code(&mut harness, "1111");
        assert_eq!(harness.last_status(), Some("LOCKED OUT"));
        assert_eq!(harness.failed, vec![json!({ "code": "keypad_lockout", "mistakes": 2 })]);

        // Locked pads ignore further digits.
        type_code(&mut harness, "4812");
        assert!(harness.completed.is_empty());
    }

    #[test]
    fn test_delete_and_clear() {
        let (widget, mut harness) = started(1, json!({ "code": "4812" }));
        type_code(&mut harness, "48");
        harness.key_down("Backspace");
        assert_eq!(widget.state.borrow().entered, vec!['4']);
        harness.key_down("Delete");
        assert!(widget.state.borrow().entered.is_empty());
    }

    #[test]
    fn test_pointer_targets() {
        let (mut widget, mut harness) = started(1, json!({ "code": "123" }));
        for target in ["1", "9", "DEL", "2", "3"] {
            harness.call(|c| widget.on_pointer(Some(target), c));
        }
        assert_eq!(harness.completed.len(), 1);
    }

    #[test]
    fn test_memory_preview_blocks_input_until_done() {
        let (mut widget, mut harness) = started(2, json!({ "code": "123" }));
        assert_eq!(harness.statuses[0], "WATCH THE PATTERN");
        assert!(!widget.state.borrow().accepting);
        assert_eq!(widget.state.borrow().lit, Some('1'));

        // Input during the preview is ignored.
        type_code(&mut harness, "123");
        assert!(harness.completed.is_empty());

        harness.run_frames(&mut widget, PREVIEW_STEP_MS, 1);
        assert_eq!(widget.state.borrow().lit, Some('2'));
        harness.run_frames(&mut widget, PREVIEW_STEP_MS, 2);
        assert_eq!(widget.state.borrow().lit, None);
        harness.run_frames(&mut widget, PREVIEW_TAIL_MS, 5);
        assert_eq!(harness.last_status(), Some("REPEAT PATTERN"));
        assert!(!harness.frame_pending);

        type_code(&mut harness, "123");
        assert_eq!(harness.completed.len(), 1);
    }

    #[test]
    fn test_memory_without_preview() {
        let (widget, harness) = started(1, json!({ "mode": "memory", "preview": false, "code": "123" }));
        assert_eq!(harness.last_status(), Some("ENTER THE CODE"));
        assert!(widget.state.borrow().accepting);
    }
}
