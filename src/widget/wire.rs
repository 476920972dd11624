//! Wire Cutting
//!
//! A board of colored wires and an ordered cut list. Cuts arrive as pointer
//! presses naming the wire color.

use serde_json::{json, Value};
use tracing::debug;

use super::{Controls, GameWidget, WidgetError, WidgetSetup};

/// Default palette, in board order.
pub const DEFAULT_COLORS: [&str; 6] = ["red", "blue", "green", "yellow", "purple", "orange"];
/// Largest board.
const MAX_WIRES: usize = 6;

/// Wire cutting widget.
#[derive(Debug, Default)]
pub struct WireWidget {
    palette: Vec<String>,
    sequence: Vec<String>,
    index: usize,
    mistakes: u32,
    allowed_mistakes: f64,
    active: bool,
}

impl WireWidget {
    /// Unstarted widget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires on the board.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// Colors still to cut, in order.
    pub fn remaining(&self) -> &[String] {
        self.sequence.get(self.index..).unwrap_or_default()
    }

    fn cut(&mut self, color: &str, controls: &mut Controls<'_>) {
        let Some(expected) = self.sequence.get(self.index) else {
            return;
        };

        if color != expected.as_str() {
            self.mistakes += 1;
            controls.play_hint(0.4);
            if f64::from(self.mistakes) > self.allowed_mistakes {
                self.active = false;
                debug!(mistakes = self.mistakes, progress = self.index, "wire sequence failed");
                controls.set_status("SEQUENCE FAILED");
                controls.fail(json!({
                    "code": "wire_lockout",
                    "mistakes": self.mistakes,
                    "progress": self.index,
                }));
                return;
            }
            controls.set_status("INCORRECT WIRE - RECALIBRATE");
            return;
        }

        self.index += 1;
        controls.play_hint(0.2);
        match self.sequence.get(self.index) {
            Some(next) => controls.set_status(format!("NEXT: {}", next.to_uppercase())),
            None => {
                self.active = false;
                controls.set_status("CIRCUIT DISABLED");
                controls.complete(json!({
                    "code": "wire_clear",
                    "mistakes": self.mistakes,
                    "steps": self.sequence.len(),
                }));
            }
        }
    }
}

impl GameWidget for WireWidget {
    fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let hard = setup.difficulty >= 2;
        let palette: Vec<String> = match setup.config_value("colors") {
            Some(Value::Array(colors)) if !colors.is_empty() => colors
                .iter()
                .take(MAX_WIRES)
                .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()))
                .collect(),
            _ => DEFAULT_COLORS
                .iter()
                .take(if hard { 6 } else { 5 })
                .map(|c| c.to_string())
                .collect(),
        };
        let allowed_mistakes = setup
            .config_f64("allowedMistakes")
            .unwrap_or(if hard { 0.0 } else { 1.0 });
        let length = setup
            .config_f64("sequenceLength")
            .unwrap_or(if hard { 5.0 } else { 4.0 })
            .min(palette.len() as f64)
            .max(3.0) as usize;
        let allow_repeat = setup.config.get("unique") == Some(&Value::Bool(false));

        let mut rng = setup.rng;
        let mut available = palette.clone();
        let mut sequence = Vec::with_capacity(length);
        for _ in 0..length {
            let pool = if allow_repeat { &palette } else { &available };
            if pool.is_empty() {
                return Err(WidgetError::InvalidConfig(format!(
                    "sequence of {length} needs more than {} colors",
                    palette.len()
                )));
            }
            let idx = rng.next_index(pool.len());
            sequence.push(pool[idx].clone());
            if !allow_repeat {
                available.remove(idx);
            }
        }

        *self = WireWidget {
            palette,
            sequence,
            index: 0,
            mistakes: 0,
            allowed_mistakes,
            active: true,
        };

        if let Some(first) = self.sequence.first() {
            controls.set_status(format!("CUT: {}", first.to_uppercase()));
        }
        controls.set_footnote(controls.translate("foot.wire", "Click the wires in order. ESC to exit"));
        Ok(())
    }

    fn on_pointer(&mut self, target: Option<&str>, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
        let Some(color) = target else {
            return Ok(());
        };
        if self.active && self.palette.iter().any(|c| c == color) {
            self.cut(color, controls);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WidgetError> {
        self.active = false;
        Ok(())
    }
}
