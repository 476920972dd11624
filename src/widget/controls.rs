//! Widget Controls
//!
//! The only channel from a widget back into the session. Calls are buffered
//! as effects and applied by the controller, in order, once the widget
//! callback returns. This keeps widgets from re-entering the controller while
//! it is dispatching to them.

use serde_json::Value;

use crate::session::keys::{KeyEvent, KeyHandle, KeyPhase};
use crate::session::state::SessionMode;
use crate::ui::Translations;
use crate::widget::WidgetError;

/// Key handler registered by a widget.
pub type KeyHandler = Box<dyn FnMut(&KeyEvent, &mut Controls<'_>) -> Result<(), WidgetError>>;

/// Cleanup action registered by a widget.
pub type Disposer = Box<dyn FnOnce() -> Result<(), WidgetError>>;

/// A buffered widget request.
pub(crate) enum Effect {
    Status(String),
    Footnote(String),
    Hint(f32),
    RegisterKey(KeyHandle, KeyHandler),
    ReleaseKey(KeyHandle),
    OnTeardown(Disposer),
    RequestFrame,
    CancelFrame,
    Complete(Value),
    Fail(Value),
    Cancel(String),
}

/// Callbacks handed to a widget for the duration of one call.
pub struct Controls<'a> {
    translations: &'a Translations,
    next_handle: &'a mut u64,
    mode: SessionMode,
    now_ms: f64,
    effects: Vec<Effect>,
}

impl<'a> Controls<'a> {
    pub(crate) fn new(
        translations: &'a Translations,
        next_handle: &'a mut u64,
        mode: SessionMode,
        now_ms: f64,
    ) -> Self {
        Self {
            translations,
            next_handle,
            mode,
            now_ms,
            effects: Vec::new(),
        }
    }

    pub(crate) fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    /// Monotonic time of the event being handled (ms).
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Look up a translation.
    pub fn translate(&self, key: &str, fallback: &str) -> String {
        self.translations.get(key, fallback)
    }

    /// Replace the status line.
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::Status(text.into()));
    }

    /// Replace the footnote line.
    pub fn set_footnote(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::Footnote(text.into()));
    }

    /// Request a short feedback tone.
    pub fn play_hint(&mut self, intensity: f32) {
        self.effects.push(Effect::Hint(intensity.clamp(0.0, 1.0)));
    }

    fn register_key<F>(&mut self, phase: KeyPhase, handler: F) -> KeyHandle
    where
        F: FnMut(&KeyEvent, &mut Controls<'_>) -> Result<(), WidgetError> + 'static,
    {
        *self.next_handle += 1;
        let handle = KeyHandle { phase, id: *self.next_handle };
        self.effects.push(Effect::RegisterKey(handle, Box::new(handler)));
        handle
    }

    /// Subscribe to keydown events. Released automatically at teardown.
    pub fn register_key_down<F>(&mut self, handler: F) -> KeyHandle
    where
        F: FnMut(&KeyEvent, &mut Controls<'_>) -> Result<(), WidgetError> + 'static,
    {
        self.register_key(KeyPhase::Down, handler)
    }

    /// Subscribe to keyup events. Released automatically at teardown.
    pub fn register_key_up<F>(&mut self, handler: F) -> KeyHandle
    where
        F: FnMut(&KeyEvent, &mut Controls<'_>) -> Result<(), WidgetError> + 'static,
    {
        self.register_key(KeyPhase::Up, handler)
    }

    /// Unsubscribe a key handler early.
    pub fn release_key(&mut self, handle: KeyHandle) {
        self.effects.push(Effect::ReleaseKey(handle));
    }

    /// Run `cleanup` when the session tears down.
    pub fn on_teardown<F>(&mut self, cleanup: F)
    where
        F: FnOnce() -> Result<(), WidgetError> + 'static,
    {
        self.effects.push(Effect::OnTeardown(Box::new(cleanup)));
    }

    /// Ask for one `on_frame` call on the next pump.
    pub fn request_frame(&mut self) {
        self.effects.push(Effect::RequestFrame);
    }

    /// Withdraw a pending frame request.
    pub fn cancel_frame(&mut self) {
        self.effects.push(Effect::CancelFrame);
    }

    /// Report a pass.
    pub fn complete(&mut self, detail: Value) {
        self.effects.push(Effect::Complete(detail));
    }

    /// Report a failure.
    pub fn fail(&mut self, detail: Value) {
        self.effects.push(Effect::Fail(detail));
    }

    /// Whether [`Controls::cancel`] does anything in this session.
    pub fn can_cancel(&self) -> bool {
        self.mode == SessionMode::Inside
    }

    /// Abort without a result. Only honoured in inside mode.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.effects.push(Effect::Cancel(reason.into()));
    }
}
