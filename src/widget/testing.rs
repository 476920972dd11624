//! Single-widget harness for tests. Applies effects the way the controller
//! does, minus the session bookkeeping.

use serde_json::Value;

use crate::session::keys::{KeyEvent, KeyPhase, KeyRegistry};
use crate::session::state::SessionMode;
use crate::ui::Translations;
use crate::widget::controls::{Controls, Disposer, Effect};
use crate::widget::{GameWidget, WidgetError};

pub(crate) struct Harness {
    translations: Translations,
    next_handle: u64,
    mode: SessionMode,
    keys: KeyRegistry,
    pub now_ms: f64,
    pub statuses: Vec<String>,
    pub footnotes: Vec<String>,
    pub hints: Vec<f32>,
    pub completed: Vec<Value>,
    pub failed: Vec<Value>,
    pub cancelled: Vec<String>,
    pub frame_pending: bool,
    pub disposers: Vec<Disposer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mode(SessionMode::Standard)
    }

    pub fn with_mode(mode: SessionMode) -> Self {
        Self {
            translations: Translations::default(),
            next_handle: 0,
            mode,
            keys: KeyRegistry::new(),
            now_ms: 0.0,
            statuses: Vec::new(),
            footnotes: Vec::new(),
            hints: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            cancelled: Vec::new(),
            frame_pending: false,
            disposers: Vec::new(),
        }
    }

    pub fn call<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Controls<'_>) -> Result<(), WidgetError>,
    {
        let mut controls = Controls::new(&self.translations, &mut self.next_handle, self.mode, self.now_ms);
        f(&mut controls).expect("widget call failed");
        let effects = controls.into_effects();
        self.apply(effects);
    }

    pub fn key_down(&mut self, key: &str) {
        self.dispatch(KeyPhase::Down, &KeyEvent::new(key));
    }

    pub fn key_up(&mut self, key: &str) {
        self.dispatch(KeyPhase::Up, &KeyEvent::new(key));
    }

    fn dispatch(&mut self, phase: KeyPhase, event: &KeyEvent) {
        let mut controls = Controls::new(&self.translations, &mut self.next_handle, self.mode, self.now_ms);
        for (_, handler) in self.keys.handlers_mut(phase) {
            handler(event, &mut controls).expect("key handler failed");
        }
        let effects = controls.into_effects();
        self.apply(effects);
    }

    /// Run requested frames `step_ms` apart until none is pending or `max`
    /// frames have run. Returns the number run.
    pub fn run_frames(&mut self, widget: &mut dyn GameWidget, step_ms: f64, max: usize) -> usize {
        let mut count = 0;
        while self.frame_pending && count < max {
            self.frame_pending = false;
            self.now_ms += step_ms;
            let now = self.now_ms;
            self.call(|controls| widget.on_frame(now, controls));
            count += 1;
        }
        count
    }

    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }

    pub fn handler_count(&self) -> usize {
        self.keys.total()
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Status(text) => self.statuses.push(text),
                Effect::Footnote(text) => self.footnotes.push(text),
                Effect::Hint(intensity) => self.hints.push(intensity),
                Effect::RegisterKey(handle, handler) => self.keys.insert(handle, handler),
                Effect::ReleaseKey(handle) => {
                    self.keys.remove(handle);
                }
                Effect::OnTeardown(disposer) => self.disposers.push(disposer),
                Effect::RequestFrame => self.frame_pending = true,
                Effect::CancelFrame => self.frame_pending = false,
                Effect::Complete(detail) => self.completed.push(detail),
                Effect::Fail(detail) => self.failed.push(detail),
                Effect::Cancel(reason) => self.cancelled.push(reason),
            }
        }
    }
}
