//! Session Controller
//!
//! Owns at most one live [`Session`] and drives it from host commands,
//! key input and frame pumps. Widgets never call back into the controller
//! directly; they queue effects on [`Controls`] which are applied here once
//! the widget call returns.
//!
//! ## Finalization
//!
//! A session's outcome is fixed exactly once. `finalize` and `cancel_inside`
//! both check and set `Session::finalized` before doing anything else, and
//! once it is set every later effect from the same batch is dropped.

use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::core::rng::session_seed;
use crate::network::bridge::HostBridge;
use crate::network::protocol::{
    HostCommand, HostEvent, InsideCancel, InsideFinish, InsidePayload, MinigameResult, StartRequest,
};
use crate::proof::{build_client_proof, build_trace, Verdict};
use crate::session::clock::Clock;
use crate::session::config::SessionConfig;
use crate::session::detail::Detail;
use crate::session::frame::{FrameScheduler, FrameTarget, ScheduledFrame};
use crate::session::keys::{KeyEvent, KeyPhase, KeyRegistry};
use crate::session::state::{ControllerState, Session, SessionDisposer, SessionId, SessionMode};
use crate::ui::{AudioCue, Hud, Tone, Translations};
use crate::widget::controls::Effect;
use crate::widget::{Controls, GameWidget, WidgetContext, WidgetError, WidgetRegistry, WidgetSetup};

/// Everything needed to mount a session, after per-mode normalization.
struct Launch {
    game_id: String,
    seed_game_id: String,
    difficulty: i64,
    time_limit_ms: u64,
    tier: String,
    seed: String,
    seed_signature: String,
    config: Value,
    mode: SessionMode,
    title: String,
    status: String,
    footnote: String,
}

/// The session controller.
pub struct SessionController {
    config: SessionConfig,
    widgets: WidgetRegistry,
    clock: Box<dyn Clock>,
    bridge: Box<dyn HostBridge>,
    translations: Translations,
    hud: Hud,
    frames: FrameScheduler,
    current: Option<Session>,
    next_handle: u64,
    cues: Vec<AudioCue>,
}

impl SessionController {
    /// Create an idle controller.
    ///
    /// Loads the default locale from `config.locale_dir` when one is set; a
    /// missing or broken table is logged and lookups fall back to English.
    pub fn new(
        config: SessionConfig,
        widgets: WidgetRegistry,
        clock: impl Clock + 'static,
        bridge: impl HostBridge + 'static,
    ) -> Self {
        let translations = match &config.locale_dir {
            Some(dir) => Translations::load(dir, &config.default_locale).unwrap_or_else(|e| {
                warn!(locale = %config.default_locale, error = %e, "failed to load default locale");
                Translations::empty(config.default_locale.clone())
            }),
            None => Translations::empty(config.default_locale.clone()),
        };

        Self {
            config,
            widgets,
            clock: Box::new(clock),
            bridge: Box::new(bridge),
            translations,
            hud: Hud::idle(),
            frames: FrameScheduler::new(),
            current: None,
            next_handle: 0,
            cues: Vec::new(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        match &self.current {
            None => ControllerState::Idle,
            Some(session) if session.finalized => ControllerState::Finalizing,
            Some(_) => ControllerState::Active,
        }
    }

    /// HUD view model.
    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    /// Live session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Pending frame requests.
    pub fn frames(&self) -> &FrameScheduler {
        &self.frames
    }

    /// Active translation table.
    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Take the audio cues queued since the last call.
    pub fn take_cues(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.cues)
    }

    /// Registered key handlers across both phases.
    pub fn key_handler_count(&self) -> usize {
        self.current.as_ref().map_or(0, |session| session.keys.total())
    }

    fn t(&self, key: &str, fallback: &str) -> String {
        self.translations.get(key, fallback)
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Route one host command.
    pub fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Start(request) => self.start(request),
            HostCommand::Stop { reason } => self.fail_current(reason.as_deref()),
            HostCommand::Close | HostCommand::InsideClose => self.close(),
            HostCommand::InsideOpen { payload } => self.start_inside(payload),
            HostCommand::SetLocale { locale } => match locale {
                Some(locale) => self.set_locale(&locale),
                None => debug!("set-locale without a locale"),
            },
            HostCommand::KeyDown(event) => self.key_down(&event),
            HostCommand::KeyUp(event) => self.key_up(&event),
            HostCommand::Blur => self.blur(),
            HostCommand::Focus => self.focus(),
            HostCommand::Pointer { target } => self.pointer(target.as_deref()),
            HostCommand::Unknown => trace!("ignoring unknown host action"),
        }
    }

    /// Start a standard-mode session.
    pub fn start(&mut self, request: StartRequest) {
        let game_id = request.game_id();
        if !self.widgets.contains(&game_id) {
            warn!(game_id = %game_id, "unknown game id");
            return;
        }
        self.hud.visible = true;

        let difficulty = request.difficulty();
        let tier = request
            .tier()
            .unwrap_or_else(|| if difficulty >= 2 { "LUXE" } else { "CHEAP" }.to_string());

        let launch = Launch {
            title: self.t(&format!("game.{game_id}.title"), &game_id.to_uppercase()),
            status: self.t("status.prepare", "ENGAGE THE DEVICE"),
            footnote: self.t("foot.default", "Follow the prompts to clear the puzzle"),
            time_limit_ms: self.config.standard.clamp(request.time_limit_ms()),
            seed: request.seed(),
            seed_signature: request.seed_signature(),
            config: request.config(),
            mode: SessionMode::Standard,
            seed_game_id: request.seed_game_id().to_string(),
            game_id,
            difficulty,
            tier,
        };
        self.launch(launch);
    }

    /// Start an inside-mode session.
    pub fn start_inside(&mut self, payload: InsidePayload) {
        let requested = payload.game_id();
        let game_id = if self.widgets.contains(&requested) {
            requested
        } else {
            "inside".to_string()
        };
        if !self.widgets.contains(&game_id) {
            warn!(game_id = %game_id, "no inside widget registered");
            return;
        }
        self.hud.visible = true;

        let label = payload.difficulty_label();
        let launch = Launch {
            title: payload
                .title
                .clone()
                .unwrap_or_else(|| self.t("game.inside.title", "INSIDE TASK")),
            status: payload
                .subtitle
                .clone()
                .unwrap_or_else(|| self.t("status.prepare", "ENGAGE THE DEVICE")),
            footnote: payload
                .footnote
                .clone()
                .unwrap_or_else(|| self.t("foot.inside", "Click when the pad glows")),
            time_limit_ms: self.config.inside.clamp(payload.time_limit_ms()),
            seed: payload
                .seed()
                .unwrap_or_else(|| format!("inside:{}", chrono::Utc::now().timestamp_millis())),
            seed_signature: String::new(),
            config: payload.params(),
            mode: SessionMode::Inside,
            difficulty: payload.difficulty(),
            tier: payload.tier().unwrap_or(label),
            seed_game_id: game_id.clone(),
            game_id,
        };
        self.launch(launch);
    }

    fn launch(&mut self, launch: Launch) {
        self.hud.hide_overlay();
        self.teardown();

        let ctx = WidgetContext {
            base_seed: session_seed(&launch.seed, &launch.seed_game_id, launch.difficulty),
        };
        let Some(widget) = self.widgets.build(&launch.game_id, &ctx) else {
            warn!(game_id = %launch.game_id, "widget factory vanished");
            return;
        };

        self.hud.tier = self.translations.format_tier(&launch.tier);
        self.hud.title = launch.title;
        self.hud.status = launch.status;
        self.hud.footnote = launch.footnote;
        self.hud.mounted = Some(launch.game_id.clone());

        let now = self.clock.now_ms();
        let id: SessionId = Uuid::new_v4();
        let mut session = Session {
            id,
            game_id: launch.game_id,
            difficulty: launch.difficulty,
            seed: launch.seed,
            seed_signature: launch.seed_signature,
            tier: launch.tier,
            started_at: now,
            deadline: now + launch.time_limit_ms as f64,
            time_limit_ms: launch.time_limit_ms,
            finalized: false,
            mode: launch.mode,
            keys: KeyRegistry::new(),
            disposers: Vec::new(),
            timer_frame: None,
            widget_frame: None,
            widget,
        };
        session.timer_frame = Some(self.frames.request(id, FrameTarget::Countdown));
        self.hud.set_timer(launch.time_limit_ms as f64, 1.0);

        info!(
            session = %id,
            game_id = %session.game_id,
            difficulty = session.difficulty,
            time_limit_ms = session.time_limit_ms,
            mode = ?session.mode,
            "session started"
        );

        let setup = WidgetSetup {
            difficulty: session.difficulty,
            seed: session.seed.clone(),
            config: launch.config,
            time_limit_ms: session.time_limit_ms,
            tier: session.tier.clone(),
            rng: ctx.make_rng("main"),
        };
        self.current = Some(session);
        self.run_widget(now, "start", |widget, controls| widget.start(setup, controls));
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    /// Expire the overlay and run every pending frame once.
    pub fn pump_frames(&mut self) {
        let now = self.clock.now_ms();
        if self.hud.expire_overlay(now) {
            trace!("overlay hidden");
        }
        for frame in self.frames.drain() {
            self.handle_frame(frame, now);
        }
    }

    /// Run one frame. Frames from another session, or ones that were
    /// superseded, are ignored.
    pub fn handle_frame(&mut self, frame: ScheduledFrame, now_ms: f64) {
        let Some(session) = self.current.as_mut() else {
            trace!(frame = frame.id, "frame with no session");
            return;
        };
        if session.id != frame.session {
            debug!(frame = frame.id, stale = %frame.session, "ignoring stale frame");
            return;
        }
        if session.finalized {
            return;
        }

        match frame.target {
            FrameTarget::Countdown if session.timer_frame == Some(frame.id) => {
                session.timer_frame = None;
                self.countdown_tick(now_ms);
            }
            FrameTarget::Widget if session.widget_frame == Some(frame.id) => {
                session.widget_frame = None;
                self.run_widget(now_ms, "frame", |widget, controls| widget.on_frame(now_ms, controls));
            }
            _ => trace!(frame = frame.id, "ignoring superseded frame"),
        }
    }

    fn countdown_tick(&mut self, now_ms: f64) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let remaining = session.remaining_ms(now_ms);
        self.hud.set_timer(remaining, session.ratio(now_ms));

        if remaining <= 0.0 {
            info!(session = %session.id, "session timed out");
            self.finalize(Verdict::Fail, json!({ "code": "timeout" }));
            return;
        }
        session.timer_frame = Some(self.frames.request(session.id, FrameTarget::Countdown));
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Key pressed. Escape ends the session; auto-repeat is ignored.
    pub fn key_down(&mut self, event: &KeyEvent) {
        if event.is_escape() {
            self.escape();
            return;
        }
        if event.repeat {
            return;
        }
        self.dispatch_key(KeyPhase::Down, event);
    }

    /// Key released.
    pub fn key_up(&mut self, event: &KeyEvent) {
        self.dispatch_key(KeyPhase::Up, event);
    }

    fn dispatch_key(&mut self, phase: KeyPhase, event: &KeyEvent) {
        let now = self.clock.now_ms();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let id = session.id;
        let mut controls = Controls::new(&self.translations, &mut self.next_handle, session.mode, now);
        for (handle, handler) in session.keys.handlers_mut(phase) {
            if let Err(err) = handler(event, &mut controls) {
                warn!(session = %id, handler = *handle, key = %event.key, error = %err, "key handler failed");
            }
        }
        let effects = controls.into_effects();
        self.apply_effects(id, effects);
    }

    fn escape(&mut self) {
        match self.current.as_ref().map(|session| session.mode) {
            Some(SessionMode::Inside) => self.cancel_inside("escape"),
            Some(SessionMode::Standard) => self.fail_current(Some("escape")),
            None => {}
        }
    }

    /// The overlay lost focus. The session keeps running.
    pub fn blur(&mut self) {
        self.hud.focus_lost = true;
        self.hud.status = self.t("status.focus", "FOCUS LOST - CLICK TO RESUME");
    }

    /// The overlay regained focus.
    pub fn focus(&mut self) {
        self.hud.focus_lost = false;
    }

    /// Pointer press, optionally on a widget target. Also resumes after a
    /// focus loss.
    pub fn pointer(&mut self, target: Option<&str>) {
        let now = self.clock.now_ms();
        self.run_widget(now, "pointer", |widget, controls| widget.on_pointer(target, controls));

        if self.hud.focus_lost {
            self.hud.focus_lost = false;
            self.hud.status = self.t("status.resume", "RESUMED CONTROL");
        }
    }

    // =========================================================================
    // WIDGET PLUMBING
    // =========================================================================

    fn run_widget<F>(&mut self, now_ms: f64, call: &'static str, f: F)
    where
        F: FnOnce(&mut Box<dyn GameWidget>, &mut Controls<'_>) -> Result<(), WidgetError>,
    {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.finalized {
            return;
        }
        let id = session.id;
        let mut controls = Controls::new(&self.translations, &mut self.next_handle, session.mode, now_ms);
        if let Err(err) = f(&mut session.widget, &mut controls) {
            warn!(session = %id, call, error = %err, "widget call failed");
        }
        let effects = controls.into_effects();
        self.apply_effects(id, effects);
    }

    fn apply_effects(&mut self, session_id: SessionId, effects: Vec<Effect>) {
        for effect in effects {
            let Some(session) = self
                .current
                .as_mut()
                .filter(|session| session.id == session_id && !session.finalized)
            else {
                trace!("dropping effects for a closed session");
                return;
            };

            match effect {
                Effect::Status(text) => self.hud.status = text,
                Effect::Footnote(text) => self.hud.footnote = text,
                Effect::Hint(intensity) => self.cues.push(AudioCue::Hint { intensity }),
                Effect::RegisterKey(handle, handler) => {
                    session.keys.insert(handle, handler);
                    session.disposers.push(SessionDisposer::ReleaseKey(handle));
                }
                Effect::ReleaseKey(handle) => {
                    session.keys.remove(handle);
                }
                Effect::OnTeardown(disposer) => session.disposers.push(SessionDisposer::Custom(disposer)),
                Effect::RequestFrame => {
                    if session.widget_frame.is_none() {
                        session.widget_frame = Some(self.frames.request(session_id, FrameTarget::Widget));
                    }
                }
                Effect::CancelFrame => {
                    if let Some(frame) = session.widget_frame.take() {
                        self.frames.cancel(frame);
                    }
                }
                Effect::Complete(detail) => self.finalize(Verdict::Pass, detail),
                Effect::Fail(detail) => self.finalize(Verdict::Fail, detail),
                Effect::Cancel(reason) => {
                    if session.mode == SessionMode::Inside {
                        self.cancel_inside(&reason);
                    } else {
                        debug!(reason = %reason, "cancel ignored outside inside mode");
                    }
                }
            }
        }
    }

    // =========================================================================
    // OUTCOMES
    // =========================================================================

    /// Fix the session outcome, report it, and tear down.
    ///
    /// No-op without a live, unfinalized session.
    pub fn finalize(&mut self, verdict: Verdict, detail: Value) {
        let now = self.clock.now_ms();
        let Some(session) = self.current.as_mut() else {
            debug!("finalize without a session");
            return;
        };
        if session.finalized {
            debug!(session = %session.id, "session already finalized");
            return;
        }
        session.finalized = true;
        if let Some(frame) = session.timer_frame.take() {
            self.frames.cancel(frame);
        }

        let detail = Detail::sanitize(&detail);
        let (status, overlay, tone, cue) = match verdict {
            Verdict::Pass => (
                self.translations.get("status.success", "PUZZLE CLEARED"),
                self.translations.get("overlay.success", "ACCESS GRANTED"),
                Tone::Success,
                AudioCue::Success,
            ),
            Verdict::Fail => (
                self.translations.get("status.fail", "PUZZLE FAILED"),
                self.translations.get("overlay.fail", "ACCESS DENIED"),
                Tone::Danger,
                AudioCue::Fail,
            ),
        };
        self.hud.status = status;
        self.cues.push(cue);

        let event = match session.mode {
            SessionMode::Inside => HostEvent::InsideFinish(InsideFinish {
                result: verdict.is_pass(),
                detail,
            }),
            SessionMode::Standard => {
                let elapsed_ms = session.elapsed_ms(now);
                let trace = build_trace(&session.game_id, session.difficulty, verdict, &detail);
                let client_proof = build_client_proof(&session.seed, &trace, elapsed_ms);
                HostEvent::Result(MinigameResult {
                    result: verdict,
                    detail,
                    elapsed_ms,
                    trace,
                    client_proof,
                    seed: session.seed.clone(),
                    seed_signature: session.seed_signature.clone(),
                    game_id: session.game_id.clone(),
                    difficulty: session.difficulty,
                })
            }
        };
        info!(session = %session.id, game_id = %session.game_id, result = verdict.as_str(), "session finalized");
        self.bridge.send(event);

        self.hud.show_overlay(overlay, tone, now, self.config.overlay_timeout_ms);
        self.teardown();
    }

    /// Abandon an inside-mode session without a result.
    pub fn cancel_inside(&mut self, reason: &str) {
        let now = self.clock.now_ms();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.mode != SessionMode::Inside || session.finalized {
            return;
        }
        session.finalized = true;
        if let Some(frame) = session.timer_frame.take() {
            self.frames.cancel(frame);
        }

        let reason = if reason.is_empty() { "cancelled" } else { reason };
        info!(session = %session.id, reason, "inside session cancelled");
        self.bridge.send(HostEvent::InsideCancel(InsideCancel { reason: reason.to_string() }));

        self.hud.status = self.t("status.cancel", "OPERATION ABORTED");
        self.cues.push(AudioCue::Fail);
        let overlay = self.t("overlay.fail", "ACCESS DENIED");
        self.hud.show_overlay(overlay, Tone::Danger, now, self.config.overlay_timeout_ms);
        self.teardown();
    }

    /// Fail the live session on the host's behalf (`minigame:stop`).
    pub fn fail_current(&mut self, reason: Option<&str>) {
        let Some(mode) = self.current.as_ref().map(|session| session.mode) else {
            return;
        };
        let reason = reason.filter(|r| !r.is_empty()).unwrap_or("server");
        if mode == SessionMode::Inside && reason == "escape" {
            self.cancel_inside(reason);
            return;
        }
        self.finalize(Verdict::Fail, json!({ "code": reason }));
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Drop the live session: cancel its frames, run its disposers, stop and
    /// destroy the widget, clear the game root. Failures are logged and
    /// cleanup carries on.
    pub fn teardown(&mut self) {
        let Some(mut session) = self.current.take() else {
            return;
        };

        session.timer_frame = None;
        session.widget_frame = None;
        self.frames.cancel_session(session.id);

        for disposer in session.disposers.drain(..) {
            let result = match disposer {
                SessionDisposer::ReleaseKey(handle) => {
                    session.keys.remove(handle);
                    Ok(())
                }
                SessionDisposer::Custom(cleanup) => cleanup(),
            };
            if let Err(err) = result {
                warn!(session = %session.id, error = %err, "session disposer failed");
            }
        }
        if let Err(err) = session.widget.stop() {
            warn!(session = %session.id, error = %err, "widget stop failed");
        }
        if let Err(err) = session.widget.destroy() {
            warn!(session = %session.id, error = %err, "widget destroy failed");
        }
        session.keys.clear();
        self.hud.mounted = None;
        debug!(session = %session.id, "session torn down");
    }

    /// Hide everything and drop the session without reporting.
    pub fn close(&mut self) {
        self.hud.visible = false;
        self.teardown();
        self.hud.render_idle();
    }

    /// Switch translation table. Failures keep the current table.
    pub fn set_locale(&mut self, locale: &str) {
        let Some(dir) = &self.config.locale_dir else {
            debug!(locale, "no locale directory configured");
            return;
        };
        match Translations::load(dir, locale) {
            Ok(table) => {
                info!(locale, "locale loaded");
                self.translations = table;
            }
            Err(err) => warn!(locale, error = %err, "failed to load locale"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::network::bridge::RecordingBridge;
    use crate::proof::verify_client_proof;
    use crate::session::clock::ManualClock;
    use crate::session::detail::DetailValue;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Widget driven entirely by key presses.
    struct Dummy {
        log: Log,
        base_seed: String,
    }

    impl GameWidget for Dummy {
        fn start(&mut self, setup: WidgetSetup, controls: &mut Controls<'_>) -> Result<(), WidgetError> {
            self.log.borrow_mut().push(format!("start:{}:{}", self.base_seed, setup.time_limit_ms));

            controls.register_key_down(|event, controls| {
                match event.key.as_str() {
                    "p" => {
                        controls.complete(json!({ "score": 5, "unsafeField": { "nested": 1 } }));
                        controls.set_status("AFTER");
                    }
                    "2" => {
                        controls.complete(json!({ "code": "first" }));
                        controls.complete(json!({ "code": "second" }));
                    }
                    "f" => controls.fail(json!({ "code": "dummy_fail" })),
                    "c" => controls.cancel("dummy"),
                    "b" => {
                        controls.complete(json!({}));
                        controls.cancel("late");
                    }
                    "x" => return Err(WidgetError::InvalidConfig("x".to_string())),
                    "r" => controls.request_frame(),
                    _ => {}
                }
                Ok(())
            });
            let log = Rc::clone(&self.log);
            controls.register_key_down(move |event, _| {
                log.borrow_mut().push(format!("second:{}", event.key));
                Ok(())
            });
            let log = Rc::clone(&self.log);
            controls.on_teardown(move || {
                log.borrow_mut().push("disposed".to_string());
                Err(WidgetError::Cleanup("dummy".to_string()))
            });
            Ok(())
        }

        fn on_frame(&mut self, _now_ms: f64, _controls: &mut Controls<'_>) -> Result<(), WidgetError> {
            self.log.borrow_mut().push(format!("frame:{}", self.base_seed));
            Ok(())
        }

        fn stop(&mut self) -> Result<(), WidgetError> {
            self.log.borrow_mut().push(format!("stop:{}", self.base_seed));
            Ok(())
        }

        fn destroy(&mut self) -> Result<(), WidgetError> {
            self.log.borrow_mut().push(format!("destroy:{}", self.base_seed));
            Err(WidgetError::Cleanup("destroy".to_string()))
        }
    }

    struct Fixture {
        controller: SessionController,
        clock: ManualClock,
        bridge: RecordingBridge,
        log: Log,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(1000.0);
        let bridge = RecordingBridge::new();
        let log: Log = Rc::default();

        let mut widgets = WidgetRegistry::with_defaults();
        let dummy_log = Rc::clone(&log);
        widgets.register("dummy", move |ctx| {
            Box::new(Dummy { log: Rc::clone(&dummy_log), base_seed: ctx.base_seed.clone() })
        });

        let controller = SessionController::new(SessionConfig::default(), widgets, clock.clone(), bridge.clone());
        Fixture { controller, clock, bridge, log }
    }

    fn start(game_id: &str, seed: &str, time_limit_ms: u64) -> StartRequest {
        StartRequest {
            game_id: Some(game_id.to_string()),
            difficulty: Some(json!(1)),
            time_limit_ms: Some(json!(time_limit_ms)),
            seed: Some(json!(seed)),
            ..StartRequest::default()
        }
    }

    fn inside(game_id: &str) -> InsidePayload {
        InsidePayload {
            game_id: Some(game_id.to_string()),
            seed: Some(json!("room")),
            ..InsidePayload::default()
        }
    }

    fn press(controller: &mut SessionController, key: &str) {
        controller.key_down(&KeyEvent::new(key));
    }

    fn results(bridge: &RecordingBridge) -> Vec<MinigameResult> {
        bridge
            .events()
            .into_iter()
            .filter_map(|event| match event {
                HostEvent::Result(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lockpick_scenario() {
        let Fixture { mut controller, clock, bridge, .. } = fixture();
        controller.start(start("lockpick", "abc", 20_000));

        assert_eq!(controller.state(), ControllerState::Active);
        assert_eq!(controller.hud().timer.label(), "20.0");
        assert_eq!(controller.hud().timer.ratio, 1.0);
        assert_eq!(controller.hud().title, "LOCKPICK");
        assert_eq!(controller.hud().tier, "CHEAP");
        assert_eq!(controller.hud().status, "PIN 1 / 4");

        // The pointer starts inside the first window, then sweeps right,
        // bounces off the end and comes back for the last pin.
        controller.pump_frames();
        press(&mut controller, " ");
        for at in [1431.0, 1752.0] {
            clock.set(at);
            controller.pump_frames();
            press(&mut controller, " ");
        }
        clock.set(1903.0);
        controller.pump_frames();
        clock.set(2804.0);
        controller.pump_frames();
        press(&mut controller, " ");

        let sent = results(&bridge);
        assert_eq!(sent.len(), 1);
        let result = &sent[0];
        assert_eq!(result.result, Verdict::Pass);
        assert_eq!(result.elapsed_ms, 1804);
        assert_eq!(result.trace, "lockpick|PASS|lockpick_clear|final|1|0");
        assert_eq!(result.client_proof, "4c28cd78");
        assert!(verify_client_proof("abc", &result.trace, result.elapsed_ms, &result.client_proof));
        assert_eq!(result.detail.number("attempts").and_then(|n| n.as_u64()), Some(4));
        assert_eq!(result.game_id, "lockpick");
        assert_eq!(result.seed, "abc");

        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.hud().status, "PUZZLE CLEARED");
        assert_eq!(controller.hud().overlay.as_ref().map(|o| o.message.as_str()), Some("ACCESS GRANTED"));
        assert_eq!(controller.take_cues().last(), Some(&AudioCue::Success));
    }

    #[test]
    fn test_unknown_game_id_is_ignored() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("slots", "abc", 20_000));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.hud(), &Hud::idle());
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_seed_keeps_game_id_spelling() {
        let Fixture { mut controller, bridge, log, .. } = fixture();
        controller.start(start("DumMy", "abc", 20_000));
        assert!(log.borrow().contains(&"start:abc:DumMy:1:20000".to_string()));
        assert_eq!(controller.hud().mounted.as_deref(), Some("dummy"));

        press(&mut controller, "f");
        let sent = results(&bridge);
        assert_eq!(sent[0].game_id, "dummy");
        assert_eq!(sent[0].trace, "dummy|FAIL|dummy_fail|final|1|0");
    }

    #[test]
    fn test_inside_seed_uses_resolved_game_id() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start_inside(inside("DUMMY"));
        assert!(log.borrow().contains(&"start:room:dummy:1:15000".to_string()));
    }

    #[test]
    fn test_time_limit_clamped() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "s", 999_999));
        assert_eq!(controller.session().map(|s| s.time_limit_ms), Some(60_000));

        let mut request = start("dummy", "s", 0);
        request.time_limit_ms = Some(json!("soon"));
        controller.start(request);
        assert_eq!(controller.session().map(|s| s.time_limit_ms), Some(5_000));

        controller.start(StartRequest { game_id: Some("dummy".into()), ..StartRequest::default() });
        assert_eq!(controller.session().map(|s| s.time_limit_ms), Some(20_000));
        assert!(log.borrow().contains(&"start::dummy:1:20000".to_string()));
    }

    #[test]
    fn test_detail_is_sanitized_and_late_effects_dropped() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("dummy", "seed-1", 20_000));
        press(&mut controller, "p");

        let sent = results(&bridge);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].detail.len(), 1);
        assert_eq!(sent[0].detail.get("score"), Some(&DetailValue::from(5i64)));
        assert_eq!(sent[0].trace, "dummy|PASS|ok|final|1|0");
        // The status set after `complete` in the same batch never lands.
        assert_eq!(controller.hud().status, "PUZZLE CLEARED");
    }

    #[test]
    fn test_finalize_at_most_once() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "2");
        controller.finalize(Verdict::Fail, json!({ "code": "again" }));
        controller.fail_current(None);

        let sent = results(&bridge);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].detail.text("code"), Some("first"));
    }

    #[test]
    fn test_finalize_then_cancel_inside() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start_inside(inside("dummy"));
        press(&mut controller, "b");
        controller.cancel_inside("again");

        assert_eq!(
            bridge.events(),
            vec![HostEvent::InsideFinish(InsideFinish { result: true, detail: Detail::new() })]
        );
    }

    #[test]
    fn test_cancel_twice() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start_inside(inside("dummy"));
        press(&mut controller, "c");
        controller.cancel_inside("again");

        assert_eq!(
            bridge.events(),
            vec![HostEvent::InsideCancel(InsideCancel { reason: "dummy".to_string() })]
        );
        assert_eq!(controller.hud().status, "OPERATION ABORTED");
    }

    #[test]
    fn test_cancel_ignored_in_standard_mode() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "c");
        controller.cancel_inside("host");
        assert!(bridge.is_empty());
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        assert_eq!(controller.key_handler_count(), 2);

        controller.fail_current(Some("server"));

        assert_eq!(controller.key_handler_count(), 0);
        assert!(controller.frames().is_empty());
        let log = log.borrow();
        // Failing disposers and destroy are logged; cleanup still completes.
        assert!(log.contains(&"disposed".to_string()));
        assert!(log.contains(&"stop:s:dummy:1".to_string()));
        assert!(log.contains(&"destroy:s:dummy:1".to_string()));
    }

    #[test]
    fn test_key_handler_error_does_not_stop_dispatch() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "x");
        assert!(log.borrow().contains(&"second:x".to_string()));
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[test]
    fn test_repeat_keydown_ignored() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        controller.key_down(&KeyEvent::new("k").repeated());
        controller.key_up(&KeyEvent::new("k"));
        assert!(!log.borrow().iter().any(|line| line.starts_with("second:")));
    }

    #[test]
    fn test_countdown_is_monotonic_with_single_timeout() {
        let Fixture { mut controller, clock, bridge, .. } = fixture();
        controller.start(start("lockpick", "abc", 5_000));

        let mut last = f64::INFINITY;
        for _ in 0..80 {
            clock.advance(100.0);
            controller.pump_frames();
            let remaining = controller.hud().timer.remaining_ms;
            assert!(remaining <= last);
            last = remaining;
        }

        let sent = results(&bridge);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].result, Verdict::Fail);
        assert_eq!(sent[0].detail.text("code"), Some("timeout"));
        assert_eq!(sent[0].elapsed_ms, 5_000);
        assert_eq!(sent[0].client_proof, "47a94eb6");
        assert_eq!(controller.hud().timer.remaining_ms, 0.0);
    }

    #[test]
    fn test_escape_routing() {
        let Fixture { mut controller, bridge, .. } = fixture();

        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "Escape");
        controller.start_inside(inside("dummy"));
        press(&mut controller, "Escape");

        let events = bridge.events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            HostEvent::Result(result) => {
                assert_eq!(result.result, Verdict::Fail);
                assert_eq!(result.detail.text("code"), Some("escape"));
            }
            other => panic!("expected result, got {other:?}"),
        }
        assert_eq!(events[1], HostEvent::InsideCancel(InsideCancel { reason: "escape".to_string() }));
    }

    #[test]
    fn test_stop_with_escape_cancels_inside() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start_inside(inside("dummy"));
        controller.handle_command(HostCommand::Stop { reason: Some("escape".to_string()) });
        assert_eq!(bridge.events(), vec![HostEvent::InsideCancel(InsideCancel { reason: "escape".to_string() })]);
    }

    #[test]
    fn test_second_start_tears_down_first() {
        let Fixture { mut controller, clock, bridge, log } = fixture();
        controller.start(start("dummy", "one", 20_000));
        let first = controller.session().map(|s| s.id);

        clock.set(4000.0);
        controller.start(start("dummy", "two", 20_000));

        let log = log.borrow();
        let stop = log.iter().position(|l| l == "stop:one:dummy:1").unwrap();
        let started = log.iter().position(|l| l.starts_with("start:two:")).unwrap();
        assert!(stop < started);

        let session = controller.session().unwrap();
        assert_ne!(Some(session.id), first);
        assert_eq!(session.started_at, 4000.0);
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_stale_frames_are_ignored() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "one", 20_000));
        press(&mut controller, "r");
        let stale: Vec<ScheduledFrame> = controller.frames().pending().copied().collect();
        assert_eq!(stale.len(), 2);

        controller.start(start("dummy", "two", 20_000));
        let timer = controller.hud().timer;
        for frame in stale {
            controller.handle_frame(frame, 50_000.0);
        }

        assert_eq!(controller.hud().timer, timer);
        assert!(!log.borrow().iter().any(|l| l.starts_with("frame:")));
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[test]
    fn test_widget_frames_run_once_per_request() {
        let Fixture { mut controller, log, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "r");
        press(&mut controller, "r");
        controller.pump_frames();
        controller.pump_frames();
        let frames = log.borrow().iter().filter(|l| l.starts_with("frame:")).count();
        assert_eq!(frames, 1);
    }

    #[test]
    fn test_focus_loss_and_resume() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));

        controller.blur();
        assert!(controller.hud().focus_lost);
        assert_eq!(controller.hud().status, "FOCUS LOST - CLICK TO RESUME");

        controller.pointer(None);
        assert!(!controller.hud().focus_lost);
        assert_eq!(controller.hud().status, "RESUMED CONTROL");
        assert_eq!(controller.state(), ControllerState::Active);
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_close_returns_to_idle_silently() {
        let Fixture { mut controller, bridge, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        controller.handle_command(HostCommand::Close);

        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(bridge.is_empty());
        let hud = controller.hud();
        assert!(!hud.visible);
        assert_eq!(hud.title, "MINIGAME READY");
        assert_eq!(hud.status, "WAITING FOR SIGNAL");
        assert_eq!(hud.footnote, "Stand by for server instructions");
        assert_eq!(hud.timer.remaining_ms, 0.0);
        assert_eq!(hud.timer.ratio, 1.0);
    }

    #[test]
    fn test_overlay_auto_hides() {
        let Fixture { mut controller, clock, .. } = fixture();
        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "f");
        assert!(controller.hud().overlay.is_some());

        clock.advance(1199.0);
        controller.pump_frames();
        assert!(controller.hud().overlay.is_some());
        clock.advance(1.0);
        controller.pump_frames();
        assert!(controller.hud().overlay.is_none());
    }

    #[test]
    fn test_inside_defaults() {
        let Fixture { mut controller, .. } = fixture();
        controller.start_inside(InsidePayload {
            game_id: Some("nope".to_string()),
            difficulty: Some(json!("hard")),
            params: Some(json!({ "timeLimitSec": 90 })),
            ..InsidePayload::default()
        });

        let session = controller.session().unwrap();
        assert_eq!(session.game_id, "inside");
        assert_eq!(session.difficulty, 3);
        assert_eq!(session.time_limit_ms, 30_000);
        assert_eq!(session.mode, SessionMode::Inside);
        assert!(session.seed.starts_with("inside:"));
        assert_eq!(controller.hud().title, "INSIDE TASK");
        assert_eq!(controller.hud().tier, "HARD");
        assert_eq!(controller.hud().status, "COLLECT ALL KEYS");
    }

    #[test]
    fn test_inside_overrides() {
        let Fixture { mut controller, .. } = fixture();
        controller.start_inside(InsidePayload {
            game_id: Some("dummy".to_string()),
            title: Some("VAULT".to_string()),
            subtitle: Some("GO".to_string()),
            footnote: Some("quietly".to_string()),
            tier: Some(json!("elite")),
            ..inside("dummy")
        });
        let hud = controller.hud();
        assert_eq!(hud.title, "VAULT");
        assert_eq!(hud.status, "GO");
        assert_eq!(hud.footnote, "quietly");
        assert_eq!(hud.tier, "ELITE");
        assert_eq!(controller.session().map(|s| s.time_limit_ms), Some(15_000));
    }

    #[test]
    fn test_set_locale() {
        let dir = std::env::temp_dir().join(format!("minigame-locale-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("de.json"), r#"{"status":{"success":"GESCHAFFT"}}"#).unwrap();

        let clock = ManualClock::new(0.0);
        let bridge = RecordingBridge::new();
        let config = SessionConfig { locale_dir: Some(dir.clone()), ..SessionConfig::default() };
        let mut widgets = WidgetRegistry::new();
        widgets.register("dummy", |ctx| {
            Box::new(Dummy { log: Rc::default(), base_seed: ctx.base_seed.clone() })
        });
        let mut controller = SessionController::new(config, widgets, clock, bridge);

        controller.set_locale("../etc");
        controller.set_locale("fr");
        assert_eq!(controller.translations().locale(), "en");

        controller.handle_command(HostCommand::SetLocale { locale: Some("de".to_string()) });
        assert_eq!(controller.translations().locale(), "de");

        controller.start(start("dummy", "s", 20_000));
        press(&mut controller, "p");
        assert_eq!(controller.hud().status, "GESCHAFFT");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
