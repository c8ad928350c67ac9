use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::events::{EventBus, EventKind, GameEvent, GameStateUpdate, SubscriptionId};
use crate::keystroke::KeystrokeKind;
use crate::stats::{GameStats, GameStatsSnapshot, WpmSample};
use crate::text::{TextError, TextProvider, TextSample};

/// Per-game behavior settings.
///
/// `forbid_incorrect_entries` deliberately has no default: whether a mistake
/// blocks the cursor is a choice the caller must make (the CLI maps
/// `--strict` onto it).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameOptions {
    pub forbid_incorrect_entries: bool,
    pub target_frame_rate: u32,
}

impl GameOptions {
    pub fn new(forbid_incorrect_entries: bool) -> Self {
        Self {
            forbid_incorrect_entries,
            target_frame_rate: 60,
        }
    }

    pub fn with_frame_rate(mut self, frames_per_second: u32) -> Self {
        self.target_frame_rate = frames_per_second.max(1);
        self
    }

    /// Poll/refresh interval the caller's loop should use
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_frame_rate))
    }
}

/// One key event, reduced to the four cases the engine distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Escape,
    Backspace,
    Char(char),
    /// any other non-printable key; ignored
    Control,
}

/// The state machine driving one game: classifies keystrokes against the
/// target text, applies the acceptance policy, detects completion, and
/// publishes every state change on the event bus.
///
/// The engine owns its [`GameStats`] but never feeds it directly: key and
/// backspace events travel over the bus, and the stats engine is just one
/// subscriber among any number of observers.
pub struct GameEngine {
    target_text: String,
    user_input: Vec<char>,
    is_over: bool,
    options: GameOptions,
    provider: Box<dyn TextProvider>,
    bus: Arc<EventBus>,
    stats: Arc<Mutex<GameStats>>,
    subscriptions: [SubscriptionId; 2],
    current_sample: Option<TextSample>,
}

impl GameEngine {
    pub fn new(provider: Box<dyn TextProvider>, options: GameOptions, bus: Arc<EventBus>) -> Self {
        Self::with_stats(provider, options, bus, GameStats::new())
    }

    /// Construct with a caller-supplied stats engine (tests inject one with
    /// a manual clock)
    pub fn with_stats(
        provider: Box<dyn TextProvider>,
        options: GameOptions,
        bus: Arc<EventBus>,
        stats: GameStats,
    ) -> Self {
        let stats = Arc::new(Mutex::new(stats));

        let key_stats = Arc::clone(&stats);
        let key_subscription = bus.subscribe(EventKind::KeyPressed, move |event| {
            if let GameEvent::KeyPressed { character, kind, .. } = event {
                key_stats.lock().unwrap().log_keystroke(*character, *kind);
            }
        });

        let backspace_stats = Arc::clone(&stats);
        let backspace_subscription = bus.subscribe(EventKind::BackspacePressed, move |_| {
            backspace_stats.lock().unwrap().log_backspace();
        });

        Self {
            target_text: String::new(),
            user_input: Vec::new(),
            is_over: true,
            options,
            provider,
            bus,
            stats,
            subscriptions: [key_subscription, backspace_subscription],
            current_sample: None,
        }
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn user_input(&self) -> String {
        self.user_input.iter().collect()
    }

    pub fn is_over(&self) -> bool {
        self.is_over
    }

    pub fn is_running(&self) -> bool {
        !self.is_over && self.stats.lock().unwrap().is_running()
    }

    pub fn options(&self) -> GameOptions {
        self.options
    }

    /// Metadata of the sample currently being typed
    pub fn current_sample(&self) -> Option<&TextSample> {
        self.current_sample.as_ref()
    }

    pub fn snapshot(&self) -> GameStatsSnapshot {
        self.stats.lock().unwrap().create_snapshot()
    }

    pub fn wpm_time_series(&self) -> Vec<WpmSample> {
        self.stats.lock().unwrap().wpm_time_series()
    }

    pub fn consistency(&self) -> f64 {
        self.stats.lock().unwrap().consistency()
    }

    /// Pull a fresh text from the provider and reset for a new game.
    /// A fetch failure propagates untouched; retrying is the provider's
    /// business, not ours.
    pub fn start_new_game(&mut self) -> Result<(), TextError> {
        debug!("new game starting");
        let sample = self.provider.fetch()?;
        self.begin(sample);
        Ok(())
    }

    /// Like `start_new_game`, but asks the provider for the sample following
    /// the current one
    pub fn start_next_game(&mut self) -> Result<(), TextError> {
        debug!("next game starting");
        let current = self.current_sample.as_ref().and_then(|s| s.source_id);
        let sample = self.provider.fetch_after(current)?;
        self.begin(sample);
        Ok(())
    }

    /// Replay the current sample from the top
    pub fn restart(&mut self) {
        if let Some(sample) = self.current_sample.clone() {
            debug!("restarting current game");
            self.begin(sample);
        }
    }

    fn begin(&mut self, sample: TextSample) {
        self.target_text = sample.text.clone();
        self.current_sample = Some(sample);
        self.user_input.clear();
        self.stats.lock().unwrap().start();
        self.is_over = false;

        // a well-behaved provider never hands out empty text; if one does,
        // the session is over before it starts
        if self.target_text.is_empty() {
            self.is_over = true;
            self.stats.lock().unwrap().stop();
        }

        self.publish_state_update();
    }

    /// Feed one key event through the state machine. Returns `false` only
    /// for the quit key, signalling the caller to leave its input loop.
    pub fn process_key_press(&mut self, key: KeyInput) -> bool {
        // Over is terminal: once a game finished, only the quit key means
        // anything. This also keeps the stopped stats frozen.
        if self.is_over && !matches!(key, KeyInput::Escape) {
            return true;
        }

        match key {
            KeyInput::Escape => {
                self.is_over = true;
                self.stats.lock().unwrap().stop();
                info!("game quit by user");
                self.bus.publish(&GameEvent::GameQuit);
                false
            }
            KeyInput::Backspace => {
                if self.user_input.pop().is_some() {
                    self.bus.publish(&GameEvent::BackspacePressed);
                    self.publish_state_update();
                }
                true
            }
            KeyInput::Control => true,
            KeyInput::Char(character) => {
                let position = self.user_input.len();
                let kind = self.classify(character);
                trace!(%character, %kind, "key processed");
                self.bus.publish(&GameEvent::KeyPressed {
                    character,
                    kind,
                    position,
                });

                if !self.options.forbid_incorrect_entries || kind == KeystrokeKind::Correct {
                    self.user_input.push(character);
                }

                self.check_end_condition();
                self.publish_state_update();
                true
            }
        }
    }

    fn classify(&self, typed: char) -> KeystrokeKind {
        let position = self.user_input.len();
        match self.target_text.chars().nth(position) {
            None => KeystrokeKind::Extra,
            Some(expected) if expected == typed => KeystrokeKind::Correct,
            Some(_) => KeystrokeKind::Incorrect,
        }
    }

    fn check_end_condition(&mut self) {
        if self.is_over {
            return;
        }
        if self.user_input.len() == self.target_text.chars().count()
            && self.user_input().eq(&self.target_text)
        {
            self.is_over = true;
            self.stats.lock().unwrap().stop();
            info!("game finished");
            self.bus.publish(&GameEvent::GameEnded);
        }
    }

    /// Re-announce the current state. The app loop calls this on ticks so
    /// subscribers see the elapsed time advance between keystrokes.
    pub fn publish_state_update(&self) {
        trace!("publishing state update");
        let statistics = self.stats.lock().unwrap().create_snapshot();
        self.bus.publish(&GameEvent::StateUpdated(GameStateUpdate {
            target_text: self.target_text.clone(),
            user_input: self.user_input(),
            statistics,
            is_over: self.is_over,
        }));
    }
}

impl Drop for GameEngine {
    fn drop(&mut self) {
        for id in self.subscriptions {
            self.bus.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ManualClock;
    use crate::text::StaticTextProvider;

    struct FailingProvider;

    impl TextProvider for FailingProvider {
        fn fetch(&self) -> Result<TextSample, TextError> {
            Err(TextError::Repository(rusqlite::Error::InvalidQuery))
        }
    }

    fn engine_for(target: &str, forbid_incorrect: bool) -> GameEngine {
        let bus = Arc::new(EventBus::new());
        let clock = ManualClock::new();
        let mut engine = GameEngine::with_stats(
            Box::new(StaticTextProvider::new(target)),
            GameOptions::new(forbid_incorrect),
            bus,
            GameStats::with_clock(Arc::new(clock)),
        );
        engine.start_new_game().unwrap();
        engine
    }

    #[test]
    fn test_new_game_resets_state() {
        let engine = engine_for("hello", true);
        assert_eq!(engine.target_text(), "hello");
        assert_eq!(engine.user_input(), "");
        assert!(!engine.is_over());
        assert!(engine.is_running());
    }

    #[test]
    fn test_all_correct_input_completes_game() {
        let mut engine = engine_for("hello", true);
        for c in "hello".chars() {
            assert!(engine.process_key_press(KeyInput::Char(c)));
        }

        assert!(engine.is_over());
        assert_eq!(engine.user_input(), "hello");
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.accuracy, 100.0);
        assert_eq!(snapshot.chars.correct, 5);
        assert!(!snapshot.is_running);
    }

    #[test]
    fn test_forbidding_policy_blocks_incorrect_entry() {
        let mut engine = engine_for("abc", true);
        assert!(engine.process_key_press(KeyInput::Char('x')));

        assert_eq!(engine.user_input(), "");
        assert!(!engine.is_over());
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.chars.incorrect, 1);
        assert_eq!(snapshot.chars.correct, 0);
    }

    #[test]
    fn test_allowing_policy_appends_incorrect_entry() {
        let mut engine = engine_for("abc", false);
        for c in "xabc".chars() {
            engine.process_key_press(KeyInput::Char(c));
        }

        // extra characters shift the comparison, so equality never holds
        assert_eq!(engine.user_input(), "xabc");
        assert!(!engine.is_over());
    }

    #[test]
    fn test_extra_classification_beyond_target() {
        let mut engine = engine_for("ab", false);
        engine.process_key_press(KeyInput::Char('a'));
        engine.process_key_press(KeyInput::Char('x'));
        engine.process_key_press(KeyInput::Char('y'));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.chars.correct, 1);
        assert_eq!(snapshot.chars.incorrect, 1);
        assert_eq!(snapshot.chars.extra, 1);
    }

    #[test]
    fn test_backspace_removes_last_character() {
        let mut engine = engine_for("abc", true);
        engine.process_key_press(KeyInput::Char('a'));
        assert_eq!(engine.user_input(), "a");

        assert!(engine.process_key_press(KeyInput::Backspace));
        assert_eq!(engine.user_input(), "");

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.chars.corrections, 1);
        // the correction consumed the correct entry
        assert_eq!(snapshot.chars.correct, 0);
    }

    #[test]
    fn test_backspace_on_empty_buffer_is_noop() {
        let mut engine = engine_for("abc", true);
        assert!(engine.process_key_press(KeyInput::Backspace));
        assert_eq!(engine.user_input(), "");
        assert_eq!(engine.snapshot().chars.corrections, 0);
    }

    #[test]
    fn test_control_keys_are_ignored() {
        let mut engine = engine_for("abc", true);
        assert!(engine.process_key_press(KeyInput::Control));
        assert_eq!(engine.user_input(), "");
        assert_eq!(engine.snapshot().chars, Default::default());
    }

    #[test]
    fn test_escape_quits() {
        let mut engine = engine_for("abc", true);
        engine.process_key_press(KeyInput::Char('a'));

        assert!(!engine.process_key_press(KeyInput::Escape));
        assert!(engine.is_over());
        assert!(!engine.snapshot().is_running);
    }

    #[test]
    fn test_correcting_a_blocked_error_still_completes() {
        let mut engine = engine_for("ab", true);
        engine.process_key_press(KeyInput::Char('x'));
        engine.process_key_press(KeyInput::Char('a'));
        engine.process_key_press(KeyInput::Char('b'));

        assert!(engine.is_over());
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.chars.correct, 2);
        assert_eq!(snapshot.chars.incorrect, 1);
        assert!(snapshot.accuracy > 66.0 && snapshot.accuracy < 67.0);
    }

    #[test]
    fn test_empty_target_degenerates_to_over() {
        let bus = Arc::new(EventBus::new());
        let mut engine = GameEngine::new(
            Box::new(StaticTextProvider::new("")),
            GameOptions::new(true),
            bus,
        );
        engine.start_new_game().unwrap();
        assert!(engine.is_over());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_restart_replays_same_text() {
        let mut engine = engine_for("hi", true);
        engine.process_key_press(KeyInput::Char('h'));
        engine.process_key_press(KeyInput::Char('i'));
        assert!(engine.is_over());

        engine.restart();
        assert!(!engine.is_over());
        assert_eq!(engine.target_text(), "hi");
        assert_eq!(engine.user_input(), "");
        assert_eq!(engine.snapshot().chars, Default::default());
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let bus = Arc::new(EventBus::new());
        let mut engine =
            GameEngine::new(Box::new(FailingProvider), GameOptions::new(true), bus);
        assert!(engine.start_new_game().is_err());
    }

    #[test]
    fn test_frame_delay() {
        let options = GameOptions::new(false).with_frame_rate(60);
        assert_eq!(options.frame_delay(), Duration::from_millis(16));
        let options = GameOptions::new(false).with_frame_rate(20);
        assert_eq!(options.frame_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_completion_publishes_game_ended() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bus = Arc::new(EventBus::new());
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        bus.subscribe(EventKind::GameEnded, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut engine = GameEngine::new(
            Box::new(StaticTextProvider::new("hi")),
            GameOptions::new(true),
            Arc::clone(&bus),
        );
        engine.start_new_game().unwrap();
        engine.process_key_press(KeyInput::Char('h'));
        engine.process_key_press(KeyInput::Char('i'));
        assert_eq!(ended.load(Ordering::SeqCst), 1);

        // typing past the end must not re-announce the finish
        engine.process_key_press(KeyInput::Char('!'));
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }
}
