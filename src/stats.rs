use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::keystroke::{CharacterStats, KeystrokeHistory, KeystrokeKind, KeystrokeLog};
use crate::util;

/// character recorded on synthetic Correction entries
pub const BACKSPACE_CHAR: char = '\u{8}';

/// Monotonic time source. Injected so elapsed-time behavior is testable
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests
#[derive(Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// Immutable point-in-time copy of the derived statistics, safe to hand to
/// a renderer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameStatsSnapshot {
    pub words_per_minute: f64,
    pub accuracy: f64,
    pub chars: CharacterStats,
    pub elapsed: Duration,
    pub is_running: bool,
}

impl GameStatsSnapshot {
    pub fn empty() -> Self {
        Self {
            words_per_minute: 0.0,
            accuracy: 100.0,
            chars: CharacterStats::default(),
            elapsed: Duration::ZERO,
            is_running: false,
        }
    }
}

/// One point of the per-second WPM curve shown on the results screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WpmSample {
    pub seconds: f64,
    pub wpm: f64,
}

/// Owns the timing and keystroke history of one game and derives the live
/// metrics from them.
///
/// WPM, accuracy and the character counts are cached behind a dirty flag:
/// logging a keystroke marks them stale, the next read recomputes all three
/// in one pass. Renders between keystrokes therefore never re-walk the
/// history.
pub struct GameStats {
    history: KeystrokeHistory,
    clock: Arc<dyn Clock>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    dirty: bool,
    cached_wpm: f64,
    cached_accuracy: f64,
    cached_chars: CharacterStats,
    recalculations: u64,
}

impl GameStats {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            history: KeystrokeHistory::new(),
            clock,
            started_at: None,
            stopped_at: None,
            dirty: true,
            cached_wpm: 0.0,
            cached_accuracy: 100.0,
            cached_chars: CharacterStats::default(),
            recalculations: 0,
        }
    }

    /// Reset everything and record a fresh start timestamp. Safe to call
    /// mid-session to restart.
    pub fn start(&mut self) {
        self.reset();
        self.started_at = Some(self.clock.now());
        debug!("stats started");
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.stopped_at = None;
        self.history.clear();
        self.cached_wpm = 0.0;
        self.cached_accuracy = 100.0;
        self.cached_chars = CharacterStats::default();
        self.dirty = true;
        debug!("stats reset");
    }

    /// Freeze the elapsed time. Idempotent: stopping an already stopped
    /// engine changes nothing.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.stopped_at = Some(self.clock.now());
            debug!(
                elapsed_ms = self.elapsed_time().as_millis() as u64,
                "stats stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// Live while running, frozen once stopped, zero before the first start
    pub fn elapsed_time(&self) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => self.clock.now().duration_since(start),
            (None, _) => Duration::ZERO,
        }
    }

    /// Append a classified keystroke. Starts the timer lazily so idle time
    /// before the first key never counts against the player.
    pub fn log_keystroke(&mut self, character: char, kind: KeystrokeKind) {
        if !self.is_running() {
            self.start();
        }
        trace!(%character, %kind, "keystroke logged");
        self.history
            .add(KeystrokeLog::new(character, kind, self.clock.now()));
        self.dirty = true;
    }

    /// React to a backspace: drop the most recent typed-character entry and
    /// record the correction itself. Ignored while not running.
    pub fn log_backspace(&mut self) {
        if !self.is_running() {
            return;
        }
        trace!("backspace logged");
        self.history.remove_last_character_log();
        self.history.add(KeystrokeLog::new(
            BACKSPACE_CHAR,
            KeystrokeKind::Correction,
            self.clock.now(),
        ));
        self.dirty = true;
    }

    pub fn words_per_minute(&mut self) -> f64 {
        self.recalculate_if_dirty();
        self.cached_wpm
    }

    pub fn accuracy(&mut self) -> f64 {
        self.recalculate_if_dirty();
        self.cached_accuracy
    }

    pub fn chars(&mut self) -> CharacterStats {
        self.recalculate_if_dirty();
        self.cached_chars
    }

    /// Number of cache refills so far; lets tests assert that reads between
    /// keystrokes do not recompute
    pub fn recalculation_count(&self) -> u64 {
        self.recalculations
    }

    pub fn create_snapshot(&mut self) -> GameStatsSnapshot {
        self.recalculate_if_dirty();
        GameStatsSnapshot {
            words_per_minute: self.cached_wpm,
            accuracy: self.cached_accuracy,
            chars: self.cached_chars,
            elapsed: self.elapsed_time(),
            is_running: self.is_running(),
        }
    }

    fn recalculate_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        trace!("recalculating statistics");
        self.cached_wpm = self.history.calculate_wpm(self.elapsed_time());
        self.cached_accuracy = self.history.calculate_accuracy();
        self.cached_chars = self.history.character_stats();
        self.recalculations += 1;
        self.dirty = false;
    }

    /// Correct keystrokes bucketed into whole-second intervals since the
    /// start, in chronological order
    fn per_second_correct_counts(&self) -> Vec<(u64, usize)> {
        let Some(started_at) = self.started_at else {
            return Vec::new();
        };

        let mut buckets: HashMap<u64, usize> = HashMap::new();
        for log in self
            .history
            .iter()
            .filter(|log| log.kind == KeystrokeKind::Correct)
        {
            let secs = log.timestamp.duration_since(started_at).as_secs_f64();
            // a key pressed within the first second lands in bucket 1
            let bucket = secs.ceil().max(1.0) as u64;
            *buckets.entry(bucket).or_insert(0) += 1;
        }

        buckets.into_iter().sorted_by_key(|(sec, _)| *sec).collect()
    }

    /// Cumulative WPM per elapsed second, for the results chart
    pub fn wpm_time_series(&self) -> Vec<WpmSample> {
        let mut total = 0.0;
        self.per_second_correct_counts()
            .into_iter()
            .map(|(sec, count)| {
                total += count as f64;
                WpmSample {
                    seconds: sec as f64,
                    wpm: (60.0 / sec as f64) * total / 5.0,
                }
            })
            .collect()
    }

    /// Std-dev of correct keystrokes per whole second; lower is steadier.
    /// The final (usually partial) second is excluded.
    pub fn consistency(&self) -> f64 {
        let counts = self.per_second_correct_counts();
        if counts.len() < 2 {
            return 0.0;
        }
        let whole_seconds: Vec<f64> = counts[..counts.len() - 1]
            .iter()
            .map(|(_, count)| *count as f64)
            .collect();
        util::std_dev(&whole_seconds).unwrap_or(0.0)
    }
}

impl Default for GameStats {
    fn default() -> Self {
        Self::new()
    }
}
