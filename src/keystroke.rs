use std::time::{Duration, Instant};

/// per-keystroke verdict against the target text
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum KeystrokeKind {
    Correct,
    Incorrect,
    Extra,
    Correction,
}

impl KeystrokeKind {
    /// whether this entry records a typed character (as opposed to the act
    /// of removing one)
    pub fn is_character(&self) -> bool {
        !matches!(self, KeystrokeKind::Correction)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeystrokeLog {
    pub character: char,
    pub kind: KeystrokeKind,
    pub timestamp: Instant,
}

impl KeystrokeLog {
    pub fn new(character: char, kind: KeystrokeKind, timestamp: Instant) -> Self {
        Self {
            character,
            kind,
            timestamp,
        }
    }
}

/// per-kind counts derived from a keystroke history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharacterStats {
    pub correct: usize,
    pub incorrect: usize,
    pub extra: usize,
    pub corrections: usize,
}

/// append-only record of every evaluated keystroke in one game
#[derive(Clone, Debug, Default)]
pub struct KeystrokeHistory {
    logs: Vec<KeystrokeLog>,
}

impl KeystrokeHistory {
    pub fn new() -> Self {
        Self { logs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn add(&mut self, log: KeystrokeLog) {
        self.logs.push(log);
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }

    /// Remove the most recent typed-character entry, scanning past any
    /// Correction markers. A Correction records the act of backspacing and
    /// is never itself the character being undone.
    pub fn remove_last_character_log(&mut self) -> Option<KeystrokeLog> {
        let idx = self.logs.iter().rposition(|log| log.kind.is_character())?;
        Some(self.logs.remove(idx))
    }

    pub fn correct_count(&self) -> usize {
        self.logs
            .iter()
            .filter(|log| log.kind == KeystrokeKind::Correct)
            .count()
    }

    /// Words per minute over `elapsed`, using the standard 5-chars-per-word
    /// convention. Only correctly typed characters count toward words.
    pub fn calculate_wpm(&self, elapsed: Duration) -> f64 {
        let minutes = elapsed.as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        self.correct_count() as f64 / 5.0 / minutes
    }

    /// Accuracy in percent. An empty history, or one holding no
    /// Correct/Incorrect entries at all, reads as 100.
    pub fn calculate_accuracy(&self) -> f64 {
        if self.logs.is_empty() {
            return 100.0;
        }
        let counts = self.character_stats();
        let attempted = counts.correct + counts.incorrect;
        if attempted == 0 {
            return 100.0;
        }
        counts.correct as f64 / attempted as f64 * 100.0
    }

    pub fn character_stats(&self) -> CharacterStats {
        let mut counts = CharacterStats::default();
        for log in &self.logs {
            match log.kind {
                KeystrokeKind::Correct => counts.correct += 1,
                KeystrokeKind::Incorrect => counts.incorrect += 1,
                KeystrokeKind::Extra => counts.extra += 1,
                KeystrokeKind::Correction => counts.corrections += 1,
            }
        }
        counts
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeystrokeLog> {
        self.logs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(c: char, kind: KeystrokeKind) -> KeystrokeLog {
        KeystrokeLog::new(c, kind, Instant::now())
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(KeystrokeKind::Correct.to_string(), "Correct");
        assert_eq!(KeystrokeKind::Correction.to_string(), "Correction");
    }

    #[test]
    fn test_add_and_counts() {
        let mut history = KeystrokeHistory::new();
        history.add(log('h', KeystrokeKind::Correct));
        history.add(log('x', KeystrokeKind::Incorrect));
        history.add(log('!', KeystrokeKind::Extra));
        history.add(log('\u{8}', KeystrokeKind::Correction));

        let counts = history.character_stats();
        assert_eq!(counts.correct, 1);
        assert_eq!(counts.incorrect, 1);
        assert_eq!(counts.extra, 1);
        assert_eq!(counts.corrections, 1);
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_clear() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Correct));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.character_stats(), CharacterStats::default());
    }

    #[test]
    fn test_accuracy_empty_history() {
        let history = KeystrokeHistory::new();
        assert_eq!(history.calculate_accuracy(), 100.0);
    }

    #[test]
    fn test_accuracy_only_extra_entries() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Extra));
        history.add(log('b', KeystrokeKind::Extra));
        assert_eq!(history.calculate_accuracy(), 100.0);
    }

    #[test]
    fn test_accuracy_mixed() {
        let mut history = KeystrokeHistory::new();
        for _ in 0..4 {
            history.add(log('a', KeystrokeKind::Correct));
        }
        history.add(log('b', KeystrokeKind::Incorrect));
        assert_eq!(history.calculate_accuracy(), 80.0);
    }

    #[test]
    fn test_accuracy_in_bounds() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Incorrect));
        history.add(log('b', KeystrokeKind::Incorrect));
        assert_eq!(history.calculate_accuracy(), 0.0);
        history.add(log('c', KeystrokeKind::Correct));
        let accuracy = history.calculate_accuracy();
        assert!(accuracy > 0.0 && accuracy < 100.0);
    }

    #[test]
    fn test_wpm_zero_duration() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Correct));
        assert_eq!(history.calculate_wpm(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_wpm_counts_only_correct() {
        let mut history = KeystrokeHistory::new();
        for c in "hello".chars() {
            history.add(log(c, KeystrokeKind::Correct));
        }
        history.add(log('x', KeystrokeKind::Incorrect));
        history.add(log('y', KeystrokeKind::Extra));

        // 5 correct chars = 1 word, typed in one minute
        assert_eq!(history.calculate_wpm(Duration::from_secs(60)), 1.0);
        // same word in one second
        assert_eq!(history.calculate_wpm(Duration::from_secs(1)), 60.0);
    }

    #[test]
    fn test_remove_last_character_log() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Correct));
        history.add(log('b', KeystrokeKind::Incorrect));

        let removed = history.remove_last_character_log().unwrap();
        assert_eq!(removed.character, 'b');
        assert_eq!(removed.kind, KeystrokeKind::Incorrect);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_remove_last_character_log_skips_corrections() {
        let mut history = KeystrokeHistory::new();
        history.add(log('a', KeystrokeKind::Correct));
        history.add(log('b', KeystrokeKind::Incorrect));
        history.add(log('\u{8}', KeystrokeKind::Correction));
        history.add(log('\u{8}', KeystrokeKind::Correction));

        let removed = history.remove_last_character_log().unwrap();
        assert_eq!(removed.character, 'b');

        // corrections after the removed entry keep their relative order
        let kinds: Vec<KeystrokeKind> = history.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                KeystrokeKind::Correct,
                KeystrokeKind::Correction,
                KeystrokeKind::Correction
            ]
        );
    }

    #[test]
    fn test_remove_last_character_log_empty() {
        let mut history = KeystrokeHistory::new();
        assert!(history.remove_last_character_log().is_none());

        history.add(log('\u{8}', KeystrokeKind::Correction));
        assert!(history.remove_last_character_log().is_none());
        assert_eq!(history.len(), 1);
    }
}
