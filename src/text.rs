use thiserror::Error;

use crate::quotes::QuoteDb;

/// A piece of text to type, with metadata about where it came from
#[derive(Clone, Debug, PartialEq)]
pub struct TextSample {
    pub text: String,
    pub source_id: Option<i64>,
    pub source: String,
    pub word_count: usize,
    pub char_count: usize,
}

impl TextSample {
    /// Build a sample from raw text, deriving the word and character counts
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        let char_count = text.chars().count();
        Self {
            text,
            source_id: None,
            source: source.into(),
            word_count,
            char_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum TextError {
    #[error("quote repository error: {0}")]
    Repository(#[from] rusqlite::Error),
}

/// Where target texts come from. Fetching may block (e.g. on the quote
/// database); the game loop waits for it before accepting input.
pub trait TextProvider {
    fn fetch(&self) -> Result<TextSample, TextError>;

    /// The sample following `current`, for play-next. Sources without a
    /// notion of ordering fall back to `fetch`.
    fn fetch_after(&self, current: Option<i64>) -> Result<TextSample, TextError> {
        let _ = current;
        self.fetch()
    }
}

/// Serves one fixed text, e.g. a custom `--prompt`
#[derive(Clone, Debug)]
pub struct StaticTextProvider {
    text: String,
}

impl StaticTextProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextProvider for StaticTextProvider {
    fn fetch(&self) -> Result<TextSample, TextError> {
        Ok(TextSample::new(self.text.clone(), "custom prompt"))
    }
}

const FALLBACK_TEXTS: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "Pack my box with five dozen liquor jugs.",
    "How vexingly quick daft zebras jump!",
];

/// Adapts the quote repository to the provider seam, falling back to a
/// built-in pangram when the repository has nothing to offer
pub struct QuoteTextProvider {
    db: QuoteDb,
}

impl QuoteTextProvider {
    pub fn new(db: QuoteDb) -> Self {
        Self { db }
    }

    fn fallback() -> TextSample {
        let idx = rand::random::<usize>() % FALLBACK_TEXTS.len();
        TextSample::new(FALLBACK_TEXTS[idx], "Pangram")
    }
}

impl TextProvider for QuoteTextProvider {
    fn fetch(&self) -> Result<TextSample, TextError> {
        match self.db.random_quote()? {
            Some(quote) => Ok(quote.into_sample()),
            None => Ok(Self::fallback()),
        }
    }

    fn fetch_after(&self, current: Option<i64>) -> Result<TextSample, TextError> {
        let Some(current_id) = current else {
            return self.fetch();
        };
        match self.db.next_quote(current_id)? {
            Some(quote) => Ok(quote.into_sample()),
            None => Ok(Self::fallback()),
        }
    }
}
