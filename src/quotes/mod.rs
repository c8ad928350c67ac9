use include_dir::{include_dir, Dir};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Deserialize;
use std::path::Path;

use crate::text::TextSample;

static COLLECTIONS_DIR: Dir = include_dir!("src/quotes");

/// A quote as stored in the repository
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub word_count: usize,
    pub char_count: usize,
}

impl Quote {
    pub fn into_sample(self) -> TextSample {
        TextSample {
            text: self.text,
            source_id: Some(self.id),
            source: self.author,
            word_count: self.word_count,
            char_count: self.char_count,
        }
    }
}

/// A quote about to be inserted; counts are derived on insert
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NewQuote {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
struct QuoteCollection {
    name: String,
    quotes: Vec<NewQuote>,
}

/// Names of the embedded seed collections
pub fn available_collections() -> Vec<String> {
    let mut names: Vec<String> = COLLECTIONS_DIR
        .files()
        .filter_map(|file| {
            let path = file.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                path.file_stem().map(|s| s.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    names.sort();
    names
}

fn load_collection(name: &str) -> Option<QuoteCollection> {
    let file = COLLECTIONS_DIR.get_file(format!("{name}.json"))?;
    let contents = file.contents_utf8()?;
    serde_json::from_str(contents).ok()
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS quotes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        author TEXT NOT NULL,
        word_count INTEGER NOT NULL,
        char_count INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// SQLite-backed quote repository
#[derive(Debug)]
pub struct QuoteDb {
    conn: Connection,
}

impl QuoteDb {
    /// Open (creating the schema if needed) at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("failed to create directory: {e}")),
                )
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory repository, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(QuoteDb { conn })
    }

    /// Seed from an embedded collection if the table is still empty.
    /// Returns the number of quotes inserted.
    pub fn ensure_seeded(&mut self, collection: &str) -> Result<usize> {
        if self.has_any()? {
            return Ok(0);
        }
        let Some(collection) = load_collection(collection) else {
            return Ok(0);
        };
        tracing::debug!(name = %collection.name, count = collection.quotes.len(), "seeding quote repository");
        self.add_quotes(&collection.quotes)?;
        Ok(collection.quotes.len())
    }

    pub fn add_quotes(&mut self, quotes: &[NewQuote]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for quote in quotes {
            tx.execute(
                r#"
                INSERT INTO quotes (text, author, word_count, char_count)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    quote.text,
                    quote.author,
                    quote.text.split_whitespace().count(),
                    quote.text.chars().count(),
                ],
            )?;
        }
        tx.commit()
    }

    pub fn has_any(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))
    }

    pub fn random_quote(&self) -> Result<Option<Quote>> {
        let count = self.count()?;
        if count == 0 {
            return Ok(None);
        }
        let offset = rand::thread_rng().gen_range(0..count);
        self.conn
            .query_row(
                r#"
                SELECT id, text, author, word_count, char_count
                FROM quotes ORDER BY id LIMIT 1 OFFSET ?1
                "#,
                params![offset],
                Self::row_to_quote,
            )
            .optional()
    }

    /// The quote with the next-higher id, wrapping to the first one past the
    /// end of the table
    pub fn next_quote(&self, after_id: i64) -> Result<Option<Quote>> {
        let next = self
            .conn
            .query_row(
                r#"
                SELECT id, text, author, word_count, char_count
                FROM quotes WHERE id > ?1 ORDER BY id LIMIT 1
                "#,
                params![after_id],
                Self::row_to_quote,
            )
            .optional()?;

        if next.is_some() {
            return Ok(next);
        }
        self.conn
            .query_row(
                r#"
                SELECT id, text, author, word_count, char_count
                FROM quotes ORDER BY id LIMIT 1
                "#,
                [],
                Self::row_to_quote,
            )
            .optional()
    }

    fn row_to_quote(row: &rusqlite::Row) -> rusqlite::Result<Quote> {
        Ok(Quote {
            id: row.get(0)?,
            text: row.get(1)?,
            author: row.get(2)?,
            word_count: row.get::<_, i64>(3)? as usize,
            char_count: row.get::<_, i64>(4)? as usize,
        })
    }
}
