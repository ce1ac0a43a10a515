//! Dictionary module
//!
//! The word-membership capability the rules depend on, plus a hash-set backed
//! implementation that can be built from the default list or a word file.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{Result, WordChainError};

/// Words accepted when no dictionary file is configured
pub const DEFAULT_WORDS: &[&str] = &[
    "apple", "elephant", "tiger", "rabbit", "tree", "earth", "house", "egg", "game", "moon",
    "nice", "easy", "yellow", "water", "rice", "eat", "ant", "table", "test", "sun", "new",
    "wood", "door", "end", "red", "dog", "green", "nine", "day", "year", "run", "night", "tea",
    "air", "rat",
];

/// Word-membership lookup
///
/// Implementations must treat `word` case-insensitively.
pub trait Dictionary: Send + Sync {
    /// Check whether the word is a known word
    fn contains(&self, word: &str) -> bool;
}

/// In-memory word list keyed by lowercase word
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    /// Build a word list from any iterator of words
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Build the built-in word list
    pub fn builtin() -> Self {
        Self::new(DEFAULT_WORDS.iter().copied())
    }

    /// Parse a newline-separated word list; `#` starts a comment line
    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        )
    }

    /// Load a newline-separated word file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let list = Self::parse(&content);

        if list.is_empty() {
            return Err(WordChainError::Config(format!(
                "dictionary file {} contains no words",
                path.display()
            )));
        }

        info!(path = %path.display(), words = list.len(), "Dictionary loaded");
        Ok(list)
    }

    /// Number of words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Dictionary for WordList {
    fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }
}
