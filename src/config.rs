//! Tokenizer configuration.
//!
//! A [`TokenizerConfig`] carries everything needed to build a trainer: the
//! target vocabulary size, the pre-tokenization pattern and the special-token
//! table. It deserializes with serde so callers can keep it next to their own
//! settings; all checks happen in [`TokenizerConfig::validate`].

use serde::Deserialize;

use crate::{
    chunker::{ByteChunker, DEFAULT_PATTERN},
    error::ConfigError,
    special::SpecialTokenTable,
    types::{BASE_VOCAB_SIZE, Token},
};

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_owned()
}

/// Settings for training and building a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Target vocabulary size, base bytes included. Must exceed 256.
    pub vocab_size: usize,

    /// Pre-tokenization regex. Defaults to maximal non-whitespace runs.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Special literals and their reserved ids.
    #[serde(default)]
    pub special_tokens: Vec<(String, Token)>,

    /// Draw progress bars during training and batch calls.
    #[serde(default)]
    pub show_progress: bool,
}

impl TokenizerConfig {
    /// Config with the default pattern and no special tokens.
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            pattern: default_pattern(),
            special_tokens: Vec::new(),
            show_progress: false,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_special_tokens(mut self, table: &SpecialTokenTable) -> Self {
        self.special_tokens = table.iter().map(|(s, id)| (s.to_owned(), id)).collect();
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs every construction-time check and returns the compiled parts.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::VocabSizeTooSmall`] if `vocab_size <= 256`.
    /// - [`ConfigError::InvalidPattern`] / [`ConfigError::EmptyMatchPattern`]
    ///   for a bad pattern.
    /// - [`ConfigError::InvalidSpecialToken`] for a malformed special table,
    ///   including ids that could collide with merge ids.
    pub fn validate(&self) -> Result<(ByteChunker, SpecialTokenTable), ConfigError> {
        if self.vocab_size <= BASE_VOCAB_SIZE {
            return Err(ConfigError::VocabSizeTooSmall(self.vocab_size));
        }
        let chunker = ByteChunker::new(&self.pattern)?;
        let specials = SpecialTokenTable::new(self.special_tokens.iter().cloned())?;
        specials.check_disjoint(self.vocab_size)?;
        Ok((chunker, specials))
    }
}
