//! Error types for BPE tokenizer and trainer operations.

use std::str::FromStr;

use indicatif::style::TemplateError;
use thiserror::Error;

use crate::types::{Token, TokenPair};

/// Controls how UTF-8 decoding errors are handled.
///
/// Mirrors Python's `bytes.decode(errors=...)` semantics.
/// Unknown token IDs always produce errors regardless of mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Raise an error on invalid UTF-8 like Python's "strict".
    #[default]
    Strict,
    /// Replace invalid UTF-8 sequences with U+FFFD (like Python's "replace").
    Replace,
}

impl FromStr for ErrorMode {
    type Err = String;

    /// Parses a Python-style error mode string ("strict" or "replace").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            _ => Err(format!(
                "invalid error mode: {s:?} (expected \"strict\" or \"replace\")"
            )),
        }
    }
}

/// Errors in a special-token table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecialTokenError {
    /// Two literals were bound to the same id.
    #[error("special token id {0} is assigned more than once")]
    DuplicateId(Token),
    /// The same literal was bound twice.
    #[error("special token {0:?} is registered more than once")]
    DuplicateLiteral(String),
    /// Empty literals would match everywhere.
    #[error("special token literal must not be empty")]
    EmptyLiteral,
    /// Token id already exists in the byte or merge range.
    #[error("special token id {0} collides with the byte/merge vocabulary")]
    IdCollision(Token),
}

/// Construction-time configuration errors. Fatal to tokenizer creation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Target vocabulary must leave room for at least one merge.
    #[error("vocab size must be greater than 256, got {0}")]
    VocabSizeTooSmall(usize),
    /// The regex pattern failed to compile.
    #[error("invalid pre-tokenization pattern: {0}")]
    InvalidPattern(#[from] fancy_regex::Error),
    /// The pattern can match the empty string, so it cannot be applied repeatedly.
    #[error("pre-tokenization pattern {0:?} matches the empty string")]
    EmptyMatchPattern(String),
    /// The special-token table is malformed.
    #[error("invalid special token table: {0}")]
    InvalidSpecialToken(#[from] SpecialTokenError),
}

/// Errors that can occur during training.
#[derive(Debug, Error)]
pub enum TrainError {
    /// The configuration was rejected before training started.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Regex engine failed during text splitting (e.g. backtracking limit exceeded).
    #[error("regex match failed: {0}")]
    RegexMatch(String),
    /// A learned pair referred to an id the vocabulary does not hold.
    #[error("vocabulary out of sync with corpus: {0}")]
    Vocabulary(#[from] DecodeError),
    /// Progress bar template string was invalid.
    #[error("template parsing failed: {0}")]
    ProgressBarSetup(#[from] TemplateError),
}

/// Errors that can occur during text encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A registered special token appeared in text encoded with `NoneRaise`.
    #[error("disallowed special token {0:?} found in text")]
    DisallowedSpecial(String),
    /// An explicit allowed set named a token that is not registered.
    #[error("special token {0:?} is not registered")]
    UnknownSpecial(String),
    /// Regex engine failed during text splitting (e.g. backtracking limit exceeded).
    #[error("regex match failed: {0}")]
    RegexMatch(String),
    /// Progress bar template string was invalid.
    #[error("template parsing failed: {0}")]
    ProgressBarSetup(#[from] TemplateError),
}

/// Errors that can occur during token decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Token ID not found in vocabulary or special-token table.
    #[error("unknown token id: {0}")]
    UnknownToken(Token),
    /// A merge table lists the same pair under two ids.
    #[error("pair {0} is merged more than once")]
    DuplicateMerge(TokenPair),
    /// Decoded bytes are not valid UTF-8.
    #[error("invalid UTF-8 in decoded bytes: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Progress bar template string was invalid.
    #[error("template parsing failed: {0}")]
    ProgressBarSetup(#[from] TemplateError),
}
