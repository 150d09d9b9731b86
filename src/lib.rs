//! Byte-level BPE tokenizer: greedy merge training, regex pre-tokenization,
//! heap-based merge application and reserved special tokens.
//!
//! Python bindings live behind the `python` feature.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod chunker;
mod config;
mod converter;
mod error;
mod progress;
mod special;
mod stats;
mod tokenizer;
mod trainer;
mod types;
mod vocab;

#[cfg(feature = "python")]
mod python;

pub use chunker::{ByteChunker, DEFAULT_PATTERN, GPT4_SPLIT_PATTERN};
pub use config::TokenizerConfig;
pub use error::{ConfigError, DecodeError, EncodeError, ErrorMode, SpecialTokenError, TrainError};
pub use special::{
    AllowedSpecial, ENDOFPROMPT, ENDOFTEXT, FIM_MIDDLE, FIM_PREFIX, FIM_SUFFIX, Segment,
    SpecialTokenTable,
};
pub use stats::{PairCount, PairStatistics};
pub use tokenizer::Tokenizer;
pub use trainer::{MergeTrainer, TrainedModel, TrainerState};
pub use types::{BASE_VOCAB_SIZE, MergeRule, Token, TokenPair};
pub use vocab::Vocabulary;
