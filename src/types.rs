//! Type aliases and shared types for BPE training and encoding.
//!
//! These type aliases provide semantic clarity throughout the codebase.

use std::fmt;

/// Represents a token identifier in the vocabulary.
///
/// Ids 0-255 are the raw bytes, ids from 256 upwards are learned merges
/// (assigned sequentially during training), and special tokens live in a
/// reserved band above every merge id.
pub type Token = u32;

/// Number of base tokens: one per byte value.
pub const BASE_VOCAB_SIZE: usize = 256;

/// Frequency count for token pairs during training.
pub(crate) type TokenFreq = usize;

/// A sequence of raw bytes.
pub(crate) type ByteSeq = Vec<u8>;

/// A pair of adjacent tokens.
///
/// Used as a key for looking up merge rules during encoding and for
/// tracking pair frequencies during training. Hashing goes through the
/// packed 64-bit key so both halves keep their full `u32` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPair(pub Token, pub Token);

impl TokenPair {
    /// Packs the pair into a single integer: left in the high 32 bits,
    /// right in the low 32 bits.
    #[inline]
    pub fn key(self) -> u64 {
        (u64::from(self.0) << 32) | u64::from(self.1)
    }

    /// Inverse of [`TokenPair::key`].
    #[inline]
    pub fn from_key(key: u64) -> Self {
        Self((key >> 32) as Token, key as Token)
    }
}

impl std::hash::Hash for TokenPair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.key());
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A learned merge: `pair` collapses into `id`.
///
/// Rules are kept in ascending id order, which is the order they were
/// learned in. Encoding priority and vocabulary construction both rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRule {
    pub id: Token,
    pub pair: TokenPair,
}

impl fmt::Display for MergeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pair, self.id)
    }
}
