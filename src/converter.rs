//! BPE Converter - token encoding and decoding with learned merge rules.
//!
//! Encoding applies merges to a chunk with a priority queue, inspired by
//! the training algorithm from:
//! "A Formal Perspective on Byte-Pair Encoding"
//! https://aclanthology.org/2023.findings-acl.38.pdf
//!
//! The queue always yields the candidate with the lowest merge id, breaking
//! ties by position. This reproduces "apply the earliest-learned merge
//! everywhere, left to right, then repeat": a merge can only create pairs
//! whose rule was learned after it, so every occurrence of the current rule
//! is handled before any later rule is considered.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use crate::{
    error::{DecodeError, SpecialTokenError},
    special::SpecialTokenTable,
    trainer::TrainedModel,
    types::{ByteSeq, MergeRule, Token, TokenPair},
    vocab::Vocabulary,
};

/// Item in the priority queue for merge ordering.
#[derive(Debug, PartialEq, Eq)]
struct MergeCandidate {
    /// Id the pair merges into. Lower ids were learned earlier and win.
    merged: Token,

    /// The token pair to be merged.
    pair: TokenPair,

    /// Position in the token sequence where this pair starts.
    ///
    /// Used as a tiebreaker when the same rule matches several times.
    position: usize,
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // We reverse the comparison (other vs self) to create min-heap behavior
        // from Rust's max-heap BinaryHeap.
        // Break ties by position (earlier positions first).
        other
            .merged
            .cmp(&self.merged)
            .then_with(|| other.position.cmp(&self.position))
    }
}

/// Applies learned merges to byte chunks and expands ids back to bytes.
///
/// Holds the merge lookup, the vocabulary and the special-token table.
/// Read-only once built, so it can be shared across threads.
#[derive(Debug, Clone)]
pub(crate) struct BPEConverter {
    /// Maps token pairs to the id they merge into.
    merges: HashMap<TokenPair, Token>,

    /// The same rules in training order.
    rules: Vec<MergeRule>,

    /// Maps token IDs to their byte sequences.
    vocab: Vocabulary,

    /// Ids above the merge range bound to literal strings.
    special_tokens: SpecialTokenTable,
}

impl BPEConverter {
    /// Creates a converter from a trained model and a special-token table.
    ///
    /// # Errors
    ///
    /// Returns [`SpecialTokenError::IdCollision`] if a special id falls
    /// inside the byte or merge range of `model`.
    pub(crate) fn new(
        model: TrainedModel,
        special_tokens: SpecialTokenTable,
    ) -> Result<Self, SpecialTokenError> {
        special_tokens.check_disjoint(model.vocab().len())?;

        let (rules, vocab) = model.into_parts();
        let merges = rules.iter().map(|rule| (rule.pair, rule.id)).collect();

        Ok(Self {
            merges,
            rules,
            vocab,
            special_tokens,
        })
    }

    /// Encodes one chunk by applying learned merges until none applies.
    ///
    /// # Time Complexity
    ///
    /// O(N log N) where N is the chunk length.
    pub(crate) fn encode(&self, tokens: Vec<Token>) -> Vec<Token> {
        if tokens.len() <= 1 || self.merges.is_empty() {
            return tokens;
        }

        let mut heap = BinaryHeap::new();

        // results[pos] = Some(token) | None
        // None indicates consumed by prev merge
        let mut results: Vec<Option<Token>> = tokens.iter().map(|&t| Some(t)).collect();

        self.initialize_minheap(&tokens, &mut heap);

        while let Some(candidate) = heap.pop() {
            let pos = candidate.position;

            let Some(left) = results.get(pos).copied().flatten() else {
                continue;
            };
            // closest live token to the right; positions merged away are None.
            let mut right_idx = pos + 1;
            while right_idx < results.len() && matches!(results.get(right_idx), Some(None)) {
                right_idx += 1;
            }
            let Some(right) = results.get(right_idx).copied().flatten() else {
                continue;
            };

            // stale candidate: one side was rewritten since it was queued
            if candidate.pair != TokenPair(left, right) {
                continue;
            }

            results[pos] = Some(candidate.merged);
            results[right_idx] = None;

            self.track_new_merge_candidate(&mut heap, &results, pos, candidate.merged, true);
            self.track_new_merge_candidate(&mut heap, &results, pos, candidate.merged, false);
        }

        results.into_iter().flatten().collect()
    }

    /// Queues the pair the merged token forms with its left (or right)
    /// neighbour, if a rule exists for it.
    fn track_new_merge_candidate(
        &self,
        heap: &mut BinaryHeap<MergeCandidate>,
        results: &[Option<Token>],
        pos: usize,
        merged_tok: Token,
        check_left: bool,
    ) {
        let n = results.len();
        let idx = if check_left {
            if pos == 0 {
                return;
            }
            let mut idx = pos - 1;
            while idx > 0 && matches!(results.get(idx), Some(None)) {
                idx -= 1;
            }
            idx
        } else {
            let mut idx = pos + 1;
            while idx < n && matches!(results.get(idx), Some(None)) {
                idx += 1;
            }
            idx
        };

        let Some(&Some(tok)) = results.get(idx) else {
            return;
        };

        let pair = if check_left {
            TokenPair(tok, merged_tok)
        } else {
            TokenPair(merged_tok, tok)
        };

        if let Some(&merged) = self.merges.get(&pair) {
            let position = if check_left { idx } else { pos };
            heap.push(MergeCandidate {
                merged,
                pair,
                position,
            });
        }
    }

    /// Queues every adjacent pair of the input that has a rule.
    fn initialize_minheap(&self, tokens: &[Token], heap: &mut BinaryHeap<MergeCandidate>) {
        for (position, window) in tokens.windows(2).enumerate() {
            let pair = TokenPair(window[0], window[1]);
            if let Some(&merged) = self.merges.get(&pair) {
                heap.push(MergeCandidate {
                    merged,
                    pair,
                    position,
                });
            }
        }
    }

    pub(crate) fn num_merges(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub(crate) fn special_tokens(&self) -> &SpecialTokenTable {
        &self.special_tokens
    }

    /// Merge rules in training order.
    pub(crate) fn merge_rules(&self) -> &[MergeRule] {
        &self.rules
    }

    /// Copy of the merge table and vocabulary this converter was built from.
    pub(crate) fn model(&self) -> TrainedModel {
        TrainedModel::from_parts(self.rules.clone(), self.vocab.clone())
    }

    /// Bytes for a single id, from the vocabulary or the special table.
    pub(crate) fn token_bytes(&self, token: Token) -> Result<&[u8], DecodeError> {
        if let Ok(bytes) = self.vocab.resolve(token) {
            return Ok(bytes);
        }
        self.special_tokens
            .literal(token)
            .map(str::as_bytes)
            .ok_or(DecodeError::UnknownToken(token))
    }

    /// Decodes a token sequence back into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] for the first id that is neither
    /// in the vocabulary nor a special token.
    pub(crate) fn decode(&self, tokens: &[Token]) -> Result<ByteSeq, DecodeError> {
        let mut result = Vec::with_capacity(tokens.len() * 2);
        for &token in tokens {
            result.extend_from_slice(self.token_bytes(token)?);
        }
        Ok(result)
    }
}
