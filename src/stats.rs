//! Adjacent-pair frequency statistics.
//!
//! Pairs are only counted inside a chunk. Alongside its count every pair
//! remembers where it was first seen, so ties between equally frequent pairs
//! resolve to the pair a left-to-right scan of the corpus meets first, no
//! matter how the counting work was split across threads.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::types::{Token, TokenFreq, TokenPair};

/// Below this many chunks the parallel fold costs more than it saves.
const PARALLEL_MIN_CHUNKS: usize = 64;

/// Position of a pair occurrence: (chunk index, offset within the chunk).
pub(crate) type Position = (usize, usize);

/// Count and first occurrence of a single pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCount {
    pub count: TokenFreq,
    pub(crate) first_seen: Position,
}

impl PairCount {
    fn absorb(&mut self, other: PairCount) {
        self.count += other.count;
        self.first_seen = self.first_seen.min(other.first_seen);
    }
}

/// Pair → occurrence count over a set of chunks.
#[derive(Debug, Default, Clone)]
pub struct PairStatistics {
    counts: HashMap<TokenPair, PairCount>,
}

impl PairStatistics {
    /// Counts every adjacent pair of every chunk.
    pub fn collect(chunks: &[Vec<Token>]) -> Self {
        Self::collect_weighted(chunks, &vec![1; chunks.len()])
    }

    /// Counts pairs of chunks that each stand for `weights[i]` identical
    /// chunks in the corpus.
    ///
    /// Large corpora are counted on Rayon workers; partial maps are merged
    /// after the fold so the result is identical to a sequential scan.
    pub fn collect_weighted(chunks: &[Vec<Token>], weights: &[TokenFreq]) -> Self {
        debug_assert_eq!(chunks.len(), weights.len());

        if chunks.len() < PARALLEL_MIN_CHUNKS {
            return Self::collect_sequential(chunks, weights);
        }

        let counts = chunks
            .par_iter()
            .zip(weights.par_iter())
            .enumerate()
            .fold(HashMap::new, |mut local, (chunk_idx, (chunk, &weight))| {
                count_chunk(&mut local, chunk_idx, chunk, weight);
                local
            })
            .reduce(HashMap::new, merge_partials);

        Self { counts }
    }

    /// Single-threaded counting in corpus order.
    pub fn collect_sequential(chunks: &[Vec<Token>], weights: &[TokenFreq]) -> Self {
        let mut counts = HashMap::new();
        for (chunk_idx, (chunk, &weight)) in chunks.iter().zip(weights).enumerate() {
            count_chunk(&mut counts, chunk_idx, chunk, weight);
        }
        Self { counts }
    }

    /// Occurrence count of `pair`, zero if never seen.
    pub fn count(&self, pair: TokenPair) -> TokenFreq {
        self.counts.get(&pair).map_or(0, |c| c.count)
    }

    /// Number of distinct pairs.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The most frequent pair and its count.
    ///
    /// Equal counts go to the pair discovered first; numeric pair values never
    /// take part in the decision.
    pub fn most_frequent(&self) -> Option<(TokenPair, TokenFreq)> {
        self.counts
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(&pair, c)| (pair, c.count))
    }

    /// All pairs with their counts in discovery order.
    pub fn in_discovery_order(&self) -> Vec<(TokenPair, TokenFreq)> {
        let mut entries: Vec<_> = self.counts.iter().collect();
        entries.sort_by_key(|(_, c)| c.first_seen);
        entries.into_iter().map(|(&p, c)| (p, c.count)).collect()
    }
}

fn count_chunk(
    counts: &mut HashMap<TokenPair, PairCount>,
    chunk_idx: usize,
    chunk: &[Token],
    weight: TokenFreq,
) {
    if weight == 0 {
        return;
    }
    for (offset, window) in chunk.windows(2).enumerate() {
        let pair = TokenPair(window[0], window[1]);
        counts
            .entry(pair)
            .and_modify(|c| c.count += weight)
            .or_insert(PairCount {
                count: weight,
                first_seen: (chunk_idx, offset),
            });
    }
}

fn merge_partials(
    mut a: HashMap<TokenPair, PairCount>,
    b: HashMap<TokenPair, PairCount>,
) -> HashMap<TokenPair, PairCount> {
    for (pair, partial) in b {
        a.entry(pair)
            .and_modify(|c| c.absorb(partial))
            .or_insert(partial);
    }
    a
}
