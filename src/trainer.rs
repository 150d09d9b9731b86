//! Greedy BPE merge training.
//!
//! Each step recounts adjacent pairs over the partially merged corpus, picks
//! the most frequent one (ties go to the pair seen first), gives it the next
//! free id and rewrites every chunk. Training stops at the target vocabulary
//! size or as soon as no pair occurs at least twice.
//!
//! Identical chunks are stored once with a multiplicity. Unique chunks keep
//! the order of their first occurrence, which keeps the first-seen tie-break
//! identical to a scan over the full corpus.

use std::collections::HashMap;

use log::{debug, info};
use rayon::prelude::*;

use crate::{
    chunker::{ByteChunker, bytes_to_tokens},
    config::TokenizerConfig,
    error::{ConfigError, DecodeError, TrainError},
    progress::progress_bar,
    stats::PairStatistics,
    types::{BASE_VOCAB_SIZE, MergeRule, Token, TokenFreq, TokenPair},
    vocab::Vocabulary,
};

/// Pairs seen fewer times than this are not worth a merge.
const MIN_PAIR_FREQ: TokenFreq = 2;

/// Lifecycle of a [`MergeTrainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// No corpus loaded.
    Idle,
    /// Corpus loaded, merges still possible.
    Training,
    /// Target reached or no repeating pair left.
    Done,
}

/// Immutable result of training: the ordered merge table and the vocabulary
/// built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedModel {
    merges: Vec<MergeRule>,
    vocab: Vocabulary,
}

impl TrainedModel {
    /// A model with no merges: encoding yields raw bytes.
    pub fn bytes_only() -> Self {
        Self {
            merges: Vec::new(),
            vocab: Vocabulary::base(),
        }
    }

    /// Rebuilds a model from a merge table.
    ///
    /// # Errors
    ///
    /// Fails if the ids are not exactly `256, 257, ...` or a rule refers to an
    /// id defined after it.
    pub fn from_merges(merges: Vec<MergeRule>) -> Result<Self, DecodeError> {
        let vocab = Vocabulary::from_merges(&merges)?;
        Ok(Self { merges, vocab })
    }

    /// Merges in training order.
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub(crate) fn from_parts(merges: Vec<MergeRule>, vocab: Vocabulary) -> Self {
        Self { merges, vocab }
    }

    pub(crate) fn into_parts(self) -> (Vec<MergeRule>, Vocabulary) {
        (self.merges, self.vocab)
    }
}

/// BPE training state machine.
#[derive(Debug, Clone)]
pub struct MergeTrainer {
    /// Target vocabulary size, base bytes included.
    vocab_size: usize,
    chunker: ByteChunker,
    show_progress: bool,
    state: TrainerState,

    /// Distinct chunks in order of first occurrence.
    chunks: Vec<Vec<Token>>,
    /// How often each distinct chunk occurs in the corpus.
    weights: Vec<TokenFreq>,
    /// Corpus chunk index → index into `chunks`.
    layout: Vec<usize>,

    merges: Vec<MergeRule>,
    vocab: Vocabulary,
}

impl MergeTrainer {
    /// Creates an idle trainer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VocabSizeTooSmall`] if `vocab_size <= 256`.
    pub fn new(vocab_size: usize, chunker: ByteChunker) -> Result<Self, ConfigError> {
        if vocab_size <= BASE_VOCAB_SIZE {
            return Err(ConfigError::VocabSizeTooSmall(vocab_size));
        }
        Ok(Self {
            vocab_size,
            chunker,
            show_progress: false,
            state: TrainerState::Idle,
            chunks: Vec::new(),
            weights: Vec::new(),
            layout: Vec::new(),
            merges: Vec::new(),
            vocab: Vocabulary::base(),
        })
    }

    /// Creates an idle trainer from a validated config.
    pub fn from_config(cfg: &TokenizerConfig) -> Result<Self, ConfigError> {
        let (chunker, _) = cfg.validate()?;
        Ok(Self::new(cfg.vocab_size, chunker)?.with_progress(cfg.show_progress))
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Maximum number of merges for the target size.
    pub fn num_merges(&self) -> usize {
        self.vocab_size - BASE_VOCAB_SIZE
    }

    /// Merges learned so far, in training order.
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    /// Trains from scratch on `text` and returns the finished model.
    ///
    /// Any state from a previous run is discarded first, so calling this twice
    /// with the same text gives the same model.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::RegexMatch`] if chunking fails or
    /// [`TrainError::ProgressBarSetup`] if the progress bar cannot be built.
    pub fn train(&mut self, text: &str) -> Result<TrainedModel, TrainError> {
        self.load(text)?;

        info!(
            "training BPE: {} bytes, {} chunks ({} distinct), target vocab {}",
            text.len(),
            self.layout.len(),
            self.chunks.len(),
            self.vocab_size
        );

        let pb = progress_bar(self.num_merges() as u64, "Training merges", self.show_progress)?;
        while self.merge_step()? {
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "training complete: {} merges, vocab size {}",
            self.merges.len(),
            self.vocab.len()
        );

        Ok(self.model())
    }

    /// Resets all learned state and loads `text` as the corpus.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::RegexMatch`] if chunking fails.
    pub fn load(&mut self, text: &str) -> Result<(), TrainError> {
        self.merges.clear();
        self.vocab = Vocabulary::base();
        self.chunks.clear();
        self.weights.clear();
        self.layout.clear();

        let pieces = self
            .chunker
            .split(text)
            .map_err(|e| TrainError::RegexMatch(e.to_string()))?;

        let mut index: HashMap<&str, usize> = HashMap::new();
        for piece in pieces {
            let slot = *index.entry(piece).or_insert_with(|| {
                self.chunks.push(bytes_to_tokens(piece));
                self.weights.push(0);
                self.chunks.len() - 1
            });
            self.weights[slot] += 1;
            self.layout.push(slot);
        }

        self.state = TrainerState::Training;
        Ok(())
    }

    /// Performs one merge.
    ///
    /// Returns `true` if a merge was learned, `false` once the trainer is (or
    /// just became) [`TrainerState::Done`] or has no corpus loaded.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::Vocabulary`] if the vocabulary cannot resolve a
    /// pair member, which means the chunk contents and vocabulary diverged.
    pub fn merge_step(&mut self) -> Result<bool, TrainError> {
        if self.state != TrainerState::Training {
            return Ok(false);
        }
        if self.merges.len() >= self.num_merges() {
            self.state = TrainerState::Done;
            return Ok(false);
        }

        let stats = PairStatistics::collect_weighted(&self.chunks, &self.weights);
        let Some((pair, count)) = stats.most_frequent() else {
            info!("no pairs left after {} merges", self.merges.len());
            self.state = TrainerState::Done;
            return Ok(false);
        };
        if count < MIN_PAIR_FREQ {
            info!(
                "stopping after {} merges: most frequent pair {} occurs only once",
                self.merges.len(),
                pair
            );
            self.state = TrainerState::Done;
            return Ok(false);
        }

        let rule = MergeRule {
            id: self.vocab.next_id(),
            pair,
        };

        self.chunks
            .par_iter_mut()
            .for_each(|chunk| merge_chunk(chunk, rule.pair, rule.id));
        self.vocab.push_merge(&rule)?;
        self.merges.push(rule);

        debug!(
            "merge {}/{}: {} (count {}) {:?}",
            self.merges.len(),
            self.num_merges(),
            rule,
            count,
            self.vocab.piece(rule.id).unwrap_or_default()
        );

        Ok(true)
    }

    /// Snapshot of the merges and vocabulary learned so far.
    pub fn model(&self) -> TrainedModel {
        TrainedModel {
            merges: self.merges.clone(),
            vocab: self.vocab.clone(),
        }
    }

    /// The corpus as it currently stands, chunk by chunk, in corpus order.
    pub fn corpus_tokens(&self) -> Vec<Vec<Token>> {
        self.layout.iter().map(|&i| self.chunks[i].clone()).collect()
    }
}

/// Replaces every occurrence of `pair` in `chunk` with `new_id`.
///
/// Single left-to-right pass: a token consumed by one replacement is not
/// reused by the next, so `a a a` with `(a, a)` becomes `aa a`.
pub(crate) fn merge_chunk(chunk: &mut Vec<Token>, pair: TokenPair, new_id: Token) {
    if chunk.len() < 2 {
        return;
    }

    let mut read = 0;
    let mut write = 0;
    while read < chunk.len() {
        if read + 1 < chunk.len() && chunk[read] == pair.0 && chunk[read + 1] == pair.1 {
            chunk[write] = new_id;
            read += 2;
        } else {
            chunk[write] = chunk[read];
            read += 1;
        }
        write += 1;
    }
    chunk.truncate(write);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::DEFAULT_PATTERN;

    fn trainer(vocab_size: usize) -> MergeTrainer {
        let chunker = ByteChunker::new(DEFAULT_PATTERN).expect("default pattern compiles");
        MergeTrainer::new(vocab_size, chunker).expect("vocab size is valid")
    }

    #[test]
    fn test_merge_chunk_non_overlapping() {
        let mut chunk = vec![97, 97, 97];
        merge_chunk(&mut chunk, TokenPair(97, 97), 256);
        assert_eq!(chunk, vec![256, 97]);

        let mut chunk = vec![97, 97, 97, 97];
        merge_chunk(&mut chunk, TokenPair(97, 97), 256);
        assert_eq!(chunk, vec![256, 256]);
    }

    #[test]
    fn test_merge_chunk_no_match_unchanged() {
        let mut chunk = vec![1, 2, 3];
        merge_chunk(&mut chunk, TokenPair(3, 1), 256);
        assert_eq!(chunk, vec![1, 2, 3]);

        let mut single = vec![1];
        merge_chunk(&mut single, TokenPair(1, 1), 256);
        assert_eq!(single, vec![1]);
    }

    #[test]
    fn test_rejects_small_vocab() {
        let chunker = ByteChunker::new(DEFAULT_PATTERN).expect("default pattern compiles");
        let result = MergeTrainer::new(256, chunker);
        assert!(matches!(result, Err(ConfigError::VocabSizeTooSmall(256))));
    }

    #[test]
    fn test_from_config() {
        let cfg = TokenizerConfig::new(300).with_progress(false);
        let t = MergeTrainer::from_config(&cfg).expect("config is valid");
        assert_eq!(t.vocab_size(), 300);
        assert_eq!(t.num_merges(), 44);
        assert_eq!(t.state(), TrainerState::Idle);

        let bad = TokenizerConfig::new(300).with_pattern("x*");
        assert!(matches!(
            MergeTrainer::from_config(&bad),
            Err(ConfigError::EmptyMatchPattern(_))
        ));
    }

    #[test]
    fn test_state_machine() {
        let mut t = trainer(257);
        assert_eq!(t.state(), TrainerState::Idle);
        assert!(!t.merge_step().expect("idle step is a no-op"));

        t.load("aa aa").expect("load should succeed");
        assert_eq!(t.state(), TrainerState::Training);
        assert!(t.merge_step().expect("first merge"));
        assert!(!t.merge_step().expect("target reached"));
        assert_eq!(t.state(), TrainerState::Done);
        assert_eq!(t.merges().len(), 1);
    }

    #[test]
    fn test_classic_example() {
        let mut t = trainer(259);
        let model = t.train("aaabdaaabac").expect("training succeeds");

        // (a, a) occurs 4 times; then (aa, a) and (a, b) tie at 2 with
        // (aa, a) seen first.
        assert_eq!(
            model.merges(),
            &[
                MergeRule { id: 256, pair: TokenPair(97, 97) },
                MergeRule { id: 257, pair: TokenPair(256, 97) },
                MergeRule { id: 258, pair: TokenPair(257, 98) },
            ]
        );
        assert_eq!(model.vocab().resolve(258).expect("learned"), b"aaab");
        assert_eq!(t.corpus_tokens(), vec![vec![258, 100, 258, 97, 99]]);
    }

    #[test]
    fn test_early_termination() {
        let mut t = trainer(1000);
        let model = t.train("abcd").expect("training succeeds");
        assert!(model.merges().is_empty());
        assert_eq!(t.state(), TrainerState::Done);

        let model = t.train("abab").expect("training succeeds");
        assert_eq!(model.merges().len(), 1);
        assert_eq!(model.merges()[0].pair, TokenPair(97, 98));
    }

    #[test]
    fn test_merges_never_cross_chunks() {
        // "b a" repeats across the word boundary but must never be merged.
        let mut t = trainer(300);
        let model = t.train("ab ab ab ab").expect("training succeeds");
        for rule in model.merges() {
            let bytes = model.vocab().resolve(rule.id).expect("learned");
            assert!(!bytes.contains(&b' '));
            assert_ne!(bytes, b"ba");
        }
        assert_eq!(model.merges().len(), 1);
    }

    #[test]
    fn test_retrain_resets_state() {
        let mut t = trainer(300);
        let first = t.train("hello hello hello").expect("training succeeds");
        let _ = t.train("zzzz zzzz").expect("training succeeds");
        let again = t.train("hello hello hello").expect("training succeeds");
        assert_eq!(first, again);
    }

    #[test]
    fn test_ids_are_contiguous() {
        let mut t = trainer(400);
        let model = t
            .train("the quick brown fox jumps over the lazy dog the end then there")
            .expect("training succeeds");
        for (i, rule) in model.merges().iter().enumerate() {
            assert_eq!(rule.id as usize, BASE_VOCAB_SIZE + i);
        }
    }

    #[test]
    fn test_duplicate_chunks_count_with_multiplicity() {
        // "xy" alone occurs once per chunk but three chunks share it.
        let mut t = trainer(257);
        let model = t.train("xy xy xy").expect("training succeeds");
        assert_eq!(model.merges(), &[MergeRule { id: 256, pair: TokenPair(120, 121) }]);
        assert_eq!(
            t.corpus_tokens(),
            vec![vec![256], vec![32], vec![256], vec![32], vec![256]]
        );
    }

    #[test]
    fn test_from_merges_roundtrip() {
        let mut t = trainer(270);
        let model = t.train("banana bandana banana").expect("training succeeds");
        let rebuilt = TrainedModel::from_merges(model.merges().to_vec()).expect("valid table");
        assert_eq!(rebuilt, model);
    }
}
