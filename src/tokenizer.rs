//! This module provides the complete tokenizer pipeline:
//! 1. Special-token splitting (optional, per call).
//! 2. Regex pattern matching to split text into chunks.
//! 3. UTF-8 byte conversion for each chunk.
//! 4. BPE merge application on byte sequences.
//!
//! Decoding runs the other way through the precomputed vocabulary.
//!
//! The tokenizer supports both single-text and parallel batch calls
//! via Rayon. A built [`Tokenizer`] is immutable and `Send + Sync`.

use indicatif::ParallelProgressIterator;
use log::trace;
use rayon::prelude::*;

use crate::{
    chunker::{ByteChunker, bytes_to_tokens},
    config::TokenizerConfig,
    converter::BPEConverter,
    error::{ConfigError, DecodeError, EncodeError, ErrorMode, TrainError},
    progress::progress_bar,
    special::{AllowedSpecial, Segment, SpecialTokenTable},
    trainer::{MergeTrainer, TrainedModel},
    types::{MergeRule, Token},
    vocab::Vocabulary,
};

/// Byte-level BPE tokenizer: regex chunking, merge application, special
/// tokens, decoding.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    chunker: ByteChunker,
    converter: BPEConverter,
    show_progress: bool,
}

impl Tokenizer {
    /// Assembles a tokenizer from a trained model.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSpecialToken`] if a special id falls
    /// inside the byte or merge range of `model`.
    pub fn new(
        model: TrainedModel,
        chunker: ByteChunker,
        special_tokens: SpecialTokenTable,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            chunker,
            converter: BPEConverter::new(model, special_tokens)?,
            show_progress: false,
        })
    }

    /// Validates `cfg`, trains on `text` and builds the tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::Config`] for an invalid configuration, or any
    /// training failure.
    pub fn train(cfg: &TokenizerConfig, text: &str) -> Result<Self, TrainError> {
        let (chunker, specials) = cfg.validate()?;
        let mut trainer = MergeTrainer::new(cfg.vocab_size, chunker.clone())?
            .with_progress(cfg.show_progress);
        let model = trainer.train(text)?;

        Ok(Self::new(model, chunker, specials)?.with_progress(cfg.show_progress))
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Returns a tokenizer with the same merges and `special_tokens` in place
    /// of the current table.
    ///
    /// # Errors
    ///
    /// Same as [`Tokenizer::new`].
    pub fn register_special_tokens(
        &self,
        special_tokens: SpecialTokenTable,
    ) -> Result<Self, ConfigError> {
        let tok = Self::new(self.model(), self.chunker.clone(), special_tokens)?;
        Ok(tok.with_progress(self.show_progress))
    }

    /// Encodes `text` into per-chunk token sequences, recognising special
    /// tokens according to `allowed`.
    ///
    /// Ordinary spans go through [`Tokenizer::encode_ordinary`]; each special
    /// literal becomes a one-element chunk holding its id.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::DisallowedSpecial`] or
    /// [`EncodeError::UnknownSpecial`] for policy violations, and
    /// [`EncodeError::RegexMatch`] if the regex engine fails.
    pub fn encode(
        &self,
        text: &str,
        allowed: &AllowedSpecial,
    ) -> Result<Vec<Vec<Token>>, EncodeError> {
        let segments = self.converter.special_tokens().split(text, allowed)?;

        let mut chunks = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Special(id) => chunks.push(vec![id]),
                Segment::Text(span) => chunks.extend(self.encode_ordinary(span)?),
            }
        }
        Ok(chunks)
    }

    /// Encodes `text` ignoring special tokens entirely.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::RegexMatch`] if the regex engine fails during
    /// text splitting (e.g. backtracking limit exceeded).
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<Vec<Token>>, EncodeError> {
        let chunks = self.chunker.split(text)?;
        trace!("encoding {} bytes in {} chunks", text.len(), chunks.len());
        Ok(chunks.into_iter().map(|c| self.encode_chunk(c)).collect())
    }

    /// [`Tokenizer::encode`] with the chunks concatenated.
    pub fn encode_flat(
        &self,
        text: &str,
        allowed: &AllowedSpecial,
    ) -> Result<Vec<Token>, EncodeError> {
        Ok(self.encode(text, allowed)?.concat())
    }

    /// [`Tokenizer::encode_ordinary`] with the chunks concatenated.
    pub fn encode_ordinary_flat(&self, text: &str) -> Result<Vec<Token>, EncodeError> {
        Ok(self.encode_ordinary(text)?.concat())
    }

    /// Encode raw text as bytes → BPE without regex splitting.
    ///
    /// Treats the entire input text as a single chunk, bypassing the
    /// pattern. Merges may then form across what the pattern would have
    /// treated as chunk boundaries, but only if training learned them.
    pub fn encode_bytes(&self, text: &str) -> Vec<Token> {
        self.encode_chunk(text)
    }

    /// Encodes many texts in parallel, one flat sequence per text.
    ///
    /// Results are in the same order as `texts`.
    ///
    /// # Errors
    ///
    /// Returns the first encode error of any text, or
    /// [`EncodeError::ProgressBarSetup`] if the progress bar template fails
    /// to compile.
    pub fn encode_batch(
        &self,
        texts: &[&str],
        allowed: &AllowedSpecial,
    ) -> Result<Vec<Vec<Token>>, EncodeError> {
        let pb = progress_bar(texts.len() as u64, "Encoding texts", self.show_progress)?;

        texts
            .par_iter()
            .progress_with(pb)
            .map(|text| self.encode_flat(text, allowed))
            .collect()
    }

    /// Encodes many texts in parallel ignoring special tokens, one flat
    /// sequence per text.
    ///
    /// # Errors
    ///
    /// Same as [`Tokenizer::encode_batch`].
    pub fn encode_ordinary_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Token>>, EncodeError> {
        let pb = progress_bar(texts.len() as u64, "Encoding texts", self.show_progress)?;

        texts
            .par_iter()
            .progress_with(pb)
            .map(|text| self.encode_ordinary_flat(text))
            .collect()
    }

    /// Decodes per-chunk token sequences back into text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] if an id is in neither the
    /// vocabulary nor the special-token table, or [`DecodeError::InvalidUtf8`]
    /// if the bytes are not valid UTF-8 (only in `Strict` mode).
    pub fn decode(&self, chunks: &[Vec<Token>], errors: ErrorMode) -> Result<String, DecodeError> {
        bytes_to_text(self.decode_bytes(chunks)?, errors)
    }

    /// Decodes a flat token sequence back into text.
    ///
    /// # Errors
    ///
    /// Same as [`Tokenizer::decode`].
    pub fn decode_flat(&self, tokens: &[Token], errors: ErrorMode) -> Result<String, DecodeError> {
        bytes_to_text(self.converter.decode(tokens)?, errors)
    }

    /// Decodes per-chunk token sequences into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] for an unbound id.
    pub fn decode_bytes(&self, chunks: &[Vec<Token>]) -> Result<Vec<u8>, DecodeError> {
        let mut bytes = Vec::new();
        for chunk in chunks {
            bytes.extend(self.converter.decode(chunk)?);
        }
        Ok(bytes)
    }

    /// Decodes multiple flat token sequences in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first decode error of any sequence, or
    /// [`DecodeError::ProgressBarSetup`] if the progress bar template fails
    /// to compile.
    pub fn decode_batch(
        &self,
        token_seqs: &[&[Token]],
        errors: ErrorMode,
    ) -> Result<Vec<String>, DecodeError> {
        let pb = progress_bar(token_seqs.len() as u64, "Decoding tokens", self.show_progress)?;

        token_seqs
            .par_iter()
            .progress_with(pb)
            .map(|tokens| self.decode_flat(tokens, errors))
            .collect()
    }

    /// Total number of ids: bytes, merges and special tokens.
    pub fn vocab_size(&self) -> usize {
        self.converter.vocab().len() + self.converter.special_tokens().len()
    }

    /// Merge rules in training order.
    pub fn merges(&self) -> &[MergeRule] {
        self.converter.merge_rules()
    }

    pub fn num_merges(&self) -> usize {
        self.converter.num_merges()
    }

    /// Copy of the merge table and vocabulary, e.g. for persistence.
    pub fn model(&self) -> TrainedModel {
        self.converter.model()
    }

    pub fn vocab(&self) -> &Vocabulary {
        self.converter.vocab()
    }

    /// Learned tokens (ids >= 256) with their bytes, in training order.
    pub fn learned_tokens(&self) -> impl Iterator<Item = (Token, &[u8])> + '_ {
        self.converter.vocab().learned()
    }

    pub fn special_tokens(&self) -> &SpecialTokenTable {
        self.converter.special_tokens()
    }

    /// Bytes of a single id, special tokens included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] for an unbound id.
    pub fn token_bytes(&self, token: Token) -> Result<&[u8], DecodeError> {
        self.converter.token_bytes(token)
    }

    /// Source of the pre-tokenization pattern.
    pub fn pattern(&self) -> &str {
        self.chunker.pattern()
    }

    /// Encode an already split regex chunk into BPE tokens.
    ///
    /// This method is inlined because it is called in a tight
    /// loop per regex match.
    #[inline]
    fn encode_chunk(&self, chunk: &str) -> Vec<Token> {
        self.converter.encode(bytes_to_tokens(chunk))
    }
}

fn bytes_to_text(bytes: Vec<u8>, errors: ErrorMode) -> Result<String, DecodeError> {
    match errors {
        ErrorMode::Strict => String::from_utf8(bytes).map_err(DecodeError::InvalidUtf8),
        ErrorMode::Replace => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
