//! PyO3 bindings exposing [`Tokenizer`] as `_bytepair.RustTokenizer`.

use std::collections::HashSet;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::{
    AllowedSpecial, ByteChunker, DEFAULT_PATTERN, ErrorMode, SpecialTokenTable, Token, Tokenizer,
    TokenizerConfig, TrainedModel,
};

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Resolves the Python-side `allowed_special` argument: a keyword string
/// ("none", "all", "none_raise") or a set of literals.
fn allowed_from_py(allowed: Option<&Bound<'_, PyAny>>) -> PyResult<AllowedSpecial> {
    let Some(obj) = allowed else {
        return Ok(AllowedSpecial::None);
    };
    if let Ok(mode) = obj.extract::<String>() {
        return mode.parse().map_err(PyValueError::new_err);
    }
    let names: HashSet<String> = obj.extract()?;
    Ok(AllowedSpecial::Explicit(names))
}

/// Python wrapper for the BPE tokenizer.
#[pyclass]
pub struct RustTokenizer {
    inner: Tokenizer,
}

#[pymethods]
impl RustTokenizer {
    /// Builds a tokenizer with no merges and no special tokens.
    #[new]
    #[pyo3(signature = (pattern=None))]
    fn new(pattern: Option<&str>) -> PyResult<Self> {
        let chunker = ByteChunker::new(pattern.unwrap_or(DEFAULT_PATTERN)).map_err(value_error)?;
        let inner = Tokenizer::new(TrainedModel::bytes_only(), chunker, SpecialTokenTable::empty())
            .map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Trains a fresh tokenizer on `text`.
    #[staticmethod]
    #[pyo3(signature = (text, vocab_size, pattern=None, special_tokens=None, show_progress=false))]
    fn train(
        py: Python<'_>,
        text: &str,
        vocab_size: usize,
        pattern: Option<String>,
        special_tokens: Option<Vec<(String, Token)>>,
        show_progress: bool,
    ) -> PyResult<Self> {
        let mut cfg = TokenizerConfig::new(vocab_size).with_progress(show_progress);
        if let Some(pattern) = pattern {
            cfg = cfg.with_pattern(pattern);
        }
        cfg.special_tokens = special_tokens.unwrap_or_default();

        let inner = py
            .allow_threads(|| Tokenizer::train(&cfg, text))
            .map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Replaces the special-token table.
    fn register_special_tokens(&mut self, tokens: Vec<(String, Token)>) -> PyResult<()> {
        let table = SpecialTokenTable::new(tokens).map_err(value_error)?;
        self.inner = self.inner.register_special_tokens(table).map_err(value_error)?;
        Ok(())
    }

    #[pyo3(signature = (text, allowed_special=None))]
    fn encode(
        &self,
        text: &str,
        allowed_special: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Vec<Vec<Token>>> {
        let allowed = allowed_from_py(allowed_special)?;
        self.inner.encode(text, &allowed).map_err(value_error)
    }

    fn encode_ordinary(&self, text: &str) -> PyResult<Vec<Vec<Token>>> {
        self.inner.encode_ordinary(text).map_err(value_error)
    }

    fn encode_ordinary_batch(
        &self,
        py: Python<'_>,
        texts: Vec<String>,
    ) -> PyResult<Vec<Vec<Token>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        py.allow_threads(|| self.inner.encode_ordinary_batch(&refs))
            .map_err(value_error)
    }

    fn encode_bytes(&self, text: &str) -> Vec<Token> {
        self.inner.encode_bytes(text)
    }

    #[pyo3(signature = (texts, allowed_special=None))]
    fn encode_batch(
        &self,
        py: Python<'_>,
        texts: Vec<String>,
        allowed_special: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Vec<Vec<Token>>> {
        let allowed = allowed_from_py(allowed_special)?;
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        py.allow_threads(|| self.inner.encode_batch(&refs, &allowed))
            .map_err(value_error)
    }

    #[pyo3(signature = (chunks, errors="strict"))]
    fn decode(&self, chunks: Vec<Vec<Token>>, errors: &str) -> PyResult<String> {
        let mode: ErrorMode = errors.parse().map_err(PyValueError::new_err)?;
        self.inner.decode(&chunks, mode).map_err(value_error)
    }

    #[pyo3(signature = (tokens, errors="strict"))]
    fn decode_flat(&self, tokens: Vec<Token>, errors: &str) -> PyResult<String> {
        let mode: ErrorMode = errors.parse().map_err(PyValueError::new_err)?;
        self.inner.decode_flat(&tokens, mode).map_err(value_error)
    }

    #[pyo3(signature = (token_seqs, errors="strict"))]
    fn decode_batch(
        &self,
        py: Python<'_>,
        token_seqs: Vec<Vec<Token>>,
        errors: &str,
    ) -> PyResult<Vec<String>> {
        let mode: ErrorMode = errors.parse().map_err(PyValueError::new_err)?;
        let refs: Vec<&[Token]> = token_seqs.iter().map(Vec::as_slice).collect();
        py.allow_threads(|| self.inner.decode_batch(&refs, mode))
            .map_err(value_error)
    }

    fn decode_bytes(&self, chunks: Vec<Vec<Token>>) -> PyResult<Vec<u8>> {
        self.inner.decode_bytes(&chunks).map_err(value_error)
    }

    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    #[getter]
    fn pattern(&self) -> String {
        self.inner.pattern().to_owned()
    }

    /// `((left, right), id)` in training order.
    fn merges(&self) -> Vec<((Token, Token), Token)> {
        self.inner
            .merges()
            .iter()
            .map(|rule| ((rule.pair.0, rule.pair.1), rule.id))
            .collect()
    }

    /// `(literal, id)` in ascending id order.
    fn special_tokens(&self) -> Vec<(String, Token)> {
        self.inner
            .special_tokens()
            .iter()
            .map(|(s, id)| (s.to_owned(), id))
            .collect()
    }

    /// Printable form of one id, e.g. `"ab"` or `"<0xC3>"`.
    fn piece(&self, token: Token) -> PyResult<String> {
        if let Some(literal) = self.inner.special_tokens().literal(token) {
            return Ok(literal.to_owned());
        }
        self.inner.vocab().piece(token).map_err(value_error)
    }
}

#[pymodule]
fn _bytepair(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RustTokenizer>()?;
    Ok(())
}
