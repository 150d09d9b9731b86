//! Regex pre-tokenization: text is split into chunks that merges never cross.

use fancy_regex::Regex;

use crate::{
    error::{ConfigError, EncodeError},
    types::Token,
};

/// GPT-4 (cl100k) split pattern. Each match is categorically homogeneous:
/// letters, short digit runs, punctuation clusters or whitespace.
pub const GPT4_SPLIT_PATTERN: &str = concat!(
    r"'(?i:[sdmt]|ll|ve|re)|[^\r\n\p{L}\p{N}]?+\p{L}+|\p{N}{1,3}",
    r"| ?[^\s\p{L}\p{N}]++[\r\n]*|\s*[\r\n]|\s+(?!\S)|\s+",
);

/// Maximal runs of non-whitespace characters. The whitespace between them is
/// kept as separate chunks by [`ByteChunker::split`].
pub const DEFAULT_PATTERN: &str = r"\S+";

/// Splits text into byte chunks with a compiled pattern.
///
/// Every non-overlapping match, left to right, becomes one chunk, and so does
/// every run of text between two matches. Concatenating the chunks always
/// gives back the input.
#[derive(Debug, Clone)]
pub struct ByteChunker {
    pattern: Regex,
}

impl ByteChunker {
    /// Compiles `pattern` for repeated matching.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile,
    /// or [`ConfigError::EmptyMatchPattern`] if it can match the empty string.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern)?;
        // A pattern that matches "" produces empty chunks at every position.
        if re.is_match("").unwrap_or(true) {
            return Err(ConfigError::EmptyMatchPattern(pattern.to_owned()));
        }
        Ok(Self { pattern: re })
    }

    /// Source text of the compiled pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Splits `text` into string slices, in order: the matches plus the
    /// unmatched gaps between them. Zero-width matches are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::RegexMatch`] if the regex engine fails during
    /// matching (e.g. backtracking limit exceeded).
    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<&'t str>, EncodeError> {
        let mut pieces = Vec::new();
        let mut last = 0;

        for mat in self.pattern.find_iter(text) {
            let mat = mat.map_err(|e| EncodeError::RegexMatch(e.to_string()))?;
            if mat.start() == mat.end() {
                continue;
            }
            if mat.start() > last {
                pieces.push(&text[last..mat.start()]);
            }
            pieces.push(mat.as_str());
            last = mat.end();
        }
        if last < text.len() {
            pieces.push(&text[last..]);
        }

        Ok(pieces)
    }

    /// Splits `text` and converts every chunk to its byte values as tokens.
    ///
    /// # Errors
    ///
    /// Same as [`ByteChunker::split`].
    pub fn chunk(&self, text: &str) -> Result<Vec<Vec<Token>>, EncodeError> {
        Ok(self
            .split(text)?
            .into_iter()
            .map(bytes_to_tokens)
            .collect())
    }
}

/// String → UTF-8 bytes → token integers.
#[inline]
pub(crate) fn bytes_to_tokens(chunk: &str) -> Vec<Token> {
    chunk.bytes().map(Token::from).collect()
}
