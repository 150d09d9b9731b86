//! Token id → byte sequence table.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::{
    error::DecodeError,
    types::{BASE_VOCAB_SIZE, ByteSeq, MergeRule, Token, TokenPair},
};

/// Maps every byte and merge id to the bytes it stands for.
///
/// - `tokens[0..256]`: base vocabulary (single bytes)
/// - `tokens[256..]`: merged tokens, in merge order
///
/// Append-only: an entry never changes once pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<ByteSeq>,
}

impl Vocabulary {
    /// The 256 identity entries and nothing else.
    pub fn base() -> Self {
        Self {
            tokens: (0..=u8::MAX).map(|b| vec![b]).collect(),
        }
    }

    /// Rebuilds the table by replaying `merges` in order.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] if a rule references an id that is
    /// not yet defined, or assigns an id other than the next free one, and
    /// [`DecodeError::DuplicateMerge`] if a pair appears in two rules.
    pub fn from_merges<'a>(
        merges: impl IntoIterator<Item = &'a MergeRule>,
    ) -> Result<Self, DecodeError> {
        let mut vocab = Self::base();
        let mut seen: HashSet<TokenPair> = HashSet::new();
        for rule in merges {
            if rule.id != vocab.next_id() {
                return Err(DecodeError::UnknownToken(rule.id));
            }
            if !seen.insert(rule.pair) {
                return Err(DecodeError::DuplicateMerge(rule.pair));
            }
            vocab.push_merge(rule)?;
        }
        Ok(vocab)
    }

    /// Appends the entry for a freshly learned merge and returns its id.
    ///
    /// The new entry is the concatenation of the current entries for
    /// `rule.pair.0` then `rule.pair.1`.
    pub(crate) fn push_merge(&mut self, rule: &MergeRule) -> Result<Token, DecodeError> {
        debug_assert_eq!(rule.id, self.next_id());
        let left = self.resolve(rule.pair.0)?;
        let right = self.resolve(rule.pair.1)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        merged.extend_from_slice(left);
        merged.extend_from_slice(right);
        self.tokens.push(merged);

        Ok(rule.id)
    }

    /// The id the next merge will receive.
    pub fn next_id(&self) -> Token {
        self.tokens.len() as Token
    }

    /// Number of entries, base bytes included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Never true: the base bytes are always present.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether `id` is a byte or learned merge id.
    pub fn contains(&self, id: Token) -> bool {
        (id as usize) < self.tokens.len()
    }

    /// Bytes for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownToken`] if `id` is neither a byte nor a
    /// learned merge.
    pub fn resolve(&self, id: Token) -> Result<&[u8], DecodeError> {
        self.tokens
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or(DecodeError::UnknownToken(id))
    }

    /// Learned entries (ids >= 256) with their bytes, in merge order.
    pub fn learned(&self) -> impl Iterator<Item = (Token, &[u8])> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .skip(BASE_VOCAB_SIZE)
            .map(|(id, bytes)| (id as Token, bytes.as_slice()))
    }

    /// Human-readable rendering of a token.
    ///
    /// Valid UTF-8 is shown as text; anything else is shown byte by byte as
    /// `<0xHH>`.
    pub fn piece(&self, id: Token) -> Result<String, DecodeError> {
        let bytes = self.resolve(id)?;
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(text.to_owned());
        }
        let mut out = String::with_capacity(bytes.len() * 6);
        for b in bytes {
            // Writing into a String cannot fail.
            let _ = write!(out, "<0x{b:02X}>");
        }
        Ok(out)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: Token, left: Token, right: Token) -> MergeRule {
        MergeRule {
            id,
            pair: TokenPair(left, right),
        }
    }

    #[test]
    fn test_base_is_identity() {
        let vocab = Vocabulary::base();
        assert_eq!(vocab.len(), 256);
        for b in 0..=255u8 {
            assert_eq!(vocab.resolve(Token::from(b)).expect("byte resolves"), &[b]);
        }
        assert_eq!(vocab.learned().count(), 0);
    }

    #[test]
    fn test_nested_merges_concatenate() {
        let merges = vec![rule(256, 97, 98), rule(257, 256, 99), rule(258, 257, 257)];
        let vocab = Vocabulary::from_merges(&merges).expect("merges replay");
        assert_eq!(vocab.resolve(256).expect("resolves"), b"ab");
        assert_eq!(vocab.resolve(257).expect("resolves"), b"abc");
        assert_eq!(vocab.resolve(258).expect("resolves"), b"abcabc");
        assert_eq!(vocab.next_id(), 259);
    }

    #[test]
    fn test_resolve_unknown_id() {
        let vocab = Vocabulary::base();
        assert!(matches!(vocab.resolve(256), Err(DecodeError::UnknownToken(256))));
    }

    #[test]
    fn test_contains_bytes_and_merges_only() {
        let vocab = Vocabulary::from_merges(&[rule(256, 97, 98)]).expect("merges replay");
        assert!(vocab.contains(0));
        assert!(vocab.contains(255));
        assert!(vocab.contains(256));
        assert!(!vocab.contains(257));
        assert!(!vocab.contains(100_257));
    }

    #[test]
    fn test_from_merges_rejects_gaps() {
        let merges = vec![rule(256, 97, 98), rule(258, 256, 99)];
        assert!(matches!(
            Vocabulary::from_merges(&merges),
            Err(DecodeError::UnknownToken(258))
        ));
    }

    #[test]
    fn test_from_merges_rejects_forward_reference() {
        let merges = vec![rule(256, 97, 257)];
        assert!(matches!(
            Vocabulary::from_merges(&merges),
            Err(DecodeError::UnknownToken(257))
        ));
    }

    #[test]
    fn test_from_merges_rejects_duplicate_pair() {
        let merges = vec![rule(256, 97, 98), rule(257, 97, 98)];
        assert!(matches!(
            Vocabulary::from_merges(&merges),
            Err(DecodeError::DuplicateMerge(TokenPair(97, 98)))
        ));
    }

    #[test]
    fn test_learned_lists_merges_only() {
        let merges = vec![rule(256, 104, 105)];
        let vocab = Vocabulary::from_merges(&merges).expect("merges replay");
        let learned: Vec<_> = vocab.learned().collect();
        assert_eq!(learned, vec![(256, &b"hi"[..])]);
    }

    #[test]
    fn test_piece_renders_text_and_raw_bytes() {
        let merges = vec![rule(256, 0xC3, 0xA9)];
        let vocab = Vocabulary::from_merges(&merges).expect("merges replay");
        assert_eq!(vocab.piece(256).expect("resolves"), "é");
        assert_eq!(vocab.piece(0xC3).expect("resolves"), "<0xC3>");
        assert_eq!(vocab.piece(97).expect("resolves"), "a");
    }
}
