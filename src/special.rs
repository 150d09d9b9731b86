//! Special tokens: reserved literals that bypass byte-level merging.
//!
//! Before chunking, text is cut at every active special literal. The pieces
//! in between go through the ordinary pipeline; each literal becomes a
//! single reserved id.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use fancy_regex::Regex;

use crate::{
    error::{EncodeError, SpecialTokenError},
    types::Token,
};

pub const ENDOFTEXT: &str = "<|endoftext|>";
pub const FIM_PREFIX: &str = "<|fim_prefix|>";
pub const FIM_MIDDLE: &str = "<|fim_middle|>";
pub const FIM_SUFFIX: &str = "<|fim_suffix|>";
pub const ENDOFPROMPT: &str = "<|endofprompt|>";

/// Which special tokens `encode` recognises.
///
/// Resolved once at the top of an encode call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowedSpecial {
    /// Special literals are ordinary text.
    #[default]
    None,
    /// Every registered special token is recognised.
    All,
    /// Like `None`, but fail if any registered literal appears in the text.
    NoneRaise,
    /// Only the named literals are recognised; every name must be registered.
    Explicit(HashSet<String>),
}

impl AllowedSpecial {
    /// Convenience constructor for [`AllowedSpecial::Explicit`].
    pub fn explicit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Explicit(names.into_iter().map(Into::into).collect())
    }
}

impl FromStr for AllowedSpecial {
    type Err = String;

    /// Parses the keyword forms "none", "all" and "none_raise".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "none_raise" => Ok(Self::NoneRaise),
            _ => Err(format!(
                "invalid special token mode: {s:?} (expected \"none\", \"all\" or \"none_raise\")"
            )),
        }
    }
}

/// One piece of text after special-token splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'t> {
    /// Ordinary text to be chunked and merged.
    Text(&'t str),
    /// A recognised special literal, already resolved to its id.
    Special(Token),
}

/// Bijective mapping between special literals and reserved ids.
///
/// The inverse map is always derived from the forward map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokenTable {
    by_literal: HashMap<String, Token>,
    by_id: BTreeMap<Token, String>,
}

impl SpecialTokenTable {
    /// A table with no special tokens.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from `(literal, id)` entries.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecialTokenError`] on an empty literal, a literal listed
    /// twice or an id listed twice.
    pub fn new<I, S>(entries: I) -> Result<Self, SpecialTokenError>
    where
        I: IntoIterator<Item = (S, Token)>,
        S: Into<String>,
    {
        let mut by_literal = HashMap::new();
        let mut by_id = BTreeMap::new();

        for (literal, id) in entries {
            let literal = literal.into();
            if literal.is_empty() {
                return Err(SpecialTokenError::EmptyLiteral);
            }
            if by_literal.contains_key(&literal) {
                return Err(SpecialTokenError::DuplicateLiteral(literal));
            }
            if by_id.contains_key(&id) {
                return Err(SpecialTokenError::DuplicateId(id));
            }
            by_id.insert(id, literal.clone());
            by_literal.insert(literal, id);
        }

        Ok(Self { by_literal, by_id })
    }

    /// The cl100k_base convention: end-of-text, fill-in-the-middle and
    /// end-of-prompt markers in the 100k band.
    pub fn cl100k() -> Self {
        let entries = [
            (ENDOFTEXT, 100_257),
            (FIM_PREFIX, 100_258),
            (FIM_MIDDLE, 100_259),
            (FIM_SUFFIX, 100_260),
            (ENDOFPROMPT, 100_276),
        ];
        let by_literal: HashMap<String, Token> =
            entries.iter().map(|&(s, id)| (s.to_owned(), id)).collect();
        let by_id = entries.iter().map(|&(s, id)| (id, s.to_owned())).collect();
        Self { by_literal, by_id }
    }

    pub fn len(&self) -> usize {
        self.by_literal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_literal.is_empty()
    }

    /// Id bound to `literal`.
    pub fn id(&self, literal: &str) -> Option<Token> {
        self.by_literal.get(literal).copied()
    }

    /// Literal bound to `id`.
    pub fn literal(&self, id: Token) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// `(literal, id)` entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Token)> + '_ {
        self.by_id.iter().map(|(&id, s)| (s.as_str(), id))
    }

    /// Checks that no special id falls inside a vocabulary of `vocab_len`
    /// byte and merge entries.
    pub(crate) fn check_disjoint(&self, vocab_len: usize) -> Result<(), SpecialTokenError> {
        match self.by_id.keys().next() {
            Some(&lowest) if (lowest as usize) < vocab_len => {
                Err(SpecialTokenError::IdCollision(lowest))
            }
            _ => Ok(()),
        }
    }

    /// Cuts `text` into ordinary and special segments according to `allowed`.
    ///
    /// Segments are returned in text order; empty ordinary segments are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::DisallowedSpecial`] under `NoneRaise` when a
    /// registered literal occurs in the text, [`EncodeError::UnknownSpecial`]
    /// when an explicit set names an unregistered literal, and
    /// [`EncodeError::RegexMatch`] if the literal matcher fails.
    pub fn split<'t>(
        &self,
        text: &'t str,
        allowed: &AllowedSpecial,
    ) -> Result<Vec<Segment<'t>>, EncodeError> {
        let active: Vec<(&str, Token)> = match allowed {
            AllowedSpecial::None => Vec::new(),
            AllowedSpecial::NoneRaise => {
                // Report the leftmost offending literal.
                let hit = self
                    .by_literal
                    .keys()
                    .filter_map(|lit| text.find(lit.as_str()).map(|pos| (pos, lit)))
                    .min();
                if let Some((_, lit)) = hit {
                    return Err(EncodeError::DisallowedSpecial(lit.clone()));
                }
                Vec::new()
            }
            AllowedSpecial::All => self.iter().collect(),
            AllowedSpecial::Explicit(names) => {
                let mut active = Vec::with_capacity(names.len());
                for name in names {
                    let id = self
                        .id(name)
                        .ok_or_else(|| EncodeError::UnknownSpecial(name.clone()))?;
                    active.push((name.as_str(), id));
                }
                active
            }
        };

        if active.is_empty() {
            return Ok(if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Text(text)]
            });
        }

        let matcher = literal_matcher(&active)?;
        let ids: HashMap<&str, Token> = active.into_iter().collect();

        let mut segments = Vec::new();
        let mut segment_start = 0;

        for mat in matcher.find_iter(text) {
            let mat = mat.map_err(|e| EncodeError::RegexMatch(e.to_string()))?;

            // guard against empty normal segments when text starts with a
            // special token or contains two consecutive special tokens.
            if mat.start() > segment_start {
                segments.push(Segment::Text(&text[segment_start..mat.start()]));
            }
            let id = ids.get(mat.as_str()).copied().ok_or_else(|| {
                EncodeError::RegexMatch(format!("unmatched literal {:?}", mat.as_str()))
            })?;
            segments.push(Segment::Special(id));
            segment_start = mat.end();
        }
        if segment_start < text.len() {
            segments.push(Segment::Text(&text[segment_start..]));
        }

        Ok(segments)
    }
}

/// Alternation of the escaped literals, longest first so that a literal
/// which is a prefix of another never shadows it.
fn literal_matcher(active: &[(&str, Token)]) -> Result<Regex, EncodeError> {
    let mut literals: Vec<&str> = active.iter().map(|&(s, _)| s).collect();
    literals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = literals
        .iter()
        .map(|s| fancy_regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&pattern).map_err(|e| EncodeError::RegexMatch(e.to_string()))
}
