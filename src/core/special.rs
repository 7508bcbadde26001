//! Special tokens: atomic strings that bypass pre-tokenization and BPE.
//!
//! Special tokens are found in the raw input with an Aho-Corasick automaton
//! (leftmost-longest), before the text reaches the pre-tokenizer. Every
//! occurrence becomes exactly one id.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::error::LoadError;
use super::vocab::Vocabulary;

/// Declaration of one special token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialToken {
    /// The literal text that is matched in the input.
    pub content: String,
    /// Fixed id. When absent, the vocabulary id is used, or a fresh id past
    /// the end of the vocabulary is assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Text produced when decoding. Defaults to `content`; an empty surface
    /// makes the token invisible in decoded text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
}

impl SpecialToken {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            id: None,
            surface: None,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_surface(mut self, surface: impl Into<String>) -> Self {
        self.surface = Some(surface.into());
        self
    }

    /// The decoded form of this token.
    pub fn surface(&self) -> &str {
        self.surface.as_deref().unwrap_or(&self.content)
    }
}

impl From<&str> for SpecialToken {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

/// A piece of input after special tokens have been split out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Ordinary text, to be pre-tokenized and encoded.
    Text(&'a str),
    /// A special token occurrence with its id.
    Special(u32),
}

/// The resolved special tokens of a tokenizer.
#[derive(Debug, Clone, Default)]
pub struct SpecialTokens {
    tokens: Vec<SpecialToken>,
    by_content: FxHashMap<String, u32>,
    by_id: FxHashMap<u32, usize>,
    matcher: Option<AhoCorasick>,
}

impl SpecialTokens {
    /// Resolve declarations against `vocab`.
    ///
    /// Fails when a declaration is empty, repeated, or conflicts with the
    /// vocabulary (an explicit id that the vocabulary gives to another string,
    /// or a vocabulary string declared with a different id).
    pub fn resolve(declared: &[SpecialToken], vocab: &Vocabulary) -> Result<Self, LoadError> {
        let mut tokens = Vec::with_capacity(declared.len());
        let mut by_content = FxHashMap::default();
        let mut by_id = FxHashMap::default();
        let mut next_id = vocab.max_id().map_or(0, |id| id.saturating_add(1));

        // Explicit ids are claimed first so fresh ids never collide with them.
        for decl in declared {
            if let Some(id) = decl.id {
                next_id = next_id.max(id.saturating_add(1));
            }
        }

        for decl in declared {
            if decl.content.is_empty() {
                return Err(LoadError::SpecialToken(
                    "special token content must not be empty".to_string(),
                ));
            }
            if by_content.contains_key(&decl.content) {
                return Err(LoadError::SpecialToken(format!(
                    "{:?} is declared more than once",
                    decl.content
                )));
            }

            let in_vocab = vocab.get(&decl.content);
            let id = match (decl.id, in_vocab) {
                (Some(id), Some(vocab_id)) if id != vocab_id => {
                    return Err(LoadError::SpecialToken(format!(
                        "{:?} is declared with id {id} but the vocabulary assigns {vocab_id}",
                        decl.content
                    )));
                }
                (Some(id), _) => {
                    if let Ok(other) = vocab.token_of(id) {
                        if other != decl.content {
                            return Err(LoadError::SpecialToken(format!(
                                "id {id} of {:?} already belongs to vocabulary token {other:?}",
                                decl.content
                            )));
                        }
                    }
                    id
                }
                (None, Some(vocab_id)) => vocab_id,
                (None, None) => {
                    next_id += 1;
                    next_id - 1
                }
            };

            if by_id.contains_key(&id) {
                return Err(LoadError::SpecialToken(format!(
                    "id {id} is assigned to more than one special token"
                )));
            }

            by_content.insert(decl.content.clone(), id);
            by_id.insert(id, tokens.len());
            tokens.push(SpecialToken {
                content: decl.content.clone(),
                id: Some(id),
                surface: decl.surface.clone(),
            });
        }

        let matcher = if tokens.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(tokens.iter().map(|t| t.content.as_str()))?,
            )
        };

        Ok(Self {
            tokens,
            by_content,
            by_id,
            matcher,
        })
    }

    /// Id of the special token whose content is exactly `text`.
    #[inline]
    pub fn id_of(&self, text: &str) -> Option<u32> {
        self.by_content.get(text).copied()
    }

    /// The special token with id `id`.
    #[inline]
    pub fn get(&self, id: u32) -> Option<&SpecialToken> {
        self.by_id.get(&id).map(|&idx| &self.tokens[idx])
    }

    /// Whether `text` is exactly a declared special token.
    pub fn contains(&self, text: &str) -> bool {
        self.by_content.contains_key(text)
    }

    /// Resolved declarations; every entry has `id` set.
    pub fn tokens(&self) -> &[SpecialToken] {
        &self.tokens
    }

    /// Largest special-token id.
    pub fn max_id(&self) -> Option<u32> {
        self.by_id.keys().max().copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Split `text` into ordinary text and special-token occurrences.
    ///
    /// Empty text segments are omitted.
    pub fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let Some(matcher) = &self.matcher else {
            return if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Text(text)]
            };
        };

        let mut segments = Vec::new();
        let mut last_end = 0;
        for m in matcher.find_iter(text) {
            if m.start() > last_end {
                segments.push(Segment::Text(&text[last_end..m.start()]));
            }
            let token = &self.tokens[m.pattern().as_usize()];
            if let Some(id) = token.id {
                segments.push(Segment::Special(id));
            }
            last_end = m.end();
        }
        if last_end < text.len() {
            segments.push(Segment::Text(&text[last_end..]));
        }
        segments
    }
}
