//! Vocabulary loading for GPT-2 style `vocab.json` artifacts.
//!
//! The vocabulary is a JSON object mapping byte-level token strings to
//! integer ids:
//!
//! ```text
//! {"!": 0, "\"": 1, ..., "Ġthe": 262, ..., "<|endoftext|>": 50256}
//! ```
//!
//! Ids must be unique. They are kept exactly as loaded; nothing requires them
//! to be dense or to start at zero.

use rustc_hash::FxHashMap;
use std::path::Path;

use super::error::{LoadError, TokenizerError};

/// Bidirectional token string ↔ id mapping.
///
/// Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    encoder: FxHashMap<String, u32>,
    decoder: FxHashMap<u32, String>,
    unk_id: Option<u32>,
}

impl Vocabulary {
    /// Build a vocabulary from a token → id map.
    ///
    /// Fails with [`LoadError::DuplicateId`] if two tokens share an id.
    pub fn new(encoder: FxHashMap<String, u32>) -> Result<Self, LoadError> {
        let decoder = build_decoder(&encoder)?;
        Ok(Self {
            encoder,
            decoder,
            unk_id: None,
        })
    }

    /// Parse a `vocab.json` document.
    pub fn from_json(data: &[u8]) -> Result<Self, LoadError> {
        let encoder: FxHashMap<String, u32> = serde_json::from_slice(data)?;
        Self::new(encoder)
    }

    /// Read and parse a `vocab.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json(&data)
    }

    /// Designate the token used in place of symbols missing from the vocabulary.
    pub fn with_unk_token(mut self, unk_token: Option<&str>) -> Result<Self, LoadError> {
        self.unk_id = match unk_token {
            Some(token) => Some(
                self.encoder
                    .get(token)
                    .copied()
                    .ok_or_else(|| LoadError::MissingUnkToken(token.to_string()))?,
            ),
            None => None,
        };
        Ok(self)
    }

    /// Id of `token`.
    pub fn id_of(&self, token: &str) -> Result<u32, TokenizerError> {
        self.get(token)
            .ok_or_else(|| TokenizerError::UnknownToken(token.to_string()))
    }

    /// Id of `token`, falling back to the unknown token when one is configured.
    pub fn id_or_unk(&self, token: &str) -> Result<u32, TokenizerError> {
        match self.get(token).or(self.unk_id) {
            Some(id) => Ok(id),
            None => Err(TokenizerError::UnknownToken(token.to_string())),
        }
    }

    /// Token string for `id`.
    pub fn token_of(&self, id: u32) -> Result<&str, TokenizerError> {
        self.decoder
            .get(&id)
            .map(String::as_str)
            .ok_or(TokenizerError::UnknownId(id))
    }

    /// Non-failing lookup of `token`.
    #[inline]
    pub fn get(&self, token: &str) -> Option<u32> {
        self.encoder.get(token).copied()
    }

    /// Whether `token` is in the vocabulary.
    pub fn contains(&self, token: &str) -> bool {
        self.encoder.contains_key(token)
    }

    /// Id of the configured unknown token.
    pub fn unk_id(&self) -> Option<u32> {
        self.unk_id
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Largest id in the vocabulary.
    pub fn max_id(&self) -> Option<u32> {
        self.decoder.keys().max().copied()
    }

    /// The token → id map.
    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.encoder
    }

    /// The id → token map.
    pub fn decoder(&self) -> &FxHashMap<u32, String> {
        &self.decoder
    }
}

/// Build the id → token map, rejecting ids used by more than one token.
pub fn build_decoder(encoder: &FxHashMap<String, u32>) -> Result<FxHashMap<u32, String>, LoadError> {
    let mut decoder = FxHashMap::with_capacity_and_hasher(encoder.len(), Default::default());
    for (token, &id) in encoder {
        if let Some(first) = decoder.insert(id, token.clone()) {
            // Report the pair in a stable order regardless of hash iteration.
            let (first, second) = if first <= *token {
                (first, token.clone())
            } else {
                (token.clone(), first)
            };
            return Err(LoadError::DuplicateId { id, first, second });
        }
    }
    Ok(decoder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_vocab_json() {
        let json = r#"{"Hello": 0, "World": 1, "Ġthe": 7}"#;
        let vocab = Vocabulary::from_json(json.as_bytes()).unwrap();

        assert_eq!(vocab.id_of("Hello"), Ok(0));
        assert_eq!(vocab.id_of("Ġthe"), Ok(7));
        assert_eq!(vocab.token_of(1), Ok("World"));
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.max_id(), Some(7));
    }

    #[test]
    fn test_lookup_misses() {
        let vocab = Vocabulary::from_json(br#"{"a": 0}"#).unwrap();
        assert_eq!(
            vocab.id_of("b"),
            Err(TokenizerError::UnknownToken("b".to_string()))
        );
        assert_eq!(vocab.token_of(9), Err(TokenizerError::UnknownId(9)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Vocabulary::from_json(br#"{"a": 0, "b": 0}"#).unwrap_err();
        match err {
            LoadError::DuplicateId { id, first, second } => {
                assert_eq!(id, 0);
                assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_id_is_a_json_error() {
        assert!(matches!(
            Vocabulary::from_json(br#"{"a": -1}"#),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn test_unk_fallback() {
        let vocab = Vocabulary::from_json(br#"{"a": 0, "<unk>": 1}"#)
            .unwrap()
            .with_unk_token(Some("<unk>"))
            .unwrap();
        assert_eq!(vocab.unk_id(), Some(1));
        assert_eq!(vocab.id_or_unk("zzz"), Ok(1));
        assert_eq!(vocab.id_or_unk("a"), Ok(0));

        let err = Vocabulary::from_json(br#"{"a": 0}"#)
            .unwrap()
            .with_unk_token(Some("<unk>"))
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingUnkToken(_)));
    }
}
