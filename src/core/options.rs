//! Tokenizer configuration.
//!
//! Options can be built in code with the `with_*` methods or read from a JSON
//! document shaped like a `tokenizer_config.json`:
//!
//! ```json
//! {
//!   "special_tokens": [{"content": "<|endoftext|>"}],
//!   "unk_token": null,
//!   "add_prefix_space": false,
//!   "unknown_ids": "error",
//!   "cache_size": 0
//! }
//! ```
//!
//! Every field is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::LoadError;
use super::special::SpecialToken;

/// What decoding does with an id that resolves to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdPolicy {
    /// Fail the call with `TokenizerError::UnknownId`.
    #[default]
    Error,
    /// Drop the id and log a warning.
    Skip,
}

/// Per-call decoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Leave special tokens out of the decoded text.
    pub skip_special_tokens: bool,
    /// Overrides the tokenizer's [`UnknownIdPolicy`] when set.
    pub unknown_ids: Option<UnknownIdPolicy>,
}

/// Options fixed at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// Atomic tokens matched before pre-tokenization.
    pub special_tokens: Vec<SpecialToken>,
    /// Token substituted for symbols missing from the vocabulary. Without
    /// one, such symbols fail the encode call.
    pub unk_token: Option<String>,
    /// Prepend a space when the input does not start with whitespace, so the
    /// first word is encoded like any other word.
    pub add_prefix_space: bool,
    /// Default policy for unresolvable ids during decoding.
    pub unknown_ids: UnknownIdPolicy,
    /// Capacity of the per-instance chunk cache; 0 disables it.
    pub cache_size: usize,
}

impl TokenizerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON.
    pub fn from_json(data: &[u8]) -> Result<Self, LoadError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json(&data)
    }

    pub fn with_special_tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SpecialToken>,
    {
        self.special_tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn with_unk_token(mut self, unk_token: impl Into<String>) -> Self {
        self.unk_token = Some(unk_token.into());
        self
    }

    pub fn with_add_prefix_space(mut self, add_prefix_space: bool) -> Self {
        self.add_prefix_space = add_prefix_space;
        self
    }

    pub fn with_unknown_ids(mut self, policy: UnknownIdPolicy) -> Self {
        self.unknown_ids = policy;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}
