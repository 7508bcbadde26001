//! Error types shared by the loaders, encoders and decoders.
//!
//! Errors are split by when they can happen:
//!
//! - [`LoadError`]: raised while building a tokenizer. Loading is atomic, so a
//!   `LoadError` always means no tokenizer was produced.
//! - [`DecodeError`]: the byte-level inverse failed. This points at corrupted
//!   ids or a vocabulary paired with the wrong byte map and is never masked.
//! - [`TokenizerError`]: per-call failures during encode/decode. They leave the
//!   tokenizer untouched for later calls.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading vocabulary, merge or automaton artifacts.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed merge rule on line {line}: {content:?}")]
    MalformedMerge { line: usize, content: String },
    #[error("token id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },
    #[error("unknown token {0:?} is not in the vocabulary")]
    MissingUnkToken(String),
    #[error("invalid special token declaration: {0}")]
    SpecialToken(String),
    #[error("special token matcher build error: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
    #[error("unsupported automaton artifact: {0}")]
    ArtifactFormat(String),
    #[error("automaton artifact does not match the supplied {0}")]
    ArtifactMismatch(&'static str),
    #[error("corrupt automaton artifact: {0}")]
    CorruptArtifact(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised when mapping byte-level text back to raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("codepoint {:?} (U+{:04X}) is outside the byte-level alphabet", .0, codepoint(.0))]
    InvalidCodepoint(char),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

fn codepoint(ch: &char) -> u32 {
    *ch as u32
}

/// Errors raised by individual encode/decode calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    #[error("symbol {0:?} is not in the vocabulary and no unknown token is configured")]
    UnknownToken(String),
    #[error("token id {0} is not in the vocabulary")]
    UnknownId(u32),
    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),
}
