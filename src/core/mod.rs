//! Core tokenization engine for mergewise.
//!
//! This module contains the byte-level BPE implementation:
//! - Loading of GPT-2 style `vocab.json` / `merges.txt` artifacts
//! - A pre-tokenizer reproducing the GPT-2 split pattern without a regex engine
//! - A reference encoder (iterative best-pair merging over strings)
//! - A fast encoder over a precompiled merge automaton, with identical output
//! - Exact decoding, including a UTF-8 safe streaming decoder
//!
//! # Architecture
//!
//! - [`Tokenizer`] / [`FastTokenizer`]: the two [`TokenEncoder`] implementations,
//!   sharing one immutable [`BpeModel`]
//! - [`ByteEncoder`]: the reversible byte ↔ codepoint map
//! - [`Vocabulary`], [`MergeTable`], [`SpecialTokens`]: loaded tables
//! - [`PreTokenizer`]: splits text into chunks before BPE
//! - [`MergeAutomaton`]: merge rules compiled to dense states, serialized as an
//!   [`AutomatonArtifact`]
//! - [`StreamingDecoder`]: token-by-token decoding for generated output
//!
//! # Performance
//!
//! - **FxHashMap**: faster hashing than the standard map for string keys
//! - **Aho-Corasick**: single-pass matching of special tokens
//! - **Heap-driven merging**: O(n log n) per chunk in the fast encoder
//! - **LRU cache**: optional, avoids re-encoding repeated chunks

mod artifact;
mod automaton;
mod bpe;
pub mod byte_level;
mod decoder;
mod error;
mod merges;
mod options;
pub mod pretokenizer;
mod special;
mod streaming;
#[cfg(test)]
mod testing;
mod tokenizer;
mod vocab;

pub use artifact::{AutomatonArtifact, ARTIFACT_FORMAT, ARTIFACT_VERSION};
pub use automaton::{MergeAutomaton, StateId, Transition, BYTE_STATES};
pub use bpe::{byte_pair_encode, byte_pair_merge, byte_symbols};
pub use byte_level::ByteEncoder;
pub use decoder::Decoder;
pub use error::{DecodeError, LoadError, TokenizerError};
pub use merges::{MergePair, MergeTable};
pub use options::{DecodeOptions, TokenizerOptions, UnknownIdPolicy};
pub use pretokenizer::{Chunks, PreTokenizer, GPT2_PATTERN};
pub use special::{Segment, SpecialToken, SpecialTokens};
pub use streaming::StreamingDecoder;
pub use tokenizer::{load, load_fast, BpeModel, FastTokenizer, TokenEncoder, Tokenizer};
pub use vocab::{build_decoder, Vocabulary};
