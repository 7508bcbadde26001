//! Mergewise - byte-level BPE tokenizer with a reference and a fast encoder.
//!
//! Features:
//! - GPT-2 compatible vocabularies, merge rules and pre-tokenization
//! - Reference encoder defining the exact ids
//! - Fast encoder over a precompiled, serializable merge automaton
//! - Bit-identical output between the two on every input
//! - Aho-Corasick matching for special tokens
//! - Optional LRU cache for frequently encoded chunks
//! - UTF-8 streaming decoder for generated output
//!
//! ```
//! use mergewise::{load, FastTokenizer, TokenEncoder, TokenizerOptions};
//!
//! let vocab = r#"{"h": 0, "i": 1, "Ġ": 2, "hi": 3, "Ġhi": 4}"#;
//! let merges = "#version: 0.2\nh i\nĠ hi\n";
//! let tokenizer = load(vocab.as_bytes(), merges.as_bytes(), TokenizerOptions::default())?;
//!
//! let ids = tokenizer.encode("hi hi")?;
//! assert_eq!(ids, vec![3, 4]);
//! assert_eq!(tokenizer.decode(&ids)?, "hi hi");
//!
//! let fast = FastTokenizer::from_reference(&tokenizer);
//! assert_eq!(fast.encode("hi hi")?, ids);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;

pub use core::{
    load, load_fast, AutomatonArtifact, BpeModel, ByteEncoder, DecodeError, DecodeOptions,
    FastTokenizer, LoadError, MergeAutomaton, MergeTable, PreTokenizer, SpecialToken,
    StreamingDecoder, TokenEncoder, Tokenizer, TokenizerError, TokenizerOptions, UnknownIdPolicy,
    Vocabulary, GPT2_PATTERN,
};
