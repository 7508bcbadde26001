//! Serialized form of a compiled merge automaton.
//!
//! The artifact carries everything needed to restore a fast tokenizer
//! without recompiling: the vocabulary and merge rules it was built from,
//! the state and transition tables, and the resolved special tokens.
//!
//! ```text
//! {
//!   "format": "mergewise-automaton",
//!   "version": 1,
//!   "vocab": {"!": 0, ...},
//!   "merges": [["Ġ", "t"], ...],
//!   "states": ["Ā", "ā", ...],
//!   "transitions": [[0, 288, 84, 512], ...],
//!   "state_tokens": [188, 189, ..., null],
//!   "special_tokens": [{"content": "<|endoftext|>", "id": 50256}],
//!   "unk_token": null
//! }
//! ```
//!
//! `transitions` entries are `[rank, left_state, right_state, merged_state]`.
//! Maps are written with sorted keys so equal automata serialize identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::automaton::MergeAutomaton;
use super::error::LoadError;
use super::merges::MergeTable;
use super::special::SpecialToken;
use super::vocab::Vocabulary;

/// Value of the `format` field.
pub const ARTIFACT_FORMAT: &str = "mergewise-automaton";

/// Current artifact version.
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatonArtifact {
    pub format: String,
    pub version: u32,
    pub vocab: BTreeMap<String, u32>,
    pub merges: Vec<(String, String)>,
    pub states: Vec<String>,
    pub transitions: Vec<[u32; 4]>,
    pub state_tokens: Vec<Option<u32>>,
    #[serde(default)]
    pub special_tokens: Vec<SpecialToken>,
    #[serde(default)]
    pub unk_token: Option<String>,
}

impl AutomatonArtifact {
    /// Capture a compiled automaton together with its inputs.
    pub fn new(
        vocab: &Vocabulary,
        merges: &MergeTable,
        automaton: &MergeAutomaton,
        special_tokens: &[SpecialToken],
        unk_token: Option<&str>,
    ) -> Self {
        Self {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            vocab: vocab
                .encoder()
                .iter()
                .map(|(token, &id)| (token.clone(), id))
                .collect(),
            merges: merges.pairs().to_vec(),
            states: automaton.states().to_vec(),
            transitions: automaton.transition_table(),
            state_tokens: automaton.state_tokens().to_vec(),
            special_tokens: special_tokens.to_vec(),
            unk_token: unk_token.map(str::to_string),
        }
    }

    /// Parse an artifact, rejecting unknown formats and versions.
    pub fn from_json(data: &[u8]) -> Result<Self, LoadError> {
        let artifact: Self = serde_json::from_slice(data)?;
        if artifact.format != ARTIFACT_FORMAT {
            return Err(LoadError::ArtifactFormat(format!(
                "format {:?}, expected {ARTIFACT_FORMAT:?}",
                artifact.format
            )));
        }
        if artifact.version != ARTIFACT_VERSION {
            return Err(LoadError::ArtifactFormat(format!(
                "version {}, expected {ARTIFACT_VERSION}",
                artifact.version
            )));
        }
        Ok(artifact)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json(&data)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Fail unless the artifact was built from exactly `vocab` and `merges`.
    pub fn check_inputs(&self, vocab: &Vocabulary, merges: &MergeTable) -> Result<(), LoadError> {
        let same_vocab = self.vocab.len() == vocab.len()
            && self
                .vocab
                .iter()
                .all(|(token, &id)| vocab.get(token) == Some(id));
        if !same_vocab {
            return Err(LoadError::ArtifactMismatch("vocabulary"));
        }
        if self.merges != merges.pairs() {
            return Err(LoadError::ArtifactMismatch("merge rules"));
        }
        Ok(())
    }

    /// Restore the automaton after checking it against `vocab` and `merges`.
    pub fn into_automaton(
        self,
        vocab: &Vocabulary,
        merges: &MergeTable,
    ) -> Result<MergeAutomaton, LoadError> {
        self.check_inputs(vocab, merges)?;
        MergeAutomaton::from_parts(
            self.states,
            &self.transitions,
            self.state_tokens,
            merges,
            vocab,
        )
    }
}
