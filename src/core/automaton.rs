//! Merge rules compiled into a state machine for fast encoding.
//!
//! Every symbol that can appear during merging gets a dense state id. States
//! `0..=255` are the single-byte symbols in byte order, so a chunk's initial
//! states are its bytes. The remaining states are the distinct strings named
//! by merge rules. A transition maps an adjacent `(left, right)` state pair to
//! the rule's rank and the merged state.
//!
//! # Algorithm
//!
//! Symbols live in a linked list over the chunk, and mergeable adjacent pairs
//! sit in a min-heap keyed by `(rank, position)`. Merges are applied in
//! rounds: all candidates of the lowest rank are popped and applied in
//! position order, and pairs created by the round are held back until it
//! ends. That reproduces the reference rule of merging every non-overlapping
//! occurrence of the best pair before looking for the next one, including
//! tables where a merge result outranks the rule that produced it.
//!
//! Stale candidates are never removed from the heap; they are rejected when
//! popped because their recorded states no longer match the list.
//!
//! Encoding is O(n log n) in the chunk length.

use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::byte_level::ByteEncoder;
use super::error::{LoadError, TokenizerError};
use super::merges::MergeTable;
use super::vocab::Vocabulary;

/// Dense id of a symbol in the automaton.
pub type StateId = u32;

/// Number of single-byte states at the start of the state table.
pub const BYTE_STATES: usize = 256;

/// Outcome of merging an adjacent state pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub rank: u32,
    pub merged: StateId,
}

/// A pending merge of the pair starting at node `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    rank: u32,
    pos: usize,
    left: StateId,
    right: StateId,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    state: StateId,
    prev: Option<usize>,
    next: Option<usize>,
    alive: bool,
}

/// The compiled merge table.
///
/// Immutable after construction; share it with `Arc`.
#[derive(Debug, Clone)]
pub struct MergeAutomaton {
    states: Vec<String>,
    state_ids: FxHashMap<String, StateId>,
    transitions: FxHashMap<(StateId, StateId), Transition>,
    /// Vocabulary id of each state's symbol.
    state_tokens: Vec<Option<u32>>,
}

impl MergeAutomaton {
    /// Compile `merges`, resolving final ids against `vocab`.
    pub fn compile(merges: &MergeTable, vocab: &Vocabulary) -> Self {
        let mut automaton = Self::with_byte_states(BYTE_STATES + merges.live_len());
        for pair in merges.iter() {
            let left = automaton.intern(pair.left);
            let right = automaton.intern(pair.right);
            let merged = automaton.intern(&format!("{}{}", pair.left, pair.right));
            automaton.transitions.insert(
                (left, right),
                Transition {
                    rank: pair.rank,
                    merged,
                },
            );
        }
        automaton.state_tokens = automaton.states.iter().map(|s| vocab.get(s)).collect();

        log::debug!(
            "compiled merge automaton: {} states, {} transitions, {} states without a token",
            automaton.states.len(),
            automaton.transitions.len(),
            automaton.state_tokens.iter().filter(|t| t.is_none()).count()
        );
        automaton
    }

    /// Rebuild an automaton from serialized tables, checking them against
    /// `merges` and `vocab`.
    ///
    /// `transitions` entries are `[rank, left, right, merged]`.
    pub fn from_parts(
        states: Vec<String>,
        transitions: &[[u32; 4]],
        state_tokens: Vec<Option<u32>>,
        merges: &MergeTable,
        vocab: &Vocabulary,
    ) -> Result<Self, LoadError> {
        if states.len() < BYTE_STATES {
            return Err(corrupt(format!(
                "{} states is fewer than the {BYTE_STATES} byte states",
                states.len()
            )));
        }
        for (b, state) in states.iter().take(BYTE_STATES).enumerate() {
            let mut chars = state.chars();
            if chars.next() != Some(ByteEncoder::char_of(b as u8)) || chars.next().is_some() {
                return Err(corrupt(format!("state {b} is {state:?}, not byte {b}")));
            }
        }

        let mut state_ids = FxHashMap::with_capacity_and_hasher(states.len(), Default::default());
        for (id, state) in states.iter().enumerate() {
            if state_ids.insert(state.clone(), id as StateId).is_some() {
                return Err(corrupt(format!("state {state:?} is listed twice")));
            }
        }

        if state_tokens.len() != states.len() {
            return Err(corrupt(format!(
                "{} state tokens for {} states",
                state_tokens.len(),
                states.len()
            )));
        }
        for (state, &token) in states.iter().zip(&state_tokens) {
            if token != vocab.get(state) {
                return Err(corrupt(format!(
                    "state {state:?} maps to token {token:?}, vocabulary says {:?}",
                    vocab.get(state)
                )));
            }
        }

        if transitions.len() != merges.live_len() {
            return Err(corrupt(format!(
                "{} transitions for {} merge rules",
                transitions.len(),
                merges.live_len()
            )));
        }
        let symbol = |id: u32| {
            states
                .get(id as usize)
                .ok_or_else(|| corrupt(format!("state {id} is out of range")))
        };
        let mut table = FxHashMap::with_capacity_and_hasher(transitions.len(), Default::default());
        for &[rank, left, right, merged] in transitions {
            let (l, r, m) = (symbol(left)?, symbol(right)?, symbol(merged)?);
            let rule_matches = merges
                .pair_of(rank)
                .is_some_and(|pair| pair.left == l && pair.right == r);
            let concatenation = m.len() == l.len() + r.len()
                && m.starts_with(l.as_str())
                && m.ends_with(r.as_str());
            if !rule_matches || !concatenation {
                return Err(corrupt(format!(
                    "transition {rank} ({l:?}, {r:?}) -> {m:?} does not match the merge rules"
                )));
            }
            if table
                .insert((left, right), Transition { rank, merged })
                .is_some()
            {
                return Err(corrupt(format!("pair ({l:?}, {r:?}) has two transitions")));
            }
        }

        Ok(Self {
            states,
            state_ids,
            transitions: table,
            state_tokens,
        })
    }

    fn with_byte_states(capacity: usize) -> Self {
        let mut automaton = Self {
            states: Vec::with_capacity(capacity),
            state_ids: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            transitions: FxHashMap::default(),
            state_tokens: Vec::new(),
        };
        for b in 0..=255u8 {
            automaton.intern(&ByteEncoder::char_of(b).to_string());
        }
        automaton
    }

    fn intern(&mut self, symbol: &str) -> StateId {
        if let Some(&id) = self.state_ids.get(symbol) {
            return id;
        }
        let id = self.states.len() as StateId;
        self.states.push(symbol.to_string());
        self.state_ids.insert(symbol.to_string(), id);
        id
    }

    /// Transition for the adjacent pair `(left, right)`.
    #[inline]
    pub fn transition(&self, left: StateId, right: StateId) -> Option<Transition> {
        self.transitions.get(&(left, right)).copied()
    }

    /// State of `symbol`, if any rule or byte produces it.
    pub fn state_of(&self, symbol: &str) -> Option<StateId> {
        self.state_ids.get(symbol).copied()
    }

    /// Symbol string of `state`.
    pub fn symbol(&self, state: StateId) -> Option<&str> {
        self.states.get(state as usize).map(String::as_str)
    }

    /// Vocabulary id of `state`'s symbol.
    #[inline]
    pub fn token_of(&self, state: StateId) -> Option<u32> {
        self.state_tokens.get(state as usize).copied().flatten()
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn state_tokens(&self) -> &[Option<u32>] {
        &self.state_tokens
    }

    /// Transitions as `[rank, left, right, merged]`, in rank order.
    pub fn transition_table(&self) -> Vec<[u32; 4]> {
        let mut table: Vec<[u32; 4]> = self
            .transitions
            .iter()
            .map(|(&(left, right), t)| [t.rank, left, right, t.merged])
            .collect();
        table.sort_unstable();
        table
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    #[inline]
    fn candidate(&self, pos: usize, left: StateId, right: StateId) -> Option<Candidate> {
        self.transition(left, right).map(|t| Candidate {
            rank: t.rank,
            pos,
            left,
            right,
        })
    }

    /// Run all merges over `bytes` and return the final states in order.
    pub fn merge_states(&self, bytes: &[u8]) -> Vec<StateId> {
        let n = bytes.len();
        if n < 2 {
            return bytes.iter().map(|&b| b as StateId).collect();
        }

        let mut nodes: Vec<Node> = bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| Node {
                state: b as StateId,
                prev: i.checked_sub(1),
                next: (i + 1 < n).then_some(i + 1),
                alive: true,
            })
            .collect();

        let mut heap = BinaryHeap::with_capacity(n);
        for i in 0..n - 1 {
            if let Some(c) = self.candidate(i, nodes[i].state, nodes[i + 1].state) {
                heap.push(Reverse(c));
            }
        }

        let mut pending = Vec::new();
        while let Some(Reverse(cand)) = heap.pop() {
            self.apply(&mut nodes, cand, &mut pending);

            let round_over = heap
                .peek()
                .map_or(true, |Reverse(next)| next.rank != cand.rank);
            if round_over {
                heap.extend(pending.drain(..).map(Reverse));
            }
        }

        nodes
            .into_iter()
            .filter(|node| node.alive)
            .map(|node| node.state)
            .collect()
    }

    /// Merge the pair at `cand.pos` if it is still what the candidate saw.
    fn apply(&self, nodes: &mut [Node], cand: Candidate, pending: &mut Vec<Candidate>) {
        let node = nodes[cand.pos];
        if !node.alive || node.state != cand.left {
            return;
        }
        let Some(right_pos) = node.next else {
            return;
        };
        if nodes[right_pos].state != cand.right {
            return;
        }
        let Some(t) = self.transition(cand.left, cand.right) else {
            return;
        };

        let after = nodes[right_pos].next;
        nodes[cand.pos].state = t.merged;
        nodes[cand.pos].next = after;
        nodes[right_pos].alive = false;
        if let Some(a) = after {
            nodes[a].prev = Some(cand.pos);
        }

        if let Some(p) = node.prev {
            pending.extend(self.candidate(p, nodes[p].state, t.merged));
        }
        if let Some(a) = after {
            pending.extend(self.candidate(cand.pos, t.merged, nodes[a].state));
        }
    }

    /// Encode one chunk and append its ids to `out`.
    ///
    /// States without a vocabulary token map to `unk_id`, or fail the call
    /// when it is `None`. On failure `out` is left as it was.
    pub fn encode_append(
        &self,
        bytes: &[u8],
        unk_id: Option<u32>,
        out: &mut Vec<u32>,
    ) -> Result<(), TokenizerError> {
        let start = out.len();
        for state in self.merge_states(bytes) {
            match self.token_of(state).or(unk_id) {
                Some(id) => out.push(id),
                None => {
                    out.truncate(start);
                    let symbol = self.symbol(state).unwrap_or_default().to_string();
                    return Err(TokenizerError::UnknownToken(symbol));
                }
            }
        }
        Ok(())
    }
}

fn corrupt(msg: String) -> LoadError {
    LoadError::CorruptArtifact(msg)
}
