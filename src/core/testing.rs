//! Fixtures shared by unit tests.

use rustc_hash::FxHashMap;

use super::byte_level::ByteEncoder;
use super::merges::MergeTable;
use super::vocab::Vocabulary;

/// A vocabulary holding every single-byte token at its byte value, followed
/// by `extra` at ids 256, 257, ...
pub(crate) fn byte_vocab(extra: &[&str]) -> Vocabulary {
    let mut map = FxHashMap::default();
    for b in 0..=255u8 {
        map.insert(ByteEncoder::char_of(b).to_string(), b as u32);
    }
    for (i, token) in extra.iter().enumerate() {
        map.insert(token.to_string(), 256 + i as u32);
    }
    Vocabulary::new(map).unwrap()
}

pub(crate) fn merge_table(pairs: &[(&str, &str)]) -> MergeTable {
    MergeTable::new(
        pairs
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect(),
    )
}
