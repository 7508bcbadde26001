//! Reference byte-pair encoding.
//!
//! This is the textbook algorithm: start from one symbol per byte, find the
//! lowest-ranked adjacent pair, merge every non-overlapping occurrence of it
//! from left to right, and repeat until no adjacent pair has a rule.
//!
//! It is O(n²) per chunk and works on strings rather than ids. The automaton
//! encoder in [`super::automaton`] produces the same ids faster; this module
//! defines what "the same" means.

use super::byte_level::ByteEncoder;
use super::error::TokenizerError;
use super::merges::MergeTable;
use super::vocab::Vocabulary;

/// Split `bytes` into single-byte symbols in their byte-level spelling.
pub fn byte_symbols(bytes: &[u8]) -> Vec<String> {
    bytes
        .iter()
        .map(|&b| ByteEncoder::char_of(b).to_string())
        .collect()
}

/// Apply merge rules to `symbols` until none applies.
pub fn byte_pair_merge(symbols: Vec<String>, merges: &MergeTable) -> Vec<String> {
    merge_with(symbols, merges, |_, _| {})
}

/// Like [`byte_pair_merge`], reporting each round's rank and the symbols it
/// is applied to.
fn merge_with(
    mut symbols: Vec<String>,
    merges: &MergeTable,
    mut on_round: impl FnMut(u32, &[String]),
) -> Vec<String> {
    while symbols.len() > 1 {
        let Some(rank) = merges.best_pair(&symbols).map(|pair| pair.rank) else {
            break;
        };
        // Re-borrow the rule from the table so `symbols` can be consumed.
        let Some(pair) = merges.pair_of(rank) else {
            break;
        };
        on_round(rank, &symbols);

        let mut merged = Vec::with_capacity(symbols.len());
        let mut iter = symbols.into_iter().peekable();
        while let Some(symbol) = iter.next() {
            let is_left = symbol == pair.left;
            match iter.next_if(|next| is_left && next == pair.right) {
                Some(right) => merged.push(symbol + &right),
                None => merged.push(symbol),
            }
        }
        symbols = merged;
    }
    symbols
}

/// Encode one pre-token chunk and append its ids to `out`.
///
/// Symbols left over that are not in the vocabulary map to the unknown token,
/// or fail the call when none is configured. On failure `out` is left as it
/// was.
pub fn byte_pair_encode_append(
    chunk: &[u8],
    merges: &MergeTable,
    vocab: &Vocabulary,
    out: &mut Vec<u32>,
) -> Result<(), TokenizerError> {
    if chunk.is_empty() {
        return Ok(());
    }

    let symbols = byte_pair_merge(byte_symbols(chunk), merges);
    let start = out.len();
    for symbol in &symbols {
        match vocab.id_or_unk(symbol) {
            Ok(id) => out.push(id),
            Err(e) => {
                out.truncate(start);
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Encode one pre-token chunk into ids.
pub fn byte_pair_encode(
    chunk: &[u8],
    merges: &MergeTable,
    vocab: &Vocabulary,
) -> Result<Vec<u32>, TokenizerError> {
    let mut out = Vec::new();
    byte_pair_encode_append(chunk, merges, vocab, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rustc_hash::FxHashMap;

    fn table(pairs: &[(&str, &str)]) -> MergeTable {
        MergeTable::new(
            pairs
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        )
    }

    fn merge(text: &str, merges: &MergeTable) -> Vec<String> {
        byte_pair_merge(byte_symbols(text.as_bytes()), merges)
    }

    #[test]
    fn test_byte_symbols_use_byte_level_spelling() {
        assert_eq!(byte_symbols(b"a b"), vec!["a", "Ġ", "b"]);
        assert_eq!(byte_symbols("é".as_bytes()), vec!["Ã", "©"]);
    }

    #[test]
    fn test_merges_follow_rank_order() {
        let merges = table(&[("h", "e"), ("l", "l"), ("he", "ll"), ("hell", "o")]);
        assert_eq!(merge("hello", &merges), vec!["hello"]);
        assert_eq!(merge("help", &merges), vec!["he", "l", "p"]);
    }

    #[test]
    fn test_all_occurrences_merge_left_to_right() {
        let merges = table(&[("a", "a")]);
        assert_eq!(merge("aaa", &merges), vec!["aa", "a"]);
        assert_eq!(merge("aaaa", &merges), vec!["aa", "aa"]);
        assert_eq!(merge("aabaa", &merges), vec!["aa", "b", "aa"]);
    }

    #[test]
    fn test_round_finishes_before_lower_rank_result() {
        // "000" outranks "00" but may only form after the "00" round ends.
        let merges = table(&[("00", "0"), ("0", "0")]);
        assert_eq!(merge("0000", &merges), vec!["00", "00"]);
        assert_eq!(merge("000", &merges), vec!["000"]);
    }

    #[test]
    fn test_numeric_paths() {
        let zeros_only = table(&[("0", "0")]);
        assert_eq!(merge("2000", &zeros_only), vec!["2", "00", "0"]);

        let prefix_first = table(&[("2", "0"), ("0", "0")]);
        assert_eq!(merge("2000", &prefix_first), vec!["20", "00"]);

        let by_prefix = table(&[("2", "0"), ("0", "0"), ("20", "00")]);
        assert_eq!(merge("2000", &by_prefix), vec!["2000"]);
    }

    #[test]
    fn test_rounds_follow_rank_order_for_well_formed_tables() {
        let merges = table(&[
            ("Ġ", "t"),
            ("h", "e"),
            ("Ġt", "he"),
            ("i", "n"),
            ("Ġ", "c"),
            ("a", "t"),
            ("Ġc", "at"),
        ]);
        let mut ranks = Vec::new();
        let symbols = merge_with(byte_symbols(" the cat in the hat".as_bytes()), &merges, |r, _| {
            ranks.push(r)
        });
        // Each rule ranks after the rules producing its parts, so rounds
        // apply strictly increasing ranks.
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5, 6]);
        assert!(symbols.contains(&"Ġthe".to_string()));
        assert!(symbols.contains(&"Ġcat".to_string()));
    }

    #[test]
    fn test_each_round_applies_the_lowest_ranked_pair() {
        // Shuffled tables break the usual ordering where a rule ranks after
        // the rules producing its parts.
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut known: Vec<String> = ["a", "b", "c", "Ġ"].map(String::from).to_vec();
            let mut pairs = Vec::new();
            for _ in 0..rng.gen_range(1..12) {
                let left = known[rng.gen_range(0..known.len())].clone();
                let right = known[rng.gen_range(0..known.len())].clone();
                known.push(format!("{left}{right}"));
                pairs.push((left, right));
            }
            pairs.shuffle(&mut rng);
            let merges = MergeTable::new(pairs);

            for _ in 0..20 {
                let len = rng.gen_range(0..16);
                let text: String = (0..len)
                    .map(|_| ['a', 'b', 'c', ' '][rng.gen_range(0..4)])
                    .collect();
                merge_with(byte_symbols(text.as_bytes()), &merges, |rank, symbols| {
                    let lowest = symbols
                        .windows(2)
                        .filter_map(|w| merges.rank_of(&w[0], &w[1]))
                        .min();
                    assert_eq!(Some(rank), lowest, "{text:?} at {symbols:?}");
                });
            }
        }
    }

    #[test]
    fn test_encode_maps_to_ids() {
        let mut map = FxHashMap::default();
        for (i, tok) in ["h", "e", "l", "o", "he", "ll", "hell", "hello", "<unk>"]
            .iter()
            .enumerate()
        {
            map.insert(tok.to_string(), i as u32);
        }
        let vocab = Vocabulary::new(map).unwrap();
        let merges = table(&[("h", "e"), ("l", "l"), ("he", "ll"), ("hell", "o")]);

        assert_eq!(byte_pair_encode(b"hello", &merges, &vocab), Ok(vec![7]));
        assert_eq!(byte_pair_encode(b"hel", &merges, &vocab), Ok(vec![4, 2]));
        assert_eq!(
            byte_pair_encode(b"hex", &merges, &vocab),
            Err(TokenizerError::UnknownToken("x".to_string()))
        );

        let vocab = vocab.with_unk_token(Some("<unk>")).unwrap();
        assert_eq!(byte_pair_encode(b"hex", &merges, &vocab), Ok(vec![4, 8]));
    }

    #[test]
    fn test_failed_encode_leaves_output_untouched() {
        let vocab = Vocabulary::from_json(br#"{"a": 0}"#).unwrap();
        let mut out = vec![42];
        let err = byte_pair_encode_append(b"ab", &MergeTable::default(), &vocab, &mut out);
        assert!(err.is_err());
        assert_eq!(out, vec![42]);
    }
}
