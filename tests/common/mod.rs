//! Shared fixtures for the integration tests.
//!
//! The fixture tokenizer is built from merges learned on a small corpus with
//! the classic frequency-driven BPE procedure, so its tables look like real
//! artifacts: every rule ranks after the rules producing its parts.

#![allow(dead_code)]

use mergewise::{
    ByteEncoder, FastTokenizer, MergeTable, PreTokenizer, Tokenizer, TokenizerOptions, Vocabulary,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const CORPUS: &str = "\
The quick brown fox jumps over the lazy dog. The dog didn't care; it's lazy.
In 2000 there were 1999 reasons, and in 2020 there were 2000 more.
We'll see what they've got: 100 apples, 200 pears and 3000 grapes!
Hello world! Hello there, world. Hello again and again and again.
Numbers like 10000, 20000 and 2000000 show up in the data too.
Héllo wörld, naïve café, 日本語のテキスト, Привет мир, 🦀 crabs 🦀.
    indented line\twith\ttabs
and trailing spaces
";

/// Number of merges learned for the fixture.
pub const FIXTURE_MERGES: usize = 300;

pub static FIXTURE: LazyLock<Fixture> = LazyLock::new(|| Fixture::new(TokenizerOptions::default()));

pub struct Fixture {
    pub vocab: Vocabulary,
    pub merges: MergeTable,
    pub reference: Tokenizer,
    pub fast: FastTokenizer,
}

impl Fixture {
    pub fn new(options: TokenizerOptions) -> Self {
        let rules = train_merges(CORPUS, FIXTURE_MERGES);
        let vocab = byte_level_vocab(&rules, &[]);
        let merges = MergeTable::new(rules);
        let reference = Tokenizer::new(vocab.clone(), merges.clone(), options).unwrap();
        let fast = FastTokenizer::from_reference(&reference);
        Self {
            vocab,
            merges,
            reference,
            fast,
        }
    }

    /// `vocab.json` contents for the fixture.
    pub fn vocab_json(&self) -> String {
        let sorted: BTreeMap<&String, &u32> = self.vocab.encoder().iter().collect();
        serde_json::to_string(&sorted).unwrap()
    }

    /// `merges.txt` contents for the fixture.
    pub fn merges_txt(&self) -> String {
        let mut text = String::from("#version: 0.2\n");
        for (left, right) in self.merges.pairs() {
            text.push_str(left);
            text.push(' ');
            text.push_str(right);
            text.push('\n');
        }
        text
    }
}

/// All 256 byte tokens at their byte values, then every merge result, then
/// `extra`, in order of first appearance.
pub fn byte_level_vocab(rules: &[(String, String)], extra: &[&str]) -> Vocabulary {
    let mut map = FxHashMap::default();
    for b in 0..=255u8 {
        map.insert(ByteEncoder::char_of(b).to_string(), b as u32);
    }
    let merged = rules.iter().map(|(l, r)| format!("{l}{r}"));
    for token in merged.chain(extra.iter().map(|s| s.to_string())) {
        let next = map.len() as u32;
        map.entry(token).or_insert(next);
    }
    Vocabulary::new(map).unwrap()
}

/// Learn `count` merges from `corpus` by repeatedly merging the most frequent
/// adjacent pair. Ties go to the smallest pair so the result is stable.
pub fn train_merges(corpus: &str, count: usize) -> Vec<(String, String)> {
    let mut words: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    for chunk in PreTokenizer.chunks(corpus) {
        let symbols = chunk
            .bytes()
            .map(|b| ByteEncoder::char_of(b).to_string())
            .collect();
        *words.entry(symbols).or_default() += 1;
    }

    let mut rules = Vec::with_capacity(count);
    while rules.len() < count {
        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for (word, freq) in &words {
            for pair in word.windows(2) {
                *counts
                    .entry((pair[0].as_str(), pair[1].as_str()))
                    .or_default() += freq;
            }
        }
        let Some(((left, right), _)) = counts
            .into_iter()
            .fold(None, |best: Option<((&str, &str), usize)>, (pair, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((pair, n)),
            })
        else {
            break;
        };
        let (left, right) = (left.to_string(), right.to_string());

        words = words
            .into_iter()
            .map(|(word, freq)| (merge_word(word, &left, &right), freq))
            .fold(BTreeMap::new(), |mut acc, (word, freq)| {
                *acc.entry(word).or_default() += freq;
                acc
            });
        rules.push((left, right));
    }
    rules
}

fn merge_word(word: Vec<String>, left: &str, right: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(word.len());
    let mut iter = word.into_iter().peekable();
    while let Some(symbol) = iter.next() {
        let is_left = symbol == left;
        match iter.next_if(|next| is_left && next == right) {
            Some(next) => out.push(symbol + &next),
            None => out.push(symbol),
        }
    }
    out
}

/// Random merge rules over `alphabet`, shuffled so that merge results often
/// outrank the rules producing their parts.
pub fn random_rules(rng: &mut StdRng, alphabet: &[&str], count: usize) -> Vec<(String, String)> {
    let mut pool: Vec<String> = alphabet
        .iter()
        .map(|s| ByteEncoder::to_text(s.as_bytes()))
        .collect();
    let mut rules = Vec::with_capacity(count);
    for _ in 0..count {
        let left = pool[rng.gen_range(0..pool.len())].clone();
        let right = pool[rng.gen_range(0..pool.len())].clone();
        let merged = format!("{left}{right}");
        if !pool.contains(&merged) {
            pool.push(merged);
        }
        rules.push((left, right));
    }
    rules.shuffle(rng);
    rules
}

const PIECES: &[&str] = &[
    "a", "e", "t", "h", "o", "n", "s", "T", "the", "ing", "0", "1", "2", "9", "00", " ", " ",
    "  ", "\n", "\t", ".", ",", "!", "?", "'", "'s", "'ll", "'re", "-", "$", "(", ")", "é", "ß",
    "日本", "Ж", "🦀", "\u{a0}", "\u{301}", "\u{3000}",
];

/// Random text stitched together from pieces that stress chunk boundaries.
pub fn random_text(rng: &mut StdRng, max_pieces: usize) -> String {
    let n = rng.gen_range(0..=max_pieces);
    (0..n)
        .map(|_| PIECES[rng.gen_range(0..PIECES.len())])
        .collect()
}

/// Random text over a restricted alphabet.
pub fn random_text_from(rng: &mut StdRng, alphabet: &[&str], max_len: usize) -> String {
    let n = rng.gen_range(0..=max_len);
    (0..n)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}
