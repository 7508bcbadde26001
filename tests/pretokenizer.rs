//! The hand-written scanner against the literal GPT-2 pattern run by a
//! backtracking regex engine.

mod common;

use common::{random_text, random_text_from};
use fancy_regex::Regex;
use mergewise::{PreTokenizer, GPT2_PATTERN};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::LazyLock;

static ORACLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(GPT2_PATTERN).unwrap());

fn oracle_split(text: &str) -> Vec<&str> {
    ORACLE
        .find_iter(text)
        .map(|m| m.unwrap().as_str())
        .collect()
}

fn assert_same_split(text: &str) {
    assert_eq!(
        PreTokenizer.split(text),
        oracle_split(text),
        "split differs for {text:?}"
    );
}

#[test]
fn test_matches_regex_on_fixed_cases() {
    for text in [
        "Hello world",
        "I'm here, aren't you? We'll see what they've got.",
        "I'M SHOUTING'S",
        "In 2000 there were 1999 reasons.",
        "$100.50 (approx.)",
        "a  b   c\n\n\nd \t e",
        "trailing spaces   ",
        "   leading",
        "\u{a0}nbsp\u{a0} mix",
        "Héllo wörld, naïve café",
        "日本語のテキスト",
        "e\u{301}\u{301}x",
        "🦀 crabs 🦀🦀",
        "''s ' s 'd'd",
        "①②③ Ⅻ ½",
        "",
    ] {
        assert_same_split(text);
    }
}

#[test]
fn test_matches_regex_on_random_text() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..1000 {
        assert_same_split(&random_text(&mut rng, 25));
    }
}

#[test]
fn test_matches_regex_on_whitespace_heavy_text() {
    let mut rng = StdRng::seed_from_u64(12);
    let pieces = [" ", " ", "\n", "\t", "\u{a0}", "\u{3000}", "a", "1", "!", "'s"];
    for _ in 0..1000 {
        assert_same_split(&random_text_from(&mut rng, &pieces, 12));
    }
}

#[test]
fn test_matches_regex_on_arbitrary_chars() {
    // Below U+0800 the category tables of both crates have long been fixed.
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..500 {
        let len = rng.gen_range(0..16);
        let text: String = (0..len).map(|_| rng.gen_range('\0'..='\u{7ff}')).collect();
        assert_same_split(&text);
    }
}
