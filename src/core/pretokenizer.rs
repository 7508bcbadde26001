//! Pre-tokenization: splitting text into chunks before BPE runs.
//!
//! The split reproduces the GPT-2 pattern
//!
//! ```text
//! 's|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+
//! ```
//!
//! as a hand-written scanner instead of a regex engine. Alternation is
//! leftmost-first, so the order of the checks below matters: reordering them
//! moves chunk boundaries and therefore changes merge results.
//!
//! Character classes follow the regex definitions exactly: a letter is any
//! codepoint of general category `L`, a digit any of category `N`, and
//! whitespace the Unicode `White_Space` property.

use std::iter::FusedIterator;
use unicode_general_category::{get_general_category, GeneralCategory};

/// The pattern the scanner implements, for documentation and cross-checks.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Contraction suffixes, in pattern order.
const CONTRACTIONS: [&str; 7] = ["'s", "'t", "'re", "'ve", "'m", "'ll", "'d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Number,
    Whitespace,
    Other,
}

#[inline]
fn classify(ch: char) -> CharClass {
    if ch.is_ascii() {
        return match ch {
            'a'..='z' | 'A'..='Z' => CharClass::Letter,
            '0'..='9' => CharClass::Number,
            // \t \n \x0b \x0c \r and space
            '\t'..='\r' | ' ' => CharClass::Whitespace,
            _ => CharClass::Other,
        };
    }
    if ch.is_whitespace() {
        return CharClass::Whitespace;
    }
    match get_general_category(ch) {
        GeneralCategory::UppercaseLetter
        | GeneralCategory::LowercaseLetter
        | GeneralCategory::TitlecaseLetter
        | GeneralCategory::ModifierLetter
        | GeneralCategory::OtherLetter => CharClass::Letter,
        GeneralCategory::DecimalNumber
        | GeneralCategory::LetterNumber
        | GeneralCategory::OtherNumber => CharClass::Number,
        _ => CharClass::Other,
    }
}

/// Byte length of the leading run of characters of class `class`.
#[inline]
fn run_len(text: &str, class: CharClass) -> usize {
    text.char_indices()
        .find(|&(_, ch)| classify(ch) != class)
        .map_or(text.len(), |(idx, _)| idx)
}

/// Byte length of the chunk starting at the beginning of `rest`.
///
/// `rest` must be non-empty; the result is always at least one character.
fn chunk_len(rest: &str) -> usize {
    if rest.starts_with('\'') {
        if let Some(c) = CONTRACTIONS.iter().find(|c| rest.starts_with(*c)) {
            return c.len();
        }
    }

    let mut chars = rest.chars();
    let Some(first) = chars.next() else {
        return 0;
    };

    // ` ?\p{L}+`, ` ?\p{N}+` and ` ?[^\s\p{L}\p{N}]+`: one optional space,
    // then a run of whichever class the next character has.
    let (head_offset, head) = match chars.next() {
        Some(second) if first == ' ' && classify(second) != CharClass::Whitespace => (1, second),
        _ => (0, first),
    };
    let class = classify(head);
    if class != CharClass::Whitespace {
        return head_offset + run_len(&rest[head_offset..], class);
    }

    // `\s+(?!\S)` then `\s+`.
    let ws_len = run_len(rest, CharClass::Whitespace);
    if ws_len == rest.len() {
        return ws_len;
    }
    // Followed by non-whitespace: the run backs off one character so that the
    // last whitespace can prefix the next chunk, unless that would leave nothing.
    let last_len = rest[..ws_len]
        .chars()
        .next_back()
        .map_or(0, char::len_utf8);
    if ws_len > last_len {
        ws_len - last_len
    } else {
        ws_len
    }
}

/// The GPT-2 pre-tokenizer.
///
/// Stateless; the type exists so encoders can hold and expose it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreTokenizer;

impl PreTokenizer {
    /// Split `text` into chunks. The chunks concatenate back to `text`.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.chunks(text).collect()
    }

    /// Iterate over the chunks of `text` lazily.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks { rest: text }
    }

    /// The pattern this scanner reproduces.
    pub fn pattern(&self) -> &'static str {
        GPT2_PATTERN
    }
}

/// Iterator over pre-token chunks. See [`PreTokenizer::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let len = chunk_len(self.rest);
        let (chunk, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}
