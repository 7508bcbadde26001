//! Reversible byte ↔ codepoint mapping used before BPE runs.
//!
//! Byte-level BPE operates on text, but the input may be any byte sequence.
//! Every byte is first mapped to one printable codepoint, so vocabulary and
//! merge artifacts can be stored as ordinary UTF-8 strings.
//!
//! # Mapping
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - The other 68 bytes (0-32, 127-160, 173): map, in increasing byte order,
//!   to U+0100 onwards
//!
//! This is the GPT-2 `bytes_to_unicode` table. Token ids in a vocabulary are
//! only meaningful under this exact assignment, so it must never change.
//!
//! ```
//! use mergewise::ByteEncoder;
//!
//! // Space (0x20) becomes 'Ġ' (U+0120)
//! assert_eq!(ByteEncoder::to_text(b" hi"), "\u{120}hi");
//! assert_eq!(ByteEncoder::from_text("\u{120}hi").unwrap(), b" hi");
//! ```

use std::sync::LazyLock;

use super::error::DecodeError;

/// Highest codepoint in the image of the mapping, plus one.
const IMAGE_LIMIT: usize = 0x100 + 68;

/// Bytes that are printable as-is and therefore map to themselves.
#[inline]
const fn is_direct_byte(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

struct ByteTables {
    to_char: [char; 256],
    to_byte: [Option<u8>; IMAGE_LIMIT],
}

static TABLES: LazyLock<ByteTables> = LazyLock::new(|| {
    let mut to_char = ['\0'; 256];
    let mut to_byte = [None; IMAGE_LIMIT];

    let mut next = 0x100u32;
    for b in 0u8..=255 {
        let code = if is_direct_byte(b) {
            b as u32
        } else {
            next += 1;
            next - 1
        };
        // Every code is below IMAGE_LIMIT, which is far from the surrogate range.
        let ch = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
        to_char[b as usize] = ch;
        to_byte[code as usize] = Some(b);
    }

    ByteTables { to_char, to_byte }
});

/// The fixed byte ↔ codepoint bijection.
///
/// Stateless: the tables behind it are built once per process and shared
/// read-only by every tokenizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteEncoder;

impl ByteEncoder {
    /// Map raw bytes to their byte-level text form.
    #[inline]
    pub fn to_text(bytes: &[u8]) -> String {
        let tables = &*TABLES;
        bytes.iter().map(|&b| tables.to_char[b as usize]).collect()
    }

    /// Map byte-level text back to raw bytes.
    ///
    /// Fails on the first codepoint outside the image of the mapping.
    pub fn from_text(text: &str) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(text.len());
        Self::extend_from_text(text, &mut out)?;
        Ok(out)
    }

    /// Like [`ByteEncoder::from_text`], appending into an existing buffer.
    ///
    /// On error `out` may hold a partial prefix; callers discard it.
    pub fn extend_from_text(text: &str, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        for ch in text.chars() {
            out.push(Self::byte_of(ch).ok_or(DecodeError::InvalidCodepoint(ch))?);
        }
        Ok(())
    }

    /// The codepoint a single byte maps to.
    #[inline]
    pub fn char_of(byte: u8) -> char {
        TABLES.to_char[byte as usize]
    }

    /// The byte a codepoint maps back to, if it is in the alphabet.
    #[inline]
    pub fn byte_of(ch: char) -> Option<u8> {
        TABLES.to_byte.get(ch as usize).copied().flatten()
    }

    /// Whether `ch` belongs to the byte-level alphabet.
    #[inline]
    pub fn is_byte_level_char(ch: char) -> bool {
        Self::byte_of(ch).is_some()
    }
}
