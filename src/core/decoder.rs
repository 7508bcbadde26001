//! Ids back to bytes and text.
//!
//! Special ids decode to their surface form. Every other id is looked up in
//! the vocabulary and its byte-level spelling is mapped back to raw bytes. A
//! token spelled with a codepoint outside the byte alphabet is a hard error:
//! it means the vocabulary does not belong to this byte map.

use super::byte_level::ByteEncoder;
use super::error::{DecodeError, TokenizerError};
use super::options::{DecodeOptions, UnknownIdPolicy};
use super::special::SpecialTokens;
use super::vocab::Vocabulary;

/// Borrowing view over the tables needed to decode.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    vocab: &'a Vocabulary,
    specials: &'a SpecialTokens,
    unknown_ids: UnknownIdPolicy,
}

impl<'a> Decoder<'a> {
    pub fn new(
        vocab: &'a Vocabulary,
        specials: &'a SpecialTokens,
        unknown_ids: UnknownIdPolicy,
    ) -> Self {
        Self {
            vocab,
            specials,
            unknown_ids,
        }
    }

    /// Raw bytes of a single id, ignoring the unknown-id policy.
    pub fn token_bytes(&self, id: u32) -> Result<Vec<u8>, TokenizerError> {
        if let Some(special) = self.specials.get(id) {
            return Ok(special.surface().as_bytes().to_vec());
        }
        Ok(ByteEncoder::from_text(self.vocab.token_of(id)?)?)
    }

    /// Decode `ids` to raw bytes without UTF-8 validation.
    pub fn decode_bytes_with(
        &self,
        ids: &[u32],
        opts: &DecodeOptions,
    ) -> Result<Vec<u8>, TokenizerError> {
        let policy = opts.unknown_ids.unwrap_or(self.unknown_ids);
        let mut out = Vec::with_capacity(ids.len() * 4);

        for &id in ids {
            if let Some(special) = self.specials.get(id) {
                if !opts.skip_special_tokens {
                    out.extend_from_slice(special.surface().as_bytes());
                }
                continue;
            }
            match self.vocab.token_of(id) {
                Ok(token) => ByteEncoder::extend_from_text(token, &mut out)?,
                Err(e) => match policy {
                    UnknownIdPolicy::Error => return Err(e),
                    UnknownIdPolicy::Skip => log::warn!("skipping unknown token id {id}"),
                },
            }
        }

        Ok(out)
    }

    pub fn decode_bytes(&self, ids: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        self.decode_bytes_with(ids, &DecodeOptions::default())
    }

    /// Decode `ids` to text; invalid UTF-8 is an error.
    pub fn decode_with(&self, ids: &[u32], opts: &DecodeOptions) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes_with(ids, opts)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8.into())
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.decode_with(ids, &DecodeOptions::default())
    }

    /// Decode `ids` to text, replacing invalid UTF-8 with U+FFFD.
    pub fn decode_lossy(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(ids)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
