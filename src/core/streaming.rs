//! UTF-8 safe streaming decoder for token-by-token output.
//!
//! A token's bytes may end in the middle of a multi-byte character. The
//! decoder buffers incomplete trailing sequences and only emits complete
//! characters, so text can be printed as ids arrive.

use super::error::TokenizerError;
use super::tokenizer::TokenEncoder;

/// Incremental decoder over any [`TokenEncoder`].
///
/// # Example
///
/// ```
/// use mergewise::{load, StreamingDecoder, TokenEncoder, TokenizerOptions};
///
/// let vocab = r#"{"ä": 0, "½": 1, "ł": 2, "å": 3, "¥": 4}"#;
/// let tokenizer = load(vocab.as_bytes(), b"", TokenizerOptions::default())?;
/// let ids = tokenizer.encode("你")?;
///
/// let mut decoder = StreamingDecoder::new(&tokenizer);
/// let mut text = String::new();
/// for &id in &ids {
///     if let Some(piece) = decoder.add_token(id)? {
///         text.push_str(&piece);
///     }
/// }
/// text.push_str(&decoder.flush());
/// assert_eq!(text, "你");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct StreamingDecoder<'a, E: TokenEncoder + ?Sized> {
    encoder: &'a E,
    buffer: Vec<u8>,
}

impl<'a, E: TokenEncoder + ?Sized> StreamingDecoder<'a, E> {
    pub fn new(encoder: &'a E) -> Self {
        Self {
            encoder,
            buffer: Vec::with_capacity(16),
        }
    }

    /// Add a token and return any characters it completes.
    ///
    /// Unknown ids follow the tokenizer's unknown-id policy.
    pub fn add_token(&mut self, id: u32) -> Result<Option<String>, TokenizerError> {
        self.add_tokens(&[id])
    }

    /// Add several tokens and return any characters they complete.
    ///
    /// On error nothing is buffered.
    pub fn add_tokens(&mut self, ids: &[u32]) -> Result<Option<String>, TokenizerError> {
        let bytes = self.encoder.decode_bytes(ids)?;
        self.buffer.extend_from_slice(&bytes);
        Ok(self.extract_complete_utf8())
    }

    /// Flush any remaining buffered bytes.
    ///
    /// An incomplete sequence left in the buffer becomes U+FFFD.
    pub fn flush(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }

        let result = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        result
    }

    /// Discard any buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Whether bytes are waiting for the rest of their character.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Take the longest decodable prefix of the buffer.
    ///
    /// Byte sequences that can never become valid are replaced with U+FFFD
    /// right away; only a truncated final character stays buffered.
    fn extract_complete_utf8(&mut self) -> Option<String> {
        let mut out = String::new();
        let mut consumed = 0;

        while consumed < self.buffer.len() {
            match std::str::from_utf8(&self.buffer[consumed..]) {
                Ok(rest) => {
                    out.push_str(rest);
                    consumed = self.buffer.len();
                }
                Err(e) => {
                    let valid = &self.buffer[consumed..consumed + e.valid_up_to()];
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    consumed += e.valid_up_to();
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // Truncated sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }

        self.buffer.drain(..consumed);
        (!out.is_empty()).then_some(out)
    }
}
