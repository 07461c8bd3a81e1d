//! Stateful UTF-8 decoding.
//!
//! Transport chunks are cut at arbitrary byte offsets, so a multi-byte
//! character can straddle two reads. [`Utf8StreamDecoder`] holds back an
//! incomplete trailing sequence until the next call. Invalid bytes decode
//! to U+FFFD rather than failing the stream.

/// Incremental UTF-8 decoder that preserves partial sequences across calls.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, prefixed by anything held back from the previous call.
    ///
    /// An incomplete sequence at the very end is kept for the next call.
    /// Invalid sequences anywhere else become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes held-back bytes. An incomplete sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// True when bytes of an incomplete sequence are being held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
