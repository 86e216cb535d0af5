// Frame-level text handling: streaming UTF-8 decode, `data: ` splitting,
// and keep-alive ping removal.

use regex::Regex;
use std::sync::LazyLock;

/// The literal delimiter starting each frame in the event stream.
pub(super) const FRAME_DELIMITER: &str = "data: ";

/// Keep-alive comment emitted by the backend between frames,
/// e.g. `: ping - 2024-05-01 12:30:45.123456`. Carries no payload.
static PING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r": ping - \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{6}")
        .expect("ping pattern is a valid regex")
});

/// Reduce a fragment to its parseable payload: drop the leading frame
/// delimiter if present, remove ping comments, and trim whitespace.
///
/// A fragment that was nothing but delimiter and pings reduces to `""` and
/// never reaches JSON parsing.
pub(super) fn payload(fragment: &str) -> String {
    let body = fragment.strip_prefix(FRAME_DELIMITER).unwrap_or(fragment);
    PING_PATTERN.replace_all(body, "").trim().to_string()
}

/// Split text at every frame delimiter, keeping the delimiter attached to
/// the piece it starts.
///
/// Keeping the delimiter means re-splitting after a merge regenerates any
/// complete frames the merge swallowed, and concatenating the pieces
/// reconstructs the input exactly. The piece before the first delimiter has
/// no prefix: it is either empty (dropped) or the continuation of a frame
/// cut at the previous chunk boundary.
pub(super) fn split_frames(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut search = 0;

    while let Some(pos) = text[search..].find(FRAME_DELIMITER) {
        let at = search + pos;
        if at > start {
            pieces.push(text[start..at].to_string());
        }
        start = at;
        search = at + FRAME_DELIMITER.len();
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

// ---------------------------------------------------------------------------
// Streaming UTF-8 decode
// ---------------------------------------------------------------------------

/// Decodes byte chunks to text, carrying incomplete multi-byte sequences
/// across chunk boundaries.
///
/// A chunk ending mid-character keeps the trailing bytes until the next
/// chunk completes them. Genuinely invalid sequences become U+FFFD rather
/// than failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    partial: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, input: &[u8]) -> String {
        let owned;
        let data: &[u8] = if self.partial.is_empty() {
            input
        } else {
            let mut joined = std::mem::take(&mut self.partial);
            joined.extend_from_slice(input);
            owned = joined;
            &owned
        };

        let mut out = String::with_capacity(data.len());
        let mut rest = data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            // Invalid sequence mid-stream: replace and move on.
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete trailing sequence: hold it for the
                            // next chunk.
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Bytes held over from the previous chunk (incomplete character).
    #[cfg(test)]
    pub(super) fn pending_bytes(&self) -> usize {
        self.partial.len()
    }
}
