// Incremental frame decoder.
//
// Consumes the streamed response body chunk by chunk, reassembles
// `data: `-delimited JSON frames that may arrive split across chunks, and
// yields one parsed object per complete frame, in arrival order.

use super::frame::{payload, split_frames, Utf8Decoder};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;

/// Maximum bytes of unparsed fragments retained across chunks.
///
/// Malformed fragments are retained rather than dropped; this bound caps
/// that growth by evicting the oldest retained text.
pub const MAX_PENDING_BUFFER_BYTES: usize = 1_048_576; // 1 MiB

/// Errors surfaced to the caller of [`FrameDecoder::run`].
///
/// Parse failures are recovered internally (split frames are merged once
/// more bytes arrive); only reader-level I/O failures are fatal.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read response stream: {0}")]
    Read(String),
}

/// Incremental decoder for one event-stream response body.
///
/// Owned by a single streaming call. `pending` holds the fragments still
/// awaiting bytes or a merge; concatenating them in order reconstructs the
/// unconsumed part of the byte stream. `stalled` holds fragments that
/// failed to parse even after a merge retry; they can never become valid
/// and are kept only so their loss is observable in the buffer accounting.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    pending: VecDeque<String>,
    stalled: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning every frame completed by it.
    ///
    /// Frames are returned in the order their `data:` segments appeared in
    /// the byte stream; an incomplete trailing frame stays buffered until a
    /// later chunk completes it.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<serde_json::Value> {
        let text = self.utf8.decode(chunk);
        self.pending.extend(split_frames(&text));

        let mut parsed = Vec::new();
        // Set when merging the next fragment on did not shrink the buffer,
        // meaning the head is malformed rather than merely split. The next
        // failure then quarantines the head instead of looping on it.
        let mut no_progress = false;

        while let Some(fragment) = self.pending.pop_front() {
            let initial_size = self.pending.len() + 1;
            let content = payload(&fragment);

            if content.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(value) => {
                    parsed.push(value);
                    no_progress = false;
                }
                Err(e) => {
                    if self.pending.is_empty() {
                        // Trailing frame is still incomplete; retry once the
                        // next chunk arrives. Re-buffer the raw fragment:
                        // the stripped payload has lost whitespace and
                        // partial ping text that the next chunk completes.
                        self.pending.push_front(fragment);
                        break;
                    }
                    if no_progress {
                        tracing::warn!(
                            error = %e,
                            bytes = fragment.len(),
                            "frame is not valid JSON after merge retry; setting it aside"
                        );
                        self.stalled.push(fragment);
                        no_progress = false;
                        continue;
                    }
                    // The frame may have been cut at the previous chunk
                    // boundary: merge the next fragment onto the raw text
                    // and re-split. Because fragments keep their delimiter,
                    // any complete frames swallowed by the merge reappear
                    // behind the merged head, in order.
                    let mut merged = fragment;
                    if let Some(next) = self.pending.pop_front() {
                        merged.push_str(&next);
                    }
                    for piece in split_frames(&merged).into_iter().rev() {
                        self.pending.push_front(piece);
                    }
                    no_progress = self.pending.len() == initial_size;
                }
            }
        }

        self.evict_over_limit();
        parsed
    }

    /// Drain the stream, invoking `on_message` once per decoded frame.
    ///
    /// Resolves at end-of-stream with no separate completion signal; a
    /// reader-level failure is returned to the caller.
    pub async fn run<S, E, F>(mut self, mut stream: S, mut on_message: F) -> Result<(), DecodeError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
        F: FnMut(serde_json::Value),
    {
        while let Some(next) = stream.next().await {
            let chunk = next.map_err(|e| DecodeError::Read(e.to_string()))?;
            for value in self.push_chunk(&chunk) {
                on_message(value);
            }
        }
        Ok(())
    }

    /// Total bytes of retained unparsed text, including set-aside fragments.
    pub fn pending_bytes(&self) -> usize {
        self.pending.iter().map(String::len).sum::<usize>()
            + self.stalled.iter().map(String::len).sum::<usize>()
    }

    fn evict_over_limit(&mut self) {
        while self.pending_bytes() > MAX_PENDING_BUFFER_BYTES && !self.stalled.is_empty() {
            let dropped = self.stalled.remove(0);
            tracing::warn!(
                dropped_bytes = dropped.len(),
                "frame buffer over limit; dropping oldest set-aside fragment"
            );
        }
        while self.pending_bytes() > MAX_PENDING_BUFFER_BYTES {
            match self.pending.pop_front() {
                Some(dropped) => {
                    tracing::warn!(
                        dropped_bytes = dropped.len(),
                        "frame buffer over limit; dropping oldest pending fragment"
                    );
                }
                None => break,
            }
        }
    }
}
