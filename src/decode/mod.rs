// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

// Event-stream frame decoding.
//
// Responsibilities:
// - Incrementally decode a chunked SSE response body into `data: ` frames
// - Tolerate frame boundaries that do not align with network chunks
// - Discard keep-alive ping comments before JSON parsing
// - Deliver one parsed JSON object per frame, in arrival order
// - Memory-bounded: 1 MiB max of retained unparsed fragments

mod decoder;
mod frame;

pub use decoder::{DecodeError, FrameDecoder, MAX_PENDING_BUFFER_BYTES};
pub use frame::Utf8Decoder;
