//! Splits an SSE byte stream into frames at blank-line boundaries.
//!
//! A boundary is the first of `CRLF CRLF`, `LF LF` or `CR CR`, scanning left
//! to right. When two patterns could start at the same offset the CRLF pair is
//! tried first. The whole delimiter is consumed, so the next frame begins
//! right after the blank line.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::errors::StreamError;

/// Largest frame buffered while waiting for a boundary.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

const LONGEST_DELIMITER: usize = 4;

/// Push-based frame splitter. Feed it chunks with [`push`](Self::push) and
/// drain complete frames with [`next_frame`](Self::next_frame).
#[derive(Debug)]
pub struct FrameSegmenter {
    buffer: BytesMut,
    // Offsets below this were already searched without a match.
    scanned: usize,
    max_frame_len: usize,
}

impl Default for FrameSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSegmenter {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_frame_len,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete frame, if the buffer holds a boundary.
    ///
    /// Fails when a frame is longer than the limit, whether or not its
    /// boundary has arrived yet.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, StreamError> {
        match find_boundary(&self.buffer, self.scanned) {
            Some((end, _)) if end > self.max_frame_len => Err(self.too_large()),
            Some((end, delimiter_len)) => {
                let frame = self.buffer.split_to(end).freeze();
                self.buffer.advance(delimiter_len);
                self.scanned = 0;
                Ok(Some(frame))
            }
            None => {
                // Up to a delimiter's worth of the tail may be an unfinished
                // boundary rather than frame content.
                if self.buffer.len() > self.max_frame_len + LONGEST_DELIMITER - 1 {
                    return Err(self.too_large());
                }
                // A delimiter may straddle the next chunk.
                self.scanned = self.buffer.len().saturating_sub(LONGEST_DELIMITER - 1);
                Ok(None)
            }
        }
    }

    /// Flush the unterminated remainder once the source is exhausted.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn too_large(&self) -> StreamError {
        StreamError::FrameTooLarge {
            limit: self.max_frame_len,
        }
    }
}

/// Returns the frame end and delimiter length of the lowest-offset boundary at
/// or after `from`.
fn find_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buffer.len()).find_map(|offset| {
        let rest = &buffer[offset..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((offset, 4))
        } else if rest.starts_with(b"\n\n") || rest.starts_with(b"\r\r") {
            Some((offset, 2))
        } else {
            None
        }
    })
}

/// Pulls frames out of a chunked byte stream such as an HTTP response body.
///
/// `Ok(None)` means the source ended normally; read failures surface as
/// [`StreamError::Read`].
pub struct FrameReader<S> {
    source: S,
    segmenter: FrameSegmenter,
    exhausted: bool,
}

impl<S> FrameReader<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self::with_max_frame_len(source, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(source: S, max_frame_len: usize) -> Self {
        Self {
            source,
            segmenter: FrameSegmenter::with_max_frame_len(max_frame_len),
            exhausted: false,
        }
    }

    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            if let Some(frame) = self.segmenter.next_frame()? {
                return Ok(Some(frame));
            }
            if self.exhausted {
                return Ok(self.segmenter.finish());
            }
            match self.source.next().await {
                Some(Ok(chunk)) => self.segmenter.push(&chunk),
                Some(Err(error)) => return Err(error.into()),
                None => self.exhausted = true,
            }
        }
    }
}
