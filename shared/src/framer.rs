//! Reassembles CRLF-terminated lines from an arbitrarily fragmented byte stream.
//!
//! A `LineFramer` keeps whatever has not yet been terminated between calls,
//! so a terminator split across two reads (`"...\r"` then `"\n..."`) is still
//! recognised. Only the full two-byte sequence counts as a boundary; a lone
//! `\n` or `\r` is ordinary payload.
//!
//! The buffer is bounded. A line that cannot fit, terminator included, is a
//! protocol violation and is reported once as [`FrameError::LineTooLong`].

use thiserror::Error;

use crate::{LINE_TERMINATOR, MAX_LINE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("line of {len} bytes exceeds the {capacity} byte limit")]
    LineTooLong { len: usize, capacity: usize },
}

#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    capacity: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(MAX_LINE)
    }
}

impl LineFramer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes currently held without a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// How many more bytes fit before the ceiling is hit.
    ///
    /// Readers should size their reads with this so that a single read can
    /// never push the buffer past its capacity.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Appends `bytes` and returns an iterator over every line completed so far.
    ///
    /// The iterator is lazy: lines not pulled out of it stay buffered and are
    /// returned by the next call. Each line has its terminator stripped; bytes
    /// that are not valid UTF-8 are replaced rather than rejected.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        Frames {
            framer: self,
            exhausted: false,
        }
    }

    fn find_terminator(&self) -> Option<usize> {
        self.buf
            .windows(LINE_TERMINATOR.len())
            .position(|window| window == LINE_TERMINATOR)
    }
}

/// Lines produced by one [`LineFramer::feed`] call.
pub struct Frames<'a> {
    framer: &'a mut LineFramer,
    exhausted: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<String, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let capacity = self.framer.capacity;
        match self.framer.find_terminator() {
            Some(end) => {
                let frame_len = end + LINE_TERMINATOR.len();
                if frame_len > capacity {
                    self.exhausted = true;
                    return Some(Err(FrameError::LineTooLong {
                        len: frame_len,
                        capacity,
                    }));
                }

                // Draining shifts the unterminated tail to the front.
                let mut line: Vec<u8> = self.framer.buf.drain(..frame_len).collect();
                line.truncate(end);
                Some(Ok(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                self.exhausted = true;
                let len = self.framer.buf.len();
                if len >= capacity {
                    Some(Err(FrameError::LineTooLong { len, capacity }))
                } else {
                    None
                }
            }
        }
    }
}
