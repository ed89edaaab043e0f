//! Fixed-size frame reader
//!
//! Accumulates exactly one 17-byte frame per call from any `Read` stream.
//! A short read is never treated as a frame boundary: the reader keeps
//! reading into the same buffer until the frame is complete or the
//! stream closes.

use std::io::{self, ErrorKind, Read};

use tracing::{trace, warn};

use crate::decoder::Decoder;
use crate::protocol::{Packet, PACKET_SIZE};

/// Outcome of one frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete frame.
    Frame([u8; PACKET_SIZE]),
    /// Clean end of stream at a frame boundary.
    Closed,
    /// Stream closed after `received` bytes of a frame. Those bytes are discarded.
    Truncated { received: usize },
}

/// Transport counters collected while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounters {
    pub frames: u64,
    pub bytes: u64,
    pub short_reads: u64,
    pub truncated_bytes: u64,
}

pub struct FrameReader<R> {
    inner: R,
    counters: ReadCounters,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            counters: ReadCounters::default(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// `Interrupted` is retried; any other I/O error is returned as is.
    pub fn read_frame(&mut self) -> io::Result<FrameRead> {
        let mut frame = [0u8; PACKET_SIZE];
        let mut filled = 0;

        while filled < PACKET_SIZE {
            let read = match self.inner.read(&mut frame[filled..]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };

            if read == 0 {
                if filled == 0 {
                    return Ok(FrameRead::Closed);
                }
                self.counters.truncated_bytes += filled as u64;
                return Ok(FrameRead::Truncated { received: filled });
            }

            if read < PACKET_SIZE - filled {
                self.counters.short_reads += 1;
                trace!(read, filled, "short read, accumulating");
            }
            filled += read;
            self.counters.bytes += read as u64;
        }

        self.counters.frames += 1;
        Ok(FrameRead::Frame(frame))
    }

    /// Lazily decode packets until the stream closes.
    pub fn packets(&mut self) -> PacketStream<'_, R> {
        PacketStream {
            reader: self,
            done: false,
        }
    }

    pub fn counters(&self) -> ReadCounters {
        self.counters
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Single-pass packet sequence for one stream-all response.
///
/// Ends at a clean close or a truncated tail. I/O errors are yielded once,
/// after which the stream is exhausted.
pub struct PacketStream<'a, R> {
    reader: &'a mut FrameReader<R>,
    done: bool,
}

impl<R: Read> Iterator for PacketStream<'_, R> {
    type Item = io::Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_frame() {
            Ok(FrameRead::Frame(frame)) => Some(Ok(Decoder::decode(&frame))),
            Ok(FrameRead::Closed) => {
                self.done = true;
                None
            }
            Ok(FrameRead::Truncated { received }) => {
                warn!(received, "stream closed mid-frame, discarding partial frame");
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
