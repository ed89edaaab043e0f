//! Point repair of missing packets
//!
//! Sends one resend request per missing sequence and waits for exactly one
//! reply frame before moving on. Every failure is recorded against its
//! sequence and the loop continues. Once a reply is lost to an I/O error or
//! a mid-frame close, the transport is out of step with frame boundaries and
//! no further request is sent on it.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decoder::Decoder;
use crate::protocol::{Packet, Request, RequestError, MAX_RESEND_SEQUENCE};
use crate::reader::{FrameRead, FrameReader};

#[derive(Error, Debug)]
pub enum RepairError {
    #[error(transparent)]
    SequenceOutOfRange(#[from] RequestError),

    #[error("connection closed before a reply arrived")]
    NoReply,

    #[error("connection closed after {received} bytes of the reply")]
    Truncated { received: usize },

    #[error("repair I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not requested: an earlier reply was lost on this connection")]
    Abandoned,
}

impl RepairError {
    /// Whether the transport may hold part of a reply after this error.
    fn loses_framing(&self) -> bool {
        matches!(self, RepairError::Io(_) | RepairError::Truncated { .. })
    }
}

/// Failure covering the inclusive range `sequence..=last`.
///
/// Point failures have `last == sequence`. Sequences a resend request cannot
/// carry are reported once per gap.
#[derive(Debug)]
pub struct RepairFailure {
    pub sequence: i32,
    pub last: i32,
    pub error: RepairError,
}

impl RepairFailure {
    /// Number of sequences covered.
    pub fn count(&self) -> u64 {
        (i64::from(self.last) - i64::from(self.sequence) + 1) as u64
    }
}

#[derive(Debug, Default)]
pub struct RepairReport {
    pub recovered: Vec<Packet>,
    pub failures: Vec<RepairFailure>,
}

impl RepairReport {
    /// First sequence of every failure, ascending.
    pub fn failed_sequences(&self) -> Vec<i32> {
        self.failures.iter().map(|f| f.sequence).collect()
    }

    /// Number of sequences left unrecovered.
    pub fn unrecovered(&self) -> u64 {
        self.failures.iter().map(RepairFailure::count).sum()
    }

    fn fail(&mut self, sequence: i32, error: RepairError) {
        warn!(sequence, %error, "failed to retrieve missing packet");
        self.failures.push(RepairFailure {
            sequence,
            last: sequence,
            error,
        });
    }

    fn fail_range(&mut self, sequence: i32, last: i32) {
        let error = RepairError::from(RequestError::SequenceOutOfRange(sequence));
        warn!(first = sequence, last, %error, "missing packets cannot be requested");
        self.failures.push(RepairFailure {
            sequence,
            last,
            error,
        });
    }
}

/// Issues resend requests over a borrowed transport, strictly one at a time.
pub struct RepairClient<'a, S> {
    reader: &'a mut FrameReader<S>,
    abandoned: bool,
    unavailable: Option<io::Error>,
}

impl<'a, S: Read + Write> RepairClient<'a, S> {
    pub fn new(reader: &'a mut FrameReader<S>) -> Self {
        RepairClient {
            reader,
            abandoned: false,
            unavailable: None,
        }
    }

    /// Fail every request with `err` without touching the transport.
    pub fn unavailable(mut self, err: io::Error) -> Self {
        self.unavailable = Some(err);
        self
    }

    /// Request every sequence in `missing`, ascending, exactly once.
    pub fn repair(&mut self, missing: &[i32]) -> RepairReport {
        let mut ordered = missing.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut report = RepairReport::default();
        for sequence in ordered {
            self.attempt(sequence, &mut report);
        }
        log_pass(&report);
        report
    }

    /// Repair inclusive `(start, end)` gaps, ascending.
    ///
    /// Only the part of a gap inside `0..=255` is requested. The parts below
    /// and above are each reported as one failure, so the work done is
    /// bounded by the resend range rather than by the width of the gap.
    pub fn repair_gaps(&mut self, gaps: &[(i32, i32)]) -> RepairReport {
        let mut ordered = gaps.to_vec();
        ordered.sort_unstable();

        let mut report = RepairReport::default();
        for (start, end) in ordered {
            if start < 0 {
                report.fail_range(start, end.min(-1));
            }
            for sequence in start.max(0)..=end.min(MAX_RESEND_SEQUENCE) {
                self.attempt(sequence, &mut report);
            }
            if end > MAX_RESEND_SEQUENCE {
                report.fail_range(start.max(MAX_RESEND_SEQUENCE + 1), end);
            }
        }
        log_pass(&report);
        report
    }

    fn attempt(&mut self, sequence: i32, report: &mut RepairReport) {
        match self.repair_one(sequence) {
            Ok(packet) => report.recovered.push(packet),
            Err(error) => report.fail(sequence, error),
        }
    }

    /// One request/reply round trip.
    pub fn repair_one(&mut self, sequence: i32) -> Result<Packet, RepairError> {
        let request = Request::resend(sequence)?;
        if let Some(err) = &self.unavailable {
            return Err(io::Error::new(err.kind(), err.to_string()).into());
        }
        if self.abandoned {
            return Err(RepairError::Abandoned);
        }

        let result = self.round_trip(sequence, request);
        if let Err(error) = &result {
            if error.loses_framing() {
                warn!(sequence, "reply lost, abandoning repair connection");
                self.abandoned = true;
            }
        }
        result
    }

    fn round_trip(&mut self, sequence: i32, request: Request) -> Result<Packet, RepairError> {
        info!(sequence, "requesting missing packet");

        let stream = self.reader.get_mut();
        stream.write_all(&request.encode())?;
        stream.flush()?;

        match self.reader.read_frame()? {
            FrameRead::Frame(frame) => {
                let packet = Decoder::decode(&frame);
                if packet.sequence != sequence {
                    warn!(
                        requested = sequence,
                        received = packet.sequence,
                        "resend reply carries a different sequence"
                    );
                } else {
                    debug!(sequence, "recovered packet");
                }
                Ok(packet)
            }
            FrameRead::Closed => Err(RepairError::NoReply),
            FrameRead::Truncated { received } => Err(RepairError::Truncated { received }),
        }
    }
}

fn log_pass(report: &RepairReport) {
    info!(
        recovered = report.recovered.len(),
        unrecovered = report.unrecovered(),
        "repair pass complete"
    );
}
