//! ABX Client - Exchange Packet Stream Retrieval
//!
//! Blocking client for the ABX exchange's fixed-length binary protocol.
//! Features include:
//! - 17-byte big-endian packet decoding
//! - Short-read tolerant frame accumulation
//! - Sequence gap detection over the observed span
//! - Point repair of missing packets via resend requests
//! - Sorted, deduplicated JSON output

pub mod config;
pub mod decoder;
pub mod gap_detector;
pub mod logging;
pub mod output;
pub mod protocol;
pub mod reader;
pub mod recovery;
pub mod session;
pub mod stats;

pub use config::ClientConfig;
pub use decoder::{DecodeError, Decoder};
pub use gap_detector::{missing, GapDetector};
pub use output::{read_packets, write_packets, OutputError};
pub use protocol::{CallType, Packet, Request, RequestError, Side, PACKET_SIZE};
pub use reader::{FrameRead, FrameReader, PacketStream, ReadCounters};
pub use recovery::{RepairClient, RepairError, RepairFailure, RepairReport};
pub use session::{finalize, run_session, Session, SessionError, SessionReport, SessionState};
pub use stats::SessionStats;
