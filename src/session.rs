//! Retrieval session
//!
//! Drives one full run against the exchange:
//! Connecting -> Streaming -> Reconciling -> Repairing -> Finalizing -> Closed.
//! The session owns its transport; it is released when the session is
//! dropped, which happens on every exit path of `run`.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::gap_detector::GapDetector;
use crate::output::{write_packets, OutputError};
use crate::protocol::{Packet, Request};
use crate::reader::FrameReader;
use crate::recovery::{RepairClient, RepairFailure, RepairReport};
use crate::stats::SessionStats;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send stream request: {0}")]
    Request(#[source] io::Error),

    #[error("I/O error while streaming packets: {0}")]
    Stream(#[source] io::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Reconciling,
    Repairing,
    Finalizing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Reconciling => "reconciling",
            SessionState::Repairing => "repairing",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct SessionReport {
    /// Sorted ascending by sequence, one packet per sequence.
    pub packets: Vec<Packet>,
    /// Unrecovered sequences, each entry covering `sequence..=last`.
    pub failures: Vec<RepairFailure>,
    pub stats: SessionStats,
}

impl SessionReport {
    pub fn sequences(&self) -> Vec<i32> {
        self.packets.iter().map(|p| p.sequence).collect()
    }
}

type Connector<S> = Box<dyn FnMut() -> io::Result<S>>;

pub struct Session<S> {
    reader: FrameReader<S>,
    state: SessionState,
    stats: SessionStats,
    repair_connector: Option<Connector<S>>,
}

impl Session<TcpStream> {
    /// Open the transport described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        let stream = open_stream(config)?;
        info!(addr = %config.address(), "connected to server");

        let mut session = Session::new(stream);
        if config.reconnect_for_repairs {
            let config = config.clone();
            session = session.with_repair_connector(move || {
                open_stream(&config).map_err(|err| match err {
                    SessionError::Connect { source, .. } => source,
                    other => io::Error::other(other.to_string()),
                })
            });
        }
        Ok(session)
    }
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Session {
            reader: FrameReader::new(stream),
            state: SessionState::Connecting,
            stats: SessionStats::new(),
            repair_connector: None,
        }
    }

    /// Run the repair pass on a fresh transport from `connector`.
    pub fn with_repair_connector<F>(mut self, connector: F) -> Self
    where
        F: FnMut() -> io::Result<S> + 'static,
    {
        self.repair_connector = Some(Box::new(connector));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Retrieve, reconcile and repair. Nothing is persisted.
    pub fn run(mut self) -> Result<SessionReport, SessionError> {
        let (packets, failures) = self.execute()?;
        Ok(self.close(packets, failures))
    }

    /// Like `run`, then write the final collection to `output`.
    ///
    /// A fatal error before finalizing leaves `output` untouched.
    pub fn run_and_persist(mut self, output: &Path) -> Result<SessionReport, SessionError> {
        let (packets, failures) = self.execute()?;
        write_packets(output, &packets)?;
        Ok(self.close(packets, failures))
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn execute(&mut self) -> Result<(Vec<Packet>, Vec<RepairFailure>), SessionError> {
        self.stats.start();

        self.transition(SessionState::Streaming);
        let mut detector = GapDetector::new();
        let mut packets = self.stream_all(&mut detector)?;
        self.stats.record_stream(self.reader.counters());
        info!(packets = packets.len(), "stream complete");

        self.transition(SessionState::Reconciling);
        let mut failures = Vec::new();
        if detector.is_empty() {
            info!("no packets received, nothing to reconcile");
        } else {
            let gaps = detector.gaps();
            let missing = detector.total_missing();
            self.stats.record_gaps(gaps.len(), missing);
            if !gaps.is_empty() {
                info!(missing, ?gaps, "sequence gaps detected");

                self.transition(SessionState::Repairing);
                let report = self.repair(&gaps);
                self.stats
                    .record_repairs(report.recovered.len(), report.unrecovered() as usize);
                packets.extend(report.recovered);
                failures = report.failures;
            }
        }

        self.transition(SessionState::Finalizing);
        Ok((finalize(packets), failures))
    }

    fn stream_all(&mut self, detector: &mut GapDetector) -> Result<Vec<Packet>, SessionError> {
        let stream = self.reader.get_mut();
        stream
            .write_all(&Request::StreamAll.encode())
            .and_then(|()| stream.flush())
            .map_err(SessionError::Request)?;

        let mut packets = Vec::new();
        for packet in self.reader.packets() {
            let packet = packet.map_err(SessionError::Stream)?;
            debug!(sequence = packet.sequence, symbol = %packet.symbol, "packet received");
            if !detector.observe(packet.sequence) {
                warn!(sequence = packet.sequence, "duplicate sequence in stream");
                self.stats.record_duplicate();
            }
            packets.push(packet);
        }
        Ok(packets)
    }

    fn repair(&mut self, gaps: &[(i32, i32)]) -> RepairReport {
        if let Some(connector) = self.repair_connector.as_mut() {
            match connector() {
                Ok(stream) => {
                    info!("opened repair connection");
                    // Replacing the reader releases the streaming transport.
                    self.reader = FrameReader::new(stream);
                }
                Err(err) => {
                    warn!(%err, "could not open repair connection");
                    return RepairClient::new(&mut self.reader)
                        .unavailable(err)
                        .repair_gaps(gaps);
                }
            }
        }

        RepairClient::new(&mut self.reader).repair_gaps(gaps)
    }

    fn close(mut self, packets: Vec<Packet>, failures: Vec<RepairFailure>) -> SessionReport {
        self.transition(SessionState::Closed);
        self.stats.finish();
        self.stats.log_summary();
        SessionReport {
            packets,
            failures,
            stats: self.stats,
        }
    }
}

/// Sort ascending by sequence and keep the first packet seen for each sequence.
pub fn finalize(mut packets: Vec<Packet>) -> Vec<Packet> {
    packets.sort_by_key(|p| p.sequence);
    packets.dedup_by_key(|p| p.sequence);
    packets
}

/// Connect, run and persist to `config.output`.
pub fn run_session(config: &ClientConfig) -> Result<SessionReport, SessionError> {
    Session::connect(config)?.run_and_persist(&config.output)
}

fn open_stream(config: &ClientConfig) -> Result<TcpStream, SessionError> {
    let addr = config.address();
    let connect_err = |source| SessionError::Connect {
        addr: addr.clone(),
        source,
    };

    let stream = match config.connect_timeout {
        None => TcpStream::connect(addr.as_str()).map_err(connect_err)?,
        Some(timeout) => {
            let candidates: Vec<SocketAddr> =
                addr.to_socket_addrs().map_err(connect_err)?.collect();
            let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
            let mut connected = None;
            for candidate in candidates {
                match TcpStream::connect_timeout(&candidate, timeout) {
                    Ok(stream) => {
                        connected = Some(stream);
                        break;
                    }
                    Err(err) => last_err = err,
                }
            }
            connected.ok_or_else(|| connect_err(last_err))?
        }
    };

    stream
        .set_read_timeout(config.read_timeout)
        .and_then(|()| stream.set_write_timeout(config.read_timeout))
        .and_then(|()| stream.set_nodelay(true))
        .map_err(connect_err)?;
    Ok(stream)
}
