#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use abx_client::protocol::REQUEST_SIZE;
use abx_client::{Packet, Request};

pub fn packet(seq: i32) -> Packet {
    let symbols = ["AAPL", "MSFT", "AMZN", "META"];
    Packet {
        symbol: symbols[seq.rem_euclid(4) as usize].to_string(),
        side: if seq % 2 == 0 { 'B' } else { 'S' },
        quantity: 10 * seq,
        price: 100 + seq,
        sequence: seq,
    }
}

pub fn packets(seqs: &[i32]) -> Vec<Packet> {
    seqs.iter().map(|&s| packet(s)).collect()
}

enum Chunk {
    Data(Vec<u8>),
    Eof,
    Error(ErrorKind),
}

/// In-memory exchange speaking the wire protocol.
///
/// A stream-all reply ends with an end-of-stream marker (one read returns 0)
/// and the transport stays usable. A resend for an unknown sequence is
/// answered with that marker alone.
pub struct MockExchange {
    stream: Vec<Packet>,
    resend: BTreeMap<i32, Packet>,
    stream_tail: Vec<u8>,
    stream_error: bool,
    max_read: usize,
    pending: VecDeque<Chunk>,
    written: Vec<u8>,
    pub requests: Vec<Request>,
}

impl MockExchange {
    /// Streams `stream` in order; every packet in it is also resendable.
    pub fn new(stream: Vec<Packet>) -> Self {
        let resend = stream.iter().map(|p| (p.sequence, p.clone())).collect();
        MockExchange {
            stream,
            resend,
            stream_tail: Vec::new(),
            stream_error: false,
            max_read: usize::MAX,
            pending: VecDeque::new(),
            written: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Make `packet` available only through a resend request.
    pub fn resendable(mut self, packet: Packet) -> Self {
        self.resend.insert(packet.sequence, packet);
        self
    }

    /// Deliver at most `n` bytes per read.
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = n;
        self
    }

    /// Append raw bytes after the streamed frames.
    pub fn stream_tail(mut self, bytes: &[u8]) -> Self {
        self.stream_tail = bytes.to_vec();
        self
    }

    /// Fail with a connection reset after the streamed frames.
    pub fn stream_error(mut self) -> Self {
        self.stream_error = true;
        self
    }

    fn handle(&mut self, request: Request) {
        self.requests.push(request);
        match request {
            Request::StreamAll => {
                for p in &self.stream {
                    self.pending.push_back(Chunk::Data(p.encode().to_vec()));
                }
                if !self.stream_tail.is_empty() {
                    self.pending.push_back(Chunk::Data(self.stream_tail.clone()));
                }
                if self.stream_error {
                    self.pending.push_back(Chunk::Error(ErrorKind::ConnectionReset));
                }
                self.pending.push_back(Chunk::Eof);
            }
            Request::Resend(seq) => match self.resend.get(&i32::from(seq)) {
                Some(p) => self.pending.push_back(Chunk::Data(p.encode().to_vec())),
                None => self.pending.push_back(Chunk::Eof),
            },
        }
    }
}

impl Read for MockExchange {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pending.front_mut() {
            None => Ok(0),
            Some(Chunk::Eof) => {
                self.pending.pop_front();
                Ok(0)
            }
            Some(Chunk::Error(kind)) => {
                let kind = *kind;
                self.pending.pop_front();
                Err(io::Error::from(kind))
            }
            Some(Chunk::Data(data)) => {
                let n = buf.len().min(data.len()).min(self.max_read);
                buf[..n].copy_from_slice(&data[..n]);
                data.drain(..n);
                if data.is_empty() {
                    self.pending.pop_front();
                }
                Ok(n)
            }
        }
    }
}

impl Write for MockExchange {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        while self.written.len() >= REQUEST_SIZE {
            let frame: [u8; REQUEST_SIZE] = [self.written[0], self.written[1]];
            self.written.drain(..REQUEST_SIZE);
            let request = Request::parse(&frame)
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
            self.handle(request);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Loopback exchange server behaving like the real one: a stream-all
/// response ends by closing the connection; resends keep it open.
/// Serves `connections` connections and then exits.
pub fn spawn_server(
    stream: Vec<Packet>,
    resend: Vec<Packet>,
    connections: usize,
) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();
    let mut store: BTreeMap<i32, Packet> =
        stream.iter().map(|p| (p.sequence, p.clone())).collect();
    store.extend(resend.into_iter().map(|p| (p.sequence, p)));

    let handle = thread::spawn(move || {
        for _ in 0..connections {
            let (conn, _) = match listener.accept() {
                Ok(c) => c,
                Err(_) => return,
            };
            let _ = serve(conn, &stream, &store);
        }
    });
    (port, handle)
}

fn serve(mut conn: TcpStream, stream: &[Packet], store: &BTreeMap<i32, Packet>) -> io::Result<()> {
    loop {
        let mut frame = [0u8; REQUEST_SIZE];
        if conn.read_exact(&mut frame).is_err() {
            return Ok(());
        }
        match Request::parse(&frame) {
            Ok(Request::StreamAll) => {
                for p in stream {
                    conn.write_all(&p.encode())?;
                }
                return Ok(());
            }
            Ok(Request::Resend(seq)) => match store.get(&i32::from(seq)) {
                Some(p) => conn.write_all(&p.encode())?,
                None => return Ok(()),
            },
            Err(_) => return Ok(()),
        }
    }
}
