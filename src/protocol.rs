//! ABX exchange wire format
//!
//! Requests (client -> server): 2 bytes
//!   - call_type: u8 (1 = stream all packets, 2 = resend packet)
//!   - resend_seq: u8 (sequence to resend, 0 for stream all)
//!
//! Packet (server -> client): 17 bytes, integers big-endian
//!   - symbol: [u8; 4] ASCII, space padded
//!   - side: u8 ('B' or 'S')
//!   - quantity: i32
//!   - price: i32
//!   - sequence: i32

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PACKET_SIZE: usize = 17;
pub const REQUEST_SIZE: usize = 2;

pub const SYMBOL_OFFSET: usize = 0;
pub const SYMBOL_LEN: usize = 4;
pub const SIDE_OFFSET: usize = 4;
pub const QUANTITY_OFFSET: usize = 5;
pub const PRICE_OFFSET: usize = 9;
pub const SEQUENCE_OFFSET: usize = 13;

/// Highest sequence a resend request can carry.
pub const MAX_RESEND_SEQUENCE: i32 = u8::MAX as i32;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    StreamAll = 1,
    Resend = 2,
}

impl CallType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(CallType::StreamAll),
            2 => Some(CallType::Resend),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("sequence {0} cannot be encoded in a resend request (max {})", MAX_RESEND_SEQUENCE)]
    SequenceOutOfRange(i32),

    #[error("invalid call type: {0}")]
    InvalidCallType(u8),
}

/// A client request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    StreamAll,
    Resend(u8),
}

impl Request {
    /// Build a resend request, rejecting sequences the single-byte field cannot hold.
    pub fn resend(sequence: i32) -> Result<Self, RequestError> {
        u8::try_from(sequence)
            .map(Request::Resend)
            .map_err(|_| RequestError::SequenceOutOfRange(sequence))
    }

    pub fn call_type(&self) -> CallType {
        match self {
            Request::StreamAll => CallType::StreamAll,
            Request::Resend(_) => CallType::Resend,
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        match *self {
            Request::StreamAll => [CallType::StreamAll as u8, 0],
            Request::Resend(seq) => [CallType::Resend as u8, seq],
        }
    }

    /// Server-side parse of a request frame.
    pub fn parse(frame: &[u8; REQUEST_SIZE]) -> Result<Self, RequestError> {
        match CallType::from_u8(frame[0]) {
            Some(CallType::StreamAll) => Ok(Request::StreamAll),
            Some(CallType::Resend) => Ok(Request::Resend(frame[1])),
            None => Err(RequestError::InvalidCallType(frame[0])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Side::Buy),
            'S' => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

/// One decoded trade packet. `sequence` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub symbol: String,
    pub side: char,
    pub quantity: i32,
    pub price: i32,
    pub sequence: i32,
}

impl Packet {
    /// Interpret the raw side byte. Decoding never validates it.
    pub fn side_kind(&self) -> Option<Side> {
        Side::from_char(self.side)
    }

    /// Wire image of this packet. The symbol is space padded or truncated to 4 bytes.
    /// A side above U+00FF has no single-byte form and is written as `?`.
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut frame = [b' '; PACKET_SIZE];
        for (dst, src) in frame[SYMBOL_OFFSET..SYMBOL_OFFSET + SYMBOL_LEN]
            .iter_mut()
            .zip(self.symbol.bytes())
        {
            *dst = src;
        }
        frame[SIDE_OFFSET] = u8::try_from(self.side).unwrap_or(b'?');
        BigEndian::write_i32(&mut frame[QUANTITY_OFFSET..PRICE_OFFSET], self.quantity);
        BigEndian::write_i32(&mut frame[PRICE_OFFSET..SEQUENCE_OFFSET], self.price);
        BigEndian::write_i32(&mut frame[SEQUENCE_OFFSET..PACKET_SIZE], self.sequence);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_type_conversion() {
        assert_eq!(CallType::from_u8(1), Some(CallType::StreamAll));
        assert_eq!(CallType::from_u8(2), Some(CallType::Resend));
        assert_eq!(CallType::from_u8(0), None);
        assert_eq!(CallType::from_u8(99), None);
    }

    #[test]
    fn test_request_encoding() {
        assert_eq!(Request::StreamAll.encode(), [0x01, 0x00]);
        assert_eq!(Request::Resend(7).encode(), [0x02, 0x07]);
        assert_eq!(Request::Resend(7).call_type(), CallType::Resend);
    }

    #[test]
    fn test_resend_bounds() {
        assert_eq!(Request::resend(0), Ok(Request::Resend(0)));
        assert_eq!(Request::resend(255), Ok(Request::Resend(255)));
        assert_eq!(Request::resend(256), Err(RequestError::SequenceOutOfRange(256)));
        assert_eq!(Request::resend(300), Err(RequestError::SequenceOutOfRange(300)));
        assert_eq!(Request::resend(-1), Err(RequestError::SequenceOutOfRange(-1)));
    }

    #[test]
    fn test_request_parse() {
        assert_eq!(Request::parse(&[1, 0]), Ok(Request::StreamAll));
        assert_eq!(Request::parse(&[2, 42]), Ok(Request::Resend(42)));
        assert_eq!(Request::parse(&[9, 0]), Err(RequestError::InvalidCallType(9)));
    }

    #[test]
    fn test_packet_encode_layout() {
        let packet = Packet {
            symbol: "AAPL".to_string(),
            side: 'B',
            quantity: 50,
            price: 100,
            sequence: 1,
        };
        let frame = packet.encode();
        assert_eq!(&frame[0..4], b"AAPL");
        assert_eq!(frame[4], b'B');
        assert_eq!(&frame[5..9], &[0, 0, 0, 50]);
        assert_eq!(&frame[9..13], &[0, 0, 0, 100]);
        assert_eq!(&frame[13..17], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_short_symbol_is_space_padded() {
        let packet = Packet {
            symbol: "GO".to_string(),
            side: 'S',
            quantity: 1,
            price: 1,
            sequence: 1,
        };
        assert_eq!(&packet.encode()[0..4], b"GO  ");
    }

    #[test]
    fn test_high_side_byte_survives_encode() {
        use crate::decoder::Decoder;

        let mut packet = Packet {
            symbol: "META".to_string(),
            side: '\u{e9}',
            quantity: 7,
            price: 8,
            sequence: 9,
        };
        let frame = packet.encode();
        assert_eq!(frame[SIDE_OFFSET], 0xE9);
        assert_eq!(Decoder::decode(&frame), packet);

        packet.side = '\u{20ac}';
        assert_eq!(packet.encode()[SIDE_OFFSET], b'?');
    }

    #[test]
    fn test_side_kind() {
        let mut packet = Packet {
            symbol: "MSFT".to_string(),
            side: 'S',
            quantity: 1,
            price: 1,
            sequence: 1,
        };
        assert_eq!(packet.side_kind(), Some(Side::Sell));
        packet.side = 'X';
        assert_eq!(packet.side_kind(), None);
        assert_eq!(Side::Buy.as_char(), 'B');
    }
}
