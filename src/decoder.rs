//! Packet frame decoder
//!
//! Turns one 17-byte wire frame into a `Packet`. Decoding is total: every
//! frame of the right length decodes, field values are not validated.

use crate::protocol::*;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame length mismatch: need {need} bytes, have {have}")]
    FrameLength { need: usize, have: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub struct Decoder;

impl Decoder {
    /// Decode a complete frame.
    pub fn decode(frame: &[u8; PACKET_SIZE]) -> Packet {
        Packet {
            symbol: decode_symbol(&frame[SYMBOL_OFFSET..SYMBOL_OFFSET + SYMBOL_LEN]),
            side: frame[SIDE_OFFSET] as char,
            quantity: BigEndian::read_i32(&frame[QUANTITY_OFFSET..PRICE_OFFSET]),
            price: BigEndian::read_i32(&frame[PRICE_OFFSET..SEQUENCE_OFFSET]),
            sequence: BigEndian::read_i32(&frame[SEQUENCE_OFFSET..PACKET_SIZE]),
        }
    }

    /// Decode from a slice that must hold exactly one frame.
    pub fn decode_slice(buffer: &[u8]) -> DecodeResult<Packet> {
        let frame: &[u8; PACKET_SIZE] =
            buffer.try_into().map_err(|_| DecodeError::FrameLength {
                need: PACKET_SIZE,
                have: buffer.len(),
            })?;
        Ok(Self::decode(frame))
    }
}

// Trailing spaces and NULs are padding.
fn decode_symbol(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
