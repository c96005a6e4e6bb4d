//! Fixed-header binary framing.
//!
//! Every packet starts with a 16-byte big-endian header followed by a UTF-8
//! body:
//!
//! | offset | field      | type |
//! |--------|------------|------|
//! | 0..4   | packet_len | u32  |
//! | 4..6   | header_len | u16  |
//! | 6..8   | version    | u16  |
//! | 8..12  | operation  | u32  |
//! | 12..16 | sequence   | u32  |
//! | 16..   | body       | text |
//!
//! `packet_len` counts the header and the body together. Decoding operates
//! on a whole packet buffer; there is no streaming or partial-read state.

use bytestring::ByteString;

use crate::error::{Error, Result};

/// Header length in bytes, also the offset at which the body starts.
pub const HEADER_LEN: u16 = 16;

/// One framed message: header fields plus the decoded UTF-8 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u16,
    pub operation: u32,
    pub sequence: u32,
    pub body: ByteString,
}

impl Frame {
    pub fn new(version: u16, operation: u32, sequence: u32, body: ByteString) -> Self {
        Frame {
            version,
            operation,
            sequence,
            body,
        }
    }

    /// Packs the header and body into a single buffer.
    pub fn encode(&self) -> Vec<u8> {
        let packet_len = HEADER_LEN as usize + self.body.len();
        let mut buf = Vec::with_capacity(packet_len);
        buf.extend_from_slice(&(packet_len as u32).to_be_bytes());
        buf.extend_from_slice(&HEADER_LEN.to_be_bytes());
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&self.operation.to_be_bytes());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf
    }

    /// Unpacks a whole packet buffer.
    ///
    /// The buffer must hold the 16-byte header plus a non-empty body, carry
    /// a `header_len` of 16, and a `packet_len` matching the buffer length.
    pub fn decode(data: &[u8]) -> Result<Frame> {
        if data.len() <= HEADER_LEN as usize {
            return Err(Error::TruncatedFrame(data.len()));
        }

        let packet_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if packet_len as usize != data.len() {
            return Err(Error::BadPacketLen(packet_len, data.len()));
        }

        let header_len = u16::from_be_bytes([data[4], data[5]]);
        if header_len != HEADER_LEN {
            return Err(Error::BadHeaderLen(header_len, HEADER_LEN));
        }

        let version = u16::from_be_bytes([data[6], data[7]]);
        let operation = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let sequence = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);
        let body = String::from_utf8(data[HEADER_LEN as usize..].to_vec())?;

        Ok(Frame {
            version,
            operation,
            sequence,
            body: body.into(),
        })
    }
}
