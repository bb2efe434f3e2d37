//! I2C master write-read frames.
//!
//! The BMC exposes its private I2C buses through the "Master Write-Read"
//! command. The request data names a bus, a target address and the number
//! of bytes to read back, followed by the bytes to write first.
//!
//! ```text
//! Request:  [Bus:1] [Addr:1] [ReadSize:1] [Write:N]
//! Response: [CompletionCode:1] [Read:N]
//! ```
//!
//! The payload length is not bounded here; the BMC rejects oversize
//! transfers with its own completion code.

use bytes::BufMut;

use super::CompletionCode;
use crate::error::{Error, Result};

/// Request header size: bus, address, read size
const REQUEST_HEADER_LEN: usize = 3;

/// Smallest well-formed response: completion code plus one data byte
const RESPONSE_MIN_LEN: usize = 2;

/// Master write-read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterRequest {
    /// Bus identifier (BMC specific, includes the bus type bit)
    pub bus: u8,
    /// Target slave address (8-bit form)
    pub addr: u8,
    /// Number of bytes to read back
    pub rsize: u8,
    /// Bytes to write before reading
    pub data: Vec<u8>,
}

impl MasterRequest {
    pub fn new(bus: u8, addr: u8, rsize: u8, data: Vec<u8>) -> Self {
        Self {
            bus,
            addr,
            rsize,
            data,
        }
    }

    /// Encode request to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REQUEST_HEADER_LEN + self.data.len());
        buf.put_u8(self.bus);
        buf.put_u8(self.addr);
        buf.put_u8(self.rsize);
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Parse a request from bytes, as a BMC simulator would see it
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < REQUEST_HEADER_LEN {
            return Err(Error::MalformedFrame {
                need: REQUEST_HEADER_LEN,
                have: bytes.len(),
            });
        }

        Ok(Self {
            bus: bytes[0],
            addr: bytes[1],
            rsize: bytes[2],
            data: bytes[REQUEST_HEADER_LEN..].to_vec(),
        })
    }
}

/// Master write-read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterResponse {
    pub completion_code: CompletionCode,
    /// Bytes read from the target
    pub data: Vec<u8>,
}

impl MasterResponse {
    /// Parse a response from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RESPONSE_MIN_LEN {
            return Err(Error::MalformedFrame {
                need: RESPONSE_MIN_LEN,
                have: bytes.len(),
            });
        }

        Ok(Self {
            completion_code: CompletionCode(bytes[0]),
            data: bytes[1..].to_vec(),
        })
    }

    /// Encode response to bytes, as a BMC simulator would send it.
    ///
    /// The simulator framing carries an explicit length byte after the
    /// completion code; [`MasterResponse::parse`] does not strip it. Data
    /// longer than the length byte can count is rejected.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u8::try_from(self.data.len()).map_err(|_| Error::FrameTooLong {
            max: u8::MAX as usize,
            have: self.data.len(),
        })?;

        let mut buf = Vec::with_capacity(2 + self.data.len());
        buf.put_u8(self.completion_code.0);
        buf.put_u8(len);
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    /// Byte at `index`, or a malformed-frame error if the target returned
    /// fewer bytes than asked for.
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.data.get(index).copied().ok_or(Error::MalformedFrame {
            need: index + 1,
            have: self.data.len(),
        })
    }

    /// First two data bytes in wire order.
    pub fn word_bytes(&self) -> Result<[u8; 2]> {
        Ok([self.byte(0)?, self.byte(1)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[]; "empty")]
    #[test_case(&[0xD0]; "single_command")]
    #[test_case(&[0x8B, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]; "long")]
    fn request_round_trip(payload: &[u8]) {
        let request = MasterRequest::new(0x07, 0x78, 2, payload.to_vec());
        let parsed = MasterRequest::parse(&request.encode()).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_encoding_layout() {
        let encoded = MasterRequest::new(0x07, 0xB0, 1, vec![0x98]).encode();
        assert_eq!(encoded, vec![0x07, 0xB0, 0x01, 0x98]);
    }

    #[test]
    fn test_request_parse_short() {
        assert!(matches!(
            MasterRequest::parse(&[0x07, 0x78]),
            Err(Error::MalformedFrame { need: 3, have: 2 })
        ));
    }

    #[test_case(&[]; "empty")]
    #[test_case(&[0x00]; "completion_code_only")]
    fn response_too_short(frame: &[u8]) {
        match MasterResponse::parse(frame) {
            Err(Error::MalformedFrame { need, have }) => {
                assert_eq!(need, 2);
                assert_eq!(have, frame.len());
            }
            other => panic!("expected MalformedFrame, got {:?}", other),
        }
    }

    #[test]
    fn test_response_parsing() {
        let response = MasterResponse::parse(&[0x00, 0x12, 0x34]).unwrap();
        assert!(response.completion_code.is_success());
        assert_eq!(response.data, vec![0x12, 0x34]);
        assert_eq!(response.word_bytes().unwrap(), [0x12, 0x34]);

        let response = MasterResponse::parse(&[0x83, 0x00]).unwrap();
        assert_eq!(response.completion_code, CompletionCode(0x83));
    }

    #[test]
    fn test_response_encoding_mirrors_length() {
        let response = MasterResponse {
            completion_code: CompletionCode::OK,
            data: vec![0xAA, 0xBB, 0xCC],
        };
        assert_eq!(response.encode().unwrap(), vec![0x00, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test_case(255, true; "longest_countable")]
    #[test_case(256, false; "length_byte_overflow")]
    fn response_encoding_length_limit(len: usize, fits: bool) {
        let response = MasterResponse {
            completion_code: CompletionCode::OK,
            data: vec![0x5A; len],
        };
        match response.encode() {
            Ok(frame) => {
                assert!(fits);
                assert_eq!(frame[1] as usize, len);
                assert_eq!(frame.len(), len + 2);
            }
            Err(Error::FrameTooLong { max, have }) => {
                assert!(!fits);
                assert_eq!((max, have), (255, len));
            }
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_data_byte_is_malformed() {
        let response = MasterResponse::parse(&[0x00, 0x12]).unwrap();
        assert!(matches!(
            response.word_bytes(),
            Err(Error::MalformedFrame { need: 2, have: 1 })
        ));
    }
}
