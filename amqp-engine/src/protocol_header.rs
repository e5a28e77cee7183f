//! The 8-byte protocol header exchanged before any frame.
//!
//! Every AMQP connection (and the optional SASL security layer nested in
//! front of it) starts with a fixed 8-byte header: the ASCII prefix `AMQP`,
//! a protocol id, and the three-part protocol version.

use amqp_types::definitions::{MAJOR, MINOR, REVISION};

use crate::error::{EngineError, Result};

const PREFIX: &[u8; 4] = b"AMQP";

/// Protocol id carried in byte 4 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    /// Plain AMQP, no security layer negotiated (or negotiation complete).
    Amqp,
    /// SASL security layer.
    Sasl,
}

impl ProtocolId {
    fn as_byte(self) -> u8 {
        match self {
            ProtocolId::Amqp => 0,
            ProtocolId::Sasl => 3,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ProtocolId::Amqp),
            3 => Ok(ProtocolId::Sasl),
            other => Err(EngineError::Framing(format!(
                "unrecognised protocol id {other}"
            ))),
        }
    }
}

/// The 8-byte `AMQP`/`SASL` protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Which protocol this header announces.
    pub id: ProtocolId,
    /// Major version, always 1 for AMQP 1.0.
    pub major: u8,
    /// Minor version, always 0 for AMQP 1.0.
    pub minor: u8,
    /// Revision, always 0 for AMQP 1.0.
    pub revision: u8,
}

impl ProtocolHeader {
    /// The header a client sends to start the AMQP connection directly (no SASL).
    pub fn amqp() -> Self {
        Self {
            id: ProtocolId::Amqp,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }

    /// The header a client sends to start SASL negotiation.
    pub fn sasl() -> Self {
        Self {
            id: ProtocolId::Sasl,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }

    /// Encodes the header into its fixed 8-byte wire form.
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(PREFIX);
        buf[4] = self.id.as_byte();
        buf[5] = self.major;
        buf[6] = self.minor;
        buf[7] = self.revision;
        buf
    }

    /// Decodes a header from exactly 8 bytes.
    pub fn decode(bytes: &[u8; 8]) -> Result<Self> {
        if &bytes[..4] != PREFIX {
            return Err(EngineError::Framing(format!(
                "bad protocol header prefix {:?}",
                &bytes[..4]
            )));
        }
        Ok(Self {
            id: ProtocolId::from_byte(bytes[4])?,
            major: bytes[5],
            minor: bytes[6],
            revision: bytes[7],
        })
    }

    /// True if this header announces a version this engine can speak.
    pub fn is_supported_version(&self) -> bool {
        self.major == MAJOR && self.minor == MINOR && self.revision == REVISION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_header_round_trips() {
        let header = ProtocolHeader::amqp();
        let encoded = header.encode();
        assert_eq!(&encoded, b"AMQP\x00\x01\x00\x00");
        let decoded = ProtocolHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn sasl_header_round_trips() {
        let header = ProtocolHeader::sasl();
        let encoded = header.encode();
        assert_eq!(&encoded, b"AMQP\x03\x01\x00\x00");
        assert_eq!(ProtocolHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let bytes = *b"XMQP\x00\x01\x00\x00";
        assert!(ProtocolHeader::decode(&bytes).is_err());
    }
}
