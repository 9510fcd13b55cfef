use alloc::vec::Vec;
use omni_cipher::{OmniCipher, SessionKey};
use omni_core::{MessageType, OmniError, OmniResult, PacketHeader, HEADER_SIZE};

/// A single outgoing protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence: u16,
    pub message_type: MessageType,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(sequence: u16, message_type: MessageType) -> Self {
        Self { sequence, message_type, data: Vec::new() }
    }

    pub fn with_data(sequence: u16, message_type: MessageType, data: &[u8]) -> Self {
        Self { sequence, message_type, data: data.to_vec() }
    }

    pub fn to_wire(&self, session_key: Option<&SessionKey>) -> OmniResult<Vec<u8>> {
        build_wire_packet(self.sequence, self.message_type, &self.data, session_key)
    }
}

/// Serialize header + payload, encrypting from offset 4 when the type needs it.
///
/// The payload is only carried once a session key exists. Types 0..=2 are
/// always returned plain; every other type fails with `InvalidState` if
/// there is no key to encrypt with.
pub fn build_wire_packet(
    sequence: u16,
    message_type: MessageType,
    payload: &[u8],
    session_key: Option<&SessionKey>,
) -> OmniResult<Vec<u8>> {
    let mut buf = alloc::vec![0u8; HEADER_SIZE];
    PacketHeader::new(sequence, message_type).to_bytes(&mut buf)?;
    if session_key.is_some() {
        buf.extend_from_slice(payload);
    }

    if !message_type.requires_encryption() {
        return Ok(buf);
    }

    let key = session_key.ok_or(OmniError::InvalidState)?;
    OmniCipher::new(key).encrypt_packet_data(&buf)
}
