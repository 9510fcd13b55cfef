#![no_std]
#[cfg(feature = "std")]
extern crate std;

/// Unencrypted header: seq (2, BE), message type (1), reserved (1).
pub const HEADER_SIZE: usize = 4;
/// AES-128 block size. Secure payloads are padded to a multiple of this.
pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;
pub const SESSION_ID_SIZE: usize = 5;

/// 40-bit session identifier assigned by the controller.
pub type SessionId = [u8; SESSION_ID_SIZE];

/// Application packet message types (wire value in the discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    NoMessage = 0,
    RequestNewSession = 1,
    AckNewSession = 2,
    RequestSecureSession = 3,
    AckSecureSession = 4,
    ClientTerminate = 5,
    ServerTerminate = 6,
    CannotCreateSession = 7,
    ApplicationData = 32,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoMessage),
            1 => Some(Self::RequestNewSession),
            2 => Some(Self::AckNewSession),
            3 => Some(Self::RequestSecureSession),
            4 => Some(Self::AckSecureSession),
            5 => Some(Self::ClientTerminate),
            6 => Some(Self::ServerTerminate),
            7 => Some(Self::CannotCreateSession),
            32 => Some(Self::ApplicationData),
            _ => None,
        }
    }

    /// Types 0..=2 never carry a secure payload.
    pub fn requires_encryption(self) -> bool {
        !matches!(self, Self::NoMessage | Self::RequestNewSession | Self::AckNewSession)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: u16,
    pub message_type: MessageType,
    pub reserved: u8,
}

impl PacketHeader {
    pub const SIZE: usize = HEADER_SIZE;

    pub fn new(sequence: u16, message_type: MessageType) -> Self {
        Self { sequence, message_type, reserved: 0 }
    }

    pub fn to_bytes(&self, buf: &mut [u8]) -> OmniResult<()> {
        if buf.len() < Self::SIZE { return Err(OmniError::WireFormatError); }
        buf[0..2].copy_from_slice(&self.sequence.to_be_bytes());
        buf[2] = self.message_type as u8;
        buf[3] = self.reserved;
        Ok(())
    }

    /// Sequence number of a header without validating its type byte.
    pub fn sequence_of(buf: &[u8]) -> OmniResult<u16> {
        if buf.len() < Self::SIZE { return Err(OmniError::WireFormatError); }
        Ok(u16::from_be_bytes([buf[0], buf[1]]))
    }

    pub fn from_bytes(buf: &[u8]) -> OmniResult<Self> {
        let sequence = Self::sequence_of(buf)?;
        let message_type = MessageType::from_u8(buf[2]).ok_or(OmniError::WireFormatError)?;

        Ok(Self {
            sequence,
            message_type,
            reserved: buf[3],
        })
    }
}

pub type OmniResult<T> = Result<T, OmniError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmniError {
    /// Any I/O failure on the byte stream, including a peer hang-up mid-read.
    Transport,
    Timeout,
    /// Echoed sequence number does not match the outstanding request.
    ProtocolMismatch { expected: u16, received: u16 },
    UnexpectedMessageType { expected: u8, received: u8 },
    /// Decrypted secure-session confirmation does not echo our session id.
    SessionIdentifierMismatch,
    CannotCreateSession,
    ServerTerminated,
    InvalidInput,
    InvalidState,
    WireFormatError,
}

impl core::fmt::Display for OmniError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OmniError {}
