//! Two-step session bootstrap.
//!
//! ```text
//! client                                  controller
//!   [seq1, 1, 0]                      ->
//!                                     <-  [seq1, 2, 0] + 2 bytes + session id (5)
//!   derive session key
//!   [seq2, 3, 0] + E(session id)      ->
//!                                     <-  [seq2, 4, 0] + E(session id) (16)
//! ```

use log::{debug, info};

use omni_cipher::{derive_session_key, OmniCipher};
use omni_core::{MessageType, OmniError, OmniResult, PacketHeader, BLOCK_SIZE, HEADER_SIZE, SESSION_ID_SIZE};

use crate::packet::build_wire_packet;
use crate::session::{HandshakeState, Session};

/// Header + 7 data bytes; the session id is the last 5.
pub const NEW_SESSION_ACK_LEN: usize = HEADER_SIZE + 7;
/// Header + one encrypted block.
pub const SECURE_SESSION_ACK_LEN: usize = HEADER_SIZE + BLOCK_SIZE;

impl Session {
    /// Run the full handshake. On any error the session is `Failed` and its
    /// transport is closed before this returns.
    pub fn negotiate(&mut self) -> OmniResult<()> {
        if self.state != HandshakeState::Disconnected || self.link.is_closed() {
            return Err(OmniError::InvalidState);
        }

        match self.run_handshake() {
            Ok(()) => {
                self.state = HandshakeState::Established;
                if let Some(id) = self.session_id {
                    info!(">>> [LINK] SECURE SESSION ESTABLISHED (id {:02x?})", id);
                }
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_handshake(&mut self) -> OmniResult<()> {
        // Step 1: plain new-session request.
        let seq = self.sequence.next();
        let request = build_wire_packet(seq, MessageType::RequestNewSession, &[], None)?;
        self.send(&request)?;
        self.state = HandshakeState::AwaitingNewSessionAck;
        debug!("Handshake: new session requested (seq {})", seq);

        self.fill(0, HEADER_SIZE)?;
        self.expect_header(seq, MessageType::AckNewSession)?;
        self.fill(HEADER_SIZE, NEW_SESSION_ACK_LEN)?;

        let mut session_id = [0u8; SESSION_ID_SIZE];
        session_id.copy_from_slice(&self.buf[NEW_SESSION_ACK_LEN - SESSION_ID_SIZE..NEW_SESSION_ACK_LEN]);
        let session_key = derive_session_key(&self.key, &session_id);
        let cipher = OmniCipher::new(&session_key);

        // Step 2: encrypted secure-session request carrying the id.
        let seq = self.sequence.next();
        let request = build_wire_packet(seq, MessageType::RequestSecureSession, &session_id, Some(&session_key))?;
        self.session_id = Some(session_id);
        self.session_key = Some(session_key);
        self.send(&request)?;
        self.state = HandshakeState::AwaitingSecureSessionAck;
        debug!("Handshake: secure session requested (seq {})", seq);

        self.fill(0, HEADER_SIZE)?;
        self.expect_header(seq, MessageType::AckSecureSession)?;
        self.fill(HEADER_SIZE, SECURE_SESSION_ACK_LEN)?;

        let confirm = cipher.decrypt_packet_block(&self.buf[0..2], &self.buf[HEADER_SIZE..SECURE_SESSION_ACK_LEN])?;
        if confirm[..SESSION_ID_SIZE] != session_id {
            return Err(OmniError::SessionIdentifierMismatch);
        }
        Ok(())
    }

    /// Check the header sitting in `buf[..4]` against the outstanding request.
    fn expect_header(&self, sent: u16, expected: MessageType) -> OmniResult<()> {
        let header = &self.buf[..HEADER_SIZE];
        let received = PacketHeader::sequence_of(header)?;
        if received != sent {
            return Err(OmniError::ProtocolMismatch { expected: sent, received });
        }

        // Unknown type bytes fail to parse; report them with the raw value.
        match PacketHeader::from_bytes(header).map(|h| h.message_type) {
            Ok(t) if t == expected => Ok(()),
            Ok(MessageType::CannotCreateSession) => Err(OmniError::CannotCreateSession),
            Ok(MessageType::ServerTerminate) => Err(OmniError::ServerTerminated),
            _ => Err(OmniError::UnexpectedMessageType { expected: expected as u8, received: header[2] }),
        }
    }
}
