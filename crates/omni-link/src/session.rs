use alloc::boxed::Box;
use log::{debug, info, warn};
use zeroize::Zeroize;

use omni_cipher::{ControllerKey, SessionKey};
use omni_core::{MessageType, OmniError, OmniResult, SessionId};
use omni_hal::{ByteStream, PlatformClock};

use crate::packet::build_wire_packet;
use crate::sequence::SequenceCounter;
use crate::LinkConfig;

/// Incoming data buffer, reused for every response on the connection.
pub const RX_BUFFER_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    AwaitingNewSessionAck,
    AwaitingSecureSessionAck,
    Established,
    Failed,
}

/// One connection to a controller.
///
/// Owns its transport: any handshake failure, `close`, `terminate` or drop
/// closes it. A session never re-negotiates; reconnecting means a new
/// `Session` over a new stream.
pub struct Session {
    pub(crate) link: Box<dyn ByteStream>,
    clock: Box<dyn PlatformClock>,
    config: LinkConfig,
    pub(crate) key: ControllerKey,
    pub(crate) session_id: Option<SessionId>,
    pub(crate) session_key: Option<SessionKey>,
    pub(crate) sequence: SequenceCounter,
    pub(crate) state: HandshakeState,
    pub(crate) buf: [u8; RX_BUFFER_SIZE],
}

impl Session {
    pub fn new(
        link: Box<dyn ByteStream>,
        clock: Box<dyn PlatformClock>,
        key: ControllerKey,
        config: LinkConfig,
    ) -> Self {
        Self {
            link, clock, config, key,
            session_id: None,
            session_key: None,
            sequence: SequenceCounter::new(),
            state: HandshakeState::Disconnected,
            buf: [0u8; RX_BUFFER_SIZE],
        }
    }

    pub fn state(&self) -> HandshakeState { self.state }
    pub fn is_established(&self) -> bool { self.state == HandshakeState::Established }
    pub fn is_closed(&self) -> bool { self.link.is_closed() }
    pub fn session_id(&self) -> Option<&SessionId> { self.session_id.as_ref() }

    /// `None` until the handshake has derived a key.
    pub fn session_key(&self) -> Option<&SessionKey> { self.session_key.as_ref() }

    pub fn sequence(&self) -> &SequenceCounter { &self.sequence }

    /// Tell the controller we are leaving, then close.
    pub fn terminate(&mut self) -> OmniResult<()> {
        if self.state != HandshakeState::Established { return Err(OmniError::InvalidState); }

        let seq = self.sequence.next();
        let wire = build_wire_packet(seq, MessageType::ClientTerminate, &[], self.session_key.as_ref())?;
        let sent = self.send(&wire);
        info!("Session: client terminate sent (seq {})", seq);
        self.close();
        sent
    }

    pub fn close(&mut self) {
        self.link.close();
        self.buf.zeroize();
        self.session_id = None;
        self.session_key = None;
        if self.state != HandshakeState::Failed {
            self.state = HandshakeState::Disconnected;
        }
    }

    /// Failure path shared by every handshake step. Returns `err` for `?`-style use.
    pub(crate) fn fail(&mut self, err: OmniError) -> OmniError {
        warn!("Handshake failed while {:?}: {}", self.state, err);
        self.state = HandshakeState::Failed;
        self.session_id = None;
        self.session_key = None;
        self.link.close();
        self.buf.zeroize();
        err
    }

    fn deadline_passed(&self, started_us: u64) -> bool {
        match self.config.io_timeout_us {
            Some(limit) => self.clock.now_us().saturating_sub(started_us) > limit,
            None => false,
        }
    }

    pub(crate) fn send(&mut self, wire: &[u8]) -> OmniResult<()> {
        let started = self.clock.now_us();
        let mut sent = 0;
        while sent < wire.len() {
            match self.link.write(&wire[sent..]) {
                Ok(0) => return Err(OmniError::Transport),
                Ok(n) => sent += n,
                Err(nb::Error::WouldBlock) => {
                    if self.deadline_passed(started) { return Err(OmniError::Timeout); }
                }
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
        debug!("TX {} bytes", wire.len());
        Ok(())
    }

    /// Read until `buf[..want]` is populated, given `filled` bytes already there.
    /// Short reads are normal; end-of-stream before `want` is a transport error.
    pub(crate) fn fill(&mut self, mut filled: usize, want: usize) -> OmniResult<()> {
        let started = self.clock.now_us();
        while filled < want {
            match self.link.read(&mut self.buf[filled..want]) {
                Ok(0) => {
                    warn!("Controller closed the stream after {} of {} bytes", filled, want);
                    return Err(OmniError::Transport);
                }
                Ok(n) => filled += n,
                Err(nb::Error::WouldBlock) => {
                    if self.deadline_passed(started) { return Err(OmniError::Timeout); }
                }
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.link.is_closed() {
            self.link.close();
        }
        self.buf.zeroize();
    }
}
