#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use omni_cipher::{derive_session_key, ControllerKey, OmniCipher};
use omni_core::OmniError;
use omni_hal::{ByteStream, PlatformClock};
use omni_link::{LinkConfig, Session};

pub const CONTROLLER_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
pub const SESSION_ID: [u8; 5] = [0x20, 0x21, 0x22, 0x23, 0x24];
/// Two leading bytes of the new-session ack data (protocol version).
pub const PROTOCOL_VERSION: [u8; 2] = [0x00, 0x01];

/// How a request write goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// `Err(Other(Transport))`.
    Error,
    /// Accepts nothing: `Ok(0)`.
    Zero,
    /// `WouldBlock` forever.
    Block,
}

/// Ways the simulated controller can misbehave.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Echo `seq + 1` instead of `seq` on the given step (1 or 2).
    pub wrong_seq_at_step: Option<u8>,
    /// Reply with this raw type byte on the given step.
    pub wrong_type_at_step: Option<(u8, u8)>,
    /// Echo this id in the secure-session confirmation.
    pub confirm_with: Option<[u8; 5]>,
    /// After this many bytes have been delivered, reads fail with `Transport`.
    pub cut_after: Option<usize>,
    /// After this many bytes have been delivered, reads report end-of-stream.
    pub hang_up_after: Option<usize>,
    /// Largest chunk handed out per read, 0 for unlimited.
    pub chunk: usize,
    /// Never answer the given step.
    pub silent_at_step: Option<u8>,
    /// Fail the request write of the given step.
    pub write_fault_at_step: Option<(u8, WriteFault)>,
    /// Reads report `WouldBlock` this many times after each request before
    /// the reply becomes visible.
    pub stall_reads: usize,
}

/// What the test can observe after the session took ownership of the stream.
#[derive(Debug, Default)]
pub struct Wire {
    pub written: Vec<Vec<u8>>,
    pub closed: bool,
    pub delivered: usize,
}

pub struct MockController {
    faults: Faults,
    step: u8,
    stalls_left: usize,
    pending: VecDeque<u8>,
    wire: Arc<Mutex<Wire>>,
}

impl MockController {
    pub fn new(faults: Faults) -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let ctrl = Self { faults, step: 0, stalls_left: 0, pending: VecDeque::new(), wire: wire.clone() };
        (ctrl, wire)
    }

    fn reply_type(&self, default: u8) -> u8 {
        match self.faults.wrong_type_at_step {
            Some((step, ty)) if step == self.step => ty,
            _ => default,
        }
    }

    fn reply_seq(&self, request: &[u8]) -> [u8; 2] {
        let seq = u16::from_be_bytes([request[0], request[1]]);
        let seq = match self.faults.wrong_seq_at_step {
            Some(step) if step == self.step => seq.wrapping_add(1),
            _ => seq,
        };
        seq.to_be_bytes()
    }

    fn respond(&mut self, request: &[u8]) {
        if self.faults.silent_at_step == Some(self.step) { return; }

        match self.step {
            1 => {
                assert_eq!(request.len(), 4, "new session request must be header only");
                assert_eq!(request[2], 1);
                let seq = self.reply_seq(request);
                self.pending.extend([seq[0], seq[1], self.reply_type(2), 0]);
                self.pending.extend(PROTOCOL_VERSION);
                self.pending.extend(SESSION_ID);
            }
            2 => {
                assert_eq!(request.len(), 20, "secure session request must be header + one block");
                assert_eq!(request[2], 3);
                let key = derive_session_key(&ControllerKey(CONTROLLER_KEY), &SESSION_ID);
                let cipher = OmniCipher::new(&key);
                let plain = cipher.decrypt_packet_block(&request[0..2], &request[4..20]).unwrap();
                assert_eq!(&plain[..5], &SESSION_ID);
                assert!(plain[5..].iter().all(|b| *b == 0));

                let seq = self.reply_seq(request);
                let mut ack = vec![seq[0], seq[1], self.reply_type(4), 0];
                ack.extend_from_slice(&self.faults.confirm_with.unwrap_or(SESSION_ID));
                self.pending.extend(cipher.encrypt_packet_data(&ack).unwrap());
            }
            _ => {}
        }
    }
}

impl ByteStream for MockController {
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, OmniError> {
        if self.is_closed() { return Err(nb::Error::Other(OmniError::Transport)); }
        match self.faults.write_fault_at_step {
            Some((step, fault)) if step == self.step + 1 => match fault {
                WriteFault::Error => return Err(nb::Error::Other(OmniError::Transport)),
                WriteFault::Zero => return Ok(0),
                WriteFault::Block => return Err(nb::Error::WouldBlock),
            },
            _ => {}
        }
        self.wire.lock().unwrap().written.push(bytes.to_vec());
        self.step += 1;
        self.stalls_left = self.faults.stall_reads;
        self.respond(bytes);
        Ok(bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, OmniError> {
        let mut wire = self.wire.lock().unwrap();
        if wire.closed { return Err(nb::Error::Other(OmniError::Transport)); }

        let mut budget = usize::MAX;
        if let Some(limit) = self.faults.cut_after {
            if wire.delivered >= limit { return Err(nb::Error::Other(OmniError::Transport)); }
            budget = limit - wire.delivered;
        }
        if let Some(limit) = self.faults.hang_up_after {
            if wire.delivered >= limit { return Ok(0); }
            budget = budget.min(limit - wire.delivered);
        }
        if self.stalls_left > 0 {
            self.stalls_left -= 1;
            return Err(nb::Error::WouldBlock);
        }
        if self.pending.is_empty() { return Err(nb::Error::WouldBlock); }

        let mut n = buffer.len().min(self.pending.len()).min(budget);
        if self.faults.chunk > 0 { n = n.min(self.faults.chunk); }
        for slot in buffer[..n].iter_mut() {
            *slot = self.pending.pop_front().unwrap();
        }
        wire.delivered += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.wire.lock().unwrap().closed = true;
    }

    fn is_closed(&self) -> bool {
        self.wire.lock().unwrap().closed
    }
}

/// Advances by `step_us` every time it is read.
pub struct MockClock {
    t: Arc<AtomicU64>,
    step_us: u64,
}

impl MockClock {
    pub fn new(step_us: u64) -> Self {
        Self { t: Arc::new(AtomicU64::new(0)), step_us }
    }
}

impl PlatformClock for MockClock {
    fn now_us(&self) -> u64 {
        self.t.fetch_add(self.step_us, Ordering::SeqCst)
    }
}

pub fn session_with(faults: Faults) -> (Session, Arc<Mutex<Wire>>) {
    session_with_config(faults, LinkConfig::default())
}

/// The mock clock advances 1 ms per reading.
pub fn session_with_config(faults: Faults, config: LinkConfig) -> (Session, Arc<Mutex<Wire>>) {
    let (ctrl, wire) = MockController::new(faults);
    let session = Session::new(
        Box::new(ctrl),
        Box::new(MockClock::new(1_000)),
        ControllerKey(CONTROLLER_KEY),
        config,
    );
    (session, wire)
}
