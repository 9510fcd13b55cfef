use spin::Mutex;

/// Packet sequence numbers: 1..=65535, wrapping back to 1. Zero means
/// "no sequence" and is never handed out.
pub struct SequenceCounter {
    last: Mutex<u16>,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCounter {
    pub const fn new() -> Self {
        Self { last: Mutex::new(0) }
    }

    /// Resume after `last`, i.e. the next call returns `last + 1` (or 1).
    pub const fn starting_after(last: u16) -> Self {
        Self { last: Mutex::new(last) }
    }

    pub fn next(&self) -> u16 {
        let mut last = self.last.lock();
        *last = match last.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        *last
    }

    /// Most recently issued number, 0 if none yet.
    pub fn last(&self) -> u16 {
        *self.last.lock()
    }
}
