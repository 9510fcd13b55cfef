#![no_std]
#![forbid(unsafe_code)]

//! CRC-16 over application messages, HAI variant (reflected, poly 0xA001, init 0).

pub const SIZE: usize = 2;
pub const HAI_POLY: u16 = 0xA001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    sum: u16,
    poly: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    pub fn new() -> Self {
        Self { sum: 0, poly: HAI_POLY }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.sum ^= b as u16;
            for _ in 0..8 {
                let carry = self.sum & 1 == 1;
                self.sum >>= 1;
                if carry { self.sum ^= self.poly; }
            }
        }
    }

    pub fn checksum(&self) -> u16 {
        self.sum
    }

    /// Big-endian, as appended to the wire.
    pub fn to_bytes(&self) -> [u8; SIZE] {
        self.sum.to_be_bytes()
    }

    pub fn reset(&mut self) {
        self.sum = 0;
    }
}
