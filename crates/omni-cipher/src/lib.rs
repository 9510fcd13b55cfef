#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;
use alloc::vec::Vec;
use omni_core::{OmniError, OmniResult, SessionId, BLOCK_SIZE, HEADER_SIZE, KEY_SIZE, SESSION_ID_SIZE};
use aes::Aes128;
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Long-term 128-bit key configured on the controller.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ControllerKey(pub [u8; KEY_SIZE]);

/// Per-connection AES key, see [`derive_session_key`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(pub [u8; KEY_SIZE]);

/// XOR the 40-bit session id into the last 5 bytes of the controller key.
/// The first 11 bytes pass through unchanged.
pub fn derive_session_key(key: &ControllerKey, session_id: &SessionId) -> SessionKey {
    let mut derived = SessionKey(key.0);
    let offset = KEY_SIZE - SESSION_ID_SIZE;
    for (dst, src) in derived.0[offset..].iter_mut().zip(session_id.iter()) {
        *dst ^= *src;
    }
    derived
}

/// AES-128 with the controller's sequence-number chaining.
///
/// Every 16-byte block of a packet body has its first two bytes XORed with
/// the packet's big-endian sequence number before encryption (and after
/// decryption). The 4-byte header itself is never encrypted.
pub struct OmniCipher {
    cipher: Aes128,
}

impl OmniCipher {
    pub fn new(key: &SessionKey) -> Self {
        Self { cipher: Aes128::new(GenericArray::from_slice(&key.0)) }
    }

    /// `data` is an unencrypted packet: header followed by the plaintext body.
    /// The body is zero-padded to a whole number of blocks.
    pub fn encrypt_packet_data(&self, data: &[u8]) -> OmniResult<Vec<u8>> {
        if data.len() < HEADER_SIZE { return Err(OmniError::InvalidInput); }

        let body = &data[HEADER_SIZE..];
        let padded_len = (body.len() + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE;
        let mut output = alloc::vec![0u8; HEADER_SIZE + padded_len];
        output[..HEADER_SIZE].copy_from_slice(&data[..HEADER_SIZE]);

        let (seq_hi, seq_lo) = (data[0], data[1]);
        let blocks = output[HEADER_SIZE..].chunks_exact_mut(BLOCK_SIZE);
        for (slot, plain) in blocks.zip(body.chunks(BLOCK_SIZE)) {
            // slot is still zeroed, so a short final chunk leaves its padding in place
            slot[..plain.len()].copy_from_slice(plain);
            slot[0] ^= seq_hi;
            slot[1] ^= seq_lo;
            self.cipher.encrypt_block(GenericArray::from_mut_slice(slot));
        }

        Ok(output)
    }

    /// Decrypt one ciphertext block. Only the first 2 bytes of `sequence`
    /// and the first 16 bytes of `block` are used.
    pub fn decrypt_packet_block(&self, sequence: &[u8], block: &[u8]) -> OmniResult<[u8; BLOCK_SIZE]> {
        if sequence.len() < 2 { return Err(OmniError::InvalidInput); }
        if block.len() < BLOCK_SIZE { return Err(OmniError::InvalidInput); }

        let mut result = [0u8; BLOCK_SIZE];
        result.copy_from_slice(&block[..BLOCK_SIZE]);
        self.cipher.decrypt_block(GenericArray::from_mut_slice(&mut result));
        result[0] ^= sequence[0];
        result[1] ^= sequence[1];
        Ok(result)
    }

    /// Inverse of [`Self::encrypt_packet_data`]. Padding is not stripped.
    pub fn decrypt_packet_data(&self, data: &[u8]) -> OmniResult<Vec<u8>> {
        if data.len() < HEADER_SIZE { return Err(OmniError::InvalidInput); }
        let body = &data[HEADER_SIZE..];
        if body.len() % BLOCK_SIZE != 0 { return Err(OmniError::InvalidInput); }

        let mut output = Vec::with_capacity(data.len());
        output.extend_from_slice(&data[..HEADER_SIZE]);
        for block in body.chunks_exact(BLOCK_SIZE) {
            output.extend_from_slice(&self.decrypt_packet_block(&data[0..2], block)?);
        }
        Ok(output)
    }
}
