//! Fixed-capacity scratch buffer (§2 item 2, §3 "Buffer").
//!
//! Holds a `plaintext` view and a `ciphertext` view of one datagram, each
//! capped at [`MSS`]. Scrubbed on drop, which is how this crate expresses
//! "contents are scrubbed on return to the free pool" — `Buffer` IS the pool
//! slot, and the allocator is the pool; a hand-rolled free list would fight
//! the borrow checker for no behavioral gain over RAII here.

use zeroize::Zeroize;

use crate::error::LodpError;
use crate::wire::{MSS, PKT_TAG_LEN};

pub struct Buffer {
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub len: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            plaintext: vec![0u8; MSS],
            ciphertext: vec![0u8; MSS],
            len: 0,
        }
    }

    /// Load a received datagram into the `ciphertext` view, ready for
    /// [`crate::aead::mac_then_decrypt`]. Enforces the size precondition
    /// §4.4 requires of the caller: at least MAC+IV+TLV, at most MSS.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, LodpError> {
        if bytes.len() < PKT_TAG_LEN + 4 || bytes.len() > MSS {
            return Err(LodpError::BadPacket);
        }
        let mut buf = Self::new();
        buf.ciphertext[..bytes.len()].copy_from_slice(bytes);
        buf.len = bytes.len();
        Ok(buf)
    }

    /// The TLV preamble plus type-specific payload, after a successful
    /// `mac_then_decrypt`.
    pub fn plaintext_body(&self) -> &[u8] {
        &self.plaintext[PKT_TAG_LEN..self.len]
    }

    /// The framed datagram as sent on the wire, after a successful
    /// `encrypt_then_mac`.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.ciphertext[..self.len]
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.plaintext.zeroize();
        self.ciphertext.zeroize();
    }
}
