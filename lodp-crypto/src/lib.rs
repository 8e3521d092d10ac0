#![no_std]
//! Crypto façade for the `lodp` transport core.
//!
//! This crate owns every concrete primitive the wire protocol needs (random
//! bytes, constant-time compare, scrubbing, keyed MAC, a bulk stream cipher,
//! X25519 ECDH with output validation, and session-key expansion) plus the
//! modified-ntor handshake built on top of them. Nothing here knows about
//! sockets, sessions, or the wire header layout — that's `lodp`.

mod ntor;
mod prim;

pub use ntor::{initiator_handshake, responder_handshake, HandshakeOutput};
pub use prim::{
    decrypt, derive_intro_keys, derive_session_keys, ecdh, ecdh_validate_pubkey, encrypt, mac,
    memcmp_ct, memwipe, rand_bytes, BulkKey, Mac, MacKey, SharedSecret, SymmetricKey, BULK_IV_LEN,
    BULK_KEY_LEN, ECDH_PUBLIC_KEY_LEN, ECDH_SECRET_LEN, MAC_DIGEST_LEN, MAC_KEY_LEN,
};
pub use x25519_dalek::{PublicKey, StaticSecret};

/// Errors that can arise from the crypto façade itself. Protocol-level
/// errors (bad packet shape, wrong state, etc) live in `lodp::LodpError`;
/// this is strictly "a cryptographic operation did not succeed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// MAC verification failed.
    InvalidMac,
    /// A received public key (or the ECDH output derived from it) was
    /// rejected — identity point or other low-order input.
    InvalidPublicKey,
}
