//! The flat error taxonomy of the wire protocol, expressed as a typed enum.
//!
//! Every variant here corresponds to exactly one of the integer error kinds
//! the core reports; nothing here is a new failure mode, just a Rust-shaped
//! name for one the wire protocol already defines.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LodpError {
    /// Authentication tag mismatch. Terminal for the packet that triggered
    /// it; triggers a session→endpoint-keys retry in the dispatcher, never
    /// a retry the other way.
    #[error("authentication tag mismatch")]
    InvalidMac,

    /// Structural violation: bad size, reserved flag set, wrong type for
    /// the current state/role, or wrong length for the packet's type.
    #[error("malformed or unexpected packet")]
    BadPacket,

    /// Cookie verification failed under both the current and (if still in
    /// the grace window) previous cookie key.
    #[error("cookie verification failed")]
    InvalidCookie,

    /// Any failure inside the modified-ntor handshake: public-key
    /// validation, verifier mismatch, or an underlying primitive failure.
    #[error("handshake failed")]
    BadHandshake,

    /// An endpoint with no intro keys received a packet it has no way to
    /// decrypt.
    #[error("endpoint cannot act as a responder")]
    NotResponder,

    /// Buffer or memory exhaustion.
    #[error("out of buffers")]
    NoBufs,

    /// The requested application payload would exceed the maximum segment
    /// size once framed.
    #[error("payload exceeds the maximum segment size")]
    MsgSize,

    /// The peer's address family is neither IPv4 nor IPv6.
    ///
    /// `std::net::SocketAddr` is always one of those two, so this arm is
    /// currently unreachable in practice; it is kept so the enum mirrors
    /// the original's defensive completeness and stays exhaustive if a
    /// future transport exposes other address families.
    #[error("unsupported peer address family")]
    AfNotSupport,
}

impl From<lodp_crypto::CryptoError> for LodpError {
    fn from(e: lodp_crypto::CryptoError) -> Self {
        match e {
            lodp_crypto::CryptoError::InvalidMac => LodpError::InvalidMac,
            lodp_crypto::CryptoError::InvalidPublicKey => LodpError::BadHandshake,
        }
    }
}
