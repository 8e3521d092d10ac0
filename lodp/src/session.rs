//! Per-peer connection state (§3 "Session") and the modified-ntor handshake
//! wiring on top of it (§4.7).

use std::net::SocketAddr;

use lodp_crypto::{Mac, PublicKey, StaticSecret, SymmetricKey};
use zeroize::Zeroize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Handshake,
    Established,
    Error,
}

/// The session's ephemeral ECDH keypair. Kept in its own type so that
/// scrubbing it is a single `= None` that drops (and, via `x25519-dalek`'s
/// `zeroize` feature, wipes) the private scalar.
pub struct EphemeralKeypair {
    pub private: StaticSecret,
    pub public: PublicKey,
}

pub struct Session {
    pub peer_addr: SocketAddr,
    pub role: Role,
    pub state: SessionState,

    pub session_ecdh_keypair: Option<EphemeralKeypair>,
    /// The responder's long-term public key. Only meaningful for an
    /// initiator session (known out of band before `connect()`).
    pub remote_public_key: Option<PublicKey>,

    pub tx_key: SymmetricKey,
    pub rx_key: SymmetricKey,

    pub session_secret: Mac,
    pub session_secret_verifier: Mac,

    /// Opaque, variable-length, initiator-only: echoed back in the
    /// HANDSHAKE that follows INIT_ACK.
    pub cookie: Vec<u8>,

    pub seen_peer_data: bool,
}

impl Session {
    /// Start an initiator session in `INIT`, pre-generating the ephemeral
    /// "own intro keys" that get echoed in the INIT/HANDSHAKE body so the
    /// responder can address its replies under keys we recognize, and
    /// setting `tx_key` to the deterministic intro keys of the known
    /// responder identity (§4.11: `send_init`/`send_handshake` encrypt
    /// under these before the real traffic keys exist).
    pub fn new_initiator(
        peer_addr: SocketAddr,
        remote_public_key: PublicKey,
        own_intro_keys: SymmetricKey,
    ) -> Self {
        let tx_key = lodp_crypto::derive_intro_keys(&remote_public_key);
        Self {
            peer_addr,
            role: Role::Initiator,
            state: SessionState::Init,
            session_ecdh_keypair: None,
            remote_public_key: Some(remote_public_key),
            tx_key,
            rx_key: own_intro_keys,
            session_secret: [0u8; 32],
            session_secret_verifier: [0u8; 32],
            cookie: Vec::new(),
            seen_peer_data: false,
        }
    }

    /// Start a responder session, already `ESTABLISHED` per §3's invariant;
    /// the caller installs `tx_key`/`rx_key` once the handshake completes.
    pub fn new_responder(peer_addr: SocketAddr, ephemeral: EphemeralKeypair) -> Self {
        Self {
            peer_addr,
            role: Role::Responder,
            state: SessionState::Established,
            session_ecdh_keypair: Some(ephemeral),
            remote_public_key: None,
            tx_key: SymmetricKey::default(),
            rx_key: SymmetricKey::default(),
            session_secret: [0u8; 32],
            session_secret_verifier: [0u8; 32],
            cookie: Vec::new(),
            seen_peer_data: false,
        }
    }

    /// §3: wipe the ephemeral keypair, master secret, verifier, and cookie
    /// buffer. Called once the handshake completes or fails (initiator) or
    /// on first inbound DATA (responder).
    pub fn scrub_handshake_material(&mut self) {
        self.session_ecdh_keypair = None;
        self.session_secret.zeroize();
        self.session_secret_verifier.zeroize();
        self.cookie.zeroize();
        self.cookie.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.scrub_handshake_material();
        self.tx_key.zeroize();
        self.rx_key.zeroize();
    }
}
