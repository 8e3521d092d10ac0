//! A lightweight, encrypted, datagram-oriented transport.
//!
//! The wire format is DTLS-shaped: a stateless cookie round trip gates
//! session setup, a modified ntor handshake establishes per-direction
//! traffic keys, and every subsequent packet is encrypted-then-MAC'd under
//! those keys. [`Endpoint`] is the entry point — it owns the session table
//! for one local socket and exposes `on_incoming` for the host's receive
//! loop plus `connect`/`send_data`/`send_heartbeat` for the send side.

mod aead;
mod buffer;
mod clock;
mod cookie;
mod endpoint;
mod error;
mod session;
mod wire;

pub use buffer::Buffer;
pub use clock::{Clock, SystemClock, TestClock};
pub use endpoint::{Callbacks, Endpoint};
pub use error::LodpError;
pub use session::{Role, Session, SessionState};
pub use wire::{COOKIE_LEN, MSS, PKT_TAG_LEN};

pub use lodp_crypto::{PublicKey, StaticSecret};
