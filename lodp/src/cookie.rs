//! The DTLS-style stateless cookie (§4.3): proves peer reachability at the
//! claimed source address before the responder commits any session state.

use std::net::{IpAddr, SocketAddr};

use lodp_crypto::{mac, memcmp_ct, rand_bytes, MacKey, BULK_KEY_LEN, MAC_KEY_LEN};
use rand::rngs::StdRng;

use crate::error::LodpError;
use crate::wire::COOKIE_LEN;

const COOKIE_ROTATE_INTERVAL: u64 = 30;
const COOKIE_GRACE_WINDOW: u64 = 15;

pub struct CookieState {
    current_key: MacKey,
    prev_key: MacKey,
    rotate_time: u64,
    expire_time: u64,
}

impl CookieState {
    pub fn new(rng: &mut StdRng, now: u64) -> Self {
        let mut key = [0u8; MAC_KEY_LEN];
        rand_bytes(rng, &mut key);
        Self {
            current_key: MacKey(key),
            prev_key: MacKey([0u8; MAC_KEY_LEN]),
            rotate_time: now,
            expire_time: now,
        }
    }

    pub fn rotate(&mut self, rng: &mut StdRng, now: u64) {
        self.prev_key = self.current_key.clone();
        let mut key = [0u8; MAC_KEY_LEN];
        rand_bytes(rng, &mut key);
        self.current_key = MacKey(key);
        self.rotate_time = now;
        self.expire_time = now + COOKIE_GRACE_WINDOW;
    }

    /// The lazy rotation path: called from inside cookie generation itself,
    /// so rotation never stalls even if the host forgets its periodic tick.
    pub fn maybe_rotate(&mut self, rng: &mut StdRng, now: u64) {
        if now >= self.rotate_time + COOKIE_ROTATE_INTERVAL {
            self.rotate(rng, now);
        }
    }
}

fn addr_port_bytes(addr: SocketAddr) -> Result<([u8; 16], usize, [u8; 2]), LodpError> {
    let port = addr.port().to_be_bytes();
    match addr.ip() {
        IpAddr::V4(v4) => {
            let mut buf = [0u8; 16];
            buf[..4].copy_from_slice(&v4.octets());
            Ok((buf, 4, port))
        }
        IpAddr::V6(v6) => Ok((v6.octets(), 16, port)),
    }
}

/// `generate_cookie(prev_key_flag, endpoint, pkt, peer_addr)` from §4.3.
/// Only INIT and HANDSHAKE packets may drive this; the caller is expected
/// to uphold that (it is a programming error otherwise, not a wire-level
/// one, so this function does not re-validate packet type).
pub fn generate_cookie(
    state: &mut CookieState,
    rng: &mut StdRng,
    now: u64,
    prev_key: bool,
    peer: SocketAddr,
    intro_mac_key: &[u8; MAC_KEY_LEN],
    intro_bulk_key: &[u8; BULK_KEY_LEN],
) -> Result<[u8; COOKIE_LEN], LodpError> {
    state.maybe_rotate(rng, now);

    let (addr_bytes, addr_len, port_bytes) = addr_port_bytes(peer)?;
    let key = if prev_key { &state.prev_key } else { &state.current_key };

    Ok(mac(
        key,
        &[&addr_bytes[..addr_len], &port_bytes, intro_mac_key, intro_bulk_key],
    ))
}

/// Validate a HANDSHAKE's echoed cookie against the current key, falling
/// back to the previous key while still inside the grace window.
pub fn validate_cookie(
    state: &mut CookieState,
    rng: &mut StdRng,
    now: u64,
    received: &[u8],
    peer: SocketAddr,
    intro_mac_key: &[u8; MAC_KEY_LEN],
    intro_bulk_key: &[u8; BULK_KEY_LEN],
) -> Result<(), LodpError> {
    let current = generate_cookie(state, rng, now, false, peer, intro_mac_key, intro_bulk_key)?;
    if memcmp_ct(&current, received) {
        return Ok(());
    }

    if now <= state.expire_time {
        let prev = generate_cookie(state, rng, now, true, peer, intro_mac_key, intro_bulk_key)?;
        if memcmp_ct(&prev, received) {
            return Ok(());
        }
    }

    Err(LodpError::InvalidCookie)
}
