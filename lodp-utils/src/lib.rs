//! Small standalone helpers shared by the transport core that don't belong
//! in the crypto façade: a DoS-resistant keyed hasher for the session table
//! and the map type alias built on it.
//!
//! Sessions are keyed by peer [`SocketAddr`], and that key is attacker
//! controlled — anyone who can send a UDP datagram picks their own source
//! address. A `HashMap`'s default hasher is not keyed against
//! algorithmic-complexity attacks targeting a fixed seed, so the table is
//! built on [`ahash`] instead, seeded once per endpoint from strong
//! randomness.

use std::collections::HashMap;
use std::hash::BuildHasher;

use ahash::RandomState as AHashRandomState;
use rand_core::{CryptoRng, RngCore};

/// A `BuildHasher` seeded once at endpoint construction time from an RNG,
/// rather than from `ahash`'s own process-global seed. Keeping the seed
/// instance-local means two endpoints in the same process (as in tests,
/// where both ends of a handshake run in-process) don't share a hash
/// schedule, and means the seed can be drawn from the same RNG the caller
/// already trusts for key material.
#[derive(Clone)]
pub struct SessionHasher(AHashRandomState);

impl SessionHasher {
    /// Seed a fresh hasher from `rng`.
    pub fn new(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let seeds: [u64; 4] = [
            rng.next_u64(),
            rng.next_u64(),
            rng.next_u64(),
            rng.next_u64(),
        ];
        Self(AHashRandomState::with_seeds(
            seeds[0], seeds[1], seeds[2], seeds[3],
        ))
    }
}

impl BuildHasher for SessionHasher {
    type Hasher = ahash::AHasher;

    fn build_hasher(&self) -> Self::Hasher {
        self.0.build_hasher()
    }
}

/// A `HashMap` keyed by `K` (in practice, peer [`std::net::SocketAddr`]),
/// hashed with [`SessionHasher`] rather than the standard library default.
pub type SessionMap<K, V> = HashMap<K, V, SessionHasher>;

/// Build an empty [`SessionMap`], seeding its hasher from `rng`.
pub fn new_session_map<K, V>(rng: &mut (impl RngCore + CryptoRng)) -> SessionMap<K, V> {
    HashMap::with_hasher(SessionHasher::new(rng))
}
