//! The opaque primitive interfaces §6 of the design calls out: random bytes,
//! scrubbing, constant-time compare, keyed MAC, bulk stream cipher, ECDH and
//! its output validation, and session-key expansion.
//!
//! Concrete choices: Blake2s keyed-MAC for both the MAC and the HKDF-style
//! expansion, ChaCha20 as the bulk stream cipher, X25519 for ECDH. These are
//! the same family RustCrypto crates the WireGuard-style handshake this
//! crate's structure is modeled on already depends on; only the construction
//! around them (encrypt-then-MAC with independent keys, rather than a single
//! combined AEAD) differs, per the wire format this crate implements.

use blake2::digest::consts::U32;
use blake2::digest::generic_array::GenericArray;
use blake2::digest::Mac as _;
use blake2::{Blake2s256, Blake2sMac};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key as ChaChaKey, Nonce as ChaChaNonce};
use hmac::SimpleHmac;
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::CryptoError;

pub const MAC_KEY_LEN: usize = 32;
pub const MAC_DIGEST_LEN: usize = 32;
pub const BULK_KEY_LEN: usize = 32;
pub const BULK_IV_LEN: usize = 12;
pub const ECDH_PUBLIC_KEY_LEN: usize = 32;
pub const ECDH_SECRET_LEN: usize = 32;

/// A MAC digest, also used as the wire-format cookie and the ntor verifier.
pub type Mac = [u8; MAC_DIGEST_LEN];

/// A keyed-MAC key. Also used, NUL-padded, as a fixed handshake label.
#[derive(Clone, Zeroize)]
pub struct MacKey(pub [u8; MAC_KEY_LEN]);

impl Default for MacKey {
    fn default() -> Self {
        Self([0; MAC_KEY_LEN])
    }
}

/// A bulk-cipher key.
#[derive(Clone, Zeroize)]
pub struct BulkKey(pub [u8; BULK_KEY_LEN]);

impl Default for BulkKey {
    fn default() -> Self {
        Self([0; BULK_KEY_LEN])
    }
}

/// One direction's worth of traffic keys: a MAC key plus a bulk key. Used
/// both for the endpoint's intro symmetric keys and for a session's
/// `tx_key`/`rx_key`.
#[derive(Clone, Zeroize, Default)]
pub struct SymmetricKey {
    pub mac_key: MacKey,
    pub bulk_key: BulkKey,
}

/// The raw output of an X25519 scalar multiply, before validation.
#[derive(Clone, Zeroize)]
pub struct SharedSecret(pub [u8; ECDH_SECRET_LEN]);

/// Fill `out` with cryptographically strong random bytes.
pub fn rand_bytes(rng: &mut (impl RngCore + CryptoRng), out: &mut [u8]) {
    rng.fill_bytes(out);
}

/// Zero a secret value such that the write cannot be elided by the
/// optimizer. Delegates to `zeroize`, which uses a volatile write under the
/// hood for exactly this guarantee.
pub fn memwipe<Z: Zeroize + ?Sized>(val: &mut Z) {
    val.zeroize();
}

/// Constant-time equality. `true` means the buffers match.
pub fn memcmp_ct(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// Keyed MAC over the concatenation of `parts`, producing a full
/// [`MAC_DIGEST_LEN`]-byte digest.
pub fn mac(key: &MacKey, parts: &[&[u8]]) -> Mac {
    let mut m =
        Blake2sMac::<U32>::new_from_slice(&key.0).expect("MAC_KEY_LEN is a valid Blake2s key length");
    for part in parts {
        m.update(part);
    }
    m.finalize().into_bytes().into()
}

fn hmac(key: &GenericArray<u8, U32>, parts: &[&[u8]]) -> GenericArray<u8, U32> {
    use hmac::Mac as _;
    let mut h = <SimpleHmac<Blake2s256> as hmac::Mac>::new_from_slice(key)
        .expect("HMAC accepts any key length");
    for part in parts {
        h.update(part);
    }
    h.finalize().into_bytes()
}

/// RFC 5869-style HKDF-expand, keyed on an already-extracted 32-byte PRK,
/// producing `N` independent 32-byte outputs.
pub(crate) fn hkdf<const N: usize>(prk: &GenericArray<u8, U32>, info: &[&[u8]]) -> [[u8; 32]; N] {
    assert!(N <= 255);

    let mut out = [[0u8; 32]; N];
    if N == 0 {
        return out;
    }

    let t0 = hmac(prk, info);
    let mut ti = hmac(&t0, &[&[1]]);
    out[0] = ti.into();
    for i in 1..N as u8 {
        ti = hmac(&t0, &[&ti, &[i + 1]]);
        out[i as usize] = ti.into();
    }
    out
}

/// Encrypt `buf` in place with ChaCha20 under `key`/`iv`.
pub fn encrypt(buf: &mut [u8], key: &BulkKey, iv: &[u8; BULK_IV_LEN]) {
    let key = ChaChaKey::from_slice(&key.0);
    let nonce = ChaChaNonce::from_slice(iv);
    let mut cipher = ChaCha20::new(key, nonce);
    cipher.apply_keystream(buf);
}

/// Decrypt `buf` in place with ChaCha20 under `key`/`iv`. ChaCha20 is a
/// stream cipher, so this is the same operation as [`encrypt`].
pub fn decrypt(buf: &mut [u8], key: &BulkKey, iv: &[u8; BULK_IV_LEN]) {
    encrypt(buf, key, iv);
}

/// Scalar-multiply `priv_key` by `pub_key`. The result is NOT yet validated
/// — pass it through [`ecdh_validate_pubkey`] before use.
pub fn ecdh(priv_key: &StaticSecret, pub_key: &PublicKey) -> SharedSecret {
    SharedSecret(priv_key.diffie_hellman(pub_key).to_bytes())
}

/// Reject a low-order ECDH result.
///
/// Per RFC 7748 §6.1, an X25519 scalar multiply with a properly clamped
/// scalar collapses every low-order input point to the all-zero output, so
/// checking the *output* of the DH (rather than maintaining a hardcoded
/// table of known bad input points) is sufficient to detect and reject them.
pub fn ecdh_validate_pubkey(secret: &SharedSecret) -> Result<(), CryptoError> {
    if memcmp_ct(&secret.0, &[0u8; ECDH_SECRET_LEN]) {
        Err(CryptoError::InvalidPublicKey)
    } else {
        Ok(())
    }
}

/// Expand a 32-byte shared secret into two independent [`SymmetricKey`]s.
/// Which one is `tx` and which is `rx` is a decision the caller makes based
/// on its role (see the modified-ntor handshake).
pub fn derive_session_keys(shared_secret: &Mac) -> (SymmetricKey, SymmetricKey) {
    let prk = GenericArray::<u8, U32>::from(*shared_secret);
    let [a_mac, a_bulk, b_mac, b_bulk] = hkdf::<4>(&prk, &[b"lodp-ntor-1:session-keys"]);
    (
        SymmetricKey {
            mac_key: MacKey(a_mac),
            bulk_key: BulkKey(a_bulk),
        },
        SymmetricKey {
            mac_key: MacKey(b_mac),
            bulk_key: BulkKey(b_bulk),
        },
    )
}

/// Deterministically derive the "endpoint intro keys" (§3) from a long-term
/// identity public key: the well-known symmetric key pair used to encrypt
/// handshake packets before a session exists. Both the responder (from its
/// own identity) and any initiator that already knows the responder's
/// identity out of band can compute the same pair without exchanging
/// anything first.
pub fn derive_intro_keys(identity_pub: &PublicKey) -> SymmetricKey {
    let prk = GenericArray::<u8, U32>::from(*identity_pub.as_bytes());
    let [mac_key, bulk_key] = hkdf::<2>(&prk, &[b"lodp-ntor-1:intro-keys"]);
    SymmetricKey {
        mac_key: MacKey(mac_key),
        bulk_key: BulkKey(bulk_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_is_deterministic() {
        let key = MacKey([7; MAC_KEY_LEN]);
        let a = mac(&key, &[b"hello", b" world"]);
        let b = mac(&key, &[b"hello world"]);
        assert_eq!(a, b);
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = BulkKey([1; BULK_KEY_LEN]);
        let iv = [2u8; BULK_IV_LEN];
        let mut buf = *b"the quick brown fox";
        let original = buf;
        encrypt(&mut buf, &key, &iv);
        assert_ne!(&buf[..], &original[..]);
        decrypt(&mut buf, &key, &iv);
        assert_eq!(&buf[..], &original[..]);
    }

    #[test]
    fn identity_point_is_rejected() {
        let zero = SharedSecret([0; ECDH_SECRET_LEN]);
        assert!(ecdh_validate_pubkey(&zero).is_err());
        let nonzero = SharedSecret([1; ECDH_SECRET_LEN]);
        assert!(ecdh_validate_pubkey(&nonzero).is_ok());
    }

    #[test]
    fn intro_keys_are_deterministic_in_identity() {
        use x25519_dalek::{PublicKey, StaticSecret};
        let identity = StaticSecret::from([9u8; 32]);
        let pubkey = PublicKey::from(&identity);
        let a = derive_intro_keys(&pubkey);
        let b = derive_intro_keys(&pubkey);
        assert_eq!(a.mac_key.0, b.mac_key.0);
        assert_eq!(a.bulk_key.0, b.bulk_key.0);
    }

    #[test]
    fn memcmp_ct_detects_mismatch() {
        assert!(memcmp_ct(b"abc", b"abc"));
        assert!(!memcmp_ct(b"abc", b"abd"));
    }
}
