//! The modified ntor handshake (spec §4.7).
//!
//! Notation, matching the spec and the original: `X`/`x` is the initiator's
//! ephemeral ECDH keypair, `Y`/`y` the responder's, `B`/`b` the responder's
//! long-term identity keypair. Both sides compute `s1 = EXP(Y, x)` /
//! `s1 = EXP(X, y)` and `s2 = EXP(B, x)` / `s2 = EXP(X, b)`, then fold
//! `s1 || s2 || B || X || Y || PROTOID` through three differently-labeled
//! MACs to get a session secret, an internal verify value, and the
//! `verifier` digest that rides in the HANDSHAKE_ACK.

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::prim::{
    ecdh, ecdh_validate_pubkey, mac, MacKey, SharedSecret, ECDH_PUBLIC_KEY_LEN, MAC_KEY_LEN,
};
use crate::{derive_session_keys, CryptoError, Mac, SymmetricKey};

const PROTOID: &[u8; 11] = b"lodp-ntor-1";
const RESPONDER: &[u8; 9] = b"Responder";

/// `label`, right-padded with zero bytes to [`MAC_KEY_LEN`]. This is how the
/// spec's three string-literal MAC keys (`ss_key`, `verify_key`, `auth_key`)
/// are turned into fixed-size keys.
fn label_key(label: &[u8]) -> MacKey {
    assert!(label.len() <= MAC_KEY_LEN);
    let mut key = [0u8; MAC_KEY_LEN];
    key[..label.len()].copy_from_slice(label);
    MacKey(key)
}

/// The two things the handshake produces besides the traffic keys: the
/// session master secret (kept only to let a retransmitted HANDSHAKE rebuild
/// an identical ACK without redoing the math) and the verifier that proves
/// possession of the long-term private key.
pub struct HandshakeOutput {
    pub session_secret: Mac,
    pub verifier: Mac,
    pub tx_key: SymmetricKey,
    pub rx_key: SymmetricKey,
}

impl Drop for HandshakeOutput {
    fn drop(&mut self) {
        self.session_secret.zeroize();
        self.verifier.zeroize();
        self.tx_key.zeroize();
        self.rx_key.zeroize();
    }
}

/// `SecretInput = s1 || s2 || B || X || Y || PROTOID`, as fixed-size
/// zeroize-on-drop scratch. Every one of these buffers is scrubbed before
/// the handshake returns, successfully or not.
struct SecretInput([u8; 32 * 2 + ECDH_PUBLIC_KEY_LEN * 3 + PROTOID.len()]);

impl Zeroize for SecretInput {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl SecretInput {
    fn build(s1: &[u8; 32], s2: &[u8; 32], b: &PublicKey, x: &PublicKey, y: &PublicKey) -> Self {
        let mut buf = [0u8; 32 * 2 + ECDH_PUBLIC_KEY_LEN * 3 + PROTOID.len()];
        let mut off = 0;
        for chunk in [
            &s1[..],
            &s2[..],
            b.as_bytes(),
            x.as_bytes(),
            y.as_bytes(),
            &PROTOID[..],
        ] {
            buf[off..off + chunk.len()].copy_from_slice(chunk);
            off += chunk.len();
        }
        Self(buf)
    }
}

struct AuthInput([u8; 32 + ECDH_PUBLIC_KEY_LEN * 3 + PROTOID.len() + RESPONDER.len()]);

impl Zeroize for AuthInput {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl AuthInput {
    fn build(verify: &Mac, b: &PublicKey, x: &PublicKey, y: &PublicKey) -> Self {
        let mut buf = [0u8; 32 + ECDH_PUBLIC_KEY_LEN * 3 + PROTOID.len() + RESPONDER.len()];
        let mut off = 0;
        for chunk in [
            &verify[..],
            b.as_bytes(),
            x.as_bytes(),
            y.as_bytes(),
            &PROTOID[..],
            &RESPONDER[..],
        ] {
            buf[off..off + chunk.len()].copy_from_slice(chunk);
            off += chunk.len();
        }
        Self(buf)
    }
}

/// Shared tail of the handshake once `s1`/`s2` have been computed and
/// validated: build `SecretInput`, derive `shared_secret`/`verify`, build
/// `AuthInput`, derive `verifier`, expand traffic keys. `s1`/`s2` are
/// consumed (zeroized) by this call.
fn finish(
    mut s1: SharedSecret,
    mut s2: SharedSecret,
    b: &PublicKey,
    x: &PublicKey,
    y: &PublicKey,
) -> (Mac, Mac) {
    let mut secret_input = SecretInput::build(&s1.0, &s2.0, b, x, y);
    s1.zeroize();
    s2.zeroize();

    let ss_key = label_key(b"lodp-ntor-1:key_extract");
    let verify_key = label_key(b"lodp-ntor-1:key_expand");
    let auth_key = label_key(b"lodp-ntor-1:mac");

    let shared_secret = mac(&ss_key, &[&secret_input.0]);
    let mut verify = mac(&verify_key, &[&secret_input.0]);
    secret_input.zeroize();

    let mut auth_input = AuthInput::build(&verify, b, x, y);
    verify.zeroize();
    let verifier = mac(&auth_key, &[&auth_input.0]);
    auth_input.zeroize();

    (shared_secret, verifier)
}

/// Run the initiator side: we know our own ephemeral `(x, big_x)`, the
/// responder's long-term public key `b_pub`, and the responder's ephemeral
/// public key `y_pub` (received in HANDSHAKE_ACK).
///
/// `s1 = EXP(Y, x)`, `s2 = EXP(B, x)`. Validation order matches the spec
/// exactly: `Y` is validated right after `s1` is computed, `B` right after
/// `s2`.
pub fn initiator_handshake(
    x: &StaticSecret,
    big_x: &PublicKey,
    b_pub: &PublicKey,
    y_pub: &PublicKey,
) -> Result<HandshakeOutput, CryptoError> {
    let s1 = ecdh(x, y_pub);
    ecdh_validate_pubkey(&s1)?;
    let s2 = ecdh(x, b_pub);
    ecdh_validate_pubkey(&s2)?;

    let (session_secret, verifier) = finish(s1, s2, b_pub, big_x, y_pub);
    let (key_a, key_b) = derive_session_keys(&session_secret);

    Ok(HandshakeOutput {
        session_secret,
        verifier,
        tx_key: key_a,
        rx_key: key_b,
    })
}

/// Run the responder side: we know our own ephemeral `(y, big_y)`, our
/// long-term identity `(b, b_pub)`, and the initiator's ephemeral public key
/// `x_pub` (received in HANDSHAKE).
///
/// `s1 = EXP(X, y)`, `s2 = EXP(X, b)`. The spec validates `X` once, right
/// after `s1`, and relies on that same validation implicitly covering `s2`
/// since both exponentiate the same point `X`.
pub fn responder_handshake(
    y: &StaticSecret,
    big_y: &PublicKey,
    b: &StaticSecret,
    b_pub: &PublicKey,
    x_pub: &PublicKey,
) -> Result<HandshakeOutput, CryptoError> {
    let s1 = ecdh(y, x_pub);
    ecdh_validate_pubkey(&s1)?;
    let s2 = ecdh(b, x_pub);

    let (session_secret, verifier) = finish(s1, s2, b_pub, x_pub, big_y);
    let (key_a, key_b) = derive_session_keys(&session_secret);

    Ok(HandshakeOutput {
        session_secret,
        verifier,
        tx_key: key_b,
        rx_key: key_a,
    })
}
