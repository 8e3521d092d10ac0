//! The authenticated-encryption envelope (§4.2): encrypt-then-MAC with a
//! random IV, and the matching MAC-then-decrypt on receipt.

use rand::rngs::StdRng;
use rand::RngCore;

use lodp_crypto::{decrypt, encrypt, mac, memcmp_ct, rand_bytes, SymmetricKey, BULK_IV_LEN, MAC_DIGEST_LEN};

use crate::buffer::Buffer;
use crate::error::LodpError;
use crate::wire::{MSS, PKT_TAG_LEN};

/// Encrypt `buf`'s plaintext body into its ciphertext view under `keys`,
/// after applying up to `padding` bytes of random padding (already clamped
/// by the caller against the `pre_encrypt` callback's request and the MSS).
pub fn encrypt_then_mac(
    buf: &mut Buffer,
    keys: &SymmetricKey,
    rng: &mut StdRng,
    padding: usize,
) -> Result<(), LodpError> {
    debug_assert!(buf.len > 0 && buf.len <= MSS);

    if padding > 0 {
        let start = buf.len;
        let padding = padding.min(MSS - buf.len);
        rand_bytes(rng, &mut buf.plaintext[start..start + padding]);
        buf.len += padding;
    }

    let mut iv = [0u8; BULK_IV_LEN];
    rand_bytes(rng, &mut iv);
    buf.ciphertext[MAC_DIGEST_LEN..PKT_TAG_LEN].copy_from_slice(&iv);

    buf.ciphertext[PKT_TAG_LEN..buf.len].copy_from_slice(&buf.plaintext[PKT_TAG_LEN..buf.len]);
    encrypt(&mut buf.ciphertext[PKT_TAG_LEN..buf.len], &keys.bulk_key, &iv);

    let tag = mac(&keys.mac_key, &[&buf.ciphertext[MAC_DIGEST_LEN..buf.len]]);
    buf.ciphertext[..MAC_DIGEST_LEN].copy_from_slice(&tag);

    Ok(())
}

/// Verify and decrypt a received datagram already loaded into `buf`'s
/// ciphertext view (see [`Buffer::from_wire`]). The plaintext view is only
/// ever written to after the MAC comparison succeeds.
pub fn mac_then_decrypt(buf: &mut Buffer, keys: &SymmetricKey) -> Result<(), LodpError> {
    debug_assert!(buf.len > 0);

    let expected = mac(&keys.mac_key, &[&buf.ciphertext[MAC_DIGEST_LEN..buf.len]]);
    if !memcmp_ct(&expected, &buf.ciphertext[..MAC_DIGEST_LEN]) {
        return Err(LodpError::InvalidMac);
    }

    let mut iv = [0u8; BULK_IV_LEN];
    iv.copy_from_slice(&buf.ciphertext[MAC_DIGEST_LEN..PKT_TAG_LEN]);

    buf.plaintext[PKT_TAG_LEN..buf.len].copy_from_slice(&buf.ciphertext[PKT_TAG_LEN..buf.len]);
    decrypt(&mut buf.plaintext[PKT_TAG_LEN..buf.len], &keys.bulk_key, &iv);

    Ok(())
}

/// Ask the host for padding via its `pre_encrypt` callback result, clamped
/// to what actually fits in the remaining MSS budget.
pub fn clamp_padding(requested: usize, cur_len: usize) -> usize {
    requested.min(MSS.saturating_sub(cur_len))
}

/// A source of randomness good enough for IVs and padding, seeded once at
/// endpoint construction.
pub fn seed_rng() -> StdRng {
    use rand::SeedableRng;
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    StdRng::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodp_crypto::{BulkKey, MacKey};

    fn keys() -> SymmetricKey {
        SymmetricKey {
            mac_key: MacKey([7u8; 32]),
            bulk_key: BulkKey([3u8; 32]),
        }
    }

    #[test]
    fn round_trip_preserves_body() {
        let mut rng = seed_rng();
        let keys = keys();
        let mut buf = Buffer::new();
        buf.len = PKT_TAG_LEN + 4;
        crate::wire::write_data(&mut buf.plaintext[PKT_TAG_LEN..buf.len], &[]);

        encrypt_then_mac(&mut buf, &keys, &mut rng, 0).unwrap();
        let wire = buf.wire_bytes().to_vec();

        let mut recv = Buffer::from_wire(&wire).unwrap();
        mac_then_decrypt(&mut recv, &keys).unwrap();
        assert_eq!(recv.plaintext_body(), &buf.plaintext[PKT_TAG_LEN..buf.len]);
    }

    #[test]
    fn corrupted_mac_is_rejected_without_touching_plaintext() {
        let mut rng = seed_rng();
        let keys = keys();
        let mut buf = Buffer::new();
        buf.len = PKT_TAG_LEN + 4;
        crate::wire::write_data(&mut buf.plaintext[PKT_TAG_LEN..buf.len], &[]);
        encrypt_then_mac(&mut buf, &keys, &mut rng, 0).unwrap();

        let mut wire = buf.wire_bytes().to_vec();
        wire[0] ^= 0xff;

        let mut recv = Buffer::from_wire(&wire).unwrap();
        let before = recv.plaintext.clone();
        let err = mac_then_decrypt(&mut recv, &keys).unwrap_err();
        assert_eq!(err, LodpError::InvalidMac);
        assert_eq!(recv.plaintext, before);
    }

    #[test]
    fn corrupted_ciphertext_is_rejected() {
        let mut rng = seed_rng();
        let keys = keys();
        let mut buf = Buffer::new();
        buf.len = PKT_TAG_LEN + 4;
        crate::wire::write_data(&mut buf.plaintext[PKT_TAG_LEN..buf.len], &[]);
        encrypt_then_mac(&mut buf, &keys, &mut rng, 0).unwrap();

        let mut wire = buf.wire_bytes().to_vec();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;

        let mut recv = Buffer::from_wire(&wire).unwrap();
        assert_eq!(
            mac_then_decrypt(&mut recv, &keys).unwrap_err(),
            LodpError::InvalidMac
        );
    }
}
