/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Low-level hashing, HMAC, HKDF and random helpers shared by the SRP engine.

use crate::error::*;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Info bytes bound into the HKDF expand step. Distinct per deployment is not
/// required for security (HKDF's info is public), but it keeps the derived
/// key space separate from other uses of the same secret.
const HKDF_INFO: &[u8] = b"srp-identity-client derived key";

pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| ErrorKind::CryptoInvariant("bad HMAC key length"))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// HKDF-SHA256 extract-and-expand, truncated to 16 bytes. This mirrors the
/// classic "computehkdf" construction: PRK = HMAC(salt, ikm), OKM =
/// HMAC(PRK, info || 0x01)[..16], which `Hkdf::expand` already implements
/// for a single 16-byte block.
pub fn hkdf_16(salt: &[u8], ikm: &[u8]) -> Result<[u8; 16]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; 16];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|_| ErrorKind::CryptoInvariant("HKDF expand failed"))?;
    Ok(okm)
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Random password used for device registration: 40 URL-safe base64 characters.
pub fn random_device_password() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    let raw = random_bytes(30);
    let mut s = URL_SAFE_NO_PAD.encode(raw);
    s.truncate(40);
    s
}

/// Encode bytes as even-length lowercase hex, prepending `"00"` when the
/// high nibble of the first byte would otherwise make the value ambiguous
/// with a sign-extended big integer. This is the "pad-hex" behaviour the
/// wire protocol relies on, distinct from the fixed-width `pad_to_length`
/// used when composing hash inputs.
pub fn pad_hex(bytes: &[u8]) -> String {
    let hex = hex::encode(bytes);
    if hex.is_empty() {
        return "00".to_string();
    }
    let first_nibble = u8::from_str_radix(&hex[0..1], 16).expect("hex::encode yields valid hex");
    if first_nibble >= 8 {
        format!("00{}", hex)
    } else {
        hex
    }
}

/// Zero-pad `bytes` on the left to exactly `target_len` bytes. Used to build
/// fixed-width hash inputs (`PAD(x)` in the SRP derivation), not wire hex.
pub fn pad_to_length(bytes: &[u8], target_len: usize) -> Vec<u8> {
    if bytes.len() >= target_len {
        return bytes[bytes.len() - target_len..].to_vec();
    }
    let mut padded = vec![0u8; target_len - bytes.len()];
    padded.extend_from_slice(bytes);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_hex_adds_leading_zero_byte_for_high_nibble() {
        // 0xff... encodes with a high first nibble; must gain a "00" prefix.
        assert_eq!(pad_hex(&[0xff, 0x01]), "00ff01");
    }

    #[test]
    fn pad_hex_leaves_low_nibble_untouched() {
        assert_eq!(pad_hex(&[0x7f, 0x01]), "7f01");
    }

    #[test]
    fn pad_hex_empty_input_is_zero() {
        assert_eq!(pad_hex(&[]), "00");
    }

    #[test]
    fn pad_to_length_left_pads_with_zero_bytes() {
        assert_eq!(pad_to_length(&[1, 2, 3], 5), vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn pad_to_length_truncates_from_the_left_when_too_long() {
        assert_eq!(pad_to_length(&[1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
    }

    #[test]
    fn hkdf_16_is_deterministic_for_the_same_inputs() {
        let a = hkdf_16(b"salt", b"ikm").unwrap();
        let b = hkdf_16(b"salt", b"ikm").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hmac_sha256_matches_known_vector() {
        // RFC 4231 test case 1.
        let key = [0x0b; 20];
        let data = b"Hi There";
        let mac = hmac_sha256(&key, data).unwrap();
        assert_eq!(
            hex::encode(mac),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff"
        );
    }
}
