/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! SRP-6a helper: ephemeral key generation, the password authentication
//! key derivation, and device verifier generation. Grounded on the fixed
//! 3072-bit RFC 5054 / RFC 3526 "Group 15" safe prime with generator 2.

use crate::crypto::{hkdf_16, pad_hex, pad_to_length, random_bytes, random_device_password, sha256};
use crate::error::*;
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::{Num, Zero};
use zeroize::Zeroize;

const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC7",
    "4020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14",
    "374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B",
    "7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163",
    "BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208",
    "552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E",
    "36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF69",
    "55817183995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFF",
    "FFFFFFFF",
);

lazy_static! {
    static ref N: BigUint = BigUint::from_str_radix(N_HEX, 16).expect("valid hex constant");
    static ref G: BigUint = BigUint::from(2u32);
    /// k = H( PAD(N) || PAD(g) )
    static ref K: BigUint = {
        let n_bytes = N.to_bytes_be().len();
        let digest = sha256(&[
            &pad_to_length(&N.to_bytes_be(), n_bytes),
            &pad_to_length(&G.to_bytes_be(), n_bytes),
        ]);
        BigUint::from_bytes_be(&digest)
    };
}

fn n_byte_len() -> usize {
    N.to_bytes_be().len()
}

fn pad(value: &BigUint) -> Vec<u8> {
    pad_to_length(&value.to_bytes_be(), n_byte_len())
}

/// The client's ephemeral SRP key pair: secret scalar `a` and public value
/// `A = g^a mod N`.
pub struct Ephemeral {
    pub secret: BigUint,
    pub public: BigUint,
}

/// Sample a random ephemeral pair, resampling if `A mod N == 0` (property 4
/// of the testable properties).
pub fn generate_ephemeral() -> Ephemeral {
    loop {
        let a = BigUint::from_bytes_be(&random_bytes(128));
        let a = &a % &*N;
        let big_a = G.modpow(&a, &N);
        if big_a.is_zero() {
            continue;
        }
        return Ephemeral { secret: a, public: big_a };
    }
}

pub fn public_value_hex(e: &Ephemeral) -> String {
    pad_hex(&e.public.to_bytes_be())
}

/// Derived shared secret and the 16-byte HKDF key used as the HMAC MAC key
/// for the client's PASSWORD_CLAIM_SIGNATURE.
pub struct PasswordAuthenticationKey {
    pub mac_key: [u8; 16],
    pub u: BigUint,
}

impl Drop for PasswordAuthenticationKey {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

/// username_for_password is either the real username (user SRP) or the
/// device group key (device SRP); password_for_password is either the
/// account password or the cached device random password.
#[allow(clippy::too_many_arguments)]
pub fn get_password_authentication_key(
    pool_short_id: &str,
    username_for_password: &str,
    password_for_password: &str,
    ephemeral: &Ephemeral,
    server_b_hex: &str,
    salt_hex: &str,
) -> Result<PasswordAuthenticationKey> {
    let b = BigUint::from_str_radix(server_b_hex, 16)
        .map_err(|_| ErrorKind::CryptoInvariant("SRP_B is not valid hex"))?;
    if (&b % &*N).is_zero() {
        return Err(ErrorKind::CryptoInvariant("SRP_B mod N is zero").into());
    }

    let u_digest = sha256(&[&pad(&ephemeral.public), &pad(&b)]);
    let u = BigUint::from_bytes_be(&u_digest);
    if u.is_zero() {
        return Err(ErrorKind::CryptoInvariant("u is zero").into());
    }

    let salt = hex::decode(salt_hex).map_err(ErrorKind::from)?;
    let username_password = sha256(&[
        format!("{}:{}:{}", pool_short_id, username_for_password, password_for_password).as_bytes(),
    ]);
    let x_digest = sha256(&[&salt, &username_password]);
    let x = BigUint::from_bytes_be(&x_digest);

    // S = (B - k*g^x) ^ (a + u*x) mod N
    let g_pow_x = G.modpow(&x, &N);
    let k_g_pow_x = (&*K * &g_pow_x) % &*N;
    // modular subtraction, keeping the intermediate non-negative
    let base = ((&b + &*N) - &k_g_pow_x) % &*N;
    let exponent = &ephemeral.secret + (&u * &x);
    let s = base.modpow(&exponent, &N);

    let mac_key = hkdf_16(&pad(&u), &pad(&s))?;
    Ok(PasswordAuthenticationKey { mac_key, u })
}

/// New-device verifier material: (salt, verifier, random password). The
/// random password must be cached by the caller for later device SRP.
pub struct DeviceVerifier {
    pub salt_hex: String,
    pub verifier_hex: String,
    pub random_password: String,
}

pub fn generate_hash_device(device_group_key: &str, device_key: &str) -> DeviceVerifier {
    let random_password = random_device_password();
    let salt = random_bytes(16);
    let combined = format!("{}{}:{}", device_group_key, device_key, random_password);
    let x_digest = sha256(&[&salt, combined.as_bytes()]);
    let x = BigUint::from_bytes_be(&x_digest);
    let verifier = G.modpow(&x, &N);
    DeviceVerifier {
        salt_hex: pad_hex(&salt),
        verifier_hex: pad_hex(&verifier.to_bytes_be()),
        random_password,
    }
}
