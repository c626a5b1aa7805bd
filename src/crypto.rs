//! SCRAM-SHA-1 key schedule primitives, built entirely on `ring`.

use std::num::NonZeroU32;

use ring::{constant_time, digest, hmac, pbkdf2};

use crate::error::{Error, Result};

/// Length in bytes of a SHA-1 digest, HMAC-SHA-1 tag, and every SCRAM-SHA-1 key.
pub const KEY_LENGTH: usize = 20;

/// `PBKDF2-HMAC-SHA1(password, salt, iterations, dkLen = 20)`.
pub fn salted_password(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; KEY_LENGTH]> {
    let iterations =
        NonZeroU32::new(iterations).ok_or_else(|| Error::crypto("iteration count must be positive"))?;
    let mut out = [0u8; KEY_LENGTH];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA1, iterations, salt, password, &mut out);
    Ok(out)
}

/// `HMAC-SHA1(key, data)`.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; KEY_LENGTH] {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    let tag = hmac::sign(&key, data);
    let mut out = [0u8; KEY_LENGTH];
    out.copy_from_slice(tag.as_ref());
    out
}

/// `SHA1(data)`.
pub fn sha1(data: &[u8]) -> [u8; KEY_LENGTH] {
    let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data);
    let mut out = [0u8; KEY_LENGTH];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Byte-wise XOR of two equal-length buffers.
pub fn xor(a: &[u8; KEY_LENGTH], b: &[u8; KEY_LENGTH]) -> [u8; KEY_LENGTH] {
    let mut out = [0u8; KEY_LENGTH];
    for i in 0..KEY_LENGTH {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Constant-time equality, required whenever comparing a value derived from a
/// secret (proof, server signature) against an attacker-influenced input.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}
