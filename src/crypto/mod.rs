//! Whole-file reversible transforms.
//!
//! A save file on disk is the plaintext container passed through a
//! [`Transform`]. Every transform here is length-preserving and is its own
//! inverse: applying it to ciphertext yields plaintext and vice versa.
//!
//! Key derivation for [`KeystreamTransform`]:
//! Argon2id(password, salt) → 32-byte key → keyed BLAKE3 XOF keystream.

use argon2::{Argon2, Algorithm, Version, Params};
use thiserror::Error;

/// Byte length of a derived keystream key.
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Transform key must not be empty")]
    EmptyKey,
    #[error("Salt is {len} bytes, need at least 8")]
    SaltTooShort { len: usize },
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Same-length, self-inverse byte transform applied to a whole file.
pub trait Transform: Send + Sync {
    fn apply_in_place(&self, data: &mut [u8]);

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply_in_place(&mut out);
        out
    }
}

/// Identity transform for files stored in the clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransform;

impl Transform for NoTransform {
    fn apply_in_place(&self, _: &mut [u8]) {}
}

/// Repeating-key XOR.
#[derive(Debug, Clone)]
pub struct XorTransform {
    key: Vec<u8>,
}

impl XorTransform {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        Ok(Self { key })
    }
}

impl Transform for XorTransform {
    fn apply_in_place(&self, data: &mut [u8]) {
        for (byte, k) in data.iter_mut().zip(self.key.iter().cycle()) {
            *byte ^= k;
        }
    }
}

/// XOR against a keyed BLAKE3 extendable-output keystream.
///
/// The keystream depends only on the key, so two applications cancel out.
#[derive(Clone)]
pub struct KeystreamTransform {
    key: [u8; KEY_LEN],
}

impl KeystreamTransform {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Derive the key from a password with Argon2id.
    pub fn from_password(password: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::new(derive_key(password, salt)?))
    }
}

impl std::fmt::Debug for KeystreamTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystreamTransform").finish_non_exhaustive()
    }
}

impl Transform for KeystreamTransform {
    fn apply_in_place(&self, data: &mut [u8]) {
        let mut stream = blake3::Hasher::new_keyed(&self.key).finalize_xof();
        let mut pad = [0u8; 64];
        for chunk in data.chunks_mut(pad.len()) {
            stream.fill(&mut pad[..chunk.len()]);
            for (byte, k) in chunk.iter_mut().zip(pad.iter()) {
                *byte ^= k;
            }
        }
    }
}

/// Shortest salt accepted by [`derive_key`].
pub const MIN_SALT_LEN: usize = 8;

const KDF_MEMORY_KIB: u32 = 19 * 1024;
const KDF_PASSES: u32 = 2;

fn kdf() -> Result<Argon2<'static>, CryptoError> {
    Params::new(KDF_MEMORY_KIB, KDF_PASSES, 1, Some(KEY_LEN))
        .map(|params| Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Stretch `password` into a [`KEY_LEN`]-byte keystream key with Argon2id.
pub fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::SaltTooShort { len: salt.len() });
    }
    let mut key = [0u8; KEY_LEN];
    kdf()?
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0u8..=255).cycle().take(1000).collect()
    }

    #[test]
    fn xor_is_involution() {
        let t = XorTransform::new(b"secret".to_vec()).unwrap();
        let data = sample();
        let enc = t.apply(&data);
        assert_ne!(enc, data);
        assert_eq!(enc.len(), data.len());
        assert_eq!(t.apply(&enc), data);
    }

    #[test]
    fn xor_rejects_empty_key() {
        assert!(matches!(XorTransform::new(Vec::new()), Err(CryptoError::EmptyKey)));
    }

    #[test]
    fn keystream_is_involution_across_chunk_boundaries() {
        let t = KeystreamTransform::new([9u8; KEY_LEN]);
        let full = sample();
        for len in [0usize, 1, 63, 64, 65, 1000] {
            let data = &full[..len];
            let enc = t.apply(data);
            assert_eq!(enc.len(), len);
            assert_eq!(t.apply(&enc), data);
        }
    }

    #[test]
    fn keystream_depends_on_key() {
        let data = sample();
        let a = KeystreamTransform::new([1u8; KEY_LEN]).apply(&data);
        let b = KeystreamTransform::new([2u8; KEY_LEN]).apply(&data);
        assert_ne!(a, b);
    }

    #[test]
    fn no_transform_is_identity() {
        let data = sample();
        assert_eq!(NoTransform.apply(&data), data);
    }

    #[test]
    fn derive_key_is_deterministic() {
        let a = derive_key("hunter2", b"paysave-salt").unwrap();
        let b = derive_key("hunter2", b"paysave-salt").unwrap();
        let c = derive_key("hunter3", b"paysave-salt").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn derive_key_rejects_short_salt() {
        assert!(matches!(derive_key("pw", b"short"), Err(CryptoError::SaltTooShort { len: 5 })));
        assert!(derive_key("pw", &[0u8; MIN_SALT_LEN]).is_ok());
    }

    #[test]
    fn keystream_from_password() {
        let salt = b"save098-salt";
        let a = KeystreamTransform::from_password("hunter2", salt).unwrap();
        let b = KeystreamTransform::from_password("hunter2", salt).unwrap();
        let c = KeystreamTransform::from_password("hunter3", salt).unwrap();

        let data = sample();
        let enc = a.apply(&data);
        assert_ne!(enc, data);
        assert_eq!(b.apply(&enc), data);
        assert_ne!(c.apply(&data), enc);
        assert!(matches!(
            KeystreamTransform::from_password("hunter2", b"salt"),
            Err(CryptoError::SaltTooShort { len: 4 })
        ));
    }
}
