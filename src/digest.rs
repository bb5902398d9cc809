//! 16-byte integrity digests.
//!
//! The same hasher covers every block's `data` region and the whole
//! assembled file (everything before the trailing digest field).

use md5::{Digest as _, Md5};

/// Byte length of every digest stored in a save file.
pub const DIGEST_LEN: usize = 16;

pub type Digest = [u8; DIGEST_LEN];

/// Deterministic 16-byte hash over an arbitrary byte sequence.
pub trait IntegrityHasher: Send + Sync {
    fn digest(&self, data: &[u8]) -> Digest;

    /// Human-readable name (diagnostics only).
    fn name(&self) -> &'static str;
}

/// MD5, the digest the format was originally written with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hasher;

impl IntegrityHasher for Md5Hasher {
    fn digest(&self, data: &[u8]) -> Digest {
        Md5::digest(data).into()
    }

    fn name(&self) -> &'static str { "md5" }
}

/// First 16 bytes of the BLAKE3 extendable output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl IntegrityHasher for Blake3Hasher {
    fn digest(&self, data: &[u8]) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        blake3::Hasher::new()
            .update(data)
            .finalize_xof()
            .fill(&mut out);
        out
    }

    fn name(&self) -> &'static str { "blake3-128" }
}
