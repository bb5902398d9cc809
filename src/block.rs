//! Versioned, checksummed block codec.
//!
//! On-disk layout (all integers little-endian):
//!
//! ```text
//! [size:u32][version:u32][data:size-8][digest:16]
//! ```
//!
//! `size` counts the two header fields plus `data`, never the digest.
//! `digest` covers `data` only.

use std::io::{Cursor, Read, Write};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::digest::{Digest, IntegrityHasher, DIGEST_LEN};
use crate::error::{SaveError, Section};

/// Bytes of `size` + `version` at the start of every block.
pub const BLOCK_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub version: u32,
    pub data:    Vec<u8>,
}

/// Stored vs. recomputed digest of a freshly read block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCheck {
    pub stored:   Digest,
    pub computed: Digest,
}

impl BlockCheck {
    pub fn is_intact(&self) -> bool {
        self.stored == self.computed
    }
}

impl Block {
    pub fn new(version: u32, data: Vec<u8>) -> Self {
        Self { version, data }
    }

    /// Value of the `size` field this block encodes with.
    pub fn size_field(&self) -> Result<u32, SaveError> {
        self.data.len()
            .checked_add(BLOCK_HEADER_SIZE)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(SaveError::BlockTooLarge { len: self.data.len() })
    }

    /// Total bytes this block occupies on disk.
    pub fn encoded_len(&self) -> usize {
        BLOCK_HEADER_SIZE + self.data.len() + DIGEST_LEN
    }

    /// Write `size`, `version`, `data` and a freshly computed digest.
    pub fn write<W: Write>(&self, mut writer: W, hasher: &dyn IntegrityHasher) -> Result<(), SaveError> {
        let size = self.size_field()?;
        writer.write_u32::<LittleEndian>(size)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_all(&self.data)?;
        writer.write_all(&hasher.digest(&self.data))?;
        Ok(())
    }

    pub fn to_bytes(&self, hasher: &dyn IntegrityHasher) -> Result<Vec<u8>, SaveError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write(&mut out, hasher)?;
        Ok(out)
    }

    /// Read one block starting at the cursor position.
    ///
    /// Never fails on a digest mismatch; the caller decides what a bad
    /// [`BlockCheck`] means.
    pub fn read(
        cur:     &mut Cursor<&[u8]>,
        hasher:  &dyn IntegrityHasher,
        section: Section,
    ) -> Result<(Self, BlockCheck), SaveError> {
        let (size, version) = read_fields(cur, section)?;
        let data_len = size as usize - BLOCK_HEADER_SIZE;
        ensure_remaining(cur, section, data_len.saturating_add(DIGEST_LEN))?;

        let mut data = vec![0u8; data_len];
        cur.read_exact(&mut data)?;
        let mut stored = [0u8; DIGEST_LEN];
        cur.read_exact(&mut stored)?;

        let computed = hasher.digest(&data);
        Ok((Self { version, data }, BlockCheck { stored, computed }))
    }
}

/// Read and validate the `size`/`version` pair, leaving the cursor on `data`.
pub(crate) fn read_fields(cur: &mut Cursor<&[u8]>, section: Section) -> Result<(u32, u32), SaveError> {
    ensure_remaining(cur, section, BLOCK_HEADER_SIZE)?;
    let size = cur.read_u32::<LittleEndian>()?;
    let version = cur.read_u32::<LittleEndian>()?;
    if (size as usize) < BLOCK_HEADER_SIZE {
        return Err(SaveError::InvalidBlockSize { section, size });
    }
    Ok((size, version))
}

pub(crate) fn remaining(cur: &Cursor<&[u8]>) -> usize {
    cur.get_ref().len().saturating_sub(cur.position() as usize)
}

pub(crate) fn ensure_remaining(cur: &Cursor<&[u8]>, section: Section, needed: usize) -> Result<(), SaveError> {
    let available = remaining(cur);
    if needed > available {
        return Err(SaveError::TruncatedInput {
            section,
            needed:    needed as u64,
            available: available as u64,
        });
    }
    Ok(())
}
