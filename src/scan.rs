//! Block layout scanner — report where every block sits and whether its
//! digest holds, without decoding the game-data payload.
//!
//! # How it works
//!
//! 1. **Offset pass** (sequential): each block's start depends on the
//!    previous block's declared `size`, so offsets are found in one walk.
//! 2. **Digest pass**: once every block's range is known the digests are
//!    independent. With the `parallel` feature they are computed with Rayon.
//!
//! Unlike a load, a version mismatch or a bad digest does not stop the
//! scan; both are reported. Only a block running past the end of the input
//! is an error, since nothing after it can be located.

use std::io::Cursor;

use crate::block::{self, BLOCK_HEADER_SIZE};
use crate::digest::{Digest, IntegrityHasher, DIGEST_LEN};
use crate::error::{SaveError, Section};
use crate::savefile::{PADDING_LEN, SAVE_VERSION, TRAILER_LEN};

const BLOCK_SECTIONS: [Section; 3] = [Section::Header, Section::GameData, Section::Footer];

// ── Types ─────────────────────────────────────────────────────────────────────

/// One block's position and digest verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub section:  Section,
    /// Absolute offset of the `size` field.
    pub offset:   u64,
    pub size:     u32,
    pub version:  u32,
    pub stored:   Digest,
    pub computed: Digest,
}

impl BlockLayout {
    pub fn data_len(&self) -> usize {
        self.size as usize - BLOCK_HEADER_SIZE
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + BLOCK_HEADER_SIZE as u64
    }

    pub fn is_intact(&self) -> bool {
        self.stored == self.computed
    }
}

/// Padding and file digest found after the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerLayout {
    pub offset:       u64,
    pub padding_zero: bool,
    pub stored:       Digest,
    pub computed:     Digest,
}

impl TrailerLayout {
    pub fn is_intact(&self) -> bool {
        self.stored == self.computed
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub format_version: u32,
    pub blocks:         Vec<BlockLayout>,
    /// `None` when fewer than padding + digest bytes follow the footer.
    pub trailer:        Option<TrailerLayout>,
    /// Bytes after the footer beyond padding + digest (or short of it).
    pub extra_bytes:    isize,
}

impl ScanReport {
    pub fn version_supported(&self) -> bool {
        self.format_version == SAVE_VERSION
    }

    /// Every block digest and the file digest hold, and the version is supported.
    pub fn is_clean(&self) -> bool {
        self.version_supported()
            && self.blocks.iter().all(BlockLayout::is_intact)
            && self.trailer.as_ref().is_some_and(TrailerLayout::is_intact)
            && self.extra_bytes == 0
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        let intact = self.blocks.iter().filter(|b| b.is_intact()).count();
        format!(
            "version {}{}, {}/{} blocks intact, file digest {}",
            self.format_version,
            if self.version_supported() { "" } else { " (unsupported)" },
            intact,
            self.blocks.len(),
            match &self.trailer {
                Some(t) if t.is_intact() => "ok",
                Some(_)                  => "MISMATCH",
                None                     => "missing",
            },
        )
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Scan a plaintext file image.
pub fn scan(bytes: &[u8], hasher: &dyn IntegrityHasher) -> Result<ScanReport, SaveError> {
    let mut cur = Cursor::new(bytes);
    block::ensure_remaining(&cur, Section::Version, 4)?;
    let format_version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    cur.set_position(4);

    // Offset pass.
    let mut spans = Vec::with_capacity(BLOCK_SECTIONS.len());
    for section in BLOCK_SECTIONS {
        let offset = cur.position();
        let (size, version) = block::read_fields(&mut cur, section)?;
        let data_len = size as usize - BLOCK_HEADER_SIZE;
        block::ensure_remaining(&cur, section, data_len.saturating_add(DIGEST_LEN))?;
        cur.set_position(offset + size as u64 + DIGEST_LEN as u64);
        spans.push((section, offset, size, version));
    }
    let footer_end = cur.position() as usize;

    // Digest pass.
    let blocks = digest_blocks(bytes, &spans, hasher);

    let tail = bytes.len() - footer_end;
    let trailer = (tail >= TRAILER_LEN).then(|| {
        let digest_at = footer_end + PADDING_LEN;
        let mut stored = [0u8; DIGEST_LEN];
        stored.copy_from_slice(&bytes[digest_at..digest_at + DIGEST_LEN]);
        TrailerLayout {
            offset:       footer_end as u64,
            padding_zero: bytes[footer_end..digest_at].iter().all(|&b| b == 0),
            stored,
            computed:     hasher.digest(&bytes[..digest_at]),
        }
    });

    Ok(ScanReport {
        format_version,
        blocks,
        trailer,
        extra_bytes: tail as isize - TRAILER_LEN as isize,
    })
}

fn layout(bytes: &[u8], span: &(Section, u64, u32, u32), hasher: &dyn IntegrityHasher) -> BlockLayout {
    let &(section, offset, size, version) = span;
    let start = offset as usize + BLOCK_HEADER_SIZE;
    let end = offset as usize + size as usize;
    let mut stored = [0u8; DIGEST_LEN];
    stored.copy_from_slice(&bytes[end..end + DIGEST_LEN]);
    BlockLayout {
        section,
        offset,
        size,
        version,
        stored,
        computed: hasher.digest(&bytes[start..end]),
    }
}

#[cfg(feature = "parallel")]
fn digest_blocks(
    bytes:  &[u8],
    spans:  &[(Section, u64, u32, u32)],
    hasher: &dyn IntegrityHasher,
) -> Vec<BlockLayout> {
    use rayon::prelude::*;
    spans.par_iter().map(|span| layout(bytes, span, hasher)).collect()
}

#[cfg(not(feature = "parallel"))]
fn digest_blocks(
    bytes:  &[u8],
    spans:  &[(Section, u64, u32, u32)],
    hasher: &dyn IntegrityHasher,
) -> Vec<BlockLayout> {
    spans.iter().map(|span| layout(bytes, span, hasher)).collect()
}
