//! High-level [`SaveFormat`] API — the primary embedding surface.
//!
//! ```no_run
//! use paysave::{SaveFormat, LoadOptions, SaveOptions};
//! use paysave::crypto::XorTransform;
//!
//! let format = SaveFormat::with_transform(XorTransform::new(b"key".to_vec())?);
//! let mut save = format.load("save098.sav", &LoadOptions::default())?;
//! save.table_mut().insert("money", 1_000_000);
//! format.save_in_place(&save, &SaveOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::block::{self, Block, BlockCheck};
use crate::codec::{PayloadCodec, TaggedCodec};
use crate::crypto::Transform;
use crate::digest::{IntegrityHasher, Md5Hasher, DIGEST_LEN};
use crate::error::{SaveError, Section};
use crate::savefile::{
    GameData, IntegrityPolicy, IntegrityWarning, LoadOptions, SaveFile, SaveOptions,
    PADDING_LEN, SAVE_VERSION, TRAILER_LEN,
};
use crate::scan::{self, ScanReport};

/// The external collaborators a save file is read and written with.
pub struct SaveFormat {
    hasher:    Box<dyn IntegrityHasher>,
    transform: Box<dyn Transform>,
    codec:     Box<dyn PayloadCodec>,
}

impl SaveFormat {
    pub fn new(
        hasher:    impl IntegrityHasher + 'static,
        transform: impl Transform + 'static,
        codec:     impl PayloadCodec + 'static,
    ) -> Self {
        Self {
            hasher:    Box::new(hasher),
            transform: Box::new(transform),
            codec:     Box::new(codec),
        }
    }

    /// MD5 digests and the tagged payload codec around `transform`.
    pub fn with_transform(transform: impl Transform + 'static) -> Self {
        Self::new(Md5Hasher, transform, TaggedCodec)
    }

    pub fn hasher(&self) -> &dyn IntegrityHasher { self.hasher.as_ref() }

    // ── Load ─────────────────────────────────────────────────────────────────

    pub fn load<P: AsRef<Path>>(&self, path: P, opts: &LoadOptions) -> Result<SaveFile, SaveError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut save = self.decode(&bytes, opts)?;
        save.set_path(path);
        Ok(save)
    }

    /// Parse a complete file image. Nothing is returned unless every block
    /// and the payload decode.
    pub fn decode(&self, bytes: &[u8], opts: &LoadOptions) -> Result<SaveFile, SaveError> {
        let plain;
        let bytes = if opts.decrypt {
            plain = self.transform.apply(bytes);
            plain.as_slice()
        } else {
            bytes
        };

        let mut cur = Cursor::new(bytes);
        block::ensure_remaining(&cur, Section::Version, 4)?;
        let found = cur.read_u32::<LittleEndian>()?;
        if found != SAVE_VERSION {
            return Err(SaveError::UnsupportedVersion { found });
        }

        let mut warnings = Vec::new();
        let header    = self.read_block(&mut cur, Section::Header,   opts, &mut warnings)?;
        let game_data = self.read_block(&mut cur, Section::GameData, opts, &mut warnings)?;
        let footer    = self.read_block(&mut cur, Section::Footer,   opts, &mut warnings)?;

        let footer_end = cur.position() as usize;
        self.check_trailer(bytes, footer_end, opts, &mut warnings)?;

        let table = self.codec.decode(&game_data.data)?;
        debug!(entries = table.len(), bytes = game_data.data.len(), "decoded game data");

        Ok(SaveFile {
            path: None,
            header,
            game_data: GameData {
                version: game_data.version,
                table,
                raw:     Some(game_data.data),
            },
            footer,
            warnings,
        })
    }

    fn read_block(
        &self,
        cur:      &mut Cursor<&[u8]>,
        section:  Section,
        opts:     &LoadOptions,
        warnings: &mut Vec<IntegrityWarning>,
    ) -> Result<Block, SaveError> {
        let offset = cur.position();
        let (block, check) = Block::read(cur, self.hasher.as_ref(), section)?;
        debug!(%section, offset, version = block.version, len = block.data.len(), "read block");
        apply_policy(section, check, opts.integrity, warnings)?;
        Ok(block)
    }

    /// Validate the padding and file digest that follow the footer.
    fn check_trailer(
        &self,
        bytes:      &[u8],
        footer_end: usize,
        opts:       &LoadOptions,
        warnings:   &mut Vec<IntegrityWarning>,
    ) -> Result<(), SaveError> {
        let trailer = &bytes[footer_end..];
        if trailer.len() != TRAILER_LEN {
            if opts.strict_trailer {
                return Err(SaveError::TrailingData { expected: TRAILER_LEN, found: trailer.len() });
            }
            if trailer.len() < TRAILER_LEN {
                warn!(found = trailer.len(), "short trailer; file digest not checked");
                return Ok(());
            }
        }

        let digest_at = footer_end + PADDING_LEN;
        if bytes[footer_end..digest_at].iter().any(|&b| b != 0) {
            warn!("non-zero padding after footer ignored; it is rewritten as zeros");
        }
        if !opts.verify_file_digest {
            return Ok(());
        }

        let mut stored = [0u8; DIGEST_LEN];
        stored.copy_from_slice(&bytes[digest_at..digest_at + DIGEST_LEN]);
        let check = BlockCheck { stored, computed: self.hasher.digest(&bytes[..digest_at]) };
        apply_policy(Section::File, check, opts.integrity, warnings)
    }

    // ── Save ─────────────────────────────────────────────────────────────────

    /// Assemble the complete file image in memory.
    pub fn encode(&self, save: &SaveFile, opts: &SaveOptions) -> Result<Vec<u8>, SaveError> {
        let payload = match &save.game_data.raw {
            Some(raw) => raw.clone(),
            None => self.codec.encode(&save.game_data.table).map_err(SaveError::PayloadEncode)?,
        };
        let game_data = Block::new(save.game_data.version, payload);

        let mut out = Vec::with_capacity(
            4 + save.header.encoded_len() + game_data.encoded_len()
                + save.footer.encoded_len() + TRAILER_LEN,
        );
        out.write_u32::<LittleEndian>(SAVE_VERSION)?;
        save.header.write(&mut out, self.hasher.as_ref())?;
        game_data.write(&mut out, self.hasher.as_ref())?;
        save.footer.write(&mut out, self.hasher.as_ref())?;
        out.write_all(&[0u8; PADDING_LEN])?;
        let file_digest = self.hasher.digest(&out);
        out.write_all(&file_digest)?;
        debug!(len = out.len(), encrypt = opts.encrypt, "encoded save file");

        if opts.encrypt {
            self.transform.apply_in_place(&mut out);
        }
        Ok(out)
    }

    /// Encode and write to `path`. The destination is replaced atomically:
    /// the image goes to a temporary file beside it which is then renamed.
    pub fn save<P: AsRef<Path>>(&self, save: &SaveFile, path: P, opts: &SaveOptions) -> Result<(), SaveError> {
        let path = path.as_ref();
        let bytes = self.encode(save, opts)?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        // The temp file is created 0600; keep an existing destination's mode.
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SaveError::Io(e.error))?;
        debug!(path = %path.display(), len = bytes.len(), "saved");
        Ok(())
    }

    /// Write back to the path the file was loaded from.
    pub fn save_in_place(&self, save: &SaveFile, opts: &SaveOptions) -> Result<(), SaveError> {
        let path = save.path().ok_or(SaveError::NoPath)?;
        self.save(save, path, opts)
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Describe the block layout of a file image without decoding the payload.
    pub fn inspect(&self, bytes: &[u8], decrypt: bool) -> Result<ScanReport, SaveError> {
        if decrypt {
            scan::scan(&self.transform.apply(bytes), self.hasher.as_ref())
        } else {
            scan::scan(bytes, self.hasher.as_ref())
        }
    }
}

fn apply_policy(
    section:  Section,
    check:    BlockCheck,
    policy:   IntegrityPolicy,
    warnings: &mut Vec<IntegrityWarning>,
) -> Result<(), SaveError> {
    if check.is_intact() {
        return Ok(());
    }
    match policy {
        IntegrityPolicy::Strict => Err(SaveError::Integrity {
            section,
            expected: hex::encode(check.stored),
            actual:   hex::encode(check.computed),
        }),
        IntegrityPolicy::Lenient => {
            let warning = IntegrityWarning { section, stored: check.stored, computed: check.computed };
            warn!(%warning, "accepting data despite digest mismatch");
            warnings.push(warning);
            Ok(())
        }
    }
}
