//! The save-file container and its load/save options.
//!
//! ```text
//! [version:u32][header block][game data block][footer block][padding:16][file digest:16]
//! ```
//!
//! The file digest covers every byte before it, padding included.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::block::Block;
use crate::digest::{Digest, DIGEST_LEN};
use crate::error::Section;
use crate::value::Table;

/// The only top-level version this crate reads or writes (retail; beta was 9).
pub const SAVE_VERSION: u32 = 10;
/// Reserved zero bytes between the footer and the file digest.
pub const PADDING_LEN: usize = 16;
/// Bytes expected after the footer block.
pub const TRAILER_LEN: usize = PADDING_LEN + DIGEST_LEN;

// ── Options ──────────────────────────────────────────────────────────────────

/// What to do when a stored digest does not match the recomputed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Fail the whole load with [`SaveError::Integrity`](crate::SaveError::Integrity).
    #[default]
    Strict,
    /// Keep the data as read and record an [`IntegrityWarning`].
    Lenient,
}

/// Configuration for loading a save file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Run the whole input through the transform before parsing.
    pub decrypt:            bool,
    pub integrity:          IntegrityPolicy,
    /// Check the trailing whole-file digest in addition to block digests.
    pub verify_file_digest: bool,
    /// Require exactly padding + digest after the footer.
    pub strict_trailer:     bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            decrypt:            true,
            integrity:          IntegrityPolicy::Strict,
            verify_file_digest: true,
            strict_trailer:     true,
        }
    }
}

impl LoadOptions {
    /// Defaults for a file stored without the transform.
    pub fn plain() -> Self {
        Self { decrypt: false, ..Self::default() }
    }

    pub fn lenient(mut self) -> Self {
        self.integrity = IntegrityPolicy::Lenient;
        self
    }
}

/// Configuration for saving a save file.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Run the assembled file through the transform before returning it.
    pub encrypt: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { encrypt: true }
    }
}

impl SaveOptions {
    pub fn plain() -> Self {
        Self { encrypt: false }
    }
}

// ── IntegrityWarning ─────────────────────────────────────────────────────────

/// A digest mismatch accepted under [`IntegrityPolicy::Lenient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub section:  Section,
    pub stored:   Digest,
    pub computed: Digest,
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} digest mismatch: stored {}, computed {}",
            self.section,
            hex::encode(self.stored),
            hex::encode(self.computed),
        )
    }
}

// ── GameData ─────────────────────────────────────────────────────────────────

/// The middle block: its version, decoded table, and the raw bytes it was
/// decoded from until the table is touched.
#[derive(Debug, Clone)]
pub(crate) struct GameData {
    pub(crate) version: u32,
    pub(crate) table:   Table,
    pub(crate) raw:     Option<Vec<u8>>,
}

// ── SaveFile ─────────────────────────────────────────────────────────────────

/// A fully decoded save file.
///
/// Only produced by a successful load or assembled whole with
/// [`SaveFile::new`]; there is no partially loaded state.
#[derive(Debug, Clone)]
pub struct SaveFile {
    pub(crate) path:      Option<PathBuf>,
    pub(crate) header:    Block,
    pub(crate) game_data: GameData,
    pub(crate) footer:    Block,
    pub(crate) warnings:  Vec<IntegrityWarning>,
}

impl SaveFile {
    /// Assemble a save file in memory. The game-data block is encoded from
    /// `table` when the file is saved.
    pub fn new(header: Block, game_data_version: u32, table: Table, footer: Block) -> Self {
        Self {
            path: None,
            header,
            game_data: GameData { version: game_data_version, table, raw: None },
            footer,
            warnings: Vec::new(),
        }
    }

    pub fn format_version(&self) -> u32 { SAVE_VERSION }

    pub fn header(&self) -> &Block { &self.header }

    pub fn footer(&self) -> &Block { &self.footer }

    pub fn game_data_version(&self) -> u32 { self.game_data.version }

    /// Raw bytes of the game-data block as loaded, if the table has not
    /// been modified since.
    pub fn game_data_raw(&self) -> Option<&[u8]> {
        self.game_data.raw.as_deref()
    }

    pub fn table(&self) -> &Table { &self.game_data.table }

    /// Mutable access to the game data. Marks the payload for re-encoding.
    pub fn table_mut(&mut self) -> &mut Table {
        self.game_data.raw = None;
        &mut self.game_data.table
    }

    pub fn set_table(&mut self, table: Table) {
        self.game_data.raw = None;
        self.game_data.table = table;
    }

    pub fn into_table(self) -> Table {
        self.game_data.table
    }

    /// Path this file was loaded from or last saved to.
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn set_path<P: AsRef<Path>>(&mut self, path: P) {
        self.path = Some(path.as_ref().to_owned());
    }

    /// Digest mismatches accepted during a lenient load.
    pub fn warnings(&self) -> &[IntegrityWarning] { &self.warnings }

    pub fn is_tainted(&self) -> bool { !self.warnings.is_empty() }
}

/// Equality of content: version, blocks and table. Path, raw cache and
/// load warnings are not compared.
impl PartialEq for SaveFile {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.footer == other.footer
            && self.game_data.version == other.game_data.version
            && self.game_data.table == other.game_data.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SaveFile {
        let table: Table = [("money", 5)].into_iter().collect();
        SaveFile::new(Block::new(1, vec![1]), 2, table, Block::new(3, vec![3]))
    }

    #[test]
    fn mutation_drops_raw_cache() {
        let mut save = sample();
        save.game_data.raw = Some(vec![0, 0, 0, 0]);
        assert!(save.game_data_raw().is_some());

        save.table_mut().insert("money", 6);
        assert!(save.game_data_raw().is_none());
    }

    #[test]
    fn equality_ignores_path_and_cache() {
        let a = sample();
        let mut b = sample();
        b.set_path("/tmp/elsewhere.sav");
        b.game_data.raw = Some(vec![9]);
        assert_eq!(a, b);

        b.set_table(Table::new());
        assert_ne!(a, b);
    }

    #[test]
    fn equality_ignores_table_order() {
        let table: Table = [("level", 100), ("money", 5)].into_iter().collect();
        let reordered: Table = [("money", 5), ("level", 100)].into_iter().collect();
        let a = SaveFile::new(Block::new(1, vec![1]), 2, table, Block::new(3, vec![3]));
        let b = SaveFile::new(Block::new(1, vec![1]), 2, reordered, Block::new(3, vec![3]));
        assert_eq!(a, b);
    }

    #[test]
    fn default_options_use_transform() {
        assert!(LoadOptions::default().decrypt);
        assert!(SaveOptions::default().encrypt);
        assert_eq!(LoadOptions::default().integrity, IntegrityPolicy::Strict);
        assert!(!LoadOptions::plain().decrypt);
        assert_eq!(LoadOptions::plain().lenient().integrity, IntegrityPolicy::Lenient);
    }

    #[test]
    fn warning_display_is_hex() {
        let w = IntegrityWarning { section: Section::Footer, stored: [0; 16], computed: [0xff; 16] };
        let text = w.to_string();
        assert!(text.starts_with("footer block digest mismatch"));
        assert!(text.contains(&"ff".repeat(16)));
    }
}
