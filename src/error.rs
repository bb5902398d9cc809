use std::fmt;
use std::io;
use thiserror::Error;

use crate::codec::PayloadError;

/// Region of a save file an error or warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Version,
    Header,
    GameData,
    Footer,
    Trailer,
    /// The whole-file digest.
    File,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Version  => "version field",
            Section::Header   => "header block",
            Section::GameData => "game data block",
            Section::Footer   => "footer block",
            Section::Trailer  => "trailer",
            Section::File     => "file",
        })
    }
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Unsupported save version: {found:04X}")]
    UnsupportedVersion { found: u32 },
    #[error("Truncated {section}: needs {needed} bytes, {available} available")]
    TruncatedInput { section: Section, needed: u64, available: u64 },
    #[error("Invalid {section} size {size}: smaller than the 8-byte block header")]
    InvalidBlockSize { section: Section, size: u32 },
    #[error("Integrity check failed for {section}: stored {expected}, computed {actual}")]
    Integrity { section: Section, expected: String, actual: String },
    #[error("Unexpected data after footer: expected {expected} bytes, found {found}")]
    TrailingData { expected: usize, found: usize },
    #[error("Block data of {len} bytes does not fit the u32 size field")]
    BlockTooLarge { len: usize },
    #[error("Payload decode error: {0}")]
    PayloadDecode(#[from] PayloadError),
    #[error("Payload encode error: {0}")]
    PayloadEncode(#[source] PayloadError),
    #[error("Save file has no path; use an explicit destination")]
    NoPath,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
