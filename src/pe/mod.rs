//! PE (Portable Executable) image reading and writing
//!
//! This module decodes a raw byte buffer holding a Windows EXE/DLL into a
//! structured, mutable in-memory model and re-encodes that model back into
//! bytes. Rebuilding an unmodified image reproduces the input byte-for-byte.
//!
//! The contents of individual data directories (import tables, resources,
//! relocations, ...) are located but not interpreted here.

mod build;
mod header;
mod parse;
mod section;

pub use header::*;
pub use section::*;

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Errors detected while decoding a PE image.
///
/// Each variant carries the byte offset of the region that could not be
/// read. Malformed input is not transient; none of these are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no MZ signature at offset {offset}")]
    MissingDosSignature { offset: usize },

    #[error("DOS header truncated at offset {offset}")]
    TruncatedDosHeader { offset: usize },

    #[error("DOS stub truncated at offset {offset}")]
    TruncatedDosStub { offset: usize },

    #[error("no PE signature at offset {offset}")]
    MissingCoffSignature { offset: usize },

    #[error("COFF header truncated at offset {offset}")]
    TruncatedCoffHeader { offset: usize },

    #[error("optional header missing or truncated at offset {offset}")]
    MissingOptionalHeader { offset: usize },

    #[error("ROM optional header (magic 0x107) at offset {offset} is not supported")]
    UnsupportedOptionalHeader { offset: usize },

    #[error("unknown optional header magic 0x{magic:04x} at offset {offset}")]
    UnknownOptionalHeaderMagic { magic: u16, offset: usize },

    #[error("data directories truncated at offset {offset}")]
    TruncatedDataDirectories { offset: usize },

    #[error("section headers truncated at offset {offset}")]
    TruncatedSectionHeaders { offset: usize },

    #[error("raw data for section `{section}` extends past the buffer at offset {offset}")]
    TruncatedSectionData { section: String, offset: usize },
}

/// Errors detected while encoding a PE image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A declared count does not match the components actually present.
    /// The builder never synthesizes the missing entries.
    #[error("image is missing required component `{0}`")]
    IncompleteImage(&'static str),
}

/// Errors surfaced by the file-level convenience wrappers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Result type for PE operations
pub type Result<T> = std::result::Result<T, Error>;

/// In-memory model of a PE image.
///
/// Constructed either by [`PeImage::parse`] or assembled field-by-field by
/// the caller. The model is a passive record: no field is recomputed on
/// mutation, and [`PeImage::build`] writes every size and offset exactly as
/// stored. Callers that change the layout own the consistency of
/// `pe_header_offset`, section counts, raw-data pointers and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeImage {
    /// DOS header (the 64 bytes at the start of the file)
    pub dos_header: DosHeader,

    /// Opaque bytes between the DOS header and the PE signature
    pub dos_stub: Vec<u8>,

    /// COFF file header
    pub coff_header: CoffHeader,

    /// PE32 or PE32+ optional header
    pub optional_header: OptionalHeader,

    /// Data directory entries, in positional order
    pub data_directories: Vec<DataDirectory>,

    /// Sections in on-disk order
    pub sections: Vec<Section>,

    /// The original input bytes when this image came from a parse.
    /// Diagnostic only; never consulted by [`PeImage::build`].
    pub source: Option<Vec<u8>>,
}

impl PeImage {
    /// Parse a PE image from a byte slice
    pub fn parse(data: &[u8]) -> std::result::Result<Self, ParseError> {
        parse::parse(data)
    }

    /// Encode the image back into a byte buffer
    pub fn build(&self) -> std::result::Result<Vec<u8>, BuildError> {
        build::build(self)
    }

    /// Read and parse a PE image from disk
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(Self::parse(&data)?)
    }

    /// Encode the image and write it to disk
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = self.build()?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Look up a conventionally named data directory.
    ///
    /// Entries beyond the known name set have positional identity only and
    /// are reached through `data_directories` directly.
    pub fn directory(&self, kind: DirectoryKind) -> Option<&DataDirectory> {
        self.data_directories.get(kind.index())
    }

    /// Preferred load address, widened to 64 bits for PE32 images
    pub fn image_base(&self) -> u64 {
        self.optional_header.image_base()
    }

    /// Find a section by name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.header.name == name)
    }
}
