//! PE section handling
//!
//! A [`Section`] pairs a [`SectionHeader`] with its raw file bytes. Payloads
//! are copied out of the source buffer at parse time, so the buffer can be
//! dropped as soon as parsing completes.

use bitflags::bitflags;

bitflags! {
    /// Section characteristics flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const TYPE_NO_PAD = 0x0000_0008;
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_OTHER = 0x0000_0100;
        const LNK_INFO = 0x0000_0200;
        const LNK_REMOVE = 0x0000_0800;
        const LNK_COMDAT = 0x0000_1000;
        const GPREL = 0x0000_8000;
        const ALIGN_1BYTES = 0x0010_0000;
        const ALIGN_2BYTES = 0x0020_0000;
        const ALIGN_4BYTES = 0x0030_0000;
        const ALIGN_8BYTES = 0x0040_0000;
        const ALIGN_16BYTES = 0x0050_0000;
        const ALIGN_32BYTES = 0x0060_0000;
        const ALIGN_64BYTES = 0x0070_0000;
        const ALIGN_128BYTES = 0x0080_0000;
        const ALIGN_256BYTES = 0x0090_0000;
        const ALIGN_512BYTES = 0x00A0_0000;
        const ALIGN_1024BYTES = 0x00B0_0000;
        const ALIGN_2048BYTES = 0x00C0_0000;
        const ALIGN_4096BYTES = 0x00D0_0000;
        const ALIGN_8192BYTES = 0x00E0_0000;
        const LNK_NRELOC_OVFL = 0x0100_0000;
        const MEM_DISCARDABLE = 0x0200_0000;
        const MEM_NOT_CACHED = 0x0400_0000;
        const MEM_NOT_PAGED = 0x0800_0000;
        const MEM_SHARED = 0x1000_0000;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;

        const _ = !0;
    }
}

impl SectionFlags {
    pub fn is_code(&self) -> bool {
        self.contains(Self::CNT_CODE)
    }

    pub fn is_executable(&self) -> bool {
        self.contains(Self::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.contains(Self::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.contains(Self::MEM_WRITE)
    }

    /// Render the memory permissions as an "RWX" style string
    pub fn permissions(&self) -> String {
        let mut perms = String::with_capacity(3);
        perms.push(if self.is_readable() { 'R' } else { '-' });
        perms.push(if self.is_writable() { 'W' } else { '-' });
        perms.push(if self.is_executable() { 'X' } else { '-' });
        perms
    }
}

/// Section header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section name.
    ///
    /// On disk this is 8 bytes, NUL-padded and not NUL-terminated when it
    /// fills the field. Parsing trims at the first NUL and decodes with a
    /// lossy UTF-8 fallback; building re-pads and truncates anything longer
    /// than 8 bytes. While `name` still matches `raw_name`, building writes
    /// `raw_name` back verbatim so name bytes that do not decode cleanly
    /// survive a round trip.
    pub name: String,
    /// The name field exactly as read from disk. Zeroed for caller-built
    /// headers; consulted by [`SectionHeader::encoded_name`] only while it
    /// still decodes to `name`.
    pub raw_name: [u8; 8],
    /// Size of the section when mapped
    pub virtual_size: u32,
    /// RVA of the section when mapped
    pub virtual_address: u32,
    /// Size of the raw data in the file
    pub size_of_raw_data: u32,
    /// File offset of the raw data
    pub pointer_to_raw_data: u32,
    /// File offset of the relocations
    pub pointer_to_relocations: u32,
    /// File offset of the line numbers
    pub pointer_to_linenumbers: u32,
    /// Number of relocation entries
    pub number_of_relocations: u16,
    /// Number of line number entries
    pub number_of_linenumbers: u16,
    /// Section characteristics
    pub characteristics: SectionFlags,
}

impl SectionHeader {
    /// Size of a section header in bytes
    pub const SIZE: usize = 40;

    /// Length of the on-disk name field
    pub const NAME_SIZE: usize = 8;

    /// Trim the on-disk name field at the first NUL and decode it,
    /// replacing bytes that are not valid UTF-8
    pub fn decode_name(raw: &[u8; Self::NAME_SIZE]) -> String {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// The name as it will be written: truncated to 8 bytes, NUL-padded.
    ///
    /// An unchanged name is written back as the exact bytes that were read,
    /// so names the lossy decode could not represent still round-trip.
    pub fn encoded_name(&self) -> [u8; Self::NAME_SIZE] {
        if Self::decode_name(&self.raw_name) == self.name {
            return self.raw_name;
        }
        let mut out = [0u8; Self::NAME_SIZE];
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(Self::NAME_SIZE);
        out[..len].copy_from_slice(&bytes[..len]);
        out
    }
}

/// A section header together with its raw file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The section header
    pub header: SectionHeader,
    /// Raw bytes from `[pointer_to_raw_data, pointer_to_raw_data + size_of_raw_data)`
    pub data: Vec<u8>,
}

impl Section {
    /// Section name convenience accessor
    pub fn name(&self) -> &str {
        &self.header.name
    }
}
