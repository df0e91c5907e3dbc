//! PE header structures
//!
//! Plain data types for the fixed-layout regions of a PE image: the DOS
//! header, COFF header, the two optional-header variants and the data
//! directory entries. Decoding lives in [`crate::pe::parse`], encoding in
//! [`crate::pe::build`].

use std::fmt;

use bitflags::bitflags;

/// DOS header structure
///
/// The leading "MZ" signature is verified by the parser and rewritten by the
/// builder; it is not stored as a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DosHeader {
    /// Bytes on the last page of the file
    pub bytes_on_last_page: u16,
    /// Pages in the file
    pub pages_in_file: u16,
    /// Relocation entries
    pub relocation_count: u16,
    /// Size of the header in paragraphs
    pub header_paragraphs: u16,
    /// Minimum extra paragraphs needed
    pub min_extra_paragraphs: u16,
    /// Maximum extra paragraphs needed
    pub max_extra_paragraphs: u16,
    /// Initial (relative) SS value
    pub initial_ss: u16,
    /// Initial SP value
    pub initial_sp: u16,
    /// Checksum
    pub checksum: u16,
    /// Initial IP value
    pub initial_ip: u16,
    /// Initial (relative) CS value
    pub initial_cs: u16,
    /// File offset of the relocation table
    pub relocation_table_offset: u16,
    /// Overlay number
    pub overlay_number: u16,
    /// Reserved words
    pub reserved: [u16; 4],
    /// OEM identifier
    pub oem_id: u16,
    /// OEM information
    pub oem_info: u16,
    /// Reserved words
    pub reserved2: [u16; 10],
    /// File offset of the PE signature; the DOS stub ends here
    pub pe_header_offset: u32,
}

impl DosHeader {
    /// Size of the DOS header in bytes, including the signature
    pub const SIZE: usize = 64;

    /// The 16-bit "MZ" signature
    pub const SIGNATURE: u16 = 0x5A4D;
}

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    X86,
    X64,
    IA64,
    Arm,
    Arm64,
    Other(u16),
}

impl Machine {
    /// The 16-bit machine code as stored on disk
    pub fn code(&self) -> u16 {
        match self {
            Machine::Unknown => 0x0,
            Machine::X86 => 0x14c,
            Machine::X64 => 0x8664,
            Machine::IA64 => 0x200,
            Machine::Arm => 0x1c0,
            Machine::Arm64 => 0xaa64,
            Machine::Other(code) => *code,
        }
    }
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x0 => Machine::Unknown,
            0x14c => Machine::X86,
            0x8664 => Machine::X64,
            0x200 => Machine::IA64,
            0x1c0 => Machine::Arm,
            0xaa64 => Machine::Arm64,
            other => Machine::Other(other),
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Machine::Unknown => write!(f, "Unknown"),
            Machine::X86 => write!(f, "x86"),
            Machine::X64 => write!(f, "x64"),
            Machine::IA64 => write!(f, "IA64"),
            Machine::Arm => write!(f, "ARM"),
            Machine::Arm64 => write!(f, "ARM64"),
            Machine::Other(code) => write!(f, "Other(0x{:04x})", code),
        }
    }
}

bitflags! {
    /// COFF file characteristic flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoffCharacteristics: u16 {
        const RELOCS_STRIPPED = 0x0001;
        const EXECUTABLE_IMAGE = 0x0002;
        const LINE_NUMS_STRIPPED = 0x0004;
        const LOCAL_SYMS_STRIPPED = 0x0008;
        const AGGRESSIVE_WS_TRIM = 0x0010;
        const LARGE_ADDRESS_AWARE = 0x0020;
        const BYTES_REVERSED_LO = 0x0080;
        const MACHINE_32BIT = 0x0100;
        const DEBUG_STRIPPED = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP = 0x0800;
        const SYSTEM = 0x1000;
        const DLL = 0x2000;
        const UP_SYSTEM_ONLY = 0x4000;
        const BYTES_REVERSED_HI = 0x8000;

        // Images in the wild set undocumented bits; keep them.
        const _ = !0;
    }
}

impl CoffCharacteristics {
    pub fn is_dll(&self) -> bool {
        self.contains(Self::DLL)
    }

    pub fn is_exe(&self) -> bool {
        self.contains(Self::EXECUTABLE_IMAGE) && !self.is_dll()
    }
}

/// COFF file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffHeader {
    /// The architecture type of the computer
    pub machine: Machine,
    /// The number of sections
    pub number_of_sections: u16,
    /// The low 32 bits of the Unix timestamp of the image
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table; zero for images
    pub symbol_table_offset: u32,
    /// Number of symbols in the symbol table; zero for images
    pub number_of_symbols: u32,
    /// The size of the optional header
    pub size_of_optional_header: u16,
    /// The characteristics of the image
    pub characteristics: CoffCharacteristics,
}

impl CoffHeader {
    /// Size of the COFF header in bytes, excluding the PE signature
    pub const SIZE: usize = 20;

    /// The 32-bit "PE\0\0" signature that precedes the header
    pub const SIGNATURE: u32 = 0x0000_4550;
}

/// Windows subsystem required to run an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Unknown,
    Native,
    WindowsGui,
    WindowsCui,
    Os2Cui,
    PosixCui,
    WindowsCeGui,
    EfiApplication,
    EfiBootServiceDriver,
    EfiRuntimeDriver,
    EfiRom,
    Xbox,
    WindowsBootApplication,
    Other(u16),
}

impl Subsystem {
    /// The 16-bit subsystem code as stored on disk
    pub fn code(&self) -> u16 {
        match self {
            Subsystem::Unknown => 0,
            Subsystem::Native => 1,
            Subsystem::WindowsGui => 2,
            Subsystem::WindowsCui => 3,
            Subsystem::Os2Cui => 5,
            Subsystem::PosixCui => 7,
            Subsystem::WindowsCeGui => 9,
            Subsystem::EfiApplication => 10,
            Subsystem::EfiBootServiceDriver => 11,
            Subsystem::EfiRuntimeDriver => 12,
            Subsystem::EfiRom => 13,
            Subsystem::Xbox => 14,
            Subsystem::WindowsBootApplication => 16,
            Subsystem::Other(code) => *code,
        }
    }
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Subsystem::Unknown,
            1 => Subsystem::Native,
            2 => Subsystem::WindowsGui,
            3 => Subsystem::WindowsCui,
            5 => Subsystem::Os2Cui,
            7 => Subsystem::PosixCui,
            9 => Subsystem::WindowsCeGui,
            10 => Subsystem::EfiApplication,
            11 => Subsystem::EfiBootServiceDriver,
            12 => Subsystem::EfiRuntimeDriver,
            13 => Subsystem::EfiRom,
            14 => Subsystem::Xbox,
            16 => Subsystem::WindowsBootApplication,
            other => Subsystem::Other(other),
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Other(code) => write!(f, "Other(0x{:04x})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

bitflags! {
    /// DLL characteristics
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA = 0x0020;
        const DYNAMIC_BASE = 0x0040;
        const FORCE_INTEGRITY = 0x0080;
        const NX_COMPAT = 0x0100;
        const NO_ISOLATION = 0x0200;
        const NO_SEH = 0x0400;
        const NO_BIND = 0x0800;
        const APPCONTAINER = 0x1000;
        const WDM_DRIVER = 0x2000;
        const GUARD_CF = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;

        const _ = !0;
    }
}

/// Optional header magic values
pub mod magic {
    /// PE32 (32-bit) optional header
    pub const PE32: u16 = 0x10b;
    /// PE32+ (64-bit) optional header
    pub const PE32_PLUS: u16 = 0x20b;
    /// ROM image; recognized but not supported
    pub const ROM: u16 = 0x107;
}

/// PE32 optional header (magic 0x10B)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader32 {
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    /// Entry point RVA
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    /// RVA of the beginning of the data section; PE32 only
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    /// Reserved, zero in practice
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    /// Number of data-directory entries that follow the header
    pub number_of_rva_and_sizes: u32,
}

impl OptionalHeader32 {
    /// Size of the variant body in bytes, after the 2-byte magic
    pub const BODY_SIZE: usize = 94;
}

/// PE32+ optional header (magic 0x20B)
///
/// Same layout as [`OptionalHeader32`] except the image base and stack/heap
/// sizes are 64-bit and there is no `base_of_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader64 {
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

impl OptionalHeader64 {
    /// Size of the variant body in bytes, after the 2-byte magic
    pub const BODY_SIZE: usize = 110;
}

/// Optional header, dispatched on the leading magic value.
///
/// The variant set is closed: ROM images (magic 0x107) and unknown magics
/// never construct a value, they fail the parse instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe32Plus(OptionalHeader64),
}

impl OptionalHeader {
    /// The magic value this variant encodes as
    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(_) => magic::PE32,
            OptionalHeader::Pe32Plus(_) => magic::PE32_PLUS,
        }
    }

    /// Preferred load address, widened to 64 bits for PE32
    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Pe32(h) => u64::from(h.image_base),
            OptionalHeader::Pe32Plus(h) => h.image_base,
        }
    }

    /// Entry point RVA
    pub fn address_of_entry_point(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.address_of_entry_point,
            OptionalHeader::Pe32Plus(h) => h.address_of_entry_point,
        }
    }

    /// Declared number of data-directory entries
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.number_of_rva_and_sizes,
            OptionalHeader::Pe32Plus(h) => h.number_of_rva_and_sizes,
        }
    }

    /// Required subsystem
    pub fn subsystem(&self) -> Subsystem {
        match self {
            OptionalHeader::Pe32(h) => h.subsystem,
            OptionalHeader::Pe32Plus(h) => h.subsystem,
        }
    }

    /// Size of the mapped image in bytes
    pub fn size_of_image(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.size_of_image,
            OptionalHeader::Pe32Plus(h) => h.size_of_image,
        }
    }
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// RVA of the table
    pub virtual_address: u32,
    /// Size of the table
    pub size: u32,
}

impl DataDirectory {
    /// Size of a data directory entry in bytes
    pub const SIZE: usize = 8;

    /// Check if this data directory is present (non-zero address and size)
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }
}

/// Conventional names of the data directory slots.
///
/// Names are positional. An image may declare more entries than there are
/// names here; the extra entries are structurally valid but carry only their
/// index as identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TlsTable,
    LoadConfigTable,
    BoundImport,
    ImportAddressTable,
    DelayImportDescriptor,
    ClrRuntimeHeader,
    Reserved,
}

impl DirectoryKind {
    /// All known directory slots, in positional order
    pub const ALL: [DirectoryKind; 16] = [
        DirectoryKind::ExportTable,
        DirectoryKind::ImportTable,
        DirectoryKind::ResourceTable,
        DirectoryKind::ExceptionTable,
        DirectoryKind::CertificateTable,
        DirectoryKind::BaseRelocationTable,
        DirectoryKind::Debug,
        DirectoryKind::Architecture,
        DirectoryKind::GlobalPtr,
        DirectoryKind::TlsTable,
        DirectoryKind::LoadConfigTable,
        DirectoryKind::BoundImport,
        DirectoryKind::ImportAddressTable,
        DirectoryKind::DelayImportDescriptor,
        DirectoryKind::ClrRuntimeHeader,
        DirectoryKind::Reserved,
    ];

    /// Positional index of this slot
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The named slot at `index`, if the index is within the known set
    pub fn from_index(index: usize) -> Option<DirectoryKind> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
