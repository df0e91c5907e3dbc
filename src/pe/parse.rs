//! PE image decoding
//!
//! Strictly sequential parse of the header regions, then non-sequential
//! reads of the section payloads at their declared file offsets. The first
//! failure terminates the parse; nothing is retried and no partial model is
//! returned. Structural well-formedness only: semantic checks such as "the
//! entry point lies inside a section" are out of scope.

use byteorder::{ByteOrder, LittleEndian};

use crate::pe::{
    magic, CoffCharacteristics, CoffHeader, DataDirectory, DllCharacteristics, DosHeader, Machine,
    OptionalHeader, OptionalHeader32, OptionalHeader64, ParseError, PeImage, Section,
    SectionFlags, SectionHeader, Subsystem,
};

/// Little-endian cursor over the input buffer.
///
/// The read methods assume the caller has already checked `remaining()`;
/// every checkpoint in [`parse`] does so before touching a region.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn u8(&mut self) -> u8 {
        let v = self.data[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = LittleEndian::read_u16(&self.data[self.pos..self.pos + 2]);
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = LittleEndian::read_u32(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        v
    }

    fn u64(&mut self) -> u64 {
        let v = LittleEndian::read_u64(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        v
    }

    fn bytes(&mut self, n: usize) -> &'a [u8] {
        let v = &self.data[self.pos..self.pos + n];
        self.pos += n;
        v
    }
}

/// Parse a PE image from a byte slice
pub fn parse(data: &[u8]) -> Result<PeImage, ParseError> {
    let mut r = Reader::new(data);

    if r.remaining() < 2 || r.u16() != DosHeader::SIGNATURE {
        return Err(ParseError::MissingDosSignature { offset: 0 });
    }

    if data.len() < DosHeader::SIZE {
        return Err(ParseError::TruncatedDosHeader { offset: 0 });
    }
    let dos_header = read_dos_header(&mut r);

    let pe_offset = dos_header.pe_header_offset as usize;
    if pe_offset < DosHeader::SIZE || data.len() < pe_offset {
        return Err(ParseError::TruncatedDosStub {
            offset: DosHeader::SIZE,
        });
    }
    let dos_stub = data[DosHeader::SIZE..pe_offset].to_vec();
    r.seek(pe_offset);

    if r.remaining() < 4 || r.u32() != CoffHeader::SIGNATURE {
        return Err(ParseError::MissingCoffSignature { offset: pe_offset });
    }

    if r.remaining() < CoffHeader::SIZE {
        return Err(ParseError::TruncatedCoffHeader { offset: r.pos() });
    }
    let coff_header = read_coff_header(&mut r);

    let optional_header = read_optional_header(&mut r)?;

    // 64-bit arithmetic: a declared count near u32::MAX must not wrap the
    // size computation on 32-bit targets.
    let dir_count = optional_header.number_of_rva_and_sizes() as usize;
    if (r.remaining() as u64) < dir_count as u64 * DataDirectory::SIZE as u64 {
        return Err(ParseError::TruncatedDataDirectories { offset: r.pos() });
    }
    let mut data_directories = Vec::with_capacity(dir_count);
    for _ in 0..dir_count {
        data_directories.push(DataDirectory {
            virtual_address: r.u32(),
            size: r.u32(),
        });
    }

    let section_count = coff_header.number_of_sections as usize;
    if r.remaining() < section_count * SectionHeader::SIZE {
        return Err(ParseError::TruncatedSectionHeaders { offset: r.pos() });
    }
    let mut headers = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        headers.push(read_section_header(&mut r));
    }

    // Payloads live at their declared file offsets, not after the header
    // table. 64-bit arithmetic so pointer + size cannot wrap.
    let mut sections = Vec::with_capacity(section_count);
    for header in headers {
        let start = u64::from(header.pointer_to_raw_data);
        let end = start + u64::from(header.size_of_raw_data);
        if end > data.len() as u64 {
            return Err(ParseError::TruncatedSectionData {
                section: header.name.clone(),
                offset: header.pointer_to_raw_data as usize,
            });
        }
        let payload = data[start as usize..end as usize].to_vec();
        sections.push(Section {
            header,
            data: payload,
        });
    }

    Ok(PeImage {
        dos_header,
        dos_stub,
        coff_header,
        optional_header,
        data_directories,
        sections,
        source: Some(data.to_vec()),
    })
}

/// Read the 29 DOS header fields plus the PE header offset.
/// The cursor sits just past the MZ signature.
fn read_dos_header(r: &mut Reader) -> DosHeader {
    DosHeader {
        bytes_on_last_page: r.u16(),
        pages_in_file: r.u16(),
        relocation_count: r.u16(),
        header_paragraphs: r.u16(),
        min_extra_paragraphs: r.u16(),
        max_extra_paragraphs: r.u16(),
        initial_ss: r.u16(),
        initial_sp: r.u16(),
        checksum: r.u16(),
        initial_ip: r.u16(),
        initial_cs: r.u16(),
        relocation_table_offset: r.u16(),
        overlay_number: r.u16(),
        reserved: [r.u16(), r.u16(), r.u16(), r.u16()],
        oem_id: r.u16(),
        oem_info: r.u16(),
        reserved2: [
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
            r.u16(),
        ],
        pe_header_offset: r.u32(),
    }
}

fn read_coff_header(r: &mut Reader) -> CoffHeader {
    CoffHeader {
        machine: Machine::from(r.u16()),
        number_of_sections: r.u16(),
        time_date_stamp: r.u32(),
        symbol_table_offset: r.u32(),
        number_of_symbols: r.u32(),
        size_of_optional_header: r.u16(),
        characteristics: CoffCharacteristics::from_bits_retain(r.u16()),
    }
}

fn read_optional_header(r: &mut Reader) -> Result<OptionalHeader, ParseError> {
    let offset = r.pos();
    if r.remaining() < 2 {
        return Err(ParseError::MissingOptionalHeader { offset });
    }

    match r.u16() {
        magic::PE32 => {
            if r.remaining() < OptionalHeader32::BODY_SIZE {
                return Err(ParseError::MissingOptionalHeader { offset });
            }
            Ok(OptionalHeader::Pe32(read_optional_32(r)))
        }
        magic::PE32_PLUS => {
            if r.remaining() < OptionalHeader64::BODY_SIZE {
                return Err(ParseError::MissingOptionalHeader { offset });
            }
            Ok(OptionalHeader::Pe32Plus(read_optional_64(r)))
        }
        magic::ROM => Err(ParseError::UnsupportedOptionalHeader { offset }),
        other => Err(ParseError::UnknownOptionalHeaderMagic {
            magic: other,
            offset,
        }),
    }
}

fn read_optional_32(r: &mut Reader) -> OptionalHeader32 {
    OptionalHeader32 {
        major_linker_version: r.u8(),
        minor_linker_version: r.u8(),
        size_of_code: r.u32(),
        size_of_initialized_data: r.u32(),
        size_of_uninitialized_data: r.u32(),
        address_of_entry_point: r.u32(),
        base_of_code: r.u32(),
        base_of_data: r.u32(),
        image_base: r.u32(),
        section_alignment: r.u32(),
        file_alignment: r.u32(),
        major_operating_system_version: r.u16(),
        minor_operating_system_version: r.u16(),
        major_image_version: r.u16(),
        minor_image_version: r.u16(),
        major_subsystem_version: r.u16(),
        minor_subsystem_version: r.u16(),
        win32_version_value: r.u32(),
        size_of_image: r.u32(),
        size_of_headers: r.u32(),
        checksum: r.u32(),
        subsystem: Subsystem::from(r.u16()),
        dll_characteristics: DllCharacteristics::from_bits_retain(r.u16()),
        size_of_stack_reserve: r.u32(),
        size_of_stack_commit: r.u32(),
        size_of_heap_reserve: r.u32(),
        size_of_heap_commit: r.u32(),
        loader_flags: r.u32(),
        number_of_rva_and_sizes: r.u32(),
    }
}

fn read_optional_64(r: &mut Reader) -> OptionalHeader64 {
    OptionalHeader64 {
        major_linker_version: r.u8(),
        minor_linker_version: r.u8(),
        size_of_code: r.u32(),
        size_of_initialized_data: r.u32(),
        size_of_uninitialized_data: r.u32(),
        address_of_entry_point: r.u32(),
        base_of_code: r.u32(),
        image_base: r.u64(),
        section_alignment: r.u32(),
        file_alignment: r.u32(),
        major_operating_system_version: r.u16(),
        minor_operating_system_version: r.u16(),
        major_image_version: r.u16(),
        minor_image_version: r.u16(),
        major_subsystem_version: r.u16(),
        minor_subsystem_version: r.u16(),
        win32_version_value: r.u32(),
        size_of_image: r.u32(),
        size_of_headers: r.u32(),
        checksum: r.u32(),
        subsystem: Subsystem::from(r.u16()),
        dll_characteristics: DllCharacteristics::from_bits_retain(r.u16()),
        size_of_stack_reserve: r.u64(),
        size_of_stack_commit: r.u64(),
        size_of_heap_reserve: r.u64(),
        size_of_heap_commit: r.u64(),
        loader_flags: r.u32(),
        number_of_rva_and_sizes: r.u32(),
    }
}

fn read_section_header(r: &mut Reader) -> SectionHeader {
    let mut raw_name = [0u8; SectionHeader::NAME_SIZE];
    raw_name.copy_from_slice(r.bytes(SectionHeader::NAME_SIZE));
    let name = SectionHeader::decode_name(&raw_name);

    SectionHeader {
        name,
        raw_name,
        virtual_size: r.u32(),
        virtual_address: r.u32(),
        size_of_raw_data: r.u32(),
        pointer_to_raw_data: r.u32(),
        pointer_to_relocations: r.u32(),
        pointer_to_linenumbers: r.u32(),
        number_of_relocations: r.u16(),
        number_of_linenumbers: r.u16(),
        characteristics: SectionFlags::from_bits_retain(r.u32()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_is_missing_signature() {
        assert_eq!(
            parse(&[]),
            Err(ParseError::MissingDosSignature { offset: 0 })
        );
        assert_eq!(
            parse(&[b'M']),
            Err(ParseError::MissingDosSignature { offset: 0 })
        );
    }

    #[test]
    fn test_wrong_signature() {
        let data = vec![0u8; 64];
        assert_eq!(
            parse(&data),
            Err(ParseError::MissingDosSignature { offset: 0 })
        );
    }

    #[test]
    fn test_short_dos_header() {
        let mut data = vec![0u8; 63];
        data[0] = b'M';
        data[1] = b'Z';
        assert_eq!(parse(&data), Err(ParseError::TruncatedDosHeader { offset: 0 }));
    }

    #[test]
    fn test_pe_offset_inside_dos_header_is_truncated_stub() {
        let mut data = vec![0u8; 64];
        data[0] = b'M';
        data[1] = b'Z';
        data[60..64].copy_from_slice(&32u32.to_le_bytes());
        assert_eq!(parse(&data), Err(ParseError::TruncatedDosStub { offset: 64 }));
    }

    #[test]
    fn test_missing_pe_signature() {
        let mut data = vec![0u8; 72];
        data[0] = b'M';
        data[1] = b'Z';
        data[60..64].copy_from_slice(&64u32.to_le_bytes());
        assert_eq!(
            parse(&data),
            Err(ParseError::MissingCoffSignature { offset: 64 })
        );
    }

    #[test]
    fn test_coff_header_truncated() {
        let mut data = vec![0u8; 70];
        data[0] = b'M';
        data[1] = b'Z';
        data[60..64].copy_from_slice(&64u32.to_le_bytes());
        data[64..68].copy_from_slice(b"PE\0\0");
        assert_eq!(
            parse(&data),
            Err(ParseError::TruncatedCoffHeader { offset: 68 })
        );
    }
}
