//! PE image encoding
//!
//! Writes the model back out in parse order: DOS header, stub, PE signature,
//! COFF header, optional header, data directories, section headers, then the
//! section payloads seeked to their declared raw-data pointers. Every size
//! and offset field is written exactly as stored in the model; nothing is
//! aligned, recomputed or checksummed here.

use byteorder::{ByteOrder, LittleEndian};

use crate::pe::{
    BuildError, CoffHeader, DosHeader, OptionalHeader, OptionalHeader32, OptionalHeader64,
    PeImage, SectionHeader,
};

/// Output buffer with a write cursor.
///
/// Header regions are written sequentially; section payloads land at
/// caller-supplied offsets that are not guaranteed contiguous or sorted, so
/// the buffer grows to whatever the highest write touches and gaps are
/// zero-filled.
struct Writer {
    buf: Vec<u8>,
    pos: usize,
}

impl Writer {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn ensure(&mut self, end: usize) {
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
    }

    fn u8(&mut self, v: u8) {
        self.ensure(self.pos + 1);
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn u16(&mut self, v: u16) {
        self.ensure(self.pos + 2);
        LittleEndian::write_u16(&mut self.buf[self.pos..self.pos + 2], v);
        self.pos += 2;
    }

    fn u32(&mut self, v: u32) {
        self.ensure(self.pos + 4);
        LittleEndian::write_u32(&mut self.buf[self.pos..self.pos + 4], v);
        self.pos += 4;
    }

    fn u64(&mut self, v: u64) {
        self.ensure(self.pos + 8);
        LittleEndian::write_u64(&mut self.buf[self.pos..self.pos + 8], v);
        self.pos += 8;
    }

    fn bytes(&mut self, data: &[u8]) {
        self.ensure(self.pos + data.len());
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    /// Non-sequential write at an absolute offset. Does not move the cursor.
    fn patch(&mut self, offset: usize, data: &[u8]) {
        self.ensure(offset + data.len());
        self.buf[offset..offset + data.len()].copy_from_slice(data);
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Encode a [`PeImage`] into a byte buffer
pub fn build(image: &PeImage) -> Result<Vec<u8>, BuildError> {
    // Declared counts must match what is actually present; the builder never
    // fills in missing entries.
    let dir_count = image.optional_header.number_of_rva_and_sizes() as usize;
    if image.data_directories.len() != dir_count {
        return Err(BuildError::IncompleteImage("data_directories"));
    }
    if image.sections.len() != image.coff_header.number_of_sections as usize {
        return Err(BuildError::IncompleteImage("sections"));
    }

    let mut w = Writer::new();

    w.u16(DosHeader::SIGNATURE);
    write_dos_header(&mut w, &image.dos_header);
    w.bytes(&image.dos_stub);

    w.u32(CoffHeader::SIGNATURE);
    write_coff_header(&mut w, &image.coff_header);

    w.u16(image.optional_header.magic());
    match &image.optional_header {
        OptionalHeader::Pe32(h) => write_optional_32(&mut w, h),
        OptionalHeader::Pe32Plus(h) => write_optional_64(&mut w, h),
    }

    for dir in &image.data_directories {
        w.u32(dir.virtual_address);
        w.u32(dir.size);
    }

    for section in &image.sections {
        write_section_header(&mut w, &section.header);
    }

    // Payloads go to their declared raw-data pointers; the final length is
    // the highest pointer + payload length, or the end of the header table
    // when that is higher.
    for section in &image.sections {
        w.patch(section.header.pointer_to_raw_data as usize, &section.data);
    }

    Ok(w.into_inner())
}

fn write_dos_header(w: &mut Writer, h: &DosHeader) {
    w.u16(h.bytes_on_last_page);
    w.u16(h.pages_in_file);
    w.u16(h.relocation_count);
    w.u16(h.header_paragraphs);
    w.u16(h.min_extra_paragraphs);
    w.u16(h.max_extra_paragraphs);
    w.u16(h.initial_ss);
    w.u16(h.initial_sp);
    w.u16(h.checksum);
    w.u16(h.initial_ip);
    w.u16(h.initial_cs);
    w.u16(h.relocation_table_offset);
    w.u16(h.overlay_number);
    for word in h.reserved {
        w.u16(word);
    }
    w.u16(h.oem_id);
    w.u16(h.oem_info);
    for word in h.reserved2 {
        w.u16(word);
    }
    w.u32(h.pe_header_offset);
}

fn write_coff_header(w: &mut Writer, h: &CoffHeader) {
    w.u16(h.machine.code());
    w.u16(h.number_of_sections);
    w.u32(h.time_date_stamp);
    w.u32(h.symbol_table_offset);
    w.u32(h.number_of_symbols);
    w.u16(h.size_of_optional_header);
    w.u16(h.characteristics.bits());
}

fn write_optional_32(w: &mut Writer, h: &OptionalHeader32) {
    w.u8(h.major_linker_version);
    w.u8(h.minor_linker_version);
    w.u32(h.size_of_code);
    w.u32(h.size_of_initialized_data);
    w.u32(h.size_of_uninitialized_data);
    w.u32(h.address_of_entry_point);
    w.u32(h.base_of_code);
    w.u32(h.base_of_data);
    w.u32(h.image_base);
    w.u32(h.section_alignment);
    w.u32(h.file_alignment);
    w.u16(h.major_operating_system_version);
    w.u16(h.minor_operating_system_version);
    w.u16(h.major_image_version);
    w.u16(h.minor_image_version);
    w.u16(h.major_subsystem_version);
    w.u16(h.minor_subsystem_version);
    w.u32(h.win32_version_value);
    w.u32(h.size_of_image);
    w.u32(h.size_of_headers);
    w.u32(h.checksum);
    w.u16(h.subsystem.code());
    w.u16(h.dll_characteristics.bits());
    w.u32(h.size_of_stack_reserve);
    w.u32(h.size_of_stack_commit);
    w.u32(h.size_of_heap_reserve);
    w.u32(h.size_of_heap_commit);
    w.u32(h.loader_flags);
    w.u32(h.number_of_rva_and_sizes);
}

fn write_optional_64(w: &mut Writer, h: &OptionalHeader64) {
    w.u8(h.major_linker_version);
    w.u8(h.minor_linker_version);
    w.u32(h.size_of_code);
    w.u32(h.size_of_initialized_data);
    w.u32(h.size_of_uninitialized_data);
    w.u32(h.address_of_entry_point);
    w.u32(h.base_of_code);
    w.u64(h.image_base);
    w.u32(h.section_alignment);
    w.u32(h.file_alignment);
    w.u16(h.major_operating_system_version);
    w.u16(h.minor_operating_system_version);
    w.u16(h.major_image_version);
    w.u16(h.minor_image_version);
    w.u16(h.major_subsystem_version);
    w.u16(h.minor_subsystem_version);
    w.u32(h.win32_version_value);
    w.u32(h.size_of_image);
    w.u32(h.size_of_headers);
    w.u32(h.checksum);
    w.u16(h.subsystem.code());
    w.u16(h.dll_characteristics.bits());
    w.u64(h.size_of_stack_reserve);
    w.u64(h.size_of_stack_commit);
    w.u64(h.size_of_heap_reserve);
    w.u64(h.size_of_heap_commit);
    w.u32(h.loader_flags);
    w.u32(h.number_of_rva_and_sizes);
}

fn write_section_header(w: &mut Writer, h: &SectionHeader) {
    w.bytes(&h.encoded_name());
    w.u32(h.virtual_size);
    w.u32(h.virtual_address);
    w.u32(h.size_of_raw_data);
    w.u32(h.pointer_to_raw_data);
    w.u32(h.pointer_to_relocations);
    w.u32(h.pointer_to_linenumbers);
    w.u16(h.number_of_relocations);
    w.u16(h.number_of_linenumbers);
    w.u32(h.characteristics.bits());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_is_little_endian() {
        let mut w = Writer::new();
        w.u16(0x5A4D);
        w.u32(0x0000_4550);
        assert_eq!(w.into_inner(), vec![0x4D, 0x5A, 0x50, 0x45, 0x00, 0x00]);
    }

    #[test]
    fn test_patch_extends_and_zero_fills() {
        let mut w = Writer::new();
        w.bytes(b"abc");
        w.patch(6, b"xy");
        assert_eq!(w.into_inner(), vec![b'a', b'b', b'c', 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn test_patch_does_not_shrink() {
        let mut w = Writer::new();
        w.bytes(b"abcdef");
        w.patch(1, b"Z");
        let buf = w.into_inner();
        assert_eq!(buf.len(), 6);
        assert_eq!(&buf[..3], b"aZc");
    }
}
