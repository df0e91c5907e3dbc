//! Hand-built test images
//!
//! Byte-level fixtures assembled without going through the builder, so the
//! parser and builder are tested against an independent layout.
#![allow(dead_code)]

pub fn le16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn le32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn le64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Minimal PE32 image: 64-byte DOS header with the PE header at 128, a
/// 64-byte stub, a COFF header declaring one x86 section, a PE32 optional
/// header with no data directories, one `.text` section with 16 raw bytes
/// at file offset 288. Total 304 bytes.
pub fn minimal_pe32() -> Vec<u8> {
    let mut d = vec![0u8; 304];

    d[0] = b'M';
    d[1] = b'Z';
    le32(&mut d, 60, 128); // PE header offset

    // DOS stub, opaque bytes the round trip must preserve
    d[64..69].copy_from_slice(b"stub!");

    d[128..132].copy_from_slice(b"PE\0\0");

    // COFF header
    le16(&mut d, 132, 0x14c); // machine: x86
    le16(&mut d, 134, 1); // one section
    le32(&mut d, 136, 0x6000_0000); // timestamp
    le16(&mut d, 148, 96); // size of optional header
    le16(&mut d, 150, 0x0102); // EXECUTABLE_IMAGE | MACHINE_32BIT

    // PE32 optional header
    le16(&mut d, 152, 0x10b); // magic
    d[154] = 14; // linker major
    le32(&mut d, 156, 16); // size of code
    le32(&mut d, 168, 0x1000); // entry point
    le32(&mut d, 172, 0x1000); // base of code
    le32(&mut d, 176, 0x2000); // base of data
    le32(&mut d, 180, 0x0040_0000); // image base
    le32(&mut d, 184, 0x1000); // section alignment
    le32(&mut d, 188, 0x200); // file alignment
    le16(&mut d, 192, 6); // OS version
    le16(&mut d, 200, 6); // subsystem version
    le32(&mut d, 208, 0x2000); // size of image
    le32(&mut d, 212, 0x200); // size of headers
    le16(&mut d, 220, 3); // subsystem: console
    le16(&mut d, 222, 0x8140); // DLL characteristics
    le32(&mut d, 224, 0x0010_0000); // stack reserve
    le32(&mut d, 228, 0x1000); // stack commit
    le32(&mut d, 232, 0x0010_0000); // heap reserve
    le32(&mut d, 236, 0x1000); // heap commit
    le32(&mut d, 244, 0); // number of RVAs and sizes

    // Section header
    d[248..253].copy_from_slice(b".text");
    le32(&mut d, 256, 16); // virtual size
    le32(&mut d, 260, 0x1000); // virtual address
    le32(&mut d, 264, 16); // size of raw data
    le32(&mut d, 268, 288); // pointer to raw data
    le32(&mut d, 284, 0x6000_0020); // CODE | EXECUTE | READ

    // Section payload
    for (i, byte) in d[288..304].iter_mut().enumerate() {
        *byte = i as u8;
    }

    d
}

/// Minimal PE32+ image, same shape as [`minimal_pe32`] with the 64-bit
/// optional header (112 bytes). One `.text` section with 16 raw bytes at
/// file offset 304. Total 320 bytes.
pub fn minimal_pe32_plus() -> Vec<u8> {
    let mut d = vec![0u8; 320];

    d[0] = b'M';
    d[1] = b'Z';
    le32(&mut d, 60, 128);

    d[64..69].copy_from_slice(b"stub!");

    d[128..132].copy_from_slice(b"PE\0\0");

    // COFF header
    le16(&mut d, 132, 0x8664); // machine: x64
    le16(&mut d, 134, 1);
    le32(&mut d, 136, 0x6000_0000);
    le16(&mut d, 148, 112);
    le16(&mut d, 150, 0x0022); // EXECUTABLE_IMAGE | LARGE_ADDRESS_AWARE

    // PE32+ optional header
    le16(&mut d, 152, 0x20b);
    d[154] = 14;
    le32(&mut d, 156, 16);
    le32(&mut d, 168, 0x1000); // entry point
    le32(&mut d, 172, 0x1000); // base of code
    le64(&mut d, 176, 0x0001_4000_0000); // image base
    le32(&mut d, 184, 0x1000);
    le32(&mut d, 188, 0x200);
    le16(&mut d, 192, 6);
    le16(&mut d, 200, 6);
    le32(&mut d, 208, 0x2000);
    le32(&mut d, 212, 0x200);
    le16(&mut d, 220, 2); // subsystem: GUI
    le16(&mut d, 222, 0x8160);
    le64(&mut d, 224, 0x0010_0000);
    le64(&mut d, 232, 0x1000);
    le64(&mut d, 240, 0x0010_0000);
    le64(&mut d, 248, 0x1000);
    le32(&mut d, 260, 0); // number of RVAs and sizes

    // Section header
    d[264..269].copy_from_slice(b".text");
    le32(&mut d, 272, 16);
    le32(&mut d, 276, 0x1000);
    le32(&mut d, 280, 16);
    le32(&mut d, 284, 304);
    le32(&mut d, 300, 0x6000_0020);

    for (i, byte) in d[304..320].iter_mut().enumerate() {
        *byte = 0xA0 + i as u8;
    }

    d
}
