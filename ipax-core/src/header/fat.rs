use crate::ArchitectureSlice;
use byteorder::{ByteOrder, ReadBytesExt};
use std::io;

/// One record of the architecture table that follows a fat header.
///
/// Corresponds to `struct fat_arch` from `<mach-o/fat.h>`. Records are packed
/// back to back starting at byte 8 of the file, 20 bytes each, and use the
/// byte order announced by the fat magic.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArch {
    /// CPU family of the embedded image (e.g. `0x0100000C` for arm64).
    pub cputype: u32,

    /// Machine variant within the family.
    pub cpusubtype: u32,

    /// File offset of the embedded image.
    ///
    /// 32-bit in this format; images past 4 GiB need the `fat_arch_64`
    /// layout, which is not supported.
    pub offset: u32,

    /// Length of the embedded image in bytes.
    pub size: u32,

    /// Alignment of `offset` as a power of two.
    pub align: u32,
}

impl FatArch {
    pub fn from_reader<B: ByteOrder, R: io::Read>(cur: &mut R) -> io::Result<FatArch> {
        Ok(FatArch {
            cputype: cur.read_u32::<B>()?,
            cpusubtype: cur.read_u32::<B>()?,
            offset: cur.read_u32::<B>()?,
            size: cur.read_u32::<B>()?,
            align: cur.read_u32::<B>()?,
        })
    }
}

impl From<FatArch> for ArchitectureSlice {
    fn from(arch: FatArch) -> Self {
        ArchitectureSlice {
            cpu_type: arch.cputype,
            cpu_subtype: arch.cpusubtype,
            offset: u64::from(arch.offset),
            size: u64::from(arch.size),
        }
    }
}
