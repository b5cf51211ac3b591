pub mod fat;

use crate::{ArchitectureSlice, Error, Result};
use byteorder::{ByteOrder, ReadBytesExt, BE, LE};
use fat::FatArch;
use goblin::mach::fat::{FAT_CIGAM, FAT_MAGIC, SIZEOF_FAT_ARCH, SIZEOF_FAT_HEADER};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Container classification derived from the first four bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatMagic {
    /// `0xCAFEBABE`: header fields are big-endian.
    Native,
    /// `0xBEBAFECA`: header fields are stored byte-swapped (little-endian).
    Swapped,
    /// Any other magic. The whole file is a single image.
    Thin,
}

impl FatMagic {
    /// Classifies a magic that was read big-endian.
    pub fn classify(magic: u32) -> Self {
        match magic {
            FAT_MAGIC => FatMagic::Native,
            FAT_CIGAM => FatMagic::Swapped,
            _ => FatMagic::Thin,
        }
    }
}

/// Parses the fat header at the start of `reader`.
///
/// Returns `Ok(None)` for a thin image; nothing past the magic is read in
/// that case. `path` is only used for error reporting.
pub fn read_slices<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
) -> Result<Option<Vec<ArchitectureSlice>>> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let magic = reader
        .read_u32::<BE>()
        .map_err(|e| short_read(e, path, "magic"))?;

    match FatMagic::classify(magic) {
        FatMagic::Native => read_arch_table::<BE, _>(reader, path, file_len).map(Some),
        FatMagic::Swapped => read_arch_table::<LE, _>(reader, path, file_len).map(Some),
        FatMagic::Thin => Ok(None),
    }
}

fn read_arch_table<B: ByteOrder, R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    file_len: u64,
) -> Result<Vec<ArchitectureSlice>> {
    let nfat_arch = reader
        .read_u32::<B>()
        .map_err(|e| short_read(e, path, "architecture count"))?;

    if nfat_arch == 0 {
        return Err(Error::malformed(path, "fat header declares no architectures"));
    }

    // Reject impossible counts before allocating for them.
    let table_end = SIZEOF_FAT_HEADER as u64 + u64::from(nfat_arch) * SIZEOF_FAT_ARCH as u64;
    if table_end > file_len {
        return Err(Error::malformed(
            path,
            format!(
                "{nfat_arch} architectures need {table_end} header bytes, file has {file_len}"
            ),
        ));
    }

    let mut slices = Vec::with_capacity(nfat_arch as usize);
    for i in 0..u64::from(nfat_arch) {
        reader.seek(SeekFrom::Start(
            SIZEOF_FAT_HEADER as u64 + i * SIZEOF_FAT_ARCH as u64,
        ))?;
        let arch = FatArch::from_reader::<B, _>(reader)
            .map_err(|e| short_read(e, path, "architecture descriptor"))?;

        log::debug!(
            "fat_arch[{i}]: cputype={:#x} cpusubtype={:#x} offset={:#x} size={:#x} align=2^{}",
            arch.cputype,
            arch.cpusubtype,
            arch.offset,
            arch.size,
            arch.align
        );
        slices.push(ArchitectureSlice::from(arch));
    }

    Ok(slices)
}

fn short_read(err: io::Error, path: &Path, what: &str) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::malformed(path, format!("file too short for {what}"))
    } else {
        Error::Io(err)
    }
}
