use crate::Result;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

const CHUNK_SIZE: usize = 8 * 1024;

/// Copies `size` bytes starting at `offset` of `source` into a newly created
/// `destination`, returning the number of bytes written.
///
/// A source that ends early is not an error: the copy stops at end of file and
/// the destination holds whatever was available, which is what a header with an
/// over-declared slice size produces.
pub fn extract_slice<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    offset: u64,
    size: u64,
) -> Result<u64> {
    let mut input = File::open(&source)?;
    input.seek(SeekFrom::Start(offset))?;
    let mut output = File::create(&destination)?;

    let written = copy_range(&mut input, &mut output, size)?;
    output.flush()?;

    if written < size {
        log::warn!(
            "{} ended {} bytes short of slice {:#x}+{:#x}; extracted {} bytes",
            source.as_ref().display(),
            size - written,
            offset,
            size,
            written
        );
    } else {
        log::info!(
            "Extracted {} bytes to {}",
            written,
            destination.as_ref().display()
        );
    }
    Ok(written)
}

fn copy_range<R: Read, W: Write>(input: &mut R, output: &mut W, size: u64) -> io::Result<u64> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let read = match input.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&buf[..read])?;
        remaining -= read as u64;
    }

    Ok(size - remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_extract_exact_range() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("fat.bin");
        let dst = tmp.path().join("slice.bin");
        let data = patterned(40_000);
        std::fs::write(&src, &data).unwrap();

        // Spans several chunks and ends mid-chunk.
        let written = extract_slice(&src, &dst, 1000, 20_001).unwrap();

        assert_eq!(written, 20_001);
        assert_eq!(std::fs::read(&dst).unwrap(), &data[1000..21_001]);
    }

    #[test]
    fn test_extract_truncates_at_end_of_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("fat.bin");
        let dst = tmp.path().join("slice.bin");
        let data = patterned(10_000);
        std::fs::write(&src, &data).unwrap();

        let written = extract_slice(&src, &dst, 9_000, 5_000).unwrap();

        assert_eq!(written, 1_000);
        assert_eq!(std::fs::read(&dst).unwrap(), &data[9_000..]);
    }

    #[test]
    fn test_extract_offset_past_end_yields_empty_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("fat.bin");
        let dst = tmp.path().join("slice.bin");
        std::fs::write(&src, patterned(100)).unwrap();

        assert_eq!(extract_slice(&src, &dst, 500, 64).unwrap(), 0);
        assert!(std::fs::read(&dst).unwrap().is_empty());
    }

    #[test]
    fn test_extract_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let res = extract_slice(tmp.path().join("nope"), tmp.path().join("out"), 0, 1);
        assert!(matches!(res, Err(crate::Error::Io(_))));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_extract_uncreatable_destination_fails() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("fat.bin");
        std::fs::write(&src, patterned(100)).unwrap();

        let dst = tmp.path().join("missing-dir").join("slice.bin");
        assert!(matches!(
            extract_slice(&src, &dst, 0, 10),
            Err(crate::Error::Io(_))
        ));
    }
}
