use ipax_core::{Container, ContainerKind, Error};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const X86_64: &str = "Intel x86_64 (CPU Type: 16777223, SubType: 3)";
const ARM64: &str = "ARM64 (CPU Type: 16777228, SubType: 0)";

/// Two-slice universal binary: x86_64 at 4096+8192 and arm64 at 12288+16384.
fn universal(swapped: bool) -> Vec<u8> {
    let word = |v: u32| {
        if swapped {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        }
    };

    let mut buf: Vec<u8> = (0..28672u32).map(|i| (i % 241) as u8).collect();
    buf[0..4].copy_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    if swapped {
        buf[0..4].reverse();
    }
    buf[4..8].copy_from_slice(&word(2));

    let arches = [(0x0100_0007, 3, 4096, 8192), (0x0100_000C, 0, 12288, 16384)];
    for (i, (cputype, subtype, offset, size)) in arches.into_iter().enumerate() {
        let base = 8 + i * 20;
        buf[base..base + 4].copy_from_slice(&word(cputype));
        buf[base + 4..base + 8].copy_from_slice(&word(subtype));
        buf[base + 8..base + 12].copy_from_slice(&word(offset));
        buf[base + 12..base + 16].copy_from_slice(&word(size));
        buf[base + 16..base + 20].copy_from_slice(&word(14));
        // Thin 64-bit Mach-O magic at the start of every slice.
        let at = offset as usize;
        buf[at..at + 4].copy_from_slice(&0xFEED_FACFu32.to_le_bytes());
    }
    buf
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn enumerates_universal_binary() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "App", &universal(false));

    let container = Container::open(&path).unwrap();

    assert!(container.is_multi_arch());
    assert_eq!(container.architecture_strings(), [X86_64, ARM64]);
    assert_eq!(container.slices()[0].offset, 4096);
    assert_eq!(container.slices()[0].size, 8192);
}

#[test]
fn swapped_header_parses_identically() {
    let tmp = TempDir::new().unwrap();
    let native = Container::open(write(tmp.path(), "native", &universal(false))).unwrap();
    let swapped = Container::open(write(tmp.path(), "swapped", &universal(true))).unwrap();

    assert_eq!(native.kind(), swapped.kind());
}

#[test]
fn extracts_arm64_and_reloads_as_plain() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    fs::create_dir(&out).unwrap();
    let original = universal(false);
    let path = write(tmp.path(), "App", &original);

    let fat = Container::open(&path).unwrap();
    let thin = fat.replace_with_slice(ARM64, &out).unwrap();
    drop(fat);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 16384);
    assert_eq!(bytes, &original[12288..28672]);
    assert_eq!(thin.kind(), &ContainerKind::Plain);
    assert!(!Container::open(&path).unwrap().is_multi_arch());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn over_declared_slice_is_truncated() {
    let tmp = TempDir::new().unwrap();
    let mut bytes = universal(false);
    // Claim 1 MiB for the arm64 slice; only 16384 bytes follow its offset.
    bytes[8 + 20 + 12..8 + 20 + 16].copy_from_slice(&0x0010_0000u32.to_be_bytes());
    let path = write(tmp.path(), "App", &bytes);

    let thin = Container::open(&path)
        .unwrap()
        .replace_with_slice(ARM64, tmp.path())
        .unwrap();

    assert!(!thin.is_multi_arch());
    assert_eq!(fs::read(&path).unwrap(), &bytes[12288..]);
}

#[test]
fn selection_miss_leaves_file_untouched() {
    let tmp = TempDir::new().unwrap();
    let original = universal(false);
    let path = write(tmp.path(), "App", &original);

    let fat = Container::open(&path).unwrap();
    let res = fat.replace_with_slice("ARM (CPU Type: 12, SubType: 9)", tmp.path());

    assert!(matches!(res, Err(Error::SliceNotFound(ref s)) if s.starts_with("ARM ")));
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(fat.is_multi_arch());
}

#[test]
fn truncated_header_is_malformed() {
    let tmp = TempDir::new().unwrap();
    let bytes = universal(false);
    let path = write(tmp.path(), "App", &bytes[..30]);

    assert!(matches!(
        Container::open(&path),
        Err(Error::MalformedHeader { .. })
    ));
}
