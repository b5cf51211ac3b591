use crate::extract::extract_slice;
use crate::header::read_slices;
use crate::replace::install_over;
use crate::{ArchitectureSlice, Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerKind {
    /// Single-architecture image; the whole file is the image.
    Plain,
    /// Fat container. Never empty; ordered as in the header.
    MultiArch(Vec<ArchitectureSlice>),
}

/// A loaded executable file and its fat-header classification.
///
/// Values are snapshots: [`Container::replace_with_slice`] returns a new
/// `Container` for the rewritten file and leaves `self` describing bytes that
/// no longer exist, so callers should drop the old value.
#[derive(Debug, Clone)]
pub struct Container {
    pub path: PathBuf,
    pub display_name: String,
    kind: ContainerKind,
}

impl Container {
    /// Loads `path`, naming the container after its file name.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::open_named(path, display_name)
    }

    /// Loads `path` under an explicit display name, e.g. the bundle executable
    /// name of an app.
    pub fn open_named<P: AsRef<Path>>(path: P, display_name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let kind = match read_slices(&mut reader, path)? {
            Some(slices) => {
                log::info!(
                    "{}: fat binary with {} architectures",
                    path.display(),
                    slices.len()
                );
                ContainerKind::MultiArch(slices)
            }
            None => {
                log::info!("{}: not a fat binary", path.display());
                ContainerKind::Plain
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            display_name: display_name.into(),
            kind,
        })
    }

    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    pub fn is_multi_arch(&self) -> bool {
        matches!(self.kind, ContainerKind::MultiArch(_))
    }

    /// Slices in header order; empty for a plain image.
    pub fn slices(&self) -> &[ArchitectureSlice] {
        match &self.kind {
            ContainerKind::MultiArch(slices) => slices,
            ContainerKind::Plain => &[],
        }
    }

    pub fn architecture_strings(&self) -> Vec<String> {
        self.slices().iter().map(|s| s.display_string()).collect()
    }

    /// First slice, in header order, whose display string is `selected`.
    pub fn find_slice(&self, selected: &str) -> Option<&ArchitectureSlice> {
        self.slices().iter().find(|s| s.display_string() == selected)
    }

    /// Path the selected slice is staged at before it replaces the container.
    pub fn staging_path<P: AsRef<Path>>(&self, output_dir: P) -> PathBuf {
        output_dir
            .as_ref()
            .join(format!("{}_extracted.macho", self.display_name))
    }

    /// Replaces the file at `self.path` with the slice named `selected` and
    /// returns the re-parsed container.
    ///
    /// The slice is first written to [`Container::staging_path`] inside
    /// `output_dir`, checked to be a loadable image, then moved over the
    /// original. A selection miss returns [`Error::SliceNotFound`] without
    /// touching the filesystem; any other failure leaves the original file
    /// intact.
    pub fn replace_with_slice<P: AsRef<Path>>(&self, selected: &str, output_dir: P) -> Result<Self> {
        let slice = *self
            .find_slice(selected)
            .ok_or_else(|| Error::SliceNotFound(selected.to_string()))?;

        let staged = self.staging_path(output_dir);
        if same_location(&staged, &self.path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("staging path {} is the container itself", staged.display()),
            )
            .into());
        }

        if let Err(e) = extract_slice(&self.path, &staged, slice.offset, slice.size)
            .and_then(|_| check_staged(&staged))
        {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }
        log::info!(
            "Extracted {} slice to {}",
            slice.family_name(),
            staged.display()
        );

        if let Err(e) = install_over(&staged, &self.path) {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }
        log::info!("Replaced {} with the extracted slice", self.path.display());

        Self::open_named(&self.path, self.display_name.clone())
    }
}

/// Truncated extraction can leave a file too short to classify; it must not
/// replace anything.
fn check_staged(staged: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(staged)?);
    read_slices(&mut reader, staged)?;
    Ok(())
}

/// Whether `a` and `b` name the same file once `.`/`..` and symlinks are
/// resolved. `a` need not exist yet; its parent directory is resolved instead.
fn same_location(a: &Path, b: &Path) -> bool {
    fn resolve(path: &Path) -> Option<PathBuf> {
        if let Ok(full) = fs::canonicalize(path) {
            return Some(full);
        }
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        Some(fs::canonicalize(parent).ok()?.join(path.file_name()?))
    }

    if a == b {
        return true;
    }
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
