use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Moves `staged` over `target` without ever leaving `target` missing.
///
/// The fast path is a single rename. When the rename is refused (typically
/// because the two paths are on different filesystems) the bytes are first
/// copied next to `target` so the final step is still a same-directory rename.
/// On error `target` keeps its previous contents.
pub fn install_over(staged: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(staged, target) {
        Ok(()) => return Ok(()),
        Err(e) => log::warn!(
            "rename {} -> {} failed ({e}); staging next to target",
            staged.display(),
            target.display()
        ),
    }

    install_via_sibling(staged, target)
}

/// Copies `staged` to a hidden file beside `target`, renames that over
/// `target`, then removes `staged`.
fn install_via_sibling(staged: &Path, target: &Path) -> io::Result<()> {
    let sibling = sibling_temp_path(target);
    let result = fs::copy(staged, &sibling).and_then(|_| fs::rename(&sibling, target));
    match result {
        Ok(()) => {
            if let Err(e) = fs::remove_file(staged) {
                log::warn!("could not remove {}: {e}", staged.display());
            }
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&sibling);
            Err(e)
        }
    }
}

fn sibling_temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.ipax-tmp"))
}
