//! Which files a patch must touch, and which it leaves behind.

use std::collections::BTreeSet;
use std::path::Path;

use crate::context::Context;
use crate::error::ScanError;
use crate::manifest::{AppManifest, FileManifest};

/// Paths of `new` that must be (re)written into `install_dir`.
///
/// With no `old` manifest every path is outdated. Passing the same instance as
/// both `old` and `new` yields an empty set without touching the disk, so a
/// repair pass that re-diffs a manifest against itself never schedules a full
/// redownload. Otherwise a path is outdated when it is new, when its content
/// hash changed, or when the file on disk does not have the expected size.
pub fn outdated_files(
    old: Option<&AppManifest>,
    new: &AppManifest,
    install_dir: &Path,
    ctx: &Context,
) -> BTreeSet<String> {
    let Some(old) = old else {
        return new.files().map(|f| f.path().to_string()).collect();
    };
    if std::ptr::eq(old, new) {
        return BTreeSet::new();
    }

    let mut out = BTreeSet::new();
    for fm in new.files() {
        let path = fm.path();
        let content_changed = match old.file(path) {
            None => true,
            Some(prev) => prev.content_hash() != fm.content_hash(),
        };
        if content_changed {
            tracing::debug!(path, "content changed");
            out.insert(path.to_string());
        } else if !matches_on_disk(fm, install_dir, ctx) {
            tracing::debug!(path, "on-disk size mismatch");
            out.insert(path.to_string());
        }
    }
    out
}

fn matches_on_disk(fm: &FileManifest, install_dir: &Path, ctx: &Context) -> bool {
    if let Some(target) = fm.symlink_target() {
        return ctx.fs().read_link(&install_dir.join(fm.path())).as_deref() == Some(target);
    }
    match ctx.fs().resolve(install_dir, fm.path()) {
        Ok(p) => ctx.fs().file_size(&p) == Some(fm.size()),
        Err(_) => false,
    }
}

/// Paths of `old` that `new` no longer contains.
pub fn removable_files(old: &AppManifest, new: &AppManifest) -> BTreeSet<String> {
    old.files()
        .map(FileManifest::path)
        .filter(|p| new.file(p).is_none())
        .map(str::to_string)
        .collect()
}

/// Files found under `install_dir` that `new` does not track, as relative
/// `/`-separated paths in sorted order.
pub fn removable_on_disk(
    new: &AppManifest,
    install_dir: &Path,
    ctx: &Context,
) -> Result<Vec<String>, ScanError> {
    ctx.fatal().check()?;
    let found = ctx
        .fs()
        .walk_files(install_dir)
        .map_err(|source| ScanError::Walk { path: install_dir.to_path_buf(), source })?;

    let mut out = Vec::new();
    for full in found {
        let Some(rel) = pathdiff::diff_paths(&full, install_dir) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if new.file(&rel).is_none() {
            out.push(rel);
        }
    }
    out.sort();
    tracing::info!(orphans = out.len(), dir = %install_dir.display(), "directory scan finished");
    Ok(out)
}
