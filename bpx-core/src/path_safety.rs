use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("absolute paths are not allowed: {0:?}")]
    Absolute(PathBuf),
    #[error("parent traversal not allowed: {0:?}")]
    ParentTraversal(PathBuf),
    #[error("symlink encountered (not following): {0:?}")]
    Symlink(PathBuf),
    #[error("path escapes root: {0:?}")]
    EscapesRoot(PathBuf),
    #[error("cannot resolve {path:?}: {reason}")]
    Unresolvable { path: PathBuf, reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

/// Manifest paths must be relative and must not climb out of the install
/// directory.
pub fn check_relative(rel: impl AsRef<Path>) -> Result<(), PathError> {
    let rel = rel.as_ref();
    if rel.is_absolute() || rel.has_root() {
        return Err(PathError::Absolute(rel.to_path_buf()));
    }
    for comp in rel.components() {
        match comp {
            Component::ParentDir => return Err(PathError::ParentTraversal(rel.to_path_buf())),
            Component::Prefix(_) | Component::RootDir => {
                return Err(PathError::Absolute(rel.to_path_buf()))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Ensure `rel` is safe relative to `root` on the real disk. Without
/// `follow_symlinks` any symlink on the way is rejected; with it, the
/// canonical path must stay under the canonical root.
pub fn validate_path(root: &Path, rel: &Path, policy: PathPolicy) -> Result<PathBuf, PathError> {
    check_relative(rel)?;
    let candidate = root.join(rel);
    if !policy.follow_symlinks {
        let mut cur = root.to_path_buf();
        for comp in rel.components() {
            cur = cur.join(comp);
            if let Ok(m) = std::fs::symlink_metadata(&cur) {
                if m.file_type().is_symlink() {
                    return Err(PathError::Symlink(cur));
                }
            }
        }
        Ok(candidate)
    } else {
        let unresolvable = |path: &Path, e: std::io::Error| PathError::Unresolvable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let root_can = std::fs::canonicalize(root).map_err(|e| unresolvable(root, e))?;
        let cand_can = std::fs::canonicalize(&candidate).map_err(|e| unresolvable(&candidate, e))?;
        if !cand_can.starts_with(&root_can) {
            return Err(PathError::EscapesRoot(rel.to_path_buf()));
        }
        Ok(cand_can)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths() {
        assert!(check_relative("Engine/Binaries/game.exe").is_ok());
        assert!(check_relative("./a.txt").is_ok());
        assert!(matches!(check_relative("../a.txt"), Err(PathError::ParentTraversal(_))));
        assert!(matches!(check_relative("a/../../b"), Err(PathError::ParentTraversal(_))));
        assert!(matches!(check_relative("/etc/passwd"), Err(PathError::Absolute(_))));
    }
}
