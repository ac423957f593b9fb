use bpx_core::chunk::{ChunkId, ChunkPart};
use bpx_core::context::Context;
use bpx_core::digest::hash_bytes;
use bpx_core::fs::LocalFs;
use bpx_core::manifest::{FileManifest, ManifestBuilder};
use bpx_core::path_safety::{validate_path, PathError, PathPolicy};
use bpx_core::verify::verify_against_directory;
use std::fs;
use std::path::Path;

#[cfg(target_family = "unix")]
fn symlink_dir<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[test]
fn validate_blocks_absolute_and_parent_traversal() {
    let root = Path::new("/data/root");
    assert!(matches!(
        validate_path(root, Path::new("/etc/passwd"), PathPolicy::default()),
        Err(PathError::Absolute(_))
    ));
    assert!(matches!(
        validate_path(root, Path::new("a/../../outside.txt"), PathPolicy::default()),
        Err(PathError::ParentTraversal(_))
    ));
}

#[cfg(target_family = "unix")]
#[test]
fn verify_respects_symlink_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir_all(root.join("target")).unwrap();
    fs::write(root.join("target/file.txt"), b"hello\n").unwrap();
    symlink_dir(root.join("target"), root.join("safe")).unwrap();

    let m = ManifestBuilder::new(1, "Game")
        .file(FileManifest::new(
            "safe/file.txt",
            hash_bytes(b"hello\n"),
            vec![ChunkPart::new(ChunkId::new(1, 0, 0, 0), 0, 6)],
        ))
        .build().unwrap();

    // Not following: the symlinked directory makes the file unreadable.
    let strict = Context::new(Box::new(LocalFs { policy: PathPolicy { follow_symlinks: false } }));
    let rep = verify_against_directory(&m, &root, &strict, &mut |_| {}, &|| false);
    assert!(rep.fatal.is_none());
    assert!(rep.outdated.contains("safe/file.txt"));

    // Following: allowed because it stays under the root.
    let rep = verify_against_directory(&m, &root, &Context::local(), &mut |_| {}, &|| false);
    assert!(rep.all_valid);
}

#[cfg(target_family = "unix")]
#[test]
fn verify_blocks_symlink_escape_even_when_following() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir_all(&root).unwrap();
    fs::write(tmp.path().join("outside.txt"), b"outside\n").unwrap();
    symlink_dir(tmp.path(), root.join("evil")).unwrap();

    let err = validate_path(&root, Path::new("evil/outside.txt"), PathPolicy { follow_symlinks: true })
        .expect_err("expected escape error");
    assert!(err.to_string().contains("escapes root"));

    let m = ManifestBuilder::new(1, "Game")
        .file(FileManifest::new(
            "evil/outside.txt",
            hash_bytes(b"outside\n"),
            vec![ChunkPart::new(ChunkId::new(1, 0, 0, 0), 0, 8)],
        ))
        .build().unwrap();
    let rep = verify_against_directory(&m, &root, &Context::local(), &mut |_| {}, &|| false);
    assert!(!rep.all_valid);
    assert!(rep.outdated.contains("evil/outside.txt"));
}
