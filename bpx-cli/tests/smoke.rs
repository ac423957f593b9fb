use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use bpx_core::chunk::{ChunkId, ChunkPart};
use bpx_core::codec::save_to_file;
use bpx_core::digest::hash_bytes;
use bpx_core::manifest::{AppManifest, FileManifest, ManifestBuilder};
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;
use std::process::Command;

fn random_bytes(bytes: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..bytes).map(|_| rng.gen()).collect()
}

/// One chunk per file, sized to the file.
fn manifest_for(files: &[(&str, &[u8])], first_id: u32) -> AppManifest {
    let mut b = ManifestBuilder::new(42, "Demo").build_version("1.0").launch("demo.exe", "");
    for (i, (path, data)) in files.iter().enumerate() {
        let id = ChunkId::new(first_id + i as u32, 7, 7, 7);
        b = b
            .chunk(id, i as u64)
            .chunk_size(id, data.len() as u64)
            .file(FileManifest::new(*path, hash_bytes(data), vec![ChunkPart::new(id, 0, data.len() as u32)]));
    }
    b.build().unwrap()
}

fn install(dir: &Path, files: &[(&str, &[u8])]) {
    for (path, data) in files {
        let p = dir.join(path);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, data).unwrap();
    }
}

#[test]
fn info_prints_identity_and_sizes() {
    let td = assert_fs::TempDir::new().unwrap();
    let a = random_bytes(1000, 1);
    let m = manifest_for(&[("a.bin", &a[..]), ("b.bin", &a[..])], 1);
    save_to_file(&m, &td.child("m.json").path()).unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["info", "m.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("App: Demo (id 42)"))
        .stdout(predicate::str::contains("Files: 2"))
        .stdout(predicate::str::contains("Build size: 2.0 KiB (2000 B)"))
        .stdout(predicate::str::contains("Fingerprint: "));
}

#[test]
fn verify_happy_path_then_corruption() {
    let td = assert_fs::TempDir::new().unwrap();
    let a = random_bytes(64 * 1024, 2);
    let b = random_bytes(64 * 1024, 3);
    let files = [("data/a.bin", &a[..]), ("data/b.bin", &b[..])];
    let inst = td.child("inst");
    inst.create_dir_all().unwrap();
    install(inst.path(), &files);
    save_to_file(&manifest_for(&files, 1), &td.child("m.json").path()).unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["verify", "m.json", "inst", "--buffer-size", "4096"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));

    {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = std::fs::OpenOptions::new().write(true).open(inst.child("data/b.bin").path()).unwrap();
        f.seek(SeekFrom::Start(8 * 1024)).unwrap();
        f.write_all(&[0xFFu8; 4096]).unwrap();
    }

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["verify", "m.json", "inst"])
        .assert()
        .success()
        .stdout(predicate::str::contains("data/b.bin"))
        .stdout(predicate::str::contains("BAD"))
        .stdout(predicate::str::contains("data/a.bin").not());
}

#[test]
fn verify_missing_install_dir_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    let a = random_bytes(100, 4);
    save_to_file(&manifest_for(&[("a.bin", &a[..])], 1), &td.child("m.json").path()).unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["verify", "m.json", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("verification aborted"));
}

#[test]
fn corrupt_manifest_is_reported() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("m.json").write_str("{\"AppID\": \"oops\"").unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["info", "m.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("load manifest"));
}

#[test]
fn diff_orphans_and_producible() {
    let td = assert_fs::TempDir::new().unwrap();
    let keep = random_bytes(2048, 5);
    let gone = random_bytes(512, 6);
    let moved = random_bytes(1024, 7);
    let inst = td.child("inst");
    inst.create_dir_all().unwrap();

    let old_files = [("keep.bin", &keep[..]), ("gone.bin", &gone[..]), ("pak/old.pak", &moved[..])];
    install(inst.path(), &old_files);
    inst.child("crash.log").write_str("boom").unwrap();
    let old = manifest_for(&old_files, 1);
    save_to_file(&old, &td.child("old.json").path()).unwrap();

    // The new build keeps keep.bin, drops gone.bin and ships the bytes of
    // old.pak under a new name, backed by the same chunk.
    let moved_id = ChunkId::new(3, 7, 7, 7);
    let fresh_id = ChunkId::new(99, 7, 7, 7);
    let fresh = random_bytes(300, 8);
    let new = ManifestBuilder::new(42, "Demo")
        .file(FileManifest::new("keep.bin", hash_bytes(&keep), vec![ChunkPart::new(ChunkId::new(1, 7, 7, 7), 0, 2048)]))
        .file(FileManifest::new("pak/new.pak", hash_bytes(&moved), vec![ChunkPart::new(moved_id, 0, 1024)]))
        .file(FileManifest::new("fresh.bin", hash_bytes(&fresh), vec![ChunkPart::new(fresh_id, 0, 300)]))
        .chunk(ChunkId::new(1, 7, 7, 7), 0)
        .chunk(moved_id, 2)
        .chunk(fresh_id, 3)
        .chunk_size(ChunkId::new(1, 7, 7, 7), 2048)
        .chunk_size(moved_id, 1024)
        .chunk_size(fresh_id, 300)
        .build().unwrap();
    save_to_file(&new, &td.child("new.json").path()).unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["diff", "--old", "old.json", "new.json", "inst"])
        .assert()
        .success()
        .stdout(predicate::str::contains("update fresh.bin"))
        .stdout(predicate::str::contains("update pak/new.pak"))
        .stdout(predicate::str::contains("remove gone.bin"))
        .stdout(predicate::str::contains("update keep.bin").not());

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["orphans", "new.json", "inst", "--exclude", "*.log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gone.bin"))
        .stdout(predicate::str::contains("pak/old.pak"))
        .stdout(predicate::str::contains("crash.log").not());

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["producible", "old.json", "new.json", "inst"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("produce {}", moved_id)))
        .stdout(predicate::str::contains(format!("download {}", fresh_id)));
}

#[test]
fn chunks_lists_unique_ids() {
    let td = assert_fs::TempDir::new().unwrap();
    let a = random_bytes(100, 9);
    let m = manifest_for(&[("a.bin", &a[..]), ("b.bin", &a[..])], 10);
    save_to_file(&m, &td.child("m.json").path()).unwrap();

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["chunks", "m.json", "b.bin", "--unique"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{} group=", ChunkId::new(11, 7, 7, 7))))
        .stdout(predicate::str::contains("size=100 refs=1"));

    Command::cargo_bin("bpx").unwrap()
        .current_dir(td.path())
        .args(["chunks", "m.json", "missing.bin"])
        .assert()
        .failure();
}
