use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use sha1::{Digest, Sha1};

use crate::context::Context;
use crate::digest::{DigestStream, Sha1Digest};
use crate::error::FatalError;
use crate::manifest::{AppManifest, FileManifest};
use crate::pause::wait_while_paused;

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Every file matched and the scan ran to completion.
    pub all_valid: bool,
    pub outdated: BTreeSet<String>,
    /// Time spent waiting on `should_pause`, excluded from work time.
    pub time_paused: Duration,
    pub files_checked: usize,
    pub bytes_processed: u64,
    /// Set when the scan was aborted; the other fields hold partial results.
    pub fatal: Option<FatalError>,
}

enum FileCheck {
    Match,
    Mismatch,
    Unreadable(String),
}

struct Scan<'a> {
    ctx: &'a Context,
    should_pause: &'a dyn Fn() -> bool,
    progress: &'a mut dyn FnMut(f64),
    build_size: u64,
    done: u64,
    last_reported: f64,
    time_paused: Duration,
    bytes_processed: u64,
}

impl Scan<'_> {
    fn pause(&mut self) {
        wait_while_paused(self.should_pause, self.ctx.options.pause_poll, &mut self.time_paused);
    }

    fn report(&mut self, within_file: u64) {
        if self.build_size == 0 {
            return;
        }
        let f = ((self.done + within_file) as f64 / self.build_size as f64).min(1.0);
        if f > self.last_reported {
            self.last_reported = f;
            (self.progress)(f);
        }
    }

    fn check(&mut self, fm: &FileManifest, dir: &Path) -> FileCheck {
        let ctx = self.ctx;
        if let Some(target) = fm.symlink_target() {
            return match ctx.fs().read_link(&dir.join(fm.path())) {
                Some(t) if t == target => FileCheck::Match,
                Some(_) => FileCheck::Mismatch,
                None => FileCheck::Unreadable("not a symlink".into()),
            };
        }

        let path = match ctx.fs().resolve(dir, fm.path()) {
            Ok(p) => p,
            Err(e) => return FileCheck::Unreadable(e.to_string()),
        };
        let mut reader = match ctx.fs().open(&path) {
            Ok(r) => r,
            Err(e) => return FileCheck::Unreadable(e.to_string()),
        };

        let expected = fm.size();
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; ctx.options.buffer_size.max(1)];
        let mut read_total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => return FileCheck::Unreadable(e.to_string()),
            };
            DigestStream::update(&mut hasher, &buf[..n]);
            read_total += n as u64;
            self.bytes_processed += n as u64;
            self.report(read_total.min(expected));
            self.pause();
            if ctx.fatal().is_raised() {
                return FileCheck::Unreadable("aborted".into());
            }
        }

        let digest: Sha1Digest = DigestStream::finalize(hasher);
        if read_total == expected && digest == *fm.content_hash() {
            FileCheck::Match
        } else {
            FileCheck::Mismatch
        }
    }
}

/// Re-hash every file of `manifest` under `dir`.
///
/// Mismatched, missing and unreadable files land in `outdated` and the scan
/// carries on. The scan stops early only when the context's fatal signal is
/// raised, or when a file cannot be read because `dir` itself is gone.
/// `progress` receives the fraction of `manifest.build_size()` covered so far.
pub fn verify_against_directory(
    manifest: &AppManifest,
    dir: &Path,
    ctx: &Context,
    progress: &mut dyn FnMut(f64),
    should_pause: &dyn Fn() -> bool,
) -> VerifyReport {
    verify_against_directory_with(manifest, dir, ctx, progress, should_pause, &mut |_, _| {})
}

/// [`verify_against_directory`], also calling `on_file(path, matched)` once per
/// file that was fully checked. Files cut short by an abort are not reported.
pub fn verify_against_directory_with(
    manifest: &AppManifest,
    dir: &Path,
    ctx: &Context,
    progress: &mut dyn FnMut(f64),
    should_pause: &dyn Fn() -> bool,
    on_file: &mut dyn FnMut(&str, bool),
) -> VerifyReport {
    let mut scan = Scan {
        ctx,
        should_pause,
        progress,
        build_size: manifest.build_size(),
        done: 0,
        last_reported: 0.0,
        time_paused: Duration::ZERO,
        bytes_processed: 0,
    };
    let mut outdated = BTreeSet::new();
    let mut files_checked = 0usize;
    let mut fatal = None;

    for fm in manifest.files() {
        if let Err(e) = ctx.fatal().check() {
            fatal = Some(e);
            break;
        }
        scan.pause();

        let matched = match scan.check(fm, dir) {
            FileCheck::Match => {
                tracing::debug!(path = fm.path(), "ok");
                true
            }
            FileCheck::Mismatch => {
                tracing::debug!(path = fm.path(), "hash mismatch");
                outdated.insert(fm.path().to_string());
                false
            }
            FileCheck::Unreadable(reason) => {
                if !ctx.fatal().is_raised() && !ctx.fs().exists(dir) {
                    ctx.fatal().raise(format!("install directory {} is no longer available", dir.display()));
                }
                if let Err(e) = ctx.fatal().check() {
                    fatal = Some(e);
                    break;
                }
                tracing::debug!(path = fm.path(), %reason, "unreadable");
                outdated.insert(fm.path().to_string());
                false
            }
        };
        files_checked += 1;
        on_file(fm.path(), matched);
        scan.done += fm.size();
        scan.report(0);
    }

    if let Some(e) = &fatal {
        tracing::warn!(files_checked, "verification aborted: {e}");
    } else {
        if scan.last_reported < 1.0 {
            (scan.progress)(1.0);
        }
        tracing::info!(files_checked, outdated = outdated.len(), "verification finished");
    }

    VerifyReport {
        all_valid: fatal.is_none() && outdated.is_empty(),
        outdated,
        time_paused: scan.time_paused,
        files_checked,
        bytes_processed: scan.bytes_processed,
        fatal,
    }
}
