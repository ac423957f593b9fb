use anyhow::{anyhow, Context as _, Result};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use bpx_core::chunk::ChunkId;
use bpx_core::codec;
use bpx_core::context::{Context, ScanOptions};
use bpx_core::diff::{outdated_files, removable_files, removable_on_disk};
use bpx_core::manifest::AppManifest;
use bpx_core::produce::producible_chunks;
use bpx_core::progress::Progress;
use bpx_core::verify::verify_against_directory_with;

const DEFAULT_BUFFER: usize = 1 << 20;

#[derive(Parser)]
#[command(name = "bpx", version, about = "bpx: build manifest inspection, diffing and verification")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print manifest identity, counts and sizes
    Info { manifest: PathBuf },
    /// Re-hash an installed build against its manifest
    Verify {
        manifest: PathBuf,
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        progress: bool,
        #[arg(long, default_value_t = DEFAULT_BUFFER)]
        buffer_size: usize,
    },
    /// List files to (re)write and files to delete when patching
    Diff {
        #[arg(long)]
        old: Option<PathBuf>,
        new: PathBuf,
        dir: PathBuf,
    },
    /// List files on disk that the manifest does not track
    Orphans {
        manifest: PathBuf,
        dir: PathBuf,
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Split the chunks a patch needs into locally producible and to download
    Producible { old: PathBuf, new: PathBuf, dir: PathBuf },
    /// List chunks required by files (all files when none are given)
    Chunks {
        manifest: PathBuf,
        paths: Vec<String>,
        #[arg(long, default_value_t = false)]
        unique: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Cmd::Info { manifest } => info(&manifest)?,
        Cmd::Verify { manifest, dir, progress, buffer_size } => verify(&manifest, &dir, progress, buffer_size)?,
        Cmd::Diff { old, new, dir } => diff(old.as_deref(), &new, &dir)?,
        Cmd::Orphans { manifest, dir, exclude } => orphans(&manifest, &dir, &exclude)?,
        Cmd::Producible { old, new, dir } => producible(&old, &new, &dir)?,
        Cmd::Chunks { manifest, paths, unique } => chunks(&manifest, &paths, unique)?,
    }
    Ok(())
}

fn load(ctx: &Context, path: &Path) -> Result<AppManifest> {
    codec::load_from_file(ctx, path).with_context(|| format!("load manifest {}", path.display()))
}

fn human(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut v = bytes as f64;
    let mut u = 0;
    while v >= 1024.0 && u + 1 < UNITS.len() { v /= 1024.0; u += 1; }
    if u == 0 { format!("{} B", bytes) } else { format!("{:.1} {} ({} B)", v, UNITS[u], bytes) }
}

fn info(manifest_path: &Path) -> Result<()> {
    let ctx = Context::local();
    let m = load(&ctx, manifest_path)?;
    let fingerprint = blake3::hash(codec::serialize(&m).as_bytes());
    println!("App: {} (id {})", m.app_name(), m.app_id());
    println!("Build version: {}", m.build_version());
    println!("Manifest version: {:?} ({})", m.version(), m.version().as_i32());
    println!("Kind: {}", if m.is_file_data() { "file data" } else { "chunked" });
    if !m.launch_exe().is_empty() { println!("Launch: {} {}", m.launch_exe(), m.launch_command()); }
    if !m.prereq_name().is_empty() { println!("Prerequisite: {} ({} {})", m.prereq_name(), m.prereq_path(), m.prereq_args()); }
    println!("Files: {}", m.num_files());
    println!("Chunks: {}", m.data_list().len());
    println!("Build size: {}", human(m.build_size()));
    println!("Download size: {}", human(m.download_size()));
    for (k, v) in m.custom_fields() { println!("Custom {}: {}", k, v.as_string()); }
    println!("Fingerprint: {}", fingerprint.to_hex());
    Ok(())
}

fn verify(manifest_path: &Path, dir: &Path, show_progress: bool, buffer_size: usize) -> Result<()> {
    if buffer_size == 0 { return Err(anyhow!("--buffer-size must be positive")); }
    let ctx = Context::local().with_options(ScanOptions { buffer_size, ..ScanOptions::default() });
    let m = load(&ctx, manifest_path)?;
    let prog = Progress::new(show_progress);
    prog.set_stage("Verifying");
    prog.set_files_total(m.num_files());
    prog.start();
    let rep = {
        let mut sink = prog.sink();
        let mut files = prog.file_sink();
        verify_against_directory_with(&m, dir, &ctx, &mut sink, &|| false, &mut files)
    };
    prog.stop();
    eprintln!(
        "Files checked={}, outdated={}; read {}; paused {:.1}s",
        rep.files_checked, rep.outdated.len(), human(rep.bytes_processed), rep.time_paused.as_secs_f64()
    );
    if let Some(e) = rep.fatal { return Err(anyhow!(e)).context("verification aborted"); }
    for p in &rep.outdated { println!("{}", p); }
    if rep.all_valid { println!("OK"); } else { println!("BAD"); }
    Ok(())
}

fn diff(old_path: Option<&Path>, new_path: &Path, dir: &Path) -> Result<()> {
    let ctx = Context::local();
    let new = load(&ctx, new_path)?;
    let old = old_path.map(|p| load(&ctx, p)).transpose()?;
    let outdated = outdated_files(old.as_ref(), &new, dir, &ctx);
    let paths: Vec<&String> = outdated.iter().collect();
    for p in &paths { println!("update {}", p); }
    if let Some(old) = &old {
        for p in removable_files(old, &new) { println!("remove {}", p); }
    }
    let update_bytes: u64 = paths.iter().map(|p| new.file_size(p)).sum();
    eprintln!("Files to update: {} ({})", outdated.len(), human(update_bytes));
    Ok(())
}

fn orphans(manifest_path: &Path, dir: &Path, exclude: &[String]) -> Result<()> {
    let ctx = Context::local();
    let m = load(&ctx, manifest_path)?;
    let mut excb = GlobSetBuilder::new();
    for g in exclude { excb.add(Glob::new(g).with_context(|| format!("bad glob {}", g))?); }
    let exc = excb.build()?;
    let found = removable_on_disk(&m, dir, &ctx).with_context(|| format!("scan {}", dir.display()))?;
    let mut n = 0usize;
    for p in found.iter().filter(|p| !exc.is_match(p.as_str())) { println!("{}", p); n += 1; }
    eprintln!("Orphaned files: {}", n);
    Ok(())
}

fn producible(old_path: &Path, new_path: &Path, dir: &Path) -> Result<()> {
    let ctx = Context::local();
    let old = load(&ctx, old_path)?;
    let new = load(&ctx, new_path)?;
    let outdated: Vec<String> = outdated_files(Some(&old), &new, dir, &ctx).into_iter().collect();
    let required = new.chunks_required_for(&outdated, true);
    let local = producible_chunks(&old, dir, &required, &ctx).context("producibility analysis")?;
    let local_set: HashSet<ChunkId> = local.iter().copied().collect();
    let download: Vec<ChunkId> = required.iter().copied().filter(|id| !local_set.contains(id)).collect();
    for id in &local { println!("produce {}", id); }
    for id in &download { println!("download {}", id); }
    eprintln!(
        "Chunks required={}, producible={} ({}), download={} ({})",
        required.len(), local.len(), human(new.data_size(&local)), download.len(), human(new.data_size(&download))
    );
    Ok(())
}

fn chunks(manifest_path: &Path, paths: &[String], unique: bool) -> Result<()> {
    let ctx = Context::local();
    let m = load(&ctx, manifest_path)?;
    let all: Vec<String>;
    let paths = if paths.is_empty() {
        all = m.file_list().into_iter().map(str::to_string).collect();
        &all[..]
    } else {
        for p in paths { if m.file(p).is_none() { return Err(anyhow!("no file {} in manifest", p)); } }
        paths
    };
    let ids = m.chunks_required_for(paths, unique);
    for id in &ids {
        let group = m.chunk_group(id).map(|g| g.to_string()).unwrap_or_else(|| "-".into());
        println!("{} group={} size={} refs={}", id, group, m.chunk_data_size(id), m.chunk_reference_count(id));
    }
    eprintln!("Chunks: {} ({})", ids.len(), human(m.data_size(&ids)));
    Ok(())
}
