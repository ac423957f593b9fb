//! Decide which chunks can be rebuilt from bytes already on disk.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::chunk::{ChunkId, FileChunkPart};
use crate::context::Context;
use crate::error::FatalError;
use crate::manifest::AppManifest;

/// Every place in `old` where a part of a required chunk was installed, keyed
/// by chunk. Parts are listed in file path order, then part order.
pub fn chunk_part_inventory(old: &AppManifest, required: &[ChunkId]) -> HashMap<ChunkId, Vec<FileChunkPart>> {
    let wanted: HashSet<&ChunkId> = required.iter().collect();
    let mut inventory: HashMap<ChunkId, Vec<FileChunkPart>> = HashMap::new();
    for fm in old.files() {
        let mut file_offset = 0u64;
        for part in fm.chunk_parts() {
            if wanted.contains(&part.chunk_id) {
                inventory.entry(part.chunk_id).or_default().push(FileChunkPart {
                    path: fm.path().to_string(),
                    file_offset,
                    chunk_part: *part,
                });
            }
            file_offset += u64::from(part.size);
        }
    }
    inventory
}

/// Whether the union of half-open `intervals` covers `[0, size)` without a gap.
/// Sorts `intervals` in place by lower bound.
pub fn coverage_reaches(intervals: &mut [(u64, u64)], size: u64) -> bool {
    intervals.sort_unstable_by_key(|&(lo, _)| lo);
    let mut cursor = 0u64;
    for &(lo, hi) in intervals.iter() {
        if cursor >= size {
            break;
        }
        if lo > cursor {
            return false;
        }
        cursor = cursor.max(hi);
    }
    cursor >= size
}

/// The subset of `required` that can be assembled from files of the `old`
/// build still present in `install_dir`, in `required` order without repeats.
///
/// A source file is only trusted when it exists, still has the size `old`
/// records for it and is long enough for the referenced range.
pub fn producible_chunks(
    old: &AppManifest,
    install_dir: &Path,
    required: &[ChunkId],
    ctx: &Context,
) -> Result<Vec<ChunkId>, FatalError> {
    let inventory = chunk_part_inventory(old, required);
    let mut disk_sizes: HashMap<&str, Option<u64>> = HashMap::new();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for id in required {
        ctx.fatal().check()?;
        if !seen.insert(*id) {
            continue;
        }
        let Some(parts) = inventory.get(id) else {
            tracing::debug!(chunk = %id, "no local source");
            continue;
        };

        let mut intervals = Vec::with_capacity(parts.len());
        for fcp in parts {
            let on_disk = *disk_sizes.entry(fcp.path.as_str()).or_insert_with(|| {
                ctx.fs()
                    .resolve(install_dir, &fcp.path)
                    .ok()
                    .and_then(|p| ctx.fs().file_size(&p))
            });
            let Some(on_disk) = on_disk else { continue };
            let size = u64::from(fcp.chunk_part.size);
            if size == 0 || on_disk != old.file_size(&fcp.path) || fcp.file_offset + size > on_disk {
                continue;
            }
            let lo = u64::from(fcp.chunk_part.offset);
            intervals.push((lo, lo + size));
        }

        let chunk_size = old.chunk_data_size(id);
        if coverage_reaches(&mut intervals, chunk_size) {
            tracing::debug!(chunk = %id, sources = intervals.len(), "producible");
            out.push(*id);
        } else {
            tracing::debug!(chunk = %id, "incomplete local coverage");
        }
    }

    tracing::info!(required = seen.len(), producible = out.len(), "producibility analysis finished");
    Ok(out)
}
