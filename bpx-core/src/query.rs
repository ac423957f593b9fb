//! Read-only queries over a loaded manifest.

use std::collections::HashSet;

use crate::chunk::{ChunkId, LEGACY_CHUNK_SIZE};
use crate::custom_field::CustomField;
use crate::digest::Sha1Digest;
use crate::manifest::{AppManifest, FileManifest};

/// Where a chunk's size comes from. Tiers are tried in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkSizeSource {
    /// Listed in the manifest's chunk size list.
    Explicit(u64),
    /// File-data manifest: the chunk is the whole file it names.
    DerivedFromFileData(u64),
    /// Manifests without size information: every chunk has the fixed size.
    LegacyConstant,
}

impl ChunkSizeSource {
    pub fn bytes(self) -> u64 {
        match self {
            ChunkSizeSource::Explicit(n) | ChunkSizeSource::DerivedFromFileData(n) => n,
            ChunkSizeSource::LegacyConstant => LEGACY_CHUNK_SIZE,
        }
    }
}

impl AppManifest {
    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    pub fn file_list(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// Chunk identifiers carrying a rolling hash, i.e. the downloadable chunks.
    pub fn data_list(&self) -> Vec<ChunkId> {
        self.chunk_hashes.keys().copied().collect()
    }

    pub fn file(&self, path: &str) -> Option<&FileManifest> {
        self.files.get(path)
    }

    /// 0 for unknown paths.
    pub fn file_size(&self, path: &str) -> u64 {
        self.files.get(path).map(FileManifest::size).unwrap_or(0)
    }

    pub fn files_size<S: AsRef<str>>(&self, paths: &[S]) -> u64 {
        paths.iter().map(|p| self.file_size(p.as_ref())).sum()
    }

    pub fn build_size(&self) -> u64 {
        self.total_build_size
    }

    pub fn chunk_size_source(&self, id: &ChunkId) -> ChunkSizeSource {
        if let Some(&n) = self.chunk_sizes.get(id) {
            return ChunkSizeSource::Explicit(n);
        }
        if self.is_file_data {
            if let Some(path) = self.file_data_index.get(id) {
                return ChunkSizeSource::DerivedFromFileData(self.file_size(path));
            }
        }
        ChunkSizeSource::LegacyConstant
    }

    pub fn chunk_data_size(&self, id: &ChunkId) -> u64 {
        self.chunk_size_source(id).bytes()
    }

    pub fn data_size(&self, ids: &[ChunkId]) -> u64 {
        ids.iter().map(|id| self.chunk_data_size(id)).sum()
    }

    /// Bytes to fetch for a full install: each unique chunk once.
    pub fn download_size(&self) -> u64 {
        if self.is_file_data {
            return self.build_size();
        }
        self.chunk_hashes.keys().map(|id| self.chunk_data_size(id)).sum()
    }

    /// Number of (file, chunk part) pairs that reference `id`.
    pub fn chunk_reference_count(&self, id: &ChunkId) -> u32 {
        self.files
            .values()
            .flat_map(|f| f.chunk_parts())
            .filter(|p| p.chunk_id == *id)
            .count() as u32
    }

    /// Chunks making up `paths`, in file then part order. Unknown paths are
    /// skipped. With `unique`, only the first occurrence of each id is kept.
    pub fn chunks_required_for<S: AsRef<str>>(&self, paths: &[S], unique: bool) -> Vec<ChunkId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for p in paths {
            let Some(fm) = self.files.get(p.as_ref()) else {
                continue;
            };
            for part in fm.chunk_parts() {
                if !unique || seen.insert(part.chunk_id) {
                    out.push(part.chunk_id);
                }
            }
        }
        out
    }

    pub fn chunk_hash(&self, id: &ChunkId) -> Option<u64> {
        self.chunk_hashes.get(id).copied()
    }

    pub fn chunk_group(&self, id: &ChunkId) -> Option<u8> {
        self.chunk_groups.get(id).copied()
    }

    /// Content hash of the file containing the given file-data chunk.
    pub fn file_data_hash(&self, id: &ChunkId) -> Option<Sha1Digest> {
        self.files
            .values()
            .find(|f| f.chunk_parts().iter().any(|p| p.chunk_id == *id))
            .map(|f| *f.content_hash())
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.get(name)
    }

    pub fn chunk_subdir(&self) -> &'static str {
        self.version.chunk_subdir()
    }

    pub fn file_subdir(&self) -> &'static str {
        self.version.file_subdir()
    }
}
