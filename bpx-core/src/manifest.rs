use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::chunk::{ChunkId, ChunkPart, GROUP_COUNT};
use crate::custom_field::CustomField;
use crate::digest::Sha1Digest;
use crate::error::DecodeError;
use crate::path_safety::check_relative;
use crate::version::ManifestVersion;

/// One installed file and the chunk parts that reproduce it, in order.
#[derive(Clone, Debug)]
pub struct FileManifest {
    path: String,
    content_hash: Sha1Digest,
    chunk_parts: Vec<ChunkPart>,
    is_executable: bool,
    symlink_target: Option<String>,
    size: OnceLock<u64>,
}

impl FileManifest {
    pub fn new(path: impl Into<String>, content_hash: Sha1Digest, chunk_parts: Vec<ChunkPart>) -> Self {
        Self {
            path: path.into(),
            content_hash,
            chunk_parts,
            is_executable: false,
            symlink_target: None,
            size: OnceLock::new(),
        }
    }

    /// A symlink entry carries no chunk data.
    pub fn symlink(path: impl Into<String>, content_hash: Sha1Digest, target: impl Into<String>) -> Self {
        let mut fm = Self::new(path, content_hash, Vec::new());
        fm.symlink_target = Some(target.into());
        fm
    }

    pub fn with_executable(mut self, is_executable: bool) -> Self {
        self.is_executable = is_executable;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_hash(&self) -> &Sha1Digest {
        &self.content_hash
    }

    pub fn chunk_parts(&self) -> &[ChunkPart] {
        &self.chunk_parts
    }

    pub fn is_executable(&self) -> bool {
        self.is_executable
    }

    pub fn symlink_target(&self) -> Option<&str> {
        self.symlink_target.as_deref()
    }

    /// Sum of chunk part sizes, computed on first use.
    pub fn size(&self) -> u64 {
        *self.size.get_or_init(|| self.chunk_parts.iter().map(|p| u64::from(p.size)).sum())
    }
}

impl PartialEq for FileManifest {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.content_hash == other.content_hash
            && self.chunk_parts == other.chunk_parts
            && self.is_executable == other.is_executable
            && self.symlink_target == other.symlink_target
    }
}

impl Eq for FileManifest {}

/// A build: identity, file list and chunk metadata.
///
/// Populated once (by [`crate::codec::deserialize`] or [`ManifestBuilder`]) and
/// read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct AppManifest {
    pub(crate) version: ManifestVersion,
    pub(crate) is_file_data: bool,
    pub(crate) app_id: u32,
    pub(crate) app_name: String,
    pub(crate) build_version: String,
    pub(crate) launch_exe: String,
    pub(crate) launch_command: String,
    pub(crate) prereq_name: String,
    pub(crate) prereq_path: String,
    pub(crate) prereq_args: String,
    pub(crate) files: BTreeMap<String, FileManifest>,
    pub(crate) chunk_hashes: BTreeMap<ChunkId, u64>,
    pub(crate) chunk_groups: BTreeMap<ChunkId, u8>,
    pub(crate) chunk_sizes: BTreeMap<ChunkId, u64>,
    pub(crate) custom_fields: BTreeMap<String, CustomField>,
    pub(crate) file_data_index: HashMap<ChunkId, String>,
    pub(crate) total_build_size: u64,
}

impl AppManifest {
    pub(crate) fn empty() -> Self {
        Self {
            version: ManifestVersion::LATEST,
            is_file_data: false,
            app_id: 0,
            app_name: String::new(),
            build_version: String::new(),
            launch_exe: String::new(),
            launch_command: String::new(),
            prereq_name: String::new(),
            prereq_path: String::new(),
            prereq_args: String::new(),
            files: BTreeMap::new(),
            chunk_hashes: BTreeMap::new(),
            chunk_groups: BTreeMap::new(),
            chunk_sizes: BTreeMap::new(),
            custom_fields: BTreeMap::new(),
            file_data_index: HashMap::new(),
            total_build_size: 0,
        }
    }

    /// Rules the wire form enforces on read. A manifest that passes serializes
    /// to text that decodes back to an equal manifest.
    pub(crate) fn check_encodable(&self) -> Result<(), DecodeError> {
        for fm in self.files.values() {
            check_relative(&fm.path).map_err(|_| DecodeError::UnsafePath(fm.path.clone()))?;
            match fm.symlink_target.as_deref() {
                Some("") => return Err(DecodeError::EmptySymlinkTarget(fm.path.clone())),
                Some(_) => {}
                None if self.is_file_data && fm.chunk_parts.len() != 1 => {
                    return Err(DecodeError::FileDataParts { path: fm.path.clone(), parts: fm.chunk_parts.len() });
                }
                None => {}
            }
        }
        for (id, &group) in &self.chunk_groups {
            if group >= GROUP_COUNT {
                return Err(DecodeError::GroupOutOfRange { chunk: id.to_string(), group });
            }
        }
        for (id, &size) in &self.chunk_sizes {
            if i64::try_from(size).is_err() {
                return Err(DecodeError::ChunkSizeOutOfRange { chunk: id.to_string(), size });
            }
        }
        Ok(())
    }

    /// Rebuild everything derived from the stored fields.
    pub(crate) fn finish_population(&mut self) {
        self.file_data_index.clear();
        if self.is_file_data {
            for fm in self.files.values() {
                if let Some(part) = fm.chunk_parts.first() {
                    self.file_data_index.insert(part.chunk_id, fm.path.clone());
                }
            }
        }
        self.total_build_size = self.files.values().map(FileManifest::size).sum();
    }

    pub fn version(&self) -> ManifestVersion {
        self.version
    }
    pub fn is_file_data(&self) -> bool {
        self.is_file_data
    }
    pub fn app_id(&self) -> u32 {
        self.app_id
    }
    pub fn app_name(&self) -> &str {
        &self.app_name
    }
    pub fn build_version(&self) -> &str {
        &self.build_version
    }
    pub fn launch_exe(&self) -> &str {
        &self.launch_exe
    }
    pub fn launch_command(&self) -> &str {
        &self.launch_command
    }
    pub fn prereq_name(&self) -> &str {
        &self.prereq_name
    }
    pub fn prereq_path(&self) -> &str {
        &self.prereq_path
    }
    pub fn prereq_args(&self) -> &str {
        &self.prereq_args
    }
    pub fn files(&self) -> impl Iterator<Item = &FileManifest> {
        self.files.values()
    }
    pub fn chunk_hashes(&self) -> &BTreeMap<ChunkId, u64> {
        &self.chunk_hashes
    }
    pub fn chunk_groups(&self) -> &BTreeMap<ChunkId, u8> {
        &self.chunk_groups
    }
    pub fn chunk_sizes(&self) -> &BTreeMap<ChunkId, u64> {
        &self.chunk_sizes
    }
    pub fn custom_fields(&self) -> &BTreeMap<String, CustomField> {
        &self.custom_fields
    }
}

/// Programmatic population of an [`AppManifest`].
#[derive(Debug)]
pub struct ManifestBuilder {
    inner: AppManifest,
    explicit_groups: bool,
}

impl ManifestBuilder {
    pub fn new(app_id: u32, app_name: impl Into<String>) -> Self {
        let mut inner = AppManifest::empty();
        inner.app_id = app_id;
        inner.app_name = app_name.into();
        Self { inner, explicit_groups: false }
    }

    pub fn version(mut self, v: ManifestVersion) -> Self {
        self.inner.version = v;
        self
    }

    pub fn file_data(mut self, is_file_data: bool) -> Self {
        self.inner.is_file_data = is_file_data;
        self
    }

    pub fn build_version(mut self, s: impl Into<String>) -> Self {
        self.inner.build_version = s.into();
        self
    }

    pub fn launch(mut self, exe: impl Into<String>, command: impl Into<String>) -> Self {
        self.inner.launch_exe = exe.into();
        self.inner.launch_command = command.into();
        self
    }

    pub fn prereq(mut self, name: impl Into<String>, path: impl Into<String>, args: impl Into<String>) -> Self {
        self.inner.prereq_name = name.into();
        self.inner.prereq_path = path.into();
        self.inner.prereq_args = args.into();
        self
    }

    /// Later entries with the same path replace earlier ones.
    pub fn file(mut self, fm: FileManifest) -> Self {
        self.inner.files.insert(fm.path.clone(), fm);
        self
    }

    pub fn chunk(mut self, id: ChunkId, rolling_hash: u64) -> Self {
        self.inner.chunk_hashes.insert(id, rolling_hash);
        self
    }

    pub fn chunk_size(mut self, id: ChunkId, size: u64) -> Self {
        self.inner.chunk_sizes.insert(id, size);
        self
    }

    /// Groups must be below 100; [`ManifestBuilder::build`] rejects the rest.
    pub fn chunk_group(mut self, id: ChunkId, group: u8) -> Self {
        self.inner.chunk_groups.insert(id, group);
        self.explicit_groups = true;
        self
    }

    pub fn custom_field(mut self, name: impl Into<String>, value: CustomField) -> Self {
        self.inner.custom_fields.insert(name.into(), value);
        self
    }

    /// Finish population. Without explicit groups every referenced chunk gets
    /// its legacy group, exactly as a load of a group-less manifest would.
    ///
    /// Fails with the error a load would report for the serialized form, so a
    /// built manifest always survives a save and load unchanged.
    pub fn build(mut self) -> Result<AppManifest, DecodeError> {
        if !self.explicit_groups {
            let ids: Vec<ChunkId> = self
                .inner
                .files
                .values()
                .flat_map(|f| f.chunk_parts.iter().map(|p| p.chunk_id))
                .chain(self.inner.chunk_hashes.keys().copied())
                .collect();
            for id in ids {
                self.inner.chunk_groups.insert(id, id.legacy_group());
            }
        }
        self.inner.check_encodable()?;
        self.inner.finish_population();
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_sum_of_parts() {
        let id = ChunkId::new(1, 2, 3, 4);
        let fm = FileManifest::new(
            "a.bin",
            Sha1Digest::default(),
            vec![ChunkPart::new(id, 0, 10), ChunkPart::new(id, 10, 32)],
        );
        assert_eq!(fm.size(), 42);
        assert_eq!(fm.size(), 42);
        assert_eq!(fm.clone().size(), 42);
    }

    #[test]
    fn equality_ignores_size_memo() {
        let fm = FileManifest::new("x", Sha1Digest::default(), vec![ChunkPart::new(ChunkId::new(1, 0, 0, 0), 0, 5)]);
        let fresh = fm.clone();
        let _ = fm.size();
        let unmemoized = FileManifest::new("x", Sha1Digest::default(), fresh.chunk_parts().to_vec());
        assert_eq!(fm, unmemoized);
    }

    #[test]
    fn builder_totals_and_groups() {
        let c = ChunkId::new(9, 9, 9, 9);
        let m = ManifestBuilder::new(7, "Game")
            .file(FileManifest::new("a", Sha1Digest::default(), vec![ChunkPart::new(c, 0, 100)]))
            .file(FileManifest::new("b", Sha1Digest::default(), vec![ChunkPart::new(c, 100, 50)]))
            .chunk(c, 0xDEAD)
            .build()
            .unwrap();
        assert_eq!(m.total_build_size, 150);
        assert_eq!(m.chunk_groups()[&c], c.legacy_group());
    }

    #[test]
    fn file_data_index_built() {
        let c = ChunkId::new(1, 1, 1, 1);
        let m = ManifestBuilder::new(1, "App")
            .file_data(true)
            .file(FileManifest::new("whole.pak", Sha1Digest::default(), vec![ChunkPart::new(c, 0, 77)]))
            .build()
            .unwrap();
        assert_eq!(m.file_data_index.get(&c).map(String::as_str), Some("whole.pak"));
    }

    #[test]
    fn builder_rejects_what_a_load_would() {
        let c = ChunkId::new(3, 1, 4, 1);
        let one = || vec![ChunkPart::new(c, 0, 8)];

        let err = ManifestBuilder::new(1, "App").chunk_group(c, 100).build().unwrap_err();
        assert!(matches!(err, DecodeError::GroupOutOfRange { group: 100, .. }));
        assert!(ManifestBuilder::new(1, "App").chunk_group(c, 99).build().is_ok());

        let err = ManifestBuilder::new(1, "App").chunk_size(c, 1 << 63).build().unwrap_err();
        assert!(matches!(err, DecodeError::ChunkSizeOutOfRange { size, .. } if size == 1 << 63));

        let err = ManifestBuilder::new(1, "App")
            .file(FileManifest::new("../up.bin", Sha1Digest::default(), one()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsafePath(_)));

        let err = ManifestBuilder::new(1, "App")
            .file(FileManifest::symlink("lib.so", Sha1Digest::default(), ""))
            .build()
            .unwrap_err();
        assert!(matches!(err, DecodeError::EmptySymlinkTarget(p) if p == "lib.so"));

        let err = ManifestBuilder::new(1, "App")
            .file_data(true)
            .file(FileManifest::new("empty.pak", Sha1Digest::default(), Vec::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DecodeError::FileDataParts { parts: 0, .. }));

        // Symlinks carry no data, so a file-data build may contain them.
        assert!(ManifestBuilder::new(1, "App")
            .file_data(true)
            .file(FileManifest::new("whole.pak", Sha1Digest::default(), one()))
            .file(FileManifest::symlink("link.pak", Sha1Digest::default(), "whole.pak"))
            .build()
            .is_ok());
    }
}
