/// Manifest format versions, oldest first. Ordering is meaningful: later
/// versions store more fields explicitly instead of relying on derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ManifestVersion {
    Original = 0,
    CustomFields = 1,
    StartStoringVersion = 2,
    DataFileRenames = 3,
    StoresIfChunkOrFileData = 4,
    StoresDataGroupNumbers = 5,
    ChunkCompressionSupport = 6,
    StoresPrerequisitesInfo = 7,
    StoresChunkFileSizes = 8,
}

impl ManifestVersion {
    pub const LATEST: ManifestVersion = ManifestVersion::StoresChunkFileSizes;

    /// Version assumed for manifests written before the version was stored.
    pub const UNVERSIONED: ManifestVersion = ManifestVersion::CustomFields;

    pub fn from_i32(v: i32) -> Option<Self> {
        use ManifestVersion::*;
        Some(match v {
            0 => Original,
            1 => CustomFields,
            2 => StartStoringVersion,
            3 => DataFileRenames,
            4 => StoresIfChunkOrFileData,
            5 => StoresDataGroupNumbers,
            6 => ChunkCompressionSupport,
            7 => StoresPrerequisitesInfo,
            8 => StoresChunkFileSizes,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Cloud directory holding chunk files for this version.
    pub fn chunk_subdir(self) -> &'static str {
        if self < ManifestVersion::DataFileRenames {
            "Chunks"
        } else if self < ManifestVersion::ChunkCompressionSupport {
            "ChunksV2"
        } else {
            "ChunksV3"
        }
    }

    /// Cloud directory holding whole-file data for this version.
    pub fn file_subdir(self) -> &'static str {
        if self < ManifestVersion::DataFileRenames {
            "Files"
        } else {
            "FilesV2"
        }
    }
}

impl Default for ManifestVersion {
    fn default() -> Self {
        Self::LATEST
    }
}
