use thiserror::Error;

/// A manifest could not be decoded, or a built one could not be encoded
/// faithfully. Both are all-or-nothing, so any of these means no manifest was
/// produced.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed manifest text: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid blob in `{field}`: {reason}")]
    InvalidBlob { field: &'static str, reason: String },

    #[error("invalid chunk identifier {0:?}")]
    InvalidChunkId(String),

    #[error("unsupported manifest version {0}")]
    UnsupportedVersion(i32),

    #[error("duplicate file entry {0:?}")]
    DuplicatePath(String),

    #[error("unsafe file path {0:?}")]
    UnsafePath(String),

    #[error("chunk {chunk} has group {group}, expected 0..=99")]
    GroupOutOfRange { chunk: String, group: u8 },

    #[error("file data entry {path:?} has {parts} chunk parts, expected exactly one")]
    FileDataParts { path: String, parts: usize },

    #[error("chunk {chunk} has size {size}, which does not fit the signed wire form")]
    ChunkSizeOutOfRange { chunk: String, size: u64 },

    #[error("symlink entry {0:?} has an empty target")]
    EmptySymlinkTarget(String),

    #[error("symlink entry {path:?} carries {parts} chunk parts")]
    SymlinkWithParts { path: String, parts: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A long-running scan was stopped because storage became unavailable or the
/// caller raised the fatal signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("operation aborted: {reason}")]
    Aborted { reason: String },
}

/// Directory enumeration failed.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot scan {path:?}: {source}")]
    Walk {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fatal(#[from] FatalError),
}
