//! Structured-text (JSON) form of an [`AppManifest`].
//!
//! Integers and hashes are written as decimal blobs (see [`crate::blob`]).
//! Fields added by later format versions are optional on read and fall back to
//! their legacy derivation when absent.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blob::{self, BlobValue};
use crate::chunk::{ChunkId, ChunkPart, GROUP_COUNT};
use crate::context::Context;
use crate::custom_field::CustomField;
use crate::digest::{Sha1Digest, DIGEST_LEN};
use crate::error::DecodeError;
use crate::manifest::{AppManifest, FileManifest};
use crate::path_safety::check_relative;
use crate::version::ManifestVersion;

#[derive(Serialize, Deserialize)]
struct ChunkPartDoc {
    #[serde(rename = "Guid")]
    guid: String,
    #[serde(rename = "Offset")]
    offset: String,
    #[serde(rename = "Size")]
    size: String,
}

#[derive(Serialize, Deserialize)]
struct FileDoc {
    #[serde(rename = "Filename")]
    filename: Option<String>,
    #[serde(rename = "FileHash")]
    file_hash: Option<String>,
    #[serde(rename = "bIsUnixExecutable", default, skip_serializing_if = "Option::is_none")]
    is_unix_executable: Option<bool>,
    #[serde(rename = "SymlinkTarget", default, skip_serializing_if = "Option::is_none")]
    symlink_target: Option<String>,
    #[serde(rename = "FileChunkParts", default, skip_serializing_if = "Option::is_none")]
    chunk_parts: Option<Vec<ChunkPartDoc>>,
}

#[derive(Serialize, Deserialize)]
struct ManifestDoc {
    #[serde(rename = "ManifestFileVersion", default)]
    version: Option<String>,
    #[serde(rename = "bIsFileData", default)]
    is_file_data: Option<serde_json::Value>,
    #[serde(rename = "AppID", default)]
    app_id: Option<String>,
    #[serde(rename = "AppNameString", default)]
    app_name: Option<String>,
    #[serde(rename = "BuildVersionString", default)]
    build_version: Option<String>,
    #[serde(rename = "LaunchExeString", default)]
    launch_exe: Option<String>,
    #[serde(rename = "LaunchCommand", default)]
    launch_command: Option<String>,
    #[serde(rename = "PrereqName", default)]
    prereq_name: Option<String>,
    #[serde(rename = "PrereqPath", default)]
    prereq_path: Option<String>,
    #[serde(rename = "PrereqArgs", default)]
    prereq_args: Option<String>,
    #[serde(rename = "FileManifestList", default)]
    files: Option<Vec<FileDoc>>,
    #[serde(rename = "ChunkHashList", default)]
    chunk_hashes: Option<BTreeMap<String, String>>,
    #[serde(rename = "DataGroupList", default)]
    chunk_groups: Option<BTreeMap<String, String>>,
    #[serde(rename = "ChunkFilesizeList", default)]
    chunk_sizes: Option<BTreeMap<String, String>>,
    #[serde(rename = "CustomFields", default)]
    custom_fields: Option<BTreeMap<String, String>>,
}

fn to_doc(m: &AppManifest) -> ManifestDoc {
    let files = m
        .files()
        .map(|fm| {
            let chunk_parts = match fm.symlink_target() {
                Some(_) => None,
                None => Some(
                    fm.chunk_parts()
                        .iter()
                        .map(|p| ChunkPartDoc {
                            guid: p.chunk_id.to_string(),
                            offset: p.offset.to_blob(),
                            size: p.size.to_blob(),
                        })
                        .collect(),
                ),
            };
            FileDoc {
                filename: Some(fm.path().to_string()),
                file_hash: Some(blob::to_blob(fm.content_hash().as_bytes())),
                is_unix_executable: fm.is_executable().then_some(true),
                symlink_target: fm.symlink_target().map(str::to_string),
                chunk_parts,
            }
        })
        .collect();
    ManifestDoc {
        version: Some(m.version.as_i32().to_blob()),
        is_file_data: Some(serde_json::Value::Bool(m.is_file_data)),
        app_id: Some(m.app_id.to_blob()),
        app_name: Some(m.app_name.clone()),
        build_version: Some(m.build_version.clone()),
        launch_exe: Some(m.launch_exe.clone()),
        launch_command: Some(m.launch_command.clone()),
        prereq_name: Some(m.prereq_name.clone()),
        prereq_path: Some(m.prereq_path.clone()),
        prereq_args: Some(m.prereq_args.clone()),
        files: Some(files),
        chunk_hashes: Some(m.chunk_hashes.iter().map(|(k, v)| (k.to_string(), v.to_blob())).collect()),
        chunk_groups: Some(m.chunk_groups.iter().map(|(k, v)| (k.to_string(), v.to_blob())).collect()),
        // Population caps sizes at i64::MAX.
        chunk_sizes: Some(m.chunk_sizes.iter().map(|(k, v)| (k.to_string(), (*v as i64).to_blob())).collect()),
        custom_fields: Some(m.custom_fields.iter().map(|(k, v)| (k.clone(), v.as_string())).collect()),
    }
}

/// Compact text form.
pub fn serialize(m: &AppManifest) -> String {
    // A derived Serialize over strings and maps with string keys cannot fail.
    serde_json::to_string(&to_doc(m)).unwrap_or_default()
}

/// Indented text form, for humans.
pub fn serialize_pretty(m: &AppManifest) -> String {
    serde_json::to_string_pretty(&to_doc(m)).unwrap_or_default()
}

fn required<T>(v: Option<T>, field: &'static str) -> Result<T, DecodeError> {
    v.ok_or(DecodeError::MissingField(field))
}

fn parse_blob<T: BlobValue>(text: &str, field: &'static str) -> Result<T, DecodeError> {
    T::from_blob(text).map_err(|reason| DecodeError::InvalidBlob { field, reason })
}

fn parse_id(text: &str) -> Result<ChunkId, DecodeError> {
    text.parse().map_err(|_| DecodeError::InvalidChunkId(text.to_string()))
}

/// Decode a manifest. On any error nothing is returned; there is no partially
/// populated manifest.
pub fn deserialize(text: &str) -> Result<AppManifest, DecodeError> {
    let doc: ManifestDoc = serde_json::from_str(text)?;
    let mut m = AppManifest::empty();

    m.app_id = parse_blob(&required(doc.app_id, "AppID")?, "AppID")?;
    m.app_name = required(doc.app_name, "AppNameString")?;
    m.build_version = required(doc.build_version, "BuildVersionString")?;
    m.launch_exe = required(doc.launch_exe, "LaunchExeString")?;
    m.launch_command = required(doc.launch_command, "LaunchCommand")?;
    m.prereq_name = doc.prereq_name.unwrap_or_default();
    m.prereq_path = doc.prereq_path.unwrap_or_default();
    m.prereq_args = doc.prereq_args.unwrap_or_default();

    m.version = match doc.version.as_deref().map(i32::from_blob) {
        Some(Ok(v)) => ManifestVersion::from_i32(v).ok_or(DecodeError::UnsupportedVersion(v))?,
        _ => {
            debug!("manifest carries no readable version, assuming {:?}", ManifestVersion::UNVERSIONED);
            ManifestVersion::UNVERSIONED
        }
    };

    // Every identifier seen, for legacy group derivation.
    let mut all_ids: Vec<ChunkId> = Vec::new();

    for fd in required(doc.files, "FileManifestList")? {
        let path = required(fd.filename, "Filename")?;
        check_relative(&path).map_err(|_| DecodeError::UnsafePath(path.clone()))?;
        let hash: [u8; DIGEST_LEN] = blob::from_blob(&required(fd.file_hash, "FileHash")?)
            .map_err(|reason| DecodeError::InvalidBlob { field: "FileHash", reason })?;
        let mut parts = Vec::new();
        for pd in fd.chunk_parts.unwrap_or_default() {
            let chunk_id = parse_id(&pd.guid)?;
            let offset = parse_blob(&pd.offset, "Offset")?;
            let size = parse_blob(&pd.size, "Size")?;
            all_ids.push(chunk_id);
            parts.push(ChunkPart { chunk_id, offset, size });
        }
        let fm = match fd.symlink_target.filter(|t| !t.is_empty()) {
            Some(_) if !parts.is_empty() => {
                return Err(DecodeError::SymlinkWithParts { path, parts: parts.len() });
            }
            Some(target) => FileManifest::symlink(path.clone(), Sha1Digest(hash), target),
            None => FileManifest::new(path.clone(), Sha1Digest(hash), parts),
        }
        .with_executable(fd.is_unix_executable.unwrap_or(false));
        if m.files.insert(path.clone(), fm).is_some() {
            return Err(DecodeError::DuplicatePath(path));
        }
    }

    for (k, v) in required(doc.chunk_hashes, "ChunkHashList")? {
        let id = parse_id(&k)?;
        m.chunk_hashes.insert(id, parse_blob(&v, "ChunkHashList")?);
        all_ids.push(id);
    }

    m.is_file_data = match doc.is_file_data {
        Some(serde_json::Value::Bool(b)) => b,
        _ => m.chunk_hashes.is_empty(),
    };

    match doc.chunk_groups {
        Some(groups) => {
            for (k, v) in groups {
                let id = parse_id(&k)?;
                let group: u8 = parse_blob(&v, "DataGroupList")?;
                if group >= GROUP_COUNT {
                    return Err(DecodeError::GroupOutOfRange { chunk: k, group });
                }
                m.chunk_groups.insert(id, group);
            }
        }
        None => {
            debug!("no DataGroupList, deriving groups for {} identifiers", all_ids.len());
            for id in all_ids {
                m.chunk_groups.insert(id, id.legacy_group());
            }
        }
    }

    for (k, v) in doc.chunk_sizes.unwrap_or_default() {
        let size: i64 = parse_blob(&v, "ChunkFilesizeList")?;
        let size = u64::try_from(size).map_err(|_| DecodeError::InvalidBlob {
            field: "ChunkFilesizeList",
            reason: format!("negative size {size}"),
        })?;
        m.chunk_sizes.insert(parse_id(&k)?, size);
    }

    for (k, v) in doc.custom_fields.unwrap_or_default() {
        m.custom_fields.insert(k, CustomField::Text(v));
    }

    m.check_encodable()?;
    m.finish_population();
    debug!(
        app = %m.app_name,
        files = m.files.len(),
        build_size = m.total_build_size,
        "manifest decoded"
    );
    Ok(m)
}

/// Read and decode a manifest through the context's file system.
pub fn load_from_file(ctx: &Context, path: &Path) -> Result<AppManifest, DecodeError> {
    let mut text = String::new();
    ctx.fs().open(path)?.read_to_string(&mut text)?;
    deserialize(&text)
}

pub fn save_to_file(m: &AppManifest, path: &Path) -> Result<(), DecodeError> {
    std::fs::write(path, serialize(m))?;
    Ok(())
}
