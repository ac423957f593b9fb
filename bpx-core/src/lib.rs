pub mod blob;
pub mod chunk;
pub mod codec;
pub mod context;
pub mod custom_field;
pub mod diff;
pub mod digest;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod path_safety;
pub mod pause;
pub mod produce;
pub mod progress;
pub mod query;
pub mod verify;
pub mod version;

pub use codec::{deserialize, serialize};
pub use context::Context;
pub use manifest::{AppManifest, FileManifest, ManifestBuilder};
