pub mod error;
pub mod export_code;
pub mod crypto;
pub mod container;
pub mod exif;
pub mod property;
pub mod json;
pub mod export;

pub use error::{ErrorKind, ExportError};
pub use container::{EncryptedSnapshot, SnapshotHeader};
pub use crypto::{ContentKey, MasterKey};
pub use property::{PropertyMap, PropertyType, PropertyValue};
pub use export::{BatchReport, ExportOptions, Exporter, FileOutcome, FileReport, MetadataOutcome};
