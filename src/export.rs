//! High-level [`Exporter`] API: decrypt a folder of snapshot files.
//!
//! ```no_run
//! use snapshot_export::export::Exporter;
//!
//! let exporter = Exporter::new("0011-2233-4455-6677-8899-aabb-ccdd-eeff")?;
//! let report = exporter.export_folder("export/", "out/", |file| {
//!     println!("{}: {}", file.file_name, file.outcome);
//! })?;
//! println!("{}", report.summary());
//! # Ok::<(), snapshot_export::ExportError>(())
//! ```
//!
//! Each file is processed to completion before the next one starts.  A
//! failure is confined to the smallest unit it affects: a bad file does not
//! stop the batch, and bad metadata does not undo the image already written.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, info_span, warn};
use zeroize::Zeroizing;

use crate::container::EncryptedSnapshot;
use crate::crypto::{decrypt_content, unwrap_content_key, MasterKey};
use crate::error::ExportError;
use crate::exif::find_metadata_blob;
use crate::export_code::{canonicalize, derive_master_key};
use crate::json::to_json;
use crate::property::PropertyMap;

// ── ExportOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`Exporter::with_options`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Appended to the input file name for the decrypted image.
    pub image_extension:    String,
    /// Appended to the input file name for the metadata sidecar.
    pub metadata_extension: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            image_extension:    "jpg".into(),
            metadata_extension: "json".into(),
        }
    }
}

// ── Per-file outcomes ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum MetadataOutcome {
    /// Sidecar written to this path.
    Written(PathBuf),
    /// The image carries no metadata tag.
    Absent,
    /// Metadata was present but could not be decoded or written.
    Failed(ExportError),
}

#[derive(Debug)]
pub enum FileOutcome {
    /// The image was decrypted and written.
    Exported { image: PathBuf, metadata: MetadataOutcome },
    /// Nothing was written for this file.
    Failed(ExportError),
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Failed(e) => write!(f, "failed ({e})"),
            FileOutcome::Exported { metadata, .. } => match metadata {
                MetadataOutcome::Written(_) => f.write_str("image and metadata exported"),
                MetadataOutcome::Absent     => f.write_str("image exported, no metadata"),
                MetadataOutcome::Failed(e)  => write!(f, "image exported, metadata failed ({e})"),
            },
        }
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub file_name: String,
    pub outcome:   FileOutcome,
}

impl FileReport {
    pub fn is_exported(&self) -> bool {
        matches!(self.outcome, FileOutcome::Exported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed(_))
    }

    /// Image written but metadata failed.
    pub fn is_metadata_failed(&self) -> bool {
        matches!(
            self.outcome,
            FileOutcome::Exported { metadata: MetadataOutcome::Failed(_), .. }
        )
    }
}

// ── BatchReport ───────────────────────────────────────────────────────────────

/// Outcomes of one [`Exporter::export_folder`] run, in processing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn exported(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| r.is_exported())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| r.is_failed())
    }

    pub fn metadata_failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| r.is_metadata_failed())
    }

    pub fn get(&self, file_name: &str) -> Option<&FileReport> {
        self.files.iter().find(|r| r.file_name == file_name)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} file(s) processed: {} exported, {} failed, {} with unreadable metadata",
            self.files.len(),
            self.exported().count(),
            self.failed().count(),
            self.metadata_failed().count(),
        )
    }
}

// ── Exporter ──────────────────────────────────────────────────────────────────

pub struct Exporter {
    master_key: MasterKey,
    options:    ExportOptions,
}

impl Exporter {
    /// Canonicalize `export_code` and derive the master key from it.
    pub fn new(export_code: &str) -> Result<Self, ExportError> {
        Self::with_options(export_code, ExportOptions::default())
    }

    pub fn with_options(export_code: &str, options: ExportOptions) -> Result<Self, ExportError> {
        let canonical = Zeroizing::new(canonicalize(export_code));
        let master_key = derive_master_key(&canonical)?;
        Ok(Self::from_master_key(master_key, options))
    }

    pub fn from_master_key(master_key: MasterKey, options: ExportOptions) -> Self {
        Self { master_key, options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Parse one snapshot file and return its decrypted image bytes.
    pub fn decrypt_snapshot(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, ExportError> {
        let snapshot = EncryptedSnapshot::parse(data)?;
        debug!(
            key_size = snapshot.header.key_size,
            content_size = snapshot.header.content_size,
            content_type = snapshot.header.content_type,
            "snapshot header parsed"
        );
        let content_key = unwrap_content_key(&self.master_key, snapshot.key_blob)?;
        decrypt_content(&content_key, snapshot.content_blob)
    }

    /// Decrypt one snapshot file into `output_dir`.  Never fails as a whole:
    /// every error is recorded in the returned report.
    pub fn export_file(&self, input: &Path, output_dir: &Path) -> FileReport {
        let name = input.file_name().map(OsStr::to_os_string).unwrap_or_default();
        let file_name = name.to_string_lossy().into_owned();
        let _span = info_span!("export_file", file = %file_name).entered();

        let outcome = match self.export_image(input, &name, output_dir) {
            Ok((image_path, image)) => {
                info!(path = %image_path.display(), "image written");
                let metadata = self.export_metadata(&image, &name, output_dir);
                if let MetadataOutcome::Failed(e) = &metadata {
                    warn!(error = %e, "metadata export failed");
                }
                FileOutcome::Exported { image: image_path, metadata }
            }
            Err(e) => {
                warn!(error = %e, "snapshot export failed");
                FileOutcome::Failed(e)
            }
        };

        FileReport { file_name, outcome }
    }

    /// Export every regular file directly inside `export_dir`, calling
    /// `on_file` as each one finishes.  The output folder is created if it
    /// does not exist.  Only failure to open either folder is an error.
    pub fn export_folder<P, Q, F>(&self, export_dir: P, output_dir: Q, mut on_file: F) -> Result<BatchReport, ExportError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: FnMut(&FileReport),
    {
        let export_dir = export_dir.as_ref();
        let output_dir = output_dir.as_ref();

        ensure_output_folder(output_dir)?;

        let entries = fs::read_dir(export_dir).map_err(|e| ExportError::io(export_dir, e))?;
        let mut report = BatchReport::default();
        for path in input_files(export_dir, entries.map(|e| e.map(|e| e.path()))) {
            let file_report = self.export_file(&path, output_dir);
            on_file(&file_report);
            report.files.push(file_report);
        }

        info!(summary = %report.summary(), "export finished");
        Ok(report)
    }

    fn export_image(
        &self,
        input:      &Path,
        name:       &OsStr,
        output_dir: &Path,
    ) -> Result<(PathBuf, Zeroizing<Vec<u8>>), ExportError> {
        let data = fs::read(input).map_err(|e| ExportError::io(input, e))?;
        let image = self.decrypt_snapshot(&data)?;

        let image_path = output_path(output_dir, name, &self.options.image_extension);
        fs::write(&image_path, image.as_slice()).map_err(|e| ExportError::io(&image_path, e))?;
        Ok((image_path, image))
    }

    fn export_metadata(&self, image: &[u8], name: &OsStr, output_dir: &Path) -> MetadataOutcome {
        let json = match decode_metadata(image) {
            Ok(Some(json)) => json,
            Ok(None) => {
                debug!("image has no metadata");
                return MetadataOutcome::Absent;
            }
            Err(e) => return MetadataOutcome::Failed(e),
        };

        let json_path = output_path(output_dir, name, &self.options.metadata_extension);
        let text = Zeroizing::new(json.to_string());
        match fs::write(&json_path, text.as_bytes()) {
            Ok(()) => {
                info!(path = %json_path.display(), "metadata written");
                MetadataOutcome::Written(json_path)
            }
            Err(e) => MetadataOutcome::Failed(ExportError::io(json_path, e)),
        }
    }
}

/// Create `output_dir` and its parents if it is not already a directory.
pub fn ensure_output_folder(output_dir: &Path) -> Result<(), ExportError> {
    if !output_dir.is_dir() {
        info!(path = %output_dir.display(), "creating output folder");
        fs::create_dir_all(output_dir).map_err(|e| ExportError::io(output_dir, e))?;
    }
    Ok(())
}

/// Regular files among `entries`.  Entries that cannot be read are logged
/// and skipped.
fn input_files<'a, I>(export_dir: &'a Path, entries: I) -> impl Iterator<Item = PathBuf> + 'a
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
    I::IntoIter: 'a,
{
    entries.into_iter().filter_map(move |entry| match entry {
        Ok(path) if path.is_file() => Some(path),
        Ok(_) => None,
        Err(e) => {
            warn!(dir = %export_dir.display(), error = %e, "skipping unreadable directory entry");
            None
        }
    })
}

/// Extract, decode and transcode the metadata embedded in a decrypted image.
///
/// `Ok(None)` when the image has no metadata tag.
pub fn decode_metadata(image: &[u8]) -> Result<Option<Value>, ExportError> {
    let Some(blob) = find_metadata_blob(image)? else {
        return Ok(None);
    };
    let map = PropertyMap::from_bytes(blob)?;
    debug!(entries = map.len(), "property set decoded");
    to_json(&map).map(Some)
}

/// `<output_dir>/<name>.<extension>`, keeping the input's own extension.
fn output_path(output_dir: &Path, name: &OsStr, extension: &str) -> PathBuf {
    let mut file_name = OsString::from(name);
    file_name.push(".");
    file_name.push(extension);
    output_dir.join(file_name)
}
