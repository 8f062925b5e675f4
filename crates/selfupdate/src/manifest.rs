//! Update manifest model and document parsing.
//!
//! A manifest document may describe updates for several applications. Each
//! record is keyed by an application identifier; [`parse_document`] picks the
//! record for one application and converts it into an [`UpdateManifest`].
//!
//! Parsing is fail-fast: a record with any missing or malformed required
//! field produces an error and never a partially populated manifest. A
//! document without a record for the requested application is not an error;
//! it simply has no update for that application.

use std::cmp::Ordering;

use reqwest::Url;
use serde::Deserialize;

use crate::error::UpdateError;
use crate::version::{parse_version, Version};

/// A parsed update descriptor.
///
/// Immutable once constructed. Equality and ordering consider only the
/// version, so two manifests announcing the same version compare equal even
/// if their file lists differ.
#[derive(Debug, Clone)]
pub struct UpdateManifest {
    version: Version,
    files: Vec<FileEntry>,
    description: String,
    launch_file: String,
    launch_args: String,
}

impl UpdateManifest {
    /// Create a new update manifest from already validated parts.
    pub fn new(
        version: Version,
        files: Vec<FileEntry>,
        description: String,
        launch_file: String,
        launch_args: String,
    ) -> Self {
        Self {
            version,
            files,
            description,
            launch_file,
            launch_args,
        }
    }

    /// Version announced by the manifest.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Files to download, in download order.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Free-form description of the update.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// File to launch once the update is installed.
    pub fn launch_file(&self) -> &str {
        &self.launch_file
    }

    /// Arguments to pass to the launched file.
    pub fn launch_args(&self) -> &str {
        &self.launch_args
    }

    /// Check if this manifest's version is strictly newer than `local`.
    pub fn is_newer_than(&self, local: &Version) -> bool {
        self.version > *local
    }
}

impl PartialEq for UpdateManifest {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for UpdateManifest {}

impl PartialOrd for UpdateManifest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UpdateManifest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

/// One artifact listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    source: Url,
    file_name: String,
    digest: String,
}

impl FileEntry {
    /// Create a file entry, validating all three fields.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is empty, the source is not an absolute
    /// http(s) URL, or the digest is not hex.
    pub fn new(source: &str, file_name: &str, digest: &str) -> Result<Self, UpdateError> {
        let context = format!("file `{}`", file_name.trim());
        let source = required("url", Some(source.to_string()), &context)?;
        let file_name = required("fileName", Some(file_name.to_string()), &context)?;
        let digest = required("digest", Some(digest.to_string()), &context)?;

        let source = Url::parse(&source).map_err(|e| UpdateError::InvalidField {
            field: "url",
            reason: format!("{}: {}", source, e),
        })?;
        if !matches!(source.scheme(), "http" | "https") {
            return Err(UpdateError::InvalidField {
                field: "url",
                reason: format!("unsupported scheme `{}`", source.scheme()),
            });
        }

        if hex::decode(&digest).is_err() {
            return Err(UpdateError::InvalidField {
                field: "digest",
                reason: format!("`{}` is not a hex string", digest),
            });
        }

        Ok(Self {
            source,
            file_name,
            digest,
        })
    }

    /// Absolute network location of the artifact.
    pub fn source(&self) -> &Url {
        &self.source
    }

    /// Name the caller should install the file under.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Expected content digest as written in the manifest (hex, any case).
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Top-level shape of a manifest document.
#[derive(Debug, Deserialize)]
struct ManifestDocument {
    updates: Vec<UpdateRecord>,
}

/// One application's record, before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRecord {
    app_id: Option<String>,
    version: Option<String>,
    description: Option<String>,
    launch_file: Option<String>,
    launch_args: Option<String>,
    files: Option<Vec<FileRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    url: Option<String>,
    file_name: Option<String>,
    digest: Option<String>,
}

impl UpdateRecord {
    fn into_manifest(self, app_id: &str) -> Result<UpdateManifest, UpdateError> {
        let context = format!("application `{}`", app_id);

        let version = parse_version(&required("version", self.version, &context)?)?;
        let description = present("description", self.description, &context)?;
        let launch_file = present("launchFile", self.launch_file, &context)?;
        let launch_args = present("launchArgs", self.launch_args, &context)?;

        let files = self
            .files
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, file)| file.into_entry(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UpdateManifest::new(
            version,
            files,
            description,
            launch_file,
            launch_args,
        ))
    }
}

impl FileRecord {
    fn into_entry(self, index: usize) -> Result<FileEntry, UpdateError> {
        let context = format!("file #{}", index);
        let url = required("url", self.url, &context)?;
        let file_name = required("fileName", self.file_name, &context)?;
        let digest = required("digest", self.digest, &context)?;
        FileEntry::new(&url, &file_name, &digest)
    }
}

/// Field must exist and be non-blank.
fn required(
    field: &'static str,
    value: Option<String>,
    context: &str,
) -> Result<String, UpdateError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(UpdateError::MissingField {
            field,
            context: context.to_string(),
        }),
    }
}

/// Field must exist; an empty value is allowed.
fn present(
    field: &'static str,
    value: Option<String>,
    context: &str,
) -> Result<String, UpdateError> {
    value.ok_or_else(|| UpdateError::MissingField {
        field,
        context: context.to_string(),
    })
}

/// Parse a manifest document and extract the record for `app_id`.
///
/// # Returns
///
/// - `Ok(Some(manifest))` if a record for `app_id` exists and is valid
/// - `Ok(None)` if the document has no record for `app_id`
///
/// # Errors
///
/// Returns an error if the document is not valid JSON of the expected shape,
/// or if the matching record has a missing or malformed field.
pub fn parse_document(data: &[u8], app_id: &str) -> Result<Option<UpdateManifest>, UpdateError> {
    let document: ManifestDocument = serde_json::from_slice(data).map_err(|e| {
        if e.is_data() {
            UpdateError::ManifestParse(e.to_string())
        } else {
            UpdateError::JsonError(e)
        }
    })?;

    // First record for the application wins
    let app_id = app_id.trim();
    let Some(record) = document
        .updates
        .into_iter()
        .find(|r| r.app_id.as_deref().map(str::trim) == Some(app_id))
    else {
        tracing::debug!(app_id, "No update record for application");
        return Ok(None);
    };

    let manifest = record.into_manifest(app_id).map_err(|e| {
        tracing::error!(app_id, error = %e, "Invalid update record");
        e
    })?;

    tracing::debug!(
        app_id,
        version = %manifest.version,
        files = manifest.files.len(),
        "Parsed update record"
    );
    Ok(Some(manifest))
}
