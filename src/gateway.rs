//! Persistence of base images and annotation artifacts, keyed by report.

use crate::draw::save::{decode_annotation_payload, timestamped_stem};
use crate::error::GatewayError;
use anyhow::{anyhow, Context};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORTS_SUBDIR: &str = "reports";
pub const UPLOADS_SUBDIR: &str = "uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub u64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a stored raster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What a viewer needs to render a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub base_image: ArtifactRef,
    pub annotation: Option<ArtifactRef>,
}

/// Body sent when an editor finalizes a report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportSubmission {
    #[serde(default)]
    pub notes: String,
    /// `data:image/png;base64,...`, absent when nothing was drawn.
    #[serde(default)]
    pub annotation_image: Option<String>,
    #[serde(default, alias = "share")]
    pub share_with_patient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub shared: bool,
    pub annotated_image_path: Option<ArtifactRef>,
}

pub trait PersistenceGateway: Send + Sync {
    fn load_report(&self, id: ReportId) -> Result<ReportArtifacts, GatewayError>;

    fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GatewayError>;

    fn submit(
        &self,
        id: ReportId,
        submission: &ReportSubmission,
    ) -> Result<SubmitReceipt, GatewayError>;
}

/// Report row as stored by [`FsGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: ReportId,
    pub image_path: String,
    #[serde(default)]
    pub annotated_image_path: Option<String>,
    #[serde(default)]
    pub doctor_notes: String,
    #[serde(default)]
    pub is_visible_to_patient: bool,
}

/// Directory-backed gateway: report records under `reports/`, rasters under
/// `uploads/`.
#[derive(Debug, Clone)]
pub struct FsGateway {
    root: PathBuf,
}

impl FsGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let gateway = Self::new(root);
        for dir in [gateway.reports_dir(), gateway.uploads_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create data folder {}", dir.display()))?;
        }
        Ok(gateway)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_SUBDIR)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_SUBDIR)
    }

    fn record_path(&self, id: ReportId) -> PathBuf {
        self.reports_dir().join(format!("{id}.json"))
    }

    pub fn read_record(&self, id: ReportId) -> Result<ReportRecord, GatewayError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(GatewayError::NotFound {
                what: format!("report {id}"),
            });
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read report record {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("parse report record {}", path.display()))?;
        Ok(record)
    }

    pub fn write_record(&self, record: &ReportRecord) -> Result<(), GatewayError> {
        let path = self.record_path(record.id);
        let content = serde_json::to_string_pretty(record).context("serialize report record")?;
        write_atomically(&path, content.as_bytes())?;
        Ok(())
    }

    /// Stores an uploaded raster under `uploads/` and returns its reference.
    pub fn store_upload(&self, file_name: &str, bytes: &[u8]) -> Result<ArtifactRef, GatewayError> {
        let path = self.upload_path(file_name)?;
        write_atomically(&path, bytes)?;
        Ok(ArtifactRef(file_name.to_string()))
    }

    fn upload_path(&self, file_name: &str) -> Result<PathBuf, GatewayError> {
        let valid = !file_name.is_empty()
            && Path::new(file_name).file_name().and_then(|n| n.to_str()) == Some(file_name);
        if !valid {
            return Err(GatewayError::InvalidPayload(format!(
                "artifact name {file_name:?} is not a plain file name"
            )));
        }
        Ok(self.uploads_dir().join(file_name))
    }
}

impl PersistenceGateway for FsGateway {
    fn load_report(&self, id: ReportId) -> Result<ReportArtifacts, GatewayError> {
        let record = self.read_record(id)?;
        Ok(ReportArtifacts {
            base_image: ArtifactRef(record.image_path),
            annotation: record.annotated_image_path.map(ArtifactRef),
        })
    }

    fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GatewayError> {
        let path = self.upload_path(artifact.as_str())?;
        if !path.exists() {
            return Err(GatewayError::NotFound {
                what: format!("artifact {}", artifact.as_str()),
            });
        }
        let bytes = fs::read(&path).with_context(|| format!("read artifact {}", path.display()))?;
        Ok(bytes)
    }

    fn submit(
        &self,
        id: ReportId,
        submission: &ReportSubmission,
    ) -> Result<SubmitReceipt, GatewayError> {
        let mut record = self.read_record(id)?;
        record.doctor_notes = submission.notes.clone();

        if let Some(payload) = submission.annotation_image.as_deref() {
            let png = decode_annotation_payload(payload)?;
            let file_name = annotation_file_name(id, &timestamped_stem(Local::now()));
            let artifact = self.store_upload(&file_name, &png)?;
            tracing::info!(report = %id, file = artifact.as_str(), bytes = png.len(), "annotation stored");
            record.annotated_image_path = Some(artifact.0);
        } else {
            // The submission carries the whole layer, so no image means the
            // markings were removed.
            if let Some(previous) = record.annotated_image_path.take() {
                tracing::info!(report = %id, file = %previous, "annotation removed");
            }
        }

        record.is_visible_to_patient = submission.share_with_patient;
        self.write_record(&record)?;

        Ok(SubmitReceipt {
            shared: record.is_visible_to_patient,
            annotated_image_path: record.annotated_image_path.map(ArtifactRef),
        })
    }
}

pub fn annotation_file_name(id: ReportId, stem: &str) -> String {
    format!("annotation_{id}_{stem}.png")
}

fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create folder {}", parent.display()))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_file_name_matches_contract() {
        assert_eq!(
            annotation_file_name(ReportId(42), "20260102_030405"),
            "annotation_42_20260102_030405.png"
        );
    }

    #[test]
    fn submission_accepts_share_alias() {
        let parsed: ReportSubmission =
            serde_json::from_str(r#"{"notes":"ok","share":true}"#).expect("parse");
        assert!(parsed.share_with_patient);
        assert_eq!(parsed.annotation_image, None);
    }

    #[test]
    fn upload_names_cannot_escape_the_uploads_folder() {
        let gateway = FsGateway::new("/tmp/unused");
        assert!(matches!(
            gateway.fetch_artifact(&ArtifactRef("../reports/1.json".into())),
            Err(GatewayError::InvalidPayload(_))
        ));
        assert!(matches!(
            gateway.fetch_artifact(&ArtifactRef(String::new())),
            Err(GatewayError::InvalidPayload(_))
        ));
    }
}
