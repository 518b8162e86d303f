//! Artifact files under the work directory.
//!
//! ```text
//! {work_dir}/
//!   data/datasets/{id}.csv        content-addressed uploads
//!   visualizations/{id}.svg       rendered chart
//!   visualizations/{id}.json      its ChartSpec, for redrawing in reports
//!   reports/{id}.pdf
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::chart::ChartSpec;
use crate::dataset::Dataset;
use crate::error::AppError;

const DATASETS_DIR: &str = "data/datasets";
const CHARTS_DIR: &str = "visualizations";
const REPORTS_DIR: &str = "reports";

/// Hex chars kept from the SHA-256 digest for dataset ids.
const CONTENT_ID_LEN: usize = 16;
const MAX_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Dataset,
    Chart,
    Report,
}

impl ArtifactKind {
    fn dir(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => DATASETS_DIR,
            ArtifactKind::Chart => CHARTS_DIR,
            ArtifactKind::Report => REPORTS_DIR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "dataset",
            ArtifactKind::Chart => "chart",
            ArtifactKind::Report => "report",
        }
    }
}

/// Chart spec file: the `ChartSpec` plus the dataset it was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChart {
    pub dataset_id: String,
    #[serde(flatten)]
    pub spec: ChartSpec,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating its directories.
    pub fn open(work_dir: &Path) -> Result<Self, AppError> {
        for kind in [ArtifactKind::Dataset, ArtifactKind::Chart, ArtifactKind::Report] {
            let dir = work_dir.join(kind.dir());
            fs::create_dir_all(&dir)
                .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", dir.display())))?;
        }
        Ok(Self { root: work_dir.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an artifact file lives, for display.
    pub fn location(&self, kind: ArtifactKind, file_name: &str) -> PathBuf {
        self.root.join(kind.dir()).join(file_name)
    }

    fn path(&self, kind: ArtifactKind, id: &str, ext: &str) -> Result<PathBuf, AppError> {
        validate_id(id)?;
        Ok(self.root.join(kind.dir()).join(format!("{id}.{ext}")))
    }

    fn read(&self, kind: ArtifactKind, id: &str, ext: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path(kind, id, ext)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!("{} {id}", kind.label())),
            _ => AppError::Storage(format!("read {}: {e}", path.display())),
        })
    }

    /// Write through a temp file in the same directory, then rename, so a
    /// reader never sees a partial artifact.
    fn write(&self, kind: ArtifactKind, id: &str, ext: &str, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.path(kind, id, ext)?;
        let tmp = path.with_file_name(format!(".{id}.{ext}.{}.tmp", uuid::Uuid::now_v7()));
        fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path)).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::Storage(format!("write {}: {e}", path.display()))
        })?;
        debug!(kind = kind.label(), %id, bytes = bytes.len(), "artifact stored");
        Ok(())
    }

    // ── datasets ──────────────────────────────────────────────────────────

    /// Store raw CSV bytes; identical content maps to the same id.
    pub fn save_dataset(&self, bytes: &[u8]) -> Result<String, AppError> {
        let id = content_id(bytes);
        // A file whose content no longer hashes to its id is replaced.
        if let Ok(existing) = fs::read(self.path(ArtifactKind::Dataset, &id, "csv")?) {
            if content_id(&existing) == id {
                debug!(%id, "dataset already stored");
                return Ok(id);
            }
            warn!(%id, "stored dataset does not match its id, rewriting");
        }
        self.write(ArtifactKind::Dataset, &id, "csv", bytes)?;
        Ok(id)
    }

    pub fn load_dataset(&self, id: &str, max_rows: usize) -> Result<Dataset, AppError> {
        let bytes = self.read(ArtifactKind::Dataset, id, "csv")?;
        Ok(Dataset::from_csv_bytes(id, &bytes, max_rows)?)
    }

    // ── charts ────────────────────────────────────────────────────────────

    pub fn save_chart(&self, chart: &StoredChart, svg: &str) -> Result<String, AppError> {
        let id = uuid::Uuid::now_v7().to_string();
        let json = serde_json::to_vec_pretty(chart)
            .map_err(|e| AppError::Storage(format!("serialize chart spec: {e}")))?;
        self.write(ArtifactKind::Chart, &id, "json", &json)?;
        self.write(ArtifactKind::Chart, &id, "svg", svg.as_bytes())?;
        Ok(id)
    }

    pub fn load_chart(&self, id: &str) -> Result<StoredChart, AppError> {
        let bytes = self.read(ArtifactKind::Chart, id, "json")?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::Storage(format!("chart {id}: bad spec file: {e}")))
    }

    pub fn read_chart_svg(&self, id: &str) -> Result<Vec<u8>, AppError> {
        self.read(ArtifactKind::Chart, id, "svg")
    }

    // ── reports ───────────────────────────────────────────────────────────

    pub fn save_report(&self, pdf: &[u8]) -> Result<String, AppError> {
        let id = uuid::Uuid::now_v7().to_string();
        self.write(ArtifactKind::Report, &id, "pdf", pdf)?;
        Ok(id)
    }

    pub fn read_report(&self, id: &str) -> Result<Vec<u8>, AppError> {
        self.read(ArtifactKind::Report, id, "pdf")
    }
}

/// First 16 hex chars of the SHA-256 of `bytes`.
pub fn content_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut id = hex::encode(digest);
    id.truncate(CONTENT_ID_LEN);
    id
}

/// Ids reach the file system, so only lowercase hex and `-` are accepted.
pub fn validate_id(id: &str) -> Result<(), AppError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("invalid artifact id: {id:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    const CSV: &[u8] = b"region,units\nnorth,3\nsouth,5\n";

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_creates_layout() {
        let (tmp, _store) = store();
        assert!(tmp.path().join("data/datasets").is_dir());
        assert!(tmp.path().join("visualizations").is_dir());
        assert!(tmp.path().join("reports").is_dir());
    }

    #[test]
    fn dataset_ids_are_content_addressed() {
        let (_tmp, store) = store();
        let a = store.save_dataset(CSV).unwrap();
        let b = store.save_dataset(CSV).unwrap();
        let c = store.save_dataset(b"x\n1\n").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        let ds = store.load_dataset(&a, 100).unwrap();
        assert_eq!(ds.id(), a);
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn reupload_repairs_truncated_dataset() {
        let (tmp, store) = store();
        let id = content_id(CSV);
        let path = tmp.path().join("data/datasets").join(format!("{id}.csv"));
        fs::write(&path, &CSV[..10]).unwrap();
        assert!(store.load_dataset(&id, 100).is_err());

        assert_eq!(store.save_dataset(CSV).unwrap(), id);
        assert_eq!(fs::read(&path).unwrap(), CSV);
        assert_eq!(store.load_dataset(&id, 100).unwrap().row_count(), 2);
    }

    #[test]
    fn writes_leave_no_temp_files() {
        let (tmp, store) = store();
        store.save_dataset(CSV).unwrap();
        store.save_report(b"%PDF-1.4").unwrap();
        for dir in ["data/datasets", "reports"] {
            let names: Vec<String> = fs::read_dir(tmp.path().join(dir))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names.len(), 1, "{names:?}");
            assert!(!names[0].ends_with(".tmp"));
        }
    }

    #[test]
    fn missing_dataset_is_not_found() {
        let (_tmp, store) = store();
        let err = store.load_dataset("0123456789abcdef", 100).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn chart_round_trip() {
        let (_tmp, store) = store();
        let chart = StoredChart {
            dataset_id: "0123456789abcdef".into(),
            spec: ChartSpec {
                kind: ChartKind::Bar,
                title: "Units".into(),
                x: "region".into(),
                y: Some("units".into()),
                aggregate: None,
                bins: None,
            },
        };
        let id = store.save_chart(&chart, "<svg/>").unwrap();
        assert_eq!(store.load_chart(&id).unwrap(), chart);
        assert_eq!(store.read_chart_svg(&id).unwrap(), b"<svg/>");
    }

    #[test]
    fn report_round_trip() {
        let (_tmp, store) = store();
        let id = store.save_report(b"%PDF-1.4").unwrap();
        assert_eq!(store.read_report(&id).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn traversal_ids_rejected() {
        let (_tmp, store) = store();
        let long = "a".repeat(65);
        for bad in ["../etc/passwd", "", "ABCDEF", "abc/def", "a.b", long.as_str()] {
            let err = store.read_report(bad).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{bad:?} accepted");
        }
        assert!(validate_id("0190a5e4-7c1b-7d2e-9f00-1234567890ab").is_ok());
    }
}
