//! CSV export of a finished job's records.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::error::HarvestError;
use crate::models::{Platform, ProductRecord};
use crate::scrapers::ArtifactColumn;
use crate::traits::ArtifactSink;

/// Writes `{platform}_products_{timestamp}.csv` under `output_dir`.
#[derive(Debug, Clone)]
pub struct CsvArtifactWriter {
    output_dir: PathBuf,
}

impl CsvArtifactWriter {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ArtifactSink for CsvArtifactWriter {
    async fn persist(
        &self,
        platform: Platform,
        columns: &[ArtifactColumn],
        records: &[ProductRecord],
    ) -> Result<String, HarvestError> {
        let dir = self.output_dir.clone();
        let columns = columns.to_vec();
        let records = records.to_vec();

        let path = tokio::task::spawn_blocking(move || write_csv(&dir, platform, &columns, &records))
            .await
            .map_err(|e| HarvestError::Artifact(format!("writer task failed: {e}")))??;

        info!("Saved artifact to {}", path.display());
        Ok(path.display().to_string())
    }
}

fn write_csv(
    dir: &Path,
    platform: Platform,
    columns: &[ArtifactColumn],
    records: &[ProductRecord],
) -> Result<PathBuf, HarvestError> {
    std::fs::create_dir_all(dir)?;

    let stem = format!(
        "{}_products_{}",
        platform.as_str(),
        Utc::now().format("%Y-%m-%dT%H-%M-%S")
    );
    let (path, file) = create_unique(dir, &stem)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(columns.iter().map(|c| c.label()))?;
    for record in records {
        writer.write_record(columns.iter().map(|c| c.value(record)))?;
    }
    writer.flush()?;
    Ok(path)
}

/// Two jobs for the same platform can finish within the same second; the
/// later one gets a numeric suffix instead of overwriting.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, std::fs::File), HarvestError> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.csv")
        } else {
            format!("{stem}_{attempt}.csv")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}
