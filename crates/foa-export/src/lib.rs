//! JSON and CSV export of a single extracted opportunity.
//!
//! Files are written to a temp file next to the target and renamed into
//! place, so a reader never sees a half-written export.

use std::path::{Path, PathBuf};

use anyhow::Context;
use foa_core::{FundingOpportunity, EXPORT_COLUMNS};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "foa-export";
pub const JSON_FILE_NAME: &str = "foa.json";
pub const CSV_FILE_NAME: &str = "foa.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Json,
    Csv,
    #[default]
    All,
}

impl ExportFormat {
    pub fn includes_json(self) -> bool {
        matches!(self, Self::Json | Self::All)
    }

    pub fn includes_csv(self) -> bool {
        matches!(self, Self::Csv | Self::All)
    }
}

/// Pretty-printed JSON with a trailing newline.
pub fn render_json(opportunity: &FundingOpportunity) -> anyhow::Result<Vec<u8>> {
    let mut bytes =
        serde_json::to_vec_pretty(opportunity).context("serializing opportunity to JSON")?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Header plus one data row in the fixed column order.
pub fn render_csv(opportunity: &FundingOpportunity) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_COLUMNS)
        .context("writing CSV header")?;
    writer
        .write_record(opportunity.export_row().into_iter().map(|(_, value)| value))
        .context("writing CSV row")?;
    writer.into_inner().context("flushing CSV buffer")
}

pub async fn export_json(
    opportunity: &FundingOpportunity,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(JSON_FILE_NAME);
    write_atomic(&path, &render_json(opportunity)?).await?;
    info!(path = %path.display(), "exported JSON");
    Ok(path)
}

pub async fn export_csv(
    opportunity: &FundingOpportunity,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(CSV_FILE_NAME);
    write_atomic(&path, &render_csv(opportunity)?).await?;
    info!(path = %path.display(), "exported CSV");
    Ok(path)
}

/// Write every file `format` asks for, creating `out_dir` if needed.
pub async fn export_all(
    opportunity: &FundingOpportunity,
    out_dir: &Path,
    format: ExportFormat,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    if format.includes_json() {
        written.push(export_json(opportunity, out_dir).await?);
    }
    if format.includes_csv() {
        written.push(export_csv(opportunity, out_dir).await?);
    }
    Ok(written)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("export path {} has no parent", path.display()))?;
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let result = write_temp(&temp_path, bytes).await;
    let result = match result {
        Ok(()) => fs::rename(&temp_path, path).await.with_context(|| {
            format!(
                "atomically renaming temp export {} -> {}",
                temp_path.display(),
                path.display()
            )
        }),
        Err(err) => Err(err),
    };
    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    result
}

async fn write_temp(temp_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(temp_path)
        .await
        .with_context(|| format!("opening temp export file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp export file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp export file {}", temp_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foa_core::OpportunityDraft;
    use tempfile::tempdir;

    fn sample() -> FundingOpportunity {
        let mut opp = FundingOpportunity::from_draft(OpportunityDraft {
            foa_id: "PD-24-127Y".into(),
            title: Some("AI Institutes, Phase \"II\"".into()),
            agency: Some("U.S. National Science Foundation".into()),
            open_date: Some("01/12/2024".into()),
            close_date: None,
            description: Some("Line one\nline two".into()),
            source_url: "https://www.grants.gov/search-results-detail/350000".into(),
            award_ceiling: Some("$20,000,000".into()),
            ..OpportunityDraft::default()
        });
        opp.set_tags(["Artificial Intelligence", "Education"]);
        opp
    }

    #[test]
    fn json_is_pretty_with_trailing_newline_and_tag_list() {
        let bytes = render_json(&sample()).expect("json");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"foa_id\": \"PD-24-127Y\""));

        let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(value["open_date"], "2024-01-12");
        assert_eq!(value["close_date"], serde_json::Value::Null);
        assert_eq!(
            value["tags"],
            serde_json::json!(["Artificial Intelligence", "Education"])
        );
    }

    #[test]
    fn csv_has_header_and_one_quoted_row() {
        let bytes = render_csv(&sample()).expect("csv");
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers: Vec<String> = reader
            .headers()
            .expect("headers")
            .iter()
            .map(String::from)
            .collect();
        assert_eq!(headers, EXPORT_COLUMNS);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(&row[1], "AI Institutes, Phase \"II\"");
        assert_eq!(&row[4], "");
        assert_eq!(&row[6], "Line one\nline two");
        assert_eq!(&row[8], "Artificial Intelligence; Education");
        assert_eq!(&row[11], "");
    }

    #[tokio::test]
    async fn export_all_creates_directory_and_both_files() {
        let dir = tempdir().expect("tempdir");
        let out = dir.path().join("nested").join("out");

        let written = export_all(&sample(), &out, ExportFormat::All)
            .await
            .expect("export");
        assert_eq!(written, vec![out.join(JSON_FILE_NAME), out.join(CSV_FILE_NAME)]);
        for path in &written {
            assert!(path.exists(), "{}", path.display());
        }

        let leftovers: Vec<_> = std::fs::read_dir(&out)
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn single_format_writes_one_file_and_overwrites() {
        let dir = tempdir().expect("tempdir");
        export_all(&sample(), dir.path(), ExportFormat::Csv)
            .await
            .expect("first export");
        let mut changed = sample();
        changed.set_tags(["Energy"]);
        let written = export_all(&changed, dir.path(), ExportFormat::Csv)
            .await
            .expect("second export");

        assert_eq!(written, vec![dir.path().join(CSV_FILE_NAME)]);
        assert!(!dir.path().join(JSON_FILE_NAME).exists());
        let csv = std::fs::read_to_string(dir.path().join(CSV_FILE_NAME)).expect("read");
        assert!(csv.contains("Energy"));
        assert!(!csv.contains("Education"));
    }

    #[tokio::test]
    async fn unwritable_output_reports_path() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").expect("write");

        let err = export_all(&sample(), &blocker.join("out"), ExportFormat::Json)
            .await
            .expect_err("parent is a file");
        assert!(format!("{err:#}").contains("creating output directory"));
    }
}
