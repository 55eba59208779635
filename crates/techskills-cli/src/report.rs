//! Output files of a run.
//!
//! A run leaves three files in the output directory: the enriched warehouse
//! as CSV, the quality report and the mining summary as pretty JSON.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use techskills_mining::MiningSummary;
use techskills_processing::cleaner::FieldBounds;
use techskills_processing::{
    DuplicateGroup, OutlierFlag, PipelineResult, QualityReport, SchemaError, Warehouse,
    WarehouseSummary,
};
use tracing::info;

pub const WAREHOUSE_FILE: &str = "TechWarehouse.csv";
pub const QUALITY_FILE: &str = "quality_report.json";
pub const MINING_FILE: &str = "mining_summary.json";

/// Contents of `quality_report.json`.
#[derive(Debug, Serialize)]
pub struct QualityDocument<'a> {
    pub quality: &'a QualityReport,
    pub warehouse: &'a WarehouseSummary,
    pub schema_rejections: &'a [SchemaError],
    pub duplicate_groups: &'a [DuplicateGroup],
    pub outlier_flags: &'a [OutlierFlag],
    pub outlier_bounds: &'a [FieldBounds],
    pub processing_steps: &'a [String],
    pub duration_ms: u64,
}

impl<'a> QualityDocument<'a> {
    pub fn from_result(result: &'a PipelineResult) -> Self {
        Self {
            quality: &result.quality_report,
            warehouse: &result.summary,
            schema_rejections: &result.schema_rejections,
            duplicate_groups: &result.duplicate_groups,
            outlier_flags: &result.outlier_flags,
            outlier_bounds: &result.outlier_bounds,
            processing_steps: &result.processing_steps,
            duration_ms: result.duration_ms,
        }
    }
}

/// Where the files of one run were written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPaths {
    pub warehouse_csv: PathBuf,
    pub quality_report: PathBuf,
    pub mining_summary: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            warehouse_csv: dir.join(WAREHOUSE_FILE),
            quality_report: dir.join(QUALITY_FILE),
            mining_summary: dir.join(MINING_FILE),
        }
    }
}

/// Everything printed by `--json`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub outputs: &'a OutputPaths,
    pub quality_report: QualityDocument<'a>,
    pub mining_summary: &'a MiningSummary,
}

/// Write the mined warehouse, the quality report and the mining summary
/// into `dir`, creating it if needed.
pub fn write_outputs(
    dir: &Path,
    result: &PipelineResult,
    mining: &MiningSummary,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Creating output directory {}", dir.display()))?;
    let paths = OutputPaths::in_dir(dir);

    write_warehouse_csv(&result.warehouse, &paths.warehouse_csv)?;
    write_json(&paths.quality_report, &QualityDocument::from_result(result))?;
    write_json(&paths.mining_summary, mining)?;

    Ok(paths)
}

/// Write the warehouse records, derived fields included, as CSV.
pub fn write_warehouse_csv(warehouse: &Warehouse, path: &Path) -> Result<()> {
    let mut df = warehouse
        .to_dataframe()
        .context("Projecting the warehouse to a DataFrame")?;
    let mut file =
        File::create(path).with_context(|| format!("Creating {}", path.display()))?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)
        .with_context(|| format!("Writing {}", path.display()))?;

    info!("Warehouse saved: {} ({} records)", path.display(), df.height());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())
        .with_context(|| format!("Writing {}", path.display()))?;
    info!("Report saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use techskills_mining::{MiningConfig, MiningOrchestrator};
    use techskills_processing::{Pipeline, RawRecord, RawSources};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "techskills-report-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sources() -> RawSources {
        let jobs = (0..6)
            .map(|i| {
                RawRecord::new()
                    .with("Id_Oferta", format!("J-{}", i))
                    .with("País", "Chile")
                    .with("Lenguaje", "Rust")
                    .with("Salario_Anual_USD", 40_000.0 + i as f64 * 1_000.0)
                    .with("Fecha_Publicación", format!("2024-03-{:02}", i + 1))
            })
            .collect();
        RawSources {
            jobs,
            ..Default::default()
        }
    }

    fn run() -> (PipelineResult, MiningSummary) {
        let mut result = Pipeline::builder().build().unwrap().process(sources()).unwrap();
        let summary = MiningOrchestrator::new(MiningConfig::default())
            .unwrap()
            .run(&mut result.warehouse)
            .unwrap();
        (result, summary)
    }

    #[test]
    fn test_writes_all_three_files() {
        let dir = scratch_dir("files");
        let (result, summary) = run();
        let paths = write_outputs(&dir, &result, &summary).unwrap();

        assert_eq!(paths, OutputPaths::in_dir(&dir));
        assert!(paths.warehouse_csv.exists());
        assert!(paths.quality_report.exists());
        assert!(paths.mining_summary.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_warehouse_csv_has_one_row_per_record() {
        let dir = scratch_dir("csv");
        fs::create_dir_all(&dir).unwrap();
        let (result, _) = run();
        let path = dir.join(WAREHOUSE_FILE);
        write_warehouse_csv(&result.warehouse, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("record_id,source_type"));
        assert_eq!(lines.count(), result.warehouse.len());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_quality_document_fields() {
        let (result, _) = run();
        let json = serde_json::to_value(QualityDocument::from_result(&result)).unwrap();

        assert_eq!(json["quality"]["total_raw"], 6);
        assert_eq!(json["warehouse"]["total_records"], 6);
        assert_eq!(json["schema_rejections"], serde_json::json!([]));
        assert!(json["processing_steps"].as_array().is_some_and(|s| !s.is_empty()));
    }
}
