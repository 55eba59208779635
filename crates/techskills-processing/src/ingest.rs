//! Tabular ingestion.
//!
//! Reads the three CSV sources with polars and flattens each row into a
//! [`RawRecord`]. Column values keep their inferred shape (number, text,
//! boolean); interpreting them is the unifier's job.

use crate::types::{RawRecord, RawSources, RawValue};
use anyhow::{Context, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of rows polars inspects when inferring column types.
const INFER_SCHEMA_ROWS: usize = 100;

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Load a CSV file, retrying with all columns read as text if typed
/// inference fails (e.g. a numeric column with stray text further down).
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let typed = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .and_then(|reader| reader.finish());

    match typed {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Typed loading of {} failed: {}", path.display(), e),
    }

    CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("Failed to read CSV file {}", path.display()))
}

/// Flatten a `DataFrame` into one [`RawRecord`] per row.
pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<RawRecord>> {
    let mut records = vec![RawRecord::new(); df.height()];

    for column in df.get_columns() {
        let name = column.name().to_string();
        let series = column.as_materialized_series();
        let values = column_values(series)
            .with_context(|| format!("Failed to convert column '{}'", name))?;
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
    }

    Ok(records)
}

fn column_values(series: &Series) -> PolarsResult<Vec<RawValue>> {
    let dtype = series.dtype();
    let values = if is_numeric_dtype(dtype) {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map_or(RawValue::Null, RawValue::Number))
            .collect()
    } else if matches!(dtype, DataType::Boolean) {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(RawValue::Null, RawValue::Bool))
            .collect()
    } else {
        let text = series.cast(&DataType::String)?;
        text.str()?
            .into_iter()
            .map(|v| v.map_or(RawValue::Null, |s| RawValue::Text(s.to_string())))
            .collect()
    };
    Ok(values)
}

/// Read one source file into raw records.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let df = read_csv(path)?;
    let records = dataframe_to_records(&df)?;
    info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(records)
}

/// Read the three sources of a run.
pub fn load_sources(jobs: &Path, investments: &Path, profiles: &Path) -> Result<RawSources> {
    Ok(RawSources {
        jobs: load_records(jobs).context("Loading job postings")?,
        investments: load_records(investments).context("Loading investment records")?,
        profiles: load_records(profiles).context("Loading professional profiles")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dataframe_to_records_keeps_shapes() {
        let df = df![
            "País" => ["Chile", "Peru"],
            "Salario_Anual_USD" => [Some(30_000i64), None],
            "Remoto" => [true, false],
        ]
        .unwrap();

        let records = dataframe_to_records(&df).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("País"), Some(&RawValue::Text("Chile".to_string())));
        assert_eq!(
            records[0].get("Salario_Anual_USD"),
            Some(&RawValue::Number(30_000.0))
        );
        assert_eq!(records[1].get("Salario_Anual_USD"), Some(&RawValue::Null));
        assert_eq!(records[1].get("Remoto"), Some(&RawValue::Bool(false)));
    }

    #[test]
    fn test_read_csv_from_disk() {
        let dir = std::env::temp_dir().join(format!("techskills-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jobs.csv");
        std::fs::write(
            &path,
            "Id_Oferta,País,Lenguaje,Salario_Anual_USD\n1,Usa,Python,120000\n2,Chile,Go,\n",
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("Lenguaje"), Some(&RawValue::Text("Go".to_string())));
        assert_eq!(records[1].get("Salario_Anual_USD"), Some(&RawValue::Null));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_records(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(format!("{:#}", err).contains("not/here.csv"));
    }
}
