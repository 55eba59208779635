//! Feature projection of warehouse records.
//!
//! Clustering needs a scaled numeric matrix (salary, age and experience
//! live on very different ranges), classification a label-encoded one.

use std::collections::{BTreeSet, HashSet};
use techskills_processing::utils::median;
use techskills_processing::{CanonicalRecord, Country};
use tracing::debug;

/// Placeholder category for an empty technology or framework set.
const UNKNOWN_CATEGORY: &str = "Unknown";

/// Row-major feature matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Self {
        let n_rows = columns.first().map_or(0, Vec::len);
        let rows = (0..n_rows)
            .map(|i| columns.iter().map(|column| column[i]).collect())
            .collect();
        Self { names, rows }
    }
}

/// Maps category strings to integer codes in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code of a category seen during `fit`.
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }
}

/// Per-column z-score standardization.
///
/// Uses the population standard deviation; zero-variance columns are
/// centered and scaled by 1.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; n_features];
        let mut scales = vec![1.0; n_features];

        for j in 0..n_features {
            let mean = rows.iter().map(|row| row[j]).sum::<f64>() / n;
            let variance = rows.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            let std = variance.sqrt();
            if std > f64::EPSILON {
                scales[j] = std;
            }
        }

        Self { means, scales }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(value, (mean, scale))| (value - mean) / scale)
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> (Self, Vec<Vec<f64>>) {
        let scaler = Self::fit(rows);
        let scaled = scaler.transform(rows);
        (scaler, scaled)
    }
}

/// Fill gaps with the median of the present values (0 if none are present).
pub fn impute_median(column: &[Option<f64>]) -> Vec<f64> {
    let fill = median(column.iter().flatten().copied()).unwrap_or(0.0);
    column.iter().map(|v| v.unwrap_or(fill)).collect()
}

/// Standardized salary, age, experience rank and one-hot country columns.
///
/// Only countries present among `records` get a column, in declaration order.
pub fn clustering_features(records: &[&CanonicalRecord]) -> FeatureMatrix {
    let salary: Vec<Option<f64>> = records.iter().map(|r| r.salary).collect();
    let age: Vec<Option<f64>> = records.iter().map(|r| r.age).collect();
    let experience: Vec<Option<f64>> = records
        .iter()
        .map(|r| r.experience_level.map(|level| f64::from(level.rank())))
        .collect();

    let mut names = vec![
        "salary".to_string(),
        "age".to_string(),
        "experience".to_string(),
    ];
    let mut columns = vec![
        impute_median(&salary),
        impute_median(&age),
        impute_median(&experience),
    ];

    let present: HashSet<Country> = records.iter().map(|r| r.country).collect();
    for country in Country::ALL.into_iter().filter(|c| present.contains(c)) {
        names.push(format!("country_{}", country.name()));
        columns.push(
            records
                .iter()
                .map(|r| if r.country == country { 1.0 } else { 0.0 })
                .collect(),
        );
    }

    let matrix = FeatureMatrix::from_columns(names, columns);
    let (_, rows) = StandardScaler::fit_transform(&matrix.rows);
    debug!(
        "Clustering features: {} rows x {} columns",
        rows.len(),
        matrix.names.len()
    );
    FeatureMatrix {
        names: matrix.names,
        rows,
    }
}

fn stack_key(items: &BTreeSet<String>) -> String {
    if items.is_empty() {
        UNKNOWN_CATEGORY.to_string()
    } else {
        items.iter().cloned().collect::<Vec<_>>().join("+")
    }
}

fn encode_column(values: Vec<String>) -> Vec<f64> {
    let encoder = LabelEncoder::fit(values.iter().cloned());
    values
        .iter()
        .map(|v| encoder.transform(v).map_or(-1.0, |code| code as f64))
        .collect()
}

/// Label-encoded country, technology stack and framework stack, plus the
/// experience rank (-1 when unknown).
pub fn classification_features(records: &[&CanonicalRecord]) -> FeatureMatrix {
    let names = vec![
        "country".to_string(),
        "technology".to_string(),
        "framework".to_string(),
        "experience_level".to_string(),
    ];
    let columns = vec![
        encode_column(records.iter().map(|r| r.country.name().to_string()).collect()),
        encode_column(records.iter().map(|r| stack_key(&r.technology)).collect()),
        encode_column(records.iter().map(|r| stack_key(&r.framework)).collect()),
        records
            .iter()
            .map(|r| r.experience_level.map_or(-1.0, |level| f64::from(level.rank())))
            .collect(),
    ];
    FeatureMatrix::from_columns(names, columns)
}
