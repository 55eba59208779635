//! Clustering stage: segments one source's records with k-means.

mod kmeans;

pub use kmeans::{KMeans, KMeansFit, silhouette_score};

use crate::config::{ClusterSelection, MiningConfig};
use crate::error::MiningError;
use crate::features::clustering_features;
use crate::types::{ClusterAssignment, ClusterProfile, ClusteringResult};
use techskills_processing::utils::mean;
use techskills_processing::{CanonicalRecord, Country, Warehouse};
use tracing::{debug, info};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct ClusteringStage;

impl ClusteringStage {
    /// Cluster the records of `config.clustering_source`.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::InsufficientData`] when the source has fewer
    /// records than the chosen number of clusters.
    pub fn run(
        warehouse: &Warehouse,
        config: &MiningConfig,
    ) -> Result<ClusteringResult, MiningError> {
        let records: Vec<&CanonicalRecord> =
            warehouse.by_source(config.clustering_source).collect();
        let n = records.len();
        info!(
            "Clustering {} {} records ({:?})",
            n, config.clustering_source, config.cluster_selection
        );

        let features = clustering_features(&records);
        let (k, fit, silhouette) = Self::select(&features.rows, config)?;

        let sizes = fit.cluster_sizes();
        let profiles = (0..k)
            .map(|cluster| {
                let members: Vec<&CanonicalRecord> = records
                    .iter()
                    .zip(&fit.labels)
                    .filter(|(_, label)| **label == cluster)
                    .map(|(record, _)| *record)
                    .collect();
                ClusterProfile {
                    cluster,
                    size: sizes[cluster],
                    share_pct: round2(sizes[cluster] as f64 / n as f64 * 100.0),
                    mean_salary: mean(members.iter().filter_map(|r| r.salary)).map(round2),
                    mean_age: mean(members.iter().filter_map(|r| r.age)).map(round2),
                    dominant_country: dominant_country(&members),
                    centroid: fit.centroids[cluster].clone(),
                }
            })
            .collect();

        let assignments = records
            .iter()
            .zip(&fit.labels)
            .map(|(record, &cluster)| ClusterAssignment {
                record_id: record.id,
                cluster,
            })
            .collect();

        info!(
            "Clustering complete: {} clusters, sizes {:?}, silhouette {:?}",
            k, sizes, silhouette
        );

        Ok(ClusteringResult {
            source_type: config.clustering_source,
            selection: config.cluster_selection,
            k,
            feature_names: features.names,
            assignments,
            profiles,
            inertia: fit.inertia,
            silhouette,
            iterations: fit.iterations,
        })
    }

    /// Resolve `k` and fit. A silhouette search only considers `k < rows`.
    fn select(
        points: &[Vec<f64>],
        config: &MiningConfig,
    ) -> Result<(usize, KMeansFit, Option<f64>), MiningError> {
        let n = points.len();
        let searching = matches!(config.cluster_selection, ClusterSelection::Silhouette { .. });
        let candidates: Vec<usize> = config
            .cluster_selection
            .candidates(n)
            .into_iter()
            .filter(|&k| !searching || k < n)
            .collect();
        if candidates.is_empty() {
            return Err(MiningError::insufficient(format!(
                "{} rows leave no cluster count to search",
                n
            )));
        }

        let mut best: Option<(usize, KMeansFit, Option<f64>)> = None;
        for k in candidates {
            let fit = KMeans::new(k, config.random_seed)
                .restarts(config.kmeans_restarts)
                .max_iterations(config.max_iterations)
                .fit(points)?;
            let score = if k < n {
                silhouette_score(points, &fit.labels, k)
            } else {
                None
            };
            debug!("k={} inertia={:.4} silhouette={:?}", k, fit.inertia, score);

            let better = match &best {
                None => true,
                Some((_, _, best_score)) => {
                    score.unwrap_or(f64::NEG_INFINITY) > best_score.unwrap_or(f64::NEG_INFINITY)
                }
            };
            if better {
                best = Some((k, fit, score));
            }
        }

        best.ok_or_else(|| MiningError::insufficient("no cluster count could be fitted"))
    }
}

/// Most frequent country; ties go to declaration order.
fn dominant_country(members: &[&CanonicalRecord]) -> Option<Country> {
    let mut counts = vec![0usize; Country::ALL.len()];
    for record in members {
        counts[record.country.index()] += 1;
    }
    let max = *counts.iter().max()?;
    if max == 0 {
        return None;
    }
    Country::ALL.into_iter().find(|c| counts[c.index()] == max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use techskills_processing::{RecordId, SourceType};

    fn profile(id: u64, country: Country, salary: f64, age: f64) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(RecordId(id), SourceType::Profile, country);
        record.salary = Some(salary);
        record.age = Some(age);
        record
    }

    fn segmented_warehouse() -> Warehouse {
        let mut records = Vec::new();
        for i in 0..6 {
            let (salary, age) = (20_000.0 + i as f64 * 500.0, 24.0 + i as f64);
            records.push(profile(i + 1, Country::Colombia, salary, age));
        }
        for i in 0..6 {
            let (salary, age) = (150_000.0 + i as f64 * 1_000.0, 40.0 + i as f64);
            records.push(profile(i + 7, Country::Usa, salary, age));
        }
        Warehouse::builder().build(records).unwrap()
    }

    #[test]
    fn test_fixed_k_profiles() {
        let config = MiningConfig::builder()
            .cluster_selection(ClusterSelection::Fixed { k: 2 })
            .build()
            .unwrap();
        let result = ClusteringStage::run(&segmented_warehouse(), &config).unwrap();

        assert_eq!(result.k, 2);
        assert_eq!(result.assignments.len(), 12);
        let mut countries: Vec<Option<Country>> =
            result.profiles.iter().map(|p| p.dominant_country).collect();
        countries.sort();
        assert_eq!(countries, vec![Some(Country::Usa), Some(Country::Colombia)]);
        assert!(result.profiles.iter().all(|p| p.size == 6 && p.share_pct == 50.0));
        assert!(result.silhouette.unwrap() > 0.5);
    }

    #[test]
    fn test_silhouette_search_prefers_true_structure() {
        let config = MiningConfig::builder()
            .cluster_selection(ClusterSelection::Silhouette { min_k: 2, max_k: 5 })
            .build()
            .unwrap();
        let result = ClusteringStage::run(&segmented_warehouse(), &config).unwrap();
        assert_eq!(result.k, 2);
    }

    #[test]
    fn test_too_few_records() {
        let warehouse = Warehouse::builder()
            .build(vec![profile(1, Country::Peru, 10_000.0, 30.0)])
            .unwrap();
        let err = ClusteringStage::run(&warehouse, &MiningConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_dominant_country_ties_follow_declaration_order() {
        let a = profile(1, Country::Mexico, 1.0, 1.0);
        let b = profile(2, Country::Spain, 1.0, 1.0);
        assert_eq!(dominant_country(&[&a, &b]), Some(Country::Spain));
        assert_eq!(dominant_country(&[]), None);
    }
}
