//! Classification stage: predicts whether a job is "high demand".
//!
//! The label is `salary > threshold`, where the threshold comes from the
//! configured [`DemandRule`]. Only records of the classification source that
//! carry a salary are labeled.

mod forest;
mod logistic;
mod split;

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression};
pub use split::{TrainTestSplit, stratified_split};

use crate::config::{DemandRule, MiningConfig};
use crate::error::MiningError;
use crate::features::classification_features;
use crate::types::{
    ClassificationResult, ClassifierKind, ConfusionCounts, FeatureImportance, ModelComparison,
    ModelQuality, RecordPrediction,
};
use techskills_processing::utils::median;
use techskills_processing::{CanonicalRecord, Warehouse};
use tracing::{debug, info, warn};

pub struct ClassificationStage;

impl ClassificationStage {
    /// Label, split, train both classifiers and keep the one with the best
    /// test accuracy (ties go to the random forest).
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::InsufficientData`] if fewer than `min_rows`
    /// records are labeled, if the labeled set or the training split holds a
    /// single class, or if the test split is empty.
    pub fn run(
        warehouse: &Warehouse,
        config: &MiningConfig,
    ) -> Result<ClassificationResult, MiningError> {
        let records: Vec<&CanonicalRecord> = warehouse
            .by_source(config.classification_source)
            .filter(|r| r.salary.is_some())
            .collect();
        info!(
            "Classifying {} {} records with a salary ({})",
            records.len(),
            config.classification_source,
            config.demand_rule.describe()
        );

        if records.len() < config.min_rows {
            return Err(MiningError::insufficient(format!(
                "{} labeled records, at least {} required",
                records.len(),
                config.min_rows
            )));
        }

        let salaries = records.iter().filter_map(|r| r.salary);
        let threshold = match config.demand_rule {
            DemandRule::MedianSalary => median(salaries)
                .ok_or_else(|| MiningError::insufficient("no salaries to take a median of"))?,
            DemandRule::SalaryAbove { threshold } => threshold,
        };
        let labels: Vec<bool> = records
            .iter()
            .map(|r| r.salary.is_some_and(|s| s > threshold))
            .collect();

        let positive = labels.iter().filter(|&&l| l).count();
        if positive == 0 || positive == labels.len() {
            return Err(MiningError::insufficient(format!(
                "demand label has a single class ({} of {} high demand)",
                positive,
                labels.len()
            )));
        }

        let split = stratified_split(&labels, config.test_fraction, config.random_seed);
        let train_labels: Vec<bool> = split.train.iter().map(|&i| labels[i]).collect();
        let train_positive = train_labels.iter().filter(|&&l| l).count();
        if train_positive == 0 || train_positive == train_labels.len() {
            return Err(MiningError::insufficient(
                "training split holds a single class",
            ));
        }
        if split.test.is_empty() {
            return Err(MiningError::insufficient("test split is empty"));
        }

        let features = classification_features(&records);
        let train_rows: Vec<Vec<f64>> = split
            .train
            .iter()
            .map(|&i| features.rows[i].clone())
            .collect();

        let forest = RandomForest::fit(
            &train_rows,
            &train_labels,
            &ForestParams {
                n_trees: config.n_trees,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.random_seed,
            },
        );

        let logistic = LogisticRegression::fit(&train_rows, &train_labels, &LogisticParams::default());

        let mut best: Option<(ClassifierKind, Vec<bool>, f64)> = None;
        let mut models = Vec::with_capacity(ClassifierKind::ALL.len());
        for kind in ClassifierKind::ALL {
            let predicted: Vec<bool> = features
                .rows
                .iter()
                .map(|row| match kind {
                    ClassifierKind::RandomForest => forest.predict(row),
                    ClassifierKind::LogisticRegression => logistic.predict(row),
                })
                .collect();
            let hit_rate = |indices: &[usize]| {
                let hits = indices.iter().filter(|&&i| labels[i] == predicted[i]).count();
                hits as f64 / indices.len().max(1) as f64
            };
            let comparison = ModelComparison {
                model: kind,
                train_accuracy: hit_rate(&split.train),
                test_accuracy: hit_rate(&split.test),
            };
            debug!(
                "{}: train accuracy {:.4}, test accuracy {:.4}",
                kind, comparison.train_accuracy, comparison.test_accuracy
            );
            if best
                .as_ref()
                .is_none_or(|(_, _, accuracy)| comparison.test_accuracy > *accuracy)
            {
                best = Some((kind, predicted, comparison.test_accuracy));
            }
            models.push(comparison);
        }
        let Some((best_model, predicted, _)) = best else {
            return Err(MiningError::insufficient("no classifier was trained"));
        };

        let confusion = ConfusionCounts::from_pairs(split.test.iter().map(|&i| (labels[i], predicted[i])));
        let accuracy = confusion.accuracy();

        let majority = train_positive * 2 > train_labels.len();
        let baseline_hits = split.test.iter().filter(|&&i| labels[i] == majority).count();
        let baseline_accuracy = baseline_hits as f64 / split.test.len() as f64;
        if accuracy <= baseline_accuracy {
            warn!(
                "Classifier accuracy {:.4} does not beat the majority baseline {:.4}",
                accuracy, baseline_accuracy
            );
        }

        let mut feature_importances: Vec<FeatureImportance> = features
            .names
            .iter()
            .zip(forest.feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                feature: name.clone(),
                importance,
            })
            .collect();
        feature_importances.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.feature.cmp(&b.feature))
        });

        let mut in_test = vec![false; records.len()];
        for &i in &split.test {
            in_test[i] = true;
        }
        let predictions = records
            .iter()
            .enumerate()
            .map(|(i, record)| RecordPrediction {
                record_id: record.id,
                actual: labels[i],
                predicted: predicted[i],
                in_test_split: in_test[i],
            })
            .collect();

        info!(
            "Classification complete: {} accuracy {:.4} (baseline {:.4}) on {} test records",
            best_model,
            accuracy,
            baseline_accuracy,
            split.test.len()
        );

        Ok(ClassificationResult {
            source_type: config.classification_source,
            demand_rule: config.demand_rule,
            salary_threshold: threshold,
            labeled_records: records.len(),
            positive_records: positive,
            train_size: split.train.len(),
            test_size: split.test.len(),
            best_model,
            models,
            confusion,
            accuracy,
            baseline_accuracy,
            quality: ModelQuality::from_accuracy(accuracy),
            feature_importances,
            predictions,
        })
    }
}
