//! Random forest of binary CART trees.
//!
//! Trees split on `feature <= threshold` using Gini impurity, consider
//! `floor(sqrt(p))` randomly drawn features per node and are grown on
//! bootstrap samples. Importances are the mean decrease in impurity.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        /// Share of positive samples that reached the leaf.
        positive_rate: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn gini(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positive as f64 / total as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    left_size: usize,
    left_positive: usize,
    impurity: f64,
}

/// Everything one tree needs while it grows.
struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    params: &'a ForestParams,
    max_features: usize,
    rng: StdRng,
    /// Unnormalized impurity decrease per feature.
    importances: Vec<f64>,
    root_size: f64,
}

impl TreeBuilder<'_> {
    fn build(&mut self, samples: &[usize], depth: usize) -> Node {
        let total = samples.len();
        let positive = samples.iter().filter(|&&i| self.y[i]).count();
        let leaf = Node::Leaf {
            positive_rate: if total == 0 { 0.0 } else { positive as f64 / total as f64 },
        };

        if depth >= self.params.max_depth
            || total < self.params.min_samples_split
            || positive == 0
            || positive == total
        {
            return leaf;
        }

        let parent_impurity = gini(positive, total);
        let Some(best) = self.best_split(samples, positive) else {
            return leaf;
        };
        if parent_impurity - best.impurity <= MIN_GAIN {
            return leaf;
        }

        let right_size = total - best.left_size;
        let right_positive = positive - best.left_positive;
        self.importances[best.feature] += (total as f64 * parent_impurity
            - best.left_size as f64 * gini(best.left_positive, best.left_size)
            - right_size as f64 * gini(right_positive, right_size))
            / self.root_size;

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    /// Lowest weighted child impurity among the sampled features.
    fn best_split(&mut self, samples: &[usize], positive: usize) -> Option<Candidate> {
        let n_features = self.x.first().map_or(0, Vec::len);
        let features = index::sample(&mut self.rng, n_features, self.max_features).into_vec();
        let total = samples.len();
        let mut best: Option<Candidate> = None;

        for feature in features {
            let mut column: Vec<(f64, bool)> = samples
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_positive = 0;
            for split in 1..total {
                if column[split - 1].1 {
                    left_positive += 1;
                }
                let (previous, next) = (column[split - 1].0, column[split].0);
                if previous >= next {
                    continue;
                }
                let right_size = total - split;
                let impurity = (split as f64 * gini(left_positive, split)
                    + right_size as f64 * gini(positive - left_positive, right_size))
                    / total as f64;
                if best.is_none_or(|b| impurity < b.impurity) {
                    best = Some(Candidate {
                        feature,
                        threshold: (previous + next) / 2.0,
                        left_size: split,
                        left_positive,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { positive_rate } => return *positive_rate,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Grow `params.n_trees` trees. Tree `t` draws from
    /// `StdRng::seed_from_u64(seed + t)`.
    pub fn fit(x: &[Vec<f64>], y: &[bool], params: &ForestParams) -> Self {
        let n = x.len();
        let n_features = x.first().map_or(0, Vec::len);
        let max_features = ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1));
        let mut forest_importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_trees);

        for tree_idx in 0..params.n_trees {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut builder = TreeBuilder {
                x,
                y,
                params,
                max_features,
                rng,
                importances: vec![0.0; n_features],
                root_size: n as f64,
            };
            let root = if n == 0 || n_features == 0 {
                Node::Leaf { positive_rate: 0.0 }
            } else {
                builder.build(&bootstrap, 0)
            };

            let tree_total: f64 = builder.importances.iter().sum();
            if tree_total > 0.0 {
                for (acc, value) in forest_importances.iter_mut().zip(&builder.importances) {
                    *acc += value / tree_total;
                }
            }
            trees.push(DecisionTree { root });
        }

        let forest_total: f64 = forest_importances.iter().sum();
        if forest_total > 0.0 {
            for value in &mut forest_importances {
                *value /= forest_total;
            }
        }

        Self {
            trees,
            importances: forest_importances,
        }
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Positive when the mean probability is above one half.
    pub fn predict(&self, row: &[f64]) -> bool {
        self.predict_proba(row) > 0.5
    }

    /// Mean decrease in impurity per feature; sums to 1 unless no tree split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}
