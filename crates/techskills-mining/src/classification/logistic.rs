//! L2-regularized logistic regression.
//!
//! Features are z-score standardized on the training rows, then weights are
//! fitted by full-batch gradient descent from zero. Training is therefore
//! deterministic without a seed.

use crate::features::StandardScaler;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// L2 penalty on the weights (the bias is not penalized).
    pub l2: f64,
    /// Stop once no gradient component exceeds this.
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iterations: 1_000,
            l2: 1e-3,
            tolerance: 1e-6,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    scaler: StandardScaler,
    weights: Vec<f64>,
    bias: f64,
    iterations: usize,
}

impl LogisticRegression {
    pub fn fit(x: &[Vec<f64>], y: &[bool], params: &LogisticParams) -> Self {
        let (scaler, rows) = StandardScaler::fit_transform(x);
        let n_features = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;
        let mut iterations = 0;

        while iterations < params.max_iterations {
            iterations += 1;
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (row, &label) in rows.iter().zip(y) {
                let error = sigmoid(linear(&weights, bias, row)) - f64::from(u8::from(label));
                for (g, value) in grad_w.iter_mut().zip(row) {
                    *g += error * value;
                }
                grad_b += error;
            }
            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g / n + params.l2 * w;
            }
            grad_b /= n;

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * g;
            }
            bias -= params.learning_rate * grad_b;

            let largest = grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if largest < params.tolerance {
                break;
            }
        }

        Self {
            scaler,
            weights,
            bias,
            iterations,
        }
    }

    /// Positive-class probability.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        self.scaler
            .transform(&[row.to_vec()])
            .first()
            .map_or(0.5, |row| sigmoid(linear(&self.weights, self.bias, row)))
    }

    pub fn predict(&self, row: &[f64]) -> bool {
        self.predict_proba(row) > 0.5
    }

    /// Weights in standardized feature space.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

fn linear(weights: &[f64], bias: f64, row: &[f64]) -> f64 {
    bias + weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Label depends only on feature 0; feature 1 is noise.
    fn threshold_data() -> (Vec<Vec<f64>>, Vec<bool>) {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64 * 1_000.0, ((i * 7) % 5) as f64])
            .collect();
        let y = (0..40).map(|i| i >= 20).collect();
        (x, y)
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_learns_linear_threshold() {
        let (x, y) = threshold_data();
        let model = LogisticRegression::fit(&x, &y, &LogisticParams::default());
        assert!(!model.predict(&[2_000.0, 1.0]));
        assert!(model.predict(&[37_000.0, 1.0]));
        let correct = x
            .iter()
            .zip(&y)
            .filter(|(row, label)| model.predict(row) == **label)
            .count();
        assert!(correct >= 38);
        assert!(model.weights()[0].abs() > model.weights()[1].abs());
    }

    #[test]
    fn test_probability_grows_with_informative_feature() {
        let (x, y) = threshold_data();
        let model = LogisticRegression::fit(&x, &y, &LogisticParams::default());
        assert!(model.predict_proba(&[5_000.0, 0.0]) < model.predict_proba(&[30_000.0, 0.0]));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = threshold_data();
        let params = LogisticParams::default();
        assert_eq!(
            LogisticRegression::fit(&x, &y, &params),
            LogisticRegression::fit(&x, &y, &params)
        );
    }

    #[test]
    fn test_iterations_are_bounded() {
        let (x, y) = threshold_data();
        let params = LogisticParams {
            max_iterations: 3,
            ..Default::default()
        };
        assert_eq!(LogisticRegression::fit(&x, &y, &params).iterations(), 3);
    }
}
