//! Seeded stratified train/test split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices of each partition, both sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `round(class_size * test_fraction)` rows of each class.
///
/// A class always keeps at least one training row, so a class with a single
/// member never reaches the test split.
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        members.shuffle(&mut rng);

        let held_out = ((members.len() as f64 * test_fraction).round() as usize)
            .min(members.len().saturating_sub(1));
        test.extend_from_slice(&members[..held_out]);
        train.extend_from_slice(&members[held_out..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit { train, test }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_preserves_class_ratio() {
        let labels: Vec<bool> = (0..20).map(|i| i % 4 == 0).collect();
        let split = stratified_split(&labels, 0.3, 42);

        assert_eq!(split.train.len() + split.test.len(), 20);
        let test_positive = split.test.iter().filter(|&&i| labels[i]).count();
        // 5 positives * 0.3 rounds to 2, 15 negatives * 0.3 rounds to 5 (4.5 rounds away from zero).
        assert_eq!(test_positive, 2);
        assert_eq!(split.test.len(), 7);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let labels: Vec<bool> = (0..30).map(|i| i % 3 == 0).collect();
        let a = stratified_split(&labels, 0.3, 7);
        let b = stratified_split(&labels, 0.3, 7);
        assert_eq!(a, b);
        assert!(a.test.iter().all(|i| !a.train.contains(i)));
    }

    #[test]
    fn test_singleton_class_stays_in_training() {
        let labels = vec![true, false, false, false];
        let split = stratified_split(&labels, 0.5, 1);
        assert!(split.train.contains(&0));
        assert!(!split.test.contains(&0));
    }
}
