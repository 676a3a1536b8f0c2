//! Random Forest classifier

use crate::error::{AdaptError, Result};
use super::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit the forest on class codes `0..k`.
    ///
    /// Tree `i` draws its bootstrap sample and split features from
    /// `random_state + i`, so the result does not depend on thread scheduling.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || self.n_estimators == 0 {
            return Err(AdaptError::Training(
                "random forest needs at least one sample and one tree".into(),
            ));
        }

        let max_code = y.iter().fold(0.0f64, |a, &b| a.max(b)) as usize;
        self.n_classes = self.n_classes.max(max_code + 1);
        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples)
                        .map(|_| (rng.next_u64() % n_samples as u64) as usize)
                        .collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(self.criterion)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_n_classes(self.n_classes)
                    .with_random_state(rng.next_u64());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean of the per-tree leaf class distributions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for p in &per_tree {
            proba += p;
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Probabilities for a single sample
    pub fn predict_proba_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }
        let mut proba = Array1::zeros(self.n_classes);
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_value(sample)?) {
                *p += v;
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Most probable class code per sample
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| super::argmax(&row) as f64)
            .collect())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check a deserialized forest before it serves predictions
    pub(crate) fn check_structure(
        &self,
        n_features: usize,
        n_classes: usize,
    ) -> std::result::Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "forest expects {} features, expected {n_features}",
                self.n_features
            ));
        }
        if self.n_classes != n_classes {
            return Err(format!("forest has {} classes, expected {n_classes}", self.n_classes));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if !tree.is_classifier() {
                return Err(format!("forest tree {i} is not a classifier"));
            }
            tree.check_structure(n_features, n_classes)
                .map_err(|reason| format!("forest tree {i}: {reason}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_class_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((90, 4), |(i, j)| {
            let class = (i % 3) as f64;
            match j {
                0 => class * 2.0 + (i as f64 * 0.37).sin() * 0.3,
                1 => (i as f64 * 1.3).cos(),
                2 => class - (i as f64 * 0.11).sin() * 0.2,
                _ => (i % 7) as f64,
            }
        });
        let y: Array1<f64> = (0..90).map(|i| (i % 3) as f64).collect();
        (x, y)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = three_class_data();
        let mut rf = RandomForest::new(15).with_max_depth(5).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
        assert_eq!(rf.n_trees(), 15);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = three_class_data();
        let mut rf = RandomForest::new(10).with_random_state(1);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (90, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }

        let single = rf.predict_proba_row(x.row(4)).unwrap();
        for (a, b) in single.iter().zip(proba.row(4).iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (x, y) = three_class_data();
        let fit = || {
            let mut rf = RandomForest::new(8).with_random_state(7);
            rf.fit(&x, &y).unwrap();
            rf.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(23), 4);
        assert_eq!(MaxFeatures::Log2.resolve(23), 4);
        assert_eq!(MaxFeatures::Fixed(50).resolve(23), 23);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_feature_importances_normalised() {
        let (x, y) = three_class_data();
        let mut rf = RandomForest::new(10).with_random_state(3);
        rf.fit(&x, &y).unwrap();
        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] + imp[2] > imp[1] + imp[3]);
    }

    #[test]
    fn test_check_structure() {
        let (x, y) = three_class_data();
        let mut rf = RandomForest::new(4).with_random_state(5);
        rf.fit(&x, &y).unwrap();
        assert!(rf.check_structure(4, 3).is_ok());
        assert!(rf.check_structure(23, 3).unwrap_err().contains("features"));
        assert!(rf.check_structure(4, 2).unwrap_err().contains("classes"));

        rf.trees.clear();
        assert!(rf.check_structure(4, 3).is_err());
    }
}
