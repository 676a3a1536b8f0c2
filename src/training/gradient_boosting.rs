//! Gradient Boosting implementation
//!
//! Multiclass gradient boosting on the softmax loss: every round fits one
//! regression tree per class to the negative gradient `y_k - p_k`.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{AdaptError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each round
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// `trees[round][class]`
    trees: Vec<Vec<DecisionTree>>,
    /// Log class priors the raw scores start from
    initial_scores: Vec<f64>,
    n_classes: usize,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_scores: Vec::new(),
            n_classes: 0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit on class codes `0..k`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AdaptError::Training("cannot boost on zero samples".into()));
        }
        let codes = class_codes(y, n_classes)?;
        self.n_classes = n_classes;
        self.n_features = n_features;

        let mut counts = vec![0.0_f64; n_classes];
        for &c in &codes {
            counts[c] += 1.0;
        }
        self.initial_scores = counts
            .iter()
            .map(|&c| (c.max(1e-12) / n_samples as f64).ln())
            .collect();

        let mut raw = Array2::from_shape_fn((n_samples, n_classes), |(_, k)| self.initial_scores[k]);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let proba = softmax_rows(&raw);
            let rows = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &rows);

            let round: Vec<DecisionTree> = (0..n_classes)
                .into_par_iter()
                .map(|k| -> Result<DecisionTree> {
                    let residuals: Array1<f64> = rows
                        .iter()
                        .map(|&i| indicator(codes[i], k) - proba[[i, k]])
                        .collect();
                    let mut tree = DecisionTree::new_regressor()
                        .with_max_depth(self.config.max_depth)
                        .with_min_samples_split(self.config.min_samples_split)
                        .with_min_samples_leaf(self.config.min_samples_leaf);
                    tree.fit(&x_sub, &residuals)?;
                    Ok(tree)
                })
                .collect::<Result<Vec<_>>>()?;

            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                let mut column = raw.column_mut(k);
                column.scaled_add(self.config.learning_rate, &update);

                if let Some(imp) = tree.feature_importances() {
                    for (total, &v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                        *total += v;
                    }
                }
            }
            self.trees.push(round);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    /// Raw (pre-softmax) scores, `(n_samples, n_classes)`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }
        let mut raw = Array2::from_shape_fn((x.nrows(), self.n_classes), |(_, k)| self.initial_scores[k]);
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                raw.column_mut(k).scaled_add(self.config.learning_rate, &update);
            }
        }
        Ok(raw)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.decision_function(x)?))
    }

    /// Probabilities for a single sample
    pub fn predict_proba_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }
        let mut raw = Array1::from_vec(self.initial_scores.clone());
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                raw[k] += self.config.learning_rate * tree.leaf_value(sample)?[0];
            }
        }
        Ok(softmax(raw.view()))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| super::argmax(&row) as f64)
            .collect())
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Check a deserialized model before it serves predictions
    pub(crate) fn check_structure(
        &self,
        n_features: usize,
        n_classes: usize,
    ) -> std::result::Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "boosting expects {} features, expected {n_features}",
                self.n_features
            ));
        }
        if self.n_classes != n_classes {
            return Err(format!("boosting has {} classes, expected {n_classes}", self.n_classes));
        }
        if self.initial_scores.len() != n_classes
            || self.initial_scores.iter().any(|s| !s.is_finite())
        {
            return Err(format!(
                "boosting has {} initial scores, expected {n_classes} finite values",
                self.initial_scores.len()
            ));
        }
        if self.trees.is_empty() {
            return Err("boosting has no rounds".to_string());
        }
        for (r, round) in self.trees.iter().enumerate() {
            if round.len() != n_classes {
                return Err(format!(
                    "boosting round {r} has {} trees, expected {n_classes}",
                    round.len()
                ));
            }
            for tree in round {
                if tree.is_classifier() {
                    return Err(format!("boosting round {r} holds a classification tree"));
                }
                tree.check_structure(n_features, n_classes)
                    .map_err(|reason| format!("boosting round {r}: {reason}"))?;
            }
        }
        Ok(())
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let k = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
        let mut indices = rand::seq::index::sample(rng, n, k).into_vec();
        indices.sort_unstable();
        indices
    }
}

/// Validate `y` as class codes below `n_classes`
pub(crate) fn class_codes(y: &Array1<f64>, n_classes: usize) -> Result<Vec<usize>> {
    if n_classes < 2 {
        return Err(AdaptError::Training(format!(
            "need at least two classes, got {n_classes}"
        )));
    }
    y.iter()
        .map(|&v| {
            if v >= 0.0 && v.fract() == 0.0 && (v as usize) < n_classes {
                Ok(v as usize)
            } else {
                Err(AdaptError::InvalidTargetCode {
                    code: v.max(0.0) as usize,
                    n_classes,
                })
            }
        })
        .collect()
}

fn indicator(code: usize, k: usize) -> f64 {
    if code == k {
        1.0
    } else {
        0.0
    }
}

/// Numerically stable softmax of one score vector
pub(crate) fn softmax(scores: ArrayView1<f64>) -> Array1<f64> {
    let max = scores.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = scores.mapv(|s| (s - max).exp());
    let sum = exp.sum();
    exp / sum
}

pub(crate) fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.rows_mut() {
        let p = softmax(row.view());
        row.assign(&p);
    }
    out
}
