//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from standard gradient boosting:
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Minimum child weight constraint
//!
//! The classifier optimises the softmax loss with one tree per class per round.

use crate::error::{AdaptError, Result};
use super::gradient_boosting::{class_codes, softmax, softmax_rows};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split { feature, threshold, left, right } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn check(&self, n_features: usize) -> std::result::Result<(), String> {
        match self {
            XGBNode::Leaf { weight } if !weight.is_finite() => {
                Err("leaf holds a non-finite weight".to_string())
            }
            XGBNode::Leaf { .. } => Ok(()),
            XGBNode::Split { feature, threshold, left, right } => {
                if *feature >= n_features {
                    return Err(format!("split on feature {feature}, model has {n_features} features"));
                }
                if threshold.is_nan() {
                    return Err(format!("split on feature {feature} has a NaN threshold"));
                }
                left.check(n_features)?;
                right.check(n_features)
            }
        }
    }
}

/// Gradient statistics for one boosting tree
struct GradientPair<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    stats: &GradientPair<'_>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| stats.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| stats.hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Earlier features win ties.
    let best_split = feature_indices
        .iter()
        .filter_map(|&f| find_best_split_for_feature(x, stats, indices, f, config))
        .fold(None, |best: Option<(usize, f64, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        });

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, stats, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, stats, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Best `(feature, threshold, gain)` for one feature
fn find_best_split_for_feature(
    x: &Array2<f64>,
    stats: &GradientPair<'_>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| stats.grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| stats.hess[i]).sum();
    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(usize, f64, f64)> = None;

    for pair in sorted_indices.windows(2) {
        let (idx, next_idx) = (pair[0], pair[1]);
        g_left += stats.grad[idx];
        h_left += stats.hess[idx];

        let value = x[[idx, feature]];
        let next = x[[next_idx, feature]];
        // Identical values cannot be separated
        if next <= value {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda) - parent_score);

        if best.map_or(true, |b| gain > b.2) {
            best = Some((feature, value + (next - value) / 2.0, gain));
        }
    }

    best
}

/// Shared helper: compute split-count importances from XGBNode trees
fn xgb_tree_importances<'a>(trees: impl Iterator<Item = &'a XGBNode>, n_features: usize) -> Array1<f64> {
    let mut counts = vec![0.0f64; n_features];
    for tree in trees {
        xgb_count_splits(tree, &mut counts);
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
    Array1::from_vec(counts)
}

fn xgb_count_splits(node: &XGBNode, counts: &mut [f64]) {
    match node {
        XGBNode::Leaf { .. } => {}
        XGBNode::Split { feature, left, right, .. } => {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            xgb_count_splits(left, counts);
            xgb_count_splits(right, counts);
        }
    }
}

// ─── XGBoost Classifier ────────────────────────────────────────────────────

/// XGBoost Classifier (softmax loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// `trees[round][class]`
    trees: Vec<Vec<XGBNode>>,
    n_classes: usize,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit on class codes `0..k`; raw scores start at zero
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

        let mut raw = Array2::<f64>::zeros((n_samples, n_classes));
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let proba = softmax_rows(&raw);
            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices: Vec<Vec<usize>> = (0..n_classes)
                .map(|_| subsample(&mut rng, n_features, self.config.colsample_bytree))
                .collect();

            let config = &self.config;
            let round: Vec<XGBNode> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    // Softmax loss: grad = p - y, hess = 2p(1 - p)
                    let grad: Vec<f64> = (0..n_samples)
                        .map(|i| proba[[i, k]] - if codes[i] == k { 1.0 } else { 0.0 })
                        .collect();
                    let hess: Vec<f64> = (0..n_samples)
                        .map(|i| {
                            let p = proba[[i, k]];
                            (2.0 * p * (1.0 - p)).max(1e-16)
                        })
                        .collect();
                    let stats = GradientPair { grad: &grad, hess: &hess };
                    build_xgb_tree(x, &stats, &row_indices, &col_indices[k], 0, config)
                })
                .collect();

            for (k, tree) in round.iter().enumerate() {
                for (i, sample) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(sample);
                }
            }
            self.trees.push(round);
        }

        Ok(())
    }

    /// Raw (pre-softmax) scores, `(n_samples, n_classes)`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted(x.ncols())?;
        let mut raw = Array2::zeros((x.nrows(), self.n_classes));
        for (mut out, sample) in raw.rows_mut().into_iter().zip(x.rows()) {
            out.assign(&self.raw_scores(sample));
        }
        Ok(raw)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.decision_function(x)?))
    }

    /// Probabilities for a single sample
    pub fn predict_proba_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_fitted(sample.len())?;
        Ok(softmax(self.raw_scores(sample).view()))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| super::argmax(&row) as f64)
            .collect())
    }

    /// Split-count importances across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        Some(xgb_tree_importances(self.trees.iter().flatten(), self.n_features))
    }

    /// Check a deserialized model before it serves predictions
    pub(crate) fn check_structure(
        &self,
        n_features: usize,
        n_classes: usize,
    ) -> std::result::Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "xgboost expects {} features, expected {n_features}",
                self.n_features
            ));
        }
        if self.n_classes != n_classes {
            return Err(format!("xgboost has {} classes, expected {n_classes}", self.n_classes));
        }
        if self.trees.is_empty() {
            return Err("xgboost has no rounds".to_string());
        }
        for (r, round) in self.trees.iter().enumerate() {
            if round.len() != n_classes {
                return Err(format!(
                    "xgboost round {r} has {} trees, expected {n_classes}",
                    round.len()
                ));
            }
            for tree in round {
                tree.check(n_features)
                    .map_err(|reason| format!("xgboost round {r}: {reason}"))?;
            }
        }
        Ok(())
    }

    fn raw_scores(&self, sample: ArrayView1<f64>) -> Array1<f64> {
        let mut raw = Array1::zeros(self.n_classes);
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                raw[k] += self.config.learning_rate * tree.predict(sample);
            }
        }
        raw
    }

    fn check_fitted(&self, width: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }
        if width != self.n_features {
            return Err(AdaptError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{width} features"),
            });
        }
        Ok(())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| match j {
            0 => (i % 3) as f64 * 1.5 + (i as f64 * 0.9).sin() * 0.3,
            1 => (i as f64 * 0.17).cos(),
            _ => (i % 4) as f64,
        });
        let y: Array1<f64> = (0..60).map(|i| (i % 3) as f64).collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 20,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();

        let preds = model.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        let acc = correct as f64 / y.len() as f64;
        assert!(acc >= 0.9, "XGBoost classifier accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_predict_proba() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            subsample: 0.8,
            colsample_bytree: 0.8,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (60, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }

        let single = model.predict_proba_row(x.row(11)).unwrap();
        for (a, b) in single.iter().zip(proba.row(11).iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_xgboost_seeded_runs_match() {
        let (x, y) = classification_data();
        let fit = || {
            let mut model = XGBoostClassifier::new(XGBoostConfig {
                n_estimators: 5,
                subsample: 0.8,
                colsample_bytree: 0.8,
                ..Default::default()
            });
            model.fit(&x, &y, 3).unwrap();
            model.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_xgboost_regularization() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            reg_lambda: 10.0,
            reg_alpha: 1.0,
            gamma: 1.0,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();
        assert_eq!(model.predict(&x).unwrap().len(), 60);
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        assert_eq!(compute_leaf_weight(0.5, 1.0, 1.0, 1.0), 0.0);
        assert!((compute_leaf_weight(-3.0, 1.0, 1.0, 0.0) - 1.5).abs() < 1e-12);
        assert!((compute_leaf_weight(3.0, 1.0, 1.0, 1.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_structure() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 3,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();
        assert!(model.check_structure(3, 3).is_ok());
        assert!(model.check_structure(3, 2).is_err());

        let mut bad_split = model.clone();
        bad_split.trees[0][0] = XGBNode::Split {
            feature: 7,
            threshold: 0.0,
            left: Box::new(XGBNode::Leaf { weight: 0.1 }),
            right: Box::new(XGBNode::Leaf { weight: -0.1 }),
        };
        assert!(bad_split.check_structure(3, 3).unwrap_err().contains("feature 7"));

        let mut short_round = model;
        short_round.trees[2].pop();
        assert!(short_round.check_structure(3, 3).unwrap_err().contains("round 2"));
    }
}
