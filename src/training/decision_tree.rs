//! Decision tree implementation
//!
//! Classification trees keep the class distribution of each leaf so ensembles
//! can average probabilities; regression trees keep the mean target.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Nodes with fewer samples scan their features sequentially
const PARALLEL_SPLIT_MIN_SAMPLES: usize = 4096;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the class distribution, or `[mean]` for regression
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn leaf_value(&self, sample: ArrayView1<f64>) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Every split reads a feature below `n_features` and every leaf holds
    /// `leaf_len` finite values
    fn check(&self, n_features: usize, leaf_len: usize) -> std::result::Result<(), String> {
        match self {
            TreeNode::Leaf { value, .. } => {
                if value.len() != leaf_len {
                    return Err(format!("leaf holds {} values, expected {leaf_len}", value.len()));
                }
                if value.iter().any(|v| !v.is_finite()) {
                    return Err("leaf holds a non-finite value".to_string());
                }
                Ok(())
            }
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if *feature_idx >= n_features {
                    return Err(format!(
                        "split on feature {feature_idx}, model has {n_features} features"
                    ));
                }
                if threshold.is_nan() {
                    return Err(format!("split on feature {feature_idx} has a NaN threshold"));
                }
                left.check(n_features, leaf_len)?;
                right.check(n_features, leaf_len)
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    pub fn is_classification(self) -> bool {
        !matches!(self, Criterion::MSE)
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fix the class count so leaves cover classes absent from this sample
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn is_classifier(&self) -> bool {
        self.criterion.is_classification()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit the tree. For classification `y` holds class codes `0..k`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AdaptError::Training("cannot fit a tree on zero samples".into()));
        }

        if self.is_classifier() {
            if let Some(bad) = y.iter().find(|v| **v < 0.0 || v.fract() != 0.0) {
                return Err(AdaptError::Training(format!("invalid class code {bad}")));
            }
            let max_code = y.iter().fold(0.0f64, |a, &b| a.max(b)) as usize;
            self.n_classes = self.n_classes.max(max_code + 1);
        }
        self.n_features = x.ncols();

        let mut builder = TreeBuilder {
            tree: &*self,
            x,
            y,
            importances: vec![0.0; x.ncols()],
            rng: ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0)),
        };
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = builder.build(&indices, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Class probabilities, `(n_samples, n_classes)`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(AdaptError::ModelNotFitted)?;
        if !self.is_classifier() {
            return Err(AdaptError::Training("predict_proba needs a classification tree".into()));
        }
        self.check_width(x.ncols())?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (mut out, sample) in proba.rows_mut().into_iter().zip(x.rows()) {
            for (o, v) in out.iter_mut().zip(root.leaf_value(sample)) {
                *o = *v;
            }
        }
        Ok(proba)
    }

    /// Class code (argmax, ties to the lowest code) or regression value
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AdaptError::ModelNotFitted)?;
        self.check_width(x.ncols())?;

        Ok(x.rows()
            .into_iter()
            .map(|sample| {
                let value = root.leaf_value(sample);
                if self.is_classifier() {
                    super::argmax(value) as f64
                } else {
                    value[0]
                }
            })
            .collect())
    }

    /// Leaf payload for one sample
    pub(crate) fn leaf_value(&self, sample: ArrayView1<f64>) -> Result<&[f64]> {
        let root = self.root.as_ref().ok_or(AdaptError::ModelNotFitted)?;
        self.check_width(sample.len())?;
        Ok(root.leaf_value(sample))
    }

    /// Normalised impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the deepest leaf; a lone leaf has depth 0
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    /// Structural check of a deserialized tree against the width and class
    /// count it will be used with. Fitted trees always pass.
    pub(crate) fn check_structure(
        &self,
        n_features: usize,
        n_classes: usize,
    ) -> std::result::Result<(), String> {
        let root = self.root.as_ref().ok_or("tree has no root")?;
        if self.n_features != n_features {
            return Err(format!(
                "tree expects {} features, expected {n_features}",
                self.n_features
            ));
        }
        let leaf_len = if self.is_classifier() {
            if self.n_classes != n_classes {
                return Err(format!(
                    "tree has {} classes, expected {n_classes}",
                    self.n_classes
                ));
            }
            n_classes
        } else {
            1
        };
        root.check(n_features, leaf_len)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features {
            return Err(AdaptError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{width} features"),
            });
        }
        Ok(())
    }
}

/// Running sufficient statistics of one side of a split
#[derive(Clone)]
struct NodeStats {
    class_counts: Vec<f64>,
    n: usize,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            class_counts: vec![0.0; n_classes],
            n: 0,
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, yi: f64, classification: bool) {
        self.n += 1;
        if classification {
            self.class_counts[yi as usize] += 1.0;
        } else {
            self.sum += yi;
            self.sq_sum += yi * yi;
        }
    }

    fn remove(&mut self, yi: f64, classification: bool) {
        self.n -= 1;
        if classification {
            self.class_counts[yi as usize] -= 1.0;
        } else {
            self.sum -= yi;
            self.sq_sum -= yi * yi;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        match criterion {
            Criterion::Gini => 1.0 - self.class_counts.iter().map(|c| (c / n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -self
                .class_counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|c| {
                    let p = c / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            // Var = E[X²] - E[X]²
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }

    fn leaf_value(&self, classification: bool) -> Vec<f64> {
        let n = self.n.max(1) as f64;
        if classification {
            self.class_counts.iter().map(|c| c / n).collect()
        } else {
            vec![self.sum / n]
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_impurity: f64,
    right_impurity: f64,
}

struct TreeBuilder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    importances: Vec<f64>,
    rng: ChaCha8Rng,
}

impl TreeBuilder<'_> {
    fn stats(&self, indices: &[usize]) -> NodeStats {
        let classification = self.tree.is_classifier();
        let mut stats = NodeStats::empty(if classification { self.tree.n_classes } else { 0 });
        for &i in indices {
            stats.add(self.y[i], classification);
        }
        stats
    }

    fn build(&mut self, indices: &[usize], depth: usize) -> TreeNode {
        let tree = self.tree;
        let n_samples = indices.len();
        let stats = self.stats(indices);
        let impurity = stats.impurity(tree.criterion);
        let leaf = || TreeNode::Leaf {
            value: stats.leaf_value(tree.is_classifier()),
            n_samples,
        };

        let should_stop = n_samples < tree.min_samples_split
            || n_samples < 2 * tree.min_samples_leaf
            || tree.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return leaf();
        }

        let features = self.draw_features();
        let Some(best) = self.best_split(indices, &features, impurity, &stats) else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature]] <= best.threshold);
        if left_idx.len() < tree.min_samples_leaf || right_idx.len() < tree.min_samples_leaf {
            return leaf();
        }

        let n = n_samples as f64;
        self.importances[best.feature] += n * impurity
            - left_idx.len() as f64 * best.left_impurity
            - right_idx.len() as f64 * best.right_impurity;

        let left = Box::new(self.build(&left_idx, depth + 1));
        let right = Box::new(self.build(&right_idx, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn draw_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.tree.max_features {
            Some(k) if k < n_features => {
                let mut features = rand::seq::index::sample(&mut self.rng, n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(
        &self,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        parent: &NodeStats,
    ) -> Option<SplitCandidate> {
        let scan = |&feature: &usize| self.best_split_for_feature(indices, feature, parent_impurity, parent);
        let candidates: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_SPLIT_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Earlier features win ties.
        candidates.into_iter().flatten().fold(None, |best, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    /// Sorted sweep over one feature
    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        parent_impurity: f64,
        parent: &NodeStats,
    ) -> Option<SplitCandidate> {
        let tree = self.tree;
        let classification = tree.is_classifier();
        let mut order: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.x[[i, feature]], self.y[i]))
            .collect();
        order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let n = order.len();
        let mut left = NodeStats::empty(parent.class_counts.len());
        let mut right = parent.clone();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n.saturating_sub(1) {
            let (value, yi) = order[pos];
            left.add(yi, classification);
            right.remove(yi, classification);

            let next = order[pos + 1].0;
            if next <= value {
                continue;
            }
            if left.n < tree.min_samples_leaf || right.n < tree.min_samples_leaf {
                continue;
            }

            let left_impurity = left.impurity(tree.criterion);
            let right_impurity = right.impurity(tree.criterion);
            let weighted = (left.n as f64 * left_impurity + right.n as f64 * right_impurity) / n as f64;
            let gain = parent_impurity - weighted;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                    left_impurity,
                    right_impurity,
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_leaf_distributions() {
        let x = array![[1.0], [1.0], [1.0], [2.0], [2.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 2.0, 2.0, 2.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        let proba = tree.predict_proba(&array![[1.0], [2.0]]).unwrap();

        assert!((proba[[0, 0]] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proba[[0, 1]] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(proba[[1, 2]], 1.0);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_n_classes_covers_missing_codes() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 0.0];
        let mut tree = DecisionTree::new_classifier().with_n_classes(3);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict_proba(&x).unwrap().ncols(), 3);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();
        // The only pure split would isolate a single sample.
        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!(proba[[0, 0]] < 1.0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_seeded_feature_draw_is_reproducible() {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y: Array1<f64> = (0..40).map(|i| (i % 3) as f64).collect();

        let fit = |seed| {
            let mut tree = DecisionTree::new_classifier()
                .with_max_features(2)
                .with_random_state(seed);
            tree.fit(&x, &y).unwrap();
            tree.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(9), fit(9));
    }

    #[test]
    fn test_unfitted_and_width_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(AdaptError::ModelNotFitted)));

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&array![[1.0, 2.0], [2.0, 1.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(AdaptError::ShapeError { .. })));
    }

    #[test]
    fn test_check_structure() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &array![0.0, 0.0, 1.0, 2.0]).unwrap();
        assert!(tree.check_structure(2, 3).is_ok());
        assert!(tree.check_structure(3, 3).is_err());
        assert!(tree.check_structure(2, 4).is_err());

        if let Some(TreeNode::Split { feature_idx, .. }) = tree.root.as_mut() {
            *feature_idx = 999;
        }
        let err = tree.check_structure(2, 3).unwrap_err();
        assert!(err.contains("feature 999"));

        let mut regressor = DecisionTree::new_regressor();
        regressor.fit(&x, &array![0.5, 1.0, 1.5, 2.0]).unwrap();
        assert!(regressor.check_structure(2, 3).is_ok());
        regressor.root = Some(TreeNode::Leaf { value: vec![0.1, 0.2], n_samples: 4 });
        assert!(regressor.check_structure(2, 3).is_err());

        assert!(DecisionTree::new_classifier().check_structure(2, 3).is_err());
    }
}
