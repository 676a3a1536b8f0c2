//! Classification metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Fraction of matching predictions (0 for empty input)
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// `matrix[true][pred]` counts
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Unweighted mean F1 over the classes present in truth or prediction
pub fn macro_f1(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let labels: BTreeSet<usize> = y_true.iter().chain(y_pred).copied().collect();
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .map(|&c| class_scores(y_true, y_pred, c).2)
        .sum();
    total / labels.len() as f64
}

/// (precision, recall, f1, support) for one class; undefined ratios are 0
fn class_scores(y_true: &[usize], y_pred: &[usize], class: usize) -> (f64, f64, f64, usize) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1, tp + fn_)
}

/// Per-class scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub classes: Vec<ClassMetrics>,
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationReport {
    pub fn compute(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Self {
        let classes = class_names
            .iter()
            .enumerate()
            .map(|(code, label)| {
                let (precision, recall, f1_score, support) = class_scores(y_true, y_pred, code);
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        Self {
            accuracy: accuracy(y_true, y_pred),
            macro_f1: macro_f1(y_true, y_pred),
            classes,
            confusion_matrix: confusion_matrix(y_true, y_pred, class_names.len()),
        }
    }

    /// Plain-text table in the usual precision/recall/f1/support layout
    pub fn render(&self) -> String {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max("macro f1".len());

        let mut out = String::new();
        let _ = writeln!(out, "{:>width$}  {:>9}  {:>9}  {:>9}  {:>7}", "", "precision", "recall", "f1-score", "support");
        for c in &self.classes {
            let _ = writeln!(
                out,
                "{:>width$}  {:>9.4}  {:>9.4}  {:>9.4}  {:>7}",
                c.label, c.precision, c.recall, c.f1_score, c.support
            );
        }
        let support: usize = self.classes.iter().map(|c| c.support).sum();
        let _ = writeln!(out);
        let _ = writeln!(out, "{:>width$}  {:>9}  {:>9}  {:>9.4}  {:>7}", "accuracy", "", "", self.accuracy, support);
        let _ = writeln!(out, "{:>width$}  {:>9}  {:>9}  {:>9.4}  {:>7}", "macro f1", "", "", self.macro_f1, support);
        out
    }
}
