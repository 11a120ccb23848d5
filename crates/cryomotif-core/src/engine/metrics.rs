use crate::core::taxonomy::motif::MotifLabel;
use serde::Serialize;

const EPSILON: f64 = 1e-8;

/// Per-class summary derived from a [`ConfusionMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: MotifLabel,
    pub support: usize,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// Counts of (true, predicted) pairs; rows are true classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Records one outcome. Labels outside the matrix are ignored and reported as `false`.
    pub fn record(&mut self, truth: MotifLabel, predicted: MotifLabel) -> bool {
        let n = self.num_classes();
        let (t, p) = (truth.index(), predicted.index());
        if t >= n || p >= n {
            return false;
        }
        self.counts[t][p] += 1;
        true
    }

    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn true_positives(&self, class: usize) -> usize {
        self.counts[class][class]
    }

    fn false_negatives(&self, class: usize) -> usize {
        self.counts[class].iter().sum::<usize>() - self.true_positives(class)
    }

    fn false_positives(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum::<usize>() - self.true_positives(class)
    }

    /// `TP / (TP + FN + 1e-8)`
    pub fn sensitivity(&self, class: usize) -> f64 {
        let tp = self.true_positives(class) as f64;
        tp / (tp + self.false_negatives(class) as f64 + EPSILON)
    }

    /// `TN / (TN + FP + 1e-8)`
    pub fn specificity(&self, class: usize) -> f64 {
        let tp = self.true_positives(class);
        let fp = self.false_positives(class);
        let fn_ = self.false_negatives(class);
        let tn = (self.total() - tp - fp - fn_) as f64;
        tn / (tn + fp as f64 + EPSILON)
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.num_classes()).map(|c| self.true_positives(c)).sum();
        correct as f64 / total as f64
    }

    pub fn macro_sensitivity(&self) -> f64 {
        self.macro_average(|c| self.sensitivity(c))
    }

    pub fn macro_specificity(&self) -> f64 {
        self.macro_average(|c| self.specificity(c))
    }

    fn macro_average(&self, metric: impl Fn(usize) -> f64) -> f64 {
        let n = self.num_classes();
        if n == 0 {
            return 0.0;
        }
        (0..n).map(metric).sum::<f64>() / n as f64
    }

    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        MotifLabel::ALL
            .iter()
            .take(self.num_classes())
            .map(|&label| {
                let c = label.index();
                ClassMetrics {
                    label,
                    support: self.counts[c].iter().sum(),
                    sensitivity: self.sensitivity(c),
                    specificity: self.specificity(c),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_two_class_predictions_score_one() {
        let mut cm = ConfusionMatrix::new(2);
        for _ in 0..4 {
            cm.record(MotifLabel::SymmetricLoop, MotifLabel::SymmetricLoop);
        }
        for _ in 0..6 {
            cm.record(MotifLabel::Bulge, MotifLabel::Bulge);
        }
        for c in 0..2 {
            assert!((cm.sensitivity(c) - 1.0).abs() < 1e-6);
            assert!((cm.specificity(c) - 1.0).abs() < 1e-6);
        }
        assert_eq!(cm.accuracy(), 1.0);
    }

    #[test]
    fn mixed_predictions_give_expected_rates() {
        let mut cm = ConfusionMatrix::new(MotifLabel::COUNT);
        cm.record(MotifLabel::Hairpin, MotifLabel::Hairpin);
        cm.record(MotifLabel::Hairpin, MotifLabel::Hairpin);
        cm.record(MotifLabel::Hairpin, MotifLabel::Bulge);
        cm.record(MotifLabel::Bulge, MotifLabel::Bulge);

        let hairpin = MotifLabel::Hairpin.index();
        let bulge = MotifLabel::Bulge.index();
        assert_eq!(cm.count(hairpin, bulge), 1);
        assert!((cm.sensitivity(hairpin) - 2.0 / 3.0).abs() < 1e-6);
        assert!((cm.specificity(hairpin) - 1.0).abs() < 1e-6);
        assert!((cm.sensitivity(bulge) - 1.0).abs() < 1e-6);
        // Bulge: TN = 2, FP = 1.
        assert!((cm.specificity(bulge) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(cm.accuracy(), 0.75);

        let metrics = cm.class_metrics();
        assert_eq!(metrics.len(), 5);
        assert_eq!(metrics[hairpin].support, 3);
        // Classes with no samples contribute zero sensitivity to the macro average.
        assert!(cm.macro_sensitivity() < 0.5);
    }

    #[test]
    fn empty_matrix_is_all_zero() {
        let cm = ConfusionMatrix::new(5);
        assert_eq!(cm.total(), 0);
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.sensitivity(0), 0.0);
    }

    #[test]
    fn labels_outside_matrix_are_ignored() {
        let mut cm = ConfusionMatrix::new(2);
        assert!(!cm.record(MotifLabel::Unknown, MotifLabel::Bulge));
        assert_eq!(cm.total(), 0);
    }
}
