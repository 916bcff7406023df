use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::fit::FitError;

/// Agreement between predicted and reference labels (1..=C), used by the user to
/// compare models or hyperparameters over a held-out sample. Counts are arranged with the
/// predicted class over rows and the reference class over columns, so the diagonal holds
/// the correct decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts : DMatrix<f64>
}

impl ConfusionMatrix {

    pub fn new(n_class : usize) -> Self {
        Self { counts : DMatrix::zeros(n_class, n_class) }
    }

    /// Builds the confusion matrix for the informed labels. The number of classes is the
    /// largest label found in either vector.
    pub fn compute(pred : &[usize], truth : &[usize]) -> Result<Self, FitError> {
        let n_class = pred.iter().chain(truth.iter()).copied().max().unwrap_or(0);
        let mut cm = Self::new(n_class);
        cm.accumulate(pred, truth)?;
        Ok(cm)
    }

    /// Adds the informed decisions to the current counts.
    pub fn accumulate(&mut self, pred : &[usize], truth : &[usize]) -> Result<(), FitError> {
        if pred.len() != truth.len() {
            return Err(FitError::DimensionMismatch { expected : truth.len(), found : pred.len() });
        }
        let n_class = self.n_class();
        for (p, t) in pred.iter().zip(truth.iter()) {
            if *p == 0 || *p > n_class {
                return Err(FitError::InvalidLabel(*p));
            }
            if *t == 0 || *t > n_class {
                return Err(FitError::InvalidLabel(*t));
            }
            self.counts[(p - 1, t - 1)] += 1.;
        }
        Ok(())
    }

    pub fn n_class(&self) -> usize {
        self.counts.nrows()
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Overall accuracy: fraction of decisions over the diagonal.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0. {
            return 0.;
        }
        self.counts.trace() / total
    }

    /// Cohen's Kappa: the observed agreement corrected by the agreement expected by chance
    /// from the marginal frequencies, (po - pe) / (1 - pe).
    pub fn kappa(&self) -> f64 {
        let total = self.total();
        if total == 0. {
            return 0.;
        }
        let po = self.accuracy();
        let pred_marg = self.counts.column_sum();
        let true_marg = self.counts.row_sum();
        let pe = pred_marg.iter()
            .zip(true_marg.iter())
            .map(|(p, t)| p * t )
            .sum::<f64>() / total.powi(2);
        if (1. - pe).abs() < f64::EPSILON {
            // A single class in both vectors.
            if (po - 1.).abs() < f64::EPSILON { 1. } else { 0. }
        } else {
            (po - pe) / (1. - pe)
        }
    }

}
