use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::calc::{self, EPS};
use crate::model::{Model, Ties, SignalTie};
use super::{Empirical, SubspaceSize};

/// Parsimonious parameters of a single class. The class covariance is reconstructed as
/// Q diag(a) Q^T + b (I - Q Q^T), where Q holds the pi leading eigenvectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassParams {

    /// Signal subspace dimension, in [1, d-1].
    pub pi : usize,

    /// Signal variances (length pi), at least EPS.
    pub a : DVector<f64>,

    /// Noise variance, at least EPS.
    pub b : f64,

    /// Log-determinant of the reconstructed covariance.
    pub logdet : f64,

    /// Orthonormal basis of the signal subspace (d x pi).
    pub basis : DMatrix<f64>,

    pub mean : DVector<f64>,

    pub prop : f64
}

/// Fitted HDDA model: the parsimonious parameters of every class, plus the number of free
/// parameters q used by the information criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {

    pub model : Model,

    pub d : usize,

    pub classes : Vec<ClassParams>,

    pub q : usize
}

/// Number of free parameters of a model with the informed subspace dimensions: means,
/// proportions, subspace orientations, subspace dimensions, then the signal and noise
/// variances, each counted once per class or once overall depending on the ties.
pub fn n_parameters(ties : &Ties, d : usize, pis : &[usize]) -> usize {
    let c = pis.len();
    let orientation : usize = pis.iter().map(|p| p * (2 * d - p - 1) / 2 ).sum();
    let dims = if ties.common_dim { 1 } else { c };
    let signal = match ties.signal {
        SignalTie::Free => pis.iter().sum(),
        SignalTie::Class => c,
        SignalTie::Common => 1
    };
    let noise = if ties.common_noise { 1 } else { c };
    c * d + (c - 1) + orientation + dims + signal + noise
}

/// Subspace dimension of each class, within the eigenpairs the class retains and [1, d-1].
/// The common-dimension models cap their single dimension by the smallest class rank, so
/// every class keeps the same pi.
fn dimensions(emp : &Empirical, ties : &Ties, subspace : SubspaceSize) -> Vec<usize> {
    let d = emp.d;
    let clamp = |p : usize, rank : usize| p.min(rank).max(1).min(d - 1);
    if ties.common_dim {
        let p = match subspace {
            SubspaceSize::Fixed(p) => p,
            SubspaceSize::Threshold(th) => calc::scree(emp.global_eigenvalues().as_slice(), th)
        };
        let rank = emp.classes.iter().map(|cl| cl.eigenvalues.len() ).min().unwrap_or(d);
        vec![clamp(p, rank); emp.n_class()]
    } else {
        emp.classes.iter()
            .map(|cl| {
                let p = match subspace {
                    SubspaceSize::Fixed(p) => p,
                    SubspaceSize::Threshold(th) => calc::scree(cl.eigenvalues.as_slice(), th)
                };
                clamp(p, cl.eigenvalues.len())
            })
            .collect()
    }
}

fn noise(emp : &Empirical, common : bool, pis : &[usize], residuals : &[f64]) -> Vec<f64> {
    let d = emp.d as f64;
    if common {
        let num : f64 = emp.classes.iter()
            .zip(residuals.iter())
            .map(|(cl, r)| cl.prop * r )
            .sum();
        let den = d - emp.classes.iter()
            .zip(pis.iter())
            .map(|(cl, p)| cl.prop * (*p as f64) )
            .sum::<f64>();
        let b = if num < EPS {
            EPS
        } else if den < EPS {
            log::warn!("Common noise variance denominator vanished ({}); using 1/EPS", den);
            1. / EPS
        } else {
            num / den
        };
        vec![b; emp.n_class()]
    } else {
        residuals.iter()
            .zip(pis.iter())
            .map(|(r, p)| (r / (d - *p as f64)).max(EPS) )
            .collect()
    }
}

impl Params {

    /// Builds the parsimonious model from the empirical estimate. This is cheap relative to
    /// the estimate itself (no decomposition happens here, except for the whole-sample
    /// covariance of the common-dimension models), so it can be re-run for each candidate
    /// hyperparameter over the same empirical estimate.
    pub fn build(emp : &Empirical, model : Model, subspace : SubspaceSize) -> Self {
        let ties = model.ties();
        let d = emp.d;
        let pis = dimensions(emp, &ties, subspace);

        // Leading eigenvalues and the variance left outside the signal subspace.
        let top : Vec<DVector<f64>> = emp.classes.iter()
            .zip(pis.iter())
            .map(|(cl, p)| cl.eigenvalues.rows(0, *p).clone_owned() )
            .collect();
        let residuals : Vec<f64> = emp.classes.iter()
            .zip(top.iter())
            .map(|(cl, t)| cl.trace - t.sum() )
            .collect();

        let a : Vec<DVector<f64>> = match ties.signal {
            SignalTie::Free => top.clone(),
            SignalTie::Class => top.iter()
                .map(|t| DVector::from_element(t.nrows(), t.mean()) )
                .collect(),
            SignalTie::Common => {
                let num : f64 = emp.classes.iter().zip(top.iter()).map(|(cl, t)| cl.prop * t.sum() ).sum();
                let den : f64 = emp.classes.iter().zip(pis.iter()).map(|(cl, p)| cl.prop * (*p as f64) ).sum();
                let common = (num / den).max(EPS);
                pis.iter().map(|p| DVector::from_element(*p, common) ).collect()
            }
        };

        let b = noise(emp, ties.common_noise, &pis[..], &residuals[..]);

        let classes : Vec<ClassParams> = emp.classes.iter()
            .zip(pis.iter())
            .zip(a.into_iter().zip(b.into_iter()))
            .map(|((cl, pi), (a, b))| {
                let logdet = a.iter().map(|ai| ai.ln() ).sum::<f64>() + (d - pi) as f64 * b.ln();
                ClassParams {
                    pi : *pi,
                    a,
                    b,
                    logdet,
                    basis : cl.eigenvectors.columns(0, *pi).clone_owned(),
                    mean : cl.mean.clone(),
                    prop : cl.prop
                }
            })
            .collect();

        let q = n_parameters(&ties, d, &pis[..]);
        log::debug!("{} built with subspace dimensions {:?} ({} parameters)", model, pis, q);
        Self { model, d, classes, q }
    }

    pub fn n_class(&self) -> usize {
        self.classes.len()
    }

    /// Subspace dimension of each class.
    pub fn dims(&self) -> Vec<usize> {
        self.classes.iter().map(|cl| cl.pi ).collect()
    }

}
