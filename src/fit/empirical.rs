use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::calc::{self, Eigen, indicator};
use super::FitError;

/// Class membership of the sample rows: either hard labels in 1..=C (the supervised
/// case and the EM initialization), or a n x C matrix of weights in [0,1] (the
/// responsibilities of an E-step).
#[derive(Debug, Clone, Copy)]
pub enum Membership<'a> {
    Hard(&'a [usize]),
    Soft(&'a DMatrix<f64>)
}

impl<'a> Membership<'a> {

    pub fn nrows(&self) -> usize {
        match self {
            Membership::Hard(y) => y.len(),
            Membership::Soft(t) => t.nrows()
        }
    }

    pub fn n_class(&self) -> usize {
        match self {
            Membership::Hard(y) => y.iter().copied().max().unwrap_or(0),
            Membership::Soft(t) => t.ncols()
        }
    }

    fn weights(&self, c : usize) -> DVector<f64> {
        match self {
            Membership::Hard(y) => DVector::from_iterator(y.len(), y.iter().map(|yi| indicator(*yi, c + 1) )),
            Membership::Soft(t) => t.column(c).clone_owned()
        }
    }

}

/// Empirical statistics of a single class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStats {

    /// Effective number of observations (fractional under soft membership).
    pub ni : f64,

    pub prop : f64,

    pub mean : DVector<f64>,

    pub cov : DMatrix<f64>,

    /// Eigenvalues of cov in descending order, floored at EPS. There are min(d, floor(ni)) of them.
    pub eigenvalues : DVector<f64>,

    /// Eigenvectors matching eigenvalues over columns (d x eigenvalues.len()).
    pub eigenvectors : DMatrix<f64>,

    pub trace : f64
}

/// Empirical estimate of a mixture: one ClassStats per class plus the covariance W of the
/// whole sample, which is used by the models with a common subspace dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empirical {

    pub n : usize,

    pub d : usize,

    pub classes : Vec<ClassStats>,

    pub w : DMatrix<f64>
}

/// Number of eigenpairs that carry information for a class of effective size ni.
fn rank(ni : f64, d : usize) -> usize {
    if ni >= d as f64 {
        d
    } else {
        (ni.floor() as usize).min(d)
    }
}

fn class_stats(x : &DMatrix<f64>, y : &Membership, c : usize) -> Result<ClassStats, FitError> {
    let (n, d) = x.shape();
    let (ni, mean, cov) = match y {
        Membership::Hard(labels) => {
            let rows : Vec<usize> = labels.iter()
                .enumerate()
                .filter(|(_, yi)| **yi == c + 1 )
                .map(|(ix, _)| ix )
                .collect();
            let ni = rows.len() as f64;
            if rows.len() < 2 {
                return Err(FitError::UndersizedClass { class : c + 1, count : ni });
            }
            let xc = DMatrix::from_fn(rows.len(), d, |i, j| x[(rows[i], j)] );
            (ni, xc.row_mean().transpose(), calc::cov(&xc))
        },
        Membership::Soft(_) => {
            let w = y.weights(c);
            let ni = w.sum();
            if !(ni >= 2.) {
                return Err(FitError::UndersizedClass { class : c + 1, count : ni });
            }
            let mean = calc::weighted_mean(x, &w);
            let cov = calc::soft_cov(x, &mean, &w, ni);
            (ni, mean, cov)
        }
    };
    let eig = Eigen::descending(cov.clone(), rank(ni, d));
    let trace = cov.trace();
    Ok(ClassStats {
        ni,
        prop : ni / n as f64,
        mean,
        cov,
        eigenvalues : eig.values,
        eigenvectors : eig.vectors,
        trace
    })
}

impl Empirical {

    /// Computes the per-class sample counts, proportions, means, covariances and
    /// eigendecompositions of x (observations over rows) under the informed membership.
    pub fn estimate(x : &DMatrix<f64>, y : Membership) -> Result<Self, FitError> {
        let (n, d) = x.shape();
        if n == 0 || d < 2 {
            return Err(FitError::EmptyInput);
        }
        if y.nrows() != n {
            return Err(FitError::DimensionMismatch { expected : n, found : y.nrows() });
        }
        if let Membership::Hard(labels) = y {
            if labels.iter().any(|yi| *yi == 0 ) {
                return Err(FitError::InvalidLabel(0));
            }
        }
        let n_class = y.n_class();
        if n_class == 0 {
            return Err(FitError::EmptyInput);
        }
        let classes = (0..n_class)
            .map(|c| class_stats(x, &y, c) )
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "Empirical estimate over {} observations, {} variables: class sizes {:?}",
            n,
            d,
            classes.iter().map(|cl| cl.ni ).collect::<Vec<_>>()
        );
        Ok(Self { n, d, classes, w : calc::cov(x) })
    }

    pub fn n_class(&self) -> usize {
        self.classes.len()
    }

    /// Effective size of the smallest class.
    pub fn min_count(&self) -> f64 {
        self.classes.iter().map(|cl| cl.ni ).fold(f64::INFINITY, f64::min)
    }

    /// Eigenvalues of the whole-sample covariance, in descending order. When the smallest
    /// class is rank deficient, only as many eigenvalues as it can support are returned.
    pub fn global_eigenvalues(&self) -> DVector<f64> {
        Eigen::descending(self.w.clone(), rank(self.min_count(), self.d)).values
    }

}
