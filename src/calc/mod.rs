use nalgebra::*;
use num_traits::Float;
use std::cmp::Ordering;

/// Smallest increment representable around 1.0. Every eigenvalue and noise variance
/// is floored at this value, so that log-determinants and inverse scales stay finite.
pub const EPS : f64 = f64::EPSILON;

/// Largest representable value, used as the "worst possible" model selection score.
pub const MAX : f64 = f64::MAX;

/* If two values are equal, return 1.0; else return 0.0. Useful to map
hard class labels in the integers [1..C] to a real membership weight.
This is the indicator function, a.k.a. Iverson Bracket. */
pub fn indicator<T : Eq>(a : T, b : T) -> f64 {
    if a == b { 1.0 } else { 0.0 }
}

/// Subtracts the vector m from each row of x.
pub fn center(x : &DMatrix<f64>, m : &DVector<f64>) -> DMatrix<f64> {
    assert!(x.ncols() == m.nrows());
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - m[j] )
}

/// Column means of x, with each row weighted by the corresponding entry of w.
pub fn weighted_mean(x : &DMatrix<f64>, w : &DVector<f64>) -> DVector<f64> {
    assert!(x.nrows() == w.nrows());
    let total = w.sum();
    let mut m = x.tr_mul(w);
    m.unscale_mut(total);
    m
}

/// Unbiased sample covariance of the rows of x (variables over columns).
pub fn cov(x : &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let m = x.row_mean().transpose();
    let xc = center(x, &m);
    let mut c = xc.tr_mul(&xc);
    c.unscale_mut((n as f64 - 1.).max(1.));
    c
}

/// Soft (weighted) covariance, used at the M-step of the EM iterations: rows are centered
/// at the weighted mean m, each centered row is scaled by its membership weight and
/// the cross-product is normalized by the effective count minus one.
pub fn soft_cov(x : &DMatrix<f64>, m : &DVector<f64>, w : &DVector<f64>, ni : f64) -> DMatrix<f64> {
    assert!(x.nrows() == w.nrows());
    let xc = center(x, m);
    let wxc = DMatrix::from_fn(xc.nrows(), xc.ncols(), |i, j| xc[(i, j)] * w[i] );
    let mut c = xc.tr_mul(&wxc);
    c.unscale_mut(ni - 1.);
    c
}

/// Eigenvalues in descending order, with the eigenvectors at the matching columns.
#[derive(Debug, Clone)]
pub struct Eigen {

    pub values : DVector<f64>,

    pub vectors : DMatrix<f64>
}

impl Eigen {

    /// Decomposes the symmetric matrix s, keeping only the k largest eigenpairs.
    /// For rank-deficient matrices, the trailing pairs are numerically zero and carry no
    /// information about the matrix, so they are discarded instead of floored. Retained
    /// eigenvalues are floored at EPS.
    pub fn descending(s : DMatrix<f64>, k : usize) -> Self {
        assert!(s.is_square());
        let d = s.nrows();
        let k = k.min(d);
        let sym = (&s + s.transpose()).scale(0.5);
        let eig = SymmetricEigen::new(sym);
        let mut ixs : Vec<usize> = (0..d).collect();
        ixs.sort_by(|a, b| {
            eig.eigenvalues[*b].partial_cmp(&eig.eigenvalues[*a]).unwrap_or(Ordering::Equal)
        });
        ixs.truncate(k);
        let values = DVector::from_iterator(k, ixs.iter().map(|ix| eig.eigenvalues[*ix].max(EPS) ));
        let vectors = DMatrix::from_fn(d, k, |i, j| eig.eigenvectors[(i, ixs[j])] );
        Self { values, vectors }
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

}

/// Scree test over eigenvalues sorted in descending order: the absolute consecutive
/// differences are normalized by their maximum, and the returned size is the smallest
/// index p such that every difference from p onwards is at or below th (the elbow after
/// which the spectrum flattens into noise). The caller clamps the result into a valid
/// subspace size; zero is returned when no difference exceeds th.
pub fn scree(values : &[f64], th : f64) -> usize {
    if values.len() < 2 {
        return 0;
    }
    let diffs : Vec<f64> = values.windows(2).map(|w| (w[0] - w[1]).abs() ).collect();
    let max = diffs.iter().cloned().fold(0.0, f64::max);
    if !(max > 0.0) || !max.is_finite() {
        return 0;
    }
    diffs.iter()
        .rposition(|dl| dl / max > th )
        .map(|last| last + 1 )
        .unwrap_or(0)
}

/// Row-wise log(sum(exp(g))), shifting each row by its maximum before exponentiating
/// so that large-magnitude entries do not overflow.
pub fn log_sum_exp_rows(g : &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(g.nrows(), g.row_iter().map(|row| {
        let gm = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !gm.is_finite() {
            gm
        } else {
            row.iter().map(|gi| (gi - gm).exp() ).sum::<f64>().ln() + gm
        }
    }))
}

/// Row-wise softmax of g, computed through the max-shifted log-sum-exp.
pub fn softmax_rows(g : &DMatrix<f64>) -> DMatrix<f64> {
    let lse = log_sum_exp_rows(g);
    DMatrix::from_fn(g.nrows(), g.ncols(), |i, j| (g[(i, j)] - lse[i]).exp() )
}

fn position_by(vals : impl Iterator<Item=f64>, better : impl Fn(f64, f64) -> bool) -> usize {
    let mut best : Option<(usize, f64)> = None;
    for (ix, v) in vals.enumerate() {
        match best {
            Some((_, b)) if !better(v, b) => { },
            _ => best = Some((ix, v))
        }
    }
    best.map(|b| b.0 ).unwrap_or(0)
}

/// Index of the largest entry of each row (first one on ties).
pub fn argmax_rows(m : &DMatrix<f64>) -> Vec<usize> {
    m.row_iter().map(|row| position_by(row.iter().cloned(), |a, b| a > b ) ).collect()
}

/// Index of the smallest entry of each row (first one on ties).
pub fn argmin_rows(m : &DMatrix<f64>) -> Vec<usize> {
    m.row_iter().map(|row| position_by(row.iter().cloned(), |a, b| a < b ) ).collect()
}

// Sum of p*ln(p + eps) over a set of probabilities, i.e. the entropy with its sign
// flipped. The eps shift keeps zero probabilities from producing NaN.
pub fn neg_entropy<F>(probs : impl Iterator<Item=F>) -> F
where
    F : Float
{
    probs.fold(F::zero(), |total, p| total + p * (p + F::epsilon()).ln() )
}
