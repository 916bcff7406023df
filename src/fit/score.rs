use nalgebra::*;
use std::f64::consts::PI;
use crate::calc;
use super::{Params, FitError};

/// What Params::predict returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {

    /// Class labels (1..=C) only.
    Labels,

    /// Class labels and the m x C matrix of posterior class probabilities (the priors
    /// included, as in the E-step).
    Posterior,

    /// The raw m x C matrix of discriminant costs.
    Costs
}

#[derive(Debug, Clone)]
pub enum Prediction {
    Labels(Vec<usize>),
    Posterior(Vec<usize>, DMatrix<f64>),
    Costs(DMatrix<f64>)
}

impl Prediction {

    /// Predicted labels, when the prediction carries them.
    pub fn labels(&self) -> Option<&[usize]> {
        match self {
            Prediction::Labels(y) | Prediction::Posterior(y, _) => Some(&y[..]),
            Prediction::Costs(_) => None
        }
    }

}

/// Converts discriminant costs into class responsibilities: the row-wise softmax of -K/2,
/// which equals 1 / sum_c' exp((K_c - K_c')/2) without its overflow.
pub fn responsibilities(k : &DMatrix<f64>) -> DMatrix<f64> {
    calc::softmax_rows(&k.scale(-0.5))
}

/// Labels (1..=C) of the classes with minimal cost at each row.
pub fn decide(k : &DMatrix<f64>) -> Vec<usize> {
    calc::argmin_rows(k).into_iter().map(|c| c + 1 ).collect()
}

impl Params {

    /// Discriminant cost of each row of xt under each class, i.e. minus twice the log of the
    /// class-weighted density: the Mahalanobis distance inside the signal subspace, the
    /// squared residual outside of it scaled by the noise, the log-determinant, the log-prior
    /// and the normalizing constant.
    pub fn costs(&self, xt : &DMatrix<f64>) -> Result<DMatrix<f64>, FitError> {
        if xt.ncols() != self.d {
            return Err(FitError::DimensionMismatch { expected : self.d, found : xt.ncols() });
        }
        let m = xt.nrows();
        let d = self.d as f64;
        let mut k = DMatrix::zeros(m, self.n_class());
        for (c, cl) in self.classes.iter().enumerate() {
            let cst = cl.logdet - 2. * cl.prop.ln() + d * (2. * PI).ln();
            let xc = calc::center(xt, &cl.mean);
            let proj = &xc * &cl.basis;
            let resid = &xc - &proj * cl.basis.transpose();
            for i in 0..m {
                let signal : f64 = proj.row(i).iter()
                    .zip(cl.a.iter())
                    .map(|(p, a)| p.powi(2) / a )
                    .sum();
                k[(i, c)] = signal + resid.row(i).norm_squared() / cl.b + cst;
            }
        }
        Ok(k)
    }

    /// Assigns each row of xt to the class of minimum cost (maximum posterior).
    pub fn predict(&self, xt : &DMatrix<f64>, out : Output) -> Result<Prediction, FitError> {
        match out {
            Output::Costs => Ok(Prediction::Costs(self.costs(xt)?)),
            Output::Labels => Ok(Prediction::Labels(decide(&self.costs(xt)?))),
            Output::Posterior => {
                let k = self.costs(xt)?;
                Ok(Prediction::Posterior(decide(&k), responsibilities(&k)))
            }
        }
    }

    /// Log-likelihood of the mixture over the rows of x, returned with the cost matrix it
    /// was computed from.
    pub fn log_likelihood(&self, x : &DMatrix<f64>) -> Result<(f64, DMatrix<f64>), FitError> {
        let k = self.costs(x)?;
        let ll = calc::log_sum_exp_rows(&k.scale(-0.5)).sum();
        Ok((ll, k))
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::fit::ClassParams;
    use crate::model::Model;

    fn class(mean : &[f64], a : f64, b : f64, prop : f64) -> ClassParams {
        ClassParams {
            pi : 1,
            a : DVector::from_element(1, a),
            b,
            logdet : a.ln() + b.ln(),
            basis : DMatrix::from_column_slice(2, 1, &[1.0, 0.0]),
            mean : DVector::from_column_slice(mean),
            prop
        }
    }

    fn params(classes : Vec<ClassParams>) -> Params {
        Params { model : Model::M1, d : 2, classes, q : 0 }
    }

    #[test]
    fn cost_by_hand() {
        let p = params(vec![class(&[0.0, 0.0], 4.0, 1.0, 1.0)]);
        let x = DMatrix::from_row_slice(1, 2, &[2.0, 3.0]);
        let k = p.costs(&x).unwrap();
        let expected = 4.0 / 4.0 + 9.0 / 1.0 + 4f64.ln() + 2. * (2. * PI).ln();
        assert!((k[(0, 0)] - expected).abs() < 1e-12);

        // A single-class mixture log-likelihood is its log-density.
        let (ll, _) = p.log_likelihood(&x).unwrap();
        assert!((ll + 0.5 * expected).abs() < 1e-12);
    }

    #[test]
    fn decisions_and_posteriors() {
        let p = params(vec![
            class(&[0.0, 0.0], 1.0, 1.0, 0.5),
            class(&[10.0, 10.0], 1.0, 1.0, 0.5)
        ]);
        let x = DMatrix::from_row_slice(3, 2, &[0.1, -0.2, 9.5, 10.3, 10.0, 9.8]);
        let labels = p.predict(&x, Output::Labels).unwrap();
        assert_eq!(labels.labels().unwrap(), &[1, 2, 2]);
        match p.predict(&x, Output::Posterior).unwrap() {
            Prediction::Posterior(y, post) => {
                assert_eq!(y, vec![1, 2, 2]);
                for row in post.row_iter() {
                    assert!((row.sum() - 1.0).abs() < 1e-12);
                }
                assert!(post[(0, 0)] > 0.99);
                let k = p.costs(&x).unwrap();
                assert!((post - responsibilities(&k)).abs().max() < 1e-12);
            },
            _ => panic!("Expected posterior")
        }
        match p.predict(&x, Output::Costs).unwrap() {
            Prediction::Costs(k) => assert_eq!(k.shape(), (3, 2)),
            _ => panic!("Expected costs")
        }
    }

    #[test]
    fn posterior_weighs_priors() {
        // Midway between two identical classes, only the proportions decide.
        let p = params(vec![
            class(&[0.0, 0.0], 1.0, 1.0, 0.8),
            class(&[2.0, 0.0], 1.0, 1.0, 0.2)
        ]);
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        match p.predict(&x, Output::Posterior).unwrap() {
            Prediction::Posterior(y, post) => {
                assert_eq!(y, vec![1]);
                assert!((post[(0, 0)] - 0.8).abs() < 1e-12);
                assert!((post[(0, 1)] - 0.2).abs() < 1e-12);
            },
            _ => panic!("Expected posterior")
        }
    }

    #[test]
    fn log_likelihood_survives_far_points() {
        let p = params(vec![
            class(&[0.0, 0.0], 1e-3, 1e-3, 0.5),
            class(&[1.0, 1.0], 1e-3, 1e-3, 0.5)
        ]);
        let x = DMatrix::from_row_slice(1, 2, &[1e3, 1e3]);
        let (ll, _) = p.log_likelihood(&x).unwrap();
        assert!(ll.is_finite());
    }

    #[test]
    fn wrong_dimension() {
        let p = params(vec![class(&[0.0, 0.0], 1.0, 1.0, 1.0)]);
        let x = DMatrix::zeros(2, 3);
        assert!(matches!(p.costs(&x), Err(FitError::DimensionMismatch { expected : 2, found : 3 })));
    }
}
