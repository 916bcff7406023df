use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::calc::{self, MAX};
use crate::model::Model;
use super::*;
use super::cluster::{self, KMeans, KMeansSettings};

/// The expectation maximization algorithm alternates between computing the class
/// responsibilities of each observation under the current parameters (E-step) and
/// re-estimating the parameters from those responsibilities (M-step). The algorithm stops
/// when the relative change of the full-sample log-likelihood is smaller than the tolerance,
/// or when the iteration limit is reached.
///
/// With a fixed subspace size the log-likelihood does not decrease between iterations, up
/// to the small loss of normalizing the soft covariances by ni - 1. Under a scree threshold
/// the dimensions are reselected at every M-step, and a change of pi can lower it.
///
/// A run is degenerate when some cluster loses its population: either the initialization
/// did not produce a cluster with at least two observations, or the responsibility mass of
/// a cluster fell below Config::population at an E-step. Degenerate runs are not errors: they
/// are reported at the resulting Clustering, with the worst possible model selection scores.
///
/// # References
/// Dempster, A. P., Laird, N. M., & Rubin, D. B.
/// ([1977](https://rss.onlinelibrary.wiley.com/doi/abs/10.1111/j.2517-6161.1977.tb01600.x)).
/// Maximum Likelihood from Incomplete Data
/// Via the EM Algorithm. Journal of the Royal Statistical Society: Series B (Methodological),
/// 39(1), 1–22. doi: 10.1111/j.2517-6161.1977.tb01600.x
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmState {

    /// Initial allocation of the observations into clusters.
    Init,

    /// Parameter estimation from the current membership.
    MStep,

    /// Responsibility update from the current parameters.
    EStep,

    Converged,

    Degenerate,

    /// Parameters estimated from known labels, without iterations.
    Supervised
}

/// Result of a call to fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clustering {

    pub state : EmState,

    /// Cluster (1..=C) of maximum responsibility of each observation. Absent for degenerate
    /// and supervised fits.
    pub labels : Option<Vec<usize>>,

    /// Log-likelihood after each M-step.
    pub log_likelihood : Vec<f64>,

    pub bic : f64,

    pub icl : f64,

    pub n_iter : usize,

    pub responsibilities : Option<DMatrix<f64>>,

    pub params : Option<Params>
}

impl Clustering {

    pub(crate) fn degenerate(log_likelihood : Vec<f64>, n_iter : usize) -> Self {
        Self {
            state : EmState::Degenerate,
            labels : None,
            log_likelihood,
            bic : MAX,
            icl : MAX,
            n_iter,
            responsibilities : None,
            params : None
        }
    }

    pub(crate) fn supervised(x : &DMatrix<f64>, params : Params) -> Result<Self, FitError> {
        let (ll, _) = params.log_likelihood(x)?;
        let bic = bic(ll, params.q, x.nrows());
        Ok(Self {
            state : EmState::Supervised,
            labels : None,
            log_likelihood : vec![ll],
            bic,
            icl : bic,
            n_iter : 0,
            responsibilities : None,
            params : Some(params)
        })
    }

    pub fn is_degenerate(&self) -> bool {
        self.state == EmState::Degenerate
    }

    /// Last log-likelihood reached (NaN if none was computed).
    pub fn final_log_likelihood(&self) -> f64 {
        self.log_likelihood.last().copied().unwrap_or(f64::NAN)
    }

}

/// Bayesian information criterion: -2 LL + q ln(n).
pub fn bic(ll : f64, q : usize, n : usize) -> f64 {
    -2. * ll + q as f64 * (n as f64).ln()
}

/// Integrated completed likelihood: the BIC plus twice the sum of T ln(T + EPS) over
/// all responsibilities.
pub fn icl(bic : f64, t : &DMatrix<f64>) -> f64 {
    bic + 2. * calc::neg_entropy(t.iter().cloned())
}

fn initial_labels(x : &DMatrix<f64>, config : &Config) -> Option<Vec<usize>> {
    match config.init {
        Init::Random => Some(cluster::random_labels(x.nrows(), config.n_class, config.random_state)),
        Init::KMeans => {
            let rows : Vec<Vec<f64>> = x.row_iter().map(|r| r.iter().cloned().collect() ).collect();
            let settings = KMeansSettings {
                n_cluster : config.n_class,
                n_init : config.n_init,
                seed : config.random_state,
                ..KMeansSettings::default()
            };
            match KMeans::estimate(rows.iter().map(|r| &r[..] ), settings) {
                Ok(km) => Some(km.labels()),
                Err(e) => {
                    log::warn!("K-means initialization failed: {}", e);
                    None
                }
            }
        }
    }
}

/// Verifies every cluster 1..=n_class has at least two members.
fn populated(labels : &[usize], n_class : usize) -> bool {
    (1..=n_class).all(|c| labels.iter().filter(|l| **l == c ).count() >= 2 )
}

/// Update responsibility matrix from the costs of the last parameters.
fn expectation_step(k : &DMatrix<f64>) -> DMatrix<f64> {
    responsibilities(k)
}

/// Estimates the parameters from the current membership. An emptied class ends the
/// iterations instead of failing the fit.
fn maximization_step(
    x : &DMatrix<f64>,
    membership : Membership,
    model : Model,
    subspace : SubspaceSize
) -> Result<Option<Params>, FitError> {
    match Empirical::estimate(x, membership) {
        Ok(emp) => Ok(Some(Params::build(&emp, model, subspace))),
        Err(FitError::UndersizedClass { class, count }) => {
            log::debug!("Class {} emptied during M-step (size {})", class, count);
            Ok(None)
        },
        Err(e) => Err(e)
    }
}

/// Unsupervised HDDA: fits a mixture of config.n_class clusters to the rows of x.
pub fn expectation_maximization(
    x : &DMatrix<f64>,
    model : Model,
    config : &Config
) -> Result<Clustering, FitError> {
    config.validate()?;
    let (n, d) = x.shape();
    if n == 0 || d < 2 {
        return Err(FitError::EmptyInput);
    }
    let subspace = config.subspace();

    let mut state = EmState::Init;
    let mut labels : Vec<usize> = Vec::new();
    let mut resp : Option<DMatrix<f64>> = None;
    let mut fitted : Option<(Params, DMatrix<f64>)> = None;
    let mut history : Vec<f64> = Vec::new();
    let mut n_iter = 0;

    loop {
        state = match state {
            EmState::Init => match initial_labels(x, config) {
                Some(y) if populated(&y[..], config.n_class) => {
                    labels = y;
                    EmState::MStep
                },
                _ => EmState::Degenerate
            },
            EmState::MStep => {
                let membership = match &resp {
                    Some(t) => Membership::Soft(t),
                    None => Membership::Hard(&labels[..])
                };
                match maximization_step(x, membership, model, subspace)? {
                    Some(params) => {
                        let (ll, k) = params.log_likelihood(x)?;
                        let converged = match history.last() {
                            Some(prev) => ((ll - prev) / prev).abs() < config.tol,
                            None => false
                        };
                        log::debug!("EM iteration {}: log-likelihood {}", n_iter, ll);
                        history.push(ll);
                        fitted = Some((params, k));
                        if converged || n_iter >= config.itermax {
                            EmState::Converged
                        } else {
                            EmState::EStep
                        }
                    },
                    None => EmState::Degenerate
                }
            },
            EmState::EStep => match &fitted {
                Some((_, k)) => {
                    n_iter += 1;
                    let t = expectation_step(k);
                    let mass = t.row_sum();
                    if mass.iter().any(|m| *m < config.population ) {
                        log::debug!("Cluster masses {:?} below population {}", mass.as_slice(), config.population);
                        EmState::Degenerate
                    } else {
                        resp = Some(t);
                        EmState::MStep
                    }
                },
                None => EmState::Degenerate
            },
            EmState::Converged | EmState::Degenerate | EmState::Supervised => break
        };
    }

    match (state, fitted) {
        (EmState::Converged, Some((params, k))) => {
            let t = expectation_step(&k);
            let ll = history.last().copied().unwrap_or(f64::NAN);
            let bic = bic(ll, params.q, n);
            let icl = icl(bic, &t);
            let labels = calc::argmax_rows(&t).into_iter().map(|c| c + 1 ).collect();
            log::info!("{} converged after {} iterations: BIC {}, ICL {}", model, n_iter, bic, icl);
            Ok(Clustering {
                state,
                labels : Some(labels),
                log_likelihood : history,
                bic,
                icl,
                n_iter,
                responsibilities : Some(t),
                params : Some(params)
            })
        },
        _ => {
            log::warn!("{} with {} clusters is degenerate after {} iterations", model, config.n_class, n_iter);
            Ok(Clustering::degenerate(history, n_iter))
        }
    }
}
