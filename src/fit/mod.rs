use serde::{Serialize, Deserialize};
use std::borrow::Borrow;
use thiserror::Error;

/// Per-class empirical statistics (counts, proportions, means, covariances and their
/// eigendecompositions) from hard labels or soft memberships.
pub mod empirical;

/// Parsimonious HDDA parameters built from the empirical statistics: subspace dimensions,
/// signal and noise variances, log-determinants and the parameter count of the model.
pub mod parsimony;

/// Discriminant costs, class decisions, posteriors and the mixture log-likelihood.
pub mod score;

/// Expectation-Maximization for the unsupervised (clustering) case.
pub mod em;

/// Cross-validated selection of the subspace hyperparameter.
pub mod cv;

/// Centroid-based clustering, used to initialize the EM iterations.
pub mod cluster;

mod hdda;

pub use empirical::*;

pub use parsimony::*;

pub use score::*;

pub use em::*;

pub use cv::*;

pub use hdda::*;

/// Trait shared by estimation algorithms that can be built in a single call from a sample
/// (rows given as slices of the same length) and a settings structure.
pub trait Estimator
where
    Self : Sized
{

    type Settings;

    type Error;

    fn estimate(
        sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
        settings : Self::Settings
    ) -> Result<Self, Self::Error>;

}

#[derive(Debug, Error)]
pub enum FitError {

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected : usize, found : usize },

    #[error("Sample must have at least one row and two columns")]
    EmptyInput,

    #[error("Class labels start at 1 (found label {0})")]
    InvalidLabel(usize),

    #[error("Class {class} has effective size {count}; at least 2 observations are required")]
    UndersizedClass { class : usize, count : f64 },

    #[error("Unknown model {0}")]
    UnknownModel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model has not been fitted")]
    NotFitted,

    #[error(transparent)]
    Json(#[from] serde_json::Error)
}

/// How the unsupervised iterations obtain their first class allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Init {
    KMeans,
    Random
}

/// Where the signal subspace dimension comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SubspaceSize {

    /// Scree test threshold over the normalized eigenvalue differences, in (0, 1).
    Threshold(f64),

    /// Dimension imposed on every class.
    Fixed(usize)
}

impl SubspaceSize {

    pub fn validate(&self) -> Result<(), FitError> {
        match self {
            SubspaceSize::Threshold(th) if !(*th > 0.0 && *th < 1.0) => {
                Err(FitError::InvalidConfig(format!("th must be in (0,1) (found {})", th)))
            },
            SubspaceSize::Fixed(0) => Err(FitError::InvalidConfig("p must be at least 1".to_string())),
            _ => Ok(())
        }
    }

}

/// Settings for fitting an HDDA model. Missing fields of a JSON configuration
/// take the values of Config::default().
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {

    /// Scree test threshold (0.9).
    pub th : f64,

    /// Explicit subspace dimension, used instead of th when present (None).
    pub p : Option<usize>,

    /// Initialization of the unsupervised case (k-means).
    pub init : Init,

    /// Maximum number of EM iterations (100).
    pub itermax : usize,

    /// Relative log-likelihood tolerance that stops the EM iterations (0.001).
    pub tol : f64,

    /// Number of clusters in the unsupervised case (4).
    #[serde(rename = "C", alias = "n_class")]
    pub n_class : usize,

    /// Minimum responsibility mass of a cluster before the fit is declared degenerate (2).
    /// At least 2, the smallest class the M-step can estimate.
    pub population : f64,

    /// Seed for k-means and random initialization (0).
    pub random_state : u64,

    /// Number of k-means restarts (10).
    pub n_init : usize
}

impl Default for Config {

    fn default() -> Self {
        Self {
            th : 0.9,
            p : None,
            init : Init::KMeans,
            itermax : 100,
            tol : 0.001,
            n_class : 4,
            population : 2.,
            random_state : 0,
            n_init : 10
        }
    }

}

impl Config {

    pub fn from_json(content : &str) -> Result<Self, FitError> {
        let config : Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        SubspaceSize::Threshold(self.th).validate()?;
        self.subspace().validate()?;
        if !(self.tol > 0.0) {
            return Err(FitError::InvalidConfig(format!("tol must be positive (found {})", self.tol)));
        }
        if self.n_class == 0 {
            return Err(FitError::InvalidConfig("C must be at least 1".to_string()));
        }
        if !(self.population >= 2.0) {
            return Err(FitError::InvalidConfig(format!("population must be at least 2 (found {})", self.population)));
        }
        if self.n_init == 0 {
            return Err(FitError::InvalidConfig("n_init must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn subspace(&self) -> SubspaceSize {
        match self.p {
            Some(p) => SubspaceSize::Fixed(p),
            None => SubspaceSize::Threshold(self.th)
        }
    }

}
