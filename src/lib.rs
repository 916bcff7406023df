/// Numeric primitives shared by the estimators: covariances, sorted eigendecompositions,
/// the scree test and numerically stable row-wise reductions.
pub mod calc;

/// The twelve parsimonious covariance models, and the parameter ties that define them.
pub mod model;

/// Estimation algorithms: supervised and unsupervised (expectation maximization) fitting,
/// prediction, cross-validation and the k-means initialization.
pub mod fit;

// Agreement between decisions and reference labels.
pub mod decision;

pub use model::Model;

pub use fit::{Hdda, Config, Clustering, EmState, Output, Prediction, Grid, CvResult, FitError};
