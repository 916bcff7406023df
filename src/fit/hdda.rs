use nalgebra::*;
use crate::model::Model;
use super::*;

/// High-dimensional discriminant analysis classifier.
///
/// Each class is modelled by a gaussian whose covariance has its first pi eigenvalues free
/// (the signal subspace) and the remaining d - pi eigenvalues equal to a single noise
/// variance. The twelve parsimonious variants of Model tie some of those parameters
/// across classes.
///
/// The fit happens in two stages: fit_init computes the empirical statistics (means,
/// covariances and their eigendecompositions), which is the expensive part; fit_update
/// derives the parsimonious parameters for a given subspace size. free(false) discards
/// only the second stage, so fit_update can be repeated over the same estimate.
///
/// # References
/// Bouveyron, C., Girard, S., & Schmid, C. (2007). High-dimensional data clustering.
/// Computational Statistics & Data Analysis, 52(1), 502–519.
#[derive(Debug, Clone)]
pub struct Hdda {

    model : Model,

    config : Config,

    empirical : Option<Empirical>,

    params : Option<Params>
}

impl Hdda {

    pub fn new(model : Model) -> Self {
        Self { model, config : Config::default(), empirical : None, params : None }
    }

    pub fn with_config(model : Model, config : Config) -> Result<Self, FitError> {
        config.validate()?;
        Ok(Self { model, config, empirical : None, params : None })
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fits the model to the rows of x. With labels (1..=C), this is the supervised
    /// estimate; without them, the rows are clustered into Config::n_class groups by
    /// expectation maximization. A degenerate clustering leaves the model unfitted.
    pub fn fit(&mut self, x : &DMatrix<f64>, y : Option<&[usize]>) -> Result<Clustering, FitError> {
        match y {
            Some(y) => {
                self.fit_init(x, y)?;
                let params = self.fit_update(self.config.subspace())?.clone();
                Clustering::supervised(x, params)
            },
            None => {
                let res = expectation_maximization(x, self.model, &self.config)?;
                self.empirical = None;
                self.params = res.params.clone();
                Ok(res)
            }
        }
    }

    /// Computes the empirical statistics from labeled data, discarding any previous fit.
    pub fn fit_init(&mut self, x : &DMatrix<f64>, y : &[usize]) -> Result<(), FitError> {
        self.params = None;
        self.empirical = Some(Empirical::estimate(x, Membership::Hard(y))?);
        Ok(())
    }

    /// Derives the parsimonious parameters from the statistics of the last fit_init.
    pub fn fit_update(&mut self, subspace : SubspaceSize) -> Result<&Params, FitError> {
        subspace.validate()?;
        let emp = self.empirical.as_ref().ok_or(FitError::NotFitted)?;
        self.params = Some(Params::build(emp, self.model, subspace));
        self.params.as_ref().ok_or(FitError::NotFitted)
    }

    /// Discards the parsimonious parameters, and also the empirical statistics if full is true.
    pub fn free(&mut self, full : bool) {
        self.params = None;
        if full {
            self.empirical = None;
        }
    }

    pub fn predict(&self, xt : &DMatrix<f64>, out : Output) -> Result<Prediction, FitError> {
        self.params.as_ref().ok_or(FitError::NotFitted)?.predict(xt, out)
    }

    pub fn log_likelihood(&self, x : &DMatrix<f64>) -> Result<(f64, DMatrix<f64>), FitError> {
        self.params.as_ref().ok_or(FitError::NotFitted)?.log_likelihood(x)
    }

    /// Cross-validates the subspace hyperparameter of this model over labeled data. The
    /// current fit is left untouched.
    pub fn cross_validate(
        &self,
        x : &DMatrix<f64>,
        y : &[usize],
        grid : &Grid,
        folds : usize,
        seed : u64
    ) -> Result<CvResult, FitError> {
        cross_validate(x, y, self.model, grid, folds, seed)
    }

    pub fn empirical(&self) -> Option<&Empirical> {
        self.empirical.as_ref()
    }

    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    fn labeled() -> (DMatrix<f64>, Vec<usize>) {
        let x = DMatrix::from_row_slice(8, 3, &[
            -1.0, 0.1, 0.0,
            1.0, -0.1, 0.1,
            -2.0, 0.0, -0.1,
            2.0, 0.2, 0.0,
            4.0, 5.1, 5.0,
            6.0, 4.9, 5.1,
            3.0, 5.0, 4.9,
            7.0, 5.2, 5.0
        ]);
        (x, vec![1, 1, 1, 1, 2, 2, 2, 2])
    }

    #[test]
    fn lifecycle() {
        let (x, y) = labeled();
        let mut hdda = Hdda::new(Model::M1);
        assert!(matches!(hdda.predict(&x, Output::Labels), Err(FitError::NotFitted)));
        assert!(matches!(hdda.fit_update(SubspaceSize::Threshold(0.5)), Err(FitError::NotFitted)));

        hdda.fit_init(&x, &y).unwrap();
        assert!(hdda.empirical().is_some());
        assert!(hdda.params().is_none());
        hdda.fit_update(SubspaceSize::Fixed(1)).unwrap();
        assert_eq!(hdda.params().unwrap().dims(), vec![1, 1]);

        hdda.free(false);
        assert!(hdda.params().is_none());
        assert!(hdda.empirical().is_some());
        hdda.fit_update(SubspaceSize::Fixed(2)).unwrap();
        assert_eq!(hdda.params().unwrap().dims(), vec![2, 2]);

        hdda.free(true);
        assert!(hdda.empirical().is_none());
        assert!(matches!(hdda.fit_update(SubspaceSize::Fixed(1)), Err(FitError::NotFitted)));
    }

    #[test]
    fn supervised_fit_predicts_training_labels() {
        let (x, y) = labeled();
        let mut hdda = Hdda::new(Model::M1);
        let res = hdda.fit(&x, Some(&y[..])).unwrap();
        assert_eq!(res.state, EmState::Supervised);
        assert!(res.labels.is_none());
        let pred = hdda.predict(&x, Output::Labels).unwrap();
        assert_eq!(pred.labels().unwrap(), &y[..]);
        let (ll, k) = hdda.log_likelihood(&x).unwrap();
        assert!(ll.is_finite());
        assert_eq!(k.shape(), (8, 2));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config { th : 0.0, ..Config::default() };
        assert!(matches!(Hdda::with_config(Model::M2, config), Err(FitError::InvalidConfig(_))));
        let (x, y) = labeled();
        let mut hdda = Hdda::new(Model::M2);
        hdda.fit_init(&x, &y).unwrap();
        assert!(matches!(hdda.fit_update(SubspaceSize::Threshold(1.0)), Err(FitError::InvalidConfig(_))));
    }
}
