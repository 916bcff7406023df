use nalgebra::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use crate::model::Model;
use crate::decision::ConfusionMatrix;
use super::*;

/// Stratified K-Folds cross-validator.
///
/// Each class has its observations shuffled and split into n_splits contiguous blocks,
/// the first (class size % n_splits) blocks taking one extra observation. The ith test fold
/// joins the ith block of every class, so each fold keeps the class distribution of the
/// whole sample.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits : usize,
    random_state : u64
}

impl StratifiedKFold {

    pub fn new(n_splits : usize) -> Self {
        Self { n_splits, random_state : 0 }
    }

    pub fn with_random_state(mut self, random_state : u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Generates (train, test) row indices for each fold.
    pub fn split(&self, y : &[usize]) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut rng = StdRng::seed_from_u64(self.random_state);

        // Classes are visited in label order so the shuffles are reproducible.
        let mut class_indices : BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, label) in y.iter().enumerate() {
            class_indices.entry(*label).or_default().push(i);
        }

        let mut fold_indices : Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            let fold_size = indices.len() / self.n_splits;
            let remainder = indices.len() % self.n_splits;
            let mut start = 0;
            for (i, fold) in fold_indices.iter_mut().enumerate() {
                let end = start + if i < remainder { fold_size + 1 } else { fold_size };
                fold.extend_from_slice(&indices[start..end]);
                start = end;
            }
        }

        fold_indices.into_iter()
            .map(|mut test| {
                test.sort_unstable();
                let train : Vec<usize> = (0..y.len()).filter(|i| test.binary_search(i).is_err() ).collect();
                (train, test)
            })
            .collect()
    }

}

/// Candidate values for the subspace hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Grid {

    /// Scree test thresholds.
    Threshold(Vec<f64>),

    /// Fixed subspace dimensions.
    Dim(Vec<usize>),

    /// Thresholds for the models with per-class dimensions, dimensions for
    /// the models with a common dimension.
    Auto { th : Vec<f64>, p : Vec<usize> }
}

impl Grid {

    pub fn candidates(&self, model : Model) -> Vec<SubspaceSize> {
        match self {
            Grid::Threshold(th) => th.iter().map(|t| SubspaceSize::Threshold(*t) ).collect(),
            Grid::Dim(p) => p.iter().map(|p| SubspaceSize::Fixed(*p) ).collect(),
            Grid::Auto { th, p } => if model.ties().common_dim {
                Grid::Dim(p.clone()).candidates(model)
            } else {
                Grid::Threshold(th.clone()).candidates(model)
            }
        }
    }

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {

    /// Grid value with the largest mean Kappa (the first one on ties).
    pub best : SubspaceSize,

    pub kappa : f64,

    /// Mean Kappa over the folds for each grid value.
    pub scores : Vec<f64>
}

fn select_rows(x : &DMatrix<f64>, rows : &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), x.ncols(), |i, j| x[(rows[i], j)] )
}

/// Estimates the Kappa coefficient of agreement of each grid value by v-fold stratified
/// cross-validation over labeled data, and returns the best one. The empirical
/// estimate is computed once per fold and shared by all grid values.
pub fn cross_validate(
    x : &DMatrix<f64>,
    y : &[usize],
    model : Model,
    grid : &Grid,
    folds : usize,
    seed : u64
) -> Result<CvResult, FitError> {
    let candidates = grid.candidates(model);
    if candidates.is_empty() {
        return Err(FitError::InvalidConfig("Empty cross-validation grid".to_string()));
    }
    if folds < 2 {
        return Err(FitError::InvalidConfig(format!("At least 2 folds are required (found {})", folds)));
    }
    if x.nrows() != y.len() {
        return Err(FitError::DimensionMismatch { expected : x.nrows(), found : y.len() });
    }
    for cand in candidates.iter() {
        cand.validate()?;
    }

    let n_class = y.iter().copied().max().unwrap_or(0);
    let mut kappa = vec![0.; candidates.len()];
    for (fold, (train, test)) in StratifiedKFold::new(folds).with_random_state(seed).split(y).iter().enumerate() {
        let ytrain : Vec<usize> = train.iter().map(|i| y[*i] ).collect();
        let ytest : Vec<usize> = test.iter().map(|i| y[*i] ).collect();
        let xtest = select_rows(x, &test[..]);
        let emp = Empirical::estimate(&select_rows(x, &train[..]), Membership::Hard(&ytrain[..]))?;
        for (i, cand) in candidates.iter().enumerate() {
            let params = Params::build(&emp, model, *cand);
            let pred = decide(&params.costs(&xtest)?);
            let mut cm = ConfusionMatrix::new(n_class);
            cm.accumulate(&pred[..], &ytest[..])?;
            kappa[i] += cm.kappa();
        }
        log::debug!("Fold {}: {} train, {} test observations", fold, train.len(), test.len());
    }
    kappa.iter_mut().for_each(|k| *k /= folds as f64 );

    let mut best = 0;
    for (i, k) in kappa.iter().enumerate() {
        if *k > kappa[best] {
            best = i;
        }
    }
    log::info!("{} cross-validation: best {:?} (Kappa {})", model, candidates[best], kappa[best]);
    Ok(CvResult { best : candidates[best], kappa : kappa[best], scores : kappa })
}
