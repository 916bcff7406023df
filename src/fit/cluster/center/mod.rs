use nalgebra::DVector;
use std::borrow::Borrow;
use crate::fit::Estimator;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::fmt;
use thiserror::Error;
use super::euclidian;

#[derive(Debug, Clone)]
pub struct KMeansSettings {

    pub n_cluster : usize,

    pub max_iter : usize,

    /// Number of restarts from different seeds. The run with the smallest inertia is kept.
    pub n_init : usize,

    /// Seed of the random number generator that picks the first centroid of each restart.
    pub seed : u64,

    /// Starting allocations (0..n_cluster). When informed, the algorithm runs a single time from them.
    pub allocations : Option<Vec<usize>>
}

impl Default for KMeansSettings {

    fn default() -> Self {
        Self { n_cluster : 2, max_iter : 300, n_init : 10, seed : 0, allocations : None }
    }

}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KMeansError {

    #[error("No observations to cluster")]
    Empty,

    #[error("Cannot split {n} observations into {n_cluster} clusters")]
    TooFewPoints { n : usize, n_cluster : usize },

    #[error("Invalid starting allocations")]
    InvalidAllocations
}

/// K-means is a special case of the EM algorithm for GMMs where
/// the probabilities of class allocation are assumed constant and equal;
/// and the covariances within clusters are assumed constant and equal as well.
#[derive(Debug, Clone)]
pub struct KMeans {
    allocations : Vec<usize>,
    means : Vec<DVector<f64>>,
    n_iter : usize,
    inertia : f64
}

impl KMeans {

    /// Returns mean of each cluster, with order matching the indices returned by Self::allocations
    pub fn means(&self) -> impl Iterator<Item=&[f64]> {
        self.means.iter().map(|m| m.as_slice() )
    }

    /// Return cluster of each observation (0..n_cluster), in the order they were supplied
    pub fn allocations(&self) -> &[usize] {
        &self.allocations[..]
    }

    /// Cluster of each observation as a class label (1..=n_cluster).
    pub fn labels(&self) -> Vec<usize> {
        self.allocations.iter().map(|a| a + 1 ).collect()
    }

    pub fn iterations(&self) -> usize {
        self.n_iter
    }

    /// Sum of squared distances of the observations to their cluster means.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn count_allocations(&self, cluster_ix : usize) -> usize {
        self.allocations().iter().filter(|alloc| **alloc == cluster_ix ).count()
    }

}

impl fmt::Display for KMeans {

    fn fmt(&self, f : &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let mut dst = String::new();
        for c in 0..self.means.len() {
            dst += &format!(
                "Cluster {}: Mean = {:?}; Observations = {}\n",
                c,
                self.means[c].as_slice(),
                self.count_allocations(c)
            );
        }
        write!(f, "{}", dst)
    }
}

/// Recomputes the cluster means from the allocations. A cluster left without
/// observations keeps its previous mean.
fn update_means(
    means : &mut [DVector<f64>],
    sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
    allocations : &[usize]
) {
    let obs_dim = means[0].nrows();
    let mut sums : Vec<DVector<f64>> = (0..means.len()).map(|_| DVector::zeros(obs_dim) ).collect();
    let mut counts = vec![0usize; means.len()];

    // Accumulate each observation into sum and count
    for (obs, alloc) in sample.zip(allocations.iter()) {
        sums[*alloc] += DVector::from_column_slice(obs.borrow());
        counts[*alloc] += 1;
    }

    for (c, (sum, count)) in sums.into_iter().zip(counts.into_iter()).enumerate() {
        if count > 0 {
            means[c] = sum.unscale(count as f64);
        }
    }
}

fn closest<'a>(candidates : impl Iterator<Item=&'a [f64]>, el : &[f64]) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut min_ix = 0;
    for (cand_ix, cand) in candidates.enumerate() {
        let dist_to_cand = euclidian(el, cand);
        if dist_to_cand < min_dist {
            min_ix = cand_ix;
            min_dist = dist_to_cand;
        }
    }
    min_ix
}

/// Update allocation vector, returning how many observations were re-allocated.
fn update_allocations(
    allocations : &mut [usize],
    means : &[DVector<f64>],
    sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone
) -> usize {
    let mut n_reallocated = 0;
    for (alloc, obs) in allocations.iter_mut().zip(sample) {
        let best_alloc = closest(means.iter().map(|v| v.as_slice() ), obs.borrow());
        if *alloc != best_alloc {
            *alloc = best_alloc;
            n_reallocated += 1;
        }
    }
    n_reallocated
}

fn inertia(
    allocations : &[usize],
    means : &[DVector<f64>],
    sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone
) -> f64 {
    sample.zip(allocations.iter())
        .map(|(obs, alloc)| euclidian(obs.borrow(), means[*alloc].as_slice()).powi(2) )
        .sum()
}

/// Seeding (choosing a representative observation for each cluster
/// before starting the KMeans algorithm) helps with the identifiability
/// of the model, biasing the algorithm to one of the equally likely
/// cluster allocations. The first seed is random; each next seed is the observation
/// with the highest average distance to the seeds taken so far.
fn seed_means(
    n_cluster : usize,
    sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
    n : usize,
    rng : &mut StdRng
) -> Vec<DVector<f64>> {

    // At the ith index, holds a representative observation off the ith cluster.
    let mut seeds : Vec<(usize, DVector<f64>)> = Vec::with_capacity(n_cluster);

    for c in 0..n_cluster {
        let obs_ix = if c == 0 {
            rng.gen_range(0, n)
        } else {
            let mut furthest_obs : Option<(usize, f64)> = None;
            for (ix, obs) in sample.clone().enumerate() {
                if seeds.iter().any(|(s_ix, _)| *s_ix == ix ) {
                    continue;
                }
                let avg_dist = seeds.iter()
                    .map(|(_, s)| euclidian(obs.borrow(), s.as_slice()) )
                    .sum::<f64>() / seeds.len() as f64;
                if furthest_obs.map(|(_, dist)| avg_dist > dist ).unwrap_or(true) {
                    furthest_obs = Some((ix, avg_dist));
                }
            }
            furthest_obs.map(|(ix, _)| ix ).unwrap_or(0)
        };
        if let Some(obs) = sample.clone().nth(obs_ix) {
            seeds.push((obs_ix, DVector::from_column_slice(obs.borrow())));
        }
    }

    seeds.into_iter().map(|(_, s)| s ).collect()
}

fn valid_allocations(allocations : &[usize], n : usize, n_cluster : usize) -> bool {
    allocations.len() == n && allocations.iter().all(|a| *a < n_cluster )
}

/// Lloyd iterations from the informed means or allocations.
fn lloyd(
    sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
    mut means : Vec<DVector<f64>>,
    mut allocations : Vec<usize>,
    max_iter : usize
) -> KMeans {
    let mut n_iter = 0;
    for _ in 0..max_iter {
        n_iter += 1;
        let n_reallocated = update_allocations(&mut allocations[..], &means[..], sample.clone());
        if n_reallocated == 0 && n_iter > 1 {
            break;
        }
        update_means(&mut means[..], sample.clone(), &allocations[..]);
    }
    let inertia = inertia(&allocations[..], &means[..], sample);
    KMeans { allocations, means, n_iter, inertia }
}

impl Estimator for KMeans {

    type Settings = KMeansSettings;

    type Error = KMeansError;

    fn estimate(
        sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
        mut settings : Self::Settings
    ) -> Result<Self, Self::Error> {

        let n = sample.clone().count();
        let obs_dim = match sample.clone().next() {
            Some(obs) => obs.borrow().len(),
            None => return Err(KMeansError::Empty)
        };
        if settings.n_cluster == 0 || n < settings.n_cluster {
            return Err(KMeansError::TooFewPoints { n, n_cluster : settings.n_cluster });
        }

        if let Some(allocations) = settings.allocations.take() {
            if !valid_allocations(&allocations[..], n, settings.n_cluster) {
                return Err(KMeansError::InvalidAllocations);
            }
            let mut means : Vec<DVector<f64>> = (0..settings.n_cluster)
                .map(|_| DVector::zeros(obs_dim) )
                .collect();
            update_means(&mut means[..], sample.clone(), &allocations[..]);
            return Ok(lloyd(sample, means, allocations, settings.max_iter));
        }

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut best : Option<KMeans> = None;
        for _ in 0..settings.n_init.max(1) {
            let means = seed_means(settings.n_cluster, sample.clone(), n, &mut rng);
            let km = lloyd(sample.clone(), means, vec![0; n], settings.max_iter);
            if best.as_ref().map(|b| km.inertia < b.inertia ).unwrap_or(true) {
                best = Some(km);
            }
        }
        best.ok_or(KMeansError::Empty)
    }

}
