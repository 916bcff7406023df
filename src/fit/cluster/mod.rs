use rand::prelude::*;
use rand::rngs::StdRng;

/// Centroid-based (or prototype-based) clustering implementation
pub mod center;

pub use center::*;

pub(crate) fn euclidian(a : &[f64], b : &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powf(2.) ).sum::<f64>().sqrt()
}

/// Random class labels (1..=n_cluster) for n observations. When n >= n_cluster, every label
/// is hard-set on at least one observation, chosen at random.
pub fn random_labels(n : usize, n_cluster : usize, seed : u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    if n_cluster == 0 {
        return vec![0; n];
    }

    // Start by doing a random assignment
    let mut labels : Vec<usize> = (0..n).map(|_| rng.gen_range(0, n_cluster) + 1 ).collect();

    // Make sure at least one observation is assigned to each cluster by hard-setting
    // the label of n_cluster random observations over the previously-generated values.
    let mut obs : Vec<usize> = (0..n).collect();
    obs.shuffle(&mut rng);
    for (c, ix) in obs.iter().take(n_cluster).enumerate() {
        labels[*ix] = c + 1;
    }
    labels
}
