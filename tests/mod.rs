use nalgebra::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use approx::assert_abs_diff_eq;
use hdda::*;
use hdda::calc::{EPS, MAX};
use hdda::fit::{SubspaceSize, n_parameters};
use hdda::decision::ConfusionMatrix;

/// Two spherical gaussians N([0,0], I) and N([10,10], I), 50 points each.
fn two_gaussians(seed : u64) -> (DMatrix<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::new();
    let mut y = Vec::new();
    for (c, mu) in [0.0, 10.0].iter().enumerate() {
        for _ in 0..50 {
            for _ in 0..2 {
                let z : f64 = rng.sample(StandardNormal);
                data.push(mu + z);
            }
            y.push(c + 1);
        }
    }
    (DMatrix::from_row_slice(100, 2, &data[..]), y)
}

/// Three classes in four dimensions, each elongated along a different axis.
fn elongated(seed : u64, n : usize) -> (DMatrix<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let d = 4;
    let mut data = Vec::new();
    let mut y = Vec::new();
    for c in 0..3 {
        for _ in 0..n {
            for j in 0..d {
                let z : f64 = rng.sample(StandardNormal);
                let mean = if j == c { 0.0 } else { 8.0 * c as f64 };
                let scale = if j == c { 3.0 } else { 0.3 };
                data.push(mean + scale * z);
            }
            y.push(c + 1);
        }
    }
    (DMatrix::from_row_slice(3 * n, d, &data[..]), y)
}

#[test]
fn two_class_scenario() -> anyhow::Result<()> {
    let (x, y) = two_gaussians(1);
    let mut hdda = Hdda::with_config(Model::M1, Config { th : 0.9, ..Config::default() })?;
    hdda.fit(&x, Some(&y[..]))?;
    let params = hdda.params().ok_or(FitError::NotFitted)?;
    assert_eq!(params.dims(), vec![1, 1]);

    let xt = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 10.0, 10.0]);
    match hdda.predict(&xt, Output::Posterior)? {
        Prediction::Posterior(labels, post) => {
            assert_eq!(labels, vec![1, 2]);
            for row in post.row_iter() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            }
        },
        _ => panic!("Expected posterior")
    }
    Ok(())
}

#[test]
fn parameter_count() {
    let ties = Model::M1.ties();
    assert_eq!(n_parameters(&ties, 2, &[1, 1]), 13);
    let (x, y) = two_gaussians(2);
    let mut hdda = Hdda::new(Model::M1);
    hdda.fit(&x, Some(&y[..])).unwrap();
    assert_eq!(hdda.params().unwrap().q, 13);
}

#[test]
fn fitted_invariants_hold_for_every_model() -> anyhow::Result<()> {
    let (x, y) = elongated(3, 40);
    for model in Model::ALL.iter() {
        let mut hdda = Hdda::new(*model);
        hdda.fit(&x, Some(&y[..]))?;
        let params = hdda.params().ok_or(FitError::NotFitted)?;
        let mut total_prop = 0.0;
        for cl in params.classes.iter() {
            assert!(cl.pi >= 1 && cl.pi <= 3, "{}: pi = {}", model, cl.pi);
            assert!(cl.a.iter().all(|a| *a >= EPS ));
            assert!(cl.b >= EPS);
            assert!(cl.logdet.is_finite());
            let gram = cl.basis.tr_mul(&cl.basis);
            assert!((gram - DMatrix::<f64>::identity(cl.pi, cl.pi)).abs().max() < 1e-8);
            total_prop += cl.prop;
        }
        assert_abs_diff_eq!(total_prop, 1.0, epsilon = 1e-12);
        for cl in hdda.empirical().ok_or(FitError::NotFitted)?.classes.iter() {
            assert!(cl.eigenvalues.iter().all(|l| *l >= EPS ));
        }
    }
    Ok(())
}

#[test]
fn supervised_generalizes_to_new_sample() -> anyhow::Result<()> {
    let (x, y) = elongated(4, 50);
    let (xt, yt) = elongated(5, 50);
    for model in [Model::M1, Model::M4, Model::M8, Model::M12].iter() {
        let mut hdda = Hdda::new(*model);
        hdda.fit(&x, Some(&y[..]))?;
        let pred = hdda.predict(&xt, Output::Labels)?;
        let cm = ConfusionMatrix::compute(pred.labels().unwrap_or(&[]), &yt)?;
        assert!(cm.accuracy() > 0.98, "{}: accuracy {}", model, cm.accuracy());
    }
    Ok(())
}

#[test]
fn clustering_recovers_separated_groups() -> anyhow::Result<()> {
    let (x, y) = two_gaussians(6);
    let mut hdda = Hdda::with_config(Model::M1, Config { n_class : 2, ..Config::default() })?;
    let res = hdda.fit(&x, None)?;
    assert_eq!(res.state, EmState::Converged);
    assert!(res.bic < MAX);
    assert!(res.icl < MAX);
    let labels = res.labels.ok_or(FitError::NotFitted)?;

    // Cluster numbering is arbitrary: compare up to a permutation.
    let cm = ConfusionMatrix::compute(&labels, &y)?;
    let agreement = cm.accuracy().max(1. - cm.accuracy());
    assert!(agreement > 0.98);

    // The clustering can label new points.
    let pred = hdda.predict(&DMatrix::from_row_slice(1, 2, &[10.0, 10.0]), Output::Labels)?;
    assert_eq!(pred.labels().unwrap_or(&[])[0], labels[50]);
    Ok(())
}

#[test]
fn em_log_likelihood_is_monotone() -> anyhow::Result<()> {
    let n = 200;
    let (x, _) = elongated(7, n);
    let config = Config { n_class : 3, p : Some(1), tol : 1e-8, ..Config::default() };

    // Up to the ni - 1 normalization of the soft covariances, about d / 4(ni - 1) per cluster.
    let slack = 3. * 4. / (4. * (n - 1) as f64);
    for model in Model::ALL.iter() {
        let res = hdda::fit::expectation_maximization(&x, *model, &config)?;
        assert_eq!(res.state, EmState::Converged, "{}", model);
        for w in res.log_likelihood.windows(2) {
            assert!(w[1] >= w[0] - slack, "{}: {:?}", model, res.log_likelihood);
        }
    }
    Ok(())
}

#[test]
fn underpopulated_clustering_reports_sentinels() -> anyhow::Result<()> {
    let (x, _) = elongated(10, 40);
    let config = Config { n_class : 3, population : 45., ..Config::default() };
    let mut hdda = Hdda::with_config(Model::M4, config)?;
    let res = hdda.fit(&x, None)?;
    assert_eq!(res.state, EmState::Degenerate);
    assert_eq!(res.bic, MAX);
    assert_eq!(res.icl, MAX);
    assert!(res.labels.is_none());
    assert_eq!(res.n_iter, 1);
    assert_eq!(res.log_likelihood.len(), 1);
    assert!(hdda.params().is_none());
    Ok(())
}

#[test]
fn degenerate_clustering_reports_sentinels() -> anyhow::Result<()> {
    let x = DMatrix::from_row_slice(6, 2, &[
        0.0, 0.0,
        0.1, 0.0,
        5.0, 5.0,
        5.1, 5.0,
        9.0, 0.0,
        9.0, 0.1
    ]);
    let mut hdda = Hdda::with_config(Model::M1, Config { n_class : 4, ..Config::default() })?;
    let res = hdda.fit(&x, None)?;
    assert_eq!(res.state, EmState::Degenerate);
    assert_eq!(res.bic, MAX);
    assert_eq!(res.icl, MAX);
    assert!(hdda.params().is_none());
    Ok(())
}

#[test]
fn cross_validation_selects_subspace() -> anyhow::Result<()> {
    let (x, y) = elongated(8, 30);
    let grid = Grid::Auto { th : vec![0.1, 0.3, 0.5], p : vec![1, 2, 3] };
    let res = Hdda::new(Model::M2).cross_validate(&x, &y, &grid, 5, 0)?;
    assert_eq!(res.scores.len(), 3);
    assert!(matches!(res.best, SubspaceSize::Fixed(_)));
    assert!(res.kappa > 0.9);

    let res = Hdda::new(Model::M5).cross_validate(&x, &y, &grid, 5, 0)?;
    assert!(matches!(res.best, SubspaceSize::Threshold(_)));
    assert!(res.scores.iter().all(|k| *k <= res.kappa ));
    Ok(())
}

#[test]
fn config_from_json_drives_fit() -> anyhow::Result<()> {
    let config = Config::from_json(r#"{ "C" : 2, "init" : "random", "random_state" : 11 }"#)?;
    let (x, _) = two_gaussians(9);
    let mut hdda = Hdda::with_config("m3".parse()?, config)?;
    let res = hdda.fit(&x, None)?;
    assert!(res.n_iter <= hdda.config().itermax);
    assert!(matches!(res.state, EmState::Converged | EmState::Degenerate));
    Ok(())
}
