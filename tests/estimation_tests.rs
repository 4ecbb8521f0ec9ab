use std::thread;

use anyhow::Result;
use faer::Mat;
use mixcore::prelude::*;
use mixcore::routines::comm::threads::ThreadComm;
use mixcore::routines::estimation::kernels::calc_bound_const;
use mixcore::routines::estimation::rcg::rcg_optl;

/// Two components, six observations; component 1 fits most observations
/// better, so the optimizer must push nearly all mass onto it.
fn fixture_logl() -> Logl {
    Logl::from(Mat::from_fn(2, 6, |k, n| {
        if k == 0 {
            -0.2 * (n as f64 + 1.0)
        } else {
            -1.0 + 0.1 * (n as f64)
        }
    }))
}

fn fixture_log_times() -> Vec<f64> {
    (0..6).map(|n| (n as f64 + 1.0).ln()).collect()
}

fn assert_columns_normalized(posterior: &Posterior) {
    for j in 0..posterior.n_obs() {
        let mut colsum = 0.0;
        for i in 0..posterior.n_components() {
            colsum += posterior.matrix().get(i, j).exp();
        }
        assert!(
            (colsum.ln()).abs() < 1e-10,
            "column {} logsumexp = {}",
            j,
            colsum.ln()
        );
    }
}

#[test]
fn serial_run_matches_reference() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());
    assert!((bound_const - (-46.52486878432631)).abs() < 1e-2);

    let (posterior, bound) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-8, 5000)?;
    assert!((bound - (-15.87393305925918)).abs() < 1e-6, "bound = {}", bound);

    let expected = [
        [
            -2.777627267852005,
            -3.061377703019961,
            -3.349166930424183,
            -3.6400236254201315,
            -3.933195562757946,
            -4.228106756594701,
        ],
        [
            -0.06420351902815562,
            -0.04795481266979819,
            -0.03574489854770734,
            -0.026602452017342803,
            -0.019775247828844496,
            -0.014687300139286364,
        ],
    ];
    for i in 0..2 {
        for j in 0..6 {
            assert!(
                (posterior.matrix().get(i, j) - expected[i][j]).abs() < 1e-4,
                "gamma[{}, {}] = {}, expected {}",
                i,
                j,
                posterior.matrix().get(i, j),
                expected[i][j]
            );
        }
    }
    assert_columns_normalized(&posterior);

    let weights = posterior.weights(&lt);
    assert!((weights[0] - 0.026264983456149988).abs() < 1e-6);
    assert!((weights[1] - 0.9737350165438501).abs() < 1e-6);
    let total: f64 = weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn bound_improves_with_more_iterations() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());

    // The accepted bound sequence is non-decreasing, so truncated runs can
    // never beat longer ones.
    let mut previous = f64::NEG_INFINITY;
    for maxiters in [1, 3, 10, 40] {
        let (_, bound) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-8, maxiters)?;
        assert!(
            bound >= previous - 1e-9,
            "bound regressed from {} to {} at maxiters {}",
            previous,
            bound,
            maxiters
        );
        previous = bound;
    }
    Ok(())
}

#[test]
fn revert_path_reaches_reference_optimum() -> Result<()> {
    // A peaked likelihood with a nearly flat prior; the Fletcher-Reeves
    // momentum overshoots at least once, exercising the revert branch.
    let logl = Logl::from(Mat::from_fn(3, 8, |k, n| {
        -2.0 * (((k * 7 + n * 3) % 5) as f64) / 5.0 - 0.1 * (k as f64)
    }));
    let lt: Vec<f64> = (0..8).map(|n| (1.0 + (n % 4) as f64).ln()).collect();
    let alpha0 = Prior::symmetric(3, 1e-2)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());
    assert!((bound_const - (-49.73749155770327)).abs() < 1e-2);

    let (posterior, bound) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-8, 5000)?;
    assert!((bound - (-19.247753878764577)).abs() < 1e-5, "bound = {}", bound);
    assert_columns_normalized(&posterior);

    // The third component is ruled out, with responsibilities below -100.
    for j in 0..8 {
        assert!(*posterior.matrix().get(2, j) < -100.0);
    }
    let weights = posterior.weights(&lt);
    assert!((weights[0] - 0.5198508190707873).abs() < 1e-4);
    assert!((weights[1] - 0.4801491809292127).abs() < 1e-4);
    assert!(weights[2] < 1e-40);
    Ok(())
}

#[test]
fn single_component_collapses_to_certainty() -> Result<()> {
    let logl = Logl::from(Mat::from_fn(1, 3, |_, n| -((n + 1) as f64)));
    let lt = vec![0.0; 3];
    let alpha0 = Prior::symmetric(1, 1.0)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());
    let (posterior, _) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-6, 100)?;
    for j in 0..3 {
        assert!(posterior.matrix().get(0, j).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn zero_maxiters_returns_normalized_initialization() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());
    let (posterior, _) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-8, 0)?;
    for i in 0..2 {
        for j in 0..6 {
            assert!((posterior.matrix().get(i, j) - 0.5_f64.ln()).abs() < 1e-12);
        }
    }
    Ok(())
}

#[test]
fn huge_tolerance_stops_after_first_iteration() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let bound_const = calc_bound_const(&lt, alpha0.as_slice());
    let (loose, bound_loose) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e6, 5000)?;
    let (one_iter, bound_one) = rcg_optl_mat(&logl, &lt, &alpha0, bound_const, 1e-8, 1)?;
    assert!((bound_loose - bound_one).abs() < 1e-12);
    for i in 0..2 {
        for j in 0..6 {
            assert!((loose.matrix().get(i, j) - one_iter.matrix().get(i, j)).abs() < 1e-12);
        }
    }
    Ok(())
}

#[test]
fn rejects_invalid_inputs() {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5).unwrap();

    // Non-positive prior concentrations
    assert!(Prior::symmetric(2, 0.0).is_err());
    assert!(Prior::new(vec![1.0, -0.5]).is_err());
    assert!(Prior::new(vec![]).is_err());

    // Shape mismatches
    assert!(rcg_optl(&logl, &lt[..5], &alpha0, 1e-8, 10).is_err());
    let alpha_wrong = Prior::symmetric(3, 0.5).unwrap();
    assert!(rcg_optl(&logl, &lt, &alpha_wrong, 1e-8, 10).is_err());

    // Non-finite data
    let mut bad = Mat::from_fn(2, 6, |_, _| -1.0);
    *bad.get_mut(0, 0) = f64::NAN;
    assert!(rcg_optl(&Logl::from(bad), &lt, &alpha0, 1e-8, 10).is_err());
    let inf_counts = vec![f64::NEG_INFINITY; 6];
    assert!(rcg_optl(&logl, &inf_counts, &alpha0, 1e-8, 10).is_err());

    // Empty matrix
    assert!(rcg_optl(&Logl::new(), &[], &alpha0, 1e-8, 10).is_err());

    // Bad tolerance
    assert!(rcg_optl(&logl, &lt, &alpha0, -1.0, 10).is_err());
}

fn run_parallel(size: usize, tol: f64, maxiters: usize) -> Vec<Result<(Posterior, f64)>> {
    let comms = ThreadComm::create(size);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let alpha0 = Prior::symmetric(2, 0.5)?;
                let input = if comm.rank() == 0 {
                    Some((fixture_logl(), fixture_log_times()))
                } else {
                    None
                };
                rcg_optl_par(
                    &comm,
                    input.as_ref().map(|(l, t)| (l, t.as_slice())),
                    &alpha0,
                    tol,
                    maxiters,
                )
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn parallel_matches_serial_on_root() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let (serial, serial_bound) = rcg_optl(&logl, &lt, &alpha0, 1e-8, 5000)?;

    for size in [1, 2, 3] {
        let mut results = run_parallel(size, 1e-8, 5000);
        let bounds: Vec<f64> = results
            .iter()
            .map(|r| r.as_ref().expect("rank failed").1)
            .collect();
        // Every rank agrees on the bound.
        for b in &bounds {
            assert!((b - bounds[0]).abs() < 1e-12);
        }
        let (root, root_bound) = results.remove(0)?;
        assert!(
            (root_bound - serial_bound).abs() < 1e-6,
            "P = {}: bound {} vs serial {}",
            size,
            root_bound,
            serial_bound
        );
        assert_eq!(root.n_components(), 2);
        assert_eq!(root.n_obs(), 6);
        for i in 0..2 {
            for j in 0..6 {
                assert!(
                    (root.matrix().get(i, j) - serial.matrix().get(i, j)).abs() < 1e-4,
                    "P = {}: gamma[{}, {}] = {} vs serial {}",
                    size,
                    i,
                    j,
                    root.matrix().get(i, j),
                    serial.matrix().get(i, j)
                );
            }
        }
        assert_columns_normalized(&root);
    }
    Ok(())
}

#[test]
fn parallel_single_comm_is_exactly_serial() -> Result<()> {
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let alpha0 = Prior::symmetric(2, 0.5)?;
    let (serial, serial_bound) = rcg_optl(&logl, &lt, &alpha0, 1e-8, 5000)?;
    let (par, par_bound) = rcg_optl_par(&SingleComm, Some((&logl, &lt)), &alpha0, 1e-8, 5000)?;
    assert_eq!(serial_bound, par_bound);
    for i in 0..2 {
        for j in 0..6 {
            assert_eq!(serial.matrix().get(i, j), par.matrix().get(i, j));
        }
    }
    Ok(())
}

#[test]
fn parallel_rejects_indivisible_partition() {
    // Six observations cannot be split over four ranks.
    let results = run_parallel(4, 1e-8, 10);
    for r in results {
        assert!(r.is_err());
    }
}

#[test]
fn estimate_weights_runs_from_settings() -> Result<()> {
    let settings = Settings::builder()
        .set_algorithm(Algorithm::Rcg)
        .set_tol(1e-8)
        .set_maxiters(5000)
        .set_alpha0(0.5)
        .build();
    let logl = fixture_logl();
    let lt = fixture_log_times();
    let (posterior, weights) = estimate_weights(&logl, &lt, &settings)?;
    assert_columns_normalized(&posterior);
    assert!((weights[1] - 0.9737350165438501).abs() < 1e-4);
    Ok(())
}

#[test]
fn logl_from_ndarray() {
    let array = ndarray::Array2::from_shape_fn((2, 3), |(i, j)| -(i as f64) - (j as f64));
    let logl = Logl::from(&array);
    assert_eq!(logl.n_components(), 2);
    assert_eq!(logl.n_obs(), 3);
    for i in 0..2 {
        for j in 0..3 {
            assert_eq!(*logl.matrix().get(i, j), array[[i, j]]);
        }
    }
}
