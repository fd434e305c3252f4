// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The SQP-GS driver: samples gradients, solves the per-iteration QP,
//! line-searches the L1 merit function, updates the BFGS approximation, and
//! adapts the sampling radius/penalty/feasibility-threshold schedule.

use crate::core::error::Error;
use crate::core::kv::{KvValue, KV};
use crate::core::observers::{Observer, ObserverHandle, ObserverMode, TerminalObserver};
use crate::core::oracle::Oracle;
use crate::core::problem::Problem;
use crate::core::result::SolveResult;
use crate::core::state::{SolveStatus, SqpGsState};
use crate::gradient_batch::gradient_batch;
use crate::merit::{phi_rho, q_rho};
use crate::sampler::sample_bundle;
use crate::subproblem::Subproblem;
use nalgebra::DVector;
use rand::Rng;

/// Fixed constants and sample-count defaults governing a solve. Values
/// mirror the reference implementation's defaults; override individual
/// fields through the `with_*` builder methods.
#[derive(Clone, Debug)]
pub struct SqpGsConfig {
    eta: f64,
    gamma: f64,
    beta_eps: f64,
    beta_rho: f64,
    beta_theta: f64,
    nu: f64,
    xi_s: f64,
    xi_y: f64,
    xi_sy: f64,
    iter_h: usize,
    max_iter: usize,
    armijo_max_halvings: usize,
    p0: usize,
    p_i: usize,
    p_e: usize,
    p_i_override: Option<Vec<usize>>,
    p_e_override: Option<Vec<usize>>,
    eps0: f64,
    rho0: f64,
    theta0: f64,
}

impl Default for SqpGsConfig {
    fn default() -> Self {
        SqpGsConfig {
            eta: 1e-8,
            gamma: 0.5,
            beta_eps: 0.5,
            beta_rho: 0.5,
            beta_theta: 0.8,
            nu: 10.0,
            xi_s: 1e3,
            xi_y: 1e3,
            xi_sy: 1e-6,
            iter_h: 10,
            max_iter: 100,
            armijo_max_halvings: 60,
            p0: 2,
            p_i: 3,
            p_e: 4,
            p_i_override: None,
            p_e_override: None,
            eps0: 1e-1,
            rho0: 1e-1,
            theta0: 1e-1,
        }
    }
}

impl SqpGsConfig {
    /// A fresh config with the reference implementation's defaults.
    pub fn new() -> Self {
        SqpGsConfig::default()
    }

    /// Cap the number of outer iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Override the curvature-pair window depth (`iter_H`).
    pub fn with_iter_h(mut self, iter_h: usize) -> Self {
        self.iter_h = iter_h;
        self
    }

    /// Override the cap on Armijo backtracking halvings per iteration.
    pub fn with_armijo_max_halvings(mut self, halvings: usize) -> Self {
        self.armijo_max_halvings = halvings;
        self
    }

    /// Override the per-oracle extra sample counts: `p0` for the objective,
    /// `p_i` broadcast uniformly to every inequality constraint, `p_e`
    /// broadcast uniformly to every equality constraint (not counting the
    /// center point itself). Clears any heterogeneous counts set through
    /// [`SqpGsConfig::with_constraint_sample_counts`].
    pub fn with_sample_counts(mut self, p0: usize, p_i: usize, p_e: usize) -> Self {
        self.p0 = p0;
        self.p_i = p_i;
        self.p_e = p_e;
        self.p_i_override = None;
        self.p_e_override = None;
        self
    }

    /// Override the extra sample counts per constraint, rather than
    /// broadcasting one count to every constraint of a kind. `p_i[j]` is the
    /// count for inequality constraint `j`, `p_e[l]` for equality constraint
    /// `l`; both must have the same length as the constraint lists passed to
    /// [`SqpGs::solve`], checked at solve time. Takes precedence over the
    /// uniform `p_i`/`p_e` set through [`SqpGsConfig::with_sample_counts`].
    pub fn with_constraint_sample_counts(mut self, p_i: Vec<usize>, p_e: Vec<usize>) -> Self {
        self.p_i_override = Some(p_i);
        self.p_e_override = Some(p_e);
        self
    }

    /// Override the initial sampling radius, penalty weight, and
    /// feasibility threshold.
    pub fn with_initial_scalars(mut self, eps0: f64, rho0: f64, theta0: f64) -> Self {
        self.eps0 = eps0;
        self.rho0 = rho0;
        self.theta0 = theta0;
        self
    }
}

/// The SQP-GS solver. Holds configuration and any attached observers; call
/// [`SqpGs::solve`] to run it against a problem instance.
pub struct SqpGs {
    config: SqpGsConfig,
    observers: Vec<ObserverHandle>,
}

impl Default for SqpGs {
    fn default() -> Self {
        SqpGs::new(SqpGsConfig::default())
    }
}

impl SqpGs {
    /// Build a solver from the given configuration.
    pub fn new(config: SqpGsConfig) -> Self {
        SqpGs {
            config,
            observers: Vec::new(),
        }
    }

    /// Attach an observer, notified under `mode` on every iteration of every
    /// subsequent call to [`SqpGs::solve`].
    pub fn add_observer(mut self, observer: Box<dyn Observer>, mode: ObserverMode) -> Self {
        self.observers.push(ObserverHandle::new(observer, mode));
        self
    }

    /// Run the solver on `f` subject to inequality constraints `g_ineq` and
    /// equality constraints `g_eq`, starting from `x0`, stopping once the
    /// stationarity estimate `E_k` drops to `tol` or `max_iter` is reached.
    /// If `verbose` is set, a [`TerminalObserver`] is attached for the
    /// duration of this call (in addition to any observers added via
    /// [`SqpGs::add_observer`]).
    #[allow(clippy::too_many_arguments)]
    pub fn solve<R: Rng>(
        &mut self,
        f: Box<dyn Oracle>,
        g_ineq: Vec<Box<dyn Oracle>>,
        g_eq: Vec<Box<dyn Oracle>>,
        x0: DVector<f64>,
        tol: f64,
        verbose: bool,
        rng: &mut R,
    ) -> Result<SolveResult, Error> {
        if verbose {
            self.observers.push(ObserverHandle::new(
                Box::new(TerminalObserver::new()),
                ObserverMode::Always,
            ));
        }
        let result = self.run(f, g_ineq, g_eq, x0, tol, rng);
        if verbose {
            self.observers.pop();
        }
        result
    }

    fn run<R: Rng>(
        &mut self,
        f: Box<dyn Oracle>,
        g_ineq: Vec<Box<dyn Oracle>>,
        g_eq: Vec<Box<dyn Oracle>>,
        x0: DVector<f64>,
        tol: f64,
        rng: &mut R,
    ) -> Result<SolveResult, Error> {
        let cfg = self.config.clone();
        let dim = x0.len();
        let n_i = g_ineq.len();
        let n_e = g_eq.len();

        let mut f_problem = Problem::new(f);
        let mut gi_problems: Vec<Problem<Box<dyn Oracle>>> =
            g_ineq.into_iter().map(Problem::new).collect();
        let mut ge_problems: Vec<Problem<Box<dyn Oracle>>> =
            g_eq.into_iter().map(Problem::new).collect();

        let p_i_counts: Vec<usize> = match &cfg.p_i_override {
            Some(p_i) => {
                if p_i.len() != n_i {
                    return Err(Error::DimensionMismatch {
                        expected: n_i,
                        got: p_i.len(),
                    });
                }
                p_i.clone()
            }
            None => vec![cfg.p_i; n_i],
        };
        let p_e_counts: Vec<usize> = match &cfg.p_e_override {
            Some(p_e) => {
                if p_e.len() != n_e {
                    return Err(Error::DimensionMismatch {
                        expected: n_e,
                        got: p_e.len(),
                    });
                }
                p_e.clone()
            }
            None => vec![cfg.p_e; n_e],
        };
        let mut subproblem =
            Subproblem::new(dim, cfg.p0, p_i_counts.clone(), p_e_counts.clone());

        let mut state = SqpGsState::new(x0, cfg.eps0, cfg.rho0, cfg.theta0, cfg.iter_h);
        let mut x_history = Vec::new();
        let mut snapshot = None;

        loop {
            if state.e_k <= tol {
                state.status = SolveStatus::Optimal;
                break;
            }
            if state.iter >= cfg.max_iter {
                state.status = SolveStatus::MaxIterations;
                break;
            }

            let b_f = sample_bundle(&state.x, state.eps, cfg.p0, rng);
            let mut b_g_i = Vec::with_capacity(n_i);
            for &p in p_i_counts.iter() {
                b_g_i.push(sample_bundle(&state.x, state.eps, p, rng));
            }
            let mut b_g_e = Vec::with_capacity(n_e);
            for &p in p_e_counts.iter() {
                b_g_e.push(sample_bundle(&state.x, state.eps, p, rng));
            }

            let d_f = gradient_batch(&mut f_problem, &b_f)?;
            let mut d_g_i = Vec::with_capacity(n_i);
            for (problem, bundle) in gi_problems.iter_mut().zip(b_g_i.iter()) {
                d_g_i.push(gradient_batch(problem, bundle)?);
            }
            let mut d_g_e = Vec::with_capacity(n_e);
            for (problem, bundle) in ge_problems.iter_mut().zip(b_g_e.iter()) {
                d_g_e.push(gradient_batch(problem, bundle)?);
            }

            let f_k = f_problem.cost(&state.x)?;
            let mut g_i_k_vec = Vec::with_capacity(n_i);
            for problem in gi_problems.iter_mut() {
                g_i_k_vec.push(problem.cost(&state.x)?);
            }
            let g_i_k = DVector::from_vec(g_i_k_vec);
            let mut g_e_k_vec = Vec::with_capacity(n_e);
            for problem in ge_problems.iter_mut() {
                g_e_k_vec.push(problem.cost(&state.x)?);
            }
            let g_e_k = DVector::from_vec(g_e_k_vec);

            subproblem.update(
                &state.h, state.rho, &d_f, &d_g_i, &d_g_e, f_k, &g_i_k, &g_e_k,
            );
            let sol = subproblem.solve(state.iter, state.rho, state.eps)?;

            let mut g_k = DVector::<f64>::zeros(dim);
            for i in 0..d_f.nrows() {
                g_k += sol.lambda_f[i] * d_f.row(i).transpose();
            }
            for j in 0..n_i {
                for i in 0..d_g_i[j].nrows() {
                    g_k += sol.lambda_g_i[j][i] * d_g_i[j].row(i).transpose();
                }
            }
            for l in 0..n_e {
                for i in 0..d_g_e[l].nrows() {
                    g_k += sol.lambda_g_e[l][i] * d_g_e[l].row(i).transpose();
                }
            }

            let v_k = g_i_k.iter().map(|v| v.max(0.0)).sum::<f64>()
                + g_e_k.iter().map(|v| v.abs()).sum::<f64>();
            let phi_k = state.rho * f_k + v_k;
            let model = q_rho(
                &sol.d, state.rho, f_k, &d_f, &g_i_k, &d_g_i, &g_e_k, &d_g_e, &state.h,
            );
            let delta_q = phi_k - model;
            if delta_q < -1e-5 {
                return Err(Error::InvariantViolation {
                    iteration: state.iter,
                    reason: format!("delta_q={delta_q:.3e} is negative beyond tolerance"),
                });
            }

            let mut residual = g_k.iter().map(|v| v.abs()).fold(f64::NEG_INFINITY, f64::max);
            residual = residual.max(g_i_k.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
            residual = residual.max(g_e_k.iter().map(|v| v.abs()).fold(f64::NEG_INFINITY, f64::max));
            for j in 0..n_i {
                for i in 0..b_g_i[j].nrows() {
                    let row = DVector::from_row_slice(b_g_i[j].row(i).transpose().as_slice());
                    let c = gi_problems[j].cost(&row)?;
                    residual = residual.max(sol.lambda_g_i[j][i] * c);
                }
            }
            for l in 0..n_e {
                for i in 0..b_g_e[l].nrows() {
                    let row = DVector::from_row_slice(b_g_e[l].row(i).transpose().as_slice());
                    let c = ge_problems[l].cost(&row)?;
                    residual = residual.max(sol.lambda_g_e[l][i] * c);
                }
            }
            state.e_k = state.e_k.min(residual);

            let step_taken;
            if delta_q > cfg.nu * state.eps * state.eps {
                let mut alpha = 1.0;
                let mut halvings = 0usize;
                loop {
                    let x_trial = &state.x + alpha * &sol.d;
                    let phi_trial =
                        phi_rho(&x_trial, &mut f_problem, &mut gi_problems, &mut ge_problems, state.rho)?;
                    if phi_trial <= phi_k - cfg.eta * alpha * delta_q {
                        break;
                    }
                    alpha *= cfg.gamma;
                    halvings += 1;
                    if halvings > cfg.armijo_max_halvings {
                        return Err(Error::LineSearchStalled {
                            iteration: state.iter,
                            halvings,
                        });
                    }
                }

                if let (Some(x_prev), Some(g_prev)) = (state.x_prev.clone(), state.g_prev.clone())
                {
                    let s = &state.x - &x_prev;
                    let y = &g_k - &g_prev;
                    state.push_curvature_pair(s, y, cfg.iter_h);
                    state.rebuild_hessian(cfg.xi_s, cfg.xi_y, cfg.xi_sy, state.iter)?;
                }

                state.x_prev = Some(state.x.clone());
                state.g_prev = Some(g_k.clone());
                state.x = &state.x + alpha * &sol.d;
                step_taken = true;
            } else {
                if v_k <= state.theta {
                    state.theta *= cfg.beta_theta;
                } else {
                    state.rho *= cfg.beta_rho;
                }
                state.eps *= cfg.beta_eps;
                step_taken = false;
            }

            let kv = KV::new()
                .with("iter", KvValue::Int(state.iter as i64))
                .with("f", KvValue::Float(f_k))
                .with(
                    "max_gI",
                    if n_i > 0 {
                        KvValue::Float(g_i_k.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
                    } else {
                        KvValue::None
                    },
                )
                .with("E_k", KvValue::Float(state.e_k))
                .with("step", KvValue::Bool(step_taken));
            for handle in self.observers.iter_mut() {
                handle.notify(state.iter, &kv)?;
            }

            x_history.push(state.x.clone());
            snapshot = Some(sol);
            state.iter += 1;
        }

        Ok(SolveResult {
            x: state.x,
            x_history,
            status: state.status,
            iterations: state.iter,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::oracle::{CostFunction, Differentiable, Gradient};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    struct SumSquares;
    impl CostFunction for SumSquares {
        fn dim_in(&self) -> usize {
            2
        }
        fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
            Ok(x.iter().map(|v| v * v).sum())
        }
    }
    impl Gradient for SumSquares {
        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
            Ok(2.0 * x)
        }
    }
    impl Differentiable for SumSquares {}

    #[test]
    fn unconstrained_sum_of_squares_converges_near_the_origin() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut solver = SqpGs::default();
        let x0 = DVector::from_vec(vec![3.0, -2.0]);
        let result = solver
            .solve(
                Box::new(SumSquares),
                vec![],
                vec![],
                x0,
                1e-6,
                false,
                &mut rng,
            )
            .unwrap();
        assert!(result.x.norm() < 1e-1, "x={:?}", result.x);
        assert!(matches!(
            result.status,
            SolveStatus::Optimal | SolveStatus::MaxIterations
        ));
    }

    #[test]
    fn empty_constraint_lists_produce_a_valid_result_with_empty_dual_buckets() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut solver = SqpGs::new(SqpGsConfig::default().with_max_iter(5));
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        let result = solver
            .solve(
                Box::new(SumSquares),
                Vec::<Box<dyn Oracle>>::new(),
                Vec::<Box<dyn Oracle>>::new(),
                x0,
                1e-8,
                false,
                &mut rng,
            )
            .unwrap();
        assert_eq!(result.iterations, 5);
        let snap = result.snapshot.unwrap();
        assert!(snap.lambda_g_i.is_empty());
        assert!(snap.lambda_g_e.is_empty());
    }

    #[test]
    fn x_history_has_exactly_one_row_per_completed_iteration_not_x0() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut solver = SqpGs::new(SqpGsConfig::default().with_max_iter(7));
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        let result = solver
            .solve(
                Box::new(SumSquares),
                vec![],
                vec![],
                x0,
                1e-8,
                false,
                &mut rng,
            )
            .unwrap();
        assert_eq!(result.status, SolveStatus::MaxIterations);
        assert_eq!(result.iterations, 7);
        assert_eq!(result.x_history.len(), 7);
    }

    #[test]
    fn x_history_length_matches_iterations_on_convergence_too() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut solver = SqpGs::default();
        let x0 = DVector::from_vec(vec![3.0, -2.0]);
        let result = solver
            .solve(
                Box::new(SumSquares),
                vec![],
                vec![],
                x0,
                1e-6,
                false,
                &mut rng,
            )
            .unwrap();
        assert_eq!(result.x_history.len(), result.iterations);
        assert!(result.x_history.len() <= 100);
    }

    #[test]
    fn heterogeneous_constraint_sample_counts_mismatched_with_constraint_list_is_reported() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);
        let mut solver = SqpGs::new(
            SqpGsConfig::default().with_constraint_sample_counts(vec![2, 5], vec![]),
        );
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        // Only one inequality constraint is supplied, but the override names two.
        let result = solver.solve(
            Box::new(SumSquares),
            vec![Box::new(SumSquares) as Box<dyn Oracle>],
            Vec::<Box<dyn Oracle>>::new(),
            x0,
            1e-8,
            false,
            &mut rng,
        );
        assert!(matches!(result, Err(Error::DimensionMismatch { expected: 1, got: 2 })));
    }

    #[test]
    fn heterogeneous_constraint_sample_counts_drive_per_constraint_dual_lengths() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut solver = SqpGs::new(
            SqpGsConfig::default()
                .with_max_iter(1)
                .with_constraint_sample_counts(vec![2, 5], vec![]),
        );
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        let result = solver
            .solve(
                Box::new(SumSquares),
                vec![
                    Box::new(SumSquares) as Box<dyn Oracle>,
                    Box::new(SumSquares) as Box<dyn Oracle>,
                ],
                Vec::<Box<dyn Oracle>>::new(),
                x0,
                1e-8,
                false,
                &mut rng,
            )
            .unwrap();
        let snap = result.snapshot.unwrap();
        assert_eq!(snap.lambda_g_i[0].len(), 3); // p_i[0]+1
        assert_eq!(snap.lambda_g_i[1].len(), 6); // p_i[1]+1
    }

    #[test]
    fn dimension_mismatch_between_oracle_and_x0_is_reported_not_panicked() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut solver = SqpGs::default();
        let x0 = DVector::from_vec(vec![1.0]);
        let result = solver.solve(
            Box::new(SumSquares),
            Vec::<Box<dyn Oracle>>::new(),
            Vec::<Box<dyn Oracle>>::new(),
            x0,
            1e-8,
            false,
            &mut rng,
        );
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
