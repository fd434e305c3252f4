// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The mutable bookkeeping a solve carries between iterations, the
//! counterpart of this codebase's `IterState` specialized to SQP-GS.

use crate::core::error::Error;
use approx::relative_eq;
use nalgebra::{DMatrix, DVector};
use std::collections::VecDeque;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Outcome of a solve, or the in-progress marker while iterating.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// Still iterating; `E_k` has not yet dropped to `tol`.
    NotOptimal,
    /// `E_k <= tol`: a stationary point (in the gradient-sampling sense) was
    /// found.
    Optimal,
    /// `max_iter` was reached before `E_k <= tol`.
    MaxIterations,
}

/// The iterate state threaded through the SQP-GS driver loop.
pub struct SqpGsState {
    /// Current iterate.
    pub x: DVector<f64>,
    /// Previous iterate, absent before the first accepted step.
    pub x_prev: Option<DVector<f64>>,
    /// Previous aggregated subgradient, absent before the first accepted
    /// step.
    pub g_prev: Option<DVector<f64>>,
    /// Current BFGS Hessian approximation, always symmetric.
    pub h: DMatrix<f64>,
    /// Curvature pair history, most recent at the front, capped at `iter_H`.
    pub s_hist: VecDeque<DVector<f64>>,
    /// Curvature pair history (the `y` side), parallel to `s_hist`.
    pub y_hist: VecDeque<DVector<f64>>,
    /// Current sampling radius. Monotone nonincreasing.
    pub eps: f64,
    /// Current penalty weight. Monotone nonincreasing.
    pub rho: f64,
    /// Current feasibility threshold. Monotone nonincreasing.
    pub theta: f64,
    /// Current stationarity residual estimate. Monotone nonincreasing,
    /// initialized to `+inf`.
    pub e_k: f64,
    /// Current solve status.
    pub status: SolveStatus,
    /// Number of completed iterations.
    pub iter: usize,
}

impl SqpGsState {
    /// Build the initial state for a solve starting at `x0`.
    pub fn new(x0: DVector<f64>, eps0: f64, rho0: f64, theta0: f64, iter_h: usize) -> Self {
        let dim = x0.len();
        SqpGsState {
            x: x0,
            x_prev: None,
            g_prev: None,
            h: DMatrix::identity(dim, dim),
            s_hist: VecDeque::with_capacity(iter_h),
            y_hist: VecDeque::with_capacity(iter_h),
            eps: eps0,
            rho: rho0,
            theta: theta0,
            e_k: f64::INFINITY,
            status: SolveStatus::NotOptimal,
            iter: 0,
        }
    }

    /// Push a new curvature pair to the front of the FIFO windows, evicting
    /// the oldest entry once the window is at capacity `iter_h`.
    pub fn push_curvature_pair(&mut self, s: DVector<f64>, y: DVector<f64>, iter_h: usize) {
        self.s_hist.push_front(s);
        self.y_hist.push_front(y);
        while self.s_hist.len() > iter_h {
            self.s_hist.pop_back();
            self.y_hist.pop_back();
        }
    }

    /// Rebuild `H` from identity, applying every accepted curvature pair in
    /// the window from most-recent to oldest (front to back of the
    /// `VecDeque`), matching the order the reference implementation's ring
    /// buffer produces.
    ///
    /// A pair `(s_l, y_l)` is accepted iff `||s_l|| <= xi_s*eps`,
    /// `||y_l|| <= xi_y*eps`, and `s_l . y_l >= xi_sy*eps^2`. Accepted pairs
    /// apply the BFGS rank-two update. Asserts symmetry of the result within
    /// 1e-8.
    pub fn rebuild_hessian(
        &mut self,
        xi_s: f64,
        xi_y: f64,
        xi_sy: f64,
        iteration: usize,
    ) -> Result<(), Error> {
        let dim = self.x.len();
        let mut h = DMatrix::<f64>::identity(dim, dim);
        let eps = self.eps;

        for (s_l, y_l) in self.s_hist.iter().zip(self.y_hist.iter()) {
            let s_norm = s_l.norm();
            let y_norm = y_l.norm();
            let sy = s_l.dot(y_l);
            let accepted = s_norm <= xi_s * eps && y_norm <= xi_y * eps && sy >= xi_sy * eps * eps;
            if !accepted {
                continue;
            }
            let hs = &h * s_l;
            let shs = s_l.dot(&hs) + 1e-16;
            let ys = y_l.dot(s_l) + 1e-16;
            h = h - (&hs * hs.transpose()) / shs + (y_l * y_l.transpose()) / ys;
        }

        if !relative_eq!(h, h.transpose(), epsilon = 1e-8, max_relative = 1e-8) {
            let asymmetry = (&h - h.transpose()).abs().max();
            return Err(Error::InvariantViolation {
                iteration,
                reason: format!("Hessian asymmetry {asymmetry:.3e} exceeds 1e-8"),
            });
        }

        self.h = h;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(dim: usize) -> SqpGsState {
        SqpGsState::new(DVector::zeros(dim), 0.1, 0.1, 0.1, 10)
    }

    #[test]
    fn starts_at_identity_with_infinite_residual() {
        let st = state(3);
        assert_eq!(st.h, DMatrix::identity(3, 3));
        assert!(st.e_k.is_infinite());
        assert_eq!(st.status, SolveStatus::NotOptimal);
    }

    #[test]
    fn curvature_window_evicts_oldest_beyond_capacity() {
        let mut st = state(2);
        for i in 0..15 {
            let v = DVector::from_vec(vec![i as f64, 0.0]);
            st.push_curvature_pair(v.clone(), v, 10);
        }
        assert_eq!(st.s_hist.len(), 10);
        assert_eq!(st.s_hist.front().unwrap()[0], 14.0);
        assert_eq!(st.s_hist.back().unwrap()[0], 5.0);
    }

    #[test]
    fn rebuild_with_no_history_is_identity() {
        let mut st = state(2);
        st.rebuild_hessian(1e3, 1e3, 1e-6, 0).unwrap();
        assert_eq!(st.h, DMatrix::identity(2, 2));
    }

    #[test]
    fn rebuild_rejects_pairs_outside_eps_scaled_norms() {
        let mut st = state(2);
        st.eps = 1e-8;
        st.push_curvature_pair(
            DVector::from_vec(vec![10.0, 0.0]),
            DVector::from_vec(vec![10.0, 0.0]),
            10,
        );
        st.rebuild_hessian(1e3, 1e3, 1e-6, 0).unwrap();
        assert_eq!(st.h, DMatrix::identity(2, 2));
    }

    #[test]
    fn rebuild_stays_symmetric_after_accepted_pair() {
        let mut st = state(2);
        st.push_curvature_pair(
            DVector::from_vec(vec![1.0, 0.2]),
            DVector::from_vec(vec![0.9, 0.3]),
            10,
        );
        st.rebuild_hessian(1e3, 1e3, 1e-6, 0).unwrap();
        let asym = (&st.h - st.h.transpose()).abs().max();
        assert!(asym <= 1e-8);
    }
}
