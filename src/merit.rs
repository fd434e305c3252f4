// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The L1 exact-penalty merit function and the subproblem's quadratic model
//! of it.

use crate::core::error::Error;
use crate::core::oracle::Oracle;
use crate::core::problem::Problem;
use nalgebra::{DMatrix, DVector};

/// `phi_rho(x) = rho*f(x) + sum_j max(g_j(x), 0) + sum_l |h_l(x)|`.
pub fn phi_rho<F: Oracle, G: Oracle, H: Oracle>(
    x: &DVector<f64>,
    f: &mut Problem<F>,
    g_ineq: &mut [Problem<G>],
    g_eq: &mut [Problem<H>],
    rho: f64,
) -> Result<f64, Error> {
    let mut total = rho * f.cost(x)?;
    for g in g_ineq.iter_mut() {
        total += g.cost(x)?.max(0.0);
    }
    for h in g_eq.iter_mut() {
        total += h.cost(x)?.abs();
    }
    Ok(total)
}

/// The subproblem's convex model of `phi_rho` at `x_k + d`, given the
/// current linearizations. Expressed as three independent terms (objective,
/// inequality, equality) rather than folding the equality term into the
/// inequality accumulator.
#[allow(clippy::too_many_arguments)]
pub fn q_rho(
    d: &DVector<f64>,
    rho: f64,
    f_k: f64,
    d_f: &DMatrix<f64>,
    g_i_k: &DVector<f64>,
    d_g_i: &[DMatrix<f64>],
    g_e_k: &DVector<f64>,
    d_g_e: &[DMatrix<f64>],
    h: &DMatrix<f64>,
) -> f64 {
    let term_f = rho * (f_k + row_max(d_f, d));

    let term_i: f64 = (0..d_g_i.len())
        .map(|j| row_max_nonneg(&d_g_i[j], d, g_i_k[j]))
        .sum();

    let term_e: f64 = (0..d_g_e.len())
        .map(|l| row_max_abs(&d_g_e[l], d, g_e_k[l]))
        .sum();

    let term_quad = 0.5 * d.dot(&(h * d));

    term_f + term_i + term_e + term_quad
}

fn row_max(mat: &DMatrix<f64>, d: &DVector<f64>) -> f64 {
    mat.row_iter()
        .map(|row| row.transpose().dot(d))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn row_max_nonneg(mat: &DMatrix<f64>, d: &DVector<f64>, offset: f64) -> f64 {
    mat.row_iter()
        .map(|row| (offset + row.transpose().dot(d)).max(0.0))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn row_max_abs(mat: &DMatrix<f64>, d: &DVector<f64>, offset: f64) -> f64 {
    mat.row_iter()
        .map(|row| (offset + row.transpose().dot(d)).abs())
        .fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::oracle::{CostFunction, Differentiable, Gradient};

    struct Quadratic;
    impl CostFunction for Quadratic {
        fn dim_in(&self) -> usize {
            1
        }
        fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
            Ok(x[0] * x[0])
        }
    }
    impl Gradient for Quadratic {
        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
            Ok(DVector::from_vec(vec![2.0 * x[0]]))
        }
    }
    impl Differentiable for Quadratic {}

    #[test]
    fn phi_rho_with_no_constraints_is_just_rho_times_f() {
        let mut f = Problem::new(Quadratic);
        let mut gi: Vec<Problem<Quadratic>> = vec![];
        let mut ge: Vec<Problem<Quadratic>> = vec![];
        let x = DVector::from_vec(vec![3.0]);
        let v = phi_rho(&x, &mut f, &mut gi, &mut ge, 0.5).unwrap();
        assert!((v - 4.5).abs() < 1e-12);
    }

    #[test]
    fn q_rho_reduces_to_quadratic_term_with_zero_gradients() {
        let d = DVector::from_vec(vec![1.0, -1.0]);
        let h = DMatrix::identity(2, 2);
        let d_f = DMatrix::zeros(1, 2);
        let v = q_rho(&d, 1.0, 0.0, &d_f, &DVector::zeros(0), &[], &DVector::zeros(0), &[], &h);
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn row_max_abs_handles_sign_change_across_samples() {
        let d = DVector::from_vec(vec![1.0]);
        let mat = DMatrix::from_row_slice(2, 1, &[1.0, -1.0]);
        // offset 0: rows give |0+1*1|=1 and |0-1*1|=1, max is 1
        assert!((row_max_abs(&mat, &d, 0.0) - 1.0).abs() < 1e-12);
    }
}
