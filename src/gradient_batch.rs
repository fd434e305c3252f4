// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Evaluates an oracle's gradient at every row of a sample matrix.

use crate::core::error::Error;
use crate::core::oracle::Oracle;
use crate::core::problem::Problem;
use nalgebra::{DMatrix, DVector};

/// For an oracle and a sample matrix `x` of shape `(n, dim)`, return the `(n,
/// dim)` matrix whose `i`-th row is the oracle's gradient at row `i` of `x`.
/// Each call goes through `problem` so it is counted. If the oracle reports
/// non-differentiability at a row, its own subgradient choice (whatever
/// `gradient` returns) is accepted without modification.
pub fn gradient_batch<O: Oracle>(
    problem: &mut Problem<O>,
    samples: &DMatrix<f64>,
) -> Result<DMatrix<f64>, Error> {
    let n = samples.nrows();
    let dim = samples.ncols();
    let mut out = DMatrix::zeros(n, dim);
    for i in 0..n {
        let row = DVector::from_row_slice(samples.row(i).transpose().as_slice());
        let g = problem.gradient(&row)?;
        out.view_mut((i, 0), (1, dim))
            .copy_from(&g.transpose());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::oracle::{CostFunction, Differentiable, Gradient};

    struct AbsX0;
    impl CostFunction for AbsX0 {
        fn dim_in(&self) -> usize {
            1
        }
        fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
            Ok(x[0].abs())
        }
    }
    impl Gradient for AbsX0 {
        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
            Ok(DVector::from_vec(vec![x[0].signum()]))
        }
    }
    impl Differentiable for AbsX0 {
        fn differentiable(&self, x: &DVector<f64>) -> bool {
            x[0] != 0.0
        }
    }

    #[test]
    fn batches_gradients_row_by_row() {
        let mut p = Problem::new(AbsX0);
        let samples = DMatrix::from_row_slice(3, 1, &[-2.0, 0.0, 3.0]);
        let grads = gradient_batch(&mut p, &samples).unwrap();
        assert_eq!(grads[(0, 0)], -1.0);
        assert_eq!(grads[(2, 0)], 1.0);
        assert_eq!(p.gradient_count(), 3);
    }

    #[test]
    fn accepts_oracle_subgradient_choice_at_kink() {
        let mut p = Problem::new(AbsX0);
        let samples = DMatrix::from_row_slice(1, 1, &[0.0]);
        let grads = gradient_batch(&mut p, &samples).unwrap();
        // AbsX0's own choice at the kink is 0.0 (signum(0) == 0.0); the
        // batch layer must not second-guess it.
        assert_eq!(grads[(0, 0)], 0.0);
    }
}
