// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Wraps an [`Oracle`] and transparently counts calls to it, the same
//! bookkeeping role `Problem<O>` plays in this codebase around a raw
//! operator.

use crate::core::error::Error;
use crate::core::oracle::{check_dim, CostFunction, Differentiable, Gradient, Oracle};
use nalgebra::DVector;

/// An oracle plus call counters.
pub struct Problem<O> {
    oracle: O,
    cost_count: u64,
    gradient_count: u64,
}

impl<O: Oracle> Problem<O> {
    /// Wrap an oracle for counted access.
    pub fn new(oracle: O) -> Self {
        Problem {
            oracle,
            cost_count: 0,
            gradient_count: 0,
        }
    }

    /// The wrapped oracle's declared input dimension.
    pub fn dim_in(&self) -> usize {
        self.oracle.dim_in()
    }

    /// Evaluate the cost function, checking dimensions and incrementing the
    /// call counter.
    pub fn cost(&mut self, x: &DVector<f64>) -> Result<f64, Error> {
        check_dim(self.oracle.dim_in(), x)?;
        self.cost_count += 1;
        self.oracle.cost(x)
    }

    /// Evaluate the gradient, checking dimensions and incrementing the call
    /// counter.
    pub fn gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        check_dim(self.oracle.dim_in(), x)?;
        self.gradient_count += 1;
        self.oracle.gradient(x)
    }

    /// Whether the oracle reports itself differentiable at `x`. Not counted:
    /// this is informational only.
    pub fn differentiable(&self, x: &DVector<f64>) -> bool {
        self.oracle.differentiable(x)
    }

    /// Number of times `cost` has been called.
    pub fn cost_count(&self) -> u64 {
        self.cost_count
    }

    /// Number of times `gradient` has been called.
    pub fn gradient_count(&self) -> u64 {
        self.gradient_count
    }

    /// Consume the wrapper, returning the underlying oracle.
    pub fn into_inner(self) -> O {
        self.oracle
    }
}
