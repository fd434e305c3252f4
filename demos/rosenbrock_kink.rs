// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A Rosenbrock-flavored objective with a nonsmooth kink, subject to one
//! max-type inequality constraint. Demonstrates that the sampled gradient
//! cloud, not the objective's own choice of subgradient, is what lets the
//! solver pass through the kink without stalling.
//!
//! `f(x) = 8|x0^2 - x1| + (1 - x0)^2`, `g(x) = max(sqrt(2) x0, 2 x1) - 1 <= 0`.
//! Accepted optima cluster near `(0.7071, 0.5)`.

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use sqpgs::core::{CostFunction, Differentiable, Error, Gradient, LogObserver, ObserverMode, Oracle};
use sqpgs::solver::SqpGs;

struct KinkedRosenbrock;

impl CostFunction for KinkedRosenbrock {
    fn dim_in(&self) -> usize {
        2
    }
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        let u = x[0] * x[0] - x[1];
        Ok(8.0 * u.abs() + (1.0 - x[0]).powi(2))
    }
}

impl Gradient for KinkedRosenbrock {
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        let u = x[0] * x[0] - x[1];
        let sign = u.signum();
        let d0 = 8.0 * sign * 2.0 * x[0] - 2.0 * (1.0 - x[0]);
        let d1 = -8.0 * sign;
        Ok(DVector::from_vec(vec![d0, d1]))
    }
}

impl Differentiable for KinkedRosenbrock {
    fn differentiable(&self, x: &DVector<f64>) -> bool {
        x[0] * x[0] != x[1]
    }
}

struct MaxConstraint;

impl CostFunction for MaxConstraint {
    fn dim_in(&self) -> usize {
        2
    }
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        Ok((2f64.sqrt() * x[0]).max(2.0 * x[1]) - 1.0)
    }
}

impl Gradient for MaxConstraint {
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        if 2f64.sqrt() * x[0] >= 2.0 * x[1] {
            Ok(DVector::from_vec(vec![2f64.sqrt(), 0.0]))
        } else {
            Ok(DVector::from_vec(vec![0.0, 2.0]))
        }
    }
}

impl Differentiable for MaxConstraint {
    fn differentiable(&self, x: &DVector<f64>) -> bool {
        2f64.sqrt() * x[0] != 2.0 * x[1]
    }
}

fn main() {
    env_logger::init();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(20260730);
    let x0 = DVector::from_vec(vec![
        rng.gen_range(-2.0..2.0),
        rng.gen_range(-2.0..2.0),
    ]);

    let mut solver =
        SqpGs::default().add_observer(Box::new(LogObserver::new()), ObserverMode::Every(10));
    let result = solver
        .solve(
            Box::new(KinkedRosenbrock) as Box<dyn Oracle>,
            vec![Box::new(MaxConstraint) as Box<dyn Oracle>],
            vec![],
            x0,
            1e-8,
            true,
            &mut rng,
        )
        .expect("solve should not fail on this well-conditioned scenario");

    println!("{result}");
}
