// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A single equality constraint pinning the objective to the unit circle.
//!
//! `f(x) = x0`, `h(x) = x0^2 + x1^2 - 1 = 0`. The unique minimizer is
//! `(-1, 0)`.

use nalgebra::DVector;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use sqpgs::core::{CostFunction, Differentiable, Error, Gradient, LogObserver, ObserverMode, Oracle};
use sqpgs::solver::SqpGs;

struct LinearObjective;

impl CostFunction for LinearObjective {
    fn dim_in(&self) -> usize {
        2
    }
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        Ok(x[0])
    }
}

impl Gradient for LinearObjective {
    fn gradient(&self, _x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        Ok(DVector::from_vec(vec![1.0, 0.0]))
    }
}

impl Differentiable for LinearObjective {}

struct UnitCircle;

impl CostFunction for UnitCircle {
    fn dim_in(&self) -> usize {
        2
    }
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        Ok(x[0] * x[0] + x[1] * x[1] - 1.0)
    }
}

impl Gradient for UnitCircle {
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        Ok(DVector::from_vec(vec![2.0 * x[0], 2.0 * x[1]]))
    }
}

impl Differentiable for UnitCircle {}

fn main() {
    env_logger::init();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(31);
    let x0 = DVector::from_vec(vec![0.8, 0.6]);

    let mut solver =
        SqpGs::default().add_observer(Box::new(LogObserver::new()), ObserverMode::Every(10));
    let result = solver
        .solve(
            Box::new(LinearObjective) as Box<dyn Oracle>,
            vec![],
            vec![Box::new(UnitCircle) as Box<dyn Oracle>],
            x0,
            1e-8,
            true,
            &mut rng,
        )
        .expect("solve should not fail on this well-conditioned scenario");

    println!("{result}");
}
