// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `sqpgs` solves constrained nonsmooth nonconvex optimization problems
//!
//! ```text
//! minimize    f(x)
//! subject to  g_j(x) <= 0   for j = 1..nI
//!             h_l(x)  = 0   for l = 1..nE
//! ```
//!
//! where `f`, `g_j`, `h_l` are locally Lipschitz over `R^dim` and may fail to
//! be differentiable on measure-zero sets (pointwise maxima, absolute
//! values, ReLU-style kinks). The algorithm is Sequential Quadratic
//! Programming with Gradient Sampling (SQP-GS): at each iterate it samples
//! gradients at the current point and at a small random cloud around it,
//! assembles a convex quadratic subproblem whose solution is a descent
//! direction for an L1 exact-penalty merit function, and advances with an
//! Armijo line search and a BFGS Hessian approximation built from the
//! sampled subgradients.
//!
//! # Defining a problem
//!
//! A problem is defined by implementing [`core::CostFunction`] and
//! [`core::Gradient`] for the objective and for each constraint. Both are
//! object-safe, so heterogeneous constraint lists can be stored as
//! `Box<dyn core::Oracle>`.
//!
//! ```
//! use nalgebra::DVector;
//! use sqpgs::core::{CostFunction, Differentiable, Error, Gradient};
//!
//! struct SumOfSquares;
//!
//! impl CostFunction for SumOfSquares {
//!     fn dim_in(&self) -> usize {
//!         2
//!     }
//!     fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
//!         Ok(x.iter().map(|v| v * v).sum())
//!     }
//! }
//!
//! impl Gradient for SumOfSquares {
//!     fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
//!         Ok(2.0 * x)
//!     }
//! }
//!
//! impl Differentiable for SumOfSquares {}
//! ```
//!
//! # Running the solver
//!
//! ```
//! use nalgebra::DVector;
//! use rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256PlusPlus;
//! use sqpgs::core::{CostFunction, Differentiable, Error, Gradient, Oracle};
//! use sqpgs::solver::SqpGs;
//! # struct SumOfSquares;
//! # impl CostFunction for SumOfSquares {
//! #     fn dim_in(&self) -> usize { 2 }
//! #     fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> { Ok(x.iter().map(|v| v * v).sum()) }
//! # }
//! # impl Gradient for SumOfSquares {
//! #     fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> { Ok(2.0 * x) }
//! # }
//! # impl Differentiable for SumOfSquares {}
//!
//! # fn run() -> Result<(), Error> {
//! let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
//! let mut solver = SqpGs::default();
//! let x0 = DVector::from_vec(vec![3.0, -2.0]);
//!
//! let result = solver.solve(
//!     Box::new(SumOfSquares) as Box<dyn Oracle>,
//!     vec![],
//!     vec![],
//!     x0,
//!     1e-8,
//!     false,
//!     &mut rng,
//! )?;
//!
//! println!("{result}");
//! #     Ok(())
//! # }
//! #
//! # fn main() {
//! #     if let Err(ref e) = run() {
//! #         println!("{e}");
//! #         std::process::exit(1);
//! #     }
//! # }
//! ```
//!
//! # Features
//!
//! - `serde1`: derives `Serialize`/`Deserialize` on [`core::SolveResult`] and
//!   related types for callers that want to persist a solve's outcome. The
//!   crate itself never reads or writes to disk.
//!
//! # License
//!
//! Licensed under either of
//!
//!   * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or
//!     <http://www.apache.org/licenses/LICENSE-2.0>)
//!   * MIT License ([LICENSE-MIT](LICENSE-MIT) or
//!     <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![deny(clippy::float_cmp)]

/// Core abstractions: oracles, the counted problem wrapper, iterate state,
/// errors, observers, and the solve result.
pub mod core;

/// Evaluates an oracle's gradient across a whole sample matrix at once.
pub mod gradient_batch;

/// The L1 exact-penalty merit function and the subproblem's quadratic model.
pub mod merit;

/// Draws points uniformly from an eps-ball around a center.
pub mod sampler;

/// The SQP-GS driver.
pub mod solver;

/// The per-iteration convex QP subproblem.
pub mod subproblem;
