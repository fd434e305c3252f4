// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The oracle contract.
//!
//! An oracle is anything that can be evaluated and differentiated at a point
//! in `R^dim_in`: the objective and every inequality/equality constraint are
//! oracles. Rather than one monolithic interface, the capability is split
//! into [`CostFunction`] and [`Gradient`], the same way this codebase keeps
//! `CostFunction`/`Gradient`/`Hessian` as independently implementable traits.
//! Both are object-safe so heterogeneous constraint lists can be stored as
//! `Box<dyn Oracle>`.

use crate::core::error::Error;
use nalgebra::DVector;

/// Declares an input dimension and a scalar-valued evaluation at a point.
pub trait CostFunction {
    /// The dimension of the input this oracle expects.
    fn dim_in(&self) -> usize;

    /// Evaluate the oracle at `x`.
    ///
    /// Implementations should return [`Error::DimensionMismatch`] if
    /// `x.len() != self.dim_in()`.
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error>;
}

/// Computes a (sub)gradient at a point.
pub trait Gradient {
    /// Compute a Clarke subgradient of the oracle at `x`. Any valid
    /// subgradient is acceptable at nondifferentiable points.
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error>;
}

/// Informational differentiability predicate. The solver never branches on
/// this; it exists purely so an oracle can report the fact if it is cheap to
/// determine.
pub trait Differentiable {
    /// Whether the oracle is differentiable at `x`. Defaults to `true`.
    fn differentiable(&self, _x: &DVector<f64>) -> bool {
        true
    }
}

/// The full oracle capability set: cost, gradient, and (optionally)
/// differentiability. Blanket-implemented for anything that implements the
/// three parts, so callers only ever need to name `Oracle`.
pub trait Oracle: CostFunction + Gradient + Differentiable {}

impl<T: CostFunction + Gradient + Differentiable + ?Sized> Oracle for T {}

/// `Box<dyn Oracle>` delegates to the boxed oracle so it can itself be used
/// wherever an `Oracle` is expected (e.g. stored in a `Problem`).
impl CostFunction for Box<dyn Oracle> {
    fn dim_in(&self) -> usize {
        (**self).dim_in()
    }

    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        (**self).cost(x)
    }
}

impl Gradient for Box<dyn Oracle> {
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        (**self).gradient(x)
    }
}

impl Differentiable for Box<dyn Oracle> {
    fn differentiable(&self, x: &DVector<f64>) -> bool {
        (**self).differentiable(x)
    }
}

/// Verify `x.len()` matches `dim_in`, returning a [`Error::DimensionMismatch`]
/// otherwise. Shared by `Problem::cost`/`Problem::gradient` so every oracle
/// gets the fail-fast dimension check for free.
pub(crate) fn check_dim(dim_in: usize, x: &DVector<f64>) -> Result<(), Error> {
    if x.len() != dim_in {
        return Err(Error::DimensionMismatch {
            expected: dim_in,
            got: x.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square;

    impl CostFunction for Square {
        fn dim_in(&self) -> usize {
            1
        }

        fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
            check_dim(self.dim_in(), x)?;
            Ok(x[0] * x[0])
        }
    }

    impl Gradient for Square {
        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
            check_dim(self.dim_in(), x)?;
            Ok(DVector::from_vec(vec![2.0 * x[0]]))
        }
    }

    impl Differentiable for Square {}

    #[test]
    fn blanket_oracle_impl_covers_cost_and_gradient() {
        let s = Square;
        let x = DVector::from_vec(vec![3.0]);
        assert_eq!(s.cost(&x).unwrap(), 9.0);
        assert_eq!(s.gradient(&x).unwrap()[0], 6.0);
        assert!(s.differentiable(&x));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let s = Square;
        let bad = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(
            s.cost(&bad),
            Err(Error::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn boxed_oracle_delegates() {
        let boxed: Box<dyn Oracle> = Box::new(Square);
        let x = DVector::from_vec(vec![4.0]);
        assert_eq!(boxed.cost(&x).unwrap(), 16.0);
        assert_eq!(boxed.gradient(&x).unwrap()[0], 8.0);
    }
}
