// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The crate-wide error type.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. There is
//! deliberately no variant for "maximum iterations reached": that is a normal,
//! typed outcome (`crate::core::state::SolveStatus::MaxIterations`) rather than
//! a failure.

use thiserror::Error as ThisError;

/// Errors produced while constructing or running a solve.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An oracle was called with a vector whose length does not match its
    /// declared `dim_in`.
    #[error("oracle dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The oracle's declared input dimension.
        expected: usize,
        /// The length of the vector it was actually called with.
        got: usize,
    },

    /// The QP back-end could not produce a usable solution.
    #[error(
        "QP solver failure at iteration {iteration} (rho={rho:.3e}, eps={eps:.3e}): {reason}"
    )]
    QpSolverFailure {
        /// The outer iteration during which the QP was solved.
        iteration: usize,
        /// The current penalty weight.
        rho: f64,
        /// The current sampling radius.
        eps: f64,
        /// Back-end provided status or diagnostic text.
        reason: String,
    },

    /// One of the algorithm's numerical invariants was violated.
    #[error("invariant violated at iteration {iteration}: {reason}")]
    InvariantViolation {
        /// The outer iteration during which the check failed.
        iteration: usize,
        /// Which invariant failed and by how much.
        reason: String,
    },

    /// The Armijo backtracking loop did not find an accepted step size
    /// within the configured safety cap.
    #[error("Armijo line search stalled after {halvings} halvings at iteration {iteration}")]
    LineSearchStalled {
        /// The outer iteration during which the stall occurred.
        iteration: usize,
        /// The number of halvings attempted before giving up.
        halvings: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message_mentions_both_sizes() {
        let e = Error::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        let msg = format!("{e}");
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }
}
