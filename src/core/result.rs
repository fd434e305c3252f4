// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `SolveResult`, returned by the driver's `solve` method and consisting of
//! the final iterate, its full history, and the status the solve stopped
//! under. The counterpart of this codebase's `OptimizationResult`, adapted
//! from the generic operator+state pair to this crate's single concrete
//! solver.

use crate::core::state::SolveStatus;
use crate::subproblem::SubproblemSolution;
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Everything a caller needs from a finished solve.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct SolveResult {
    /// The final iterate.
    pub x: DVector<f64>,
    /// Every iterate visited, in order, starting with `x0`.
    pub x_history: Vec<DVector<f64>>,
    /// Why the solve stopped.
    pub status: SolveStatus,
    /// Number of completed outer iterations.
    pub iterations: usize,
    /// The last subproblem solve, kept for diagnostics (direction, duals,
    /// QP objective value at the point the solve stopped). `None` only if
    /// the solve terminated before a single subproblem was built.
    #[cfg_attr(feature = "serde1", serde(skip))]
    pub snapshot: Option<SubproblemSolution>,
}

impl SolveResult {
    /// The final iterate.
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// The full sequence of iterates visited.
    pub fn x_history(&self) -> &[DVector<f64>] {
        &self.x_history
    }
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SolveResult:")?;
        writeln!(f, "    x (final):     {:?}", self.x.as_slice())?;
        writeln!(f, "    status:        {:?}", self.status)?;
        writeln!(f, "    iterations:    {}", self.iterations)?;
        writeln!(
            f,
            "    last QP obj:   {}",
            if let Some(snap) = &self.snapshot {
                format!("{:.6e}", snap.objective)
            } else {
                String::from("none")
            }
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_status_and_iteration_count() {
        let res = SolveResult {
            x: DVector::from_vec(vec![1.0, 2.0]),
            x_history: vec![DVector::zeros(2), DVector::from_vec(vec![1.0, 2.0])],
            status: SolveStatus::Optimal,
            iterations: 7,
            snapshot: None,
        };
        let text = format!("{res}");
        assert!(text.contains("Optimal"));
        assert!(text.contains('7'));
    }

    #[test]
    fn accessors_return_the_stored_fields() {
        let res = SolveResult {
            x: DVector::from_vec(vec![0.5]),
            x_history: vec![DVector::from_vec(vec![0.5])],
            status: SolveStatus::MaxIterations,
            iterations: 100,
            snapshot: None,
        };
        assert_eq!(res.x()[0], 0.5);
        assert_eq!(res.x_history().len(), 1);
    }
}
