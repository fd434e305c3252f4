// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-iteration convex QP subproblem: static sparsity layout, dynamic
//! refresh, and dual-multiplier recovery.
//!
//! Primal layout is `y = (d, z, rI, rE)` with sizes `(dim, 1, nI, nE)`. The
//! inequality block `G y <= h` is the vertical concatenation of:
//!
//! 1. `p0+1` rows tying `z` to the objective's linearized epigraph,
//! 2. `sum(1+pI[j])` rows tying each `rI_j` to its inequality constraint,
//! 3/4. two mirrored `sum(1+pE[l])`-row blocks tying each `rE_l` to the
//!    absolute value of its equality constraint,
//! 5. a nonnegativity block `-rI <= 0`, `-rE <= 0`.
//!
//! The back-end is `clarabel`, a pure-Rust conic interior-point solver: `G y
//! <= h` is handed to it as `G y + s = h, s in K+` (the nonnegative
//! orthant), whose dual variables come back in the same row order as `G`.

use crate::core::error::Error;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::{DMatrix, DVector};

/// Diagonal regularization added to the `z`/`rI`/`rE` block of `P` so the
/// back-end always sees a matrix it can treat as positive semidefinite, per
/// the back-end requirement that `P` may be singular in those coordinates.
const P_REGULARIZATION: f64 = 1e-9;

/// The solution of one QP subproblem solve, sliced per the layout above.
#[derive(Clone, Debug)]
pub struct SubproblemSolution {
    /// Search direction `d`.
    pub d: DVector<f64>,
    /// Epigraph helper variable for the objective.
    pub z: f64,
    /// Epigraph helper variables, one per inequality constraint.
    pub r_i: DVector<f64>,
    /// Epigraph helper variables, one per equality constraint.
    pub r_e: DVector<f64>,
    /// Dual multipliers for the objective's sample rows, length `p0+1`.
    pub lambda_f: DVector<f64>,
    /// Dual multipliers per inequality constraint, `lambda_gI[j]` has length
    /// `pI[j]+1`.
    pub lambda_g_i: Vec<DVector<f64>>,
    /// Signed dual multipliers per equality constraint (`pos - neg`),
    /// `lambda_gE[l]` has length `pE[l]+1`.
    pub lambda_g_e: Vec<DVector<f64>>,
    /// The QP objective value at the optimum.
    pub objective: f64,
}

struct Layout {
    dim: usize,
    n_i: usize,
    n_e: usize,
    p0: usize,
    p_i: Vec<usize>,
    p_e: Vec<usize>,
    off_f: usize,
    off_g_i: Vec<usize>,
    off_g_e_pos: Vec<usize>,
    off_g_e_neg: Vec<usize>,
    off_nonneg: usize,
    total_rows: usize,
    qp_dim: usize,
}

impl Layout {
    fn new(dim: usize, p0: usize, p_i: Vec<usize>, p_e: Vec<usize>) -> Self {
        let n_i = p_i.len();
        let n_e = p_e.len();
        let size_i: usize = p_i.iter().map(|p| p + 1).sum();
        let size_e: usize = p_e.iter().map(|p| p + 1).sum();

        let off_f = 0;
        let mut off_g_i = Vec::with_capacity(n_i);
        let mut cursor = off_f + p0 + 1;
        for &p in &p_i {
            off_g_i.push(cursor);
            cursor += p + 1;
        }
        let off_after_i = cursor;
        let mut off_g_e_pos = Vec::with_capacity(n_e);
        for &p in &p_e {
            off_g_e_pos.push(cursor);
            cursor += p + 1;
        }
        let off_after_e_pos = cursor;
        let mut off_g_e_neg = Vec::with_capacity(n_e);
        cursor = off_after_e_pos;
        for &p in &p_e {
            off_g_e_neg.push(cursor);
            cursor += p + 1;
        }
        let off_nonneg = cursor;
        let total_rows = off_nonneg + n_i + n_e;
        let qp_dim = dim + 1 + n_i + n_e;

        debug_assert_eq!(off_after_i, off_f + p0 + 1 + size_i);
        debug_assert_eq!(off_nonneg, off_after_e_pos + size_e);

        Layout {
            dim,
            n_i,
            n_e,
            p0,
            p_i,
            p_e,
            off_f,
            off_g_i,
            off_g_e_pos,
            off_g_e_neg,
            off_nonneg,
            total_rows,
            qp_dim,
        }
    }
}

/// Holds the static sparsity pattern of the QP and the dense scratch buffers
/// refreshed every iteration.
pub struct Subproblem {
    layout: Layout,
    /// `P`, dense, `qp_dim x qp_dim`. Upper triangle converted to CSC at
    /// solve time.
    p: DMatrix<f64>,
    /// `q`, length `qp_dim`.
    q: DVector<f64>,
    /// `G`, dense, `total_rows x qp_dim`.
    g: DMatrix<f64>,
    /// `h`, length `total_rows`.
    h: DVector<f64>,
}

impl Subproblem {
    /// Build the static layout for a problem with the given sample counts.
    /// `p_i[j]`/`p_e[l]` are the extra sample counts (not counting `x_k`
    /// itself) for inequality `j` / equality `l`.
    pub fn new(dim: usize, p0: usize, p_i: Vec<usize>, p_e: Vec<usize>) -> Self {
        let layout = Layout::new(dim, p0, p_i, p_e);
        let qp_dim = layout.qp_dim;
        let total_rows = layout.total_rows;

        let mut p = DMatrix::zeros(qp_dim, qp_dim);
        for i in dim..qp_dim {
            p[(i, i)] = P_REGULARIZATION;
        }

        let mut q = DVector::zeros(qp_dim);
        for j in 0..layout.n_i {
            q[dim + 1 + j] = 1.0;
        }
        for l in 0..layout.n_e {
            q[dim + 1 + layout.n_i + l] = 1.0;
        }

        let mut g = DMatrix::zeros(total_rows, qp_dim);
        let h = DVector::zeros(total_rows);

        for row in layout.off_f..layout.off_f + p0 + 1 {
            g[(row, dim)] = -1.0;
        }
        for j in 0..layout.n_i {
            for row in layout.off_g_i[j]..layout.off_g_i[j] + layout.p_i[j] + 1 {
                g[(row, dim + 1 + j)] = -1.0;
            }
        }
        for l in 0..layout.n_e {
            let col = dim + 1 + layout.n_i + l;
            for row in layout.off_g_e_pos[l]..layout.off_g_e_pos[l] + layout.p_e[l] + 1 {
                g[(row, col)] = -1.0;
            }
            for row in layout.off_g_e_neg[l]..layout.off_g_e_neg[l] + layout.p_e[l] + 1 {
                g[(row, col)] = -1.0;
            }
        }
        for j in 0..layout.n_i {
            g[(layout.off_nonneg + j, dim + 1 + j)] = -1.0;
        }
        for l in 0..layout.n_e {
            g[(layout.off_nonneg + layout.n_i + l, dim + 1 + layout.n_i + l)] = -1.0;
        }

        Subproblem { layout, p, q, g, h }
    }

    /// Refresh the dynamic entries: the top-left `H` block and `rho` entry
    /// of the objective, and the gradient columns and right-hand side of the
    /// inequality block.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        h_approx: &DMatrix<f64>,
        rho: f64,
        d_f: &DMatrix<f64>,
        d_g_i: &[DMatrix<f64>],
        d_g_e: &[DMatrix<f64>],
        f_k: f64,
        g_i_k: &DVector<f64>,
        g_e_k: &DVector<f64>,
    ) {
        let dim = self.layout.dim;
        self.p.view_mut((0, 0), (dim, dim)).copy_from(h_approx);
        self.q[dim] = rho;

        let off_f = self.layout.off_f;
        let p0 = self.layout.p0;
        self.g.view_mut((off_f, 0), (p0 + 1, dim)).copy_from(d_f);
        for row in off_f..off_f + p0 + 1 {
            self.h[row] = -f_k;
        }

        for j in 0..self.layout.n_i {
            let off = self.layout.off_g_i[j];
            let rows = self.layout.p_i[j] + 1;
            self.g.view_mut((off, 0), (rows, dim)).copy_from(&d_g_i[j]);
            for row in off..off + rows {
                self.h[row] = -g_i_k[j];
            }
        }

        for l in 0..self.layout.n_e {
            let off_pos = self.layout.off_g_e_pos[l];
            let off_neg = self.layout.off_g_e_neg[l];
            let rows = self.layout.p_e[l] + 1;
            self.g
                .view_mut((off_pos, 0), (rows, dim))
                .copy_from(&d_g_e[l]);
            self.g
                .view_mut((off_neg, 0), (rows, dim))
                .copy_from(&(-&d_g_e[l]));
            for row in off_pos..off_pos + rows {
                self.h[row] = -g_e_k[l];
            }
            for row in off_neg..off_neg + rows {
                self.h[row] = g_e_k[l];
            }
        }
    }

    /// Solve the QP and slice out the primal direction and dual multipliers.
    /// `iteration`, `rho`, and `eps` are only used to enrich error context.
    pub fn solve(&self, iteration: usize, rho: f64, eps: f64) -> Result<SubproblemSolution, Error> {
        let p_csc = upper_triangular_csc(&self.p);
        let g_csc = dense_to_csc(&self.g);
        let cones = vec![SupportedConeT::NonnegativeConeT(self.layout.total_rows)];
        let settings = DefaultSettings {
            verbose: false,
            ..Default::default()
        };

        let mut solver = DefaultSolver::new(
            &p_csc,
            self.q.as_slice(),
            &g_csc,
            self.h.as_slice(),
            &cones,
            settings,
        );
        solver.solve();

        if !matches!(solver.solution.status, SolverStatus::Solved) {
            return Err(Error::QpSolverFailure {
                iteration,
                rho,
                eps,
                reason: format!("{:?}", solver.solution.status),
            });
        }

        let dim = self.layout.dim;
        let n_i = self.layout.n_i;
        let n_e = self.layout.n_e;
        let x = &solver.solution.x;

        let d = DVector::from_row_slice(&x[0..dim]);
        let z = x[dim];
        let r_i = DVector::from_row_slice(&x[dim + 1..dim + 1 + n_i]);
        let r_e = DVector::from_row_slice(&x[dim + 1 + n_i..dim + 1 + n_i + n_e]);

        if r_i.iter().any(|v| *v < -1e-5) {
            return Err(Error::InvariantViolation {
                iteration,
                reason: format!("rI has a negative entry below tolerance: {r_i:?}"),
            });
        }
        if r_e.iter().any(|v| *v < -1e-5) {
            return Err(Error::InvariantViolation {
                iteration,
                reason: format!("rE has a negative entry below tolerance: {r_e:?}"),
            });
        }

        let z_dual = &solver.solution.z;
        let lambda_f =
            DVector::from_row_slice(&z_dual[self.layout.off_f..self.layout.off_f + self.layout.p0 + 1]);

        let sum_lambda_f = lambda_f.sum();
        if !approx::relative_eq!(sum_lambda_f, rho, epsilon = 1e-6, max_relative = 1e-6) {
            return Err(Error::InvariantViolation {
                iteration,
                reason: format!(
                    "sum(lambda_f)={sum_lambda_f:.6e} differs from rho={rho:.6e} by more than 1e-6"
                ),
            });
        }

        let mut lambda_g_i = Vec::with_capacity(n_i);
        for j in 0..n_i {
            let off = self.layout.off_g_i[j];
            let rows = self.layout.p_i[j] + 1;
            lambda_g_i.push(DVector::from_row_slice(&z_dual[off..off + rows]));
        }

        let mut lambda_g_e = Vec::with_capacity(n_e);
        for l in 0..n_e {
            let rows = self.layout.p_e[l] + 1;
            let off_pos = self.layout.off_g_e_pos[l];
            let off_neg = self.layout.off_g_e_neg[l];
            let pos = DVector::from_row_slice(&z_dual[off_pos..off_pos + rows]);
            let neg = DVector::from_row_slice(&z_dual[off_neg..off_neg + rows]);
            lambda_g_e.push(pos - neg);
        }

        Ok(SubproblemSolution {
            d,
            z,
            r_i,
            r_e,
            lambda_f,
            lambda_g_i,
            lambda_g_e,
            objective: solver.solution.obj_val,
        })
    }
}

/// Convert a dense matrix to clarabel's CSC format, keeping only the upper
/// triangle (clarabel's expected encoding of a symmetric matrix).
fn upper_triangular_csc(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for col in 0..mat.ncols() {
        for row in 0..=col {
            let v = mat[(row, col)];
            if v != 0.0 {
                rowval.push(row);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}

/// Convert a dense matrix to clarabel's CSC format in full.
fn dense_to_csc(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for col in 0..mat.ncols() {
        for row in 0..mat.nrows() {
            let v = mat[(row, col)];
            if v != 0.0 {
                rowval.push(row);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_partition_all_rows() {
        let layout = Layout::new(2, 2, vec![3, 3], vec![4]);
        assert_eq!(layout.off_f, 0);
        assert_eq!(layout.off_g_i[0], 3);
        assert_eq!(layout.off_g_i[1], 7);
        assert_eq!(layout.off_g_e_pos[0], 11);
        assert_eq!(layout.off_g_e_neg[0], 16);
        assert_eq!(layout.off_nonneg, 21);
        assert_eq!(layout.total_rows, 21 + 2 + 1);
        assert_eq!(layout.qp_dim, 2 + 1 + 2 + 1);
    }

    #[test]
    fn unconstrained_quadratic_solves_to_zero_direction_at_minimum() {
        // f(x) = x^2 at x=0: D_f is 0, gradient is 0 everywhere sampled, so
        // the only feasible/optimal direction is d=0.
        let mut sp = Subproblem::new(1, 1, vec![], vec![]);
        let h = DMatrix::identity(1, 1);
        let d_f = DMatrix::from_row_slice(2, 1, &[0.0, 0.0]);
        sp.update(&h, 1.0, &d_f, &[], &[], 0.0, &DVector::zeros(0), &DVector::zeros(0));
        let sol = sp.solve(0, 1.0, 0.1).unwrap();
        assert!(sol.d.norm() < 1e-6);
        assert!((sol.lambda_f.sum() - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn descent_direction_found_for_linear_objective() {
        // f(x) = D_f . x around x=0 sampled with a constant gradient of 1.0:
        // the direction should move against the gradient.
        let mut sp = Subproblem::new(1, 2, vec![], vec![]);
        let h = DMatrix::identity(1, 1);
        let d_f = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        sp.update(&h, 1.0, &d_f, &[], &[], 0.0, &DVector::zeros(0), &DVector::zeros(0));
        let sol = sp.solve(0, 1.0, 0.1).unwrap();
        assert!(sol.d[0] < 0.0);
    }

    #[test]
    fn empty_constraint_lists_produce_empty_dual_buckets() {
        let mut sp = Subproblem::new(2, 0, vec![], vec![]);
        let h = DMatrix::identity(2, 2);
        let d_f = DMatrix::from_row_slice(1, 2, &[0.5, -0.5]);
        sp.update(&h, 0.5, &d_f, &[], &[], 0.0, &DVector::zeros(0), &DVector::zeros(0));
        let sol = sp.solve(0, 0.5, 0.1).unwrap();
        assert!(sol.lambda_g_i.is_empty());
        assert!(sol.lambda_g_e.is_empty());
    }
}
