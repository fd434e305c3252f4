// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Draws points uniformly from a closed `eps`-ball around a center.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw `n` points uniformly distributed in the open `eps`-ball around `x`.
///
/// Each row is drawn as `x + eps * R^(1/dim) / ||U|| * U` with `U` standard
/// normal in `R^dim` and `R` uniform on `[0, 1)`: `R^(1/dim)` gives uniform
/// density over volume, and normalizing by `||U||` projects onto the unit
/// sphere before scaling by the radius. A drawn `U` with zero norm
/// (probability zero, but possible under a pathological RNG) is redrawn.
pub fn sample_points(x: &DVector<f64>, eps: f64, n: usize, rng: &mut impl Rng) -> DMatrix<f64> {
    let dim = x.len();
    let mut out = DMatrix::zeros(n, dim);
    for i in 0..n {
        let (u, norm_u) = loop {
            let u: Vec<f64> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
            let norm_u = u.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm_u > 0.0 {
                break (u, norm_u);
            }
        };
        let r: f64 = rng.gen_range(0.0..1.0);
        let radius = eps * r.powf(1.0 / dim as f64) / norm_u;
        for j in 0..dim {
            out[(i, j)] = x[j] + radius * u[j];
        }
    }
    out
}

/// Build the `(p+1) x dim` sample bundle for one oracle: row 0 is `x`
/// itself, the remaining `p` rows are drawn from the `eps`-ball around it.
pub fn sample_bundle(x: &DVector<f64>, eps: f64, p: usize, rng: &mut impl Rng) -> DMatrix<f64> {
    let dim = x.len();
    let mut bundle = DMatrix::zeros(p + 1, dim);
    bundle.row_mut(0).copy_from(&x.transpose());
    if p > 0 {
        let extra = sample_points(x, eps, p, rng);
        bundle.view_mut((1, 0), (p, dim)).copy_from(&extra);
    }
    bundle
}
