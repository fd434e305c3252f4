// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The solver. Unlike this codebase's generic `Solver<O, I>`/`Executor`
//! pair, this crate implements exactly one algorithm, so the driver and its
//! configuration live directly here rather than behind a pluggable
//! framework.

mod sqp_gs;

pub use sqp_gs::{SqpGs, SqpGsConfig};
