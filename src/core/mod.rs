// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Core abstractions shared by the solver: oracles, the counted `Problem`
//! wrapper, iterate state, errors, key-value diagnostics, observers, and the
//! final solve result.

pub mod error;
pub mod kv;
pub mod observers;
pub mod oracle;
pub mod problem;
pub mod result;
pub mod state;

pub use error::Error;
pub use kv::{KvValue, KV};
pub use observers::{LogObserver, Observer, ObserverHandle, ObserverMode, TerminalObserver};
pub use oracle::{CostFunction, Differentiable, Gradient, Oracle};
pub use problem::Problem;
pub use result::SolveResult;
pub use state::{SolveStatus, SqpGsState};
