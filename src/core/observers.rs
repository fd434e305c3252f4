// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Pluggable progress reporting, the counterpart of this codebase's
//! `core::observers` module (`SlogLogger`/`ObserverMode`) adapted to the
//! `log` facade this pack's other crates standardize on.

use crate::core::error::Error;
use crate::core::kv::{KvValue, KV};

/// Controls how often an observer is notified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverMode {
    /// Notify on every iteration.
    Always,
    /// Notify every `n`-th iteration (and the final one).
    Every(usize),
    /// Never notify (useful for disabling an observer without removing it).
    Never,
}

impl ObserverMode {
    fn fires(&self, iter: usize) -> bool {
        match self {
            ObserverMode::Always => true,
            ObserverMode::Every(n) => *n > 0 && iter % n == 0,
            ObserverMode::Never => false,
        }
    }
}

/// Receives a [`KV`] snapshot once per iteration.
pub trait Observer {
    /// Called after every iteration (subject to the attached
    /// [`ObserverMode`]) with the iteration's diagnostics.
    fn observe(&mut self, iter: usize, kv: &KV) -> Result<(), Error>;
}

/// Pairs an observer with the mode that gates it.
pub struct ObserverHandle {
    observer: Box<dyn Observer>,
    mode: ObserverMode,
}

impl ObserverHandle {
    /// Attach an observer under the given mode.
    pub fn new(observer: Box<dyn Observer>, mode: ObserverMode) -> Self {
        ObserverHandle { observer, mode }
    }

    pub(crate) fn notify(&mut self, iter: usize, kv: &KV) -> Result<(), Error> {
        if self.mode.fires(iter) {
            self.observer.observe(iter, kv)?;
        }
        Ok(())
    }
}

/// Prints the exact verbose table the solver's `verbose` flag requests:
/// columns `iter, f(x_k), max(gI_k), E_k, step`, with `step` rendered as
/// `NaN` before the first step decision has been made.
#[derive(Default)]
pub struct TerminalObserver {
    header_printed: bool,
}

impl TerminalObserver {
    /// A fresh terminal observer.
    pub fn new() -> Self {
        TerminalObserver::default()
    }
}

impl Observer for TerminalObserver {
    fn observe(&mut self, iter: usize, kv: &KV) -> Result<(), Error> {
        if !self.header_printed {
            println!("{:>4}\t{:>10}\t{:>10}\t{:>10}\t{:>6}", "iter", "f(x_k)", "max(gI_k)", "E_k", "step");
            self.header_printed = true;
        }
        let f = kv.get("f").cloned().unwrap_or(KvValue::None);
        let max_gi = kv.get("max_gI").cloned().unwrap_or(KvValue::None);
        let e_k = kv.get("E_k").cloned().unwrap_or(KvValue::None);
        let step = kv.get("step").cloned().unwrap_or(KvValue::None);
        println!("{iter:>4}\t{f:>10}\t{max_gi:>10}\t{e_k:>10}\t{step:>6}");
        Ok(())
    }
}

/// Emits one `log::info!` record per iteration carrying the same fields as
/// [`TerminalObserver`], for callers that want structured log output instead
/// of a printed table.
#[derive(Default)]
pub struct LogObserver;

impl LogObserver {
    /// A fresh log observer.
    pub fn new() -> Self {
        LogObserver
    }
}

impl Observer for LogObserver {
    fn observe(&mut self, iter: usize, kv: &KV) -> Result<(), Error> {
        let f = kv.get("f").cloned().unwrap_or(KvValue::None);
        let max_gi = kv.get("max_gI").cloned().unwrap_or(KvValue::None);
        let e_k = kv.get("E_k").cloned().unwrap_or(KvValue::None);
        let step = kv.get("step").cloned().unwrap_or(KvValue::None);
        log::info!(
            "iter={iter} f(x_k)={f} max(gI_k)={max_gi} E_k={e_k} step={step}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter(Rc<Cell<usize>>);
    impl Observer for Counter {
        fn observe(&mut self, _iter: usize, _kv: &KV) -> Result<(), Error> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn every_mode_fires_on_multiples_only() {
        let count = Rc::new(Cell::new(0));
        let mut handle = ObserverHandle::new(Box::new(Counter(count.clone())), ObserverMode::Every(3));
        for i in 0..9 {
            handle.notify(i, &KV::new()).unwrap();
        }
        // fires at 0, 3, 6 -> 3 times
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn never_mode_never_fires() {
        let count = Rc::new(Cell::new(0));
        let mut handle = ObserverHandle::new(Box::new(Counter(count.clone())), ObserverMode::Never);
        handle.notify(0, &KV::new()).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn always_mode_fires_every_time() {
        let count = Rc::new(Cell::new(0));
        let mut handle = ObserverHandle::new(Box::new(Counter(count.clone())), ObserverMode::Always);
        for i in 0..5 {
            handle.notify(i, &KV::new()).unwrap();
        }
        assert_eq!(count.get(), 5);
    }
}
