//! The process-wide mission-time scalar, re-architected per spec.md §9's
//! Design Notes as an explicit value threaded through the analysis façade
//! rather than a hidden global: `MissionTimeHandle` is a cheap `Rc<Cell<_>>`
//! that every `MissionTime` expression node holds a clone of, and the
//! façade is the only thing that mutates it (`analysis::AnalysisFacade::probability_at`).

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MissionTimeHandle(Rc<Cell<f64>>);

impl MissionTimeHandle {
    pub fn new(hours: f64) -> Self {
        Self(Rc::new(Cell::new(hours)))
    }

    pub fn get(&self) -> f64 {
        self.0.get()
    }

    pub fn set(&self, hours: f64) {
        self.0.set(hours);
    }
}

impl Default for MissionTimeHandle {
    fn default() -> Self {
        Self::new(0.0)
    }
}
