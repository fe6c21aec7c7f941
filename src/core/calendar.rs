//! Simulation clock
//!
//! The scheduler owns simulated time; processes only read it to measure
//! their own duration.

use serde::{Deserialize, Serialize};

use crate::core::types::SimTime;

/// Calendar tracks simulation time in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calendar {
    now: SimTime,
}

impl Calendar {
    pub fn new() -> Self {
        Self { now: 0 }
    }

    pub fn starting_at(now: SimTime) -> Self {
        Self { now }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock forward; earlier times are ignored
    pub fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }

    pub fn advance_by(&mut self, millis: SimTime) {
        self.now = self.now.saturating_add(millis);
    }
}
