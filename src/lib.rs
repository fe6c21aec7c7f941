//! IVE - goal-driven process execution over a hierarchical world
//!
//! Processes are bound to world objects through shared binding cells,
//! run by an interpreter at the level of detail their actors live at, and
//! replaced by subgoals when the actors are simulated in finer detail.

pub mod binding;
pub mod core;
pub mod process;
pub mod simulation;
pub mod trigger;
pub mod world;
