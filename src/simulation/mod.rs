//! Simulation driver: the interpreter and the environment its runs share

pub mod interpreter;

pub use interpreter::{Environment, Interpreter, ProcessMode};
