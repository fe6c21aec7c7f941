//! Goal-driven process engine
//!
//! Goals are stamped out by goal factories, realized by process templates
//! looked up in the `ProcessDb`, and run as executions driven by an
//! interpreter through the template's atomic operations.

pub mod db;
pub mod delegation;
pub mod execution;
pub mod expansion;
pub mod goal;
pub mod instance;
pub mod result;
pub mod step;
pub mod template;
pub mod timed;

pub use db::{ProcessDb, TemplateKey};
pub use delegation::{AreaGenius, Delegated, DelegationTable, GeniusId, GeniusRegistry, LocalGenius};
pub use execution::ProcessExecution;
pub use expansion::{Expansion, ExpansionProducer};
pub use goal::{CopyRule, Goal, GoalError, GoalFactory};
pub use instance::{IveProcess, ProcessEvent, ProcessEventKind};
pub use result::ProcessResult;
pub use step::Step;
pub use template::{
    Binding, CommitError, CommitResult, ExecContext, Immediate, ProcessBehavior, ProcessTemplate,
    TemplateInfo,
};
pub use timed::Timed;
