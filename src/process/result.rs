//! Outcome of one atomic process operation

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessResult {
    /// Not finished, ask for the remaining length and commit again later
    Running,
    Ok,
    Failed,
    Interrupted,
    WrongSources,
    ActorConfusion,
    LodTooLow,
    LodTooHigh,
}

impl ProcessResult {
    pub const ALL: [ProcessResult; 8] = [
        ProcessResult::Running,
        ProcessResult::Ok,
        ProcessResult::Failed,
        ProcessResult::Interrupted,
        ProcessResult::WrongSources,
        ProcessResult::ActorConfusion,
        ProcessResult::LodTooLow,
        ProcessResult::LodTooHigh,
    ];

    pub fn is_running(self) -> bool {
        self == ProcessResult::Running
    }

    pub fn is_successful(self) -> bool {
        self == ProcessResult::Ok
    }

    pub fn is_failure(self) -> bool {
        !self.is_running() && !self.is_successful()
    }

    pub fn is_terminal(self) -> bool {
        !self.is_running()
    }
}
