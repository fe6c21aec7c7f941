//! Per-run state of a process execution

use crate::binding::Substitution;
use crate::core::types::{ExecutionId, Params, SimTime};
use crate::process::delegation::GeniusId;
use crate::process::instance::IveProcess;

/// One run of a process
///
/// The phantoms alias the process roles as the controller bound them. The
/// objects are the interpreter's own snapshot and are what commits act on.
#[derive(Debug, Clone)]
pub struct ProcessExecution {
    id: ExecutionId,
    process_id: String,
    goal_id: String,
    phantoms: Substitution,
    objects: Substitution,
    parameters: Params,
    start_time: SimTime,
    last_commit_time: SimTime,
    genius: Option<GeniusId>,
}

impl ProcessExecution {
    pub fn new(process: &IveProcess, now: SimTime) -> Self {
        Self {
            id: ExecutionId::new(),
            process_id: process.process_id().to_string(),
            goal_id: process.goal_id().to_string(),
            phantoms: process.substitution().share(),
            objects: Substitution::new(),
            parameters: process.parameters().clone(),
            start_time: now,
            last_commit_time: now,
            genius: None,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn phantoms(&self) -> &Substitution {
        &self.phantoms
    }

    /// Re-alias the phantoms to the process roles
    pub fn sync_phantoms(&mut self, process: &IveProcess) {
        self.phantoms = process.substitution().share();
    }

    pub fn objects(&self) -> &Substitution {
        &self.objects
    }

    pub fn set_objects(&mut self, objects: Substitution) {
        self.objects = objects;
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Params {
        &mut self.parameters
    }

    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    pub fn set_start_time(&mut self, time: SimTime) {
        self.start_time = time;
    }

    pub fn last_commit_time(&self) -> SimTime {
        self.last_commit_time
    }

    pub fn set_last_commit_time(&mut self, time: SimTime) {
        self.last_commit_time = time;
    }

    /// Time elapsed since the run started
    pub fn duration(&self, now: SimTime) -> SimTime {
        now.saturating_sub(self.start_time)
    }

    pub fn since_last_commit(&self, now: SimTime) -> SimTime {
        now.saturating_sub(self.last_commit_time)
    }

    /// Genius currently owning a delegated run
    pub fn genius(&self) -> Option<GeniusId> {
        self.genius
    }

    pub fn set_genius(&mut self, genius: Option<GeniusId>) {
        self.genius = genius;
    }
}
