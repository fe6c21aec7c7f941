//! Delegation of atomic processes to area geniuses
//!
//! A genius registered for an area runs the process itself, possibly at its
//! own granularity. The template keeps two maps: area to genius
//! (registration) and execution to genius (runs the genius accepted).
//! An execution enters the second map only when the genius reports it
//! running, so an immediate answer never needs a later stop.

use std::fmt;

use ahash::AHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::binding::Substitution;
use crate::core::types::{ExecutionId, LodRange, ObjectId, Params, SimTime};
use crate::process::execution::ProcessExecution;
use crate::process::expansion::Expansion;
use crate::process::instance::IveProcess;
use crate::process::result::ProcessResult;
use crate::process::template::{CommitResult, ExecContext, ProcessBehavior, TemplateInfo};
use crate::world::World;

new_key_type! {
    /// Handle of a registered area genius
    pub struct GeniusId;
}

/// Autonomous controller of one area
pub trait AreaGenius: fmt::Debug {
    fn name(&self) -> &str;

    /// Take over the run; `RUNNING` means the genius now owns it
    fn start_delegation(
        &mut self,
        world: &mut World,
        actor: ObjectId,
        execution: &ProcessExecution,
    ) -> ProcessResult;

    /// Asked to stop; `RUNNING` means the genius is still winding down
    fn stop_delegation(&mut self, world: &mut World, execution: &ProcessExecution) -> ProcessResult;

    /// Drop the run without further notice
    fn interrupt_delegation(&mut self, world: &mut World, execution: &ProcessExecution);
}

#[derive(Debug, Default)]
pub struct GeniusRegistry {
    geniuses: SlotMap<GeniusId, Box<dyn AreaGenius>>,
}

impl GeniusRegistry {
    pub fn new() -> Self {
        Self {
            geniuses: SlotMap::with_key(),
        }
    }

    pub fn add(&mut self, genius: Box<dyn AreaGenius>) -> GeniusId {
        self.geniuses.insert(genius)
    }

    pub fn get(&self, id: GeniusId) -> Option<&dyn AreaGenius> {
        self.geniuses.get(id).map(|g| g.as_ref())
    }

    pub fn get_mut(&mut self, id: GeniusId) -> Option<&mut (dyn AreaGenius + 'static)> {
        self.geniuses.get_mut(id).map(|g| g.as_mut())
    }

    pub fn remove(&mut self, id: GeniusId) -> Option<Box<dyn AreaGenius>> {
        self.geniuses.remove(id)
    }

    pub fn len(&self) -> usize {
        self.geniuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geniuses.is_empty()
    }
}

/// Area registrations and delegated runs of one template
#[derive(Debug, Clone, Default)]
pub struct DelegationTable {
    registrations: AHashMap<ObjectId, GeniusId>,
    executions: AHashMap<ExecutionId, GeniusId>,
}

impl DelegationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First registrant of an area wins
    pub fn register(&mut self, genius: GeniusId, area: ObjectId) {
        match self.registrations.get(&area) {
            Some(existing) if *existing != genius => {
                tracing::warn!(
                    ?area,
                    ?existing,
                    ?genius,
                    "Area already has a genius registered, ignoring"
                );
            }
            Some(_) => {}
            None => {
                self.registrations.insert(area, genius);
            }
        }
    }

    /// Only the registered genius can release its area
    pub fn unregister(&mut self, genius: GeniusId, area: ObjectId) {
        match self.registrations.get(&area) {
            Some(existing) if *existing == genius => {
                self.registrations.remove(&area);
            }
            _ => {
                tracing::warn!(?area, ?genius, "Genius is not registered for this area");
            }
        }
    }

    pub fn genius_for_area(&self, area: ObjectId) -> Option<GeniusId> {
        self.registrations.get(&area).copied()
    }

    /// Walk the actor's enclosing locations, innermost first
    pub fn find_genius(&self, world: &World, actor: ObjectId) -> Option<GeniusId> {
        world
            .ancestors(actor)
            .into_iter()
            .find_map(|area| self.genius_for_area(area))
    }

    pub fn owner(&self, execution: ExecutionId) -> Option<GeniusId> {
        self.executions.get(&execution).copied()
    }

    pub fn is_delegated(&self, execution: ExecutionId) -> bool {
        self.executions.contains_key(&execution)
    }

    fn claim(&mut self, execution: ExecutionId, genius: GeniusId) {
        self.executions.insert(execution, genius);
    }

    fn release(&mut self, execution: ExecutionId) -> Option<GeniusId> {
        self.executions.remove(&execution)
    }
}

/// Runs the wrapped behaviour's process through the area genius instead
///
/// The inner behaviour still decides the LOD range and prepares executions.
#[derive(Debug)]
pub struct Delegated<B> {
    inner: B,
    table: DelegationTable,
}

impl<B: ProcessBehavior> Delegated<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            table: DelegationTable::new(),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn table(&self) -> &DelegationTable {
        &self.table
    }

    fn forget(&mut self, exec: &mut ProcessExecution) {
        self.table.release(exec.id());
        exec.set_genius(None);
    }
}

impl<B: ProcessBehavior> ProcessBehavior for Delegated<B> {
    fn lod(&self, info: &TemplateInfo, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> LodRange {
        self.inner.lod(info, ctx, exec)
    }

    fn execute(
        &mut self,
        ctx: &mut ExecContext<'_>,
        process: &mut IveProcess,
        exec: &mut ProcessExecution,
    ) {
        self.inner.execute(ctx, process, exec)
    }

    fn commit(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> CommitResult {
        if self.table.is_delegated(exec.id()) {
            return Ok(ProcessResult::Running);
        }

        let actors: Vec<String> = exec.objects().actor_keys().map(str::to_string).collect();
        let [role] = actors.as_slice() else {
            tracing::warn!(
                process = %exec.process_id(),
                count = actors.len(),
                "Delegated process needs exactly one actor"
            );
            return Ok(ProcessResult::Failed);
        };
        let Some(actor) = exec.objects().object(ctx.bindings, role) else {
            tracing::warn!(process = %exec.process_id(), "Delegated process has an empty actor");
            return Ok(ProcessResult::Failed);
        };

        let Some(genius_id) = self.table.find_genius(ctx.world, actor) else {
            tracing::debug!(?actor, "No genius covers the actor");
            return Ok(ProcessResult::Failed);
        };
        let Some(genius) = ctx.geniuses.get_mut(genius_id) else {
            tracing::warn!(?genius_id, "Registered genius no longer exists");
            return Ok(ProcessResult::Failed);
        };

        let result = genius.start_delegation(ctx.world, actor, exec);
        tracing::debug!(genius = genius.name(), ?result, "Delegation started");
        if result.is_running() {
            self.table.claim(exec.id(), genius_id);
            exec.set_genius(Some(genius_id));
        }
        Ok(result)
    }

    fn length(&self, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> SimTime {
        if self.table.is_delegated(exec.id()) {
            ctx.config.delegated_running_ms
        } else {
            ctx.config.delegation_pending_ms
        }
    }

    fn stop(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> ProcessResult {
        let Some(genius_id) = self.table.owner(exec.id()) else {
            return ProcessResult::Ok;
        };
        let Some(genius) = ctx.geniuses.get_mut(genius_id) else {
            tracing::warn!(?genius_id, "Owning genius vanished before stop");
            self.forget(exec);
            return ProcessResult::Ok;
        };

        let result = genius.stop_delegation(ctx.world, exec);
        if !result.is_running() {
            self.forget(exec);
        }
        result
    }

    fn increase_lod(
        &mut self,
        ctx: &mut ExecContext<'_>,
        exec: &mut ProcessExecution,
    ) -> ProcessResult {
        let Some(genius_id) = self.table.owner(exec.id()) else {
            tracing::warn!(process = %exec.process_id(), "LOD change of a process never delegated");
            return ProcessResult::Failed;
        };
        if let Some(genius) = ctx.geniuses.get_mut(genius_id) {
            genius.interrupt_delegation(ctx.world, exec);
        }
        self.forget(exec);
        ProcessResult::LodTooHigh
    }

    /// Interrupts an owned run exactly like an increase
    fn decrease_lod(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) {
        if self.table.owner(exec.id()).is_none() {
            tracing::debug!(process = %exec.process_id(), "Shrinking a run no genius owns");
            return;
        }
        self.increase_lod(ctx, exec);
    }

    fn expansion(
        &self,
        _ctx: &mut ExecContext<'_>,
        _substitution: &Substitution,
        _parameters: &Params,
    ) -> Option<Expansion> {
        None
    }

    fn delegation(&self) -> Option<&DelegationTable> {
        Some(&self.table)
    }

    fn delegation_mut(&mut self) -> Option<&mut DelegationTable> {
        Some(&mut self.table)
    }
}

/// Genius that accepts delegated runs and tracks who it is running
#[derive(Debug, Clone)]
pub struct LocalGenius {
    name: String,
    accepting: bool,
    stop_result: ProcessResult,
    active: AHashMap<ExecutionId, ObjectId>,
    interrupted: Vec<ExecutionId>,
}

impl LocalGenius {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accepting: true,
            stop_result: ProcessResult::Ok,
            active: AHashMap::new(),
            interrupted: Vec::new(),
        }
    }

    /// Refuse every delegation with `FAILED`
    pub fn refusing(mut self) -> Self {
        self.accepting = false;
        self
    }

    /// Result reported when asked to stop a run
    pub fn stopping_with(mut self, result: ProcessResult) -> Self {
        self.stop_result = result;
        self
    }

    pub fn is_running(&self, execution: ExecutionId) -> bool {
        self.active.contains_key(&execution)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn interrupted(&self) -> &[ExecutionId] {
        &self.interrupted
    }
}

impl AreaGenius for LocalGenius {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_delegation(
        &mut self,
        _world: &mut World,
        actor: ObjectId,
        execution: &ProcessExecution,
    ) -> ProcessResult {
        if !self.accepting {
            return ProcessResult::Failed;
        }
        self.active.insert(execution.id(), actor);
        ProcessResult::Running
    }

    fn stop_delegation(&mut self, _world: &mut World, execution: &ProcessExecution) -> ProcessResult {
        if !self.stop_result.is_running() {
            self.active.remove(&execution.id());
        }
        self.stop_result
    }

    fn interrupt_delegation(&mut self, _world: &mut World, execution: &ProcessExecution) {
        self.active.remove(&execution.id());
        self.interrupted.push(execution.id());
    }
}
