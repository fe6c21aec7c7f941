//! Process templates and the behaviour contract they delegate to
//!
//! A template is the shared description of one kind of process. What the
//! process actually does on commit, stop and LOD changes is a
//! `ProcessBehavior`; delegation to an area genius is a wrapper around one
//! (see `delegation::Delegated`).
//!
//! Commit validation returns `CommitError`, which carries the terminal
//! `ProcessResult` it maps to. `ProcessTemplate::atomic_commit` turns it into
//! a plain result so callers only ever see `ProcessResult`.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::binding::{Bindings, Substitution};
use crate::core::config::EngineConfig;
use crate::core::error::{IveError, Result};
use crate::core::types::{LodRange, ObjectId, Params, SimTime, Value};
use crate::process::delegation::{DelegationTable, GeniusId, GeniusRegistry};
use crate::process::execution::ProcessExecution;
use crate::process::expansion::{Expansion, ExpansionProducer};
use crate::process::instance::IveProcess;
use crate::process::result::ProcessResult;
use crate::trigger::{always, Trigger, TriggerTemplate};
use crate::world::World;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    #[error("Empty source {0}")]
    EmptySource(String),

    #[error("Object {object:?} bound to {role} is not of class {class}")]
    WrongClass {
        role: String,
        object: ObjectId,
        class: String,
    },

    #[error("Object {0:?} no longer exists")]
    MissingObject(ObjectId),

    #[error("Missing parameter {0}")]
    MissingParameter(String),

    #[error("Parameter {name} holds {found}, expected {expected}")]
    WrongParameterType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Object {object:?} has no attribute {name}")]
    MissingAttribute { object: ObjectId, name: String },

    #[error("Attribute {name} holds {found}, expected {expected}")]
    WrongAttributeType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Commit aborted: {0:?}")]
    Aborted(ProcessResult),
}

impl CommitError {
    /// Terminal result this failure ends the execution with
    pub fn result(&self) -> ProcessResult {
        match self {
            CommitError::EmptySource(_)
            | CommitError::WrongClass { .. }
            | CommitError::MissingObject(_) => ProcessResult::WrongSources,
            CommitError::MissingParameter(_)
            | CommitError::WrongParameterType { .. }
            | CommitError::MissingAttribute { .. }
            | CommitError::WrongAttributeType { .. } => ProcessResult::Failed,
            CommitError::Aborted(result) => *result,
        }
    }
}

pub type CommitResult = std::result::Result<ProcessResult, CommitError>;

/// Which view of an execution's roles to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Interpreter-owned snapshot used for world mutation
    Real,
    /// The controller's provisional bindings
    Phantom,
}

/// Everything an atomic operation may touch
pub struct ExecContext<'a> {
    pub world: &'a mut World,
    pub bindings: &'a mut Bindings,
    pub geniuses: &'a mut GeniusRegistry,
    pub config: &'a EngineConfig,
    pub now: SimTime,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        world: &'a mut World,
        bindings: &'a mut Bindings,
        geniuses: &'a mut GeniusRegistry,
        config: &'a EngineConfig,
        now: SimTime,
    ) -> Self {
        Self {
            world,
            bindings,
            geniuses,
            config,
            now,
        }
    }

    fn view<'e>(exec: &'e ProcessExecution, binding: Binding) -> &'e Substitution {
        match binding {
            Binding::Real => exec.objects(),
            Binding::Phantom => exec.phantoms(),
        }
    }

    // === SOURCES ===

    pub fn source_object(
        &self,
        exec: &ProcessExecution,
        role: &str,
        binding: Binding,
    ) -> Option<ObjectId> {
        Self::view(exec, binding).object(self.bindings, role)
    }

    /// Bound object of a role; an empty role fails with `WRONG_SOURCES`
    pub fn checked_source_object(
        &self,
        exec: &ProcessExecution,
        role: &str,
        binding: Binding,
    ) -> std::result::Result<ObjectId, CommitError> {
        let object = self
            .source_object(exec, role, binding)
            .ok_or_else(|| CommitError::EmptySource(role.to_string()))?;
        if self.world.object(object).is_none() {
            return Err(CommitError::MissingObject(object));
        }
        Ok(object)
    }

    pub fn checked_class_object(
        &self,
        exec: &ProcessExecution,
        role: &str,
        binding: Binding,
        class: &str,
    ) -> std::result::Result<ObjectId, CommitError> {
        let object = self.checked_source_object(exec, role, binding)?;
        self.check_object_class(object, class).map_err(|_| CommitError::WrongClass {
            role: role.to_string(),
            object,
            class: class.to_string(),
        })?;
        Ok(object)
    }

    pub fn check_object_class(
        &self,
        object: ObjectId,
        class: &str,
    ) -> std::result::Result<(), CommitError> {
        match self.world.object(object) {
            Some(obj) if obj.is_of_class(class) => Ok(()),
            Some(_) => Err(CommitError::WrongClass {
                role: String::new(),
                object,
                class: class.to_string(),
            }),
            None => Err(CommitError::MissingObject(object)),
        }
    }

    /// Empty the phantom binding of a role
    pub fn clean_phantom_source(&mut self, exec: &ProcessExecution, role: &str) {
        if let Some(source) = exec.phantoms().source(self.bindings, role) {
            self.bindings.set_object(source, None);
        }
    }

    // === PARAMETERS ===

    pub fn checked_parameter<'e>(
        &self,
        exec: &'e ProcessExecution,
        name: &str,
    ) -> std::result::Result<&'e Value, CommitError> {
        exec.parameters()
            .get(name)
            .ok_or_else(|| CommitError::MissingParameter(name.to_string()))
    }

    pub fn checked_integer_parameter(
        &self,
        exec: &ProcessExecution,
        name: &str,
    ) -> std::result::Result<i64, CommitError> {
        let value = self.checked_parameter(exec, name)?;
        value.as_integer().ok_or(CommitError::WrongParameterType {
            name: name.to_string(),
            expected: "integer",
            found: value.type_name(),
        })
    }

    // === ATTRIBUTES ===

    pub fn attribute(
        &self,
        object: ObjectId,
        name: &str,
    ) -> std::result::Result<&Value, CommitError> {
        let obj = self
            .world
            .object(object)
            .ok_or(CommitError::MissingObject(object))?;
        obj.attribute(name).ok_or_else(|| CommitError::MissingAttribute {
            object,
            name: name.to_string(),
        })
    }

    pub fn fuzzy_attribute(
        &self,
        object: ObjectId,
        name: &str,
    ) -> std::result::Result<f32, CommitError> {
        let value = self.attribute(object, name)?;
        value
            .as_fuzzy()
            .ok_or_else(|| Self::wrong_attribute(name, "fuzzy", value))
    }

    pub fn integer_attribute(
        &self,
        object: ObjectId,
        name: &str,
    ) -> std::result::Result<i64, CommitError> {
        let value = self.attribute(object, name)?;
        value
            .as_integer()
            .ok_or_else(|| Self::wrong_attribute(name, "integer", value))
    }

    pub fn object_attribute(
        &self,
        object: ObjectId,
        name: &str,
    ) -> std::result::Result<Option<ObjectId>, CommitError> {
        let value = self.attribute(object, name)?;
        value
            .as_object()
            .ok_or_else(|| Self::wrong_attribute(name, "object", value))
    }

    fn wrong_attribute(name: &str, expected: &'static str, value: &Value) -> CommitError {
        CommitError::WrongAttributeType {
            name: name.to_string(),
            expected,
            found: value.type_name(),
        }
    }
}

/// Identity and default LOD range of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub process_id: String,
    pub goal_id: String,
    pub lod: LodRange,
}

/// What one kind of process does when the interpreter drives it
///
/// Defaults describe an instant process: commit succeeds, length is zero,
/// stopping is immediately `OK`, and an LOD increase stops the process.
pub trait ProcessBehavior: fmt::Debug {
    /// LOD range the process runs atomically in
    fn lod(&self, info: &TemplateInfo, _ctx: &ExecContext<'_>, _exec: &ProcessExecution) -> LodRange {
        info.lod
    }

    /// Prepare a fresh execution; may add roles to the process
    fn execute(
        &mut self,
        _ctx: &mut ExecContext<'_>,
        _process: &mut IveProcess,
        _exec: &mut ProcessExecution,
    ) {
    }

    fn commit(&mut self, _ctx: &mut ExecContext<'_>, _exec: &mut ProcessExecution) -> CommitResult {
        Ok(ProcessResult::Ok)
    }

    /// Milliseconds until the next commit is due
    fn length(&self, _ctx: &ExecContext<'_>, _exec: &ProcessExecution) -> SimTime {
        0
    }

    fn stop(&mut self, _ctx: &mut ExecContext<'_>, _exec: &mut ProcessExecution) -> ProcessResult {
        ProcessResult::Ok
    }

    fn increase_lod(
        &mut self,
        ctx: &mut ExecContext<'_>,
        exec: &mut ProcessExecution,
    ) -> ProcessResult {
        self.stop(ctx, exec)
    }

    fn decrease_lod(&mut self, _ctx: &mut ExecContext<'_>, _exec: &mut ProcessExecution) {}

    /// Subgoals replacing the process at a finer LOD; `None` defers to the
    /// template's expansion producer
    fn expansion(
        &self,
        _ctx: &mut ExecContext<'_>,
        _substitution: &Substitution,
        _parameters: &Params,
    ) -> Option<Expansion> {
        None
    }

    fn delegation(&self) -> Option<&DelegationTable> {
        None
    }

    fn delegation_mut(&mut self) -> Option<&mut DelegationTable> {
        None
    }
}

/// Process that finishes on its first commit
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ProcessBehavior for Immediate {}

#[derive(Debug)]
pub struct ProcessTemplate {
    info: TemplateInfo,
    sources: Substitution,
    suitability: Arc<dyn TriggerTemplate>,
    context: Arc<dyn TriggerTemplate>,
    producer: Option<ExpansionProducer>,
    behavior: Box<dyn ProcessBehavior>,
}

impl ProcessTemplate {
    pub fn new(
        process_id: impl Into<String>,
        goal_id: impl Into<String>,
        lod: LodRange,
        sources: Substitution,
        behavior: Box<dyn ProcessBehavior>,
    ) -> Self {
        Self {
            info: TemplateInfo {
                process_id: process_id.into(),
                goal_id: goal_id.into(),
                lod,
            },
            sources,
            suitability: always(),
            context: always(),
            producer: None,
            behavior,
        }
    }

    pub fn with_suitability(mut self, suitability: Arc<dyn TriggerTemplate>) -> Self {
        self.suitability = suitability;
        self
    }

    pub fn with_context(mut self, context: Arc<dyn TriggerTemplate>) -> Self {
        self.context = context;
        self
    }

    pub fn with_expansion(mut self, producer: ExpansionProducer) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn info(&self) -> &TemplateInfo {
        &self.info
    }

    pub fn process_id(&self) -> &str {
        &self.info.process_id
    }

    pub fn goal_id(&self) -> &str {
        &self.info.goal_id
    }

    pub fn lod(&self, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> LodRange {
        self.behavior.lod(&self.info, ctx, exec)
    }

    /// The role draft itself
    pub fn draft(&self) -> &Substitution {
        &self.sources
    }

    /// Fresh copy of the role draft for a caller to fill in
    pub fn sources(&self, bindings: &mut Bindings) -> Substitution {
        self.sources.snapshot(bindings)
    }

    // === INSTANTIATION ===

    /// Bind a process of this kind to `substitution`
    pub fn instantiate(&self, substitution: Substitution, parameters: Params) -> IveProcess {
        let context = self.context.instantiate(&substitution, &parameters);
        IveProcess::new(
            self.info.process_id.clone(),
            self.info.goal_id.clone(),
            substitution,
            parameters,
            context,
        )
    }

    pub fn context(&self, substitution: &Substitution, parameters: &Params) -> Box<dyn Trigger> {
        self.context.instantiate(substitution, parameters)
    }

    /// Whether this kind of process may realize a goal with these roles
    ///
    /// A delegated template also needs a genius covering the actor.
    pub fn is_suitable(
        &self,
        world: &World,
        bindings: &Bindings,
        substitution: &Substitution,
        parameters: &Params,
    ) -> bool {
        if let Some(table) = self.behavior.delegation() {
            let covered = substitution
                .actor_objects(bindings)
                .first()
                .and_then(|actor| table.find_genius(world, *actor))
                .is_some();
            if !covered {
                return false;
            }
        }
        self.suitability
            .instantiate(substitution, parameters)
            .evaluate(world, bindings)
    }

    /// Create the execution record for a process about to run
    pub fn execute(&mut self, ctx: &mut ExecContext<'_>, process: &mut IveProcess) -> ProcessExecution {
        let mut exec = ProcessExecution::new(process, ctx.now);
        self.behavior.execute(ctx, process, &mut exec);
        // roles the behaviour added must be visible through the phantoms
        exec.sync_phantoms(process);
        exec
    }

    // === ATOMIC OPERATIONS ===

    pub fn atomic_commit(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> ProcessResult {
        match self.behavior.commit(ctx, exec) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(process = %self.info.process_id, "Atomic commit failed: {}", e);
                e.result()
            }
        }
    }

    pub fn atomic_length(&self, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> SimTime {
        self.behavior.length(ctx, exec)
    }

    pub fn atomic_stop(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> ProcessResult {
        self.behavior.stop(ctx, exec)
    }

    pub fn increase_lod(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> ProcessResult {
        self.behavior.increase_lod(ctx, exec)
    }

    pub fn decrease_lod(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) {
        self.behavior.decrease_lod(ctx, exec)
    }

    pub fn expansion(
        &self,
        ctx: &mut ExecContext<'_>,
        substitution: &Substitution,
        parameters: &Params,
    ) -> Option<Expansion> {
        if self.is_delegated() {
            return None;
        }
        self.behavior
            .expansion(ctx, substitution, parameters)
            .or_else(|| {
                self.producer
                    .as_ref()
                    .map(|p| p.expansion(ctx.bindings, ctx.world, substitution))
            })
    }

    // === DELEGATION ===

    pub fn is_delegated(&self) -> bool {
        self.behavior.delegation().is_some()
    }

    pub fn delegation(&self) -> Option<&DelegationTable> {
        self.behavior.delegation()
    }

    pub fn register(&mut self, genius: GeniusId, area: ObjectId) -> Result<()> {
        let process_id = self.info.process_id.clone();
        self.behavior
            .delegation_mut()
            .ok_or(IveError::NotDelegated(process_id))?
            .register(genius, area);
        Ok(())
    }

    pub fn unregister(&mut self, genius: GeniusId, area: ObjectId) -> Result<()> {
        let process_id = self.info.process_id.clone();
        self.behavior
            .delegation_mut()
            .ok_or(IveError::NotDelegated(process_id))?
            .unregister(genius, area);
        Ok(())
    }

    /// Genius covering the actor, innermost registration first
    pub fn find_genius(&self, world: &World, actor: ObjectId) -> Option<GeniusId> {
        self.behavior
            .delegation()
            .and_then(|table| table.find_genius(world, actor))
    }
}
