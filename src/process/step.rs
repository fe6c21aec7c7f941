//! Step - move an actor one way-point towards a target
//!
//! The step runs atomically at one LOD, taken from the `lod` parameter or
//! derived from where the actor and target meet in the location tree. At
//! the next finer LOD it expands into a `MoveGoal` for the same actor.

use std::sync::Arc;

use crate::binding::{Bindings, Slot, Substitution};
use crate::core::types::{LodRange, ObjectId, Params, SimTime, Value};
use crate::process::execution::ProcessExecution;
use crate::process::expansion::Expansion;
use crate::process::goal::Goal;
use crate::process::instance::IveProcess;
use crate::process::result::ProcessResult;
use crate::process::template::{
    Binding, CommitError, CommitResult, ExecContext, ProcessBehavior, ProcessTemplate, TemplateInfo,
};
use crate::trigger::{always, PredicateTrigger, TriggerTemplate};
use crate::world::{SpaceState, World};

pub const STEP_PROCESS: &str = "Step";
pub const MOVE_GOAL: &str = "MoveGoal";

const ACTOR: &str = "actor";
const TARGET: &str = "targetPosition";
/// Unshared copy of the target taken when the step starts
const LOCAL_TARGET: &str = "localTarget";
/// Where the actor stood when the step started
const ORIGIN: &str = "stepOrigin";

#[derive(Debug, Clone, Copy, Default)]
pub struct Step;

impl Step {
    /// Template with the actor and target roles
    pub fn template(bindings: &mut Bindings) -> ProcessTemplate {
        let mut sources = Substitution::new();
        sources.add_object_slot(bindings, ACTOR, None, true, false, true);
        sources.add_object_slot(bindings, TARGET, None, true, false, false);
        ProcessTemplate::new(STEP_PROCESS, MOVE_GOAL, LodRange::exact(2), sources, Box::new(Step))
    }

    /// LOD of the location just below where actor and target paths meet,
    /// on the actor's side
    pub fn initial_lod(world: &World, actor: ObjectId, target: ObjectId) -> Option<i32> {
        let actor_location = world.position(actor)?;
        let common = world.least_common_parent(actor_location, target)?;
        let level = world
            .child_preceding(common, actor_location)
            .unwrap_or(common);
        world.object(level).map(|o| o.lod)
    }

    /// Remember where the actor stands as the step's starting point
    fn record_origin(world: &World, actor: ObjectId, exec: &mut ProcessExecution) {
        if let Some(origin) = world.position(actor) {
            exec.parameters_mut()
                .insert(ORIGIN.to_string(), Value::Object(Some(origin)));
        }
    }

    fn lod_from(world: &World, bindings: &Bindings, roles: &Substitution) -> Option<i32> {
        let actor = roles.object(bindings, ACTOR)?;
        let target = roles.object(bindings, TARGET)?;
        Self::initial_lod(world, actor, target)
    }
}

/// Goal trigger of `MoveGoal`: active until the actor is inside the target
pub fn move_goal_trigger() -> Arc<dyn TriggerTemplate> {
    Arc::new(PredicateTrigger::new(MOVE_GOAL, |world, bindings, roles, _| {
        match (roles.object(bindings, ACTOR), roles.object(bindings, TARGET)) {
            (Some(actor), Some(target)) => !world.is_parent(actor, target),
            _ => false,
        }
    }))
}

impl ProcessBehavior for Step {
    fn lod(&self, info: &TemplateInfo, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> LodRange {
        exec.parameters()
            .get(ctx.config.lod_parameter.as_str())
            .and_then(Value::as_integer)
            .and_then(|lod| i32::try_from(lod).ok())
            .map(LodRange::exact)
            .unwrap_or(info.lod)
    }

    fn execute(
        &mut self,
        ctx: &mut ExecContext<'_>,
        process: &mut IveProcess,
        exec: &mut ProcessExecution,
    ) {
        let lod_parameter = ctx.config.lod_parameter.clone();
        if !exec.parameters().contains_key(&lod_parameter) {
            match Self::lod_from(ctx.world, ctx.bindings, process.substitution()) {
                Some(lod) => {
                    exec.parameters_mut()
                        .insert(lod_parameter, Value::Integer(i64::from(lod)));
                }
                None => tracing::debug!("Step started without a derivable lod"),
            }
        }

        let roles = process.substitution();
        if let Some(actor) = roles.object(ctx.bindings, ACTOR) {
            Self::record_origin(ctx.world, actor, exec);
        }

        if let Some(target) = roles.object(ctx.bindings, TARGET) {
            process.substitution_mut().add_object_slot(
                ctx.bindings,
                LOCAL_TARGET,
                Some(target),
                false,
                false,
                false,
            );
        }
    }

    fn commit(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> CommitResult {
        let actor = ctx.checked_source_object(exec, ACTOR, Binding::Real)?;
        let target = ctx.checked_source_object(exec, LOCAL_TARGET, Binding::Phantom)?;
        let previous = ctx
            .world
            .position(actor)
            .ok_or_else(|| CommitError::EmptySource(ACTOR.into()))?;

        // keep the shared target in line with this step's own target
        if previous != target {
            if let Some(shared) = exec.phantoms().source(ctx.bindings, TARGET) {
                ctx.bindings.set_object(shared, Some(target));
            }
        }

        let reachable = ctx.world.are_nested(previous, target)
            || ctx
                .world
                .neighbours(previous)
                .iter()
                .any(|joint| ctx.world.are_nested(joint.target, target));
        if !reachable {
            tracing::warn!(?actor, from = ?previous, to = ?target, "Step target is too far");
            return Ok(ProcessResult::Failed);
        }

        if target == previous {
            return Ok(ProcessResult::Ok);
        }

        let substantial = ctx.world.object(actor).is_some_and(|o| o.substantial);
        if substantial && ctx.world.space_state(target, Some(actor)) == SpaceState::Occupied {
            tracing::debug!(?actor, ?target, "Step target is occupied, staying");
            return Ok(ProcessResult::Ok);
        }

        if let Err(e) = ctx.world.move_object(actor, target) {
            tracing::warn!(?actor, ?target, "Way-point refused placement: {}", e);
        }
        Ok(ProcessResult::Ok)
    }

    fn length(&self, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> SimTime {
        let config = ctx.config;
        let target = exec
            .phantoms()
            .object(ctx.bindings, LOCAL_TARGET)
            .or_else(|| exec.objects().object(ctx.bindings, TARGET));
        let origin = exec
            .parameters()
            .get(ORIGIN)
            .and_then(Value::as_object)
            .flatten()
            .or_else(|| {
                exec.objects()
                    .object(ctx.bindings, ACTOR)
                    .and_then(|actor| ctx.world.position(actor))
            });

        match (origin, target) {
            (Some(from), Some(to)) if from == to => config.step_default_ms / config.settle_divisor,
            (Some(from), Some(to)) => ctx
                .world
                .edge_weight(from, to)
                .map(|weight| (f64::from(weight) * config.step_ms_per_weight) as SimTime)
                .unwrap_or(config.step_default_ms),
            _ => config.step_default_ms,
        }
    }

    /// The actor may have moved while expanded; time the rest from here
    fn decrease_lod(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) {
        if let Some(actor) = exec.objects().object(ctx.bindings, ACTOR) {
            Self::record_origin(ctx.world, actor, exec);
        }
    }

    fn expansion(
        &self,
        ctx: &mut ExecContext<'_>,
        substitution: &Substitution,
        parameters: &Params,
    ) -> Option<Expansion> {
        let lod = parameters
            .get(ctx.config.lod_parameter.as_str())
            .and_then(Value::as_integer)
            .or_else(|| Self::lod_from(ctx.world, ctx.bindings, substitution).map(i64::from))?;

        let mut goal_roles = Substitution::new();
        for (role, actor) in [(ACTOR, true), (TARGET, false)] {
            let slot = substitution
                .source(ctx.bindings, role)
                .map(Slot::with_source)
                .unwrap_or_default();
            goal_roles.add_new_slot(ctx.bindings, role, slot, actor);
        }

        if let Some(local) = substitution.object(ctx.bindings, LOCAL_TARGET) {
            if let Some(shared) = goal_roles.source(ctx.bindings, TARGET) {
                ctx.bindings.set_object(shared, Some(local));
            }
        }

        let mut goal_parameters = Params::new();
        goal_parameters.insert(ctx.config.lod_parameter.clone(), Value::Integer(lod + 1));
        let goal = Goal::new(MOVE_GOAL, move_goal_trigger(), always(), goal_roles, goal_parameters);
        Some(Expansion::new(vec![goal]))
    }
}
