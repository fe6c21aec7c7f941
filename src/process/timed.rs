//! Fixed-duration atomic processes (drinking, sleeping, picking things up)

use crate::core::types::{SimTime, Value};
use crate::process::execution::ProcessExecution;
use crate::process::result::ProcessResult;
use crate::process::template::{Binding, CommitError, CommitResult, ExecContext, ProcessBehavior};

/// Attribute written on the actor when the process completes
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub attribute: String,
    pub value: Value,
}

/// Runs for `length` milliseconds, then applies its effect
#[derive(Debug, Clone, PartialEq)]
pub struct Timed {
    length: SimTime,
    actor_role: String,
    effect: Option<Effect>,
}

impl Timed {
    pub fn new(length: SimTime) -> Self {
        Self {
            length,
            actor_role: "actor".to_string(),
            effect: None,
        }
    }

    pub fn with_actor_role(mut self, role: impl Into<String>) -> Self {
        self.actor_role = role.into();
        self
    }

    pub fn with_effect(mut self, attribute: impl Into<String>, value: Value) -> Self {
        self.effect = Some(Effect {
            attribute: attribute.into(),
            value,
        });
        self
    }
}

impl ProcessBehavior for Timed {
    fn commit(&mut self, ctx: &mut ExecContext<'_>, exec: &mut ProcessExecution) -> CommitResult {
        let actor = ctx.checked_source_object(exec, &self.actor_role, Binding::Real)?;
        if exec.duration(ctx.now) < self.length {
            return Ok(ProcessResult::Running);
        }

        if let Some(effect) = &self.effect {
            ctx.world
                .object_mut(actor)
                .ok_or(CommitError::MissingObject(actor))?
                .set_attribute(effect.attribute.clone(), effect.value.clone());
        }
        Ok(ProcessResult::Ok)
    }

    fn length(&self, ctx: &ExecContext<'_>, exec: &ProcessExecution) -> SimTime {
        self.length.saturating_sub(exec.duration(ctx.now))
    }
}
