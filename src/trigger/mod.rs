//! Triggers: predicates gating goals and processes
//!
//! A template is shared by every goal or process kind that uses it; an
//! instance is bound to one substitution and parameter map.

use std::fmt;
use std::sync::Arc;

use crate::binding::{Bindings, Substitution};
use crate::core::types::Params;
use crate::world::World;

pub trait Trigger: fmt::Debug {
    fn evaluate(&self, world: &World, bindings: &Bindings) -> bool;
}

pub trait TriggerTemplate: fmt::Debug {
    fn instantiate(&self, substitution: &Substitution, parameters: &Params) -> Box<dyn Trigger>;
}

/// Always the same answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantTrigger(pub bool);

impl Trigger for ConstantTrigger {
    fn evaluate(&self, _world: &World, _bindings: &Bindings) -> bool {
        self.0
    }
}

impl TriggerTemplate for ConstantTrigger {
    fn instantiate(&self, _substitution: &Substitution, _parameters: &Params) -> Box<dyn Trigger> {
        Box::new(*self)
    }
}

pub fn always() -> Arc<dyn TriggerTemplate> {
    Arc::new(ConstantTrigger(true))
}

/// True while every listed role is bound to an object that exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolesBound {
    pub roles: Vec<String>,
}

#[derive(Debug)]
struct RolesBoundInstance {
    roles: Vec<String>,
    substitution: Substitution,
}

impl Trigger for RolesBoundInstance {
    fn evaluate(&self, world: &World, bindings: &Bindings) -> bool {
        self.roles.iter().all(|role| {
            self.substitution
                .object(bindings, role)
                .is_some_and(|id| world.object(id).is_some())
        })
    }
}

impl TriggerTemplate for RolesBound {
    fn instantiate(&self, substitution: &Substitution, _parameters: &Params) -> Box<dyn Trigger> {
        Box::new(RolesBoundInstance {
            roles: self.roles.clone(),
            substitution: substitution.share(),
        })
    }
}

type PredicateFn = dyn Fn(&World, &Bindings, &Substitution, &Params) -> bool;

/// Template backed by a closure over the bound substitution
#[derive(Clone)]
pub struct PredicateTrigger {
    name: String,
    predicate: Arc<PredicateFn>,
}

impl PredicateTrigger {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&World, &Bindings, &Substitution, &Params) -> bool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateTrigger")
            .field("name", &self.name)
            .finish()
    }
}

struct PredicateInstance {
    name: String,
    predicate: Arc<PredicateFn>,
    substitution: Substitution,
    parameters: Params,
}

impl fmt::Debug for PredicateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateInstance")
            .field("name", &self.name)
            .finish()
    }
}

impl Trigger for PredicateInstance {
    fn evaluate(&self, world: &World, bindings: &Bindings) -> bool {
        (self.predicate)(world, bindings, &self.substitution, &self.parameters)
    }
}

impl TriggerTemplate for PredicateTrigger {
    fn instantiate(&self, substitution: &Substitution, parameters: &Params) -> Box<dyn Trigger> {
        Box::new(PredicateInstance {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
            substitution: substitution.share(),
            parameters: parameters.clone(),
        })
    }
}
