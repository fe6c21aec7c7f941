//! Goals and the factories that stamp them out of a parent substitution
//!
//! A factory copies roles from the parent in one of two ways:
//! - `"role"` aliases the parent's slot, so both follow the same binding
//! - `"role->attribute"` reads an object attribute of the parent's bound
//!   object and binds it in a fresh, unshared source

use std::sync::Arc;

use thiserror::Error;

use crate::binding::{Bindings, Substitution};
use crate::core::types::{ObjectId, Params, Value};
use crate::trigger::{Trigger, TriggerTemplate};
use crate::world::World;

const PROPAGATION_SEPARATOR: &str = "->";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GoalError {
    #[error("Malformed propagation rule: {0}")]
    MalformedRule(String),

    #[error("Parent substitution has no slot {0}")]
    MissingParentSlot(String),

    #[error("Propagation source {0} is empty")]
    EmptySource(String),

    #[error("Object {object:?} has no attribute {attribute}")]
    MissingAttribute { object: ObjectId, attribute: String },

    #[error("Attribute {attribute} holds {found}, expected an object")]
    NotAnObject {
        attribute: String,
        found: &'static str,
    },
}

/// One parsed copy rule of a goal factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyRule {
    Alias {
        from: String,
        to: String,
    },
    Propagate {
        role: String,
        attribute: String,
        to: String,
    },
}

impl CopyRule {
    pub fn parse(from: &str, to: &str) -> Result<Self, GoalError> {
        if !from.contains(PROPAGATION_SEPARATOR) {
            return Ok(CopyRule::Alias {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let parts: Vec<&str> = from.split(PROPAGATION_SEPARATOR).collect();
        match parts.as_slice() {
            [role, attribute] if !role.is_empty() && !attribute.is_empty() => {
                Ok(CopyRule::Propagate {
                    role: role.to_string(),
                    attribute: attribute.to_string(),
                    to: to.to_string(),
                })
            }
            _ => Err(GoalError::MalformedRule(from.to_string())),
        }
    }
}

/// A concrete goal bound to a substitution
#[derive(Debug, Clone)]
pub struct Goal {
    goal_id: String,
    trigger: Arc<dyn TriggerTemplate>,
    context: Arc<dyn TriggerTemplate>,
    substitution: Substitution,
    parameters: Params,
}

impl Goal {
    pub fn new(
        goal_id: impl Into<String>,
        trigger: Arc<dyn TriggerTemplate>,
        context: Arc<dyn TriggerTemplate>,
        substitution: Substitution,
        parameters: Params,
    ) -> Self {
        Self {
            goal_id: goal_id.into(),
            trigger,
            context,
            substitution,
            parameters,
        }
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn trigger_template(&self) -> &Arc<dyn TriggerTemplate> {
        &self.trigger
    }

    pub fn context_template(&self) -> &Arc<dyn TriggerTemplate> {
        &self.context
    }

    /// Goal trigger bound to this goal's substitution
    pub fn trigger(&self) -> Box<dyn Trigger> {
        self.trigger.instantiate(&self.substitution, &self.parameters)
    }

    pub fn context(&self) -> Box<dyn Trigger> {
        self.context.instantiate(&self.substitution, &self.parameters)
    }
}

#[derive(Debug, Clone)]
pub struct GoalFactory {
    goal_id: String,
    trigger: Arc<dyn TriggerTemplate>,
    context: Arc<dyn TriggerTemplate>,
    draft: Substitution,
    parameters: Params,
    rules: Vec<(String, String)>,
}

impl GoalFactory {
    pub fn new(
        goal_id: impl Into<String>,
        trigger: Arc<dyn TriggerTemplate>,
        context: Arc<dyn TriggerTemplate>,
        draft: Substitution,
    ) -> Self {
        Self {
            goal_id: goal_id.into(),
            trigger,
            context,
            draft,
            parameters: Params::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Copy `from` in the parent to `to` in the goal (see module docs)
    pub fn with_rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rules.push((from.into(), to.into()));
        self
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn draft(&self) -> &Substitution {
        &self.draft
    }

    /// Build a goal, or log why it cannot be built
    pub fn create_goal(
        &self,
        bindings: &mut Bindings,
        world: &World,
        parent: &Substitution,
    ) -> Option<Goal> {
        match self.try_create_goal(bindings, world, parent) {
            Ok(goal) => Some(goal),
            Err(e) => {
                tracing::error!(goal = %self.goal_id, "Goal creation failed: {}", e);
                None
            }
        }
    }

    pub fn try_create_goal(
        &self,
        bindings: &mut Bindings,
        world: &World,
        parent: &Substitution,
    ) -> Result<Goal, GoalError> {
        let rules = self
            .rules
            .iter()
            .map(|(from, to)| CopyRule::parse(from, to))
            .collect::<Result<Vec<_>, _>>()?;

        // Resolve everything against the parent before touching the arena
        let mut aliases = Vec::new();
        let mut propagated = Vec::new();
        for rule in rules {
            match rule {
                CopyRule::Alias { from, to } => {
                    let slot = parent
                        .slot(&from)
                        .ok_or(GoalError::MissingParentSlot(from))?;
                    aliases.push((to, slot));
                }
                CopyRule::Propagate {
                    role,
                    attribute,
                    to,
                } => {
                    if !parent.contains(&role) {
                        return Err(GoalError::MissingParentSlot(role));
                    }
                    let object = parent
                        .object(bindings, &role)
                        .ok_or(GoalError::EmptySource(role))?;
                    let value = world.attribute(object, &attribute).ok_or_else(|| {
                        GoalError::MissingAttribute {
                            object,
                            attribute: attribute.clone(),
                        }
                    })?;
                    let target = value.as_object().ok_or(GoalError::NotAnObject {
                        attribute: attribute.clone(),
                        found: value.type_name(),
                    })?;
                    propagated.push((to, target));
                }
            }
        }

        let mut substitution = self.draft.snapshot(bindings);
        for (to, target) in propagated {
            let source = bindings.new_source(target);
            if !substitution.set_source(bindings, &to, source) {
                substitution.add_object_slot(bindings, to.clone(), target, true, false, false);
            }
            tracing::info!(goal = %self.goal_id, role = %to, "Source propagated");
        }
        for (to, slot) in aliases {
            substitution.put_slot(to, slot);
        }

        Ok(Goal::new(
            self.goal_id.clone(),
            Arc::clone(&self.trigger),
            Arc::clone(&self.context),
            substitution,
            self.parameters.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::always;

    struct Fixture {
        world: World,
        bindings: Bindings,
        parent: Substitution,
        actor: ObjectId,
        home: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let town = world.spawn_location("town", None, 0).unwrap();
        let home = world.spawn_location("home", Some(town), 1).unwrap();
        let actor = world.spawn_object("joe", "/person", town, true).unwrap();
        world
            .object_mut(actor)
            .unwrap()
            .set_attribute("home", Value::Object(Some(home)));
        world
            .object_mut(actor)
            .unwrap()
            .set_attribute("thirst", Value::Fuzzy(0.4));

        let mut bindings = Bindings::new();
        let mut parent = Substitution::new();
        parent.add_object_slot(&mut bindings, "actor", Some(actor), true, false, true);
        Fixture {
            world,
            bindings,
            parent,
            actor,
            home,
        }
    }

    fn factory(bindings: &mut Bindings) -> GoalFactory {
        let mut draft = Substitution::new();
        draft.add_object_slot(bindings, "actor", None, true, false, true);
        draft.add_object_slot(bindings, "base", None, true, false, false);
        GoalFactory::new("GoHome", always(), always(), draft)
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!(
            CopyRule::parse("actor", "who").unwrap(),
            CopyRule::Alias {
                from: "actor".into(),
                to: "who".into()
            }
        );
        assert!(matches!(
            CopyRule::parse("actor->home", "base").unwrap(),
            CopyRule::Propagate { .. }
        ));
        assert!(CopyRule::parse("a->b->c", "x").is_err());
        assert!(CopyRule::parse("->home", "x").is_err());
    }

    #[test]
    fn test_alias_shares_slot_with_parent() {
        let mut fx = fixture();
        let goal = factory(&mut fx.bindings)
            .with_rule("actor", "actor")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap();

        assert_eq!(goal.substitution().slot("actor"), fx.parent.slot("actor"));
        assert!(goal.substitution().is_actor("actor"));

        let source = goal.substitution().source(&fx.bindings, "actor").unwrap();
        fx.bindings.set_object(source, None);
        assert_eq!(fx.parent.object(&fx.bindings, "actor"), None);
    }

    #[test]
    fn test_propagation_is_independent_copy() {
        let mut fx = fixture();
        let goal = factory(&mut fx.bindings)
            .with_rule("actor->home", "base")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap();

        assert_eq!(goal.substitution().object(&fx.bindings, "base"), Some(fx.home));

        let source = goal.substitution().source(&fx.bindings, "base").unwrap();
        fx.bindings.set_object(source, None);
        assert_eq!(fx.parent.object(&fx.bindings, "actor"), Some(fx.actor));
    }

    #[test]
    fn test_propagation_into_unknown_role_adds_slot() {
        let mut fx = fixture();
        let goal = factory(&mut fx.bindings)
            .with_rule("actor->home", "shelter")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap();
        assert_eq!(goal.substitution().object(&fx.bindings, "shelter"), Some(fx.home));
    }

    #[test]
    fn test_missing_parent_slot_fails() {
        let mut fx = fixture();
        let err = factory(&mut fx.bindings)
            .with_rule("victim", "actor")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap_err();
        assert_eq!(err, GoalError::MissingParentSlot("victim".into()));
    }

    #[test]
    fn test_empty_propagation_source_fails() {
        let mut fx = fixture();
        let source = fx.parent.source(&fx.bindings, "actor").unwrap();
        fx.bindings.set_object(source, None);
        let err = factory(&mut fx.bindings)
            .with_rule("actor->home", "base")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap_err();
        assert_eq!(err, GoalError::EmptySource("actor".into()));
    }

    #[test]
    fn test_attribute_errors() {
        let mut fx = fixture();
        let missing = factory(&mut fx.bindings)
            .with_rule("actor->wallet", "base")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap_err();
        assert!(matches!(missing, GoalError::MissingAttribute { .. }));

        let wrong_type = factory(&mut fx.bindings)
            .with_rule("actor->thirst", "base")
            .try_create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap_err();
        assert_eq!(
            wrong_type,
            GoalError::NotAnObject {
                attribute: "thirst".into(),
                found: "fuzzy"
            }
        );
    }

    #[test]
    fn test_create_goal_returns_none_on_failure() {
        let mut fx = fixture();
        let goal = factory(&mut fx.bindings)
            .with_rule("actor", "actor")
            .with_rule("actor->nothing", "base")
            .create_goal(&mut fx.bindings, &fx.world, &fx.parent);
        assert!(goal.is_none());
    }

    #[test]
    fn test_parameters_and_id_are_copied() {
        let mut fx = fixture();
        let goal = factory(&mut fx.bindings)
            .with_parameter("lod", Value::Integer(3))
            .create_goal(&mut fx.bindings, &fx.world, &fx.parent)
            .unwrap();
        assert_eq!(goal.goal_id(), "GoHome");
        assert_eq!(goal.parameters().get("lod"), Some(&Value::Integer(3)));
        assert!(goal.trigger().evaluate(&fx.world, &fx.bindings));
    }
}
