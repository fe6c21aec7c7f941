//! Expansion of a process into subgoals

use crate::binding::{Bindings, Substitution};
use crate::process::goal::{Goal, GoalFactory};
use crate::world::World;

/// Ordered subgoals replacing an atomic process at a finer level of detail
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub goals: Vec<Goal>,
}

impl Expansion {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self { goals }
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

/// Builds an expansion by running each subgoal factory on the parent roles
#[derive(Debug, Clone, Default)]
pub struct ExpansionProducer {
    subgoals: Vec<GoalFactory>,
}

impl ExpansionProducer {
    pub fn new(subgoals: Vec<GoalFactory>) -> Self {
        Self { subgoals }
    }

    /// Goals that cannot be built are logged and left out
    pub fn expansion(
        &self,
        bindings: &mut Bindings,
        world: &World,
        parent: &Substitution,
    ) -> Expansion {
        let goals = self
            .subgoals
            .iter()
            .filter_map(|factory| factory.create_goal(bindings, world, parent))
            .collect();
        Expansion::new(goals)
    }
}
