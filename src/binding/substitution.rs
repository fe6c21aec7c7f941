//! Substitution - named role bindings of a goal or a process
//!
//! A substitution maps role names to slot keys. The actor roles are a subset
//! of the same map, so the actor view and the full view always see the same
//! slot. Cloning a substitution (`share`) aliases every binding; `snapshot`
//! allocates new cells over the same objects.

use std::collections::{BTreeMap, BTreeSet};

use crate::binding::arena::Bindings;
use crate::binding::slot::Slot;
use crate::binding::{SlotKey, SourceKey};
use crate::core::types::{LodRange, ObjectId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    slots: BTreeMap<String, SlotKey>,
    actors: BTreeSet<String>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    // === SLOT MANAGEMENT ===

    /// Bind `role` to an existing slot; never overwrites
    pub fn add_slot(&mut self, role: impl Into<String>, slot: SlotKey, actor: bool) -> bool {
        let role = role.into();
        if self.slots.contains_key(&role) {
            return false;
        }
        if actor {
            self.actors.insert(role.clone());
        }
        self.slots.insert(role, slot);
        true
    }

    /// Allocate `slot` in the arena and bind it to `role`
    pub fn add_new_slot(
        &mut self,
        bindings: &mut Bindings,
        role: impl Into<String>,
        slot: Slot,
        actor: bool,
    ) -> bool {
        let role = role.into();
        if self.slots.contains_key(&role) {
            return false;
        }
        let key = bindings.insert_slot(slot);
        self.add_slot(role, key, actor)
    }

    /// Allocate a single-source slot holding `object`
    pub fn add_object_slot(
        &mut self,
        bindings: &mut Bindings,
        role: impl Into<String>,
        object: Option<ObjectId>,
        mandatory: bool,
        variable: bool,
        actor: bool,
    ) -> bool {
        let role = role.into();
        if self.slots.contains_key(&role) {
            return false;
        }
        let source = bindings.new_source(object);
        let slot = Slot::with_source(source)
            .mandatory(mandatory)
            .variable(variable);
        self.add_new_slot(bindings, role, slot, actor)
    }

    /// Bind `role` to `slot`, replacing any previous binding
    ///
    /// Actor membership of an existing role is kept.
    pub fn put_slot(&mut self, role: impl Into<String>, slot: SlotKey) -> Option<SlotKey> {
        self.slots.insert(role.into(), slot)
    }

    pub fn delete_slot(&mut self, role: &str) -> bool {
        self.actors.remove(role);
        self.slots.remove(role).is_some()
    }

    pub fn slot(&self, role: &str) -> Option<SlotKey> {
        self.slots.get(role).copied()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.slots.contains_key(role)
    }

    pub fn is_actor(&self, role: &str) -> bool {
        self.actors.contains(role)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn actor_keys(&self) -> impl Iterator<Item = &str> {
        self.actors.iter().map(String::as_str)
    }

    pub fn slot_keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.slots.values().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // === SLOT QUERIES ===

    pub fn slot_is_list(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot_ref(bindings, role).is_some_and(Slot::is_list)
    }

    pub fn slot_is_alone(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot_ref(bindings, role).is_some_and(Slot::is_alone)
    }

    /// False for unknown roles, like the other slot predicates
    pub fn slot_is_empty(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot(role)
            .is_some_and(|key| bindings.slot_is_empty(key))
    }

    pub fn is_mandatory(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot_ref(bindings, role).is_some_and(|s| s.mandatory)
    }

    pub fn is_optional(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot_ref(bindings, role).is_some_and(|s| !s.mandatory)
    }

    pub fn is_variable(&self, bindings: &Bindings, role: &str) -> bool {
        self.slot_ref(bindings, role).is_some_and(|s| s.variable)
    }

    pub fn slot_lod(&self, bindings: &Bindings, role: &str) -> Option<LodRange> {
        self.slot_ref(bindings, role).map(|s| s.lod)
    }

    fn slot_ref<'b>(&self, bindings: &'b Bindings, role: &str) -> Option<&'b Slot> {
        self.slot(role).and_then(|key| bindings.slot(key))
    }

    // === SOURCES ===

    /// First source of a role
    pub fn source(&self, bindings: &Bindings, role: &str) -> Option<SourceKey> {
        self.slot_ref(bindings, role).and_then(Slot::first)
    }

    pub fn sources<'b>(&self, bindings: &'b Bindings, role: &str) -> &'b [SourceKey] {
        self.slot_ref(bindings, role)
            .map(|s| s.sources.as_slice())
            .unwrap_or(&[])
    }

    /// Object held by the first source of a role
    pub fn object(&self, bindings: &Bindings, role: &str) -> Option<ObjectId> {
        self.slot(role).and_then(|key| bindings.slot_object(key))
    }

    pub fn objects(&self, bindings: &Bindings, role: &str) -> Vec<ObjectId> {
        self.sources(bindings, role)
            .iter()
            .filter_map(|s| bindings.object(*s))
            .collect()
    }

    /// Bound objects of every actor role, in role order
    pub fn actor_objects(&self, bindings: &Bindings) -> Vec<ObjectId> {
        self.actors
            .iter()
            .filter_map(|role| self.object(bindings, role))
            .collect()
    }

    /// Make `source` the only source of a role
    pub fn set_source(&self, bindings: &mut Bindings, role: &str, source: SourceKey) -> bool {
        self.set_sources(bindings, role, vec![source])
    }

    pub fn set_sources(
        &self,
        bindings: &mut Bindings,
        role: &str,
        sources: Vec<SourceKey>,
    ) -> bool {
        self.with_slot(bindings, role, |slot| slot.sources = sources)
    }

    pub fn add_source(&self, bindings: &mut Bindings, role: &str, source: SourceKey) -> bool {
        self.with_slot(bindings, role, |slot| slot.sources.push(source))
    }

    pub fn delete_source(&self, bindings: &mut Bindings, role: &str, source: SourceKey) -> bool {
        self.with_slot(bindings, role, |slot| slot.sources.retain(|s| *s != source))
    }

    pub fn clear_source(&self, bindings: &mut Bindings, role: &str) -> bool {
        self.with_slot(bindings, role, |slot| slot.sources.clear())
    }

    fn with_slot(&self, bindings: &mut Bindings, role: &str, f: impl FnOnce(&mut Slot)) -> bool {
        match self.slot(role).and_then(|key| bindings.slot_mut(key)) {
            Some(slot) => {
                f(slot);
                true
            }
            None => false,
        }
    }

    // === DUPLICATION ===

    /// Alias every binding
    pub fn share(&self) -> Substitution {
        self.clone()
    }

    /// Fresh slots and sources over the same objects
    pub fn snapshot(&self, bindings: &mut Bindings) -> Substitution {
        let mut copy = Substitution::new();
        for (role, key) in &self.slots {
            if let Some(fresh) = bindings.snapshot_slot(*key) {
                copy.add_slot(role.clone(), fresh, self.actors.contains(role));
            }
        }
        copy
    }

    /// Adopt the source lists of same-named slots in `other`
    pub fn change_substitution(&self, bindings: &mut Bindings, other: &Substitution) {
        for (role, theirs) in &other.slots {
            let Some(ours) = self.slot(role) else {
                continue;
            };
            let Some(sources) = bindings.slot(*theirs).map(|s| s.sources.clone()) else {
                continue;
            };
            if let Some(slot) = bindings.slot_mut(ours) {
                slot.sources = sources;
            }
        }
    }

    /// Validate against the roles `required` asks for
    ///
    /// Every required role must be present, and non-empty if `required`
    /// marks it mandatory. Actor roles are checked against actor roles.
    pub fn check(&self, bindings: &Bindings, required: &Substitution) -> bool {
        let satisfied = |role: &String, key: &SlotKey, actor: bool| {
            if actor && !self.actors.contains(role) {
                return false;
            }
            let Some(ours) = self.slot(role) else {
                return false;
            };
            let mandatory = bindings.slot(*key).is_some_and(|s| s.mandatory);
            !(mandatory && bindings.slot_is_empty(ours))
        };

        required
            .slots
            .iter()
            .all(|(role, key)| satisfied(role, key, false))
            && required
                .slots
                .iter()
                .filter(|(role, _)| required.actors.contains(*role))
                .all(|(role, key)| satisfied(role, key, true))
    }
}
