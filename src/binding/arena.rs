//! Binding arena: every source and slot lives here, addressed by key
//!
//! Two substitutions holding the same `SlotKey` share one binding; a
//! snapshot allocates fresh cells holding the same object references.

use slotmap::{SecondaryMap, SlotMap};

use crate::binding::observer::ListenerId;
use crate::binding::slot::Slot;
use crate::binding::source::{Source, SourceChanged};
use crate::binding::substitution::Substitution;
use crate::binding::{SlotKey, SourceKey};
use crate::core::types::ObjectId;

#[derive(Debug, Default)]
pub struct Bindings {
    sources: SlotMap<SourceKey, Source>,
    slots: SlotMap<SlotKey, Slot>,
}

impl Bindings {
    pub fn new() -> Self {
        Self {
            sources: SlotMap::with_key(),
            slots: SlotMap::with_key(),
        }
    }

    // === SOURCES ===

    pub fn new_source(&mut self, object: Option<ObjectId>) -> SourceKey {
        self.sources.insert(Source::new(object))
    }

    pub fn source(&self, key: SourceKey) -> Option<&Source> {
        self.sources.get(key)
    }

    /// Object held by a source (`None` for an empty or dropped source)
    pub fn object(&self, key: SourceKey) -> Option<ObjectId> {
        self.sources.get(key).and_then(|s| s.object)
    }

    /// Replace the held object and notify listeners before returning
    ///
    /// Returns false when the source no longer exists.
    pub fn set_object(&mut self, key: SourceKey, object: Option<ObjectId>) -> bool {
        let Some(source) = self.sources.get_mut(key) else {
            return false;
        };
        let old = std::mem::replace(&mut source.object, object);
        source.observers.notify(&SourceChanged {
            source: key,
            old,
            new: object,
        });
        true
    }

    pub fn subscribe(
        &mut self,
        key: SourceKey,
        listener: impl FnMut(&SourceChanged) + 'static,
    ) -> Option<ListenerId> {
        self.sources
            .get_mut(key)
            .map(|s| s.observers.subscribe(listener))
    }

    pub fn unsubscribe(&mut self, key: SourceKey, id: ListenerId) -> bool {
        self.sources
            .get_mut(key)
            .map(|s| s.observers.unsubscribe(id))
            .unwrap_or(false)
    }

    // === SLOTS ===

    pub fn insert_slot(&mut self, slot: Slot) -> SlotKey {
        self.slots.insert(slot)
    }

    pub fn slot(&self, key: SlotKey) -> Option<&Slot> {
        self.slots.get(key)
    }

    pub fn slot_mut(&mut self, key: SlotKey) -> Option<&mut Slot> {
        self.slots.get_mut(key)
    }

    /// First object bound in a slot
    pub fn slot_object(&self, key: SlotKey) -> Option<ObjectId> {
        self.slots
            .get(key)
            .and_then(Slot::first)
            .and_then(|s| self.object(s))
    }

    /// A slot is empty when none of its sources holds an object
    pub fn slot_is_empty(&self, key: SlotKey) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.sources.iter().all(|s| self.object(*s).is_none()))
            .unwrap_or(true)
    }

    /// Copy slot metadata, keeping the same sources
    pub fn share_slot(&mut self, key: SlotKey) -> Option<SlotKey> {
        let copy = self.slots.get(key)?.clone();
        Some(self.slots.insert(copy))
    }

    /// Copy slot metadata and allocate new sources over the same objects
    pub fn snapshot_slot(&mut self, key: SlotKey) -> Option<SlotKey> {
        let mut copy = self.slots.get(key)?.clone();
        let mut fresh = Vec::with_capacity(copy.sources.len());
        for key in &copy.sources {
            let object = self.object(*key);
            fresh.push(self.sources.insert(Source::new(object)));
        }
        copy.sources = fresh;
        Some(self.slots.insert(copy))
    }

    // === HOUSEKEEPING ===

    /// Drop every slot and source no live substitution can reach
    pub fn retain_reachable(&mut self, roots: &[&Substitution]) {
        let mut live_slots: SecondaryMap<SlotKey, ()> = SecondaryMap::new();
        let mut live_sources: SecondaryMap<SourceKey, ()> = SecondaryMap::new();

        for key in roots.iter().flat_map(|subst| subst.slot_keys()) {
            if let Some(slot) = self.slots.get(key) {
                live_slots.insert(key, ());
                for source in &slot.sources {
                    live_sources.insert(*source, ());
                }
            }
        }

        let before = (self.slots.len(), self.sources.len());
        self.slots.retain(|key, _| live_slots.contains_key(key));
        self.sources.retain(|key, _| live_sources.contains_key(key));
        tracing::debug!(
            "Binding sweep dropped {} slots and {} sources",
            before.0 - self.slots.len(),
            before.1 - self.sources.len()
        );
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_set_object_notifies_before_returning() {
        let mut bindings = Bindings::new();
        let key = bindings.new_source(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bindings.subscribe(key, move |e| sink.borrow_mut().push((e.old, e.new)));

        assert!(bindings.set_object(key, Some(ObjectId(3))));
        assert_eq!(*seen.borrow(), vec![(None, Some(ObjectId(3)))]);
        assert_eq!(bindings.object(key), Some(ObjectId(3)));
    }

    #[test]
    fn test_share_slot_links_bindings() {
        let mut bindings = Bindings::new();
        let source = bindings.new_source(Some(ObjectId(1)));
        let original = bindings.insert_slot(Slot::with_source(source));
        let shared = bindings.share_slot(original).unwrap();

        bindings.slot_mut(shared).unwrap().mandatory = false;
        assert!(bindings.slot(original).unwrap().mandatory);

        let first = bindings.slot(shared).unwrap().first().unwrap();
        bindings.set_object(first, Some(ObjectId(2)));
        assert_eq!(bindings.slot_object(original), Some(ObjectId(2)));
    }

    #[test]
    fn test_snapshot_slot_decouples_bindings() {
        let mut bindings = Bindings::new();
        let source = bindings.new_source(Some(ObjectId(1)));
        let original = bindings.insert_slot(Slot::with_source(source));
        let snapshot = bindings.snapshot_slot(original).unwrap();
        assert_eq!(bindings.slot_object(snapshot), Some(ObjectId(1)));

        let copy = bindings.slot(snapshot).unwrap().first().unwrap();
        bindings.set_object(copy, Some(ObjectId(9)));
        assert_eq!(bindings.slot_object(original), Some(ObjectId(1)));
    }

    #[test]
    fn test_snapshot_listeners_are_independent() {
        let mut bindings = Bindings::new();
        let source = bindings.new_source(None);
        let original = bindings.insert_slot(Slot::with_source(source));
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        bindings.subscribe(source, move |_| *counter.borrow_mut() += 1);

        let snapshot = bindings.snapshot_slot(original).unwrap();
        let copy = bindings.slot(snapshot).unwrap().first().unwrap();
        bindings.set_object(copy, Some(ObjectId(4)));

        assert_eq!(*hits.borrow(), 0);
        assert_eq!(bindings.source(copy).unwrap().observer_count(), 0);
    }

    #[test]
    fn test_empty_slot_means_no_object() {
        let mut bindings = Bindings::new();
        let empty_source = bindings.new_source(None);
        let no_sources = bindings.insert_slot(Slot::new());
        let null_source = bindings.insert_slot(Slot::with_source(empty_source));
        assert!(bindings.slot_is_empty(no_sources));
        assert!(bindings.slot_is_empty(null_source));

        bindings.set_object(empty_source, Some(ObjectId(5)));
        assert!(!bindings.slot_is_empty(null_source));
    }

    #[test]
    fn test_retain_reachable_sweeps_orphans() {
        let mut bindings = Bindings::new();
        let mut kept = Substitution::new();
        kept.add_object_slot(&mut bindings, "actor", Some(ObjectId(1)), true, false, true);
        let mut dropped = Substitution::new();
        dropped.add_object_slot(&mut bindings, "target", Some(ObjectId(2)), true, false, false);
        assert_eq!(bindings.slot_count(), 2);

        bindings.retain_reachable(&[&kept]);
        assert_eq!(bindings.slot_count(), 1);
        assert_eq!(bindings.source_count(), 1);
        assert_eq!(kept.object(&bindings, "actor"), Some(ObjectId(1)));
    }
}
