//! World model: objects, the location hierarchy, and neighbour joints
//!
//! Locations are objects whose position is their parent way-point, so every
//! hierarchy query works the same for an actor and for the place it stands.

pub mod location;
pub mod objects;

use ahash::AHashMap;

use crate::core::error::{IveError, Result};
use crate::core::types::{ObjectId, Value};

pub use location::{Joint, SpaceState, WayPoint};
pub use objects::{IveObject, WorldObjects};

pub const LOCATION_CLASS: &str = "/location/WayPoint";

#[derive(Debug, Clone, Default)]
pub struct World {
    pub objects: WorldObjects,
    locations: AHashMap<ObjectId, WayPoint>,
    next_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    /// Create a way-point under `parent` (or a root when `None`)
    pub fn spawn_location(
        &mut self,
        name: impl Into<String>,
        parent: Option<ObjectId>,
        lod: i32,
    ) -> Result<ObjectId> {
        if let Some(p) = parent {
            if !self.locations.contains_key(&p) {
                return Err(IveError::ObjectNotFound(p));
            }
        }

        let id = self.allocate_id();
        let mut object = IveObject::new(id, name, LOCATION_CLASS);
        object.position = parent;
        object.lod = lod;
        self.objects.add(object);
        self.locations.insert(id, WayPoint::new(id, parent));

        if let Some(wp) = parent.and_then(|p| self.locations.get_mut(&p)) {
            wp.children.push(id);
        }

        tracing::debug!("Spawned location {:?} under {:?}", id, parent);
        Ok(id)
    }

    /// Create an object standing on `location`
    pub fn spawn_object(
        &mut self,
        name: impl Into<String>,
        class: impl Into<String>,
        location: ObjectId,
        substantial: bool,
    ) -> Result<ObjectId> {
        let lod = self
            .objects
            .get(location)
            .filter(|_| self.locations.contains_key(&location))
            .map(|loc| loc.lod)
            .ok_or(IveError::ObjectNotFound(location))?;

        let id = self.allocate_id();
        let mut object = IveObject::new(id, name, class);
        object.position = Some(location);
        object.substantial = substantial;
        object.lod = lod;
        self.objects.add(object);
        Ok(id)
    }

    /// Join two way-points in both directions
    pub fn connect(&mut self, a: ObjectId, b: ObjectId, weight: f32) -> Result<()> {
        if !self.locations.contains_key(&b) {
            return Err(IveError::ObjectNotFound(b));
        }
        self.locations
            .get_mut(&a)
            .ok_or(IveError::ObjectNotFound(a))?
            .connect(b, weight);
        if let Some(wp) = self.locations.get_mut(&b) {
            wp.connect(a, weight);
        }
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> Option<&IveObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut IveObject> {
        self.objects.get_mut(id)
    }

    pub fn location(&self, id: ObjectId) -> Option<&WayPoint> {
        self.locations.get(&id)
    }

    pub fn is_location(&self, id: ObjectId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn position(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(id).and_then(|o| o.position)
    }

    pub fn attribute(&self, id: ObjectId, name: &str) -> Option<&Value> {
        self.objects.get(id).and_then(|o| o.attribute(name))
    }

    /// Enclosing locations of `id`, innermost first
    pub fn ancestors(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut current = self.position(id);
        while let Some(loc) = current {
            if chain.contains(&loc) || loc == id {
                tracing::warn!("Position cycle detected at {:?}", loc);
                break;
            }
            chain.push(loc);
            current = self.position(loc);
        }
        chain
    }

    /// True when `ancestor` is `id` itself or encloses it
    pub fn is_parent(&self, id: ObjectId, ancestor: ObjectId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// True when one of the two encloses the other
    pub fn are_nested(&self, a: ObjectId, b: ObjectId) -> bool {
        self.is_parent(a, b) || self.is_parent(b, a)
    }

    /// Innermost location enclosing both (either may be the answer itself)
    pub fn least_common_parent(&self, a: ObjectId, b: ObjectId) -> Option<ObjectId> {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|candidate| self.is_parent(b, *candidate))
    }

    /// Direct child of `ancestor` on the path down to `descendant`
    ///
    /// `None` when `descendant` is `ancestor` itself or not below it.
    pub fn child_preceding(&self, ancestor: ObjectId, descendant: ObjectId) -> Option<ObjectId> {
        let mut current = descendant;
        for parent in self.ancestors(descendant) {
            if parent == ancestor {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    pub fn neighbours(&self, location: ObjectId) -> &[Joint] {
        self.locations
            .get(&location)
            .map(|wp| wp.joints.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_weight(&self, from: ObjectId, to: ObjectId) -> Option<f32> {
        self.locations
            .get(&from)
            .and_then(|wp| wp.joint_to(to))
            .map(|j| j.weight)
    }

    /// Occupied when a substantial object other than `ignore` stands there
    pub fn space_state(&self, location: ObjectId, ignore: Option<ObjectId>) -> SpaceState {
        let occupied = self
            .objects
            .at(location)
            .any(|o| o.substantial && Some(o.id) != ignore && !self.is_location(o.id));
        if occupied {
            SpaceState::Occupied
        } else {
            SpaceState::Empty
        }
    }

    /// Place an object on a new location
    pub fn move_object(&mut self, id: ObjectId, target: ObjectId) -> Result<()> {
        if !self.locations.contains_key(&target) {
            return Err(IveError::ObjectNotFound(target));
        }
        let object = self.objects.get_mut(id).ok_or(IveError::ObjectNotFound(id))?;
        tracing::debug!("Moving {} from {:?} to {:?}", object.name, object.position, target);
        object.position = Some(target);
        Ok(())
    }

    pub fn set_lod(&mut self, id: ObjectId, lod: i32) -> Result<()> {
        self.objects
            .get_mut(id)
            .ok_or(IveError::ObjectNotFound(id))?
            .lod = lod;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// village > street > {house, yard}, house <-> yard
    fn village() -> (World, [ObjectId; 4]) {
        let mut world = World::new();
        let village = world.spawn_location("village", None, 0).unwrap();
        let street = world.spawn_location("street", Some(village), 1).unwrap();
        let house = world.spawn_location("house", Some(street), 2).unwrap();
        let yard = world.spawn_location("yard", Some(street), 2).unwrap();
        world.connect(house, yard, 2.0).unwrap();
        (world, [village, street, house, yard])
    }

    #[test]
    fn test_ancestors_innermost_first() {
        let (world, [village, street, house, _]) = village();
        assert_eq!(world.ancestors(house), vec![street, village]);
        assert!(world.ancestors(village).is_empty());
    }

    #[test]
    fn test_is_parent_includes_self() {
        let (world, [village, street, house, yard]) = village();
        assert!(world.is_parent(house, house));
        assert!(world.is_parent(house, village));
        assert!(!world.is_parent(street, house));
        assert!(!world.is_parent(house, yard));
        assert!(world.are_nested(street, house));
    }

    #[test]
    fn test_least_common_parent() {
        let (world, [village, street, house, yard]) = village();
        assert_eq!(world.least_common_parent(house, yard), Some(street));
        assert_eq!(world.least_common_parent(house, street), Some(street));
        assert_eq!(world.least_common_parent(house, house), Some(house));
        assert_eq!(world.least_common_parent(village, yard), Some(village));
    }

    #[test]
    fn test_child_preceding() {
        let (world, [village, street, house, _]) = village();
        assert_eq!(world.child_preceding(village, house), Some(street));
        assert_eq!(world.child_preceding(street, house), Some(house));
        assert_eq!(world.child_preceding(house, house), None);
        assert_eq!(world.child_preceding(house, village), None);
    }

    #[test]
    fn test_joints_are_symmetric() {
        let (world, [_, street, house, yard]) = village();
        assert_eq!(world.edge_weight(house, yard), Some(2.0));
        assert_eq!(world.edge_weight(yard, house), Some(2.0));
        assert_eq!(world.edge_weight(house, street), None);
        assert_eq!(world.neighbours(street).len(), 0);
    }

    #[test]
    fn test_objects_inherit_location_lod() {
        let (mut world, [_, _, house, _]) = village();
        let joe = world.spawn_object("joe", "/person", house, true).unwrap();
        assert_eq!(world.object(joe).unwrap().lod, 2);
        assert_eq!(world.ancestors(joe)[0], house);
    }

    #[test]
    fn test_space_state_tracks_substantial_objects() {
        let (mut world, [_, _, house, yard]) = village();
        world.spawn_object("cup", "/object/Glass", yard, false).unwrap();
        assert_eq!(world.space_state(yard, None), SpaceState::Empty);

        let joe = world.spawn_object("joe", "/person", house, true).unwrap();
        assert_eq!(world.space_state(house, None), SpaceState::Occupied);
        assert_eq!(world.space_state(house, Some(joe)), SpaceState::Empty);
    }

    #[test]
    fn test_move_object_requires_location() {
        let (mut world, [_, _, house, yard]) = village();
        let joe = world.spawn_object("joe", "/person", house, true).unwrap();
        world.move_object(joe, yard).unwrap();
        assert_eq!(world.position(joe), Some(yard));

        let err = world.move_object(joe, ObjectId(999)).unwrap_err();
        assert!(matches!(err, IveError::ObjectNotFound(ObjectId(999))));
    }

    #[test]
    fn test_spawn_under_missing_parent_fails() {
        let mut world = World::new();
        assert!(world.spawn_location("lost", Some(ObjectId(42)), 0).is_err());
    }
}
