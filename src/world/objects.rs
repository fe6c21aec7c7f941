//! World objects storage and queries

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{ObjectId, Value};

/// A simulated object: an actor, an item, or a location itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IveObject {
    pub id: ObjectId,
    pub name: String,
    /// Class path such as `/object/Beer`
    pub class: String,
    /// Enclosing location
    pub position: Option<ObjectId>,
    /// Substantial objects occupy the way-point they stand on
    pub substantial: bool,
    /// Level of detail the object currently exists at
    pub lod: i32,
    attributes: AHashMap<String, Value>,
}

impl IveObject {
    pub fn new(id: ObjectId, name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class: class.into(),
            position: None,
            substantial: false,
            lod: 0,
            attributes: AHashMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.attributes.get_mut(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Class membership by path prefix: `/object/Beer` is inside `/object`
    pub fn is_of_class(&self, class: &str) -> bool {
        let class = class.trim_end_matches('/');
        if class.is_empty() {
            return true;
        }
        self.class == class
            || (self.class.starts_with(class)
                && self.class.as_bytes().get(class.len()) == Some(&b'/'))
    }
}

/// Storage for all world objects
#[derive(Debug, Clone, Default)]
pub struct WorldObjects {
    instances: AHashMap<ObjectId, IveObject>,
}

impl WorldObjects {
    pub fn new() -> Self {
        Self {
            instances: AHashMap::new(),
        }
    }

    /// Add a world object, replacing one with the same id
    pub fn add(&mut self, object: IveObject) {
        self.instances.insert(object.id, object);
    }

    pub fn get(&self, id: ObjectId) -> Option<&IveObject> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut IveObject> {
        self.instances.get_mut(&id)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<IveObject> {
        self.instances.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Objects whose position is the given location
    pub fn at(&self, location: ObjectId) -> impl Iterator<Item = &IveObject> {
        self.instances
            .values()
            .filter(move |obj| obj.position == Some(location))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IveObject> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
