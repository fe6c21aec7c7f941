//! Core type definitions used throughout the codebase

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle of a world object (locations are objects too)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Unique identifier of one process run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulation time in milliseconds
pub type SimTime = u64;

/// Closed range of levels of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodRange {
    pub min: i32,
    pub max: i32,
}

impl LodRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Range covering exactly one level
    pub fn exact(lod: i32) -> Self {
        Self { min: lod, max: lod }
    }

    pub fn contains(&self, lod: i32) -> bool {
        self.min <= lod && lod <= self.max
    }

    /// Overlap of two ranges, `None` when they are disjoint
    pub fn intersect(&self, other: &LodRange) -> Option<LodRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(LodRange { min, max })
    }
}

impl Default for LodRange {
    fn default() -> Self {
        Self { min: 0, max: i32::MAX }
    }
}

/// Attribute and parameter value
///
/// Fuzzy values live in `0.0..=1.0`. An object value may be empty, the same
/// way an object attribute can point nowhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Fuzzy(f32),
    Object(Option<ObjectId>),
    Text(String),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_fuzzy(&self) -> Option<f32> {
        match self {
            Value::Fuzzy(v) => Some(*v),
            _ => None,
        }
    }

    /// `Some(target)` for object values (the target itself may be empty)
    pub fn as_object(&self) -> Option<Option<ObjectId>> {
        match self {
            Value::Object(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Fuzzy(_) => "fuzzy",
            Value::Object(_) => "object",
            Value::Text(_) => "text",
        }
    }
}

/// Named process/goal parameters
pub type Params = AHashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lod_intersect_overlapping() {
        let a = LodRange::new(1, 5);
        let b = LodRange::new(3, 8);
        assert_eq!(a.intersect(&b), Some(LodRange::new(3, 5)));
    }

    #[test]
    fn test_lod_intersect_disjoint() {
        let a = LodRange::new(1, 2);
        let b = LodRange::new(3, 4);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn test_lod_default_is_unbounded() {
        let lod = LodRange::default();
        assert!(lod.contains(0));
        assert!(lod.contains(i32::MAX));
        assert!(!lod.contains(-1));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(3).as_integer(), Some(3));
        assert_eq!(Value::Fuzzy(0.5).as_integer(), None);
        assert_eq!(Value::Object(None).as_object(), Some(None));
        assert_eq!(Value::Text("x".into()).as_object(), None);
    }

    #[test]
    fn test_execution_ids_are_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }
}
