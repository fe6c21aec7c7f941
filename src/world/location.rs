//! Way-points - the nodes of the location hierarchy
//!
//! Every way-point is also an object in `WorldObjects`; this record adds
//! the tree structure and the weighted joints between neighbours.

use serde::{Deserialize, Serialize};

use crate::core::types::ObjectId;

/// Weighted edge to a neighbouring way-point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub target: ObjectId,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceState {
    Empty,
    Occupied,
}

/// A location in the world hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayPoint {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    pub joints: Vec<Joint>,
}

impl WayPoint {
    pub fn new(id: ObjectId, parent: Option<ObjectId>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// Add or re-weight a joint
    pub fn connect(&mut self, target: ObjectId, weight: f32) {
        match self.joints.iter_mut().find(|j| j.target == target) {
            Some(joint) => joint.weight = weight,
            None => self.joints.push(Joint { target, weight }),
        }
    }

    pub fn joint_to(&self, target: ObjectId) -> Option<&Joint> {
        self.joints.iter().find(|j| j.target == target)
    }
}
