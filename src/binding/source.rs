//! Source - an observable cell holding at most one object reference

use crate::binding::observer::Observers;
use crate::binding::SourceKey;
use crate::core::types::ObjectId;

/// Published after a source's object was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChanged {
    pub source: SourceKey,
    pub old: Option<ObjectId>,
    pub new: Option<ObjectId>,
}

#[derive(Debug, Default)]
pub struct Source {
    pub(crate) object: Option<ObjectId>,
    pub(crate) observers: Observers<SourceChanged>,
}

impl Source {
    pub fn new(object: Option<ObjectId>) -> Self {
        Self {
            object,
            observers: Observers::new(),
        }
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
