//! Registry of process templates by process id and by goal id

use ahash::AHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::process::template::ProcessTemplate;

new_key_type! {
    /// Handle of a registered template
    pub struct TemplateKey;
}

#[derive(Debug, Default)]
pub struct ProcessDb {
    templates: SlotMap<TemplateKey, ProcessTemplate>,
    by_process: AHashMap<String, TemplateKey>,
    by_goal: AHashMap<String, Vec<TemplateKey>>,
}

impl ProcessDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template
    ///
    /// A later template with the same process id replaces the earlier one
    /// in the process-id index; the goal index keeps both.
    pub fn register(&mut self, template: ProcessTemplate) -> TemplateKey {
        let process_id = template.process_id().to_string();
        let goal_id = template.goal_id().to_string();
        let key = self.templates.insert(template);

        if self.by_process.insert(process_id.clone(), key).is_some() {
            tracing::debug!(process = %process_id, "Process template replaced");
        }
        self.by_goal.entry(goal_id).or_default().push(key);
        key
    }

    pub fn get(&self, key: TemplateKey) -> Option<&ProcessTemplate> {
        self.templates.get(key)
    }

    pub fn get_mut(&mut self, key: TemplateKey) -> Option<&mut ProcessTemplate> {
        self.templates.get_mut(key)
    }

    pub fn key_of(&self, process_id: &str) -> Option<TemplateKey> {
        self.by_process.get(process_id).copied()
    }

    pub fn by_process_id(&self, process_id: &str) -> Option<&ProcessTemplate> {
        self.key_of(process_id).and_then(|key| self.templates.get(key))
    }

    pub fn by_process_id_mut(&mut self, process_id: &str) -> Option<&mut ProcessTemplate> {
        let key = self.key_of(process_id)?;
        self.templates.get_mut(key)
    }

    /// Every template able to realize a goal, in registration order
    pub fn by_goal_id(&self, goal_id: &str) -> Vec<&ProcessTemplate> {
        self.by_goal
            .get(goal_id)
            .map(|keys| keys.iter().filter_map(|k| self.templates.get(*k)).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TemplateKey, &ProcessTemplate)> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.by_process.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_process.is_empty()
    }
}
