//! IveProcess - one instantiated process with its notification hooks

use serde::Serialize;

use crate::binding::{ListenerId, Observers, Substitution};
use crate::core::types::Params;
use crate::process::result::ProcessResult;
use crate::trigger::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessEventKind {
    Finished(ProcessResult),
    Expanded,
    Shrunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessEvent {
    pub process_id: String,
    pub goal_id: String,
    pub kind: ProcessEventKind,
}

#[derive(Debug)]
pub struct IveProcess {
    process_id: String,
    goal_id: String,
    substitution: Substitution,
    parameters: Params,
    context: Box<dyn Trigger>,
    on_finish: Observers<ProcessEvent>,
    on_expand: Observers<ProcessEvent>,
    on_shrink: Observers<ProcessEvent>,
    result: Option<ProcessResult>,
}

impl IveProcess {
    pub fn new(
        process_id: impl Into<String>,
        goal_id: impl Into<String>,
        substitution: Substitution,
        parameters: Params,
        context: Box<dyn Trigger>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            goal_id: goal_id.into(),
            substitution,
            parameters,
            context,
            on_finish: Observers::new(),
            on_expand: Observers::new(),
            on_shrink: Observers::new(),
            result: None,
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    pub fn substitution_mut(&mut self) -> &mut Substitution {
        &mut self.substitution
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn context(&self) -> &dyn Trigger {
        self.context.as_ref()
    }

    pub fn result(&self) -> Option<ProcessResult> {
        self.result
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    // === HOOKS ===

    pub fn on_finish(&mut self, listener: impl FnMut(&ProcessEvent) + 'static) -> ListenerId {
        self.on_finish.subscribe(listener)
    }

    pub fn on_expand(&mut self, listener: impl FnMut(&ProcessEvent) + 'static) -> ListenerId {
        self.on_expand.subscribe(listener)
    }

    pub fn on_shrink(&mut self, listener: impl FnMut(&ProcessEvent) + 'static) -> ListenerId {
        self.on_shrink.subscribe(listener)
    }

    /// Record the terminal result and notify finish listeners
    pub fn finish(&mut self, result: ProcessResult) {
        tracing::debug!(process = %self.process_id, ?result, "Process finished");
        self.result = Some(result);
        let event = self.event(ProcessEventKind::Finished(result));
        self.on_finish.notify(&event);
    }

    pub fn expand(&mut self) {
        let event = self.event(ProcessEventKind::Expanded);
        self.on_expand.notify(&event);
    }

    pub fn shrink(&mut self) {
        let event = self.event(ProcessEventKind::Shrunk);
        self.on_shrink.notify(&event);
    }

    fn event(&self, kind: ProcessEventKind) -> ProcessEvent {
        ProcessEvent {
            process_id: self.process_id.clone(),
            goal_id: self.goal_id.clone(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::ConstantTrigger;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_hooks_fire_with_process_identity() {
        let mut process = IveProcess::new(
            "Drink",
            "DrinkGoal",
            Substitution::new(),
            Params::new(),
            Box::new(ConstantTrigger(true)),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        process.on_expand(move |e| sink.borrow_mut().push(e.kind));
        let sink = Rc::clone(&events);
        process.on_shrink(move |e| sink.borrow_mut().push(e.kind));
        let sink = Rc::clone(&events);
        process.on_finish(move |e| sink.borrow_mut().push(e.kind));

        process.expand();
        process.shrink();
        process.finish(ProcessResult::Ok);

        assert_eq!(
            *events.borrow(),
            vec![
                ProcessEventKind::Expanded,
                ProcessEventKind::Shrunk,
                ProcessEventKind::Finished(ProcessResult::Ok)
            ]
        );
        assert_eq!(process.result(), Some(ProcessResult::Ok));
    }
}
