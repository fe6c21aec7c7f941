//! Interpreter - schedules executions and drives their atomic operations
//!
//! Every run lives in one of two modes. An atomic run has a commit planned
//! on the agenda; an expanded run has been handed to its subgoals and only
//! waits for an LOD change to come back. The requested mode is derived from
//! the LOD of the run's actors against the template's LOD range.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use serde::Serialize;

use crate::binding::{Bindings, Substitution};
use crate::core::calendar::Calendar;
use crate::core::config::EngineConfig;
use crate::core::error::{IveError, Result};
use crate::core::types::{ExecutionId, LodRange, ObjectId, Params, SimTime};
use crate::process::db::{ProcessDb, TemplateKey};
use crate::process::delegation::GeniusRegistry;
use crate::process::execution::ProcessExecution;
use crate::process::instance::IveProcess;
use crate::process::result::ProcessResult;
use crate::process::template::ExecContext;
use crate::world::World;

/// Everything the interpreter's runs share
#[derive(Debug, Default)]
pub struct Environment {
    pub world: World,
    pub bindings: Bindings,
    pub geniuses: GeniusRegistry,
    pub calendar: Calendar,
    pub config: EngineConfig,
}

impl Environment {
    pub fn new(world: World, config: EngineConfig) -> Self {
        Self {
            world,
            config,
            ..Default::default()
        }
    }

    pub fn context(&mut self) -> ExecContext<'_> {
        let now = self.calendar.now();
        ExecContext::new(
            &mut self.world,
            &mut self.bindings,
            &mut self.geniuses,
            &self.config,
            now,
        )
    }
}

/// How a run relates to its actors' current LOD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessMode {
    /// No actor bound
    Unknown,
    /// Actors are coarser than the process can exist at
    NotExist,
    Atomic,
    Expanded,
    /// Actors disagree
    Conflict,
}

impl ProcessMode {
    fn of_lod(lod: i32, range: LodRange) -> Self {
        if lod < range.min {
            ProcessMode::NotExist
        } else if lod > range.max {
            ProcessMode::Expanded
        } else {
            ProcessMode::Atomic
        }
    }
}

#[derive(Debug)]
struct Run {
    template: TemplateKey,
    process: IveProcess,
    execution: ProcessExecution,
    mode: ProcessMode,
    /// Sequence number of the live agenda entry, if any
    planned: Option<u64>,
}

/// Outcome of a step that may end a run
enum Next {
    Plan(SimTime),
    Destroy(ProcessResult),
}

#[derive(Debug, Default)]
pub struct Interpreter {
    env: Environment,
    db: ProcessDb,
    runs: AHashMap<ExecutionId, Run>,
    agenda: BinaryHeap<Reverse<(SimTime, u64, ExecutionId)>>,
    next_seq: u64,
    results: AHashMap<ExecutionId, ProcessResult>,
}

impl Interpreter {
    pub fn new(env: Environment, db: ProcessDb) -> Self {
        Self {
            env,
            db,
            ..Default::default()
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn db(&self) -> &ProcessDb {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut ProcessDb {
        &mut self.db
    }

    pub fn now(&self) -> SimTime {
        self.env.calendar.now()
    }

    /// Fresh role draft of a registered process
    pub fn sources(&mut self, process_id: &str) -> Result<Substitution> {
        let template = self
            .db
            .by_process_id(process_id)
            .ok_or_else(|| IveError::UnknownProcess(process_id.to_string()))?;
        Ok(template.sources(&mut self.env.bindings))
    }

    /// Bind a registered process to its roles
    pub fn instantiate(
        &self,
        process_id: &str,
        substitution: Substitution,
        parameters: Params,
    ) -> Result<IveProcess> {
        let template = self
            .db
            .by_process_id(process_id)
            .ok_or_else(|| IveError::UnknownProcess(process_id.to_string()))?;
        Ok(template.instantiate(substitution, parameters))
    }

    // === QUERIES ===

    pub fn is_running(&self, id: ExecutionId) -> bool {
        self.runs.contains_key(&id)
    }

    pub fn mode(&self, id: ExecutionId) -> Option<ProcessMode> {
        self.runs.get(&id).map(|run| run.mode)
    }

    /// Terminal result of a run that has ended
    pub fn result(&self, id: ExecutionId) -> Option<ProcessResult> {
        self.results.get(&id).copied()
    }

    /// Remove and return the terminal result of an ended run
    pub fn take_result(&mut self, id: ExecutionId) -> Option<ProcessResult> {
        self.results.remove(&id)
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&ProcessExecution> {
        self.runs.get(&id).map(|run| &run.execution)
    }

    pub fn process(&self, id: ExecutionId) -> Option<&IveProcess> {
        self.runs.get(&id).map(|run| &run.process)
    }

    pub fn process_mut(&mut self, id: ExecutionId) -> Option<&mut IveProcess> {
        self.runs.get_mut(&id).map(|run| &mut run.process)
    }

    pub fn running_count(&self) -> usize {
        self.runs.len()
    }

    /// Time of the earliest planned commit
    pub fn next_due(&self) -> Option<SimTime> {
        self.agenda
            .iter()
            .filter(|Reverse((_, seq, id))| {
                self.runs.get(id).is_some_and(|run| run.planned == Some(*seq))
            })
            .map(|Reverse((at, _, _))| *at)
            .min()
    }

    // === EXECUTION ===

    /// Start a run of `process`
    ///
    /// Runs that cannot start still get an id; their finish hook fires
    /// before this returns and `result` reports why.
    pub fn execute(&mut self, mut process: IveProcess) -> Result<ExecutionId> {
        let key = self
            .db
            .key_of(process.process_id())
            .ok_or_else(|| IveError::UnknownProcess(process.process_id().to_string()))?;
        let template = self
            .db
            .get_mut(key)
            .ok_or_else(|| IveError::UnknownProcess(process.process_id().to_string()))?;

        let mut ctx = self.env.context();
        let mut execution = template.execute(&mut ctx, &mut process);
        let id = execution.id();

        let objects = execution.phantoms().snapshot(ctx.bindings);
        let bound_exist = objects
            .keys()
            .flat_map(|role| objects.objects(ctx.bindings, role))
            .all(|object| ctx.world.object(object).is_some());
        if !bound_exist || !objects.check(ctx.bindings, template.draft()) {
            tracing::warn!(process = %process.process_id(), "Execution sources do not match the template");
            self.finish_unstarted(id, process, ProcessResult::WrongSources);
            return Ok(id);
        }
        execution.set_objects(objects);
        execution.set_start_time(ctx.now);
        execution.set_last_commit_time(ctx.now);

        let lod = template.lod(&ctx, &execution);
        let mode = requested_mode(ctx.world, ctx.bindings, &execution, lod);
        tracing::debug!(process = %process.process_id(), ?mode, "Execution started");

        let next = match mode {
            ProcessMode::Atomic => Some(ctx.now + template.atomic_length(&ctx, &execution)),
            ProcessMode::Expanded => {
                template.increase_lod(&mut ctx, &mut execution);
                None
            }
            ProcessMode::Unknown | ProcessMode::NotExist | ProcessMode::Conflict => {
                let result = refusal(mode);
                if mode == ProcessMode::Unknown {
                    tracing::error!(process = %process.process_id(), "No actor substituted to process");
                }
                self.finish_unstarted(id, process, result);
                return Ok(id);
            }
        };

        if mode == ProcessMode::Expanded {
            process.expand();
        }
        self.runs.insert(
            id,
            Run {
                template: key,
                process,
                execution,
                mode,
                planned: None,
            },
        );
        if let Some(at) = next {
            self.plan(id, at);
        }
        Ok(id)
    }

    /// Commit every run due up to `time`, in time order
    ///
    /// Returns the runs that ended, with their results.
    pub fn advance_to(&mut self, time: SimTime) -> Vec<(ExecutionId, ProcessResult)> {
        let mut finished = Vec::new();

        while let Some(Reverse((at, seq, id))) = self.agenda.peek().copied() {
            if at > time {
                break;
            }
            self.agenda.pop();

            let next = {
                let Some(run) = self.runs.get_mut(&id) else {
                    continue;
                };
                if run.planned != Some(seq) {
                    continue;
                }
                run.planned = None;
                self.env.calendar.advance_to(at);

                let Some(template) = self.db.get_mut(run.template) else {
                    tracing::error!(process = %run.process.process_id(), "Template vanished");
                    continue;
                };
                let mut ctx = self.env.context();
                let result = template.atomic_commit(&mut ctx, &mut run.execution);
                run.execution.set_last_commit_time(ctx.now);

                if result.is_running() {
                    // a running process always yields time
                    let length = template.atomic_length(&ctx, &run.execution).max(1);
                    Next::Plan(ctx.now + length)
                } else {
                    Next::Destroy(result)
                }
            };

            match next {
                Next::Plan(at) => self.plan(id, at),
                Next::Destroy(result) => {
                    self.destroy(id, result);
                    finished.push((id, result));
                }
            }
        }

        self.env.calendar.advance_to(time);
        finished
    }

    /// Ask a run to stop
    ///
    /// An atomic run that reports `RUNNING` keeps going until its next
    /// commit; any other answer ends it with that result.
    pub fn stop(&mut self, id: ExecutionId) -> Result<()> {
        let run = self
            .runs
            .get_mut(&id)
            .ok_or(IveError::ProcessNotRunning(id))?;

        if run.mode == ProcessMode::Expanded {
            self.destroy(id, ProcessResult::Ok);
            return Ok(());
        }

        run.planned = None;
        let template = self
            .db
            .get_mut(run.template)
            .ok_or_else(|| IveError::UnknownProcess(run.process.process_id().to_string()))?;
        let mut ctx = self.env.context();
        let result = template.atomic_stop(&mut ctx, &mut run.execution);
        let next = if result.is_running() {
            Next::Plan(ctx.now + template.atomic_length(&ctx, &run.execution).max(1))
        } else {
            Next::Destroy(result)
        };

        match next {
            Next::Plan(at) => self.plan(id, at),
            Next::Destroy(result) => self.destroy(id, result),
        }
        Ok(())
    }

    /// Change an object's LOD and re-evaluate every run it acts in
    pub fn set_actor_lod(&mut self, object: ObjectId, lod: i32) -> Result<()> {
        self.env.world.set_lod(object, lod)?;

        let mut affected: Vec<ExecutionId> = self
            .runs
            .iter()
            .filter(|(_, run)| {
                run.execution
                    .objects()
                    .actor_objects(&self.env.bindings)
                    .contains(&object)
            })
            .map(|(id, _)| *id)
            .collect();
        affected.sort();

        for id in affected {
            self.update_lod(id);
        }
        Ok(())
    }

    fn update_lod(&mut self, id: ExecutionId) {
        let Some(run) = self.runs.get_mut(&id) else {
            return;
        };
        let Some(template) = self.db.get_mut(run.template) else {
            return;
        };
        let mut ctx = self.env.context();
        let lod = template.lod(&ctx, &run.execution);
        let mode = requested_mode(ctx.world, ctx.bindings, &run.execution, lod);

        let next = match (run.mode, mode) {
            (ProcessMode::Expanded, ProcessMode::Atomic) => {
                template.decrease_lod(&mut ctx, &mut run.execution);
                run.mode = ProcessMode::Atomic;
                run.process.shrink();
                Some(Next::Plan(
                    ctx.now + template.atomic_length(&ctx, &run.execution),
                ))
            }
            (ProcessMode::Atomic, ProcessMode::Expanded) => {
                run.planned = None;
                template.increase_lod(&mut ctx, &mut run.execution);
                run.mode = ProcessMode::Expanded;
                run.process.expand();
                None
            }
            (_, ProcessMode::Unknown | ProcessMode::NotExist | ProcessMode::Conflict) => {
                Some(Next::Destroy(refusal(mode)))
            }
            _ => None,
        };

        match next {
            Some(Next::Plan(at)) => self.plan(id, at),
            Some(Next::Destroy(result)) => self.destroy(id, result),
            None => {}
        }
    }

    // === BOOKKEEPING ===

    fn plan(&mut self, id: ExecutionId, at: SimTime) {
        let Some(run) = self.runs.get_mut(&id) else {
            return;
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        run.planned = Some(seq);
        self.agenda.push(Reverse((at, seq, id)));
    }

    /// Drop a run; its finish hook fires unless it was expanded
    fn destroy(&mut self, id: ExecutionId, result: ProcessResult) {
        let Some(mut run) = self.runs.remove(&id) else {
            return;
        };
        self.results.insert(id, result);
        if run.mode != ProcessMode::Expanded {
            run.process.finish(result);
        }
    }

    fn finish_unstarted(&mut self, id: ExecutionId, mut process: IveProcess, result: ProcessResult) {
        self.results.insert(id, result);
        process.finish(result);
    }

    /// Release binding cells unreachable from templates, live runs and
    /// `extra_roots`
    pub fn collect_garbage(&mut self, extra_roots: &[&Substitution]) {
        let mut roots: Vec<&Substitution> = self.db.iter().map(|(_, t)| t.draft()).collect();
        for run in self.runs.values() {
            roots.push(run.process.substitution());
            roots.push(run.execution.phantoms());
            roots.push(run.execution.objects());
        }
        roots.extend_from_slice(extra_roots);
        self.env.bindings.retain_reachable(&roots);
    }
}

fn refusal(mode: ProcessMode) -> ProcessResult {
    match mode {
        ProcessMode::NotExist => ProcessResult::LodTooLow,
        ProcessMode::Conflict => ProcessResult::ActorConfusion,
        _ => ProcessResult::WrongSources,
    }
}

/// Mode the run's actors ask for
fn requested_mode(
    world: &World,
    bindings: &Bindings,
    execution: &ProcessExecution,
    lod: LodRange,
) -> ProcessMode {
    let mut modes = execution
        .objects()
        .actor_objects(bindings)
        .into_iter()
        .map(|actor| match world.object(actor) {
            Some(object) => ProcessMode::of_lod(object.lod, lod),
            None => ProcessMode::NotExist,
        });

    let Some(first) = modes.next() else {
        return ProcessMode::Unknown;
    };
    if modes.all(|mode| mode == first) {
        first
    } else {
        ProcessMode::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;
    use crate::process::template::{Immediate, ProcessTemplate};
    use crate::process::timed::Timed;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        interpreter: Interpreter,
        joe: ObjectId,
        bob: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let pub_room = world.spawn_location("pub", None, 2).unwrap();
        let joe = world.spawn_object("joe", "/person", pub_room, true).unwrap();
        let bob = world.spawn_object("bob", "/person", pub_room, true).unwrap();

        let mut env = Environment::new(world, EngineConfig::default());
        let mut draft = Substitution::new();
        draft.add_object_slot(&mut env.bindings, "actor", None, true, false, true);
        let mut pair = Substitution::new();
        pair.add_object_slot(&mut env.bindings, "actor", None, true, false, true);
        pair.add_object_slot(&mut env.bindings, "partner", None, true, false, true);

        let mut db = ProcessDb::new();
        db.register(ProcessTemplate::new(
            "Drink",
            "DrinkGoal",
            LodRange::new(2, 3),
            draft,
            Box::new(Timed::new(500).with_effect("thirst", Value::Fuzzy(0.0))),
        ));
        db.register(ProcessTemplate::new(
            "Chat",
            "ChatGoal",
            LodRange::new(2, 3),
            pair,
            Box::new(Immediate),
        ));

        Fixture {
            interpreter: Interpreter::new(env, db),
            joe,
            bob,
        }
    }

    fn bound(fx: &mut Fixture, process_id: &str, roles: &[(&str, ObjectId)]) -> IveProcess {
        let it = &mut fx.interpreter;
        let subst = it.sources(process_id).unwrap();
        for (role, object) in roles {
            let source = subst.source(&it.env().bindings, role).unwrap();
            it.env_mut().bindings.set_object(source, Some(*object));
        }
        it.instantiate(process_id, subst, Params::new()).unwrap()
    }

    fn finish_log(process: &mut IveProcess) -> Rc<RefCell<Vec<ProcessResult>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        process.on_finish(move |e| {
            if let crate::process::instance::ProcessEventKind::Finished(r) = e.kind {
                sink.borrow_mut().push(r);
            }
        });
        log
    }

    #[test]
    fn test_atomic_run_commits_when_due() {
        let mut fx = fixture();
        let joe = fx.joe;
        let mut process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let log = finish_log(&mut process);

        let id = fx.interpreter.execute(process).unwrap();
        assert_eq!(fx.interpreter.mode(id), Some(ProcessMode::Atomic));
        assert_eq!(fx.interpreter.next_due(), Some(500));

        assert!(fx.interpreter.advance_to(499).is_empty());
        assert_eq!(fx.interpreter.advance_to(500), vec![(id, ProcessResult::Ok)]);
        assert_eq!(*log.borrow(), vec![ProcessResult::Ok]);
        assert!(!fx.interpreter.is_running(id));
        assert_eq!(
            fx.interpreter.env().world.attribute(joe, "thirst"),
            Some(&Value::Fuzzy(0.0))
        );
    }

    #[test]
    fn test_unknown_process_is_an_error() {
        let mut fx = fixture();
        let process = IveProcess::new(
            "Dance",
            "DanceGoal",
            Substitution::new(),
            Params::new(),
            Box::new(crate::trigger::ConstantTrigger(true)),
        );
        assert!(matches!(
            fx.interpreter.execute(process),
            Err(IveError::UnknownProcess(_))
        ));
    }

    #[test]
    fn test_missing_actor_is_wrong_sources() {
        let mut fx = fixture();
        let mut process = bound(&mut fx, "Drink", &[]);
        let log = finish_log(&mut process);

        let id = fx.interpreter.execute(process).unwrap();
        assert_eq!(fx.interpreter.result(id), Some(ProcessResult::WrongSources));
        assert_eq!(*log.borrow(), vec![ProcessResult::WrongSources]);
    }

    #[test]
    fn test_lod_too_low_and_conflict() {
        let mut fx = fixture();
        let (joe, bob) = (fx.joe, fx.bob);
        fx.interpreter.env_mut().world.set_lod(joe, 1).unwrap();

        let process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let id = fx.interpreter.execute(process).unwrap();
        assert_eq!(fx.interpreter.result(id), Some(ProcessResult::LodTooLow));

        let process = bound(&mut fx, "Chat", &[("actor", joe), ("partner", bob)]);
        let id = fx.interpreter.execute(process).unwrap();
        assert_eq!(fx.interpreter.result(id), Some(ProcessResult::ActorConfusion));
    }

    #[test]
    fn test_expand_and_shrink_with_actor_lod() {
        let mut fx = fixture();
        let joe = fx.joe;
        let process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let id = fx.interpreter.execute(process).unwrap();

        fx.interpreter.set_actor_lod(joe, 4).unwrap();
        assert_eq!(fx.interpreter.mode(id), Some(ProcessMode::Expanded));
        assert_eq!(fx.interpreter.next_due(), None);
        assert!(fx.interpreter.advance_to(10_000).is_empty());

        fx.interpreter.set_actor_lod(joe, 3).unwrap();
        assert_eq!(fx.interpreter.mode(id), Some(ProcessMode::Atomic));
        assert_eq!(fx.interpreter.advance_to(20_000), vec![(id, ProcessResult::Ok)]);
    }

    #[test]
    fn test_dropping_below_range_ends_run() {
        let mut fx = fixture();
        let joe = fx.joe;
        let mut process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let log = finish_log(&mut process);
        let id = fx.interpreter.execute(process).unwrap();

        fx.interpreter.set_actor_lod(joe, 0).unwrap();
        assert!(!fx.interpreter.is_running(id));
        assert_eq!(fx.interpreter.result(id), Some(ProcessResult::LodTooLow));
        assert_eq!(*log.borrow(), vec![ProcessResult::LodTooLow]);
    }

    #[test]
    fn test_stop_atomic_and_unknown() {
        let mut fx = fixture();
        let joe = fx.joe;
        let process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let id = fx.interpreter.execute(process).unwrap();

        fx.interpreter.stop(id).unwrap();
        assert_eq!(fx.interpreter.result(id), Some(ProcessResult::Ok));
        assert!(fx.interpreter.advance_to(1000).is_empty());
        assert!(matches!(
            fx.interpreter.stop(id),
            Err(IveError::ProcessNotRunning(_))
        ));
    }

    #[test]
    fn test_stopping_expanded_run_is_silent() {
        let mut fx = fixture();
        let joe = fx.joe;
        fx.interpreter.env_mut().world.set_lod(joe, 5).unwrap();
        let mut process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let log = finish_log(&mut process);

        let id = fx.interpreter.execute(process).unwrap();
        assert_eq!(fx.interpreter.mode(id), Some(ProcessMode::Expanded));
        fx.interpreter.stop(id).unwrap();
        assert!(!fx.interpreter.is_running(id));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_take_result_forgets_ended_run() {
        let mut fx = fixture();
        let joe = fx.joe;
        let process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let id = fx.interpreter.execute(process).unwrap();
        fx.interpreter.advance_to(500);

        assert_eq!(fx.interpreter.take_result(id), Some(ProcessResult::Ok));
        assert_eq!(fx.interpreter.result(id), None);
        assert_eq!(fx.interpreter.take_result(id), None);
    }

    #[test]
    fn test_garbage_collection_keeps_live_runs() {
        let mut fx = fixture();
        let joe = fx.joe;
        let process = bound(&mut fx, "Drink", &[("actor", joe)]);
        let id = fx.interpreter.execute(process).unwrap();
        let before = fx.interpreter.env().bindings.slot_count();

        fx.interpreter.collect_garbage(&[]);
        assert!(fx.interpreter.env().bindings.slot_count() <= before);
        assert!(fx.interpreter.is_running(id));
        assert_eq!(fx.interpreter.advance_to(500), vec![(id, ProcessResult::Ok)]);
    }
}
