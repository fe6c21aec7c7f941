//! Integration tests for the Step process and template operations

use ive::binding::Bindings;
use ive::core::config::EngineConfig;
use ive::core::types::{ObjectId, Params, Value};
use ive::process::step::MOVE_GOAL;
use ive::process::{
    ExecContext, GeniusRegistry, IveProcess, ProcessExecution, ProcessResult, ProcessTemplate, Step,
};
use ive::world::World;

struct House {
    world: World,
    bindings: Bindings,
    geniuses: GeniusRegistry,
    config: EngineConfig,
    hall: ObjectId,
    kitchen: ObjectId,
    cellar: ObjectId,
    joe: ObjectId,
}

/// building > {floor > {hall, kitchen}, basement > cellar}; hall-kitchen 2.0
fn house() -> House {
    let mut world = World::new();
    let building = world.spawn_location("building", None, 0).unwrap();
    let floor = world.spawn_location("floor", Some(building), 1).unwrap();
    let basement = world.spawn_location("basement", Some(building), 1).unwrap();
    let hall = world.spawn_location("hall", Some(floor), 2).unwrap();
    let kitchen = world.spawn_location("kitchen", Some(floor), 2).unwrap();
    let cellar = world.spawn_location("cellar", Some(basement), 2).unwrap();
    world.connect(hall, kitchen, 2.0).unwrap();
    let joe = world.spawn_object("joe", "/person", hall, true).unwrap();

    House {
        world,
        bindings: Bindings::new(),
        geniuses: GeniusRegistry::new(),
        config: EngineConfig::default(),
        hall,
        kitchen,
        cellar,
        joe,
    }
}

impl House {
    fn ctx(&mut self) -> ExecContext<'_> {
        ExecContext::new(
            &mut self.world,
            &mut self.bindings,
            &mut self.geniuses,
            &self.config,
            0,
        )
    }

    /// Start a step of joe towards `target`
    fn step(&mut self, target: ObjectId) -> (ProcessTemplate, IveProcess, ProcessExecution) {
        let mut template = Step::template(&mut self.bindings);
        let roles = template.sources(&mut self.bindings);
        for (role, object) in [("actor", self.joe), ("targetPosition", target)] {
            let source = roles.source(&self.bindings, role).unwrap();
            self.bindings.set_object(source, Some(object));
        }
        let mut process = template.instantiate(roles, Params::new());

        let mut ctx = self.ctx();
        let mut exec = template.execute(&mut ctx, &mut process);
        let objects = exec.phantoms().snapshot(ctx.bindings);
        exec.set_objects(objects);
        (template, process, exec)
    }
}

#[test]
fn test_step_to_neighbour_relocates() {
    let mut h = house();
    let kitchen = h.kitchen;
    let (mut template, _process, mut exec) = h.step(kitchen);

    let mut ctx = h.ctx();
    assert_eq!(template.atomic_commit(&mut ctx, &mut exec), ProcessResult::Ok);
    assert_eq!(template.atomic_length(&ctx, &exec), 1000);
    assert_eq!(h.world.position(h.joe), Some(kitchen));
}

#[test]
fn test_step_to_current_location_settles() {
    let mut h = house();
    let hall = h.hall;
    let (mut template, _process, mut exec) = h.step(hall);

    let mut ctx = h.ctx();
    assert_eq!(template.atomic_commit(&mut ctx, &mut exec), ProcessResult::Ok);
    assert_eq!(template.atomic_length(&ctx, &exec), 100);
    assert_eq!(h.world.position(h.joe), Some(hall));
}

#[test]
fn test_step_too_far_fails() {
    let mut h = house();
    let cellar = h.cellar;
    let (mut template, _process, mut exec) = h.step(cellar);

    let mut ctx = h.ctx();
    assert_eq!(template.atomic_commit(&mut ctx, &mut exec), ProcessResult::Failed);
    assert_eq!(h.world.position(h.joe), Some(h.hall));
}

#[test]
fn test_step_into_occupied_location_stays() {
    let mut h = house();
    let kitchen = h.kitchen;
    h.world.spawn_object("bob", "/person", kitchen, true).unwrap();
    let (mut template, _process, mut exec) = h.step(kitchen);

    let mut ctx = h.ctx();
    assert_eq!(template.atomic_commit(&mut ctx, &mut exec), ProcessResult::Ok);
    assert_eq!(h.world.position(h.joe), Some(h.hall));
}

#[test]
fn test_step_records_initial_lod() {
    let mut h = house();
    let kitchen = h.kitchen;
    let (template, _process, exec) = h.step(kitchen);

    assert_eq!(exec.parameters().get("lod"), Some(&Value::Integer(2)));
    let ctx = h.ctx();
    let lod = template.lod(&ctx, &exec);
    assert_eq!((lod.min, lod.max), (2, 2));
}

#[test]
fn test_step_expands_into_finer_move_goal() {
    let mut h = house();
    let kitchen = h.kitchen;
    let (template, process, exec) = h.step(kitchen);

    let mut ctx = h.ctx();
    let expansion = template
        .expansion(&mut ctx, process.substitution(), exec.parameters())
        .expect("step expands");
    assert_eq!(expansion.len(), 1);

    let goal = &expansion.goals[0];
    assert_eq!(goal.goal_id(), MOVE_GOAL);
    assert_eq!(goal.parameters().get("lod"), Some(&Value::Integer(3)));
    assert_eq!(goal.substitution().object(&h.bindings, "targetPosition"), Some(kitchen));
    assert_eq!(
        goal.substitution().source(&h.bindings, "actor"),
        process.substitution().source(&h.bindings, "actor")
    );
    assert!(goal.trigger().evaluate(&h.world, &h.bindings));
}
