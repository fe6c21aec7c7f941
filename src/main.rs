//! IVE demo driver
//!
//! Builds a small building, walks an actor through it with `Step` runs and
//! hands a drink to an area genius, printing every finished run.

use std::path::PathBuf;

use ahash::AHashMap;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ive::binding::Substitution;
use ive::core::config::{config, set_config, EngineConfig};
use ive::core::error::{IveError, Result};
use ive::core::types::{ExecutionId, LodRange, ObjectId, Params, SimTime, Value};
use ive::process::{
    Delegated, IveProcess, LocalGenius, ProcessDb, ProcessResult, ProcessTemplate, Step, Timed,
};
use ive::simulation::{Environment, Interpreter};
use ive::world::World;

/// Run a scripted IVE scenario and report each finished process
#[derive(Parser, Debug)]
#[command(name = "ive")]
#[command(about = "Drive the goal/process engine through a short scenario")]
struct Args {
    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct RunReport {
    time: SimTime,
    process: String,
    execution: ExecutionId,
    result: ProcessResult,
    actor_at: Option<String>,
}

struct Scenario {
    interpreter: Interpreter,
    joe: ObjectId,
    kitchen: ObjectId,
    cellar: ObjectId,
    started: AHashMap<ExecutionId, String>,
    reports: Vec<RunReport>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "ive=debug" } else { "ive=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if let Some(path) = &args.config {
        let loaded = EngineConfig::load(path)?;
        if set_config(loaded).is_err() {
            tracing::warn!("Engine config already set, ignoring {}", path.display());
        }
    }
    let config = config().clone();
    config.validate().map_err(IveError::Config)?;

    let mut scenario = Scenario::build(config)?;
    scenario.run()?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&scenario.reports)?),
        _ => {
            println!("\n=== IVE ===");
            for report in &scenario.reports {
                println!(
                    "[{:>8} ms] {:<6} {:?} (actor at {})",
                    report.time,
                    report.process,
                    report.result,
                    report.actor_at.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

impl Scenario {
    /// building > floor > {hall, kitchen, cellar}
    fn build(config: EngineConfig) -> Result<Self> {
        let mut world = World::new();
        let building = world.spawn_location("building", None, 0)?;
        let floor = world.spawn_location("floor", Some(building), 1)?;
        let hall = world.spawn_location("hall", Some(floor), 2)?;
        let kitchen = world.spawn_location("kitchen", Some(floor), 2)?;
        let cellar = world.spawn_location("cellar", Some(floor), 2)?;
        world.connect(hall, kitchen, 2.0)?;
        world.connect(kitchen, cellar, 1.0)?;
        let joe = world.spawn_object("joe", "/person/Drunkard", hall, true)?;

        let mut env = Environment::new(world, config);
        let keeper = env.geniuses.add(Box::new(LocalGenius::new("cellar keeper")));

        let mut db = ProcessDb::new();
        db.register(Step::template(&mut env.bindings));

        let mut draft = Substitution::new();
        draft.add_object_slot(&mut env.bindings, "actor", None, true, false, true);
        let mut drink = ProcessTemplate::new(
            "Drink",
            "DrinkGoal",
            LodRange::new(2, 3),
            draft,
            Box::new(Delegated::new(
                Timed::new(2_000).with_effect("thirst", Value::Fuzzy(0.0)),
            )),
        );
        drink.register(keeper, floor)?;
        db.register(drink);

        Ok(Self {
            interpreter: Interpreter::new(env, db),
            joe,
            kitchen,
            cellar,
            started: AHashMap::new(),
            reports: Vec::new(),
        })
    }

    fn run(&mut self) -> Result<()> {
        let joe = self.joe;
        for target in [self.kitchen, self.cellar] {
            self.start("Step", &[("actor", joe), ("targetPosition", target)])?;
            self.drain(SimTime::MAX / 2);
        }

        let drink = self.start("Drink", &[("actor", joe)])?;
        let now = self.interpreter.now();
        self.drain(now + 10);
        tracing::info!(delegated = self.interpreter.is_running(drink), "Drink handed over");

        self.interpreter.stop(drink)?;
        if let Some(result) = self.interpreter.result(drink) {
            self.report(drink, result);
        }
        self.interpreter.collect_garbage(&[]);
        Ok(())
    }

    fn start(&mut self, process_id: &str, roles: &[(&str, ObjectId)]) -> Result<ExecutionId> {
        let process = self.bind(process_id, roles)?;
        let id = self.interpreter.execute(process)?;
        self.started.insert(id, process_id.to_string());
        if let Some(result) = self.interpreter.result(id) {
            self.report(id, result);
        }
        Ok(id)
    }

    fn bind(&mut self, process_id: &str, roles: &[(&str, ObjectId)]) -> Result<IveProcess> {
        let subst = self.interpreter.sources(process_id)?;
        let bindings = &mut self.interpreter.env_mut().bindings;
        for (role, object) in roles {
            if let Some(source) = subst.source(bindings, role) {
                bindings.set_object(source, Some(*object));
            }
        }
        self.interpreter.instantiate(process_id, subst, Params::new())
    }

    /// Commit until nothing is due before `until`
    fn drain(&mut self, until: SimTime) {
        while let Some(at) = self.interpreter.next_due().filter(|at| *at <= until) {
            for (id, result) in self.interpreter.advance_to(at) {
                self.report(id, result);
            }
        }
    }

    fn report(&mut self, execution: ExecutionId, result: ProcessResult) {
        let world = &self.interpreter.env().world;
        let actor_at = world
            .position(self.joe)
            .and_then(|at| world.object(at))
            .map(|o| o.name.clone());
        self.reports.push(RunReport {
            time: self.interpreter.now(),
            process: self.started.get(&execution).cloned().unwrap_or_default(),
            execution,
            result,
            actor_at,
        });
    }
}
