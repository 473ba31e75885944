//! Small demo binary: runs a two-patch scenario with one infectious seed
//! near the shared border and prints the per-tick susceptible/infectious
//! counts for the whole-grid query. Mirrors the teacher's own `main.rs`
//! driver loop, generalized from a single run to a wired-up `Simulation`.

use patchsim::{
    ContextFactory, NullValidator, Parameters, Partition, Patch, PersonFactory, PersonInfo,
    PersonSeed, Query, Rectangle, Scenario, SeirContext, SeirPerson, Simulation, SimulationConfig,
    XY,
};

struct SeirContextFactory {
    incubation_time: usize,
    recovery_time: usize,
}

impl ContextFactory<SeirPerson> for SeirContextFactory {
    fn build(&self, patch: &Patch, _scenario: &Scenario) -> SeirContext {
        SeirContext {
            bounds: patch.padded_area,
            incubation_time: self.incubation_time,
            recovery_time: self.recovery_time,
            rng_seed: patch.id as u64,
        }
    }
}

struct SeirPersonFactory;

impl PersonFactory<SeirPerson> for SeirPersonFactory {
    fn build(&self, info: &PersonInfo, context: &SeirContext) -> SeirPerson {
        if info.infectious {
            SeirPerson::new_infectious(info.id, info.position, context.incubation_time, info.id)
        } else {
            SeirPerson::new(info.id, info.position, context.incubation_time, info.id)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let grid = Rectangle::new(XY::new(0, 0), XY::new(20, 10));
    let parameters = Parameters {
        infection_radius: 1,
        incubation_time: 2,
        recovery_time: 5,
    };
    let padding = patchsim::minimum_padding(parameters.infection_radius, parameters.incubation_time);

    let seeds = vec![
        PersonSeed { position: XY::new(9, 5), infectious: true },
        PersonSeed { position: XY::new(10, 5), infectious: false },
        PersonSeed { position: XY::new(2, 2), infectious: false },
        PersonSeed { position: XY::new(17, 7), infectious: false },
    ];

    let scenario = Scenario::new(
        grid,
        vec![],
        seeds,
        Partition { x_cuts: vec![10], y_cuts: vec![] },
        parameters,
        vec![Query { name: "whole_grid".to_string(), area: grid }],
        20,
        true,
    );

    let config = SimulationConfig::new(padding);
    let context_factory = SeirContextFactory {
        incubation_time: parameters.incubation_time,
        recovery_time: parameters.recovery_time,
    };
    let person_factory = SeirPersonFactory;

    let mut simulation = Simulation::<SeirPerson>::new(
        scenario,
        config,
        Box::new(NullValidator),
        &context_factory,
        &person_factory,
    )
    .expect("scenario has at least the minimum padding");

    simulation.run().expect("simulation run failed");

    let output = simulation.output().expect("run completed");
    for (tick, stats) in output.statistics["whole_grid"].iter().enumerate() {
        println!(
            "tick {:>3}: susceptible={} infected={} infectious={} recovered={}",
            tick, stats.susceptible, stats.infected, stats.infectious, stats.recovered
        );
    }
}
