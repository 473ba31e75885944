//! `Simulation`: the public contract (§6) that computes the cycle duration,
//! builds patches and padding channels, and spawns workers plus a collector
//! to produce the final `Output`.

use tracing::{info, info_span};

use crate::channel::PaddingChannel;
use crate::config::{OutputMode, SimulationConfig};
use crate::error::SimError;
use crate::geometry::partition_cells;
use crate::output::{build_sinks, Output, OutputCollector};
use crate::patch::{cycle_duration, minimum_padding, Patch, PatchWorker};
use crate::person::Person;
use crate::reachability::GridReachability;
use crate::scenario::{PersonInfo, Scenario};
use crate::validator::Validator;

/// Builds a `P::Context` for a given patch. Supplied by the caller because
/// only the caller knows what a person of type `P` needs from its patch
/// (grid bounds, rng seeding, …) — see §9's per-patch-context design note.
pub trait ContextFactory<P: Person>: Send + Sync {
    fn build(&self, patch: &Patch, scenario: &Scenario) -> P::Context;
}

impl<P, F> ContextFactory<P> for F
where
    P: Person,
    F: Fn(&Patch, &Scenario) -> P::Context + Send + Sync,
{
    fn build(&self, patch: &Patch, scenario: &Scenario) -> P::Context {
        self(patch, scenario)
    }
}

/// Builds a concrete person from scenario-level seed info and its patch
/// context. Supplied by the caller for the same reason as `ContextFactory`.
pub trait PersonFactory<P: Person>: Send + Sync {
    fn build(&self, info: &PersonInfo, context: &P::Context) -> P;
}

impl<P, F> PersonFactory<P> for F
where
    P: Person,
    F: Fn(&PersonInfo, &P::Context) -> P + Send + Sync,
{
    fn build(&self, info: &PersonInfo, context: &P::Context) -> P {
        self(info, context)
    }
}

/// The concurrent simulation core's public entry point.
pub struct Simulation<P: Person> {
    scenario: Scenario,
    config: SimulationConfig,
    validator: Box<dyn Validator>,
    patches: Vec<Patch>,
    channels: Vec<PaddingChannel<P>>,
    cycle_duration: u32,
    initial_populations: Vec<Vec<P>>,
    contexts: Vec<P::Context>,
    output: Option<Output>,
}

impl<P: Person> Simulation<P> {
    pub fn new(
        scenario: Scenario,
        config: SimulationConfig,
        validator: Box<dyn Validator>,
        context_factory: &dyn ContextFactory<P>,
        person_factory: &dyn PersonFactory<P>,
    ) -> Result<Self, SimError> {
        let k = cycle_duration(
            config.padding,
            scenario.parameters.infection_radius,
            scenario.parameters.incubation_time,
        )
        .ok_or_else(|| SimError::InsufficientPadding {
            minimum: minimum_padding(
                scenario.parameters.infection_radius,
                scenario.parameters.incubation_time,
            ),
            provided: config.padding,
        })?;

        let cells = partition_cells(&scenario.grid, &scenario.partition.x_cuts, &scenario.partition.y_cuts);
        let padding = config.padding as i64;
        let mut patches = Vec::with_capacity(cells.len());
        for (id, patch_area) in cells.into_iter().enumerate() {
            let padded_area = patch_area.padded(padding, &scenario.grid);
            patches.push(Patch {
                id,
                patch_area,
                padded_area,
                inner_channels: Vec::new(),
                outer_channels: Vec::new(),
            });
        }

        let initial_positions: Vec<_> = scenario.initial_population.iter().map(|p| p.position).collect();
        let reachability = GridReachability::build(&scenario.grid, &scenario.obstacles, &initial_positions);

        let mut channels = Vec::new();
        let num_patches = patches.len();
        for outer_idx in 0..num_patches {
            for inner_idx in 0..num_patches {
                if outer_idx == inner_idx {
                    continue;
                }
                let intersection = match patches[inner_idx]
                    .patch_area
                    .intersect(&patches[outer_idx].padded_area)
                {
                    Some(area) => area,
                    None => continue,
                };
                if !reachability.may_propagate_from(
                    &intersection,
                    &patches[outer_idx].patch_area,
                    scenario.parameters.infection_radius,
                ) {
                    continue;
                }
                let channel_idx = channels.len();
                channels.push(PaddingChannel::<P>::new(intersection));
                patches[outer_idx].outer_channels.push(channel_idx);
                patches[inner_idx].inner_channels.push(channel_idx);
            }
        }

        let contexts: Vec<P::Context> = patches
            .iter()
            .map(|patch| context_factory.build(patch, &scenario))
            .collect();

        let mut initial_populations: Vec<Vec<P>> = vec![Vec::new(); num_patches];
        for info in &scenario.initial_population {
            let patch_idx = patches
                .iter()
                .position(|p| p.patch_area.contains(info.position))
                .ok_or_else(|| {
                    SimError::ProgrammerAssertion(format!(
                        "person {} at {:?} lies outside every partition cell",
                        info.id, info.position
                    ))
                })?;
            let person = person_factory.build(info, &contexts[patch_idx]);
            initial_populations[patch_idx].push(person);
        }

        Ok(Self {
            scenario,
            config,
            validator,
            patches,
            channels,
            cycle_duration: k,
            initial_populations,
            contexts,
            output: None,
        })
    }

    pub fn cycle_duration(&self) -> u32 {
        self.cycle_duration
    }

    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// Executes the simulation to completion.
    pub fn run(&mut self) -> Result<(), SimError> {
        let num_patches = self.patches.len();
        let span = info_span!("simulation_run", patches = num_patches, ticks = self.scenario.ticks);
        let _guard = span.enter();
        info!("starting run with cycle duration {}", self.cycle_duration);

        // Pull every plain value the spawned closures need into locals up
        // front. Edition 2018 has no disjoint closure field capture, so a
        // closure touching `self.config.foo` would borrow all of `self` —
        // which would collide with the `&self.patches`/`&self.channels`
        // borrows below. Locals sidestep that entirely.
        let thread_prefix = self.config.thread_name_prefix.clone();
        let output_mode = self.config.output_mode;
        let (sinks, receivers) = build_sinks(num_patches, output_mode);
        let collector = OutputCollector::new(num_patches, self.scenario.ticks, self.scenario.trace_enabled);

        let validator = self.validator.as_ref();
        let queries = &self.scenario.queries;
        let infection_radius = self.scenario.parameters.infection_radius;
        let ticks = self.scenario.ticks;
        let trace_enabled = self.scenario.trace_enabled;
        let cycle_duration = self.cycle_duration;
        let channels = &self.channels;
        let patches = &self.patches;
        let contexts = &self.contexts;
        let initial_populations = &mut self.initial_populations;

        let output_result: Result<Output, SimError> = std::thread::scope(|scope| {
            let mut worker_handles = Vec::with_capacity(patches.len());
            for (patch, population, context, sink) in itertools_zip(patches, initial_populations, contexts, sinks) {
                let name = format!("{}-patch-{}", thread_prefix, patch.id);
                let worker = PatchWorker::new(
                    patch,
                    channels,
                    cycle_duration,
                    ticks,
                    infection_radius,
                    queries,
                    trace_enabled,
                    validator,
                    sink,
                    context.clone(),
                    std::mem::take(population),
                );
                let handle = std::thread::Builder::new()
                    .name(name)
                    .spawn_scoped(scope, move || worker.run())
                    .expect("failed to spawn patch worker thread");
                worker_handles.push((patch.id, handle));
            }

            let collector_name = format!("{}-collector", thread_prefix);
            let collector_handle = std::thread::Builder::new()
                .name(collector_name)
                .spawn_scoped(scope, || match output_mode {
                    OutputMode::Lockstep => collector.drain_lockstep(&receivers),
                    OutputMode::FanIn => collector.drain_fan_in(&receivers[0]),
                })
                .expect("failed to spawn collector thread");

            let collector_result = collector_handle
                .join()
                .unwrap_or_else(|_| Err(SimError::WorkerInterrupted { patch_id: usize::MAX }));

            let mut first_worker_error = None;
            for (patch_id, handle) in worker_handles {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(SimError::WorkerInterrupted { patch_id }));
                if let Err(e) = result {
                    first_worker_error.get_or_insert(e);
                }
            }

            if let Some(err) = first_worker_error {
                Err(err)
            } else {
                collector_result
            }
        });

        self.output = Some(output_result?);
        info!("run complete");
        Ok(())
    }

    /// Only meaningful after `run()` returns `Ok`.
    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }
}

/// Zips four same-length collections by value/reference as needed; a tiny
/// local helper rather than pulling in `itertools` for one call site.
fn itertools_zip<'a, P: Person>(
    patches: &'a [Patch],
    populations: &'a mut [Vec<P>],
    contexts: &'a [P::Context],
    sinks: Vec<crate::output::OutputSink>,
) -> Vec<(&'a Patch, &'a mut Vec<P>, &'a P::Context, crate::output::OutputSink)> {
    patches
        .iter()
        .zip(populations.iter_mut())
        .zip(contexts.iter())
        .zip(sinks.into_iter())
        .map(|(((patch, population), context), sink)| (patch, population, context, sink))
        .collect()
}
