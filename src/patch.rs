//! `Patch` (static per-patch geometry) and `PatchWorker` (the per-patch
//! worker loop: local ticks alternating with synchronized padding exchange).

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::channel::PaddingChannel;
use crate::error::SimError;
use crate::geometry::Rectangle;
use crate::output::{OutputEntry, OutputSink, Statistics};
use crate::person::{Person, PersonContext};
use crate::scenario::Query;
use crate::validator::Validator;

/// Static, immutable-after-construction geometry and channel wiring for one
/// patch. `inner_channels`/`outer_channels` are indices into the
/// orchestrator's shared channel table — see §9's cyclic-graph note: a
/// `Patch` never holds a peer's worker, only table indices.
#[derive(Debug, Clone)]
pub struct Patch {
    pub id: usize,
    pub patch_area: Rectangle,
    pub padded_area: Rectangle,
    pub inner_channels: Vec<usize>,
    pub outer_channels: Vec<usize>,
}

/// The largest `K >= 1` satisfying
/// `padding >= 2*K + ceil(K / incubation_time) * infection_radius`, or
/// `None` if no such `K` exists (caller should fail with
/// `SimError::InsufficientPadding`).
pub fn cycle_duration(padding: u32, infection_radius: i64, incubation_time: usize) -> Option<u32> {
    let padding = padding as i64;
    let incubation_time = incubation_time.max(1) as i64;
    let max_k = padding / 2;
    for k in (1..=max_k).rev() {
        let ceil_term = (k + incubation_time - 1) / incubation_time;
        let required = 2 * k + ceil_term * infection_radius;
        if padding >= required {
            return Some(k as u32);
        }
    }
    None
}

/// The smallest padding for which `cycle_duration` returns `Some` (i.e. the
/// requirement at `K = 1`).
pub fn minimum_padding(infection_radius: i64, incubation_time: usize) -> u32 {
    let incubation_time = incubation_time.max(1) as i64;
    let ceil_term = (1 + incubation_time - 1) / incubation_time;
    (2 + ceil_term * infection_radius) as u32
}

/// Merge two id-sorted, duplicate-free person lists into one id-sorted list.
/// A duplicate id across the two inputs is a broken invariant, not a
/// recoverable condition (spec §7).
fn sort_merge<P: Person>(a: Vec<P>, b: Vec<P>) -> Result<Vec<P>, SimError> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut ai = a.into_iter().peekable();
    let mut bi = b.into_iter().peekable();
    loop {
        match (ai.peek(), bi.peek()) {
            (Some(x), Some(y)) => {
                if x.id() == y.id() {
                    return Err(SimError::ProgrammerAssertion(format!(
                        "duplicate person id {} across merge inputs",
                        x.id()
                    )));
                } else if x.id() < y.id() {
                    out.push(ai.next().unwrap());
                } else {
                    out.push(bi.next().unwrap());
                }
            }
            (Some(_), None) => out.push(ai.next().unwrap()),
            (None, Some(_)) => out.push(bi.next().unwrap()),
            (None, None) => break,
        }
    }
    Ok(out)
}

/// Owns one patch's local population and drives its worker loop. Built and
/// consumed once by `Simulation::run`, inside a `std::thread::scope`.
pub struct PatchWorker<'a, P: Person> {
    patch: &'a Patch,
    channels: &'a [PaddingChannel<P>],
    cycle_duration: u32,
    ticks: usize,
    infection_radius: i64,
    queries: &'a [Query],
    trace_enabled: bool,
    validator: &'a dyn Validator,
    sink: OutputSink,
    context: P::Context,
    /// `P` in the spec: persons whose position lies in `patch.patch_area`.
    population: Vec<P>,
    /// `C` in the spec: `P` plus copies of neighbors' border persons.
    combined: Vec<P>,
}

impl<'a, P: Person> PatchWorker<'a, P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patch: &'a Patch,
        channels: &'a [PaddingChannel<P>],
        cycle_duration: u32,
        ticks: usize,
        infection_radius: i64,
        queries: &'a [Query],
        trace_enabled: bool,
        validator: &'a dyn Validator,
        sink: OutputSink,
        context: P::Context,
        mut initial_population: Vec<P>,
    ) -> Self {
        initial_population.sort_by_key(|p| p.id());
        Self {
            patch,
            channels,
            cycle_duration,
            ticks,
            infection_radius,
            queries,
            trace_enabled,
            validator,
            sink,
            context,
            population: initial_population,
            combined: Vec::new(),
        }
    }

    /// Runs the worker to completion, emitting `ticks + 1` entries.
    pub fn run(mut self) -> Result<(), SimError> {
        let entry = self.build_output_entry(0);
        self.sink.send(entry)?;

        for tick_number in 0..self.ticks {
            if tick_number % self.cycle_duration as usize == 0 {
                self.synchronize()?;
            }
            self.validator.on_patch_tick(tick_number, self.patch.id);
            self.local_tick(tick_number)?;
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), SimError> {
        debug!(patch = self.patch.id, "synchronizing padding");
        let neutral = P::Context::neutral();

        for &channel_idx in &self.patch.inner_channels {
            let channel = &self.channels[channel_idx];
            let subset: Vec<P> = self
                .population
                .iter()
                .filter(|p| channel.area().contains(p.position()))
                .cloned()
                .collect();
            channel.write(subset, &neutral, self.patch.id)?;
        }

        self.combined.clear();
        for &channel_idx in &self.patch.outer_channels {
            let channel = &self.channels[channel_idx];
            let snapshot = channel.read(&self.context, self.patch.id)?;
            self.combined = sort_merge(std::mem::take(&mut self.combined), snapshot)?;
        }

        let mut local_sorted = self.population.clone();
        local_sorted.sort_by_key(|p| p.id());
        self.combined = sort_merge(std::mem::take(&mut self.combined), local_sorted)?;
        Ok(())
    }

    fn local_tick(&mut self, tick_number: usize) -> Result<(), SimError> {
        for person in &mut self.combined {
            self.validator
                .on_person_tick(tick_number, self.patch.id, person.id());
            person.tick(tick_number, &self.context);
        }
        for person in &mut self.combined {
            person.bust_ghost();
        }

        self.spread_infection();

        self.population = self
            .combined
            .iter()
            .filter(|p| self.patch.patch_area.contains(p.position()))
            .cloned()
            .collect();
        self.population.sort_by_key(|p| p.id());

        let entry = self.build_output_entry(tick_number + 1);
        self.sink.send(entry)?;
        Ok(())
    }

    /// Each unordered pair within infection radius is visited once; a
    /// person's infectiousness this tick is fixed before any infection is
    /// applied, so simultaneous double-infection within one tick can't
    /// chain off newly-infected persons in the same pass.
    fn spread_infection(&mut self) {
        let n = self.combined.len();
        let positions: Vec<_> = self.combined.iter().map(|p| p.position()).collect();
        let coughing: Vec<bool> = self
            .combined
            .iter()
            .map(|p| p.is_infectious() && p.is_coughing())
            .collect();
        let breathing: Vec<bool> = self.combined.iter().map(|p| p.is_breathing()).collect();
        let mut to_infect = vec![false; n];

        for i in 0..n {
            for j in (i + 1)..n {
                if positions[i].manhattan_distance(positions[j]) > self.infection_radius {
                    continue;
                }
                if coughing[i] && breathing[j] {
                    to_infect[j] = true;
                }
                if coughing[j] && breathing[i] {
                    to_infect[i] = true;
                }
            }
        }

        for (idx, person) in self.combined.iter_mut().enumerate() {
            if to_infect[idx] {
                person.infect();
            }
        }
    }

    fn build_output_entry(&self, tick: usize) -> OutputEntry {
        let mut stats_by_query = HashMap::new();
        for query in self.queries {
            if !query.area.overlaps(&self.patch.padded_area) {
                continue;
            }
            let mut stats = Statistics::default();
            for person in &self.population {
                if !query.area.contains(person.position()) {
                    continue;
                }
                if person.is_infectious() {
                    stats.infectious += 1;
                } else if person.is_infected() {
                    stats.infected += 1;
                } else if person.is_recovered() {
                    stats.recovered += 1;
                } else if person.is_susceptible() {
                    stats.susceptible += 1;
                }
            }
            stats_by_query.insert(query.name.clone(), stats);
        }

        let trace = if self.trace_enabled {
            Some(self.population.iter().map(|p| p.trace_entry()).collect())
        } else {
            None
        };

        trace!(patch = self.patch.id, tick, population = self.population.len(), "tick emitted");
        OutputEntry {
            tick,
            stats_by_query,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::XY;
    use crate::output::build_sinks;
    use crate::person::test_support::{CounterContext, CounterPerson};
    use crate::validator::NullValidator;
    use crate::config::OutputMode;

    #[test]
    fn cycle_duration_matches_spec_formula() {
        // padding=4, R=1, incubation=2: K=1 => 2*1 + ceil(1/2)*1 = 3 <= 4 OK.
        // K=2 => 2*2 + ceil(2/2)*1 = 5 > 4, fails. So K=1.
        assert_eq!(cycle_duration(4, 1, 2), Some(1));
    }

    #[test]
    fn minimum_padding_boundary() {
        let min = minimum_padding(1, 2);
        assert!(cycle_duration(min, 1, 2).is_some());
        assert!(cycle_duration(min - 1, 1, 2).is_none());
    }

    #[test]
    fn sort_merge_detects_duplicate_ids() {
        let a = vec![CounterPerson::new(1, XY::new(0, 0), 0)];
        let b = vec![CounterPerson::new(1, XY::new(1, 1), 0)];
        let result = sort_merge(a, b);
        assert!(matches!(result, Err(SimError::ProgrammerAssertion(_))));
    }

    #[test]
    fn sort_merge_preserves_order() {
        let a = vec![CounterPerson::new(3, XY::new(0, 0), 0), CounterPerson::new(5, XY::new(0, 0), 0)];
        let b = vec![CounterPerson::new(1, XY::new(0, 0), 0), CounterPerson::new(4, XY::new(0, 0), 0)];
        let merged = sort_merge(a, b).unwrap();
        let ids: Vec<_> = merged.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![1, 3, 4, 5]);
    }

    #[test]
    fn single_patch_worker_conserves_population_with_no_channels() {
        let grid = Rectangle::new(XY::new(0, 0), XY::new(4, 4));
        let patch = Patch {
            id: 0,
            patch_area: grid,
            padded_area: grid,
            inner_channels: vec![],
            outer_channels: vec![],
        };
        let channels: Vec<PaddingChannel<CounterPerson>> = Vec::new();
        let queries = vec![Query { name: "all".to_string(), area: grid }];
        let validator = NullValidator;
        let (sinks, receivers) = build_sinks(1, OutputMode::Lockstep);

        let population = vec![
            CounterPerson::infectious_at(0, XY::new(0, 0)),
            CounterPerson::new(1, XY::new(3, 3), 0),
        ];

        let worker = PatchWorker::new(
            &patch,
            &channels,
            1,
            3,
            1,
            &queries,
            true,
            &validator,
            sinks[0].clone(),
            CounterContext(0),
            population,
        );

        std::thread::scope(|scope| {
            scope.spawn(|| worker.run().unwrap());
            for _ in 0..=3 {
                let (_, entry) = receivers[0].recv().unwrap();
                let total: u64 = entry.stats_by_query["all"].total();
                assert_eq!(total, 2);
                assert_eq!(entry.trace.unwrap().len(), 2);
            }
        });
    }
}
