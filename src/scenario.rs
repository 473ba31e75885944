//! The data the orchestrator consumes. Parsing/serialization of a scenario
//! from an external format is explicitly out of scope for the core; this
//! module only holds the in-memory shape and a couple of construction
//! helpers used by tests and the demo binary.

use crate::geometry::{Rectangle, XY};

/// One named rectangular area over which aggregate statistics are reported
/// each tick.
#[derive(Debug, Clone)]
pub struct Query {
    pub name: String,
    pub area: Rectangle,
}

/// Scenario-wide simulation parameters.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    pub infection_radius: i64,
    pub incubation_time: usize,
    pub recovery_time: usize,
}

/// The externally-assigned description of one person in the initial
/// population, before any core id has been attached.
#[derive(Debug, Clone, Copy)]
pub struct PersonSeed {
    pub position: XY,
    pub infectious: bool,
}

/// A fully-resolved initial person, with a stable sequential id assigned by
/// insertion order.
#[derive(Debug, Clone, Copy)]
pub struct PersonInfo {
    pub id: u64,
    pub position: XY,
    pub infectious: bool,
}

/// The two ordered sequences of interior cut-lines that define the
/// partition, one per axis.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub x_cuts: Vec<i64>,
    pub y_cuts: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub grid: Rectangle,
    pub obstacles: Vec<Rectangle>,
    pub initial_population: Vec<PersonInfo>,
    pub partition: Partition,
    pub parameters: Parameters,
    pub queries: Vec<Query>,
    pub ticks: usize,
    pub trace_enabled: bool,
}

impl Scenario {
    /// Assign sequential ids (0..N-1) to `seeds` by insertion order and
    /// build a `Scenario` from the remaining fields.
    pub fn new(
        grid: Rectangle,
        obstacles: Vec<Rectangle>,
        seeds: Vec<PersonSeed>,
        partition: Partition,
        parameters: Parameters,
        queries: Vec<Query>,
        ticks: usize,
        trace_enabled: bool,
    ) -> Self {
        let initial_population = seeds
            .into_iter()
            .enumerate()
            .map(|(i, seed)| PersonInfo {
                id: i as u64,
                position: seed.position,
                infectious: seed.infectious,
            })
            .collect();
        Self {
            grid,
            obstacles,
            initial_population,
            partition,
            parameters,
            queries,
            ticks,
            trace_enabled,
        }
    }

    pub fn minimum_padding(&self) -> u32 {
        crate::patch::minimum_padding(self.parameters.infection_radius, self.parameters.incubation_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_sequential_ids() {
        let seeds = vec![
            PersonSeed { position: XY::new(0, 0), infectious: true },
            PersonSeed { position: XY::new(1, 1), infectious: false },
        ];
        let scenario = Scenario::new(
            Rectangle::new(XY::new(0, 0), XY::new(10, 10)),
            vec![],
            seeds,
            Partition::default(),
            Parameters { infection_radius: 1, incubation_time: 2, recovery_time: 5 },
            vec![],
            10,
            false,
        );
        assert_eq!(scenario.initial_population[0].id, 0);
        assert_eq!(scenario.initial_population[1].id, 1);
    }
}
