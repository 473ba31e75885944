//! The `Person` contract the concurrent core programs against, plus one
//! concrete SEIR-style reference implementation (`SeirPerson`) used by the
//! tests and the demo binary. Movement/state-transition *policy* is
//! intentionally pluggable — the core never assumes SEIR specifically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

use crate::geometry::{Rectangle, XY};

/// A record describing one person at one tick, stripped of any patch
/// affiliation, for the globally-ordered trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub id: u64,
    pub position: XY,
    pub state: String,
}

/// Per-patch capability handed to a person on tick and on every cross-patch
/// handoff. Never held by back-reference — always passed in and re-bound.
pub trait PersonContext: Clone + Send {
    /// A neutral value used while a snapshot is in flight between patches.
    fn neutral() -> Self;
}

/// The capabilities the concurrent core needs from a person. Implementors
/// own their state-transition and movement policy entirely; the core only
/// calls these methods.
pub trait Person: Clone + Send {
    type Context: PersonContext;

    fn id(&self) -> u64;
    fn position(&self) -> XY;

    /// Advance one step: update age-in-state, decide (but do not yet commit)
    /// any movement, using `context` for grid/obstacle/neighbor information.
    fn tick(&mut self, tick: usize, context: &Self::Context);

    /// Commit whatever tentative movement `tick` decided on, making
    /// `position()` final for this tick.
    fn bust_ghost(&mut self);

    /// Re-bind to a (possibly neutral) context, e.g. after a padding handoff.
    fn rebind(&mut self, context: &Self::Context);

    fn infect(&mut self);

    fn is_infectious(&self) -> bool;
    fn is_coughing(&self) -> bool;
    fn is_breathing(&self) -> bool;
    fn is_susceptible(&self) -> bool;
    fn is_infected(&self) -> bool;
    fn is_recovered(&self) -> bool;

    fn trace_entry(&self) -> TraceEntry;
}

/// SEIR state of the reference person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeirState {
    Susceptible,
    Exposed,
    Infectious,
    Recovered,
}

impl SeirState {
    fn label(self) -> &'static str {
        match self {
            SeirState::Susceptible => "susceptible",
            SeirState::Exposed => "exposed",
            SeirState::Infectious => "infectious",
            SeirState::Recovered => "recovered",
        }
    }
}

/// The per-patch context the reference person needs: the grid bounds it may
/// wander within (its patch's padded area, supplied by the worker) and a
/// seed for its private RNG.
#[derive(Debug, Clone)]
pub struct SeirContext {
    pub bounds: Rectangle,
    pub incubation_time: usize,
    pub recovery_time: usize,
    pub rng_seed: u64,
}

impl PersonContext for SeirContext {
    fn neutral() -> Self {
        SeirContext {
            bounds: Rectangle::new(XY::new(0, 0), XY::new(1, 1)),
            incubation_time: 1,
            recovery_time: 1,
            rng_seed: 0,
        }
    }
}

/// A minimal susceptible -> exposed -> infectious -> recovered random-walk
/// person, grounded on the teacher's `Agent` (`x, y, agent_type, tick`,
/// `move_agent` via `rand_distr::Uniform`).
#[derive(Debug, Clone)]
pub struct SeirPerson {
    id: u64,
    position: XY,
    state: SeirState,
    age_in_state: usize,
    incubation_time: usize,
    ghost_position: XY,
    rng: StdRng,
}

impl SeirPerson {
    pub fn new(id: u64, position: XY, incubation_time: usize, rng_seed: u64) -> Self {
        Self {
            id,
            position,
            state: SeirState::Susceptible,
            age_in_state: 0,
            incubation_time,
            ghost_position: position,
            rng: StdRng::seed_from_u64(rng_seed ^ id),
        }
    }

    pub fn new_infectious(id: u64, position: XY, incubation_time: usize, rng_seed: u64) -> Self {
        let mut p = Self::new(id, position, incubation_time, rng_seed);
        p.state = SeirState::Infectious;
        p
    }

    pub fn state(&self) -> SeirState {
        self.state
    }

    pub fn context_tag(&self) -> u64 {
        self.incubation_time as u64
    }
}

impl Person for SeirPerson {
    type Context = SeirContext;

    fn id(&self) -> u64 {
        self.id
    }

    fn position(&self) -> XY {
        self.position
    }

    fn tick(&mut self, _tick: usize, context: &Self::Context) {
        self.age_in_state += 1;

        if self.state == SeirState::Exposed && self.age_in_state >= context.incubation_time {
            self.state = SeirState::Infectious;
            self.age_in_state = 0;
        }
        if self.state == SeirState::Infectious && self.age_in_state >= context.recovery_time {
            self.state = SeirState::Recovered;
            self.age_in_state = 0;
        }

        let bounds = context.bounds;
        let step = Uniform::new_inclusive(-1i64, 1i64);
        let dx = self.rng.sample(step);
        let dy = self.rng.sample(step);
        let bx = (self.position.x + dx).clamp(bounds.top_left.x, bounds.bottom_right().x - 1);
        let by = (self.position.y + dy).clamp(bounds.top_left.y, bounds.bottom_right().y - 1);
        self.ghost_position = XY::new(bx, by);
    }

    fn bust_ghost(&mut self) {
        self.position = self.ghost_position;
    }

    fn rebind(&mut self, _context: &Self::Context) {
        // The reference person carries no patch back-reference; nothing to
        // rebind beyond what `tick` reads fresh from its context each call.
    }

    fn infect(&mut self) {
        if self.state == SeirState::Susceptible {
            self.state = SeirState::Exposed;
            self.age_in_state = 0;
        }
    }

    fn is_infectious(&self) -> bool {
        self.state == SeirState::Infectious
    }

    fn is_coughing(&self) -> bool {
        self.is_infectious()
    }

    fn is_breathing(&self) -> bool {
        !matches!(self.state, SeirState::Recovered)
    }

    fn is_susceptible(&self) -> bool {
        self.state == SeirState::Susceptible
    }

    fn is_infected(&self) -> bool {
        matches!(self.state, SeirState::Exposed | SeirState::Infectious)
    }

    fn is_recovered(&self) -> bool {
        self.state == SeirState::Recovered
    }

    fn trace_entry(&self) -> TraceEntry {
        TraceEntry {
            id: self.id,
            position: self.position,
            state: self.state.label().to_string(),
        }
    }
}

/// Tiny, non-SEIR person used only by unit tests in this crate that don't
/// want the randomness of `SeirPerson`.
#[cfg(test)]
pub mod test_support {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    pub struct CounterContext(pub u64);

    impl PersonContext for CounterContext {
        fn neutral() -> Self {
            CounterContext(0)
        }
    }

    #[derive(Debug, Clone)]
    pub struct CounterPerson {
        id: u64,
        position: XY,
        context_tag: u64,
        infectious: bool,
        infected: bool,
        recovered: bool,
    }

    impl CounterPerson {
        pub fn new(id: u64, position: XY, context_tag: u64) -> Self {
            Self {
                id,
                position,
                context_tag,
                infectious: false,
                infected: false,
                recovered: false,
            }
        }

        pub fn infectious_at(id: u64, position: XY) -> Self {
            let mut p = Self::new(id, position, 0);
            p.infectious = true;
            p.infected = true;
            p
        }

        pub fn context_tag(&self) -> u64 {
            self.context_tag
        }

        pub fn set_position(&mut self, position: XY) {
            self.position = position;
        }
    }

    impl Person for CounterPerson {
        type Context = CounterContext;

        fn id(&self) -> u64 {
            self.id
        }

        fn position(&self) -> XY {
            self.position
        }

        fn tick(&mut self, _tick: usize, _context: &Self::Context) {}

        fn bust_ghost(&mut self) {}

        fn rebind(&mut self, context: &Self::Context) {
            self.context_tag = context.0;
        }

        fn infect(&mut self) {
            if !self.recovered {
                self.infected = true;
            }
        }

        fn is_infectious(&self) -> bool {
            self.infectious
        }

        fn is_coughing(&self) -> bool {
            self.infectious
        }

        fn is_breathing(&self) -> bool {
            !self.recovered
        }

        fn is_susceptible(&self) -> bool {
            !self.infected && !self.recovered
        }

        fn is_infected(&self) -> bool {
            self.infected
        }

        fn is_recovered(&self) -> bool {
            self.recovered
        }

        fn trace_entry(&self) -> TraceEntry {
            TraceEntry {
                id: self.id,
                position: self.position,
                state: "counter".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn susceptible_becomes_exposed_then_infectious() {
        let ctx = SeirContext {
            bounds: Rectangle::new(XY::new(0, 0), XY::new(5, 5)),
            incubation_time: 2,
            recovery_time: 5,
            rng_seed: 42,
        };
        let mut p = SeirPerson::new(1, XY::new(2, 2), 2, 42);
        assert!(p.is_susceptible());
        p.infect();
        assert!(p.is_infected());
        assert!(!p.is_infectious());

        p.tick(0, &ctx);
        p.bust_ghost();
        p.tick(1, &ctx);
        p.bust_ghost();
        assert!(p.is_infectious());
    }

    #[test]
    fn infectious_becomes_recovered_after_recovery_time() {
        let ctx = SeirContext {
            bounds: Rectangle::new(XY::new(0, 0), XY::new(5, 5)),
            incubation_time: 2,
            recovery_time: 3,
            rng_seed: 1,
        };
        let mut p = SeirPerson::new_infectious(1, XY::new(2, 2), 2, 1);
        for _ in 0..3 {
            assert!(p.is_infectious());
            p.tick(0, &ctx);
            p.bust_ghost();
        }
        assert!(p.is_recovered());
        assert!(!p.is_breathing());
    }

    #[test]
    fn infect_is_noop_once_no_longer_susceptible() {
        let mut p = SeirPerson::new_infectious(1, XY::new(0, 0), 2, 1);
        p.infect();
        assert!(p.is_infectious());
        assert!(!p.is_susceptible());
    }

    #[test]
    fn movement_stays_within_context_bounds() {
        let ctx = SeirContext {
            bounds: Rectangle::new(XY::new(0, 0), XY::new(3, 3)),
            incubation_time: 2,
            recovery_time: 1000,
            rng_seed: 7,
        };
        let mut p = SeirPerson::new(9, XY::new(1, 1), 2, 7);
        for t in 0..50 {
            p.tick(t, &ctx);
            p.bust_ghost();
            assert!(ctx.bounds.contains(p.position()));
        }
    }
}
