//! `patchsim` — the concurrent core of a discrete-time pandemic simulator
//! over a 2D grid: partitioning and padding geometry, the cycle-duration
//! derivation, the concurrent patch-worker/collector scheduler, and
//! obstacle-aware reachability pruning of padding channels.
//!
//! Per-person movement/state-transition policy, RNG, scenario
//! parsing/serialization, CLI, and a single-threaded reference simulator are
//! all external collaborators; this crate only depends on their trait-level
//! contracts (`Person`, `Validator`).

pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod orchestrator;
pub mod output;
pub mod patch;
pub mod person;
pub mod reachability;
pub mod scenario;
pub mod validator;

pub use channel::PaddingChannel;
pub use config::{OutputMode, SimulationConfig};
pub use error::{SimError, SimResult};
pub use geometry::{Rectangle, XY};
pub use orchestrator::{ContextFactory, PersonFactory, Simulation};
pub use output::{Output, OutputEntry, Statistics};
pub use patch::{cycle_duration, minimum_padding, Patch};
pub use person::{Person, PersonContext, SeirContext, SeirPerson, TraceEntry};
pub use reachability::GridReachability;
pub use scenario::{Parameters, Partition, PersonInfo, PersonSeed, Query, Scenario};
pub use validator::{NullValidator, Validator};
