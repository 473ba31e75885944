//! The ambient configuration surface. The core has no file or network I/O
//! (§6), so there is no config *parsing* layer here — just the small set of
//! knobs a caller programmatically sets before constructing a `Simulation`.

/// Which `OutputCollector` strategy to run (spec §4.5 / §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Per-worker bounded queues, lockstep drain. Default: natural
    /// backpressure, bounded memory.
    Lockstep,
    /// Single shared queue, bucketed by tick at the collector. Workers never
    /// stall on output, at the cost of nondeterministic tick-completion
    /// order (the final bucketed output is unaffected).
    FanIn,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Lockstep
    }
}

/// Construction-time configuration for a `Simulation`.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Padding width, in cells, used to derive the cycle duration `K`.
    pub padding: u32,
    pub output_mode: OutputMode,
    /// Prefix used when naming worker/collector threads, purely for
    /// diagnostics (panics, profilers, `tracing` spans).
    pub thread_name_prefix: String,
}

impl SimulationConfig {
    pub fn new(padding: u32) -> Self {
        Self {
            padding,
            output_mode: OutputMode::default(),
            thread_name_prefix: "patchsim".to_string(),
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_mode_is_lockstep() {
        let cfg = SimulationConfig::new(4);
        assert_eq!(cfg.output_mode, OutputMode::Lockstep);
    }

    #[test]
    fn with_output_mode_overrides_default() {
        let cfg = SimulationConfig::new(4).with_output_mode(OutputMode::FanIn);
        assert_eq!(cfg.output_mode, OutputMode::FanIn);
    }
}
