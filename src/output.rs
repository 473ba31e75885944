//! Per-tick statistics, the trace, and the two collector designs described
//! in spec §4.5. Design B (per-worker queues, lockstep drain) is the
//! default; Design A (fan-in) is kept for comparison and as an explicit
//! `OutputMode::FanIn` configuration.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};

use crate::config::OutputMode;
use crate::error::SimError;
use crate::person::TraceEntry;

/// SI²R counts for one query at one tick. Generalizes the teacher's
/// `TallyStates` (`susceptible, infected, recovered, dead` -> here
/// `susceptible, infected, infectious, recovered`, one struct-of-arrays
/// dimension per query instead of one global tally).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, soa_derive::StructOfArray)]
#[soa_derive = "Debug"]
pub struct Statistics {
    pub susceptible: u64,
    pub infected: u64,
    pub infectious: u64,
    pub recovered: u64,
}

impl Statistics {
    pub fn merge(self, other: Statistics) -> Statistics {
        Statistics {
            susceptible: self.susceptible + other.susceptible,
            infected: self.infected + other.infected,
            infectious: self.infectious + other.infectious,
            recovered: self.recovered + other.recovered,
        }
    }

    pub fn total(&self) -> u64 {
        self.susceptible + self.infected + self.infectious + self.recovered
    }
}

/// What one patch worker emits for one tick.
#[derive(Debug, Clone)]
pub struct OutputEntry {
    pub tick: usize,
    pub stats_by_query: HashMap<String, Statistics>,
    pub trace: Option<Vec<TraceEntry>>,
}

/// The finalized simulation output.
#[derive(Debug, Clone, Default)]
pub struct Output {
    /// `trace[t]` is empty when trace is disabled, otherwise the full
    /// globally-sorted-by-id list of person infos at tick `t`.
    pub trace: Vec<Vec<TraceEntry>>,
    /// `statistics[key][t]` is the summed `Statistics` for query `key` at
    /// tick `t`.
    pub statistics: HashMap<String, Vec<Statistics>>,
}

/// One end of a worker's output sink: Design B gets one of these per
/// worker, Design A shares a single clone across every worker.
#[derive(Clone)]
pub struct OutputSink {
    patch_id: usize,
    sender: Sender<(usize, OutputEntry)>,
}

impl OutputSink {
    pub fn send(&self, entry: OutputEntry) -> Result<(), SimError> {
        self.sender
            .send((self.patch_id, entry))
            .map_err(|_| SimError::WorkerInterrupted {
                patch_id: self.patch_id,
            })
    }
}

/// Builds the sender/receiver wiring for `num_patches` workers, according to
/// `mode`. Lockstep gets one bounded(1) channel per worker; FanIn gets one
/// shared channel cloned across workers.
pub fn build_sinks(
    num_patches: usize,
    mode: OutputMode,
) -> (Vec<OutputSink>, Vec<Receiver<(usize, OutputEntry)>>) {
    match mode {
        OutputMode::Lockstep => {
            let mut sinks = Vec::with_capacity(num_patches);
            let mut receivers = Vec::with_capacity(num_patches);
            for patch_id in 0..num_patches {
                let (sender, receiver) = crossbeam_channel::bounded(1);
                sinks.push(OutputSink { patch_id, sender });
                receivers.push(receiver);
            }
            (sinks, receivers)
        }
        OutputMode::FanIn => {
            let (sender, receiver) = crossbeam_channel::bounded(num_patches.max(1) * 2);
            let sinks = (0..num_patches)
                .map(|patch_id| OutputSink {
                    patch_id,
                    sender: sender.clone(),
                })
                .collect();
            (sinks, vec![receiver])
        }
    }
}

/// Drains the output sinks and assembles the final `Output`, in the manner
/// described by whichever `OutputMode` the receivers were built with.
pub struct OutputCollector {
    num_patches: usize,
    ticks: usize,
    trace_enabled: bool,
}

impl OutputCollector {
    pub fn new(num_patches: usize, ticks: usize, trace_enabled: bool) -> Self {
        Self {
            num_patches,
            ticks,
            trace_enabled,
        }
    }

    /// Design B: one dedicated receiver per worker, dequeued in lockstep.
    pub fn drain_lockstep(&self, receivers: &[Receiver<(usize, OutputEntry)>]) -> Result<Output, SimError> {
        assert_eq!(receivers.len(), self.num_patches);
        let mut output = self.empty_output();

        for _ in 0..=self.ticks {
            let mut entries = Vec::with_capacity(self.num_patches);
            for (patch_id, receiver) in receivers.iter().enumerate() {
                let (from, entry) = receiver
                    .recv()
                    .map_err(|_| SimError::WorkerInterrupted { patch_id })?;
                if from != patch_id {
                    return Err(SimError::ProgrammerAssertion(format!(
                        "lockstep receiver {} produced entry tagged for patch {}",
                        patch_id, from
                    )));
                }
                entries.push(entry);
            }
            self.merge_tick(&mut output, entries)?;
        }
        Ok(output)
    }

    /// Design A: a single shared queue, entries bucketed by tick until every
    /// patch has reported.
    pub fn drain_fan_in(&self, receiver: &Receiver<(usize, OutputEntry)>) -> Result<Output, SimError> {
        let mut output = self.empty_output();
        let mut buckets: HashMap<usize, Vec<OutputEntry>> = HashMap::new();
        let mut next_tick = 0usize;

        let total = (self.ticks + 1) * self.num_patches;
        for _ in 0..total {
            let (_patch_id, entry) = receiver
                .recv()
                .map_err(|_| SimError::WorkerInterrupted { patch_id: 0 })?;
            let tick = entry.tick;
            let bucket = buckets.entry(tick).or_default();
            bucket.push(entry);

            while let Some(ready) = buckets.get(&next_tick).filter(|b| b.len() == self.num_patches) {
                let ready = ready.clone();
                buckets.remove(&next_tick);
                self.merge_tick(&mut output, ready)?;
                next_tick += 1;
            }
        }
        Ok(output)
    }

    fn empty_output(&self) -> Output {
        Output {
            trace: Vec::with_capacity(self.ticks + 1),
            statistics: HashMap::new(),
        }
    }

    fn merge_tick(&self, output: &mut Output, entries: Vec<OutputEntry>) -> Result<(), SimError> {
        let tick = entries
            .first()
            .map(|e| e.tick)
            .ok_or_else(|| SimError::ProgrammerAssertion("empty tick bucket".to_string()))?;
        if entries.iter().any(|e| e.tick != tick) {
            return Err(SimError::ProgrammerAssertion(
                "mismatched tick numbers within one bucket".to_string(),
            ));
        }

        let mut merged_stats: HashMap<String, Statistics> = HashMap::new();
        let mut merged_trace = if self.trace_enabled { Some(Vec::new()) } else { None };

        for entry in entries {
            for (name, stats) in entry.stats_by_query {
                merged_stats
                    .entry(name)
                    .and_modify(|s| *s = s.merge(stats))
                    .or_insert(stats);
            }
            if let (Some(dst), Some(src)) = (merged_trace.as_mut(), entry.trace) {
                dst.extend(src);
            }
        }

        if let Some(trace) = merged_trace.as_mut() {
            trace.sort_by_key(|t| t.id);
            if trace.windows(2).any(|w| w[0].id == w[1].id) {
                return Err(SimError::ProgrammerAssertion(format!(
                    "duplicate person id in tick {} trace",
                    tick
                )));
            }
        }

        for (name, stats) in &merged_stats {
            output
                .statistics
                .entry(name.clone())
                .or_insert_with(Vec::new)
                .push(*stats);
        }
        output.trace.push(merged_trace.unwrap_or_default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tick: usize, query: &str, stats: Statistics) -> OutputEntry {
        let mut stats_by_query = HashMap::new();
        stats_by_query.insert(query.to_string(), stats);
        OutputEntry {
            tick,
            stats_by_query,
            trace: None,
        }
    }

    #[test]
    fn statistics_merge_is_pointwise() {
        let a = Statistics { susceptible: 1, infected: 2, infectious: 0, recovered: 0 };
        let b = Statistics { susceptible: 3, infected: 0, infectious: 1, recovered: 1 };
        let merged = a.merge(b);
        assert_eq!(merged, Statistics { susceptible: 4, infected: 2, infectious: 1, recovered: 1 });
    }

    #[test]
    fn lockstep_drain_sums_queries_across_patches() {
        let (sinks, receivers) = build_sinks(2, OutputMode::Lockstep);
        let collector = OutputCollector::new(2, 0, false);

        sinks[0]
            .send(entry(0, "q", Statistics { susceptible: 1, ..Default::default() }))
            .unwrap();
        sinks[1]
            .send(entry(0, "q", Statistics { susceptible: 2, ..Default::default() }))
            .unwrap();

        let output = collector.drain_lockstep(&receivers).unwrap();
        assert_eq!(output.statistics["q"][0].susceptible, 3);
    }

    #[test]
    fn fan_in_drain_buckets_out_of_order_arrivals() {
        let (sinks, receivers) = build_sinks(2, OutputMode::FanIn);
        let collector = OutputCollector::new(2, 1, false);
        let receiver = &receivers[0];

        // Patch 1 reports tick 1 before patch 0 reports tick 0.
        sinks[1].send(entry(1, "q", Statistics { infected: 1, ..Default::default() })).unwrap();
        sinks[0].send(entry(0, "q", Statistics { susceptible: 5, ..Default::default() })).unwrap();
        sinks[1].send(entry(0, "q", Statistics { susceptible: 5, ..Default::default() })).unwrap();
        sinks[0].send(entry(1, "q", Statistics { infected: 1, ..Default::default() })).unwrap();

        let output = collector.drain_fan_in(receiver).unwrap();
        assert_eq!(output.statistics["q"][0].susceptible, 10);
        assert_eq!(output.statistics["q"][1].infected, 2);
    }

    #[test]
    fn both_designs_agree_on_the_same_inputs() {
        let lock = {
            let (sinks, receivers) = build_sinks(2, OutputMode::Lockstep);
            let collector = OutputCollector::new(2, 0, false);
            sinks[0].send(entry(0, "q", Statistics { susceptible: 7, ..Default::default() })).unwrap();
            sinks[1].send(entry(0, "q", Statistics { infectious: 2, ..Default::default() })).unwrap();
            collector.drain_lockstep(&receivers).unwrap()
        };
        let fan = {
            let (sinks, receivers) = build_sinks(2, OutputMode::FanIn);
            let collector = OutputCollector::new(2, 0, false);
            sinks[0].send(entry(0, "q", Statistics { susceptible: 7, ..Default::default() })).unwrap();
            sinks[1].send(entry(0, "q", Statistics { infectious: 2, ..Default::default() })).unwrap();
            collector.drain_fan_in(&receivers[0]).unwrap()
        };
        assert_eq!(lock.statistics["q"], fan.statistics["q"]);
    }
}
