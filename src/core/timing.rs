//! Coarse phase timers for stage calls.

use std::ops::AddAssign;
use std::time::{Duration, Instant};

/// Wall-clock time spent in each phase of one stage call.
///
/// Accumulated across every batch of the call; the orchestrator appends one
/// record per call to the caller's list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    /// Resize, normalize and batch packing.
    pub preprocess: Duration,
    /// Time inside the inference engine.
    pub inference: Duration,
    /// Output decoding.
    pub postprocess: Duration,
}

impl StageTimings {
    /// Sum of all three phases.
    pub fn total(&self) -> Duration {
        self.preprocess + self.inference + self.postprocess
    }
}

impl AddAssign for StageTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.preprocess += rhs.preprocess;
        self.inference += rhs.inference;
        self.postprocess += rhs.postprocess;
    }
}

/// The phase a [`PhaseTimer`] measurement is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preprocess,
    Inference,
    Postprocess,
}

/// Accumulates phase durations for one call.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    timings: StageTimings,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and charges its wall-clock time to `phase`.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add(phase, start.elapsed());
        out
    }

    /// Adds an externally measured duration to `phase`.
    pub fn add(&mut self, phase: Phase, elapsed: Duration) {
        match phase {
            Phase::Preprocess => self.timings.preprocess += elapsed,
            Phase::Inference => self.timings.inference += elapsed,
            Phase::Postprocess => self.timings.postprocess += elapsed,
        }
    }

    /// Appends the accumulated record to `sink`.
    pub fn finish(self, sink: &mut Vec<StageTimings>) {
        sink.push(self.timings);
    }

    pub fn timings(&self) -> StageTimings {
        self.timings
    }
}
