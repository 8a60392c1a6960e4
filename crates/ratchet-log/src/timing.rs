use std::collections::HashMap;
use std::collections::VecDeque;

use ratchet_types::LifecyclePhase;
use serde::{Deserialize, Serialize};

/// Aggregated statistics over one phase's sample ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub count: usize,
    pub avg_elapsed_ms: f64,
    pub std_dev_elapsed_ms: f64,
}

/// Per-command-type timing statistics, one block per hook phase.
///
/// The dependency check is not timed; only the three hooks are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub should_defer_timing: PhaseTiming,
    pub should_cancel_timing: PhaseTiming,
    pub execute_timing: PhaseTiming,
}

#[derive(Clone, Debug, Default)]
struct PhaseRings {
    should_defer: VecDeque<f64>,
    should_cancel: VecDeque<f64>,
    execute: VecDeque<f64>,
}

/// Bounded sliding windows of per-phase elapsed-time samples, keyed by
/// command type.
///
/// Each `(command type, phase)` pair keeps the `capacity` most recent
/// samples; older samples are evicted FIFO. A capacity of 0 disables
/// recording entirely and [`TimingRegistry::snapshot`] stays empty.
#[derive(Clone, Debug)]
pub struct TimingRegistry {
    capacity: usize,
    rings: HashMap<&'static str, PhaseRings>,
}

impl TimingRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rings: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record one elapsed-time sample for a hook phase.
    ///
    /// No-op when timing is disabled. `DependencyCheck` samples are
    /// rejected in debug builds; the phase has no timing window.
    pub fn record(&mut self, kind: &'static str, phase: LifecyclePhase, elapsed_ms: f64) {
        debug_assert!(
            phase != LifecyclePhase::DependencyCheck,
            "the dependency check has no timing ring"
        );
        if self.capacity == 0 || phase == LifecyclePhase::DependencyCheck {
            return;
        }
        let rings = self.rings.entry(kind).or_default();
        let ring = match phase {
            LifecyclePhase::ShouldDefer => &mut rings.should_defer,
            LifecyclePhase::ShouldCancel => &mut rings.should_cancel,
            LifecyclePhase::Execute => &mut rings.execute,
            LifecyclePhase::DependencyCheck => return,
        };
        ring.push_back(elapsed_ms);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Compute statistics over the current windows.
    pub fn snapshot(&self) -> HashMap<&'static str, TimingStats> {
        self.rings
            .iter()
            .map(|(kind, rings)| {
                (
                    *kind,
                    TimingStats {
                        should_defer_timing: summarize(&rings.should_defer),
                        should_cancel_timing: summarize(&rings.should_cancel),
                        execute_timing: summarize(&rings.execute),
                    },
                )
            })
            .collect()
    }
}

fn summarize(ring: &VecDeque<f64>) -> PhaseTiming {
    let count = ring.len();
    if count == 0 {
        return PhaseTiming::default();
    }
    let avg = ring.iter().sum::<f64>() / count as f64;
    let variance = ring.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / count as f64;
    PhaseTiming {
        count,
        avg_elapsed_ms: avg,
        std_dev_elapsed_ms: variance.sqrt(),
    }
}
