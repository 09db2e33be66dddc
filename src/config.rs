//! Simulation configuration.

use crate::time::VirtualTime;

/// Knobs applied when a [`Simulation`](crate::Simulation) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Initial value of the virtual clock.
    pub start_time: VirtualTime,
    /// Debug flag given to every newly created signal.
    pub debug_signals: bool,
    /// Append a `DeliveryRecord` to the simulation trace for every
    /// delivery made by a debug-enabled signal.
    pub record_trace: bool,
}

impl SimulationConfig {
    /// Quiet signals, trace recording on, clock at zero.
    pub fn new() -> Self {
        SimulationConfig {
            start_time: VirtualTime::ZERO,
            debug_signals: false,
            record_trace: true,
        }
    }

    /// Every signal starts with debug output enabled.
    pub fn verbose() -> Self {
        SimulationConfig {
            debug_signals: true,
            ..Self::new()
        }
    }

    /// Start the clock at `start` instead of zero.
    pub fn starting_at(mut self, start: VirtualTime) -> Self {
        self.start_time = start;
        self
    }

    /// Toggle trace recording.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.start_time, VirtualTime::ZERO);
        assert!(!cfg.debug_signals);
        assert!(cfg.record_trace);
    }

    #[test]
    fn test_builders() {
        let cfg = SimulationConfig::verbose()
            .starting_at(VirtualTime::new(100))
            .with_trace(false);
        assert!(cfg.debug_signals);
        assert_eq!(cfg.start_time.ticks(), 100);
        assert!(!cfg.record_trace);
    }
}
