//! Beat scheduler
//!
//! Owns the monotonically increasing beat counter and the wrap point. A
//! collector with cadence `c` is due at beat `b` iff `b % c == 0`; the wrap
//! modulus is chosen so that wrapping never starves a registered cadence.

use crate::error::AgentError;

/// Logical clock driving the multiplexed collectors.
///
/// The cycle length is `max(cadences) + 1`, the cheapest modulus that still
/// exercises every cadence at least once per cycle. A true LCM-based cycle
/// would keep phase relationships uniform across wraps; callers must not
/// assume phase continuity across a wrap with this policy.
#[derive(Debug)]
pub struct BeatScheduler {
    beat: u64,
    cycle_length: u64,
}

impl BeatScheduler {
    /// Build a scheduler for the given cadence set.
    ///
    /// Rejects zero cadences, which have no defined due-semantics.
    pub fn new(cadences: &[u64]) -> Result<Self, AgentError> {
        if cadences.contains(&0) {
            return Err(AgentError::Configuration(
                "cadences must be positive".into(),
            ));
        }
        Ok(Self {
            beat: 1,
            cycle_length: Self::cycle_length(cadences),
        })
    }

    /// Wrap modulus for a cadence set: `max(cadences) + 1`, at minimum 2.
    pub fn cycle_length(cadences: &[u64]) -> u64 {
        cadences.iter().copied().max().unwrap_or(1) + 1
    }

    /// The current beat. Starts at 1.
    pub fn beat(&self) -> u64 {
        self.beat
    }

    /// The wrap modulus this scheduler was built with.
    pub fn cycle(&self) -> u64 {
        self.cycle_length
    }

    /// Advance the clock by one beat, wrapping back to 1 past the cycle
    /// length. Returns the new beat.
    pub fn advance(&mut self) -> u64 {
        self.beat += 1;
        if self.beat > self.cycle_length {
            self.beat = 1;
        }
        self.beat
    }
}
