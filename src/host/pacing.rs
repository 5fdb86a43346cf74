//! Best-effort pacing of ticks to a target frequency.
//!
//! A cycle that finishes early sleeps for the rest of its period. A cycle
//! that overruns is not made up for later.

use crate::cpu::Cpu;
use crate::host::{HostError, ShutdownSignal};
use std::time::{Duration, Instant};

/// Sleeps out the remainder of each period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacer {
    period: Duration,
}

impl Pacer {
    pub fn new(target_hz: f64) -> Result<Self, HostError> {
        if !target_hz.is_finite() || target_hz <= 0.0 {
            return Err(HostError::InvalidFrequency(target_hz));
        }
        let period = Duration::try_from_secs_f64(1.0 / target_hz)
            .map_err(|_| HostError::InvalidFrequency(target_hz))?;
        Ok(Self { period })
    }

    /// Length of one cycle.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep for whatever is left of the period after `elapsed`.
    ///
    /// Returns the time actually slept; zero on overrun or when shutdown
    /// is already requested.
    pub fn pace(&self, elapsed: Duration, signal: &ShutdownSignal) -> Duration {
        let Some(remaining) = self.period.checked_sub(elapsed) else {
            return Duration::ZERO;
        };
        if remaining.is_zero() {
            return Duration::ZERO;
        }
        let start = Instant::now();
        signal.wait_timeout(remaining);
        start.elapsed()
    }
}

/// Timing of one paced cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceReport {
    /// CPU cycle count after the tick.
    pub cycle: u64,
    /// Time spent ticking.
    pub elapsed: Duration,
    /// Time spent sleeping afterwards.
    pub slept: Duration,
}

/// Rolling tick timing, summarized every `interval` ticks.
#[derive(Debug, Clone)]
pub struct TickStats {
    interval: u64,
    count: u64,
    total: Duration,
}

/// Summary of one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub ticks: u64,
    pub total: Duration,
    pub average: Duration,
}

impl StatsSummary {
    /// Frequency the work alone could sustain, ignoring sleeps.
    pub fn max_hz(&self) -> f64 {
        let avg = self.average.as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            f64::INFINITY
        }
    }
}

impl TickStats {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.clamp(1, u32::MAX as u64),
            count: 0,
            total: Duration::ZERO,
        }
    }

    /// Record one cycle. Returns a summary and starts over once the
    /// interval is full.
    pub fn record(&mut self, elapsed: Duration) -> Option<StatsSummary> {
        self.count += 1;
        self.total += elapsed;
        if self.count < self.interval {
            return None;
        }

        let summary = StatsSummary {
            ticks: self.count,
            total: self.total,
            average: self.total / self.count as u32,
        };
        self.count = 0;
        self.total = Duration::ZERO;
        Some(summary)
    }
}

/// Tick `cpu` repeatedly at about `target_hz` until `signal` is raised.
///
/// `report` is called after every cycle with its timing. Returns the
/// number of ticks executed.
pub fn run_paced<F>(
    cpu: &mut Cpu,
    target_hz: f64,
    signal: &ShutdownSignal,
    mut report: F,
) -> Result<u64, HostError>
where
    F: FnMut(&PaceReport),
{
    let pacer = Pacer::new(target_hz)?;
    let mut ticks = 0;

    while !signal.is_requested() {
        let start = Instant::now();
        cpu.tick()?;
        let elapsed = start.elapsed();
        ticks += 1;

        let slept = pacer.pace(elapsed, signal);
        report(&PaceReport {
            cycle: cpu.cycles,
            elapsed,
            slept,
        });
    }

    Ok(ticks)
}
