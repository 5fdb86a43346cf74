//! Running the CPU in real time with concurrent observers.

pub mod driver;
pub mod observer;
pub mod observers;
pub mod pacing;
pub mod shutdown;

pub use driver::{Host, HostBuilder, RunSummary, StopReason};
pub use observer::{Background, Observer, ObserverRegistry, TickControl};
pub use observers::{CycleLimit, LoopDetector, Trace};
pub use pacing::{run_paced, PaceReport, Pacer, StatsSummary, TickStats};
pub use shutdown::ShutdownSignal;

use crate::cpu::CpuError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f64),
    #[error("unknown observer: {0}")]
    UnknownObserver(String),
    #[error("failed to start observer {name}: {message}")]
    Spawn { name: String, message: String },
    #[error("observer {0} stopped responding")]
    ObserverLost(String),
    #[error("cpu lock poisoned by a panicking observer")]
    Poisoned,
    #[error(transparent)]
    Cpu(#[from] CpuError),
}
