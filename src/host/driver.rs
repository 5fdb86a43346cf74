//! The host loop: ticks the CPU at a target frequency and hands the state
//! to every observer between ticks.
//!
//! Each cycle is a strict handoff:
//! 1. the host locks the CPU, ticks once and unlocks;
//! 2. every observer thread gets a `Tick` message and runs its callback;
//! 3. the host waits for an acknowledgement from every observer;
//! 4. the host sleeps out the rest of the period.
//!
//! No observer can see the CPU mid-tick, and no tick starts while an
//! observer callback is still running. Background tasks run freely but
//! take the same lock, so they too only see the CPU between ticks.

use crate::cpu::{Cpu, CpuError};
use crate::host::observer::{Observer, TickControl};
use crate::host::pacing::{Pacer, TickStats};
use crate::host::{HostError, ShutdownSignal};
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Why the host stopped ticking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown signal was raised from outside.
    Signal,
    /// An observer asked to stop.
    Observer(String),
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Total CPU cycle count when the host stopped.
    pub cycles: u64,
    /// Ticks executed by this run.
    pub ticks: u64,
    pub elapsed: Duration,
    pub reason: StopReason,
}

impl RunSummary {
    /// Measured ticks per second over the whole run.
    pub fn frequency(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }
}

enum Phase {
    Tick,
    Stop,
}

/// The host side of one observer thread, plus its background thread if
/// it has one.
struct Worker {
    name: String,
    phase: Sender<Phase>,
    ack: Receiver<TickControl>,
    handle: JoinHandle<()>,
    background: Option<JoinHandle<()>>,
}

fn spawn_error(name: &str, e: std::io::Error) -> HostError {
    HostError::Spawn {
        name: name.to_string(),
        message: e.to_string(),
    }
}

impl Worker {
    fn spawn(
        mut observer: Box<dyn Observer>,
        cpu: Arc<Mutex<Cpu>>,
        stop: &ShutdownSignal,
    ) -> Result<Self, HostError> {
        let name = observer.name().to_string();
        let (phase_tx, phase_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();

        let background = match observer.background() {
            Some(task) => {
                let (cpu, stop) = (Arc::clone(&cpu), stop.clone());
                let handle = thread::Builder::new()
                    .name(format!("observer-{}-bg", name))
                    .spawn(move || task(cpu, stop))
                    .map_err(|e| spawn_error(&name, e))?;
                Some(handle)
            }
            None => None,
        };

        let spawned = thread::Builder::new()
            .name(format!("observer-{}", name))
            .spawn(move || {
                let control = match cpu.lock() {
                    Ok(mut cpu) => observer.on_start(&mut cpu),
                    Err(_) => TickControl::Shutdown,
                };
                if ack_tx.send(control).is_ok() {
                    while let Ok(Phase::Tick) = phase_rx.recv() {
                        let control = match cpu.lock() {
                            Ok(mut cpu) => observer.on_tick(&mut cpu),
                            Err(_) => TickControl::Shutdown,
                        };
                        if ack_tx.send(control).is_err() {
                            break;
                        }
                    }
                }
                observer.on_shutdown();
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(bg) = background {
                    stop.request();
                    let _ = bg.join();
                }
                return Err(spawn_error(&name, e));
            }
        };

        Ok(Self {
            name,
            phase: phase_tx,
            ack: ack_rx,
            handle,
            background,
        })
    }
}

/// Builder for [`Host`].
pub struct HostBuilder {
    cpu: Cpu,
    frequency_hz: f64,
    report_interval: u64,
    observers: Vec<Box<dyn Observer>>,
    signal: ShutdownSignal,
}

impl HostBuilder {
    pub fn frequency(mut self, hz: f64) -> Self {
        self.frequency_hz = hz;
        self
    }

    /// Log average tick time every `ticks` ticks. Zero disables it.
    pub fn report_interval(mut self, ticks: u64) -> Self {
        self.report_interval = ticks;
        self
    }

    pub fn observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observers(mut self, observers: Vec<Box<dyn Observer>>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Use an existing signal, e.g. one wired to Ctrl-C.
    pub fn signal(mut self, signal: ShutdownSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn build(self) -> Result<Host, HostError> {
        Ok(Host {
            cpu: Arc::new(Mutex::new(self.cpu)),
            pacer: Pacer::new(self.frequency_hz)?,
            report_interval: self.report_interval,
            observers: self.observers,
            signal: self.signal,
        })
    }
}

/// Drives a CPU together with its observers.
pub struct Host {
    cpu: Arc<Mutex<Cpu>>,
    pacer: Pacer,
    report_interval: u64,
    observers: Vec<Box<dyn Observer>>,
    signal: ShutdownSignal,
}

impl Host {
    pub const DEFAULT_FREQUENCY_HZ: f64 = 100.0;

    pub fn builder(cpu: Cpu) -> HostBuilder {
        HostBuilder {
            cpu,
            frequency_hz: Self::DEFAULT_FREQUENCY_HZ,
            report_interval: 0,
            observers: Vec::new(),
            signal: ShutdownSignal::new(),
        }
    }

    /// Shared handle to the CPU; stays valid after [`Host::run`].
    pub fn cpu(&self) -> Arc<Mutex<Cpu>> {
        Arc::clone(&self.cpu)
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Run until shutdown is requested or the CPU faults.
    ///
    /// Every observer thread has finished by the time this returns.
    pub fn run(self) -> Result<RunSummary, HostError> {
        // raised when the run ends, for background tasks
        let stop = ShutdownSignal::new();
        let mut workers = Vec::with_capacity(self.observers.len());
        for observer in self.observers {
            info!("starting observer {}", observer.name());
            match Worker::spawn(observer, Arc::clone(&self.cpu), &stop) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    stop_workers(workers, &stop);
                    return Err(e);
                }
            }
        }

        let start = Instant::now();
        let mut ticks = 0;
        let result = collect_acks(&workers).and_then(|requested| match requested {
            Some(name) => Ok(StopReason::Observer(name)),
            None => run_cycles(&self.cpu, &workers, &self.pacer, &self.signal, self.report_interval, &mut ticks),
        });
        let elapsed = start.elapsed();

        stop_workers(workers, &stop);

        let reason = result?;
        let cycles = lock(&self.cpu)?.cycles;
        info!("stopped after {} ticks in {:?}: {:?}", ticks, elapsed, reason);

        Ok(RunSummary {
            cycles,
            ticks,
            elapsed,
            reason,
        })
    }
}

fn lock(cpu: &Mutex<Cpu>) -> Result<MutexGuard<'_, Cpu>, HostError> {
    cpu.lock().map_err(|_| HostError::Poisoned)
}

fn run_cycles(
    cpu: &Mutex<Cpu>,
    workers: &[Worker],
    pacer: &Pacer,
    signal: &ShutdownSignal,
    report_interval: u64,
    ticks: &mut u64,
) -> Result<StopReason, HostError> {
    let mut stats = (report_interval > 0).then(|| TickStats::new(report_interval));

    loop {
        if signal.is_requested() {
            return Ok(StopReason::Signal);
        }

        let cycle_start = Instant::now();

        let tick: Result<(), CpuError> = lock(cpu)?.tick().map(|_| ());
        if let Err(e) = tick {
            error!("fatal CPU fault: {}", e);
            return Err(e.into());
        }
        *ticks += 1;

        for worker in workers {
            if worker.phase.send(Phase::Tick).is_err() {
                return Err(HostError::ObserverLost(worker.name.clone()));
            }
        }
        if let Some(name) = collect_acks(workers)? {
            return Ok(StopReason::Observer(name));
        }

        let elapsed = cycle_start.elapsed();
        if let Some(summary) = stats.as_mut().and_then(|s| s.record(elapsed)) {
            info!(
                "{} ticks took {:?}, average {:?} (max {:.0} Hz)",
                summary.ticks,
                summary.total,
                summary.average,
                summary.max_hz()
            );
        }
        if elapsed > pacer.period() {
            debug!("cycle overran its period by {:?}", elapsed - pacer.period());
        }

        pacer.pace(elapsed, signal);
    }
}

/// Wait for one acknowledgement from every worker. Returns the name of
/// the first observer that asked to stop.
fn collect_acks(workers: &[Worker]) -> Result<Option<String>, HostError> {
    let mut stop = None;
    for worker in workers {
        match worker.ack.recv() {
            Ok(TickControl::Continue) => {}
            Ok(TickControl::Shutdown) => {
                info!("observer {} requested shutdown", worker.name);
                stop.get_or_insert_with(|| worker.name.clone());
            }
            Err(_) => return Err(HostError::ObserverLost(worker.name.clone())),
        }
    }
    Ok(stop)
}

fn stop_workers(workers: Vec<Worker>, stop: &ShutdownSignal) {
    stop.request();
    for worker in &workers {
        let _ = worker.phase.send(Phase::Stop);
    }
    for worker in workers {
        debug!("waiting for observer {} to finish", worker.name);
        if worker.handle.join().is_err() {
            warn!("observer {} panicked", worker.name);
        }
        if let Some(bg) = worker.background {
            if bg.join().is_err() {
                warn!("background task of observer {} panicked", worker.name);
            }
        }
    }
}
