//! The observer contract and its registry.
//!
//! Observers are external collaborators that look at (and may modify) the
//! CPU once per completed tick. Each one runs on its own thread; the host
//! only hands it the CPU between ticks.

use crate::config::EmuConfig;
use crate::cpu::Cpu;
use crate::host::{HostError, ShutdownSignal};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// What an observer wants the host to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Shutdown,
}

/// Long-running work started alongside an observer. Receives the shared
/// CPU and a signal raised when the host stops; must return once it is.
pub type Background = Box<dyn FnOnce(Arc<Mutex<Cpu>>, ShutdownSignal) + Send>;

/// A per-tick hook into the emulator.
pub trait Observer: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once on the observer's thread before the first tick.
    fn on_start(&mut self, _cpu: &mut Cpu) -> TickControl {
        TickControl::Continue
    }

    /// Called exactly once after every completed tick, before the next one
    /// begins.
    fn on_tick(&mut self, cpu: &mut Cpu) -> TickControl;

    /// Called once when the host stops issuing ticks.
    fn on_shutdown(&mut self) {}

    /// Work to run between ticks for the whole run, e.g. refreshing a
    /// display. Taken once before the observer starts; the host joins it
    /// before [`Host::run`](crate::host::Host::run) returns.
    fn background(&mut self) -> Option<Background> {
        None
    }
}

type Factory = Box<dyn Fn(&EmuConfig) -> Box<dyn Observer> + Send + Sync>;

/// Named observer constructors, assembled explicitly at startup.
#[derive(Default)]
pub struct ObserverRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ObserverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in observers.
    pub fn with_builtins() -> Self {
        use crate::host::observers::{CycleLimit, LoopDetector, Trace};

        Self::new()
            .register("trace", |_| Box::new(Trace::new()))
            .register("loop-detect", |_| Box::new(LoopDetector::new()))
            .register("cycle-limit", |config| {
                Box::new(CycleLimit::new(config.max_cycles.unwrap_or(CycleLimit::DEFAULT_LIMIT)))
            })
    }

    /// Add (or replace) a constructor.
    pub fn register<F, O>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&EmuConfig) -> Box<O> + Send + Sync + 'static,
        O: Observer + 'static,
    {
        self.factories.insert(
            name.to_string(),
            Box::new(move |config: &EmuConfig| factory(config) as Box<dyn Observer>),
        );
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct one observer by name.
    pub fn create(&self, name: &str, config: &EmuConfig) -> Result<Box<dyn Observer>, HostError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HostError::UnknownObserver(name.to_string()))?;
        Ok(factory(config))
    }

    /// Construct every observer named in the configuration, in order.
    pub fn create_all(&self, config: &EmuConfig) -> Result<Vec<Box<dyn Observer>>, HostError> {
        config
            .observers
            .iter()
            .map(|name| self.create(name, config))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);

    impl Observer for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn on_tick(&mut self, _cpu: &mut Cpu) -> TickControl {
            self.0 += 1;
            TickControl::Continue
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ObserverRegistry::with_builtins();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["cycle-limit", "loop-detect", "trace"]);
    }

    #[test]
    fn test_register_and_create() {
        let registry = ObserverRegistry::new().register("counter", |_| Box::new(Counter(0)));
        let observer = registry.create("counter", &EmuConfig::default()).unwrap();
        assert_eq!(observer.name(), "counter");
    }

    #[test]
    fn test_unknown_observer() {
        let registry = ObserverRegistry::with_builtins();
        let config = EmuConfig {
            observers: vec!["trace".into(), "plotter".into()],
            ..EmuConfig::default()
        };
        assert!(matches!(
            registry.create_all(&config),
            Err(HostError::UnknownObserver(name)) if name == "plotter"
        ));
    }
}
