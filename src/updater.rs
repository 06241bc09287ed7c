//! Periodic task that applies fresh synthetic values to the registry.

use std::{
    sync::{
        mpsc::{
            Receiver,
            RecvTimeoutError,
        },
        Arc,
    },
    time::Duration,
};

use log::{
    debug,
    error,
};

use crate::{
    generator::ValueGenerator,
    registry::Registry,
    Error,
};

/// Message that stops a running [`UpdateLoop`].
pub struct Shutdown;

/// Regenerates the synthetic metric values on a fixed period until it
/// is shut down.
pub struct UpdateLoop {
    registry: Arc<Registry>,
    gauge: String,
    counter: String,
    period: Duration,
}

impl UpdateLoop {
    /// Default time between updates.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

    /// Creates an update loop that will set `gauge` and increment
    /// `counter` in the given registry every [`Self::DEFAULT_PERIOD`].
    pub fn new(
        registry: Arc<Registry>,
        gauge: impl Into<String>,
        counter: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            gauge: gauge.into(),
            counter: counter.into(),
            period: Self::DEFAULT_PERIOD,
        }
    }

    /// Overrides the default update period.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Runs the loop on the calling thread until `shutdown` receives a
    /// message or the sender is dropped.
    ///
    /// The interval sleep doubles as the shutdown wait, so the loop
    /// reacts to shutdown without finishing the current sleep. A
    /// registry failure is a programming error, the loop terminates
    /// with that error instead of retrying.
    pub fn run(self, shutdown: Receiver<Shutdown>) -> Result<(), Error> {
        let mut generator = ValueGenerator::new();

        loop {
            match shutdown.recv_timeout(self.period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(Shutdown) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }

            if let Err(err) = self.tick(&mut generator) {
                error!("can not update metrics: {err}");
                return Err(err);
            }
        }
    }

    fn tick(&self, generator: &mut ValueGenerator) -> Result<(), Error> {
        let value = generator.next_gauge_value();
        let delta = generator.next_counter_delta();

        debug!("updating metrics, gauge {value}, counter delta {delta}");

        self.registry.set_gauge(&self.gauge, value)?;
        self.registry.increment_counter(&self.counter, delta as f64)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            mpsc,
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::{
        Shutdown,
        UpdateLoop,
    };
    use crate::{
        registry::{
            MetricKind,
            Registry,
        },
        Error,
    };

    fn test_registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        registry
            .register("g", "test gauge", MetricKind::Gauge)
            .unwrap();
        registry
            .register("c", "test counter", MetricKind::Counter)
            .unwrap();

        registry
    }

    #[test]
    fn applies_values_until_shutdown() {
        let registry = test_registry();

        let (sender, receiver) = mpsc::channel();

        let handle = {
            let registry = registry.clone();

            thread::spawn(move || {
                UpdateLoop::new(registry, "g", "c")
                    .with_period(Duration::from_millis(5))
                    .run(receiver)
            })
        };

        // Wait for at least one tick to land.
        let mut ticked = false;
        for _ in 0..200 {
            thread::sleep(Duration::from_millis(5));

            if registry.get("g").unwrap() != 0.0 {
                ticked = true;
                break;
            }
        }

        sender.send(Shutdown).unwrap();
        handle.join().unwrap().unwrap();

        assert!(ticked, "update loop never ticked");

        let gauge = registry.get("g").unwrap();
        assert!((0.0..100.0).contains(&gauge));

        let counter = registry.get("c").unwrap();
        assert!(counter >= 0.0);
    }

    #[test]
    fn gauge_changes_across_ticks() {
        let registry = test_registry();

        let (sender, receiver) = mpsc::channel();

        let handle = {
            let registry = registry.clone();

            thread::spawn(move || {
                UpdateLoop::new(registry, "g", "c")
                    .with_period(Duration::from_millis(1))
                    .run(receiver)
            })
        };

        let mut seen = Vec::new();
        for _ in 0..500 {
            thread::sleep(Duration::from_millis(1));

            let value = registry.get("g").unwrap();
            if !seen.contains(&value) {
                seen.push(value);
            }

            if seen.len() > 2 {
                break;
            }
        }

        sender.send(Shutdown).unwrap();
        handle.join().unwrap().unwrap();

        // Two uniform draws from [0, 100) never collide in practice.
        assert!(seen.len() > 2, "gauge value never changed: {seen:?}");
    }

    #[test]
    fn registry_failure_is_fatal() {
        let registry = test_registry();

        let (_sender, receiver) = mpsc::channel();

        // Counter name points at the gauge, the first tick has to die
        // with a type mismatch.
        let err = UpdateLoop::new(registry, "g", "g")
            .with_period(Duration::from_millis(1))
            .run(receiver)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: MetricKind::Counter,
                ..
            }
        ));
    }

    #[test]
    fn dropped_sender_stops_the_loop() {
        let registry = test_registry();

        let (sender, receiver) = mpsc::channel::<Shutdown>();
        drop(sender);

        UpdateLoop::new(registry, "g", "c")
            .with_period(Duration::from_millis(1))
            .run(receiver)
            .unwrap();
    }
}
