//! Named metrics and their current values.

use std::{
    collections::BTreeMap,
    fmt,
    sync::Mutex,
};

use crate::Error;

/// Kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Snapshot value that can move up and down, last write wins.
    Gauge,

    /// Running total that only ever accumulates upward.
    Counter,
}

impl MetricKind {
    /// Name of the kind as used in the `# TYPE` exposition line.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Metric {
    help: String,
    kind: MetricKind,
    value: f64,
}

/// Set of named metrics shared between the update loop and the scrape
/// server.
///
/// All operations take `&self` and synchronize internally, so a single
/// registry behind an [`Arc`](std::sync::Arc) can be updated and
/// scraped concurrently. A scrape always sees a consistent snapshot,
/// never a half written value. Metrics live for the lifetime of the
/// registry, there is no way to unregister.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: Mutex<BTreeMap<String, Metric>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new metric with an initial value of zero.
    ///
    /// Fails with [`Error::DuplicateName`] if a metric with the same
    /// name already exists. Names are immutable once registered.
    pub fn register(&self, name: &str, help: &str, kind: MetricKind) -> Result<(), Error> {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");

        if metrics.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        metrics.insert(
            name.to_string(),
            Metric {
                help: help.to_string(),
                kind,
                value: 0.0,
            },
        );

        Ok(())
    }

    /// Returns the current value of the metric.
    pub fn get(&self, name: &str) -> Result<f64, Error> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");

        metrics
            .get(name)
            .map(|metric| metric.value)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Overwrites the current value of a gauge.
    ///
    /// Fails with [`Error::TypeMismatch`] if `name` is registered as
    /// something other than a gauge.
    pub fn set_gauge(&self, name: &str, value: f64) -> Result<(), Error> {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");

        let metric = metrics
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if metric.kind != MetricKind::Gauge {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: MetricKind::Gauge,
            });
        }

        metric.value = value;

        Ok(())
    }

    /// Adds `delta` to the value of a counter.
    ///
    /// `delta` has to be non-negative, counters never decrease. A
    /// negative delta fails with [`Error::InvalidArgument`] and leaves
    /// the counter unchanged.
    pub fn increment_counter(&self, name: &str, delta: f64) -> Result<(), Error> {
        if delta < 0.0 {
            return Err(Error::InvalidArgument(delta));
        }

        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");

        let metric = metrics
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if metric.kind != MetricKind::Counter {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: MetricKind::Counter,
            });
        }

        metric.value += delta;

        Ok(())
    }

    /// Renders all metrics in the prometheus text exposition format,
    /// sorted by metric name.
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let metrics = self.metrics.lock().expect("metrics lock poisoned");

        let mut out = String::new();

        for (name, metric) in metrics.iter() {
            // Writing to a String can not fail.
            let _ = writeln!(out, "# HELP {} {}", name, metric.help);
            let _ = writeln!(out, "# TYPE {} {}", name, metric.kind);
            let _ = writeln!(out, "{} {}", name, metric.value);
        }

        out
    }
}
