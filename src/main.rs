// Fake exporter for scrape pipeline testing: one gauge set to a random
// value and one counter incremented by a random amount every five
// seconds, served under /metrics.

use std::{
    net::SocketAddr,
    sync::{
        mpsc,
        Arc,
    },
};

use env_logger::{
    Builder,
    Env,
};
use fake_exporter::{
    registry::{
        MetricKind,
        Registry,
    },
    updater::UpdateLoop,
    Exporter,
};

const DEFAULT_PORT: u16 = 8000;

fn main() {
    // Setup logger with default level info so we can see the messages
    // from fake_exporter.
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let port = match std::env::var("FAKE_EXPORTER_PORT") {
        Ok(raw) => raw.parse().expect("can not parse FAKE_EXPORTER_PORT"),
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    // Create metrics
    let registry = Arc::new(Registry::new());
    registry
        .register("fake_random_metric", "A fake random gauge", MetricKind::Gauge)
        .expect("can not register fake_random_metric");
    registry
        .register("fake_counter", "A fake counter", MetricKind::Counter)
        .expect("can not register fake_counter");

    // Start exporter
    let _exporter = Exporter::builder(addr)
        .with_registry(registry.clone())
        .start()
        .expect("can not start exporter");

    // The sender stays alive for the whole process, the loop only
    // stops when the process is killed.
    let (_shutdown, shutdown_receiver) = mpsc::channel();

    UpdateLoop::new(registry, "fake_random_metric", "fake_counter")
        .run(shutdown_receiver)
        .expect("update loop failed");
}
