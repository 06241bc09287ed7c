//! Helper to export synthetic prometheus metrics using tiny-http.
//!
//! Holds a [`Registry`](registry::Registry) of named gauges and
//! counters, an [`UpdateLoop`](updater::UpdateLoop) that regenerates
//! their values on a fixed period and an http server that serves the
//! registry in the prometheus text exposition format. The update loop
//! and the server only share the registry, a scrape observes whatever
//! the registry holds at that moment.
//!
//! ```no_run
//! use std::{
//!     net::SocketAddr,
//!     sync::Arc,
//! };
//!
//! use fake_exporter::{
//!     registry::{
//!         MetricKind,
//!         Registry,
//!     },
//!     Exporter,
//! };
//!
//! let addr: SocketAddr = "0.0.0.0:8000".parse().expect("can not parse listen addr");
//!
//! let registry = Arc::new(Registry::new());
//! registry
//!     .register("the_answer", "to everything", MetricKind::Gauge)
//!     .expect("can not register the_answer");
//! registry.set_gauge("the_answer", 42.0).expect("can not set the_answer");
//!
//! // Makes the metrics available under http://0.0.0.0:8000/metrics
//! Exporter::builder(addr)
//!     .with_registry(registry)
//!     .start()
//!     .expect("can not start exporter");
//! ```

#![deny(missing_docs)]

pub mod generator;
pub mod registry;
pub mod updater;


use std::{
    io::Cursor,
    net::{
        SocketAddr,
        TcpListener,
    },
    sync::Arc,
    thread,
};

use ascii::AsciiString;
use either::Either;
use log::{
    error,
    info,
};
use tiny_http::{
    Header,
    Method,
    Response,
    Server,
};

use crate::registry::{
    MetricKind,
    Registry,
};

/// Scrape path used when none is configured on the [`Builder`].
pub const DEFAULT_ENDPOINT: &str = "/metrics";

/// Content type of the text exposition format.
const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Errors that can happen when using this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metric name is already registered.
    #[error("metric `{0}` is already registered")]
    DuplicateName(String),

    /// Metric name was never registered.
    #[error("metric `{0}` is not registered")]
    NotFound(String),

    /// Operation does not match the kind the metric was registered as.
    #[error("metric `{name}` is not a {expected}")]
    TypeMismatch {
        /// Name the operation was called with.
        name: String,

        /// Kind the operation requires.
        expected: MetricKind,
    },

    /// Counter increment was negative.
    #[error("counter increment has to be non-negative, got {0}")]
    InvalidArgument(f64),

    /// Scrape endpoint is not a usable http path.
    #[error("invalid scrape endpoint `{0}`")]
    Endpoint(String),

    /// Can not bind to the requested address.
    #[error("can not bind to {binding}: {source}")]
    Bind {
        /// Address the exporter tried to bind to.
        binding: SocketAddr,

        /// Underlying bind failure.
        source: std::io::Error,
    },

    /// Http server could not be started.
    #[error("can not start http server: {0}")]
    ServerStart(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Builder to create a new [`Exporter`].
pub struct Builder {
    binding: Either<SocketAddr, TcpListener>,
    endpoint: String,
    registry: Arc<Registry>,
}

impl Builder {
    /// Creates a new builder that will bind to the given address.
    pub fn new(binding: SocketAddr) -> Self {
        Self {
            binding: Either::Left(binding),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            registry: Arc::new(Registry::new()),
        }
    }

    /// Creates a new builder serving on an already bound listener.
    /// Useful for tests that bind port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            binding: Either::Right(listener),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            registry: Arc::new(Registry::new()),
        }
    }

    /// Sets the registry served by the exporter.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the path metrics are served under instead of
    /// [`DEFAULT_ENDPOINT`]. Leading and trailing slashes are
    /// normalized away.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, Error> {
        let trimmed = endpoint.trim_matches('/');

        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c == '?' || c == '#')
        {
            return Err(Error::Endpoint(endpoint.to_string()));
        }

        self.endpoint = format!("/{trimmed}");

        Ok(self)
    }

    /// Binds the http server and starts serving scrapes on a
    /// background thread.
    pub fn start(self) -> Result<Exporter, Error> {
        let listener = match self.binding {
            Either::Left(binding) => {
                TcpListener::bind(binding).map_err(|source| Error::Bind { binding, source })?
            }
            Either::Right(listener) => listener,
        };

        let addr = listener
            .local_addr()
            .map_err(|err| Error::ServerStart(Box::new(err)))?;

        let server = Server::from_listener(listener, None).map_err(Error::ServerStart)?;

        let registry = self.registry;
        let endpoint = self.endpoint;

        thread::Builder::new()
            .name("fake_exporter".to_string())
            .spawn(move || handle_requests(&server, &registry, &endpoint))
            .map_err(|err| Error::ServerStart(Box::new(err)))?;

        info!("Listening on http://{addr}");

        Ok(Exporter { addr })
    }
}

/// Handle to a running scrape server.
pub struct Exporter {
    addr: SocketAddr,
}

impl Exporter {
    /// Creates a [`Builder`] that will bind to the given address.
    pub fn builder(binding: SocketAddr) -> Builder {
        Builder::new(binding)
    }

    /// Creates a [`Builder`] serving on an already bound listener.
    pub fn builder_listener(listener: TcpListener) -> Builder {
        Builder::from_listener(listener)
    }

    /// Address the server is listening on. Carries the actual port
    /// when the builder was given port 0.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

fn handle_requests(server: &Server, registry: &Arc<Registry>, endpoint: &str) {
    // One thread per request, a slow or disconnecting client only
    // delays or loses its own response.
    for request in server.incoming_requests() {
        let registry = Arc::clone(registry);
        let endpoint = endpoint.to_string();

        thread::spawn(move || {
            let response = match (request.method(), request.url()) {
                (Method::Get, url) if url == endpoint => scrape(&registry),
                (Method::Get, _) => redirect(&endpoint),
                _ => method_not_allowed(),
            };

            if let Err(err) = request.respond(response) {
                error!("can not send response: {err}");
            }
        });
    }
}

fn scrape(registry: &Registry) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(registry.render()).with_header(Header {
        field: "Content-Type"
            .parse()
            .expect("can not parse content type field"),
        value: AsciiString::from_ascii(CONTENT_TYPE).expect("can not parse content type value"),
    })
}

fn redirect(endpoint: &str) -> Response<Cursor<Vec<u8>>> {
    Response::from_string(format!("try {endpoint} for metrics\n")).with_status_code(301)
}

fn method_not_allowed() -> Response<Cursor<Vec<u8>>> {
    Response::from_string("method not allowed\n").with_status_code(405)
}
