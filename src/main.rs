//! Demo service: one port, HTTP routes, and a hot-reloaded message of the day.
//!
//! A deployment with generated gRPC services would register a
//! `GrpcServer::new(|mut builder| builder.add_service(...))` ahead of the
//! HTTP variant in the mixed server list; this demo keeps the wiring
//! HTTP-only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;

use polyserve::config::{load_config, ServiceConfig};
use polyserve::lifecycle::signals;
use polyserve::reload::FetchError;
use polyserve::{HttpServer, MixedServer, Poller, Reloadable, ServiceRunner, Shutdown};

const DEFAULT_MOTD: &str = "hello from polyserve";

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Configuration file (TOML).
    #[clap(short, long, default_value = "polyserve.toml")]
    config: PathBuf,

    /// Message-of-the-day file, hot-reloaded and served at /motd.
    #[clap(short, long, default_value = "motd.txt")]
    motd: PathBuf,
}

/// Polls the motd file, versioned by its modification time. A missing file is
/// not an error; the default message is served instead.
struct MotdPoller {
    path: PathBuf,
}

impl MotdPoller {
    fn current_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .ok()
            .and_then(|m| m.modified().ok())
    }
}

#[async_trait]
impl Poller for MotdPoller {
    type Snapshot = String;
    type Version = Option<SystemTime>;

    fn init_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn fetch(&self) -> Result<(Self::Version, Self::Snapshot), FetchError> {
        let message = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_MOTD.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok((self.current_mtime(), message))
    }

    fn is_outdated(&self, current: &Self::Version) -> bool {
        self.current_mtime() != *current
    }
}

#[tokio::main]
async fn main() {
    polyserve::observability::logging::init("polyserve=debug,tower_http=debug");

    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                file = %args.config.display(),
                error = %e,
                "Failed to load configuration, using defaults"
            );
            ServiceConfig::default()
        }
    };

    tracing::info!(
        bind_address = %config.bind_address,
        shutdown_wait_secs = config.shutdown_wait_secs,
        "Configuration loaded"
    );

    let motd = match Reloadable::with_poller(MotdPoller { path: args.motd }).await {
        Ok(cell) => cell,
        Err(e) => {
            tracing::warn!(error = %e, "Motd reloader failed to initialize");
            return;
        }
    };

    let http = HttpServer::new(move || {
        let motd = motd.clone();
        Router::new()
            .route("/", get(|| async { "polyserve" }))
            .route(
                "/motd",
                get(move || {
                    let motd = motd.clone();
                    async move { (*motd.get()).clone() }
                }),
            )
            .layer(TraceLayer::new_for_http())
    });

    let server = Arc::new(
        MixedServer::new(vec![Arc::new(http)]).with_sniff_timeout(config.sniff_timeout()),
    );

    let shutdown = Shutdown::with_drain_timeout(config.shutdown_wait());
    signals::trigger_on_termination(shutdown.clone());

    let runner = ServiceRunner::from_config(&config, server);
    if let Err(e) = runner.run(shutdown).await {
        tracing::warn!(error = %e, "Service did not start");
    }

    tracing::info!("Bye");
}
