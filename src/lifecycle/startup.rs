//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the breaker registry from configuration
//! - Start background tasks (event log, config reload)
//! - Bind the admin listener last
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::collections::HashSet;
use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::RecommendedWatcher;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::schema::{BreakerEntry, ServiceConfig};
use crate::config::watcher::ConfigWatcher;
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::lifecycle::signals;
use crate::notification::{BreakerEvent, LocalEventBus, NotificationChannel};
use crate::observability::metrics::init_metrics;
use crate::registry::BreakerRegistry;

/// How long `stop` waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid {field} '{value}': {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to bind admin listener on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|source| StartupError::InvalidAddress {
        field,
        value: value.to_string(),
        source,
    })
}

/// Logs every event published on the addresses it follows.
struct EventLog {
    bus: LocalEventBus,
    shutdown: Shutdown,
    followed: Mutex<HashSet<String>>,
}

impl EventLog {
    /// Subscribe to the notification address of every entry not already followed.
    fn follow(&self, entries: &[BreakerEntry]) {
        let mut followed = self.followed.lock().unwrap_or_else(PoisonError::into_inner);
        for address in entries.iter().filter_map(|e| e.options.notification_address()) {
            if followed.insert(address.to_string()) {
                let rx = self.bus.subscribe(address);
                tokio::spawn(log_events(address.to_string(), rx, self.shutdown.subscribe()));
            }
        }
    }
}

async fn log_events(address: String, mut rx: broadcast::Receiver<Value>, stop: watch::Receiver<bool>) {
    let stop = shutdown::wait(stop);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            message = rx.recv() => match message {
                Ok(value) => match serde_json::from_value::<BreakerEvent>(value) {
                    Ok(event) => tracing::info!(
                        address = %address,
                        breaker = %event.breaker_name,
                        kind = ?event.kind,
                        state = %event.state,
                        failure_count = event.failure_count,
                        timestamp = event.timestamp,
                        "Breaker event"
                    ),
                    Err(e) => tracing::debug!(address = %address, error = %e, "Ignoring non-event message"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(address = %address, skipped, "Event log lagging");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn apply_reloads(
    registry: Arc<BreakerRegistry>,
    event_log: Arc<EventLog>,
    mut updates: mpsc::UnboundedReceiver<ServiceConfig>,
    stop: watch::Receiver<bool>,
) {
    let stop = shutdown::wait(stop);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            update = updates.recv() => match update {
                Some(config) => {
                    event_log.follow(&config.breakers);
                    registry.reconcile(&config.breakers);
                }
                None => break,
            },
        }
    }
}

/// A started service.
pub struct Service {
    registry: Arc<BreakerRegistry>,
    bus: LocalEventBus,
    admin_addr: Option<SocketAddr>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Service {
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Bus the breakers publish on.
    pub fn bus(&self) -> &LocalEventBus {
        &self.bus
    }

    /// Bound admin address, if the admin API is enabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(self) {
        signals::shutdown_signal().await;
        tracing::info!("Starting graceful shutdown");
        self.stop().await;
    }

    /// Trigger shutdown and wait for background tasks to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Background task failed"),
                Err(_) => tracing::warn!("Background task did not stop in time"),
            }
        }
        tracing::info!("Shutdown complete");
    }
}

/// Start the service described by `config`.
///
/// `config_path` enables hot reload of the breaker table from that file.
pub async fn start(config: ServiceConfig, config_path: Option<&Path>) -> Result<Service, StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr("metrics address", &config.observability.metrics_address)?;
        init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let bus = LocalEventBus::new();
    let channel: Arc<dyn NotificationChannel> = Arc::new(bus.clone());

    let event_log = Arc::new(EventLog {
        bus: bus.clone(),
        shutdown: shutdown.clone(),
        followed: Mutex::new(HashSet::new()),
    });
    event_log.follow(&config.breakers);

    let registry = Arc::new(BreakerRegistry::from_entries(&config.breakers, Some(channel)));
    tracing::info!(breakers = registry.len(), names = ?registry.names(), "Breaker registry ready");

    let mut tasks = Vec::new();

    let watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            let handle = watcher.run()?;
            tasks.push(tokio::spawn(apply_reloads(
                registry.clone(),
                event_log.clone(),
                updates,
                shutdown.subscribe(),
            )));
            Some(handle)
        }
        None => None,
    };

    let admin_addr = if config.admin.enabled {
        let address = parse_addr("admin bind address", &config.admin.bind_address)?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        let bound = listener.local_addr().map_err(|source| StartupError::Bind { address, source })?;

        let state = AdminState::new(registry.clone(), config.admin.api_key.as_str());
        let stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, stop).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
        Some(bound)
    } else {
        None
    };

    Ok(Service {
        registry,
        bus,
        admin_addr,
        shutdown,
        tasks,
        _watcher: watcher,
    })
}
