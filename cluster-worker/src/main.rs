//! Cluster Worker
//!
//! A single-node worker that pulls jobs from a shared queue, runs them with
//! the handler registered for their type, and reports liveness back to the
//! cluster while it does.
//!
//! Architecture:
//! - Configuration: YAML file loaded once at startup, with env overrides
//! - Repositories: Redis-backed job queue and heartbeat store
//! - Services: Resource sampling, admission control, retry policy
//! - Handlers: Job-type specific work (test job, video compression)
//! - Scheduler: Control listener, job dispatcher, per-job heartbeats
//!
//! The control listener and the dispatcher run concurrently from startup.
//! The dispatcher processes one job at a time and only dequeues while the
//! worker has not been paused over its control channel.

mod config;
mod handlers;
mod logging;
mod repository;
mod scheduler;
mod service;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use cluster_client::BrokerClient;
use cluster_core::keys::control_channel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::Config;
use crate::handlers::HandlerRegistry;
use crate::repository::{RedisHeartbeatStore, RedisJobQueue};
use crate::scheduler::{ControlListener, JobDispatcher, ready_flag};
use crate::service::{StandardCapabilityMatcher, SystemResourceMonitor};

#[derive(Parser)]
#[command(name = "cluster-worker")]
#[command(about = "Cluster job worker", long_about = None)]
struct Cli {
    /// Path to the worker configuration file
    #[arg(long, env = "CLUSTER_WORKER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = load_config(&config_path)?;

    // Initialize logging
    let _log_guard = logging::init(&config.log_file);

    info!("Starting Cluster Worker");
    info!(
        "Loaded configuration from {}: worker_name={}, redis={}:{}, queue={}",
        config_path.display(),
        config.worker_name,
        config.redis_host,
        config.redis_port,
        config.redis_queue
    );

    let config = Arc::new(config);
    let span = info_span!("worker", name = %config.worker_name);

    // Connect to the broker
    let client = connect_with_retry(&config).await?;
    info!("Connected to broker at {}", client.url());

    // Control channel
    let (switch, gate) = ready_flag(true);
    let shutdown = CancellationToken::new();

    let channel = control_channel(&config.worker_name);
    let commands = client
        .subscribe(&channel)
        .await
        .with_context(|| format!("Failed to subscribe to {}", channel))?;
    info!("Subscribed to channel: {}", channel);

    let listener = ControlListener::new(config.worker_name.clone(), switch.clone());
    let listener_shutdown = shutdown.clone();
    tokio::spawn(
        async move {
            if let Err(e) = listener.run(commands, listener_shutdown).await {
                error!("Control listener stopped: {:#}", e);
            }
        }
        .instrument(span.clone()),
    );

    // Initialize services
    let monitor = Arc::new(SystemResourceMonitor::new(config.cpu_sample_window()));
    let matcher = StandardCapabilityMatcher::new(config.capabilities.clone(), monitor);

    info!("Declared {} capabilities", matcher.capabilities().len());
    for capability in matcher.capabilities() {
        info!("  - {}", capability);
    }

    let registry = HandlerRegistry::with_builtins();
    info!("Registered handlers: {}", registry.job_types().join(", "));

    let dispatcher = JobDispatcher::new(
        Arc::clone(&config),
        Arc::new(RedisJobQueue::new(client.clone(), config.redis_queue.clone())),
        Arc::new(RedisHeartbeatStore::new(client.clone())),
        Arc::new(matcher),
        Arc::new(registry),
        gate,
    );

    // Stop on Ctrl-C
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested; finishing current job");
                signal_shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // Start dispatch loop
    let result = dispatcher.run(shutdown.clone()).instrument(span).await;
    shutdown.cancel();

    // Keep the switch alive until the dispatcher is done so the ready flag
    // always has a writer
    drop(switch);

    if let Err(e) = &result {
        error!("Dispatcher error: {:#}", e);
    }
    result
}

/// Loads the config file, applies env overrides and validates the result
fn load_config(path: &std::path::Path) -> Result<Config> {
    let config = Config::from_file(path)?.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Connect to the broker with retry logic and exponential backoff
///
/// The broker may come up after the worker (common when the whole cluster
/// is started together).
async fn connect_with_retry(config: &Config) -> Result<BrokerClient> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match BrokerClient::connect(&config.redis_host, config.redis_port).await {
            Ok(client) => {
                if attempt > 1 {
                    info!("Connected to broker after {} attempt(s)", attempt);
                }
                return Ok(client);
            }
            Err(e) if !e.is_connection_error() => {
                return Err(e).context("Failed to connect to broker");
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Failed to connect to broker after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Failed to connect to broker: {}", e));
                }

                warn!(
                    "Failed to connect to broker (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
