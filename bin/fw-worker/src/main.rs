//! ForgeFlow worker
//!
//! Consumes provisioning messages from RabbitMQ and executes them against
//! GitLab and Jenkins. Runs until Ctrl+C or SIGTERM, then drains the
//! in-flight delivery and closes the broker connection.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fw_config::WorkerConfig;
use fw_service::{build_registry, MessageService};
use fw_subscriber::connection::AmqpConnection;
use fw_subscriber::lifecycle::Subscriber;
use fw_subscriber::topology::{ExchangeType, Topology};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Arc::new(WorkerConfig::from_env());
    info!(service = %config.service_name, "Starting ForgeFlow worker");

    let instances = config.gitlab_instance_names();
    if instances.is_empty() {
        warn!("No GitLab instances configured, GitLab messages will be dropped");
    } else {
        info!(instances = ?instances, "GitLab instances configured");
    }
    if config.jenkins().is_none() {
        warn!("Jenkins not configured, Jenkins messages will be dropped");
    }

    let service = Arc::new(MessageService::new(config.clone()));
    let registry = Arc::new(build_registry(service));

    let exchange_type: ExchangeType = config.consume.exchange_type.parse()?;
    let topology = Topology {
        exchange_name: config.consume.exchange_name.clone(),
        exchange_type,
        queue_name: config.consume.queue_name.clone(),
        binding_key: config.consume.binding_key.clone(),
        prefetch_count: config.consume.prefetch_count,
    };
    info!(
        exchange = %topology.exchange_name,
        exchange_type = exchange_type.as_str(),
        queue = %topology.queue_name,
        binding_key = topology.effective_binding_key(),
        "Broker topology"
    );

    let source = Arc::new(AmqpConnection::new(config.rabbitmq_url.clone(), topology));
    let subscriber = Subscriber::new(source, registry);
    subscriber.start().await?;

    info!("Worker started. Press Ctrl+C to shut down.");
    shutdown_signal().await;
    info!("Shutdown signal received");

    subscriber.stop().await;
    info!("Worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
