use std::sync::Arc;
use std::time::Duration;

use aggregator::config::AggregatorAppConfig;
use aggregator::consumer::{consume_linting_failed, consume_linting_finished};
use aggregator::database::init_db;
use anyhow::Context;
use common::retry::{RetryTracker, spawn_cleanup_task};
use common::shutdown::{InFlight, drain_within};
use mq::{MqConfig, init_mq_with_retry};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How long in-flight handlers get to finish after a shutdown signal before
/// the consumers are aborted. Unacknowledged messages are redelivered.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AggregatorAppConfig::load().context("Failed to load config")?;
    info!("Metrics aggregator starting");

    let db = init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let mq = Arc::new(
        init_mq_with_retry(&MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
            connect_retry_delay: Duration::from_secs(config.mq.connect_retry_delay_secs),
            max_connect_attempts: None,
        })
        .await
        .context("Failed to initialize MQ")?,
    );

    info!(
        linting_finished_queue = %config.mq.linting_finished_queue,
        linting_failed_queue = %config.mq.linting_failed_queue,
        metrics_calculated_queue = %config.mq.metrics_calculated_queue,
        dlq_queue = %config.mq.dlq_queue,
        max_retries = config.mq.dlq.max_retries,
        "MQ connected"
    );

    let retry_tracker = Arc::new(Mutex::new(RetryTracker::new(config.mq.dlq.max_retries)));
    let in_flight = InFlight::new();

    let cleanup_handle = spawn_cleanup_task(
        Arc::clone(&retry_tracker),
        Duration::from_secs(config.mq.dlq.retry_cleanup_interval_secs),
        Duration::from_secs(config.mq.dlq.retry_max_age_secs),
    );

    let finished_handle = tokio::spawn(consume_linting_finished(
        db.clone(),
        Arc::clone(&mq),
        config.mq.clone(),
        Arc::clone(&retry_tracker),
        in_flight.clone(),
    ));
    let failed_handle = tokio::spawn(consume_linting_failed(
        db.clone(),
        Arc::clone(&mq),
        config.mq.clone(),
        Arc::clone(&retry_tracker),
        in_flight.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!(
        drain_secs = SHUTDOWN_DRAIN.as_secs(),
        "Shutdown signal received, draining in-flight messages"
    );
    if drain_within(&in_flight, SHUTDOWN_DRAIN).await {
        info!("In-flight messages drained");
    } else {
        warn!(
            pending = in_flight.count(),
            "Drain window elapsed with messages still in flight, aborting"
        );
    }

    finished_handle.abort();
    failed_handle.abort();
    cleanup_handle.abort();

    info!("Metrics aggregator stopped");
    Ok(())
}
