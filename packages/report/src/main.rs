use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use common::retry::{RetryTracker, spawn_cleanup_task};
use common::shutdown::{InFlight, drain_within};
use mq::{MqConfig, init_mq_with_retry};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use report::config::AppConfig;
use report::consumers::{consume_dlq, consume_metrics_calculated};
use report::database::init_db;
use report::state::AppState;

/// Bounded broker connect attempts; the HTTP API should come up (or fail)
/// rather than wait on the broker forever.
const MAX_CONNECT_ATTEMPTS: u32 = 10;

/// How long in-flight consumer handlers get to finish after a shutdown
/// signal before the tasks are aborted. Unacknowledged messages are
/// redelivered.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;
    info!("Report API starting");

    let db = init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let mq = if config.mq.enabled {
        let queue = init_mq_with_retry(&MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
            connect_retry_delay: Duration::from_secs(config.mq.connect_retry_delay_secs),
            max_connect_attempts: Some(MAX_CONNECT_ATTEMPTS),
        })
        .await
        .context("Failed to initialize MQ")?;
        Some(Arc::new(queue))
    } else {
        warn!("MQ disabled; serving reads only, no events will be consumed");
        None
    };

    let in_flight = InFlight::new();
    let mut consumer_handles: Vec<JoinHandle<()>> = Vec::new();
    if let Some(ref mq) = mq {
        let retry_tracker = Arc::new(Mutex::new(RetryTracker::new(config.mq.dlq.max_retries)));

        consumer_handles.push(spawn_cleanup_task(
            Arc::clone(&retry_tracker),
            Duration::from_secs(config.mq.dlq.retry_cleanup_interval_secs),
            Duration::from_secs(config.mq.dlq.retry_max_age_secs),
        ));
        consumer_handles.push(tokio::spawn(consume_metrics_calculated(
            db.clone(),
            Arc::clone(mq),
            config.mq.clone(),
            retry_tracker,
            in_flight.clone(),
        )));
        consumer_handles.push(tokio::spawn(consume_dlq(
            db.clone(),
            Arc::clone(mq),
            config.mq.clone(),
            in_flight.clone(),
        )));
    }

    let cors = cors_layer(&config);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        db,
        config,
        mq,
    };
    let app = report::build_router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Report API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if !consumer_handles.is_empty() {
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
        for handle in &consumer_handles {
            handle.abort();
        }
    }

    info!("Report API stopped");
    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors
        .allow_origins
        .iter()
        .filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| warn!(origin = %o, error = %e, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.server.cors.max_age));

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
