use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::events::{LintingFailed, LintingFinished, MetricsFailed};
use common::retry::{
    RetryCleanupGuard, RetryDecision, RetryTracker, calculate_backoff,
};
use common::shutdown::InFlight;
use common::{DlqEnvelope, DlqErrorCode, DlqMessageType, MqAppConfig};
use mq::{BroccoliError, BrokerMessage, Mq};
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics::build_metrics_calculated;
use crate::store::MetricsStore;

/// Consume successful linting results: compute the aggregate, persist it,
/// republish `MetricsCalculated`. Runs until process shutdown; when the
/// consume loop dies (broker outage) it reconnects after a fixed delay.
pub async fn consume_linting_finished(
    db: DatabaseConnection,
    mq: Arc<Mq>,
    config: MqAppConfig,
    retry_tracker: Arc<Mutex<RetryTracker>>,
    in_flight: InFlight,
) {
    info!(queue = %config.linting_finished_queue, "Starting linting result consumer");

    loop {
        let db = db.clone();
        let mq_for_handler = Arc::clone(&mq);
        let config_for_handler = config.clone();
        let retry_tracker = Arc::clone(&retry_tracker);
        let in_flight = in_flight.clone();

        let result = mq
            .process_messages(
                &config.linting_finished_queue,
                Some(config.prefetch_count),
                None,
                move |message: BrokerMessage<serde_json::Value>| {
                    let db = db.clone();
                    let mq = Arc::clone(&mq_for_handler);
                    let config = config_for_handler.clone();
                    let retry_tracker = Arc::clone(&retry_tracker);
                    let in_flight = in_flight.clone();
                    async move {
                        let _in_flight = in_flight.track();
                        handle_linting_finished(message, &db, &mq, &config, &retry_tracker).await
                    }
                },
            )
            .await;

        if let Err(e) = result {
            error!(
                queue = %config.linting_finished_queue,
                error = %e,
                delay_secs = config.connect_retry_delay_secs,
                "Linting result consumer stopped, restarting"
            );
            tokio::time::sleep(Duration::from_secs(config.connect_retry_delay_secs)).await;
        }
    }
}

async fn handle_linting_finished(
    message: BrokerMessage<serde_json::Value>,
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    config: &MqAppConfig,
    retry_tracker: &Arc<Mutex<RetryTracker>>,
) -> Result<(), BroccoliError> {
    let payload = message.payload;

    // Schema-validated parse: a message without a usable submission id is
    // dead-lettered immediately, not given a synthetic id.
    let event: LintingFinished = match serde_json::from_value(payload.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "Failed to parse LintingFinished, dead-lettering");
            let envelope = DlqEnvelope {
                message_id: Uuid::new_v4().to_string(),
                message_type: DlqMessageType::LintingResult,
                submission_id: extract_submission_id(&payload),
                payload,
                error_code: DlqErrorCode::DeserializationError,
                error_message: format!("Failed to parse LintingFinished: {}", e),
                retry_history: vec![],
            };
            dead_letter(mq, &config.dlq_queue, &envelope).await?;
            return Ok(());
        }
    };

    let submission_id = event.submission_id;
    let message_id = submission_id.to_string();
    let mut cleanup_guard = RetryCleanupGuard::new(retry_tracker, &message_id);

    loop {
        match process_linting_finished(db, mq, &config.metrics_calculated_queue, &event).await {
            Ok(()) => {
                retry_tracker.lock().await.clear(&message_id);
                cleanup_guard.defuse();
                return Ok(());
            }
            Err(e) => {
                let error_str = e.to_string();
                let decision = retry_tracker
                    .lock()
                    .await
                    .record_failure(&message_id, &error_str);

                match decision {
                    RetryDecision::Retry { attempt, .. } => {
                        let delay = calculate_backoff(
                            attempt,
                            config.dlq.base_delay_ms,
                            config.dlq.max_delay_ms,
                        );
                        warn!(
                            %submission_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying linting result processing"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { history } => {
                        error!(
                            %submission_id,
                            retry_count = history.len(),
                            error = %e,
                            "Max retries exhausted, dead-lettering linting result"
                        );

                        report_irrecoverable(
                            db,
                            mq,
                            config,
                            submission_id,
                            &event.language,
                            &error_str,
                        )
                        .await;

                        let envelope = DlqEnvelope {
                            message_id: message_id.clone(),
                            message_type: DlqMessageType::LintingResult,
                            submission_id: Some(submission_id),
                            payload: serde_json::to_value(&event).unwrap_or_default(),
                            error_code: DlqErrorCode::MaxRetriesExceeded,
                            error_message: error_str,
                            retry_history: history,
                        };
                        dead_letter(mq, &config.dlq_queue, &envelope).await?;

                        cleanup_guard.defuse();
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Process one linting result. Persist first, publish second; success is
/// only reported (and the message acknowledged) once both are done, so a
/// failed publish retries the pair together. The upsert keeps the retried
/// persist idempotent.
async fn process_linting_finished(
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    metrics_queue: &str,
    event: &LintingFinished,
) -> anyhow::Result<()> {
    let metrics = build_metrics_calculated(event);

    MetricsStore::new(db).upsert_metric(&metrics).await?;

    mq.publish(metrics_queue, None, &metrics, None)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to publish MetricsCalculated: {e}"))?;

    info!(
        submission_id = %metrics.submission_id,
        score = metrics.code_quality_score,
        errors = metrics.error_count,
        warnings = metrics.warning_count,
        issues = metrics.issue_count,
        "Metrics computed and published"
    );

    Ok(())
}

/// Consume failed linting runs: append a failure record and republish
/// `MetricsFailed` for downstream diagnostics.
pub async fn consume_linting_failed(
    db: DatabaseConnection,
    mq: Arc<Mq>,
    config: MqAppConfig,
    retry_tracker: Arc<Mutex<RetryTracker>>,
    in_flight: InFlight,
) {
    info!(queue = %config.linting_failed_queue, "Starting linting failure consumer");

    loop {
        let db = db.clone();
        let mq_for_handler = Arc::clone(&mq);
        let config_for_handler = config.clone();
        let retry_tracker = Arc::clone(&retry_tracker);
        let in_flight = in_flight.clone();

        let result = mq
            .process_messages(
                &config.linting_failed_queue,
                Some(config.prefetch_count),
                None,
                move |message: BrokerMessage<serde_json::Value>| {
                    let db = db.clone();
                    let mq = Arc::clone(&mq_for_handler);
                    let config = config_for_handler.clone();
                    let retry_tracker = Arc::clone(&retry_tracker);
                    let in_flight = in_flight.clone();
                    async move {
                        let _in_flight = in_flight.track();
                        handle_linting_failed(message, &db, &mq, &config, &retry_tracker).await
                    }
                },
            )
            .await;

        if let Err(e) = result {
            error!(
                queue = %config.linting_failed_queue,
                error = %e,
                delay_secs = config.connect_retry_delay_secs,
                "Linting failure consumer stopped, restarting"
            );
            tokio::time::sleep(Duration::from_secs(config.connect_retry_delay_secs)).await;
        }
    }
}

async fn handle_linting_failed(
    message: BrokerMessage<serde_json::Value>,
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    config: &MqAppConfig,
    retry_tracker: &Arc<Mutex<RetryTracker>>,
) -> Result<(), BroccoliError> {
    let payload = message.payload;

    let event: LintingFailed = match serde_json::from_value(payload.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "Failed to parse LintingFailed, dead-lettering");
            let envelope = DlqEnvelope {
                message_id: Uuid::new_v4().to_string(),
                message_type: DlqMessageType::LintingFailure,
                submission_id: extract_submission_id(&payload),
                payload,
                error_code: DlqErrorCode::DeserializationError,
                error_message: format!("Failed to parse LintingFailed: {}", e),
                retry_history: vec![],
            };
            dead_letter(mq, &config.dlq_queue, &envelope).await?;
            return Ok(());
        }
    };

    let submission_id = event.submission_id;
    // Suffix keeps this retry state separate from the finished-path entry
    // for the same submission.
    let message_id = format!("{}:failed", submission_id);
    let mut cleanup_guard = RetryCleanupGuard::new(retry_tracker, &message_id);

    loop {
        match process_linting_failed(db, mq, config, &event).await {
            Ok(()) => {
                retry_tracker.lock().await.clear(&message_id);
                cleanup_guard.defuse();
                return Ok(());
            }
            Err(e) => {
                let error_str = e.to_string();
                let decision = retry_tracker
                    .lock()
                    .await
                    .record_failure(&message_id, &error_str);

                match decision {
                    RetryDecision::Retry { attempt, .. } => {
                        let delay = calculate_backoff(
                            attempt,
                            config.dlq.base_delay_ms,
                            config.dlq.max_delay_ms,
                        );
                        warn!(
                            %submission_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying linting failure processing"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { history } => {
                        error!(
                            %submission_id,
                            retry_count = history.len(),
                            error = %e,
                            "Max retries exhausted, dead-lettering linting failure"
                        );

                        let envelope = DlqEnvelope {
                            message_id,
                            message_type: DlqMessageType::LintingFailure,
                            submission_id: Some(submission_id),
                            payload: serde_json::to_value(&event).unwrap_or_default(),
                            error_code: DlqErrorCode::MaxRetriesExceeded,
                            error_message: error_str,
                            retry_history: history,
                        };
                        dead_letter(mq, &config.dlq_queue, &envelope).await?;

                        cleanup_guard.defuse();
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn process_linting_failed(
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    config: &MqAppConfig,
    event: &LintingFailed,
) -> anyhow::Result<()> {
    MetricsStore::new(db)
        .record_failure(
            event.submission_id,
            &event.language,
            &event.error_message,
            event.failed_at_utc,
        )
        .await?;

    let failed = MetricsFailed {
        submission_id: event.submission_id,
        language: event.language.clone(),
        error_message: event.error_message.clone(),
        failed_at_utc: event.failed_at_utc,
    };
    mq.publish(&config.metrics_failed_queue, None, &failed, None)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to publish MetricsFailed: {e}"))?;

    warn!(
        submission_id = %event.submission_id,
        language = %event.language,
        "Recorded linting failure"
    );

    Ok(())
}

/// Best-effort bookkeeping once a linting result is irrecoverable: append a
/// failure record and publish `MetricsFailed`. Neither outcome blocks the
/// dead-letter path.
async fn report_irrecoverable(
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    config: &MqAppConfig,
    submission_id: Uuid,
    language: &str,
    error_message: &str,
) {
    let failed_at = Utc::now();

    if let Err(e) = MetricsStore::new(db)
        .record_failure(submission_id, language, error_message, failed_at)
        .await
    {
        warn!(%submission_id, error = %e, "Failed to record metric failure");
    }

    let failed = MetricsFailed {
        submission_id,
        language: language.to_string(),
        error_message: error_message.to_string(),
        failed_at_utc: failed_at,
    };
    if let Err(e) = mq
        .publish(&config.metrics_failed_queue, None, &failed, None)
        .await
    {
        warn!(%submission_id, error = %e, "Failed to publish MetricsFailed");
    }
}

async fn dead_letter(
    mq: &Arc<Mq>,
    dlq_queue: &str,
    envelope: &DlqEnvelope,
) -> Result<(), BroccoliError> {
    mq.publish(dlq_queue, None, envelope, None)
        .await
        .map_err(|e| BroccoliError::Publish(format!("Failed to publish to DLQ: {}", e)))?;
    Ok(())
}

fn extract_submission_id(payload: &serde_json::Value) -> Option<Uuid> {
    payload
        .get("submissionId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_submission_id_from_raw_payload() {
        let id = Uuid::new_v4();
        let payload = serde_json::json!({ "submissionId": id.to_string(), "errorCount": "oops" });
        assert_eq!(extract_submission_id(&payload), Some(id));
    }

    #[test]
    fn missing_or_garbled_submission_id_yields_none() {
        assert_eq!(extract_submission_id(&serde_json::json!({})), None);
        assert_eq!(
            extract_submission_id(&serde_json::json!({ "submissionId": "not-a-uuid" })),
            None
        );
    }
}
