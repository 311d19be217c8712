use std::sync::Arc;
use std::time::Duration;

use common::events::MetricsCalculated;
use common::retry::{
    RetryCleanupGuard, RetryDecision, RetryTracker, calculate_backoff,
};
use common::shutdown::InFlight;
use common::{DlqEnvelope, DlqErrorCode, DlqMessageType, MqAppConfig};
use mq::{BroccoliError, BrokerMessage, Mq};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entity::{linting_issue, report_metric};

/// Consume computed metrics and materialize them into the report store.
/// Runs until process shutdown; reconnects after a fixed delay when the
/// consume loop dies.
pub async fn consume_metrics_calculated(
    db: DatabaseConnection,
    mq: Arc<Mq>,
    config: MqAppConfig,
    retry_tracker: Arc<Mutex<RetryTracker>>,
    in_flight: InFlight,
) {
    info!(queue = %config.metrics_calculated_queue, "Starting metrics consumer");

    loop {
        let db = db.clone();
        let mq_for_handler = Arc::clone(&mq);
        let config_for_handler = config.clone();
        let retry_tracker = Arc::clone(&retry_tracker);
        let in_flight = in_flight.clone();

        let result = mq
            .process_messages(
                &config.metrics_calculated_queue,
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
                        handle_metrics_calculated(message, &db, &mq, &config, &retry_tracker).await
                    }
                },
            )
            .await;

        if let Err(e) = result {
            error!(
                queue = %config.metrics_calculated_queue,
                error = %e,
                delay_secs = config.connect_retry_delay_secs,
                "Metrics consumer stopped, restarting"
            );
            tokio::time::sleep(Duration::from_secs(config.connect_retry_delay_secs)).await;
        }
    }
}

async fn handle_metrics_calculated(
    message: BrokerMessage<serde_json::Value>,
    db: &DatabaseConnection,
    mq: &Arc<Mq>,
    config: &MqAppConfig,
    retry_tracker: &Arc<Mutex<RetryTracker>>,
) -> Result<(), BroccoliError> {
    let payload = message.payload;

    let event: MetricsCalculated = match serde_json::from_value(payload.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "Failed to parse MetricsCalculated, dead-lettering");
            let envelope = DlqEnvelope {
                message_id: Uuid::new_v4().to_string(),
                message_type: DlqMessageType::MetricsCalculated,
                submission_id: extract_submission_id(&payload),
                payload,
                error_code: DlqErrorCode::DeserializationError,
                error_message: format!("Failed to parse MetricsCalculated: {}", e),
                retry_history: vec![],
            };
            mq.publish(&config.dlq_queue, None, &envelope, None)
                .await
                .map_err(|e| BroccoliError::Publish(format!("Failed to publish to DLQ: {}", e)))?;
            return Ok(());
        }
    };

    let submission_id = event.submission_id;
    let message_id = submission_id.to_string();
    let mut cleanup_guard = RetryCleanupGuard::new(retry_tracker, &message_id);

    loop {
        match materialize_report(db, &event).await {
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
                            "Retrying report materialization"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { history } => {
                        error!(
                            %submission_id,
                            retry_count = history.len(),
                            error = %e,
                            "Max retries exhausted, dead-lettering metrics event"
                        );

                        let envelope = DlqEnvelope {
                            message_id: message_id.clone(),
                            message_type: DlqMessageType::MetricsCalculated,
                            submission_id: Some(submission_id),
                            payload: serde_json::to_value(&event).unwrap_or_default(),
                            error_code: DlqErrorCode::MaxRetriesExceeded,
                            error_message: error_str,
                            retry_history: history,
                        };
                        mq.publish(&config.dlq_queue, None, &envelope, None)
                            .await
                            .map_err(|e| {
                                BroccoliError::Publish(format!("Failed to publish to DLQ: {}", e))
                            })?;

                        cleanup_guard.defuse();
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Materialize one metrics event into the report store. One transaction:
/// upsert the header, replace the submission's issue rows. Redelivery
/// converges to the last delivered event's state.
pub async fn materialize_report(
    db: &DatabaseConnection,
    event: &MetricsCalculated,
) -> anyhow::Result<()> {
    let txn = db.begin().await?;

    let existing = report_metric::Entity::find()
        .filter(report_metric::Column::SubmissionId.eq(event.submission_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let metric_id = match existing {
        Some(metric) => {
            let update = report_metric::ActiveModel {
                id: Set(metric.id),
                language: Set(event.language.clone()),
                error_count: Set(event.error_count),
                warning_count: Set(event.warning_count),
                info_count: Set(event.info_count),
                issue_count: Set(event.issue_count),
                file_count: Set(event.file_count),
                code_quality_score: Set(event.code_quality_score),
                calculated_at: Set(event.calculated_at_utc),
                ..Default::default()
            };
            update.update(&txn).await?;
            metric.id
        }
        None => {
            let model = report_metric::ActiveModel {
                submission_id: Set(event.submission_id),
                language: Set(event.language.clone()),
                error_count: Set(event.error_count),
                warning_count: Set(event.warning_count),
                info_count: Set(event.info_count),
                issue_count: Set(event.issue_count),
                file_count: Set(event.file_count),
                code_quality_score: Set(event.code_quality_score),
                calculated_at: Set(event.calculated_at_utc),
                ..Default::default()
            };
            model.insert(&txn).await?.id
        }
    };

    linting_issue::Entity::delete_many()
        .filter(linting_issue::Column::SubmissionId.eq(event.submission_id))
        .exec(&txn)
        .await?;

    for issue in &event.results {
        let model = linting_issue::ActiveModel {
            metric_id: Set(metric_id),
            submission_id: Set(event.submission_id),
            code: Set(issue.code.clone()),
            message: Set(issue.message.clone()),
            line: Set(issue.line),
            column: Set(issue.column),
            severity: Set(issue.severity.as_str().to_string()),
            ..Default::default()
        };
        model.insert(&txn).await?;
    }

    txn.commit().await?;

    info!(
        submission_id = %event.submission_id,
        score = event.code_quality_score,
        issues = event.results.len(),
        "Materialized report"
    );

    Ok(())
}

fn extract_submission_id(payload: &serde_json::Value) -> Option<Uuid> {
    payload
        .get("submissionId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}
