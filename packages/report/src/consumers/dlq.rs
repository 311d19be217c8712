use std::sync::Arc;
use std::time::Duration;

use common::retry::calculate_backoff;
use common::shutdown::InFlight;
use common::{DlqConfig, DlqEnvelope, MqAppConfig};
use mq::{BrokerMessage, Mq};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info, warn};

use crate::dlq::DlqService;

/// Persist dead-lettered envelopes into the `dead_letter_message` table so
/// they can be inspected and replayed through the API.
pub async fn consume_dlq(
    db: DatabaseConnection,
    mq: Arc<Mq>,
    config: MqAppConfig,
    in_flight: InFlight,
) {
    info!(queue = %config.dlq_queue, "Starting DLQ consumer");

    loop {
        let db = db.clone();
        let dlq_config = config.dlq.clone();
        let in_flight = in_flight.clone();

        let result = mq
            .process_messages(
                &config.dlq_queue,
                None,
                None,
                move |message: BrokerMessage<DlqEnvelope>| {
                    let db = db.clone();
                    let dlq_config = dlq_config.clone();
                    let in_flight = in_flight.clone();
                    async move {
                        let _in_flight = in_flight.track();
                        persist_envelope(&db, &dlq_config, message.payload).await;
                        Ok(())
                    }
                },
            )
            .await;

        if let Err(e) = result {
            error!(
                queue = %config.dlq_queue,
                error = %e,
                delay_secs = config.connect_retry_delay_secs,
                "DLQ consumer stopped, restarting"
            );
            tokio::time::sleep(Duration::from_secs(config.connect_retry_delay_secs)).await;
        }
    }
}

/// Persist one envelope with bounded in-handler retries. There is no queue
/// left to dead-letter into; after the last attempt the full envelope is
/// logged so the entry can be reconstructed by hand.
pub async fn persist_envelope(
    db: &DatabaseConnection,
    dlq_config: &DlqConfig,
    envelope: DlqEnvelope,
) {
    let message_id = envelope.message_id.clone();
    // At least one attempt even when in-handler retries are configured off.
    let attempts = dlq_config.max_retries.max(1);

    for attempt in 1..=attempts {
        match try_persist(db, &envelope).await {
            Ok(()) => {
                info!(
                    message_id = %message_id,
                    submission_id = ?envelope.submission_id,
                    error_code = ?envelope.error_code,
                    "Persisted DLQ envelope"
                );
                return;
            }
            Err(e) if attempt < attempts => {
                let delay =
                    calculate_backoff(attempt, dlq_config.base_delay_ms, dlq_config.max_delay_ms);
                warn!(
                    message_id = %message_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying DLQ envelope persistence"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    message_id = %message_id,
                    error = %e,
                    envelope = %serde_json::to_string(&envelope).unwrap_or_default(),
                    "Dropping DLQ envelope after max persistence attempts"
                );
            }
        }
    }
}

async fn try_persist(db: &DatabaseConnection, envelope: &DlqEnvelope) -> anyhow::Result<()> {
    let txn = db.begin().await?;
    DlqService::new(&txn).send_to_dlq(envelope).await?;
    txn.commit().await?;
    Ok(())
}
