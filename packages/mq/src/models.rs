use std::time::Duration;

use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};
use tracing::{info, warn};

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;

#[derive(Debug, Clone)]
pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
    /// Fixed delay between connection attempts.
    pub connect_retry_delay: Duration,
    /// `None` retries forever.
    pub max_connect_attempts: Option<u32>,
}

pub async fn init_mq(config: &MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}

/// Connect to the broker with an explicit fixed-delay retry loop.
///
/// Connection loss and broker startup races are expected; consumers treat
/// them as transient and keep retrying every `connect_retry_delay` up to
/// `max_connect_attempts` (or forever when unbounded).
pub async fn init_mq_with_retry(config: &MqConfig) -> Result<MqQueue, MqError> {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match init_mq(config).await {
            Ok(queue) => {
                info!(url = %config.url, attempt, "Broker connected");
                return Ok(queue);
            }
            Err(e) => {
                if let Some(max) = config.max_connect_attempts
                    && attempt >= max
                {
                    return Err(MqError::Internal(format!(
                        "Broker unreachable after {attempt} attempts: {e}"
                    )));
                }

                warn!(
                    attempt,
                    max_attempts = ?config.max_connect_attempts,
                    delay_secs = config.connect_retry_delay.as_secs(),
                    error = %e,
                    "Broker connection failed, retrying"
                );
                tokio::time::sleep(config.connect_retry_delay).await;
            }
        }
    }
}
