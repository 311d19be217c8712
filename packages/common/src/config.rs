use serde::Deserialize;

/// Retry/dead-letter knobs shared by both consumers.
#[derive(Debug, Deserialize, Clone)]
pub struct DlqConfig {
    /// In-handler retries before a message is dead-lettered. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Base backoff delay in milliseconds. Default: 1000.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds. Default: 30000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How often stale retry-tracker entries are evicted, in seconds. Default: 300.
    #[serde(default = "default_retry_cleanup_interval_secs")]
    pub retry_cleanup_interval_secs: u64,
    /// Age after which an inactive retry entry is considered stale, in seconds. Default: 3600.
    #[serde(default = "default_retry_max_age_secs")]
    pub retry_max_age_secs: u64,
}

fn default_max_retries() -> u8 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_retry_cleanup_interval_secs() -> u64 {
    300
}
fn default_retry_max_age_secs() -> u64 {
    3600
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_cleanup_interval_secs: default_retry_cleanup_interval_secs(),
            retry_max_age_secs: default_retry_max_age_secs(),
        }
    }
}

/// App-level MQ configuration shared by the aggregator and report services.
///
/// Queue names carry the role the original topology gave to routing keys:
/// one durable queue per event kind.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether MQ is enabled. Default: true.
    /// The report API can serve reads without a broker; the aggregator
    /// ignores this field and always requires one.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Broker connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Seconds between broker connection attempts. Default: 5.
    #[serde(default = "default_connect_retry_delay_secs")]
    pub connect_retry_delay_secs: u64,
    /// Upper bound on unacknowledged in-flight messages per consumer
    /// (the prefetch/QoS limit). Default: 10.
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: usize,
    /// Queue of successful linting results (linter publishes, aggregator
    /// consumes). Default: "linting.finished".
    #[serde(default = "default_linting_finished_queue")]
    pub linting_finished_queue: String,
    /// Queue of failed linting runs (linter publishes, aggregator
    /// consumes). Default: "linting.failed".
    #[serde(default = "default_linting_failed_queue")]
    pub linting_failed_queue: String,
    /// Queue of computed metrics (aggregator publishes, report service
    /// consumes). Default: "metrics.calculated".
    #[serde(default = "default_metrics_calculated_queue")]
    pub metrics_calculated_queue: String,
    /// Queue of irrecoverable metric failures (aggregator publishes).
    /// Default: "metrics.failed".
    #[serde(default = "default_metrics_failed_queue")]
    pub metrics_failed_queue: String,
    /// Dead-letter queue (both consumers publish, report service persists).
    /// Default: "quality.dlq".
    #[serde(default = "default_dlq_queue")]
    pub dlq_queue: String,
    #[serde(default)]
    pub dlq: DlqConfig,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_connect_retry_delay_secs() -> u64 {
    5
}
fn default_prefetch_count() -> usize {
    10
}
fn default_linting_finished_queue() -> String {
    "linting.finished".into()
}
fn default_linting_failed_queue() -> String {
    "linting.failed".into()
}
fn default_metrics_calculated_queue() -> String {
    "metrics.calculated".into()
}
fn default_metrics_failed_queue() -> String {
    "metrics.failed".into()
}
fn default_dlq_queue() -> String {
    "quality.dlq".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            connect_retry_delay_secs: default_connect_retry_delay_secs(),
            prefetch_count: default_prefetch_count(),
            linting_finished_queue: default_linting_finished_queue(),
            linting_failed_queue: default_linting_failed_queue(),
            metrics_calculated_queue: default_metrics_calculated_queue(),
            metrics_failed_queue: default_metrics_failed_queue(),
            dlq_queue: default_dlq_queue(),
            dlq: DlqConfig::default(),
        }
    }
}
