pub mod config;
pub mod dlq;
pub mod events;
pub mod retry;
pub mod score;
pub mod shutdown;

pub use config::{DlqConfig, MqAppConfig};
pub use dlq::{DlqEnvelope, DlqErrorCode, DlqMessageType};
pub use events::{
    CodeSubmitted, LintIssue, LintingFailed, LintingFinished, MetricsCalculated, MetricsFailed,
    Severity,
};
pub use score::{Grade, code_quality_score};
pub use shutdown::{InFlight, drain_within};
