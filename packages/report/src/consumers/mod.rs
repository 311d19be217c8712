pub mod dlq;
pub mod metrics_calculated;

pub use dlq::consume_dlq;
pub use metrics_calculated::consume_metrics_calculated;
