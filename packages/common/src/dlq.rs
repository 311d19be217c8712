use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::retry::RetryAttempt;

/// Error codes for dead-lettered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DlqErrorCode {
    /// All retry attempts exhausted.
    MaxRetriesExceeded,
    /// Failed to deserialize message payload (including a missing or
    /// invalid submission id).
    DeserializationError,
}

impl DlqErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            Self::DeserializationError => "DESERIALIZATION_ERROR",
        }
    }
}

impl std::fmt::Display for DlqErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which stage of the pipeline the dead-lettered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqMessageType {
    /// Linting result the aggregator could not process.
    LintingResult,
    /// LintingFailed event the aggregator could not process. Kept separate
    /// from `LintingResult` so a replay goes back to the failure queue and
    /// never fabricates a clean report.
    LintingFailure,
    /// MetricsCalculated event the report service could not materialize.
    MetricsCalculated,
}

impl DlqMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LintingResult => "linting_result",
            Self::LintingFailure => "linting_failure",
            Self::MetricsCalculated => "metrics_calculated",
        }
    }
}

impl std::fmt::Display for DlqMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DlqMessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linting_result" => Ok(Self::LintingResult),
            "linting_failure" => Ok(Self::LintingFailure),
            "metrics_calculated" => Ok(Self::MetricsCalculated),
            _ => Err(format!(
                "Invalid message_type '{}'. Must be 'linting_result', 'linting_failure' or 'metrics_calculated'",
                s
            )),
        }
    }
}

/// Envelope for transporting failed messages to the dead-letter queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope {
    /// Id of the failed message, unique per dead-lettering.
    pub message_id: String,
    pub message_type: DlqMessageType,
    /// Correlated submission.
    ///
    /// `None` when the id could not be extracted (deserialization failed
    /// before a submission id was available).
    pub submission_id: Option<Uuid>,
    /// Full original payload, preserved for diagnosis and replay.
    pub payload: serde_json::Value,
    pub error_code: DlqErrorCode,
    pub error_message: String,
    /// Attempts made before dead-lettering. Empty for deserialization
    /// failures, which are never retried.
    pub retry_history: Vec<RetryAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_wire_names() {
        for mt in [
            DlqMessageType::LintingResult,
            DlqMessageType::LintingFailure,
            DlqMessageType::MetricsCalculated,
        ] {
            assert_eq!(mt.as_str().parse::<DlqMessageType>(), Ok(mt));
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!("judge_job".parse::<DlqMessageType>().is_err());
    }
}
