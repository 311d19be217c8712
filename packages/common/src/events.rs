use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a single linting finding.
///
/// Lowercase on the wire. The linter classifies flake8 codes: F/E => error,
/// W => warning, C => convention, N => naming, everything else info.
/// Deserialization goes through [`FromStr`](std::str::FromStr), so an
/// unknown severity string degrades to `Info` instead of dead-lettering an
/// otherwise valid message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Convention,
    Naming,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Convention => "convention",
            Self::Naming => "naming",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Unknown severity strings fall back to `Info`, matching how the
    /// linter tags uncategorized codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "error" => Self::Error,
            "warning" => Self::Warning,
            "convention" => Self::Convention,
            "naming" => Self::Naming,
            _ => Self::Info,
        })
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Info)
    }
}

/// One static-analysis finding. Owned by exactly one submission; stored and
/// transported only as part of its parent metric/report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintIssue {
    /// Error-class tag (e.g., "E501").
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub line: i32,
    #[serde(default)]
    pub column: i32,
    pub severity: Severity,
}

/// Emitted by the intake service once an uploaded file is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSubmitted {
    pub submission_id: Uuid,
    pub file_path: String,
    pub language: String,
    pub submitted_at_utc: DateTime<Utc>,
}

/// Emitted by the linter when analysis completes.
///
/// Count fields default to 0 when absent (the input contract tolerates
/// older producers), but `submissionId` is required: a message without a
/// usable correlation id fails deserialization and is dead-lettered rather
/// than being assigned a synthetic id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintingFinished {
    pub submission_id: Uuid,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_count: i32,
    #[serde(default)]
    pub warning_count: i32,
    #[serde(default)]
    pub info_count: i32,
    #[serde(default)]
    pub issue_count: i32,
    #[serde(default)]
    pub file_count: i32,
    /// Structured per-issue findings. Empty when the linter found nothing.
    #[serde(default)]
    pub results: Vec<LintIssue>,
}

/// Emitted by the linter when analysis itself fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintingFailed {
    pub submission_id: Uuid,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub error_message: String,
    pub failed_at_utc: DateTime<Utc>,
}

/// Emitted by the aggregator after the metric row is persisted.
///
/// Carries both the aggregate and the embedded per-issue list so the report
/// service never re-queries the linter. `results` is present even when
/// empty. Additive changes only; independently deployed consumers read this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsCalculated {
    pub submission_id: Uuid,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub error_count: i32,
    #[serde(default)]
    pub warning_count: i32,
    #[serde(default)]
    pub info_count: i32,
    #[serde(default)]
    pub issue_count: i32,
    #[serde(default)]
    pub file_count: i32,
    #[serde(default)]
    pub code_quality_score: i32,
    pub calculated_at_utc: DateTime<Utc>,
    #[serde(default)]
    pub results: Vec<LintIssue>,
}

/// Emitted by the aggregator when a submission's metrics are irrecoverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFailed {
    pub submission_id: Uuid,
    pub language: String,
    pub error_message: String,
    pub failed_at_utc: DateTime<Utc>,
}

fn default_language() -> String {
    "unknown".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linting_finished_defaults_missing_counts_to_zero() {
        let json = serde_json::json!({
            "submissionId": "a3f1c2d4-0000-4000-8000-000000000001",
            "language": "python",
            "errorCount": 3,
        });

        let event: LintingFinished = serde_json::from_value(json).unwrap();
        assert_eq!(event.error_count, 3);
        assert_eq!(event.warning_count, 0);
        assert_eq!(event.info_count, 0);
        assert_eq!(event.issue_count, 0);
        assert_eq!(event.file_count, 0);
        assert!(event.results.is_empty());
    }

    #[test]
    fn linting_finished_without_submission_id_is_rejected() {
        let json = serde_json::json!({
            "language": "python",
            "errorCount": 1,
        });

        let result = serde_json::from_value::<LintingFinished>(json);
        assert!(result.is_err());
    }

    #[test]
    fn linting_finished_language_defaults_to_unknown() {
        let json = serde_json::json!({
            "submissionId": "a3f1c2d4-0000-4000-8000-000000000001",
        });

        let event: LintingFinished = serde_json::from_value(json).unwrap();
        assert_eq!(event.language, "unknown");
    }

    #[test]
    fn metrics_calculated_round_trips_camel_case() {
        let event = MetricsCalculated {
            submission_id: Uuid::new_v4(),
            language: "python".into(),
            error_count: 1,
            warning_count: 1,
            info_count: 0,
            issue_count: 2,
            file_count: 1,
            code_quality_score: 93,
            calculated_at_utc: Utc::now(),
            results: vec![LintIssue {
                code: "E501".into(),
                message: "line too long".into(),
                line: 10,
                column: 1,
                severity: Severity::Error,
            }],
        };

        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("submissionId").is_some());
        assert!(value.get("codeQualityScore").is_some());
        assert!(value.get("calculatedAtUtc").is_some());
        assert_eq!(value["results"][0]["severity"], "error");

        let back: MetricsCalculated = serde_json::from_value(value).unwrap();
        assert_eq!(back.code_quality_score, 93);
        assert_eq!(back.results.len(), 1);
    }

    #[test]
    fn severity_parses_known_values_and_falls_back_to_info() {
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("naming".parse::<Severity>().unwrap(), Severity::Naming);
        assert_eq!("mystery".parse::<Severity>().unwrap(), Severity::Info);
    }

    #[test]
    fn unknown_wire_severity_falls_back_to_info() {
        let json = serde_json::json!({
            "code": "X999",
            "message": "unclassified finding",
            "line": 1,
            "column": 1,
            "severity": "mystery",
        });

        let issue: LintIssue = serde_json::from_value(json).unwrap();
        assert_eq!(issue.severity, Severity::Info);
    }
}
