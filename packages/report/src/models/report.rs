use chrono::{DateTime, Utc};
use common::Grade;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{linting_issue, report_metric};

/// One-line report summary for list views.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummaryResponse {
    pub submission_id: Uuid,
    #[schema(example = "python")]
    pub language: String,
    #[schema(example = 3)]
    pub errors: i32,
    #[schema(example = 2)]
    pub warnings: i32,
    #[schema(example = 1)]
    pub infos: i32,
    #[schema(example = 81)]
    pub code_quality_score: i32,
    #[schema(example = "A")]
    pub grade: &'static str,
    pub calculated_at: DateTime<Utc>,
}

impl From<report_metric::Model> for ReportSummaryResponse {
    fn from(m: report_metric::Model) -> Self {
        Self {
            submission_id: m.submission_id,
            language: m.language,
            errors: m.error_count,
            warnings: m.warning_count,
            infos: m.info_count,
            code_quality_score: m.code_quality_score,
            grade: Grade::from_score(m.code_quality_score).as_str(),
            calculated_at: m.calculated_at,
        }
    }
}

/// Aggregate section of a full report.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    #[schema(example = 3)]
    pub errors: i32,
    #[schema(example = 2)]
    pub warnings: i32,
    #[schema(example = 1)]
    pub infos: i32,
    #[schema(example = 6)]
    pub total_issues: i32,
    /// Score rendered as "NN/100".
    #[schema(example = "81/100")]
    pub code_quality: String,
    #[schema(example = "A")]
    pub grade: &'static str,
    #[schema(example = "Very good")]
    pub evaluation: &'static str,
}

/// One linting issue in a full report.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    #[schema(example = "E501")]
    pub code: String,
    #[schema(example = "line too long (92 > 79 characters)")]
    pub message: String,
    #[schema(example = 12)]
    pub line: i32,
    #[schema(example = 80)]
    pub column: i32,
    #[schema(example = "warning")]
    pub severity: String,
}

impl From<linting_issue::Model> for IssueResponse {
    fn from(i: linting_issue::Model) -> Self {
        Self {
            code: i.code,
            message: i.message,
            line: i.line,
            column: i.column,
            severity: i.severity,
        }
    }
}

/// Full materialized report for one submission.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetailResponse {
    pub submission_id: Uuid,
    #[schema(example = "python")]
    pub language: String,
    pub calculated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub issues: Vec<IssueResponse>,
}

impl ReportDetailResponse {
    pub fn from_parts(metric: report_metric::Model, issues: Vec<linting_issue::Model>) -> Self {
        let grade = Grade::from_score(metric.code_quality_score);
        Self {
            submission_id: metric.submission_id,
            language: metric.language,
            calculated_at: metric.calculated_at,
            summary: ReportSummary {
                errors: metric.error_count,
                warnings: metric.warning_count,
                infos: metric.info_count,
                total_issues: metric.issue_count,
                code_quality: format!("{}/100", metric.code_quality_score),
                grade: grade.as_str(),
                evaluation: grade.evaluation(),
            },
            issues: issues.into_iter().map(Into::into).collect(),
        }
    }
}
