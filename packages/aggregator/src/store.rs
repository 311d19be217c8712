use chrono::{DateTime, Utc};
use common::events::MetricsCalculated;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entity::{linting_metric, metric_failure};

/// Persistence operations for the aggregator's own store.
pub struct MetricsStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> MetricsStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert-or-replace the metric row keyed by the unique submission id.
    ///
    /// A single conditional upsert statement, so a redelivered or
    /// concurrently retried message converges to the last write instead of
    /// duplicating rows.
    pub async fn upsert_metric(&self, metric: &MetricsCalculated) -> Result<(), DbErr> {
        let model = linting_metric::ActiveModel {
            submission_id: Set(metric.submission_id),
            language: Set(metric.language.clone()),
            error_count: Set(metric.error_count),
            warning_count: Set(metric.warning_count),
            info_count: Set(metric.info_count),
            issue_count: Set(metric.issue_count),
            file_count: Set(metric.file_count),
            code_quality_score: Set(metric.code_quality_score),
            calculated_at: Set(metric.calculated_at_utc),
            ..Default::default()
        };

        linting_metric::Entity::insert(model)
            .on_conflict(
                OnConflict::column(linting_metric::Column::SubmissionId)
                    .update_columns([
                        linting_metric::Column::Language,
                        linting_metric::Column::ErrorCount,
                        linting_metric::Column::WarningCount,
                        linting_metric::Column::InfoCount,
                        linting_metric::Column::IssueCount,
                        linting_metric::Column::FileCount,
                        linting_metric::Column::CodeQualityScore,
                        linting_metric::Column::CalculatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.conn)
            .await?;

        Ok(())
    }

    /// Append a failure record. Never updates existing rows; failures are
    /// diagnostics and do not block a later successful retry.
    pub async fn record_failure(
        &self,
        submission_id: Uuid,
        language: &str,
        error_message: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let model = metric_failure::ActiveModel {
            submission_id: Set(submission_id),
            language: Set(language.to_string()),
            error_message: Set(error_message.to_string()),
            failed_at: Set(failed_at),
            ..Default::default()
        };
        model.insert(self.conn).await?;
        Ok(())
    }
}
