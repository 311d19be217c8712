use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{linting_issue, report_metric};
use crate::error::{AppError, ErrorBody};
use crate::models::report::{ReportDetailResponse, ReportSummaryResponse};
use crate::state::AppState;

/// List report summaries, most recently calculated first.
#[utoipa::path(
    get,
    path = "",
    tag = "Reports",
    operation_id = "listReports",
    summary = "List report summaries",
    description = "Returns one summary per submission, ordered by calculation time descending.",
    responses(
        (status = 200, description = "Report summaries", body = Vec<ReportSummaryResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportSummaryResponse>>, AppError> {
    let metrics = report_metric::Entity::find()
        .order_by_desc(report_metric::Column::CalculatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(metrics.into_iter().map(Into::into).collect()))
}

/// Get the full report for one submission.
#[utoipa::path(
    get,
    path = "/{submission_id}",
    tag = "Reports",
    operation_id = "getReport",
    summary = "Get a submission's report",
    description = "Returns the full materialized report: aggregate summary with grade and \
                   evaluation, plus all linting issues in insertion order.",
    params(("submission_id" = Uuid, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Full report", body = ReportDetailResponse),
        (status = 404, description = "No report for this submission (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(%submission_id))]
pub async fn get_report(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<ReportDetailResponse>, AppError> {
    let metric = report_metric::Entity::find()
        .filter(report_metric::Column::SubmissionId.eq(submission_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No report found for submission {submission_id}"))
        })?;

    let issues = linting_issue::Entity::find()
        .filter(linting_issue::Column::SubmissionId.eq(submission_id))
        .order_by_asc(linting_issue::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ReportDetailResponse::from_parts(metric, issues)))
}
