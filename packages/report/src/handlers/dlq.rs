use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::events::{LintingFailed, LintingFinished, MetricsCalculated};
use common::DlqMessageType;
use sea_orm::TransactionTrait;
use tracing::{info, instrument};

use crate::dlq::{DlqService, ResolveResult, dlq_service};
use crate::error::{AppError, ErrorBody};
use crate::models::dlq::*;
use crate::models::shared::Pagination;
use crate::state::AppState;

/// List dead letter messages.
#[utoipa::path(
    get,
    path = "",
    tag = "Dead Letter Queue",
    operation_id = "listDlqMessages",
    summary = "List dead letter messages",
    description = "Returns a paginated list of dead letter messages.",
    params(ListDlqParams),
    responses(
        (status = 200, description = "List of DLQ messages", body = DlqListResponse),
        (status = 400, description = "Invalid filter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_dlq_messages(
    State(state): State<AppState>,
    Query(params): Query<ListDlqParams>,
) -> Result<Json<DlqListResponse>, AppError> {
    let message_type = params
        .message_type
        .map(|mt| mt.parse::<DlqMessageType>())
        .transpose()
        .map_err(AppError::Validation)?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let dlq = dlq_service(&state.db);
    let (messages, total) = dlq
        .list(message_type, params.resolved, page, per_page)
        .await?;

    let data: Vec<DlqMessageResponse> = messages.into_iter().map(Into::into).collect();
    let total_pages = total.div_ceil(per_page);

    Ok(Json(DlqListResponse {
        data,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}

/// Get DLQ statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Dead Letter Queue",
    operation_id = "getDlqStats",
    summary = "Get DLQ statistics",
    description = "Returns unresolved/resolved counts, broken down by message type and error code.",
    responses(
        (status = 200, description = "DLQ statistics", body = DlqStatsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_dlq_stats(
    State(state): State<AppState>,
) -> Result<Json<DlqStatsResponse>, AppError> {
    let dlq = dlq_service(&state.db);
    let stats = dlq.stats().await?;

    Ok(Json(stats.into()))
}

/// Get a single DLQ message by ID.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Dead Letter Queue",
    operation_id = "getDlqMessage",
    summary = "Get DLQ message details",
    description = "Returns full details of a DLQ message including payload and retry history.",
    params(("id" = i32, Path, description = "DLQ message ID")),
    responses(
        (status = 200, description = "DLQ message details", body = DlqMessageDetailResponse),
        (status = 404, description = "Message not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_dlq_message(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DlqMessageDetailResponse>, AppError> {
    let dlq = dlq_service(&state.db);
    let message = dlq
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("DLQ message {} not found", id)))?;

    Ok(Json(message.into()))
}

/// Retry a DLQ message by re-enqueuing its payload to the source queue.
#[utoipa::path(
    post,
    path = "/{id}/retry",
    tag = "Dead Letter Queue",
    operation_id = "retryDlqMessage",
    summary = "Retry a DLQ message",
    description = "Re-enqueues the original payload to the queue it came from and marks the \
                   DLQ entry as resolved. Fails when the payload no longer deserializes.",
    params(("id" = i32, Path, description = "DLQ message ID")),
    responses(
        (status = 200, description = "Message requeued", body = DlqRetryResponse),
        (status = 400, description = "Payload not retryable (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Message not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Message already resolved (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn retry_dlq_message(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DlqRetryResponse>, AppError> {
    let txn = state.db.begin().await?;

    let dlq = DlqService::new(&txn);
    let message = dlq
        .get_by_id_for_update(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("DLQ message {} not found", id)))?;

    if message.resolved {
        return Err(AppError::Conflict("Message already resolved".into()));
    }

    let message_type: DlqMessageType = message
        .message_type
        .parse()
        .map_err(AppError::Validation)?;

    // A payload that still fails schema validation would immediately
    // dead-letter again; reject the retry up front. Each type validates
    // against its own contract: a failure payload parses as a result too
    // (counts default to 0) and must not replay into the success pipeline.
    let target_queue = match message_type {
        DlqMessageType::LintingResult => {
            serde_json::from_value::<LintingFinished>(message.payload.clone()).map_err(|e| {
                AppError::Validation(format!("Payload is not a valid linting result: {e}"))
            })?;
            &state.config.mq.linting_finished_queue
        }
        DlqMessageType::LintingFailure => {
            serde_json::from_value::<LintingFailed>(message.payload.clone()).map_err(|e| {
                AppError::Validation(format!("Payload is not a valid linting failure: {e}"))
            })?;
            &state.config.mq.linting_failed_queue
        }
        DlqMessageType::MetricsCalculated => {
            serde_json::from_value::<MetricsCalculated>(message.payload.clone()).map_err(|e| {
                AppError::Validation(format!("Payload is not a valid metrics event: {e}"))
            })?;
            &state.config.mq.metrics_calculated_queue
        }
    };

    let Some(ref mq) = state.mq else {
        return Err(AppError::Internal("Message queue not available".into()));
    };

    match dlq.resolve(id).await? {
        ResolveResult::Resolved => {} // Expected
        ResolveResult::AlreadyResolved => {
            tracing::warn!(id, "DLQ message was resolved concurrently during retry");
        }
        ResolveResult::NotFound => {
            return Err(AppError::Internal(
                "DLQ message disappeared during retry".into(),
            ));
        }
    }

    mq.publish(target_queue, None, &message.payload, None)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to re-enqueue message: {}", e)))?;

    txn.commit().await.map_err(|e| {
        tracing::error!(
            id,
            submission_id = ?message.submission_id,
            error = %e,
            "CRITICAL: MQ message published but DB commit failed. \
             Message is back in its source queue but DLQ entry remains unresolved."
        );
        AppError::Internal(format!("DB commit failed after MQ publish: {}", e))
    })?;

    info!(id, queue = %target_queue, "DLQ message retried");

    Ok(Json(DlqRetryResponse {
        message: format!("Message requeued to {}", target_queue),
    }))
}

/// Resolve a DLQ message without retrying.
#[utoipa::path(
    post,
    path = "/{id}/resolve",
    tag = "Dead Letter Queue",
    operation_id = "resolveDlqMessage",
    summary = "Resolve a DLQ message",
    description = "Marks a DLQ message as resolved without re-enqueuing it. Use this to \
                   acknowledge messages that don't need to be reprocessed.",
    params(("id" = i32, Path, description = "DLQ message ID")),
    responses(
        (status = 204, description = "Message resolved"),
        (status = 404, description = "Message not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn resolve_dlq_message(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let dlq = dlq_service(&state.db);
    let result = dlq.resolve(id).await?;

    match result {
        ResolveResult::Resolved => {
            info!(id, "DLQ message resolved");
            Ok(StatusCode::NO_CONTENT)
        }
        ResolveResult::NotFound => Err(AppError::NotFound(format!("DLQ message {} not found", id))),
        ResolveResult::AlreadyResolved => {
            info!(id, "DLQ message already resolved");
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
