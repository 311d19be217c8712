use std::collections::HashMap;

use chrono::Utc;
use common::{DlqEnvelope, DlqMessageType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, sea_query::LockType,
};

use crate::entity::dead_letter_message;

/// Result of attempting to resolve a DLQ message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveResult {
    /// Message was successfully resolved.
    Resolved,
    /// Message was not found.
    NotFound,
    /// Message was already resolved.
    AlreadyResolved,
}

/// Statistics about the dead letter queue.
#[derive(Debug, Clone)]
pub struct DlqStats {
    pub total_unresolved: u64,
    pub total_resolved: u64,
    pub linting_result_count: u64,
    pub linting_failure_count: u64,
    pub metrics_calculated_count: u64,
    /// Unresolved message count grouped by error code.
    pub unresolved_by_error_code: HashMap<String, u64>,
}

pub struct DlqService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DlqService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Persist a dead-lettered envelope. Inserting the same `message_id`
    /// twice (redelivery) returns the existing row instead of failing.
    pub async fn send_to_dlq(
        &self,
        envelope: &DlqEnvelope,
    ) -> Result<dead_letter_message::Model, DbErr> {
        let first_failed_at = envelope
            .retry_history
            .first()
            .map(|r| r.timestamp)
            .unwrap_or_else(Utc::now);

        let model = dead_letter_message::ActiveModel {
            message_id: Set(envelope.message_id.clone()),
            message_type: Set(envelope.message_type.to_string()),
            submission_id: Set(envelope.submission_id),
            payload: Set(envelope.payload.clone()),
            error_message: Set(envelope.error_message.clone()),
            error_code: Set(envelope.error_code.to_string()),
            retry_count: Set(envelope.retry_history.len() as i32),
            retry_history: Set(serde_json::to_value(&envelope.retry_history).unwrap_or_default()),
            first_failed_at: Set(first_failed_at),
            created_at: Set(Utc::now()),
            resolved: Set(false),
            resolved_at: Set(None),
            ..Default::default()
        };

        match model.insert(self.conn).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                dead_letter_message::Entity::find()
                    .filter(dead_letter_message::Column::MessageId.eq(&envelope.message_id))
                    .one(self.conn)
                    .await?
                    .ok_or_else(|| {
                        DbErr::Custom(
                            "UniqueConstraintViolation but existing row not found".to_string(),
                        )
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// List DLQ messages.
    pub async fn list(
        &self,
        message_type: Option<DlqMessageType>,
        resolved: Option<bool>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<dead_letter_message::Model>, u64), DbErr> {
        let mut query = dead_letter_message::Entity::find();

        if let Some(mt) = message_type {
            query = query.filter(dead_letter_message::Column::MessageType.eq(mt.to_string()));
        }

        if let Some(res) = resolved {
            query = query.filter(dead_letter_message::Column::Resolved.eq(res));
        }

        let total = query.clone().count(self.conn).await?;

        let messages = query
            .order_by_desc(dead_letter_message::Column::CreatedAt)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(self.conn)
            .await?;

        Ok((messages, total))
    }

    /// Get a single DLQ message by ID.
    pub async fn get_by_id(&self, id: i32) -> Result<Option<dead_letter_message::Model>, DbErr> {
        dead_letter_message::Entity::find_by_id(id)
            .one(self.conn)
            .await
    }

    /// Get a single DLQ message by ID with FOR UPDATE lock.
    pub async fn get_by_id_for_update(
        &self,
        id: i32,
    ) -> Result<Option<dead_letter_message::Model>, DbErr> {
        dead_letter_message::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    /// Mark a message as resolved.
    pub async fn resolve(&self, id: i32) -> Result<ResolveResult, DbErr> {
        let update = dead_letter_message::Entity::update_many()
            .col_expr(
                dead_letter_message::Column::Resolved,
                sea_orm::sea_query::Expr::value(true),
            )
            .col_expr(
                dead_letter_message::Column::ResolvedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(dead_letter_message::Column::Id.eq(id))
            .filter(dead_letter_message::Column::Resolved.eq(false));

        let update_result = update.exec(self.conn).await?;

        if update_result.rows_affected > 0 {
            return Ok(ResolveResult::Resolved);
        }

        let exists = dead_letter_message::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .is_some();

        if exists {
            Ok(ResolveResult::AlreadyResolved)
        } else {
            Ok(ResolveResult::NotFound)
        }
    }

    /// Get DLQ statistics.
    pub async fn stats(&self) -> Result<DlqStats, DbErr> {
        let total_resolved = dead_letter_message::Entity::find()
            .filter(dead_letter_message::Column::Resolved.eq(true))
            .count(self.conn)
            .await?;

        let unresolved_data: Vec<(String, String)> = dead_letter_message::Entity::find()
            .select_only()
            .column(dead_letter_message::Column::MessageType)
            .column(dead_letter_message::Column::ErrorCode)
            .filter(dead_letter_message::Column::Resolved.eq(false))
            .into_tuple()
            .all(self.conn)
            .await?;

        let total_unresolved = unresolved_data.len() as u64;
        let mut linting_result_count = 0u64;
        let mut linting_failure_count = 0u64;
        let mut metrics_calculated_count = 0u64;
        let mut unresolved_by_error_code: HashMap<String, u64> = HashMap::new();

        for (message_type, error_code) in unresolved_data {
            match message_type.as_str() {
                "linting_result" => linting_result_count += 1,
                "linting_failure" => linting_failure_count += 1,
                "metrics_calculated" => metrics_calculated_count += 1,
                _ => {}
            }
            *unresolved_by_error_code.entry(error_code).or_insert(0) += 1;
        }

        Ok(DlqStats {
            total_unresolved,
            total_resolved,
            linting_result_count,
            linting_failure_count,
            metrics_calculated_count,
            unresolved_by_error_code,
        })
    }
}

/// Create a DlqService with a DatabaseConnection.
pub fn dlq_service(db: &DatabaseConnection) -> DlqService<'_, DatabaseConnection> {
    DlqService::new(db)
}
