use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit entry for a failed metrics computation.
///
/// Rows are never updated or deleted; a later successful retry for the same
/// submission simply leaves the failure record behind as history.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metric_failure")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub submission_id: Uuid,

    pub language: String,

    #[sea_orm(column_type = "Text")]
    pub error_message: String,

    pub failed_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
