use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Denormalized per-submission metric header. One row per submission;
/// redelivered events replace it.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report_metric")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub submission_id: Uuid,

    pub language: String,

    pub error_count: i32,

    pub warning_count: i32,

    pub info_count: i32,

    pub issue_count: i32,

    pub file_count: i32,

    pub code_quality_score: i32,

    pub calculated_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub issues: HasMany<super::linting_issue::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
