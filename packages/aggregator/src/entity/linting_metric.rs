use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-submission aggregate computed from a linting result.
///
/// At most one authoritative row per submission: recomputation replaces the
/// row via upsert on the unique `submission_id`, never accumulates.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "linting_metric")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub submission_id: Uuid,

    pub language: String,

    pub error_count: i32,
    pub warning_count: i32,
    pub info_count: i32,
    /// Total findings across all severities; may exceed
    /// error + warning + info when convention/naming findings exist.
    pub issue_count: i32,
    pub file_count: i32,

    /// 0-100, from the canonical scoring formula.
    pub code_quality_score: i32,

    pub calculated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
