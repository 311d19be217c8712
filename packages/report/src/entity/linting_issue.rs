use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One linting issue belonging to a materialized report. Rows for a
/// submission are replaced wholesale when its metric is redelivered.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "linting_issue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub metric_id: i32,
    #[sea_orm(belongs_to, from = "metric_id", to = "id")]
    pub metric: HasOne<super::report_metric::Entity>,

    #[sea_orm(indexed)]
    pub submission_id: Uuid,

    pub code: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    pub line: i32,

    pub column: i32,

    pub severity: String,
}

impl ActiveModelBehavior for ActiveModel {}
