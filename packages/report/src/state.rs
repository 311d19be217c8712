use std::sync::Arc;

use mq::Mq;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    /// `None` when MQ is disabled; read endpoints still work, DLQ retry
    /// returns an error.
    pub mq: Option<Arc<Mq>>,
}
