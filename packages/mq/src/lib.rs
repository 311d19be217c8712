pub mod error;
pub mod models;

pub use error::MqError;
pub use models::{BroccoliError, BrokerMessage, MqConfig, MqQueue, init_mq, init_mq_with_retry};

pub type Mq = MqQueue;
