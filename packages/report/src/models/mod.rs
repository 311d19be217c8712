pub mod dlq;
pub mod report;
pub mod shared;
