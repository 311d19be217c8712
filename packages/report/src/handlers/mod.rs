pub mod dlq;
pub mod report;
