pub mod linting_metric;
pub mod metric_failure;
