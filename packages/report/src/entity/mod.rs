pub mod dead_letter_message;
pub mod linting_issue;
pub mod report_metric;
