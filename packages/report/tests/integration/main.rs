mod common;

mod dlq;
mod reports;
