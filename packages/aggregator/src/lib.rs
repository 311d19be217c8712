pub mod config;
pub mod consumer;
pub mod database;
pub mod entity;
pub mod metrics;
pub mod store;
