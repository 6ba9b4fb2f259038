//! # snipq
//!
//! Asynchronous backbone of a code-snippet platform: typed job requests
//! (format, lint, test execution) travel from request-time to background-time
//! over durable pgmq topics, and every processing outcome lands in an
//! append-only, queryable audit trail in Postgres.

pub mod audit;
pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod handler;
pub mod model;
pub mod producer;
pub mod telemetry;
