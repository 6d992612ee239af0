//! # taskq
//!
//! Postgres-backed task queue engine.
//!
//! Tasks are created at most once per client dedup key, claimed by exactly
//! one worker at a time, and edited under an optimistic version token. All
//! coordination lives in the store; see [`db`] for the three protocols and
//! [`worker`] for the polling pool that drives them.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod service;
pub mod telemetry;
pub mod worker;
