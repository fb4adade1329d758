//! Infrastructure implementations for Formflow.
//!
//! - `sqlite` -- SQLite-backed `StepRepository` with split reader/writer pools
//! - `executor` -- HTTP client for the external step-executor service
//! - `config` -- TOML application configuration
//! - `telemetry` -- tracing subscriber setup

pub mod config;
pub mod executor;
pub mod sqlite;
pub mod telemetry;
