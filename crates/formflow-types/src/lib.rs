//! Shared domain types for Formflow.
//!
//! This crate defines the data model used across the engine: workflow steps
//! with their per-type configuration payloads, the node/edge graph
//! representation, form groups consumed by the execution simulator, the wire
//! contract of the external step-executor service, and the shared error enums.
//!
//! Types here are plain data: behavior (validation, ordering, resolution,
//! simulation) lives in `formflow-core`.

pub mod error;
pub mod executor;
pub mod graph;
pub mod group;
pub mod step;
