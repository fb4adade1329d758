//! Workflow engine core for Formflow.
//!
//! This crate contains the "brain" of the workflow system:
//! - `resolver` -- `{{path}}` template substitution against the run context
//! - `registry` -- per-step-type config validation and normalization
//! - `order` -- sparse integer ordering with midpoint moves and renormalization
//! - `graph` -- canonical node/edge graph with branch handles
//! - `chain` -- adapters between the graph and the legacy pointer chain
//! - `context` -- accumulating namespaced execution context
//! - `array` -- array-processing call planner (loop/batch/single/conditional)
//! - `simulator` -- the execution-simulation state machine
//! - `reconcile` -- set-difference save planning
//! - `service` -- optimistic mutations with store-confirmed commit/rollback
//! - `repository` / `executor` -- traits implemented by `formflow-infra`

pub mod array;
pub mod chain;
pub mod context;
pub mod executor;
pub mod graph;
pub mod order;
pub mod reconcile;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod simulator;
