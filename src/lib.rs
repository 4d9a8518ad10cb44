//! # SQL Query Diagnostic Engine
//!
//! A read-only SQL performance diagnostic pipeline for MySQL, PostgreSQL,
//! and SQLite: sanitize -> safety-validate -> schema/syntax validate ->
//! driver-executed `EXPLAIN ANALYZE` -> plan-tree parsing -> metrics
//! extraction -> weighted scoring -> rule evaluation -> deep analyzers
//! (cardinality drift, concurrency risk, memory pressure, hypothetical-index
//! simulation, regression baselines, confidence) -> report assembly.
//!
//! [`engine::Engine`] is the single entry point; see its `diagnose` and
//! `analyze_sql` methods.

pub mod analyzers;
pub mod baseline;
pub mod cache;
pub mod cli;
pub mod config;
pub mod consistency;
pub mod driver;
pub mod engine;
pub mod error;
pub mod explain;
pub mod lexical;
pub mod metrics;
pub mod output;
pub mod plan;
pub mod report;
pub mod rules;
pub mod safety;
pub mod sanitizer;
pub mod schema;
pub mod scoring;
pub mod validator;
