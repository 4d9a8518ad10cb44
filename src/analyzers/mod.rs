//! Deep analyzers: the opt-in, heavier-weight analysis stage that runs
//! after scoring and rule evaluation. Each submodule is independent and
//! returns its own typed report; [`crate::engine::Engine::diagnose`] wires
//! all nine together into one [`crate::report::AnalyzerOutputs`].

pub mod anti_patterns;
pub mod cardinality;
pub mod concurrency;
pub mod confidence;
pub mod hypothetical_index;
pub mod index_synthesis;
pub mod memory;
pub mod regression;
pub mod scalability;
