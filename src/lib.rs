//! CFO Copilot
//!
//! Answers natural-language finance questions ("How did opex compare to
//! budget in March?") against an immutable in-memory dataset:
//! - classifies the query onto a closed intent set via ordered keyword rules
//! - extracts period / category / currency parameters from the text
//! - computes the requested metric with pure, guarded financial formulas
//!
//! PIPELINE:
//! QUERY → CLASSIFY + EXTRACT → COMPUTE → RESULT
//!
//! Every query is classified and answered independently; the only shared
//! state is the read-only [`DataContext`](context::DataContext) built once
//! at startup.

pub mod agent;
pub mod classifier;
pub mod context;
pub mod error;
pub mod extractor;
pub mod fx;
pub mod ingest;
pub mod metrics;
pub mod models;

pub use error::Result;

// Re-export common types
pub use agent::Copilot;
pub use classifier::IntentClassifier;
pub use context::DataContext;
pub use models::*;
