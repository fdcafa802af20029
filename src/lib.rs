// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;

// Pipeline stages, in run order
pub mod ingest;
pub mod filter;
pub mod resolve;
pub mod dedup;
pub mod cache;
pub mod rank;
pub mod analyze;
pub mod report;
pub mod notify;

pub mod engine;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use config::{BotConfig, Secrets};
pub use engine::{unix_now, DigestEngine, RunReport};
