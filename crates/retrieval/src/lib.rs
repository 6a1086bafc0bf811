//! Chunked historical retrieval for the order-imbalance system.
//!
//! This crate provides:
//! - Provider and symbol resolver seams, with an in-memory provider
//! - The window-by-window retrieval driver (sequential or prefetching)
//! - A blocking client for the Databento historical API

pub mod databento;
pub mod driver;
pub mod provider;

pub use databento::DatabentoClient;
pub use driver::{plan_range, Progress, RetrievalDriver, RunOutput, RunReport, WindowFailure};
pub use provider::{
    EventProvider, EventQuery, InMemoryProvider, RecordedRequest, StaticResolver, SymbolResolver,
};
