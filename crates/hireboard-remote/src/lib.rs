//! Remote system-of-record adapters for the Hireboard pipeline.
//!
//! Provides the `PipelineBackend` trait, the `DynBackend` shared handle, a
//! REST adapter (`HttpBackend`) and a snapshot-backed `InMemoryBackend` used
//! for offline work and tests.

mod backend;
mod http;
mod memory;

pub use backend::*;
pub use http::HttpBackend;
pub use memory::{InMemoryBackend, UpdateCall};
