//! Embedding providers for the evidence store.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
