//! Chunking of parsed source files.

mod base;
pub mod dedup;
pub mod governor;
pub mod resource;
mod semantic_chunker;
pub mod stats;

pub use base::{count_tokens, default_counter, estimate_tokens, Chunker, EstimatingCounter, TiktokenCounter, TokenCounter};
pub use dedup::{content_hash, BatchStore, DedupStore};
pub use governor::{ChunkGovernor, ModelCapabilities};
pub use resource::{ResourceGovernor, ResourceGuard};
pub use semantic_chunker::SemanticChunker;
pub use stats::{ChunkerStats, ExtensionCounts, StatsSnapshot};
