//! Core types for the chunking engine.

mod chunk;
mod config;

pub use chunk::{Chunk, ChunkContext, ChunkMetadata, ChunkSource, LineRange, SemanticMeta};
pub use config::ChunkingConfig;
