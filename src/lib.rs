//! Semantic Chunker Library
//!
//! Grammar-aware classification of syntax-tree node kinds and AST-driven
//! chunking of source files for embedding pipelines.
//!
//! ```no_run
//! use semantic_chunker::prelude::*;
//!
//! # fn main() -> semantic_chunker::Result<()> {
//! let chunker = SemanticChunker::new(ChunkingConfig::from_env())?;
//! let governor = ChunkGovernor::with_limit(512);
//! let chunks = chunker.chunk("def f():\n    return 1\n", Some("f.py".as_ref()), &governor)?;
//! # Ok(())
//! # }
//! ```

pub mod ast_engine;
pub mod batch;
pub mod cache;
pub mod chunkers;
pub mod error;
pub mod grammar;
pub mod processing;
pub mod semantic;
pub mod telemetry;
pub mod types;

pub use batch::{BatchConfig, BatchProcessor, BatchResult};
pub use chunkers::{ChunkGovernor, Chunker, SemanticChunker};
pub use error::{ChunkingError, Result};
pub use processing::Language;
pub use semantic::{ClassificationResult, SemanticClass, SemanticClassifier};
pub use types::{Chunk, ChunkMetadata, ChunkingConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::chunkers::{ChunkGovernor, Chunker, ModelCapabilities, SemanticChunker};
    pub use crate::error::{ChunkingError, Result};
    pub use crate::processing::{Language, LanguageFamily};
    pub use crate::semantic::{
        AgentTask, ClassificationContext, ClassificationResult, ImportanceRank, SemanticClass,
        SemanticClassifier,
    };
    pub use crate::types::*;
}

/// Default chunk budget in tokens when no model is registered
pub const DEFAULT_CHUNK_LIMIT: usize = 512;

/// Default minimum task importance for a chunk
pub const DEFAULT_IMPORTANCE_THRESHOLD: f64 = 0.3;

/// Default maximum syntax-tree depth
pub const DEFAULT_MAX_AST_DEPTH: usize = 200;

/// Default per-file elapsed-time ceiling, in seconds
pub const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 30;

/// Default per-file chunk ceiling
pub const DEFAULT_MAX_CHUNKS_PER_FILE: usize = 5000;

/// Default number of remembered content hashes
pub const DEFAULT_DEDUP_CAPACITY: usize = 100_000;

/// Default number of retained batches
pub const DEFAULT_BATCH_STORE_CAPACITY: usize = 512;

/// Default batch concurrency
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 4;
