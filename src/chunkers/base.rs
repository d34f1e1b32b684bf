//! Base traits shared by chunkers.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::error::{ChunkingError, Result};
use crate::processing::Language;
use crate::types::Chunk;

use super::governor::ChunkGovernor;

/// The core trait that all chunkers implement.
///
/// A chunker takes the content of one file and splits it into
/// self-contained chunks suitable for embedding and retrieval.
pub trait Chunker: Send + Sync {
    /// Get the name of this chunker.
    fn name(&self) -> &'static str;

    /// Chunk one file's content within the governor's token budget.
    fn chunk(&self, content: &str, file_path: Option<&Path>, governor: &ChunkGovernor) -> Result<Vec<Chunk>>;

    /// Check if this chunker can produce syntax-aware chunks for a language.
    fn supports_language(&self, language: Language) -> bool {
        let _ = language;
        true
    }

    /// Get the description of this chunker.
    fn description(&self) -> &'static str {
        "A source chunker"
    }
}

/// Approximate token count used for every budget decision: bytes / 4.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Token counter trait for counting tokens in text.
pub trait TokenCounter: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    fn name(&self) -> &'static str;
}

/// Counter that applies the bytes / 4 approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingCounter;

impl TokenCounter for EstimatingCounter {
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn name(&self) -> &'static str {
        "estimate"
    }
}

/// Exact counter using tiktoken (cl100k_base encoding), for reporting.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Create a counter with the cl100k_base encoding.
    pub fn new() -> Result<Self> {
        Self::with_encoding("cl100k_base")
    }

    /// Create a counter with a specific encoding.
    pub fn with_encoding(encoding_name: &str) -> Result<Self> {
        let bpe = match encoding_name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(ChunkingError::invalid_config(format!("unknown encoding: {other}")));
            }
        }
        .map_err(|e| ChunkingError::invalid_config(format!("failed to load {encoding_name}: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &'static str {
        "tiktoken"
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_COUNTER: Arc<dyn TokenCounter> = match TiktokenCounter::new() {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!(error = %e, "tiktoken unavailable, reporting estimated token counts");
            Arc::new(EstimatingCounter)
        }
    };
}

/// Shared reporting counter: tiktoken, or the estimate if the encoding
/// cannot be loaded.
pub fn default_counter() -> Arc<dyn TokenCounter> {
    Arc::clone(&DEFAULT_COUNTER)
}

/// Count tokens with the shared reporting counter.
pub fn count_tokens(text: &str) -> usize {
    DEFAULT_COUNTER.count_tokens(text)
}
