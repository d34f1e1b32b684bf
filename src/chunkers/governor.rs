//! Token budget derived from embedding model limits.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHUNK_LIMIT;

const MIN_OVERLAP: usize = 50;
const MAX_OVERLAP: usize = 200;

/// Limits of an embedding model a chunk must fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub name: String,
    /// Maximum input tokens per embedding request
    pub context_window: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_tokens: Option<usize>,
}

impl ModelCapabilities {
    pub fn new(name: impl Into<String>, context_window: usize) -> Self {
        Self {
            name: name.into(),
            context_window,
            max_batch_tokens: None,
        }
    }
}

/// Chunk budget for a set of target models.
///
/// `chunk_limit` is the smallest context window; `simple_overlap` is 20% of
/// it clamped to [50, 200]. Both are computed on first use.
#[derive(Debug, Default)]
pub struct ChunkGovernor {
    models: Vec<ModelCapabilities>,
    chunk_limit: OnceLock<usize>,
    simple_overlap: OnceLock<usize>,
}

impl Clone for ChunkGovernor {
    fn clone(&self) -> Self {
        Self::new(self.models.clone())
    }
}

impl ChunkGovernor {
    pub fn new(models: Vec<ModelCapabilities>) -> Self {
        Self {
            models,
            chunk_limit: OnceLock::new(),
            simple_overlap: OnceLock::new(),
        }
    }

    /// A governor for a single anonymous model with the given window.
    pub fn with_limit(limit: usize) -> Self {
        Self::new(vec![ModelCapabilities::new("default", limit)])
    }

    pub fn models(&self) -> &[ModelCapabilities] {
        &self.models
    }

    /// Token budget per chunk.
    pub fn chunk_limit(&self) -> usize {
        *self.chunk_limit.get_or_init(|| {
            self.models
                .iter()
                .map(|m| m.context_window)
                .min()
                .unwrap_or(DEFAULT_CHUNK_LIMIT)
        })
    }

    /// Overlap in tokens for plain text splitting.
    pub fn simple_overlap(&self) -> usize {
        *self.simple_overlap.get_or_init(|| {
            let overlap = (self.chunk_limit() as f64 * 0.2) as usize;
            overlap.clamp(MIN_OVERLAP, MAX_OVERLAP)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_min_context_window() {
        let governor = ChunkGovernor::new(vec![
            ModelCapabilities::new("large", 8192),
            ModelCapabilities::new("small", 512),
        ]);
        assert_eq!(governor.chunk_limit(), 512);
        assert_eq!(governor.simple_overlap(), 102);
    }

    #[test]
    fn test_overlap_clamped() {
        assert_eq!(ChunkGovernor::with_limit(100).simple_overlap(), 50);
        assert_eq!(ChunkGovernor::with_limit(8192).simple_overlap(), 200);
    }

    #[test]
    fn test_empty_models_use_default() {
        let governor = ChunkGovernor::default();
        assert_eq!(governor.chunk_limit(), DEFAULT_CHUNK_LIMIT);
        assert_eq!(governor.clone().chunk_limit(), DEFAULT_CHUNK_LIMIT);
    }
}
