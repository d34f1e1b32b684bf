//! Configuration types for chunking.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkingError, Result};
use crate::semantic::AgentTask;
use crate::{
    DEFAULT_BATCH_STORE_CAPACITY, DEFAULT_CHUNK_TIMEOUT_SECS, DEFAULT_DEDUP_CAPACITY,
    DEFAULT_IMPORTANCE_THRESHOLD, DEFAULT_MAX_AST_DEPTH, DEFAULT_MAX_CHUNKS_PER_FILE,
    DEFAULT_MAX_CONCURRENT_FILES,
};

/// Global chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Minimum task importance for a node to become a chunk
    pub importance_threshold: f64,

    /// Maximum ancestor depth before a tree is rejected
    pub max_ast_depth: usize,

    /// Elapsed-time ceiling per file, in seconds
    pub chunk_timeout_secs: u64,

    /// Maximum chunks emitted per file
    pub max_chunks_per_file: usize,

    /// Number of content hashes remembered for deduplication
    pub dedup_capacity: usize,

    /// Number of recent batches kept for retrieval
    pub batch_store_capacity: usize,

    /// Task profile used to score chunk importance
    pub agent_task: AgentTask,

    /// Files chunked concurrently by the batch processor
    pub max_concurrent_files: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
            max_ast_depth: DEFAULT_MAX_AST_DEPTH,
            chunk_timeout_secs: DEFAULT_CHUNK_TIMEOUT_SECS,
            max_chunks_per_file: DEFAULT_MAX_CHUNKS_PER_FILE,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            batch_store_capacity: DEFAULT_BATCH_STORE_CAPACITY,
            agent_task: AgentTask::Default,
            max_concurrent_files: DEFAULT_MAX_CONCURRENT_FILES,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl ChunkingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            importance_threshold: env_or("CHUNK_IMPORTANCE_THRESHOLD", DEFAULT_IMPORTANCE_THRESHOLD),
            max_ast_depth: env_or("CHUNK_MAX_AST_DEPTH", DEFAULT_MAX_AST_DEPTH),
            chunk_timeout_secs: env_or("CHUNK_TIMEOUT_SECS", DEFAULT_CHUNK_TIMEOUT_SECS),
            max_chunks_per_file: env_or("CHUNK_MAX_PER_FILE", DEFAULT_MAX_CHUNKS_PER_FILE),
            dedup_capacity: env_or("CHUNK_DEDUP_CAPACITY", DEFAULT_DEDUP_CAPACITY),
            batch_store_capacity: env_or("CHUNK_BATCH_STORE_CAPACITY", DEFAULT_BATCH_STORE_CAPACITY),
            agent_task: std::env::var("CHUNK_AGENT_TASK")
                .ok()
                .and_then(|s| AgentTask::from_name(&s))
                .unwrap_or_default(),
            max_concurrent_files: env_or("CHUNK_MAX_CONCURRENT_FILES", DEFAULT_MAX_CONCURRENT_FILES),
        }
    }

    /// Load a `.env` file into the process environment, then read it.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::from_path(path.as_ref())
            .map_err(|e| ChunkingError::invalid_config(format!("failed to load env file: {e}")))?;
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.importance_threshold) {
            return Err(ChunkingError::invalid_config(format!(
                "importance_threshold must be within [0, 1], got {}",
                self.importance_threshold
            )));
        }
        if self.max_ast_depth == 0 {
            return Err(ChunkingError::invalid_config("max_ast_depth must be greater than 0"));
        }
        if self.chunk_timeout_secs == 0 {
            return Err(ChunkingError::invalid_config("chunk_timeout_secs must be greater than 0"));
        }
        if self.max_chunks_per_file == 0 {
            return Err(ChunkingError::invalid_config("max_chunks_per_file must be greater than 0"));
        }
        if self.dedup_capacity == 0 || self.batch_store_capacity == 0 {
            return Err(ChunkingError::invalid_config("cache capacities must be greater than 0"));
        }
        if self.max_concurrent_files == 0 {
            return Err(ChunkingError::invalid_config("max_concurrent_files must be greater than 0"));
        }
        Ok(())
    }

    /// Set the importance threshold.
    pub fn with_importance_threshold(mut self, threshold: f64) -> Self {
        self.importance_threshold = threshold;
        self
    }

    /// Set the resource limits.
    pub fn with_limits(mut self, timeout_secs: u64, max_chunks: usize) -> Self {
        self.chunk_timeout_secs = timeout_secs;
        self.max_chunks_per_file = max_chunks;
        self
    }

    /// Set the maximum AST depth.
    pub fn with_max_ast_depth(mut self, depth: usize) -> Self {
        self.max_ast_depth = depth;
        self
    }

    /// Set the agent task profile.
    pub fn with_agent_task(mut self, task: AgentTask) -> Self {
        self.agent_task = task;
        self
    }

    /// Elapsed-time ceiling as a duration.
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}
