//! Chunk type definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::processing::Language;
use crate::semantic::ImportanceScores;

/// Inclusive, 1-indexed line range of a chunk in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Create a range; `end` is raised to `start` if it falls before it.
    pub fn new(start: usize, end: usize) -> Self {
        let start = start.max(1);
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of lines covered.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A range always covers at least one line.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSource {
    /// A classified syntax node
    AstNode,
    /// Raw text that did not map to a node (edge cases, glue between nodes)
    TextBlock,
    /// A whole oversized node that could not be decomposed
    Fallback,
}

/// A chunk of source content ready for embedding.
///
/// Chunks are immutable once returned; the indexing pipeline owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text, never empty
    pub content: String,

    /// Lines covered in the source file
    pub line_range: LineRange,

    /// Source file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Language of the source file
    pub language: Language,

    /// How the chunk was produced
    pub source: ChunkSource,

    /// Approximate token count (bytes / 4)
    pub token_estimate: usize,

    /// Additional metadata about this chunk
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk with fresh metadata.
    pub fn new(content: String, line_range: LineRange, language: Language, source: ChunkSource) -> Self {
        debug_assert!(!content.is_empty(), "chunks never carry empty content");
        let token_estimate = crate::chunkers::estimate_tokens(&content);
        Self {
            content,
            line_range,
            file_path: None,
            language,
            source,
            token_estimate,
            metadata: ChunkMetadata::default(),
        }
    }

    /// Set the source file path.
    pub fn with_file_path(mut self, path: Option<PathBuf>) -> Self {
        self.file_path = path;
        self
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get the length of the chunk content in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Content hash recorded at emission, if any.
    pub fn content_hash(&self) -> Option<&str> {
        self.metadata.context.content_hash.as_deref()
    }

    /// File extension used as a stats key.
    pub fn file_extension(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
    }
}

/// Metadata associated with a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Unique identifier for this chunk
    pub chunk_id: Uuid,

    /// When this chunk was created
    pub created_at: DateTime<Utc>,

    /// Display name, e.g. "Python - function_definition - Line 3"
    pub name: String,

    /// Classification detail for node chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_meta: Option<SemanticMeta>,

    /// Flat snapshot consumed by ranking and re-chunking
    pub context: ChunkContext,

    /// Batch this chunk was emitted in, assigned when chunking completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            created_at: Utc::now(),
            name: String::new(),
            semantic_meta: None,
            context: ChunkContext::default(),
            batch_id: None,
        }
    }
}

impl ChunkMetadata {
    /// Create metadata with a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach classification detail.
    pub fn with_semantic_meta(mut self, meta: SemanticMeta) -> Self {
        self.semantic_meta = Some(meta);
        self
    }

    /// Replace the context snapshot.
    pub fn with_context(mut self, context: ChunkContext) -> Self {
        self.context = context;
        self
    }
}

/// Classification detail of the node a chunk came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMeta {
    pub kind_name: String,
    pub classification: String,
    pub rank: u8,
    pub confidence: f64,
    pub method: String,
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<String>,
}

/// Flat context carried by every chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkContext {
    /// Name of the chunker that produced the chunk
    pub chunker_type: String,

    /// blake3 hex digest of the whitespace-stripped content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Grammar node kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Importance tier name of the classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_scores: Option<ImportanceScores>,

    /// Importance weighted by the configured agent task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_score: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_composite: Option<bool>,

    /// Depth of the node below the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nesting_level: Option<usize>,

    #[serde(default)]
    pub is_partial_node: bool,

    #[serde(default)]
    pub oversized_fallback: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_case: Option<String>,

    /// Token count from the chunker's reporting counter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,

    /// Name of the counter behind `token_count`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
}

impl ChunkContext {
    /// Context for a chunk produced by the named chunker.
    pub fn for_chunker(chunker_type: &str) -> Self {
        Self {
            chunker_type: chunker_type.to_string(),
            ..Default::default()
        }
    }

    /// Tag an edge case.
    pub fn with_edge_case(mut self, edge_case: &str) -> Self {
        self.edge_case = Some(edge_case.to_string());
        self
    }

    /// Record the content hash.
    pub fn with_hash(mut self, hash: String) -> Self {
        self.content_hash = Some(hash);
        self
    }

    /// Record a reported token count.
    pub fn with_token_count(mut self, count: usize, tokenizer: &str) -> Self {
        self.token_count = Some(count);
        self.tokenizer = Some(tokenizer.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_invariant() {
        let range = LineRange::new(5, 3);
        assert_eq!(range.start, 5);
        assert_eq!(range.end, 5);
        assert_eq!(range.len(), 1);

        let range = LineRange::new(0, 4);
        assert_eq!(range.start, 1);
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_chunk_serialization_skips_empty_fields() {
        let chunk = Chunk::new(
            "fn main() {}".to_string(),
            LineRange::new(1, 1),
            Language::Rust,
            ChunkSource::AstNode,
        )
        .with_metadata(
            ChunkMetadata::named("Rust - function_item - Line 1")
                .with_context(ChunkContext::for_chunker("semantic").with_edge_case("single_line")),
        );

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["language"], "rust");
        assert_eq!(json["source"], "ast_node");
        assert_eq!(json["metadata"]["context"]["edge_case"], "single_line");
        assert!(json["metadata"]["context"].get("content_hash").is_none());
        assert!(json.get("file_path").is_none());
        assert_eq!(chunk.token_estimate, 3);
    }

    #[test]
    fn test_file_extension() {
        let chunk = Chunk::new("x".into(), LineRange::new(1, 1), Language::Python, ChunkSource::TextBlock)
            .with_file_path(Some(PathBuf::from("pkg/mod.py")));
        assert_eq!(chunk.file_extension(), Some("py"));
    }
}
