//! Error taxonomy for the chunking boundary.
//!
//! Classification never fails; every variant here belongs to file-level
//! chunking or to grammar/parser setup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for chunking operations
pub type Result<T> = std::result::Result<T, ChunkingError>;

/// Errors raised while chunking a single file.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Content contains a null byte or is not valid UTF-8
    #[error("Binary content detected{}", display_path(.path))]
    BinaryFile { path: Option<PathBuf> },

    /// The parser collaborator rejected the content
    #[error("Failed to parse {language} content: {message}")]
    Parse { language: String, message: String },

    /// Pathological nesting in the parsed tree
    #[error("AST depth {depth} exceeds maximum of {max_depth}")]
    AstDepthExceeded { depth: usize, max_depth: usize },

    /// Resource governor elapsed-time ceiling breached
    #[error("Chunking exceeded timeout of {limit:?} (elapsed {elapsed:?})")]
    Timeout { elapsed: Duration, limit: Duration },

    /// Resource governor chunk ceiling breached
    #[error("Exceeded maximum of {limit} chunks per file (reached {count})")]
    ChunkLimitExceeded { count: usize, limit: usize },

    /// No grammar or parser is available for the language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Grammar description could not be loaded
    #[error("Grammar error: {0}")]
    Grammar(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while reading a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl ChunkingError {
    /// Create a parse error carrying the language and underlying cause
    pub fn parse(language: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.to_string(),
        }
    }

    /// Create a binary file error
    pub fn binary(path: Option<&std::path::Path>) -> Self {
        Self::BinaryFile {
            path: path.map(|p| p.to_path_buf()),
        }
    }

    /// Create a grammar loading error
    pub fn grammar(msg: impl Into<String>) -> Self {
        Self::Grammar(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether a caller may retry with a larger budget.
    ///
    /// Only resource governor breaches qualify, and the retry is never
    /// automatic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ChunkLimitExceeded { .. })
    }

    /// Short stable name used as a stats and log key.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BinaryFile { .. } => "binary_file",
            Self::Parse { .. } => "parse",
            Self::AstDepthExceeded { .. } => "ast_depth_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::ChunkLimitExceeded { .. } => "chunk_limit_exceeded",
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::Grammar(_) => "grammar",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for ChunkingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Grammar(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_only_for_governor_breaches() {
        let timeout = ChunkingError::Timeout {
            elapsed: Duration::from_secs(31),
            limit: Duration::from_secs(30),
        };
        let limit = ChunkingError::ChunkLimitExceeded { count: 6, limit: 5 };

        assert!(timeout.is_retryable());
        assert!(limit.is_retryable());
        assert!(!ChunkingError::binary(None).is_retryable());
        assert!(!ChunkingError::parse("python", "bad input").is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = ChunkingError::parse("rust", "unexpected token");
        assert_eq!(err.to_string(), "Failed to parse rust content: unexpected token");
        assert_eq!(err.kind(), "parse");

        let err = ChunkingError::binary(Some(std::path::Path::new("a.bin")));
        assert_eq!(err.to_string(), "Binary content detected in a.bin");

        let err = ChunkingError::ChunkLimitExceeded { count: 6, limit: 5 };
        assert!(err.to_string().contains("Exceeded maximum"));
    }
}
