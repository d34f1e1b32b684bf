//! Concurrent chunking of many files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chunkers::{ChunkGovernor, SemanticChunker};
use crate::processing::Language;
use crate::types::{Chunk, ChunkingConfig};

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum files chunked concurrently
    pub concurrency: usize,
    /// Whether to continue on individual file failures
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::DEFAULT_MAX_CONCURRENT_FILES,
            continue_on_error: true,
        }
    }
}

impl BatchConfig {
    pub fn from_chunking_config(config: &ChunkingConfig) -> Self {
        Self {
            concurrency: config.max_concurrent_files,
            ..Default::default()
        }
    }
}

/// Result of batch processing.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub errors: Vec<BatchError>,
}

/// A file that could not be chunked.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub path: PathBuf,
    /// Short error kind, e.g. `binary_file` or `parse`
    pub kind: String,
    pub message: String,
}

/// In-memory file content to chunk.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

type Job = Box<dyn FnOnce(&SemanticChunker, &ChunkGovernor) -> crate::Result<Vec<Chunk>> + Send>;

/// Chunks many files concurrently through one shared chunker, so the
/// classification memo and dedup store are shared across the batch.
pub struct BatchProcessor {
    chunker: Arc<SemanticChunker>,
    governor: Arc<ChunkGovernor>,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(chunker: Arc<SemanticChunker>, governor: ChunkGovernor, config: BatchConfig) -> Self {
        Self {
            chunker,
            governor: Arc::new(governor),
            config,
        }
    }

    pub fn chunker(&self) -> &Arc<SemanticChunker> {
        &self.chunker
    }

    /// Chunk files read from disk.
    pub async fn process_paths(&self, paths: Vec<PathBuf>) -> Result<(Vec<Chunk>, BatchResult)> {
        let jobs = paths
            .into_iter()
            .map(|path| {
                let target = path.clone();
                let job: Job = Box::new(move |chunker, governor| chunker.chunk_file(&target, governor));
                (path, job)
            })
            .collect();
        self.process_jobs(jobs).await
    }

    /// Chunk in-memory file contents.
    pub async fn process_entries(&self, entries: Vec<FileEntry>) -> Result<(Vec<Chunk>, BatchResult)> {
        let jobs = entries
            .into_iter()
            .map(|entry| {
                let path = entry.path.clone();
                let job: Job = Box::new(move |chunker, governor| {
                    chunker.chunk(&entry.content, Some(&entry.path), governor)
                });
                (path, job)
            })
            .collect();
        self.process_jobs(jobs).await
    }

    /// Chunk files from disk, sending each file's chunks as soon as they
    /// are ready.
    pub async fn process_paths_streaming(
        &self,
        paths: Vec<PathBuf>,
        sender: mpsc::Sender<Vec<Chunk>>,
    ) -> Result<BatchResult> {
        let mut result = BatchResult {
            total_files: paths.len(),
            ..Default::default()
        };
        let mut outcomes = self.outcomes(
            paths
                .into_iter()
                .map(|path| {
                    let target = path.clone();
                    let job: Job = Box::new(move |chunker, governor| chunker.chunk_file(&target, governor));
                    (path, job)
                })
                .collect(),
        );

        while let Some((path, outcome)) = outcomes.next().await {
            let chunks = self.settle(&mut result, &path, outcome)?;
            if chunks.is_empty() {
                continue;
            }
            if sender.send(chunks).await.is_err() {
                warn!("Receiver dropped, stopping batch processing");
                break;
            }
        }
        Ok(result)
    }

    fn outcomes(
        &self,
        jobs: Vec<(PathBuf, Job)>,
    ) -> impl futures::Stream<Item = (PathBuf, std::result::Result<crate::Result<Vec<Chunk>>, tokio::task::JoinError>)> + '_
    {
        stream::iter(jobs.into_iter().map(move |(path, job)| {
            let chunker = Arc::clone(&self.chunker);
            let governor = Arc::clone(&self.governor);
            async move {
                let outcome = tokio::task::spawn_blocking(move || job(&chunker, &governor)).await;
                (path, outcome)
            }
        }))
        .buffered(self.config.concurrency.max(1))
    }

    async fn process_jobs(&self, jobs: Vec<(PathBuf, Job)>) -> Result<(Vec<Chunk>, BatchResult)> {
        let mut result = BatchResult {
            total_files: jobs.len(),
            ..Default::default()
        };
        info!(total_files = result.total_files, "Starting batch processing");

        let mut all_chunks = Vec::new();
        let mut outcomes = self.outcomes(jobs);
        while let Some((path, outcome)) = outcomes.next().await {
            all_chunks.extend(self.settle(&mut result, &path, outcome)?);
        }

        info!(
            processed = result.processed_files,
            failed = result.failed_files,
            chunks = result.total_chunks,
            "Batch processing complete"
        );
        Ok((all_chunks, result))
    }

    /// Fold one file's outcome into the result. Fails only when errors
    /// should stop the batch.
    fn settle(
        &self,
        result: &mut BatchResult,
        path: &Path,
        outcome: std::result::Result<crate::Result<Vec<Chunk>>, tokio::task::JoinError>,
    ) -> Result<Vec<Chunk>> {
        let failure = match outcome {
            Ok(Ok(chunks)) => {
                debug!(path = %path.display(), chunks = chunks.len(), "File chunked");
                result.processed_files += 1;
                result.total_chunks += chunks.len();
                return Ok(chunks);
            }
            Ok(Err(e)) => BatchError {
                path: path.to_path_buf(),
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
            Err(join) => BatchError {
                path: path.to_path_buf(),
                kind: "task".to_string(),
                message: join.to_string(),
            },
        };

        result.failed_files += 1;
        warn!(path = %path.display(), kind = %failure.kind, error = %failure.message, "Failed to process file");
        if !self.config.continue_on_error {
            return Err(anyhow!(failure.message.clone()))
                .with_context(|| format!("failed to chunk {}", path.display()));
        }
        result.errors.push(failure);
        Ok(Vec::new())
    }
}

/// Detect the language of a file from its name.
pub fn detect_language(path: &Path) -> Language {
    Language::detect(path, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(continue_on_error: bool) -> BatchProcessor {
        BatchProcessor::new(
            Arc::new(SemanticChunker::default()),
            ChunkGovernor::with_limit(512),
            BatchConfig {
                concurrency: 2,
                continue_on_error,
            },
        )
    }

    #[tokio::test]
    async fn test_process_paths_collects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.py");
        let binary = dir.path().join("blob.py");
        let missing = dir.path().join("missing.py");
        std::fs::write(&good, "import os\n\ndef main():\n    return os.getcwd()\n").unwrap();
        std::fs::write(&binary, b"a\0b\n").unwrap();

        let (chunks, result) = processor(true)
            .process_paths(vec![good.clone(), binary.clone(), missing])
            .await
            .unwrap();

        assert_eq!(result.total_files, 3);
        assert_eq!(result.processed_files, 1);
        assert_eq!(result.failed_files, 2);
        assert_eq!(result.total_chunks, chunks.len());
        assert!(chunks.iter().all(|c| c.file_path.as_deref() == Some(good.as_path())));

        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["binary_file", "io"]);
        assert_eq!(result.errors[0].path, binary);
    }

    #[tokio::test]
    async fn test_stop_on_first_error() {
        let entries = vec![
            FileEntry::new("bad.py", "x\0y\n"),
            FileEntry::new("good.py", "a = 1\nb = 2\n"),
        ];
        let err = processor(false).process_entries(entries).await.unwrap_err();
        assert!(err.to_string().contains("bad.py"));
    }

    #[tokio::test]
    async fn test_batch_shares_dedup_store() {
        let source = "import os\n\ndef main():\n    return os.getcwd()\n";
        let entries = vec![FileEntry::new("a.py", source), FileEntry::new("b.py", source)];

        let (chunks, result) = processor(true).process_entries(entries).await.unwrap();

        assert_eq!(result.processed_files, 2);
        assert!(!chunks.is_empty());
        let first = chunks[0].file_path.clone();
        assert!(chunks.iter().all(|c| c.file_path == first));
    }

    #[tokio::test]
    async fn test_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        std::fs::write(&file, "use std::fmt;\n\nfn main() {}\n").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let result = processor(true)
            .process_paths_streaming(vec![file], tx)
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(result.processed_files, 1);
        assert!(!received.is_empty());
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Language::Rust);
        assert_eq!(detect_language(Path::new("app/App.tsx")), Language::TypeScriptReact);
        assert_eq!(detect_language(Path::new("README")), Language::Unknown);
    }
}
