//! Cooperative time and chunk-count ceilings for one chunking call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::{ChunkingError, Result};
use crate::types::ChunkingConfig;

/// Elapsed-time and chunk-count limits, polled between nodes.
#[derive(Debug)]
pub struct ResourceGovernor {
    timeout: Duration,
    max_chunks: usize,
    chunk_count: AtomicUsize,
}

impl ResourceGovernor {
    pub fn new(timeout: Duration, max_chunks: usize) -> Self {
        Self {
            timeout,
            max_chunks,
            chunk_count: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_timeout(), config.max_chunks_per_file)
    }

    /// Start a governed operation. The count resets when the guard drops.
    pub fn enter(&self) -> ResourceGuard<'_> {
        self.chunk_count.store(0, Ordering::SeqCst);
        ResourceGuard {
            governor: self,
            started: Instant::now(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }
}

/// Scope of one governed operation.
#[derive(Debug)]
pub struct ResourceGuard<'a> {
    governor: &'a ResourceGovernor,
    started: Instant,
}

impl ResourceGuard<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the operation has run past the timeout.
    pub fn check_timeout(&self) -> Result<()> {
        let elapsed = self.elapsed();
        if elapsed > self.governor.timeout {
            return Err(ChunkingError::Timeout {
                elapsed,
                limit: self.governor.timeout,
            });
        }
        Ok(())
    }

    /// Count one emitted chunk, failing once the count exceeds the maximum.
    pub fn register_chunk(&self) -> Result<()> {
        let count = self.governor.chunk_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.governor.max_chunks {
            return Err(ChunkingError::ChunkLimitExceeded {
                count,
                limit: self.governor.max_chunks,
            });
        }
        Ok(())
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.governor.chunk_count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_limit() {
        let governor = ResourceGovernor::new(Duration::from_secs(30), 5);
        let guard = governor.enter();
        for _ in 0..5 {
            guard.register_chunk().unwrap();
        }
        let err = guard.register_chunk().unwrap_err();
        assert!(matches!(err, ChunkingError::ChunkLimitExceeded { count: 6, limit: 5 }));
    }

    #[test]
    fn test_timeout() {
        let governor = ResourceGovernor::new(Duration::ZERO, 10);
        let guard = governor.enter();
        std::thread::sleep(Duration::from_millis(2));
        let err = guard.check_timeout().unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_guard_resets_count_on_drop() {
        let governor = ResourceGovernor::new(Duration::from_secs(30), 5);
        {
            let guard = governor.enter();
            guard.register_chunk().unwrap();
            guard.register_chunk().unwrap();
            assert_eq!(governor.chunk_count(), 2);
        }
        assert_eq!(governor.chunk_count(), 0);
    }
}
