//! Classification-guided AST chunker.
//!
//! One call handles one file:
//!
//! 1. Edge cases are settled before parsing: empty content yields nothing,
//!    whitespace-only and single-line content yield one text chunk, and a
//!    null byte rejects the file as binary.
//! 2. The root's direct children are selected by classification and
//!    importance. Each selected node that fits the token budget becomes one
//!    chunk.
//! 3. Oversized containers are decomposed over their children. Low-value
//!    glue (keywords, punctuation) is merged into a neighbouring chunk when
//!    the budget allows. A node with nothing chunkable below it is emitted
//!    whole as a partial fallback chunk.
//! 4. Chunks whose stripped content was already seen are dropped, and the
//!    survivors are tagged with a batch id and retained for lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::base::{default_counter, estimate_tokens, Chunker, TokenCounter};
use super::dedup::{content_hash, BatchStore, DedupStore};
use super::governor::ChunkGovernor;
use super::resource::{ResourceGovernor, ResourceGuard};
use super::stats::{ChunkerStats, StatsSnapshot};
use crate::ast_engine::{NodeId, SourceParser, SyntaxTree, TreeSitterParser};
use crate::error::{ChunkingError, Result};
use crate::processing::Language;
use crate::semantic::{ClassificationContext, ClassificationResult, SemanticClassifier};
use crate::types::{Chunk, ChunkContext, ChunkMetadata, ChunkSource, ChunkingConfig, LineRange, SemanticMeta};

const CHUNKER_TYPE: &str = "semantic";
const EDGE_WHITESPACE_ONLY: &str = "whitespace_only";
const EDGE_SINGLE_LINE: &str = "single_line";

/// Contiguous byte and line span of source text.
#[derive(Debug, Clone, Copy)]
struct Span {
    start_byte: usize,
    end_byte: usize,
    start_line: usize,
    end_line: usize,
}

impl Span {
    fn of(tree: &SyntaxTree, node: NodeId) -> Self {
        let n = tree.node(node);
        Self {
            start_byte: n.start_byte,
            end_byte: n.end_byte,
            start_line: n.start_line,
            end_line: n.end_line,
        }
    }

    fn merge(self, other: Span) -> Self {
        Self {
            start_byte: self.start_byte.min(other.start_byte),
            end_byte: self.end_byte.max(other.end_byte),
            start_line: self.start_line.min(other.start_line),
            end_line: self.end_line.max(other.end_line),
        }
    }

    fn tokens(&self, source: &str) -> usize {
        estimate_tokens(source.get(self.start_byte..self.end_byte).unwrap_or(""))
    }
}

/// Classification of one concrete node.
#[derive(Debug, Clone)]
struct NodeInfo {
    classification: Option<ClassificationResult>,
    is_composite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftKind {
    Node,
    Fallback,
    Glue,
}

/// A chunk before its text is materialized; glue may still extend it.
#[derive(Debug)]
struct Draft {
    span: Span,
    node: NodeId,
    depth: usize,
    kind: DraftKind,
    /// Bytes of merged-in glue nodes
    glue_bytes: usize,
}

impl Draft {
    fn new(span: Span, node: NodeId, depth: usize, kind: DraftKind) -> Self {
        Self {
            span,
            node,
            depth,
            kind,
            glue_bytes: 0,
        }
    }
}

/// Chunks source files along classified syntax nodes.
pub struct SemanticChunker {
    config: ChunkingConfig,
    classifier: Arc<SemanticClassifier>,
    parser: Arc<dyn SourceParser>,
    dedup: Arc<DedupStore>,
    batches: Arc<BatchStore>,
    stats: Arc<ChunkerStats>,
    token_counter: Arc<dyn TokenCounter>,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::build(ChunkingConfig::default())
    }
}

impl SemanticChunker {
    /// Create a chunker with the tree-sitter parser and shared grammars.
    /// Fails if the configuration does not validate.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ChunkingConfig) -> Self {
        Self {
            dedup: Arc::new(DedupStore::new(config.dedup_capacity)),
            batches: Arc::new(BatchStore::new(config.batch_store_capacity)),
            classifier: Arc::new(SemanticClassifier::default()),
            parser: Arc::new(TreeSitterParser::new()),
            stats: Arc::new(ChunkerStats::new()),
            token_counter: default_counter(),
            config,
        }
    }

    /// Use a different parser collaborator.
    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<SemanticClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a different counter for the reported `token_count`. Budget
    /// decisions always use the estimate.
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }

    /// Share a dedup store with other chunkers.
    pub fn with_dedup_store(mut self, dedup: Arc<DedupStore>) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Arc<SemanticClassifier> {
        &self.classifier
    }

    pub fn dedup_store(&self) -> &Arc<DedupStore> {
        &self.dedup
    }

    /// Chunks emitted under a batch id, while still retained.
    pub fn batch(&self, batch_id: &Uuid) -> Option<Arc<Vec<Chunk>>> {
        self.batches.get(batch_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Read and chunk a file from disk. Invalid UTF-8 is treated as binary.
    pub fn chunk_file(&self, path: &Path, governor: &ChunkGovernor) -> Result<Vec<Chunk>> {
        let bytes = std::fs::read(path)?;
        match String::from_utf8(bytes) {
            Ok(content) => self.chunk(&content, Some(path), governor),
            Err(_) => {
                self.stats.record_skipped(&extension_key(Some(path)));
                Err(ChunkingError::binary(Some(path)))
            }
        }
    }

    /// Chunk content, detecting the language from the path.
    pub fn chunk(&self, content: &str, file_path: Option<&Path>, governor: &ChunkGovernor) -> Result<Vec<Chunk>> {
        let language = file_path
            .map(|p| Language::detect(p, Some(content)))
            .unwrap_or(Language::Unknown);
        self.chunk_with_language(content, file_path, language, governor)
    }

    /// Chunk content in a known language.
    pub fn chunk_with_language(
        &self,
        content: &str,
        file_path: Option<&Path>,
        language: Language,
        governor: &ChunkGovernor,
    ) -> Result<Vec<Chunk>> {
        let started = Instant::now();
        let extension = extension_key(file_path);
        let file = file_path.map(|p| p.display().to_string()).unwrap_or_default();

        let drafted = match self.run(content, file_path, language, governor) {
            Ok(chunks) => chunks,
            Err(e) => {
                match e {
                    ChunkingError::BinaryFile { .. }
                    | ChunkingError::Parse { .. }
                    | ChunkingError::UnsupportedLanguage(_) => self.stats.record_skipped(&extension),
                    _ => self.stats.record_error(&extension),
                }
                warn!(file = %file, language = %language, error = %e, "Chunking failed");
                return Err(e);
            }
        };

        let total = drafted.len();
        let batch_id = Uuid::new_v4();
        let mut chunks = self.deduplicate(drafted, batch_id);
        let duplicates = total - chunks.len();
        for chunk in &mut chunks {
            chunk.metadata.batch_id = Some(batch_id);
        }
        if !chunks.is_empty() {
            self.batches.store(batch_id, chunks.clone());
        }
        self.stats.record_processed(&extension, chunks.len(), duplicates);

        let avg_chunk_size = if chunks.is_empty() {
            0
        } else {
            chunks.iter().map(Chunk::len).sum::<usize>() / chunks.len()
        };
        let total_tokens: usize = chunks
            .iter()
            .filter_map(|c| c.metadata.context.token_count)
            .sum();
        info!(
            file = %file,
            language = %language,
            chunk_count = chunks.len(),
            duplicates,
            total_tokens,
            tokenizer = self.token_counter.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            avg_chunk_size,
            "chunking_completed"
        );
        Ok(chunks)
    }

    fn run(
        &self,
        content: &str,
        file_path: Option<&Path>,
        language: Language,
        governor: &ChunkGovernor,
    ) -> Result<Vec<Chunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }
        if content.trim().is_empty() {
            let lines = content.matches('\n').count() + 1;
            let range = LineRange::new(1, lines);
            let chunk = self.edge_case_chunk(content, range, file_path, language, EDGE_WHITESPACE_ONLY);
            return Ok(vec![chunk]);
        }
        if content.contains('\0') {
            return Err(ChunkingError::binary(file_path));
        }
        if !content.contains('\n') {
            let range = LineRange::new(1, 1);
            let chunk = self.edge_case_chunk(content, range, file_path, language, EDGE_SINGLE_LINE);
            return Ok(vec![chunk]);
        }

        let resources = ResourceGovernor::from_config(&self.config);
        let guard = resources.enter();

        let tree = self.parser.parse(content, language).map_err(|e| match e {
            ChunkingError::UnsupportedLanguage(_) | ChunkingError::Parse { .. } => e,
            other => ChunkingError::parse(language.as_str(), other),
        })?;
        if tree.has_errors() {
            debug!(language = %language, "Parser recovered from syntax errors");
        }

        let mut file = FileChunker {
            chunker: self,
            tree: &tree,
            language,
            file_path,
            guard: &guard,
            budget: governor.chunk_limit(),
            drafts: Vec::new(),
        };
        file.select()?;
        Ok(file.finish())
    }

    fn edge_case_chunk(
        &self,
        content: &str,
        range: LineRange,
        file_path: Option<&Path>,
        language: Language,
        edge_case: &str,
    ) -> Chunk {
        let name = format!("{} - {} - Line 1", language.display_name(), edge_case);
        Chunk::new(content.to_string(), range, language, ChunkSource::TextBlock)
            .with_file_path(file_path.map(Path::to_path_buf))
            .with_metadata(
                ChunkMetadata::named(name).with_context(
                    ChunkContext::for_chunker(CHUNKER_TYPE)
                        .with_edge_case(edge_case)
                        .with_hash(content_hash(content))
                        .with_token_count(self.token_counter.count_tokens(content), self.token_counter.name()),
                ),
            )
    }

    /// Drop chunks whose content hash is already registered.
    fn deduplicate(&self, chunks: Vec<Chunk>, batch_id: Uuid) -> Vec<Chunk> {
        chunks
            .into_iter()
            .filter(|chunk| {
                // Edge-case chunks carry no code worth deduplicating.
                if chunk.metadata.context.edge_case.is_some() {
                    return true;
                }
                let Some(hash) = chunk.content_hash() else {
                    return true;
                };
                let fresh = self.dedup.insert_if_absent(hash, batch_id);
                if !fresh {
                    debug!(name = %chunk.metadata.name, hash = %hash, "Dropping duplicate chunk");
                }
                fresh
            })
            .collect()
    }

    fn is_chunkable(&self, info: &NodeInfo) -> bool {
        match &info.classification {
            None => info.is_composite,
            Some(result) => result
                .classification()
                .importance()
                .any_at_least(self.config.importance_threshold),
        }
    }
}

impl Chunker for SemanticChunker {
    fn name(&self) -> &'static str {
        CHUNKER_TYPE
    }

    fn chunk(&self, content: &str, file_path: Option<&Path>, governor: &ChunkGovernor) -> Result<Vec<Chunk>> {
        SemanticChunker::chunk(self, content, file_path, governor)
    }

    fn supports_language(&self, language: Language) -> bool {
        self.parser.supports(language)
    }

    fn description(&self) -> &'static str {
        "Grammar-aware chunker that cuts along classified syntax nodes"
    }
}

/// File extension used as the stats key.
fn extension_key(file_path: Option<&Path>) -> String {
    file_path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "none".to_string())
}

/// State for chunking one parsed file.
struct FileChunker<'a> {
    chunker: &'a SemanticChunker,
    tree: &'a SyntaxTree,
    language: Language,
    file_path: Option<&'a Path>,
    guard: &'a ResourceGuard<'a>,
    budget: usize,
    drafts: Vec<Draft>,
}

impl<'a> FileChunker<'a> {
    fn check_depth(&self, depth: usize) -> Result<()> {
        let max_depth = self.chunker.config.max_ast_depth;
        if depth > max_depth {
            return Err(ChunkingError::AstDepthExceeded { depth, max_depth });
        }
        Ok(())
    }

    fn info(&self, node: NodeId) -> NodeInfo {
        let tree = self.tree;
        let kind = tree.node(node).kind.as_str();
        let parent = tree.parent(node);
        let sibling_kinds: Vec<&str> = parent
            .map(|p| tree.children(p))
            .unwrap_or(&[])
            .iter()
            .filter(|s| **s != node && tree.node(**s).is_named)
            .map(|s| tree.node(*s).kind.as_str())
            .collect();
        let context = ClassificationContext {
            parent_kind: parent.map(|p| tree.node(p).kind.as_str()),
            sibling_kinds,
            file_path: self.file_path,
        };

        NodeInfo {
            classification: self
                .chunker
                .classifier
                .classify_with_context(kind, self.language, &context),
            is_composite: !tree.node(node).is_leaf(),
        }
    }

    fn push(&mut self, draft: Draft) -> Result<()> {
        self.guard.register_chunk()?;
        self.drafts.push(draft);
        Ok(())
    }

    /// Walk the root's direct children, emitting chunkable ones.
    fn select(&mut self) -> Result<()> {
        let Some(root) = self.tree.root() else {
            return Ok(());
        };
        let top: Vec<NodeId> = match self.tree.children(root) {
            [] => vec![root],
            children => children.to_vec(),
        };

        for node in top {
            self.guard.check_timeout()?;
            let depth = self.tree.depth(node);
            self.check_depth(depth)?;

            let info = self.info(node);
            if !self.chunker.is_chunkable(&info) {
                continue;
            }
            self.emit(node, &info, depth)?;
        }
        Ok(())
    }

    /// Emit a chunkable node whole if it fits, otherwise decompose it.
    fn emit(&mut self, node: NodeId, info: &NodeInfo, depth: usize) -> Result<()> {
        let span = Span::of(self.tree, node);
        if span.tokens(self.tree.source()) <= self.budget {
            return self.push(Draft::new(span, node, depth, DraftKind::Node));
        }
        if info.is_composite {
            return self.decompose(node, depth);
        }
        self.push(Draft::new(span, node, depth, DraftKind::Fallback))
    }

    fn decompose(&mut self, node: NodeId, depth: usize) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(node);
        let infos: Vec<NodeInfo> = children.iter().map(|c| self.info(*c)).collect();

        let node_span = Span::of(tree, node);
        if !infos.iter().any(|i| self.chunker.is_chunkable(i)) {
            return self.push(Draft::new(node_span, node, depth, DraftKind::Fallback));
        }

        let source = tree.source();
        let first_draft = self.drafts.len();
        // Merged span, first node and glue byte count of not-yet-placed glue.
        let mut pending_glue: Option<(Span, NodeId, usize)> = None;
        // Draft index the previous sibling produced, if glue may extend it.
        let mut adjacent: Option<usize> = None;

        for (child, info) in children.iter().copied().zip(infos) {
            self.guard.check_timeout()?;
            let child_depth = depth + 1;
            self.check_depth(child_depth)?;
            let span = Span::of(tree, child);
            let child_bytes = tree.node(child).byte_len();

            if !self.chunker.is_chunkable(&info) {
                if let Some(idx) = adjacent {
                    let merged = self.drafts[idx].span.merge(span);
                    if merged.tokens(source) <= self.budget {
                        self.drafts[idx].span = merged;
                        self.drafts[idx].glue_bytes += child_bytes;
                        continue;
                    }
                }
                adjacent = None;
                pending_glue = Some(match pending_glue {
                    Some((glue, first, bytes)) => (glue.merge(span), first, bytes + child_bytes),
                    None => (span, child, child_bytes),
                });
                continue;
            }

            if span.tokens(source) <= self.budget {
                let mut draft = Draft::new(span, child, child_depth, DraftKind::Node);
                if let Some((glue, first, bytes)) = pending_glue.take() {
                    let merged = glue.merge(span);
                    if merged.tokens(source) <= self.budget {
                        draft.span = merged;
                        draft.glue_bytes = bytes;
                    } else {
                        self.push_glue(glue, first, child_depth)?;
                    }
                }
                self.push(draft)?;
                adjacent = Some(self.drafts.len() - 1);
                continue;
            }

            if let Some((glue, first, _)) = pending_glue.take() {
                self.push_glue(glue, first, child_depth)?;
            }
            adjacent = None;
            self.emit(child, &info, child_depth)?;
        }

        if let Some((glue, first, _)) = pending_glue {
            self.push_glue(glue, first, depth + 1)?;
        }
        self.close_gaps(first_draft, node_span);
        Ok(())
    }

    /// Stretch the drafts produced for one decomposed node so their line
    /// ranges tile the node's range. Gaps between children hold only
    /// whitespace.
    fn close_gaps(&mut self, from: usize, node_span: Span) {
        let tree = self.tree;
        let Some(last) = self.drafts.len().checked_sub(1).filter(|last| *last >= from) else {
            return;
        };

        let first = &mut self.drafts[from].span;
        if first.start_line > node_span.start_line {
            first.start_line = node_span.start_line;
            first.start_byte = first.start_byte.min(node_span.start_byte);
        }

        for idx in from..last {
            let next_line = self.drafts[idx + 1].span.start_line;
            let span = &mut self.drafts[idx].span;
            if next_line > span.end_line + 1 {
                span.end_line = next_line - 1;
                if let Some(byte) = tree.line_start(next_line) {
                    span.end_byte = span.end_byte.max(byte);
                }
            }
        }

        let tail = &mut self.drafts[last].span;
        if tail.end_line < node_span.end_line {
            tail.end_line = node_span.end_line;
            tail.end_byte = tail.end_byte.max(node_span.end_byte);
        }
    }

    fn push_glue(&mut self, span: Span, node: NodeId, depth: usize) -> Result<()> {
        if self.slice(span).trim().is_empty() {
            return Ok(());
        }
        self.push(Draft::new(span, node, depth, DraftKind::Glue))
    }

    fn slice(&self, span: Span) -> &'a str {
        self.tree.source().get(span.start_byte..span.end_byte).unwrap_or("")
    }

    /// Materialize drafts into chunks, skipping any without text.
    fn finish(mut self) -> Vec<Chunk> {
        let drafts = std::mem::take(&mut self.drafts);
        let mut chunks = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let content = self.slice(draft.span);
            if content.trim().is_empty() {
                continue;
            }
            chunks.push(self.materialize(&draft, content));
        }
        chunks
    }

    /// Node a chunk is attributed to. A token padded with glue, or a child
    /// outweighed by its glue, is a fragment of the decomposed parent (a
    /// class header, say), so the parent names and classifies it.
    fn attribution(&self, draft: &Draft) -> (NodeId, bool) {
        let child = self.tree.node(draft.node);
        let fragment = draft.kind == DraftKind::Node
            && draft.glue_bytes > 0
            && (child.is_leaf() || draft.glue_bytes >= child.byte_len());
        match self.tree.parent(draft.node).filter(|_| fragment) {
            Some(parent) => (parent, true),
            None => (draft.node, false),
        }
    }

    fn materialize(&self, draft: &Draft, content: &str) -> Chunk {
        let (anchor, fragment) = self.attribution(draft);
        let node = self.tree.node(anchor);
        let range = LineRange::new(draft.span.start_line, draft.span.end_line);
        let name = format!(
            "{} - {} - Line {}",
            self.language.display_name(),
            node.kind,
            range.start
        );

        let counter = &self.chunker.token_counter;
        let mut context = ChunkContext::for_chunker(CHUNKER_TYPE)
            .with_hash(content_hash(content))
            .with_token_count(counter.count_tokens(content), counter.name());
        context.kind = Some(node.kind.clone());
        context.nesting_level = Some(if fragment { draft.depth.saturating_sub(1) } else { draft.depth });
        context.is_composite = Some(!node.is_leaf());
        context.is_partial_node = fragment;
        let mut metadata = ChunkMetadata::named(name);

        let source = match draft.kind {
            DraftKind::Glue => ChunkSource::TextBlock,
            DraftKind::Fallback => {
                context.is_partial_node = true;
                context.oversized_fallback = true;
                ChunkSource::Fallback
            }
            DraftKind::Node => ChunkSource::AstNode,
        };

        if draft.kind != DraftKind::Glue {
            if let Some(result) = self.info(anchor).classification {
                let class = result.classification();
                let importance = class.importance();
                context.classification = Some(class.as_str().to_string());
                context.category = Some(result.rank().as_str().to_string());
                context.importance_scores = Some(importance);
                context.task_score = Some(importance.weighted(self.chunker.config.agent_task));
                metadata = metadata.with_semantic_meta(semantic_meta(&node.kind, &result));
            }
        }

        Chunk::new(content.to_string(), range, self.language, source)
            .with_file_path(self.file_path.map(PathBuf::from))
            .with_metadata(metadata.with_context(context))
    }
}

fn semantic_meta(kind_name: &str, result: &ClassificationResult) -> SemanticMeta {
    let mut alternates: Vec<String> = result
        .alternates()
        .keys()
        .map(|c| c.as_str().to_string())
        .collect();
    alternates.sort();
    SemanticMeta {
        kind_name: kind_name.to_string(),
        classification: result.classification().as_str().to_string(),
        rank: result.rank().tier(),
        confidence: result.confidence(),
        method: result.method().as_str().to_string(),
        evidence: result.evidence().iter().map(|e| e.as_str().to_string()).collect(),
        alternates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkers::EstimatingCounter;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Parser returning a prepared tree and counting calls.
    struct FixedParser {
        tree: SyntaxTree,
        calls: AtomicUsize,
    }

    impl FixedParser {
        fn new(tree: SyntaxTree) -> Arc<Self> {
            Arc::new(Self {
                tree,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SourceParser for FixedParser {
        fn parse(&self, _source: &str, _language: Language) -> Result<SyntaxTree> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tree.clone())
        }

        fn supports(&self, _language: Language) -> bool {
            true
        }
    }

    struct FailingParser;

    impl SourceParser for FailingParser {
        fn parse(&self, _source: &str, language: Language) -> Result<SyntaxTree> {
            Err(ChunkingError::parse(language.as_str(), "grammar crashed"))
        }

        fn supports(&self, _language: Language) -> bool {
            true
        }
    }

    fn find(source: &str, needle: &str) -> (usize, usize) {
        let start = source.find(needle).unwrap();
        (start, start + needle.len())
    }

    /// `import os` followed by a small class with one method.
    fn small_module() -> (String, SyntaxTree) {
        let source = "import os\n\nclass Greeter:\n    def greet(self):\n        return os.name\n".to_string();
        let mut tree = SyntaxTree::new(source.clone(), Language::Python);
        let root = tree.push(None, "module", true, 0, source.len());

        let (s, e) = find(&source, "import os");
        tree.push(Some(root), "import_statement", true, s, e);

        let (class_start, _) = find(&source, "class Greeter");
        let class = tree.push(Some(root), "class_definition", true, class_start, source.len() - 1);
        let (s, e) = find(&source, "class");
        tree.push(Some(class), "class", false, s, e);
        let (s, e) = find(&source, "Greeter");
        tree.push(Some(class), "identifier", true, s, e);
        tree.push(Some(class), ":", false, e, e + 1);
        let (def_start, _) = find(&source, "def greet");
        let body = tree.push(Some(class), "block", true, def_start, source.len() - 1);
        tree.push(Some(body), "function_definition", true, def_start, source.len() - 1);
        (source, tree)
    }

    /// A class whose single method has `lines` statements.
    fn class_with_huge_method(lines: usize) -> (String, SyntaxTree) {
        let mut source = String::from("class Big:\n    def huge(self):\n");
        let mut statements = Vec::new();
        for i in 0..lines {
            let start = source.len() + 8;
            source.push_str(&format!("        value_{i} = compute_something({i})\n"));
            statements.push((start, source.len() - 1));
        }
        let end = source.len() - 1;

        let mut tree = SyntaxTree::new(source.clone(), Language::Python);
        let root = tree.push(None, "module", true, 0, source.len());
        let class = tree.push(Some(root), "class_definition", true, 0, end);
        tree.push(Some(class), "class", false, 0, 5);
        tree.push(Some(class), "identifier", true, 6, 9);
        tree.push(Some(class), ":", false, 9, 10);

        let (def_start, _) = find(&source, "def huge");
        let outer = tree.push(Some(class), "block", true, def_start, end);
        let function = tree.push(Some(outer), "function_definition", true, def_start, end);
        tree.push(Some(function), "def", false, def_start, def_start + 3);
        let (s, e) = find(&source, "huge");
        tree.push(Some(function), "identifier", true, s, e);
        let (s, e) = find(&source, "(self)");
        let params = tree.push(Some(function), "parameters", true, s, e);
        tree.push(Some(params), "(", false, s, s + 1);
        tree.push(Some(params), "identifier", true, s + 1, e - 1);
        tree.push(Some(params), ")", false, e - 1, e);
        tree.push(Some(function), ":", false, e, e + 1);

        let inner = tree.push(Some(function), "block", true, statements[0].0, end);
        for (s, e) in statements {
            tree.push(Some(inner), "expression_statement", true, s, e);
        }
        (source, tree)
    }

    fn chunker_with(parser: Arc<dyn SourceParser>) -> SemanticChunker {
        SemanticChunker::default().with_parser(parser)
    }

    #[test]
    fn test_empty_content() {
        let chunker = SemanticChunker::default();
        let chunks = chunker.chunk("", Some(Path::new("a.py")), &ChunkGovernor::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_whitespace_only() {
        let chunker = SemanticChunker::default();
        let chunks = chunker
            .chunk("   \n\t  ", Some(Path::new("a.py")), &ChunkGovernor::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.context.edge_case.as_deref(), Some("whitespace_only"));
        assert_eq!(chunks[0].line_range, LineRange::new(1, 2));
        assert_eq!(chunks[0].source, ChunkSource::TextBlock);
    }

    #[test]
    fn test_single_line_skips_parser() {
        let (_, tree) = small_module();
        let parser = FixedParser::new(tree);
        let chunker = chunker_with(parser.clone());

        let chunks = chunker
            .chunk("x = 1", Some(Path::new("a.py")), &ChunkGovernor::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.context.edge_case.as_deref(), Some("single_line"));
        assert_eq!(chunks[0].line_range, LineRange::new(1, 1));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_binary_content() {
        let chunker = SemanticChunker::default();
        let err = chunker
            .chunk("abc\0def\n", Some(Path::new("blob.bin")), &ChunkGovernor::default())
            .unwrap_err();

        assert!(matches!(err, ChunkingError::BinaryFile { .. }));
        assert_eq!(chunker.stats().by_extension["bin"].skipped, 1);
    }

    #[test]
    fn test_parse_failure_is_skipped() {
        let chunker = chunker_with(Arc::new(FailingParser));
        let err = chunker
            .chunk("a = 1\nb = 2\n", Some(Path::new("a.py")), &ChunkGovernor::default())
            .unwrap_err();

        assert_eq!(err.kind(), "parse");
        assert_eq!(chunker.stats().files_skipped(), 1);
    }

    #[test]
    fn test_selects_top_level_nodes() {
        let (source, tree) = small_module();
        let chunker = chunker_with(FixedParser::new(tree));
        let chunks = chunker
            .chunk(&source, Some(Path::new("greeter.py")), &ChunkGovernor::with_limit(500))
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "import os");
        assert_eq!(chunks[0].metadata.name, "Python - import_statement - Line 1");
        assert_eq!(
            chunks[0].metadata.context.classification.as_deref(),
            Some("boundary_module")
        );

        let class = &chunks[1];
        assert_eq!(class.line_range, LineRange::new(3, 5));
        assert_eq!(class.source, ChunkSource::AstNode);
        assert_eq!(class.metadata.context.classification.as_deref(), Some("definition_type"));
        assert_eq!(class.metadata.context.category.as_deref(), Some("primary_definitions"));
        assert!(class.metadata.context.importance_scores.is_some());
        assert!(class.metadata.context.content_hash.is_some());
        assert_eq!(class.metadata.semantic_meta.as_ref().unwrap().rank, 1);

        let batch_id = class.metadata.batch_id.unwrap();
        assert!(chunks.iter().all(|c| c.metadata.batch_id == Some(batch_id)));
        assert_eq!(chunker.batch(&batch_id).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_content_dropped_on_second_pass() {
        let (source, tree) = small_module();
        let chunker = chunker_with(FixedParser::new(tree));
        let governor = ChunkGovernor::with_limit(500);

        let first = chunker.chunk(&source, Some(Path::new("a.py")), &governor).unwrap();
        let second = chunker.chunk(&source, Some(Path::new("b.py")), &governor).unwrap();

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(chunker.stats().duplicates_dropped, 2);
    }

    #[test]
    fn test_oversized_class_is_decomposed() {
        let (source, tree) = class_with_huge_method(300);
        assert!(estimate_tokens(&source) > 2000);
        let chunker = chunker_with(FixedParser::new(tree));

        let chunks = chunker
            .chunk(&source, Some(Path::new("big.py")), &ChunkGovernor::with_limit(500))
            .unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].content, "class Big:");
        assert!(chunks.iter().all(|c| c.token_estimate <= 500));
        assert!(chunks.iter().all(|c| !c.metadata.context.oversized_fallback));
        assert!(chunks
            .iter()
            .any(|c| c.metadata.context.kind.as_deref() == Some("expression_statement")));

        // Every line of the class is covered by some chunk.
        let total_lines = source.lines().count();
        for line in 1..=total_lines {
            assert!(
                chunks.iter().any(|c| c.line_range.contains(line)),
                "line {line} not covered"
            );
        }
    }

    fn service_class() -> String {
        let mut source = String::from("class Service:\n");
        for (i, name) in ["start", "stop", "reload"].iter().enumerate() {
            if i > 0 {
                source.push('\n');
            }
            source.push_str(&format!(
                "    def {name}(self, config):\n\
                 \x20       self.config = config\n\
                 \x20       self.{name}_count = self.{name}_count + 1\n\
                 \x20       self.handlers = [handler for handler in config.handlers]\n\
                 \x20       self.retries = config.retries or 3\n\
                 \x20       return self.{name}_count\n"
            ));
        }
        source
    }

    #[test]
    fn test_decomposed_ranges_span_blank_lines() {
        let source = service_class();
        assert!(estimate_tokens(&source) > 120);
        let chunker = SemanticChunker::default();
        let chunks = chunker
            .chunk(&source, Some(Path::new("service.py")), &ChunkGovernor::with_limit(120))
            .unwrap();

        assert!(chunks.len() >= 4);
        let total_lines = source.lines().count();
        let missing: Vec<usize> = (1..=total_lines)
            .filter(|line| !chunks.iter().any(|c| c.line_range.contains(*line)))
            .collect();
        assert_eq!(missing, Vec::<usize>::new());
        assert!(chunks.iter().all(|c| c.line_range.start <= c.line_range.end));
    }

    #[test]
    fn test_class_header_is_attributed_to_class() {
        let source = service_class();
        let chunker = SemanticChunker::default();
        let chunks = chunker
            .chunk(&source, Some(Path::new("service.py")), &ChunkGovernor::with_limit(120))
            .unwrap();

        let header = &chunks[0];
        assert_eq!(header.content, "class Service:");
        assert_eq!(header.metadata.name, "Python - class_definition - Line 1");
        assert_eq!(header.metadata.context.kind.as_deref(), Some("class_definition"));
        assert_eq!(
            header.metadata.context.classification.as_deref(),
            Some("definition_type")
        );
        assert!(header.metadata.context.is_partial_node);
        assert!(!header.metadata.context.oversized_fallback);

        let method = &chunks[1];
        assert_eq!(method.metadata.context.kind.as_deref(), Some("function_definition"));
        assert!(!method.metadata.context.is_partial_node);
    }

    /// Parser that takes longer than the one-second timeout.
    struct SlowParser(SyntaxTree);

    impl SourceParser for SlowParser {
        fn parse(&self, _source: &str, _language: Language) -> Result<SyntaxTree> {
            std::thread::sleep(std::time::Duration::from_millis(1100));
            Ok(self.0.clone())
        }

        fn supports(&self, _language: Language) -> bool {
            true
        }
    }

    #[test]
    fn test_timeout_aborts_file() {
        let (source, tree) = small_module();
        let config = ChunkingConfig::default().with_limits(1, 5000);
        let chunker = SemanticChunker::new(config).unwrap().with_parser(Arc::new(SlowParser(tree)));

        let err = chunker
            .chunk(&source, Some(Path::new("slow.py")), &ChunkGovernor::default())
            .unwrap_err();

        assert!(matches!(err, ChunkingError::Timeout { .. }));
        assert!(err.is_retryable());
        assert_eq!(chunker.stats().files_errored(), 1);
    }

    #[test]
    fn test_reports_counter_token_counts() {
        let (source, tree) = small_module();
        let chunker = chunker_with(FixedParser::new(tree)).with_token_counter(Arc::new(EstimatingCounter));
        let chunks = chunker
            .chunk(&source, Some(Path::new("greeter.py")), &ChunkGovernor::with_limit(500))
            .unwrap();

        assert_eq!(chunks[0].metadata.context.token_count, Some(estimate_tokens("import os")));
        assert_eq!(chunks[0].metadata.context.tokenizer.as_deref(), Some("estimate"));

        let default = SemanticChunker::default();
        let edge = default
            .chunk("x = 1", Some(Path::new("a.py")), &ChunkGovernor::default())
            .unwrap();
        assert!(edge[0].metadata.context.token_count.unwrap() > 0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = SemanticChunker::new(ChunkingConfig::default().with_limits(0, 10))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "invalid_config");
        assert!(SemanticChunker::new(ChunkingConfig::default().with_limits(10, 0)).is_err());
    }

    #[test]
    fn test_small_class_is_one_chunk() {
        let (source, tree) = class_with_huge_method(3);
        let chunker = chunker_with(FixedParser::new(tree));
        let chunks = chunker
            .chunk(&source, Some(Path::new("small.py")), &ChunkGovernor::with_limit(500))
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, source.trim_end());
    }

    #[test]
    fn test_oversized_leaf_falls_back_to_partial_chunk() {
        let body = "x".repeat(4000);
        let source = format!("# {body}\n# end\n");
        let mut tree = SyntaxTree::new(source.clone(), Language::Python);
        let root = tree.push(None, "module", true, 0, source.len());
        let first_end = source.find('\n').unwrap();
        tree.push(Some(root), "comment", true, 0, first_end);

        let chunker = chunker_with(FixedParser::new(tree));
        let chunks = chunker
            .chunk(&source, Some(Path::new("notes.py")), &ChunkGovernor::with_limit(100))
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, ChunkSource::Fallback);
        assert!(chunks[0].metadata.context.is_partial_node);
        assert!(chunks[0].metadata.context.oversized_fallback);
    }

    #[test]
    fn test_depth_guard() {
        let source = "a = 1\nb = 2\nc = 3\nd = 4\n".to_string();
        let mut tree = SyntaxTree::new(source.clone(), Language::Python);
        let mut parent = tree.push(None, "module", true, 0, source.len());
        for _ in 0..10 {
            parent = tree.push(Some(parent), "block", true, 0, source.len() - 1);
        }
        tree.push(Some(parent), "expression_statement", true, 0, 5);

        let config = ChunkingConfig::default().with_max_ast_depth(3);
        let chunker = SemanticChunker::new(config).unwrap().with_parser(FixedParser::new(tree));
        let err = chunker
            .chunk(&source, Some(Path::new("deep.py")), &ChunkGovernor::with_limit(1))
            .unwrap_err();

        assert!(matches!(err, ChunkingError::AstDepthExceeded { max_depth: 3, .. }));
        assert_eq!(chunker.stats().files_errored(), 1);
    }

    #[test]
    fn test_chunk_limit_aborts_file() {
        let source = "import a\nimport b\nimport c\n".to_string();
        let mut tree = SyntaxTree::new(source.clone(), Language::Python);
        let root = tree.push(None, "module", true, 0, source.len());
        for (i, line) in source.lines().enumerate() {
            let start = i * 9;
            tree.push(Some(root), "import_statement", true, start, start + line.len());
        }

        let config = ChunkingConfig::default().with_limits(30, 2);
        let chunker = SemanticChunker::new(config).unwrap().with_parser(FixedParser::new(tree));
        let err = chunker
            .chunk(&source, Some(Path::new("imports.py")), &ChunkGovernor::default())
            .unwrap_err();

        assert!(matches!(err, ChunkingError::ChunkLimitExceeded { count: 3, limit: 2 }));
    }

    #[test]
    fn test_tree_sitter_end_to_end() {
        let chunker = SemanticChunker::default();
        let source = "import os\n\n\ndef main():\n    print(os.getcwd())\n\n\nclass Config:\n    debug = False\n";
        let chunks = chunker
            .chunk(source, Some(Path::new("app.py")), &ChunkGovernor::default())
            .unwrap();

        let kinds: Vec<_> = chunks
            .iter()
            .filter_map(|c| c.metadata.context.kind.as_deref())
            .collect();
        assert_eq!(kinds, vec!["import_statement", "function_definition", "class_definition"]);
        assert_eq!(chunks[1].metadata.name, "Python - function_definition - Line 4");
        assert_eq!(
            chunks[1].metadata.context.classification.as_deref(),
            Some("definition_callable")
        );
    }

    #[test]
    fn test_chunk_file_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x10]).unwrap();

        let chunker = SemanticChunker::default();
        let err = chunker.chunk_file(&path, &ChunkGovernor::default()).unwrap_err();
        assert!(matches!(err, ChunkingError::BinaryFile { .. }));
    }
}
