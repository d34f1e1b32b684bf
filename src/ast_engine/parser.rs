//! Parsed syntax trees and the parser collaborator.
//!
//! Chunking works over a [`SyntaxTree`]: an arena of nodes holding the
//! source text, kind names, byte and line ranges and parent/child links.
//! [`TreeSitterParser`] produces one from the bundled grammars; any other
//! [`SourceParser`] can stand in for it.

use std::time::Duration;

use tracing::debug;
use tree_sitter::Parser;

use super::languages::tree_sitter_language;
use crate::error::{ChunkingError, Result};
use crate::processing::Language;

/// Index of a node in its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A node in a parsed tree.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: String,
    /// Named rule rather than an anonymous token
    pub is_named: bool,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }
}

/// Arena-backed syntax tree over an owned copy of the source.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    language: Language,
    nodes: Vec<SyntaxNode>,
    line_starts: Vec<usize>,
    has_errors: bool,
}

impl SyntaxTree {
    /// An empty tree over `source`. The first pushed node becomes the root.
    pub fn new(source: impl Into<String>, language: Language) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            language,
            nodes: Vec::new(),
            line_starts,
            has_errors: false,
        }
    }

    fn line_of(&self, byte: usize) -> usize {
        match self.line_starts.binary_search(&byte) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// Byte offset where 1-based `line` starts.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        line.checked_sub(1).and_then(|idx| self.line_starts.get(idx).copied())
    }

    /// Append a node spanning `start_byte..end_byte` under `parent`.
    pub fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: impl Into<String>,
        is_named: bool,
        start_byte: usize,
        end_byte: usize,
    ) -> NodeId {
        let end_byte = end_byte.clamp(start_byte, self.source.len());
        let start_line = self.line_of(start_byte);
        let end_line = self.line_of(end_byte.saturating_sub(1).max(start_byte));
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind: kind.into(),
            is_named,
            start_byte,
            end_byte,
            start_line,
            end_line,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    pub fn mark_errors(&mut self) {
        self.has_errors = true;
    }

    /// Whether the parser recovered from syntax errors.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    /// Source text covered by a node.
    pub fn text(&self, id: NodeId) -> &str {
        let node = self.node(id);
        self.source.get(node.start_byte..node.end_byte).unwrap_or("")
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    /// Number of ancestors above a node.
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.parent(id), |p| self.parent(*p)).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Produces syntax trees for source text.
pub trait SourceParser: Send + Sync {
    /// Parse `source`; fails with [`ChunkingError::Parse`] or
    /// [`ChunkingError::UnsupportedLanguage`].
    fn parse(&self, source: &str, language: Language) -> Result<SyntaxTree>;

    /// Whether this parser can handle the language.
    fn supports(&self, language: Language) -> bool;
}

/// Tree-sitter backed parser for the bundled grammars.
#[derive(Debug, Clone, Default)]
pub struct TreeSitterParser {
    timeout: Option<Duration>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort parses that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&self, source: &str, language: Language) -> Result<SyntaxTree> {
        let grammar = tree_sitter_language(language)
            .ok_or_else(|| ChunkingError::UnsupportedLanguage(language.to_string()))?;

        // Parser is not Sync, so each parse gets its own.
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ChunkingError::parse(language.as_str(), e))?;
        if let Some(timeout) = self.timeout {
            parser.set_timeout_micros(timeout.as_micros().min(u64::MAX as u128) as u64);
        }

        let ts_tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| ChunkingError::parse(language.as_str(), "parser returned no tree"))?;

        let mut tree = SyntaxTree::new(source, language);
        let root = ts_tree.root_node();
        if root.has_error() {
            tree.mark_errors();
        }

        let root_id = tree.push(None, root.kind(), root.is_named(), root.start_byte(), root.end_byte());
        let mut stack = vec![(root, root_id)];
        while let Some((node, id)) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                let child_id = tree.push(
                    Some(id),
                    child.kind(),
                    child.is_named(),
                    child.start_byte(),
                    child.end_byte(),
                );
                stack.push((child, child_id));
            }
        }

        debug!(
            language = %language,
            nodes = tree.len(),
            has_errors = tree.has_errors(),
            "Parsed source"
        );
        Ok(tree)
    }

    fn supports(&self, language: Language) -> bool {
        tree_sitter_language(language).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_python() {
        let parser = TreeSitterParser::new();
        let code = r#"
def hello(name: str) -> str:
    """Say hello."""
    return f"Hello, {name}!"

class Greeter:
    def greet(self, name: str) -> str:
        return hello(name)
"#;

        let tree = parser.parse(code, Language::Python).unwrap();
        let root = tree.root().unwrap();

        assert!(!tree.has_errors());
        assert_eq!(tree.node(root).kind, "module");
        let kinds: Vec<_> = tree
            .children(root)
            .iter()
            .map(|c| tree.node(*c).kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["function_definition", "class_definition"]);

        let function = tree.children(root)[0];
        assert_eq!(tree.node(function).start_line, 2);
        assert_eq!(tree.node(function).end_line, 4);
        assert!(tree.text(function).starts_with("def hello"));
        assert_eq!(tree.depth(function), 1);
    }

    #[test]
    fn test_parse_rust() {
        let parser = TreeSitterParser::new();
        let code = "fn main() {\n    println!(\"hi\");\n}\n\nstruct Point {\n    x: f64,\n}\n";

        let tree = parser.parse(code, Language::Rust).unwrap();
        let root = tree.root().unwrap();
        let kinds: Vec<_> = tree
            .children(root)
            .iter()
            .map(|c| tree.node(*c).kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["function_item", "struct_item"]);
    }

    #[test]
    fn test_syntax_errors_are_recovered() {
        let parser = TreeSitterParser::new();
        let tree = parser.parse("def broken(:\n    pass\n", Language::Python).unwrap();
        assert!(tree.has_errors());
    }

    #[test]
    fn test_unsupported_language() {
        let parser = TreeSitterParser::new();
        let err = parser.parse("# title", Language::Markdown).unwrap_err();
        assert_eq!(err.kind(), "unsupported_language");
        assert!(!parser.supports(Language::Markdown));
    }

    #[test]
    fn test_manual_tree_lines() {
        let mut tree = SyntaxTree::new("a\nbb\nccc\n", Language::Unknown);
        let root = tree.push(None, "root", true, 0, 9);
        let child = tree.push(Some(root), "item", true, 2, 5);

        assert_eq!(tree.node(root).start_line, 1);
        assert_eq!(tree.node(root).end_line, 3);
        assert_eq!(tree.node(child).start_line, 2);
        assert_eq!(tree.node(child).end_line, 2);
        assert_eq!(tree.text(child), "bb\n");
        assert_eq!(tree.parent(child), Some(root));
    }
}
