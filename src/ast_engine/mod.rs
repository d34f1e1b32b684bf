//! AST Engine module for source parsing.
//!
//! This module provides:
//! - An arena syntax tree the chunker walks
//! - A parser trait with a tree-sitter implementation for bundled languages

pub mod languages;
pub mod parser;

pub use languages::{parseable_languages, tree_sitter_language};
pub use parser::{NodeId, SourceParser, SyntaxNode, SyntaxTree, TreeSitterParser};
