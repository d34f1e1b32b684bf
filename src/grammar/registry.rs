//! Process-wide registry of loaded grammars.
//!
//! Bundled grammars load lazily on first lookup from the `node-types.json`
//! shipped with each tree-sitter grammar crate. Additional grammars can be
//! registered during startup. Loaded grammars are immutable and shared
//! through `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use tracing::{info, warn};

use super::node_types::Grammar;
use super::things::NodeKindDescriptor;
use crate::error::Result;
use crate::processing::Language;

/// `node-types.json` bundled with the grammar crates.
pub fn bundled_node_types(language: Language) -> Option<&'static str> {
    match language {
        Language::Python => Some(tree_sitter_python::NODE_TYPES),
        Language::JavaScript | Language::JavaScriptReact => Some(tree_sitter_javascript::NODE_TYPES),
        Language::TypeScript => Some(tree_sitter_typescript::TYPESCRIPT_NODE_TYPES),
        Language::TypeScriptReact => Some(tree_sitter_typescript::TSX_NODE_TYPES),
        Language::Go => Some(tree_sitter_go::NODE_TYPES),
        Language::Rust => Some(tree_sitter_rust::NODE_TYPES),
        Language::Java => Some(tree_sitter_java::NODE_TYPES),
        Language::C => Some(tree_sitter_c::NODE_TYPES),
        Language::Cpp => Some(tree_sitter_cpp::NODE_TYPES),
        Language::Ruby => Some(tree_sitter_ruby::NODE_TYPES),
        _ => None,
    }
}

lazy_static! {
    static ref SHARED: Arc<GrammarRegistry> = Arc::new(GrammarRegistry::new());
}

/// Shared, read-mostly table of grammars keyed by language.
#[derive(Debug, Default)]
pub struct GrammarRegistry {
    grammars: RwLock<HashMap<Language, Arc<Grammar>>>,
}

impl GrammarRegistry {
    /// An empty registry that still loads bundled grammars on demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by default classifiers.
    pub fn shared() -> Arc<GrammarRegistry> {
        Arc::clone(&SHARED)
    }

    /// Get the grammar for a language, loading a bundled one if needed.
    pub fn grammar(&self, language: Language) -> Option<Arc<Grammar>> {
        if let Some(grammar) = self
            .grammars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&language)
        {
            return Some(Arc::clone(grammar));
        }

        let json = bundled_node_types(language)?;
        let loaded = match Grammar::from_node_types_json(language, json) {
            Ok(grammar) => Arc::new(grammar),
            Err(e) => {
                warn!(language = %language, error = %e, "Failed to load bundled grammar");
                return None;
            }
        };

        let mut grammars = self.grammars.write().unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(grammars.entry(language).or_insert(loaded)))
    }

    /// Register a grammar from a `node-types.json` document, replacing any
    /// previous grammar for the language. Intended for startup only.
    pub fn register_json(&self, language: Language, json: &str) -> Result<Arc<Grammar>> {
        let grammar = Arc::new(Grammar::from_node_types_json(language, json)?);
        info!(language = %language, things = grammar.len(), "Registered grammar");
        self.grammars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(language, Arc::clone(&grammar));
        Ok(grammar)
    }

    /// Look up a node kind descriptor.
    pub fn lookup(&self, kind_name: &str, language: Language) -> Option<Arc<NodeKindDescriptor>> {
        self.grammar(language)?.get(kind_name)
    }

    /// Languages whose grammars are currently loaded.
    pub fn loaded_languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self
            .grammars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        languages.sort();
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = GrammarRegistry::new();
        registry
            .register_json(
                Language::Php,
                r#"[{"type": "text_interpolation", "named": true}]"#,
            )
            .unwrap();

        let thing = registry.lookup("text_interpolation", Language::Php).unwrap();
        assert!(thing.can_appear_anywhere);
        assert_eq!(registry.loaded_languages(), vec![Language::Php]);
        assert!(registry.lookup("missing", Language::Php).is_none());
    }

    #[test]
    fn test_unbundled_language_without_registration() {
        let registry = GrammarRegistry::new();
        assert!(registry.grammar(Language::Kotlin).is_none());
    }

    #[test]
    fn test_bundled_python_grammar() {
        let registry = GrammarRegistry::new();
        let grammar = registry.grammar(Language::Python).unwrap();
        let function = grammar.get("function_definition").unwrap();

        assert!(function.is_composite());
        assert!(function.roles().contains("name"));
        assert!(function.roles().contains("body"));
        assert!(grammar.get("identifier").unwrap().is_leaf());
    }
}
