//! Tree-sitter grammar lookup for supported languages.

use crate::processing::Language;

/// Get the tree-sitter grammar for a language, if one is bundled.
pub fn tree_sitter_language(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Python => Some(tree_sitter_python::language()),
        Language::JavaScript | Language::JavaScriptReact => Some(tree_sitter_javascript::language()),
        Language::TypeScript => Some(tree_sitter_typescript::language_typescript()),
        Language::TypeScriptReact => Some(tree_sitter_typescript::language_tsx()),
        Language::Go => Some(tree_sitter_go::language()),
        Language::Rust => Some(tree_sitter_rust::language()),
        Language::Java => Some(tree_sitter_java::language()),
        Language::C => Some(tree_sitter_c::language()),
        Language::Cpp => Some(tree_sitter_cpp::language()),
        Language::Ruby => Some(tree_sitter_ruby::language()),
        _ => None,
    }
}

/// Languages with a bundled parser.
pub fn parseable_languages() -> Vec<Language> {
    Language::BUNDLED
        .iter()
        .copied()
        .filter(|l| tree_sitter_language(*l).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_languages_have_grammars() {
        for language in Language::BUNDLED {
            assert!(tree_sitter_language(language).is_some(), "{language}");
        }
        assert_eq!(parseable_languages().len(), Language::BUNDLED.len());
    }

    #[test]
    fn test_unbundled_language() {
        assert!(tree_sitter_language(Language::Markdown).is_none());
    }
}
