//! Language-specific classification overrides.
//!
//! Two sources are consulted in order: an explicit per-language table of
//! node kind to class, then an ordered list of regex patterns over the kind
//! name. [`LanguageExtensionManager::check_extensions_first`] runs before the
//! grammar pipeline and anchors patterns at the start of the kind name.
//! [`LanguageExtensionManager::refine`] runs after it, searches for patterns
//! anywhere in the name, and only replaces the base result when strictly
//! more confident. [`ContextualExtensionManager`] additionally nudges
//! extension results up when the surrounding file corroborates them.

use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use super::classes::{ClassRegistry, ExtensionClassDef, ImportanceRank, ImportanceScores, SemanticClass};
use super::evidence::{ClassificationMethod, ClassificationResult, EvidenceKind};
use crate::error::{ChunkingError, Result};
use crate::processing::Language;

/// Confidence of a direct table mapping.
const REGISTRY_CONFIDENCE: f64 = 0.95;
/// Ceiling for pattern-derived confidence.
const PATTERN_CONFIDENCE_CAP: f64 = 0.95;

static JSX_MARKUP_ELEMENT: ExtensionClassDef = ExtensionClassDef {
    name: "jsx_markup_element",
    language: Language::JavaScriptReact,
    parent: SemanticClass::DefinitionCallable,
    rank: ImportanceRank::ControlFlowLogic,
    importance: ImportanceScores::new(0.70, 0.60, 0.65, 0.55, 0.35),
    description: "A JSX or TSX element or markup component",
};

use SemanticClass::*;

const JS_FAMILY: &[Language] = &[
    Language::JavaScript,
    Language::JavaScriptReact,
    Language::TypeScript,
    Language::TypeScriptReact,
];

/// Built-in direct mappings, grouped by the languages they apply to.
const BUILTIN_MAPPINGS: &[(&[Language], &[(&str, SemanticClass)])] = &[
    (
        &[Language::Python],
        &[
            ("import_statement", BoundaryModule),
            ("import_from_statement", BoundaryModule),
            ("future_import_statement", BoundaryModule),
            ("try_statement", BoundaryError),
            ("raise_statement", BoundaryError),
            ("except_clause", BoundaryError),
            ("assert_statement", BoundaryError),
            ("for_statement", FlowIteration),
            ("while_statement", FlowIteration),
            ("return_statement", FlowControl),
            ("break_statement", FlowControl),
            ("continue_statement", FlowControl),
            ("await", FlowAsync),
            ("lambda", ExpressionAnonymous),
            ("call", OperationInvocation),
            ("decorator", SyntaxAnnotation),
        ],
    ),
    (
        &[Language::Rust],
        &[
            ("use_declaration", BoundaryModule),
            ("mod_item", BoundaryModule),
            ("extern_crate_declaration", BoundaryModule),
            ("try_expression", BoundaryError),
            ("for_expression", FlowIteration),
            ("while_expression", FlowIteration),
            ("loop_expression", FlowIteration),
            ("return_expression", FlowControl),
            ("break_expression", FlowControl),
            ("continue_expression", FlowControl),
            ("await_expression", FlowAsync),
            ("async_block", FlowAsync),
            ("closure_expression", ExpressionAnonymous),
            ("call_expression", OperationInvocation),
            ("macro_invocation", OperationInvocation),
            ("macro_definition", DefinitionCallable),
            ("attribute_item", SyntaxAnnotation),
            ("inner_attribute_item", SyntaxAnnotation),
        ],
    ),
    (
        JS_FAMILY,
        &[
            ("import_statement", BoundaryModule),
            ("export_statement", BoundaryModule),
            ("try_statement", BoundaryError),
            ("throw_statement", BoundaryError),
            ("catch_clause", BoundaryError),
            ("for_statement", FlowIteration),
            ("for_in_statement", FlowIteration),
            ("while_statement", FlowIteration),
            ("do_statement", FlowIteration),
            ("return_statement", FlowControl),
            ("break_statement", FlowControl),
            ("continue_statement", FlowControl),
            ("await_expression", FlowAsync),
            ("arrow_function", ExpressionAnonymous),
            ("call_expression", OperationInvocation),
            ("new_expression", OperationInvocation),
            ("decorator", SyntaxAnnotation),
        ],
    ),
    (
        &[Language::Go],
        &[
            ("import_declaration", BoundaryModule),
            ("for_statement", FlowIteration),
            ("go_statement", FlowAsync),
            ("select_statement", FlowAsync),
            ("return_statement", FlowControl),
            ("break_statement", FlowControl),
            ("continue_statement", FlowControl),
            ("goto_statement", FlowControl),
            ("func_literal", ExpressionAnonymous),
            ("call_expression", OperationInvocation),
        ],
    ),
    (
        &[Language::Java],
        &[
            ("import_declaration", BoundaryModule),
            ("package_declaration", BoundaryModule),
            ("try_statement", BoundaryError),
            ("throw_statement", BoundaryError),
            ("catch_clause", BoundaryError),
            ("try_with_resources_statement", BoundaryResource),
            ("for_statement", FlowIteration),
            ("enhanced_for_statement", FlowIteration),
            ("while_statement", FlowIteration),
            ("do_statement", FlowIteration),
            ("lambda_expression", ExpressionAnonymous),
            ("method_invocation", OperationInvocation),
            ("annotation", SyntaxAnnotation),
            ("marker_annotation", SyntaxAnnotation),
        ],
    ),
    (
        &[Language::C, Language::Cpp],
        &[
            ("preproc_include", BoundaryModule),
            ("for_statement", FlowIteration),
            ("while_statement", FlowIteration),
            ("do_statement", FlowIteration),
            ("return_statement", FlowControl),
            ("break_statement", FlowControl),
            ("continue_statement", FlowControl),
            ("goto_statement", FlowControl),
            ("call_expression", OperationInvocation),
        ],
    ),
    (
        &[Language::Cpp],
        &[
            ("namespace_definition", BoundaryModule),
            ("try_statement", BoundaryError),
            ("throw_statement", BoundaryError),
            ("lambda_expression", ExpressionAnonymous),
        ],
    ),
    (
        &[Language::Ruby],
        &[
            ("method", DefinitionCallable),
            ("singleton_method", DefinitionCallable),
            ("class", DefinitionType),
            ("module", BoundaryModule),
            ("begin", BoundaryError),
            ("rescue", BoundaryError),
            ("ensure", BoundaryError),
            ("for", FlowIteration),
            ("while", FlowIteration),
            ("until", FlowIteration),
            ("call", OperationInvocation),
            ("lambda", ExpressionAnonymous),
            ("do_block", ExpressionAnonymous),
        ],
    ),
];

/// A compiled kind-name pattern.
#[derive(Debug, Clone)]
pub struct LanguagePattern {
    source: String,
    anchored: Regex,
    unanchored: Regex,
    class: SemanticClass,
    label: String,
    case_sensitive: bool,
}

impl LanguagePattern {
    pub fn new(source: &str, class: SemanticClass, label: &str, case_sensitive: bool) -> Result<Self> {
        let build = |pattern: String| {
            RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| ChunkingError::invalid_config(format!("invalid pattern {source}: {e}")))
        };
        Ok(Self {
            anchored: build(format!("^(?:{source})"))?,
            unanchored: build(source.to_string())?,
            source: source.to_string(),
            class,
            label: label.to_string(),
            case_sensitive,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn class(&self) -> SemanticClass {
        self.class
    }

    /// Confidence for a match of this pattern against `kind_name`:
    /// `min(0.95, 0.6 + len(source)/100 + 0.1 if the whole name matched
    /// + 0.05 if case-sensitive and matched)`.
    pub fn confidence(&self, kind_name: &str) -> f64 {
        let mut confidence = 0.6 + self.source.len() as f64 / 100.0;
        let matched = self.unanchored.find(kind_name);
        if matched.map_or(false, |m| m.start() == 0 && m.end() == kind_name.len()) {
            confidence += 0.1;
        }
        if self.case_sensitive && matched.is_some() {
            confidence += 0.05;
        }
        confidence.min(PATTERN_CONFIDENCE_CAP)
    }

    fn result(&self, kind_name: &str) -> ClassificationResult {
        ClassificationResult::with_target_confidence(
            self.class,
            ClassificationMethod::PatternMatch,
            [EvidenceKind::SimpleNamePattern, EvidenceKind::Language],
            self.confidence(kind_name),
        )
    }
}

/// Manages language-specific mappings and patterns.
#[derive(Debug, Clone, Default)]
pub struct LanguageExtensionManager {
    mappings: HashMap<(Language, String), SemanticClass>,
    patterns: HashMap<Language, Vec<LanguagePattern>>,
}

impl LanguageExtensionManager {
    /// A manager with the built-in mappings and patterns.
    pub fn new() -> Self {
        let mut manager = Self::empty();
        for (languages, entries) in BUILTIN_MAPPINGS {
            for language in *languages {
                for (kind, class) in *entries {
                    manager.register_mapping(*language, kind, *class);
                }
            }
        }
        for (language, source, class, label) in builtin_patterns() {
            if let Err(e) = manager.register_pattern(language, source, class, label, false) {
                warn!(language = %language, pattern = source, error = %e, "Skipping built-in pattern");
            }
        }
        manager
    }

    /// A manager with no mappings or patterns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Map a node kind directly to a class for one language.
    pub fn register_mapping(&mut self, language: Language, kind_name: &str, class: SemanticClass) {
        self.mappings.insert((language, kind_name.to_string()), class);
    }

    /// Append a pattern to a language's ordered pattern list.
    pub fn register_pattern(
        &mut self,
        language: Language,
        source: &str,
        class: SemanticClass,
        label: &str,
        case_sensitive: bool,
    ) -> Result<()> {
        let pattern = LanguagePattern::new(source, class, label, case_sensitive)?;
        self.patterns.entry(language).or_default().push(pattern);
        Ok(())
    }

    pub fn patterns(&self, language: Language) -> &[LanguagePattern] {
        self.patterns.get(&language).map(Vec::as_slice).unwrap_or(&[])
    }

    fn registry_mapping(&self, kind_name: &str, language: Language) -> Option<ClassificationResult> {
        self.mappings
            .get(&(language, kind_name.to_string()))
            .map(|class| {
                ClassificationResult::with_target_confidence(
                    *class,
                    ClassificationMethod::RegistryMapping,
                    [EvidenceKind::Categories, EvidenceKind::Heuristic],
                    REGISTRY_CONFIDENCE,
                )
            })
    }

    /// Classify from extensions alone, before the grammar pipeline runs.
    pub fn check_extensions_first(&self, kind_name: &str, language: Language) -> Option<ClassificationResult> {
        if let Some(result) = self.registry_mapping(kind_name, language) {
            return Some(result);
        }
        self.patterns(language)
            .iter()
            .find(|p| p.anchored.is_match(kind_name))
            .map(|p| p.result(kind_name))
    }

    /// Replace `base` with a pattern match found anywhere in the kind name,
    /// but only if that match is strictly more confident.
    pub fn refine(&self, base: ClassificationResult, kind_name: &str, language: Language) -> ClassificationResult {
        let candidate = self
            .patterns(language)
            .iter()
            .find(|p| p.class != base.classification() && p.unanchored.is_match(kind_name))
            .map(|p| p.result(kind_name));

        match candidate {
            Some(refined) if refined.confidence() > base.confidence() => {
                let mut alternates: Vec<_> = base
                    .alternates()
                    .iter()
                    .map(|(class, evidence)| (*class, evidence.clone()))
                    .collect();
                alternates.push((base.classification(), base.evidence().clone()));
                refined.with_alternates(alternates)
            }
            _ => base,
        }
    }
}

fn builtin_patterns() -> Vec<(Language, &'static str, SemanticClass, &'static str)> {
    let jsx_element = ClassRegistry::global().register(&JSX_MARKUP_ELEMENT);
    let mut patterns = Vec::new();
    for language in [Language::JavaScriptReact, Language::TypeScriptReact] {
        patterns.extend([
            (language, r"(?P<jsx_element>(j|t)sx.*element)", jsx_element, "jsx_element"),
            (language, r"(?P<react_hook>use[A-Z][a-zA-Z]*)", OperationInvocation, "react_hook"),
            (language, r"(?P<component_name>.*Component$)", DefinitionCallable, "component_name"),
            (language, r".*Hook$", SyntaxIdentifier, "hook_name"),
        ]);
    }
    patterns.extend([
        (
            Language::Rust,
            r"(?P<trait_or_impl_item>(impl|trait|struct|enum).*item)",
            DefinitionType,
            "trait_or_impl_item",
        ),
        (Language::Rust, r"(?P<lifetime>.*lifetime.*)", SyntaxAnnotation, "lifetime"),
        (Language::Rust, r"(?P<generic_param>generic.*param)", DefinitionType, "generic_param"),
        (
            Language::Python,
            r"(?P<comprehension>(list|set|dict|mapping|generator|tuple).*(comprehension|expression))",
            ExpressionAnonymous,
            "comprehension",
        ),
        (Language::Python, r"with.*statement", BoundaryResource, "with_statement"),
        (Language::Go, r"package.*clause", BoundaryModule, "package"),
        (Language::Go, r"type.*decl", DefinitionType, "type_decl"),
        (Language::Go, r"defer.*statement", BoundaryResource, "defer"),
    ]);
    patterns
}

/// Structural context of a node being classified.
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext<'a> {
    pub parent_kind: Option<&'a str>,
    pub sibling_kinds: Vec<&'a str>,
    pub file_path: Option<&'a Path>,
}

const JSX_PATH_HINTS: &[&str] = &["component", "react", "ui", "frontend"];
const JSX_PARENT_HINTS: &[&str] = &["component", "react", "jsx"];

/// Extension manager that also weighs parent, sibling and file context.
#[derive(Debug, Clone, Default)]
pub struct ContextualExtensionManager {
    inner: LanguageExtensionManager,
}

impl ContextualExtensionManager {
    pub fn new(inner: LanguageExtensionManager) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &LanguageExtensionManager {
        &self.inner
    }

    pub fn check_extensions_first(&self, kind_name: &str, language: Language) -> Option<ClassificationResult> {
        self.inner.check_extensions_first(kind_name, language)
    }

    pub fn refine(&self, base: ClassificationResult, kind_name: &str, language: Language) -> ClassificationResult {
        self.inner.refine(base, kind_name, language)
    }

    /// Extension classification with contextual confidence adjustments.
    pub fn classify_with_context(
        &self,
        kind_name: &str,
        language: Language,
        context: &ClassificationContext<'_>,
    ) -> Option<ClassificationResult> {
        self.check_extensions_first(kind_name, language)
            .map(|result| self.enhance(result, language, context))
    }

    /// Raise an extension result's confidence when context corroborates it.
    ///
    /// Never lowers confidence; grammar-derived results pass through.
    pub fn enhance(
        &self,
        result: ClassificationResult,
        language: Language,
        context: &ClassificationContext<'_>,
    ) -> ClassificationResult {
        if !result.method().is_extension() {
            return result;
        }

        let base = result.confidence();
        let mut confidence = base;
        let name = result.classification().as_str().to_lowercase();
        let jsx_class = name.starts_with("jsx") || name.starts_with("tsx") || name.contains("react");
        let rust_class = name.starts_with("rust");
        let parent = context.parent_kind.map(str::to_lowercase).unwrap_or_default();
        let path = context
            .file_path
            .map(|p| p.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let boost = |current: f64, factor: f64, cap: f64| current.max((current * factor).min(cap));

        if !path.is_empty() {
            let path_hint = JSX_PATH_HINTS.iter().any(|h| path.contains(h));
            if jsx_class && (path_hint || JSX_PARENT_HINTS.iter().any(|h| parent.contains(h))) {
                confidence = boost(confidence, 1.1, 0.98);
            }
            if path.ends_with(".jsx") || path.ends_with(".tsx") {
                confidence = boost(confidence, 1.1, 0.98);
            }
            if rust_class && path.ends_with(".rs") {
                confidence = boost(confidence, 1.05, 0.95);
            }
        }

        if jsx_class && JSX_PARENT_HINTS.iter().any(|h| parent.contains(h)) {
            confidence = boost(confidence, 1.1, 0.98);
        }
        if name.contains("rust") && parent.contains("rust") {
            confidence = boost(confidence, 1.05, 0.95);
        }

        if name.contains("jsx") {
            let react_siblings = context
                .sibling_kinds
                .iter()
                .filter(|s| {
                    let s = s.to_lowercase();
                    s.contains("jsx") || s.contains("react")
                })
                .count();
            if react_siblings > 0 {
                confidence = boost(confidence, 1.0 + 0.02 * react_siblings as f64, 0.95);
            }
        }

        // Total nudge stays within x1.1 of the base.
        let confidence = confidence.min(base * 1.1).max(base);
        if (confidence - base).abs() < f64::EPSILON {
            result
        } else {
            result.rescored(confidence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_mapping_wins_first() {
        let manager = LanguageExtensionManager::new();
        let result = manager.check_extensions_first("try_statement", Language::Python).unwrap();

        assert_eq!(result.classification(), SemanticClass::BoundaryError);
        assert_eq!(result.method(), ClassificationMethod::RegistryMapping);
        assert!((result.confidence() - 0.95).abs() < 1e-9);
        assert!(result.evidence().contains(&EvidenceKind::Categories));
    }

    #[test]
    fn test_pattern_confidence() {
        let short = LanguagePattern::new("with.*statement", BoundaryResource, "with", false).unwrap();
        // 0.6 + 0.15 + 0.1 for a whole-name match
        assert!((short.confidence("with_statement") - 0.85).abs() < 1e-9);
        // 0.6 + 0.15 for a partial match
        assert!((short.confidence("with_statement_list") - 0.75).abs() < 1e-9);

        let sensitive = LanguagePattern::new("defer", BoundaryResource, "defer", true).unwrap();
        assert!((sensitive.confidence("defer") - 0.80).abs() < 1e-9);

        let long = LanguagePattern::new(
            "(?P<trait_or_impl_item>(impl|trait|struct|enum).*item)",
            DefinitionType,
            "trait",
            false,
        )
        .unwrap();
        assert_eq!(long.confidence("struct_item"), 0.95);
    }

    #[test]
    fn test_patterns_are_anchored_for_first_pass() {
        let manager = LanguageExtensionManager::new();
        let result = manager.check_extensions_first("struct_item", Language::Rust).unwrap();
        assert_eq!(result.classification(), SemanticClass::DefinitionType);
        assert_eq!(result.method(), ClassificationMethod::PatternMatch);

        assert!(manager.check_extensions_first("async_with_statement", Language::Python).is_none());
        assert!(manager.check_extensions_first("struct_item", Language::Go).is_none());
    }

    #[test]
    fn test_jsx_extension_class() {
        let manager = LanguageExtensionManager::new();
        let result = manager
            .check_extensions_first("jsx_self_closing_element", Language::TypeScriptReact)
            .unwrap();

        assert_eq!(result.classification().as_str(), "jsx_markup_element");
        assert_eq!(result.classification().core(), SemanticClass::DefinitionCallable);
        assert_eq!(result.rank(), ImportanceRank::ControlFlowLogic);
    }

    #[test]
    fn test_refine_only_replaces_when_more_confident() {
        let manager = LanguageExtensionManager::new();
        let weak = ClassificationResult::new(
            SemanticClass::FlowBranching,
            ClassificationMethod::Positional,
            [EvidenceKind::Heuristic],
            60,
        );
        let refined = manager.refine(weak, "async_with_statement", Language::Python);
        assert_eq!(refined.classification(), SemanticClass::BoundaryResource);
        assert!(refined.alternates().contains_key(&SemanticClass::FlowBranching));

        let strong = ClassificationResult::new(
            SemanticClass::FlowBranching,
            ClassificationMethod::Category,
            [EvidenceKind::Categories],
            5,
        );
        let kept = manager.refine(strong.clone(), "async_with_statement", Language::Python);
        assert_eq!(kept, strong);
    }

    #[test]
    fn test_contextual_boosts_jsx_in_component_path() {
        let manager = ContextualExtensionManager::new(LanguageExtensionManager::new());
        let path = Path::new("src/components/Button.tsx");
        let context = ClassificationContext {
            parent_kind: Some("jsx_element"),
            sibling_kinds: vec!["jsx_text", "jsx_expression"],
            file_path: Some(path),
        };

        let base = manager
            .check_extensions_first("jsx_element", Language::TypeScriptReact)
            .unwrap();
        let enhanced = manager
            .classify_with_context("jsx_element", Language::TypeScriptReact, &context)
            .unwrap();

        assert!(enhanced.confidence() > base.confidence());
        assert!(enhanced.confidence() <= 0.98);
        assert!(enhanced.confidence() <= base.confidence() * 1.1 + 1e-9);
    }

    #[test]
    fn test_contextual_leaves_grammar_results_alone() {
        let manager = ContextualExtensionManager::default();
        let result = ClassificationResult::new(
            SemanticClass::DefinitionCallable,
            ClassificationMethod::ConnectionInference,
            [EvidenceKind::Roles, EvidenceKind::Connections],
            -65,
        );
        let context = ClassificationContext {
            file_path: Some(Path::new("lib.rs")),
            ..Default::default()
        };
        assert_eq!(manager.enhance(result.clone(), Language::Rust, &context), result);
    }

    #[test]
    fn test_tsx_path_boosts_any_extension_result() {
        let manager = ContextualExtensionManager::new(LanguageExtensionManager::new());
        let context = ClassificationContext {
            file_path: Some(Path::new("app/main.tsx")),
            ..Default::default()
        };

        let base = manager
            .check_extensions_first("arrow_function", Language::TypeScriptReact)
            .unwrap();
        assert_eq!(base.classification(), ExpressionAnonymous);
        let enhanced = manager.enhance(base.clone(), Language::TypeScriptReact, &context);

        assert!((enhanced.confidence() - 0.98).abs() < 1e-9);
        assert!(enhanced.confidence() > base.confidence());
    }

    static RUST_MACRO: ExtensionClassDef = ExtensionClassDef {
        name: "rust_macro_invocation",
        language: Language::Rust,
        parent: SemanticClass::OperationInvocation,
        rank: ImportanceRank::OperationsExpressions,
        importance: ImportanceScores::new(0.40, 0.50, 0.45, 0.55, 0.20),
        description: "A Rust macro invocation",
    };

    #[test]
    fn test_rs_path_boosts_only_rust_classes() {
        let context = ClassificationContext {
            file_path: Some(Path::new("src/lib.rs")),
            ..Default::default()
        };

        let builtin = ContextualExtensionManager::new(LanguageExtensionManager::new());
        let module = builtin
            .check_extensions_first("use_declaration", Language::Rust)
            .unwrap();
        assert_eq!(builtin.enhance(module.clone(), Language::Rust, &context), module);

        let class = ClassRegistry::global().register(&RUST_MACRO);
        let mut extensions = LanguageExtensionManager::empty();
        extensions
            .register_pattern(Language::Rust, "macro", class, "macro", false)
            .unwrap();
        let manager = ContextualExtensionManager::new(extensions);

        let base = manager
            .check_extensions_first("macro_invocation", Language::Rust)
            .unwrap();
        // 0.6 + 0.05 for the five-character pattern
        assert!((base.confidence() - 0.65).abs() < 1e-9);
        let enhanced = manager.enhance(base, Language::Rust, &context);
        assert!((enhanced.confidence() - 0.65 * 1.05).abs() < 0.01);
    }
}
