//! Grammar-driven semantic classification.
//!
//! A node kind is classified by running a fixed sequence of phases over its
//! grammar description. Each phase proposes zero or more candidates with
//! evidence; the first confident, uncontested candidate short-circuits the
//! pipeline, otherwise all candidates are aggregated. Language extensions
//! get the first word and may refine the final answer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::trace;

use super::classes::SemanticClass;
use super::evidence::{aggregate, ClassificationMethod, ClassificationResult, EvidenceKind};
use super::extensions::{ClassificationContext, ContextualExtensionManager, LanguageExtensionManager};
use crate::cache::ShardedCache;
use crate::grammar::{is_operator_token, GrammarRegistry, NodeKindDescriptor, TokenSignificance};
use crate::processing::Language;

/// Minimum confidence for a lone first candidate to skip later phases.
pub const FAST_PATH_CONFIDENCE: f64 = 0.85;

lazy_static! {
    /// Grammar category names (without the leading underscore) to classes.
    static ref CATEGORY_MAP: HashMap<&'static str, SemanticClass> = {
        use SemanticClass::*;
        HashMap::from([
            ("expression", OperationOperator),
            ("primary_expression", OperationOperator),
            ("statement", FlowBranching),
            ("compound_statement", FlowBranching),
            ("pattern", FlowBranching),
            ("type", DefinitionType),
            ("type_specifier", DefinitionType),
            ("simple_type", DefinitionType),
            ("declaration", DefinitionData),
            ("declarator", DefinitionData),
            ("abstract_declarator", DefinitionData),
            ("field_declarator", DefinitionData),
            ("type_declarator", DefinitionData),
            ("parameter", DefinitionData),
            ("literal", SyntaxLiteral),
            ("simple_statement", FlowControl),
            ("argument", SyntaxAnnotation),
            ("identifier", SyntaxIdentifier),
        ])
    };

    /// Kinds whose class is fixed regardless of grammar structure.
    static ref KNOWN_EXCEPTIONS: HashMap<(&'static str, Language), SemanticClass> = HashMap::from([
        (("line_continuation", Language::Python), SemanticClass::SyntaxPunctuation),
        (("text_interpolation", Language::Php), SemanticClass::SyntaxIdentifier),
        (("decorator", Language::Python), SemanticClass::SyntaxAnnotation),
        (("attribute_item", Language::Rust), SemanticClass::SyntaxAnnotation),
    ]);
}

const TYPE_ROLES: &[&str] = &["superclass", "superclasses", "interfaces", "base"];
const DATA_ROLES: &[&str] = &["declarator", "value", "default"];

/// What every phase sees about the kind being classified.
struct PhaseInput<'a> {
    kind_name: &'a str,
    language: Language,
    descriptor: Option<&'a NodeKindDescriptor>,
}

type Phase = fn(&PhaseInput<'_>) -> Vec<ClassificationResult>;

const PHASES: &[(&str, Phase)] = &[
    ("known_exceptions", known_exceptions),
    ("anywhere", anywhere),
    ("token_purpose", token_purpose),
    ("category", category),
    ("roles", roles),
    ("positional", positional),
];

fn known_exceptions(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    KNOWN_EXCEPTIONS
        .get(&(input.kind_name, input.language))
        .map(|class| {
            vec![ClassificationResult::new(
                *class,
                ClassificationMethod::KnownException,
                [EvidenceKind::SpecificThing, EvidenceKind::Language, EvidenceKind::Heuristic],
                90,
            )]
        })
        .unwrap_or_default()
}

fn comment_class(kind_name: &str) -> SemanticClass {
    if kind_name == "line_comment" {
        SemanticClass::SyntaxAnnotation
    } else {
        SemanticClass::DocumentationStructured
    }
}

fn anywhere(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    match input.descriptor {
        Some(d) if d.can_appear_anywhere && d.name.contains("comment") => {
            vec![ClassificationResult::new(
                comment_class(&d.name),
                ClassificationMethod::Anywhere,
                [EvidenceKind::SpecificThing, EvidenceKind::Language, EvidenceKind::Heuristic],
                90,
            )]
        }
        _ => Vec::new(),
    }
}

fn token_purpose(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    let Some(descriptor) = input.descriptor else {
        return Vec::new();
    };
    let Some(significance) = descriptor.significance() else {
        return Vec::new();
    };

    let (class, adjustment) = match significance {
        TokenSignificance::Comment => (comment_class(&descriptor.name), -110),
        TokenSignificance::Identifier => (SemanticClass::SyntaxIdentifier, -90),
        TokenSignificance::Literal => (SemanticClass::SyntaxLiteral, -90),
        TokenSignificance::Trivial => (SemanticClass::SyntaxPunctuation, -90),
        TokenSignificance::Structural if is_operator_token(&descriptor.name) => {
            (SemanticClass::OperationOperator, -90)
        }
        TokenSignificance::Structural => (SemanticClass::SyntaxKeyword, -90),
    };
    vec![ClassificationResult::new(
        class,
        ClassificationMethod::TokenPurpose,
        [EvidenceKind::Purpose, EvidenceKind::SpecificThing],
        adjustment,
    )]
}

fn category(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    let Some(descriptor) = input.descriptor else {
        return Vec::new();
    };

    // Count mapped categories per class, keeping first-seen order stable.
    let mut counts: BTreeMap<usize, (SemanticClass, i32)> = BTreeMap::new();
    for name in &descriptor.categories {
        if let Some(class) = CATEGORY_MAP.get(name.trim_start_matches('_')) {
            counts.entry(class.ordinal()).or_insert((*class, 0)).1 += 1;
        }
    }

    let distinct = counts.len() as i32;
    let adjustment_for = |mapped: i32| {
        if distinct > 1 {
            -10 * (distinct - 1)
        } else {
            5 * (mapped - 1)
        }
    };

    counts
        .into_values()
        .map(|(class, mapped)| {
            ClassificationResult::new(
                class,
                ClassificationMethod::Category,
                [EvidenceKind::Categories],
                adjustment_for(mapped),
            )
        })
        .collect()
}

/// Infer a class from the set of named roles a composite exposes.
fn class_from_roles(roles: &std::collections::BTreeSet<&str>) -> Option<SemanticClass> {
    let has = |role: &str| roles.contains(role);
    let has_any = |set: &[&str]| set.iter().any(|r| roles.contains(r));

    if has("name") && has("body") && has_any(TYPE_ROLES) {
        return Some(SemanticClass::DefinitionType);
    }
    if has("name") && has("body") {
        return Some(SemanticClass::DefinitionCallable);
    }
    if has("condition") && (has("consequence") || has("body")) {
        return Some(SemanticClass::FlowBranching);
    }
    if has("left") && has("right") && has("operator") {
        return Some(SemanticClass::OperationOperator);
    }
    if has("type") && has_any(DATA_ROLES) {
        return Some(SemanticClass::DefinitionData);
    }
    None
}

fn roles(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    let Some(descriptor) = input.descriptor.filter(|d| d.is_composite()) else {
        return Vec::new();
    };
    class_from_roles(&descriptor.roles())
        .map(|class| {
            vec![ClassificationResult::new(
                class,
                ClassificationMethod::ConnectionInference,
                [EvidenceKind::Roles, EvidenceKind::Connections],
                -65,
            )]
        })
        .unwrap_or_default()
}

fn positional(input: &PhaseInput<'_>) -> Vec<ClassificationResult> {
    let Some(descriptor) = input.descriptor.filter(|d| d.is_composite()) else {
        return Vec::new();
    };
    if descriptor.positional_connections().is_empty() {
        return Vec::new();
    }

    let (class, adjustment) = if descriptor.direct_connections().is_empty() {
        (SemanticClass::SyntaxIdentifier, 55)
    } else {
        (SemanticClass::FlowBranching, 60)
    };
    vec![ClassificationResult::new(
        class,
        ClassificationMethod::Positional,
        [EvidenceKind::Heuristic],
        adjustment,
    )]
}

/// Classify a node kind from its grammar description alone.
///
/// Pure: the same inputs always give the same result. Returns `None` when
/// no phase produces a candidate.
pub fn classify_kind(
    kind_name: &str,
    language: Language,
    descriptor: Option<&NodeKindDescriptor>,
) -> Option<ClassificationResult> {
    let input = PhaseInput {
        kind_name,
        language,
        descriptor,
    };

    let mut candidates = Vec::new();
    for (phase_name, phase) in PHASES {
        let produced = phase(&input);
        if candidates.is_empty()
            && produced.len() == 1
            && produced[0].confidence() >= FAST_PATH_CONFIDENCE
        {
            trace!(kind = kind_name, phase = phase_name, "Fast path");
            return produced.into_iter().next();
        }
        candidates.extend(produced);
    }
    aggregate(candidates)
}

/// Memoized classifier combining the grammar pipeline with language
/// extensions.
pub struct SemanticClassifier {
    grammars: Arc<GrammarRegistry>,
    extensions: ContextualExtensionManager,
    memo: ShardedCache<(String, Language), Option<ClassificationResult>>,
}

impl Default for SemanticClassifier {
    fn default() -> Self {
        Self::new(GrammarRegistry::shared())
    }
}

impl SemanticClassifier {
    /// A classifier over `grammars` with the built-in extensions.
    pub fn new(grammars: Arc<GrammarRegistry>) -> Self {
        Self {
            grammars,
            extensions: ContextualExtensionManager::new(LanguageExtensionManager::new()),
            memo: ShardedCache::unbounded(),
        }
    }

    /// Replace the extension layer. Clears memoized results.
    pub fn with_extensions(mut self, extensions: LanguageExtensionManager) -> Self {
        self.extensions = ContextualExtensionManager::new(extensions);
        self.memo.clear();
        self
    }

    pub fn grammars(&self) -> &Arc<GrammarRegistry> {
        &self.grammars
    }

    pub fn descriptor(&self, kind_name: &str, language: Language) -> Option<Arc<NodeKindDescriptor>> {
        self.grammars.lookup(kind_name, language)
    }

    /// Classify a node kind. Results, including `None`, are memoized per
    /// `(kind, language)`.
    pub fn classify(&self, kind_name: &str, language: Language) -> Option<ClassificationResult> {
        self.memo
            .get_or_insert_with((kind_name.to_string(), language), || {
                self.classify_uncached(kind_name, language)
            })
    }

    fn classify_uncached(&self, kind_name: &str, language: Language) -> Option<ClassificationResult> {
        if let Some(result) = self.extensions.check_extensions_first(kind_name, language) {
            return Some(result);
        }
        let descriptor = self.descriptor(kind_name, language);
        let base = classify_kind(kind_name, language, descriptor.as_deref())?;
        Some(self.extensions.refine(base, kind_name, language))
    }

    /// Classify with parent, sibling and file context. Context only ever
    /// raises the confidence of extension-derived results.
    pub fn classify_with_context(
        &self,
        kind_name: &str,
        language: Language,
        context: &ClassificationContext<'_>,
    ) -> Option<ClassificationResult> {
        self.classify(kind_name, language)
            .map(|result| self.extensions.enhance(result, language, context))
    }

    /// Number of memoized kinds.
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}
