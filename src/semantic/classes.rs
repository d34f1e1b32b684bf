//! The semantic class taxonomy.
//!
//! Twenty-one core classes partitioned into five importance tiers, each with
//! a fixed importance vector over agent task contexts. Language-specific
//! classes are registered once at startup in an append-only [`ClassRegistry`]
//! and always resolve to a core parent for tier and ordering purposes.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::grammar::TokenSignificance;
use crate::processing::Language;

/// Importance tier of a semantic class. Lower is more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceRank {
    PrimaryDefinitions = 1,
    BehavioralContracts = 2,
    ControlFlowLogic = 3,
    OperationsExpressions = 4,
    SyntaxReferences = 5,
}

impl ImportanceRank {
    pub fn tier(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceRank::PrimaryDefinitions => "primary_definitions",
            ImportanceRank::BehavioralContracts => "behavioral_contracts",
            ImportanceRank::ControlFlowLogic => "control_flow_logic",
            ImportanceRank::OperationsExpressions => "operations_expressions",
            ImportanceRank::SyntaxReferences => "syntax_references",
        }
    }

    /// Approximate tier of a token from its significance alone.
    pub fn from_significance(significance: TokenSignificance) -> Self {
        match significance {
            TokenSignificance::Comment => ImportanceRank::BehavioralContracts,
            TokenSignificance::Structural => ImportanceRank::OperationsExpressions,
            TokenSignificance::Identifier | TokenSignificance::Literal | TokenSignificance::Trivial => {
                ImportanceRank::SyntaxReferences
            }
        }
    }
}

/// Importance of a class for each agent task context, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceScores {
    pub discovery: f64,
    pub comprehension: f64,
    pub modification: f64,
    pub debugging: f64,
    pub documentation: f64,
}

impl ImportanceScores {
    pub const fn new(
        discovery: f64,
        comprehension: f64,
        modification: f64,
        debugging: f64,
        documentation: f64,
    ) -> Self {
        Self {
            discovery,
            comprehension,
            modification,
            debugging,
            documentation,
        }
    }

    fn values(&self) -> [f64; 5] {
        [
            self.discovery,
            self.comprehension,
            self.modification,
            self.debugging,
            self.documentation,
        ]
    }

    /// Largest component.
    pub fn max(&self) -> f64 {
        self.values().into_iter().fold(0.0, f64::max)
    }

    /// Whether any component reaches `threshold`.
    pub fn any_at_least(&self, threshold: f64) -> bool {
        self.values().iter().any(|v| *v >= threshold)
    }

    /// Dot product with a task's weight profile.
    pub fn weighted(&self, task: AgentTask) -> f64 {
        let weights = task.profile();
        self.values()
            .iter()
            .zip(weights.values())
            .map(|(score, weight)| score * weight)
            .sum()
    }
}

/// Agent task contexts that weight the importance vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTask {
    LocalEdit,
    Debug,
    Refactor,
    Document,
    Search,
    Implement,
    Review,
    #[default]
    Default,
}

impl AgentTask {
    /// Weight profile for this task; weights sum to 1.
    pub fn profile(&self) -> ImportanceScores {
        match self {
            AgentTask::LocalEdit => ImportanceScores::new(0.40, 0.30, 0.20, 0.05, 0.05),
            AgentTask::Debug => ImportanceScores::new(0.20, 0.30, 0.10, 0.35, 0.05),
            AgentTask::Refactor => ImportanceScores::new(0.15, 0.25, 0.45, 0.10, 0.05),
            AgentTask::Document => ImportanceScores::new(0.20, 0.20, 0.10, 0.05, 0.45),
            AgentTask::Search => ImportanceScores::new(0.50, 0.20, 0.15, 0.10, 0.05),
            AgentTask::Implement => ImportanceScores::new(0.30, 0.30, 0.25, 0.10, 0.05),
            AgentTask::Review => ImportanceScores::new(0.25, 0.35, 0.15, 0.15, 0.10),
            AgentTask::Default => ImportanceScores::new(0.25, 0.25, 0.20, 0.15, 0.15),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "local_edit" => Some(AgentTask::LocalEdit),
            "debug" => Some(AgentTask::Debug),
            "refactor" => Some(AgentTask::Refactor),
            "document" => Some(AgentTask::Document),
            "search" => Some(AgentTask::Search),
            "implement" => Some(AgentTask::Implement),
            "review" => Some(AgentTask::Review),
            "default" => Some(AgentTask::Default),
            _ => None,
        }
    }
}

/// Handle to a registered language-specific class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId(u16);

/// Static definition of a language-specific class.
#[derive(Debug)]
pub struct ExtensionClassDef {
    pub name: &'static str,
    pub language: Language,
    /// Core class used for ordering and as a fallback meaning
    pub parent: SemanticClass,
    pub rank: ImportanceRank,
    pub importance: ImportanceScores,
    pub description: &'static str,
}

/// Shared semantic vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticClass {
    // Tier 1
    DefinitionCallable,
    DefinitionType,
    DefinitionData,
    DefinitionTest,
    // Tier 2
    BoundaryModule,
    BoundaryError,
    BoundaryResource,
    DocumentationStructured,
    // Tier 3
    FlowBranching,
    FlowIteration,
    FlowControl,
    FlowAsync,
    // Tier 4
    OperationInvocation,
    OperationData,
    OperationOperator,
    ExpressionAnonymous,
    // Tier 5
    SyntaxKeyword,
    SyntaxIdentifier,
    SyntaxLiteral,
    SyntaxAnnotation,
    SyntaxPunctuation,
    /// A language-specific class from the [`ClassRegistry`]
    Extension(ExtensionId),
}

impl SemanticClass {
    /// Core classes in rank order.
    pub const CORE: [SemanticClass; 21] = [
        SemanticClass::DefinitionCallable,
        SemanticClass::DefinitionType,
        SemanticClass::DefinitionData,
        SemanticClass::DefinitionTest,
        SemanticClass::BoundaryModule,
        SemanticClass::BoundaryError,
        SemanticClass::BoundaryResource,
        SemanticClass::DocumentationStructured,
        SemanticClass::FlowBranching,
        SemanticClass::FlowIteration,
        SemanticClass::FlowControl,
        SemanticClass::FlowAsync,
        SemanticClass::OperationInvocation,
        SemanticClass::OperationData,
        SemanticClass::OperationOperator,
        SemanticClass::ExpressionAnonymous,
        SemanticClass::SyntaxKeyword,
        SemanticClass::SyntaxIdentifier,
        SemanticClass::SyntaxLiteral,
        SemanticClass::SyntaxAnnotation,
        SemanticClass::SyntaxPunctuation,
    ];

    fn extension(&self) -> Option<&'static ExtensionClassDef> {
        match self {
            SemanticClass::Extension(id) => ClassRegistry::global().get(*id),
            _ => None,
        }
    }

    /// The core class this resolves to; core classes resolve to themselves.
    pub fn core(&self) -> SemanticClass {
        self.extension().map(|def| def.parent).unwrap_or(*self)
    }

    pub fn is_core(&self) -> bool {
        !matches!(self, SemanticClass::Extension(_))
    }

    /// 1-based position in the rank-ordered core taxonomy.
    pub fn ordinal(&self) -> usize {
        let core = self.core();
        Self::CORE
            .iter()
            .position(|c| *c == core)
            .map(|i| i + 1)
            .unwrap_or(Self::CORE.len())
    }

    pub fn rank(&self) -> ImportanceRank {
        use SemanticClass::*;
        match self {
            DefinitionCallable | DefinitionType | DefinitionData | DefinitionTest => {
                ImportanceRank::PrimaryDefinitions
            }
            BoundaryModule | BoundaryError | BoundaryResource | DocumentationStructured => {
                ImportanceRank::BehavioralContracts
            }
            FlowBranching | FlowIteration | FlowControl | FlowAsync => ImportanceRank::ControlFlowLogic,
            OperationInvocation | OperationData | OperationOperator | ExpressionAnonymous => {
                ImportanceRank::OperationsExpressions
            }
            SyntaxKeyword | SyntaxIdentifier | SyntaxLiteral | SyntaxAnnotation | SyntaxPunctuation => {
                ImportanceRank::SyntaxReferences
            }
            Extension(_) => self
                .extension()
                .map(|def| def.rank)
                .unwrap_or(ImportanceRank::SyntaxReferences),
        }
    }

    pub fn importance(&self) -> ImportanceScores {
        use SemanticClass::*;
        match self {
            DefinitionCallable => ImportanceScores::new(0.95, 0.92, 0.85, 0.85, 0.92),
            DefinitionType => ImportanceScores::new(0.95, 0.92, 0.90, 0.80, 0.92),
            DefinitionData => ImportanceScores::new(0.85, 0.88, 0.80, 0.65, 0.90),
            DefinitionTest => ImportanceScores::new(0.88, 0.90, 0.70, 0.90, 0.85),
            BoundaryModule => ImportanceScores::new(0.85, 0.80, 0.85, 0.60, 0.75),
            BoundaryError => ImportanceScores::new(0.70, 0.85, 0.75, 0.95, 0.70),
            BoundaryResource => ImportanceScores::new(0.65, 0.80, 0.80, 0.90, 0.65),
            DocumentationStructured => ImportanceScores::new(0.55, 0.75, 0.50, 0.40, 0.95),
            FlowBranching => ImportanceScores::new(0.60, 0.75, 0.65, 0.90, 0.50),
            FlowIteration => ImportanceScores::new(0.50, 0.70, 0.65, 0.80, 0.45),
            FlowControl => ImportanceScores::new(0.45, 0.65, 0.55, 0.90, 0.35),
            FlowAsync => ImportanceScores::new(0.65, 0.80, 0.75, 0.85, 0.60),
            OperationInvocation => ImportanceScores::new(0.45, 0.65, 0.45, 0.75, 0.25),
            OperationData => ImportanceScores::new(0.35, 0.55, 0.50, 0.70, 0.25),
            OperationOperator => ImportanceScores::new(0.25, 0.45, 0.35, 0.60, 0.25),
            ExpressionAnonymous => ImportanceScores::new(0.40, 0.65, 0.50, 0.60, 0.45),
            SyntaxKeyword => ImportanceScores::new(0.05, 0.10, 0.10, 0.15, 0.05),
            SyntaxIdentifier => ImportanceScores::new(0.25, 0.40, 0.25, 0.45, 0.20),
            SyntaxLiteral => ImportanceScores::new(0.15, 0.20, 0.15, 0.40, 0.20),
            SyntaxAnnotation => ImportanceScores::new(0.35, 0.45, 0.60, 0.40, 0.40),
            SyntaxPunctuation => ImportanceScores::new(0.01, 0.02, 0.15, 0.20, 0.05),
            Extension(_) => self
                .extension()
                .map(|def| def.importance)
                .unwrap_or(ImportanceScores::new(0.0, 0.0, 0.0, 0.0, 0.0)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        use SemanticClass::*;
        match self {
            DefinitionCallable => "definition_callable",
            DefinitionType => "definition_type",
            DefinitionData => "definition_data",
            DefinitionTest => "definition_test",
            BoundaryModule => "boundary_module",
            BoundaryError => "boundary_error",
            BoundaryResource => "boundary_resource",
            DocumentationStructured => "documentation_structured",
            FlowBranching => "flow_branching",
            FlowIteration => "flow_iteration",
            FlowControl => "flow_control",
            FlowAsync => "flow_async",
            OperationInvocation => "operation_invocation",
            OperationData => "operation_data",
            OperationOperator => "operation_computation",
            ExpressionAnonymous => "expression_anonymous",
            SyntaxKeyword => "syntax_keyword",
            SyntaxIdentifier => "syntax_identifier",
            SyntaxLiteral => "syntax_literal",
            SyntaxAnnotation => "syntax_annotation",
            SyntaxPunctuation => "syntax_punctuation",
            Extension(_) => self.extension().map(|def| def.name).unwrap_or("unknown_extension"),
        }
    }
}

impl fmt::Display for SemanticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref GLOBAL_CLASSES: ClassRegistry = ClassRegistry::new();
}

/// Process-wide, append-only table of language-specific classes.
///
/// Entries are built from static definitions during startup; classification
/// only reads from it.
#[derive(Debug)]
pub struct ClassRegistry {
    classes: RwLock<Vec<&'static ExtensionClassDef>>,
}

impl ClassRegistry {
    fn new() -> Self {
        Self {
            classes: RwLock::new(Vec::new()),
        }
    }

    /// The shared registry that [`SemanticClass::Extension`] handles resolve against.
    pub fn global() -> &'static ClassRegistry {
        &GLOBAL_CLASSES
    }

    /// Register a definition, returning the existing handle if one with the
    /// same name and language is already present.
    pub fn register(&self, def: &'static ExtensionClassDef) -> SemanticClass {
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(idx) = classes
            .iter()
            .position(|c| c.name == def.name && c.language == def.language)
        {
            return SemanticClass::Extension(ExtensionId(idx as u16));
        }
        classes.push(def);
        SemanticClass::Extension(ExtensionId((classes.len() - 1) as u16))
    }

    pub fn get(&self, id: ExtensionId) -> Option<&'static ExtensionClassDef> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.0 as usize)
            .copied()
    }

    /// Look up a registered class by name for a language.
    pub fn find(&self, name: &str, language: Language) -> Option<SemanticClass> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|c| c.name == name && c.language == language)
            .map(|idx| SemanticClass::Extension(ExtensionId(idx as u16)))
    }

    pub fn len(&self) -> usize {
        self.classes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
