//! Semantic classification of syntax node kinds.

pub mod classes;
pub mod classifier;
pub mod evidence;
pub mod extensions;

pub use classes::{
    AgentTask, ClassRegistry, ExtensionClassDef, ExtensionId, ImportanceRank, ImportanceScores,
    SemanticClass,
};
pub use classifier::{classify_kind, SemanticClassifier, FAST_PATH_CONFIDENCE};
pub use evidence::{aggregate, ClassificationMethod, ClassificationResult, EvidenceKind, EvidenceSet};
pub use extensions::{
    ClassificationContext, ContextualExtensionManager, LanguageExtensionManager, LanguagePattern,
};
