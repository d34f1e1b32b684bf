//! Grammar model: per-language node kinds, categories and connections.
//!
//! Grammar facts are static for the process lifetime. They are loaded once
//! per language and shared read-only.

mod node_types;
mod registry;
mod things;

pub use node_types::{infer_significance, is_operator_token, Grammar};
pub use registry::{bundled_node_types, GrammarRegistry};
pub use things::{
    Cardinality, Category, CompositeData, Connection, ConnectionClass, NodeKind,
    NodeKindDescriptor, TokenData, TokenSignificance,
};
