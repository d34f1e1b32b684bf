//! Grammar-level node kinds and their structural connections.
//!
//! A grammar describes each node kind once per language. Leaf kinds are
//! tokens; kinds with connections are composites. Categories are abstract
//! groupings that never appear in a concrete tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::processing::Language;

/// Cardinality of a connection, from its lower and upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OptionalSingle,
    OptionalMultiple,
    RequiredSingle,
    RequiredMultiple,
}

impl Cardinality {
    pub fn from_flags(allows_multiple: bool, requires_presence: bool) -> Self {
        match (allows_multiple, requires_presence) {
            (false, false) => Cardinality::OptionalSingle,
            (true, false) => Cardinality::OptionalMultiple,
            (false, true) => Cardinality::RequiredSingle,
            (true, true) => Cardinality::RequiredMultiple,
        }
    }

    pub fn allows_multiple(&self) -> bool {
        matches!(self, Cardinality::OptionalMultiple | Cardinality::RequiredMultiple)
    }

    pub fn requires_presence(&self) -> bool {
        matches!(self, Cardinality::RequiredSingle | Cardinality::RequiredMultiple)
    }
}

/// Whether a connection names its semantic role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionClass {
    /// A named field, e.g. `condition` or `body`
    Direct { role: String },
    /// Ordered children without a role
    Positional,
}

/// Directed edge from a composite kind to target kinds or categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    class: ConnectionClass,
    targets: BTreeSet<String>,
    cardinality: Cardinality,
}

impl Connection {
    pub fn direct(
        role: impl Into<String>,
        targets: impl IntoIterator<Item = String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            class: ConnectionClass::Direct { role: role.into() },
            targets: targets.into_iter().collect(),
            cardinality,
        }
    }

    pub fn positional(targets: impl IntoIterator<Item = String>, cardinality: Cardinality) -> Self {
        Self {
            class: ConnectionClass::Positional,
            targets: targets.into_iter().collect(),
            cardinality,
        }
    }

    pub fn class(&self) -> &ConnectionClass {
        &self.class
    }

    /// Role name; only direct connections carry one.
    pub fn role(&self) -> Option<&str> {
        match &self.class {
            ConnectionClass::Direct { role } => Some(role),
            ConnectionClass::Positional => None,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.class, ConnectionClass::Direct { .. })
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

/// What a token contributes to the code it appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSignificance {
    /// Keywords and operators
    Structural,
    Identifier,
    Literal,
    /// Brackets, separators and other punctuation
    Trivial,
    Comment,
}

/// Data specific to leaf kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub significance: TokenSignificance,
}

/// Data specific to kinds with connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeData {
    pub direct_connections: Vec<Connection>,
    pub positional_connections: Vec<Connection>,
}

/// Token vs composite dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Token(TokenData),
    Composite(CompositeData),
}

/// One grammar-level node kind. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeKindDescriptor {
    pub name: String,
    pub language: Language,
    pub categories: BTreeSet<String>,
    pub kind: NodeKind,
    /// Grammar "extras", almost always comments
    pub can_appear_anywhere: bool,
    /// Named rule, as opposed to an anonymous literal token
    pub is_explicit_rule: bool,
}

impl NodeKindDescriptor {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Token(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, NodeKind::Composite(_))
    }

    pub fn significance(&self) -> Option<TokenSignificance> {
        match &self.kind {
            NodeKind::Token(data) => Some(data.significance),
            NodeKind::Composite(_) => None,
        }
    }

    pub fn direct_connections(&self) -> &[Connection] {
        match &self.kind {
            NodeKind::Composite(data) => &data.direct_connections,
            NodeKind::Token(_) => &[],
        }
    }

    pub fn positional_connections(&self) -> &[Connection] {
        match &self.kind {
            NodeKind::Composite(data) => &data.positional_connections,
            NodeKind::Token(_) => &[],
        }
    }

    /// Role names of all direct connections.
    pub fn roles(&self) -> BTreeSet<&str> {
        self.direct_connections().iter().filter_map(Connection::role).collect()
    }

    pub fn is_single_category(&self) -> bool {
        self.categories.len() == 1
    }
}

/// Abstract grouping of node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub language: Language,
    pub members: BTreeSet<String>,
}

impl Category {
    pub fn contains(&self, kind_name: &str) -> bool {
        self.members.contains(kind_name)
    }
}
