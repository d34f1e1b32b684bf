//! Loader for tree-sitter `node-types.json` grammar descriptions.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::things::{
    Cardinality, Category, CompositeData, Connection, NodeKind, NodeKindDescriptor,
    TokenData, TokenSignificance,
};
use crate::error::Result;
use crate::processing::Language;

#[derive(Debug, Deserialize)]
struct TypeRef {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChildSpec {
    #[serde(default)]
    multiple: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    types: Vec<TypeRef>,
}

impl ChildSpec {
    fn cardinality(&self) -> Cardinality {
        Cardinality::from_flags(self.multiple, self.required)
    }

    fn targets(&self) -> impl Iterator<Item = String> + '_ {
        self.types.iter().map(|t| t.kind.clone())
    }
}

#[derive(Debug, Deserialize)]
struct NodeTypeEntry {
    #[serde(rename = "type")]
    kind: String,
    named: bool,
    #[serde(default)]
    subtypes: Option<Vec<TypeRef>>,
    #[serde(default)]
    fields: Option<BTreeMap<String, ChildSpec>>,
    #[serde(default)]
    children: Option<ChildSpec>,
    #[serde(default)]
    extra: bool,
}

/// Kinds treated as grammar extras when the description does not mark them.
fn is_known_extra(name: &str, language: Language) -> bool {
    name.contains("comment")
        || matches!(
            (language, name),
            (Language::Python, "line_continuation") | (Language::Php, "text_interpolation")
        )
}

const LITERAL_HINTS: &[&str] = &[
    "string", "number", "integer", "float", "char", "true", "false", "null", "nil", "none",
    "boolean", "escape_sequence", "literal",
];

/// Infer what a leaf kind contributes from its name.
pub fn infer_significance(name: &str, named: bool) -> TokenSignificance {
    let lower = name.to_lowercase();
    if lower.contains("comment") {
        return TokenSignificance::Comment;
    }
    if named {
        if lower.contains("identifier") || lower == "name" || lower.ends_with("_name") {
            return TokenSignificance::Identifier;
        }
        if LITERAL_HINTS.iter().any(|hint| lower.contains(hint)) {
            return TokenSignificance::Literal;
        }
        return TokenSignificance::Structural;
    }
    if name.chars().all(|c| matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | ':' | '.' | '"' | '\'' | '`')) {
        return TokenSignificance::Trivial;
    }
    TokenSignificance::Structural
}

/// Whether a structural token is an operator (all symbols) rather than a keyword.
pub fn is_operator_token(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_alphanumeric() || c == '_')
}

/// A loaded grammar: node kinds and categories for one language.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub language: Language,
    things: HashMap<String, Arc<NodeKindDescriptor>>,
    categories: HashMap<String, Category>,
}

impl Grammar {
    /// Parse a `node-types.json` document.
    pub fn from_node_types_json(language: Language, json: &str) -> Result<Self> {
        let entries: Vec<NodeTypeEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(language, entries))
    }

    fn from_entries(language: Language, entries: Vec<NodeTypeEntry>) -> Self {
        let mut categories: HashMap<String, Category> = HashMap::new();
        let mut membership: HashMap<String, BTreeSet<String>> = HashMap::new();

        for entry in &entries {
            if let Some(subtypes) = &entry.subtypes {
                let members: BTreeSet<String> = subtypes.iter().map(|t| t.kind.clone()).collect();
                for member in &members {
                    membership
                        .entry(member.clone())
                        .or_default()
                        .insert(entry.kind.clone());
                }
                categories.insert(
                    entry.kind.clone(),
                    Category {
                        name: entry.kind.clone(),
                        language,
                        members,
                    },
                );
            }
        }

        let mut things: HashMap<String, Arc<NodeKindDescriptor>> = HashMap::new();
        for entry in entries {
            if entry.subtypes.is_some() {
                continue;
            }
            // Prefer the named rule when a name is both a rule and a literal token.
            if !entry.named && things.get(&entry.kind).map_or(false, |t| t.is_explicit_rule) {
                continue;
            }

            let has_structure = entry.fields.as_ref().map_or(false, |f| !f.is_empty())
                || entry.children.is_some();
            let kind = if has_structure {
                let direct_connections = entry
                    .fields
                    .iter()
                    .flatten()
                    .map(|(role, spec)| Connection::direct(role.clone(), spec.targets(), spec.cardinality()))
                    .collect();
                let positional_connections = entry
                    .children
                    .iter()
                    .map(|spec| Connection::positional(spec.targets(), spec.cardinality()))
                    .collect();
                NodeKind::Composite(CompositeData {
                    direct_connections,
                    positional_connections,
                })
            } else {
                NodeKind::Token(TokenData {
                    significance: infer_significance(&entry.kind, entry.named),
                })
            };

            let descriptor = NodeKindDescriptor {
                categories: membership.remove(&entry.kind).unwrap_or_default(),
                can_appear_anywhere: entry.extra || is_known_extra(&entry.kind, language),
                is_explicit_rule: entry.named,
                name: entry.kind.clone(),
                language,
                kind,
            };
            things.insert(entry.kind, Arc::new(descriptor));
        }

        debug!(
            language = %language,
            things = things.len(),
            categories = categories.len(),
            "Loaded grammar"
        );

        Self {
            language,
            things,
            categories,
        }
    }

    pub fn get(&self, kind_name: &str) -> Option<Arc<NodeKindDescriptor>> {
        self.things.get(kind_name).cloned()
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn things(&self) -> impl Iterator<Item = &Arc<NodeKindDescriptor>> {
        self.things.values()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }
}
