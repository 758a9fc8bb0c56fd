//! Query document AST consumed by the cache.
//!
//! This is the minimal slice of an executable document the cache needs:
//! operations with their variable declarations, named fragments, and
//! selection sets with aliases, arguments and directives. It is plain data
//! (serde-friendly), so documents can be produced by [`Document::parse`] or
//! built and stored by other tools.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::schema::OperationType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identity of the document; reads of the same source share parsed
    /// operations.
    pub source: String,
    pub operations: Vec<OperationDefinition>,
    pub fragments: BTreeMap<String, FragmentDefinition>,
}

impl Document {
    /// Builds a document from definitions, deriving its identity from their
    /// JSON form.
    pub fn new(
        operations: Vec<OperationDefinition>,
        fragments: BTreeMap<String, FragmentDefinition>,
    ) -> Self {
        let source = serde_json::to_string(&(&operations, &fragments)).unwrap_or_default();
        Self {
            source,
            operations,
            fragments,
        }
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub operation_type: OperationType,
    pub name: Option<String>,
    #[serde(default)]
    pub variable_definitions: Vec<VariableDefinition>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    /// Whether the declared type is nullable (no trailing `!`).
    pub nullable: bool,
    pub default_value: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    #[serde(default)]
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

pub type SelectionSet = Vec<Selection>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    pub fn directives(&self) -> &[Directive] {
        match self {
            Self::Field(field) => &field.directives,
            Self::FragmentSpread(spread) => &spread.directives,
            Self::InlineFragment(inline) => &inline.directives,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, AstValue>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// A leaf field with no alias, arguments or directives.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: BTreeMap::new(),
            directives: Vec::new(),
            selection_set: None,
        }
    }

    /// Name under which the field appears in results.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|directive| directive.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, AstValue>,
}

/// An argument value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstValue {
    Variable(String),
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Enum(String),
    List(Vec<AstValue>),
    Object(BTreeMap<String, AstValue>),
}

impl AstValue {
    /// Calls `visit` for every variable referenced within this value.
    pub fn for_each_variable(&self, visit: &mut impl FnMut(&str)) {
        match self {
            Self::Variable(name) => visit(name),
            Self::List(items) => {
                for item in items {
                    item.for_each_variable(&mut *visit);
                }
            }
            Self::Object(fields) => {
                for value in fields.values() {
                    value.for_each_variable(&mut *visit);
                }
            }
            _ => {}
        }
    }
}
