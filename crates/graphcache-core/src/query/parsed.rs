//! Parsed query trees.
//!
//! A selection set is flattened into a tree of [`ParsedQueryNode`]s keyed by
//! response name: fragment spreads and inline fragments are merged into the
//! surrounding map, so the read and write walks never see indirection.
//!
//! Trees come in two flavours, distinguished by their argument type:
//! - [`RawParsedQuery`]: arguments may still hold variable references.
//! - [`ParsedQuery`]: every variable has been substituted (see
//!   [`expand_variables`]); argument maps are plain JSON objects.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map as JsonMap, Value as JsonValue};

use super::ast::{AstValue, FragmentDefinition, Selection};
use crate::error::QueryError;
use crate::schema::PathSegment;

/// Directive marking a field as static for caching purposes.
pub const STATIC_DIRECTIVE: &str = "static";

/// An argument value that may reference variables anywhere within it.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Literal(JsonValue),
    /// Placeholder for an unresolved variable reference.
    Variable(String),
    List(Vec<ArgumentValue>),
    Object(BTreeMap<String, ArgumentValue>),
}

pub type ArgumentMap = BTreeMap<String, ArgumentValue>;

/// One field of a parsed selection set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQueryNode<A = JsonValue> {
    pub children: Option<ParsedQuery<A>>,
    /// Schema name of the field; only present when the field is aliased.
    pub schema_name: Option<String>,
    pub args: Option<A>,
    /// Whether some descendant is aliased or takes arguments.
    pub has_parameterized_children: bool,
}

pub type ParsedQuery<A = JsonValue> = BTreeMap<String, ParsedQueryNode<A>>;

pub type RawParsedQuery = ParsedQuery<ArgumentMap>;

/// Result of parsing a selection set.
#[derive(Debug, Clone)]
pub struct ParsedSelection {
    pub parsed_query: RawParsedQuery,
    /// Every variable referenced by arguments or directives.
    pub variables: BTreeSet<String>,
}

/// Parses a selection set, resolving fragment spreads against `fragments`.
pub fn parse_query(
    fragments: &BTreeMap<String, FragmentDefinition>,
    selection_set: &[Selection],
) -> Result<ParsedSelection, QueryError> {
    let mut builder = Builder {
        fragments,
        variables: BTreeSet::new(),
        active_fragments: Vec::new(),
    };
    let parsed_query = builder
        .build_node_map(selection_set, &[])?
        .ok_or(QueryError::EmptySelection)?;

    Ok(ParsedSelection {
        parsed_query,
        variables: builder.variables,
    })
}

struct Builder<'a> {
    fragments: &'a BTreeMap<String, FragmentDefinition>,
    variables: BTreeSet<String>,
    active_fragments: Vec<&'a str>,
}

impl<'a> Builder<'a> {
    fn build_node_map(
        &mut self,
        selection_set: &'a [Selection],
        path: &[PathSegment],
    ) -> Result<Option<RawParsedQuery>, QueryError> {
        let mut node_map = RawParsedQuery::new();

        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    let name = field.response_key();
                    let field_path = child_path(path, name);
                    let children = match &field.selection_set {
                        Some(selection_set) => self.build_node_map(selection_set, &field_path)?,
                        None => None,
                    };

                    // @static fields ignore their arguments and treat the
                    // alias as the real name.
                    let (args, schema_name) = if field.has_directive(STATIC_DIRECTIVE) {
                        (None, None)
                    } else {
                        let args = self.build_field_args(&field.arguments);
                        let schema_name = field.alias.as_ref().map(|_| field.name.clone());
                        (args, schema_name)
                    };

                    let has_parameterized_children = are_children_dynamic(children.as_ref());
                    let node = ParsedQueryNode {
                        children,
                        schema_name,
                        args,
                        has_parameterized_children,
                    };
                    let existing = node_map.remove(name);
                    node_map.insert(name.to_string(), merge_nodes(&field_path, existing, node)?);
                }
                Selection::FragmentSpread(spread) => {
                    let Some(fragment) = self.fragments.get(&spread.name) else {
                        return Err(QueryError::unknown_fragment(&spread.name, path.to_vec()));
                    };
                    if self.active_fragments.contains(&spread.name.as_str()) {
                        return Err(QueryError::invalid_operation(format!(
                            "fragment {} spreads itself",
                            spread.name
                        )));
                    }
                    self.active_fragments.push(&fragment.name);
                    let fragment_map = self.build_node_map(&fragment.selection_set, path)?;
                    self.active_fragments.pop();
                    merge_into(&mut node_map, path, fragment_map)?;
                }
                Selection::InlineFragment(inline) => {
                    let fragment_map = self.build_node_map(&inline.selection_set, path)?;
                    merge_into(&mut node_map, path, fragment_map)?;
                }
            }

            for directive in selection.directives() {
                for value in directive.arguments.values() {
                    value.for_each_variable(&mut |name| {
                        self.variables.insert(name.to_string());
                    });
                }
            }
        }

        Ok(if node_map.is_empty() {
            None
        } else {
            Some(node_map)
        })
    }

    fn build_field_args(&mut self, arguments: &BTreeMap<String, AstValue>) -> Option<ArgumentMap> {
        if arguments.is_empty() {
            return None;
        }
        Some(
            arguments
                .iter()
                .map(|(name, value)| (name.clone(), self.argument_value(value)))
                .collect(),
        )
    }

    fn argument_value(&mut self, value: &AstValue) -> ArgumentValue {
        match value {
            AstValue::Variable(name) => {
                self.variables.insert(name.clone());
                ArgumentValue::Variable(name.clone())
            }
            AstValue::Null => ArgumentValue::Literal(JsonValue::Null),
            AstValue::Boolean(value) => ArgumentValue::Literal(JsonValue::Bool(*value)),
            AstValue::Number(value) => ArgumentValue::Literal(JsonValue::Number(value.clone())),
            AstValue::String(value) | AstValue::Enum(value) => {
                ArgumentValue::Literal(JsonValue::String(value.clone()))
            }
            AstValue::List(items) => {
                ArgumentValue::List(items.iter().map(|item| self.argument_value(item)).collect())
            }
            AstValue::Object(fields) => ArgumentValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.argument_value(value)))
                    .collect(),
            ),
        }
    }
}

fn child_path(path: &[PathSegment], name: &str) -> Vec<PathSegment> {
    let mut child = path.to_vec();
    child.push(PathSegment::from(name));
    child
}

fn merge_into(
    node_map: &mut RawParsedQuery,
    path: &[PathSegment],
    fragment_map: Option<RawParsedQuery>,
) -> Result<(), QueryError> {
    for (name, node) in fragment_map.into_iter().flatten() {
        let existing = node_map.remove(&name);
        let merged = merge_nodes(&child_path(path, &name), existing, node)?;
        node_map.insert(name, merged);
    }
    Ok(())
}

/// Merges two selections of the same response key.
fn merge_nodes(
    path: &[PathSegment],
    existing: Option<ParsedQueryNode<ArgumentMap>>,
    incoming: ParsedQueryNode<ArgumentMap>,
) -> Result<ParsedQueryNode<ArgumentMap>, QueryError> {
    let Some(mut target) = existing else {
        return Ok(incoming);
    };

    if target.args != incoming.args {
        return Err(QueryError::conflicting_fields(
            "parameterization mismatch",
            path.to_vec(),
        ));
    }
    if target.schema_name != incoming.schema_name {
        return Err(QueryError::conflicting_fields("alias mismatch", path.to_vec()));
    }

    let Some(incoming_children) = incoming.children else {
        return Ok(target);
    };
    match target.children.as_mut() {
        None => target.children = Some(incoming_children),
        Some(children) => {
            for (name, child) in incoming_children {
                let existing = children.remove(&name);
                let merged = merge_nodes(&child_path(path, &name), existing, child)?;
                children.insert(name, merged);
            }
        }
    }
    target.has_parameterized_children |= incoming.has_parameterized_children;

    Ok(target)
}

/// Whether any child is aliased, takes arguments, or has such descendants.
pub fn are_children_dynamic<A>(children: Option<&ParsedQuery<A>>) -> bool {
    children.is_some_and(|children| {
        children.values().any(|child| {
            child.has_parameterized_children || child.args.is_some() || child.schema_name.is_some()
        })
    })
}

/// Substitutes bound variable values into every argument of the tree.
pub fn expand_variables(
    parsed: &RawParsedQuery,
    variables: &JsonMap<String, JsonValue>,
) -> Result<ParsedQuery, QueryError> {
    parsed
        .iter()
        .map(|(key, node)| {
            let children = match &node.children {
                Some(children) => Some(expand_variables(children, variables)?),
                None => None,
            };
            let args = match &node.args {
                Some(args) => Some(expand_field_arguments(args, variables)?),
                None => None,
            };
            Ok((
                key.clone(),
                ParsedQueryNode {
                    children,
                    schema_name: node.schema_name.clone(),
                    args,
                    has_parameterized_children: node.has_parameterized_children,
                },
            ))
        })
        .collect()
}

/// Resolves a field's arguments into a JSON object.
pub fn expand_field_arguments(
    args: &ArgumentMap,
    variables: &JsonMap<String, JsonValue>,
) -> Result<JsonValue, QueryError> {
    let mut expanded = JsonMap::new();
    for (name, value) in args {
        expanded.insert(name.clone(), expand_argument(value, variables)?);
    }
    Ok(JsonValue::Object(expanded))
}

fn expand_argument(
    value: &ArgumentValue,
    variables: &JsonMap<String, JsonValue>,
) -> Result<JsonValue, QueryError> {
    match value {
        ArgumentValue::Literal(value) => Ok(value.clone()),
        ArgumentValue::Variable(name) => variables
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::missing_variable(name)),
        ArgumentValue::List(items) => items
            .iter()
            .map(|item| expand_argument(item, variables))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        ArgumentValue::Object(fields) => {
            let mut expanded = JsonMap::new();
            for (name, value) in fields {
                expanded.insert(name.clone(), expand_argument(value, variables)?);
            }
            Ok(JsonValue::Object(expanded))
        }
    }
}
