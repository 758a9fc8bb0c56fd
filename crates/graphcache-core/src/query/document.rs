//! GraphQL source text to [`Document`], via `async-graphql-parser`.

use std::collections::BTreeMap;

use async_graphql_parser::types::{
    self as gql, DocumentOperations, OperationType as GqlOperationType,
};
use async_graphql_parser::{parse_query, Positioned};
use async_graphql_value::{ConstValue, Value as GqlValue};
use serde_json::Value as JsonValue;
use tracing::trace;

use super::ast::{
    AstValue, Directive, Document, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, Selection, SelectionSet, VariableDefinition,
};
use crate::error::QueryError;
use crate::schema::OperationType;

impl Document {
    /// Parses an executable GraphQL document.
    ///
    /// The source text becomes the document's identity.
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let parsed = parse_query(source).map_err(|e| QueryError::Parse {
            message: e.to_string(),
        })?;

        let mut operations = match parsed.operations {
            DocumentOperations::Single(operation) => vec![convert_operation(None, operation.node)],
            DocumentOperations::Multiple(operations) => operations
                .into_iter()
                .map(|(name, operation)| convert_operation(Some(name.to_string()), operation.node))
                .collect(),
        };
        operations.sort_by(|a, b| a.name.cmp(&b.name));

        let fragments: BTreeMap<_, _> = parsed
            .fragments
            .into_iter()
            .map(|(name, fragment)| {
                let name = name.to_string();
                let fragment = fragment.node;
                let definition = FragmentDefinition {
                    name: name.clone(),
                    type_condition: fragment.type_condition.node.on.node.to_string(),
                    directives: convert_directives(fragment.directives),
                    selection_set: convert_selection_set(fragment.selection_set.node),
                };
                (name, definition)
            })
            .collect();

        trace!(
            operations = operations.len(),
            fragments = fragments.len(),
            "Parsed query document"
        );

        Ok(Self {
            source: source.to_string(),
            operations,
            fragments,
        })
    }
}

fn convert_operation(name: Option<String>, operation: gql::OperationDefinition) -> OperationDefinition {
    let operation_type = match operation.ty {
        GqlOperationType::Query => OperationType::Query,
        GqlOperationType::Mutation => OperationType::Mutation,
        GqlOperationType::Subscription => OperationType::Subscription,
    };

    let variable_definitions = operation
        .variable_definitions
        .into_iter()
        .map(|definition| {
            let definition = definition.node;
            VariableDefinition {
                name: definition.name.node.to_string(),
                nullable: definition.var_type.node.nullable,
                default_value: definition.default_value.map(|value| const_to_json(value.node)),
            }
        })
        .collect();

    OperationDefinition {
        operation_type,
        name,
        variable_definitions,
        directives: convert_directives(operation.directives),
        selection_set: convert_selection_set(operation.selection_set.node),
    }
}

fn convert_selection_set(selection_set: gql::SelectionSet) -> SelectionSet {
    selection_set
        .items
        .into_iter()
        .map(|item| convert_selection(item.node))
        .collect()
}

fn convert_selection(selection: gql::Selection) -> Selection {
    match selection {
        gql::Selection::Field(field) => {
            let field = field.node;
            let children = convert_selection_set(field.selection_set.node);
            Selection::Field(Field {
                alias: field.alias.map(|alias| alias.node.to_string()),
                name: field.name.node.to_string(),
                arguments: convert_arguments(field.arguments),
                directives: convert_directives(field.directives),
                selection_set: if children.is_empty() {
                    None
                } else {
                    Some(children)
                },
            })
        }
        gql::Selection::FragmentSpread(spread) => {
            let spread = spread.node;
            Selection::FragmentSpread(FragmentSpread {
                name: spread.fragment_name.node.to_string(),
                directives: convert_directives(spread.directives),
            })
        }
        gql::Selection::InlineFragment(inline) => {
            let inline = inline.node;
            Selection::InlineFragment(InlineFragment {
                type_condition: inline
                    .type_condition
                    .map(|condition| condition.node.on.node.to_string()),
                directives: convert_directives(inline.directives),
                selection_set: convert_selection_set(inline.selection_set.node),
            })
        }
    }
}

fn convert_directives(directives: Vec<Positioned<gql::Directive>>) -> Vec<Directive> {
    directives
        .into_iter()
        .map(|directive| {
            let directive = directive.node;
            Directive {
                name: directive.name.node.to_string(),
                arguments: convert_arguments(directive.arguments),
            }
        })
        .collect()
}

fn convert_arguments(
    arguments: Vec<(Positioned<async_graphql_value::Name>, Positioned<GqlValue>)>,
) -> BTreeMap<String, AstValue> {
    arguments
        .into_iter()
        .map(|(name, value)| (name.node.to_string(), convert_value(value.node)))
        .collect()
}

fn convert_value(value: GqlValue) -> AstValue {
    match value {
        GqlValue::Variable(name) => AstValue::Variable(name.to_string()),
        GqlValue::Null => AstValue::Null,
        GqlValue::Number(number) => AstValue::Number(number),
        GqlValue::String(value) => AstValue::String(value),
        GqlValue::Boolean(value) => AstValue::Boolean(value),
        GqlValue::Enum(name) => AstValue::Enum(name.to_string()),
        GqlValue::List(items) => AstValue::List(items.into_iter().map(convert_value).collect()),
        GqlValue::Object(fields) => AstValue::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), convert_value(value)))
                .collect(),
        ),
        // Binary values cannot be written in source text.
        _ => AstValue::Null,
    }
}

fn const_to_json(value: ConstValue) -> JsonValue {
    match value {
        ConstValue::Null => JsonValue::Null,
        ConstValue::Number(number) => JsonValue::Number(number),
        ConstValue::String(value) => JsonValue::String(value),
        ConstValue::Boolean(value) => JsonValue::Bool(value),
        ConstValue::Enum(name) => JsonValue::String(name.to_string()),
        ConstValue::List(items) => JsonValue::Array(items.into_iter().map(const_to_json).collect()),
        ConstValue::Object(fields) => JsonValue::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), const_to_json(value)))
                .collect(),
        ),
        _ => JsonValue::Null,
    }
}
