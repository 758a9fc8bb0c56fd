//! Per-document metadata.
//!
//! A [`QueryInfo`] is built once per document (and fragment name) and holds
//! everything derived from the document alone: the flattened selection tree,
//! the variables it uses and the defaults it declares.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use super::ast::{Document, OperationDefinition, SelectionSet};
use super::parsed::{parse_query, RawParsedQuery};
use crate::error::QueryError;
use crate::schema::OperationType;

#[derive(Debug, Clone)]
pub struct QueryInfo {
    pub document: Arc<Document>,
    pub operation_type: OperationType,
    pub operation_name: Option<String>,
    /// Set when the selection is a named fragment rather than an operation.
    pub fragment_name: Option<String>,
    pub parsed: RawParsedQuery,
    /// Variables referenced anywhere in the selection.
    pub variables: BTreeSet<String>,
    /// Defaults for nullable variables; `null` when none is declared.
    pub variable_defaults: JsonMap<String, JsonValue>,
}

impl QueryInfo {
    /// Builds the info for the document's operation, or for one of its
    /// fragments when `fragment_name` is given.
    ///
    /// Fragment selections skip variable validation: fragments cannot
    /// declare variables, so callers supply them directly.
    pub fn new(document: Arc<Document>, fragment_name: Option<&str>) -> Result<Self, QueryError> {
        match fragment_name {
            Some(name) => {
                let fragment = document
                    .fragment(name)
                    .ok_or_else(|| QueryError::unknown_fragment(name, Vec::new()))?;
                let selection = parse_query(&document.fragments, &fragment.selection_set)?;
                Ok(Self {
                    operation_type: OperationType::Query,
                    operation_name: None,
                    fragment_name: Some(name.to_string()),
                    parsed: selection.parsed_query,
                    variables: selection.variables,
                    variable_defaults: JsonMap::new(),
                    document,
                })
            }
            None => {
                let operation = operation_or_die(&document)?;
                let selection = parse_query(&document.fragments, &operation.selection_set)?;
                let info = Self {
                    operation_type: operation.operation_type,
                    operation_name: operation.name.clone(),
                    fragment_name: None,
                    parsed: selection.parsed_query,
                    variables: selection.variables,
                    variable_defaults: variable_defaults(operation),
                    document: document.clone(),
                };
                info.assert_valid(operation)?;
                Ok(info)
            }
        }
    }

    /// Selection set the parsed tree was built from.
    pub fn selection_set(&self) -> Option<&SelectionSet> {
        match &self.fragment_name {
            Some(name) => self
                .document
                .fragment(name)
                .map(|fragment| &fragment.selection_set),
            None => operation_or_die(&self.document)
                .ok()
                .map(|operation| &operation.selection_set),
        }
    }

    fn assert_valid(&self, operation: &OperationDefinition) -> Result<(), QueryError> {
        let declared: BTreeSet<&str> = operation
            .variable_definitions
            .iter()
            .map(|definition| definition.name.as_str())
            .collect();

        let mut messages = Vec::new();
        for name in &self.variables {
            if !declared.contains(name.as_str()) {
                messages.push(format!("Variable ${} is used, but not declared", name));
            }
        }
        for name in &declared {
            if !self.variables.contains(*name) {
                messages.push(format!("Variable ${} is unused", name));
            }
        }
        if messages.is_empty() {
            return Ok(());
        }

        let details: String = messages.iter().map(|m| format!("\n * {}", m)).collect();
        Err(QueryError::invalid_operation(format!(
            "Validation errors in {} {}:{}",
            self.operation_type.as_str(),
            self.operation_name.as_deref().unwrap_or("<unknown>"),
            details
        )))
    }
}

/// The document's single operation.
pub fn operation_or_die(document: &Document) -> Result<&OperationDefinition, QueryError> {
    match document.operations.as_slice() {
        [] => Err(QueryError::MissingOperation),
        [operation] => Ok(operation),
        operations => Err(QueryError::AmbiguousOperation {
            count: operations.len(),
        }),
    }
}

fn variable_defaults(operation: &OperationDefinition) -> JsonMap<String, JsonValue> {
    operation
        .variable_definitions
        .iter()
        .filter(|definition| definition.nullable)
        .map(|definition| {
            let value = definition.default_value.clone().unwrap_or(JsonValue::Null);
            (definition.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn info(source: &str) -> Result<QueryInfo, QueryError> {
        QueryInfo::new(Arc::new(Document::parse(source).unwrap()), None)
    }

    #[test]
    fn test_operation_metadata() {
        let info = info("mutation rename($id: ID!) { rename(id: $id) { id } }").unwrap();

        assert_eq!(info.operation_type, OperationType::Mutation);
        assert_eq!(info.operation_name.as_deref(), Some("rename"));
        assert!(info.variables.contains("id"));
        assert!(info.selection_set().is_some());
    }

    #[test]
    fn test_variable_defaults() {
        let info = info(
            "query ($a: Int = 5, $b: String, $c: ID!) { foo(a: $a, b: $b, c: $c) { id } }",
        )
        .unwrap();

        let mut expected = JsonMap::new();
        expected.insert("a".to_string(), json!(5));
        expected.insert("b".to_string(), JsonValue::Null);
        assert_eq!(info.variable_defaults, expected);
    }

    #[test]
    fn test_undeclared_and_unused_variables() {
        let err = info("query getThings($unused: Int) { foo(id: $missing) { id } }").unwrap_err();

        assert_eq!(
            err,
            QueryError::invalid_operation(
                "Validation errors in query getThings:\n * Variable $missing is used, but not declared\n * Variable $unused is unused"
            )
        );
    }

    #[test]
    fn test_directive_variables_count_as_used() {
        assert!(info("query ($show: Boolean!) { viewer @include(if: $show) { id } }").is_ok());
    }

    #[test]
    fn test_fragment_selection_skips_validation() {
        let document = Arc::new(
            Document::parse(
                "query Viewer { viewer { id } } \
                 fragment UserFields on User { id friends(first: $count) { id } }",
            )
            .unwrap(),
        );

        let info = QueryInfo::new(document.clone(), Some("UserFields")).unwrap();
        assert_eq!(info.fragment_name.as_deref(), Some("UserFields"));
        assert!(info.variables.contains("count"));

        let err = QueryInfo::new(document, Some("Missing")).unwrap_err();
        assert!(matches!(err, QueryError::UnknownFragment { .. }));
    }

    #[test]
    fn test_operation_count() {
        let document = Arc::new(Document::new(Vec::new(), Default::default()));
        assert_eq!(
            QueryInfo::new(document, None).unwrap_err(),
            QueryError::MissingOperation
        );

        let err = info("query a { x } query b { y }").unwrap_err();
        assert_eq!(err, QueryError::AmbiguousOperation { count: 2 });
    }
}
