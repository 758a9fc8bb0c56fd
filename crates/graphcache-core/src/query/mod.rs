//! Query documents and their parsed, cache-oriented form.
//!
//! - `ast`: plain-data executable documents.
//! - `document`: GraphQL source text adapter.
//! - `parsed`: flattened selection trees and variable expansion.
//! - `info`: per-document metadata and validation.

pub mod ast;
mod document;
pub mod info;
pub mod parsed;

pub use ast::{
    AstValue, Directive, Document, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, Selection, SelectionSet, VariableDefinition,
};
pub use info::QueryInfo;
pub use parsed::{
    are_children_dynamic, expand_variables, ArgumentMap, ArgumentValue, ParsedQuery,
    ParsedQueryNode, RawParsedQuery,
};
