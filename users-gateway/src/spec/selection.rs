use std::collections::HashSet;

use apollo_compiler::ast;
use apollo_compiler::executable;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;

use crate::json_ext::Object;
use crate::json_ext::Value;

const TYPENAME: &str = "__typename";

/// A requested field, possibly with nested requested fields.
///
/// A tree of selections is what drives relation resolution: a relation field that is not
/// selected never triggers a remote call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// The key under which the value appears in the response (the alias, or the field name).
    pub response_key: String,
    /// The schema field name.
    pub name: String,
    /// Arguments with variables already substituted. Arguments bound to an unset variable are
    /// left out.
    pub arguments: Object,
    pub selections: Vec<Selection>,
}

impl Selection {
    /// A field selection without alias nor arguments.
    pub fn field(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        let name = name.into();
        Self {
            response_key: name.clone(),
            name,
            arguments: Object::new(),
            selections,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.response_key = alias.into();
        self
    }

    pub fn with_arguments(mut self, arguments: Object) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn is_typename(&self) -> bool {
        self.name == TYPENAME
    }

    /// Flattens a selection set, expanding fragments and dropping skipped fields.
    ///
    /// Fields sharing a response key are merged.
    pub fn from_selection_set(
        selection_set: &executable::SelectionSet,
        document: &ExecutableDocument,
        variables: &Object,
    ) -> Vec<Selection> {
        let mut selections = Vec::new();
        collect(
            selection_set,
            document,
            variables,
            &mut HashSet::new(),
            &mut selections,
        );
        selections
    }
}

fn collect(
    selection_set: &executable::SelectionSet,
    document: &ExecutableDocument,
    variables: &Object,
    visited_fragments: &mut HashSet<String>,
    output: &mut Vec<Selection>,
) {
    for selection in &selection_set.selections {
        match selection {
            executable::Selection::Field(field) => {
                if is_skipped(&field.directives, variables) {
                    continue;
                }
                let mut nested = Vec::new();
                collect(
                    &field.selection_set,
                    document,
                    variables,
                    visited_fragments,
                    &mut nested,
                );
                let selection = Selection {
                    response_key: field.response_key().to_string(),
                    name: field.name.to_string(),
                    arguments: arguments_to_json(&field.arguments, variables),
                    selections: nested,
                };
                merge(output, selection);
            }
            executable::Selection::InlineFragment(fragment) => {
                if is_skipped(&fragment.directives, variables) {
                    continue;
                }
                collect(
                    &fragment.selection_set,
                    document,
                    variables,
                    visited_fragments,
                    output,
                );
            }
            executable::Selection::FragmentSpread(spread) => {
                if is_skipped(&spread.directives, variables) {
                    continue;
                }
                let name = spread.fragment_name.to_string();
                // A fragment cannot spread itself, directly or not.
                if !visited_fragments.insert(name.clone()) {
                    continue;
                }
                if let Some(fragment) = document.fragments.get(&spread.fragment_name) {
                    collect(
                        &fragment.selection_set,
                        document,
                        variables,
                        visited_fragments,
                        output,
                    );
                }
                visited_fragments.remove(&name);
            }
        }
    }
}

fn merge(output: &mut Vec<Selection>, selection: Selection) {
    match output
        .iter_mut()
        .find(|existing| existing.response_key == selection.response_key)
    {
        Some(existing) => {
            for nested in selection.selections {
                merge(&mut existing.selections, nested);
            }
        }
        None => output.push(selection),
    }
}

fn is_skipped(directives: &executable::DirectiveList, variables: &Object) -> bool {
    let condition = |name: &str| {
        directives
            .get(name)
            .and_then(|directive| directive.specified_argument_by_name("if"))
            .map(|value| value_to_json(value, variables))
            .and_then(|value| value.as_bool())
    };
    condition("skip").unwrap_or(false) || !condition("include").unwrap_or(true)
}

fn arguments_to_json(arguments: &[Node<ast::Argument>], variables: &Object) -> Object {
    arguments
        .iter()
        .filter(|argument| match &*argument.value {
            ast::Value::Variable(name) => variables.contains_key(name.as_str()),
            _ => true,
        })
        .map(|argument| {
            (
                argument.name.to_string(),
                value_to_json(&argument.value, variables),
            )
        })
        .collect()
}

/// Converts a GraphQL input value to JSON, substituting variables.
fn value_to_json(value: &ast::Value, variables: &Object) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .unwrap_or(Value::Null),
        ast::Value::String(s) => Value::String(s.to_string()),
        ast::Value::Int(i) => i
            .try_to_i32()
            .map(Value::from)
            .or_else(|_| i.try_to_f64().map(Value::from))
            .unwrap_or(Value::Null),
        ast::Value::Float(f) => f.try_to_f64().map(Value::from).unwrap_or(Value::Null),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| value_to_json(item, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.to_string(), value_to_json(value, variables)))
                .collect(),
        ),
    }
}

/// The request variables, completed with the defaults declared by the operation.
pub(crate) fn variables_with_defaults(
    operation: &executable::Operation,
    variables: &Object,
) -> Object {
    let mut merged = variables.clone();
    for definition in &operation.variables {
        if merged.contains_key(definition.name.as_str()) {
            continue;
        }
        if let Some(default_value) = &definition.default_value {
            merged.insert(
                definition.name.to_string(),
                value_to_json(default_value, variables),
            );
        }
    }
    merged
}
