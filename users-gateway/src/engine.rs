//! The resolver engine.
//!
//! Executes a root operation through the [`ResourceClient`], then walks the requested
//! selections depth-first: every selected relation field renders its path template against
//! the parent entity and triggers one more remote call. Sibling relations, and the entities
//! of a list, are resolved concurrently.

use std::sync::Arc;

use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::Instrument;

use crate::client::ResourceClient;
use crate::error::Error;
use crate::error::FetchError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::mutation::MutationDispatcher;
use crate::registry::Cardinality;
use crate::registry::EntityType;
use crate::registry::PathTemplate;
use crate::registry::Registry;
use crate::registry::RelationField;
use crate::spec::Selection;

/// A root-level request, constructed from the incoming GraphQL operation and executed once.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Query { field: String, arguments: Object },
    Mutation { field: String, arguments: Object },
}

impl Operation {
    pub fn field(&self) -> &str {
        match self {
            Operation::Query { field, .. } | Operation::Mutation { field, .. } => field,
        }
    }
}

/// The outcome of a successful root operation: the result tree and the errors of the nested
/// relation fields that could not be resolved.
///
/// Error paths are relative to the root value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolved {
    pub data: Value,
    pub errors: Vec<Error>,
}

impl Resolved {
    fn value(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    fn failed(path: Path, error: FetchError) -> Self {
        Self {
            data: Value::Null,
            errors: vec![error.to_graphql_error(Some(path))],
        }
    }
}

/// Resolves operations against the registry, one remote call per root and per selected
/// relation.
#[derive(Clone, Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    client: ResourceClient,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, client: ResourceClient) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn client(&self) -> &ResourceClient {
        &self.client
    }

    /// Executes one root operation and resolves the requested fields of its result.
    ///
    /// Failures of the root call abort the operation. Failures of nested relation fields are
    /// reported in [`Resolved::errors`] and leave `null` in their slot.
    pub async fn execute(
        &self,
        operation: &Operation,
        selections: &[Selection],
    ) -> Result<Resolved, FetchError> {
        match operation {
            Operation::Query { field, arguments } => {
                self.execute_query(field, arguments, selections).await
            }
            Operation::Mutation { field, arguments } => {
                MutationDispatcher::new(self)
                    .execute(field, arguments, selections)
                    .await
            }
        }
    }

    async fn execute_query(
        &self,
        field: &str,
        arguments: &Object,
        selections: &[Selection],
    ) -> Result<Resolved, FetchError> {
        let root = self
            .registry
            .root_field(field)
            .ok_or_else(|| FetchError::UnknownField {
                type_name: "Query".to_string(),
                field: field.to_string(),
            })?;
        for argument in &root.arguments {
            argument.validate(arguments)?;
        }
        let path = render_arguments(&root.path, arguments)?;
        let entity_type = self.registry.resolve_type(&root.target_type)?;

        tracing::debug!(field, %path, "executing root query");
        let value = self.client.get(&path).await?;
        let value = check_shape(root.cardinality, value, "GET", &path)?;

        Ok(self
            .resolve_entity(entity_type, value, selections, Path::empty())
            .await)
    }

    /// Resolves the selected relation fields of an entity, or of every entity of a list.
    ///
    /// Scalars are kept as the resource service returned them.
    pub(crate) fn resolve_entity<'a>(
        &'a self,
        entity_type: &'a EntityType,
        value: Value,
        selections: &'a [Selection],
        path: Path,
    ) -> BoxFuture<'a, Resolved> {
        async move {
            match value {
                Value::Array(items) => {
                    let resolved = join_all(items.into_iter().enumerate().map(|(index, item)| {
                        self.resolve_entity(entity_type, item, selections, path.join_index(index))
                    }))
                    .await;

                    let mut errors = Vec::new();
                    let mut data = Vec::with_capacity(resolved.len());
                    for item in resolved {
                        data.push(item.data);
                        errors.extend(item.errors);
                    }
                    Resolved {
                        data: Value::Array(data),
                        errors,
                    }
                }
                Value::Object(mut object) => {
                    let relations = selections.iter().filter_map(|selection| {
                        let relation = entity_type.relation(&selection.name)?;
                        let path = path.join_key(selection.response_key.as_str());
                        Some(
                            self.resolve_relation(relation, &object, selection, path)
                                .map(move |resolved| (selection, resolved)),
                        )
                    });
                    let resolved = join_all(relations).await;

                    let mut errors = Vec::new();
                    for (selection, relation) in resolved {
                        object.insert(selection.response_key.clone(), relation.data);
                        errors.extend(relation.errors);
                    }
                    for selection in selections.iter().filter(|s| s.is_typename()) {
                        object.insert(
                            selection.response_key.clone(),
                            Value::String(entity_type.name.clone()),
                        );
                    }
                    Resolved {
                        data: Value::Object(object),
                        errors,
                    }
                }
                other => Resolved::value(other),
            }
        }
        .boxed()
    }

    fn resolve_relation<'a>(
        &'a self,
        relation: &'a RelationField,
        parent: &'a Object,
        selection: &'a Selection,
        path: Path,
    ) -> BoxFuture<'a, Resolved> {
        let span = tracing::debug_span!("relation", field = %relation.name, path = %path);
        async move {
            // Relation paths only ever link from the parent entity.
            let Some(remote_path) = relation.path.render(parent) else {
                tracing::debug!("link is missing, skipping the remote call");
                return Resolved::value(match relation.cardinality {
                    Cardinality::One => Value::Null,
                    Cardinality::Many => Value::Array(Vec::new()),
                });
            };

            let entity_type = match self.registry.resolve_type(&relation.target_type) {
                Ok(entity_type) => entity_type,
                Err(err) => {
                    return Resolved::failed(path, FetchError::from(err).into_partial(&selection.name))
                }
            };

            let value = match self.client.get(&remote_path).await.and_then(|value| {
                check_shape(relation.cardinality, value, "GET", &remote_path)
            }) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = %err, "relation could not be resolved");
                    return Resolved::failed(path, err.into_partial(&selection.name));
                }
            };

            self.resolve_entity(entity_type, value, &selection.selections, path)
                .await
        }
        .instrument(span)
        .boxed()
    }
}

/// Renders a root path from the operation arguments.
pub(crate) fn render_arguments(
    template: &PathTemplate,
    arguments: &Object,
) -> Result<String, FetchError> {
    template
        .render(arguments)
        .ok_or_else(|| FetchError::Validation {
            field: template
                .first_missing(arguments)
                .unwrap_or_default()
                .to_string(),
        })
}

/// Checks that the remote body has the shape the field's cardinality calls for.
pub(crate) fn check_shape(
    cardinality: Cardinality,
    value: Value,
    operation: &str,
    path: &str,
) -> Result<Value, FetchError> {
    match (cardinality, &value) {
        (_, Value::Null)
        | (Cardinality::One, Value::Object(_))
        | (Cardinality::Many, Value::Array(_)) => Ok(value),
        (cardinality, other) => Err(FetchError::MalformedResponse {
            operation: operation.to_string(),
            path: path.to_string(),
            reason: format!(
                "expected {}, got {}",
                match cardinality {
                    Cardinality::One => "an object",
                    Cardinality::Many => "a list",
                },
                other.kind()
            ),
        }),
    }
}
