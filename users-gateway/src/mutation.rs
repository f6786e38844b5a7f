//! Root mutations: argument validation, then exactly one `POST`, `PATCH` or `DELETE`.

use crate::engine::check_shape;
use crate::engine::render_arguments;
use crate::engine::Engine;
use crate::engine::Resolved;
use crate::error::FetchError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::registry::Cardinality;
use crate::registry::MutationField;
use crate::registry::MutationKind;
use crate::spec::Selection;

/// Translates a root mutation field into a single write against the resource service.
///
/// The entity the service sends back goes through the regular relation resolution, so
/// `addUser { company { name } }` works like a query would.
pub struct MutationDispatcher<'a> {
    engine: &'a Engine,
}

impl<'a> MutationDispatcher<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub async fn execute(
        &self,
        field: &str,
        arguments: &Object,
        selections: &[Selection],
    ) -> Result<Resolved, FetchError> {
        let mutation = self
            .engine
            .registry()
            .mutation_field(field)
            .ok_or_else(|| FetchError::UnknownField {
                type_name: "Mutation".to_string(),
                field: field.to_string(),
            })?;
        for argument in &mutation.arguments {
            argument.validate(arguments)?;
        }
        let path = render_arguments(&mutation.path, arguments)?;
        let entity_type = self.engine.registry().resolve_type(&mutation.target_type)?;

        let client = self.engine.client();
        let (method, value) = match mutation.kind {
            MutationKind::Create => ("POST", client.post(&path, &body(mutation, arguments)).await?),
            MutationKind::Update => ("PATCH", client.patch(&path, &body(mutation, arguments)).await?),
            MutationKind::Delete => ("DELETE", client.delete(&path).await?),
        };
        tracing::info!(mutation = field, method, %path, "mutation applied");
        let value = check_shape(Cardinality::One, value, method, &path)?;

        Ok(self
            .engine
            .resolve_entity(entity_type, value, selections, Path::empty())
            .await)
    }
}

/// The forwarded arguments the client supplied. An explicit `null` is forwarded as is.
fn body(mutation: &MutationField, arguments: &Object) -> Object {
    mutation
        .forwarded
        .iter()
        .filter_map(|name| {
            arguments
                .get(name)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}
