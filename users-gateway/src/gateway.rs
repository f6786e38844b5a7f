//! Entry point of GraphQL execution: from a [`Request`] to a [`Response`].

use std::sync::Arc;

use apollo_compiler::executable::OperationType;
use apollo_compiler::diagnostic::Diagnostic;
use apollo_compiler::validation::DiagnosticData;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use futures::future::join_all;

use crate::client::ResourceClient;
use crate::engine::Engine;
use crate::engine::Operation;
use crate::engine::Resolved;
use crate::error::Error;
use crate::error::FetchError;
use crate::error::RegistryError;
use crate::error::RequestError;
use crate::graphql::Location;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::json_ext::Value;
use crate::registry::Registry;
use crate::spec::variables_with_defaults;
use crate::spec::Selection;

/// Executes GraphQL requests against the resource service.
///
/// The schema is the SDL generated by the [`Registry`], parsed once at construction.
#[derive(Clone, Debug)]
pub struct Gateway {
    engine: Engine,
    schema: Arc<Valid<Schema>>,
}

impl Gateway {
    pub fn new(registry: Arc<Registry>, client: ResourceClient) -> Result<Self, RegistryError> {
        let schema = Schema::parse_and_validate(registry.to_sdl(), "schema.graphql")
            .map_err(|err| RegistryError::InvalidSchema(err.errors.to_string()))?;

        Ok(Self {
            engine: Engine::new(registry, client),
            schema: Arc::new(schema),
        })
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Executes a request.
    ///
    /// Request level problems (parse or validation errors, unknown operation names) produce a
    /// response without `data`. A failing root field produces `data: null` and a single error. Failing
    /// nested relations leave `null` in their slot and add an error pointing at it.
    pub async fn execute(&self, request: Request) -> Response {
        let Some(query) = request.query.as_deref() else {
            return request_error(RequestError::MissingQuery);
        };

        let schema: &Valid<Schema> = &self.schema;
        let document = match ExecutableDocument::parse(schema, query, "query.graphql") {
            Ok(document) => document,
            Err(with_errors) => {
                tracing::debug!(errors = %with_errors.errors, "could not parse the query");
                return Response::from_errors(parse_errors(&with_errors.errors));
            }
        };

        let operation_name = request.operation_name.as_deref();
        match document.operations.get(operation_name) {
            Ok(operation) if operation.operation_type == OperationType::Subscription => {
                return request_error(RequestError::SubscriptionNotSupported)
            }
            Ok(_) => {}
            Err(_) => return request_error(operation_not_found(operation_name)),
        }

        let document = match document.validate(schema) {
            Ok(document) => document.into_inner(),
            Err(with_errors) => {
                let errors = validation_errors(&with_errors.errors);
                if !errors.is_empty() {
                    tracing::debug!(errors = %with_errors.errors, "the query is invalid");
                    return Response::from_errors(errors);
                }
                // Missing required arguments are reported by the engine, per field.
                with_errors.partial
            }
        };
        let Ok(operation) = document.operations.get(operation_name) else {
            return request_error(operation_not_found(operation_name));
        };

        let root_type = match operation.operation_type {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => {
                return request_error(RequestError::SubscriptionNotSupported)
            }
        };

        let variables = variables_with_defaults(operation, &request.variables);
        let selections =
            Selection::from_selection_set(&operation.selection_set, &document, &variables);

        let root_fields: Vec<(&Selection, Operation)> = selections
            .iter()
            .filter(|selection| !selection.is_typename())
            .map(|selection| {
                let field = selection.name.clone();
                let arguments = selection.arguments.clone();
                let operation = match operation.operation_type {
                    OperationType::Mutation => Operation::Mutation { field, arguments },
                    _ => Operation::Query { field, arguments },
                };
                (selection, operation)
            })
            .collect();

        let results = match operation.operation_type {
            OperationType::Mutation => self.execute_sequentially(&root_fields).await,
            _ => {
                join_all(root_fields.iter().map(|(selection, operation)| {
                    self.engine.execute(operation, &selection.selections)
                }))
                .await
            }
        };

        let mut results = results.into_iter();
        let mut data = Object::new();
        let mut errors = Vec::new();
        for selection in &selections {
            if selection.is_typename() {
                data.insert(
                    selection.response_key.clone(),
                    Value::String(root_type.to_string()),
                );
                continue;
            }
            match results.next() {
                Some(Ok(resolved)) => {
                    errors.extend(rebase(resolved.errors, &selection.response_key));
                    data.insert(selection.response_key.clone(), resolved.data);
                }
                Some(Err(error)) => {
                    tracing::warn!(field = %selection.name, %error, "root field failed");
                    return error.to_response();
                }
                // Sequential execution stopped at a failure.
                None => break,
            }
        }

        Response::new(Some(Value::Object(data)), errors)
    }

    /// Mutations run one after the other, in document order, and stop at the first failure.
    async fn execute_sequentially(
        &self,
        root_fields: &[(&Selection, Operation)],
    ) -> Vec<Result<Resolved, FetchError>> {
        let mut results = Vec::with_capacity(root_fields.len());
        for (selection, operation) in root_fields {
            let result = self.engine.execute(operation, &selection.selections).await;
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}

fn request_error(error: RequestError) -> Response {
    Response::from_errors(vec![error.to_graphql_error()])
}

fn operation_not_found(operation_name: Option<&str>) -> RequestError {
    match operation_name {
        Some(name) => RequestError::UnknownOperationName(name.to_string()),
        None => RequestError::AmbiguousOperation,
    }
}

fn validation_errors(diagnostics: &DiagnosticList) -> Vec<Error> {
    diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.error.unstable_error_name() != Some("RequiredArgument"))
        .map(|diagnostic| {
            RequestError::Validation {
                message: diagnostic.error.to_string(),
                location: location(&diagnostic),
            }
            .to_graphql_error()
        })
        .collect()
}

fn location(diagnostic: &Diagnostic<'_, DiagnosticData>) -> Option<Location> {
    diagnostic.line_column_range().map(|range| Location {
        line: range.start.line as u32,
        column: range.start.column as u32,
    })
}

fn parse_errors(diagnostics: &DiagnosticList) -> Vec<Error> {
    diagnostics
        .iter()
        .map(|diagnostic| {
            RequestError::Parse {
                message: diagnostic.error.to_string(),
                location: location(&diagnostic),
            }
            .to_graphql_error()
        })
        .collect()
}

/// Prefixes error paths, relative to a root value, with the root response key.
fn rebase(errors: Vec<Error>, response_key: &str) -> impl Iterator<Item = Error> + '_ {
    errors.into_iter().map(move |mut error| {
        let mut elements = vec![PathElement::Key(response_key.to_string())];
        elements.extend(error.path.take().map(|path| path.0).unwrap_or_default());
        error.path = Some(Path(elements));
        error
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;

    async fn gateway(server: &MockServer) -> Gateway {
        Gateway::new(
            Arc::new(Registry::users_and_companies().unwrap()),
            ResourceClient::new(Url::parse(&server.uri()).unwrap(), None).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn missing_query() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(serde_json::from_value(json!({})).unwrap())
            .await;
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_MISSING_QUERY")
        );
    }

    #[tokio::test]
    async fn syntax_error_has_a_location() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new("{ user(id: \"1\") { id "))
            .await;
        assert_eq!(response.data, None);
        assert!(!response.errors.is_empty());
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_PARSE_FAILED")
        );
        assert_eq!(response.errors[0].locations.len(), 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_operation_name() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new("query A { __typename }").with_operation_name("B"))
            .await;
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_UNKNOWN_OPERATION_NAME")
        );
        assert_eq!(response.errors[0].message, "unknown operation named 'B'");
    }

    #[tokio::test]
    async fn several_operations_need_a_name() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new("query A { a: __typename } query B { b: __typename }"))
            .await;
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_UNKNOWN_OPERATION_NAME")
        );
        assert_eq!(
            response.errors[0].message,
            "the document must name the operation to execute when it contains more than one"
        );
    }

    #[tokio::test]
    async fn invalid_query_issues_no_call() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new(
                r#"{ user(id: "23", bogus: 1) { firstName company } }"#,
            ))
            .await;
        assert_eq!(response.data, None);
        assert!(!response.errors.is_empty());
        for error in &response.errors {
            assert_eq!(error.extension_code(), Some("GRAPHQL_VALIDATION_FAILED"));
            assert_eq!(error.locations.len(), 1);
        }
        assert!(response
            .errors
            .iter()
            .any(|error| error.message.contains("bogus")));
        assert!(response
            .errors
            .iter()
            .any(|error| error.message.contains("subselection")));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_required_argument_is_left_to_the_engine() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new("mutation { addUser(age: 30) { id } }"))
            .await;
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].extension_code(), Some("VALIDATION_ERROR"));
        assert_eq!(
            response.errors[0].extensions.get("field"),
            Some(&json!("firstName"))
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn operation_is_picked_by_name() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(
                Request::new("query A { a: __typename } mutation B { b: __typename }")
                    .with_operation_name("B"),
            )
            .await;
        assert_eq!(response.data, Some(json!({"b": "Mutation"})));
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn subscriptions_are_rejected() {
        let server = MockServer::start().await;
        let response = gateway(&server)
            .await
            .execute(Request::new("subscription { __typename }"))
            .await;
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code(),
            Some("SUBSCRIPTION_NOT_SUPPORTED")
        );
    }

    #[tokio::test]
    async fn nested_error_paths_start_at_the_response_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/23"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": "23", "firstName": "Bill", "age": 20, "companyId": "1"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/companies/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = gateway(&server)
            .await
            .execute(Request::new(
                r#"{ bill: user(id: "23") { firstName employer: company { name } } }"#,
            ))
            .await;

        assert_eq!(
            response.data.as_ref().map(|data| &data["bill"]["employer"]),
            Some(&Value::Null)
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("bill/employer")));
    }

    #[test]
    fn rebase_prefixes_paths() {
        let errors = vec![
            Error::new("a").with_path(Path::from("company")),
            Error::new("b"),
        ];
        let rebased: Vec<Error> = rebase(errors, "user").collect();
        assert_eq!(rebased[0].path, Some(Path::from("user/company")));
        assert_eq!(rebased[1].path, Some(Path::from("user")));
    }
}
