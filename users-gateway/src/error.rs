//! Gateway errors.
use displaydoc::Display;
use thiserror::Error;

pub use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::graphql::Location;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Error types for execution.
///
/// Note that these are not actually returned to the client, but are instead converted to JSON for
/// [`struct@Error`].
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// remote {operation} {path} failed: {reason}
    ///
    /// note that this relates to a non-2xx status or a transport error, not to a GraphQL error
    RemoteCall {
        /// The HTTP method of the failed call.
        operation: String,

        /// The path relative to the resource service base URL.
        path: String,

        /// The response status, if a response was received at all.
        status: Option<u16>,

        /// The reason the call failed.
        reason: String,
    },

    /// remote {operation} {path} returned an unexpected body: {reason}
    MalformedResponse {
        /// The HTTP method of the call.
        operation: String,

        /// The path relative to the resource service base URL.
        path: String,

        /// The reason the body was rejected.
        reason: String,
    },

    /// missing required argument '{field}'
    Validation {
        /// The name of the missing argument.
        field: String,
    },

    /// argument '{field}' must be of type {expected}, got {actual}
    InvalidArgument {
        /// The name of the argument.
        field: String,

        /// The GraphQL type the argument should have.
        expected: String,

        /// The JSON kind that was supplied.
        actual: String,
    },

    /// could not resolve field '{field}': {cause}
    PartialResolution {
        /// The name of the relation field that failed.
        field: String,

        /// The underlying failure.
        cause: Box<FetchError>,
    },

    /// unknown field '{field}' on type '{type_name}'
    UnknownField {
        /// The parent type.
        type_name: String,

        /// The field that has no descriptor.
        field: String,
    },

    /// schema error: {0}
    Schema(#[from] RegistryError),
}

impl FetchError {
    /// Convert the fetch error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let mut extensions = self.custom_extension_details().unwrap_or_default();
        extensions.insert("code".to_string(), self.extension_code().into());

        Error {
            message: self.to_string(),
            locations: Default::default(),
            path,
            extensions,
        }
    }

    /// Convert the error to an appropriate response.
    ///
    /// Used for operation level failures: the data is `null` and the error is the only one
    /// returned.
    pub fn to_response(&self) -> Response {
        Response::new(Some(Value::Null), vec![self.to_graphql_error(None)])
    }

    /// Wraps this error as the failure of a nested relation field.
    pub(crate) fn into_partial(self, field: impl Into<String>) -> FetchError {
        FetchError::PartialResolution {
            field: field.into(),
            cause: Box::new(self),
        }
    }
}

impl ErrorExtension for FetchError {
    fn extension_code(&self) -> String {
        match self {
            FetchError::RemoteCall { .. } => "REMOTE_CALL_ERROR",
            FetchError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            FetchError::Validation { .. } => "VALIDATION_ERROR",
            FetchError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            FetchError::PartialResolution { .. } => "PARTIAL_RESOLUTION_ERROR",
            FetchError::UnknownField { .. } => "UNKNOWN_FIELD",
            FetchError::Schema(_) => "SCHEMA_ERROR",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut extensions = Object::new();
        match self {
            FetchError::RemoteCall {
                operation,
                path,
                status,
                ..
            } => {
                extensions.insert("operation".to_string(), operation.clone().into());
                extensions.insert("path".to_string(), path.clone().into());
                if let Some(status) = status {
                    extensions.insert("http".to_string(), serde_json::json!({ "status": status }));
                }
            }
            FetchError::MalformedResponse {
                operation, path, ..
            } => {
                extensions.insert("operation".to_string(), operation.clone().into());
                extensions.insert("path".to_string(), path.clone().into());
            }
            FetchError::Validation { field } => {
                extensions.insert("field".to_string(), field.clone().into());
            }
            FetchError::InvalidArgument {
                field, expected, ..
            } => {
                extensions.insert("field".to_string(), field.clone().into());
                extensions.insert("expected".to_string(), expected.clone().into());
            }
            FetchError::PartialResolution { field, cause } => {
                extensions.insert("field".to_string(), field.clone().into());
                let mut cause_extensions = cause.custom_extension_details().unwrap_or_default();
                cause_extensions.insert("code".to_string(), cause.extension_code().into());
                extensions.insert("cause".to_string(), Value::Object(cause_extensions));
            }
            FetchError::UnknownField { type_name, field } => {
                extensions.insert("type".to_string(), type_name.clone().into());
                extensions.insert("field".to_string(), field.clone().into());
            }
            FetchError::Schema(_) => return None,
        }
        Some(extensions)
    }
}

/// Error types for the type registry.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum RegistryError {
    /// unknown type '{0}'
    UnknownType(String),

    /// type '{0}' is defined more than once
    DuplicateType(String),

    /// field '{field}' is defined more than once on '{type_name}'
    DuplicateField {
        /// The type holding the duplicate.
        type_name: String,
        /// The duplicated field name.
        field: String,
    },

    /// forwarded argument '{argument}' is not declared on '{field}'
    UnknownArgument {
        /// The mutation field forwarding the argument.
        field: String,
        /// The undeclared argument.
        argument: String,
    },

    /// invalid path template '{template}': {reason}
    InvalidPathTemplate {
        /// The offending template.
        template: String,
        /// Why it was rejected.
        reason: String,
    },

    /// the generated GraphQL schema is invalid: {0}
    InvalidSchema(String),
}

/// Errors raised before any operation executes.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum RequestError {
    /// must provide a query string
    MissingQuery,

    /// {message}
    Parse {
        /// The parser message.
        message: String,
        /// Where in the document the problem was found.
        location: Option<Location>,
    },

    /// {message}
    Validation {
        /// The validation message.
        message: String,
        /// Where in the document the problem was found.
        location: Option<Location>,
    },

    /// unknown operation named '{0}'
    UnknownOperationName(String),

    /// the document must name the operation to execute when it contains more than one
    AmbiguousOperation,

    /// subscriptions are not supported
    SubscriptionNotSupported,
}

impl ErrorExtension for RequestError {
    fn extension_code(&self) -> String {
        match self {
            RequestError::MissingQuery => "GRAPHQL_MISSING_QUERY",
            RequestError::Parse { .. } => "GRAPHQL_PARSE_FAILED",
            RequestError::Validation { .. } => "GRAPHQL_VALIDATION_FAILED",
            RequestError::UnknownOperationName(_) | RequestError::AmbiguousOperation => {
                "GRAPHQL_UNKNOWN_OPERATION_NAME"
            }
            RequestError::SubscriptionNotSupported => "SUBSCRIPTION_NOT_SUPPORTED",
        }
        .to_string()
    }
}

impl RequestError {
    pub fn to_graphql_error(&self) -> Error {
        let mut error = Error::new(self.to_string()).with_extension("code", self.extension_code());
        if let RequestError::Parse {
            location: Some(location),
            ..
        }
        | RequestError::Validation {
            location: Some(location),
            ..
        } = self
        {
            error = error.with_location(*location);
        }
        error
    }
}
