use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::FetchError;
use crate::json_ext::Value;

/// A GraphQL response as sent back to the client.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    ///
    /// `None` when the request failed before execution started,
    /// `Some(Value::Null)` when the operation itself failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,
}

impl Response {
    pub fn new(data: Option<Value>, errors: Vec<Error>) -> Self {
        Self { data, errors }
    }

    /// A response carrying only request-level errors, without any data.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self { data: None, errors }
    }
}

impl From<FetchError> for Response {
    fn from(error: FetchError) -> Self {
        error.to_response()
    }
}
