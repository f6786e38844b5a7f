use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Object;

/// A GraphQL `Request` as received by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL operation (e.g., query, mutation) string.
    ///
    /// For historical purposes, the term "query" is commonly used to refer to
    /// *any* GraphQL operation which might be, e.g., a `mutation`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,

    /// The (optional) GraphQL operation name.
    ///
    /// When specified, this name must match the name of an operation in the
    /// GraphQL document.  When excluded, there must exist only a single
    /// operation in the GraphQL document.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables in the form of a JSON object.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub variables: Object,
}

impl Request {
    /// Creates a request for a single query string without variables.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn with_variables(mut self, variables: Object) -> Self {
        self.variables = variables;
        self
    }
}

// NOTE: this deserialize helper is used to transform `null` to Default::default()
fn deserialize_null_default<'de, D, T: Default + Deserialize<'de>>(
    deserializer: D,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <Option<T>>::deserialize(deserializer).map(|x| x.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request() {
        let data = json!(
        {
          "query": "query aTest($id: String) { user(id: $id) { firstName } }",
          "operationName": "aTest",
          "variables": { "id": "23" },
        });
        let result = serde_json::from_value::<Request>(data);
        assert_eq!(
            result.unwrap(),
            Request::new("query aTest($id: String) { user(id: $id) { firstName } }")
                .with_operation_name("aTest")
                .with_variables(json!({ "id": "23" }).as_object().cloned().unwrap())
        );
    }

    #[test]
    fn test_no_variables() {
        let result = serde_json::from_value::<Request>(json!(
        {
          "query": "{ user(id: \"1\") { id } }",
          "variables": null,
        }));
        assert_eq!(
            result.unwrap(),
            Request::new("{ user(id: \"1\") { id } }")
        );
    }
}
