#![allow(dead_code)]

use std::sync::Arc;

use url::Url;
use users_gateway::graphql::Request;
use users_gateway::json_ext::Object;
use users_gateway::Gateway;
use users_gateway::Registry;
use users_gateway::ResourceClient;
use wiremock::MockServer;

pub(crate) mod mock_api;
pub(crate) mod req_asserts;

pub(crate) fn gateway(mock_server: &MockServer) -> Gateway {
    let client = ResourceClient::new(Url::parse(&mock_server.uri()).unwrap(), None).unwrap();
    Gateway::new(Arc::new(Registry::users_and_companies().unwrap()), client).unwrap()
}

/// Runs a query and returns the response as JSON.
pub(crate) async fn execute(
    mock_server: &MockServer,
    query: &str,
    variables: serde_json::Value,
) -> serde_json::Value {
    let variables: Object = match variables {
        serde_json::Value::Object(variables) => variables,
        _ => Object::new(),
    };
    let response = gateway(mock_server)
        .execute(Request::new(query).with_variables(variables))
        .await;
    serde_json::to_value(response).unwrap()
}
