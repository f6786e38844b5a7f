//! A minimal typed client for the remote resource service.

use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::error::FetchError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Issues `GET`/`POST`/`PATCH`/`DELETE` calls against the resource service.
///
/// Every call performs exactly one outbound request: there is no retry and no caching.
/// Cloning is cheap, clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct ResourceClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl ResourceClient {
    /// Construct a client that will resolve relative paths against `base_url`.
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch an entity or a list of entities.
    pub async fn get(&self, path: &str) -> Result<Value, FetchError> {
        self.call(Method::GET, path, None).await
    }

    /// Create an entity.
    pub async fn post(&self, path: &str, body: &Object) -> Result<Value, FetchError> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// Partially update an entity.
    pub async fn patch(&self, path: &str, body: &Object) -> Result<Value, FetchError> {
        self.call(Method::PATCH, path, Some(body)).await
    }

    /// Delete an entity, returning the representation the service sends back.
    pub async fn delete(&self, path: &str) -> Result<Value, FetchError> {
        self.call(Method::DELETE, path, None).await
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Object>,
    ) -> Result<Value, FetchError> {
        let remote_error = |status: Option<u16>, reason: String| FetchError::RemoteCall {
            operation: method.to_string(),
            path: path.to_string(),
            status,
            reason,
        };

        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| remote_error(None, err.to_string()))?;

        tracing::debug!(%method, %url, "calling resource service");

        let mut request = self.http_client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::warn!(%method, path, error = %err, "resource service call failed");
            remote_error(err.status().map(|s| s.as_u16()), err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%method, path, %status, "resource service returned an error status");
            return Err(remote_error(Some(status.as_u16()), status.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| remote_error(Some(status.as_u16()), err.to_string()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|err| FetchError::MalformedResponse {
            operation: method.to_string(),
            path: path.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Makes sure `Url::join` appends to the base path instead of replacing its last segment.
fn normalize_base_url(mut base_url: Url) -> Url {
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::body_json;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;

    fn client(server: &MockServer) -> ResourceClient {
        ResourceClient::new(Url::parse(&server.uri()).unwrap(), None).unwrap()
    }

    #[test]
    fn base_url_keeps_its_prefix() {
        let url = normalize_base_url(Url::parse("http://localhost:3000/api").unwrap());
        assert_eq!(
            url.join("users/1").unwrap().as_str(),
            "http://localhost:3000/api/users/1"
        );
        let url = normalize_base_url(Url::parse("http://localhost:3000").unwrap());
        assert_eq!(
            url.join("users/1").unwrap().as_str(),
            "http://localhost:3000/users/1"
        );
    }

    #[tokio::test]
    async fn get_decodes_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/23"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "23", "firstName": "Bill", "age": 20})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let user = client(&server).get("users/23").await.unwrap();
        assert_eq!(user, json!({"id": "23", "firstName": "Bill", "age": 20}));
    }

    #[tokio::test]
    async fn post_and_patch_send_json_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_json(json!({"firstName": "Ann", "age": 30})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "7", "firstName": "Ann", "age": 30})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/users/7"))
            .and(body_json(json!({"age": 31})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "7", "firstName": "Ann", "age": 31})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let body = json!({"firstName": "Ann", "age": 30});
        let created = client.post("users", body.as_object().unwrap()).await.unwrap();
        assert_eq!(created["id"], json!("7"));

        let body = json!({"age": 31});
        let updated = client.patch("users/7", body.as_object().unwrap()).await.unwrap();
        assert_eq!(updated["age"], json!(31));
    }

    #[tokio::test]
    async fn delete_with_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).delete("users/7").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn non_2xx_is_a_remote_call_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/companies/9"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let error = client(&server).get("companies/9").await.unwrap_err();
        assert_eq!(
            error,
            FetchError::RemoteCall {
                operation: "GET".to_string(),
                path: "companies/9".to_string(),
                status: Some(404),
                reason: "404 Not Found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn invalid_json_is_a_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let error = client(&server).get("users/1").await.unwrap_err();
        assert!(matches!(error, FetchError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_a_remote_call_error() {
        // Nothing listens on the discard port.
        let client = ResourceClient::new(Url::parse("http://127.0.0.1:9/").unwrap(), None).unwrap();
        let error = client.get("users/1").await.unwrap_err();
        assert!(matches!(
            error,
            FetchError::RemoteCall { status: None, ref operation, .. } if operation == "GET"
        ));
    }
}
