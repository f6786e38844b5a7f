#[derive(Clone)]
pub(crate) struct Matcher {
    method: Option<String>,
    path: Option<String>,
    body: Option<serde_json::Value>,
    no_body: bool,
}

impl Matcher {
    pub(crate) fn new() -> Self {
        Self {
            method: None,
            path: None,
            body: None,
            no_body: false,
        }
    }

    pub(crate) fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub(crate) fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub(crate) fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn no_body(mut self) -> Self {
        self.no_body = true;
        self
    }

    fn matches(&self, request: &wiremock::Request, index: usize) {
        if let Some(method) = self.method.as_ref() {
            assert_eq!(
                method,
                &request.method.to_string(),
                "[Request {}]: Expected method {}, got {}",
                index,
                method,
                request.method
            )
        }

        if let Some(path) = self.path.as_ref() {
            assert_eq!(
                path,
                request.url.path(),
                "[Request {}]: Expected path {}, got {}",
                index,
                path,
                request.url.path()
            )
        }

        if let Some(body) = self.body.as_ref() {
            assert_eq!(
                body,
                &request.body_json::<serde_json::Value>().unwrap(),
                "[Request {}]: incorrect body",
                index,
            )
        }

        if self.no_body {
            assert!(
                request.body.is_empty(),
                "[Request {}]: expected no body, got {}",
                index,
                String::from_utf8_lossy(&request.body)
            )
        }
    }
}

/// Checks the recorded requests, in the order they were received.
pub(crate) fn matches(received: &[wiremock::Request], matchers: Vec<Matcher>) {
    assert_eq!(
        received.len(),
        matchers.len(),
        "Expected {} requests, recorded {}",
        matchers.len(),
        received.len()
    );
    for (i, (request, matcher)) in received.iter().zip(matchers.iter()).enumerate() {
        matcher.matches(request, i);
    }
}

/// Checks the recorded requests regardless of their order, for calls issued concurrently.
///
/// Requests are compared sorted by method and path, so matchers must be listed in that order.
pub(crate) fn matches_unordered(received: &[wiremock::Request], matchers: Vec<Matcher>) {
    let mut received = received.to_vec();
    received.sort_by(|a, b| {
        (a.method.to_string(), a.url.path()).cmp(&(b.method.to_string(), b.url.path()))
    });
    matches(&received, matchers)
}
