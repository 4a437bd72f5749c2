//! HTTP client for the remote REST API.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use doctor_common::{Environment, Error, Result};

use crate::api::{Method, RemoteApi};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("doctor/", env!("CARGO_PKG_VERSION"));

/// REST client bound to one environment.
pub struct HttpApiClient {
    http: Client,
    base_url: String,
    authorization: String,
}

impl HttpApiClient {
    /// Create a client for the given environment.
    ///
    /// # Errors
    /// - `Configuration` if the base URL is empty or the HTTP client cannot be built
    pub fn new(environment: &Environment) -> Result<Self> {
        if environment.base_url.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "Environment '{}' has no baseUrl",
                environment.name
            )));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(environment.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: environment.base_url.trim_end_matches('/').to_string(),
            authorization: environment.authorization(),
        })
    }

    /// Absolute URL for an API-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let builder = match method {
            Method::Get => self.http.get(&url),
            Method::Create => self.http.post(&url),
            Method::Update => self.http.put(&url),
        };

        builder
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {} failed: {}", method, path, e)))?;

        self.handle_response(method, path, response).await
    }

    /// Handle API response with error checking.
    async fn handle_response(
        &self,
        method: Method,
        path: &str,
        response: reqwest::Response,
    ) -> Result<Value> {
        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text)
                .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(format!("{} {}", method, path)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication("Invalid user or organization secret".to_string()))
        } else if status == StatusCode::FORBIDDEN {
            Err(Error::PermissionDenied(format!("{} {}", method, path)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "{} {} returned {} - {}",
                method, path, status, body
            )))
        }
    }
}

#[async_trait]
impl RemoteApi for HttpApiClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::Get, path, None).await
    }

    async fn create(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Create, path, Some(body)).await
    }

    async fn update(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Update, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctor_common::Secret;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Matches the whole `Authorization` value. The stock header matcher
    /// splits on commas, which this header contains.
    fn authorization_is(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
        move |request: &Request| {
            request
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                == Some(expected)
        }
    }

    fn environment(base_url: &str) -> Environment {
        Environment::new("test", base_url, Secret::new("user"), Secret::new("org"))
    }

    #[test]
    fn test_url_join() {
        let client = HttpApiClient::new(&environment("https://api.test/v2/")).unwrap();
        assert_eq!(
            client.url("organizations/objects/definitions"),
            "https://api.test/v2/organizations/objects/definitions"
        );
        assert_eq!(client.url("/elements"), "https://api.test/v2/elements");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpApiClient::new(&environment("  "));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_get_sends_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organizations/objects/definitions"))
            .and(authorization_is("User user, Organization org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Contact": {"fields": []}})))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(&environment(&server.uri())).unwrap();
        let doc = client.get("organizations/objects/definitions").await.unwrap();
        assert_eq!(doc, json!({"Contact": {"fields": []}}));
    }

    #[tokio::test]
    async fn test_wrong_authorization_not_matched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(authorization_is("User user, Organization org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let other = Environment::new("test", server.uri(), Secret::new("user"), Secret::new("other"));
        let client = HttpApiClient::new(&other).unwrap();
        let result = client.get("organizations/objects/definitions").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_posts_json_and_update_puts() {
        let server = MockServer::start().await;
        let body = json!({"fields": [{"path": "email", "type": "string"}]});

        Mock::given(method("POST"))
            .and(path("/organizations/objects/Contact/definitions"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/organizations/objects/Contact/definitions"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpApiClient::new(&environment(&server.uri())).unwrap();
        let created = client
            .create("organizations/objects/Contact/definitions", &body)
            .await
            .unwrap();
        assert_eq!(created, body);

        // Empty success bodies come back as null.
        let updated = client
            .update("organizations/objects/Contact/definitions", &body)
            .await
            .unwrap();
        assert_eq!(updated, Value::Null);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("kaboom"))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(&environment(&server.uri())).unwrap();
        assert!(matches!(client.get("missing").await, Err(Error::NotFound(_))));
        assert!(matches!(client.get("denied").await, Err(Error::Authentication(_))));
        assert!(matches!(client.get("forbidden").await, Err(Error::PermissionDenied(_))));

        match client.get("broken").await {
            Err(Error::Network(message)) => assert!(message.contains("kaboom")),
            other => panic!("expected network error, got {:?}", other),
        }
    }
}
