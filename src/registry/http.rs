// src/registry/http.rs

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{RegistryError, RegistryResult, RegistryStore, Snapshot, split_path};

/// A remote registry speaking the REST key-path protocol:
///
/// - `GET    <base>/<path>.json` reads a value (`null` when absent),
/// - `PUT    <base>/<path>.json` replaces it,
/// - `PATCH  <base>/.json` applies a multi-path update atomically,
/// - `DELETE <base>/<path>.json` removes it.
///
/// An optional token is sent as the `auth` query parameter.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl HttpRegistry {
    /// Creates a client for the registry rooted at `base_url`.
    pub fn new(base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client: Client::new(),
        }
    }

    fn url_for(&self, path: &str) -> RegistryResult<String> {
        let segments = split_path(path)?;
        Ok(format!("{}/{}.json", self.base_url, segments.join("/")))
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> RegistryResult<Value> {
        let url = self.url_for(path)?;
        log::debug!("Registry {} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RegistryStore for HttpRegistry {
    async fn get(&self, path: &str) -> RegistryResult<Snapshot> {
        let value = self.send(Method::GET, path, None).await?;
        Ok(Snapshot::new(path, Some(value)))
    }

    async fn set(&self, path: &str, value: Value) -> RegistryResult<()> {
        self.send(Method::PUT, path, Some(value)).await.map(|_| ())
    }

    async fn update(&self, values: BTreeMap<String, Value>) -> RegistryResult<()> {
        // Validate every path locally before sending anything.
        for path in values.keys() {
            split_path(path)?;
        }
        let body = Value::Object(values.into_iter().collect());
        self.send(Method::PATCH, "", Some(body)).await.map(|_| ())
    }

    async fn remove(&self, path: &str) -> RegistryResult<()> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}
