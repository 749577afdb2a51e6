//! reconcile-gist: `Transport` implementation backed by the GitHub Gist API.
//!
//! One gist holds all namespaces of a document store; namespace `catjo` maps
//! to the gist file `catjo.json`. Reads fetch the whole gist and pick out the
//! file; writes are partial updates (`PATCH`) touching only that file, which
//! is the atomic-overwrite granularity the core requires.
//!
//! Authentication is a personal access token supplied by the embedding
//! application; without one, public gists are still readable.

use async_trait::async_trait;
use reconcile_core::{Transport, TransportError};
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Connection settings for one gist-backed store.
#[derive(Debug, Clone)]
pub struct GistConfig {
    /// Id of the gist holding every namespace of the store.
    pub gist_id: String,
    /// Personal access token; `None` for unauthenticated reads.
    pub token: Option<String>,
    /// API base URL, overridable for tests.
    pub api_base: String,
}

impl GistConfig {
    pub fn new(gist_id: impl Into<String>) -> Self {
        Self {
            gist_id: gist_id.into(),
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// The slice of the gist response this crate cares about.
#[derive(Debug, Deserialize)]
struct GistResponse {
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
}

/// A remote document store persisted as files of a single gist.
pub struct GistStore {
    http: reqwest::Client,
    config: GistConfig,
}

impl GistStore {
    pub fn new(config: GistConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("reconcile-gist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// Namespaces present in the gist, in sorted order.
    ///
    /// The original apps use this to offer a picker over the store's users
    /// before a namespace has been chosen.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, TransportError> {
        let Some(gist) = self.fetch_gist().await? else {
            return Ok(Vec::new());
        };
        let mut namespaces: Vec<String> = gist
            .files
            .keys()
            .filter_map(|name| name.strip_suffix(".json"))
            .map(str::to_string)
            .collect();
        namespaces.sort();
        Ok(namespaces)
    }

    async fn fetch_gist(&self) -> Result<Option<GistResponse>, TransportError> {
        let response = self
            .request(Method::GET)
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let gist = response
            .json::<GistResponse>()
            .await
            .map_err(|err| TransportError::Response(err.to_string()))?;
        Ok(Some(gist))
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/gists/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.gist_id
        );
        let mut request = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.header(header::AUTHORIZATION, format!("token {token}"));
        }
        request
    }

    fn filename(namespace: &str) -> String {
        format!("{namespace}.json")
    }
}

#[async_trait]
impl Transport for GistStore {
    async fn get(&self, namespace: &str) -> Result<Option<String>, TransportError> {
        let Some(gist) = self.fetch_gist().await? else {
            return Ok(None);
        };
        let content = gist
            .files
            .get(&Self::filename(namespace))
            .and_then(|file| file.content.clone());
        debug!(
            namespace,
            found = content.is_some(),
            "fetched namespace from gist"
        );
        Ok(content)
    }

    async fn put(&self, namespace: &str, text: &str) -> Result<(), TransportError> {
        let filename = Self::filename(namespace);
        let body = json!({
            "files": { filename: { "content": text } }
        });

        let response = self
            .request(Method::PATCH)
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        debug!(namespace, bytes = text.len(), "wrote namespace to gist");
        Ok(())
    }
}
