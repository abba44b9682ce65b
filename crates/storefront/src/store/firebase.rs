//! Firebase Realtime Database backend.
//!
//! Uses the REST API: `GET/PUT/PATCH/POST {database}/{path}.json` with the
//! database secret passed as `auth`. Live subscriptions use the streaming
//! variant of `GET` (`Accept: text/event-stream`), applying `put` and `patch`
//! events to a local copy of the watched node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::instrument;
use url::Url;

use super::sse::{SseEvent, SseParser};
use super::{DocumentStore, Query, Snapshot, StoreError, Subscription, tree};

/// Timeout for non-streaming requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Realtime Database REST client.
#[derive(Clone)]
pub struct FirebaseStore {
    inner: Arc<FirebaseStoreInner>,
}

struct FirebaseStoreInner {
    client: reqwest::Client,
    database_url: Url,
    secret: SecretString,
}

impl std::fmt::Debug for FirebaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseStore")
            .field("database_url", &self.inner.database_url.as_str())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

impl FirebaseStore {
    /// Create a client for the database at `database_url`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(database_url: Url, secret: SecretString) -> Self {
        // No client-wide timeout: streaming requests stay open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(FirebaseStoreInner {
                client,
                database_url,
                secret,
            }),
        }
    }

    /// REST URL for `path` with auth and optional query parameters.
    fn url(&self, path: &str, query: Option<&Query>) -> Result<Url, StoreError> {
        let base = self.inner.database_url.as_str().trim_end_matches('/');
        let path = path.trim_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}.json"))
            .map_err(|e| StoreError::InvalidKey(format!("{path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("auth", self.inner.secret.expose_secret());
            if let Some(query) = query {
                let order_by = query
                    .order_by_child
                    .as_deref()
                    .map_or_else(|| "\"$key\"".to_owned(), |child| Value::from(child).to_string());
                pairs.append_pair("orderBy", &order_by);
                if let Some(equal_to) = &query.equal_to {
                    pairs.append_pair("equalTo", &equal_to.to_string());
                }
                if let Some(n) = query.limit_to_last {
                    pairs.append_pair("limitToLast", &n.to_string());
                }
            }
        }
        Ok(url)
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(StoreError::PermissionDenied(path.to_owned()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read(&self, path: &str, query: Option<&Query>) -> Result<Snapshot, StoreError> {
        let url = self.url(path, query)?;
        let response = self
            .inner
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let value: Value = Self::check(path, response).await?.json().await?;
        Ok(tree::normalize(value))
    }
}

#[async_trait]
impl DocumentStore for FirebaseStore {
    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> {
        self.read(path, None).await
    }

    #[instrument(skip(self))]
    async fn query(&self, path: &str, query: &Query) -> Result<Vec<(String, Value)>, StoreError> {
        // The REST API filters but returns an unordered object; reorder locally.
        let node = self.read(path, Some(query)).await?;
        Ok(tree::query_children(node.as_ref(), query))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let url = self.url(path, None)?;
        let request = if value.is_null() {
            self.inner.client.delete(url)
        } else {
            self.inner.client.put(url).json(&value)
        };
        let response = request.timeout(REQUEST_TIMEOUT).send().await?;
        Self::check(path, response).await?;
        Ok(())
    }

    #[instrument(skip(self, fields))]
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let url = self.url(path, None)?;
        let response = self
            .inner
            .client
            .patch(url)
            .json(&fields)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Self::check(path, response).await?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let url = self.url(path, None)?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&value)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let created: PushResponse = Self::check(path, response).await?.json().await?;
        Ok(created.name)
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, path: &str, query: Option<Query>) -> Result<Subscription, StoreError> {
        let url = self.url(path, query.as_ref())?;
        let response = self
            .inner
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::check(path, response).await?;

        let (tx, rx) = mpsc::channel(Subscription::BUFFER);
        let path = path.to_owned();
        let task = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut parser = SseParser::new();
            let mut local = Value::Null;

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(StoreError::Http(err))).await;
                        return;
                    }
                };
                for event in parser.feed(&chunk) {
                    match apply_event(&mut local, &path, &event) {
                        Ok(false) => {}
                        Ok(true) => {
                            let snapshot = (!local.is_null()).then(|| local.clone());
                            if tx.send(Ok(snapshot)).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    }
                }
            }
            let _ = tx
                .send(Err(StoreError::Stream("event stream closed".to_owned())))
                .await;
        });

        Ok(Subscription::new(rx, task.abort_handle()))
    }
}

/// Apply one stream event to `local`. Returns whether the snapshot changed.
fn apply_event(local: &mut Value, path: &str, event: &SseEvent) -> Result<bool, StoreError> {
    match event.event.as_str() {
        "put" => {
            let payload: StreamPayload = serde_json::from_str(&event.data)?;
            tree::set(local, &payload.path, payload.data);
            Ok(true)
        }
        "patch" => {
            let payload: StreamPayload = serde_json::from_str(&event.data)?;
            let Value::Object(fields) = payload.data else {
                return Err(StoreError::Stream(format!("patch without object at {path}")));
            };
            tree::merge(local, &payload.path, fields);
            Ok(true)
        }
        "keep-alive" => Ok(false),
        "cancel" => Err(StoreError::PermissionDenied(path.to_owned())),
        "auth_revoked" => Err(StoreError::Stream("auth revoked".to_owned())),
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            Ok(false)
        }
    }
}
