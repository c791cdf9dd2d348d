//! HTTP transport for the `/v1/sync` endpoint.
//!
//! Both directions share one JSON envelope:
//!
//! ```json
//! { "success": true, "data": { "lastMutationAt": 1706745600000, "mutations": [...] } }
//! ```

use async_trait::async_trait;
use marginalia_engine::wire::{BOOKMARK, COLLECTION, COLLECTION_BOOKMARK, NOTE};
use marginalia_engine::SyncMutation;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::ports::{AuthHeaders, MutationsPage, SyncToken, SyncTransport};

/// Path of the sync endpoint relative to the base URL.
const SYNC_PATH: &str = "/v1/sync";

/// Resource types requested when none are configured.
pub const ALL_RESOURCES: [&str; 4] = [BOOKMARK, COLLECTION, COLLECTION_BOOKMARK, NOTE];

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<EnvelopeData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeData {
    last_mutation_at: i64,
    #[serde(default)]
    mutations: Vec<SyncMutation>,
}

/// Error body of a non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PushBody<'a> {
    mutations: &'a [SyncMutation],
}

/// `reqwest`-backed [`SyncTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    resources: Vec<String>,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    /// Create a transport with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resources: ALL_RESOURCES.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Restrict the resource types requested from the server.
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, SYNC_PATH)
    }

    fn prepare(
        &self,
        mut request: RequestBuilder,
        since: Option<SyncToken>,
        headers: &AuthHeaders,
    ) -> RequestBuilder {
        if let Some(token) = since {
            request = request.query(&[("lastMutationAt", token.millis())]);
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn read_envelope(response: Response) -> Result<MutationsPage> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_string()
                    } else {
                        body.clone()
                    }
                });
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(SyncError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        let data = envelope
            .data
            .ok_or_else(|| SyncError::Protocol("response envelope has no data".to_string()))?;

        Ok(MutationsPage {
            last_mutation_at: SyncToken(data.last_mutation_at),
            mutations: data.mutations,
        })
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn get_mutations(
        &self,
        since: Option<SyncToken>,
        headers: &AuthHeaders,
    ) -> Result<MutationsPage> {
        let request = self
            .client
            .get(self.url())
            .query(&[("resources", self.resources.join(","))]);
        let response = self.prepare(request, since, headers).send().await?;
        let page = Self::read_envelope(response).await?;

        debug!(
            count = page.mutations.len(),
            token = %page.last_mutation_at,
            "Fetched remote mutations"
        );
        Ok(page)
    }

    async fn post_mutations(
        &self,
        mutations: &[SyncMutation],
        since: Option<SyncToken>,
        headers: &AuthHeaders,
    ) -> Result<MutationsPage> {
        let request = self.client.post(self.url()).json(&PushBody { mutations });
        let response = self.prepare(request, since, headers).send().await?;
        let page = Self::read_envelope(response).await?;

        debug!(
            sent = mutations.len(),
            acknowledged = page.mutations.len(),
            token = %page.last_mutation_at,
            "Pushed local mutations"
        );
        Ok(page)
    }
}
