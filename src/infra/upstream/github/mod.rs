//! GitHub GraphQL client.
//!
//! Each query shape has its own response DTO in [`queries`]; [`GitHubClient::query`]
//! sends the DTO's document and decodes `data` into it.

pub mod queries;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{UpstreamError, UpstreamErrorKind, record_call};

pub const SERVICE: &str = "github";
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// A GraphQL operation with a typed response.
pub trait GraphQlQuery: DeserializeOwned + Send {
    type Variables: Serialize + Send + Sync;

    const OPERATION: &'static str;
    const DOCUMENT: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: Value,
}

/// Executes GraphQL requests and returns the `data` member of the response.
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(&self, request: GraphQlRequest) -> Result<Value, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

impl GraphQlEnvelope {
    /// Errors win over partial data.
    fn into_data(self) -> Result<Value, UpstreamError> {
        if !self.errors.is_empty() {
            let messages = self
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::GraphQl,
                messages,
            ));
        }

        match self.data {
            Some(Value::Null) | None => Err(UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Decode,
                "response has no data",
            )),
            Some(data) => Ok(data),
        }
    }
}

/// `reqwest` transport authenticating with a bearer token.
pub struct HttpGraphQlTransport {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl HttpGraphQlTransport {
    pub fn new(client: reqwest::Client, endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            token: token.into(),
        }
    }
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Status,
                format!("HTTP {status}: {}", truncate(&body, MAX_ERROR_BODY)),
            ));
        }

        let envelope: GraphQlEnvelope = response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        envelope.into_data()
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Typed GraphQL access on top of a [`GraphQlTransport`].
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn GraphQlTransport>,
}

impl GitHubClient {
    pub fn new(transport: Arc<dyn GraphQlTransport>) -> Self {
        Self { transport }
    }

    #[instrument(skip_all, fields(operation = Q::OPERATION))]
    pub async fn query<Q: GraphQlQuery>(&self, variables: &Q::Variables) -> Result<Q, UpstreamError> {
        let started_at = Instant::now();
        let result = self.decode_query::<Q>(variables).await;
        record_call(SERVICE, started_at, &result);
        result
    }

    async fn decode_query<Q: GraphQlQuery>(
        &self,
        variables: &Q::Variables,
    ) -> Result<Q, UpstreamError> {
        let variables = serde_json::to_value(variables).map_err(|err| {
            UpstreamError::new(SERVICE, UpstreamErrorKind::Decode, err.to_string())
        })?;

        let data = self
            .transport
            .execute(GraphQlRequest {
                operation_name: Q::OPERATION,
                query: Q::DOCUMENT,
                variables,
            })
            .await?;

        debug!("decoding GraphQL response");
        serde_json::from_value(data).map_err(|err| {
            UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Decode,
                format!("{}: {err}", Q::OPERATION),
            )
        })
    }
}
