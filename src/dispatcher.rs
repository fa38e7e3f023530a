//! Query dispatch to the assistant backend.
//!
//! [`Dispatcher::ask`] is the form submit: mark the display as loading, POST
//! the query once, then render the answer (or the failure string) into the
//! display if the request is still the latest one.
//!
//! There are no retries and no client timeout. Any body that
//! parses as JSON counts as an answer, whatever the HTTP status.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{AssistantConfig, Config};
use crate::display::{Display, DisplayState, RequestId};
use crate::models::{AskResponse, Query};
use crate::render::{self, Outcome};

pub struct Dispatcher {
    client: reqwest::Client,
    endpoint: String,
    display: Arc<Display>,
}

/// What one call to [`Dispatcher::ask`] produced.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub id: RequestId,
    pub outcome: Outcome,
    /// Whether the rendered result reached the display.
    pub applied: bool,
}

impl Dispatcher {
    pub fn new(config: &AssistantConfig, display: Arc<Display>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            display,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn display(&self) -> &Arc<Display> {
        &self.display
    }

    /// Sends `query` and renders the result into the display.
    pub async fn ask(&self, query: &Query) -> Dispatch {
        let id = self.display.begin();
        tracing::debug!(request = %id, kind = %query.kind, "dispatching query");

        let outcome = match self.post(query).await {
            Ok(answer) => Outcome::Answer(answer),
            Err(e) => {
                tracing::error!(request = %id, error = %format!("{:#}", e), "query failed");
                Outcome::Failed(format!("{:#}", e))
            }
        };

        let content = render::render(&outcome);
        let update = match outcome {
            Outcome::Answer(_) => DisplayState::Success(id, content),
            Outcome::Failed(_) => DisplayState::Failure(id, content),
        };
        let applied = self.display.apply(update);

        Dispatch {
            id,
            outcome,
            applied,
        }
    }

    async fn post(&self, query: &Query) -> Result<AskResponse> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(query)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "backend returned non-success status, reading body anyway");
        }

        let body = resp
            .text()
            .await
            .context("Failed to read response body")?;
        let json: serde_json::Value =
            serde_json::from_str(&body).context("Response body is not valid JSON")?;
        AskResponse::from_json(&json)
    }
}

/// Checks the backend's `/health` route, derived from the `/ask` endpoint.
pub async fn check_health(config: &AssistantConfig) -> Result<serde_json::Value> {
    let url = health_url(&config.endpoint)?;
    let resp = reqwest::get(url.clone())
        .await
        .with_context(|| format!("GET {} failed", url))?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("backend health check returned {}", status);
    }
    resp.json()
        .await
        .context("Health response is not valid JSON")
}

/// CLI entry point for `medassist ask`.
///
/// Prints the final display content. With `markdown`, prints the raw answer
/// instead (falling back to the display content when there is none).
pub async fn run_ask(config: &Config, query: Query, markdown: bool) -> Result<()> {
    let dispatcher = Dispatcher::new(&config.assistant, Arc::new(Display::new()))?;
    let dispatch = dispatcher.ask(&query).await;

    let raw = match &dispatch.outcome {
        Outcome::Answer(answer) if markdown => answer.markdown().map(|s| s.to_string()),
        _ => None,
    };
    match raw {
        Some(md) => println!("{}", md),
        None => println!("{}", dispatcher.display().content()),
    }
    Ok(())
}

/// CLI entry point for `medassist health`.
pub async fn run_health(config: &Config) -> Result<()> {
    let body = check_health(&config.assistant).await?;
    let status = body
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    println!("backend {}  status: {}", config.assistant.endpoint, status);
    Ok(())
}

fn health_url(endpoint: &str) -> Result<reqwest::Url> {
    let mut url = crate::config::parse_http_url(endpoint)
        .with_context(|| format!("invalid endpoint URL: {}", endpoint))?;
    url.set_path("/health");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
