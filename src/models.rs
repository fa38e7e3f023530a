//! Core data models shared by the dispatcher and the cache worker.
//!
//! [`Query`] and [`AskResponse`] are the two halves of the `/ask` contract.
//! [`StoredResponse`] is what the cache worker keeps per URL and hands back
//! on a fetch, whether it came from the cache or the network.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The fixed set of query kinds offered by the form selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Symptom,
    Medicine,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Symptom => "symptom",
            QueryKind::Medicine => "medicine",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symptom" => Ok(QueryKind::Symptom),
            "medicine" => Ok(QueryKind::Medicine),
            other => anyhow::bail!("Unknown query type: '{}'. Must be symptom or medicine.", other),
        }
    }
}

/// One user query. Serialized as exactly `{"type": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub message: String,
}

impl Query {
    pub fn new(kind: QueryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Body returned by the backend. `response` is Markdown when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskResponse {
    pub response: Option<String>,
}

impl AskResponse {
    /// Interprets any JSON body the backend sent.
    ///
    /// A body that is not an object, or whose `response` is missing, `null`,
    /// `false`, `0`, or `""`, carries no answer. A string is the answer. Any
    /// other `response` value is rejected since it cannot be rendered.
    pub fn from_json(body: &Value) -> anyhow::Result<Self> {
        let response = match body.get("response") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => anyhow::bail!("`response` is not a string: {}", other),
        };
        Ok(Self { response })
    }

    /// The Markdown answer, or `None` when there is nothing to show.
    pub fn markdown(&self) -> Option<&str> {
        self.response.as_deref().filter(|s| !s.is_empty())
    }
}

/// A response held by (or passed through) the cache worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
