//! Shared primitive IDs, enums and aliases.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dynamic JSON payload (bodies, variables, parsed responses).
pub use serde_json::Value as JsonValue;

/// JSON object, used for GraphQL variables.
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Header map keyed by lowercase header name.
pub type Headers = BTreeMap<String, String>;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Opaque operation identifier, unique per observed request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generates a fresh id from the creation time plus a random suffix.
    pub fn generate(now_ms: TimestampMs) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{now_ms}-{}", &suffix[..9]))
    }

    /// Borrow the id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// GraphQL operation kind, as declared by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Read operation (also the shorthand `{ ... }` form).
    Query,
    /// Write operation.
    Mutation,
    /// Long-lived subscription.
    Subscription,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        })
    }
}

/// Lifecycle status of an observed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Request sent, no terminal event yet.
    Pending,
    /// Response arrived without GraphQL errors.
    Success,
    /// GraphQL errors, HTTP failure status, or transport failure.
    Error,
}

impl OperationStatus {
    /// True for `Success` and `Error`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Which host network surface produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    /// Promise-based call primitive.
    Fetch,
    /// Event-based request object.
    Xhr,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Xhr => "xhr",
        })
    }
}
