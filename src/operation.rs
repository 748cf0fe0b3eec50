//! Observed operation record, request/response snapshots and drafts.

use serde::{Deserialize, Serialize};

use crate::{
    parse::body_size,
    types::{Headers, JsonObject, JsonValue, OperationId, OperationStatus, OperationType, TimestampMs},
};

/// Returned when a terminal operation is asked to settle again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation {0} is already settled")]
pub struct AlreadySettled(pub OperationId);

/// Transport-level facts about the observed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Request URL as seen by the host.
    pub url: String,
    /// Upper-case request method.
    pub method: String,
    /// Request headers (empty for the event-based API).
    pub headers: Headers,
    /// Request body size in bytes.
    pub request_size: usize,
    /// Response body size in bytes, 0 until settlement.
    pub response_size: usize,
}

/// Immutable snapshot of what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    /// Request URL.
    pub url: String,
    /// Upper-case request method.
    pub method: String,
    /// Request headers.
    pub headers: Headers,
    /// Raw request body, if any.
    pub body: Option<String>,
    /// Send time in milliseconds since epoch.
    pub timestamp: TimestampMs,
}

/// Immutable snapshot of what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Parsed body, `None` when the body was not JSON.
    pub body: Option<JsonValue>,
    /// Receive time in milliseconds since epoch.
    pub timestamp: TimestampMs,
}

/// Terminal result of an operation. Exactly one is ever recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationOutcome {
    /// Parsed response body (`Null` when the body was not JSON).
    Response(JsonValue),
    /// Joined GraphQL error messages, `HTTP <code>`, or transport failure text.
    Error(String),
}

impl OperationOutcome {
    /// Status implied by this outcome.
    pub fn status(&self) -> OperationStatus {
        match self {
            Self::Response(_) => OperationStatus::Success,
            Self::Error(_) => OperationStatus::Error,
        }
    }
}

/// Everything the settlement step writes into a pending operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Terminal outcome.
    pub outcome: OperationOutcome,
    /// Elapsed milliseconds between send and settlement.
    pub execution_time_ms: f64,
    /// Response snapshot, absent for transport failures.
    pub raw_response: Option<GraphQlResponse>,
    /// Response body size in bytes.
    pub response_size: usize,
}

/// Insert payload used to create a pending [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDraft {
    /// Kind declared by the document.
    pub operation_type: OperationType,
    /// Name of the selected operation, if any.
    pub operation_name: Option<String>,
    /// Document text as sent.
    pub query: String,
    /// Variables as sent.
    pub variables: Option<JsonObject>,
    /// Request snapshot.
    pub request: GraphQlRequest,
}

/// A single observed GraphQL request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique id, never reused.
    pub id: OperationId,
    /// Kind declared by the document.
    pub operation_type: OperationType,
    /// Name of the selected operation, if any.
    pub operation_name: Option<String>,
    /// Trimmed document text.
    pub query: String,
    /// Variables as sent.
    pub variables: Option<JsonObject>,
    /// Creation time in milliseconds since epoch. Never mutated.
    pub timestamp: TimestampMs,
    execution_time: Option<f64>,
    status: OperationStatus,
    #[serde(flatten)]
    outcome: Option<OperationOutcome>,
    /// Transport facts; `response_size` is filled at settlement.
    pub network_info: NetworkInfo,
    /// What was sent.
    pub request: GraphQlRequest,
    raw_response: Option<GraphQlResponse>,
}

impl Operation {
    /// Builds a pending operation from a draft.
    pub fn pending(id: OperationId, draft: OperationDraft, timestamp: TimestampMs) -> Self {
        let network_info = NetworkInfo {
            url: draft.request.url.clone(),
            method: draft.request.method.clone(),
            headers: draft.request.headers.clone(),
            request_size: body_size(draft.request.body.as_deref()),
            response_size: 0,
        };

        Self {
            id,
            operation_type: draft.operation_type,
            operation_name: draft.operation_name,
            query: draft.query.trim().to_string(),
            variables: draft.variables,
            timestamp,
            execution_time: None,
            status: OperationStatus::Pending,
            outcome: None,
            network_info,
            request: draft.request,
            raw_response: None,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Elapsed milliseconds, set once the operation is terminal.
    pub fn execution_time(&self) -> Option<f64> {
        self.execution_time
    }

    /// Terminal outcome, if any.
    pub fn outcome(&self) -> Option<&OperationOutcome> {
        self.outcome.as_ref()
    }

    /// Parsed response body for successful operations.
    pub fn response(&self) -> Option<&JsonValue> {
        match &self.outcome {
            Some(OperationOutcome::Response(body)) => Some(body),
            _ => None,
        }
    }

    /// Error text for failed operations.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(OperationOutcome::Error(message)) => Some(message),
            _ => None,
        }
    }

    /// Response snapshot, once received.
    pub fn raw_response(&self) -> Option<&GraphQlResponse> {
        self.raw_response.as_ref()
    }

    /// Moves a pending operation to its terminal state.
    ///
    /// A second call is refused and leaves the record untouched.
    pub fn settle(&mut self, completion: Completion) -> Result<(), AlreadySettled> {
        if self.status.is_terminal() {
            return Err(AlreadySettled(self.id.clone()));
        }

        self.status = completion.outcome.status();
        self.outcome = Some(completion.outcome);
        self.execution_time = Some(completion.execution_time_ms.max(0.0));
        self.network_info.response_size = completion.response_size;
        self.raw_response = completion.raw_response;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn draft() -> OperationDraft {
        OperationDraft {
            operation_type: OperationType::Query,
            operation_name: Some("Me".to_string()),
            query: "  query Me { me { id } }\n".to_string(),
            variables: None,
            request: GraphQlRequest {
                url: "https://api.test/graphql".to_string(),
                method: "POST".to_string(),
                headers: Headers::new(),
                body: Some(r#"{"query":"query Me { me { id } }"}"#.to_string()),
                timestamp: 10,
            },
        }
    }

    #[test]
    fn pending_operation_starts_without_outcome() {
        let op = Operation::pending(OperationId::from("a"), draft(), 10);
        assert_eq!(op.status(), OperationStatus::Pending);
        assert_eq!(op.execution_time(), None);
        assert_eq!(op.query, "query Me { me { id } }");
        assert_eq!(op.network_info.request_size, 34);
        assert_eq!(op.network_info.response_size, 0);
        assert!(op.response().is_none() && op.error().is_none());
    }

    #[test]
    fn settle_is_one_shot() {
        let mut op = Operation::pending(OperationId::from("a"), draft(), 10);
        op.settle(Completion {
            outcome: OperationOutcome::Response(json!({"data": {"me": {"id": 1}}})),
            execution_time_ms: 12.5,
            raw_response: None,
            response_size: 25,
        })
        .unwrap();

        assert_eq!(op.status(), OperationStatus::Success);
        assert_eq!(op.execution_time(), Some(12.5));
        assert_eq!(op.network_info.response_size, 25);

        let again = op.settle(Completion {
            outcome: OperationOutcome::Error("late".to_string()),
            execution_time_ms: 99.0,
            raw_response: None,
            response_size: 0,
        });
        assert_eq!(again, Err(AlreadySettled(OperationId::from("a"))));
        assert_eq!(op.status(), OperationStatus::Success);
        assert!(op.error().is_none());
    }

    #[test]
    fn serializes_outcome_under_response_or_error_key() {
        let mut op = Operation::pending(OperationId::from("a"), draft(), 10);
        op.settle(Completion {
            outcome: OperationOutcome::Error("boom".to_string()),
            execution_time_ms: 1.0,
            raw_response: None,
            response_size: 0,
        })
        .unwrap();

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
        assert!(value.get("response").is_none());
        assert_eq!(value["operationType"], "query");
        assert_eq!(value["networkInfo"]["requestSize"], 34);
    }
}
