use crate::{
    operation::{GraphQlResponse, OperationOutcome},
    parse::{JsonBody, parse_json_body},
    port::SettlementOutcome,
    types::{JsonValue, TimestampMs},
};

const UNKNOWN_GRAPHQL_ERROR: &str = "Unknown GraphQL error";

/// Terminal facts derived from a settlement, minus timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Terminal result.
    pub outcome: OperationOutcome,
    /// Set only when a response arrived.
    pub raw_response: Option<GraphQlResponse>,
    /// Byte length of the response body.
    pub response_size: usize,
}

/// Turns a port settlement into the operation's terminal outcome.
///
/// JSON bodies with a non-empty top-level `errors` array are errors, any other
/// JSON body is a success. Non-JSON bodies fall back to the status code.
pub fn resolve_settlement(outcome: SettlementOutcome, received_at: TimestampMs) -> Resolution {
    match outcome {
        SettlementOutcome::Failure { message } => Resolution {
            outcome: OperationOutcome::Error(message),
            raw_response: None,
            response_size: 0,
        },
        SettlementOutcome::Response {
            status,
            headers,
            body,
        } => {
            let response_size = body.len();
            let parsed = parse_json_body(&body);

            let outcome = match &parsed {
                JsonBody::Json(value) => match graphql_error_message(value) {
                    Some(message) => OperationOutcome::Error(message),
                    None => OperationOutcome::Response(value.clone()),
                },
                JsonBody::NotJson if status >= 400 => OperationOutcome::Error(format!("HTTP {status}")),
                JsonBody::NotJson => OperationOutcome::Response(JsonValue::Null),
            };

            Resolution {
                outcome,
                raw_response: Some(GraphQlResponse {
                    status,
                    headers,
                    body: parsed.into_json(),
                    timestamp: received_at,
                }),
                response_size,
            }
        }
    }
}

fn graphql_error_message(value: &JsonValue) -> Option<String> {
    let errors = value.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }

    let messages: Vec<&str> = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or(UNKNOWN_GRAPHQL_ERROR)
        })
        .collect();
    Some(messages.join(", "))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{parse::parse_headers, types::OperationStatus};

    fn response(status: u16, body: &str) -> SettlementOutcome {
        SettlementOutcome::Response {
            status,
            headers: parse_headers("Content-Type: application/json"),
            body: body.to_string(),
        }
    }

    #[test]
    fn data_body_is_success() {
        let r = resolve_settlement(response(200, r#"{"data":{"me":{"id":"1"}}}"#), 7);
        assert_eq!(r.outcome, OperationOutcome::Response(json!({"data": {"me": {"id": "1"}}})));
        assert_eq!(r.response_size, 26);
        let raw = r.raw_response.unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.timestamp, 7);
        assert_eq!(raw.headers["content-type"], "application/json");
    }

    #[test]
    fn errors_array_is_error_with_joined_messages() {
        let body = r#"{"data":null,"errors":[{"message":"Not authorized"},{"path":["x"]},{"message":"Too deep"}]}"#;
        let r = resolve_settlement(response(200, body), 0);
        assert_eq!(
            r.outcome,
            OperationOutcome::Error("Not authorized, Unknown GraphQL error, Too deep".to_string())
        );
        assert_eq!(r.outcome.status(), OperationStatus::Error);
    }

    #[test]
    fn empty_errors_array_is_success() {
        let r = resolve_settlement(response(200, r#"{"data":{},"errors":[]}"#), 0);
        assert_eq!(r.outcome.status(), OperationStatus::Success);
    }

    #[test]
    fn non_json_falls_back_to_status_code() {
        let r = resolve_settlement(response(502, "<html>Bad gateway</html>"), 0);
        assert_eq!(r.outcome, OperationOutcome::Error("HTTP 502".to_string()));
        assert_eq!(r.raw_response.unwrap().body, None);

        let r = resolve_settlement(response(204, ""), 0);
        assert_eq!(r.outcome, OperationOutcome::Response(JsonValue::Null));
    }

    #[test]
    fn transport_failure_keeps_message() {
        let r = resolve_settlement(
            SettlementOutcome::Failure {
                message: "connection reset".to_string(),
            },
            0,
        );
        assert_eq!(r.outcome, OperationOutcome::Error("connection reset".to_string()));
        assert!(r.raw_response.is_none());
        assert_eq!(r.response_size, 0);
    }
}
