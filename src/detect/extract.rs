use apollo_compiler::ast;
use url::Url;

use crate::{
    parse::{JsonBody, parse_json_body},
    types::{JsonObject, JsonValue, OperationType},
};

const RELATIVE_BASE: &str = "http://localhost/";

/// Operation fields recovered from a request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialOperation {
    /// Kind of the selected operation.
    pub operation_type: OperationType,
    /// Explicit `operationName`, else the selected operation's own name.
    pub operation_name: Option<String>,
    /// Document text as sent.
    pub query: String,
    /// Variables object, when one was sent.
    pub variables: Option<JsonObject>,
}

/// Extracts the GraphQL operation from a JSON request body.
///
/// Returns `None` for non-JSON bodies, payloads without a string `query`,
/// and documents that do not parse.
pub fn extract_graphql_from_request(body: &str) -> Option<PartialOperation> {
    let JsonBody::Json(JsonValue::Object(payload)) = parse_json_body(body) else {
        return None;
    };

    let query = payload.get("query")?.as_str()?;
    let operation_name = payload.get("operationName").and_then(JsonValue::as_str);
    let variables = payload.get("variables").and_then(|v| v.as_object().cloned());

    build(query, operation_name, variables)
}

/// Extracts a GraphQL-over-HTTP GET operation from the URL query string.
pub fn extract_graphql_from_url(url: &str) -> Option<PartialOperation> {
    let parsed = parse_request_url(url)?;

    let mut query = None;
    let mut operation_name = None;
    let mut variables = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "query" => query = Some(value.into_owned()),
            "operationName" => operation_name = Some(value.into_owned()),
            "variables" => {
                variables = parse_json_body(&value)
                    .into_json()
                    .and_then(|v| v.as_object().cloned());
            }
            _ => {}
        }
    }

    build(&query?, operation_name.as_deref(), variables)
}

/// Host-relative URLs (`/graphql?query=...`) resolve against a placeholder
/// origin; only the query string matters here.
fn parse_request_url(url: &str) -> Option<Url> {
    match Url::parse(url) {
        Ok(parsed) => Some(parsed),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_BASE).ok()?.join(url).ok()
        }
        Err(_) => None,
    }
}

fn build(
    query: &str,
    operation_name: Option<&str>,
    variables: Option<JsonObject>,
) -> Option<PartialOperation> {
    let (operation_type, declared_name) = classify_document(query, operation_name)?;
    Some(PartialOperation {
        operation_type,
        operation_name: operation_name.map(str::to_string).or(declared_name),
        query: query.to_string(),
        variables,
    })
}

/// Picks the operation a request would execute and reports its kind and name.
fn classify_document(
    query: &str,
    operation_name: Option<&str>,
) -> Option<(OperationType, Option<String>)> {
    let document = ast::Document::parse(query, "request.graphql").ok()?;

    let operations: Vec<_> = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            ast::Definition::OperationDefinition(op) => Some(op),
            _ => None,
        })
        .collect();

    let selected = match (operation_name, operations.as_slice()) {
        (_, [only]) => *only,
        (Some(wanted), many) => *many
            .iter()
            .find(|op| op.name.as_ref().is_some_and(|n| n.as_str() == wanted))?,
        (None, _) => return None,
    };

    let operation_type = match selected.operation_type {
        ast::OperationType::Query => OperationType::Query,
        ast::OperationType::Mutation => OperationType::Mutation,
        ast::OperationType::Subscription => OperationType::Subscription,
    };

    Some((
        operation_type,
        selected.name.as_ref().map(|n| n.as_str().to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn named_mutation_with_variables() {
        let body = json!({
            "query": "mutation AddTodo($text: String!) { addTodo(text: $text) { id } }",
            "variables": {"text": "milk"}
        })
        .to_string();

        let op = extract_graphql_from_request(&body).unwrap();
        assert_eq!(op.operation_type, OperationType::Mutation);
        assert_eq!(op.operation_name.as_deref(), Some("AddTodo"));
        assert_eq!(op.variables.unwrap()["text"], "milk");
    }

    #[test]
    fn shorthand_query_is_anonymous_query() {
        let op = extract_graphql_from_request(r#"{"query":"{ me { id } }"}"#).unwrap();
        assert_eq!(op.operation_type, OperationType::Query);
        assert_eq!(op.operation_name, None);
        assert_eq!(op.variables, None);
    }

    #[test]
    fn operation_name_selects_among_several() {
        let body = json!({
            "query": "query A { a } subscription B { b }",
            "operationName": "B"
        })
        .to_string();
        let op = extract_graphql_from_request(&body).unwrap();
        assert_eq!(op.operation_type, OperationType::Subscription);
        assert_eq!(op.operation_name.as_deref(), Some("B"));

        let ambiguous = json!({"query": "query A { a } query B { b }"}).to_string();
        assert!(extract_graphql_from_request(&ambiguous).is_none());
    }

    #[test]
    fn rejects_missing_query_and_bad_documents() {
        assert!(extract_graphql_from_request(r#"{"operationName":"A"}"#).is_none());
        assert!(extract_graphql_from_request(r#"{"query":"query {"}"#).is_none());
        assert!(extract_graphql_from_request(r#"{"query":42}"#).is_none());
        assert!(extract_graphql_from_request("not json").is_none());
        assert!(extract_graphql_from_request(r#"{"query":"fragment F on T { a }"}"#).is_none());
    }

    #[test]
    fn get_requests_read_the_query_string() {
        let url = "https://api.x/graphql?query=query%20Me%20%7B%20me%20%7D&variables=%7B%22a%22%3A1%7D";
        let op = extract_graphql_from_url(url).unwrap();
        assert_eq!(op.operation_type, OperationType::Query);
        assert_eq!(op.operation_name.as_deref(), Some("Me"));
        assert_eq!(op.query, "query Me { me }");
        assert_eq!(op.variables.unwrap()["a"], 1);

        assert!(extract_graphql_from_url("https://api.x/graphql").is_none());
    }

    #[test]
    fn relative_get_urls_still_yield_the_operation() {
        let op = extract_graphql_from_url("/graphql?query=query%20Rel%20%7B%20a%20%7D").unwrap();
        assert_eq!(op.operation_name.as_deref(), Some("Rel"));

        let op = extract_graphql_from_url("api/graphql?query=%7B%20a%20%7D&operationName=X").unwrap();
        assert_eq!(op.operation_name.as_deref(), Some("X"));
        assert_eq!(op.query, "{ a }");
    }
}
