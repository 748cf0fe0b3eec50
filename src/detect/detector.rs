use http::Method;
use url::Url;

use crate::{
    parse::{JsonBody, parse_json_body},
    types::JsonValue,
};

const GRAPHQL_PATH_MARKERS: [&str; 2] = ["/graphql", "/graph"];

/// Decides whether a network call is a GraphQL operation.
///
/// A conventional path segment is enough on its own. Otherwise a write
/// method whose JSON body carries `query` or `operationName` qualifies.
/// Malformed bodies simply fail the body check.
pub fn is_graphql_request(url: &str, method: &str, body: Option<&str>) -> bool {
    if path_looks_like_graphql(url) {
        return true;
    }

    if !is_write_method(method) {
        return false;
    }

    match body.map(parse_json_body) {
        Some(JsonBody::Json(value)) => payload_looks_like_graphql(&value),
        _ => false,
    }
}

/// POST, PUT and PATCH, case-insensitively.
pub fn is_write_method(method: &str) -> bool {
    match Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()) {
        Ok(m) => m == Method::POST || m == Method::PUT || m == Method::PATCH,
        Err(_) => false,
    }
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

fn path_looks_like_graphql(url: &str) -> bool {
    let path = url_path(url).to_ascii_lowercase();
    GRAPHQL_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
}

fn payload_looks_like_graphql(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => map.contains_key("query") || map.contains_key("operationName"),
        _ => false,
    }
}
