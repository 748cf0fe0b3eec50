use crate::types::JsonValue;

/// Outcome of trying to read a body as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonBody {
    /// Body parsed as JSON.
    Json(JsonValue),
    /// Blank or not valid JSON; treat as opaque.
    NotJson,
}

impl JsonBody {
    /// Parsed value, if any.
    pub fn into_json(self) -> Option<JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            Self::NotJson => None,
        }
    }
}

/// Attempts to parse `body` as JSON without ever failing.
pub fn parse_json_body(body: &str) -> JsonBody {
    if body.trim().is_empty() {
        return JsonBody::NotJson;
    }

    match serde_json::from_str(body) {
        Ok(value) => JsonBody::Json(value),
        Err(_) => JsonBody::NotJson,
    }
}

/// Body size in bytes; absent bodies count as zero.
pub fn body_size(body: Option<&str>) -> usize {
    body.map_or(0, str::len)
}
