//! Defensive parsers for raw header blocks and JSON bodies.
//!
//! Nothing here fails: malformed input degrades to an empty map or
//! [`body::JsonBody::NotJson`].

/// JSON body parsing.
pub mod body;
/// Raw header block parsing.
pub mod headers;

pub use body::{JsonBody, body_size, parse_json_body};
pub use headers::parse_headers;
