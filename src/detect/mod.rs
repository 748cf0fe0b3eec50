//! GraphQL traffic classification and operation extraction.

/// URL/method/body heuristics.
pub mod detector;
/// Document parsing into operation kind and name.
pub mod extract;

pub use detector::{is_graphql_request, is_write_method};
pub use extract::{PartialOperation, extract_graphql_from_request, extract_graphql_from_url};
