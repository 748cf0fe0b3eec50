//! Network observation ports.
//!
//! A port wraps one host network surface so that every call is reported to an
//! [`ObservationSink`] before the original implementation runs. The sink only
//! ever sees [`ObservedRequest`]s and [`SettlementOutcome`]s, never the
//! concrete surface, so the correlation logic can be driven by a fake port.
//!
//! ```text
//! host call ─▶ wrapper ─▶ sink.observe_request ─▶ Some(ticket)?
//!                 │                                    │
//!                 ▼                                    ▼
//!           original impl ── settles ──▶ sink.observe_settlement(ticket, outcome)
//! ```

use std::rc::Weak;

use crate::types::{ApiKind, Headers};

/// Promise-based port.
pub mod fetch;
/// Event-based port.
pub mod xhr;

pub use fetch::{FetchFn, FetchFuture, FetchPort, FetchRequest, FetchResponse, FetchSlot};
pub use xhr::{Xhr, XhrEventKind, XhrPort, XhrPrototype, XhrTransport};

/// Host-level network failure, propagated unchanged to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Failure text as the host reports it.
    pub message: String,
}

impl TransportError {
    /// Wraps a host failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Synchronous snapshot of an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRequest {
    /// Surface the call came through.
    pub api: ApiKind,
    /// Request URL as given by the host.
    pub url: String,
    /// Upper-case HTTP method.
    pub method: String,
    /// Lower-cased request headers; empty when not captured.
    pub headers: Headers,
    /// Request body text, if any.
    pub body: Option<String>,
}

/// Handed back for calls the sink wants to hear about again.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTicket {
    /// URL used to find the pending operation at settlement.
    pub url: String,
    /// Monotonic start time in milliseconds.
    pub started_ms: f64,
}

/// How an observed call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// The host received a response (any status).
    Response {
        /// HTTP status code.
        status: u16,
        /// Lower-cased response headers.
        headers: Headers,
        /// Response body text.
        body: String,
    },
    /// Rejection, network error, or abort.
    Failure {
        /// Human-readable reason.
        message: String,
    },
}

/// Receives observations from installed ports.
pub trait ObservationSink {
    /// Returns a ticket when the call should be followed to settlement.
    fn observe_request(&self, request: ObservedRequest) -> Option<RequestTicket>;

    /// Reports how a ticketed call ended. Called at most once per ticket.
    fn observe_settlement(&self, ticket: RequestTicket, outcome: SettlementOutcome);
}

/// One patchable host network surface.
///
/// `install` and `uninstall` are idempotent. After `uninstall` the surface
/// holds the exact original implementation captured at construction.
pub trait NetworkPort {
    /// Which host API this port wraps.
    fn api(&self) -> ApiKind;

    /// Wraps the surface so calls are reported to `sink`.
    fn install(&self, sink: Weak<dyn ObservationSink>);

    /// Restores the original implementation.
    fn uninstall(&self);

    /// True while the wrapper is in place.
    fn is_installed(&self) -> bool;
}
