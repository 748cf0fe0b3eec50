//! GraphQL network-operation correlation and interception.
//!
//! An [`Interceptor`](runtime::Interceptor) wraps host network surfaces
//! (a promise-based [`FetchSlot`](port::FetchSlot) and an event-based
//! [`XhrPrototype`](port::XhrPrototype)), records every GraphQL call as an
//! [`Operation`](operation::Operation), correlates its response back to it and
//! fans lifecycle events out to subscribers. Non-GraphQL traffic passes
//! through untouched.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use gqlinspect::{
//!     port::{FetchFn, FetchFuture, FetchPort, FetchRequest, FetchSlot, TransportError},
//!     runtime::Interceptor,
//!     types::OperationStatus,
//! };
//!
//! let fetch: FetchFn = Rc::new(|_request: FetchRequest| -> FetchFuture {
//!     let response = http::Response::new(r#"{"data":{"me":null}}"#.to_string());
//!     Box::pin(async move { Ok::<_, TransportError>(response) })
//! });
//! let slot = FetchSlot::new(fetch);
//!
//! let interceptor = Interceptor::builder()
//!     .port(FetchPort::new(Rc::clone(&slot)))
//!     .build()
//!     .expect("default options are valid");
//!
//! let request = http::Request::post("https://api.example.com/graphql")
//!     .body(Some(r#"{"query":"query Me { me { id } }"}"#.to_string()))
//!     .expect("request");
//! let _pending_response = slot.fetch(request);
//!
//! let ops = interceptor.operations();
//! assert_eq!(ops.len(), 1);
//! assert_eq!(ops[0].operation_name.as_deref(), Some("Me"));
//! assert_eq!(ops[0].status(), OperationStatus::Pending);
//! ```

#![deny(missing_docs)]

/// Interceptor options and TOML loading.
pub mod config;
/// Operation store, settlement resolution and statistics.
pub mod core;
/// GraphQL request detection and operation extraction.
pub mod detect;
/// The observed operation record and its lifecycle.
pub mod operation;
/// Header block and JSON body parsing.
pub mod parse;
/// Patchable network surfaces and the observation seam.
pub mod port;
/// Interceptor, subscriber hub, events and clocks.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;

pub use config::{ConfigError, InterceptorOptions, OptionsPatch};
pub use operation::Operation;
pub use runtime::{Interceptor, OperationEvent, Subscription};
