use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
};

use crate::types::{ApiKind, Headers};

use super::{NetworkPort, ObservationSink, ObservedRequest, SettlementOutcome, TransportError};

/// Request handed to a fetch implementation.
pub type FetchRequest = http::Request<Option<String>>;
/// Response produced by a fetch implementation.
pub type FetchResponse = http::Response<String>;
/// Pending result of one fetch call.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchResponse, TransportError>>>>;
/// A fetch implementation.
pub type FetchFn = Rc<dyn Fn(FetchRequest) -> FetchFuture>;

/// The host's promise-based call primitive, as a replaceable slot.
pub struct FetchSlot {
    current: RefCell<FetchFn>,
}

impl FetchSlot {
    /// Slot initially holding `fetch`.
    pub fn new(fetch: FetchFn) -> Rc<Self> {
        Rc::new(Self {
            current: RefCell::new(fetch),
        })
    }

    /// Calls whatever implementation the slot currently holds.
    pub fn fetch(&self, request: FetchRequest) -> FetchFuture {
        let fetch = self.current();
        fetch(request)
    }

    /// The implementation currently installed.
    pub fn current(&self) -> FetchFn {
        Rc::clone(&self.current.borrow())
    }

    /// Swaps the implementation, returning the previous one.
    pub fn replace(&self, fetch: FetchFn) -> FetchFn {
        self.current.replace(fetch)
    }
}

/// Port over a [`FetchSlot`].
pub struct FetchPort {
    slot: Rc<FetchSlot>,
    original: FetchFn,
    installed: Cell<bool>,
}

impl FetchPort {
    /// Captures the slot's current implementation as the original.
    pub fn new(slot: Rc<FetchSlot>) -> Self {
        let original = slot.current();
        Self {
            slot,
            original,
            installed: Cell::new(false),
        }
    }

    /// The implementation captured at construction.
    pub fn original(&self) -> FetchFn {
        Rc::clone(&self.original)
    }
}

impl NetworkPort for FetchPort {
    fn api(&self) -> ApiKind {
        ApiKind::Fetch
    }

    fn install(&self, sink: Weak<dyn ObservationSink>) {
        if self.installed.get() {
            return;
        }

        let original = Rc::clone(&self.original);
        let wrapper: FetchFn = Rc::new(move |request: FetchRequest| -> FetchFuture {
            let ticket = sink
                .upgrade()
                .and_then(|s| s.observe_request(snapshot(&request)));
            let call = original(request);

            let Some(ticket) = ticket else {
                return call;
            };

            let sink = Weak::clone(&sink);
            Box::pin(async move {
                let result = call.await;
                if let Some(sink) = sink.upgrade() {
                    sink.observe_settlement(ticket, settlement(&result));
                }
                result
            })
        });

        self.slot.replace(wrapper);
        self.installed.set(true);
    }

    fn uninstall(&self) {
        if !self.installed.get() {
            return;
        }
        self.slot.replace(Rc::clone(&self.original));
        self.installed.set(false);
    }

    fn is_installed(&self) -> bool {
        self.installed.get()
    }
}

fn snapshot(request: &FetchRequest) -> ObservedRequest {
    ObservedRequest {
        api: ApiKind::Fetch,
        url: request.uri().to_string(),
        method: request.method().as_str().to_string(),
        headers: header_map(request.headers()),
        body: request.body().clone(),
    }
}

fn settlement(result: &Result<FetchResponse, TransportError>) -> SettlementOutcome {
    match result {
        Ok(response) => SettlementOutcome::Response {
            status: response.status().as_u16(),
            headers: header_map(response.headers()),
            body: response.body().clone(),
        },
        Err(err) => SettlementOutcome::Failure {
            message: err.to_string(),
        },
    }
}

fn header_map(headers: &http::HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_request_headers_are_joined() {
        let request = http::Request::builder()
            .method("POST")
            .uri("https://api.test/graphql")
            .header("Accept", "application/json")
            .header("X-Trace", "a")
            .header("X-Trace", "b")
            .body(Some("{}".to_string()))
            .unwrap();

        let seen = snapshot(&request);
        assert_eq!(seen.method, "POST");
        assert_eq!(seen.url, "https://api.test/graphql");
        assert_eq!(seen.headers["accept"], "application/json");
        assert_eq!(seen.headers["x-trace"], "a, b");
        assert_eq!(seen.body.as_deref(), Some("{}"));
    }
}
