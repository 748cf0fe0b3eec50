use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{
    parse::parse_headers,
    types::{ApiKind, Headers},
};

use super::{NetworkPort, ObservationSink, ObservedRequest, RequestTicket, SettlementOutcome};

/// Created, not opened yet.
pub const UNSENT: u8 = 0;
/// `open` was called.
pub const OPENED: u8 = 1;
/// Response headers are available.
pub const HEADERS_RECEIVED: u8 = 2;
/// The body is arriving.
pub const LOADING: u8 = 3;
/// Finished, successfully or not.
pub const DONE: u8 = 4;

const NETWORK_FAILURE: &str = "Network request failed";
const ABORTED: &str = "Request aborted";

/// Events an [`Xhr`] dispatches to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhrEventKind {
    /// Fired on every ready-state transition.
    ReadyStateChange,
    /// A response was received.
    Load,
    /// Network failure.
    Error,
    /// The request was aborted.
    Abort,
}

/// An event listener.
pub type XhrListener = Rc<dyn Fn(&Xhr)>;
/// Prototype `open(xhr, method, url)`.
pub type OpenFn = Rc<dyn Fn(&Rc<Xhr>, &str, &str)>;
/// Prototype `send(xhr, body)`.
pub type SendFn = Rc<dyn Fn(&Rc<Xhr>, Option<String>)>;

/// Platform side of the event-based API: carries sent requests somewhere and
/// later calls [`Xhr::respond`], [`Xhr::fail`] or [`Xhr::abort`].
pub trait XhrTransport {
    /// Takes over a request that has just been sent.
    fn dispatch(&self, xhr: Rc<Xhr>);
}

/// Shared `open`/`send` implementations used by every [`Xhr`] instance.
pub struct XhrPrototype {
    open: RefCell<OpenFn>,
    send: RefCell<SendFn>,
}

impl XhrPrototype {
    /// Native `open`/`send` that hand sent requests to `transport`.
    pub fn new(transport: Rc<dyn XhrTransport>) -> Rc<Self> {
        let open: OpenFn =
            Rc::new(|xhr: &Rc<Xhr>, method: &str, url: &str| xhr.native_open(method, url));
        let send: SendFn = Rc::new(move |xhr: &Rc<Xhr>, body: Option<String>| {
            xhr.native_send(body);
            transport.dispatch(Rc::clone(xhr));
        });

        Rc::new(Self {
            open: RefCell::new(open),
            send: RefCell::new(send),
        })
    }

    /// Current `open`.
    pub fn open_fn(&self) -> OpenFn {
        Rc::clone(&self.open.borrow())
    }

    /// Current `send`.
    pub fn send_fn(&self) -> SendFn {
        Rc::clone(&self.send.borrow())
    }

    /// Swaps `open`, returning the previous implementation.
    pub fn replace_open(&self, open: OpenFn) -> OpenFn {
        self.open.replace(open)
    }

    /// Swaps `send`, returning the previous implementation.
    pub fn replace_send(&self, send: SendFn) -> SendFn {
        self.send.replace(send)
    }
}

#[derive(Debug, Default)]
struct XhrState {
    method: String,
    url: String,
    ready_state: u8,
    status: u16,
    response_text: String,
    response_headers: String,
    request_headers: Vec<(String, String)>,
    body: Option<String>,
    aborted: bool,
}

/// Ticket for the request currently in flight on an [`Xhr`].
struct Tracking {
    ticket: RequestTicket,
    sink: Weak<dyn ObservationSink>,
}

/// One event-based request object.
pub struct Xhr {
    prototype: Rc<XhrPrototype>,
    state: RefCell<XhrState>,
    listeners: RefCell<Vec<(XhrEventKind, XhrListener)>>,
    tracking: RefCell<Option<Tracking>>,
    following: Cell<bool>,
}

impl Xhr {
    /// A fresh, unsent request object.
    pub fn new(prototype: &Rc<XhrPrototype>) -> Rc<Self> {
        Rc::new(Self {
            prototype: Rc::clone(prototype),
            state: RefCell::new(XhrState::default()),
            listeners: RefCell::new(Vec::new()),
            tracking: RefCell::new(None),
            following: Cell::new(false),
        })
    }

    /// Calls the prototype's current `open`.
    pub fn open(self: &Rc<Self>, method: &str, url: &str) {
        let open = self.prototype.open_fn();
        open(self, method, url);
    }

    /// Calls the prototype's current `send`.
    pub fn send(self: &Rc<Self>, body: Option<String>) {
        let send = self.prototype.send_fn();
        send(self, body);
    }

    /// Appends a request header.
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.state
            .borrow_mut()
            .request_headers
            .push((name.to_string(), value.to_string()));
    }

    /// Listeners run in registration order.
    pub fn add_event_listener(&self, kind: XhrEventKind, listener: impl Fn(&Xhr) + 'static) {
        self.listeners.borrow_mut().push((kind, Rc::new(listener)));
    }

    /// One of [`UNSENT`] through [`DONE`].
    pub fn ready_state(&self) -> u8 {
        self.state.borrow().ready_state
    }

    /// 0 until a response arrives, and after failure or abort.
    pub fn status(&self) -> u16 {
        self.state.borrow().status
    }

    /// Body text; empty before a response.
    pub fn response_text(&self) -> String {
        self.state.borrow().response_text.clone()
    }

    /// Raw CRLF-separated response header block.
    pub fn get_all_response_headers(&self) -> String {
        self.state.borrow().response_headers.clone()
    }

    /// True if [`Xhr::abort`] ended the request.
    pub fn was_aborted(&self) -> bool {
        self.state.borrow().aborted
    }

    // Platform-side accessors, for transports.

    /// Upper-cased method from the latest `open`.
    pub fn method(&self) -> String {
        self.state.borrow().method.clone()
    }

    /// URL from the latest `open`.
    pub fn url(&self) -> String {
        self.state.borrow().url.clone()
    }

    /// Headers set since the latest `open`, in order.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.state.borrow().request_headers.clone()
    }

    /// Body passed to the latest `send`.
    pub fn request_body(&self) -> Option<String> {
        self.state.borrow().body.clone()
    }

    /// Completes the request with a response.
    pub fn respond(&self, status: u16, raw_headers: &str, body: &str) {
        if !self.begin_completion() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            state.status = status;
            state.response_headers = raw_headers.to_string();
            state.response_text = body.to_string();
        }
        self.set_ready_state(HEADERS_RECEIVED);
        self.set_ready_state(LOADING);
        self.set_ready_state(DONE);
        self.dispatch(XhrEventKind::Load);
    }

    /// Completes the request with a network error.
    pub fn fail(&self) {
        if !self.begin_completion() {
            return;
        }
        self.state.borrow_mut().status = 0;
        self.set_ready_state(DONE);
        self.dispatch(XhrEventKind::Error);
    }

    /// Cancels the request. Ignored once it is done.
    pub fn abort(&self) {
        if !self.begin_completion() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            state.status = 0;
            state.aborted = true;
        }
        self.set_ready_state(DONE);
        self.dispatch(XhrEventKind::Abort);
    }

    fn begin_completion(&self) -> bool {
        let ready_state = self.ready_state();
        ready_state != UNSENT && ready_state != DONE
    }

    fn native_open(&self, method: &str, url: &str) {
        self.untrack();
        {
            let mut state = self.state.borrow_mut();
            *state = XhrState {
                method: method.to_ascii_uppercase(),
                url: url.to_string(),
                ..XhrState::default()
            };
        }
        self.set_ready_state(OPENED);
    }

    fn native_send(&self, body: Option<String>) {
        self.state.borrow_mut().body = body;
    }

    fn set_ready_state(&self, ready_state: u8) {
        self.state.borrow_mut().ready_state = ready_state;
        self.dispatch(XhrEventKind::ReadyStateChange);
    }

    fn dispatch(&self, kind: XhrEventKind) {
        let listeners: Vec<XhrListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    /// Replaces the in-flight ticket. Settlement listeners are attached once
    /// per object and always read the current ticket.
    fn track(&self, ticket: RequestTicket, sink: Weak<dyn ObservationSink>) {
        *self.tracking.borrow_mut() = Some(Tracking { ticket, sink });
        if self.following.replace(true) {
            return;
        }

        self.add_event_listener(XhrEventKind::ReadyStateChange, |xhr: &Xhr| {
            if xhr.ready_state() == DONE {
                xhr.settle(completed(xhr));
            }
        });
        self.add_event_listener(XhrEventKind::Error, |xhr: &Xhr| {
            xhr.settle(SettlementOutcome::Failure {
                message: NETWORK_FAILURE.to_string(),
            });
        });
    }

    fn untrack(&self) -> Option<Tracking> {
        self.tracking.borrow_mut().take()
    }

    /// Reports the current ticket, at most once.
    fn settle(&self, outcome: SettlementOutcome) {
        let Some(Tracking { ticket, sink }) = self.untrack() else {
            return;
        };
        if let Some(sink) = sink.upgrade() {
            sink.observe_settlement(ticket, outcome);
        }
    }
}

/// Port over an [`XhrPrototype`].
///
/// Request headers are not captured for this API; observed requests carry an
/// empty header map.
pub struct XhrPort {
    prototype: Rc<XhrPrototype>,
    original_open: OpenFn,
    original_send: SendFn,
    installed: Cell<bool>,
}

impl XhrPort {
    /// Captures the prototype's current `open`/`send` as the originals.
    pub fn new(prototype: Rc<XhrPrototype>) -> Self {
        let original_open = prototype.open_fn();
        let original_send = prototype.send_fn();
        Self {
            prototype,
            original_open,
            original_send,
            installed: Cell::new(false),
        }
    }

    /// The `open` captured at construction.
    pub fn original_open(&self) -> OpenFn {
        Rc::clone(&self.original_open)
    }

    /// The `send` captured at construction.
    pub fn original_send(&self) -> SendFn {
        Rc::clone(&self.original_send)
    }
}

impl NetworkPort for XhrPort {
    fn api(&self) -> ApiKind {
        ApiKind::Xhr
    }

    fn install(&self, sink: Weak<dyn ObservationSink>) {
        if self.installed.get() {
            return;
        }

        let open = Rc::clone(&self.original_open);
        let open_wrapper: OpenFn = Rc::new(move |xhr: &Rc<Xhr>, method: &str, url: &str| {
            // A reopened object abandons whatever it was following.
            xhr.untrack();
            open(xhr, method, url);
        });

        let send = Rc::clone(&self.original_send);
        let send_wrapper: SendFn = Rc::new(move |xhr: &Rc<Xhr>, body: Option<String>| {
            xhr.untrack();
            if let Some(s) = sink.upgrade() {
                let request = ObservedRequest {
                    api: ApiKind::Xhr,
                    url: xhr.url(),
                    method: xhr.method(),
                    headers: Headers::new(),
                    body: body.clone(),
                };
                if let Some(ticket) = s.observe_request(request) {
                    xhr.track(ticket, Weak::clone(&sink));
                }
            }
            send(xhr, body);
        });

        self.prototype.replace_open(open_wrapper);
        self.prototype.replace_send(send_wrapper);
        self.installed.set(true);
    }

    fn uninstall(&self) {
        if !self.installed.get() {
            return;
        }
        self.prototype.replace_open(Rc::clone(&self.original_open));
        self.prototype.replace_send(Rc::clone(&self.original_send));
        self.installed.set(false);
    }

    fn is_installed(&self) -> bool {
        self.installed.get()
    }
}

fn completed(xhr: &Xhr) -> SettlementOutcome {
    match xhr.status() {
        0 if xhr.was_aborted() => SettlementOutcome::Failure {
            message: ABORTED.to_string(),
        },
        0 => SettlementOutcome::Failure {
            message: NETWORK_FAILURE.to_string(),
        },
        status => SettlementOutcome::Response {
            status,
            headers: parse_headers(xhr.get_all_response_headers().as_str()),
            body: xhr.response_text(),
        },
    }
}
