use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use tokio::sync::mpsc;

use crate::{
    config::{ConfigError, InterceptorOptions, OptionsPatch},
    core::{
        resolve::resolve_settlement,
        stats::{OperationStats, compute_stats},
        store::OperationStore,
    },
    detect::{PartialOperation, extract_graphql_from_request, extract_graphql_from_url, is_graphql_request},
    operation::{Completion, GraphQlRequest, Operation, OperationDraft},
    port::{NetworkPort, ObservationSink, ObservedRequest, RequestTicket, SettlementOutcome},
    types::OperationId,
};

use super::{
    clock::{Clock, SystemClock},
    events::OperationEvent,
    hub::{SubscriberHub, Subscription},
};

/// Handle to one interception engine.
///
/// Clones share the same store, hub and ports. When the last clone is
/// dropped every port is uninstalled.
#[derive(Clone)]
pub struct Interceptor {
    inner: Rc<Inner>,
}

struct Inner {
    me: Weak<Inner>,
    options: RefCell<InterceptorOptions>,
    store: RefCell<OperationStore>,
    hub: Rc<SubscriberHub>,
    ports: Vec<Box<dyn NetworkPort>>,
    clock: Rc<dyn Clock>,
    installed: Cell<bool>,
}

/// Builder for [`Interceptor`].
#[derive(Default)]
pub struct InterceptorBuilder {
    options: InterceptorOptions,
    ports: Vec<Box<dyn NetworkPort>>,
    clock: Option<Rc<dyn Clock>>,
}

impl InterceptorBuilder {
    /// Adds a network surface to observe.
    pub fn port(mut self, port: impl NetworkPort + 'static) -> Self {
        self.ports.push(Box::new(port));
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to [`InterceptorOptions::default`].
    pub fn options(mut self, options: InterceptorOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the options and installs the ports when `enabled` is set.
    pub fn build(self) -> Result<Interceptor, ConfigError> {
        self.options.validate()?;

        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock::new()));
        let store = OperationStore::new(self.options.max_operation_history);
        let enabled = self.options.enabled;
        let options = self.options;
        let ports = self.ports;

        let inner = Rc::new_cyclic(|me| Inner {
            me: Weak::clone(me),
            options: RefCell::new(options),
            store: RefCell::new(store),
            hub: SubscriberHub::new(),
            ports,
            clock,
            installed: Cell::new(false),
        });

        if enabled {
            inner.install();
        }
        Ok(Interceptor { inner })
    }
}

impl Interceptor {
    /// Starts an [`InterceptorBuilder`].
    pub fn builder() -> InterceptorBuilder {
        InterceptorBuilder::default()
    }

    /// Wraps every port. Calling it while installed does nothing.
    pub fn install(&self) {
        self.inner.install();
    }

    /// Restores every port's original implementation. Idempotent.
    pub fn uninstall(&self) {
        self.inner.uninstall();
    }

    /// True while the ports are wrapped.
    pub fn is_installed(&self) -> bool {
        self.inner.installed.get()
    }

    /// Registers `listener` after replaying every stored operation to it as
    /// [`OperationEvent::Created`], oldest first.
    pub fn subscribe(&self, listener: impl Fn(&OperationEvent) + 'static) -> Subscription {
        let existing: Vec<Operation> = self
            .inner
            .store
            .borrow()
            .oldest_first()
            .into_iter()
            .cloned()
            .collect();
        self.inner.hub.subscribe_with_replay(existing, listener)
    }

    /// Same as [`Interceptor::subscribe`], delivered through a channel.
    ///
    /// The receiver ends once the returned subscription is unsubscribed or
    /// the interceptor is dropped.
    pub fn event_stream(&self) -> (Subscription, mpsc::UnboundedReceiver<OperationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event: &OperationEvent| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Snapshot of the store, newest first.
    pub fn operations(&self) -> Vec<Operation> {
        self.inner
            .store
            .borrow()
            .newest_first()
            .into_iter()
            .cloned()
            .collect()
    }

    /// `None` means the id was never issued or has been evicted.
    pub fn operation(&self, id: &OperationId) -> Option<Operation> {
        self.inner.store.borrow().get_cloned(id)
    }

    /// Empties the store and emits [`OperationEvent::Cleared`].
    pub fn clear_operations(&self) {
        let dropped = {
            let mut store = self.inner.store.borrow_mut();
            let dropped = store.len();
            store.clear();
            dropped
        };
        tracing::debug!(dropped, "operations cleared");
        self.inner.hub.notify(&OperationEvent::Cleared);
    }

    /// Applies `patch` if the merged options validate.
    ///
    /// A changed `enabled` installs or uninstalls; a lowered
    /// `max_operation_history` evicts right away.
    pub fn update_options(&self, patch: OptionsPatch) -> Result<(), ConfigError> {
        if patch.is_empty() {
            return Ok(());
        }

        let next = self.inner.options.borrow().merged(&patch);
        next.validate()?;
        let previous = self.inner.options.replace(next.clone());

        if next.max_operation_history != previous.max_operation_history {
            let evicted = self
                .inner
                .store
                .borrow_mut()
                .set_max_history(next.max_operation_history);
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "evicted after history bound change");
            }
        }

        tracing::info!(
            enabled = next.enabled,
            auto_detect = next.auto_detect_endpoints,
            endpoints = next.endpoints.len(),
            max_history = next.max_operation_history,
            "interceptor options updated"
        );

        if next.enabled != previous.enabled {
            if next.enabled {
                self.inner.install();
            } else {
                self.inner.uninstall();
            }
        }
        Ok(())
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> InterceptorOptions {
        self.inner.options.borrow().clone()
    }

    /// Stats over the configured trailing window, as of now.
    pub fn stats(&self) -> OperationStats {
        let window = self.inner.options.borrow().stats_window();
        let now = self.inner.clock.epoch_ms();
        compute_stats(self.inner.store.borrow().iter(), now, window)
    }

    /// Number of stored operations.
    pub fn len(&self) -> usize {
        self.inner.store.borrow().len()
    }

    /// True when the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.inner.store.borrow().is_empty()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("installed", &self.inner.installed.get())
            .field("ports", &self.inner.ports.len())
            .field("operations", &self.len())
            .field("subscribers", &self.inner.hub.len())
            .finish()
    }
}

impl Inner {
    fn install(&self) {
        if self.installed.replace(true) {
            return;
        }
        let sink: Weak<dyn ObservationSink> = self.me.clone();
        for port in &self.ports {
            port.install(Weak::clone(&sink));
        }
        tracing::info!(ports = self.ports.len(), "GraphQL interception installed");
    }

    fn uninstall(&self) {
        if !self.installed.replace(false) {
            return;
        }
        for port in &self.ports {
            port.uninstall();
        }
        tracing::info!(ports = self.ports.len(), "GraphQL interception removed");
    }

    fn is_graphql(&self, request: &ObservedRequest) -> bool {
        let options = self.options.borrow();
        (options.auto_detect_endpoints
            && is_graphql_request(&request.url, &request.method, request.body.as_deref()))
            || options.matches_endpoint(&request.url)
    }

    fn evict(&self) {
        let evicted = self.store.borrow_mut().evict_overflow();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted oldest operations");
        }
    }
}

fn extract(request: &ObservedRequest) -> Option<PartialOperation> {
    request
        .body
        .as_deref()
        .and_then(extract_graphql_from_request)
        .or_else(|| {
            request
                .method
                .eq_ignore_ascii_case("GET")
                .then(|| extract_graphql_from_url(&request.url))
                .flatten()
        })
}

impl ObservationSink for Inner {
    fn observe_request(&self, request: ObservedRequest) -> Option<RequestTicket> {
        if !self.is_graphql(&request) {
            tracing::trace!(api = %request.api, url = %request.url, "pass-through");
            return None;
        }
        let Some(partial) = extract(&request) else {
            tracing::debug!(
                api = %request.api,
                url = %request.url,
                method = %request.method,
                "detected request has no extractable operation"
            );
            return None;
        };

        let now = self.clock.epoch_ms();
        let ticket = RequestTicket {
            url: request.url.clone(),
            started_ms: self.clock.monotonic_ms(),
        };
        let draft = OperationDraft {
            operation_type: partial.operation_type,
            operation_name: partial.operation_name,
            query: partial.query,
            variables: partial.variables,
            request: GraphQlRequest {
                url: request.url,
                method: request.method,
                headers: request.headers,
                body: request.body,
                timestamp: now,
            },
        };

        let created = self.store.borrow_mut().insert(draft, now).clone();
        tracing::debug!(
            operation_id = %created.id,
            api = %request.api,
            url = %created.network_info.url,
            method = %created.network_info.method,
            "captured GraphQL operation"
        );
        self.hub.notify(&OperationEvent::Created(created));
        self.evict();

        Some(ticket)
    }

    fn observe_settlement(&self, ticket: RequestTicket, outcome: SettlementOutcome) {
        let pending = self.store.borrow().find_pending_for_url(&ticket.url).cloned();
        let Some(id) = pending else {
            tracing::warn!(url = %ticket.url, "settled request has no pending operation");
            return;
        };

        let resolution = resolve_settlement(outcome, self.clock.epoch_ms());
        let completion = Completion {
            outcome: resolution.outcome,
            execution_time_ms: (self.clock.monotonic_ms() - ticket.started_ms).max(0.0),
            raw_response: resolution.raw_response,
            response_size: resolution.response_size,
        };

        let settled = self
            .store
            .borrow_mut()
            .settle(&id, completion)
            .map(Operation::clone);
        match settled {
            Ok(op) => {
                tracing::debug!(
                    operation_id = %op.id,
                    url = %op.network_info.url,
                    status = ?op.status(),
                    "operation settled"
                );
                self.hub.notify(&OperationEvent::Updated(op));
                self.evict();
            }
            Err(err) => {
                tracing::warn!(operation_id = %id, error = %err, "settlement refused");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.installed.get() {
            for port in &self.ports {
                port.uninstall();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::clock::ManualClock,
        types::{ApiKind, Headers, OperationStatus},
    };

    /// Port that records install calls and hands the sink to the test.
    #[derive(Default)]
    struct FakePort {
        sink: Rc<RefCell<Option<Weak<dyn ObservationSink>>>>,
    }

    impl NetworkPort for FakePort {
        fn api(&self) -> ApiKind {
            ApiKind::Fetch
        }

        fn install(&self, sink: Weak<dyn ObservationSink>) {
            *self.sink.borrow_mut() = Some(sink);
        }

        fn uninstall(&self) {
            *self.sink.borrow_mut() = None;
        }

        fn is_installed(&self) -> bool {
            self.sink.borrow().is_some()
        }
    }

    fn post(url: &str, body: &str) -> ObservedRequest {
        ObservedRequest {
            api: ApiKind::Fetch,
            url: url.to_string(),
            method: "POST".to_string(),
            headers: Headers::new(),
            body: Some(body.to_string()),
        }
    }

    fn ok(body: &str) -> SettlementOutcome {
        SettlementOutcome::Response {
            status: 200,
            headers: Headers::new(),
            body: body.to_string(),
        }
    }

    fn setup(options: InterceptorOptions) -> (Interceptor, Rc<dyn ObservationSink>, Rc<ManualClock>) {
        let port = FakePort::default();
        let handle = Rc::clone(&port.sink);
        let clock = Rc::new(ManualClock::new(1_000));
        let interceptor = Interceptor::builder()
            .port(port)
            .clock(clock.clone())
            .options(options)
            .build()
            .unwrap();
        let sink = handle
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("port installed");
        (interceptor, sink, clock)
    }

    #[test]
    fn fake_port_drives_full_lifecycle() {
        let (interceptor, sink, clock) = setup(InterceptorOptions::default());

        let ticket = sink
            .observe_request(post("https://api.test/graphql", r#"{"query":"query Me { me }"}"#))
            .expect("graphql request is followed");
        let ops = interceptor.operations();
        let pending = &ops[0];
        assert_eq!(pending.status(), OperationStatus::Pending);
        assert_eq!(pending.operation_name.as_deref(), Some("Me"));
        assert_eq!(pending.execution_time(), None);

        clock.advance(12);
        sink.observe_settlement(ticket, ok(r#"{"data":{"me":1}}"#));

        let done = interceptor.operation(&pending.id).unwrap();
        assert_eq!(done.status(), OperationStatus::Success);
        assert_eq!(done.execution_time(), Some(12.0));
        assert_eq!(done.network_info.response_size, 17);
    }

    #[test]
    fn non_graphql_requests_are_not_followed() {
        let (interceptor, sink, _clock) = setup(InterceptorOptions::default());
        assert!(sink.observe_request(post("https://api.test/users", "{}")).is_none());
        assert!(interceptor.is_empty());
    }

    #[test]
    fn endpoint_hints_replace_heuristic_when_auto_detect_is_off() {
        let options = InterceptorOptions {
            auto_detect_endpoints: false,
            endpoints: vec!["/api/q".to_string()],
            ..InterceptorOptions::default()
        };
        let (interceptor, sink, _clock) = setup(options);
        let body = r#"{"query":"{ me }"}"#;

        assert!(sink.observe_request(post("https://h/graphql", body)).is_none());
        assert!(sink.observe_request(post("https://h/api/q", body)).is_some());
        assert_eq!(interceptor.len(), 1);
    }

    #[test]
    fn settlement_without_pending_operation_is_dropped() {
        let (interceptor, sink, _clock) = setup(InterceptorOptions::default());
        sink.observe_settlement(
            RequestTicket {
                url: "https://api.test/graphql".to_string(),
                started_ms: 0.0,
            },
            ok("{}"),
        );
        assert!(interceptor.is_empty());
    }

    #[test]
    fn invalid_options_are_rejected_at_build() {
        let result = Interceptor::builder()
            .options(InterceptorOptions {
                max_operation_history: 0,
                ..InterceptorOptions::default()
            })
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn disabled_options_leave_ports_alone() {
        let port = FakePort::default();
        let handle = Rc::clone(&port.sink);
        let interceptor = Interceptor::builder()
            .port(port)
            .options(InterceptorOptions {
                enabled: false,
                ..InterceptorOptions::default()
            })
            .build()
            .unwrap();
        assert!(!interceptor.is_installed());
        assert!(handle.borrow().is_none());

        interceptor
            .update_options(OptionsPatch {
                enabled: Some(true),
                ..OptionsPatch::default()
            })
            .unwrap();
        assert!(interceptor.is_installed());
        assert!(handle.borrow().is_some());

        drop(interceptor);
        assert!(handle.borrow().is_none());
    }
}
