use std::{cell::RefCell, rc::Rc};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use gqlinspect::{
    config::InterceptorOptions,
    core::store::OperationStore,
    operation::{Completion, GraphQlRequest, OperationDraft, OperationOutcome},
    port::{Xhr, XhrPort, XhrPrototype, XhrTransport},
    runtime::{Interceptor, ManualClock},
    types::{Headers, JsonValue, OperationType},
};

#[derive(Default)]
struct Discard(RefCell<usize>);

impl XhrTransport for Discard {
    fn dispatch(&self, _xhr: Rc<Xhr>) {
        *self.0.borrow_mut() += 1;
    }
}

fn draft(i: u64) -> OperationDraft {
    OperationDraft {
        operation_type: OperationType::Query,
        operation_name: Some(format!("Op{i}")),
        query: format!("query Op{i} {{ a }}"),
        variables: None,
        request: GraphQlRequest {
            url: "https://api.test/graphql".to_string(),
            method: "POST".to_string(),
            headers: Headers::new(),
            body: None,
            timestamp: i,
        },
    }
}

fn bench_capture_and_settle(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_and_settle");
    for history in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, &history| {
            b.iter(|| {
                let proto = XhrPrototype::new(Rc::new(Discard::default()));
                let clock = Rc::new(ManualClock::new(0));
                let interceptor = Interceptor::builder()
                    .port(XhrPort::new(Rc::clone(&proto)))
                    .clock(clock.clone())
                    .options(InterceptorOptions {
                        max_operation_history: history,
                        ..InterceptorOptions::default()
                    })
                    .build()
                    .expect("build");

                for i in 0..1_000u64 {
                    let xhr = Xhr::new(&proto);
                    xhr.open("POST", "https://api.test/graphql");
                    xhr.send(Some(format!(r#"{{"query":"query Op{i} {{ a }}"}}"#)));
                    clock.advance(1);
                    xhr.respond(200, "Content-Type: application/json\r\n", r#"{"data":{"a":1}}"#);
                }
                interceptor.len()
            });
        });
    }
    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    c.bench_function("store_evict_bound_10_of_5k", |b| {
        b.iter(|| {
            let mut store = OperationStore::new(10);
            for i in 0..5_000u64 {
                let id = store.insert(draft(i), i).id.clone();
                store
                    .settle(
                        &id,
                        Completion {
                            outcome: OperationOutcome::Response(JsonValue::Null),
                            execution_time_ms: 1.0,
                            raw_response: None,
                            response_size: 0,
                        },
                    )
                    .expect("settle");
                store.evict_overflow();
            }
            store.len()
        });
    });
}

criterion_group!(benches, bench_capture_and_settle, bench_eviction);
criterion_main!(benches);
