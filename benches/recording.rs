use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hartrace::config::RecorderConfig;
use hartrace::recording::{ActivityRecorder, Payload, RequestDescriptor, ResponseDescriptor};
use serde_json::json;

fn recorder_with_traffic(entries: usize) -> ActivityRecorder {
    let mut recorder = ActivityRecorder::new(RecorderConfig::default());
    recorder.start_new_activity("/home");

    let t0 = Utc::now();
    for i in 0..entries {
        let url = format!("api/items/{i}");
        let token = recorder
            .add_request(&RequestDescriptor::new("GET", url.as_str()), t0)
            .unwrap();
        recorder
            .complete_response(
                token,
                &ResponseDescriptor::new(url, 200).with_body(Payload::Json(json!({"id": i}))),
            )
            .unwrap();
    }

    recorder
}

fn bench_correlate_by_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlate_by_key");

    for pending in [10, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(pending),
            &pending,
            |b, &pending| {
                b.iter_batched(
                    || {
                        let mut recorder = ActivityRecorder::new(RecorderConfig::default());
                        recorder.start_new_activity("/home");
                        let t0 = Utc::now();
                        for i in 0..pending {
                            recorder
                                .add_request(
                                    &RequestDescriptor::new("GET", "api/poll"),
                                    t0 + Duration::milliseconds(i as i64),
                                )
                                .unwrap();
                        }
                        let last = t0 + Duration::milliseconds(pending as i64 - 1);
                        (recorder, last)
                    },
                    |(mut recorder, last)| {
                        recorder
                            .add_response(
                                black_box(&ResponseDescriptor::new("api/poll", 200)),
                                black_box(last),
                            )
                            .unwrap()
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_record_and_complete(c: &mut Criterion) {
    let mut recorder = ActivityRecorder::new(RecorderConfig::default());
    recorder.start_new_activity("/home");

    let request = RequestDescriptor::new("POST", "api/orders")
        .with_header("Content-Type", "application/json")
        .with_body(Payload::Json(json!({"item": "widget", "quantity": 3})));
    let response = ResponseDescriptor::new("api/orders", 201)
        .with_body(Payload::Json(json!({"id": 42, "status": "created"})));

    c.bench_function("record_and_complete", |b| {
        b.iter(|| {
            let token = recorder
                .add_request(black_box(&request), Utc::now())
                .unwrap();
            recorder
                .complete_response(token, black_box(&response))
                .unwrap()
        });
    });
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for entries in [10, 100, 1_000] {
        let recorder = recorder_with_traffic(entries);
        group.bench_with_input(BenchmarkId::from_parameter(entries), &recorder, |b, recorder| {
            b.iter(|| recorder.export().unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_correlate_by_key,
    bench_record_and_complete,
    bench_export
);
criterion_main!(benches);
