use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::time::Duration;

use tilawa_infra::jobs::{InMemoryJobQueue, Job, JobQueue};

const LEASE: Duration = Duration::from_secs(30);

fn payload(i: usize) -> serde_json::Value {
    serde_json::json!({
        "recitationId": format!("018f0d6e-7c2a-7000-8000-{i:012}"),
        "audioUrl": "https://tilawa-storage.example/recitations/bench.mp3",
    })
}

fn bench_enqueue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_throughput");

    for batch in [100usize, 1_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                let queue = InMemoryJobQueue::new();
                for i in 0..batch {
                    queue
                        .enqueue_job(Job::new("audio-process", "process-audio", payload(i)))
                        .unwrap();
                }
                black_box(queue);
            });
        });
    }

    group.finish();
}

fn bench_claim_complete_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_complete_cycle");

    for backlog in [100usize, 1_000] {
        group.throughput(Throughput::Elements(backlog as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(backlog),
            &backlog,
            |b, &backlog| {
                b.iter(|| {
                    let queue = InMemoryJobQueue::new();
                    for i in 0..backlog {
                        queue
                            .enqueue_job(Job::new("audio-process", "process-audio", payload(i)))
                            .unwrap();
                    }
                    while let Some(job) = queue.claim("audio-process", LEASE).unwrap() {
                        queue.complete(job.id).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_claim_with_mixed_queues(c: &mut Criterion) {
    c.bench_function("claim_across_two_queues", |b| {
        b.iter(|| {
            let queue = InMemoryJobQueue::new();
            for i in 0..200 {
                let name = if i % 2 == 0 {
                    "audio-process"
                } else {
                    "moderation-analyze"
                };
                queue
                    .enqueue_job(Job::new(name, "work", payload(i)))
                    .unwrap();
            }
            while let Some(job) = queue.claim("audio-process", LEASE).unwrap() {
                queue.complete(job.id).unwrap();
            }
            while let Some(job) = queue.claim("moderation-analyze", LEASE).unwrap() {
                queue.complete(job.id).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_enqueue_throughput,
    bench_claim_complete_cycle,
    bench_claim_with_mixed_queues
);
criterion_main!(benches);
