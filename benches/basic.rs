use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serial_terminal::bytes::Timezone;
use serial_terminal::display::{ReceivePipeline, Transcript};
use serial_terminal::{Chunk, DisplayMode, FormatterState, RenderFormatter, RenderSettings};
use std::hint::black_box;
use std::time::Duration;

const CHUNK_LEN: usize = 64;
const CHUNKS: usize = 1024;

fn log_chunks() -> Vec<Chunk> {
    let line = b"I (1234) wifi: connected, rssi=-61 channel=6\r\n";
    let stream: Vec<u8> = line.iter().copied().cycle().take(CHUNK_LEN * CHUNKS).collect();
    stream
        .chunks(CHUNK_LEN)
        .enumerate()
        .map(|(i, c)| Chunk::new(1_704_164_645_000 + i as i64, c.to_vec()))
        .collect()
}

fn settings(mode: DisplayMode, timestamps: bool) -> RenderSettings {
    RenderSettings {
        mode,
        timestamps,
        timezone: Timezone::Utc,
    }
}

pub fn bench_formatter(c: &mut Criterion) {
    let chunks = log_chunks();
    let mut group = c.benchmark_group("format");
    group.throughput(Throughput::Bytes((CHUNK_LEN * CHUNKS) as u64));

    for (name, s) in [
        ("raw", settings(DisplayMode::Text, false)),
        ("timestamped", settings(DisplayMode::Text, true)),
        ("hex", settings(DisplayMode::Hex, false)),
    ] {
        let formatter = RenderFormatter::new(s, true);
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut state = FormatterState::default();
                black_box(formatter.format(&mut state, black_box(&chunks)))
            })
        });
    }
    group.finish();
}

pub fn bench_repaint(c: &mut Criterion) {
    let chunks = log_chunks();
    let mut group = c.benchmark_group("repaint");
    group.throughput(Throughput::Bytes((CHUNK_LEN * CHUNKS) as u64));

    for batch in [64usize, 2000] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter_batched(
                || {
                    let mut pipeline = ReceivePipeline::new(
                        Transcript::new(),
                        settings(DisplayMode::Text, false),
                        batch,
                    );
                    for chunk in &chunks {
                        pipeline.ingest(chunk.clone());
                    }
                    pipeline
                },
                |mut pipeline| {
                    pipeline.apply_settings(settings(DisplayMode::Hex, false));
                    while pipeline.repaint_step().is_repainting() {}
                    black_box(pipeline.sink().text().len())
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_formatter, bench_repaint
}
criterion_main!(benches);
