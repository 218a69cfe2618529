//! Пропускная способность горячего пути приёма: сборка порций в буфере
//! с метками времени и объединение пар разнесённого приёма.
//!
//!   cargo bench -p trx-benchmark

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use trx_core::{combine_pair, TimestampedBuffer};
use trx_types::Timestamp;

fn chunk(
    chans: usize,
    len: usize,
) -> Vec<Vec<i16>> {
    (0..chans)
        .map(|c| {
            (0..2 * len)
                .map(|i| ((i * 31 + c * 7) % 2_000) as i16 - 1_000)
                .collect()
        })
        .collect()
}

/// Добавление порций в буфер с вытеснением старых.
fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_push");

    for len in [156usize, 625, 2_500] {
        let data = chunk(2, len);
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut buf = TimestampedBuffer::new(2, 64 * len);
            let mut ts: Timestamp = 0;

            b.iter(|| {
                black_box(buf.push(ts, &data));
                ts += len as Timestamp;
            });
        });
    }

    group.finish();
}

/// Чтение окна по метке времени и освобождение прочитанного.
fn bench_copy_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_copy_out");
    let chunk_len = 625;
    let data = chunk(2, chunk_len);

    for len in [156usize, 625, 1_250] {
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut buf = TimestampedBuffer::new(2, 256 * chunk_len);
            let mut out = vec![vec![0i16; 2 * len]; 2];
            let mut write_ts: Timestamp = 0;
            let mut read_ts: Timestamp = 0;

            b.iter(|| {
                while write_ts < read_ts + len as Timestamp {
                    buf.push(write_ts, &data);
                    write_ts += chunk_len as Timestamp;
                }

                let span = buf.copy_out(read_ts, len, &mut out);
                read_ts = span.timestamp + span.samples as Timestamp;
                buf.discard_before(read_ts);
                black_box(span)
            });
        });
    }

    group.finish();
}

/// Взвешенное объединение пары ветвей.
fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("diversity_combine");

    for len in [156usize, 625, 2_500] {
        let branches = chunk(2, len);
        let mut out = vec![0i16; 2 * len];
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                black_box(combine_pair(
                    black_box(&branches[0]),
                    black_box(&branches[1]),
                    &mut out,
                    32_767.0,
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push, bench_copy_out, bench_combine);
criterion_main!(benches);
