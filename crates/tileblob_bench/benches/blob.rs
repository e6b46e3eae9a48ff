//! Blob write, read, and scan benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use tileblob_bench::{tile_data, tile_metadata};
use tileblob_core::{BaseOffset, Blob, BlobConfig};
use tileblob_storage::InMemoryBackend;

fn memory_blob() -> Blob {
    Blob::with_backend(Box::new(InMemoryBackend::new()), BlobConfig::default()).unwrap()
}

/// Benchmark stanza writes to an in-memory blob.
fn bench_memory_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_write");

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let blob = memory_blob();
            let metadata = tile_metadata(0);
            let data = tile_data(size);

            b.iter(|| {
                let offset = blob.write(black_box(&metadata), black_box(&data)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark payload reads from an in-memory blob.
fn bench_memory_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_read");

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let blob = memory_blob();
            let offset = blob.write(&tile_metadata(0), &tile_data(size)).unwrap();

            b.iter(|| {
                let data = blob.read_data(black_box(offset)).unwrap();
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark stanza writes to a file-backed blob with fsync disabled,
/// isolating the format overhead from disk latency.
fn bench_file_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_write");
    group.sample_size(50);

    for size in [256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("bench.blob");

            let config = BlobConfig::default().sync_on_commit(false);
            let blob = Blob::open_with_config(&path, config).unwrap();
            let metadata = tile_metadata(0);
            let data = tile_data(size);

            b.iter(|| {
                let offset = blob.write(black_box(&metadata), black_box(&data)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark a full metadata scan, the index-rebuild path.
fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");

    for count in [100u64, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let blob = memory_blob();
            for i in 0..count {
                blob.write(&tile_metadata(i), &tile_data(512)).unwrap();
            }

            b.iter(|| {
                let entries: Vec<(BaseOffset, Vec<u8>)> =
                    blob.iter().map(|r| r.unwrap()).collect();
                black_box(entries);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_memory_write,
    bench_memory_read,
    bench_file_write,
    bench_full_scan
);
criterion_main!(benches);
