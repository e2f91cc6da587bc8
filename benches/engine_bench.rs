//! Performance benchmarks for the engine write path and the backup cycle.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use coffer::backup::BackupEngine;
use coffer::config::{Options, RestoreOptions};
use coffer::engine::memtable::MemTable;
use coffer::engine::wal::WriteAheadLog;
use coffer::engine::Coffer;

fn creating_options() -> Options {
    let mut opts = Options::new();
    opts.set_create_if_missing(true).unwrap();
    opts
}

fn bench_memtable_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("memtable");

    group.bench_function("put_1000", |b| {
        b.iter(|| {
            let mut table = MemTable::new();
            for i in 0..1000 {
                let key = format!("key_{:06}", i).into_bytes();
                let value = format!("value_{:06}", i).into_bytes();
                table.put(black_box(key), black_box(value));
            }
        });
    });

    group.bench_function("lookup_hit", |b| {
        let mut table = MemTable::new();
        for i in 0..1000 {
            table.put(
                format!("key_{:06}", i).into_bytes(),
                format!("value_{:06}", i).into_bytes(),
            );
        }
        b.iter(|| {
            black_box(table.lookup(b"key_000500"));
        });
    });

    group.bench_function("lookup_miss", |b| {
        let mut table = MemTable::new();
        for i in 0..1000 {
            table.put(
                format!("key_{:06}", i).into_bytes(),
                format!("value_{:06}", i).into_bytes(),
            );
        }
        b.iter(|| {
            black_box(table.lookup(b"nonexistent_key"));
        });
    });

    group.finish();
}

fn bench_wal_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal");

    group.bench_function("append_100_unsynced", |b| {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = WriteAheadLog::open(dir.path().join("bench.wal")).unwrap();
        b.iter(|| {
            for i in 0..100 {
                let key = format!("key_{:06}", i).into_bytes();
                let value = format!("value_{:06}", i).into_bytes();
                wal.append_put(black_box(&key), black_box(&value), false).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_backup_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("backup");
    group.sample_size(10);

    for size in [100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("create_and_restore", size),
            size,
            |b, &size| {
                b.iter(|| {
                    let dir = tempfile::tempdir().unwrap();
                    let opts = creating_options();
                    let mut db = Coffer::open(&opts, dir.path().join("db")).unwrap();
                    for i in 0..size {
                        let key = format!("key_{:06}", i).into_bytes();
                        let value = format!("value_{:06}", i).into_bytes();
                        db.put(key, value).unwrap();
                    }

                    let mut backups =
                        BackupEngine::open(&opts, dir.path().join("store")).unwrap();
                    backups.create_new_backup(&mut db).unwrap();

                    let target = dir.path().join("restored");
                    let restore_opts = RestoreOptions::new();
                    backups
                        .restore_from_latest_backup(&target, &target, &restore_opts)
                        .unwrap();
                    black_box(target);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_memtable_operations,
    bench_wal_operations,
    bench_backup_cycle
);
criterion_main!(benches);
