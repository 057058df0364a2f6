use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynbridge_engine::handles::HandleTable;
use dynbridge_engine::{build_method_view, DynamicMethod, MethodSignature, TypeDesc};
use std::sync::Arc;

fn bench_register_release(c: &mut Criterion) {
    let table = HandleTable::new();
    let object = Arc::new(42u64);

    c.bench_function("register_release", |b| {
        b.iter(|| {
            let handle = table.register(black_box(object.clone()));
            table.release(handle).unwrap();
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for live in [16usize, 1024, 65536] {
        let table = HandleTable::new();
        let handles: Vec<_> = (0..live).map(|i| table.register(Arc::new(i))).collect();
        let probe = handles[live / 2];

        group.bench_with_input(BenchmarkId::new("resolve_as", live), &probe, |b, probe| {
            b.iter(|| table.resolve_as::<usize>(black_box(*probe)).unwrap());
        });
    }

    group.finish();
}

fn bench_view_walk(c: &mut Criterion) {
    let mut method = DynamicMethod::new(
        "Walk",
        TypeDesc::object("Bench"),
        MethodSignature::new(TypeDesc::i32(), vec![TypeDesc::i32(), TypeDesc::i64()]),
    )
    .unwrap();
    method.emit(&[0x02, 0x03, 0x58, 0x2A]);
    method.declare_local(TypeDesc::i32());
    let method = method.finalize().unwrap();

    c.bench_function("method_signature_header", |b| {
        b.iter(|| {
            let view = build_method_view(black_box(&method));
            let signature = view.signature().unwrap();
            let header = view.header().unwrap();
            black_box((signature.param_type(1).unwrap(), header.code().unwrap().len()))
        });
    });
}

criterion_group!(benches, bench_register_release, bench_resolve, bench_view_walk);
criterion_main!(benches);
