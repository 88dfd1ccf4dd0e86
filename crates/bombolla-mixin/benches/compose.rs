use bombolla_mixin::{MixinDescriptor, MixinEngine};
use bombolla_object::TypeId;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

/// A chain of `depth` mixins, each requiring the previous one
fn chain(depth: usize) -> Vec<Arc<MixinDescriptor>> {
    let mut descriptors: Vec<Arc<MixinDescriptor>> = Vec::with_capacity(depth);
    for i in 0..depth {
        let mut builder = MixinDescriptor::builder(&format!("M{}", i)).instance_size(4);
        if let Some(previous) = descriptors.last() {
            builder = builder.requires_mixin(previous);
        }
        descriptors.push(builder.build());
    }
    descriptors
}

fn bench_compose_cached(c: &mut Criterion) {
    let engine = MixinEngine::new().unwrap();
    let descriptors = chain(16);
    let top = engine.register(descriptors.last().unwrap()).unwrap();
    engine.compose(TypeId::OBJECT, top, None).unwrap();

    c.bench_function("compose_cached_depth_16", |b| {
        b.iter(|| engine.compose(black_box(TypeId::OBJECT), black_box(top), None).unwrap());
    });
}

fn bench_compose_fresh(c: &mut Criterion) {
    let descriptors = chain(16);

    c.bench_function("compose_fresh_depth_16", |b| {
        b.iter(|| {
            let engine = MixinEngine::new().unwrap();
            let top = engine.register(descriptors.last().unwrap()).unwrap();
            engine.compose(TypeId::OBJECT, top, None).unwrap()
        });
    });
}

fn bench_introspection(c: &mut Criterion) {
    let engine = MixinEngine::new().unwrap();
    let descriptors = chain(16);
    let top = engine.register(descriptors.last().unwrap()).unwrap();
    let bottom = engine.register(&descriptors[0]).unwrap();
    let composite = engine.compose(TypeId::OBJECT, top, None).unwrap();
    let obj = engine.create(composite.type_id).unwrap();
    let class = obj.class().clone();

    let mut group = c.benchmark_group("introspection");
    group.bench_function("instance_data", |b| {
        b.iter(|| engine.get_mixin_data(black_box(&obj), black_box(bottom)).unwrap().len());
    });
    group.bench_function("class_data", |b| {
        b.iter(|| {
            engine
                .get_mixin_class_data(black_box(&class), black_box(bottom))
                .unwrap()
                .len()
        });
    });
    group.bench_function("create", |b| {
        b.iter(|| engine.create(black_box(composite.type_id)).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_compose_cached,
    bench_compose_fresh,
    bench_introspection
);
criterion_main!(benches);
