use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::rc::Rc;

use bindless_engine::{
    DecodedImage, HandleAcquisitionService, HandleTable, NullBackend, ShaderVisibleBuffer,
};

fn acquire_textures(
    service: &HandleAcquisitionService<NullBackend>,
    count: usize,
) -> Vec<bindless_engine::ResidentTexture<NullBackend>> {
    (0..count)
        .map(|i| {
            service
                .acquire(DecodedImage::solid_rgba(format!("bench_{i}"), 4, 4, [i as u8, 0, 0, 255]))
                .expect("NullBackend acquisition cannot fail")
        })
        .collect()
}

fn bench_build_table(c: &mut Criterion) {
    let backend = Rc::new(NullBackend::new());
    let service = HandleAcquisitionService::new(backend.clone());
    let textures = acquire_textures(&service, 1024);

    c.bench_function("handle_table/build_1024", |b| {
        b.iter(|| {
            let table = HandleTable::from_textures(&textures);
            let buffer = ShaderVisibleBuffer::build(backend.clone(), &table)
                .expect("NullBackend buffer creation cannot fail");
            black_box(buffer.byte_len());
            drop(buffer);
            backend.clear_calls();
        })
    });
}

fn bench_acquire(c: &mut Criterion) {
    let backend = Rc::new(NullBackend::new());
    let service = HandleAcquisitionService::new(backend.clone());

    c.bench_function("handle_acquisition/acquire_64", |b| {
        b.iter(|| {
            let textures = acquire_textures(&service, 64);
            black_box(textures.len());
            drop(textures);
            backend.clear_calls();
        })
    });
}

fn bench_publish(c: &mut Criterion) {
    let backend = Rc::new(NullBackend::new());
    let service = HandleAcquisitionService::new(backend.clone());
    let textures = acquire_textures(&service, 5);
    let table = HandleTable::from_textures(&textures);
    let buffer =
        ShaderVisibleBuffer::build(backend.clone(), &table).expect("NullBackend buffer creation cannot fail");

    let mut frames = 0u64;
    c.bench_function("handle_table/publish_for_draw", |b| {
        b.iter(|| {
            buffer.publish_for_draw(black_box(2));
            frames += 1;
            // The call log grows every frame; keep it bounded.
            if frames % 4096 == 0 {
                backend.clear_calls();
            }
        })
    });
}

criterion_group!(benches, bench_build_table, bench_acquire, bench_publish);
criterion_main!(benches);
