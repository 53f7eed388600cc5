use criterion::{Criterion, criterion_group, criterion_main};
use lattice_world::{ChunkOrigin, World, WorldConfig};

/// A 64^3 grid with one observer and a plane of 4096 scattered entities.
fn populated_world() -> World {
    let mut world = World::new(WorldConfig::uniform(64, 16.0, ChunkOrigin::Middle));
    world.track(0).unwrap();
    world.owner_set(0, 1).unwrap();
    let center = world.grid().chunk_at(0.0, 0.0, 0.0);
    world.chunk_set(0, center).unwrap();
    world.radius_set(0, 4).unwrap();

    for id in 1..4096_i64 {
        world.track(id).unwrap();
        let x = (id % 64) as f64 * 16.0 - 512.0;
        let z = (id / 64) as f64 * 16.0 - 512.0;
        let chunk = world.grid().chunk_at(x, 0.0, z);
        world.chunk_set(id, chunk).unwrap();
    }
    world
}

fn query_benchmark(c: &mut Criterion) {
    let world = populated_world();
    c.bench_function("query_radius_4_4096_entities", |b| {
        b.iter(|| world.query(1, 16_384).unwrap().visible.len());
    });
}

fn write_benchmark(c: &mut Criterion) {
    let mut world = populated_world();
    let mut buf = vec![0_u8; 1 << 20];
    c.bench_function("write_full_view", |b| {
        b.iter(|| world.write(1, &mut buf, None).unwrap().written);
    });
}

criterion_group!(benches, query_benchmark, write_benchmark);
criterion_main!(benches);
