use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fracture_net::core::config::{GenerationConfig, StopCondition};
use fracture_net::core::types::{FamilyId, Vec3};
use fracture_net::generation::generate;
use fracture_net::geometry::polygon::{place, rectangle_vertices};
use fracture_net::geometry::{check_close_edge, intersect, Segment, Shape, ShapeKind, ShrinkLimits};

fn rect(half: f64, normal: Vec3, center: Vec3) -> Shape {
    let verts = place(&rectangle_vertices(half, half), 0.3, normal, center);
    Shape::new(FamilyId(0), ShapeKind::Rectangle, verts, normal, center, half, half, 0.3, 1e-5)
}

fn bench_intersect_crossing(c: &mut Criterion) {
    let a = rect(1.0, Vec3::Z, Vec3::ZERO);
    let b = rect(1.0, Vec3::new(1.0, 0.2, 0.1).normalize(), Vec3::new(0.1, 0.0, 0.0));
    c.bench_function("intersect_crossing", |bench| {
        bench.iter(|| intersect(black_box(&a), black_box(&b), 1e-8))
    });
}

fn bench_intersect_separated(c: &mut Criterion) {
    let a = rect(1.0, Vec3::Z, Vec3::ZERO);
    let b = rect(1.0, Vec3::X, Vec3::new(10.0, 0.0, 0.0));
    c.bench_function("intersect_separated", |bench| {
        bench.iter(|| intersect(black_box(&a), black_box(&b), 1e-8))
    });
}

fn bench_check_close_edge(c: &mut Criterion) {
    let a = rect(1.0, Vec3::Z, Vec3::ZERO);
    let segment = Segment::new(Vec3::new(-0.95, 0.0, 0.0), Vec3::new(0.5, 0.3, 0.0));
    let limits = ShrinkLimits {
        shrink_limit: 0.1,
        min_dist: 0.1,
        first_node_min_dist: 0.04,
        eps: 1e-8,
    };
    c.bench_function("check_close_edge", |bench| {
        bench.iter(|| check_close_edge(black_box(&a.vertices), black_box(segment), &limits))
    });
}

fn bench_generate_small_network(c: &mut Criterion) {
    let mut config = GenerationConfig::default();
    config.stop_condition = StopCondition::Count { target: 100 };
    let mut group = c.benchmark_group("generate");
    group.sample_size(10);
    group.bench_function("count_100", |bench| bench.iter(|| generate(black_box(config.clone()))));
    group.finish();
}

criterion_group!(
    benches,
    bench_intersect_crossing,
    bench_intersect_separated,
    bench_check_close_edge,
    bench_generate_small_network,
);
criterion_main!(benches);
