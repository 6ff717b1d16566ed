//! Hit Testing Benchmarks
//!
//! Pointer resolution runs on every pointer move, so it has to stay well
//! under a frame even on dense drawings.
//!
//! Run with: `cargo bench --bench hit_testing`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use drawing_annotator::annotations::{Annotation, AnnotationSource, AnnotationType};
use drawing_annotator::geometry::{BBox, Point, Rotation, Size, ViewTransform};
use drawing_annotator::hit_test::{resolve, HitQuery, InteractionMode};

/// Grid of `count` boxes over an A1-sized scan.
fn grid(count: usize, cell: f64) -> Vec<BBox> {
    let columns = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let x = (i % columns) as f64 * cell;
            let y = (i / columns) as f64 * cell;
            BBox::new(x + 2.0, y + 2.0, x + cell - 2.0, y + cell / 2.0)
        })
        .collect()
}

fn view(rotation: Rotation) -> ViewTransform {
    let mut view = ViewTransform::new(Size::new(7016.0, 4961.0), Size::new(1600.0, 1000.0));
    view.rotation = rotation;
    view.zoom = 2.0;
    view
}

fn bench_annotate_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_annotate");

    for count in [10, 100, 1000] {
        let annotations: Vec<Annotation> = grid(count, 120.0)
            .into_iter()
            .map(|bbox| Annotation::new(AnnotationType::Text, bbox, AnnotationSource::Manual))
            .collect();
        let selected = annotations.last().map(|a| a.id);
        let view = view(Rotation::Deg0);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                resolve(black_box(&HitQuery {
                    point: Point::new(3000.0, 2500.0),
                    mode: InteractionMode::Annotate,
                    annotations: &annotations,
                    selected,
                    text_boxes: &[],
                    table_boxes: &[],
                    view: &view,
                    handle_px: 10.0,
                }))
            })
        });
    }

    group.finish();
}

fn bench_inspect_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_inspect");

    for count in [100, 2000] {
        let text_boxes = grid(count, 60.0);
        let table_boxes = grid(count / 20, 600.0);
        let view = view(Rotation::Deg90);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                resolve(black_box(&HitQuery {
                    point: Point::new(1210.0, 845.0),
                    mode: InteractionMode::Inspect,
                    annotations: &[],
                    selected: None,
                    text_boxes: &text_boxes,
                    table_boxes: &table_boxes,
                    view: &view,
                    handle_px: 10.0,
                }))
            })
        });
    }

    group.finish();
}

fn bench_screen_to_image(c: &mut Criterion) {
    let view = view(Rotation::Deg270);
    c.bench_function("screen_to_image", |b| {
        b.iter(|| view.to_image(black_box(Point::new(812.5, 431.0))))
    });
}

criterion_group!(
    benches,
    bench_annotate_mode,
    bench_inspect_mode,
    bench_screen_to_image
);
criterion_main!(benches);
