use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dt_core::StimulusKind;
use dt_render::{Scene, SkiaRenderer};
use dt_timing::HighPrecisionTimer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn harness() -> (SkiaRenderer, Vec<u8>, HighPrecisionTimer) {
    let mut r = SkiaRenderer::new(WIDTH, HEIGHT, None).unwrap();
    let mut fb = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
    let mut t = HighPrecisionTimer::new();
    // settle the first full-frame copy
    r.render_frame(&mut fb, &mut t);
    (r, fb, t)
}

fn stimulus(label: &str, placement: (f32, f32)) -> Scene {
    let kind: StimulusKind = label.parse().unwrap();
    Scene::Stimulus { kind, placement }
}

pub fn bench_scene_changes(c: &mut Criterion) {
    let mut g = c.benchmark_group("render_frame");
    g.sample_size(40);

    g.bench_function("circle_onset", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb, mut t)| {
                r.set_scene(stimulus("green", (0.3, 0.7)));
                black_box(r.render_frame(&mut fb, &mut t).map(|s| s.total));
            },
            BatchSize::SmallInput,
        )
    });

    g.bench_function("circle_to_pedal", |b| {
        let (mut r, mut fb, mut t) = harness();
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let scene = if flip {
                stimulus("red", (0.5, 0.5))
            } else {
                stimulus("right_pedal", (0.0, 0.0))
            };
            r.set_scene(scene);
            black_box(r.render_frame(&mut fb, &mut t).map(|s| s.dirty_count));
        });
    });

    g.bench_function("idle", |b| {
        let (mut r, mut fb, mut t) = harness();
        b.iter(|| black_box(r.render_frame(&mut fb, &mut t).is_none()));
    });

    g.finish();
}

criterion_group!(benches, bench_scene_changes);
criterion_main!(benches);
