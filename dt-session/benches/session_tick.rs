use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dt_core::{Key, StimulusSequence, TestVariant, UserId};
use dt_session::{
    InputEvent, InputUnifier, MemorySink, RecordingPresenter, ResponseContext, SessionConfig,
    SessionController, classify,
};
use dt_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

type Controller = SessionController<ManualTimer, StdRng, MemorySink, RecordingPresenter>;

fn running(variant: TestVariant) -> (Controller, ManualTimer) {
    let sequence = StimulusSequence::determination();
    let config = SessionConfig::for_variant(variant, sequence.len(), false)
        .with_user(Some(UserId(1)));
    let timer = ManualTimer::new();
    let mut c = SessionController::new(
        config,
        sequence,
        timer.clone(),
        StdRng::seed_from_u64(3),
        MemorySink::new(),
        RecordingPresenter::new(),
        InputUnifier::keyboard_only(),
    )
    .unwrap();
    c.tick().unwrap();
    c.push_event(InputEvent::Key(Key::Other(' ')));
    c.tick().unwrap();
    (c, timer)
}

pub fn bench_idle_tick(c: &mut Criterion) {
    let mut g = c.benchmark_group("session_tick");
    g.sample_size(60);

    g.bench_function("idle_frame", |b| {
        let (mut controller, timer) = running(TestVariant::FormB);
        b.iter(|| {
            timer.advance(Duration::from_micros(500));
            black_box(controller.tick().unwrap());
        });
    });

    g.bench_function("response_frame", |b| {
        b.iter_batched(
            || running(TestVariant::FormA),
            |(mut controller, _timer)| {
                controller.push_event(InputEvent::Key(Key::Red));
                black_box(controller.tick().unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    g.finish();
}

pub fn bench_classify(c: &mut Criterion) {
    let ctx = ResponseContext {
        expected_current: Key::Red,
        expected_previous: Key::Left,
        answered: false,
    };
    c.bench_function("classify", |b| {
        b.iter(|| {
            for key in Key::PANEL {
                black_box(classify(black_box(key), &ctx));
            }
        })
    });
}

criterion_group!(benches, bench_idle_tick, bench_classify);
criterion_main!(benches);
