//! Batched easing throughput
//!
//! Compares a raw serial `evaluate` pass against full scheduler ticks with
//! the parallel split disabled and enabled.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reel_tween::{evaluate, Ease, EaseCurve, Lane, LaneTimes, Scheduler, SchedulerConfig, TweenAction};

const SIZES: [usize; 3] = [256, 4_096, 32_768];

fn lanes(count: usize) -> (Vec<Lane>, Vec<LaneTimes>) {
    let curves = [
        EaseCurve::Simple(Ease::Linear),
        EaseCurve::Simple(Ease::Smooth),
        EaseCurve::Simple(Ease::InOutElastic),
        EaseCurve::BezierCubic {
            pos1: 0.25,
            pos2: 0.75,
        },
    ];

    let lanes = (0..count)
        .map(|i| Lane {
            from: 0.0,
            to: i as f32,
            curve: curves[i % curves.len()],
            slot: (i / 4) as u32,
        })
        .collect();

    let times = (0..count.div_ceil(4))
        .map(|i| LaneTimes {
            current: (i % 100) as f32 * 0.01,
            duration: 1.0,
        })
        .collect();

    (lanes, times)
}

fn scheduler(actions: usize, parallel_threshold: usize) -> Scheduler {
    let config = SchedulerConfig {
        parallel_threshold,
        ..Default::default()
    };

    let mut scheduler = match Scheduler::with_config(config) {
        Ok(scheduler) => scheduler,
        Err(err) => panic!("bench config rejected: {err}"),
    };

    // one long timeline per 64 actions, four channels each
    for chunk in 0..actions.div_ceil(64) {
        let id = scheduler.create(false);
        let timeline = scheduler.timeline_mut(id).unwrap();
        for i in 0..64.min(actions - chunk * 64) {
            let action = TweenAction::vec4(|| [0.0; 4], |_| {}, [1.0, 2.0, 3.0, 4.0], 100_000.0)
                .set_ease(if i % 2 == 0 { Ease::InOutQuad } else { Ease::Smooth });
            timeline.add(action).unwrap();
        }
        scheduler.play(id).unwrap();
    }

    scheduler
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for size in SIZES {
        let (lanes, times) = lanes(size);
        let mut out = vec![0.0; size];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                evaluate(black_box(&lanes), black_box(&times), &mut out);
                black_box(&out);
            })
        });
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for size in SIZES {
        let actions = size / 4;

        let mut serial = scheduler(actions, usize::MAX);
        group.bench_with_input(BenchmarkId::new("serial", size), &size, |b, _| {
            b.iter(|| serial.tick(black_box(0.001)))
        });

        let mut parallel = scheduler(actions, 1_024);
        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |b, _| {
            b.iter(|| parallel.tick(black_box(0.001)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_tick);
criterion_main!(benches);
