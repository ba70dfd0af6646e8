//! Lifting order computation for realistic group sizes
//!
//! The order is recomputed after every decision and weight change, so it
//! has to stay well below one clock tick even for large sessions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use wl_core::lifting_order::LiftingOrderCalculator;
use wl_core::models::{draw_lots, Athlete, AttemptRef};

fn group(size: u32) -> Vec<Athlete> {
    let mut athletes: Vec<Athlete> = (1..=size)
        .map(|id| {
            let snatch = 60 + (id * 7) % 40;
            Athlete::new(id, &format!("Athlete {id}"), "M89", "SR", 0).with_entries(snatch, snatch + 25)
        })
        .collect();
    draw_lots(&mut athletes, 42);
    athletes
}

/// Half the group has taken its first snatch.
fn mid_session(size: u32) -> Vec<Athlete> {
    let mut athletes = group(size);
    let first = AttemptRef::all()[0];
    for (seq, athlete) in athletes.iter_mut().enumerate().step_by(2) {
        let _ = athlete.record_result(first, seq % 3 != 0, seq as u64);
    }
    athletes
}

fn bench_compute(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("lifting_order");
    for size in [8u32, 16, 32, 64] {
        let fresh = group(size);
        bench_group.bench_with_input(BenchmarkId::new("fresh", size), &fresh, |b, athletes| {
            b.iter(|| LiftingOrderCalculator::compute(black_box(athletes)))
        });

        let running = mid_session(size);
        bench_group.bench_with_input(BenchmarkId::new("mid_session", size), &running, |b, athletes| {
            b.iter(|| LiftingOrderCalculator::compute(black_box(athletes)))
        });
    }
    bench_group.finish();
}

criterion_group!(benches, bench_compute);
criterion_main!(benches);
