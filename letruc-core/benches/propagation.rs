//! Signal propagation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use letruc_core::reactive::{batch, Effect, Memo, State};

fn chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_chain");
    for depth in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let source = State::new(0_i64);
            let mut last = Memo::new({
                let source = source.clone();
                move || source.get()
            });
            for _ in 1..depth {
                let prev = last.clone();
                last = Memo::try_new(move || Ok(prev.get()? + 1));
            }
            let mut n = 0;
            b.iter(|| {
                n += 1;
                source.set(n);
                black_box(last.get())
            });
        });
    }
    group.finish();
}

fn fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_fan_out");
    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let source = State::new(0_i64);
            let effects: Vec<Effect> = (0..width)
                .map(|_| {
                    let source = source.clone();
                    Effect::new(move || {
                        black_box(source.get());
                    })
                })
                .collect();
            let mut n = 0;
            b.iter(|| {
                n += 1;
                source.set(n);
            });
            for effect in effects {
                effect.dispose();
            }
        });
    }
    group.finish();
}

fn batched_writes(c: &mut Criterion) {
    let states: Vec<State<i64>> = (0..100).map(State::new).collect();
    let sum = Memo::new({
        let states = states.clone();
        move || states.iter().map(State::get).sum::<i64>()
    });
    let _effect = Effect::new({
        let sum = sum.clone();
        move || {
            black_box(sum.get()).ok();
        }
    });
    let mut n = 0;
    c.bench_function("batch_100_writes", |b| {
        b.iter(|| {
            n += 1;
            batch(|| {
                for state in &states {
                    state.set(n);
                }
            });
        })
    });
}

criterion_group!(benches, chain, fan_out, batched_writes);
criterion_main!(benches);
