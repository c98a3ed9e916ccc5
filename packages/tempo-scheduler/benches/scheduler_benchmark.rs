use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempo_scheduler::{LocalScheduler, Scheduler};

fn benchmark_microtasks(c: &mut Criterion) {
    c.bench_function("schedule_microtask 1000", |b| {
        b.iter(|| {
            let scheduler: LocalScheduler<()> = LocalScheduler::new();
            for _ in 0..1000 {
                scheduler.schedule_microtask(Box::new(|_| {
                    black_box(1 + 1);
                }));
            }
            scheduler.run(&()).unwrap();
        })
    });
}

fn benchmark_timers(c: &mut Criterion) {
    c.bench_function("schedule_timer 1000", |b| {
        b.iter(|| {
            let scheduler: LocalScheduler<()> = LocalScheduler::new();
            for i in 0..1000u64 {
                scheduler
                    .schedule_timer(i % 17, Box::new(|_| {
                        black_box(1 + 1);
                    }))
                    .unwrap();
            }
            scheduler.run(&()).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_microtasks, benchmark_timers);
criterion_main!(benches);
