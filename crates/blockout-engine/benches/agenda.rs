use std::hint::black_box;

use blockout_engine::{expand_all, segment, Blockout, Interval, Recurrence, VisibleWindow};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

/// `count` blockouts cycling through one-off, daily, weekly and monthly.
fn blockouts(count: usize) -> Vec<Blockout> {
    (0..count)
        .map(|i| {
            let start = at(2020, 1, 1, 8) + Duration::hours(i as i64 * 7);
            let range = Interval::new(start, start + Duration::hours(3)).unwrap();
            let blockout = Blockout::new(i.to_string(), range);
            match i % 4 {
                0 => blockout,
                1 => blockout.recurring(Recurrence::daily()).unwrap(),
                2 => blockout.recurring(Recurrence::weekly()).unwrap(),
                _ => blockout.recurring(Recurrence::monthly()).unwrap(),
            }
        })
        .collect()
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");
    let window = VisibleWindow::month(2024, 3).unwrap();

    for count in [10, 100, 1000] {
        let set = blockouts(count);
        group.bench_with_input(BenchmarkId::new("month", count), &set, |b, set| {
            b.iter(|| expand_all(black_box(set), black_box(&window)));
        });
    }

    group.finish();
}

fn bench_agenda(c: &mut Criterion) {
    let mut group = c.benchmark_group("agenda");
    let window = VisibleWindow::month(2024, 3).unwrap();
    let set = blockouts(100);

    group.bench_function("expand_and_segment_month", |b| {
        b.iter(|| {
            let occurrences = expand_all(black_box(&set), &window);
            black_box(segment(&occurrences, &window))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_expand, bench_agenda);
criterion_main!(benches);
