//! Point-source panner benchmarks

use admrender::panner::point_source::PointSourcePannerGainCalc;
use admrender::tables::matching_layout;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_panner_construct(c: &mut Criterion) {
    let layout = matching_layout("0+5+0").expect("0+5+0 layout present");

    c.bench_function("panner_construct_0+5+0", |b| {
        b.iter(|| {
            let panner = PointSourcePannerGainCalc::new(black_box(&layout));
            black_box(panner);
        })
    });
}

fn bench_panner_calculate_gains(c: &mut Criterion) {
    let layout = matching_layout("0+5+0").expect("0+5+0 layout present");
    let panner = PointSourcePannerGainCalc::new(&layout);

    let directions: Vec<[f64; 3]> = (0..360)
        .map(|deg| {
            let az = (deg as f64).to_radians();
            [az.sin(), az.cos(), 0.0]
        })
        .collect();

    c.bench_function("panner_calculate_gains_360", |b| {
        b.iter(|| {
            for dir in &directions {
                black_box(panner.calculate_gains(black_box(*dir)));
            }
        })
    });
}

fn bench_panner_stereo(c: &mut Criterion) {
    let layout = matching_layout("0+2+0").expect("0+2+0 layout present");
    let panner = PointSourcePannerGainCalc::new(&layout);

    c.bench_function("panner_calculate_gains_stereo_1024", |b| {
        b.iter(|| {
            for i in 0..1024 {
                let az = (i as f64 * 0.01) % std::f64::consts::TAU;
                black_box(panner.calculate_gains(black_box([az.sin(), az.cos(), 0.0])));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_panner_construct,
    bench_panner_calculate_gains,
    bench_panner_stereo
);
criterion_main!(benches);
