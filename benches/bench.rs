//! Benchmarks the coalescence stacking loop, the hot path of a scan run.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;

use seiscoal::geo::{GridSpec, Projection, SortOrder};
use seiscoal::lut::{BuildMode, TravelTimeBuilder, VelocityModel};
use seiscoal::scan::CoalescenceScanner;
use seiscoal::station::{Station, StationSet};

fn build_lut(n_stations: usize, cells_per_axis: i64) -> seiscoal::lut::Lut {
    let stations = StationSet::new(
        (0..n_stations)
            .map(|i| Station::new(format!("AA{i:02}"), 0.01 * i as f64, 0.0, 0.0))
            .collect(),
    );
    let velocity = VelocityModel::new(
        vec![
            seiscoal::lut::Layer { depth_m: 0.0, vp_m_s: 5000.0, vs_m_s: 2900.0 },
            seiscoal::lut::Layer { depth_m: 5000.0, vp_m_s: 6000.0, vs_m_s: 3400.0 },
        ],
        false,
    )
    .unwrap();
    let grid = GridSpec {
        cell_count: (cells_per_axis, cells_per_axis, cells_per_axis),
        cell_size: (200.0, 200.0, 200.0),
        azimuth: 0.0,
        dip: 0.0,
        sort_order: SortOrder::RowMajor,
        elevation: 0.0,
        projection: Projection::Wgs84,
        longitude: 0.0,
        latitude: 0.0,
    }
    .try_build()
    .unwrap();
    TravelTimeBuilder::new(grid, stations, velocity, BuildMode::Homogeneous)
        .build()
        .unwrap()
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("coalescence_scan");
    for &n_stations in &[4usize, 12usize] {
        let lut = build_lut(n_stations, 10);
        let n_samples = 5_000;
        let p_onsets = Array2::<f64>::from_elem((n_stations, n_samples), 1.0);
        let s_onsets = Array2::<f64>::from_elem((n_stations, n_samples), 1.0);
        let availability = vec![1u8; n_stations];
        let scanner = CoalescenceScanner::new(&lut, 100.0, false);

        group.bench_with_input(BenchmarkId::from_parameter(n_stations), &n_stations, |b, _| {
            b.iter(|| scanner.scan(&p_onsets, &s_onsets, &availability).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
