//! Measure generating a full single-source cost map
//!
//! World is 128 by 128 path cells of open ground, source at the centre
//!

use bevy_threatfield_paths_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Create the engine and threat field before benchmarking
fn prepare(length: usize, depth: usize) -> (PathFinder, ThreatField) {
	let grid = MapGrid::new(length, depth, 8.0);
	let area = AreaData::open(
		grid.path_len(),
		vec![MobileType::new(MobileTypeId::new(0), 0.5)],
	);
	let threat = ThreatField::new(grid.path_len());
	(PathFinder::new(grid, area), threat)
}

/// Build and solve one centre-sourced cost-map query
fn calc(finder: &mut PathFinder, threat: &ThreatField) {
	let grid = finder.get_grid();
	let profile = AgentProfile::surface(MobileTypeId::new(0));
	let start = grid.path_index_to_pos(grid.path_xy_to_index(64, 64));
	let query = finder.create_cost_map_query(threat, &profile, f32::MAX, start);
	finder.run_blocking(&query);
	assert!(query.get_cost_map().is_some());
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(100);
	let (mut finder, threat) = prepare(128, 128);
	group.bench_function("cost_map", |b| {
		b.iter(|| calc(black_box(&mut finder), black_box(&threat)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
