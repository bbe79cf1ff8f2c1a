//! Post-search smoothing that drops the leading run of waypoints the agent
//! can already walk straight towards
//!
//! A grid-optimal route zig-zags. Rather than emit every cell, the refiner
//! finds the furthest cell of the route reachable from the start along a
//! straight line across safe, comparably-priced terrain, and starts the
//! waypoint list there. Safety is conservative: any threat above a small
//! epsilon on the line, or any cell priced noticeably above the start cell,
//! rejects the shortcut
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Threat above this rejects a cell from a straight-line shortcut
pub const THREAT_EPSILON: f32 = 1e-2;
/// Terrain-cost slack over the start cell allowed along a shortcut
pub const MOVE_EPSILON: f32 = 1e-1;

/// Whether every cell on the straight line between two path cells, excluding
/// the first, is near-zero threat and priced within [MOVE_EPSILON] of
/// `move_cost_limit`. All-octant Bresenham over move-grid coordinates, cells
/// of the border reject the line
fn is_straight_line(
	grid: &MapGrid,
	model: &CostModel,
	from: usize,
	to: usize,
	move_cost_limit: f32,
) -> bool {
	let (x0, y0) = grid.path_index_to_move_xy(from);
	let (x1, y1) = grid.path_index_to_move_xy(to);
	let (x0, y0) = (x0 as i64, y0 as i64);
	let (x1, y1) = (x1 as i64, y1 as i64);

	let dx = (x1 - x0).abs();
	let sx = if x0 < x1 { 1 } else { -1 };
	let dy = -(y1 - y0).abs();
	let sy = if y0 < y1 { 1 } else { -1 };
	let mut err = dx + dy;
	let (mut x, mut y) = (x0, y0);
	loop {
		let e2 = 2 * err;
		if e2 >= dy {
			if x == x1 {
				break;
			}
			err += dy;
			x += sx;
		}
		if e2 <= dx {
			if y == y1 {
				break;
			}
			err += dx;
			y += sy;
		}
		let move_index = grid.move_xy_to_index(x as usize, y as usize);
		let Some(index) = grid.move_index_to_path_index(move_index) else {
			return false;
		};
		if model.threat_at(index) > THREAT_EPSILON || model.move_cost(index) > move_cost_limit {
			return false;
		}
	}
	true
}

/// Index into `path` of the furthest cell the agent can head straight
/// towards, found by binary search over the route. Returns `0` (no shortcut)
/// when the start cell itself is threatened
pub fn refine_start_index(grid: &MapGrid, model: &CostModel, path: &[usize]) -> usize {
	if model.threat_at(path[0]) > THREAT_EPSILON {
		return 0;
	}
	let move_cost_limit = model.move_cost(path[0]) + MOVE_EPSILON;

	// start and end are always present in a route
	let mut l: i64 = 1;
	let mut r: i64 = path.len() as i64 - 1;
	while l <= r {
		let m = (l + r) / 2;
		if is_straight_line(grid, model, path[0], path[m as usize], move_cost_limit) {
			l = m + 1;
		} else {
			r = m - 1;
		}
	}
	(l - 1) as usize
}

/// Turn a solved cell route into the [PathInfo] handed back to the caller.
/// Single-cell routes mean the agent already stands within the acceptance
/// region and get one waypoint with `is_last` set
pub fn fill_path_info(
	grid: &MapGrid,
	model: &CostModel,
	path: Vec<usize>,
	path_cost: f32,
	start_pos: Vec3,
) -> PathInfo {
	let is_last = path.len() == 1;
	let mut start = 0;
	let mut pos_path = Vec::new();
	if is_last {
		pos_path.push(grid.path_index_to_pos(path[0]));
	} else {
		start = refine_start_index(grid, model, &path);
		pos_path.reserve(path.len() - start);
		for &index in &path[start..] {
			pos_path.push(grid.path_index_to_pos(index));
		}
	}
	PathInfo {
		path,
		pos_path,
		path_cost,
		start,
		start_pos,
		is_last,
	}
}

#[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	/// Flat open world plus a mutable threat field over it
	fn fixture(width: usize, depth: usize) -> (MapGrid, Arc<AreaData>, ThreatField) {
		let grid = MapGrid::new(width, depth, 8.0);
		let area = Arc::new(AreaData::open(
			grid.path_len(),
			vec![MobileType::new(MobileTypeId::new(0), 0.5)],
		));
		let threat = ThreatField::new(grid.path_len());
		(grid, area, threat)
	}
	fn model(area: &Arc<AreaData>, threat: &ThreatField) -> CostModel {
		CostModel::new(
			Arc::clone(area),
			threat,
			&AgentProfile::surface(MobileTypeId::new(0)),
		)
	}
	/// Reference check: walk every cell between the refined start and the
	/// route head and confirm each is safe
	fn line_is_safe(grid: &MapGrid, model: &CostModel, from: usize, to: usize) -> bool {
		let limit = model.move_cost(from) + MOVE_EPSILON;
		is_straight_line(grid, model, from, to, limit)
	}

	#[test]
	fn straight_route_refines_to_its_end() {
		let (grid, area, threat) = fixture(6, 1);
		let model = model(&area, &threat);
		let path: Vec<usize> = (0..6).map(|x| grid.path_xy_to_index(x, 0)).collect();
		assert_eq!(5, refine_start_index(&grid, &model, &path));
	}
	#[test]
	fn threatened_start_refuses_to_refine() {
		let (grid, area, mut threat) = fixture(6, 1);
		threat.set_threat(ThreatLayer::Surface, grid.path_xy_to_index(0, 0), 1.0);
		let model = model(&area, &threat);
		let path: Vec<usize> = (0..6).map(|x| grid.path_xy_to_index(x, 0)).collect();
		assert_eq!(0, refine_start_index(&grid, &model, &path));
	}
	#[test]
	fn threat_on_the_line_stops_the_shortcut() {
		let (grid, area, mut threat) = fixture(6, 1);
		threat.set_threat(ThreatLayer::Surface, grid.path_xy_to_index(3, 0), 1.0);
		let model = model(&area, &threat);
		let path: Vec<usize> = (0..6).map(|x| grid.path_xy_to_index(x, 0)).collect();
		let start = refine_start_index(&grid, &model, &path);
		assert_eq!(2, start);
		assert!(line_is_safe(&grid, &model, path[0], path[start]));
	}
	#[test]
	fn refined_prefix_is_always_safe() {
		// an L-shaped route around a threatened block
		let (grid, area, mut threat) = fixture(5, 5);
		threat.set_threat(ThreatLayer::Surface, grid.path_xy_to_index(2, 2), 5.0);
		let model = model(&area, &threat);
		let mut path: Vec<usize> = (0..5).map(|z| grid.path_xy_to_index(0, z)).collect();
		path.extend((1..5).map(|x| grid.path_xy_to_index(x, 4)));
		let start = refine_start_index(&grid, &model, &path);
		assert!(line_is_safe(&grid, &model, path[0], path[start]));
	}
	#[test]
	fn expensive_terrain_on_the_line_stops_the_shortcut() {
		let (grid, mut area_data, threat) = fixture(6, 1);
		// steep cell in the middle of the row
		Arc::get_mut(&mut area_data).unwrap().set_sector(
			grid.path_xy_to_index(3, 0),
			TerrainSector { max_slope: 0.4, is_water: false, max_elevation: 0.0 },
		);
		let model = model(&area_data, &threat);
		let path: Vec<usize> = (0..6).map(|x| grid.path_xy_to_index(x, 0)).collect();
		assert_eq!(2, refine_start_index(&grid, &model, &path));
	}
	#[test]
	fn single_cell_route_is_last() {
		let (grid, area, threat) = fixture(4, 4);
		let model = model(&area, &threat);
		let cell = grid.path_xy_to_index(1, 1);
		let info = fill_path_info(&grid, &model, vec![cell], 0.0, Vec3::ZERO);
		assert!(info.is_last);
		assert_eq!(0, info.start);
		assert_eq!(vec![grid.path_index_to_pos(cell)], info.pos_path);
	}
	#[test]
	fn waypoints_start_at_the_refined_cell() {
		let (grid, area, mut threat) = fixture(6, 1);
		threat.set_threat(ThreatLayer::Surface, grid.path_xy_to_index(3, 0), 1.0);
		let model = model(&area, &threat);
		let path: Vec<usize> = (0..6).map(|x| grid.path_xy_to_index(x, 0)).collect();
		let info = fill_path_info(&grid, &model, path, 5.0, Vec3::ZERO);
		assert!(!info.is_last);
		// refined to index 2, so four waypoints remain
		assert_eq!(2, info.start);
		assert_eq!(4, info.pos_path.len());
		assert_eq!(grid.path_index_to_pos(info.path[info.start]), info.pos_path[0]);
		assert_eq!(5.0, info.path_cost);
	}
}
