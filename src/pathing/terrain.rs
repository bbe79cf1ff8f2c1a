//! Static terrain attributes per path cell and the double-buffered per-class
//! passability arrays over the move grid
//!
//! The terrain collaborator owns the source of truth. It hands over one
//! [TerrainSector] per path cell plus a passable/impassable verdict per
//! mobility class, bundled as [AreaData]. From that [MoveData] derives a
//! boolean passability array per class over the bordered move grid, kept in
//! two complete snapshots: queries read whichever snapshot is active when
//! they are built while a rebuild writes into the staging snapshot and then
//! publishes it with a single atomic index swap. A rebuild therefore never
//! mutates data an in-flight query is reading
//!

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::prelude::*;
use bevy::prelude::*;

/// Static attributes of one path-grid cell, sourced from the terrain
/// collaborator
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, Reflect)]
pub struct TerrainSector {
	/// Steepest slope found within the cell
	pub max_slope: f32,
	/// Whether any part of the cell is under the water line
	pub is_water: bool,
	/// Highest elevation found within the cell
	pub max_elevation: f32,
}

/// Everything the engine consumes from the terrain collaborator: per-cell
/// attributes, the mobility class table, per-class area validity and the
/// grid-wide elevation bounds
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug)]
pub struct AreaData {
	/// Attributes of each path cell
	sectors: Vec<TerrainSector>,
	/// The small fixed mobility class table
	mobile_types: Vec<MobileType>,
	/// For each mobility class, whether each path cell belongs to a
	/// traversable area of that class
	passable: Vec<Vec<bool>>,
	/// Lowest elevation anywhere on the map
	min_elevation: f32,
	/// Highest elevation anywhere on the map
	max_elevation: f32,
}

impl AreaData {
	/// Create a new instance of [AreaData]. The `passable` arrays must be one
	/// per mobility class and every array must match the sector count
	pub fn new(
		sectors: Vec<TerrainSector>,
		mobile_types: Vec<MobileType>,
		passable: Vec<Vec<bool>>,
		min_elevation: f32,
		max_elevation: f32,
	) -> Self {
		if passable.len() != mobile_types.len() {
			panic!(
				"AreaData requires one passability array per mobility class, got {} arrays for {} classes",
				passable.len(),
				mobile_types.len()
			);
		}
		for (i, p) in passable.iter().enumerate() {
			if p.len() != sectors.len() {
				panic!(
					"AreaData passability array {} is sized {} but there are {} sectors",
					i,
					p.len(),
					sectors.len()
				);
			}
		}
		AreaData {
			sectors,
			mobile_types,
			passable,
			min_elevation,
			max_elevation,
		}
	}
	/// Create fully open, flat, dry terrain with the given cell count - a
	/// convenience for tests and benches
	pub fn open(path_len: usize, mobile_types: Vec<MobileType>) -> Self {
		let sectors = vec![TerrainSector::default(); path_len];
		let passable = vec![vec![true; path_len]; mobile_types.len()];
		AreaData::new(sectors, mobile_types, passable, 0.0, 0.0)
	}
	/// Create a new instance of [AreaData] from a `.ron` layout on disk
	#[cfg(feature = "ron")]
	pub fn from_file(path: String) -> Self {
		let file = std::fs::File::open(&path).expect("Failed opening area data file");
		let area: AreaData = match ron::de::from_reader(file) {
			Ok(area) => area,
			Err(e) => panic!("Failed deserializing area data from {}: {}", path, e),
		};
		// re-run the construction checks on whatever was on disk
		AreaData::new(
			area.sectors,
			area.mobile_types,
			area.passable,
			area.min_elevation,
			area.max_elevation,
		)
	}
	/// Attributes of each path cell
	pub fn get_sectors(&self) -> &[TerrainSector] {
		&self.sectors
	}
	/// The mobility class table
	pub fn get_mobile_types(&self) -> &[MobileType] {
		&self.mobile_types
	}
	/// Descriptor of one mobility class. Panics on an id outside the table -
	/// supplying valid ids is a caller contract
	pub fn get_mobile_type(&self, id: MobileTypeId) -> &MobileType {
		self.mobile_types
			.get(id.get())
			.unwrap_or_else(|| panic!("Unknown mobility class id {}", id.get()))
	}
	/// Per-class area validity of each path cell
	pub fn get_passable(&self, id: MobileTypeId) -> &[bool] {
		&self.passable[id.get()]
	}
	/// Lowest elevation anywhere on the map
	pub fn get_min_elevation(&self) -> f32 {
		self.min_elevation
	}
	/// Highest elevation anywhere on the map
	pub fn get_max_elevation(&self) -> f32 {
		self.max_elevation
	}
	/// Set the attributes of a single path cell
	pub fn set_sector(&mut self, index: usize, sector: TerrainSector) {
		self.sectors[index] = sector;
	}
	/// Set the area validity of a single path cell for one class
	pub fn set_passable(&mut self, id: MobileTypeId, index: usize, value: bool) {
		self.passable[id.get()][index] = value;
	}
}

/// Structure occupancy over a sub-cell grid, produced by the caller whenever
/// terrain-blocking structures change. Each path cell covers
/// `granularity x granularity` blocking cells
#[derive(Resource, Clone, Debug)]
pub struct BlockingMap {
	/// Number of blocking cells along `x`
	columns: usize,
	/// Number of blocking cells along `z`
	rows: usize,
	/// Blocking cells per path-cell edge
	granularity: usize,
	/// Whether a structure occupies each blocking cell
	cells: Vec<bool>,
}

impl BlockingMap {
	/// Create an empty blocking map for a path grid of the given cell
	/// dimensions
	pub fn new(path_width: usize, path_depth: usize, granularity: usize) -> Self {
		if granularity == 0 {
			panic!("BlockingMap granularity must be non-zero");
		}
		let columns = path_width * granularity;
		let rows = path_depth * granularity;
		BlockingMap {
			columns,
			rows,
			granularity,
			cells: vec![false; columns * rows],
		}
	}
	/// Number of blocking cells along `x`
	pub fn get_columns(&self) -> usize {
		self.columns
	}
	/// Number of blocking cells along `z`
	pub fn get_rows(&self) -> usize {
		self.rows
	}
	/// Blocking cells per path-cell edge
	pub fn get_granularity(&self) -> usize {
		self.granularity
	}
	/// Whether a structure occupies the blocking cell at `(x, z)`
	pub fn is_struct(&self, x: usize, z: usize) -> bool {
		self.cells[z * self.columns + x]
	}
	/// Record or clear a structure at blocking cell `(x, z)`
	pub fn set_struct(&mut self, x: usize, z: usize, occupied: bool) {
		self.cells[z * self.columns + x] = occupied;
	}
}

/// One complete set of per-class passability arrays over the move grid
#[derive(Clone, Debug, Default)]
struct MoveSnapshot {
	/// One array per mobility class, `Arc`-shared so queries pin the snapshot
	/// they were built against
	move_arrays: Vec<Arc<Vec<bool>>>,
}

/// Double-buffered per-class passability over the move grid plus the
/// always-passable-interior array used by flying agents
#[derive(Debug)]
pub struct MoveData {
	/// The two snapshot buffers, one active and one staging
	buffers: [MoveSnapshot; 2],
	/// Which buffer queries should currently read
	active: AtomicUsize,
	/// Whether a rebuild is owed because terrain-blocking structures changed
	stale: AtomicBool,
	/// Interior-passable array for agents with no terrain constraint
	air_move_array: Arc<Vec<bool>>,
}

impl MoveData {
	/// Create a new instance of [MoveData] with both buffers derived from the
	/// current area validity and no structures
	pub fn new(grid: &MapGrid, area: &AreaData) -> Self {
		let mut air = vec![true; grid.move_len()];
		for z in 0..grid.get_move_depth() {
			for x in 0..grid.get_move_width() {
				if grid.is_move_xy_border(x, z) {
					air[grid.move_xy_to_index(x, z)] = false;
				}
			}
		}
		let mut snapshot = MoveSnapshot::default();
		for mt in area.get_mobile_types() {
			let mut array = vec![false; grid.move_len()];
			let passable = area.get_passable(mt.get_id());
			let mut k = 0;
			for z in 1..grid.get_move_depth() - 1 {
				for x in 1..grid.get_move_width() - 1 {
					array[grid.move_xy_to_index(x, z)] = passable[k];
					k += 1;
				}
			}
			snapshot.move_arrays.push(Arc::new(array));
		}
		MoveData {
			buffers: [snapshot.clone(), snapshot],
			active: AtomicUsize::new(0),
			stale: AtomicBool::new(false),
			air_move_array: Arc::new(air),
		}
	}
	/// Pin the active snapshot's passability array for a class, or the air
	/// array when the agent has no terrain constraint. The returned `Arc`
	/// keeps that snapshot's data alive for the lifetime of a query even if a
	/// rebuild publishes the other buffer first
	pub fn passability(&self, mobile_type: Option<MobileTypeId>) -> Arc<Vec<bool>> {
		match mobile_type {
			None => Arc::clone(&self.air_move_array),
			Some(id) => {
				let snapshot = &self.buffers[self.active.load(Ordering::Acquire)];
				let array = snapshot
					.move_arrays
					.get(id.get())
					.unwrap_or_else(|| panic!("Unknown mobility class id {}", id.get()));
				Arc::clone(array)
			}
		}
	}
	/// Record that terrain-blocking structures changed and a rebuild is owed.
	/// Nothing rebuilds automatically - callers decide the cadence
	pub fn mark_stale(&self) {
		self.stale.store(true, Ordering::Release);
	}
	/// Whether a rebuild is owed
	pub fn is_stale(&self) -> bool {
		self.stale.load(Ordering::Acquire)
	}
	/// If a rebuild is owed, recompute the staging snapshot from area
	/// validity and structure occupancy then publish it with an atomic index
	/// swap. A coarse cell is impassable for a class once a quarter of its
	/// blocking sub-cells are occupied. Returns whether a rebuild ran
	pub fn rebuild_if_stale(&mut self, grid: &MapGrid, area: &AreaData, blocking: &BlockingMap) -> bool {
		if !self.is_stale() {
			return false;
		}
		self.stale.store(false, Ordering::Release);

		let granularity = blocking.get_granularity();
		let mut block_counts = vec![0usize; grid.path_len()];
		for z in 0..blocking.get_rows() {
			for x in 0..blocking.get_columns() {
				if blocking.is_struct(x, z) {
					block_counts[grid.path_xy_to_index(x / granularity, z / granularity)] += 1;
				}
			}
		}
		// 25% of sub-cells occupied marks the whole tile as blocked
		let block_threshold = granularity * granularity / 4;

		let staging = 1 - self.active.load(Ordering::Acquire);
		for mt in area.get_mobile_types() {
			let passable = area.get_passable(mt.get_id());
			// copy-on-write so queries pinning the old staging data are untouched
			let array = Arc::make_mut(&mut self.buffers[staging].move_arrays[mt.get_id().get()]);
			let mut k = 0;
			for z in 1..grid.get_move_depth() - 1 {
				for x in 1..grid.get_move_width() - 1 {
					array[grid.move_xy_to_index(x, z)] =
						passable[k] && block_counts[k] < block_threshold.max(1);
					k += 1;
				}
			}
		}
		self.active.store(staging, Ordering::Release);
		debug!("Move data rebuilt and published from staging buffer {}", staging);
		true
	}
}

#[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// A 4x4 single-class area with every cell open
	fn open_area() -> (MapGrid, AreaData) {
		let grid = MapGrid::new(4, 4, 8.0);
		let area = AreaData::open(grid.path_len(), vec![MobileType::new(MobileTypeId::new(0), 0.5)]);
		(grid, area)
	}
	#[test]
	#[should_panic]
	fn mismatched_passable_arrays() {
		AreaData::new(vec![TerrainSector::default(); 4], vec![MobileType::new(MobileTypeId::new(0), 0.5)], vec![], 0.0, 0.0);
	}
	#[test]
	fn move_arrays_have_blocked_borders() {
		let (grid, area) = open_area();
		let move_data = MoveData::new(&grid, &area);
		let array = move_data.passability(Some(MobileTypeId::new(0)));
		for z in 0..grid.get_move_depth() {
			for x in 0..grid.get_move_width() {
				let expected = !grid.is_move_xy_border(x, z);
				assert_eq!(expected, array[grid.move_xy_to_index(x, z)]);
			}
		}
	}
	#[test]
	fn air_array_ignores_terrain() {
		let grid = MapGrid::new(4, 4, 8.0);
		let mut area = AreaData::open(grid.path_len(), vec![MobileType::new(MobileTypeId::new(0), 0.5)]);
		for i in 0..grid.path_len() {
			area.set_passable(MobileTypeId::new(0), i, false);
		}
		let move_data = MoveData::new(&grid, &area);
		let air = move_data.passability(None);
		assert!(air[grid.path_index_to_move_index(0)]);
		let ground = move_data.passability(Some(MobileTypeId::new(0)));
		assert!(!ground[grid.path_index_to_move_index(0)]);
	}
	#[test]
	fn rebuild_only_runs_when_stale() {
		let (grid, area) = open_area();
		let mut move_data = MoveData::new(&grid, &area);
		let blocking = BlockingMap::new(4, 4, 4);
		assert!(!move_data.rebuild_if_stale(&grid, &area, &blocking));
		move_data.mark_stale();
		assert!(move_data.rebuild_if_stale(&grid, &area, &blocking));
		assert!(!move_data.is_stale());
	}
	#[test]
	fn blocked_fraction_threshold() {
		let (grid, area) = open_area();
		let mut move_data = MoveData::new(&grid, &area);
		// 16 sub-cells per path cell, threshold is 4
		let mut blocking = BlockingMap::new(4, 4, 4);
		// three occupied sub-cells of path cell (1, 1): below threshold
		blocking.set_struct(4, 4, true);
		blocking.set_struct(5, 4, true);
		blocking.set_struct(6, 4, true);
		move_data.mark_stale();
		move_data.rebuild_if_stale(&grid, &area, &blocking);
		let target = grid.path_index_to_move_index(grid.path_xy_to_index(1, 1));
		assert!(move_data.passability(Some(MobileTypeId::new(0)))[target]);
		// a fourth occupied sub-cell tips it over
		blocking.set_struct(7, 4, true);
		move_data.mark_stale();
		move_data.rebuild_if_stale(&grid, &area, &blocking);
		assert!(!move_data.passability(Some(MobileTypeId::new(0)))[target]);
	}
	#[test]
	fn pinned_snapshot_survives_rebuild() {
		let (grid, area) = open_area();
		let mut move_data = MoveData::new(&grid, &area);
		let pinned = move_data.passability(Some(MobileTypeId::new(0)));
		let mut blocking = BlockingMap::new(4, 4, 4);
		for x in 4..8 {
			for z in 4..8 {
				blocking.set_struct(x, z, true);
			}
		}
		move_data.mark_stale();
		move_data.rebuild_if_stale(&grid, &area, &blocking);
		// run it twice so the rebuild lands back on the buffer the pin came from
		move_data.mark_stale();
		move_data.rebuild_if_stale(&grid, &area, &blocking);
		let target = grid.path_index_to_move_index(grid.path_xy_to_index(1, 1));
		assert!(pinned[target]);
		assert!(!move_data.passability(Some(MobileTypeId::new(0)))[target]);
	}
}
