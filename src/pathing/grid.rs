//! Coordinate systems of the pathing grids and the pure conversions between
//! them
//!
//! Two grids cover the map. The `path` grid is `width x depth` cells and is
//! what per-cell attributes (slope, water, threat) are stored against. The
//! `move` grid wraps the path grid in a 1-cell border, sized
//! `(width+2) x (depth+2)`, and is what passability arrays are stored
//! against - the border is always impassable so a search can never step off
//! the edge of the map:
//!
//! ```text
//!  _________________________
//! |##|##|##|##|##|##|##|##|##|   # - border move cell, always blocked
//! |##|__|__|__|__|__|__|__|##|   _ - interior move cell, one per path cell
//! |##|__|__|__|__|__|__|__|##|
//! |##|__|__|__|__|__|__|__|##|
//! |##|##|##|##|##|##|##|##|##|
//! ```
//!
//! World positions sit on the `x`/`z` plane, the world origin is the top-left
//! corner of the path grid and each cell is `square_size` units along an edge
//!

use bevy::prelude::*;

/// Dimensions of the pathable map and the size of its cells
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Reflect)]
pub struct MapGrid {
	/// Number of path-grid cells along the world `x` axis
	path_width: usize,
	/// Number of path-grid cells along the world `z` axis
	path_depth: usize,
	/// Length of a cell edge in world units
	square_size: f32,
}

impl MapGrid {
	/// Create a new instance of [MapGrid] from the cell dimensions of the
	/// path grid and the world-unit size of a cell
	pub fn new(path_width: usize, path_depth: usize, square_size: f32) -> Self {
		if path_width == 0 || path_depth == 0 {
			panic!(
				"Grid dimensions `({}, {})` are degenerate, both must be non-zero",
				path_width, path_depth
			);
		}
		if square_size <= 0.0 {
			panic!("Cell square_size must be positive, got {}", square_size);
		}
		MapGrid {
			path_width,
			path_depth,
			square_size,
		}
	}
	/// Number of path-grid cells along `x`
	pub fn get_path_width(&self) -> usize {
		self.path_width
	}
	/// Number of path-grid cells along `z`
	pub fn get_path_depth(&self) -> usize {
		self.path_depth
	}
	/// Number of move-grid cells along `x` (path width plus the border pair)
	pub fn get_move_width(&self) -> usize {
		self.path_width + 2
	}
	/// Number of move-grid cells along `z` (path depth plus the border pair)
	pub fn get_move_depth(&self) -> usize {
		self.path_depth + 2
	}
	/// Length of a cell edge in world units
	pub fn get_square_size(&self) -> f32 {
		self.square_size
	}
	/// Total number of cells in the path grid
	pub fn path_len(&self) -> usize {
		self.path_width * self.path_depth
	}
	/// Total number of cells in the move grid
	pub fn move_len(&self) -> usize {
		self.get_move_width() * self.get_move_depth()
	}

	/// Clamp a world position into the bounds of the map so a lookup derived
	/// from it can never index outside the grids. Out-of-range inputs are
	/// corrected, never rejected
	pub fn correct_position(&self, position: Vec3) -> Vec3 {
		// worlds smaller than the 1-unit margin still clamp to the origin
		let max_x = (self.path_width as f32 * self.square_size - 1.0).max(0.0);
		let max_z = (self.path_depth as f32 * self.square_size - 1.0).max(0.0);
		Vec3::new(
			position.x.clamp(0.0, max_x),
			position.y,
			position.z.clamp(0.0, max_z),
		)
	}

	/// From an in-bounds world position find the `(column, row)` of the move
	/// cell containing it
	pub fn pos_to_move_xy(&self, position: Vec3) -> (usize, usize) {
		let x = (position.x / self.square_size) as usize + 1;
		let z = (position.z / self.square_size) as usize + 1;
		(x, z)
	}
	/// From an in-bounds world position find the index of the move cell
	/// containing it
	pub fn pos_to_move_index(&self, position: Vec3) -> usize {
		let (x, z) = self.pos_to_move_xy(position);
		self.move_xy_to_index(x, z)
	}
	/// Index of the move cell at `(column, row)`
	pub fn move_xy_to_index(&self, x: usize, z: usize) -> usize {
		z * self.get_move_width() + x
	}
	/// The `(column, row)` of a move-cell index
	pub fn move_index_to_xy(&self, index: usize) -> (usize, usize) {
		let z = index / self.get_move_width();
		(index - z * self.get_move_width(), z)
	}
	/// World position of the centre of a move cell
	pub fn move_index_to_pos(&self, index: usize) -> Vec3 {
		let (x, z) = self.move_index_to_xy(index);
		Vec3::new(
			(x as f32 - 1.0) * self.square_size + self.square_size / 2.0,
			0.0,
			(z as f32 - 1.0) * self.square_size + self.square_size / 2.0,
		)
	}

	/// From an in-bounds world position find the `(column, row)` of the path
	/// cell containing it
	pub fn pos_to_path_xy(&self, position: Vec3) -> (usize, usize) {
		(
			(position.x / self.square_size) as usize,
			(position.z / self.square_size) as usize,
		)
	}
	/// Index of the path cell at `(column, row)`
	pub fn path_xy_to_index(&self, x: usize, z: usize) -> usize {
		z * self.path_width + x
	}
	/// The `(column, row)` of a path-cell index
	pub fn path_index_to_xy(&self, index: usize) -> (usize, usize) {
		let z = index / self.path_width;
		(index - z * self.path_width, z)
	}
	/// World position of the centre of a path cell
	pub fn path_index_to_pos(&self, index: usize) -> Vec3 {
		let (x, z) = self.path_index_to_xy(index);
		Vec3::new(
			x as f32 * self.square_size + self.square_size / 2.0,
			0.0,
			z as f32 * self.square_size + self.square_size / 2.0,
		)
	}
	/// The move-grid `(column, row)` overlaying a path-cell index
	pub fn path_index_to_move_xy(&self, index: usize) -> (usize, usize) {
		let (x, z) = self.path_index_to_xy(index);
		(x + 1, z + 1)
	}
	/// The move-cell index overlaying a path-cell index
	pub fn path_index_to_move_index(&self, index: usize) -> usize {
		let (x, z) = self.path_index_to_move_xy(index);
		self.move_xy_to_index(x, z)
	}
	/// The path-cell index under a move-cell index, or [None] for cells of
	/// the impassable border which have no path-grid counterpart
	pub fn move_index_to_path_index(&self, index: usize) -> Option<usize> {
		let (x, z) = self.move_index_to_xy(index);
		if x == 0 || x > self.path_width || z == 0 || z > self.path_depth {
			return None;
		}
		Some(self.path_xy_to_index(x - 1, z - 1))
	}
	/// Whether a move-cell `(column, row)` lies on the always-blocked border
	pub fn is_move_xy_border(&self, x: usize, z: usize) -> bool {
		x == 0 || x >= self.get_move_width() - 1 || z == 0 || z >= self.get_move_depth() - 1
	}
}
