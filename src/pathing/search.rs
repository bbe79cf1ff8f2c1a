//! Best-first search over the move grid with threat-gated edges
//!
//! All four query kinds run through one [SearchContext]. The context owns
//! every piece of mutable scratch a search needs - the open heap, per-cell
//! cost/parent bookkeeping and the multi-target acceptance marks - and reuses
//! it across calls, so invocations are mutually exclusive by contract: the
//! engine façade wraps the context in a single mutex and throughput is
//! search-count-bound rather than worker-count-bound. That serialization is
//! the documented design, not an accident
//!
//! Expansion is 4-connected. Stepping into a cell costs `1.0` plus the
//! query's combined terrain-and-threat cost of that cell, and a cell whose
//! raw threat exceeds the query's ceiling is a hard barrier rather than
//! merely expensive. Ties in total cost pop in insertion order
//!

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

use crate::prelude::*;

/// Sentinel written into a cost map for cells the source cannot reach
pub const UNREACHABLE: f32 = -1.0;

/// Read-only per-query inputs a solve runs against
pub struct SearchMap<'a> {
	/// Passability over the move grid pinned by the query
	pub passable: &'a [bool],
	/// Cost functions bound to the query
	pub model: &'a CostModel,
	/// Threat ceiling above which a cell is a hard barrier
	pub max_threat: f32,
}

/// Reference into the open set, ordered so the heap pops lowest cost first
/// and breaks ties by earliest insertion
#[derive(Clone, Copy)]
struct OpenEntry {
	/// Cost from the start to this cell
	cost: f32,
	/// Insertion sequence number within the current search
	seq: u64,
	/// Move-cell index
	index: usize,
}

impl Ord for OpenEntry {
	fn cmp(&self, other: &Self) -> CmpOrdering {
		// Reverse so BinaryHeap (max-heap) pops smallest cost first
		other
			.cost
			.total_cmp(&self.cost)
			.then_with(|| other.seq.cmp(&self.seq))
	}
}
impl PartialOrd for OpenEntry {
	fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
		Some(self.cmp(other))
	}
}
impl PartialEq for OpenEntry {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == CmpOrdering::Equal
	}
}
impl Eq for OpenEntry {}

/// Goal test applied when a cell is settled
enum Accept {
	/// Never accept - exhaust the reachable grid (cost maps)
	Never,
	/// Accept any cell within a cell-radius of a single goal
	WithinRadius {
		/// Goal move-cell column
		x: i32,
		/// Goal move-cell row
		z: i32,
		/// Radius in cells, squared
		radius_sq: i64,
	},
	/// Accept any cell carrying the current target-acceptance mark
	Marked,
}

/// The search engine's reusable scratch state
///
/// Per-cell arrays carry a generation stamp instead of being cleared between
/// searches, so repeated queries incur no allocations or wipes after warm-up
pub struct SearchContext {
	/// Grid the scratch arrays are sized for
	grid: MapGrid,
	/// Best known cost from the start, valid when `seen` carries the current
	/// generation
	cost: Vec<f32>,
	/// Predecessor move cell, valid when `seen` carries the current generation
	parent: Vec<usize>,
	/// Generation stamp marking `cost`/`parent` as belonging to this search
	seen: Vec<u32>,
	/// Generation stamp marking a cell as settled this search
	closed: Vec<u32>,
	/// Generation stamp marking a cell as a multi-target acceptance node
	target_mark: Vec<u32>,
	/// Current search generation
	generation: u32,
	/// Current target-acceptance generation
	target_generation: u32,
	/// The open set
	heap: BinaryHeap<OpenEntry>,
	/// Insertion counter for stable tie-breaks
	seq: u64,
}

impl SearchContext {
	/// Create a new instance of [SearchContext] sized for a grid
	pub fn new(grid: MapGrid) -> Self {
		let len = grid.move_len();
		SearchContext {
			grid,
			cost: vec![0.0; len],
			parent: vec![usize::MAX; len],
			seen: vec![0; len],
			closed: vec![0; len],
			target_mark: vec![0; len],
			generation: 0,
			target_generation: 0,
			heap: BinaryHeap::new(),
			seq: 0,
		}
	}

	/// Point-to-point search from a start move cell to any cell within
	/// `radius` cells of the goal move cell. Returns the ascending path-index
	/// route and its cost, or [None] when no acceptable cell is reachable
	pub fn find_path(
		&mut self,
		map: &SearchMap,
		start: usize,
		goal: usize,
		radius: usize,
	) -> Option<(Vec<usize>, f32)> {
		let (gx, gz) = self.grid.move_index_to_xy(goal);
		let accept = Accept::WithinRadius {
			x: gx as i32,
			z: gz as i32,
			radius_sq: (radius * radius) as i64,
		};
		let (end, cost) = self.run(map, start, accept)?;
		Some((self.reconstruct(start, end), cost))
	}

	/// Identical termination condition to [SearchContext::find_path] but
	/// reconstructs no geometry - used for cheap feasibility and ranking
	/// checks
	pub fn path_cost(
		&mut self,
		map: &SearchMap,
		start: usize,
		goal: usize,
		radius: usize,
	) -> Option<f32> {
		let (gx, gz) = self.grid.move_index_to_xy(goal);
		let accept = Accept::WithinRadius {
			x: gx as i32,
			z: gz as i32,
			radius_sq: (radius * radius) as i64,
		};
		self.run(map, start, accept).map(|(_, cost)| cost)
	}

	/// One search from a shared start to the best of many candidate goal
	/// regions. Every cell of the circle of `radius` cells around each target
	/// is marked an acceptance node exactly once, even where circles overlap,
	/// then a single solve returns the cheapest route to any of them
	pub fn find_path_to_targets(
		&mut self,
		map: &SearchMap,
		start: usize,
		targets: &[usize],
		radius: usize,
	) -> Option<(Vec<usize>, f32)> {
		self.target_generation += 1;
		let offsets = circle_offsets(radius);
		let move_width = self.grid.get_move_width() as i32;
		let move_depth = self.grid.get_move_depth() as i32;
		for &target in targets {
			let (tx, tz) = self.grid.move_index_to_xy(target);
			for (dx, dz) in offsets.iter() {
				let sx = tx as i32 + dx;
				let sz = tz as i32 + dz;
				if sx >= 0 && sx < move_width && sz >= 0 && sz < move_depth {
					let index = self.grid.move_xy_to_index(sx as usize, sz as usize);
					self.target_mark[index] = self.target_generation;
				}
			}
		}
		let (end, cost) = self.run(map, start, Accept::Marked)?;
		Some((self.reconstruct(start, end), cost))
	}

	/// Single-source cost to every reachable cell, as a dense path-grid array
	/// holding [UNREACHABLE] where the source cannot go
	pub fn cost_map(&mut self, map: &SearchMap, start: usize) -> Vec<f32> {
		let _ = self.run(map, start, Accept::Never);
		let mut out = vec![UNREACHABLE; self.grid.path_len()];
		for index in 0..self.grid.move_len() {
			if self.closed[index] == self.generation {
				if let Some(path_index) = self.grid.move_index_to_path_index(index) {
					out[path_index] = self.cost[index];
				}
			}
		}
		out
	}

	/// Dijkstra loop shared by every operation. Returns the settled
	/// acceptance cell and its cost, or [None] when the open set empties
	/// without acceptance
	fn run(&mut self, map: &SearchMap, start: usize, accept: Accept) -> Option<(usize, f32)> {
		self.generation += 1;
		self.heap.clear();
		self.seq = 0;

		self.cost[start] = 0.0;
		self.parent[start] = usize::MAX;
		self.seen[start] = self.generation;
		self.heap.push(OpenEntry {
			cost: 0.0,
			seq: 0,
			index: start,
		});

		while let Some(entry) = self.heap.pop() {
			let index = entry.index;
			if self.closed[index] == self.generation {
				continue;
			}
			self.closed[index] = self.generation;
			let cost = self.cost[index];

			let accepted = match accept {
				Accept::Never => false,
				Accept::WithinRadius { x, z, radius_sq } => {
					let (cx, cz) = self.grid.move_index_to_xy(index);
					let dx = cx as i64 - x as i64;
					let dz = cz as i64 - z as i64;
					dx * dx + dz * dz <= radius_sq
				}
				Accept::Marked => self.target_mark[index] == self.target_generation,
			};
			if accepted {
				return Some((index, cost));
			}

			let (cx, cz) = self.grid.move_index_to_xy(index);
			// orthogonal neighbours only - border cells are never passable so
			// the +/-1 arithmetic cannot escape the move grid
			let neighbours = [
				(cx, cz.wrapping_sub(1)),
				(cx + 1, cz),
				(cx, cz + 1),
				(cx.wrapping_sub(1), cz),
			];
			for (nx, nz) in neighbours {
				if nx >= self.grid.get_move_width() || nz >= self.grid.get_move_depth() {
					continue;
				}
				let neighbour = self.grid.move_xy_to_index(nx, nz);
				if !map.passable[neighbour] || self.closed[neighbour] == self.generation {
					continue;
				}
				let Some(path_index) = self.grid.move_index_to_path_index(neighbour) else {
					continue;
				};
				if map.model.threat_at(path_index) > map.max_threat {
					continue;
				}
				let step = 1.0 + map.model.move_threat_cost(path_index);
				let next_cost = cost + step;
				if self.seen[neighbour] != self.generation || next_cost < self.cost[neighbour] {
					self.seen[neighbour] = self.generation;
					self.cost[neighbour] = next_cost;
					self.parent[neighbour] = index;
					self.seq += 1;
					self.heap.push(OpenEntry {
						cost: next_cost,
						seq: self.seq,
						index: neighbour,
					});
				}
			}
		}
		None
	}

	/// Walk parents from the settled goal back to the start and emit the
	/// route as ascending path-grid indices
	fn reconstruct(&self, start: usize, end: usize) -> Vec<usize> {
		let mut route = Vec::new();
		let mut current = end;
		loop {
			if let Some(path_index) = self.grid.move_index_to_path_index(current) {
				route.push(path_index);
			}
			if current == start {
				break;
			}
			current = self.parent[current];
		}
		route.reverse();
		route
	}
}

/// Offsets describing the discrete circle of `radius` cells around a target,
/// generated row band by row band in one quadrant then mirrored through the
/// other three. Radius zero yields just the target itself
pub fn circle_offsets(radius: usize) -> Vec<(i32, i32)> {
	let r = radius as i32;
	if r == 0 {
		return vec![(0, 0)];
	}
	let double_radius = 2 * r;
	let square_radius = (r * r) as f32;

	let mut xend = Vec::with_capacity(double_radius as usize + 1);
	for a in 0..=double_radius {
		let z = (a - r) as f32;
		xend.push((square_radius - z * z).sqrt() as i32);
	}

	let mut offsets: Vec<(i32, i32)> = vec![(0, 0)];
	for a in 1..=r {
		let start = xend[(a - 1) as usize];
		let end = xend[a as usize];
		for x in start..=end {
			offsets.push((x, a));
		}
	}
	// mirror the arc band through the horizontal axis
	let half = offsets.len();
	for i in 0..half.saturating_sub(2) {
		let (x, z) = offsets[i];
		offsets.push((x, double_radius - z));
	}
	// mirror everything through the vertical axis
	let full = offsets.len();
	for i in 0..full {
		let (x, z) = offsets[i];
		offsets.push((-x, z));
	}
	// recentre rows on the target
	for offset in offsets.iter_mut() {
		offset.1 -= r;
	}
	offsets
}
