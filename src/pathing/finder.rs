//! The engine façade: query builders, the background execution layer and
//! ordered completion delivery
//!
//! Building a query is cheap and non-blocking - it binds a cost model, pins
//! the passability and threat arrays and copies the endpoints. Submitting it
//! hands the solve to the compute task pool where the worker takes the single
//! search mutex, solves, refines and writes the result. Callbacks never fire
//! from the worker: [PathFinder::deliver_completions] runs on the caller's
//! schedule and drains only the contiguous ready prefix of the submission
//! queue, so completion always arrives in submission order no matter which
//! solves finish first
//!

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};

use crate::pathing::query::QueryState;
use crate::prelude::*;

/// Callback fired on the delivering schedule once a query is ready
pub type OnComplete = Box<dyn FnOnce(&PathQuery) + Send + Sync + 'static>;

/// A submitted query waiting its turn for delivery
struct Pending {
	/// The query, shared with the worker solving it
	query: Arc<PathQuery>,
	/// Callback to fire when the query reaches the front of the queue ready
	on_complete: Option<OnComplete>,
}

/// The threat-aware pathfinding engine over one map
#[derive(Resource)]
pub struct PathFinder {
	/// Grid geometry shared by every query
	grid: MapGrid,
	/// Static terrain attributes from the terrain collaborator
	area: Arc<AreaData>,
	/// Double-buffered per-class passability
	move_data: MoveData,
	/// Source of engine-unique query ids
	next_id: u64,
	/// The single search scratch state, serializing all solves
	search: Arc<Mutex<SearchContext>>,
	/// Submission-ordered queue of in-flight queries
	pending: VecDeque<Pending>,
}

impl PathFinder {
	/// Create a new instance of [PathFinder] over a grid and its terrain data
	pub fn new(grid: MapGrid, area: AreaData) -> Self {
		let move_data = MoveData::new(&grid, &area);
		PathFinder {
			grid,
			area: Arc::new(area),
			move_data,
			next_id: 0,
			search: Arc::new(Mutex::new(SearchContext::new(grid))),
			pending: VecDeque::new(),
		}
	}
	/// Grid geometry shared by every query
	pub fn get_grid(&self) -> MapGrid {
		self.grid
	}
	/// Static terrain attributes
	pub fn get_area(&self) -> &Arc<AreaData> {
		&self.area
	}
	/// Number of submitted queries not yet delivered
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	/// Bind the inputs every query kind shares
	fn build(
		&mut self,
		kind: QueryKind,
		threat: &ThreatField,
		profile: &AgentProfile,
		max_threat: f32,
	) -> Arc<PathQuery> {
		let model = CostModel::new(Arc::clone(&self.area), threat, profile);
		let passable = self.move_data.passability(profile.mobile_type);
		self.next_id += 1;
		Arc::new(PathQuery::new(
			self.next_id,
			kind,
			model,
			passable,
			max_threat,
		))
	}
	/// Build a point-to-point query returning full geometry
	pub fn create_path_query(
		&mut self,
		threat: &ThreatField,
		profile: &AgentProfile,
		max_threat: f32,
		start: Vec3,
		end: Vec3,
		radius: f32,
	) -> Arc<PathQuery> {
		self.build(
			QueryKind::PathInfo { start, end, radius },
			threat,
			profile,
			max_threat,
		)
	}
	/// Build a query for the cheapest route to any of many candidate goals
	pub fn create_multi_query(
		&mut self,
		threat: &ThreatField,
		profile: &AgentProfile,
		max_threat: f32,
		start: Vec3,
		max_range: f32,
		targets: Vec<Vec3>,
	) -> Arc<PathQuery> {
		self.build(
			QueryKind::PathMulti {
				start,
				max_range,
				targets,
			},
			threat,
			profile,
			max_threat,
		)
	}
	/// Build a cost-only point-to-point query
	pub fn create_cost_query(
		&mut self,
		threat: &ThreatField,
		profile: &AgentProfile,
		max_threat: f32,
		start: Vec3,
		end: Vec3,
		radius: f32,
	) -> Arc<PathQuery> {
		self.build(
			QueryKind::PathCost { start, end, radius },
			threat,
			profile,
			max_threat,
		)
	}
	/// Build a single-source cost-map query
	pub fn create_cost_map_query(
		&mut self,
		threat: &ThreatField,
		profile: &AgentProfile,
		max_threat: f32,
		start: Vec3,
	) -> Arc<PathQuery> {
		self.build(QueryKind::CostMap { start }, threat, profile, max_threat)
	}

	/// Hand a query to the compute task pool and enqueue it for ordered
	/// delivery. The callback fires from [PathFinder::deliver_completions],
	/// never from the worker
	pub fn submit(&mut self, query: Arc<PathQuery>, on_complete: Option<OnComplete>) {
		query.mark_processing();
		let grid = self.grid;
		let search = Arc::clone(&self.search);
		let worker_query = Arc::clone(&query);
		self.pending.push_back(Pending { query, on_complete });
		AsyncComputeTaskPool::get_or_init(TaskPool::new)
			.spawn(async move {
				let mut context = search.lock().expect("Search context mutex poisoned");
				let result = run_query(&grid, &mut context, &worker_query);
				worker_query.complete(result);
			})
			.detach();
	}
	/// Solve a query on the calling thread, mirroring the worker exactly.
	/// Serves tests, benches and callers that want synchronous answers
	pub fn run_blocking(&self, query: &PathQuery) {
		query.mark_processing();
		let mut context = self.search.lock().expect("Search context mutex poisoned");
		let result = run_query(&self.grid, &mut context, query);
		query.complete(result);
	}
	/// Fire callbacks for the contiguous ready prefix of the submission
	/// queue. A finished query behind an unfinished one waits. Returns how
	/// many queries were delivered
	pub fn deliver_completions(&mut self) -> usize {
		let mut delivered = 0;
		while self
			.pending
			.front()
			.is_some_and(|pending| pending.query.get_state() == QueryState::Ready)
		{
			if let Some(pending) = self.pending.pop_front() {
				if let Some(on_complete) = pending.on_complete {
					on_complete(&pending.query);
				}
				delivered += 1;
			}
		}
		delivered
	}

	/// Record that terrain-blocking structures changed and a move-data
	/// rebuild is owed
	pub fn request_area_rebuild(&self) {
		self.move_data.mark_stale();
	}
	/// Whether a move-data rebuild is owed
	pub fn is_rebuild_owed(&self) -> bool {
		self.move_data.is_stale()
	}
	/// Run the owed move-data rebuild, if any. Callers pick the cadence
	pub fn rebuild_if_stale(&mut self, blocking: &BlockingMap) -> bool {
		self.move_data.rebuild_if_stale(&self.grid, &self.area, blocking)
	}
}

/// Solve one query against the scratch context. Shared by the async worker
/// and the blocking twin
fn run_query(grid: &MapGrid, context: &mut SearchContext, query: &PathQuery) -> QueryResult {
	let map = SearchMap {
		passable: query.get_passable().as_slice(),
		model: query.get_model(),
		max_threat: query.get_max_threat(),
	};
	match query.get_kind() {
		QueryKind::PathInfo { start, end, radius } => {
			let start_pos = grid.correct_position(*start);
			let start_cell = grid.pos_to_move_index(start_pos);
			let goal_cell = grid.pos_to_move_index(grid.correct_position(*end));
			let radius_cells = (radius / grid.get_square_size()) as usize;
			let info = context
				.find_path(&map, start_cell, goal_cell, radius_cells)
				.map(|(path, cost)| {
					fill_path_info(grid, query.get_model(), path, cost, start_pos)
				});
			QueryResult::Path(info)
		}
		QueryKind::PathMulti {
			start,
			max_range,
			targets,
		} => {
			// a reach below one cell cannot accept anything: complete as a
			// zero-cost no-op with an empty route
			if *max_range < grid.get_square_size() {
				return QueryResult::Path(Some(PathInfo {
					start_pos: grid.correct_position(*start),
					..Default::default()
				}));
			}
			let start_pos = grid.correct_position(*start);
			let start_cell = grid.pos_to_move_index(start_pos);
			let goal_cells: Vec<usize> = targets
				.iter()
				.map(|target| grid.pos_to_move_index(grid.correct_position(*target)))
				.collect();
			let radius_cells = (max_range / grid.get_square_size()) as usize;
			let info = context
				.find_path_to_targets(&map, start_cell, &goal_cells, radius_cells)
				.map(|(path, cost)| {
					fill_path_info(grid, query.get_model(), path, cost, start_pos)
				});
			QueryResult::Path(info)
		}
		QueryKind::PathCost { start, end, radius } => {
			let start_cell = grid.pos_to_move_index(grid.correct_position(*start));
			let goal_cell = grid.pos_to_move_index(grid.correct_position(*end));
			let radius_cells = (radius / grid.get_square_size()) as usize;
			QueryResult::Cost(context.path_cost(&map, start_cell, goal_cell, radius_cells))
		}
		QueryKind::CostMap { start } => {
			let start_cell = grid.pos_to_move_index(grid.correct_position(*start));
			QueryResult::CostMap(context.cost_map(&map, start_cell))
		}
	}
}

#[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;

	/// Engine over an open single-class 10x10 world, cell size 8
	fn open_finder() -> (PathFinder, ThreatField) {
		let grid = MapGrid::new(10, 10, 8.0);
		let area = AreaData::open(
			grid.path_len(),
			vec![MobileType::new(MobileTypeId::new(0), 0.5)],
		);
		let threat = ThreatField::new(grid.path_len());
		(PathFinder::new(grid, area), threat)
	}
	/// World centre of a path cell
	fn centre(finder: &PathFinder, x: usize, z: usize) -> Vec3 {
		let grid = finder.get_grid();
		grid.path_index_to_pos(grid.path_xy_to_index(x, z))
	}

	#[test]
	fn blocking_path_query_resolves() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let query = finder.create_path_query(
			&threat, &profile, f32::MAX,
			centre(&finder, 0, 0), centre(&finder, 9, 9), 0.0,
		);
		finder.run_blocking(&query);
		let info = query.get_path_info().unwrap();
		assert_eq!(19, info.path.len());
		assert!((info.path_cost - 18.0).abs() < 1e-5);
		assert!(!info.is_last);
	}
	#[test]
	fn out_of_bounds_endpoints_are_corrected() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let query = finder.create_path_query(
			&threat, &profile, f32::MAX,
			Vec3::new(-500.0, 0.0, -500.0), Vec3::new(9999.0, 0.0, 9999.0), 0.0,
		);
		finder.run_blocking(&query);
		// clamps to the diagonal corners
		assert_eq!(19, query.get_path_info().unwrap().path.len());
	}
	#[test]
	fn degenerate_multi_range_is_a_zero_cost_no_op() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let query = finder.create_multi_query(
			&threat, &profile, f32::MAX,
			centre(&finder, 0, 0), 4.0, vec![centre(&finder, 9, 9)],
		);
		finder.run_blocking(&query);
		let info = query.get_path_info().unwrap();
		assert!(info.path.is_empty());
		assert!(info.pos_path.is_empty());
		assert_eq!(0.0, info.path_cost);
		assert_eq!(Some(0.0), query.get_path_cost());
		assert_eq!(centre(&finder, 0, 0), info.start_pos);
	}
	#[test]
	fn cost_query_skips_geometry() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let query = finder.create_cost_query(
			&threat, &profile, f32::MAX,
			centre(&finder, 0, 0), centre(&finder, 4, 0), 0.0,
		);
		finder.run_blocking(&query);
		assert_eq!(Some(4.0), query.get_path_cost());
		assert!(query.get_path_info().is_none());
	}
	#[test]
	fn cost_map_query_covers_the_grid() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let query = finder.create_cost_map_query(
			&threat, &profile, f32::MAX, centre(&finder, 0, 0),
		);
		finder.run_blocking(&query);
		let map = query.get_cost_map().unwrap();
		assert_eq!(100, map.len());
		let grid = finder.get_grid();
		assert_eq!(0.0, map[grid.path_xy_to_index(0, 0)]);
		assert!((map[grid.path_xy_to_index(9, 9)] - 18.0).abs() < 1e-5);
	}
	#[test]
	fn query_ids_are_monotonic() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let first = finder.create_cost_map_query(&threat, &profile, f32::MAX, Vec3::ZERO);
		let second = finder.create_cost_map_query(&threat, &profile, f32::MAX, Vec3::ZERO);
		assert!(second.get_id() > first.get_id());
	}
	#[test]
	fn delivery_waits_for_the_queue_head() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let first = finder.create_cost_map_query(&threat, &profile, f32::MAX, Vec3::ZERO);
		let second = finder.create_cost_map_query(&threat, &profile, f32::MAX, Vec3::ZERO);
		let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
		for query in [&first, &second] {
			let record = Arc::clone(&order);
			finder.pending.push_back(Pending {
				query: Arc::clone(query),
				on_complete: Some(Box::new(move |q: &PathQuery| {
					record.lock().unwrap().push(q.get_id());
				})),
			});
		}
		// finish the second solve first: nothing may be delivered yet
		finder.run_blocking(&second);
		assert_eq!(0, finder.deliver_completions());
		assert_eq!(2, finder.pending_len());
		// once the head is ready both deliver, in submission order
		finder.run_blocking(&first);
		assert_eq!(2, finder.deliver_completions());
		assert_eq!(vec![first.get_id(), second.get_id()], *order.lock().unwrap());
	}
	#[test]
	fn rebuild_closes_cells_for_new_queries_only() {
		let (mut finder, threat) = open_finder();
		let profile = AgentProfile::surface(MobileTypeId::new(0));
		let before = finder.create_path_query(
			&threat, &profile, f32::MAX,
			centre(&finder, 0, 5), centre(&finder, 9, 5), 0.0,
		);
		// wall off row 5 column 4 with structures
		let mut blocking = BlockingMap::new(10, 10, 4);
		for z in 0..40 {
			for x in 16..20 {
				blocking.set_struct(x, z, true);
			}
		}
		finder.request_area_rebuild();
		assert!(finder.is_rebuild_owed());
		assert!(finder.rebuild_if_stale(&blocking));
		let after = finder.create_path_query(
			&threat, &profile, f32::MAX,
			centre(&finder, 0, 5), centre(&finder, 9, 5), 0.0,
		);
		finder.run_blocking(&before);
		finder.run_blocking(&after);
		// the earlier query pinned the open snapshot and goes straight across
		assert_eq!(10, before.get_path_info().unwrap().path.len());
		// the later query sees the wall
		assert!(after.get_path_info().is_none());
	}
}
