//! Queries as shared-ownership records that travel between the requesting
//! thread and the search worker
//!
//! A query is immutable once built: the engine binds the cost model, pins the
//! passability array and copies the endpoints at creation time, so nothing a
//! collaborator publishes afterwards can change what the search reads. The
//! worker writes the result exactly once and then flips the state to
//! [QueryState::Ready], after which the accessors are valid
//!

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use bevy::prelude::*;

use crate::prelude::*;

/// Lifecycle of a query
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueryState {
	/// Built but not yet picked up by a worker
	Created,
	/// A worker is running the search
	Processing,
	/// The result is written and the accessors are valid
	Ready,
}

/// What a query asks the engine to compute
#[derive(Clone, Debug)]
pub enum QueryKind {
	/// Full geometry from a start to within a radius of a goal
	PathInfo {
		/// World position of the agent
		start: Vec3,
		/// World position of the goal
		end: Vec3,
		/// Acceptance radius around the goal in world units
		radius: f32,
	},
	/// Full geometry from a start to the best of many candidate goals
	PathMulti {
		/// World position of the agent
		start: Vec3,
		/// Acceptance radius around each target in world units
		max_range: f32,
		/// Candidate goal positions
		targets: Vec<Vec3>,
	},
	/// Cost only, no geometry
	PathCost {
		/// World position of the agent
		start: Vec3,
		/// World position of the goal
		end: Vec3,
		/// Acceptance radius around the goal in world units
		radius: f32,
	},
	/// Cost to every reachable cell from a single source
	CostMap {
		/// World position of the source
		start: Vec3,
	},
}

/// Result of a completed query, written exactly once by the worker
#[derive(Clone, Debug)]
pub enum QueryResult {
	/// Geometry and cost, or [None] when no acceptable cell was reachable
	Path(Option<PathInfo>),
	/// Cost alone, or [None] when no acceptable cell was reachable
	Cost(Option<f32>),
	/// Dense path-grid cost array holding [UNREACHABLE] for unreachable cells
	CostMap(Vec<f32>),
}

/// A solved route and its bookkeeping
#[derive(Clone, Debug, Default)]
pub struct PathInfo {
	/// The route as ascending path-grid indices, start cell first
	pub path: Vec<usize>,
	/// Waypoints in world units, refined so the leading straight-line run the
	/// agent can already see is dropped
	pub pos_path: Vec<Vec3>,
	/// Total cost of the route
	pub path_cost: f32,
	/// Index into `path` where simplification begins - cells before it were
	/// dropped from the waypoint list because the agent can walk straight to
	/// `path[start]`
	pub start: usize,
	/// Corrected world position the search started from
	pub start_pos: Vec3,
	/// Whether the route is a single cell, meaning the agent already stands
	/// within the acceptance region
	pub is_last: bool,
}

/// One in-flight or completed request against the engine
///
/// Shared by [Arc] between the caller, the worker and the completion queue.
/// All captured inputs are immutable, the state cell and result slot are the
/// only synchronized parts
pub struct PathQuery {
	/// Engine-unique id in submission order
	id: u64,
	/// What to compute
	kind: QueryKind,
	/// Cost functions bound when the query was built
	model: CostModel,
	/// Passability array pinned when the query was built
	passable: Arc<Vec<bool>>,
	/// Threat ceiling above which cells are impassable for this query
	max_threat: f32,
	/// Lifecycle state, see [QueryState]
	state: AtomicU8,
	/// Result slot written once by the worker
	result: OnceLock<QueryResult>,
}

impl PathQuery {
	/// Create a new instance of [PathQuery] in the [QueryState::Created] state
	pub(crate) fn new(
		id: u64,
		kind: QueryKind,
		model: CostModel,
		passable: Arc<Vec<bool>>,
		max_threat: f32,
	) -> Self {
		PathQuery {
			id,
			kind,
			model,
			passable,
			max_threat,
			state: AtomicU8::new(QueryState::Created as u8),
			result: OnceLock::new(),
		}
	}
	/// Engine-unique id in submission order
	pub fn get_id(&self) -> u64 {
		self.id
	}
	/// What the query asks for
	pub fn get_kind(&self) -> &QueryKind {
		&self.kind
	}
	/// Cost functions bound when the query was built
	pub fn get_model(&self) -> &CostModel {
		&self.model
	}
	/// Passability array pinned when the query was built
	pub fn get_passable(&self) -> &Arc<Vec<bool>> {
		&self.passable
	}
	/// Threat ceiling above which cells are impassable for this query
	pub fn get_max_threat(&self) -> f32 {
		self.max_threat
	}
	/// Current lifecycle state
	pub fn get_state(&self) -> QueryState {
		match self.state.load(Ordering::Acquire) {
			0 => QueryState::Created,
			1 => QueryState::Processing,
			_ => QueryState::Ready,
		}
	}
	/// Worker hook: mark the search as running
	pub(crate) fn mark_processing(&self) {
		self.state
			.store(QueryState::Processing as u8, Ordering::Release);
	}
	/// Worker hook: write the result and flip to [QueryState::Ready]
	pub(crate) fn complete(&self, result: QueryResult) {
		if self.result.set(result).is_err() {
			panic!("Query `{}` completed twice", self.id);
		}
		self.state.store(QueryState::Ready as u8, Ordering::Release);
	}
	/// The result, [None] until the state is [QueryState::Ready]
	pub fn get_result(&self) -> Option<&QueryResult> {
		if self.get_state() == QueryState::Ready {
			self.result.get()
		} else {
			None
		}
	}
	/// Convenience accessor for path-shaped results, valid once ready
	pub fn get_path_info(&self) -> Option<&PathInfo> {
		match self.get_result() {
			Some(QueryResult::Path(info)) => info.as_ref(),
			_ => None,
		}
	}
	/// Convenience accessor for cost-shaped results, valid once ready
	pub fn get_path_cost(&self) -> Option<f32> {
		match self.get_result() {
			Some(QueryResult::Cost(cost)) => *cost,
			Some(QueryResult::Path(Some(info))) => Some(info.path_cost),
			_ => None,
		}
	}
	/// Convenience accessor for cost-map results, valid once ready
	pub fn get_cost_map(&self) -> Option<&[f32]> {
		match self.get_result() {
			Some(QueryResult::CostMap(map)) => Some(map),
			_ => None,
		}
	}
}
