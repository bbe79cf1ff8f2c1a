//! Mobility classes shared by groups of agents and the situational flags of
//! an individual agent that select its cost formulas
//!

use bevy::prelude::*;

/// Maximum traversable slope above which an amphibious agent is treated as
/// spider-like, able to climb walls, and costed by elevation rather than
/// slope ratio
pub const SPIDER_SLOPE: f32 = 0.99;

/// Identifies a class of agents that share passability rules, used to select
/// the right passability array out of move data
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct MobileTypeId(usize);

impl MobileTypeId {
	/// Create a new instance of [MobileTypeId]
	pub fn new(id: usize) -> Self {
		MobileTypeId(id)
	}
	/// Get the raw index of the class
	pub fn get(&self) -> usize {
		self.0
	}
}

/// Descriptor of one mobility class, a row of the small fixed table supplied
/// by the terrain collaborator
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Reflect)]
pub struct MobileType {
	/// ID used to pick this class's passability array
	id: MobileTypeId,
	/// Steepest slope a member of the class can traverse
	max_slope: f32,
}

impl MobileType {
	/// Create a new instance of [MobileType]
	pub fn new(id: MobileTypeId, max_slope: f32) -> Self {
		MobileType { id, max_slope }
	}
	/// Get the class id
	pub fn get_id(&self) -> MobileTypeId {
		self.id
	}
	/// Steepest traversable slope, floored to a small positive value so that
	/// slope-ratio costs never divide by zero
	pub fn get_max_slope(&self) -> f32 {
		self.max_slope.max(1e-3)
	}
}

/// Situational state of a single agent at the moment a query is built,
/// captured from the unit collaborator. Together with the mobility class this
/// drives the cost-formula decision table
#[derive(Clone, Copy, Debug, Default)]
pub struct AgentProfile {
	/// Mobility class of the agent, [None] for flying agents which have no
	/// terrain constraint and use the always-passable interior array
	pub mobile_type: Option<MobileTypeId>,
	/// Whether the agent is currently below the water line
	pub is_submerged: bool,
	/// Whether the agent is hidden from sonar while submerged
	pub is_sonar_stealth: bool,
	/// Whether the agent is cloaked (cloak does not work under water)
	pub is_cloaked: bool,
	/// Whether the agent can traverse both land and seafloor
	pub is_amphibious: bool,
}

impl AgentProfile {
	/// Create a profile for a surface-bound agent of the given class
	pub fn surface(mobile_type: MobileTypeId) -> Self {
		AgentProfile {
			mobile_type: Some(mobile_type),
			..Default::default()
		}
	}
	/// Create a profile for a flying agent
	pub fn flying() -> Self {
		AgentProfile::default()
	}
	/// Whether the agent flies
	pub fn is_flying(&self) -> bool {
		self.mobile_type.is_none()
	}
}
