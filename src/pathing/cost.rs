//! Pure per-cell cost functions bound to a query when it is built
//!
//! An agent's situational flags select one row of a fixed decision table:
//! which terrain formula prices a cell, which threat layer applies and how
//! heavily threat is weighted against terrain. Each row is an enum variant so
//! every formula is independently testable rather than buried in a branch
//! cascade
//!

use std::sync::Arc;

use crate::prelude::*;

/// One row of the situation decision table
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Situation {
	/// Below the water line without sonar stealth - cloak does not work under
	/// water so the amphibious threat layer applies
	SubmergedExposed,
	/// Cloaked on the surface - only cloak-piercing sources threaten, at
	/// single weight
	Cloaked,
	/// Flying - terrain is free, air threat applies
	Flying,
	/// Amphibious and able to climb walls - cells are priced by how far below
	/// the peak elevation they sit
	AmphibiousSteep,
	/// Amphibious with a normal slope limit
	Amphibious,
	/// Ordinary surface agent
	Surface,
}

impl Situation {
	/// Classify an agent's situational flags against its class's slope limit
	pub fn classify(profile: &AgentProfile, max_slope: f32) -> Situation {
		if profile.is_submerged && !profile.is_sonar_stealth {
			Situation::SubmergedExposed
		} else if profile.is_cloaked {
			Situation::Cloaked
		} else if profile.is_flying() {
			Situation::Flying
		} else if profile.is_amphibious {
			if max_slope > SPIDER_SLOPE {
				Situation::AmphibiousSteep
			} else {
				Situation::Amphibious
			}
		} else {
			Situation::Surface
		}
	}
	/// Which threat layer this situation is exposed to
	pub fn threat_layer(&self) -> ThreatLayer {
		match self {
			Situation::SubmergedExposed => ThreatLayer::Amphibious,
			Situation::Cloaked => ThreatLayer::Cloak,
			Situation::Flying => ThreatLayer::Air,
			Situation::AmphibiousSteep => ThreatLayer::Amphibious,
			Situation::Amphibious => ThreatLayer::Amphibious,
			Situation::Surface => ThreatLayer::Surface,
		}
	}
	/// Weight of threat relative to terrain cost - cloak halves exposure to
	/// the single weight
	pub fn threat_weight(&self) -> f32 {
		match self {
			Situation::Cloaked => 1.0,
			_ => 2.0,
		}
	}
}

/// The terrain half of a cost model, one formula per situation
#[derive(Clone, Copy, Debug)]
pub enum MoveFormula {
	/// `(water ? 4 : 0) + 2 * slope / max_slope`
	SlopeAndWater {
		/// Slope limit of the agent's class
		max_slope: f32,
	},
	/// `slope / max_slope`
	SlopeOnly {
		/// Slope limit of the agent's class
		max_slope: f32,
	},
	/// Terrain costs nothing
	Free,
	/// `2 * (1 - (max_elevation - min_elevation) / elevation_span) + (water ? 4 : 0)`
	Elevation {
		/// Lowest elevation anywhere on the map
		min_elevation: f32,
		/// Grid-wide elevation span, floored so normalization never divides
		/// by zero
		elevation_span: f32,
	},
	/// `water ? 0 : 2 * slope / max_slope`
	SurfaceSlope {
		/// Slope limit of the agent's class
		max_slope: f32,
	},
}

impl MoveFormula {
	/// Price one cell's attributes
	pub fn cost(&self, sector: &TerrainSector) -> f32 {
		match self {
			MoveFormula::SlopeAndWater { max_slope } => {
				(if sector.is_water { 4.0 } else { 0.0 }) + 2.0 * sector.max_slope / max_slope
			}
			MoveFormula::SlopeOnly { max_slope } => sector.max_slope / max_slope,
			MoveFormula::Free => 0.0,
			MoveFormula::Elevation {
				min_elevation,
				elevation_span,
			} => {
				2.0 * (1.0 - (sector.max_elevation - min_elevation) / elevation_span)
					+ (if sector.is_water { 4.0 } else { 0.0 })
			}
			MoveFormula::SurfaceSlope { max_slope } => {
				if sector.is_water {
					0.0
				} else {
					2.0 * sector.max_slope / max_slope
				}
			}
		}
	}
}

/// The pair of pure per-cell functions a query binds at build time: a
/// terrain-only cost and a combined terrain plus weighted threat cost
#[derive(Clone, Debug)]
pub struct CostModel {
	/// Static attributes the terrain formula reads
	area: Arc<AreaData>,
	/// The pinned threat layer for the agent's situation
	threat: ThreatSnapshot,
	/// Terrain formula row of the decision table
	formula: MoveFormula,
	/// Threat weight row of the decision table
	threat_weight: f32,
	/// Which situation the agent was classified into
	situation: Situation,
}

impl CostModel {
	/// Build the cost model for an agent by classifying its situation and
	/// pinning the matching threat layer
	pub fn new(area: Arc<AreaData>, threat_field: &ThreatField, profile: &AgentProfile) -> Self {
		let max_slope = match profile.mobile_type {
			None => 1.0,
			Some(id) => area.get_mobile_type(id).get_max_slope(),
		};
		let situation = Situation::classify(profile, max_slope);
		let formula = match situation {
			Situation::SubmergedExposed | Situation::Amphibious => {
				MoveFormula::SlopeAndWater { max_slope }
			}
			Situation::Cloaked => MoveFormula::SlopeOnly { max_slope },
			Situation::Flying => MoveFormula::Free,
			Situation::AmphibiousSteep => MoveFormula::Elevation {
				min_elevation: area.get_min_elevation(),
				elevation_span: (area.get_max_elevation() - area.get_min_elevation()).max(1e-3),
			},
			Situation::Surface => MoveFormula::SurfaceSlope { max_slope },
		};
		let threat = threat_field.snapshot(situation.threat_layer());
		CostModel {
			area,
			threat,
			formula,
			threat_weight: situation.threat_weight(),
			situation,
		}
	}
	/// Which situation the agent was classified into
	pub fn get_situation(&self) -> Situation {
		self.situation
	}
	/// Terrain-only cost of a path cell
	pub fn move_cost(&self, path_index: usize) -> f32 {
		self.formula.cost(&self.area.get_sectors()[path_index])
	}
	/// Terrain plus weighted threat cost of a path cell
	pub fn move_threat_cost(&self, path_index: usize) -> f32 {
		self.move_cost(path_index) + self.threat_weight * self.threat.get(path_index)
	}
	/// Raw threat at a path cell from the pinned layer
	pub fn threat_at(&self, path_index: usize) -> f32 {
		self.threat.get(path_index)
	}
}
