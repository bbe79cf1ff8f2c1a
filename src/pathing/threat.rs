//! Read-only views of the danger field maintained by the threat collaborator
//!
//! Four parallel scalar arrays cover the path grid, one per kind of exposure.
//! The engine never mutates them - a query pins the array it needs at build
//! time so a threat rebuild published mid-flight cannot change what the query
//! reads
//!

use std::sync::Arc;

/// Which of the four parallel threat arrays a cost model reads
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ThreatLayer {
	/// Danger to flying agents
	Air,
	/// Danger to surface agents
	Surface,
	/// Danger to submerged and seafloor agents
	Amphibious,
	/// Danger from sources that can see through cloak
	Cloak,
}

/// The danger field over the path grid, owned and rewritten by an external
/// subsystem on its own schedule
#[derive(Clone, Debug)]
pub struct ThreatField {
	/// Danger to flying agents per path cell
	air: Arc<Vec<f32>>,
	/// Danger to surface agents per path cell
	surface: Arc<Vec<f32>>,
	/// Danger to submerged and seafloor agents per path cell
	amphibious: Arc<Vec<f32>>,
	/// Danger from cloak-piercing sources per path cell
	cloak: Arc<Vec<f32>>,
}

impl ThreatField {
	/// Create a new instance of [ThreatField] with zero threat everywhere
	pub fn new(path_len: usize) -> Self {
		ThreatField {
			air: Arc::new(vec![0.0; path_len]),
			surface: Arc::new(vec![0.0; path_len]),
			amphibious: Arc::new(vec![0.0; path_len]),
			cloak: Arc::new(vec![0.0; path_len]),
		}
	}
	/// Get one of the arrays
	fn layer(&self, layer: ThreatLayer) -> &Arc<Vec<f32>> {
		match layer {
			ThreatLayer::Air => &self.air,
			ThreatLayer::Surface => &self.surface,
			ThreatLayer::Amphibious => &self.amphibious,
			ThreatLayer::Cloak => &self.cloak,
		}
	}
	/// Overwrite one threat value. Copy-on-write: snapshots pinned by queries
	/// keep reading the values they captured
	pub fn set_threat(&mut self, layer: ThreatLayer, index: usize, value: f32) {
		let array = match layer {
			ThreatLayer::Air => &mut self.air,
			ThreatLayer::Surface => &mut self.surface,
			ThreatLayer::Amphibious => &mut self.amphibious,
			ThreatLayer::Cloak => &mut self.cloak,
		};
		Arc::make_mut(array)[index] = value;
	}
	/// Read one threat value
	pub fn get_threat(&self, layer: ThreatLayer, index: usize) -> f32 {
		self.layer(layer)[index]
	}
	/// Pin the current contents of one layer for the lifetime of a query
	pub fn snapshot(&self, layer: ThreatLayer) -> ThreatSnapshot {
		ThreatSnapshot {
			layer,
			values: Arc::clone(self.layer(layer)),
		}
	}
}

/// An immutable pin of one threat layer taken when a query was built
#[derive(Clone, Debug)]
pub struct ThreatSnapshot {
	/// Which layer was pinned
	layer: ThreatLayer,
	/// The pinned values over the path grid
	values: Arc<Vec<f32>>,
}

impl ThreatSnapshot {
	/// Which layer was pinned
	pub fn get_layer(&self) -> ThreatLayer {
		self.layer
	}
	/// Threat at a path cell
	pub fn get(&self, index: usize) -> f32 {
		self.values[index]
	}
	/// The pinned values over the path grid
	pub fn values(&self) -> &[f32] {
		&self.values
	}
}
