//! Defines the Bevy [Plugin] for threat-aware pathfinding
//!

use crate::prelude::*;
use bevy::prelude::*;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum OrderingSet {
	/// Settle owed move-data rebuilds before anything reads passability
	Rebuild,
	/// Fire callbacks for queries whose turn has come
	Deliver,
}

pub struct ThreatPathsPlugin;

impl Plugin for ThreatPathsPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<MapGrid>()
			.register_type::<MobileTypeId>()
			.register_type::<MobileType>()
			.register_type::<TerrainSector>()
			.configure_sets(Update, (OrderingSet::Rebuild, OrderingSet::Deliver).chain())
			.add_systems(
				Update,
				(
					rebuild_stale_area.in_set(OrderingSet::Rebuild),
					deliver_path_completions.in_set(OrderingSet::Deliver),
				),
			);
	}
}

/// Run the owed move-data rebuild when structures changed and a
/// [BlockingMap] resource is available to rebuild from
pub fn rebuild_stale_area(
	finder: Option<ResMut<PathFinder>>,
	blocking: Option<Res<BlockingMap>>,
) {
	let (Some(mut finder), Some(blocking)) = (finder, blocking) else {
		return;
	};
	if finder.is_rebuild_owed() {
		finder.rebuild_if_stale(&blocking);
	}
}

/// Drain the contiguous ready prefix of the submission queue, firing each
/// query's callback on the main schedule in submission order
pub fn deliver_path_completions(finder: Option<ResMut<PathFinder>>) {
	let Some(mut finder) = finder else {
		return;
	};
	let delivered = finder.deliver_completions();
	if delivered > 0 {
		debug!("Delivered {} completed path queries", delivered);
	}
}
