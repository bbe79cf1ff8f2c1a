//! Threat-aware pathfinding over a coarse grid.
//!
//! A map is covered by two aligned grids. The `path` grid carries per-cell
//! attributes (slope, water, elevation, threat) and the `move` grid wraps it
//! in a permanently blocked 1-cell border so a search can never step off the
//! map. Terrain and danger are owned by outside collaborators and flow in as
//! snapshots: per-class passability arrives double-buffered through
//! [terrain::MoveData], danger as four parallel scalar arrays in
//! [threat::ThreatField].
//!
//! A query captures everything it needs the moment it is built - a cost
//! model classified from the agent's situation, a pinned passability array
//! and a pinned threat layer - so rebuilds published while it waits cannot
//! change what it computes. Solves run on the compute task pool against a
//! single mutex-held [search::SearchContext], results are refined into
//! waypoints and completion callbacks fire in submission order:
//!
//! ```text
//!  terrain collaborator          threat collaborator
//!          |                            |
//!      AreaData --> MoveData        ThreatField
//!          |            \              /
//!          |           PathQuery (pinned inputs)
//!          |                  |
//!      BlockingMap      SearchContext --> refine --> PathInfo
//! ```
//!
//! Definitions:
//!
//! * Path cell - one square of the attribute grid, `square_size` world units
//!   along an edge
//! * Move cell - one square of the bordered passability grid
//! * Situation - the classification of an agent (submerged, cloaked, flying,
//!   spider-like, amphibious, surface) that selects its cost formulas and
//!   threat layer
//! * Query - an immutable request solved in the background, readable once
//!   its state turns ready
//!

pub mod cost;
pub mod finder;
pub mod grid;
pub mod mobility;
pub mod query;
pub mod refine;
pub mod search;
pub mod terrain;
pub mod threat;
