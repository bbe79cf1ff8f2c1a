//! `use bevy_threatfield_paths_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::pathing::{
	cost::*, finder::*, grid::*, mobility::*, query::*, refine::*, search::*, terrain::*,
	threat::*, *,
};

#[doc(hidden)]
pub use crate::plugin::*;
