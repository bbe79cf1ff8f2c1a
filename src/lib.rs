//! This is a plugin for Bevy game engine providing threat-aware grid pathfinding with asynchronous query execution
//!

pub mod pathing;
pub mod plugin;

pub mod prelude;
