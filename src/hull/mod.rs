//! Convex hull subsystem: the append-only point store, the engine
//! abstraction with the in-tree backend, and the per-phase and global
//! lower-hull builders.

mod engine;
mod facet;
mod global;
mod internal;
mod map;

pub use engine::{BeneathBeyond, EngineFacet, HullEngine};
pub use facet::SimplicialFacet;
pub use global::global_lower_convex_hull;
pub use internal::{internal_lower_convex_hull, restore_dependent_dimensions};
pub use map::{HullEntry, HullMap};
