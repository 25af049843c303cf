//! # vfleet-scheduler
//!
//! Domain types and collaborator interfaces for the vfleet scheduler.
//!
//! A *vpod* is a logical workload demanding a number of *vreplicas*, each
//! occupying one capacity slot on a worker pod. Worker pods form an ordered,
//! contiguous fleet indexed by ordinal `0..N-1`.
//!
//! ## Design Principles
//!
//! - Placement and eviction mechanics live behind traits; this crate only
//!   defines the contracts and the shared vocabulary
//! - Snapshots are immutable once materialized; consumers never mutate them
//! - Policy atoms are identified by name; unknown names are inert rather
//!   than errors

mod state;
mod types;

pub mod testing;

pub use state::*;
pub use types::*;
