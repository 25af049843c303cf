//! # vfleet-autoscaler
//!
//! Sizing and compaction control loop for the vfleet worker fleet.
//!
//! The autoscaler reconciles three independently moving inputs (observed
//! fleet state, scheduling policy, and pending demand) into one scalar, the
//! desired replica count. When the fleet is quiescent it compacts placements
//! off the highest-ordinal pods so those pods can be retired on a later tick.
//!
//! ## Invariants
//!
//! - Only the leader instance acts; followers no-op
//! - At most one pass runs at a time (single-writer discipline)
//! - Scale-up may happen on any wake; scale-down only on timer ticks
//! - Two compaction attempts are separated by at least the refresh period

mod autoscaler;
mod compactor;
mod config;
mod error;
mod leadership;
mod retry;
mod sizing;
mod trigger;

pub use autoscaler::FleetAutoscaler;
pub use config::AutoscalerConfig;
pub use error::AutoscalerError;
pub use leadership::{ephemeral_leader_election_key, Bucket, LeaderAware, StaticBucket};
pub use trigger::ScaleTrigger;
