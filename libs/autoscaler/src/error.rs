//! Error types for autoscale passes.

use thiserror::Error;

/// Errors surfaced by a single autoscale pass.
///
/// None of these is fatal: the pass is retried within its polling budget and
/// otherwise picked up by the next wake.
#[derive(Debug, Error)]
pub enum AutoscalerError {
    /// The state accessor could not materialize a snapshot.
    #[error("scheduler state unavailable: {0}")]
    Snapshot(#[source] anyhow::Error),

    /// Reading the fleet's current scale failed.
    #[error("failed to read fleet scale: {0}")]
    ScaleRead(#[source] anyhow::Error),

    /// Writing the fleet's desired scale failed.
    #[error("failed to update fleet scale: {0}")]
    ScaleWrite(#[source] anyhow::Error),

    /// The vpod inventory could not be listed for compaction.
    #[error("failed to list vpods: {0}")]
    VPodList(#[source] anyhow::Error),

    /// An eviction was rejected; the compaction pass is aborted.
    #[error("vreplica eviction failed: {0}")]
    Eviction(#[source] anyhow::Error),
}
