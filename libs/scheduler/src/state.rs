//! Scheduler state snapshots.
//!
//! A [`State`] is a consistent, point-in-time view of the fleet and its
//! placements, materialized by a [`StateAccessor`]. The control loops read
//! snapshots and act through collaborators; they never mutate one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{NamespacedName, PodLister, Reserved, SchedulerPolicy, SchedulerPolicyType};

/// A consistent view of the fleet and its placements.
///
/// `free_cap` is indexed by ordinal and covers `0..=last_ordinal`;
/// `schedulable_pods` holds the ordinals of pods the scheduler may place on.
/// Invariant: `last_ordinal < replicas` whenever the snapshot is internally
/// consistent.
#[derive(Clone)]
pub struct State {
    /// Current replica count of the worker fleet.
    pub replicas: i32,

    /// Highest ordinal holding any placement, `-1` when none.
    pub last_ordinal: i32,

    /// VReplica capacity of each pod.
    pub capacity: i32,

    /// Remaining capacity per ordinal, `0..=last_ordinal`.
    pub free_cap: Vec<i32>,

    /// Ordinals of pods the scheduler may place vreplicas on.
    pub schedulable_pods: Vec<i32>,

    /// Distinct availability zones backing the schedulable pods.
    pub num_zones: i32,

    /// Distinct nodes backing the schedulable pods.
    pub num_nodes: i32,

    /// Requested-but-unplaced vreplicas per vpod.
    pub pending: HashMap<NamespacedName, i32>,

    /// Requested vreplicas (placed + pending) per vpod.
    pub expected: HashMap<NamespacedName, i32>,

    /// How the scheduler packs vreplicas.
    pub scheduler_policy: SchedulerPolicyType,

    /// Declared policy atoms, when `PolicyBased`.
    pub sched_policy: Option<SchedulerPolicy>,

    /// Pod resolution for eviction, when available.
    pub pod_lister: Option<Arc<dyn PodLister>>,
}

impl State {
    /// Remaining capacity on pod `ordinal`; `0` outside the tracked range.
    pub fn free(&self, ordinal: i32) -> i32 {
        if ordinal < 0 {
            return 0;
        }
        self.free_cap.get(ordinal as usize).copied().unwrap_or(0)
    }

    /// Total remaining capacity across all schedulable pods.
    pub fn free_capacity(&self) -> i32 {
        self.schedulable_pods.iter().map(|&o| self.free(o)).sum()
    }

    /// Aggregate requested-but-unplaced vreplicas.
    pub fn total_pending(&self) -> i32 {
        self.pending.values().sum()
    }

    /// Aggregate requested vreplicas, placed and pending.
    pub fn total_expected_vreplicas(&self) -> i32 {
        self.expected.values().sum()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("replicas", &self.replicas)
            .field("last_ordinal", &self.last_ordinal)
            .field("capacity", &self.capacity)
            .field("free_cap", &self.free_cap)
            .field("schedulable_pods", &self.schedulable_pods)
            .field("num_zones", &self.num_zones)
            .field("num_nodes", &self.num_nodes)
            .field("pending", &self.total_pending())
            .field("expected", &self.total_expected_vreplicas())
            .field("scheduler_policy", &self.scheduler_policy)
            .field("sched_policy", &self.sched_policy)
            .field("pod_lister", &self.pod_lister.is_some())
            .finish()
    }
}

/// Materializes a consistent [`State`] snapshot.
///
/// `reserved` placements are treated as already committed when computing
/// free capacity and pending demand.
#[async_trait]
pub trait StateAccessor: Send + Sync {
    async fn state(&self, reserved: &Reserved) -> Result<State>;
}

/// Decodes the ordinal from a worker pod name.
///
/// Pod names carry the ordinal as a trailing `-<n>` suffix. Returns `-1`
/// for names that do not follow that shape.
pub fn ordinal_from_pod_name(pod_name: &str) -> i32 {
    pod_name
        .rsplit_once('-')
        .and_then(|(_, suffix)| suffix.parse::<i32>().ok())
        .unwrap_or(-1)
}

/// Builds the worker pod name for an ordinal.
pub fn pod_name_from_ordinal(stateful_set_name: &str, ordinal: i32) -> String {
    format!("{stateful_set_name}-{ordinal}")
}
