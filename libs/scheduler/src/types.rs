//! Core scheduler vocabulary: vpods, placements, policies, and the
//! collaborator traits the control loops are wired against.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A namespace-qualified resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A chunk of a vpod's demand assigned to one worker pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Name of the worker pod; the trailing `-<n>` suffix encodes the ordinal.
    pub pod_name: String,

    /// Number of vreplicas placed on that pod.
    pub vreplicas: i32,
}

/// A logical workload owning a set of placements.
pub trait VPod: Send + Sync {
    /// Stable identity of the workload.
    fn key(&self) -> &NamespacedName;

    /// Total vreplicas the workload demands (placed + pending).
    fn vreplicas(&self) -> i32;

    /// Current placements, ordered by ascending ordinal.
    fn placements(&self) -> &[Placement];
}

/// Lists all vpods known to the scheduler.
///
/// Implementations are expected to serve from a local cache, so listing is
/// synchronous and cheap.
pub trait VPodLister: Send + Sync {
    fn list(&self) -> Result<Vec<Arc<dyn VPod>>>;
}

/// Minimal view of a worker pod, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,

    /// Node hosting the pod, when known.
    #[serde(default)]
    pub node_name: Option<String>,

    /// Availability zone of the pod, when known.
    #[serde(default)]
    pub zone: Option<String>,
}

/// Resolves worker pods by name from a local cache.
pub trait PodLister: Send + Sync {
    fn get(&self, name: &str) -> Result<PodInfo>;
}

/// Removes one placement so the scheduler re-places it elsewhere.
///
/// `pod` is `None` when the pod could not be resolved; implementations must
/// tolerate that. Evicting a placement that is already gone is not an error.
#[async_trait]
pub trait Evictor: Send + Sync {
    async fn evict(
        &self,
        pod: Option<&PodInfo>,
        vpod: &dyn VPod,
        placement: &Placement,
    ) -> Result<()>;
}

/// The scalar scale of the worker fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub replicas: i32,
}

/// Reads and writes the desired replica count of the worker fleet.
#[async_trait]
pub trait FleetScaler: Send + Sync {
    async fn get_scale(&self) -> Result<Scale>;

    async fn update_scale(&self, scale: Scale) -> Result<Scale>;
}

/// Reserved placements the caller wants treated as already committed,
/// keyed by vpod, then by pod name.
pub type Reserved = HashMap<NamespacedName, HashMap<String, i32>>;

/// Supplies the reserved placements for a snapshot request.
pub type GetReserved = Arc<dyn Fn() -> Reserved + Send + Sync>;

/// How the scheduler packs vreplicas onto the fleet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPolicyType {
    /// Greedy packing by ascending ordinal.
    #[default]
    #[serde(rename = "MAXFILLUP")]
    MaxFillup,

    /// Spread-aware scheduling under declared predicates and priorities.
    #[serde(rename = "POLICY_BASED")]
    PolicyBased,
}

/// Policy atoms the sizing engine and compactor inspect by name.
///
/// Policies are declared as free-form named atoms; this is the closed set the
/// control loop knows about. Unknown names never match any tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyTag {
    AvailabilityZonePriority,
    AvailabilityNodePriority,
    EvenPodSpread,
}

impl PolicyTag {
    pub fn name(self) -> &'static str {
        match self {
            PolicyTag::AvailabilityZonePriority => "AvailabilityZonePriority",
            PolicyTag::AvailabilityNodePriority => "AvailabilityNodePriority",
            PolicyTag::EvenPodSpread => "EvenPodSpread",
        }
    }
}

/// A named filter a pod must pass to host a vreplica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicatePolicy {
    pub name: String,

    #[serde(default)]
    pub args: Option<String>,
}

/// A named, weighted preference for ranking candidate pods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub name: String,

    pub weight: u64,

    #[serde(default)]
    pub args: Option<String>,
}

/// The declared scheduling policy for `PolicyBased` packing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    #[serde(default)]
    pub predicates: Vec<PredicatePolicy>,

    #[serde(default)]
    pub priorities: Vec<PriorityPolicy>,
}

impl SchedulerPolicy {
    /// Whether a predicate with the tag's name is declared.
    pub fn has_predicate(&self, tag: PolicyTag) -> bool {
        self.predicates.iter().any(|p| p.name == tag.name())
    }

    /// Whether a priority with the tag's name is declared.
    pub fn has_priority(&self, tag: PolicyTag) -> bool {
        self.priorities.iter().any(|p| p.name == tag.name())
    }
}
