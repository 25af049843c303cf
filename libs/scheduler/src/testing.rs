//! Mock collaborators for exercising control loops without a cluster.
//!
//! Mirrors the contracts in this crate with in-memory implementations that
//! record what was asked of them and can inject transient failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::state::{State, StateAccessor};
use crate::types::{
    Evictor, FleetScaler, GetReserved, NamespacedName, Placement, PodInfo, PodLister, Reserved,
    Scale, VPod, VPodLister,
};

/// A `GetReserved` that always reports no reserved placements.
pub fn empty_reserved() -> GetReserved {
    Arc::new(Reserved::new)
}

/// State accessor serving a pre-built snapshot.
pub struct FixedStateAccessor {
    state: Mutex<State>,
    calls: AtomicU32,
    failures: AtomicI32,
}

impl FixedStateAccessor {
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
            calls: AtomicU32::new(0),
            failures: AtomicI32::new(0),
        }
    }

    /// Replace the served snapshot.
    pub fn set_state(&self, state: State) {
        *self.state.lock().unwrap() = state;
    }

    /// Fail the next `n` snapshot requests.
    pub fn fail_times(&self, n: i32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Number of snapshot requests served or failed.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateAccessor for FixedStateAccessor {
    async fn state(&self, _reserved: &Reserved) -> Result<State> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
            bail!("state accessor unavailable (injected)");
        }
        self.failures.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().clone())
    }
}

/// Fleet scaler backed by an in-memory replica counter.
pub struct InMemoryFleet {
    replicas: AtomicI32,
    updates: Mutex<Vec<i32>>,
    reads: AtomicU32,
    write_failures: AtomicI32,
}

impl InMemoryFleet {
    pub fn new(replicas: i32) -> Self {
        Self {
            replicas: AtomicI32::new(replicas),
            updates: Mutex::new(Vec::new()),
            reads: AtomicU32::new(0),
            write_failures: AtomicI32::new(0),
        }
    }

    /// Fail the next `n` scale updates.
    pub fn fail_writes(&self, n: i32) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    pub fn replicas(&self) -> i32 {
        self.replicas.load(Ordering::SeqCst)
    }

    /// Replica counts written through `update_scale`, in order.
    pub fn updates(&self) -> Vec<i32> {
        self.updates.lock().unwrap().clone()
    }

    /// Number of `get_scale` calls served.
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FleetScaler for InMemoryFleet {
    async fn get_scale(&self) -> Result<Scale> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Scale {
            replicas: self.replicas.load(Ordering::SeqCst),
        })
    }

    async fn update_scale(&self, scale: Scale) -> Result<Scale> {
        if self.write_failures.fetch_sub(1, Ordering::SeqCst) > 0 {
            bail!("scale update rejected (injected)");
        }
        self.write_failures.fetch_add(1, Ordering::SeqCst);

        debug!(replicas = scale.replicas, "[MOCK] Updating fleet scale");
        self.replicas.store(scale.replicas, Ordering::SeqCst);
        self.updates.lock().unwrap().push(scale.replicas);
        Ok(scale)
    }
}

/// One recorded eviction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionRecord {
    pub vpod: NamespacedName,
    pub vpod_vreplicas: i32,
    pub pod_name: String,
    pub vreplicas: i32,
    pub pod_resolved: bool,
}

/// Evictor that records every request it receives.
#[derive(Default)]
pub struct RecordingEvictor {
    evictions: Mutex<Vec<EvictionRecord>>,
    attempts: AtomicU32,
    failures: AtomicI32,
}

impl RecordingEvictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` eviction requests.
    pub fn fail_times(&self, n: i32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Successfully recorded evictions.
    pub fn evictions(&self) -> Vec<EvictionRecord> {
        self.evictions.lock().unwrap().clone()
    }

    /// Eviction requests received, including rejected ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evictor for RecordingEvictor {
    async fn evict(
        &self,
        pod: Option<&PodInfo>,
        vpod: &dyn VPod,
        placement: &Placement,
    ) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
            bail!("eviction rejected (injected)");
        }
        self.failures.fetch_add(1, Ordering::SeqCst);

        debug!(
            vpod = %vpod.key(),
            pod_name = %placement.pod_name,
            vreplicas = placement.vreplicas,
            "[MOCK] Evicting placement"
        );
        self.evictions.lock().unwrap().push(EvictionRecord {
            vpod: vpod.key().clone(),
            vpod_vreplicas: vpod.vreplicas(),
            pod_name: placement.pod_name.clone(),
            vreplicas: placement.vreplicas,
            pod_resolved: pod.is_some(),
        });
        Ok(())
    }
}

/// A vpod with fixed demand and placements.
pub struct StaticVPod {
    key: NamespacedName,
    vreplicas: i32,
    placements: Vec<Placement>,
}

impl StaticVPod {
    pub fn new(key: NamespacedName, vreplicas: i32, placements: Vec<Placement>) -> Self {
        Self {
            key,
            vreplicas,
            placements,
        }
    }
}

impl VPod for StaticVPod {
    fn key(&self) -> &NamespacedName {
        &self.key
    }

    fn vreplicas(&self) -> i32 {
        self.vreplicas
    }

    fn placements(&self) -> &[Placement] {
        &self.placements
    }
}

/// Lister serving a fixed set of vpods.
#[derive(Default)]
pub struct StaticVPodLister {
    vpods: Mutex<Vec<Arc<dyn VPod>>>,
}

impl StaticVPodLister {
    pub fn new(vpods: Vec<Arc<dyn VPod>>) -> Self {
        Self {
            vpods: Mutex::new(vpods),
        }
    }
}

impl VPodLister for StaticVPodLister {
    fn list(&self) -> Result<Vec<Arc<dyn VPod>>> {
        Ok(self.vpods.lock().unwrap().clone())
    }
}

/// Pod lister serving a fixed name → pod map.
#[derive(Default)]
pub struct StaticPodLister {
    pods: Mutex<HashMap<String, PodInfo>>,
}

impl StaticPodLister {
    pub fn new(pods: impl IntoIterator<Item = PodInfo>) -> Self {
        Self {
            pods: Mutex::new(pods.into_iter().map(|p| (p.name.clone(), p)).collect()),
        }
    }
}

impl PodLister for StaticPodLister {
    fn get(&self, name: &str) -> Result<PodInfo> {
        match self.pods.lock().unwrap().get(name) {
            Some(pod) => Ok(pod.clone()),
            None => bail!("pod not found: {name}"),
        }
    }
}
