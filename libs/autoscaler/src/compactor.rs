//! Tail compaction: evicting placements off the highest-ordinal pods.
//!
//! Compaction runs only on scale-down ticks where the replica count is
//! already right. When the rest of the fleet has room for everything placed
//! on the tail, every tail placement is evicted; the scheduler re-places the
//! vreplicas on lower ordinals and a later tick shrinks the fleet.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error};

use vfleet_scheduler::{
    ordinal_from_pod_name, Evictor, PodInfo, SchedulerPolicyType, State, VPodLister,
};

use crate::error::AutoscalerError;
use crate::retry;

const POD_RESOLVE_INTERVAL: Duration = Duration::from_millis(50);
const POD_RESOLVE_BUDGET: Duration = Duration::from_secs(5);

pub(crate) struct Compactor {
    vpod_lister: Arc<dyn VPodLister>,
    evictor: Arc<dyn Evictor>,

    /// Grace window between compaction attempts.
    refresh_period: Duration,

    /// Most recent compaction attempt. `None` until the first attempt, so
    /// the first eligible tick compacts immediately.
    last_attempt: Mutex<Option<Instant>>,
}

impl Compactor {
    pub(crate) fn new(
        vpod_lister: Arc<dyn VPodLister>,
        evictor: Arc<dyn Evictor>,
        refresh_period: Duration,
    ) -> Self {
        Self {
            vpod_lister,
            evictor,
            refresh_period,
            last_attempt: Mutex::new(None),
        }
    }

    /// Compact the tail if the grace window has passed and the rest of the
    /// fleet can absorb everything placed there.
    ///
    /// The attempt timestamp is recorded before the eviction pass: a failed
    /// pass still consumes the grace window, so an unhealthy evictor is not
    /// hammered every tick.
    pub(crate) async fn may_compact(&self, state: &State, scale_up_factor: i32) {
        let mut last_attempt = self.last_attempt.lock().await;

        if let Some(last) = *last_attempt {
            let next_attempt = last + self.refresh_period;
            let now = Instant::now();
            if now < next_attempt {
                debug!(
                    remaining_ms = (next_attempt - now).as_millis() as u64,
                    "Compaction attempted within grace window, skipping"
                );
                return;
            }
        }

        debug!(scale_up_factor, state = ?state, "Evaluating tail compaction");

        // One pod leaves nowhere to move to; fewer survivors than the HA
        // unit leaves no headroom.
        if state.last_ordinal < 1 || state.schedulable_pods.len() <= scale_up_factor as usize {
            return;
        }

        match state.scheduler_policy {
            SchedulerPolicyType::MaxFillup => {
                // Only the last pod is considered: can the pods below it
                // absorb everything placed on it?
                let free_below = state.free_capacity() - state.free(state.last_ordinal);
                let used_in_last = state.capacity - state.free(state.last_ordinal);

                if free_below >= used_in_last {
                    *last_attempt = Some(Instant::now());
                    if let Err(err) = self.compact(state, scale_up_factor).await {
                        error!(error = %err, "VReplica compaction failed");
                    }
                }
            }
            SchedulerPolicyType::PolicyBased => {
                if state.sched_policy.is_none() {
                    return;
                }

                // The top scale_up_factor pods are considered as one block.
                let mut free_below = state.free_capacity();
                let mut used_in_window = state.capacity * scale_up_factor;
                for j in 0..scale_up_factor {
                    if state.last_ordinal - j < 0 {
                        break;
                    }
                    free_below -= state.free(state.last_ordinal - j);
                    used_in_window -= state.free(state.last_ordinal - j);
                }

                // The survivors must hold all evicted vreplicas and still
                // amount to a full HA unit.
                if free_below >= used_in_window
                    && state.replicas - scale_up_factor >= scale_up_factor
                {
                    *last_attempt = Some(Instant::now());
                    if let Err(err) = self.compact(state, scale_up_factor).await {
                        error!(error = %err, "VReplica compaction failed");
                    }
                }
            }
        }
    }

    /// Evict every placement sitting in the eviction window.
    ///
    /// The first evictor error aborts the pass; the snapshot is never
    /// mutated, so the next tick observes whatever the scheduler re-placed.
    async fn compact(&self, state: &State, scale_up_factor: i32) -> Result<(), AutoscalerError> {
        let vpods = self.vpod_lister.list().map_err(AutoscalerError::VPodList)?;

        for vpod in &vpods {
            let placements = vpod.placements();
            for placement in placements.iter().rev() {
                let ordinal = ordinal_from_pod_name(&placement.pod_name);

                for j in 0..scale_up_factor {
                    if ordinal == state.last_ordinal - j {
                        let pod = self.resolve_pod(state, &placement.pod_name).await;
                        self.evictor
                            .evict(pod.as_ref(), vpod.as_ref(), placement)
                            .await
                            .map_err(AutoscalerError::Eviction)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolve a pod by name, retrying briefly.
    ///
    /// Lookup failure is tolerated: the evictor contract accepts a missing
    /// pod.
    async fn resolve_pod(&self, state: &State, pod_name: &str) -> Option<PodInfo> {
        let lister = state.pod_lister.clone()?;

        let resolved = retry::poll_immediate(POD_RESOLVE_INTERVAL, POD_RESOLVE_BUDGET, || {
            let lister = Arc::clone(&lister);
            async move { lister.get(pod_name) }
        })
        .await;

        match resolved {
            Ok(pod) => Some(pod),
            Err(err) => {
                debug!(pod_name, error = %err, "Pod lookup failed, evicting with unresolved pod");
                None
            }
        }
    }
}
