//! The fleet autoscaler control loop.
//!
//! A single long-lived task sizes the worker fleet:
//! - a periodic tick (every `refresh_period`) runs a full pass with
//!   scale-down allowed
//! - a trigger wake runs an immediate pass with scale-down suppressed
//! - every pass runs under one lock; only the leader instance acts
//!
//! The loop is eventually consistent: transient failures are retried within
//! a pass and otherwise picked up by the next wake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info};

use vfleet_scheduler::{Evictor, FleetScaler, GetReserved, Scale, StateAccessor, VPodLister};

use crate::compactor::Compactor;
use crate::config::AutoscalerConfig;
use crate::error::AutoscalerError;
use crate::leadership::{ephemeral_leader_election_key, Bucket, LeaderAware};
use crate::retry;
use crate::sizing;
use crate::trigger::{scale_trigger, ScaleTrigger};

const SYNC_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const SYNC_RETRY_BUDGET: Duration = Duration::from_secs(5);

/// Autoscaler for a sharded stateful worker fleet.
///
/// Wrap in an [`Arc`], spawn [`run`](Self::run) once, and hand
/// [`scale_trigger`](Self::scale_trigger) handles to producers that need an
/// immediate sizing pass.
pub struct FleetAutoscaler {
    stateful_set_namespace: String,
    stateful_set_name: String,
    capacity: i32,
    refresh_period: Duration,

    state_accessor: Arc<dyn StateAccessor>,
    fleet: Arc<dyn FleetScaler>,
    get_reserved: GetReserved,
    compactor: Compactor,

    /// Serialises passes: at most one `sync_autoscale` runs at a time, and
    /// it holds the lock across its remote I/O on purpose. The loop is the
    /// only writer and must not interleave with itself.
    lock: Mutex<()>,

    /// Whether this instance currently owns the leader key.
    is_leader: AtomicBool,

    trigger: ScaleTrigger,
    trigger_rx: Mutex<mpsc::Receiver<()>>,
}

impl FleetAutoscaler {
    pub fn new(
        config: AutoscalerConfig,
        state_accessor: Arc<dyn StateAccessor>,
        fleet: Arc<dyn FleetScaler>,
        vpod_lister: Arc<dyn VPodLister>,
        evictor: Arc<dyn Evictor>,
        get_reserved: GetReserved,
    ) -> Self {
        let (trigger, trigger_rx) = scale_trigger();

        Self {
            stateful_set_namespace: config.stateful_set_namespace,
            stateful_set_name: config.stateful_set_name,
            capacity: config.pod_capacity,
            refresh_period: config.refresh_period,
            state_accessor,
            fleet,
            get_reserved,
            compactor: Compactor::new(vpod_lister, evictor, config.refresh_period),
            lock: Mutex::new(()),
            is_leader: AtomicBool::new(false),
            trigger,
            trigger_rx: Mutex::new(trigger_rx),
        }
    }

    /// Run the control loop until shutdown is signaled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut trigger_rx = match self.trigger_rx.try_lock() {
            Ok(rx) => rx,
            Err(_) => {
                error!("Autoscaler loop is already running");
                return;
            }
        };

        info!(
            namespace = %self.stateful_set_namespace,
            name = %self.stateful_set_name,
            refresh_period_secs = self.refresh_period.as_secs(),
            "Starting fleet autoscaler"
        );

        loop {
            let attempt_scale_down;
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Fleet autoscaler shutting down");
                        return;
                    }
                    continue;
                }
                // The timer is re-armed every wake, so a trigger also resets
                // the scale-down countdown.
                _ = tokio::time::sleep(self.refresh_period) => {
                    attempt_scale_down = true;
                }
                _ = trigger_rx.recv() => {
                    attempt_scale_down = false;
                }
            }

            // Failures were logged per attempt; the next wake self-heals.
            let _ = self.sync_autoscale(attempt_scale_down).await;
        }
    }

    /// Demand an immediate sizing pass (scale-down suppressed).
    ///
    /// Never blocks; bursts coalesce into a single wake.
    pub fn autoscale(&self) {
        self.trigger.post();
    }

    /// Handle for producers that need to demand sizing passes.
    pub fn scale_trigger(&self) -> ScaleTrigger {
        self.trigger.clone()
    }

    /// Whether this instance currently owns the leader key.
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Run one serialised reconciliation, retrying transient failures.
    ///
    /// A pass that eventually succeeds within the polling budget reports
    /// success; only an exhausted budget surfaces the last error.
    pub async fn sync_autoscale(&self, attempt_scale_down: bool) -> Result<(), AutoscalerError> {
        let _pass = self.lock.lock().await;

        retry::poll(SYNC_RETRY_INTERVAL, SYNC_RETRY_BUDGET, || async {
            let result = self.do_autoscale(attempt_scale_down).await;
            if let Err(err) = &result {
                error!(error = %err, "Failed to autoscale");
            }
            result
        })
        .await
    }

    async fn do_autoscale(&self, attempt_scale_down: bool) -> Result<(), AutoscalerError> {
        if !self.is_leader.load(Ordering::SeqCst) {
            return Ok(());
        }

        let reserved = (self.get_reserved)();
        let state = match self.state_accessor.state(&reserved).await {
            Ok(state) => state,
            Err(err) => {
                info!(error = %err, "Scheduler state unavailable, will retry");
                return Err(AutoscalerError::Snapshot(err));
            }
        };

        let scale = match self.fleet.get_scale().await {
            Ok(scale) => scale,
            Err(err) => {
                // Skip a beat; the poller or the next tick picks it up.
                info!(error = %err, "Failed to read fleet scale");
                return Err(AutoscalerError::ScaleRead(err));
            }
        };

        debug!(replicas = scale.replicas, state = ?state, "Checking fleet capacity");

        let scale_up_factor = sizing::scale_up_factor(&state);
        let new_replicas = sizing::desired_replicas(
            &state,
            scale.replicas,
            self.capacity,
            scale_up_factor,
            attempt_scale_down,
        );

        if new_replicas != scale.replicas {
            info!(
                replicas = new_replicas,
                current = scale.replicas,
                "Updating fleet replicas"
            );
            if let Err(err) = self
                .fleet
                .update_scale(Scale {
                    replicas: new_replicas,
                })
                .await
            {
                error!(error = %err, "Updating fleet scale failed");
                return Err(AutoscalerError::ScaleWrite(err));
            }
        } else if attempt_scale_down {
            // The count is already right and time has come to scale down:
            // take the opportunity to compact the tail instead.
            self.compactor.may_compact(&state, scale_up_factor).await;
        }

        Ok(())
    }
}

impl LeaderAware for FleetAutoscaler {
    fn promote(&self, bucket: &dyn Bucket) -> anyhow::Result<()> {
        if bucket.has(&ephemeral_leader_election_key()) {
            // The promoted bucket holds the leader key: start acting.
            self.is_leader.store(true, Ordering::SeqCst);
            debug!("Promoted to autoscaler leader");
        }
        Ok(())
    }

    fn demote(&self, bucket: &dyn Bucket) {
        if bucket.has(&ephemeral_leader_election_key()) {
            self.is_leader.store(false, Ordering::SeqCst);
            debug!("Demoted from autoscaler leader");
        }
    }
}
