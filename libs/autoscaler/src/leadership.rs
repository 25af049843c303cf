//! Leader gate for the autoscaler.
//!
//! Several replicas of the host process may run the autoscaler; leader
//! election decides which one acts. The election substrate assigns *buckets*
//! of keys and notifies owners through [`LeaderAware`] callbacks. An
//! autoscaler instance is leader iff a bucket it was promoted for contains
//! the sentinel key.

use vfleet_scheduler::NamespacedName;

/// A set of keys assigned by the leader-election substrate.
pub trait Bucket: Send + Sync {
    fn has(&self, key: &NamespacedName) -> bool;
}

/// Callbacks invoked by the leader-election substrate on bucket ownership
/// changes.
pub trait LeaderAware {
    fn promote(&self, bucket: &dyn Bucket) -> anyhow::Result<()>;

    fn demote(&self, bucket: &dyn Bucket);
}

/// The key used to decide whether an autoscaler instance is leader.
///
/// This is an ephemeral key and must be kept stable and unmodified across
/// releases.
pub fn ephemeral_leader_election_key() -> NamespacedName {
    NamespacedName::new("knative-eventing", "autoscaler-ephemeral")
}

/// A fixed-membership [`Bucket`].
pub struct StaticBucket {
    keys: Vec<NamespacedName>,
}

impl StaticBucket {
    pub fn new(keys: impl IntoIterator<Item = NamespacedName>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl Bucket for StaticBucket {
    fn has(&self, key: &NamespacedName) -> bool {
        self.keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_bucket_membership() {
        let bucket = StaticBucket::new([ephemeral_leader_election_key()]);
        assert!(bucket.has(&ephemeral_leader_election_key()));
        assert!(!bucket.has(&NamespacedName::new("tenants", "a")));

        let empty = StaticBucket::new([]);
        assert!(!empty.has(&ephemeral_leader_election_key()));
    }
}
