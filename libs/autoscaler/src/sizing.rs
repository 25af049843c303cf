//! Sizing engine: turns a snapshot into a desired replica count.
//!
//! All arithmetic is deliberately i32 with float ceil-and-cast division,
//! matching the fleet API's replica scalar.

use vfleet_scheduler::{PolicyTag, SchedulerPolicyType, State};

/// The HA granularity in which the fleet grows and shrinks.
///
/// `1` unless the policy spreads across zones or nodes; zone spread dominates
/// node spread when both are declared.
pub(crate) fn scale_up_factor(state: &State) -> i32 {
    let Some(policy) = &state.sched_policy else {
        return 1;
    };

    if policy.has_priority(PolicyTag::AvailabilityZonePriority) {
        state.num_zones
    } else if policy.has_priority(PolicyTag::AvailabilityNodePriority) {
        state.num_nodes
    } else {
        1
    }
}

/// Desired replica count for the fleet.
///
/// Scale-up always proceeds; scale-down is suppressed unless
/// `attempt_scale_down` is set (timer ticks only).
pub(crate) fn desired_replicas(
    state: &State,
    current: i32,
    capacity: i32,
    scale_up_factor: i32,
    attempt_scale_down: bool,
) -> i32 {
    // Smallest count covering all current placements.
    let mut new_replicas = state.last_ordinal + 1;

    match state.scheduler_policy {
        SchedulerPolicyType::MaxFillup => {
            new_replicas = ceil_div(state.total_expected_vreplicas(), state.capacity);
        }
        SchedulerPolicyType::PolicyBased => {
            let pending = state.total_pending();
            if pending > 0 {
                // Allocate enough pods to hold all pending vreplicas. Under
                // even pod spread the scheduler fills every pod no faster
                // than its emptiest, so size by the least non-zero free
                // capacity.
                let even_spread = state
                    .sched_policy
                    .as_ref()
                    .is_some_and(|p| p.has_predicate(PolicyTag::EvenPodSpread));
                let per_pod = if even_spread && !state.free_cap.is_empty() {
                    min_non_zero(&state.free_cap, capacity)
                } else {
                    capacity
                };

                let min_num_pods = ceil_div(pending, per_pod);
                // Round up to a multiple of the HA unit.
                new_replicas += ceil_div(min_num_pods, scale_up_factor) * scale_up_factor;
            }

            if new_replicas <= state.last_ordinal {
                // Never scale down past the last occupied ordinal.
                new_replicas = state.last_ordinal + scale_up_factor;
            }
        }
    }

    if !attempt_scale_down && new_replicas < current {
        new_replicas = current;
    }

    new_replicas
}

fn ceil_div(numerator: i32, denominator: i32) -> i32 {
    (f64::from(numerator) / f64::from(denominator)).ceil() as i32
}

/// Least strictly-positive element, falling back to `capacity` when none.
fn min_non_zero(free_cap: &[i32], capacity: i32) -> i32 {
    let mut min = capacity;
    for &free in free_cap {
        if free > 0 && free < min {
            min = free;
        }
    }
    min
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vfleet_scheduler::{
        NamespacedName, PredicatePolicy, PriorityPolicy, SchedulerPolicy, SchedulerPolicyType,
        State,
    };

    use super::*;

    fn base_state() -> State {
        State {
            replicas: 1,
            last_ordinal: 0,
            capacity: 10,
            free_cap: vec![10],
            schedulable_pods: vec![0],
            num_zones: 1,
            num_nodes: 1,
            pending: HashMap::new(),
            expected: HashMap::new(),
            scheduler_policy: SchedulerPolicyType::MaxFillup,
            sched_policy: None,
            pod_lister: None,
        }
    }

    fn priority(name: &str) -> PriorityPolicy {
        PriorityPolicy {
            name: name.to_string(),
            weight: 10,
            args: None,
        }
    }

    fn predicate(name: &str) -> PredicatePolicy {
        PredicatePolicy {
            name: name.to_string(),
            args: None,
        }
    }

    fn pending(count: i32) -> HashMap<NamespacedName, i32> {
        HashMap::from([(NamespacedName::new("tenants", "a"), count)])
    }

    #[test]
    fn test_scale_up_factor_defaults_to_one() {
        let mut state = base_state();
        state.num_zones = 3;
        state.num_nodes = 5;
        assert_eq!(scale_up_factor(&state), 1);

        state.sched_policy = Some(SchedulerPolicy::default());
        assert_eq!(scale_up_factor(&state), 1);
    }

    #[test]
    fn test_scale_up_factor_zone_spread() {
        let mut state = base_state();
        state.num_zones = 3;
        state.num_nodes = 5;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![],
            priorities: vec![priority("AvailabilityZonePriority")],
        });
        assert_eq!(scale_up_factor(&state), 3);
    }

    #[test]
    fn test_scale_up_factor_node_spread() {
        let mut state = base_state();
        state.num_zones = 3;
        state.num_nodes = 5;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![],
            priorities: vec![priority("AvailabilityNodePriority")],
        });
        assert_eq!(scale_up_factor(&state), 5);
    }

    #[test]
    fn test_scale_up_factor_zone_dominates_node() {
        let mut state = base_state();
        state.num_zones = 3;
        state.num_nodes = 5;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![],
            priorities: vec![
                priority("AvailabilityNodePriority"),
                priority("AvailabilityZonePriority"),
            ],
        });
        assert_eq!(scale_up_factor(&state), 3);
    }

    #[test]
    fn test_maxfillup_grows_to_cover_expected() {
        let mut state = base_state();
        state.replicas = 2;
        state.last_ordinal = 1;
        state.free_cap = vec![0, 5];
        state.schedulable_pods = vec![0, 1];
        state.expected = HashMap::from([(NamespacedName::new("tenants", "a"), 35)]);

        // ceil(35 / 10) = 4.
        assert_eq!(desired_replicas(&state, 2, 10, 1, true), 4);
    }

    #[test]
    fn test_maxfillup_scales_to_zero_when_idle() {
        let mut state = base_state();
        state.last_ordinal = -1;
        state.free_cap = vec![];
        assert_eq!(desired_replicas(&state, 1, 10, 1, true), 0);
    }

    #[test]
    fn test_maxfillup_scale_down_needs_permission() {
        let mut state = base_state();
        state.replicas = 4;
        state.expected = HashMap::from([(NamespacedName::new("tenants", "a"), 12)]);

        assert_eq!(desired_replicas(&state, 4, 10, 1, false), 4);
        assert_eq!(desired_replicas(&state, 4, 10, 1, true), 2);
    }

    #[test]
    fn test_policy_based_covers_last_ordinal_without_pending() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.sched_policy = Some(SchedulerPolicy::default());
        state.last_ordinal = 4;
        state.replicas = 7;

        // No pending demand: the ideal count is last_ordinal + 1.
        assert_eq!(desired_replicas(&state, 7, 10, 1, true), 5);
    }

    #[test]
    fn test_policy_based_zone_ha_rounding() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.num_zones = 3;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![],
            priorities: vec![priority("AvailabilityZonePriority")],
        });
        state.last_ordinal = 2;
        state.replicas = 3;
        state.free_cap = vec![0, 0, 0];
        state.schedulable_pods = vec![0, 1, 2];
        state.pending = pending(7);

        // min_num_pods = ceil(7/10) = 1, rounded up to one zone unit of 3:
        // 3 + 3 = 6.
        assert_eq!(desired_replicas(&state, 3, 10, 3, true), 6);
    }

    #[test]
    fn test_policy_based_ha_growth_is_factor_aligned() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.num_zones = 3;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![],
            priorities: vec![priority("AvailabilityZonePriority")],
        });
        state.last_ordinal = 5;
        state.replicas = 6;
        state.pending = pending(41);

        // min_num_pods = ceil(41/10) = 5, rounded up to 6 (two zone units).
        let desired = desired_replicas(&state, 6, 10, 3, true);
        assert_eq!(desired, 12);
        assert_eq!((desired - (state.last_ordinal + 1)) % 3, 0);
    }

    #[test]
    fn test_even_pod_spread_sizes_by_least_free() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![predicate("EvenPodSpread")],
            priorities: vec![],
        });
        state.last_ordinal = 2;
        state.replicas = 3;
        state.free_cap = vec![0, 2, 5];
        state.schedulable_pods = vec![0, 1, 2];
        state.pending = pending(6);

        // per_pod = min non-zero of [0, 2, 5] = 2; ceil(6/2) = 3 more pods.
        assert_eq!(desired_replicas(&state, 3, 10, 1, true), 6);
    }

    #[test]
    fn test_even_pod_spread_all_full_falls_back_to_capacity() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.sched_policy = Some(SchedulerPolicy {
            predicates: vec![predicate("EvenPodSpread")],
            priorities: vec![],
        });
        state.last_ordinal = 1;
        state.replicas = 2;
        state.free_cap = vec![0, 0];
        state.schedulable_pods = vec![0, 1];
        state.pending = pending(25);

        // Every tracked pod is full: size by capacity, ceil(25/10) = 3.
        assert_eq!(desired_replicas(&state, 2, 10, 1, true), 5);
    }

    #[test]
    fn test_trigger_wake_suppresses_scale_down() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.sched_policy = Some(SchedulerPolicy::default());
        state.last_ordinal = 3;
        state.replicas = 5;

        // Sizing alone would shrink 5 -> 4; only a timer tick may do that.
        assert_eq!(desired_replicas(&state, 5, 10, 1, false), 5);
        assert_eq!(desired_replicas(&state, 5, 10, 1, true), 4);
    }

    #[test]
    fn test_scale_up_proceeds_on_trigger_wake() {
        let mut state = base_state();
        state.scheduler_policy = SchedulerPolicyType::PolicyBased;
        state.sched_policy = Some(SchedulerPolicy::default());
        state.last_ordinal = 1;
        state.replicas = 2;
        state.pending = pending(15);

        // ceil(15/10) = 2 more pods on top of last_ordinal + 1.
        assert_eq!(desired_replicas(&state, 2, 10, 1, false), 4);
    }

    #[test]
    fn test_min_non_zero_prefers_smallest_positive() {
        assert_eq!(min_non_zero(&[0, 2, 5], 10), 2);
        assert_eq!(min_non_zero(&[0, 0], 10), 10);
        assert_eq!(min_non_zero(&[12, 15], 10), 10);
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(35, 10), 4);
        assert_eq!(ceil_div(30, 10), 3);
        assert_eq!(ceil_div(0, 10), 0);
        assert_eq!(ceil_div(1, 10), 1);
    }
}
