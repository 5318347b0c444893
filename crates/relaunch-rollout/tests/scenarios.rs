//! End-to-end rollout scenarios.
//!
//! Each test drives the dispatcher against an in-memory fleet and checks
//! the exact mutations issued, invocation by invocation. Between
//! invocations the tests play the provider's part by editing the fleet.

use relaunch_cloud::{CloudCall, Fleet, MemoryCloud};
use relaunch_core::{
    Capacity, Group, HealthStatus, Instance, LifecycleState, Operation, REPLACEMENT_PROCESSES,
    REPLACEMENT_TAG, TargetHealth,
};
use relaunch_rollout::{Action, Dispatcher, Event, RolloutPhase};

const OLD: &str = "lc-v1";
const NEW: &str = "lc-v2";

fn web(desired: u32, max: u32, instances: Vec<Instance>) -> Group {
    Group::new("web", Capacity::new(1, desired, max), NEW)
        .unwrap()
        .with_tag(REPLACEMENT_TAG, "")
        .with_instances(instances)
}

fn invoke(cloud: &MemoryCloud) -> relaunch_rollout::Decision {
    cloud.clear_calls();
    let mut decisions = Dispatcher::new(cloud, REPLACEMENT_TAG)
        .dispatch(&Event::for_group("web"))
        .unwrap();
    assert_eq!(decisions.len(), 1);
    decisions.remove(0)
}

fn suspend_all() -> CloudCall {
    CloudCall::new(
        Operation::SuspendProcesses,
        "web",
        Some("AlarmNotification,AZRebalance,Launch,ScheduledActions".to_string()),
    )
}

#[test]
fn scenario_a_starts_rollout() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        2,
        3,
        vec![Instance::new("i-1", OLD), Instance::new("i-2", OLD)],
    )]));

    let decision = invoke(&cloud);

    assert_eq!(decision.phase, RolloutPhase::RaiseCapacity);
    assert_eq!(
        cloud.mutations(),
        vec![
            suspend_all(),
            CloudCall::new(Operation::SetDesiredCapacity, "web", Some("3".to_string())),
        ]
    );
}

#[test]
fn scenario_b_waits_for_pending_instance() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        3,
        3,
        vec![
            Instance::new("i-1", OLD),
            Instance::new("i-2", OLD),
            Instance::new("i-3", NEW).with_lifecycle(LifecycleState::Pending),
        ],
    )
    .with_suspended(&REPLACEMENT_PROCESSES)]));

    let decision = invoke(&cloud);

    assert_eq!(decision.phase, RolloutPhase::AwaitReadiness);
    assert_eq!(decision.waiting_on, vec!["i-3".to_string()]);
    assert!(cloud.mutations().is_empty());
}

#[test]
fn scenario_c_retires_one_old_instance() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        3,
        3,
        vec![
            Instance::new("i-1", OLD),
            Instance::new("i-2", OLD),
            Instance::new("i-3", NEW),
        ],
    )
    .with_suspended(&REPLACEMENT_PROCESSES)]));

    let decision = invoke(&cloud);

    assert_eq!(decision.phase, RolloutPhase::RetireOld);
    let mutations = cloud.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].operation, Operation::SetInstanceHealth);
    assert!(["i-1", "i-2"].contains(&mutations[0].target.as_str()));
}

#[test]
fn scenario_d_overshoot_absorbed_by_terminating_instance() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        3,
        3,
        vec![
            Instance::new("i-1", OLD).with_lifecycle(LifecycleState::Terminating),
            Instance::new("i-2", OLD),
            Instance::new("i-3", NEW),
            Instance::new("i-4", NEW),
        ],
    )
    .with_suspended(&REPLACEMENT_PROCESSES)]));

    let decision = invoke(&cloud);

    assert_eq!(decision.phase, RolloutPhase::Overshoot { excess: 1 });
    assert_eq!(decision.waiting_on, vec!["i-1".to_string()]);
    assert!(cloud.mutations().is_empty());
}

#[test]
fn target_group_health_gates_retirement() {
    let mut fleet = Fleet::new(vec![
        web(
            3,
            3,
            vec![
                Instance::new("i-1", OLD),
                Instance::new("i-2", OLD),
                Instance::new("i-3", NEW),
            ],
        )
        .with_target_group("tg-web")
        .with_suspended(&REPLACEMENT_PROCESSES),
    ]);
    fleet.set_target_health(
        "tg-web",
        vec![TargetHealth {
            target_id: "i-3".to_string(),
            state: "initial".to_string(),
            reason: Some("Elb.RegistrationInProgress".to_string()),
        }],
    );
    let cloud = MemoryCloud::new(fleet);

    assert_eq!(invoke(&cloud).phase, RolloutPhase::AwaitReadiness);
    assert!(cloud.mutations().is_empty());

    cloud.update(|f| {
        f.set_target_health(
            "tg-web",
            vec![TargetHealth {
                target_id: "i-3".to_string(),
                state: "healthy".to_string(),
                reason: None,
            }],
        )
    });
    assert_eq!(invoke(&cloud).phase, RolloutPhase::RetireOld);
}

#[test]
fn full_rollout_replaces_every_old_instance() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        2,
        3,
        vec![Instance::new("i-1", OLD), Instance::new("i-2", OLD)],
    )]));

    // Suspend and make room for one new instance.
    let decision = invoke(&cloud);
    assert_eq!(decision.phase, RolloutPhase::RaiseCapacity);

    // Launch is suspended, so the provider has not launched anything.
    let decision = invoke(&cloud);
    assert_eq!(decision.phase, RolloutPhase::AwaitLaunch);
    assert_eq!(
        decision.actions,
        vec![Action::ResumeProcesses {
            processes: Some(vec![relaunch_core::ScalingProcess::Launch])
        }]
    );

    // Provider launches i-3 from the new configuration.
    cloud.update(|f| {
        f.group_mut("web")
            .unwrap()
            .instances
            .push(Instance::new("i-3", NEW).with_lifecycle(LifecycleState::Pending))
    });
    let decision = invoke(&cloud);
    // Launch was resumed, so the gate suspends it again before waiting.
    assert_eq!(decision.phase, RolloutPhase::AwaitReadiness);
    assert_eq!(cloud.mutations(), vec![suspend_all()]);

    cloud.update(|f| {
        f.instance_mut("i-3").unwrap().1.lifecycle_state = LifecycleState::InService
    });
    let decision = invoke(&cloud);
    assert_eq!(
        decision.actions,
        vec![Action::MarkUnhealthy {
            instance_id: "i-1".to_string()
        }]
    );

    // i-1 is now unhealthy: wait for the provider to drain it.
    let decision = invoke(&cloud);
    assert_eq!(decision.phase, RolloutPhase::AwaitReadiness);
    assert_eq!(decision.waiting_on, vec!["i-1".to_string()]);

    // Provider replaces i-1 with i-4 (Launch is suspended, so count
    // drops first; the controller resumes Launch to refill).
    cloud.update(|f| {
        f.group_mut("web").unwrap().instances.retain(|i| i.id != "i-1");
    });
    assert_eq!(invoke(&cloud).phase, RolloutPhase::AwaitLaunch);
    cloud.update(|f| {
        f.group_mut("web")
            .unwrap()
            .instances
            .push(Instance::new("i-4", NEW))
    });

    let decision = invoke(&cloud);
    assert_eq!(
        decision.actions,
        vec![
            Action::SuspendProcesses {
                processes: REPLACEMENT_PROCESSES.to_vec()
            },
            Action::MarkUnhealthy {
                instance_id: "i-2".to_string()
            }
        ]
    );

    cloud.update(|f| {
        let group = f.group_mut("web").unwrap();
        group.instances.retain(|i| i.id != "i-2");
        group.instances.push(Instance::new("i-5", NEW));
    });

    let decision = invoke(&cloud);
    assert_eq!(decision.phase, RolloutPhase::Complete);
    assert_eq!(
        cloud.mutations(),
        vec![CloudCall::new(Operation::ResumeProcesses, "web", None)]
    );
    let fleet = cloud.fleet();
    let group = fleet.group("web").unwrap();
    assert!(group.suspended_processes.is_empty());
    assert_eq!(group.capacity.desired, 3);

    // Finished rollouts stay quiet.
    let decision = invoke(&cloud);
    assert_eq!(decision.phase, RolloutPhase::Idle);
    assert!(cloud.mutations().is_empty());
}

#[test]
fn unhealthy_new_instance_stalls_without_mutations() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        3,
        3,
        vec![
            Instance::new("i-1", OLD),
            Instance::new("i-2", OLD),
            Instance::new("i-3", NEW).with_health(HealthStatus::Unhealthy),
        ],
    )
    .with_suspended(&REPLACEMENT_PROCESSES)]));

    for _ in 0..3 {
        let decision = invoke(&cloud);
        assert_eq!(decision.phase, RolloutPhase::AwaitReadiness);
        assert!(cloud.mutations().is_empty());
    }
}

#[test]
fn collaborator_failure_fails_invocation() {
    let cloud = MemoryCloud::new(Fleet::new(vec![web(
        2,
        3,
        vec![Instance::new("i-1", OLD), Instance::new("i-2", OLD)],
    )
    .with_suspended(&REPLACEMENT_PROCESSES)]));
    cloud.fail_on(Operation::SetDesiredCapacity);

    let result = Dispatcher::new(&cloud, REPLACEMENT_TAG).dispatch(&Event::for_group("web"));
    assert!(result.is_err());
    assert_eq!(cloud.fleet().group("web").unwrap().capacity.desired, 2);

    // The next invocation starts over from live state and succeeds.
    cloud.clear_failures();
    assert_eq!(invoke(&cloud).phase, RolloutPhase::RaiseCapacity);
}
