//! Rollout controller — picks and performs the next replacement step.
//!
//! The controller holds no state between invocations. Each call to
//! [`RolloutController::reconcile`] looks at a fresh [`Snapshot`], works
//! out which phase the rollout is in, performs that phase's single action
//! and returns. Callers invoke it again to make further progress.
//!
//! Phases are checked in this order and the first match wins:
//!
//! ```text
//! count > max                               Overshoot      terminate excess
//! desired < max && no new instances         RaiseCapacity  desired += 1
//! count < desired                           AwaitLaunch    resume Launch
//! new unready || old terminating            AwaitReadiness (log only)
//! old instances remain                      RetireOld      mark one unhealthy
//! suspended processes remain                Complete       resume all
//! otherwise                                 Idle
//! ```
//!
//! Independently of the phase, the replacement processes are suspended
//! whenever old instances exist and any of them is still running.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use relaunch_core::{
    CloudApi, Group, HealthStatus, InstanceId, ScalingProcess, REPLACEMENT_PROCESSES,
};
use relaunch_health::Snapshot;

use crate::error::RolloutResult;

/// Which step of a rollout a group is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RolloutPhase {
    /// More instances than the group's max size.
    Overshoot { excess: u32 },
    /// Rollout not started: add room for one new instance.
    RaiseCapacity,
    /// Desired capacity raised, waiting for the provider to launch.
    AwaitLaunch,
    /// New instances not ready yet, or old ones still terminating.
    AwaitReadiness,
    /// Handing one old instance to the provider for replacement.
    RetireOld,
    /// No old instances left; processes resumed.
    Complete,
    /// Nothing to do.
    Idle,
}

/// A mutation issued against the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SuspendProcesses { processes: Vec<ScalingProcess> },
    SetDesiredCapacity { desired: u32 },
    /// `None` resumes every suspended process.
    ResumeProcesses { processes: Option<Vec<ScalingProcess>> },
    MarkUnhealthy { instance_id: InstanceId },
    Terminate { instance_id: InstanceId },
}

/// Outcome of one invocation against one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub group: String,
    pub phase: RolloutPhase,
    /// Mutations issued, in order.
    pub actions: Vec<Action>,
    /// Instances the rollout is waiting on.
    pub waiting_on: Vec<InstanceId>,
}

impl Decision {
    fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            phase: RolloutPhase::Idle,
            actions: Vec::new(),
            waiting_on: Vec::new(),
        }
    }

    /// Whether the invocation left the provider untouched.
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn terminated(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Terminate { instance_id } => Some(instance_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Whether the replacement processes must be suspended first.
///
/// Only while old instances remain; a group with nothing to replace is
/// left alone.
pub fn suspend_required(snapshot: &Snapshot) -> bool {
    !snapshot.old_instances().is_empty()
        && REPLACEMENT_PROCESSES
            .iter()
            .any(|p| !snapshot.group().is_suspended(p))
}

/// Drives instance replacement through an injected collaborator.
pub struct RolloutController<'c> {
    cloud: &'c dyn CloudApi,
}

impl<'c> RolloutController<'c> {
    pub fn new(cloud: &'c dyn CloudApi) -> Self {
        Self { cloud }
    }

    /// Classify `group`'s instances and take the next step.
    pub fn replace_old_instances(&self, group: Group) -> RolloutResult<Decision> {
        group.validate()?;
        let snapshot = Snapshot::fetch(group, self.cloud)?;
        self.reconcile(&snapshot)
    }

    /// Take the next step for an already classified group.
    ///
    /// Issues the suspend gate plus at most one phase action. Any
    /// collaborator failure aborts immediately.
    pub fn reconcile(&self, snapshot: &Snapshot) -> RolloutResult<Decision> {
        let group = snapshot.group();
        let name = group.name.as_str();
        let mut decision = Decision::new(name);

        if suspend_required(snapshot) {
            info!(group = %name, "suspending processes");
            self.cloud.suspend_processes(name, &REPLACEMENT_PROCESSES)?;
            decision.actions.push(Action::SuspendProcesses {
                processes: REPLACEMENT_PROCESSES.to_vec(),
            });
        }

        let count = snapshot.instance_count();
        let max = group.capacity.max as usize;
        let desired = group.capacity.desired as usize;
        let new = snapshot.new_instances();
        let old = snapshot.old_instances();

        if count > max {
            // The Launch suspension normally prevents this. Something
            // external resumed it, so shed the excess directly.
            let excess = count - max;
            decision.phase = RolloutPhase::Overshoot {
                excess: excess as u32,
            };
            self.correct_overshoot(snapshot, excess, &mut decision)?;
        } else if desired < max && new.is_empty() {
            let target = group.capacity.desired + 1;
            info!(group = %name, desired = target, "increasing desired capacity to add new instance");
            self.cloud.set_desired_capacity(name, target)?;
            decision.phase = RolloutPhase::RaiseCapacity;
            decision.actions.push(Action::SetDesiredCapacity { desired: target });
        } else if count < desired {
            info!(group = %name, "resuming launch scaling process");
            let launch = [ScalingProcess::Launch];
            self.cloud.resume_processes(name, Some(launch.as_slice()))?;
            decision.phase = RolloutPhase::AwaitLaunch;
            decision.actions.push(Action::ResumeProcesses {
                processes: Some(launch.to_vec()),
            });
        } else if !new.unready().is_empty() || !old.terminating().is_empty() {
            // Stuck here means the new launch configuration is not coming
            // up healthy, or an old instance is not draining. Both need an
            // operator.
            for (instance, status) in new.unready().entries() {
                info!(group = %name, instance = %instance.id, %status, "waiting for new instance");
                decision.waiting_on.push(instance.id.clone());
            }
            for (instance, status) in old.terminating().entries() {
                info!(group = %name, instance = %instance.id, %status, "waiting for old instance to terminate");
                decision.waiting_on.push(instance.id.clone());
            }
            decision.phase = RolloutPhase::AwaitReadiness;
        } else if let Some(instance) = old.unready().first().or_else(|| old.first()) {
            let status = snapshot
                .status(&instance.id)
                .map(ToString::to_string)
                .unwrap_or_default();
            info!(group = %name, instance = %instance.id, %status, "setting old instance to unhealthy");
            self.cloud
                .set_instance_health(&instance.id, HealthStatus::Unhealthy, false)?;
            decision.phase = RolloutPhase::RetireOld;
            decision.actions.push(Action::MarkUnhealthy {
                instance_id: instance.id.clone(),
            });
        } else if !group.suspended_processes.is_empty() {
            info!(group = %name, "resuming all processes");
            self.cloud.resume_processes(name, None)?;
            decision.phase = RolloutPhase::Complete;
            decision
                .actions
                .push(Action::ResumeProcesses { processes: None });
            info!(group = %name, "complete");
        } else {
            debug!(group = %name, "nothing to replace");
        }

        Ok(decision)
    }

    /// Terminate `excess` instances, cheapest to lose first.
    ///
    /// Instances already terminating count toward `excess` without a new
    /// call, then launching, unready, new, and finally any instance.
    fn correct_overshoot(
        &self,
        snapshot: &Snapshot,
        excess: usize,
        decision: &mut Decision,
    ) -> RolloutResult<()> {
        let name = snapshot.name();
        let priority = [
            snapshot.terminating(),
            snapshot.launching(),
            snapshot.unready(),
            snapshot.new_instances(),
            snapshot.all(),
        ];

        let mut counted: HashSet<&str> = HashSet::new();
        for (instance, status) in priority.iter().flat_map(|set| set.entries()) {
            if !counted.insert(instance.id.as_str()) {
                continue;
            }

            if status.is_lifecycle_terminating() {
                info!(group = %name, instance = %instance.id, "max size exceeded, waiting for instance to terminate");
                decision.waiting_on.push(instance.id.clone());
            } else {
                info!(group = %name, instance = %instance.id, %status, "max size exceeded, terminating instance");
                self.cloud.terminate_instance(&instance.id)?;
                decision.actions.push(Action::Terminate {
                    instance_id: instance.id.clone(),
                });
            }

            if counted.len() == excess {
                break;
            }
        }

        Ok(())
    }
}
