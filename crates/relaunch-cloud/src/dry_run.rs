//! Dry-run wrapper: real describes, logged-but-skipped mutations.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use relaunch_core::{
    CloudApi, CloudResult, Group, HealthStatus, InstanceAssociation, InstanceId,
    LoadBalancerHealth, Operation, ScalingProcess, TargetHealth,
};

use crate::memory::{join_processes, CloudCall};

/// Wraps a collaborator so that nothing is changed.
///
/// Every mutation reports success without reaching `inner`, which lets an
/// operator see the action an invocation would take against live state.
#[derive(Debug)]
pub struct DryRun<C> {
    inner: C,
    skipped: Mutex<Vec<CloudCall>>,
}

impl<C: CloudApi> DryRun<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            skipped: Mutex::new(Vec::new()),
        }
    }

    /// Mutations that were suppressed, in order.
    pub fn skipped(&self) -> Vec<CloudCall> {
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn skip(&self, operation: Operation, target: &str, detail: Option<String>) -> CloudResult<()> {
        info!(%operation, %target, detail = detail.as_deref().unwrap_or(""), "dry run, skipping");
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CloudCall::new(operation, target, detail));
        Ok(())
    }
}

impl<C: CloudApi> CloudApi for DryRun<C> {
    fn describe_groups(&self, names: Option<&[String]>) -> CloudResult<Vec<Group>> {
        self.inner.describe_groups(names)
    }

    fn describe_instances(&self, ids: &[InstanceId]) -> CloudResult<Vec<InstanceAssociation>> {
        self.inner.describe_instances(ids)
    }

    fn describe_instance_health(&self, load_balancer: &str) -> CloudResult<Vec<LoadBalancerHealth>> {
        self.inner.describe_instance_health(load_balancer)
    }

    fn describe_target_health(
        &self,
        target_group: &str,
        targets: &[InstanceId],
    ) -> CloudResult<Vec<TargetHealth>> {
        self.inner.describe_target_health(target_group, targets)
    }

    fn set_desired_capacity(&self, group: &str, desired: u32) -> CloudResult<()> {
        self.skip(Operation::SetDesiredCapacity, group, Some(desired.to_string()))
    }

    fn suspend_processes(&self, group: &str, processes: &[ScalingProcess]) -> CloudResult<()> {
        self.skip(Operation::SuspendProcesses, group, Some(join_processes(processes)))
    }

    fn resume_processes(
        &self,
        group: &str,
        processes: Option<&[ScalingProcess]>,
    ) -> CloudResult<()> {
        self.skip(Operation::ResumeProcesses, group, processes.map(join_processes))
    }

    fn set_instance_health(
        &self,
        instance: &str,
        status: HealthStatus,
        respect_grace_period: bool,
    ) -> CloudResult<()> {
        self.skip(
            Operation::SetInstanceHealth,
            instance,
            Some(format!("{status} respect_grace_period={respect_grace_period}")),
        )
    }

    fn terminate_instance(&self, instance: &str) -> CloudResult<()> {
        self.skip(Operation::TerminateInstance, instance, None)
    }
}
