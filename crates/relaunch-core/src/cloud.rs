//! The cloud collaborator interface.
//!
//! Everything relaunch knows about the provider comes through
//! [`CloudApi`]. The trait is injected into the controller and dispatcher
//! so tests can substitute an in-memory fleet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CloudResult;
use crate::types::{
    Group, HealthStatus, InstanceAssociation, InstanceId, LoadBalancerHealth, ScalingProcess,
    TargetHealth,
};

/// Names each collaborator call, for errors and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DescribeGroups,
    DescribeInstances,
    DescribeInstanceHealth,
    DescribeTargetHealth,
    SetDesiredCapacity,
    SuspendProcesses,
    ResumeProcesses,
    SetInstanceHealth,
    TerminateInstance,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DescribeGroups => "describe_groups",
            Operation::DescribeInstances => "describe_instances",
            Operation::DescribeInstanceHealth => "describe_instance_health",
            Operation::DescribeTargetHealth => "describe_target_health",
            Operation::SetDesiredCapacity => "set_desired_capacity",
            Operation::SuspendProcesses => "suspend_processes",
            Operation::ResumeProcesses => "resume_processes",
            Operation::SetInstanceHealth => "set_instance_health",
            Operation::TerminateInstance => "terminate_instance",
        }
    }

    /// Whether the operation changes provider state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Operation::DescribeGroups
                | Operation::DescribeInstances
                | Operation::DescribeInstanceHealth
                | Operation::DescribeTargetHealth
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describe and mutate operations offered by the cloud provider.
///
/// Each call either succeeds or returns a [`crate::CloudError`]; there is
/// no partial success. Describe calls return the complete result with
/// pagination already drained.
pub trait CloudApi: Send + Sync {
    /// Describe groups by name, or every group when `names` is `None`.
    fn describe_groups(&self, names: Option<&[String]>) -> CloudResult<Vec<Group>>;

    /// Look up group membership for the given instances.
    fn describe_instances(&self, ids: &[InstanceId]) -> CloudResult<Vec<InstanceAssociation>>;

    /// Per-instance state reported by a classic load balancer.
    fn describe_instance_health(&self, load_balancer: &str) -> CloudResult<Vec<LoadBalancerHealth>>;

    /// Health of `targets` as reported by a target group.
    fn describe_target_health(
        &self,
        target_group: &str,
        targets: &[InstanceId],
    ) -> CloudResult<Vec<TargetHealth>>;

    /// Set the group's desired capacity to an absolute value.
    fn set_desired_capacity(&self, group: &str, desired: u32) -> CloudResult<()>;

    fn suspend_processes(&self, group: &str, processes: &[ScalingProcess]) -> CloudResult<()>;

    /// Resume the named processes, or every suspended process when
    /// `processes` is `None`.
    fn resume_processes(&self, group: &str, processes: Option<&[ScalingProcess]>)
        -> CloudResult<()>;

    fn set_instance_health(
        &self,
        instance: &str,
        status: HealthStatus,
        respect_grace_period: bool,
    ) -> CloudResult<()>;

    fn terminate_instance(&self, instance: &str) -> CloudResult<()>;
}

impl<C: CloudApi + ?Sized> CloudApi for &C {
    fn describe_groups(&self, names: Option<&[String]>) -> CloudResult<Vec<Group>> {
        (**self).describe_groups(names)
    }

    fn describe_instances(&self, ids: &[InstanceId]) -> CloudResult<Vec<InstanceAssociation>> {
        (**self).describe_instances(ids)
    }

    fn describe_instance_health(&self, load_balancer: &str) -> CloudResult<Vec<LoadBalancerHealth>> {
        (**self).describe_instance_health(load_balancer)
    }

    fn describe_target_health(
        &self,
        target_group: &str,
        targets: &[InstanceId],
    ) -> CloudResult<Vec<TargetHealth>> {
        (**self).describe_target_health(target_group, targets)
    }

    fn set_desired_capacity(&self, group: &str, desired: u32) -> CloudResult<()> {
        (**self).set_desired_capacity(group, desired)
    }

    fn suspend_processes(&self, group: &str, processes: &[ScalingProcess]) -> CloudResult<()> {
        (**self).suspend_processes(group, processes)
    }

    fn resume_processes(
        &self,
        group: &str,
        processes: Option<&[ScalingProcess]>,
    ) -> CloudResult<()> {
        (**self).resume_processes(group, processes)
    }

    fn set_instance_health(
        &self,
        instance: &str,
        status: HealthStatus,
        respect_grace_period: bool,
    ) -> CloudResult<()> {
        (**self).set_instance_health(instance, status, respect_grace_period)
    }

    fn terminate_instance(&self, instance: &str) -> CloudResult<()> {
        (**self).terminate_instance(instance)
    }
}
