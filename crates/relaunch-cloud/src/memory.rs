//! In-memory collaborator backed by a [`Fleet`].
//!
//! Mutations are applied to the fleet the way the provider would reflect
//! them on the next describe: desired capacity changes, process lists
//! change, instances marked unhealthy or terminating. The provider's own
//! reactions (launching replacements, reaping unhealthy instances) are
//! not simulated.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use relaunch_core::{
    CloudApi, CloudError, CloudResult, Group, HealthStatus, InstanceAssociation, InstanceId,
    LifecycleState, LoadBalancerHealth, Operation, ScalingProcess, TargetHealth,
};

use crate::fleet::Fleet;

/// One collaborator call as observed by a recording implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudCall {
    pub operation: Operation,
    /// Group, instance, load balancer, or target group the call names.
    pub target: String,
    /// Operation-specific argument, e.g. the new desired capacity.
    pub detail: Option<String>,
}

impl CloudCall {
    pub fn new(operation: Operation, target: &str, detail: Option<String>) -> Self {
        Self {
            operation,
            target: target.to_string(),
            detail,
        }
    }
}

pub(crate) fn join_processes(processes: &[ScalingProcess]) -> String {
    processes
        .iter()
        .map(ScalingProcess::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recording, failure-injectable [`CloudApi`] over a [`Fleet`].
#[derive(Debug, Default)]
pub struct MemoryCloud {
    fleet: Mutex<Fleet>,
    calls: Mutex<Vec<CloudCall>>,
    failures: Mutex<HashSet<Operation>>,
}

impl MemoryCloud {
    pub fn new(fleet: Fleet) -> Self {
        Self {
            fleet: Mutex::new(fleet),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
        }
    }

    /// Make every later call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        lock(&self.failures).insert(operation);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<CloudCall> {
        lock(&self.calls).clone()
    }

    /// Only the calls that change provider state.
    pub fn mutations(&self) -> Vec<CloudCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// A copy of the current fleet state.
    pub fn fleet(&self) -> Fleet {
        lock(&self.fleet).clone()
    }

    /// Edit the fleet in place, e.g. to simulate the provider launching
    /// an instance between invocations.
    pub fn update(&self, f: impl FnOnce(&mut Fleet)) {
        f(&mut *lock(&self.fleet));
    }

    pub fn into_fleet(self) -> Fleet {
        self.fleet.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, operation: Operation, target: &str, detail: Option<String>) -> CloudResult<()> {
        debug!(%operation, %target, ?detail, "cloud call");
        lock(&self.calls).push(CloudCall::new(operation, target, detail));
        if lock(&self.failures).contains(&operation) {
            return Err(CloudError::Request {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn with_group<T>(
        &self,
        operation: Operation,
        name: &str,
        f: impl FnOnce(&mut Group) -> CloudResult<T>,
    ) -> CloudResult<T> {
        let mut fleet = lock(&self.fleet);
        let group = fleet.group_mut(name).ok_or_else(|| CloudError::NotFound {
            operation,
            what: format!("group {name}"),
        })?;
        f(group)
    }

    fn with_instance(
        &self,
        operation: Operation,
        instance_id: &str,
        f: impl FnOnce(&mut relaunch_core::Instance),
    ) -> CloudResult<()> {
        let mut fleet = lock(&self.fleet);
        let (_, instance) = fleet
            .instance_mut(instance_id)
            .ok_or_else(|| CloudError::NotFound {
                operation,
                what: format!("instance {instance_id}"),
            })?;
        f(instance);
        Ok(())
    }
}

impl CloudApi for MemoryCloud {
    fn describe_groups(&self, names: Option<&[String]>) -> CloudResult<Vec<Group>> {
        let target = names.map(|n| n.join(",")).unwrap_or_default();
        self.record(Operation::DescribeGroups, &target, None)?;

        let fleet = lock(&self.fleet);
        Ok(fleet
            .groups
            .iter()
            .filter(|g| names.is_none_or(|n| n.contains(&g.name)))
            .cloned()
            .collect())
    }

    fn describe_instances(&self, ids: &[InstanceId]) -> CloudResult<Vec<InstanceAssociation>> {
        self.record(Operation::DescribeInstances, &ids.join(","), None)?;

        let fleet = lock(&self.fleet);
        let mut found = Vec::new();
        for group in &fleet.groups {
            for instance in &group.instances {
                if ids.contains(&instance.id) {
                    found.push(InstanceAssociation {
                        instance_id: instance.id.clone(),
                        group_name: group.name.clone(),
                    });
                }
            }
        }
        Ok(found)
    }

    fn describe_instance_health(&self, load_balancer: &str) -> CloudResult<Vec<LoadBalancerHealth>> {
        self.record(Operation::DescribeInstanceHealth, load_balancer, None)?;
        Ok(lock(&self.fleet)
            .instance_health
            .get(load_balancer)
            .cloned()
            .unwrap_or_default())
    }

    fn describe_target_health(
        &self,
        target_group: &str,
        targets: &[InstanceId],
    ) -> CloudResult<Vec<TargetHealth>> {
        self.record(
            Operation::DescribeTargetHealth,
            target_group,
            Some(targets.join(",")),
        )?;
        Ok(lock(&self.fleet)
            .target_health
            .get(target_group)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| targets.contains(&r.target_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn set_desired_capacity(&self, group: &str, desired: u32) -> CloudResult<()> {
        let operation = Operation::SetDesiredCapacity;
        self.record(operation, group, Some(desired.to_string()))?;
        self.with_group(operation, group, |g| {
            if desired < g.capacity.min || desired > g.capacity.max {
                return Err(CloudError::Request {
                    operation,
                    message: format!(
                        "desired capacity {desired} outside [{}, {}]",
                        g.capacity.min, g.capacity.max
                    ),
                });
            }
            g.capacity.desired = desired;
            Ok(())
        })
    }

    fn suspend_processes(&self, group: &str, processes: &[ScalingProcess]) -> CloudResult<()> {
        let operation = Operation::SuspendProcesses;
        self.record(operation, group, Some(join_processes(processes)))?;
        self.with_group(operation, group, |g| {
            for process in processes {
                if !g.suspended_processes.contains(process) {
                    g.suspended_processes.push(process.clone());
                }
            }
            Ok(())
        })
    }

    fn resume_processes(
        &self,
        group: &str,
        processes: Option<&[ScalingProcess]>,
    ) -> CloudResult<()> {
        let operation = Operation::ResumeProcesses;
        self.record(operation, group, processes.map(join_processes))?;
        self.with_group(operation, group, |g| {
            match processes {
                Some(names) => g.suspended_processes.retain(|p| !names.contains(p)),
                None => g.suspended_processes.clear(),
            }
            Ok(())
        })
    }

    fn set_instance_health(
        &self,
        instance: &str,
        status: HealthStatus,
        respect_grace_period: bool,
    ) -> CloudResult<()> {
        let operation = Operation::SetInstanceHealth;
        self.record(
            operation,
            instance,
            Some(format!("{status} respect_grace_period={respect_grace_period}")),
        )?;
        self.with_instance(operation, instance, |i| i.health_status = status)
    }

    fn terminate_instance(&self, instance: &str) -> CloudResult<()> {
        let operation = Operation::TerminateInstance;
        self.record(operation, instance, None)?;
        self.with_instance(operation, instance, |i| {
            i.lifecycle_state = LifecycleState::Terminating
        })
    }
}
