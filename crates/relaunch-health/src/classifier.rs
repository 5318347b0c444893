//! Composite instance status.
//!
//! Merges the group's own lifecycle and health fields with whatever the
//! attached target groups and load balancers report, producing a single
//! status per instance. The first failing check wins, in this order:
//!
//! 1. lifecycle state is not `InService`
//! 2. health status is not `Healthy`
//! 3. any target group reports the instance not `healthy`
//! 4. any load balancer reports the instance not `InService`

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use relaunch_core::{
    CloudApi, CloudResult, Group, HealthStatus, Instance, InstanceId, LifecycleState,
    LoadBalancerHealth, TargetHealth,
};

/// Rendered form of [`CompositeStatus::Ready`].
pub const READY_STATUS: &str = "All:Ready";

/// The single derived status of an instance within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum CompositeStatus {
    LifecycleState(LifecycleState),
    HealthStatus(HealthStatus),
    /// Reason from the first target group reporting the instance unhealthy.
    TargetHealth(String),
    /// Reason code from the first load balancer reporting it out of service.
    InstanceHealth(String),
    Ready,
}

impl CompositeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CompositeStatus::Ready)
    }

    /// Still being brought up by the provider.
    pub fn is_launching(&self) -> bool {
        matches!(
            self,
            CompositeStatus::LifecycleState(LifecycleState::Pending | LifecycleState::PendingWait)
        )
    }

    /// Marked unhealthy or already on its way out.
    pub fn is_terminating(&self) -> bool {
        matches!(
            self,
            CompositeStatus::HealthStatus(HealthStatus::Unhealthy)
                | CompositeStatus::LifecycleState(LifecycleState::Terminating)
        )
    }

    /// Only the `Terminating` lifecycle state, not merely unhealthy.
    pub fn is_lifecycle_terminating(&self) -> bool {
        matches!(
            self,
            CompositeStatus::LifecycleState(LifecycleState::Terminating)
        )
    }
}

impl fmt::Display for CompositeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeStatus::LifecycleState(state) => write!(f, "LifecycleState:{state}"),
            CompositeStatus::HealthStatus(status) => write!(f, "HealthStatus:{status}"),
            CompositeStatus::TargetHealth(reason) => write!(f, "TargetHealth:{reason}"),
            CompositeStatus::InstanceHealth(reason) => write!(f, "InstanceHealth:{reason}"),
            CompositeStatus::Ready => f.write_str(READY_STATUS),
        }
    }
}

impl From<CompositeStatus> for String {
    fn from(status: CompositeStatus) -> Self {
        status.to_string()
    }
}

/// Load balancer and target group health records keyed by instance id.
///
/// An instance registered with several load balancers or target groups
/// has one record per attachment.
#[derive(Debug, Clone, Default)]
pub struct HealthIndex {
    load_balancers: HashMap<InstanceId, Vec<LoadBalancerHealth>>,
    target_groups: HashMap<InstanceId, Vec<TargetHealth>>,
}

impl HealthIndex {
    pub fn from_records(
        load_balancers: impl IntoIterator<Item = LoadBalancerHealth>,
        target_groups: impl IntoIterator<Item = TargetHealth>,
    ) -> Self {
        let mut index = Self::default();
        for record in load_balancers {
            index
                .load_balancers
                .entry(record.instance_id.clone())
                .or_default()
                .push(record);
        }
        for record in target_groups {
            index
                .target_groups
                .entry(record.target_id.clone())
                .or_default()
                .push(record);
        }
        index
    }

    /// Query every load balancer and target group attached to `group`.
    pub fn fetch(group: &Group, cloud: &dyn CloudApi) -> CloudResult<Self> {
        let mut lb_records = Vec::new();
        for load_balancer in &group.load_balancers {
            let records = cloud.describe_instance_health(load_balancer)?;
            debug!(
                group = %group.name,
                %load_balancer,
                records = records.len(),
                "fetched load balancer health"
            );
            lb_records.extend(records);
        }

        let mut tg_records = Vec::new();
        let targets = group.instance_ids();
        if !targets.is_empty() {
            for target_group in &group.target_groups {
                let records = cloud.describe_target_health(target_group, &targets)?;
                debug!(
                    group = %group.name,
                    %target_group,
                    records = records.len(),
                    "fetched target group health"
                );
                tg_records.extend(records);
            }
        }

        Ok(Self::from_records(lb_records, tg_records))
    }

    pub fn load_balancer_records(&self, instance_id: &str) -> &[LoadBalancerHealth] {
        self.load_balancers
            .get(instance_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn target_records(&self, instance_id: &str) -> &[TargetHealth] {
        self.target_groups
            .get(instance_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Compute the composite status of one instance.
///
/// An instance missing from the index has no load balancer or target
/// group opinion and falls through to `Ready`.
pub fn classify(instance: &Instance, index: &HealthIndex) -> CompositeStatus {
    if instance.lifecycle_state != LifecycleState::InService {
        return CompositeStatus::LifecycleState(instance.lifecycle_state.clone());
    }

    if instance.health_status != HealthStatus::Healthy {
        return CompositeStatus::HealthStatus(instance.health_status.clone());
    }

    if let Some(record) = index
        .target_records(&instance.id)
        .iter()
        .find(|r| !r.is_healthy())
    {
        return CompositeStatus::TargetHealth(record.reason().to_string());
    }

    if let Some(record) = index
        .load_balancer_records(&instance.id)
        .iter()
        .find(|r| !r.is_in_service())
    {
        return CompositeStatus::InstanceHealth(record.reason().to_string());
    }

    CompositeStatus::Ready
}
