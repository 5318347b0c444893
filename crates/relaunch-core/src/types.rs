//! Domain types for autoscaling groups and their instances.
//!
//! A [`Group`] is an immutable view fetched fresh from the collaborator at
//! the start of each invocation. Nothing here is mutated to reflect an
//! action; the next fetch shows the provider's new state.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Name of an autoscaling group.
pub type GroupName = String;

/// Provider identifier for a compute instance.
pub type InstanceId = String;

/// Tag key that opts a group into instance replacement.
pub const REPLACEMENT_TAG: &str = "InstanceReplacement";

/// Tag values (compared case-insensitively) that opt a group back out.
pub const DISABLED_TAG_VALUES: [&str; 5] = ["0", "disabled", "false", "no", "off"];

/// Processes held suspended while old instances are being replaced.
pub const REPLACEMENT_PROCESSES: [ScalingProcess; 4] = [
    ScalingProcess::AlarmNotification,
    ScalingProcess::AZRebalance,
    ScalingProcess::Launch,
    ScalingProcess::ScheduledActions,
];

/// Generates `as_str`, `Display` and lossless `String` conversions for a
/// provider enum with an `Other(String)` escape hatch.
macro_rules! provider_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(s) => s.as_str(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $($text => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::from(s.as_str())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.as_str().to_string()
            }
        }
    };
}

// ── Instance fields ───────────────────────────────────────────────

/// Lifecycle state of an instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    Pending,
    PendingWait,
    PendingProceed,
    Quarantined,
    InService,
    Terminating,
    TerminatingWait,
    TerminatingProceed,
    Terminated,
    Detaching,
    Detached,
    EnteringStandby,
    Standby,
    Other(String),
}

provider_enum!(LifecycleState {
    Pending => "Pending",
    PendingWait => "Pending:Wait",
    PendingProceed => "Pending:Proceed",
    Quarantined => "Quarantined",
    InService => "InService",
    Terminating => "Terminating",
    TerminatingWait => "Terminating:Wait",
    TerminatingProceed => "Terminating:Proceed",
    Terminated => "Terminated",
    Detaching => "Detaching",
    Detached => "Detached",
    EnteringStandby => "EnteringStandby",
    Standby => "Standby",
});

/// Group-level health status of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Other(String),
}

provider_enum!(HealthStatus {
    Healthy => "Healthy",
    Unhealthy => "Unhealthy",
});

/// A named automatic behavior of a group that can be suspended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScalingProcess {
    Launch,
    Terminate,
    AddToLoadBalancer,
    AlarmNotification,
    AZRebalance,
    HealthCheck,
    InstanceRefresh,
    ReplaceUnhealthy,
    ScheduledActions,
    Other(String),
}

provider_enum!(ScalingProcess {
    Launch => "Launch",
    Terminate => "Terminate",
    AddToLoadBalancer => "AddToLoadBalancer",
    AlarmNotification => "AlarmNotification",
    AZRebalance => "AZRebalance",
    HealthCheck => "HealthCheck",
    InstanceRefresh => "InstanceRefresh",
    ReplaceUnhealthy => "ReplaceUnhealthy",
    ScheduledActions => "ScheduledActions",
});

// ── Instance ──────────────────────────────────────────────────────

/// One instance as listed in its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub lifecycle_state: LifecycleState,
    pub health_status: HealthStatus,
    /// Launch configuration the instance was started from.
    #[serde(default)]
    pub launch_configuration: Option<String>,
}

impl Instance {
    /// An in-service, healthy instance launched from `launch_configuration`.
    pub fn new(id: &str, launch_configuration: &str) -> Self {
        Self {
            id: id.to_string(),
            lifecycle_state: LifecycleState::InService,
            health_status: HealthStatus::Healthy,
            launch_configuration: Some(launch_configuration.to_string()),
        }
    }

    pub fn with_lifecycle(mut self, state: LifecycleState) -> Self {
        self.lifecycle_state = state;
        self
    }

    pub fn with_health(mut self, status: HealthStatus) -> Self {
        self.health_status = status;
        self
    }
}

// ── Group ─────────────────────────────────────────────────────────

/// Min/max/desired instance counts for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub min: u32,
    pub max: u32,
    pub desired: u32,
}

impl Capacity {
    pub fn new(min: u32, desired: u32, max: u32) -> Self {
        Self { min, max, desired }
    }

    /// Whether desired sits inside `[min, max]`.
    pub fn desired_in_bounds(&self) -> bool {
        self.min <= self.desired && self.desired <= self.max
    }
}

/// A key/value tag attached to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A snapshot of one autoscaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: GroupName,
    pub capacity: Capacity,
    /// The group's current launch configuration.
    #[serde(default)]
    pub launch_configuration: Option<String>,
    /// Classic load balancers the group registers instances with.
    #[serde(default)]
    pub load_balancers: Vec<String>,
    /// Target groups the group registers instances with.
    #[serde(default)]
    pub target_groups: Vec<String>,
    #[serde(default)]
    pub suspended_processes: Vec<ScalingProcess>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl Group {
    /// Build a group with no instances, tags, or attachments.
    pub fn new(name: &str, capacity: Capacity, launch_configuration: &str) -> CoreResult<Self> {
        let group = Self {
            name: name.to_string(),
            capacity,
            launch_configuration: Some(launch_configuration.to_string()),
            load_balancers: Vec::new(),
            target_groups: Vec::new(),
            suspended_processes: Vec::new(),
            tags: Vec::new(),
            instances: Vec::new(),
        };
        group.validate()?;
        Ok(group)
    }

    pub fn with_instances(mut self, instances: Vec<Instance>) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn with_load_balancer(mut self, name: &str) -> Self {
        self.load_balancers.push(name.to_string());
        self
    }

    pub fn with_target_group(mut self, arn: &str) -> Self {
        self.target_groups.push(arn.to_string());
        self
    }

    pub fn with_suspended(mut self, processes: &[ScalingProcess]) -> Self {
        self.suspended_processes.extend(processes.iter().cloned());
        self
    }

    /// Check structural invariants of a fetched group.
    ///
    /// `min > max`, an empty name, and duplicate instance ids are
    /// rejected. A desired count outside `[min, max]` is only logged: the
    /// provider reports it transiently while correcting an overshoot.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidGroup {
                name: self.name.clone(),
                reason: "empty group name".to_string(),
            });
        }

        if self.capacity.min > self.capacity.max {
            return Err(CoreError::InvalidGroup {
                name: self.name.clone(),
                reason: format!(
                    "min size {} exceeds max size {}",
                    self.capacity.min, self.capacity.max
                ),
            });
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.id.as_str()) {
                return Err(CoreError::InvalidGroup {
                    name: self.name.clone(),
                    reason: format!("duplicate instance {}", instance.id),
                });
            }
        }

        if !self.capacity.desired_in_bounds() {
            warn!(
                group = %self.name,
                min = self.capacity.min,
                desired = self.capacity.desired,
                max = self.capacity.max,
                "desired capacity outside group bounds"
            );
        }

        Ok(())
    }

    /// Whether replacement is enabled through the `tag_key` tag.
    ///
    /// A missing tag means unmanaged. A present tag enables management
    /// unless its value is one of [`DISABLED_TAG_VALUES`].
    pub fn is_managed(&self, tag_key: &str) -> bool {
        match self.tags.iter().find(|t| t.key == tag_key) {
            Some(tag) => {
                let value = tag.value.to_lowercase();
                !DISABLED_TAG_VALUES.contains(&value.as_str())
            }
            None => false,
        }
    }

    /// Whether `instance` was launched from the group's current
    /// launch configuration.
    pub fn is_new(&self, instance: &Instance) -> bool {
        instance.launch_configuration == self.launch_configuration
    }

    pub fn is_suspended(&self, process: &ScalingProcess) -> bool {
        self.suspended_processes.contains(process)
    }

    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(|i| i.id.clone()).collect()
    }
}

// ── Collaborator records ──────────────────────────────────────────

/// Which group an instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAssociation {
    pub instance_id: InstanceId,
    pub group_name: GroupName,
}

/// An instance's state as seen by one classic load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerHealth {
    pub instance_id: InstanceId,
    /// `InService`, `OutOfService`, or `Unknown`.
    pub state: String,
    #[serde(default)]
    pub reason_code: Option<String>,
}

impl LoadBalancerHealth {
    pub fn is_in_service(&self) -> bool {
        self.state == "InService"
    }

    /// The reason code, or the raw state when the provider sent none.
    pub fn reason(&self) -> &str {
        self.reason_code.as_deref().unwrap_or(&self.state)
    }
}

/// A target's health as seen by one target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub target_id: InstanceId,
    /// `healthy`, `initial`, `unhealthy`, `unused`, `draining`, ...
    pub state: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TargetHealth {
    pub fn is_healthy(&self) -> bool {
        self.state == "healthy"
    }

    /// The reason, or the raw state when the provider sent none.
    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or(&self.state)
    }
}
