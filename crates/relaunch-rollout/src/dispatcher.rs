//! Event dispatcher — turns a trigger event into controller runs.
//!
//! Group-change events name the group directly. Instance-lifecycle events
//! carry an instance id whose owning group is looked up. Anything else,
//! such as a scheduled sweep, reconciles every group.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use relaunch_core::{CloudApi, GroupName, InstanceId};

use crate::controller::{Decision, RolloutController};
use crate::error::RolloutResult;

/// An incoming trigger event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(
        rename = "AutoScalingGroupName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub group_name: Option<GroupName>,
    #[serde(rename = "instance-id", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
}

impl Event {
    pub fn for_group(name: &str) -> Self {
        Self {
            detail: EventDetail {
                group_name: Some(name.to_string()),
                instance_id: None,
            },
        }
    }

    pub fn for_instance(id: &str) -> Self {
        Self {
            detail: EventDetail {
                group_name: None,
                instance_id: Some(id.to_string()),
            },
        }
    }

    /// An event naming nothing, which sweeps all groups.
    pub fn sweep() -> Self {
        Self::default()
    }
}

/// Which groups an event applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Group(GroupName),
    AllGroups,
}

/// Resolves events to groups and runs the controller on each managed one.
pub struct Dispatcher<'c> {
    cloud: &'c dyn CloudApi,
    tag_key: String,
}

impl<'c> Dispatcher<'c> {
    /// `tag_key` is the group tag that opts a group into replacement.
    pub fn new(cloud: &'c dyn CloudApi, tag_key: &str) -> Self {
        Self {
            cloud,
            tag_key: tag_key.to_string(),
        }
    }

    /// Work out which groups `event` applies to.
    ///
    /// Empty fields count as absent. An instance that belongs to no group
    /// falls back to a full sweep.
    pub fn resolve(&self, event: &Event) -> RolloutResult<Target> {
        let detail = &event.detail;

        if let Some(name) = detail.group_name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(Target::Group(name.to_string()));
        }

        if let Some(id) = detail.instance_id.as_deref().filter(|i| !i.is_empty()) {
            let found = self.cloud.describe_instances(&[id.to_string()])?;
            if let Some(association) = found.into_iter().next() {
                debug!(instance = %id, group = %association.group_name, "resolved instance to group");
                return Ok(Target::Group(association.group_name));
            }
            debug!(instance = %id, "instance not in any group");
        }

        Ok(Target::AllGroups)
    }

    /// Reconcile every managed group the event applies to.
    ///
    /// Stops at the first group whose invocation fails; groups already
    /// handled keep whatever step they took.
    pub fn dispatch(&self, event: &Event) -> RolloutResult<Vec<Decision>> {
        debug!(?event, "received event");

        let groups = match self.resolve(event)? {
            Target::Group(name) => self
                .cloud
                .describe_groups(Some(std::slice::from_ref(&name)))?,
            Target::AllGroups => self.cloud.describe_groups(None)?,
        };

        let controller = RolloutController::new(self.cloud);
        let mut decisions = Vec::new();
        for group in groups {
            if !group.is_managed(&self.tag_key) {
                debug!(group = %group.name, tag = %self.tag_key, "not managed, skipping");
                continue;
            }
            let decision = controller.replace_old_instances(group)?;
            info!(
                group = %decision.group,
                phase = ?decision.phase,
                actions = decision.actions.len(),
                "invocation finished"
            );
            decisions.push(decision);
        }

        Ok(decisions)
    }
}
