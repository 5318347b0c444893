use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use relaunch_cloud::{DryRun, Fleet, MemoryCloud};
use relaunch_core::{CloudApi, Group, RelaunchConfig};
use relaunch_health::{CompositeStatus, Snapshot};
use relaunch_rollout::{RolloutController, RolloutPhase};

use super::invoke::phase_label;

#[derive(Debug, Serialize)]
struct GroupStatus {
    name: String,
    managed: bool,
    min: u32,
    desired: u32,
    max: u32,
    launch_configuration: Option<String>,
    suspended: Vec<String>,
    instances: Vec<InstanceStatus>,
    /// What the next invocation would do; only for managed groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<RolloutPhase>,
}

#[derive(Debug, Serialize)]
struct InstanceStatus {
    id: String,
    new: bool,
    status: CompositeStatus,
}

pub fn status(
    config: &RelaunchConfig,
    world: &Path,
    group: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let fleet =
        Fleet::from_file(world).with_context(|| format!("loading world {}", world.display()))?;
    let cloud = MemoryCloud::new(fleet);

    let names = group.map(|g| vec![g.to_string()]);
    let groups = cloud.describe_groups(names.as_deref())?;
    if groups.is_empty() {
        if let Some(name) = group {
            anyhow::bail!("group not found: {name}");
        }
    }

    let statuses = groups
        .into_iter()
        .map(|g| group_status(&cloud, g, &config.replacement.tag_key))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        print!("{}", render_text(&statuses));
    }
    Ok(())
}

/// Classify a group and, if managed, plan its next step without mutating.
fn group_status(cloud: &MemoryCloud, group: Group, tag_key: &str) -> anyhow::Result<GroupStatus> {
    let managed = group.is_managed(tag_key);
    let snapshot = Snapshot::fetch(group, cloud)?;

    let instances = snapshot
        .all()
        .entries()
        .map(|(instance, status)| InstanceStatus {
            id: instance.id.clone(),
            new: snapshot.group().is_new(instance),
            status: status.clone(),
        })
        .collect();

    let next = if managed {
        let dry = DryRun::new(cloud);
        Some(RolloutController::new(&dry).reconcile(&snapshot)?.phase)
    } else {
        None
    };

    let g = snapshot.group();
    Ok(GroupStatus {
        name: g.name.clone(),
        managed,
        min: g.capacity.min,
        desired: g.capacity.desired,
        max: g.capacity.max,
        launch_configuration: g.launch_configuration.clone(),
        suspended: g.suspended_processes.iter().map(ToString::to_string).collect(),
        instances,
        next,
    })
}

fn render_text(groups: &[GroupStatus]) -> String {
    let mut out = String::new();
    for g in groups {
        out.push_str(&format!(
            "{} ({})\n",
            g.name,
            if g.managed { "managed" } else { "unmanaged" }
        ));
        out.push_str(&format!(
            "  capacity: min {} / desired {} / max {}\n",
            g.min, g.desired, g.max
        ));
        out.push_str(&format!(
            "  launch configuration: {}\n",
            g.launch_configuration.as_deref().unwrap_or("-")
        ));
        if !g.suspended.is_empty() {
            out.push_str(&format!("  suspended: {}\n", g.suspended.join(", ")));
        }
        for i in &g.instances {
            out.push_str(&format!(
                "  {:<20} {:<4} {}\n",
                i.id,
                if i.new { "new" } else { "old" },
                i.status
            ));
        }
        if let Some(next) = &g.next {
            out.push_str(&format!("  next: {}\n", phase_label(next)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaunch_core::{Capacity, Instance, LifecycleState, REPLACEMENT_TAG};

    fn cloud() -> MemoryCloud {
        let managed = Group::new("web", Capacity::new(1, 2, 3), "lc-v2")
            .unwrap()
            .with_tag(REPLACEMENT_TAG, "")
            .with_instances(vec![
                Instance::new("i-1", "lc-v1"),
                Instance::new("i-2", "lc-v2").with_lifecycle(LifecycleState::Pending),
            ]);
        let plain = Group::new("batch", Capacity::new(0, 0, 1), "lc-v1").unwrap();
        MemoryCloud::new(Fleet::new(vec![managed, plain]))
    }

    #[test]
    fn managed_group_gets_a_plan_without_mutations() {
        let cloud = cloud();
        let group = cloud.fleet().group("web").unwrap().clone();

        let status = group_status(&cloud, group, REPLACEMENT_TAG).unwrap();

        assert!(status.managed);
        assert_eq!(status.next, Some(RolloutPhase::AwaitReadiness));
        assert_eq!(status.instances.len(), 2);
        assert!(!status.instances[0].new);
        assert_eq!(status.instances[1].status.to_string(), "LifecycleState:Pending");
        assert!(cloud.mutations().is_empty());
    }

    #[test]
    fn unmanaged_group_has_no_plan() {
        let cloud = cloud();
        let group = cloud.fleet().group("batch").unwrap().clone();
        let status = group_status(&cloud, group, REPLACEMENT_TAG).unwrap();
        assert!(!status.managed);
        assert!(status.next.is_none());
    }

    #[test]
    fn text_lists_instances() {
        let cloud = cloud();
        let group = cloud.fleet().group("web").unwrap().clone();
        let status = group_status(&cloud, group, REPLACEMENT_TAG).unwrap();

        let text = render_text(&[status]);
        assert!(text.starts_with("web (managed)"));
        assert!(text.contains("i-1"));
        assert!(text.contains("All:Ready"));
        assert!(text.contains("next: waiting for instances"));
    }

    #[test]
    fn json_uses_rendered_status() {
        let cloud = cloud();
        let group = cloud.fleet().group("web").unwrap().clone();
        let status = group_status(&cloud, group, REPLACEMENT_TAG).unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["instances"][0]["status"], "All:Ready");
        assert_eq!(json["next"]["kind"], "await_readiness");
    }
}
