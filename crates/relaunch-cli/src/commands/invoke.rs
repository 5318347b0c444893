use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use relaunch_cloud::{CloudCall, DryRun, Fleet, MemoryCloud};
use relaunch_core::RelaunchConfig;
use relaunch_rollout::{Action, Decision, Dispatcher, Event, RolloutPhase};

pub struct InvokeArgs {
    pub world: PathBuf,
    pub event: Option<PathBuf>,
    pub group: Option<String>,
    pub instance: Option<String>,
    pub dry_run: bool,
    pub write_back: bool,
    pub format: String,
}

#[derive(Debug, Serialize)]
struct InvokeReport {
    dry_run: bool,
    decisions: Vec<Decision>,
    /// Mutations suppressed by `--dry-run`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<CloudCall>,
}

pub fn invoke(config: &RelaunchConfig, args: &InvokeArgs) -> anyhow::Result<()> {
    let fleet = Fleet::from_file(&args.world)
        .with_context(|| format!("loading world {}", args.world.display()))?;
    debug!(world = %args.world.display(), groups = fleet.groups.len(), "loaded world");
    let event = build_event(args)?;

    let report = run(
        MemoryCloud::new(fleet),
        &event,
        &config.replacement.tag_key,
        args,
    )?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    if args.write_back {
        println!("✓ Saved {}", args.world.display());
    }

    Ok(())
}

/// Dispatch `event` and, with `--write-back`, save the fleet.
///
/// The fleet is saved even when a group fails, so steps already taken on
/// earlier groups are kept.
fn run(
    cloud: MemoryCloud,
    event: &Event,
    tag_key: &str,
    args: &InvokeArgs,
) -> anyhow::Result<InvokeReport> {
    let outcome = if args.dry_run {
        let dry = DryRun::new(&cloud);
        Dispatcher::new(&dry, tag_key)
            .dispatch(event)
            .map(|decisions| InvokeReport {
                dry_run: true,
                decisions,
                skipped: dry.skipped(),
            })
    } else {
        Dispatcher::new(&cloud, tag_key)
            .dispatch(event)
            .map(|decisions| InvokeReport {
                dry_run: false,
                decisions,
                skipped: Vec::new(),
            })
    };

    if args.write_back {
        cloud
            .into_fleet()
            .to_file(&args.world)
            .with_context(|| format!("writing world {}", args.world.display()))?;
        info!(world = %args.world.display(), failed = outcome.is_err(), "saved world");
    }

    Ok(outcome?)
}

/// The event file wins, then `--group`, then `--instance`; none of them
/// sweeps every group.
fn build_event(args: &InvokeArgs) -> anyhow::Result<Event> {
    if let Some(path) = &args.event {
        return read_event(path);
    }
    Ok(match (&args.group, &args.instance) {
        (Some(group), _) => Event::for_group(group),
        (None, Some(instance)) => Event::for_instance(instance),
        (None, None) => Event::sweep(),
    })
}

fn read_event(path: &Path) -> anyhow::Result<Event> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading event {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing event {}", path.display()))
}

fn render_text(report: &InvokeReport) -> String {
    let mut out = String::new();
    if report.decisions.is_empty() {
        out.push_str("No managed groups matched the event.\n");
        return out;
    }

    for decision in &report.decisions {
        out.push_str(&format!(
            "{}: {}\n",
            decision.group,
            phase_label(&decision.phase)
        ));
        for action in &decision.actions {
            let marker = if report.dry_run { "~" } else { "✓" };
            out.push_str(&format!("  {marker} {}\n", action_label(action)));
        }
        if !decision.waiting_on.is_empty() {
            out.push_str(&format!(
                "  waiting on: {}\n",
                decision.waiting_on.join(", ")
            ));
        }
    }

    if report.dry_run {
        out.push_str(&format!(
            "\nDry run: {} mutation(s) skipped.\n",
            report.skipped.len()
        ));
    }
    out
}

pub(crate) fn phase_label(phase: &RolloutPhase) -> String {
    match phase {
        RolloutPhase::Overshoot { excess } => format!("over max size by {excess}"),
        RolloutPhase::RaiseCapacity => "raising desired capacity".to_string(),
        RolloutPhase::AwaitLaunch => "waiting for launch".to_string(),
        RolloutPhase::AwaitReadiness => "waiting for instances".to_string(),
        RolloutPhase::RetireOld => "retiring an old instance".to_string(),
        RolloutPhase::Complete => "rollout complete".to_string(),
        RolloutPhase::Idle => "idle".to_string(),
    }
}

fn action_label(action: &Action) -> String {
    match action {
        Action::SuspendProcesses { processes } => format!("suspend {}", join(processes)),
        Action::SetDesiredCapacity { desired } => format!("set desired capacity {desired}"),
        Action::ResumeProcesses { processes: Some(p) } => format!("resume {}", join(p)),
        Action::ResumeProcesses { processes: None } => "resume all processes".to_string(),
        Action::MarkUnhealthy { instance_id } => format!("mark {instance_id} unhealthy"),
        Action::Terminate { instance_id } => format!("terminate {instance_id}"),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaunch_core::{
        Capacity, Group, Instance, Operation, REPLACEMENT_PROCESSES, REPLACEMENT_TAG,
    };

    fn args(world: PathBuf) -> InvokeArgs {
        InvokeArgs {
            world,
            event: None,
            group: None,
            instance: None,
            dry_run: false,
            write_back: false,
            format: "text".to_string(),
        }
    }

    fn write_world(dir: &Path) -> PathBuf {
        let group = Group::new("web", Capacity::new(1, 2, 3), "lc-v2")
            .unwrap()
            .with_tag(REPLACEMENT_TAG, "")
            .with_instances(vec![
                Instance::new("i-1", "lc-v1"),
                Instance::new("i-2", "lc-v1"),
            ]);
        let path = dir.join("fleet.json");
        Fleet::new(vec![group]).to_file(&path).unwrap();
        path
    }

    #[test]
    fn event_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().join("fleet.json"));
        assert_eq!(build_event(&a).unwrap(), Event::sweep());

        a.instance = Some("i-1".to_string());
        assert_eq!(build_event(&a).unwrap(), Event::for_instance("i-1"));

        let event_path = dir.path().join("event.json");
        std::fs::write(&event_path, r#"{"detail": {"AutoScalingGroupName": "web"}}"#).unwrap();
        a.event = Some(event_path);
        assert_eq!(build_event(&a).unwrap(), Event::for_group("web"));
    }

    #[test]
    fn malformed_event_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let event_path = dir.path().join("event.json");
        std::fs::write(&event_path, "not json").unwrap();
        let mut a = args(dir.path().join("fleet.json"));
        a.event = Some(event_path);
        assert!(build_event(&a).is_err());
    }

    #[test]
    fn write_back_persists_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let world = write_world(dir.path());
        let mut a = args(world.clone());
        a.write_back = true;

        invoke(&RelaunchConfig::default(), &a).unwrap();

        let fleet = Fleet::from_file(&world).unwrap();
        let group = fleet.group("web").unwrap();
        assert_eq!(group.capacity.desired, 3);
        assert_eq!(group.suspended_processes, REPLACEMENT_PROCESSES.to_vec());
    }

    #[test]
    fn write_back_keeps_steps_taken_before_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let world = dir.path().join("fleet.json");
        let finished = Group::new("api", Capacity::new(1, 1, 2), "lc-v2")
            .unwrap()
            .with_tag(REPLACEMENT_TAG, "")
            .with_instances(vec![Instance::new("a-1", "lc-v2")])
            .with_suspended(&REPLACEMENT_PROCESSES);
        let outdated = Group::new("web", Capacity::new(1, 2, 3), "lc-v2")
            .unwrap()
            .with_tag(REPLACEMENT_TAG, "")
            .with_instances(vec![Instance::new("i-1", "lc-v1")]);
        let cloud = MemoryCloud::new(Fleet::new(vec![finished, outdated]));
        cloud.fail_on(Operation::SuspendProcesses);
        let mut a = args(world.clone());
        a.write_back = true;

        let result = run(cloud, &Event::sweep(), REPLACEMENT_TAG, &a);
        assert!(result.is_err());

        let fleet = Fleet::from_file(&world).unwrap();
        assert!(fleet.group("api").unwrap().suspended_processes.is_empty());
        assert!(fleet.group("web").unwrap().suspended_processes.is_empty());
    }

    #[test]
    fn dry_run_leaves_world_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let world = write_world(dir.path());
        let before = std::fs::read_to_string(&world).unwrap();
        let mut a = args(world.clone());
        a.dry_run = true;

        invoke(&RelaunchConfig::default(), &a).unwrap();

        assert_eq!(std::fs::read_to_string(&world).unwrap(), before);
    }

    #[test]
    fn text_report_lists_actions() {
        let report = InvokeReport {
            dry_run: true,
            decisions: vec![Decision {
                group: "web".to_string(),
                phase: RolloutPhase::RetireOld,
                actions: vec![Action::MarkUnhealthy {
                    instance_id: "i-1".to_string(),
                }],
                waiting_on: Vec::new(),
            }],
            skipped: vec![CloudCall::new(
                Operation::SetInstanceHealth,
                "i-1",
                Some("Unhealthy".to_string()),
            )],
        };

        let text = render_text(&report);
        assert!(text.contains("web: retiring an old instance"));
        assert!(text.contains("~ mark i-1 unhealthy"));
        assert!(text.contains("1 mutation(s) skipped"));
    }

    #[test]
    fn empty_report() {
        let report = InvokeReport {
            dry_run: false,
            decisions: Vec::new(),
            skipped: Vec::new(),
        };
        assert!(render_text(&report).starts_with("No managed groups"));
    }
}
