//! Serializable picture of a provider account.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use relaunch_core::{CoreError, CoreResult, Group, Instance, LoadBalancerHealth, TargetHealth};

/// Groups plus the health records their attachments report.
///
/// Load balancer records are keyed by load balancer name, target group
/// records by target group identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub instance_health: BTreeMap<String, Vec<LoadBalancerHealth>>,
    #[serde(default)]
    pub target_health: BTreeMap<String, Vec<TargetHealth>>,
}

impl Fleet {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            groups,
            ..Self::default()
        }
    }

    /// Load a JSON world file and validate every group in it.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let fleet: Fleet = serde_json::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        for group in &fleet.groups {
            group.validate()?;
        }
        Ok(fleet)
    }

    pub fn to_file(&self, path: &Path) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn set_instance_health(&mut self, load_balancer: &str, records: Vec<LoadBalancerHealth>) {
        self.instance_health.insert(load_balancer.to_string(), records);
    }

    pub fn set_target_health(&mut self, target_group: &str, records: Vec<TargetHealth>) {
        self.target_health.insert(target_group.to_string(), records);
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Find an instance and the name of the group that owns it.
    pub fn instance_mut(&mut self, instance_id: &str) -> Option<(&str, &mut Instance)> {
        self.groups.iter_mut().find_map(|g| {
            let name = g.name.as_str();
            g.instances
                .iter_mut()
                .find(|i| i.id == instance_id)
                .map(|i| (name, i))
        })
    }
}
