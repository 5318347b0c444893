//! Per-invocation group snapshot and its instance filter sets.
//!
//! A [`Snapshot`] classifies every instance once at construction and
//! caches the standard filter sets. [`InstanceSet`] views borrow from the
//! snapshot and can be narrowed further (`old_instances().unready()`)
//! without classifying anything again.

use std::borrow::Cow;

use relaunch_core::{CloudApi, CloudResult, Group, Instance};

use crate::classifier::{classify, CompositeStatus, HealthIndex};

/// A group plus the derived status of each of its instances.
#[derive(Debug, Clone)]
pub struct Snapshot {
    group: Group,
    /// Aligned with `group.instances`.
    statuses: Vec<CompositeStatus>,
    is_new: Vec<bool>,
    new: Vec<usize>,
    old: Vec<usize>,
    launching: Vec<usize>,
    terminating: Vec<usize>,
    unready: Vec<usize>,
}

impl Snapshot {
    /// Classify `group`'s instances against pre-fetched health records.
    pub fn new(group: Group, index: &HealthIndex) -> Self {
        let statuses: Vec<CompositeStatus> =
            group.instances.iter().map(|i| classify(i, index)).collect();
        let is_new: Vec<bool> = group.instances.iter().map(|i| group.is_new(i)).collect();

        let positions = |pred: &dyn Fn(usize) -> bool| -> Vec<usize> {
            (0..statuses.len()).filter(|&i| pred(i)).collect()
        };

        let new = positions(&|i| is_new[i]);
        let old = positions(&|i| !is_new[i]);
        let launching = positions(&|i| statuses[i].is_launching());
        let terminating = positions(&|i| statuses[i].is_terminating());
        let unready = positions(&|i| !statuses[i].is_ready());

        Self {
            group,
            statuses,
            is_new,
            new,
            old,
            launching,
            terminating,
            unready,
        }
    }

    /// Fetch health records for `group` and classify its instances.
    pub fn fetch(group: Group, cloud: &dyn CloudApi) -> CloudResult<Self> {
        let index = HealthIndex::fetch(&group, cloud)?;
        Ok(Self::new(group, &index))
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.group.name
    }

    /// Number of instances currently in the group.
    pub fn instance_count(&self) -> usize {
        self.group.instances.len()
    }

    /// Composite status of the instance with `instance_id`.
    pub fn status(&self, instance_id: &str) -> Option<&CompositeStatus> {
        self.group
            .instances
            .iter()
            .position(|i| i.id == instance_id)
            .map(|pos| &self.statuses[pos])
    }

    pub fn all(&self) -> InstanceSet<'_> {
        InstanceSet {
            snapshot: self,
            members: Cow::Owned((0..self.statuses.len()).collect()),
        }
    }

    /// Instances launched from the group's current launch configuration.
    pub fn new_instances(&self) -> InstanceSet<'_> {
        self.cached(&self.new)
    }

    /// Instances launched from any other launch configuration.
    pub fn old_instances(&self) -> InstanceSet<'_> {
        self.cached(&self.old)
    }

    pub fn launching(&self) -> InstanceSet<'_> {
        self.cached(&self.launching)
    }

    pub fn terminating(&self) -> InstanceSet<'_> {
        self.cached(&self.terminating)
    }

    pub fn unready(&self) -> InstanceSet<'_> {
        self.cached(&self.unready)
    }

    fn cached<'a>(&'a self, members: &'a [usize]) -> InstanceSet<'a> {
        InstanceSet {
            snapshot: self,
            members: Cow::Borrowed(members),
        }
    }
}

/// An ordered subset of a snapshot's instances.
///
/// Order follows the provider's listing of the group.
#[derive(Debug, Clone)]
pub struct InstanceSet<'a> {
    snapshot: &'a Snapshot,
    members: Cow<'a, [usize]>,
}

impl<'a> InstanceSet<'a> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn first(&self) -> Option<&'a Instance> {
        self.iter().next()
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.iter().any(|i| i.id == instance_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Instance> + '_ {
        let instances = &self.snapshot.group.instances;
        self.members.iter().map(move |&pos| &instances[pos])
    }

    /// Instances paired with their composite status.
    pub fn entries(&self) -> impl Iterator<Item = (&'a Instance, &'a CompositeStatus)> + '_ {
        let snapshot = self.snapshot;
        self.members
            .iter()
            .map(move |&pos| (&snapshot.group.instances[pos], &snapshot.statuses[pos]))
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.iter().map(|i| i.id.as_str()).collect()
    }

    /// Narrow the set to members matching `pred`.
    pub fn filter(&self, pred: impl Fn(&Instance, &CompositeStatus) -> bool) -> InstanceSet<'a> {
        let snapshot = self.snapshot;
        let members = self
            .members
            .iter()
            .copied()
            .filter(|&pos| pred(&snapshot.group.instances[pos], &snapshot.statuses[pos]))
            .collect::<Vec<_>>();
        InstanceSet {
            snapshot,
            members: Cow::Owned(members),
        }
    }

    pub fn new_instances(&self) -> InstanceSet<'a> {
        self.narrow(|s, pos| s.is_new[pos])
    }

    pub fn old_instances(&self) -> InstanceSet<'a> {
        self.narrow(|s, pos| !s.is_new[pos])
    }

    pub fn launching(&self) -> InstanceSet<'a> {
        self.filter(|_, status| status.is_launching())
    }

    pub fn terminating(&self) -> InstanceSet<'a> {
        self.filter(|_, status| status.is_terminating())
    }

    pub fn unready(&self) -> InstanceSet<'a> {
        self.filter(|_, status| !status.is_ready())
    }

    fn narrow(&self, pred: impl Fn(&Snapshot, usize) -> bool) -> InstanceSet<'a> {
        let snapshot = self.snapshot;
        let members = self
            .members
            .iter()
            .copied()
            .filter(|&pos| pred(snapshot, pos))
            .collect::<Vec<_>>();
        InstanceSet {
            snapshot,
            members: Cow::Owned(members),
        }
    }
}
