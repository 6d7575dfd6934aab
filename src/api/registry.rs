use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::core::{InstanceHandle, InstanceId};
use crate::error::{ChartError, ChartResult};

/// Identity of a coordination group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupId {
    /// Created implicitly by one `connect` call.
    Connected(u64),
    /// Keyed by a caller-chosen name; instances join incrementally.
    Named(String),
}

impl GroupId {
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(raw) => write!(f, "g_{raw}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

type Members = IndexMap<InstanceId, InstanceHandle>;

/// Group membership table.
///
/// An instance belongs to at most one connect-call group and to any number
/// of named groups. Member order is insertion order and drives both peer
/// replay order and composite paint order.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: IndexMap<GroupId, Members>,
    connected_of: HashMap<InstanceId, GroupId>,
    named_of: HashMap<InstanceId, SmallVec<[GroupId; 2]>>,
    next_group: u64,
}

impl GroupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `handles` into one group and returns its id.
    ///
    /// Handles already in another connect-call group move into the new one.
    /// Connecting exactly the members of an existing group returns that
    /// group unchanged.
    pub fn connect(&mut self, handles: &[InstanceHandle]) -> ChartResult<GroupId> {
        let unique = unique_live_handles(handles)?;
        if unique.len() < 2 {
            return Err(ChartError::InvalidGroup(format!(
                "connect needs at least 2 live instances, got {}",
                unique.len()
            )));
        }

        if let Some(existing) = self.existing_group_with_exactly(&unique) {
            debug!(group = %existing, "connect matched an existing group");
            return Ok(existing);
        }

        self.next_group += 1;
        let group = GroupId::Connected(self.next_group);
        for id in unique.keys() {
            self.leave_connected(*id);
        }
        for id in unique.keys() {
            self.connected_of.insert(*id, group.clone());
        }
        debug!(group = %group, members = unique.len(), "connected instances");
        self.groups.insert(group.clone(), unique);
        Ok(group)
    }

    /// Adds `handles` to the named group `name`, creating it if needed.
    pub fn connect_named(&mut self, name: &str, handles: &[InstanceHandle]) -> ChartResult<GroupId> {
        if name.is_empty() {
            return Err(ChartError::InvalidGroup(
                "group name must not be empty".to_owned(),
            ));
        }
        let unique = unique_live_handles(handles)?;
        if unique.is_empty() {
            return Err(ChartError::InvalidGroup(format!(
                "named group `{name}` needs at least one live instance"
            )));
        }

        let group = GroupId::Named(name.to_owned());
        let members = self.groups.entry(group.clone()).or_default();
        for (id, handle) in unique {
            members.entry(id).or_insert(handle);
            let joined = self.named_of.entry(id).or_default();
            if !joined.contains(&group) {
                joined.push(group.clone());
            }
        }
        debug!(group = %group, members = members.len(), "joined named group");
        Ok(group)
    }

    /// Removes `instance` from every group. Returns `true` if it was grouped.
    pub fn disconnect(&mut self, instance: InstanceId) -> bool {
        let left_connected = self.leave_connected(instance);
        let mut left_named = false;
        if let Some(groups) = self.named_of.remove(&instance) {
            for group in groups {
                left_named |= self.remove_member(&group, instance);
            }
        }
        if left_connected || left_named {
            debug!(instance = %instance, "disconnected instance");
        }
        left_connected || left_named
    }

    /// Dissolves a whole group. Returns its former members.
    pub fn remove_group(&mut self, group: &GroupId) -> Option<Vec<InstanceId>> {
        let members = self.groups.shift_remove(group)?;
        for id in members.keys() {
            match group {
                GroupId::Connected(_) => {
                    self.connected_of.remove(id);
                }
                GroupId::Named(_) => {
                    if let Some(joined) = self.named_of.get_mut(id) {
                        joined.retain(|entry| entry != group);
                        if joined.is_empty() {
                            self.named_of.remove(id);
                        }
                    }
                }
            }
        }
        debug!(group = %group, "removed group");
        Some(members.into_keys().collect())
    }

    /// Marks `handle` disposed and drops it from every group.
    pub fn dispose(&mut self, handle: &InstanceHandle) -> bool {
        handle.mark_disposed();
        self.disconnect(handle.id())
    }

    #[must_use]
    pub fn is_grouped(&self, instance: InstanceId) -> bool {
        self.connected_of.contains_key(&instance) || self.named_of.contains_key(&instance)
    }

    /// Ad-hoc group of `instance`, if any.
    #[must_use]
    pub fn connected_group_of(&self, instance: InstanceId) -> Option<&GroupId> {
        self.connected_of.get(&instance)
    }

    /// Every group containing `instance`, in registry order.
    #[must_use]
    pub fn groups_of(&self, instance: InstanceId) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains_key(&instance))
            .map(|(group, _)| group.clone())
            .collect()
    }

    /// Live members of `group` in insertion order.
    #[must_use]
    pub fn members(&self, group: &GroupId) -> Option<Vec<InstanceHandle>> {
        self.groups.get(group).map(|members| {
            members
                .values()
                .filter(|handle| handle.is_alive())
                .cloned()
                .collect()
        })
    }

    /// Ordered union of the live members of every group containing
    /// `instance`, itself included. `None` when it belongs to no group.
    #[must_use]
    pub fn connected_set(&self, instance: InstanceId) -> Option<Vec<InstanceHandle>> {
        if !self.is_grouped(instance) {
            return None;
        }
        let mut seen = IndexSet::new();
        let mut out = Vec::new();
        for members in self.groups.values() {
            if !members.contains_key(&instance) {
                continue;
            }
            for (id, handle) in members {
                if handle.is_alive() && seen.insert(*id) {
                    out.push(handle.clone());
                }
            }
        }
        Some(out)
    }

    /// Live peers sharing any group with `instance`; empty when ungrouped.
    #[must_use]
    pub fn members_of(&self, instance: InstanceId) -> Vec<InstanceHandle> {
        self.connected_set(instance)
            .unwrap_or_default()
            .into_iter()
            .filter(|handle| handle.id() != instance)
            .collect()
    }

    /// Registered handle for `instance` if it is still alive and grouped.
    #[must_use]
    pub fn live_handle(&self, instance: InstanceId) -> Option<&InstanceHandle> {
        self.groups
            .values()
            .find_map(|members| members.get(&instance))
            .filter(|handle| handle.is_alive())
    }

    /// Drops handles whose instance was disposed or dropped by its owner.
    pub fn prune_dead(&mut self) -> Vec<InstanceId> {
        let dead: IndexSet<InstanceId> = self
            .groups
            .values()
            .flat_map(|members| members.values())
            .filter(|handle| !handle.is_alive())
            .map(InstanceHandle::id)
            .collect();
        for id in &dead {
            warn!(instance = %id, "pruning dead instance from its groups");
            self.disconnect(*id);
        }
        dead.into_iter().collect()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn contains_group(&self, group: &GroupId) -> bool {
        self.groups.contains_key(group)
    }

    fn existing_group_with_exactly(&self, unique: &Members) -> Option<GroupId> {
        let first = unique.keys().next()?;
        let group = self.connected_of.get(first)?;
        let members = self.groups.get(group)?;
        let same = members.len() == unique.len() && unique.keys().all(|id| members.contains_key(id));
        same.then(|| group.clone())
    }

    fn leave_connected(&mut self, instance: InstanceId) -> bool {
        match self.connected_of.remove(&instance) {
            Some(group) => self.remove_member(&group, instance),
            None => false,
        }
    }

    fn remove_member(&mut self, group: &GroupId, instance: InstanceId) -> bool {
        let Some(members) = self.groups.get_mut(group) else {
            return false;
        };
        let removed = members.shift_remove(&instance).is_some();
        if members.is_empty() {
            self.groups.shift_remove(group);
            debug!(group = %group, "group dissolved after last member left");
        }
        removed
    }
}

fn unique_live_handles(handles: &[InstanceHandle]) -> ChartResult<Members> {
    let mut unique = Members::new();
    for handle in handles {
        if !handle.is_alive() {
            return Err(ChartError::InvalidGroup(format!(
                "instance {} is disposed",
                handle.id()
            )));
        }
        unique.entry(handle.id()).or_insert_with(|| handle.clone());
    }
    Ok(unique)
}
