//! Group directory - named rooms, membership, and the seat cap
//!
//! Groups are created lazily on first join and never deleted. Membership is
//! capped at [`MAX_MEMBERS`] concurrent members per group; being a member is
//! distinct from being *active* (tuned in), which the session registry
//! tracks.

use crate::registry::SessionId;
use std::collections::BTreeMap;

/// Hard cap on concurrent members per group.
pub const MAX_MEMBERS: usize = 10;

/// Outcome of the admission gate evaluated before a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The session may join (or return to) the group
    Allowed,
    /// The session is already tuned to this group
    AlreadyMember,
    /// The group is at capacity and the session holds no seat in it
    Full,
}

/// One named room.
pub struct Group {
    members: Vec<SessionId>,
}

impl Group {
    fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[SessionId] {
        &self.members
    }

    pub fn is_member(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }
}

/// Directory of every group ever joined. A `BTreeMap` keeps iteration in
/// name order, which makes [`membership_group_of`](Self::membership_group_of)
/// deterministic.
#[derive(Default)]
pub struct GroupDirectory {
    groups: BTreeMap<String, Group>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group record if the name is unseen.
    pub fn ensure_exists(&mut self, name: &str) {
        self.groups.entry(name.to_string()).or_insert_with(Group::new);
    }

    /// Evaluate the admission gate for a session whose current active group
    /// is `active_group`. Rejoining the group you are tuned to is rejected;
    /// returning to a group you already hold a seat in is always allowed.
    pub fn check_admission(
        &self,
        name: &str,
        id: SessionId,
        active_group: Option<&str>,
    ) -> Admission {
        if active_group == Some(name) {
            return Admission::AlreadyMember;
        }
        let Some(group) = self.groups.get(name) else {
            return Admission::Allowed;
        };
        if group.members.len() >= MAX_MEMBERS && !group.is_member(id) {
            return Admission::Full;
        }
        Admission::Allowed
    }

    /// Add a member. Returns false without effect if the handle already
    /// holds a seat; true means this is the session's first time in the
    /// group (the caller replays the transcript on true).
    pub fn add_member(&mut self, name: &str, id: SessionId) -> bool {
        let group = self.groups.entry(name.to_string()).or_insert_with(Group::new);
        if group.is_member(id) {
            return false;
        }
        group.members.push(id);
        true
    }

    /// Remove a member's seat. Order is not significant, so swap-remove.
    pub fn remove_member(&mut self, name: &str, id: SessionId) {
        if let Some(group) = self.groups.get_mut(name) {
            if let Some(pos) = group.members.iter().position(|&m| m == id) {
                group.members.swap_remove(pos);
            }
        }
    }

    /// Some group in which the handle still holds a seat. With several
    /// candidates the lexicographically smallest name wins.
    pub fn membership_group_of(&self, id: SessionId) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, group)| group.is_member(id))
            .map(|(name, _)| name.as_str())
    }

    /// Every group in which the handle holds a seat, in name order.
    pub fn memberships_of(&self, id: SessionId) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, group)| group.is_member(id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Member handles of a group, empty if the group is unknown.
    pub fn members_of(&self, name: &str) -> &[SessionId] {
        self.groups.get(name).map(Group::members).unwrap_or(&[])
    }
}
