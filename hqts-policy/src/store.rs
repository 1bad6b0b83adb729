use std::collections::BTreeMap;

use hqts_common::{PolicyId, Priority, NO_PARENT_POLICY_ID};
use thiserror::Error;
use tracing::debug;

use crate::ShapingPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy {0} already exists")]
    DuplicateId(PolicyId),
    #[error("policy {0} not found")]
    UnknownPolicy(PolicyId),
    #[error("parent policy {0} not found")]
    UnknownParent(PolicyId),
    #[error("policy {0} cannot be its own parent")]
    SelfParent(PolicyId),
    #[error("policy {0} still has children")]
    HasChildren(PolicyId),
    #[error("policy id is immutable; attempted to change {from} to {to}")]
    IdEdited { from: PolicyId, to: PolicyId },
}

/// Multi-indexed collection of shaping policies.
///
/// Primary storage is ordered by id. Secondary indices cover parent id,
/// priority level, and name, each mapping to the ids that carry the key. All
/// mutation goes through [`insert`](Self::insert), [`remove`](Self::remove),
/// and [`modify`](Self::modify), which keep every index consistent or fail
/// without a partial update.
///
/// `modify` exists because the policer debits token-bucket state on every
/// packet: the accumulated bucket state must be mutated in place, not copied
/// out and back in.
#[derive(Debug, Default)]
pub struct PolicyStore {
    by_id: BTreeMap<PolicyId, ShapingPolicy>,
    by_parent: BTreeMap<PolicyId, Vec<PolicyId>>,
    by_priority: BTreeMap<Priority, Vec<PolicyId>>,
    by_name: BTreeMap<String, Vec<PolicyId>>,
}

fn index_insert<K: Ord>(index: &mut BTreeMap<K, Vec<PolicyId>>, key: K, id: PolicyId) {
    index.entry(key).or_default().push(id);
}

fn index_remove<K: Ord>(index: &mut BTreeMap<K, Vec<PolicyId>>, key: &K, id: PolicyId) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|&other| other != id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a policy. Fails on id collision, a self-parent, or a parent
    /// that is not already present. `children_ids` is derived: whatever the
    /// caller put there is discarded, and the parent's list gains this id.
    pub fn insert(&mut self, mut policy: ShapingPolicy) -> Result<(), PolicyError> {
        let id = policy.id;
        if self.by_id.contains_key(&id) {
            return Err(PolicyError::DuplicateId(id));
        }
        if policy.parent_id == id {
            return Err(PolicyError::SelfParent(id));
        }
        if policy.parent_id != NO_PARENT_POLICY_ID && !self.by_id.contains_key(&policy.parent_id) {
            return Err(PolicyError::UnknownParent(policy.parent_id));
        }

        policy.children_ids.clear();
        index_insert(&mut self.by_parent, policy.parent_id, id);
        index_insert(&mut self.by_priority, policy.priority_level, id);
        index_insert(&mut self.by_name, policy.name.clone(), id);
        if policy.parent_id != NO_PARENT_POLICY_ID {
            if let Some(parent) = self.by_id.get_mut(&policy.parent_id) {
                parent.children_ids.push(id);
            }
        }
        debug!(policy = id, parent = policy.parent_id, "inserted shaping policy");
        self.by_id.insert(id, policy);
        Ok(())
    }

    /// Removes a leaf policy and scrubs it from every index. Policies that
    /// still have children cannot be removed.
    pub fn remove(&mut self, id: PolicyId) -> Result<ShapingPolicy, PolicyError> {
        let existing = self.by_id.get(&id).ok_or(PolicyError::UnknownPolicy(id))?;
        if !existing.children_ids.is_empty() {
            return Err(PolicyError::HasChildren(id));
        }
        let Some(policy) = self.by_id.remove(&id) else {
            return Err(PolicyError::UnknownPolicy(id));
        };
        index_remove(&mut self.by_parent, &policy.parent_id, id);
        index_remove(&mut self.by_priority, &policy.priority_level, id);
        index_remove(&mut self.by_name, &policy.name, id);
        if policy.parent_id != NO_PARENT_POLICY_ID {
            if let Some(parent) = self.by_id.get_mut(&policy.parent_id) {
                parent.children_ids.retain(|&child| child != id);
            }
        }
        Ok(policy)
    }

    pub fn get(&self, id: PolicyId) -> Option<&ShapingPolicy> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: PolicyId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All policies in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapingPolicy> {
        self.by_id.values()
    }

    /// Children of `parent`. Passing [`NO_PARENT_POLICY_ID`] yields the roots.
    pub fn children_of(&self, parent: PolicyId) -> impl Iterator<Item = &ShapingPolicy> {
        self.ids_to_policies(self.by_parent.get(&parent))
    }

    /// Policies at exactly `priority_level`.
    pub fn with_priority(&self, priority_level: Priority) -> impl Iterator<Item = &ShapingPolicy> {
        self.ids_to_policies(self.by_priority.get(&priority_level))
    }

    /// Policies carrying exactly `name`.
    pub fn named(&self, name: &str) -> impl Iterator<Item = &ShapingPolicy> {
        self.ids_to_policies(self.by_name.get(name))
    }

    fn ids_to_policies<'a>(
        &'a self,
        ids: Option<&'a Vec<PolicyId>>,
    ) -> impl Iterator<Item = &'a ShapingPolicy> {
        ids.into_iter().flatten().filter_map(|id| self.by_id.get(id))
    }

    /// Hands `f` exclusive access to the policy and re-syncs every index the
    /// closure touched. The primary key is immutable and `children_ids` is
    /// derived; edits to either are undone (an id edit also fails the call).
    /// Re-parenting onto a missing policy or onto itself restores the
    /// pre-closure record and errors. No partial updates escape.
    pub fn modify<R>(
        &mut self,
        id: PolicyId,
        f: impl FnOnce(&mut ShapingPolicy) -> R,
    ) -> Result<R, PolicyError> {
        let Some(policy) = self.by_id.get_mut(&id) else {
            return Err(PolicyError::UnknownPolicy(id));
        };
        let before = policy.clone();
        let out = f(policy);

        let new_id = policy.id;
        let new_parent = policy.parent_id;
        let new_priority = policy.priority_level;
        let new_name = policy.name.clone();
        policy.children_ids = before.children_ids.clone();

        if new_id != id {
            debug!(policy = id, attempted = new_id, "rolling back primary-key edit");
            self.by_id.insert(id, before);
            return Err(PolicyError::IdEdited { from: id, to: new_id });
        }
        if new_parent != before.parent_id {
            if new_parent == id {
                self.by_id.insert(id, before);
                return Err(PolicyError::SelfParent(id));
            }
            if new_parent != NO_PARENT_POLICY_ID && !self.by_id.contains_key(&new_parent) {
                self.by_id.insert(id, before);
                return Err(PolicyError::UnknownParent(new_parent));
            }
            index_remove(&mut self.by_parent, &before.parent_id, id);
            index_insert(&mut self.by_parent, new_parent, id);
            if before.parent_id != NO_PARENT_POLICY_ID {
                if let Some(old_parent) = self.by_id.get_mut(&before.parent_id) {
                    old_parent.children_ids.retain(|&child| child != id);
                }
            }
            if new_parent != NO_PARENT_POLICY_ID {
                if let Some(parent) = self.by_id.get_mut(&new_parent) {
                    parent.children_ids.push(id);
                }
            }
        }
        if new_priority != before.priority_level {
            index_remove(&mut self.by_priority, &before.priority_level, id);
            index_insert(&mut self.by_priority, new_priority, id);
        }
        if new_name != before.name {
            index_remove(&mut self.by_name, &before.name, id);
            index_insert(&mut self.by_name, new_name, id);
        }
        Ok(out)
    }
}
