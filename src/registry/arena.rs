//! Arena of loaded components indexed by id.
//!
//! Children are id lists and the parent is an optional id, so the ownership
//! tree never forms reference cycles.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::component::instance::ComponentInstance;
use crate::component::{Component, ComponentId, ComponentPath, HierarchyLevel};

/// Static facts about a loaded component.
#[derive(Debug, Clone)]
pub(crate) struct ComponentRecord {
    pub path: ComponentPath,
    pub level: HierarchyLevel,
    pub dependencies: BTreeSet<ComponentId>,
    pub capabilities: BTreeSet<String>,
    pub children: Vec<ComponentId>,
    pub parent: Option<ComponentId>,
    pub hot_swappable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub instance: Arc<ComponentInstance>,
    pub record: ComponentRecord,
}

impl Slot {
    pub fn snapshot(&self) -> Component {
        Component {
            id: self.instance.id().clone(),
            path: self.record.path.clone(),
            hierarchy_level: self.record.level,
            version: self.instance.version().clone(),
            dependencies: self.record.dependencies.clone(),
            capabilities: self.record.capabilities.clone(),
            children: self.record.children.clone(),
            parent: self.record.parent.clone(),
            status: self.instance.status(),
            hot_swappable: self.record.hot_swappable,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ComponentArena {
    slots: HashMap<ComponentId, Slot>,
}

impl ComponentArena {
    pub fn get(&self, id: &ComponentId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.slots.keys()
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Insert a slot. The caller guarantees the id is not already present.
    pub fn insert(&mut self, slot: Slot) {
        let id = slot.instance.id().clone();
        debug_assert!(!self.slots.contains_key(&id), "duplicate component {}", id);
        self.slots.insert(id, slot);
    }

    /// Subtree rooted at `id`, grouped by depth (root group first).
    pub fn subtree_levels(&self, id: &ComponentId) -> Vec<Vec<ComponentId>> {
        let mut levels = Vec::new();
        let mut frontier: Vec<ComponentId> = if self.contains(id) {
            vec![id.clone()]
        } else {
            Vec::new()
        };
        while !frontier.is_empty() {
            let next = frontier
                .iter()
                .filter_map(|member| self.slots.get(member))
                .flat_map(|slot| slot.record.children.iter().cloned())
                .filter(|child| self.contains(child))
                .collect();
            levels.push(std::mem::replace(&mut frontier, next));
        }
        levels
    }

    /// Loaded components outside `members` that depend on any member.
    pub fn dependents_of(&self, members: &HashSet<ComponentId>) -> Vec<ComponentId> {
        let mut dependents: Vec<ComponentId> = self
            .slots
            .iter()
            .filter(|(id, _)| !members.contains(*id))
            .filter(|(_, slot)| slot.record.dependencies.iter().any(|dep| members.contains(dep)))
            .map(|(id, _)| id.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Remove a whole subtree and detach its root from its parent. Returns
    /// the removed slots grouped by depth.
    pub fn remove_subtree(&mut self, id: &ComponentId) -> Vec<Vec<Slot>> {
        let levels = self.subtree_levels(id);
        let parent = self.slots.get(id).and_then(|slot| slot.record.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.slots.get_mut(&p)) {
            parent.record.children.retain(|child| child != id);
        }
        levels
            .into_iter()
            .map(|group| group.iter().filter_map(|member| self.slots.remove(member)).collect())
            .collect()
    }

    /// Swap the subtree rooted at `id` for `staged` in one step. The parent's
    /// child list is untouched, so the new root keeps its position. Returns
    /// the retired slots grouped by depth.
    pub fn replace_subtree(&mut self, id: &ComponentId, staged: Vec<Vec<Slot>>) -> Vec<Vec<Slot>> {
        let retired: Vec<Vec<Slot>> = self
            .subtree_levels(id)
            .into_iter()
            .map(|group| group.iter().filter_map(|member| self.slots.remove(member)).collect())
            .collect();
        for slot in staged.into_iter().flatten() {
            self.insert(slot);
        }
        retired
    }

    /// Re-attach `child` under `parent` if it is not already listed.
    pub fn link_child(&mut self, parent: &ComponentId, child: &ComponentId) {
        if let Some(slot) = self.slots.get_mut(parent) {
            if !slot.record.children.contains(child) {
                slot.record.children.push(child.clone());
            }
        }
    }
}
