//! Dependency resolution over the catalog.
//!
//! A load unit is a catalog entry together with its owned children. A unit's
//! dependencies are the union of its members' dependencies that lie outside
//! the unit. Units are ordered depth-first so every dependency precedes the
//! units that need it.

use std::collections::{HashMap, HashSet};

use super::error::RegistryError;
use crate::component::{ComponentId, ModuleMetadata};

pub(crate) type Catalog = HashMap<ComponentId, ModuleMetadata>;

/// Members of the unit rooted at `root`, grouped by depth.
pub(crate) fn unit_levels(
    catalog: &Catalog,
    root: &ComponentId,
) -> Result<Vec<Vec<ComponentId>>, RegistryError> {
    let mut seen: HashSet<ComponentId> = HashSet::new();
    let mut levels = Vec::new();
    let mut frontier = vec![root.clone()];
    // Tracks the owner of each member so an ownership loop reports its chain.
    let mut owner: HashMap<ComponentId, ComponentId> = HashMap::new();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for member in &frontier {
            if !seen.insert(member.clone()) {
                let chain = ownership_chain(&owner, member);
                if chain.len() > 1 && chain.first() == chain.last() {
                    return Err(RegistryError::CircularDependency { cycle: chain });
                }
                return Err(RegistryError::OwnershipConflict {
                    child: member.clone(),
                    parent: owner.get(member).cloned().unwrap_or_else(|| root.clone()),
                });
            }
            let meta = catalog
                .get(member)
                .ok_or_else(|| RegistryError::not_found(member))?;
            for child in &meta.children {
                owner.insert(child.clone(), member.clone());
                next.push(child.clone());
            }
        }
        levels.push(std::mem::replace(&mut frontier, next));
    }
    Ok(levels)
}

fn ownership_chain(owner: &HashMap<ComponentId, ComponentId>, start: &ComponentId) -> Vec<ComponentId> {
    let mut chain = vec![start.clone()];
    let mut current = start;
    while let Some(parent) = owner.get(current) {
        chain.push(parent.clone());
        if parent == start || chain.len() > owner.len() + 1 {
            break;
        }
        current = parent;
    }
    chain.reverse();
    chain
}

/// Entry that lists `id` among its children, if any.
pub(crate) fn owner_of<'a>(catalog: &'a Catalog, id: &ComponentId) -> Option<&'a ComponentId> {
    catalog
        .values()
        .find(|meta| meta.children.contains(id))
        .map(|meta| &meta.identifier)
}

/// Where a load of `id` has to start: the outermost owner that is not
/// loaded yet, plus the loaded owner it attaches under, if any.
pub(crate) fn load_root(
    catalog: &Catalog,
    id: &ComponentId,
    is_loaded: impl Fn(&ComponentId) -> bool,
) -> (ComponentId, Option<ComponentId>) {
    let mut root = id.clone();
    // Bounded so an ownership loop cannot spin; unit_levels reports it later.
    for _ in 0..=catalog.len() {
        match owner_of(catalog, &root) {
            Some(owner) if is_loaded(owner) => return (root, Some(owner.clone())),
            Some(owner) if *owner != *id => root = owner.clone(),
            _ => break,
        }
    }
    (root, None)
}

/// External dependencies of the unit rooted at `root`.
fn unit_dependencies(catalog: &Catalog, root: &ComponentId) -> Result<Vec<ComponentId>, RegistryError> {
    let levels = unit_levels(catalog, root)?;
    let members: HashSet<&ComponentId> = levels.iter().flatten().collect();
    let mut deps = Vec::new();
    // Deterministic order: members by depth, dependencies in declaration order.
    for level in &levels {
        for member in level {
            if let Some(meta) = catalog.get(member) {
                for dep in &meta.dependencies {
                    if !members.contains(dep) && !deps.contains(dep) {
                        deps.push(dep.clone());
                    }
                }
            }
        }
    }
    Ok(deps)
}

/// Units to load for `target`, dependencies first, skipping anything for
/// which `is_loaded` is true. Fails before anything is loaded if the graph
/// has a cycle or references an unknown identifier.
pub(crate) fn load_order(
    catalog: &Catalog,
    target: &ComponentId,
    is_loaded: impl Fn(&ComponentId) -> bool,
) -> Result<Vec<ComponentId>, RegistryError> {
    let owners: HashMap<&ComponentId, &ComponentId> = catalog
        .values()
        .flat_map(|meta| meta.children.iter().map(move |child| (child, &meta.identifier)))
        .collect();
    let walk = Walk { catalog, owners, is_loaded };
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    walk.visit(target, &mut stack, &mut done, &mut order)?;
    Ok(order)
}

struct Walk<'a, F> {
    catalog: &'a Catalog,
    /// Child id to owning entry, so a dependency on an owned child loads its owner.
    owners: HashMap<&'a ComponentId, &'a ComponentId>,
    is_loaded: F,
}

impl<F: Fn(&ComponentId) -> bool> Walk<'_, F> {
    fn owning_unit(&self, id: &ComponentId) -> ComponentId {
        let mut current = id;
        for _ in 0..=self.owners.len() {
            if (self.is_loaded)(current) {
                break;
            }
            match self.owners.get(current) {
                Some(owner) => current = *owner,
                None => break,
            }
        }
        current.clone()
    }

    fn visit(
        &self,
        unit: &ComponentId,
        stack: &mut Vec<ComponentId>,
        done: &mut HashSet<ComponentId>,
        order: &mut Vec<ComponentId>,
    ) -> Result<(), RegistryError> {
        if done.contains(unit) || (self.is_loaded)(unit) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|id| id == unit) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(unit.clone());
            return Err(RegistryError::CircularDependency { cycle });
        }
        if !self.catalog.contains_key(unit) {
            return Err(RegistryError::not_found(unit));
        }

        stack.push(unit.clone());
        for dep in unit_dependencies(self.catalog, unit)? {
            let dep = self.owning_unit(&dep);
            self.visit(&dep, stack, done, order)?;
        }
        stack.pop();

        done.insert(unit.clone());
        order.push(unit.clone());
        Ok(())
    }
}
