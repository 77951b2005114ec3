//! The serialized lifecycle manager.
//!
//! All registry state sits behind one async mutex held for the whole of each
//! lifecycle operation. Work inside an operation (initializing or cleaning up
//! the members of one tree depth) runs concurrently. Executions and message
//! deliveries take a handle under the lock and run after releasing it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use semver::Version;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use super::arena::{ComponentArena, ComponentRecord, Slot};
use super::error::{RegistryError, UnloadBlocker};
use super::history::{HistoryEntry, VersionHistory, VersionSource};
use super::resolver::{self, Catalog};
use crate::build::BuildArtifact;
use crate::component::instance::ComponentInstance;
use crate::component::{
    CatalogError, CatalogProvider, Component, ComponentFactory, ComponentId, ComponentStatus,
    LifecycleError, LoadContext, ModuleMetadata, Payload, PresentationHandle, validate_entries,
};
use crate::messaging::{
    BroadcastReport, ComponentMessage, Destination, MessageRouter, MessageSink, RouterStats,
};
use crate::telemetry::{self, log_lifecycle_event, LifecycleEvent, OperationSpan, SpanExt};

struct RegistryState {
    catalog: Catalog,
    artifacts: HashMap<(ComponentId, Version), BuildArtifact>,
    arena: ComponentArena,
    history: VersionHistory,
}

/// Owns the catalog and every loaded component.
pub struct ComponentRegistry {
    state: Mutex<RegistryState>,
    factory: Arc<dyn ComponentFactory>,
    router: MessageRouter,
}

impl ComponentRegistry {
    pub fn new(factory: Arc<dyn ComponentFactory>) -> Self {
        Self::with_history(factory, VersionHistory::new())
    }

    /// Registry seeded with a previously persisted version history.
    pub fn with_history(factory: Arc<dyn ComponentFactory>, history: VersionHistory) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                catalog: HashMap::new(),
                artifacts: HashMap::new(),
                arena: ComponentArena::default(),
                history,
            }),
            factory,
            router: MessageRouter::new(),
        }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Replace catalog entries with whatever the provider reports.
    ///
    /// Versions published from build artifacts and versions currently
    /// loaded survive re-discovery.
    pub async fn discover(&self, provider: &dyn CatalogProvider) -> Result<usize, RegistryError> {
        let entries = provider.discover()?;
        let count = entries.len();
        let mut state = self.state.lock().await;
        for entry in entries {
            let entry = keep_live_versions(&state, entry);
            state.catalog.insert(entry.identifier.clone(), entry);
        }
        info!(entries = count, total = state.catalog.len(), "catalog discovered");
        Ok(count)
    }

    /// Add or replace one catalog entry.
    pub async fn register_metadata(&self, metadata: ModuleMetadata) -> Result<(), RegistryError> {
        validate_entries(std::slice::from_ref(&metadata))?;
        let mut state = self.state.lock().await;
        let metadata = keep_live_versions(&state, metadata);
        state.catalog.insert(metadata.identifier.clone(), metadata);
        Ok(())
    }

    pub async fn catalog_entry(&self, id: &ComponentId) -> Option<ModuleMetadata> {
        self.state.lock().await.catalog.get(id).cloned()
    }

    /// All catalog entries, sorted by identifier.
    pub async fn catalog(&self) -> Vec<ModuleMetadata> {
        let state = self.state.lock().await;
        let mut entries: Vec<ModuleMetadata> = state.catalog.values().cloned().collect();
        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        entries
    }

    /// Make a built artifact loadable: the catalog entry is replaced by one
    /// that also offers the artifact version.
    pub async fn publish_artifact(
        &self,
        id: &ComponentId,
        artifact: BuildArtifact,
    ) -> Result<ModuleMetadata, RegistryError> {
        let mut state = self.state.lock().await;
        let entry = state
            .catalog
            .get(id)
            .ok_or_else(|| RegistryError::not_found(id))?
            .with_version(artifact.version.clone());
        debug!(component = %id, version = %artifact.version, checksum = %artifact.checksum, "artifact published");
        state.catalog.insert(id.clone(), entry.clone());
        state.artifacts.insert((id.clone(), artifact.version.clone()), artifact);
        Ok(entry)
    }

    /// Undo `publish_artifact` for a version that never went live. The
    /// version stays on offer when it is the one running.
    pub async fn withdraw_artifact(&self, id: &ComponentId, version: &Version) {
        let mut state = self.state.lock().await;
        let running = state.arena.get(id).map(|slot| slot.instance.version() == version);
        if running == Some(true) {
            return;
        }
        state.artifacts.remove(&(id.clone(), version.clone()));
        let entry = state.catalog.get(id).map(|entry| entry.without_version(version));
        if let Some(entry) = entry {
            debug!(component = %id, version = %version, "artifact withdrawn");
            state.catalog.insert(id.clone(), entry);
        }
    }

    pub async fn artifact(&self, id: &ComponentId, version: &Version) -> Option<BuildArtifact> {
        let state = self.state.lock().await;
        state.artifacts.get(&(id.clone(), version.clone())).cloned()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn is_module_loaded(&self, id: &ComponentId) -> bool {
        self.state.lock().await.arena.contains(id)
    }

    pub async fn get(&self, id: &ComponentId) -> Option<Component> {
        self.state.lock().await.arena.get(id).map(Slot::snapshot)
    }

    pub async fn version_of(&self, id: &ComponentId) -> Option<Version> {
        let state = self.state.lock().await;
        state.arena.get(id).map(|slot| slot.instance.version().clone())
    }

    /// Snapshots of every loaded component, sorted by id.
    pub async fn loaded(&self) -> Vec<Component> {
        let state = self.state.lock().await;
        let mut components: Vec<Component> = state.arena.slots().map(Slot::snapshot).collect();
        components.sort_by(|a, b| a.id.cmp(&b.id));
        components
    }

    pub async fn loaded_count(&self) -> usize {
        self.state.lock().await.arena.len()
    }

    /// Loaded components advertising `capability`, sorted by id.
    pub async fn find_by_capability(&self, capability: &str) -> Vec<Component> {
        let state = self.state.lock().await;
        let mut found: Vec<Component> = state
            .arena
            .slots()
            .filter(|slot| slot.record.capabilities.contains(capability))
            .map(Slot::snapshot)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    pub async fn presentation(&self, id: &ComponentId) -> Option<PresentationHandle> {
        let instance = self.instance(id).await?;
        instance.presentation()
    }

    pub async fn history(&self, id: &ComponentId) -> Vec<HistoryEntry> {
        self.state.lock().await.history.entries(id).to_vec()
    }

    pub async fn history_snapshot(&self) -> VersionHistory {
        self.state.lock().await.history.clone()
    }

    pub async fn previous_version(&self, id: &ComponentId) -> Option<Version> {
        self.state.lock().await.history.previous_version(id).cloned()
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    async fn instance(&self, id: &ComponentId) -> Option<Arc<ComponentInstance>> {
        let state = self.state.lock().await;
        state.arena.get(id).map(|slot| slot.instance.clone())
    }

    // ------------------------------------------------------------------
    // Load / unload
    // ------------------------------------------------------------------

    /// Load `id` (latest catalogued version when `version` is `None`)
    /// together with its owned children and, first, its dependencies.
    ///
    /// An owned child brings its outermost unloaded owner along, or is
    /// re-attached under an owner that is already running.
    ///
    /// Loading an already-loaded component at a different version hot-swaps
    /// it. Either every unit of the call ends up loaded or none does.
    pub async fn load(&self, id: &ComponentId, version: Option<Version>) -> Result<Component, RegistryError> {
        let span = OperationSpan::new("load", id.as_str());
        let result = self.load_inner(id, version).instrument(span.clone()).await;
        span.record_result(&result);
        result
    }

    async fn load_inner(&self, id: &ComponentId, version: Option<Version>) -> Result<Component, RegistryError> {
        let mut state = self.state.lock().await;
        let meta = state.catalog.get(id).ok_or_else(|| RegistryError::not_found(id))?;

        let version = match version {
            Some(v) => v,
            None => match state.arena.get(id) {
                Some(slot) => slot.instance.version().clone(),
                None => latest(meta)?,
            },
        };
        if !meta.has_version(&version) {
            return Err(RegistryError::NotFound {
                identifier: id.clone(),
                version: Some(version),
            });
        }

        if let Some(slot) = state.arena.get(id) {
            if *slot.instance.version() == version {
                return Ok(slot.snapshot());
            }
            return self.swap_locked(&mut state, id, version, None).await;
        }

        // An owned child arrives with its owner, or attaches under it when
        // the owner is already running.
        let (root, attach_to) = {
            let arena = &state.arena;
            resolver::load_root(&state.catalog, id, |unit| arena.contains(unit))
        };
        let order = {
            let arena = &state.arena;
            resolver::load_order(&state.catalog, &root, |unit| arena.contains(unit))
        };
        let order = match order {
            Ok(order) => order,
            Err(e) => {
                if let RegistryError::CircularDependency { .. } = &e {
                    log_lifecycle_event(LifecycleEvent::CycleDetected, id.as_str(), &e.to_string(), &[]);
                }
                return Err(e);
            }
        };

        let mut committed: Vec<ComponentId> = Vec::new();
        for unit in &order {
            // A dependency owned by an earlier unit arrives with that unit.
            if state.arena.contains(unit) {
                continue;
            }
            let unit_version = if unit == id {
                version.clone()
            } else {
                match state.catalog.get(unit) {
                    Some(meta) => latest(meta)?,
                    None => return Err(RegistryError::not_found(unit)),
                }
            };
            let (parent, pinned) = if *unit == root {
                (attach_to.clone(), (unit != id).then_some((id, &version)))
            } else {
                (None, None)
            };

            let staged = match self.stage(&state, unit, &unit_version, parent.clone(), &HashSet::new(), pinned) {
                Ok(staged) => staged,
                Err(e) => {
                    self.roll_back_units(&mut state, &committed).await;
                    return Err(e);
                }
            };
            if let Err(e) = initialize_levels(&staged).await {
                self.roll_back_units(&mut state, &committed).await;
                log_lifecycle_event(LifecycleEvent::LoadFailed, unit.as_str(), &e.to_string(), &[]);
                return Err(e);
            }

            let members: Vec<(ComponentId, Version)> = staged
                .iter()
                .flatten()
                .map(|slot| (slot.instance.id().clone(), slot.instance.version().clone()))
                .collect();
            for slot in staged.into_iter().flatten() {
                state.arena.insert(slot);
            }
            if let Some(owner) = &parent {
                state.arena.link_child(owner, unit);
            }
            for (member, member_version) in &members {
                let entry = history_entry(&state, member, member_version, None);
                state.history.record(member, entry);
                telemetry::record_load(member.as_str());
                let version = member_version.to_string();
                log_lifecycle_event(
                    LifecycleEvent::Loaded,
                    member.as_str(),
                    "component loaded",
                    &[("version", version.as_str())],
                );
            }
            committed.push(unit.clone());
        }

        telemetry::set_loaded_components(state.arena.len());
        info!(component = %id, version = %version, units = committed.len(), "load complete");
        state
            .arena
            .get(id)
            .map(Slot::snapshot)
            .ok_or_else(|| RegistryError::not_found(id))
    }

    async fn roll_back_units(&self, state: &mut RegistryState, committed: &[ComponentId]) {
        for unit in committed.iter().rev() {
            let removed = state.arena.remove_subtree(unit);
            cleanup_levels(&removed).await;
            warn!(component = %unit, "rolled back partially completed load");
        }
    }

    /// Unload `id` and everything it owns.
    ///
    /// Rejected, before any side effect, when a member has in-flight work or
    /// refuses, or when another loaded component depends on a member.
    pub async fn unload(&self, id: &ComponentId) -> Result<(), RegistryError> {
        let span = OperationSpan::new("unload", id.as_str());
        let result = self.unload_inner(id).instrument(span.clone()).await;
        span.record_result(&result);
        result
    }

    async fn unload_inner(&self, id: &ComponentId) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        if !state.arena.contains(id) {
            return Err(RegistryError::not_found(id));
        }

        if let Err(e) = check_unloadable(&state.arena, id) {
            log_lifecycle_event(LifecycleEvent::UnloadRejected, id.as_str(), &e.to_string(), &[]);
            return Err(e);
        }

        let removed = state.arena.remove_subtree(id);
        cleanup_levels(&removed).await;
        for slot in removed.iter().flatten() {
            telemetry::record_unload(slot.instance.id().as_str());
            log_lifecycle_event(LifecycleEvent::Unloaded, slot.instance.id().as_str(), "component unloaded", &[]);
        }
        telemetry::set_loaded_components(state.arena.len());
        info!(component = %id, members = removed.iter().map(Vec::len).sum::<usize>(), "unload complete");
        Ok(())
    }

    /// Re-create the component at its current version.
    ///
    /// The fresh tree is initialized before the old one is retired, so a
    /// failed reload leaves the original instance running.
    pub async fn reload(&self, id: &ComponentId) -> Result<Component, RegistryError> {
        let span = OperationSpan::new("reload", id.as_str());
        let result = self.reload_inner(id).instrument(span.clone()).await;
        span.record_result(&result);
        result
    }

    async fn reload_inner(&self, id: &ComponentId) -> Result<Component, RegistryError> {
        let mut state = self.state.lock().await;
        let slot = state.arena.get(id).ok_or_else(|| RegistryError::not_found(id))?;
        let version = slot.instance.version().clone();
        self.replace_locked(&mut state, id, &version).await?;
        info!(component = %id, version = %version, "reload complete");
        state
            .arena
            .get(id)
            .map(Slot::snapshot)
            .ok_or_else(|| RegistryError::not_found(id))
    }

    /// Hot-swap a loaded component to `target`. Atomic: on any failure the
    /// previously loaded tree keeps running untouched.
    pub async fn update_module(&self, id: &ComponentId, target: Version) -> Result<Component, RegistryError> {
        self.update_module_from(id, target, None).await
    }

    /// Swap back to the version that ran before the current one.
    pub async fn rollback(&self, id: &ComponentId) -> Result<Component, RegistryError> {
        let previous = {
            let state = self.state.lock().await;
            if !state.arena.contains(id) {
                return Err(RegistryError::not_found(id));
            }
            state
                .history
                .previous_version(id)
                .cloned()
                .ok_or_else(|| RegistryError::NoPreviousVersion(id.clone()))?
        };
        let component = self
            .update_module_from(id, previous.clone(), Some(VersionSource::Rollback))
            .await?;
        let version = previous.to_string();
        log_lifecycle_event(
            LifecycleEvent::RolledBack,
            id.as_str(),
            "component rolled back",
            &[("version", version.as_str())],
        );
        Ok(component)
    }

    async fn update_module_from(
        &self,
        id: &ComponentId,
        target: Version,
        source: Option<VersionSource>,
    ) -> Result<Component, RegistryError> {
        let span = OperationSpan::new("update_module", id.as_str());
        let result = self.update_inner(id, target, source).instrument(span.clone()).await;
        span.record_result(&result);
        result
    }

    async fn update_inner(
        &self,
        id: &ComponentId,
        target: Version,
        source: Option<VersionSource>,
    ) -> Result<Component, RegistryError> {
        let mut state = self.state.lock().await;
        let meta = state.catalog.get(id).ok_or_else(|| RegistryError::not_found(id))?;
        if !meta.has_version(&target) {
            return Err(RegistryError::NotFound {
                identifier: id.clone(),
                version: Some(target),
            });
        }
        let slot = state.arena.get(id).ok_or_else(|| RegistryError::not_found(id))?;
        if *slot.instance.version() == target {
            return Ok(slot.snapshot());
        }
        self.swap_locked(&mut state, id, target, source).await
    }

    async fn swap_locked(
        &self,
        state: &mut RegistryState,
        id: &ComponentId,
        target: Version,
        source: Option<VersionSource>,
    ) -> Result<Component, RegistryError> {
        let (hot_swappable, previous) = match state.arena.get(id) {
            Some(slot) => (slot.record.hot_swappable, slot.instance.version().clone()),
            None => return Err(RegistryError::not_found(id)),
        };
        if !hot_swappable {
            let err = RegistryError::NotSupported(id.clone());
            log_lifecycle_event(LifecycleEvent::SwapRejected, id.as_str(), &err.to_string(), &[]);
            return Err(err);
        }

        if let Err(e) = self.replace_locked(state, id, &target).await {
            log_lifecycle_event(LifecycleEvent::SwapRejected, id.as_str(), &e.to_string(), &[]);
            return Err(e);
        }

        let entry = history_entry(state, id, &target, source);
        state.history.record(id, entry);
        telemetry::record_swap(id.as_str());
        let (from, to) = (previous.to_string(), target.to_string());
        log_lifecycle_event(
            LifecycleEvent::Swapped,
            id.as_str(),
            "component hot-swapped",
            &[("from", from.as_str()), ("to", to.as_str())],
        );
        info!(component = %id, from = %previous, to = %target, "hot-swap complete");

        state
            .arena
            .get(id)
            .map(Slot::snapshot)
            .ok_or_else(|| RegistryError::not_found(id))
    }

    /// Blue-green replacement of the subtree rooted at `id`.
    async fn replace_locked(
        &self,
        state: &mut RegistryState,
        id: &ComponentId,
        version: &Version,
    ) -> Result<(), RegistryError> {
        let parent = state.arena.get(id).and_then(|slot| slot.record.parent.clone());
        let old_members: HashSet<ComponentId> = state.arena.subtree_levels(id).into_iter().flatten().collect();

        for member in &old_members {
            if let Some(slot) = state.arena.get(member) {
                if !slot.instance.can_unload() {
                    return Err(RegistryError::NotUnloadable {
                        component: id.clone(),
                        blocker: UnloadBlocker::Busy(member.clone()),
                    });
                }
            }
        }

        let staged = self.stage(state, id, version, parent, &old_members, None)?;
        initialize_levels(&staged).await?;

        let retired = state.arena.replace_subtree(id, staged);
        cleanup_levels(&retired).await;
        telemetry::set_loaded_components(state.arena.len());
        Ok(())
    }

    /// Release every loaded component, dependents before their dependencies.
    /// Used at host shutdown; never fails.
    pub async fn unload_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut unloaded = 0;

        while state.arena.len() > 0 {
            let mut roots: Vec<ComponentId> = state
                .arena
                .slots()
                .filter(|slot| slot.record.parent.is_none())
                .map(|slot| slot.instance.id().clone())
                .collect();
            roots.sort();

            let free = roots.iter().find(|root| {
                let members: HashSet<ComponentId> =
                    state.arena.subtree_levels(root).into_iter().flatten().collect();
                state.arena.dependents_of(&members).is_empty()
            });
            // Dependency cycles never load, so some root is always free;
            // fall back to any root, then to any slot, to guarantee progress.
            let next = free
                .or(roots.first())
                .cloned()
                .or_else(|| state.arena.ids().next().cloned());
            let Some(next) = next else { break };

            let removed = state.arena.remove_subtree(&next);
            cleanup_levels(&removed).await;
            for slot in removed.iter().flatten() {
                telemetry::record_unload(slot.instance.id().as_str());
                unloaded += 1;
            }
        }

        telemetry::set_loaded_components(0);
        info!(unloaded, "all components unloaded");
        unloaded
    }

    // ------------------------------------------------------------------
    // Execution and suspension
    // ------------------------------------------------------------------

    /// Run one execution. The registry lock is released while it runs.
    pub async fn execute(&self, id: &ComponentId, input: Payload) -> Result<Payload, RegistryError> {
        let instance = self.instance(id).await.ok_or_else(|| RegistryError::not_found(id))?;
        Ok(instance.execute(input).await?)
    }

    /// Signal running executions in the subtree to wind down.
    pub async fn request_suspend(&self, id: &ComponentId) -> Result<(), RegistryError> {
        let state = self.state.lock().await;
        if !state.arena.contains(id) {
            return Err(RegistryError::not_found(id));
        }
        for member in state.arena.subtree_levels(id).iter().flatten() {
            if let Some(slot) = state.arena.get(member) {
                slot.instance.request_suspend();
            }
        }
        Ok(())
    }

    /// Suspend the whole subtree, or nothing.
    ///
    /// A member that is executing gets its suspension signalled and the call
    /// fails with an invalid-state error; retry once it has wound down.
    pub async fn suspend(&self, id: &ComponentId) -> Result<(), RegistryError> {
        let state = self.state.lock().await;
        let levels = subtree_instances(&state.arena, id)?;

        let executing: Vec<&Arc<ComponentInstance>> = levels
            .iter()
            .flatten()
            .filter(|inst| inst.status() == ComponentStatus::Executing)
            .collect();
        if let Some(first) = executing.first() {
            for inst in &executing {
                inst.request_suspend();
            }
            return Err(LifecycleError::InvalidState {
                component: first.id().clone(),
                operation: "suspend",
                state: ComponentStatus::Executing,
            }
            .into());
        }

        let members: Vec<&Arc<ComponentInstance>> = levels.iter().flatten().collect();
        for (done, inst) in members.iter().enumerate() {
            if let Err(e) = inst.begin_suspend() {
                for suspended in &members[..done] {
                    suspended.revert_suspend();
                }
                return Err(e.into());
            }
        }
        for group in &levels {
            join_all(group.iter().map(|inst| inst.finish_suspend())).await;
        }
        debug!(component = %id, "subtree suspended");
        Ok(())
    }

    /// Resume the whole subtree, or nothing.
    pub async fn resume(&self, id: &ComponentId) -> Result<(), RegistryError> {
        let state = self.state.lock().await;
        let levels = subtree_instances(&state.arena, id)?;
        let members: Vec<&Arc<ComponentInstance>> = levels.iter().flatten().collect();
        for (done, inst) in members.iter().enumerate() {
            if let Err(e) = inst.begin_resume() {
                for resumed in &members[..done] {
                    resumed.revert_resume();
                }
                return Err(e.into());
            }
        }
        for group in &levels {
            join_all(group.iter().map(|inst| inst.finish_resume())).await;
        }
        debug!(component = %id, "subtree resumed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Deliver a message. Broadcast destinations fan out and yield no reply.
    pub async fn send_message(
        &self,
        message: &ComponentMessage,
    ) -> Result<Option<ComponentMessage>, RegistryError> {
        let target = match &message.destination {
            Destination::Component(dest) => self.instance(dest).await,
            Destination::Broadcast => {
                self.broadcast(message).await;
                return Ok(None);
            }
        };
        let sink = target.map(|inst| inst as Arc<dyn MessageSink>);
        Ok(self.router.send(message, sink).await?)
    }

    /// Deliver to every loaded component except the source.
    pub async fn broadcast(&self, message: &ComponentMessage) -> BroadcastReport {
        let recipients: Vec<Arc<dyn MessageSink>> = {
            let state = self.state.lock().await;
            let mut slots: Vec<&Slot> = state
                .arena
                .slots()
                .filter(|slot| *slot.instance.id() != message.source)
                .collect();
            slots.sort_by(|a, b| a.instance.id().cmp(b.instance.id()));
            slots
                .into_iter()
                .map(|slot| slot.instance.clone() as Arc<dyn MessageSink>)
                .collect()
        };
        self.router.broadcast(message, recipients).await
    }

    // ------------------------------------------------------------------
    // Staging
    // ------------------------------------------------------------------

    /// Build (but do not register) the instance tree rooted at `root`.
    ///
    /// `replacing` lists currently loaded ids the new tree is allowed to
    /// shadow; any other already-loaded member is an ownership conflict.
    /// `pinned` fixes the version of one nested member.
    fn stage(
        &self,
        state: &RegistryState,
        root: &ComponentId,
        version: &Version,
        parent: Option<ComponentId>,
        replacing: &HashSet<ComponentId>,
        pinned: Option<(&ComponentId, &Version)>,
    ) -> Result<Vec<Vec<Slot>>, RegistryError> {
        let levels = resolver::unit_levels(&state.catalog, root)?;
        let members: HashSet<&ComponentId> = levels.iter().flatten().collect();

        let mut owner: HashMap<ComponentId, ComponentId> = HashMap::new();
        if let Some(parent) = parent {
            owner.insert(root.clone(), parent);
        }

        let mut staged = Vec::with_capacity(levels.len());
        for group in &levels {
            let mut slots = Vec::with_capacity(group.len());
            for member in group {
                let meta = state.catalog.get(member).ok_or_else(|| RegistryError::not_found(member))?;
                let parent = owner.get(member).cloned();

                if state.arena.contains(member) && !replacing.contains(member) {
                    return Err(RegistryError::OwnershipConflict {
                        child: member.clone(),
                        parent: parent.unwrap_or_else(|| root.clone()),
                    });
                }
                for dep in &meta.dependencies {
                    if !members.contains(dep) && !state.arena.contains(dep) {
                        return Err(RegistryError::not_found(dep));
                    }
                }

                let member_version = if member == root {
                    version.clone()
                } else if let Some((_, v)) = pinned.filter(|(pin, _)| *pin == member) {
                    v.clone()
                } else {
                    // Children keep their running version when it is still offered.
                    match state.arena.get(member) {
                        Some(slot) if meta.has_version(slot.instance.version()) => {
                            slot.instance.version().clone()
                        }
                        _ => latest(meta)?,
                    }
                };

                let ctx = LoadContext {
                    metadata: meta,
                    version: &member_version,
                    artifact: state.artifacts.get(&(member.clone(), member_version.clone())),
                };
                let behavior = self.factory.create(&ctx).map_err(|source| {
                    RegistryError::Lifecycle(LifecycleError::InitializationFailed {
                        component: member.clone(),
                        source,
                    })
                })?;

                let path = meta.effective_path().ok_or_else(|| CatalogError::Invalid {
                    identifier: member.to_string(),
                    reason: "identifier is not a valid path".to_string(),
                })?;
                for child in &meta.children {
                    owner.insert(child.clone(), member.clone());
                }

                slots.push(Slot {
                    instance: Arc::new(ComponentInstance::new(member.clone(), member_version, behavior)),
                    record: ComponentRecord {
                        path,
                        level: meta.effective_level(),
                        dependencies: meta.dependencies.iter().cloned().collect(),
                        capabilities: meta.capabilities.iter().cloned().collect(),
                        children: meta.children.clone(),
                        parent,
                        hot_swappable: meta.is_hot_swappable(),
                    },
                });
            }
            staged.push(slots);
        }
        Ok(staged)
    }
}

/// A replacement catalog entry still offers every published artifact
/// version and the version currently loaded.
fn keep_live_versions(state: &RegistryState, mut entry: ModuleMetadata) -> ModuleMetadata {
    for (id, version) in state.artifacts.keys() {
        if *id == entry.identifier {
            entry = entry.with_version(version.clone());
        }
    }
    if let Some(slot) = state.arena.get(&entry.identifier) {
        let running = slot.instance.version();
        if !entry.has_version(running) {
            warn!(
                component = %entry.identifier,
                version = %running,
                "replacement entry dropped the loaded version; keeping it on offer"
            );
            entry = entry.with_version(running.clone());
        }
    }
    entry
}

fn latest(meta: &ModuleMetadata) -> Result<Version, RegistryError> {
    meta.latest_version()
        .cloned()
        .ok_or_else(|| RegistryError::not_found(&meta.identifier))
}

fn history_entry(
    state: &RegistryState,
    id: &ComponentId,
    version: &Version,
    source: Option<VersionSource>,
) -> HistoryEntry {
    let artifact = state.artifacts.get(&(id.clone(), version.clone()));
    let default_source = if artifact.is_some() {
        VersionSource::Artifact
    } else {
        VersionSource::Catalog
    };
    let mut entry = HistoryEntry::new(version.clone(), source.unwrap_or(default_source));
    if let Some(artifact) = artifact {
        entry.artifact_id = Some(artifact.id);
        entry.checksum = Some(artifact.checksum.clone());
    }
    entry
}

fn check_unloadable(arena: &ComponentArena, id: &ComponentId) -> Result<(), RegistryError> {
    let members: HashSet<ComponentId> = arena.subtree_levels(id).into_iter().flatten().collect();

    let mut sorted: Vec<&ComponentId> = members.iter().collect();
    sorted.sort();
    for member in sorted {
        if let Some(slot) = arena.get(member) {
            if !slot.instance.can_unload() {
                return Err(RegistryError::NotUnloadable {
                    component: id.clone(),
                    blocker: UnloadBlocker::Busy(member.clone()),
                });
            }
        }
    }

    let dependents = arena.dependents_of(&members);
    if !dependents.is_empty() {
        return Err(RegistryError::NotUnloadable {
            component: id.clone(),
            blocker: UnloadBlocker::Dependents(dependents),
        });
    }
    Ok(())
}

fn subtree_instances(
    arena: &ComponentArena,
    id: &ComponentId,
) -> Result<Vec<Vec<Arc<ComponentInstance>>>, RegistryError> {
    if !arena.contains(id) {
        return Err(RegistryError::not_found(id));
    }
    Ok(arena
        .subtree_levels(id)
        .iter()
        .map(|group| {
            group
                .iter()
                .filter_map(|member| arena.get(member).map(|slot| slot.instance.clone()))
                .collect()
        })
        .collect())
}

/// Initialize a staged tree parent-first, one depth at a time. On failure
/// everything initialized so far is cleaned up and the first error returned.
async fn initialize_levels(levels: &[Vec<Slot>]) -> Result<(), RegistryError> {
    for (depth, group) in levels.iter().enumerate() {
        let results = join_all(group.iter().map(|slot| slot.instance.initialize())).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            cleanup_levels(&levels[..=depth]).await;
            return Err(err.into());
        }
    }
    Ok(())
}

/// Clean up members deepest level first; members of one level run concurrently.
async fn cleanup_levels(levels: &[Vec<Slot>]) {
    for group in levels.iter().rev() {
        join_all(group.iter().map(|slot| slot.instance.cleanup())).await;
    }
}
