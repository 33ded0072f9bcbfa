//! Install coordinator
//!
//! Sequences installation across an archive's dependency tree. Each node
//! moves through `Pending -> Reserved -> Installed -> Logged`, with
//! `Failed` terminal from any non-terminal state.
//!
//! Ordering contract: a node whose handler defers installation may not
//! move `Reserved -> Installed` until all of its packaged non-association
//! children are installed. Pass 1 installs every non-deferred node
//! top-down; pass 2 sweeps the still-reserved deferred nodes to a fixed
//! point. A full sweep without progress is an install deadlock, reported
//! to the caller as a configuration or archive defect, never silently
//! broken.

use crate::error::EngineError;
use crate::handler::{HandlerRegistry, InstallOutcome, KindHandler};
use crate::mapping::MappingStore;
use crate::session::SessionConfig;
use crate::txlog::{TransactionLog, TxAction};
use caravan_archive::ArchiveReader;
use caravan_model::{Dependency, DependencyKey, DependencyType};
use indexmap::IndexMap;
use std::sync::Arc;

/// Per-node install state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Discovered, not yet processed
    Pending,
    /// Identifier mapping reserved (where the kind supports mapping)
    Reserved,
    /// Handler has written the object to the target store
    Installed,
    /// Transaction-log entry appended
    Logged,
    /// Terminal failure for this node
    Failed,
}

impl NodeState {
    #[must_use]
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reserved => "reserved",
            Self::Installed => "installed",
            Self::Logged => "logged",
            Self::Failed => "failed",
        }
    }
}

/// Legal transitions out of a state
#[must_use]
pub fn allowed_transitions(from: NodeState) -> &'static [NodeState] {
    use NodeState::*;
    match from {
        Pending => &[Reserved, Failed],
        Reserved => &[Installed, Failed],
        Installed => &[Logged, Failed],
        Logged => &[],
        Failed => &[],
    }
}

/// Summary of one import
#[derive(Debug, Default)]
pub struct InstallReport {
    pub created: usize,
    pub modified: usize,
    pub unchanged: usize,
    /// Nodes skipped over a confirmed-absent soft reference
    pub missing_associations: Vec<DependencyKey>,
}

/// Install sequencer for one import session
#[derive(Debug)]
pub struct InstallCoordinator<'a> {
    handlers: &'a HandlerRegistry,
    config: &'a SessionConfig,
}

impl<'a> InstallCoordinator<'a> {
    /// Create a coordinator over a handler registry and session policy
    #[must_use]
    pub fn new(handlers: &'a HandlerRegistry, config: &'a SessionConfig) -> Self {
        Self { handlers, config }
    }

    /// Run the full install for one archive
    ///
    /// # Errors
    /// The only error the coordinator absorbs is
    /// [`EngineError::AssociationMissing`] bubbling from a handler (the
    /// node is marked failed, a warning is logged, siblings continue).
    /// Everything else aborts the session; already-installed nodes and the
    /// transaction log are preserved, with no rollback.
    pub fn install(
        &self,
        archive: &ArchiveReader,
        mappings: &mut MappingStore,
        log: &mut TransactionLog,
    ) -> Result<InstallReport, EngineError> {
        // One slot per distinct key; where a key occurs both as an
        // expanded node and as a leaf reference, keep the packaged
        // occurrence (it carries the children).
        let mut nodes: IndexMap<DependencyKey, &Dependency> = IndexMap::new();
        for dep in archive.root().walk() {
            match nodes.get(&dep.key) {
                Some(existing) if existing.is_packaged() || !dep.is_packaged() => {}
                _ => {
                    nodes.insert(dep.key.clone(), dep);
                }
            }
        }
        let keys: Vec<DependencyKey> = nodes.keys().cloned().collect();
        let mut states: IndexMap<DependencyKey, NodeState> =
            keys.iter().map(|k| (k.clone(), NodeState::Pending)).collect();

        self.check_server_objects(&nodes)?;

        // Reservation sweep: every packaged node gets its identifier
        // mapping before anything is written, so payload rewriting never
        // observes a half-reserved graph.
        for key in &keys {
            let Some(dep) = nodes.get(key).copied() else { continue };
            if !dep.is_packaged() {
                continue;
            }
            let handler = self.handlers.get(&key.kind)?;
            self.reserve(handler, dep, mappings)?;
            transition(&mut states, key, NodeState::Reserved)?;
        }

        let mut report = InstallReport::default();

        // Pass 1: non-deferred nodes, top-down.
        for key in &keys {
            let Some(dep) = nodes.get(key).copied() else { continue };
            if !dep.is_packaged() {
                continue;
            }
            let handler = self.handlers.get(&key.kind)?;
            if handler.defer_installation() {
                continue;
            }
            if !archive.contains(key) {
                tracing::warn!(key = %key, "no payloads packaged for node; leaving unresolved");
                continue;
            }
            self.install_node(handler.clone(), dep, archive, mappings, log, &mut states, &mut report)?;
        }

        // Pass 2: deferred nodes, bottom-up to a fixed point.
        loop {
            let mut progress = false;
            for key in &keys {
                let Some(dep) = nodes.get(key).copied() else { continue };
                if states.get(key) != Some(&NodeState::Reserved) {
                    continue;
                }
                if !archive.contains(key) {
                    continue;
                }
                let children_installed = dep
                    .children
                    .iter()
                    .filter(|c| c.is_packaged())
                    .all(|c| {
                        matches!(
                            states.get(&c.key),
                            Some(NodeState::Installed | NodeState::Logged)
                        )
                    });
                if !children_installed {
                    continue;
                }
                let handler = self.handlers.get(&key.kind)?;
                self.install_node(handler.clone(), dep, archive, mappings, log, &mut states, &mut report)?;
                progress = true;
            }

            let remaining: Vec<DependencyKey> = keys
                .iter()
                .filter(|k| states.get(*k) == Some(&NodeState::Reserved))
                .cloned()
                .collect();
            if remaining.is_empty() {
                break;
            }
            if !progress {
                return Err(EngineError::InstallDeadlock { remaining });
            }
        }

        tracing::info!(
            created = report.created,
            modified = report.modified,
            unchanged = report.unchanged,
            "import complete"
        );
        Ok(report)
    }

    /// Verify environment-specific objects exist on the target
    fn check_server_objects(
        &self,
        nodes: &IndexMap<DependencyKey, &Dependency>,
    ) -> Result<(), EngineError> {
        for dep in nodes.values() {
            if dep.dependency_type != DependencyType::Server {
                continue;
            }
            let handler = self.handlers.get(&dep.key.kind)?;
            if handler.find_object(&dep.key)?.is_none() {
                if self.config.fail_on_missing_server {
                    return Err(EngineError::ServerObjectMissing {
                        key: dep.key.clone(),
                        display_name: dep.display_name.clone(),
                    });
                }
                tracing::warn!(
                    key = %dep.key,
                    name = %dep.display_name,
                    "server-provided object missing on target"
                );
            }
        }
        Ok(())
    }

    /// Reserve one node's identifier, retrying a transient failure once
    ///
    /// A missing parent mapping is a precondition defect and is never
    /// retried.
    fn reserve(
        &self,
        handler: &Arc<dyn KindHandler>,
        dep: &Dependency,
        mappings: &mut MappingStore,
    ) -> Result<(), EngineError> {
        match handler.reserve_identifier(dep, mappings) {
            Ok(()) => Ok(()),
            Err(err @ EngineError::MissingParentMapping { .. }) => Err(err),
            Err(first) => {
                tracing::warn!(key = %dep.key, error = %first, "identifier reservation failed; retrying");
                handler.reserve_identifier(dep, mappings)
            }
        }
    }

    /// Per-node failure boundary around one install
    #[allow(clippy::too_many_arguments)]
    fn install_node(
        &self,
        handler: Arc<dyn KindHandler>,
        dep: &Dependency,
        archive: &ArchiveReader,
        mappings: &mut MappingStore,
        log: &mut TransactionLog,
        states: &mut IndexMap<DependencyKey, NodeState>,
        report: &mut InstallReport,
    ) -> Result<(), EngineError> {
        let key = &dep.key;
        match handler.install(archive, dep, mappings, log) {
            Ok(outcome) => {
                transition(states, key, NodeState::Installed)?;
                match outcome {
                    InstallOutcome::Created => {
                        log.append(key.kind.clone(), dep.display_name.clone(), TxAction::Created);
                        report.created += 1;
                    }
                    InstallOutcome::Modified => {
                        log.append(key.kind.clone(), dep.display_name.clone(), TxAction::Modified);
                        report.modified += 1;
                    }
                    InstallOutcome::SkippedExisting => {
                        report.unchanged += 1;
                    }
                }
                mappings.confirm_installed(key, &dep.display_name);
                transition(states, key, NodeState::Logged)?;
                Ok(())
            }
            Err(err) if err.is_association_missing() => {
                transition(states, key, NodeState::Failed)?;
                tracing::warn!(key = %key, error = %err, "soft reference missing; node skipped");
                report.missing_associations.push(key.clone());
                Ok(())
            }
            Err(err) => {
                transition(states, key, NodeState::Failed)?;
                tracing::error!(key = %key, error = %err, "install failed");
                Err(err)
            }
        }
    }
}

fn transition(
    states: &mut IndexMap<DependencyKey, NodeState>,
    key: &DependencyKey,
    to: NodeState,
) -> Result<(), EngineError> {
    let from = states.get(key).copied().unwrap_or(NodeState::Pending);
    if !allowed_transitions(from).contains(&to) {
        return Err(EngineError::IllegalTransition {
            key: key.clone(),
            from: from.as_str(),
            to: to.as_str(),
        });
    }
    states.insert(key.clone(), to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_shape() {
        assert!(allowed_transitions(NodeState::Pending).contains(&NodeState::Reserved));
        assert!(allowed_transitions(NodeState::Reserved).contains(&NodeState::Installed));
        assert!(allowed_transitions(NodeState::Installed).contains(&NodeState::Logged));
        assert!(allowed_transitions(NodeState::Logged).is_empty());
        assert!(allowed_transitions(NodeState::Failed).is_empty());
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_state() {
        for from in [NodeState::Pending, NodeState::Reserved, NodeState::Installed] {
            assert!(allowed_transitions(from).contains(&NodeState::Failed));
        }
    }

    #[test]
    fn illegal_transition_rejected() {
        let mut states = IndexMap::new();
        let key = DependencyKey::new("role", "1");
        states.insert(key.clone(), NodeState::Pending);

        let err = transition(&mut states, &key, NodeState::Installed).unwrap_err();
        assert!(matches!(err, EngineError::IllegalTransition { .. }));
    }
}
