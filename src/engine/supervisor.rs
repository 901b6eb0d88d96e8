// src/engine/supervisor.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ProcessDefinition;
use crate::engine::actor::{InstanceHandle, InstanceMsg, InstanceSnapshot};
use crate::engine::notifier::Notifier;
use crate::errors::{ProcwardError, Result};
use crate::exec::ProcessRunner;
use crate::protocol::ProcessView;
use crate::registry::ProcessRegistry;
use crate::types::ShutdownPolicy;

/// Owns one instance actor per supervised id and routes operations to it.
///
/// Actors are created lazily on first use. Cloning the engine is cheap and
/// every clone drives the same set of instances.
#[derive(Clone)]
pub struct SupervisorEngine {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<ProcessRegistry>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Notifier,
    instances: Mutex<HashMap<String, InstanceHandle>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SupervisorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorEngine")
            .field("instances", &self.tracked_instances())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SupervisorEngine {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn ProcessRunner>,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                runner,
                notifier,
                instances: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.inner.registry
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Request a start of `id`. Ignored while the instance is already active.
    pub fn start(&self, id: &str) -> Result<()> {
        if !self.inner.registry.contains(id) {
            return Err(ProcwardError::NotFound(id.to_string()));
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            debug!(id, "start ignored; supervisor is shutting down");
            return Ok(());
        }
        self.send(id, InstanceMsg::Start)
    }

    /// Request a stop of `id`. Ignored while the instance is idle.
    pub fn stop(&self, id: &str) -> Result<()> {
        let handle = self.instances().get(id).cloned();
        match handle {
            Some(handle) => {
                handle.send(InstanceMsg::Stop);
                Ok(())
            }
            None if self.inner.registry.contains(id) => Ok(()),
            None => Err(ProcwardError::NotFound(id.to_string())),
        }
    }

    /// Remove the definition for `id`. Fails with `InUse` unless the
    /// instance is Stopped or Failed.
    pub async fn delete(&self, id: &str) -> Result<ProcessDefinition> {
        if !self.inner.registry.contains(id) {
            return Err(ProcwardError::NotFound(id.to_string()));
        }

        // Going through the actor orders the delete after any start or stop
        // already queued for the same id.
        let handle = self.instance(id)?;
        let result = handle.delete(id).await;

        if matches!(result, Ok(_) | Err(ProcwardError::Persistence(_))) {
            let mut instances = self.instances();
            if instances
                .get(id)
                .is_some_and(|current| current.same_instance(&handle))
            {
                instances.remove(id);
            }
        }
        result
    }

    /// Current status and pid of `id`.
    pub async fn snapshot(&self, id: &str) -> Result<InstanceSnapshot> {
        if !self.inner.registry.contains(id) {
            return Err(ProcwardError::NotFound(id.to_string()));
        }
        let handle = self.instances().get(id).cloned();
        Ok(match handle {
            Some(handle) => handle.snapshot().await,
            None => InstanceSnapshot::default(),
        })
    }

    /// Every definition joined with its runtime status, in insertion order.
    pub async fn list(&self) -> Vec<ProcessView> {
        let definitions = self.inner.registry.list();
        let mut views = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let handle = self.instances().get(&definition.id).cloned();
            let snapshot = match handle {
                Some(handle) => handle.snapshot().await,
                None => InstanceSnapshot::default(),
            };
            views.push(ProcessView {
                definition,
                status: snapshot.status,
                pid: snapshot.pid,
            });
        }
        views
    }

    /// Start every enabled definition, each with its own delay. Returns the
    /// number of start requests issued.
    pub fn start_all(&self) -> usize {
        let mut started = 0;
        for def in self.inner.registry.list() {
            if !def.enabled {
                debug!(id = %def.id, name = %def.name, "skipping disabled definition");
                continue;
            }
            match self.start(&def.id) {
                Ok(()) => started += 1,
                Err(e) => warn!(id = %def.id, error = %e, "start failed"),
            }
        }
        info!(started, "start all");
        started
    }

    /// Stop every tracked instance, enabled or not.
    pub fn stop_all(&self) {
        let handles: Vec<InstanceHandle> = self.instances().values().cloned().collect();
        info!(instances = handles.len(), "stop all");
        for handle in handles {
            handle.send(InstanceMsg::Stop);
        }
    }

    /// Stop (or detach, per `policy`) every instance and wait until each has
    /// settled. Later start requests are ignored.
    pub async fn shutdown(&self, policy: ShutdownPolicy) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let detach_background = policy == ShutdownPolicy::DetachBackground;

        let handles: Vec<InstanceHandle> = self.instances().drain().map(|(_, h)| h).collect();
        info!(instances = handles.len(), ?policy, "shutting down supervisor");

        let mut pending = JoinSet::new();
        for handle in handles {
            pending.spawn(async move { handle.shutdown(detach_background).await });
        }
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "instance shutdown task failed");
            }
        }

        info!("supervisor shut down");
    }

    /// Number of instance actors currently tracked.
    pub fn tracked_instances(&self) -> usize {
        self.instances().len()
    }

    fn send(&self, id: &str, msg: InstanceMsg) -> Result<()> {
        let handle = self.instance(id)?;
        if !handle.send(msg) {
            warn!(id, "instance actor is gone; message dropped");
        }
        Ok(())
    }

    /// Existing handle for `id`, or a freshly spawned actor.
    ///
    /// A delete removes the definition before it drops the handle, so the
    /// registry is checked again under the map lock before creating one.
    fn instance(&self, id: &str) -> Result<InstanceHandle> {
        let mut instances = self.instances();
        if let Some(handle) = instances.get(id) {
            return Ok(handle.clone());
        }
        if !self.inner.registry.contains(id) {
            return Err(ProcwardError::NotFound(id.to_string()));
        }

        debug!(id, "creating instance");
        let handle = InstanceHandle::spawn(
            id.to_string(),
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.runner),
            self.inner.notifier.clone(),
        );
        instances.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<String, InstanceHandle>> {
        self.inner
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
