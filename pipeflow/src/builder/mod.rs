//! Turns a specification into live, wired instances.
//!
//! Construction is two-phase. Every instance is spawned first and learns
//! its neighbours afterwards from an `Init` handshake, because a node's
//! downstream set only exists once its children are running. Nodes are
//! visited children-first, so by the time a node is initialized every
//! instance it will send to already exists.

#[cfg(test)]
mod integration_tests;

use crate::core::DescriptorId;
use crate::entry::EntryPoint;
use crate::errors::{PipeflowError, Result};
use crate::events::PIPELINE_BUILT;
use crate::runtime::{spawn_instance, Envelope, Handshake, InnerChain, PipelineSystem, StageRef, Upstream};
use crate::spec::Specification;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds pipelines inside one [`PipelineSystem`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    system: PipelineSystem,
}

impl PipelineBuilder {
    /// Creates a builder spawning into `system`.
    #[must_use]
    pub fn new(system: PipelineSystem) -> Self {
        Self { system }
    }

    /// The target system.
    #[must_use]
    pub fn system(&self) -> &PipelineSystem {
        &self.system
    }

    /// Builds a pipeline whose leaves drop their results.
    ///
    /// # Errors
    ///
    /// Returns a topology error if the specification fails validation, or
    /// [`PipeflowError::SystemClosed`] if the system has shut down. Nothing
    /// keeps running after a failed build.
    pub async fn build(&self, spec: &Specification) -> Result<EntryPoint> {
        self.realize(spec, None).await
    }

    /// Builds a pipeline whose leaves deliver to `sink`.
    ///
    /// The sink keeps its own wiring. It is told that the leaves are extra
    /// producers, so it waits for one more shutdown signal per leaf before
    /// finishing. The root of another pipeline works as a sink.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub async fn build_with_sink(&self, spec: &Specification, sink: StageRef) -> Result<EntryPoint> {
        self.realize(spec, Some(sink)).await
    }

    async fn realize(&self, spec: &Specification, sink: Option<StageRef>) -> Result<EntryPoint> {
        spec.validate()?;

        let mut build = Build::new(&self.system);
        match build.run(spec, sink).await {
            Ok(root) => {
                self.system.emit(
                    PIPELINE_BUILT,
                    serde_json::json!({
                        "root": root.label(),
                        "stages": build.instances.len(),
                        "error_handlers": build.handlers.len(),
                    }),
                );
                info!(
                    root = %root,
                    stages = build.instances.len(),
                    error_handlers = build.handlers.len(),
                    "pipeline built"
                );
                Ok(EntryPoint::new(root, self.system.clone(), build.handles))
            }
            Err(err) => {
                warn!(error = %err, spawned = build.handles.len(), "pipeline build failed, aborting spawned workers");
                build.abort();
                Err(err)
            }
        }
    }
}

/// State of one build call.
struct Build<'a> {
    system: &'a PipelineSystem,
    instances: HashMap<DescriptorId, StageRef>,
    handlers: HashMap<DescriptorId, StageRef>,
    handles: Vec<JoinHandle<()>>,
}

impl<'a> Build<'a> {
    fn new(system: &'a PipelineSystem) -> Self {
        Self {
            system,
            instances: HashMap::new(),
            handlers: HashMap::new(),
            handles: Vec::new(),
        }
    }

    async fn run(&mut self, spec: &Specification, sink: Option<StageRef>) -> Result<StageRef> {
        for (handler, references) in spec.referenced_handlers() {
            let handler_ref = self.spawn(&InnerChain::for_handler(handler))?;
            initialize(
                &handler_ref,
                Handshake {
                    downstream: Vec::new(),
                    error_handler: None,
                    upstream: Upstream::Counted(references),
                },
            )
            .await;
            self.handlers.insert(handler.id, handler_ref);
        }

        let upstream_counts = spec.upstream_counts();
        let mut leaves = 0;
        for id in spec.post_order() {
            let descriptor = spec.descriptor(id)?;
            let stage_ref = self.spawn(&InnerChain::for_stage(descriptor))?;

            let downstream = if descriptor.is_leaf() {
                leaves += 1;
                sink.iter().cloned().collect()
            } else {
                descriptor
                    .children
                    .iter()
                    .map(|child| lookup(&self.instances, *child))
                    .collect::<Result<Vec<_>>>()?
            };
            let error_handler = descriptor
                .error_handler
                .map(|handler| lookup(&self.handlers, handler))
                .transpose()?;
            // The entry point is the root's only producer until another build adds more.
            let upstream = if id == spec.root_id() {
                Upstream::Counted(1)
            } else {
                Upstream::Counted(upstream_counts.get(&id).copied().unwrap_or(1))
            };

            debug!(
                stage = %stage_ref,
                downstream = downstream.len(),
                upstream = ?upstream,
                "initializing stage"
            );
            initialize(
                &stage_ref,
                Handshake {
                    downstream,
                    error_handler,
                    upstream,
                },
            )
            .await;
            self.instances.insert(id, stage_ref);
        }

        if let Some(sink) = sink {
            if !sink.tell(Envelope::AddUpstream(leaves)).await {
                warn!(sink = %sink, "sink terminated before the build finished");
            }
        }

        lookup(&self.instances, spec.root_id())
    }

    fn spawn(&mut self, chain: &InnerChain) -> Result<StageRef> {
        let (stage_ref, handle) = spawn_instance(self.system, chain)?;
        debug!(stage = %stage_ref, descriptor = %chain.stage_id(), "spawned");
        self.handles.push(handle);
        Ok(stage_ref)
    }

    fn abort(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

fn lookup(instances: &HashMap<DescriptorId, StageRef>, id: DescriptorId) -> Result<StageRef> {
    instances
        .get(&id)
        .cloned()
        .ok_or(PipeflowError::UnknownDescriptor(id))
}

async fn initialize(target: &StageRef, handshake: Handshake) {
    if !target.tell(Envelope::Init(handshake)).await {
        warn!(target = %target, "instance terminated before its handshake");
    }
}
