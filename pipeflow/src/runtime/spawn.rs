//! Instance creation from a stage type and its decorator chain.

use super::worker::StageWorker;
use super::{channel, PipelineSystem, StageRef};
use crate::core::DescriptorId;
use crate::decorators::{DecoratorContext, DecoratorWorker};
use crate::errors::Result;
use crate::registry::{DecoratorType, StageType};
use crate::spec::{DecoratorDescriptor, ErrorHandlerDescriptor, StageDescriptor};
use crate::stages::StageContext;
use tokio::task::JoinHandle;

/// A stage type plus the decorators around it, innermost first.
#[derive(Debug, Clone)]
pub(crate) struct InnerChain {
    stage_id: DescriptorId,
    stage: StageType,
    decorators: Vec<DecoratorType>,
}

impl InnerChain {
    pub(crate) fn new(stage_id: DescriptorId, stage: StageType, wrappers: &[DecoratorDescriptor]) -> Self {
        Self {
            stage_id,
            stage,
            decorators: wrappers.iter().map(|w| w.decorator.clone()).collect(),
        }
    }

    pub(crate) fn bare(stage_id: DescriptorId, stage: StageType) -> Self {
        Self::new(stage_id, stage, &[])
    }

    pub(crate) fn for_stage(descriptor: &StageDescriptor) -> Self {
        Self::new(descriptor.id, descriptor.stage_type.clone(), &descriptor.wrappers)
    }

    pub(crate) fn for_handler(handler: &ErrorHandlerDescriptor) -> Self {
        Self::new(handler.id, handler.handler.clone(), &handler.wrappers)
    }

    pub(crate) fn stage_id(&self) -> DescriptorId {
        self.stage_id
    }

    /// `spin_up(uppercase)@1a2b3c4d`
    pub(crate) fn label(&self) -> String {
        let mut label = self.stage.name().to_string();
        for decorator in &self.decorators {
            label = format!("{}({label})", decorator.name());
        }
        format!("{label}@{}", self.stage_id.short())
    }

    fn peel(&self) -> Option<(&DecoratorType, Self)> {
        let (outer, inner) = self.decorators.split_last()?;
        Some((
            outer,
            Self {
                stage_id: self.stage_id,
                stage: self.stage.clone(),
                decorators: inner.to_vec(),
            },
        ))
    }
}

/// Spawns the outermost layer of `chain`.
///
/// A decorated chain yields its outermost decorator, which builds the
/// remaining layers itself; a bare chain yields a stage worker. The new
/// instance waits for its `Init` handshake before it has any wiring.
pub(crate) fn spawn_instance(system: &PipelineSystem, chain: &InnerChain) -> Result<(StageRef, JoinHandle<()>)> {
    let label = chain.label();
    let (stage_ref, mailbox) = channel(chain.stage_id, label.as_str(), system.config().mailbox_capacity);

    let handle = match chain.peel() {
        Some((outer, inner)) => {
            let decorator = outer.instantiate(system.config());
            let ctx = DecoratorContext::new(system.clone(), inner, stage_ref.instance_id());
            let worker = DecoratorWorker::new(decorator, ctx, mailbox);
            system.spawn_worker(&label, worker.run())?
        }
        None => {
            let ctx = StageContext::new(chain.stage_id, chain.stage.shared_name(), stage_ref.instance_id());
            let worker = StageWorker::new(
                chain.stage.instantiate(),
                chain.stage.stereotype(),
                ctx,
                mailbox,
                system.clone(),
            );
            system.spawn_worker(&label, worker.run())?
        }
    };
    Ok((stage_ref, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TypeTag;
    use crate::decorators::{LoadBalancingPool, SpinUpPool};
    use crate::stages::builtin::Uppercase;

    #[test]
    fn test_label_nests_decorators_outward() {
        let chain = InnerChain {
            stage_id: DescriptorId::new(),
            stage: StageType::transform("uppercase", TypeTag::TEXT, TypeTag::TEXT, || Uppercase),
            decorators: vec![
                DecoratorType::new("load_balance", LoadBalancingPool::from_config),
                DecoratorType::new("spin_up", |_: &crate::config::PipelineConfig| SpinUpPool::new()),
            ],
        };

        let label = chain.label();
        assert!(label.starts_with("spin_up(load_balance(uppercase))@"));

        let (outer, inner) = chain.peel().unwrap();
        assert_eq!(outer.name(), "spin_up");
        assert!(inner.label().starts_with("load_balance(uppercase)@"));
        assert!(inner.peel().unwrap().1.peel().is_none());
    }

    #[tokio::test]
    async fn test_closed_system_spawns_nothing() {
        let system = PipelineSystem::new("closed");
        system.shutdown();
        let chain = InnerChain::bare(
            DescriptorId::new(),
            StageType::transform("uppercase", TypeTag::TEXT, TypeTag::TEXT, || Uppercase),
        );
        assert!(spawn_instance(&system, &chain).is_err());
        assert_eq!(system.live_workers(), 0);
    }
}
