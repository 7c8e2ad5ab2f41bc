//! Fixed-size load-balanced pool.

use super::routing::Router;
use super::{Decorator, DecoratorContext, InnerInstance, RoutingStrategy};
use crate::config::PipelineConfig;
use crate::core::Payload;
use crate::errors::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

/// Routes each message to one of a fixed set of inner instances.
///
/// Members are created eagerly on initialization and never replaced. A
/// member that terminates is excluded from routing; once every member has
/// terminated, messages are dropped with a warning.
#[derive(Debug)]
pub struct LoadBalancingPool {
    size: usize,
    router: Router,
    members: Vec<InnerInstance>,
}

impl LoadBalancingPool {
    /// Creates a pool of `size` members (at least one) routing to the
    /// smallest mailbox.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            router: Router::new(RoutingStrategy::default()),
            members: Vec::new(),
        }
    }

    /// Sets the routing policy.
    #[must_use]
    pub fn with_routing(mut self, strategy: RoutingStrategy) -> Self {
        self.router = Router::new(strategy);
        self
    }

    /// Creates a pool sized and routed by `config`.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.pool_size).with_routing(config.routing)
    }

    /// Configured member count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[async_trait]
impl Decorator for LoadBalancingPool {
    async fn initialize(&mut self, ctx: &DecoratorContext) -> Result<()> {
        for _ in 0..self.size {
            self.members.push(ctx.spawn_inner().await?);
        }
        debug!(
            size = self.size,
            routing = %self.router.strategy(),
            inner = %ctx.inner_label(),
            "pool members created"
        );
        Ok(())
    }

    async fn intercept(&mut self, ctx: &DecoratorContext, payload: Payload) {
        let loads: Vec<Option<usize>> = self
            .members
            .iter()
            .map(|member| (!member.is_closed()).then(|| member.load()))
            .collect();

        let Some(index) = self.router.select(&loads) else {
            warn!(inner = %ctx.inner_label(), "every pool member has terminated, message dropped");
            return;
        };
        let member = &self.members[index];
        if !member.forward(payload).await {
            warn!(member = %member.stage_ref(), "pool member terminated, message dropped");
        }
    }

    async fn drain(&mut self, _ctx: &DecoratorContext) {
        join_all(self.members.drain(..).map(InnerInstance::stop)).await;
    }
}
