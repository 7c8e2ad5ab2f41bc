//! Decorators: stages that own inner instances instead of transforming data.
//!
//! A decorated descriptor is realized by its outermost decorator alone. The
//! decorator receives the node's handshake and creates inner instances on
//! its own schedule, passing each the same wiring. Inner instances are
//! owned: they never forward shutdown, and the decorator stops them before
//! it forwards its own.

mod context;
mod pool;
mod routing;
mod spin_up;
mod worker;

pub use context::{DecoratorContext, InnerInstance};
pub use pool::LoadBalancingPool;
pub use routing::RoutingStrategy;
pub use spin_up::SpinUpPool;

pub(crate) use worker::DecoratorWorker;

use crate::core::Payload;
use crate::errors::Result;
use crate::registry::{DecoratorType, StageRegistry};
use async_trait::async_trait;
use std::fmt::Debug;

/// Name of [`LoadBalancingPool`].
pub const LOAD_BALANCE: &str = "load_balance";
/// Name of [`SpinUpPool`].
pub const SPIN_UP: &str = "spin_up";

/// A wrapper that manages the lifecycle of inner instances.
///
/// The runtime calls `initialize` once the handshake arrives, `intercept`
/// for every data message, and `drain` before the decorator terminates.
/// Implementations must stop and await every inner instance in `drain`.
#[async_trait]
pub trait Decorator: Send + Debug {
    /// Prepares inner instances. Runs before any message is intercepted.
    async fn initialize(&mut self, _ctx: &DecoratorContext) -> Result<()> {
        Ok(())
    }

    /// Handles one data message destined for the wrapped stage.
    async fn intercept(&mut self, ctx: &DecoratorContext, payload: Payload);

    /// Stops every inner instance and waits for it to finish.
    async fn drain(&mut self, ctx: &DecoratorContext);
}

/// Registers the stock decorators.
pub fn register_builtins(registry: &StageRegistry) {
    registry.register_decorator(DecoratorType::new(LOAD_BALANCE, LoadBalancingPool::from_config));
    registry.register_decorator(DecoratorType::new(SPIN_UP, |_: &crate::config::PipelineConfig| {
        SpinUpPool::new()
    }));
}
