//! # Pipeflow
//!
//! Message-passing stage pipelines built from declarative topologies.
//!
//! A caller describes a tree or DAG of stage types in a [`Specification`],
//! optionally wrapping nodes in decorators and attaching error handlers.
//! The [`PipelineBuilder`] turns it into concurrently running instances,
//! each a tokio task with its own bounded mailbox, and returns an
//! [`EntryPoint`] bound to the root.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(StageRegistry::with_builtins());
//! let mut spec = Specification::new(registry, "uppercase")?;
//! spec.add_child(spec.root_id(), "log_string")?;
//!
//! let system = PipelineSystem::new("quick-start");
//! let entry = PipelineBuilder::new(system).build(&spec).await?;
//! entry.put("hello").await;
//! entry.shutdown().await;
//! ```
//!
//! [`Specification`]: spec::Specification
//! [`PipelineBuilder`]: builder::PipelineBuilder
//! [`EntryPoint`]: entry::EntryPoint

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod config;
pub mod core;
pub mod decorators;
pub mod entry;
pub mod errors;
pub mod events;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod spec;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::PipelineBuilder;
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        DescriptorId, FailureNotice, InstanceId, Payload, StageOutput, Stereotype, TypeTag,
    };
    pub use crate::decorators::{
        Decorator, DecoratorContext, LoadBalancingPool, RoutingStrategy, SpinUpPool,
    };
    pub use crate::entry::EntryPoint;
    pub use crate::errors::{ContractErrorInfo, ContractViolation, PipeflowError, Result};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::registry::{DecoratorType, StageRegistry, StageType};
    pub use crate::runtime::{PipelineSystem, StageRef};
    pub use crate::spec::Specification;
    pub use crate::stages::{FnStage, Stage, StageContext};
}
