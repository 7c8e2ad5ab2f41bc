//! Declarative topology model.
//!
//! A [`Specification`] is built up front by the caller, checked as it is
//! mutated, and borrowed immutably by the builder.

mod descriptor;
mod specification;

pub use descriptor::{DecoratorDescriptor, ErrorHandlerDescriptor, StageDescriptor, WrapTarget, WrapperSlot};
pub use specification::Specification;
