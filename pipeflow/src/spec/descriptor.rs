//! Descriptor types held by a specification.

use crate::core::{DescriptorId, TypeTag};
use crate::registry::{DecoratorType, StageType};

/// One wrapper in a decorator chain.
#[derive(Debug, Clone)]
pub struct DecoratorDescriptor {
    /// The decorator type.
    pub decorator: DecoratorType,
    /// The output tag of whatever this decorator wraps.
    pub input: TypeTag,
}

/// A node of the topology.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// Stable identifier assigned at creation.
    pub id: DescriptorId,
    /// The stage type realized by this node.
    pub stage_type: StageType,
    /// Decorator chain, innermost first.
    pub wrappers: Vec<DecoratorDescriptor>,
    /// The attached error handler, if any.
    pub error_handler: Option<DescriptorId>,
    /// Ordered, distinct children.
    pub children: Vec<DescriptorId>,
}

impl StageDescriptor {
    pub(crate) fn new(stage_type: StageType) -> Self {
        Self {
            id: DescriptorId::new(),
            stage_type,
            wrappers: Vec::new(),
            error_handler: None,
            children: Vec::new(),
        }
    }

    /// The tag this node delivers downstream, as seen through its chain.
    #[must_use]
    pub fn output(&self) -> &TypeTag {
        self.wrappers
            .last()
            .map_or_else(|| self.stage_type.output(), |outer| &outer.input)
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Log label, e.g. `uppercase@1a2b3c4d`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}@{}", self.stage_type.name(), self.id.short())
    }
}

/// An error sink attached to one or more nodes.
#[derive(Debug, Clone)]
pub struct ErrorHandlerDescriptor {
    /// Stable identifier; a globally attached handler is shared by id.
    pub id: DescriptorId,
    /// The handler stage type (input tag `failure`).
    pub handler: StageType,
    /// Decorator chain, innermost first.
    pub wrappers: Vec<DecoratorDescriptor>,
}

impl ErrorHandlerDescriptor {
    pub(crate) fn new(handler: StageType) -> Self {
        Self {
            id: DescriptorId::new(),
            handler,
            wrappers: Vec::new(),
        }
    }
}

/// What a wrapper chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapTarget {
    /// A stage descriptor.
    Stage(DescriptorId),
    /// An error-handler descriptor.
    ErrorHandler(DescriptorId),
}

impl WrapTarget {
    /// The id of the owning descriptor.
    #[must_use]
    pub fn id(&self) -> DescriptorId {
        match self {
            Self::Stage(id) | Self::ErrorHandler(id) => *id,
        }
    }
}

/// Handle to a decorator just added to a chain.
///
/// Passing it to [`Specification::wrap_wrapper`](super::Specification::wrap_wrapper)
/// wraps that decorator in turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperSlot {
    target: WrapTarget,
    depth: usize,
}

impl WrapperSlot {
    pub(crate) fn new(target: WrapTarget, depth: usize) -> Self {
        Self { target, depth }
    }

    /// The chain owner.
    #[must_use]
    pub fn target(&self) -> WrapTarget {
        self.target
    }

    /// Chain length up to and including this decorator.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}
