//! The specification arena and its mutation API.

use super::descriptor::{
    DecoratorDescriptor, ErrorHandlerDescriptor, StageDescriptor, WrapTarget, WrapperSlot,
};
use crate::core::{DescriptorId, TypeTag};
use crate::errors::{CycleDetectedError, DoubleWrapError, PipeflowError, Result, TypeIncompatibleError};
use crate::registry::{DecoratorType, StageRegistry, StageType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A declarative pipeline topology.
///
/// Nodes are addressed by [`DescriptorId`]. Every mutation validates type
/// tags before touching the tree, so a failed call leaves it unchanged.
///
/// Global defaults set through [`set_global_error_handler`] and
/// [`set_global_wrapper`] apply to every node reachable at call time and
/// are inherited by nodes created later with [`add_child`].
///
/// [`set_global_error_handler`]: Self::set_global_error_handler
/// [`set_global_wrapper`]: Self::set_global_wrapper
/// [`add_child`]: Self::add_child
#[derive(Debug, Clone)]
pub struct Specification {
    registry: Arc<StageRegistry>,
    root: DescriptorId,
    descriptors: HashMap<DescriptorId, StageDescriptor>,
    handlers: HashMap<DescriptorId, ErrorHandlerDescriptor>,
    global_wrapper: Option<DecoratorType>,
    global_error_handler: Option<DescriptorId>,
}

impl Specification {
    /// Creates a specification with a single root node.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownStageType`] if `root_type` is not
    /// registered.
    pub fn new(registry: Arc<StageRegistry>, root_type: &str) -> Result<Self> {
        let root = StageDescriptor::new(registry.stage(root_type)?);
        let root_id = root.id;
        Ok(Self {
            registry,
            root: root_id,
            descriptors: HashMap::from([(root_id, root)]),
            handlers: HashMap::new(),
            global_wrapper: None,
            global_error_handler: None,
        })
    }

    /// The registry types are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<StageRegistry> {
        &self.registry
    }

    /// The root id.
    #[must_use]
    pub fn root_id(&self) -> DescriptorId {
        self.root
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &StageDescriptor {
        &self.descriptors[&self.root]
    }

    /// Number of nodes.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownDescriptor`] for a foreign id.
    pub fn descriptor(&self, id: DescriptorId) -> Result<&StageDescriptor> {
        self.descriptors.get(&id).ok_or(PipeflowError::UnknownDescriptor(id))
    }

    fn descriptor_mut(&mut self, id: DescriptorId) -> Result<&mut StageDescriptor> {
        self.descriptors.get_mut(&id).ok_or(PipeflowError::UnknownDescriptor(id))
    }

    /// Looks up an error handler.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownDescriptor`] for a foreign id.
    pub fn error_handler(&self, id: DescriptorId) -> Result<&ErrorHandlerDescriptor> {
        self.handlers.get(&id).ok_or(PipeflowError::UnknownDescriptor(id))
    }

    /// The global error handler, if one was set.
    #[must_use]
    pub fn global_error_handler(&self) -> Option<DescriptorId> {
        self.global_error_handler
    }

    /// The global wrapper, if one was set.
    #[must_use]
    pub fn global_wrapper(&self) -> Option<&DecoratorType> {
        self.global_wrapper.as_ref()
    }

    /// Appends a new node of `child_type` under `parent`.
    ///
    /// The child inherits the global error handler and global wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::TypeIncompatible`] if the parent's output
    /// (through its chain) does not match the child's input, or if the
    /// global wrapper does not accept the child's output.
    pub fn add_child(&mut self, parent: DescriptorId, child_type: &str) -> Result<DescriptorId> {
        let stage_type = self.registry.stage(child_type)?;
        self.check_edge(parent, &stage_type)?;

        let mut child = StageDescriptor::new(stage_type);
        child.error_handler = self.global_error_handler;
        if let Some(wrapper) = &self.global_wrapper {
            let produced = child.stage_type.output().clone();
            check_accepts(wrapper, &produced, &child.label())?;
            child.wrappers.push(DecoratorDescriptor {
                decorator: wrapper.clone(),
                input: produced,
            });
        }

        let id = child.id;
        debug!(parent = %parent, child = %child.label(), "add_child");
        self.descriptors.insert(id, child);
        self.descriptor_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Adds an existing node as a further child of `parent` (DAG merge).
    ///
    /// Re-adding an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::TypeIncompatible`] on a tag mismatch and
    /// [`PipeflowError::CyclicTopology`] if `parent` is reachable from
    /// `child`.
    pub fn add_existing_child(&mut self, parent: DescriptorId, child: DescriptorId) -> Result<()> {
        let child_type = self.descriptor(child)?.stage_type.clone();
        self.check_edge(parent, &child_type)?;

        if self.descriptor(parent)?.children.contains(&child) {
            return Ok(());
        }
        if let Some(mut path) = self.path_between(child, parent) {
            path.push(child);
            return Err(CycleDetectedError::new(self.labels(&path)).into());
        }

        self.descriptor_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Wraps a node in a decorator.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::DoubleWrap`] if the node is already wrapped
    /// and [`PipeflowError::TypeIncompatible`] if the decorator does not
    /// accept the node's output.
    pub fn wrap(&mut self, node: DescriptorId, decorator: &str) -> Result<WrapperSlot> {
        self.push_wrapper(WrapTarget::Stage(node), 0, decorator)
    }

    /// Wraps the decorator at `slot` in another decorator.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::DoubleWrap`] if `slot` already has an outer
    /// wrapper.
    pub fn wrap_wrapper(&mut self, slot: WrapperSlot, decorator: &str) -> Result<WrapperSlot> {
        if slot.depth() == 0 {
            return Err(PipeflowError::UnknownWrapperSlot {
                target: slot.target().id(),
                depth: 0,
            });
        }
        self.push_wrapper(slot.target(), slot.depth(), decorator)
    }

    /// Removes a node's whole decorator chain.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownDescriptor`] for a foreign id.
    pub fn clear_wrappers(&mut self, node: DescriptorId) -> Result<()> {
        self.descriptor_mut(node)?.wrappers.clear();
        Ok(())
    }

    /// Attaches a fresh error handler of `handler_type` to `node`.
    ///
    /// Returns the handler's id, usable with [`wrap_error_handler`](Self::wrap_error_handler).
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::NotAnErrorHandler`] unless the type
    /// consumes failure notices.
    pub fn set_error_handler(&mut self, node: DescriptorId, handler_type: &str) -> Result<DescriptorId> {
        let handler = self.new_handler(handler_type)?;
        self.descriptor(node)?;

        let id = handler.id;
        self.handlers.insert(id, handler);
        self.descriptor_mut(node)?.error_handler = Some(id);
        Ok(id)
    }

    /// Detaches the node's error handler.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownDescriptor`] for a foreign id.
    pub fn clear_error_handler(&mut self, node: DescriptorId) -> Result<()> {
        self.descriptor_mut(node)?.error_handler = None;
        Ok(())
    }

    /// Wraps an error handler in a decorator.
    ///
    /// # Errors
    ///
    /// Same as [`wrap`](Self::wrap).
    pub fn wrap_error_handler(&mut self, handler: DescriptorId, decorator: &str) -> Result<WrapperSlot> {
        self.push_wrapper(WrapTarget::ErrorHandler(handler), 0, decorator)
    }

    /// Attaches one shared error handler to every node, replacing any
    /// per-node handler. Nodes added later inherit it.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::NotAnErrorHandler`] unless the type
    /// consumes failure notices.
    pub fn set_global_error_handler(&mut self, handler_type: &str) -> Result<DescriptorId> {
        let handler = self.new_handler(handler_type)?;
        let id = handler.id;
        self.handlers.insert(id, handler);

        for descriptor in self.descriptors.values_mut() {
            descriptor.error_handler = Some(id);
        }
        self.global_error_handler = Some(id);
        Ok(id)
    }

    /// Wraps every unwrapped node in `decorator`. Nodes added later inherit
    /// it. Already-wrapped nodes keep their chain.
    ///
    /// Returns the number of nodes wrapped by this call.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::TypeIncompatible`] without wrapping
    /// anything if the decorator rejects any target's output.
    pub fn set_global_wrapper(&mut self, decorator: &str) -> Result<usize> {
        let decorator = self.registry.decorator(decorator)?;

        let targets: Vec<DescriptorId> = self
            .descriptors
            .values()
            .filter(|d| d.wrappers.is_empty())
            .map(|d| d.id)
            .collect();
        for id in &targets {
            let descriptor = &self.descriptors[id];
            check_accepts(&decorator, descriptor.stage_type.output(), &descriptor.label())?;
        }

        for id in &targets {
            let descriptor = self.descriptor_mut(*id)?;
            let produced = descriptor.stage_type.output().clone();
            descriptor.wrappers.push(DecoratorDescriptor {
                decorator: decorator.clone(),
                input: produced,
            });
        }
        self.global_wrapper = Some(decorator);
        Ok(targets.len())
    }

    /// Every node, depth-first from the root, each exactly once.
    #[must_use]
    pub fn all_descriptors(&self) -> Vec<&StageDescriptor> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.descriptors.len());
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(descriptor) = self.descriptors.get(&id) {
                order.push(descriptor);
                stack.extend(descriptor.children.iter().rev().filter(|c| !visited.contains(*c)));
            }
        }
        order
    }

    /// Re-checks acyclicity and every edge and wrapper tag.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipeflowError::CyclicTopology`] or
    /// [`PipeflowError::TypeIncompatible`] found.
    pub fn validate(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();
        if let Some(cycle) = self.dfs_cycle(self.root, &mut visited, &mut rec_stack, &mut path) {
            return Err(CycleDetectedError::new(self.labels(&cycle)).into());
        }

        for descriptor in self.all_descriptors() {
            check_chain(&descriptor.wrappers, descriptor.stage_type.output(), &descriptor.label())?;
            for child in &descriptor.children {
                let child = self.descriptor(*child)?;
                if descriptor.output() != child.stage_type.input() {
                    return Err(incompatible(descriptor, &child.stage_type).into());
                }
            }
            if let Some(handler) = descriptor.error_handler {
                let handler = self.error_handler(handler)?;
                check_chain(&handler.wrappers, handler.handler.output(), handler.handler.name())?;
            }
        }
        Ok(())
    }

    /// Node ids with every child before its parents.
    pub(crate) fn post_order(&self) -> Vec<DescriptorId> {
        fn visit(
            spec: &Specification,
            id: DescriptorId,
            visited: &mut HashSet<DescriptorId>,
            order: &mut Vec<DescriptorId>,
        ) {
            if !visited.insert(id) {
                return;
            }
            if let Some(descriptor) = spec.descriptors.get(&id) {
                for child in &descriptor.children {
                    visit(spec, *child, visited, order);
                }
            }
            order.push(id);
        }

        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.descriptors.len());
        visit(self, self.root, &mut visited, &mut order);
        order
    }

    /// Number of distinct parents of each node.
    pub(crate) fn upstream_counts(&self) -> HashMap<DescriptorId, usize> {
        let mut counts = HashMap::new();
        for descriptor in self.all_descriptors() {
            for child in &descriptor.children {
                *counts.entry(*child).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Handlers referenced by at least one node, with their reference counts.
    pub(crate) fn referenced_handlers(&self) -> Vec<(&ErrorHandlerDescriptor, usize)> {
        let mut counts: Vec<(DescriptorId, usize)> = Vec::new();
        for descriptor in self.all_descriptors() {
            if let Some(handler) = descriptor.error_handler {
                match counts.iter_mut().find(|(id, _)| *id == handler) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((handler, 1)),
                }
            }
        }
        counts
            .into_iter()
            .filter_map(|(id, count)| self.handlers.get(&id).map(|h| (h, count)))
            .collect()
    }

    fn new_handler(&self, handler_type: &str) -> Result<ErrorHandlerDescriptor> {
        let handler = self.registry.stage(handler_type)?;
        if !handler.is_error_handler() {
            return Err(PipeflowError::NotAnErrorHandler(handler_type.to_string()));
        }
        Ok(ErrorHandlerDescriptor::new(handler))
    }

    fn check_edge(&self, parent: DescriptorId, child: &StageType) -> Result<()> {
        let parent = self.descriptor(parent)?;
        if parent.output() == child.input() {
            Ok(())
        } else {
            Err(incompatible(parent, child).into())
        }
    }

    fn push_wrapper(&mut self, target: WrapTarget, depth: usize, decorator: &str) -> Result<WrapperSlot> {
        let decorator = self.registry.decorator(decorator)?;
        let (chain, produced, wrapped) = self.chain_mut(target)?;

        if depth > chain.len() {
            return Err(PipeflowError::UnknownWrapperSlot {
                target: target.id(),
                depth,
            });
        }
        if let Some(existing) = chain.get(depth) {
            return Err(DoubleWrapError::new(target.id(), depth, existing.decorator.name()).into());
        }
        check_accepts(&decorator, &produced, &wrapped)?;

        chain.push(DecoratorDescriptor {
            decorator,
            input: produced,
        });
        Ok(WrapperSlot::new(target, depth + 1))
    }

    fn chain_mut(&mut self, target: WrapTarget) -> Result<(&mut Vec<DecoratorDescriptor>, TypeTag, String)> {
        match target {
            WrapTarget::Stage(id) => {
                let descriptor = self.descriptor_mut(id)?;
                let produced = descriptor.stage_type.output().clone();
                let label = descriptor.label();
                Ok((&mut descriptor.wrappers, produced, label))
            }
            WrapTarget::ErrorHandler(id) => {
                let handler = self.handlers.get_mut(&id).ok_or(PipeflowError::UnknownDescriptor(id))?;
                let produced = handler.handler.output().clone();
                let label = handler.handler.name().to_string();
                Ok((&mut handler.wrappers, produced, label))
            }
        }
    }

    fn path_between(&self, from: DescriptorId, to: DescriptorId) -> Option<Vec<DescriptorId>> {
        fn walk(
            spec: &Specification,
            node: DescriptorId,
            target: DescriptorId,
            visited: &mut HashSet<DescriptorId>,
            path: &mut Vec<DescriptorId>,
        ) -> bool {
            path.push(node);
            if node == target {
                return true;
            }
            if visited.insert(node) {
                if let Some(descriptor) = spec.descriptors.get(&node) {
                    for child in &descriptor.children {
                        if walk(spec, *child, target, visited, path) {
                            return true;
                        }
                    }
                }
            }
            path.pop();
            false
        }

        let mut path = Vec::new();
        walk(self, from, to, &mut HashSet::new(), &mut path).then_some(path)
    }

    fn dfs_cycle(
        &self,
        node: DescriptorId,
        visited: &mut HashSet<DescriptorId>,
        rec_stack: &mut HashSet<DescriptorId>,
        path: &mut Vec<DescriptorId>,
    ) -> Option<Vec<DescriptorId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(descriptor) = self.descriptors.get(&node) {
            for child in &descriptor.children {
                if !visited.contains(child) {
                    if let Some(cycle) = self.dfs_cycle(*child, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(child) {
                    let start = path.iter().position(|n| n == child).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(*child);
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(&node);
        None
    }

    fn labels(&self, ids: &[DescriptorId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.descriptors
                    .get(id)
                    .map_or_else(|| id.to_string(), StageDescriptor::label)
            })
            .collect()
    }
}

fn incompatible(parent: &StageDescriptor, child: &StageType) -> TypeIncompatibleError {
    TypeIncompatibleError::new(
        parent.label(),
        child.name(),
        parent.output().clone(),
        child.input().clone(),
    )
}

fn check_accepts(decorator: &DecoratorType, produced: &TypeTag, wrapped: &str) -> Result<()> {
    match decorator.accepts() {
        Some(accepts) if accepts != produced => Err(TypeIncompatibleError::new(
            wrapped,
            decorator.name(),
            produced.clone(),
            accepts.clone(),
        )
        .into()),
        _ => Ok(()),
    }
}

fn check_chain(chain: &[DecoratorDescriptor], produced: &TypeTag, wrapped: &str) -> Result<()> {
    for link in chain {
        if &link.input != produced {
            return Err(TypeIncompatibleError::new(
                wrapped,
                link.decorator.name(),
                produced.clone(),
                link.input.clone(),
            )
            .into());
        }
        check_accepts(&link.decorator, produced, wrapped)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorators::{LoadBalancingPool, LOAD_BALANCE, SPIN_UP};
    use crate::errors::{CYCLE_CODE, DOUBLE_WRAP_CODE};
    use crate::stages::builtin::{
        BYTES_TO_STRING, LOG_FAILURE, LOG_STRING, LOWERCASE, SPLIT_WORDS, UPPERCASE,
    };
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<StageRegistry> {
        let registry = StageRegistry::with_builtins();
        registry.register_decorator(
            DecoratorType::new("bytes_pool", LoadBalancingPool::from_config).accepting(TypeTag::BYTES),
        );
        Arc::new(registry)
    }

    fn spec(root: &str) -> Specification {
        Specification::new(registry(), root).unwrap()
    }

    #[test]
    fn test_new_rejects_unknown_root() {
        let err = Specification::new(registry(), "nope").unwrap_err();
        assert!(matches!(err, PipeflowError::UnknownStageType(_)));
    }

    #[test]
    fn test_add_child_appends_in_order() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, LOWERCASE).unwrap();
        let b = spec.add_child(root, LOG_STRING).unwrap();

        assert_eq!(spec.root().children, vec![a, b]);
        assert_eq!(spec.len(), 3);
        assert!(spec.descriptor(a).unwrap().is_leaf());
    }

    #[test]
    fn test_incompatible_child_leaves_tree_unmodified() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        spec.add_child(root, LOG_STRING).unwrap();
        let before = spec.root().children.clone();

        let err = spec.add_child(root, BYTES_TO_STRING).unwrap_err();

        assert!(matches!(err, PipeflowError::TypeIncompatible(_)));
        assert_eq!(spec.root().children, before);
        assert_eq!(spec.len(), 2);
    }

    #[test]
    fn test_incompatible_existing_child_is_rejected() {
        let mut spec = spec(BYTES_TO_STRING);
        let root = spec.root_id();
        let upper = spec.add_child(root, UPPERCASE).unwrap();
        let err = spec.add_existing_child(upper, root).unwrap_err();
        assert!(matches!(err, PipeflowError::TypeIncompatible(_)));
        assert!(spec.descriptor(upper).unwrap().children.is_empty());
    }

    #[test]
    fn test_all_descriptors_visits_shared_child_once() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, LOWERCASE).unwrap();
        let b = spec.add_child(root, UPPERCASE).unwrap();
        let shared = spec.add_child(a, LOG_STRING).unwrap();
        spec.add_existing_child(b, shared).unwrap();
        spec.add_existing_child(b, shared).unwrap();

        let ids: Vec<DescriptorId> = spec.all_descriptors().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![root, a, shared, b]);
        assert_eq!(spec.descriptor(b).unwrap().children, vec![shared]);
        assert_eq!(spec.upstream_counts().get(&shared), Some(&2));
    }

    #[test]
    fn test_post_order_puts_children_first() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, LOWERCASE).unwrap();
        let leaf = spec.add_child(a, LOG_STRING).unwrap();

        assert_eq!(spec.post_order(), vec![leaf, a, root]);
    }

    #[test]
    fn test_back_edge_is_cyclic() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, LOWERCASE).unwrap();
        let b = spec.add_child(a, UPPERCASE).unwrap();

        let err = spec.add_existing_child(b, root).unwrap_err();
        assert_eq!(err.error_info().map(|i| i.code.as_str()), Some(CYCLE_CODE));
        assert!(spec.descriptor(b).unwrap().children.is_empty());

        let err = spec.add_existing_child(a, a).unwrap_err();
        assert!(matches!(err, PipeflowError::CyclicTopology(_)));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_double_wrap_is_rejected() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let slot = spec.wrap(root, LOAD_BALANCE).unwrap();

        let err = spec.wrap(root, SPIN_UP).unwrap_err();
        assert_eq!(err.error_info().map(|i| i.code.as_str()), Some(DOUBLE_WRAP_CODE));

        let outer = spec.wrap_wrapper(slot, SPIN_UP).unwrap();
        assert_eq!(outer.depth(), 2);
        assert!(matches!(
            spec.wrap_wrapper(slot, SPIN_UP),
            Err(PipeflowError::DoubleWrap(_))
        ));

        let names: Vec<&str> = spec.root().wrappers.iter().map(|w| w.decorator.name()).collect();
        assert_eq!(names, vec![LOAD_BALANCE, SPIN_UP]);
        assert_eq!(spec.root().output(), &TypeTag::TEXT);
    }

    #[test]
    fn test_wrapper_accept_tag_is_checked() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let err = spec.wrap(root, "bytes_pool").unwrap_err();
        assert!(matches!(err, PipeflowError::TypeIncompatible(_)));
        assert!(spec.root().wrappers.is_empty());
    }

    #[test]
    fn test_error_handler_must_consume_failures() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let err = spec.set_error_handler(root, LOG_STRING).unwrap_err();
        assert!(matches!(err, PipeflowError::NotAnErrorHandler(_)));

        let handler = spec.set_error_handler(root, LOG_FAILURE).unwrap();
        assert_eq!(spec.root().error_handler, Some(handler));
        spec.wrap_error_handler(handler, SPIN_UP).unwrap();
        assert_eq!(spec.error_handler(handler).unwrap().wrappers.len(), 1);

        spec.clear_error_handler(root).unwrap();
        assert_eq!(spec.root().error_handler, None);
    }

    #[test]
    fn test_global_error_handler_is_shared_and_inherited() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, SPLIT_WORDS).unwrap();
        spec.set_error_handler(a, LOG_FAILURE).unwrap();

        let global = spec.set_global_error_handler(LOG_FAILURE).unwrap();
        let later = spec.add_child(a, LOG_STRING).unwrap();

        for id in [root, a, later] {
            assert_eq!(spec.descriptor(id).unwrap().error_handler, Some(global));
        }
        let handlers = spec.referenced_handlers();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].1, 3);
    }

    #[test]
    fn test_global_wrapper_skips_wrapped_nodes_and_is_inherited() {
        let mut spec = spec(UPPERCASE);
        let root = spec.root_id();
        let a = spec.add_child(root, LOWERCASE).unwrap();
        spec.wrap(a, SPIN_UP).unwrap();

        assert_eq!(spec.set_global_wrapper(LOAD_BALANCE).unwrap(), 1);
        let later = spec.add_child(a, LOG_STRING).unwrap();

        assert_eq!(spec.root().wrappers[0].decorator.name(), LOAD_BALANCE);
        assert_eq!(spec.descriptor(a).unwrap().wrappers[0].decorator.name(), SPIN_UP);
        assert_eq!(spec.descriptor(later).unwrap().wrappers[0].decorator.name(), LOAD_BALANCE);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_global_wrapper_mismatch_wraps_nothing() {
        let mut spec = spec(BYTES_TO_STRING);
        let root = spec.root_id();
        spec.add_child(root, UPPERCASE).unwrap();

        let err = spec.set_global_wrapper("bytes_pool").unwrap_err();
        assert!(matches!(err, PipeflowError::TypeIncompatible(_)));
        assert!(spec.all_descriptors().iter().all(|d| d.wrappers.is_empty()));
        assert!(spec.global_wrapper().is_none());
    }

    #[test]
    fn test_foreign_ids_are_rejected() {
        let mut spec = spec(UPPERCASE);
        let foreign = DescriptorId::new();
        assert!(matches!(
            spec.add_child(foreign, LOG_STRING),
            Err(PipeflowError::UnknownDescriptor(id)) if id == foreign
        ));
        assert!(spec.descriptor(foreign).is_err());
    }
}
