//! Registry of stage and decorator types.
//!
//! A stage type pairs a factory with its declared input/output tags and
//! stereotype; topology checks only ever look at the tags. Decorator types
//! are registered the same way and instantiated per wrapped instance.

use crate::config::PipelineConfig;
use crate::core::{Stereotype, TypeTag};
use crate::decorators::Decorator;
use crate::errors::{PipeflowError, Result};
use crate::stages::Stage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Factory function type for creating stages.
pub type StageFactory = Arc<dyn Fn() -> Box<dyn Stage> + Send + Sync>;

/// Factory function type for creating decorators.
pub type DecoratorFactory = Arc<dyn Fn(&PipelineConfig) -> Box<dyn Decorator> + Send + Sync>;

/// A registered stage type.
#[derive(Clone)]
pub struct StageType {
    name: Arc<str>,
    input: TypeTag,
    output: TypeTag,
    stereotype: Stereotype,
    factory: StageFactory,
}

impl StageType {
    fn with_factory<F, S>(
        name: impl Into<Arc<str>>,
        input: TypeTag,
        output: TypeTag,
        stereotype: Stereotype,
        factory: F,
    ) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self {
            name: name.into(),
            input,
            output,
            stereotype,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Stage>),
        }
    }

    /// A general `input -> output` stage.
    pub fn transform<F, S>(name: impl Into<Arc<str>>, input: TypeTag, output: TypeTag, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self::with_factory(name, input, output, Stereotype::Transform, factory)
    }

    /// A `T -> T` stage that passes or drops its input.
    pub fn filter<F, S>(name: impl Into<Arc<str>>, tag: TypeTag, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self::with_factory(name, tag.clone(), tag, Stereotype::Filter, factory)
    }

    /// A `T -> T` stage that always passes its input on unchanged.
    pub fn side_effect<F, S>(name: impl Into<Arc<str>>, tag: TypeTag, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self::with_factory(name, tag.clone(), tag, Stereotype::SideEffect, factory)
    }

    /// An `input -> [item]` stage.
    pub fn multi<F, S>(name: impl Into<Arc<str>>, input: TypeTag, item: TypeTag, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self::with_factory(name, input, item, Stereotype::Multi, factory)
    }

    /// A terminal stage consuming failure notices.
    pub fn error_handler<F, S>(name: impl Into<Arc<str>>, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stage + 'static,
    {
        Self::with_factory(name, TypeTag::FAILURE, TypeTag::FAILURE, Stereotype::Transform, factory)
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// The declared input tag.
    #[must_use]
    pub fn input(&self) -> &TypeTag {
        &self.input
    }

    /// The declared output tag (item tag for multi-output stages).
    #[must_use]
    pub fn output(&self) -> &TypeTag {
        &self.output
    }

    /// The stereotype checked after every `ingest`.
    #[must_use]
    pub fn stereotype(&self) -> Stereotype {
        self.stereotype
    }

    /// Returns true if this type consumes failure notices.
    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        self.input == TypeTag::FAILURE
    }

    /// Creates a fresh stage.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Stage> {
        (self.factory)()
    }
}

impl fmt::Debug for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageType")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("stereotype", &self.stereotype)
            .finish_non_exhaustive()
    }
}

/// A registered decorator type.
#[derive(Clone)]
pub struct DecoratorType {
    name: Arc<str>,
    accepts: Option<TypeTag>,
    factory: DecoratorFactory,
}

impl DecoratorType {
    /// Creates a decorator type accepting any wrapped output.
    pub fn new<F, D>(name: impl Into<Arc<str>>, factory: F) -> Self
    where
        F: Fn(&PipelineConfig) -> D + Send + Sync + 'static,
        D: Decorator + 'static,
    {
        Self {
            name: name.into(),
            accepts: None,
            factory: Arc::new(move |config| Box::new(factory(config)) as Box<dyn Decorator>),
        }
    }

    /// Restricts the decorator to wrap stages emitting `tag`.
    #[must_use]
    pub fn accepting(mut self, tag: TypeTag) -> Self {
        self.accepts = Some(tag);
        self
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag this decorator requires of what it wraps, if restricted.
    #[must_use]
    pub fn accepts(&self) -> Option<&TypeTag> {
        self.accepts.as_ref()
    }

    /// Creates a fresh decorator.
    #[must_use]
    pub fn instantiate(&self, config: &PipelineConfig) -> Box<dyn Decorator> {
        (self.factory)(config)
    }
}

impl fmt::Debug for DecoratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorType")
            .field("name", &self.name)
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

/// Registry for stage and decorator types.
#[derive(Default)]
pub struct StageRegistry {
    stages: RwLock<HashMap<String, StageType>>,
    decorators: RwLock<HashMap<String, DecoratorType>>,
}

impl StageRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the built-in stages and decorators.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::stages::builtin::register_builtins(&registry);
        crate::decorators::register_builtins(&registry);
        registry
    }

    /// Registers a stage type, replacing any type with the same name.
    pub fn register_stage(&self, stage_type: StageType) {
        self.stages.write().insert(stage_type.name().to_string(), stage_type);
    }

    /// Registers a decorator type, replacing any type with the same name.
    pub fn register_decorator(&self, decorator_type: DecoratorType) {
        self.decorators
            .write()
            .insert(decorator_type.name().to_string(), decorator_type);
    }

    /// Looks up a stage type.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownStageType`] if nothing is registered
    /// under `name`.
    pub fn stage(&self, name: &str) -> Result<StageType> {
        self.stages
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PipeflowError::UnknownStageType(name.to_string()))
    }

    /// Looks up a decorator type.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::UnknownDecoratorType`] if nothing is
    /// registered under `name`.
    pub fn decorator(&self, name: &str) -> Result<DecoratorType> {
        self.decorators
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PipeflowError::UnknownDecoratorType(name.to_string()))
    }

    /// Checks if a stage type is registered.
    #[must_use]
    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.read().contains_key(name)
    }

    /// Lists registered stage type names, sorted.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stages.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Lists registered decorator type names, sorted.
    #[must_use]
    pub fn decorator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.decorators.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stage_names())
            .field("decorators", &self.decorator_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::builtin;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtins_registered() {
        let registry = StageRegistry::with_builtins();

        assert_eq!(
            registry.stage_names(),
            vec![
                builtin::BYTES_TO_STRING,
                builtin::LOG_FAILURE,
                builtin::LOG_STRING,
                builtin::LOWERCASE,
                builtin::SPLIT_WORDS,
                builtin::UPPERCASE,
            ]
        );
        assert_eq!(
            registry.decorator_names(),
            vec![crate::decorators::LOAD_BALANCE, crate::decorators::SPIN_UP]
        );
    }

    #[test]
    fn test_declared_tags() {
        let registry = StageRegistry::with_builtins();

        let log = registry.stage(builtin::LOG_STRING).unwrap();
        assert_eq!(log.stereotype(), Stereotype::SideEffect);
        assert_eq!(log.input(), log.output());

        let bytes = registry.stage(builtin::BYTES_TO_STRING).unwrap();
        assert_eq!(bytes.input(), &TypeTag::BYTES);
        assert_eq!(bytes.output(), &TypeTag::TEXT);

        assert!(registry.stage(builtin::LOG_FAILURE).unwrap().is_error_handler());
        assert!(!log.is_error_handler());
    }

    #[test]
    fn test_unknown_names() {
        let registry = StageRegistry::new();
        assert!(matches!(
            registry.stage("nope"),
            Err(PipeflowError::UnknownStageType(name)) if name == "nope"
        ));
        assert!(matches!(
            registry.decorator("nope"),
            Err(PipeflowError::UnknownDecoratorType(_))
        ));
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let registry = StageRegistry::with_builtins();
        let upper = registry.stage(builtin::UPPERCASE).unwrap();

        let a = upper.instantiate();
        let b = upper.instantiate();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
