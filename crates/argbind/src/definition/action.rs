use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use super::argument::{ArgBuilder, ArgumentDefinition};
use super::{ArgShape, ShapeBuilder};
use crate::bind::BoundValues;
use crate::error::DefinitionError;
use crate::hooks::ArgHook;
use crate::revive::{ArgType, ArgValue, ValueType, short_type_name};

type SyncHandler<T> = Arc<dyn Fn(&T, &BoundValues) -> anyhow::Result<()> + Send + Sync>;
type AsyncHandler<T> = Arc<dyn Fn(T, BoundValues) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// The invocation target of one action.
pub(crate) enum Handler<T> {
    Sync(SyncHandler<T>),
    Async(AsyncHandler<T>),
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(f.clone()),
            Self::Async(f) => Self::Async(f.clone()),
        }
    }
}

/// A parameter whose type is itself an argument shape.
#[derive(Clone)]
pub struct ShapeParam {
    type_id: TypeId,
    type_name: String,
    nested: fn() -> Result<NestedShape, DefinitionError>,
    bind: fn(&BoundValues) -> crate::Result<ArgValue>,
}

impl fmt::Debug for ShapeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShapeParam").field(&self.type_name).finish()
    }
}

/// What an action inherits from its argument shape.
pub(crate) struct NestedShape {
    pub(crate) arguments: Vec<ArgumentDefinition>,
    pub(crate) hooks: Vec<Arc<dyn ArgHook>>,
    pub(crate) description: Option<String>,
}

fn describe_nested<A: ArgShape>() -> Result<NestedShape, DefinitionError> {
    let mut builder = ShapeBuilder::<A>::new();
    A::describe(&mut builder);
    builder.into_nested()
}

fn bind_nested<A: ArgShape>(values: &BoundValues) -> crate::Result<ArgValue> {
    A::bind(values).map(ArgValue::new)
}

impl ShapeParam {
    pub fn of<A: ArgShape>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: short_type_name(std::any::type_name::<A>()),
            nested: describe_nested::<A>,
            bind: bind_nested::<A>,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn nested(&self) -> Result<NestedShape, DefinitionError> {
        (self.nested)()
    }

    pub(crate) fn bind(&self, values: &BoundValues) -> crate::Result<ArgValue> {
        (self.bind)(values)
    }
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub enum ActionParameter {
    /// Revived directly; becomes one action argument.
    Value { name: String, value_type: ValueType },
    /// Bound field by field from the remaining tokens.
    Shape(ShapeParam),
}

/// A sub-command selected by the first positional token.
#[derive(Clone)]
pub struct ActionDefinition {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    source: String,
    arguments: Vec<ArgumentDefinition>,
    parameters: Vec<ActionParameter>,
    hooks: Vec<Arc<dyn ArgHook>>,
    property: Option<ShapeParam>,
    shape: Option<ShapeParam>,
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("source", &self.source)
            .field("arguments", &self.arguments)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl ActionDefinition {
    fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: vec![name.to_string()],
            description: None,
            source: source.to_string(),
            arguments: Vec::new(),
            parameters: Vec::new(),
            hooks: Vec::new(),
            property: None,
            shape: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All accepted spellings, canonical name first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Name of the action source that declared this action.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn arguments(&self) -> &[ArgumentDefinition] {
        &self.arguments
    }

    pub fn parameters(&self) -> &[ActionParameter] {
        &self.parameters
    }

    pub fn hooks(&self) -> &[Arc<dyn ArgHook>] {
        &self.hooks
    }

    /// The nested shape bound from this action's tokens, if any.
    pub fn shape(&self) -> Option<&ShapeParam> {
        self.shape.as_ref()
    }

    pub fn matches(&self, token: &str, ignore_case: bool) -> bool {
        self.aliases
            .iter()
            .any(|a| super::argument::same_alias(a, token, ignore_case))
    }

    pub(crate) fn arguments_mut(&mut self) -> &mut Vec<ArgumentDefinition> {
        &mut self.arguments
    }

    /// Apply the parameter rules and settle the action's argument list.
    pub(crate) fn resolve_parameters(&mut self) -> Result<(), DefinitionError> {
        let shapes: Vec<&ShapeParam> = self
            .parameters
            .iter()
            .filter_map(|p| match p {
                ActionParameter::Shape(s) => Some(s),
                ActionParameter::Value { .. } => None,
            })
            .collect();

        if shapes.len() > 1 {
            return Err(DefinitionError::new(format!(
                "action '{}' has too many parameters: only one argument shape is allowed",
                self.name
            )));
        }

        let shape = match (shapes.first(), &self.property) {
            (Some(s), Some(p)) if s.type_id != p.type_id => {
                return Err(DefinitionError::new(format!(
                    "action '{}': action methods must take one parameter that matches the property type ({} vs {})",
                    self.name, s.type_name, p.type_name
                )));
            }
            (Some(s), _) => Some((*s).clone()),
            (None, Some(p)) => Some(p.clone()),
            (None, None) => None,
        };

        if let Some(shape) = shape {
            let has_values = self
                .parameters
                .iter()
                .any(|p| matches!(p, ActionParameter::Value { .. }));
            if has_values {
                tracing::warn!(
                    action = %self.name,
                    shape = %shape.type_name,
                    "action takes an argument shape; its other parameters are ignored"
                );
            }
            let nested = shape.nested()?;
            self.arguments = nested.arguments;
            self.hooks.extend(nested.hooks);
            if self.description.is_none() {
                self.description = nested.description;
            }
            self.shape = Some(shape);
        }
        Ok(())
    }

    pub(crate) fn schema(&self) -> argbind_schema::ActionSchema {
        argbind_schema::ActionSchema {
            name: self.name.clone(),
            aliases: self.aliases.iter().skip(1).cloned().collect(),
            description: self.description.clone().unwrap_or_default(),
            source: self.source.clone(),
            args: self
                .arguments
                .iter()
                .filter(|a| !a.is_ignored())
                .map(ArgumentDefinition::schema)
                .collect(),
        }
    }
}

/// An action under construction, with its handler.
pub(crate) struct PendingAction<T> {
    pub(crate) definition: ActionDefinition,
    pub(crate) handler: Option<Handler<T>>,
}

/// A named, independent set of actions.
pub struct ActionSource<T> {
    name: String,
    actions: Vec<PendingAction<T>>,
}

impl<T: ArgShape> ActionSource<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action(&mut self, name: &str) -> ActionBuilder<'_, T> {
        let definition = ActionDefinition::new(name, &self.name);
        self.actions.push(PendingAction {
            definition,
            handler: None,
        });
        let idx = self.actions.len() - 1;
        ActionBuilder {
            action: &mut self.actions[idx],
        }
    }

    pub(crate) fn into_actions(self) -> Vec<PendingAction<T>> {
        self.actions
    }
}

/// A type that contributes actions to any shape that asks for it with
/// [`ShapeBuilder::actions_from`].
pub trait ActionProvider: 'static {
    fn provide<T: ArgShape>(source: &mut ActionSource<T>);
}

/// Discovers action sources at definition time, e.g. to compose several
/// independent action sets into one.
pub trait ActionResolver<T>: Send + Sync {
    fn resolve(&self) -> Vec<ActionSource<T>>;
}

/// Fluent configuration of one action.
pub struct ActionBuilder<'a, T> {
    action: &'a mut PendingAction<T>,
}

impl<'a, T: ArgShape> ActionBuilder<'a, T> {
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        let def = &mut self.action.definition;
        if !def.aliases.iter().any(|a| a == alias) {
            def.aliases.push(alias.to_string());
        }
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.action.definition.description = Some(description.into());
        self
    }

    pub fn hook(&mut self, hook: impl ArgHook + 'static) -> &mut Self {
        self.action.definition.hooks.push(Arc::new(hook));
        self
    }

    /// A revivable parameter; it becomes one of the action's arguments.
    pub fn param<P: ArgType>(&mut self, name: &str) -> ArgBuilder<'_, P> {
        let def = &mut self.action.definition;
        def.parameters.push(ActionParameter::Value {
            name: name.to_string(),
            value_type: P::value_type(),
        });
        def.arguments.push(ArgumentDefinition::new(name, P::value_type()));
        let idx = def.arguments.len() - 1;
        ArgBuilder::new(&mut def.arguments[idx])
    }

    /// A parameter bound as a whole argument shape.
    pub fn param_shape<A: ArgShape>(&mut self) -> &mut Self {
        self.action
            .definition
            .parameters
            .push(ActionParameter::Shape(ShapeParam::of::<A>()));
        self
    }

    pub fn param_of(&mut self, parameter: ActionParameter) -> &mut Self {
        if let ActionParameter::Value { name, value_type } = &parameter {
            self.action
                .definition
                .arguments
                .push(ArgumentDefinition::new(name.clone(), value_type.clone()));
        }
        self.action.definition.parameters.push(parameter);
        self
    }

    /// Declares the top-level property that holds this action's arguments.
    /// A shape parameter must then have the same type.
    pub fn property<A: ArgShape>(&mut self) -> &mut Self {
        self.action.definition.property = Some(ShapeParam::of::<A>());
        self
    }

    fn set_handler(&mut self, handler: Handler<T>) -> &mut Self {
        self.action.handler = Some(handler);
        self
    }

    pub fn run<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(Handler::Sync(Arc::new(move |args: &T, _: &BoundValues| f(args))))
    }

    /// Handler reading revivable parameters from the bound values.
    pub fn run_params<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T, &BoundValues) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(Handler::Sync(Arc::new(f)))
    }

    /// Handler taking the action's argument shape; declares the shape
    /// parameter too.
    pub fn run_args<A, F>(&mut self, f: F) -> &mut Self
    where
        A: ArgShape,
        F: Fn(&T, &A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.param_shape::<A>();
        self.set_handler(Handler::Sync(Arc::new(move |args: &T, values: &BoundValues| {
            let nested = values
                .action_args::<A>()
                .ok_or_else(|| anyhow::anyhow!("action arguments were not bound"))?;
            f(args, &nested)
        })))
    }

    pub fn run_async<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.set_handler(Handler::Async(Arc::new(move |args: T, _: BoundValues| f(args).boxed())))
    }

    pub fn run_params_async<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(T, BoundValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.set_handler(Handler::Async(Arc::new(move |args: T, values: BoundValues| {
            f(args, values).boxed()
        })))
    }

    pub fn run_args_async<A, F, Fut>(&mut self, f: F) -> &mut Self
    where
        A: ArgShape,
        F: Fn(T, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.param_shape::<A>();
        self.set_handler(Handler::Async(Arc::new(move |args: T, values: BoundValues| {
            match values.action_args::<A>() {
                Some(nested) => f(args, nested).boxed(),
                None => futures_util::future::ready(Err(anyhow::anyhow!("action arguments were not bound"))).boxed(),
            }
        })))
    }
}
