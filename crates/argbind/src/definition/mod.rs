//! Definition model.
//!
//! A shape describes itself through [`ArgShape::describe`]; the builder is
//! then frozen into an [`ArgumentsDefinition`] after every alias, position,
//! reviver and validator has been checked. Nothing is checked lazily: a
//! definition that builds will not fail for structural reasons at parse time.

mod action;
mod argument;
mod shortcut;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use action::{
    ActionBuilder, ActionDefinition, ActionParameter, ActionProvider, ActionResolver, ActionSource,
    ShapeParam,
};
pub(crate) use action::{Handler, NestedShape};
pub use argument::{Alias, AliasKind, ArgBuilder, ArgMetadata, ArgumentDefinition};
pub(crate) use argument::same_alias;

use crate::bind::BoundValues;
use crate::error::{DefinitionError, Result};
use crate::hooks::ArgHook;
use crate::lexer::ArgStyle;
use crate::revive::{ArgType, ReviverRegistry, short_type_name};
use crate::validate::DefinitionScope;

/// A type that can be bound from the command line.
///
/// `describe` declares arguments and actions; `bind` builds the value from
/// what was revived. `describe` runs once per parse call.
pub trait ArgShape: Clone + Send + Sync + 'static {
    fn describe(d: &mut ShapeBuilder<Self>);

    fn bind(values: &BoundValues) -> Result<Self>;
}

/// What happens to user-input errors at the entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return them as `Err`.
    #[default]
    Propagate,
    /// Print them to stderr and return an [`crate::ArgAction`] carrying the
    /// error. Definition and handler errors still propagate.
    PrintAndReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    FirstFailure,
    /// Run every validator and report all failures together.
    Aggregate,
}

/// Declaration-level options.
#[derive(Debug, Clone)]
pub struct DefinitionOptions {
    pub style: ArgStyle,
    pub ignore_case: bool,
    pub error_policy: ErrorPolicy,
    pub validation_mode: ValidationMode,
    pub exe_name: Option<String>,
    pub description: Option<String>,
}

impl Default for DefinitionOptions {
    fn default() -> Self {
        Self {
            style: ArgStyle::Dash,
            ignore_case: true,
            error_policy: ErrorPolicy::Propagate,
            validation_mode: ValidationMode::FirstFailure,
            exe_name: None,
            description: None,
        }
    }
}

type ProvideFn<T> = fn(&mut ActionSource<T>);

/// Collects a shape's declaration. Handed to [`ArgShape::describe`].
pub struct ShapeBuilder<T> {
    arguments: Vec<ArgumentDefinition>,
    own: ActionSource<T>,
    providers: Vec<(String, ProvideFn<T>)>,
    resolvers: Vec<Arc<dyn ActionResolver<T>>>,
    options: DefinitionOptions,
    case_policy: Option<bool>,
    hooks: Vec<Arc<dyn ArgHook>>,
}

impl<T: ArgShape> ShapeBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            arguments: Vec::new(),
            own: ActionSource::new(short_type_name(std::any::type_name::<T>())),
            providers: Vec::new(),
            resolvers: Vec::new(),
            options: DefinitionOptions::default(),
            case_policy: None,
            hooks: Vec::new(),
        }
    }

    pub fn arg<A: ArgType>(&mut self, name: &str) -> ArgBuilder<'_, A> {
        self.arguments.push(ArgumentDefinition::new(name, A::value_type()));
        let idx = self.arguments.len() - 1;
        ArgBuilder::new(&mut self.arguments[idx])
    }

    /// The required position-0 argument that selects the action.
    pub fn action_arg(&mut self, name: &str) -> ArgBuilder<'_, String> {
        let mut arg = self.arg::<String>(name);
        arg.position(0).required();
        arg
    }

    pub fn action(&mut self, name: &str) -> ActionBuilder<'_, T> {
        self.own.action(name)
    }

    /// Actions declared by another type, collected at build time.
    pub fn actions_from<P: ActionProvider>(&mut self) -> &mut Self {
        self.providers
            .push((short_type_name(std::any::type_name::<P>()), P::provide::<T> as ProvideFn<T>));
        self
    }

    pub fn action_resolver(&mut self, resolver: impl ActionResolver<T> + 'static) -> &mut Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn style(&mut self, style: ArgStyle) -> &mut Self {
        self.options.style = style;
        self
    }

    /// Default case policy for every alias and action name.
    pub fn ignore_case(&mut self, ignore_case: bool) -> &mut Self {
        self.options.ignore_case = ignore_case;
        self.case_policy = Some(ignore_case);
        self
    }

    pub fn error_policy(&mut self, policy: ErrorPolicy) -> &mut Self {
        self.options.error_policy = policy;
        self
    }

    pub fn validation_mode(&mut self, mode: ValidationMode) -> &mut Self {
        self.options.validation_mode = mode;
        self
    }

    pub fn exe_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.options.exe_name = Some(name.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.options.description = Some(description.into());
        self
    }

    /// A hook that sees every phase of every parse of this shape.
    pub fn hook(&mut self, hook: impl ArgHook + 'static) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    fn declares_actions(&self) -> bool {
        !self.own.is_empty() || !self.providers.is_empty() || !self.resolvers.is_empty()
    }

    /// Freeze a shape used as an action parameter. It keeps its arguments,
    /// hooks, case policy and description; the options that shape a whole
    /// command line belong to the top-level shape.
    pub(crate) fn into_nested(self) -> Result<NestedShape, DefinitionError> {
        let shape = short_type_name(std::any::type_name::<T>());
        if self.declares_actions() {
            return Err(DefinitionError::new(format!(
                "action argument shape {shape} cannot declare actions of its own"
            )));
        }
        let defaults = DefinitionOptions::default();
        let options = &self.options;
        if options.style != defaults.style
            || options.error_policy != defaults.error_policy
            || options.validation_mode != defaults.validation_mode
            || options.exe_name.is_some()
        {
            return Err(DefinitionError::new(format!(
                "action argument shape {shape} cannot set style, error policy, validation mode or exe name"
            )));
        }

        let mut arguments = self.arguments;
        if let Some(ignore_case) = self.case_policy {
            for arg in &mut arguments {
                arg.inherit_case_policy(ignore_case);
            }
        }
        Ok(NestedShape {
            arguments,
            hooks: self.hooks,
            description: self.options.description,
        })
    }

    fn collect_sources(&mut self) -> Vec<ActionSource<T>> {
        let own = std::mem::replace(&mut self.own, ActionSource::new(String::new()));
        let mut sources = vec![own];
        for (name, provide) in &self.providers {
            let mut source = ActionSource::new(name.clone());
            provide(&mut source);
            sources.push(source);
        }
        for resolver in &self.resolvers {
            sources.extend(resolver.resolve());
        }
        sources
    }

    /// Freeze the declaration, running every definition-time check.
    pub(crate) fn build(mut self, registry: &ReviverRegistry) -> Result<Blueprint<T>, DefinitionError> {
        let ignore_case = self.options.ignore_case;
        let mut actions = Vec::new();
        let mut handlers = Vec::new();
        for source in self.collect_sources() {
            for pending in source.into_actions() {
                let mut definition = pending.definition;
                let handler = pending.handler.ok_or_else(|| {
                    DefinitionError::new(format!("action '{}' has no handler", definition.name()))
                })?;
                definition.resolve_parameters()?;
                actions.push(definition);
                handlers.push(handler);
            }
        }
        check_action_aliases(&actions, ignore_case)?;

        let mut arguments = self.arguments;
        for arg in arguments
            .iter_mut()
            .chain(actions.iter_mut().flat_map(|a| a.arguments_mut().iter_mut()))
        {
            check_shortcut_policy(arg)?;
            if arg.reviver().is_none() && !arg.is_ignored() {
                registry.check(arg.value_type()).map_err(|e| {
                    DefinitionError::new(format!("argument '{}': {}", arg.name(), e.message()))
                })?;
            }
            arg.set_ignore_case(arg.case_override().unwrap_or(ignore_case));
            shortcut::add_names(arg);
        }

        {
            let mut action_args: Vec<&mut Vec<ArgumentDefinition>> =
                actions.iter_mut().map(|a| a.arguments_mut()).collect();
            shortcut::assign_shortcuts(&mut arguments, &mut action_args);
        }
        shortcut::check_unique(arguments.iter())?;
        for action in &actions {
            shortcut::check_unique(arguments.iter().chain(action.arguments())).map_err(|e| {
                DefinitionError::new(format!("action '{}': {}", action.name(), e.message()))
            })?;
        }

        check_positions(&arguments, &actions)?;

        if !actions.is_empty() {
            let selector = arguments.iter().find(|a| a.position() == Some(0));
            let ok = selector.is_some_and(|a| {
                a.value_type().id() == TypeId::of::<String>() && a.validators().any(|v| v.is_required())
            });
            if !ok {
                return Err(DefinitionError::new(
                    "a shape with actions needs a required String argument at position 0 (see ShapeBuilder::action_arg)",
                ));
            }
        }

        {
            let everything: Vec<&ArgumentDefinition> = arguments
                .iter()
                .chain(actions.iter().flat_map(|a| a.arguments()))
                .collect();
            let scope = DefinitionScope::new(everything);
            for arg in &arguments {
                for v in arg.validators() {
                    v.check_definition(arg, &scope)?;
                }
            }
            for action in &actions {
                let scope = DefinitionScope::new(arguments.iter().chain(action.arguments()).collect());
                for arg in action.arguments() {
                    for v in arg.validators() {
                        v.check_definition(arg, &scope)?;
                    }
                }
            }
        }

        for arg in arguments
            .iter_mut()
            .chain(actions.iter_mut().flat_map(|a| a.arguments_mut().iter_mut()))
        {
            arg.resolve_hooks();
        }

        let definition = ArgumentsDefinition {
            shape_name: short_type_name(std::any::type_name::<T>()),
            options: self.options,
            arguments,
            actions,
            hooks: self.hooks,
        };
        tracing::trace!(
            shape = %definition.shape_name,
            arguments = definition.arguments.len(),
            actions = definition.actions.len(),
            "built argument definition"
        );
        Ok(Blueprint { definition, handlers })
    }
}

fn check_shortcut_policy(arg: &ArgumentDefinition) -> Result<(), DefinitionError> {
    if arg.has_no_shortcut() && arg.has_explicit_alias() {
        return Err(DefinitionError::new(format!(
            "argument '{}' is marked NoShortcut but declares an explicit shortcut",
            arg.name()
        )));
    }
    let has_any = arg
        .aliases()
        .iter()
        .any(|a| matches!(a.kind, AliasKind::Explicit | AliasKind::LongForm));
    if arg.is_shortcuts_only() && !has_any {
        return Err(DefinitionError::new(format!(
            "argument '{}' is marked ShortcutsOnly but declares no shortcut",
            arg.name()
        )));
    }
    Ok(())
}

fn check_action_aliases(actions: &[ActionDefinition], ignore_case: bool) -> Result<(), DefinitionError> {
    for (i, first) in actions.iter().enumerate() {
        for second in &actions[i + 1..] {
            let clash = first
                .aliases()
                .iter()
                .find(|a| second.aliases().iter().any(|b| same_alias(a, b, ignore_case)));
            if let Some(alias) = clash {
                return Err(DefinitionError::new(format!(
                    "duplicate action alias '{alias}' declared by '{}' ({}) and '{}' ({})",
                    first.name(),
                    first.source(),
                    second.name(),
                    second.source()
                )));
            }
        }
    }
    Ok(())
}

fn check_unique_positions<'a>(
    args: impl IntoIterator<Item = &'a ArgumentDefinition>,
) -> Result<(), DefinitionError> {
    let mut seen: HashMap<usize, &str> = HashMap::new();
    for arg in args {
        let Some(position) = arg.position() else { continue };
        if arg.is_ignored() {
            continue;
        }
        if let Some(other) = seen.insert(position, arg.name()) {
            return Err(DefinitionError::new(format!(
                "duplicate position {position} on arguments '{other}' and '{}'",
                arg.name()
            )));
        }
    }
    Ok(())
}

fn check_positions(arguments: &[ArgumentDefinition], actions: &[ActionDefinition]) -> Result<(), DefinitionError> {
    check_unique_positions(arguments)?;
    for action in actions {
        if let Some(arg) = action.arguments().iter().find(|a| a.position() == Some(0)) {
            return Err(DefinitionError::new(format!(
                "argument '{}' of action '{}' must have a position of 1 or more",
                arg.name(),
                action.name()
            )));
        }
        check_unique_positions(arguments.iter().chain(action.arguments()))?;
    }
    Ok(())
}

/// A built definition plus the handlers of its actions, index-aligned.
pub(crate) struct Blueprint<T> {
    pub(crate) definition: ArgumentsDefinition,
    pub(crate) handlers: Vec<Handler<T>>,
}

/// The frozen description of one shape.
#[derive(Clone)]
pub struct ArgumentsDefinition {
    shape_name: String,
    options: DefinitionOptions,
    arguments: Vec<ArgumentDefinition>,
    actions: Vec<ActionDefinition>,
    hooks: Vec<Arc<dyn ArgHook>>,
}

impl fmt::Debug for ArgumentsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentsDefinition")
            .field("shape_name", &self.shape_name)
            .field("options", &self.options)
            .field("arguments", &self.arguments)
            .field("actions", &self.actions)
            .finish()
    }
}

impl ArgumentsDefinition {
    pub fn shape_name(&self) -> &str {
        &self.shape_name
    }

    pub fn options(&self) -> &DefinitionOptions {
        &self.options
    }

    /// Top-level arguments, in declaration order.
    pub fn arguments(&self) -> &[ArgumentDefinition] {
        &self.arguments
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    /// Declaration-level hooks.
    pub fn hooks(&self) -> &[Arc<dyn ArgHook>] {
        &self.hooks
    }

    pub fn is_action_mode(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn find_argument(&self, alias: &str) -> Option<&ArgumentDefinition> {
        self.arguments.iter().find(|a| !a.is_ignored() && a.matches(alias))
    }

    pub fn find_action(&self, token: &str) -> Option<&ActionDefinition> {
        self.action_index(token).map(|idx| &self.actions[idx])
    }

    pub(crate) fn action_index(&self, token: &str) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| a.matches(token, self.options.ignore_case))
    }

    /// Machine-readable description for usage renderers.
    pub fn schema(&self) -> argbind_schema::ShapeSchema {
        let mut schema = argbind_schema::ShapeSchema::new(self.shape_name.clone());
        schema.exe_name = self.options.exe_name.clone().unwrap_or_default();
        schema.description = self.options.description.clone().unwrap_or_default();
        schema.style = match self.options.style {
            ArgStyle::Dash => argbind_schema::StyleSchema::Dash,
            ArgStyle::SlashColon => argbind_schema::StyleSchema::SlashColon,
        };
        schema.args = self
            .arguments
            .iter()
            .filter(|a| !a.is_ignored())
            .map(ArgumentDefinition::schema)
            .collect();
        schema.actions = self.actions.iter().map(ActionDefinition::schema).collect();
        schema
    }
}

/// Build the definition of `T` against `registry`.
pub(crate) fn blueprint<T: ArgShape>(registry: &ReviverRegistry) -> Result<Blueprint<T>, DefinitionError> {
    let mut builder = ShapeBuilder::<T>::new();
    T::describe(&mut builder);
    builder.build(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revive::ReviverRegistry;

    #[derive(Debug, Clone, Default)]
    struct Plain;

    impl ArgShape for Plain {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.arg::<String>("String");
            d.arg::<i32>("Int");
            d.arg::<f64>("Double");
            d.arg::<bool>("Bool");
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Plain)
        }
    }

    fn build<T: ArgShape>() -> Result<ArgumentsDefinition, DefinitionError> {
        blueprint::<T>(&ReviverRegistry::global()).map(|b| b.definition)
    }

    fn aliases(def: &ArgumentsDefinition, name: &str) -> Vec<String> {
        def.arguments()
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.aliases().iter().map(|x| x.text.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn names_and_generated_shortcuts() {
        let def = build::<Plain>().unwrap();
        assert_eq!(aliases(&def, "String"), ["String", "S"]);
        assert_eq!(aliases(&def, "Int"), ["Int", "I"]);
        assert_eq!(aliases(&def, "Double"), ["Double", "D"]);
        assert_eq!(aliases(&def, "Bool"), ["Bool", "B"]);
        assert!(def.find_argument("string").is_some());
        assert!(!def.is_action_mode());
    }

    macro_rules! shape {
        ($name:ident, |$d:ident| $body:block) => {
            #[derive(Debug, Clone)]
            struct $name;

            impl ArgShape for $name {
                fn describe($d: &mut ShapeBuilder<Self>) $body

                fn bind(_: &BoundValues) -> Result<Self> {
                    Ok($name)
                }
            }
        };
    }

    shape!(NoShortcutClash, |d| {
        d.arg::<String>("Name").shortcut("n").no_shortcut();
    });
    shape!(ShortcutsOnlyEmpty, |d| {
        d.arg::<String>("Name").shortcuts_only();
    });
    shape!(DuplicatePositions, |d| {
        d.arg::<String>("First").position(0);
        d.arg::<String>("Second").position(0);
    });
    shape!(NoReviver, |d| {
        d.arg::<Opaque>("Thing");
    });
    shape!(NoSelector, |d| {
        d.action("go").run(|_| Ok(()));
    });
    shape!(UnknownVariable, |d| {
        d.arg::<String>("Name").required_if("nope");
    });
    shape!(CaseSensitiveClash, |d| {
        d.ignore_case(false);
        d.arg::<String>("x").no_shortcut();
        d.arg::<String>("X").no_shortcut();
    });

    #[derive(Debug, Clone)]
    struct Opaque;

    impl ArgType for Opaque {
        fn value_type() -> crate::revive::ValueType {
            crate::revive::ValueType::scalar::<Opaque>()
        }
    }

    #[test]
    fn structural_errors_are_definition_errors() {
        let msg = |r: Result<ArgumentsDefinition, DefinitionError>| r.unwrap_err().message().to_string();

        assert!(msg(build::<NoShortcutClash>()).contains("NoShortcut"));
        assert!(msg(build::<ShortcutsOnlyEmpty>()).contains("ShortcutsOnly"));
        assert!(msg(build::<DuplicatePositions>()).contains("duplicate position"));
        assert!(msg(build::<NoReviver>()).contains("Opaque"));
        assert!(msg(build::<NoSelector>()).contains("position 0"));
        assert!(msg(build::<UnknownVariable>()).contains("nope"));
    }

    #[test]
    fn case_sensitive_definitions_keep_both_spellings() {
        let def = build::<CaseSensitiveClash>().unwrap();
        assert!(def.find_argument("x").is_some());
        assert_eq!(def.find_argument("X").map(|a| a.name()), Some("X"));
    }

    shape!(Tool, |d| {
        d.action_arg("Action");
        d.arg::<bool>("Verbose");
        let mut push = d.action("push");
        push.alias("p").description("push refs");
        push.param::<String>("Remote").position(1).required();
        push.run(|_| Ok(()));
        d.actions_from::<Extra>();
    });

    struct Extra;

    impl ActionProvider for Extra {
        fn provide<T: ArgShape>(source: &mut ActionSource<T>) {
            source.action("fetch").run(|_| Ok(()));
        }
    }

    shape!(Clashing, |d| {
        d.action_arg("Action");
        d.action("fetch").run(|_| Ok(()));
        d.actions_from::<Extra>();
    });

    #[test]
    fn actions_from_several_sources() {
        let def = build::<Tool>().unwrap();
        assert!(def.is_action_mode());
        assert_eq!(def.find_action("PUSH").map(|a| a.name()), Some("push"));
        assert_eq!(def.find_action("p").map(|a| a.name()), Some("push"));
        assert_eq!(def.find_action("fetch").map(|a| a.source()), Some("Extra"));

        let err = build::<Clashing>().unwrap_err();
        assert!(err.message().contains("duplicate"));
    }

    #[test]
    fn schema_lists_actions_and_aliases() {
        let schema = build::<Tool>().unwrap().schema();
        let push = schema.action("push").unwrap();
        assert_eq!(push.aliases, ["p"]);
        assert_eq!(push.args[0].name, "Remote");
        assert!(push.args[0].required);
        let verbose = schema.args.iter().find(|a| a.name == "Verbose").unwrap();
        assert!(verbose.flag);
        assert_eq!(verbose.aliases, ["Verbose", "V"]);
    }

    shape!(RepeatedName, |d| {
        d.arg::<String>("Name");
        d.arg::<i32>("Name");
    });
    shape!(Verbose, |d| {
        d.arg::<bool>("Verbose");
    });
    shape!(SharedName, |d| {
        d.action_arg("Action");
        d.arg::<bool>("Verbose");
        d.action("go").run_args(|_, _: &Verbose| Ok(()));
    });

    #[test]
    fn repeated_argument_names_are_rejected() {
        let err = build::<RepeatedName>().unwrap_err();
        assert_eq!(err.message(), "duplicate argument name 'Name'");

        let err = build::<SharedName>().unwrap_err();
        assert_eq!(err.message(), "action 'go': duplicate argument name 'Verbose'");
    }

    shape!(Left, |d| {
        d.arg::<String>("Left");
    });
    shape!(Right, |d| {
        d.arg::<String>("Right");
    });
    shape!(TwoShapes, |d| {
        d.action_arg("Action");
        d.action("go").param_shape::<Left>().param_shape::<Right>().run(|_| Ok(()));
    });
    shape!(WrongProperty, |d| {
        d.action_arg("Action");
        d.action("go").property::<Left>().run_args(|_, _: &Right| Ok(()));
    });
    shape!(PropertyOnly, |d| {
        d.action_arg("Action");
        let mut go = d.action("go");
        go.property::<Left>();
        go.param::<i32>("Ignored");
        go.run(|_| Ok(()));
    });

    #[test]
    fn parameter_rules() {
        let err = build::<TwoShapes>().unwrap_err();
        assert!(err.message().contains("too many parameters"), "{}", err.message());

        let err = build::<WrongProperty>().unwrap_err();
        assert_eq!(
            err.message(),
            "action 'go': action methods must take one parameter that matches the property type (Right vs Left)"
        );

        let def = build::<PropertyOnly>().unwrap();
        let go = def.find_action("go").unwrap();
        assert_eq!(go.shape().map(ShapeParam::type_name), Some("Left"));
        let names: Vec<&str> = go.arguments().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["Left"]);
    }

    struct Plugins {
        clash: bool,
    }

    impl<T: ArgShape> ActionResolver<T> for Plugins {
        fn resolve(&self) -> Vec<ActionSource<T>> {
            let mut deploy = ActionSource::new("Deploy");
            deploy.action("deploy").alias("d").run(|_| Ok(()));
            let mut doctor = ActionSource::new("Doctor");
            let mut check = doctor.action("doctor");
            if self.clash {
                check.alias("D");
            }
            check.run(|_| Ok(()));
            vec![deploy, doctor]
        }
    }

    shape!(Composed, |d| {
        d.action_arg("Action");
        d.action("push").run(|_| Ok(()));
        d.action_resolver(Plugins { clash: false });
    });
    shape!(ComposedClash, |d| {
        d.action_arg("Action");
        d.action_resolver(Plugins { clash: true });
    });

    #[test]
    fn resolvers_compose_action_sources() {
        let def = build::<Composed>().unwrap();
        let names: Vec<&str> = def.actions().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["push", "deploy", "doctor"]);
        assert_eq!(def.find_action("push").map(|a| a.source()), Some("Composed"));
        assert_eq!(def.find_action("D").map(|a| a.source()), Some("Deploy"));
        assert_eq!(def.find_action("doctor").map(|a| a.source()), Some("Doctor"));

        let err = build::<ComposedClash>().unwrap_err();
        assert_eq!(
            err.message(),
            "duplicate action alias 'd' declared by 'deploy' (Deploy) and 'doctor' (Doctor)"
        );
    }
}
