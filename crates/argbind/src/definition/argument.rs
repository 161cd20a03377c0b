use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ArgError;
use crate::hooks::{ArgHook, DefaultValue, EnvDefault};
use crate::revive::{ArgType, ArgValue, ReviveFn, ValueType};
use crate::validate::{
    ArgValidator, CantBeCombinedWith, ExistingDirectory, ExistingFile, FnValidator, Pattern, Range,
    Required,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    /// The argument's own name.
    Name,
    /// Declared with `alias`/`shortcut`.
    Explicit,
    /// Declared with `long_form`, stored without dashes.
    LongForm,
    /// Derived from the name at build time.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub text: String,
    pub kind: AliasKind,
}

/// One metadata record attached to an argument, in declaration order.
#[derive(Clone)]
pub enum ArgMetadata {
    Description(String),
    DefaultValue(String),
    Env(String),
    Validator(Arc<dyn ArgValidator>),
    Hook(Arc<dyn ArgHook>),
    Reviver(ReviveFn),
    NoShortcut,
    ShortcutsOnly,
    Ignore,
}

impl fmt::Debug for ArgMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Description(d) => f.debug_tuple("Description").field(d).finish(),
            Self::DefaultValue(v) => f.debug_tuple("DefaultValue").field(v).finish(),
            Self::Env(v) => f.debug_tuple("Env").field(v).finish(),
            Self::Validator(_) => f.write_str("Validator"),
            Self::Hook(_) => f.write_str("Hook"),
            Self::Reviver(_) => f.write_str("Reviver"),
            Self::NoShortcut => f.write_str("NoShortcut"),
            Self::ShortcutsOnly => f.write_str("ShortcutsOnly"),
            Self::Ignore => f.write_str("Ignore"),
        }
    }
}

/// A single bindable argument.
#[derive(Clone)]
pub struct ArgumentDefinition {
    name: String,
    value_type: ValueType,
    aliases: Vec<Alias>,
    position: Option<usize>,
    case_override: Option<bool>,
    ignore_case: bool,
    metadata: Vec<ArgMetadata>,
    hooks: Vec<Arc<dyn ArgHook>>,
}

impl fmt::Debug for ArgumentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentDefinition")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("aliases", &self.aliases)
            .field("position", &self.position)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ArgumentDefinition {
    pub(crate) fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            aliases: Vec::new(),
            position: None,
            case_override: None,
            ignore_case: true,
            metadata: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Every accepted spelling, name first (unless shortcuts-only).
    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn ignores_case(&self) -> bool {
        self.ignore_case
    }

    pub fn metadata(&self) -> &[ArgMetadata] {
        &self.metadata
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.iter().find_map(|m| match m {
            ArgMetadata::Description(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn default_value(&self) -> Option<&str> {
        self.metadata.iter().find_map(|m| match m {
            ArgMetadata::DefaultValue(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn env_var(&self) -> Option<&str> {
        self.metadata.iter().find_map(|m| match m {
            ArgMetadata::Env(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn validators(&self) -> impl Iterator<Item = &Arc<dyn ArgValidator>> {
        self.metadata.iter().filter_map(|m| match m {
            ArgMetadata::Validator(v) => Some(v),
            _ => None,
        })
    }

    /// Explicit hooks plus the ones derived from default/env metadata.
    pub fn hooks(&self) -> &[Arc<dyn ArgHook>] {
        &self.hooks
    }

    pub fn reviver(&self) -> Option<&ReviveFn> {
        self.metadata.iter().find_map(|m| match m {
            ArgMetadata::Reviver(r) => Some(r),
            _ => None,
        })
    }

    pub fn is_required(&self) -> bool {
        self.validators().any(|v| v.is_required())
    }

    pub fn is_ignored(&self) -> bool {
        self.has(|m| matches!(m, ArgMetadata::Ignore))
    }

    pub(crate) fn has_no_shortcut(&self) -> bool {
        self.has(|m| matches!(m, ArgMetadata::NoShortcut))
    }

    pub(crate) fn is_shortcuts_only(&self) -> bool {
        self.has(|m| matches!(m, ArgMetadata::ShortcutsOnly))
    }

    pub(crate) fn has_explicit_alias(&self) -> bool {
        self.aliases.iter().any(|a| a.kind == AliasKind::Explicit)
    }

    fn has(&self, pred: impl Fn(&ArgMetadata) -> bool) -> bool {
        self.metadata.iter().any(pred)
    }

    /// Whether `key` (prefix already stripped) names this argument.
    pub fn matches(&self, key: &str) -> bool {
        self.aliases
            .iter()
            .any(|a| same_alias(&a.text, key, self.ignore_case))
    }

    pub(crate) fn case_override(&self) -> Option<bool> {
        self.case_override
    }

    /// Case policy inherited from a nested shape; an explicit per-argument
    /// choice wins.
    pub(crate) fn inherit_case_policy(&mut self, ignore_case: bool) {
        self.case_override.get_or_insert(ignore_case);
    }

    pub(crate) fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    pub(crate) fn aliases_mut(&mut self) -> &mut Vec<Alias> {
        &mut self.aliases
    }

    pub(crate) fn push_alias(&mut self, text: &str, kind: AliasKind) {
        let text = text.trim();
        if text.is_empty() || self.aliases.iter().any(|a| a.text == text) {
            return;
        }
        self.aliases.push(Alias {
            text: text.to_string(),
            kind,
        });
    }

    pub(crate) fn resolve_hooks(&mut self) {
        let mut hooks: Vec<Arc<dyn ArgHook>> = Vec::new();
        for m in &self.metadata {
            match m {
                ArgMetadata::Hook(h) => hooks.push(h.clone()),
                ArgMetadata::DefaultValue(v) => hooks.push(Arc::new(DefaultValue::new(v.clone()))),
                ArgMetadata::Env(var) => hooks.push(Arc::new(EnvDefault::new(var.clone()))),
                _ => {}
            }
        }
        self.hooks = hooks;
    }

    pub(crate) fn schema(&self) -> argbind_schema::ArgSchema {
        argbind_schema::ArgSchema {
            name: self.name.clone(),
            value_type: self.value_type.name().to_string(),
            aliases: self
                .aliases
                .iter()
                .filter(|a| a.kind != AliasKind::LongForm)
                .map(|a| a.text.clone())
                .collect(),
            long_forms: self
                .aliases
                .iter()
                .filter(|a| a.kind == AliasKind::LongForm)
                .map(|a| a.text.clone())
                .collect(),
            position: self.position,
            required: self.is_required(),
            description: self.description().unwrap_or_default().to_string(),
            default_value: self.default_value().map(str::to_string),
            env: self.env_var().map(str::to_string),
            flag: self.value_type.is_flag(),
            multiple: self.value_type.is_list(),
            possible_values: self
                .value_type
                .options()
                .into_iter()
                .map(str::to_string)
                .collect(),
            ignore_case: self.ignore_case,
        }
    }
}

pub(crate) fn same_alias(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Fluent configuration of one argument, returned by
/// [`crate::ShapeBuilder::arg`] and [`crate::ActionBuilder::param`].
pub struct ArgBuilder<'a, T> {
    arg: &'a mut ArgumentDefinition,
    _type: PhantomData<fn() -> T>,
}

impl<'a, T: ArgType> ArgBuilder<'a, T> {
    pub(crate) fn new(arg: &'a mut ArgumentDefinition) -> Self {
        Self {
            arg,
            _type: PhantomData,
        }
    }

    fn meta(&mut self, m: ArgMetadata) -> &mut Self {
        self.arg.metadata.push(m);
        self
    }

    fn validator_arc(&mut self, v: Arc<dyn ArgValidator>) -> &mut Self {
        self.meta(ArgMetadata::Validator(v))
    }

    /// Extra spelling, e.g. `.alias("s")` for `-s`.
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.arg.push_alias(alias, AliasKind::Explicit);
        self
    }

    /// Same as [`Self::alias`]. Declaring one disables shortcut generation.
    pub fn shortcut(&mut self, shortcut: &str) -> &mut Self {
        self.alias(shortcut)
    }

    /// `--word-like` spelling. Leading dashes are optional.
    pub fn long_form(&mut self, long_form: &str) -> &mut Self {
        self.arg
            .push_alias(long_form.trim_start_matches('-'), AliasKind::LongForm);
        self
    }

    pub fn position(&mut self, position: usize) -> &mut Self {
        self.arg.position = Some(position);
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.meta(ArgMetadata::Description(description.into()))
    }

    /// Raw value used when the command line (and env) supply none.
    pub fn default_value(&mut self, raw: impl Into<String>) -> &mut Self {
        self.meta(ArgMetadata::DefaultValue(raw.into()))
    }

    /// Environment variable consulted before the default value.
    pub fn env(&mut self, var: impl Into<String>) -> &mut Self {
        self.meta(ArgMetadata::Env(var.into()))
    }

    pub fn required(&mut self) -> &mut Self {
        self.validator_arc(Arc::new(Required))
    }

    pub fn required_if(&mut self, expression: &str) -> &mut Self {
        self.validator_arc(Arc::new(Required::if_(expression)))
    }

    pub fn required_unless(&mut self, expression: &str) -> &mut Self {
        self.validator_arc(Arc::new(Required::unless(expression)))
    }

    pub fn cant_be_combined_with(&mut self, expression: &str) -> &mut Self {
        self.validator_arc(Arc::new(CantBeCombinedWith::new(expression)))
    }

    /// Inclusive numeric bounds.
    pub fn range(&mut self, min: f64, max: f64) -> &mut Self {
        self.validator_arc(Arc::new(Range::new(min, max)))
    }

    /// The whole raw value must match `regex`.
    pub fn pattern(&mut self, regex: &str, message: impl Into<String>) -> &mut Self {
        self.validator_arc(Arc::new(Pattern::new(regex, message)))
    }

    pub fn existing_file(&mut self) -> &mut Self {
        self.validator_arc(Arc::new(ExistingFile))
    }

    pub fn existing_directory(&mut self) -> &mut Self {
        self.validator_arc(Arc::new(ExistingDirectory))
    }

    pub fn validator(&mut self, validator: impl ArgValidator + 'static) -> &mut Self {
        self.validator_arc(Arc::new(validator))
    }

    /// Typed check on the revived value.
    pub fn check<F>(&mut self, check: F) -> &mut Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator_arc(Arc::new(FnValidator::<T, F>::new(check)))
    }

    pub fn hook(&mut self, hook: impl ArgHook + 'static) -> &mut Self {
        self.meta(ArgMetadata::Hook(Arc::new(hook)))
    }

    /// Reviver used for this argument only, ahead of the registry.
    pub fn reviver<F>(&mut self, revive: F) -> &mut Self
    where
        F: Fn(&str, &str) -> Result<T, ArgError> + Send + Sync + 'static,
    {
        let revive: ReviveFn = Arc::new(move |name: &str, raw: &str| revive(name, raw).map(ArgValue::new));
        self.meta(ArgMetadata::Reviver(revive))
    }

    pub fn no_shortcut(&mut self) -> &mut Self {
        self.meta(ArgMetadata::NoShortcut)
    }

    /// Only the explicit shortcuts are accepted, not the name.
    pub fn shortcuts_only(&mut self) -> &mut Self {
        self.meta(ArgMetadata::ShortcutsOnly)
    }

    /// Overrides the definition-wide case policy for this argument.
    pub fn case_sensitive(&mut self) -> &mut Self {
        self.arg.case_override = Some(false);
        self
    }

    /// Declared but never bound.
    pub fn ignore(&mut self) -> &mut Self {
        self.meta(ArgMetadata::Ignore)
    }
}
