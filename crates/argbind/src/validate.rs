//! Validator engine.
//!
//! Validators run after every argument in scope has been revived: top-level
//! arguments first, then the specified action's. Expression variables are
//! argument aliases; a variable is true when the argument has a value, or,
//! for `bool` arguments, when that value is `true`.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

use regex::Regex;

use crate::definition::{ArgumentDefinition, ValidationMode};
use crate::error::{ArgError, DefinitionError};
use crate::expr::{BooleanExpression, ExpressionError, VariableResolver};
use crate::lexer::RawValue;
use crate::revive::ArgValue;

/// Aliases visible to a validator at build time.
pub struct DefinitionScope<'a> {
    args: Vec<&'a ArgumentDefinition>,
}

impl<'a> DefinitionScope<'a> {
    pub(crate) fn new(args: Vec<&'a ArgumentDefinition>) -> Self {
        Self { args }
    }

    pub fn knows(&self, alias: &str) -> bool {
        self.args.iter().any(|a| a.matches(alias))
    }
}

/// What a validator sees for one argument.
pub struct ValidationContext<'a> {
    raw: Option<&'a RawValue>,
    value: Option<&'a ArgValue>,
    facts: &'a dyn VariableResolver,
}

impl<'a> ValidationContext<'a> {
    pub fn raw(&self) -> Option<&'a RawValue> {
        self.raw
    }

    /// The raw value as one string (lists comma-joined).
    pub fn raw_str(&self) -> Option<String> {
        self.raw.and_then(RawValue::joined)
    }

    pub fn value(&self) -> Option<&'a ArgValue> {
        self.value
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn facts(&self) -> &'a dyn VariableResolver {
        self.facts
    }
}

pub trait ArgValidator: Send + Sync {
    /// Build-time check. Failing it makes the whole definition invalid.
    fn check_definition(
        &self,
        _arg: &ArgumentDefinition,
        _scope: &DefinitionScope<'_>,
    ) -> Result<(), DefinitionError> {
        Ok(())
    }

    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError>;

    /// Run even when the argument has no value.
    fn validates_absent(&self) -> bool {
        false
    }

    /// Shown as "required" in schemas and usage.
    fn is_required(&self) -> bool {
        false
    }
}

/// The argument must have a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl Required {
    /// Required when `expression` holds.
    pub fn if_(expression: &str) -> RequiredIf {
        RequiredIf(Condition::new(expression))
    }

    /// Required unless `expression` holds; when it does, the argument must
    /// not be supplied.
    pub fn unless(expression: &str) -> RequiredUnless {
        RequiredUnless(Condition::new(expression))
    }
}

impl ArgValidator for Required {
    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        if ctx.is_present() {
            Ok(())
        } else {
            Err(ArgError::missing(format!("The argument '{}' is required", arg.name())))
        }
    }

    fn validates_absent(&self) -> bool {
        true
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct Condition {
    text: String,
    parsed: Result<BooleanExpression, ExpressionError>,
}

impl Condition {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            parsed: BooleanExpression::parse(text),
        }
    }

    fn check(&self, rule: &str, arg: &ArgumentDefinition, scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        let expr = self.parsed.as_ref().map_err(|e| {
            DefinitionError::with_source(
                format!(
                    "invalid {rule} expression '{}' on argument '{}': {e}",
                    self.text,
                    arg.name()
                ),
                e.clone(),
            )
        })?;
        for var in expr.variables() {
            if !scope.knows(var) {
                return Err(DefinitionError::new(format!(
                    "{rule} expression on argument '{}' references unknown argument '{var}'",
                    arg.name()
                )));
            }
        }
        Ok(())
    }

    fn holds(&self, facts: &dyn VariableResolver) -> bool {
        self.parsed.as_ref().is_ok_and(|e| e.evaluate(facts))
    }

    fn display(&self) -> String {
        match &self.parsed {
            Ok(e) => e.to_string(),
            Err(_) => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequiredIf(Condition);

impl ArgValidator for RequiredIf {
    fn check_definition(&self, arg: &ArgumentDefinition, scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        self.0.check("RequiredIf", arg, scope)
    }

    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        if !ctx.is_present() && self.0.holds(ctx.facts()) {
            return Err(ArgError::missing(format!(
                "The argument '{}' is required if {}",
                arg.name(),
                self.0.display()
            )));
        }
        Ok(())
    }

    fn validates_absent(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct RequiredUnless(Condition);

impl ArgValidator for RequiredUnless {
    fn check_definition(&self, arg: &ArgumentDefinition, scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        self.0.check("RequiredUnless", arg, scope)
    }

    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let holds = self.0.holds(ctx.facts());
        match (ctx.is_present(), holds) {
            (false, false) => Err(ArgError::missing(format!(
                "The argument '{}' is required unless {}",
                arg.name(),
                self.0.display()
            ))),
            (true, true) => Err(ArgError::unexpected(format!(
                "The argument '{}' cannot be used with {}",
                arg.name(),
                self.0.display()
            ))),
            _ => Ok(()),
        }
    }

    fn validates_absent(&self) -> bool {
        true
    }
}

/// Fails when the argument is present and `expression` holds.
#[derive(Debug, Clone)]
pub struct CantBeCombinedWith(Condition);

impl CantBeCombinedWith {
    pub fn new(expression: &str) -> Self {
        Self(Condition::new(expression))
    }
}

impl ArgValidator for CantBeCombinedWith {
    fn check_definition(&self, arg: &ArgumentDefinition, scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        self.0.check("CantBeCombinedWith", arg, scope)
    }

    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        if self.0.holds(ctx.facts()) {
            return Err(ArgError::unexpected(format!(
                "The argument '{}' cannot be combined with {}",
                arg.name(),
                self.0.display()
            )));
        }
        Ok(())
    }
}

/// Inclusive bounds on the raw value read as a number.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    min: f64,
    max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl ArgValidator for Range {
    fn check_definition(&self, arg: &ArgumentDefinition, _scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        if self.min > self.max {
            return Err(DefinitionError::new(format!(
                "range on argument '{}' has min {} greater than max {}",
                arg.name(),
                self.min,
                self.max
            )));
        }
        Ok(())
    }

    fn validate(&self, arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let Some(raw) = ctx.raw_str() else {
            return Ok(());
        };
        let n: f64 = raw
            .trim()
            .parse()
            .map_err(|e| ArgError::invalid_value(format!("'{raw}' is not a number"), raw.clone(), e))?;
        if n < self.min || n > self.max {
            return Err(ArgError::Validation {
                message: format!(
                    "The value for {} must be between {} and {}",
                    arg.name(),
                    self.min,
                    self.max
                ),
                raw: Some(raw),
                source: None,
            });
        }
        Ok(())
    }
}

/// The whole raw value must match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Result<Regex, regex::Error>,
    message: String,
}

impl Pattern {
    pub fn new(regex: &str, message: impl Into<String>) -> Self {
        Self {
            source: regex.to_string(),
            regex: Regex::new(&format!("^(?:{regex})$")),
            message: message.into(),
        }
    }
}

impl ArgValidator for Pattern {
    fn check_definition(&self, arg: &ArgumentDefinition, _scope: &DefinitionScope<'_>) -> Result<(), DefinitionError> {
        match &self.regex {
            Ok(_) => Ok(()),
            Err(e) => Err(DefinitionError::with_source(
                format!("invalid pattern '{}' on argument '{}'", self.source, arg.name()),
                e.clone(),
            )),
        }
    }

    fn validate(&self, _arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let (Ok(regex), Some(raw)) = (&self.regex, ctx.raw_str()) else {
            return Ok(());
        };
        if regex.is_match(&raw) {
            return Ok(());
        }
        Err(ArgError::Validation {
            message: format!("{}: {raw}", self.message),
            raw: Some(raw),
            source: None,
        })
    }
}

fn path_metadata(raw: &str, what: &str) -> Result<std::fs::Metadata, ArgError> {
    std::fs::metadata(raw).map_err(|e| ArgError::invalid_value(format!("{what} not found: {raw}"), raw, e))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExistingFile;

impl ArgValidator for ExistingFile {
    fn validate(&self, _arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let Some(raw) = ctx.raw_str() else {
            return Ok(());
        };
        if path_metadata(&raw, "File")?.is_file() {
            Ok(())
        } else {
            Err(ArgError::Validation {
                message: format!("'{raw}' is not a file"),
                raw: Some(raw),
                source: None,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExistingDirectory;

impl ArgValidator for ExistingDirectory {
    fn validate(&self, _arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let Some(raw) = ctx.raw_str() else {
            return Ok(());
        };
        if path_metadata(&raw, "Directory")?.is_dir() {
            Ok(())
        } else {
            Err(ArgError::Validation {
                message: format!("'{raw}' is not a directory"),
                raw: Some(raw),
                source: None,
            })
        }
    }
}

/// Typed closure check, see [`crate::ArgBuilder::check`].
pub(crate) struct FnValidator<T, F> {
    check: F,
    _type: PhantomData<fn(&T)>,
}

impl<T, F> FnValidator<T, F> {
    pub(crate) fn new(check: F) -> Self {
        Self {
            check,
            _type: PhantomData,
        }
    }
}

impl<T, F> ArgValidator for FnValidator<T, F>
where
    T: Any,
    F: Fn(&T) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, _arg: &ArgumentDefinition, ctx: &ValidationContext<'_>) -> Result<(), ArgError> {
        let Some(value) = ctx.value().and_then(|v| v.downcast_ref::<T>()) else {
            return Ok(());
        };
        (self.check)(value).map_err(|message| ArgError::Validation {
            message,
            raw: ctx.raw_str(),
            source: None,
        })
    }
}

/// Expression facts over the arguments in scope.
pub(crate) struct Facts<'a> {
    args: &'a [&'a ArgumentDefinition],
    values: &'a HashMap<String, ArgValue>,
}

impl<'a> Facts<'a> {
    pub(crate) fn new(args: &'a [&'a ArgumentDefinition], values: &'a HashMap<String, ArgValue>) -> Self {
        Self { args, values }
    }
}

impl VariableResolver for Facts<'_> {
    fn resolve(&self, name: &str) -> bool {
        let Some(arg) = self.args.iter().find(|a| a.matches(name)) else {
            return false;
        };
        let Some(value) = self.values.get(arg.name()) else {
            return false;
        };
        if let Some(b) = value.downcast_ref::<bool>() {
            return *b;
        }
        if let Some(b) = value.downcast_ref::<Option<bool>>() {
            return b.unwrap_or(false);
        }
        true
    }
}

/// Run every validator of `args`, in order.
pub(crate) fn validate_all(
    args: &[&ArgumentDefinition],
    raw: &HashMap<String, RawValue>,
    values: &HashMap<String, ArgValue>,
    mode: ValidationMode,
) -> Result<(), ArgError> {
    let facts = Facts::new(args, values);
    let mut failures = Vec::new();

    for arg in args {
        let ctx = ValidationContext {
            raw: raw.get(arg.name()),
            value: values.get(arg.name()),
            facts: &facts,
        };
        for validator in arg.validators() {
            if !ctx.is_present() && !validator.validates_absent() {
                continue;
            }
            if let Err(err) = validator.validate(arg, &ctx) {
                match mode {
                    ValidationMode::FirstFailure => return Err(err),
                    ValidationMode::Aggregate => failures.push(err),
                }
            }
        }
    }

    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(ArgError::Aggregate { errors: failures }),
    }
}
