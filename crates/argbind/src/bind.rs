//! Revived values handed to [`crate::ArgShape::bind`] and to action handlers.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::error::{ArgError, DefinitionError, Result};
use crate::lexer::RawValue;
use crate::revive::{ArgValue, short_type_name};

/// Per-parse working state threaded through the pipeline.
#[derive(Debug, Default)]
pub(crate) struct ParseState {
    pub(crate) argv: Vec<String>,
    /// Raw values keyed by argument name.
    pub(crate) raw: HashMap<String, RawValue>,
    /// Revived values keyed by argument name.
    pub(crate) values: HashMap<String, ArgValue>,
    /// Index of the specified action.
    pub(crate) action: Option<usize>,
    pub(crate) action_args: Option<ArgValue>,
    pub(crate) cancelled: bool,
}

impl ParseState {
    pub(crate) fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            ..Default::default()
        }
    }
}

/// Revived argument values, looked up by declared argument name.
#[derive(Debug, Clone, Default)]
pub struct BoundValues {
    values: HashMap<String, ArgValue>,
    declared: HashSet<String>,
    action: Option<String>,
    action_args: Option<ArgValue>,
}

impl BoundValues {
    pub(crate) fn new(
        values: HashMap<String, ArgValue>,
        declared: HashSet<String>,
        action: Option<String>,
        action_args: Option<ArgValue>,
    ) -> Self {
        Self {
            values,
            declared,
            action,
            action_args,
        }
    }

    fn lookup<T: Any + Clone>(&self, name: &str) -> Result<Option<T>> {
        if !self.declared.contains(name) {
            return Err(DefinitionError::new(format!("no argument named '{name}' is declared")).into());
        }
        let Some(value) = self.values.get(name) else {
            return Ok(None);
        };
        match value.downcast_ref::<T>() {
            Some(v) => Ok(Some(v.clone())),
            None => Err(DefinitionError::new(format!(
                "argument '{name}' holds a {}, not a {}",
                short_type_name(value.type_name()),
                short_type_name(std::any::type_name::<T>())
            ))
            .into()),
        }
    }

    /// The value, or `T::default()` when the argument was not supplied.
    pub fn value<T: Any + Clone + Default>(&self, name: &str) -> Result<T> {
        Ok(self.lookup(name)?.unwrap_or_default())
    }

    pub fn optional<T: Any + Clone>(&self, name: &str) -> Result<Option<T>> {
        self.lookup(name)
    }

    /// Fails with a `Missing` error when the argument was not supplied.
    pub fn required<T: Any + Clone>(&self, name: &str) -> Result<T> {
        self.lookup(name)?
            .ok_or_else(|| ArgError::missing(format!("The argument '{name}' is required")).into())
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Canonical name of the specified action.
    pub fn specified_action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// The specified action's argument object, when it takes one.
    pub fn action_args<A: Any + Clone>(&self) -> Option<A> {
        self.action_args.as_ref().and_then(|v| v.downcast_ref::<A>()).cloned()
    }
}
