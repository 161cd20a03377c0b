//! Error taxonomy.
//!
//! Two families never mix:
//! - [`DefinitionError`]: the shape declaration is wrong (author error).
//! - [`ArgError`]: the user typed something the shape does not accept.
//!
//! [`Error`] is what the public entry points return.

use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The shape declaration itself is invalid.
///
/// Always fatal and never intercepted by an [`crate::ErrorPolicy`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DefinitionError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DefinitionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Coarse classification of an [`ArgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgErrorKind {
    Missing,
    Unexpected,
    Duplicate,
    Validation,
    UnknownAction,
    Aggregate,
}

/// Root of every user-input failure.
#[derive(Debug, thiserror::Error)]
pub enum ArgError {
    /// A required argument (or a required value) was absent.
    #[error("{message}")]
    Missing { message: String },

    /// Unknown named/unnamed token, or two mutually exclusive arguments.
    #[error("{message}")]
    Unexpected { message: String },

    /// The same argument was supplied more than once.
    #[error("Argument specified more than once: {name}")]
    Duplicate { name: String },

    /// A value was rejected by a reviver or a validator.
    #[error("{message}")]
    Validation {
        message: String,
        raw: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// The first token did not name any known action.
    #[error("Unknown action: '{token}'")]
    UnknownAction { token: String },

    /// Several independent validation failures collected in one pass.
    #[error("{}", AggregateDisplay(.errors))]
    Aggregate { errors: Vec<ArgError> },
}

struct AggregateDisplay<'a>(&'a [ArgError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl ArgError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::Missing {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::Duplicate { name: name.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            raw: None,
            source: None,
        }
    }

    /// A validation failure that remembers the raw value and the underlying cause.
    pub fn invalid_value(
        message: impl Into<String>,
        raw: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            raw: Some(raw.into()),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ArgErrorKind {
        match self {
            Self::Missing { .. } => ArgErrorKind::Missing,
            Self::Unexpected { .. } => ArgErrorKind::Unexpected,
            Self::Duplicate { .. } => ArgErrorKind::Duplicate,
            Self::Validation { .. } => ArgErrorKind::Validation,
            Self::UnknownAction { .. } => ArgErrorKind::UnknownAction,
            Self::Aggregate { .. } => ArgErrorKind::Aggregate,
        }
    }

    /// The raw command-line value that caused a validation failure, if known.
    pub fn raw_value(&self) -> Option<&str> {
        match self {
            Self::Validation { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }
}

/// Everything a public entry point can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Arg(#[from] ArgError),

    /// An action handler failed. The handler's own error is kept as-is so
    /// callers can downcast it.
    #[error(transparent)]
    Handler(anyhow::Error),

    /// The blocking invoker could not start its runtime.
    #[error("failed to start the action runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    pub fn as_arg_error(&self) -> Option<&ArgError> {
        match self {
            Self::Arg(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_definition_error(&self) -> Option<&DefinitionError> {
        match self {
            Self::Definition(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_handler_error(self) -> Option<anyhow::Error> {
        match self {
            Self::Handler(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_names_argument() {
        let err = ArgError::duplicate("String");
        assert_eq!(err.to_string(), "Argument specified more than once: String");
        assert_eq!(err.kind(), ArgErrorKind::Duplicate);
    }

    #[test]
    fn invalid_value_keeps_raw_and_cause() {
        let cause = "x".parse::<i32>().unwrap_err();
        let err = ArgError::invalid_value("bad int", "x", cause);
        assert_eq!(err.raw_value(), Some("x"));
        assert!(err.source().is_some());
    }

    #[test]
    fn aggregate_joins_messages() {
        let err = ArgError::Aggregate {
            errors: vec![ArgError::missing("a is required"), ArgError::validation("b")],
        };
        assert_eq!(err.to_string(), "a is required\nb");
    }

    #[test]
    fn handler_error_is_preserved() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let err = Error::Handler(anyhow::Error::new(Boom));
        let inner = err.into_handler_error().unwrap();
        assert!(inner.downcast_ref::<Boom>().is_some());
    }
}
