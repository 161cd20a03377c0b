//! Raw argument lexer: `argv` to a [`ParseResult`].
//!
//! The lexer knows nothing about types beyond what [`LexSchema`] tells it:
//! whether a key is a flag (may stand alone) and whether it accepts several
//! space-separated values. Matching keys to arguments happens later.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::ArgError;

/// Surface syntax, chosen once per definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgStyle {
    /// `-name value`, `-flag`, `--long-form`, `--long-form=value`
    #[default]
    Dash,
    /// `/name:value`, `/flag`
    SlashColon,
}

/// What the command line said about one named argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// The name appeared with no value.
    Flag,
    One(String),
    /// Several tokens for an argument that accepts many values.
    Many(Vec<String>),
}

impl RawValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            _ => None,
        }
    }

    /// Single-string rendering: lists are comma-joined, flags have none.
    pub fn joined(&self) -> Option<String> {
        match self {
            Self::Flag => None,
            Self::One(v) => Some(v.clone()),
            Self::Many(vs) => Some(vs.join(",")),
        }
    }
}

pub trait LexSchema {
    /// May appear without a value (`-verbose`).
    fn is_flag(&self, key: &str) -> bool;
    /// Consumes every following non-name token (`-li 1 2 3`).
    fn accepts_many(&self, key: &str) -> bool;
    /// Whether `key` names any argument. Used to tell `-5` (a value) from `-5`
    /// (an alias).
    fn is_known(&self, key: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    explicit: IndexMap<String, RawValue>,
    implicit: IndexMap<usize, String>,
    named_tokens: HashMap<String, Vec<usize>>,
    positional_tokens: HashMap<usize, usize>,
}

impl ParseResult {
    /// Named values keyed as typed (prefix stripped), in command-line order.
    pub fn explicit(&self) -> &IndexMap<String, RawValue> {
        &self.explicit
    }

    /// Unnamed values keyed by position, in command-line order.
    pub fn implicit(&self) -> &IndexMap<usize, String> {
        &self.implicit
    }

    pub fn positional(&self, position: usize) -> Option<&str> {
        self.implicit.get(&position).map(String::as_str)
    }

    /// Values of arguments that consumed several tokens.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.explicit.get(key) {
            Some(RawValue::Many(vs)) => Some(vs),
            _ => None,
        }
    }

    /// `argv` indices the named entry was read from (name and value tokens).
    pub fn named_token_indices(&self, key: &str) -> &[usize] {
        self.named_tokens.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn positional_token_index(&self, position: usize) -> Option<usize> {
        self.positional_tokens.get(&position).copied()
    }

    fn insert_named(&mut self, key: &str, value: RawValue, tokens: Vec<usize>) -> Result<(), ArgError> {
        if self.explicit.contains_key(key) {
            return Err(ArgError::duplicate(key));
        }
        self.explicit.insert(key.to_string(), value);
        self.named_tokens.insert(key.to_string(), tokens);
        Ok(())
    }

    fn push_positional(&mut self, value: &str, token: usize) {
        let position = self.implicit.len();
        self.implicit.insert(position, value.to_string());
        self.positional_tokens.insert(position, token);
    }
}

/// Lex `argv` in the given style.
pub fn lex<S: AsRef<str>>(
    argv: &[S],
    style: ArgStyle,
    schema: &dyn LexSchema,
) -> Result<ParseResult, ArgError> {
    let argv: Vec<&str> = argv.iter().map(AsRef::as_ref).collect();
    let result = match style {
        ArgStyle::Dash => lex_dash(&argv, schema)?,
        ArgStyle::SlashColon => lex_slash(&argv)?,
    };
    tracing::trace!(
        named = result.explicit.len(),
        positional = result.implicit.len(),
        "lexed arguments"
    );
    Ok(result)
}

fn looks_numeric(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || c == '.') && s.parse::<f64>().is_ok()
}

/// The part after the dashes if `token` names an argument.
fn dash_name<'a>(token: &'a str, schema: &dyn LexSchema) -> Option<&'a str> {
    if let Some(rest) = token.strip_prefix("--") {
        return Some(rest);
    }
    let rest = token.strip_prefix('-')?;
    if looks_numeric(rest) && !schema.is_known(rest) {
        return None;
    }
    Some(rest)
}

fn is_bool_literal(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "true" | "false" | "1" | "0")
}

fn lex_dash(argv: &[&str], schema: &dyn LexSchema) -> Result<ParseResult, ArgError> {
    let mut result = ParseResult::default();
    let mut after_separator = false;
    let mut i = 0usize;

    while i < argv.len() {
        let token = argv[i];

        if after_separator {
            result.push_positional(token, i);
            i += 1;
            continue;
        }
        if token == "--" {
            after_separator = true;
            i += 1;
            continue;
        }

        let Some(name) = dash_name(token, schema) else {
            result.push_positional(token, i);
            i += 1;
            continue;
        };

        let is_long = token.starts_with("--");
        let (key, inline) = match name.split_once('=') {
            Some((k, v)) if is_long => (k, Some(v)),
            _ => (name, None),
        };
        if key.is_empty() {
            return Err(ArgError::missing("missing argument name after '-'"));
        }

        let start = i;
        i += 1;
        let value = if let Some(v) = inline {
            RawValue::One(v.to_string())
        } else if schema.accepts_many(key) {
            let mut values = Vec::new();
            while i < argv.len() && argv[i] != "--" && dash_name(argv[i], schema).is_none() {
                values.push(argv[i].to_string());
                i += 1;
            }
            RawValue::Many(values)
        } else if schema.is_flag(key) {
            match argv.get(i) {
                Some(next) if is_bool_literal(next) => {
                    i += 1;
                    RawValue::One(next.to_string())
                }
                _ => RawValue::Flag,
            }
        } else {
            match argv.get(i) {
                Some(next) if *next != "--" && dash_name(next, schema).is_none() => {
                    i += 1;
                    RawValue::One(next.to_string())
                }
                _ => RawValue::Flag,
            }
        };

        result.insert_named(key, value, (start..i).collect())?;
    }

    Ok(result)
}

fn lex_slash(argv: &[&str]) -> Result<ParseResult, ArgError> {
    let mut result = ParseResult::default();

    for (i, token) in argv.iter().enumerate() {
        let Some(name) = token.strip_prefix('/') else {
            result.push_positional(token, i);
            continue;
        };
        let (key, value) = match name.split_once(':') {
            Some((k, v)) => (k, RawValue::One(v.to_string())),
            None => (name, RawValue::Flag),
        };
        if key.is_empty() {
            return Err(ArgError::missing("missing argument name after '/'"));
        }
        result.insert_named(key, value, vec![i])?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArgErrorKind;

    struct Schema {
        flags: &'static [&'static str],
        lists: &'static [&'static str],
    }

    impl LexSchema for Schema {
        fn is_flag(&self, key: &str) -> bool {
            self.flags.contains(&key)
        }

        fn accepts_many(&self, key: &str) -> bool {
            self.lists.contains(&key)
        }

        fn is_known(&self, key: &str) -> bool {
            self.flags.contains(&key) || self.lists.contains(&key)
        }
    }

    const SCHEMA: Schema = Schema {
        flags: &["b", "verbose"],
        lists: &["li"],
    };

    fn dash(argv: &[&str]) -> Result<ParseResult, ArgError> {
        lex(argv, ArgStyle::Dash, &SCHEMA)
    }

    #[test]
    fn named_values_and_flags() {
        let r = dash(&["-String", "v", "-i", "34", "-b"]).unwrap();
        assert_eq!(r.explicit()["String"], RawValue::One("v".into()));
        assert_eq!(r.explicit()["i"], RawValue::One("34".into()));
        assert_eq!(r.explicit()["b"], RawValue::Flag);
    }

    #[test]
    fn flag_takes_inline_bool_override_only() {
        let r = dash(&["-b", "false", "file.txt"]).unwrap();
        assert_eq!(r.explicit()["b"], RawValue::One("false".into()));
        assert_eq!(r.positional(0), Some("file.txt"));

        let r = dash(&["-b", "file.txt"]).unwrap();
        assert_eq!(r.explicit()["b"], RawValue::Flag);
        assert_eq!(r.positional(0), Some("file.txt"));
    }

    #[test]
    fn long_forms_with_inline_value() {
        let r = dash(&["--log-level=debug", "--verbose"]).unwrap();
        assert_eq!(r.explicit()["log-level"], RawValue::One("debug".into()));
        assert_eq!(r.explicit()["verbose"], RawValue::Flag);
    }

    #[test]
    fn lists_consume_following_values() {
        let r = dash(&["-li", "1", "2", "3", "-b"]).unwrap();
        assert_eq!(r.list("li").unwrap(), ["1", "2", "3"]);
        assert_eq!(r.named_token_indices("li"), &[0, 1, 2, 3]);
    }

    #[test]
    fn negative_numbers_are_values() {
        let r = dash(&["-offset", "-5", "-3.5"]).unwrap();
        assert_eq!(r.explicit()["offset"], RawValue::One("-5".into()));
        assert_eq!(r.positional(0), Some("-3.5"));
    }

    #[test]
    fn separator_ends_option_parsing() {
        let r = dash(&["push", "--", "-b", "--x"]).unwrap();
        assert_eq!(r.implicit().values().collect::<Vec<_>>(), ["push", "-b", "--x"]);
        assert_eq!(r.positional_token_index(1), Some(2));
        assert!(r.explicit().is_empty());
    }

    #[test]
    fn bare_dash_is_missing_name() {
        for argv in [&["-"][..], &["--=x"][..]] {
            let err = dash(argv).unwrap_err();
            assert_eq!(err.kind(), ArgErrorKind::Missing);
            assert_eq!(err.to_string(), "missing argument name after '-'");
        }
    }

    #[test]
    fn repeated_name_is_duplicate() {
        let err = dash(&["-s", "a", "-s", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "Argument specified more than once: s");
    }

    #[test]
    fn slash_colon_style() {
        let r = lex(&["/name:value", "/flag", "pos"], ArgStyle::SlashColon, &SCHEMA).unwrap();
        assert_eq!(r.explicit()["name"], RawValue::One("value".into()));
        assert_eq!(r.explicit()["flag"], RawValue::Flag);
        assert_eq!(r.positional(0), Some("pos"));

        let err = lex(&["/"], ArgStyle::SlashColon, &SCHEMA).unwrap_err();
        assert_eq!(err.kind(), ArgErrorKind::Missing);
    }
}
