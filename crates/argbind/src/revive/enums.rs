//! Enum and flag-enum revival.

use crate::error::ArgError;
use crate::revive::value::{ArgValue, short_type_name};

/// One declared enum member.
#[derive(Debug, Clone)]
pub struct EnumVariant<E> {
    pub name: &'static str,
    /// Extra spellings accepted for this member (`-color r`).
    pub shortcuts: &'static [&'static str],
    pub value: E,
}

impl<E> EnumVariant<E> {
    pub const fn new(name: &'static str, value: E) -> Self {
        Self {
            name,
            shortcuts: &[],
            value,
        }
    }

    pub const fn with_shortcuts(name: &'static str, shortcuts: &'static [&'static str], value: E) -> Self {
        Self {
            name,
            shortcuts,
            value,
        }
    }
}

/// An enum usable as an argument type. Variants are listed in declaration
/// order; that order is used in error messages.
pub trait ArgEnum: Clone + Send + Sync + 'static {
    fn variants() -> Vec<EnumVariant<Self>>;
}

/// A bit-flag enum: `-perm Read,Write` revives to `Read | Write`.
pub trait ArgFlags: ArgEnum + std::ops::BitOr<Output = Self> {}

pub(crate) fn option_names<E: ArgEnum>() -> Vec<&'static str> {
    E::variants().into_iter().map(|v| v.name).collect()
}

fn matches(candidate: &str, input: &str, ignore_case: bool) -> bool {
    if ignore_case {
        candidate.to_lowercase() == input.to_lowercase()
    } else {
        candidate == input
    }
}

fn find<E: ArgEnum>(input: &str, ignore_case: bool) -> Option<E> {
    E::variants().into_iter().find_map(|v| {
        let hit = matches(v.name, input, ignore_case)
            || v.shortcuts.iter().any(|s| matches(s, input, ignore_case));
        hit.then_some(v.value)
    })
}

fn not_an_option<E: ArgEnum>(value: &str) -> ArgError {
    let type_name = short_type_name(std::any::type_name::<E>());
    ArgError::Validation {
        message: format!(
            "{value} is not a valid value for type {type_name}, options are {}",
            option_names::<E>().join(", ")
        ),
        raw: Some(value.to_string()),
        source: None,
    }
}

pub(crate) fn revive_variant<E: ArgEnum>(
    _arg: &str,
    raw: &str,
    ignore_case: bool,
) -> Result<ArgValue, ArgError> {
    let input = raw.trim();
    find::<E>(input, ignore_case)
        .map(ArgValue::new)
        .ok_or_else(|| not_an_option::<E>(raw))
}

pub(crate) fn revive_flags<E: ArgFlags>(
    _arg: &str,
    raw: &str,
    ignore_case: bool,
) -> Result<ArgValue, ArgError> {
    let mut combined: Option<E> = None;
    for part in raw.split(',') {
        let part = part.trim();
        let member = find::<E>(part, ignore_case).ok_or_else(|| not_an_option::<E>(part))?;
        combined = Some(match combined {
            Some(acc) => acc | member,
            None => member,
        });
    }
    combined
        .map(ArgValue::new)
        .ok_or_else(|| not_an_option::<E>(raw))
}
