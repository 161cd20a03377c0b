//! Alias finalisation: names, generated shortcuts and uniqueness.

use super::argument::{AliasKind, ArgumentDefinition, same_alias};
use crate::error::DefinitionError;

struct Reserved {
    entries: Vec<(String, bool)>,
}

impl Reserved {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_all(&mut self, arg: &ArgumentDefinition) {
        for alias in arg.aliases() {
            self.entries.push((alias.text.clone(), arg.ignores_case()));
        }
    }

    fn taken(&self, candidate: &str, ignore_case: bool) -> bool {
        self.entries
            .iter()
            .any(|(text, ic)| same_alias(text, candidate, ignore_case || *ic))
    }
}

/// Put the name in front of the explicit aliases unless the argument is
/// shortcuts-only.
pub(crate) fn add_names(arg: &mut ArgumentDefinition) {
    if arg.is_shortcuts_only() {
        return;
    }
    let name = arg.name().to_string();
    let aliases = arg.aliases_mut();
    if !aliases.iter().any(|a| a.text == name) {
        aliases.insert(
            0,
            super::argument::Alias {
                text: name,
                kind: AliasKind::Name,
            },
        );
    }
}

fn wants_shortcut(arg: &ArgumentDefinition) -> bool {
    !arg.is_ignored() && !arg.has_no_shortcut() && !arg.is_shortcuts_only() && !arg.has_explicit_alias()
}

/// Shortest prefix of the name not already taken, or none if every prefix is.
fn generate(arg: &ArgumentDefinition, reserved: &Reserved) -> Option<String> {
    let name = arg.name();
    let boundaries = name.char_indices().map(|(i, _)| i).skip(1).chain(std::iter::once(name.len()));
    for end in boundaries {
        let candidate = &name[..end];
        if candidate.len() == name.len() {
            return None;
        }
        if !reserved.taken(candidate, arg.ignores_case()) {
            return Some(candidate.to_string());
        }
    }
    None
}

fn assign_generated(args: &mut [ArgumentDefinition], reserved: &mut Reserved) {
    for arg in args.iter_mut() {
        if !wants_shortcut(arg) {
            continue;
        }
        if let Some(shortcut) = generate(arg, reserved) {
            tracing::trace!(argument = %arg.name(), %shortcut, "generated shortcut");
            reserved.entries.push((shortcut.clone(), arg.ignores_case()));
            arg.push_alias(&shortcut, AliasKind::Generated);
        }
    }
}

/// Generate shortcuts for the top-level arguments first, avoiding every
/// declared alias anywhere, then for each action's arguments, avoiding the
/// final top-level aliases and the action's own.
pub(crate) fn assign_shortcuts(top: &mut [ArgumentDefinition], actions: &mut [&mut Vec<ArgumentDefinition>]) {
    let mut reserved = Reserved::new();
    for arg in top.iter() {
        reserved.add_all(arg);
    }
    for args in actions.iter() {
        for arg in args.iter() {
            reserved.add_all(arg);
        }
    }
    assign_generated(top, &mut reserved);

    for args in actions.iter_mut() {
        let mut scoped = Reserved::new();
        for arg in top.iter().chain(args.iter()) {
            scoped.add_all(arg);
        }
        assign_generated(args, &mut scoped);
    }
}

/// Every argument name and every alias in `scope` must belong to exactly one
/// argument.
pub(crate) fn check_unique<'a>(
    scope: impl IntoIterator<Item = &'a ArgumentDefinition>,
) -> Result<(), DefinitionError> {
    let args: Vec<&ArgumentDefinition> = scope.into_iter().filter(|a| !a.is_ignored()).collect();
    for (idx, arg) in args.iter().enumerate() {
        if args[..idx].iter().any(|other| other.name() == arg.name()) {
            return Err(DefinitionError::new(format!(
                "duplicate argument name '{}'",
                arg.name()
            )));
        }
    }

    let mut seen: Vec<(&str, usize, bool)> = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        for alias in arg.aliases() {
            let clash = seen.iter().find(|(text, owner, ic)| {
                *owner != idx && same_alias(text, &alias.text, *ic || arg.ignores_case())
            });
            if let Some((_, owner, _)) = clash {
                return Err(DefinitionError::new(format!(
                    "duplicate alias '{}' on arguments '{}' and '{}'",
                    alias.text,
                    args[*owner].name(),
                    arg.name()
                )));
            }
            seen.push((&alias.text, idx, arg.ignores_case()));
        }
    }
    Ok(())
}
