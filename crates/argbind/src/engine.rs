//! Parser context and the parse/invoke pipeline.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bind::{BoundValues, ParseState};
use crate::definition::{
    self, ActionDefinition, ArgShape, ArgumentDefinition, ArgumentsDefinition, Blueprint, ErrorPolicy,
    Handler,
};
use crate::error::{ArgError, Error, Result};
use crate::hooks::{ArgHook, Flow, HookPhase, run_phase};
use crate::lexer::{self, LexSchema, RawValue};
use crate::revive::{ArgValue, ReviverRegistry};
use crate::validate::validate_all;

/// Holds the reviver registry and remembers the last successfully parsed
/// value of each shape.
pub struct ArgParser {
    revivers: Arc<ReviverRegistry>,
    last_parsed: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for ArgParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgParser")
            .field("revivers", &self.revivers)
            .field("last_parsed", &self.last_parsed.lock().len())
            .finish()
    }
}

impl Default for ArgParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`ArgParser::parse_lenient`].
#[derive(Debug)]
pub struct LenientResult<T> {
    pub args: Option<T>,
    /// Tokens no argument claimed, in command-line order.
    pub unmatched: Vec<String>,
    pub cancelled: bool,
}

impl ArgParser {
    /// A parser using the process-wide reviver registry.
    pub fn new() -> Self {
        Self::with_revivers(ReviverRegistry::global())
    }

    pub fn with_revivers(revivers: Arc<ReviverRegistry>) -> Self {
        Self {
            revivers,
            last_parsed: Mutex::new(HashMap::new()),
        }
    }

    pub fn revivers(&self) -> &Arc<ReviverRegistry> {
        &self.revivers
    }

    /// Build and check the definition of `T` without parsing anything.
    pub fn definition<T: ArgShape>(&self) -> Result<ArgumentsDefinition> {
        Ok(definition::blueprint::<T>(&self.revivers)?.definition)
    }

    /// Parse into `T`. `Ok(None)` when processing was cancelled or the error
    /// policy printed the error.
    pub fn parse<T: ArgShape, S: AsRef<str>>(&self, argv: &[S]) -> Result<Option<T>> {
        Ok(self.parse_action::<T, S>(argv)?.into_args())
    }

    /// Parse without invoking anything.
    pub fn parse_action<T: ArgShape, S: AsRef<str>>(&self, argv: &[S]) -> Result<ArgAction<T>> {
        let Blueprint { definition, handlers } = definition::blueprint::<T>(&self.revivers)?;
        let policy = definition.options().error_policy;
        match self.run::<T>(&definition, to_owned(argv), false) {
            Ok(parsed) => Ok(ArgAction::from_parsed(parsed, definition, handlers)),
            Err(err) => intercept(policy, err).map(ArgAction::handled),
        }
    }

    /// Parse, then run the specified action's handler. Blocks on async
    /// handlers; use [`Self::invoke_action_async`] from async code.
    pub fn invoke_action<T: ArgShape, S: AsRef<str>>(&self, argv: &[S]) -> Result<ArgAction<T>> {
        self.parse_action::<T, S>(argv)?.invoke()
    }

    pub async fn invoke_action_async<T: ArgShape, S: AsRef<str>>(&self, argv: &[S]) -> Result<ArgAction<T>> {
        let parsed = self.parse_action::<T, S>(argv)?;
        parsed.invoke_async().await
    }

    /// Parse, collecting tokens that match no argument instead of failing
    /// on them.
    pub fn parse_lenient<T: ArgShape, S: AsRef<str>>(&self, argv: &[S]) -> Result<LenientResult<T>> {
        let Blueprint { definition, .. } = definition::blueprint::<T>(&self.revivers)?;
        let parsed = self.run::<T>(&definition, to_owned(argv), true)?;
        Ok(LenientResult {
            args: parsed.args,
            unmatched: parsed.unmatched,
            cancelled: parsed.cancelled,
        })
    }

    /// The value produced by the last successful parse of `T`.
    pub fn last_parsed<T: ArgShape>(&self) -> Option<T> {
        self.last_parsed
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    fn run<T: ArgShape>(&self, definition: &ArgumentsDefinition, argv: Vec<String>, lenient: bool) -> Result<Parsed<T>> {
        let mut state = ParseState::new(argv);
        tracing::debug!(shape = %definition.shape_name(), tokens = state.argv.len(), "parsing arguments");

        let top: Vec<&ArgumentDefinition> = scope(definition, None);
        if run_phase(
            HookPhase::BeforeParse,
            scope_hooks(definition, None, &top),
            definition,
            None,
            &mut state,
        )? == Flow::Cancel
        {
            return cancel(definition, &top, state);
        }

        let style = definition.options().style;
        // Unnamed tokens shift down by one when the selector is given by name.
        let mut position_offset = 0;
        if definition.is_action_mode() {
            let lexed = lexer::lex(state.argv.as_slice(), style, &ScopeSchema(&top))?;
            let token = match lexed.positional(0) {
                Some(token) => Some(token.to_string()),
                None => {
                    let named = named_selector(definition, &lexed);
                    position_offset = usize::from(named.is_some());
                    named
                }
            };
            if let Some(token) = token {
                let idx = definition
                    .action_index(&token)
                    .ok_or(ArgError::UnknownAction { token })?;
                tracing::debug!(action = %definition.actions()[idx].name(), "specified action");
                state.action = Some(idx);
            }
        }

        let action = state.action.map(|idx| &definition.actions()[idx]);
        let args = scope(definition, action);
        let lexed = lexer::lex(state.argv.as_slice(), style, &ScopeSchema(&args))?;
        let mut unmatched_tokens = Vec::new();

        for (key, raw) in lexed.explicit() {
            match args.iter().find(|a| a.matches(key)) {
                Some(arg) => {
                    if state.raw.contains_key(arg.name()) {
                        return Err(ArgError::duplicate(arg.name()).into());
                    }
                    state.raw.insert(arg.name().to_string(), raw.clone());
                }
                None if lenient => unmatched_tokens.extend_from_slice(lexed.named_token_indices(key)),
                None => return Err(ArgError::unexpected(format!("Unexpected named argument: {key}")).into()),
            }
        }

        let declares_positions = args.iter().any(|a| a.position().is_some());
        for (position, value) in lexed.implicit() {
            match args.iter().find(|a| a.position() == Some(position + position_offset)) {
                Some(arg) => {
                    if state.raw.contains_key(arg.name()) {
                        return Err(ArgError::duplicate(arg.name()).into());
                    }
                    state
                        .raw
                        .insert(arg.name().to_string(), RawValue::One(value.clone()));
                }
                None if lenient => unmatched_tokens.extend(lexed.positional_token_index(*position)),
                None if declares_positions => {
                    return Err(ArgError::unexpected(format!("Unexpected unnamed argument: {value}")).into());
                }
                None => return Err(ArgError::unexpected(format!("Unexpected argument: {value}")).into()),
            }
        }

        for arg in args.iter().copied() {
            let hooks = argument_hooks(definition, action, arg);
            if run_phase(HookPhase::BeforePopulate, hooks.clone(), definition, Some(arg), &mut state)? == Flow::Cancel {
                return cancel(definition, &args, state);
            }
            if let Some(raw) = state.raw.get(arg.name()) {
                let value = self.revive(arg, raw)?;
                tracing::trace!(argument = %arg.name(), value = ?value, "revived");
                state.values.insert(arg.name().to_string(), value);
            }
            if run_phase(HookPhase::AfterPopulate, hooks, definition, Some(arg), &mut state)? == Flow::Cancel {
                return cancel(definition, &args, state);
            }
        }

        if run_phase(
            HookPhase::AfterPopulateAll,
            scope_hooks(definition, action, &args),
            definition,
            None,
            &mut state,
        )? == Flow::Cancel
        {
            return cancel(definition, &args, state);
        }

        validate_all(&args, &state.raw, &state.values, definition.options().validation_mode)?;
        if definition.is_action_mode() && action.is_none() {
            return Err(ArgError::missing("No action was specified").into());
        }

        if let Some(shape) = action.and_then(ActionDefinition::shape) {
            let nested = BoundValues::new(
                state.values.clone(),
                declared(action.map(ActionDefinition::arguments).unwrap_or_default()),
                None,
                None,
            );
            state.action_args = Some(shape.bind(&nested)?);
        }

        let mut names = declared(definition.arguments());
        if let Some(action) = action {
            names.extend(declared(action.arguments()));
        }
        let bound = BoundValues::new(
            state.values.clone(),
            names,
            action.map(|a| a.name().to_string()),
            state.action_args.clone(),
        );
        let value = T::bind(&bound)?;
        self.last_parsed
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value.clone()));

        unmatched_tokens.sort_unstable();
        let unmatched = unmatched_tokens
            .into_iter()
            .filter_map(|idx| state.argv.get(idx).cloned())
            .collect();

        Ok(Parsed {
            args: Some(value),
            bound,
            unmatched,
            cancelled: false,
            state,
        })
    }

    fn revive(&self, arg: &ArgumentDefinition, raw: &RawValue) -> Result<ArgValue, ArgError> {
        let ty = arg.value_type();
        let name = arg.name();
        let ignore_case = arg.ignores_case();

        if let Some(reviver) = arg.reviver() {
            return match raw {
                RawValue::Flag if ty.is_flag() => reviver(name, "true"),
                RawValue::Flag => Err(requires_value(name)),
                RawValue::One(v) => reviver(name, v),
                RawValue::Many(vs) => reviver(name, &vs.join(",")),
            };
        }

        match raw {
            RawValue::Flag if ty.is_flag() => self.revivers.revive(ty, name, "true", ignore_case),
            RawValue::Flag if ty.is_list() => self.revivers.revive_tokens(ty, name, &[], ignore_case),
            RawValue::Flag => Err(requires_value(name)),
            RawValue::One(v) => self.revivers.revive(ty, name, v, ignore_case),
            RawValue::Many(vs) if vs.len() == 1 => self.revivers.revive(ty, name, &vs[0], ignore_case),
            RawValue::Many(vs) => self.revivers.revive_tokens(ty, name, vs, ignore_case),
        }
    }
}

/// The selector's value when it was written as a named argument
/// (`-action push`).
fn named_selector(definition: &ArgumentsDefinition, lexed: &lexer::ParseResult) -> Option<String> {
    let selector = definition.arguments().iter().find(|a| a.position() == Some(0))?;
    lexed
        .explicit()
        .iter()
        .find(|(key, _)| selector.matches(key))
        .and_then(|(_, raw)| raw.as_str())
        .map(str::to_string)
}

fn to_owned<S: AsRef<str>>(argv: &[S]) -> Vec<String> {
    argv.iter().map(|s| s.as_ref().to_string()).collect()
}

fn requires_value(name: &str) -> ArgError {
    ArgError::missing(format!("The argument '{name}' requires a value"))
}

fn declared(args: &[ArgumentDefinition]) -> HashSet<String> {
    args.iter().map(|a| a.name().to_string()).collect()
}

/// Applies the error policy to a failed entry point.
fn intercept(policy: ErrorPolicy, err: Error) -> Result<ArgError> {
    match (policy, err) {
        (ErrorPolicy::PrintAndReturn, Error::Arg(err)) => {
            tracing::debug!(error = %err, kind = ?err.kind(), "argument error handled by policy");
            eprintln!("{err}");
            Ok(err)
        }
        (_, err) => Err(err),
    }
}

/// Bound arguments for the lexer: the top level plus the specified action.
struct ScopeSchema<'a>(&'a [&'a ArgumentDefinition]);

impl ScopeSchema<'_> {
    fn find(&self, key: &str) -> Option<&ArgumentDefinition> {
        self.0.iter().copied().find(|a| a.matches(key))
    }
}

impl LexSchema for ScopeSchema<'_> {
    fn is_flag(&self, key: &str) -> bool {
        self.find(key).is_some_and(|a| a.value_type().is_flag())
    }

    fn accepts_many(&self, key: &str) -> bool {
        self.find(key).is_some_and(|a| a.value_type().is_list())
    }

    fn is_known(&self, key: &str) -> bool {
        self.find(key).is_some()
    }
}

fn scope<'d>(definition: &'d ArgumentsDefinition, action: Option<&'d ActionDefinition>) -> Vec<&'d ArgumentDefinition> {
    definition
        .arguments()
        .iter()
        .chain(action.map(ActionDefinition::arguments).unwrap_or_default())
        .filter(|a| !a.is_ignored())
        .collect()
}

/// Definition-level hooks plus the specified action's.
fn shared_hooks(definition: &ArgumentsDefinition, action: Option<&ActionDefinition>) -> Vec<Arc<dyn ArgHook>> {
    definition
        .hooks()
        .iter()
        .chain(action.map(ActionDefinition::hooks).unwrap_or_default())
        .cloned()
        .collect()
}

/// Hooks for the per-argument phases.
fn argument_hooks(
    definition: &ArgumentsDefinition,
    action: Option<&ActionDefinition>,
    arg: &ArgumentDefinition,
) -> Vec<Arc<dyn ArgHook>> {
    let mut hooks = shared_hooks(definition, action);
    hooks.extend(arg.hooks().iter().cloned());
    hooks
}

/// Hooks for the phases that are not tied to one argument.
fn scope_hooks(
    definition: &ArgumentsDefinition,
    action: Option<&ActionDefinition>,
    args: &[&ArgumentDefinition],
) -> Vec<Arc<dyn ArgHook>> {
    let mut hooks = shared_hooks(definition, action);
    for arg in args {
        hooks.extend(arg.hooks().iter().cloned());
    }
    hooks
}

fn cancel<T>(definition: &ArgumentsDefinition, args: &[&ArgumentDefinition], mut state: ParseState) -> Result<Parsed<T>> {
    let action = state.action.map(|idx| &definition.actions()[idx]);
    run_phase(
        HookPhase::AfterCancel,
        scope_hooks(definition, action, args),
        definition,
        None,
        &mut state,
    )?;
    tracing::debug!(shape = %definition.shape_name(), "argument processing cancelled");
    Ok(Parsed {
        args: None,
        bound: BoundValues::default(),
        unmatched: Vec::new(),
        cancelled: true,
        state,
    })
}

struct Parsed<T> {
    args: Option<T>,
    bound: BoundValues,
    unmatched: Vec<String>,
    cancelled: bool,
    state: ParseState,
}

/// What the invoker needs once parsing succeeded in action mode.
struct Pending<T> {
    definition: ArgumentsDefinition,
    handler: Handler<T>,
    state: ParseState,
}

impl<T> Pending<T> {
    fn action(&self) -> Option<&ActionDefinition> {
        self.state.action.map(|idx| &self.definition.actions()[idx])
    }

    fn phase(&mut self, phase: HookPhase) -> Result<Flow> {
        let action = self.state.action.map(|idx| &self.definition.actions()[idx]);
        let args = scope(&self.definition, action);
        let hooks = scope_hooks(&self.definition, action, &args);
        run_phase(phase, hooks, &self.definition, None, &mut self.state)
    }
}

/// Outcome of an action-mode parse, and the handle to invoke it.
pub struct ArgAction<T> {
    args: Option<T>,
    bound: BoundValues,
    handled_error: Option<ArgError>,
    cancelled: bool,
    policy: ErrorPolicy,
    pending: Option<Pending<T>>,
}

impl<T: fmt::Debug> fmt::Debug for ArgAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgAction")
            .field("args", &self.args)
            .field("action", &self.bound.specified_action())
            .field("handled_error", &self.handled_error)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

impl<T: ArgShape> ArgAction<T> {
    fn from_parsed(parsed: Parsed<T>, definition: ArgumentsDefinition, handlers: Vec<Handler<T>>) -> Self {
        let policy = definition.options().error_policy;
        let pending = match (parsed.cancelled, parsed.state.action) {
            (false, Some(idx)) => handlers.get(idx).cloned().map(|handler| Pending {
                definition,
                handler,
                state: parsed.state,
            }),
            _ => None,
        };
        Self {
            args: parsed.args,
            bound: parsed.bound,
            handled_error: None,
            cancelled: parsed.cancelled,
            policy,
            pending,
        }
    }

    fn handled(err: ArgError) -> Self {
        Self {
            args: None,
            bound: BoundValues::default(),
            handled_error: Some(err),
            cancelled: false,
            policy: ErrorPolicy::PrintAndReturn,
            pending: None,
        }
    }

    pub fn args(&self) -> Option<&T> {
        self.args.as_ref()
    }

    pub fn into_args(self) -> Option<T> {
        self.args
    }

    /// Canonical name of the specified action.
    pub fn action_name(&self) -> Option<&str> {
        self.bound.specified_action()
    }

    /// The bound argument shape of the specified action, if it takes one.
    pub fn action_args<A: ArgShape>(&self) -> Option<A> {
        self.bound.action_args::<A>()
    }

    /// Every revived value in scope, for reading action parameters.
    pub fn params(&self) -> &BoundValues {
        &self.bound
    }

    /// The user-input error the error policy printed instead of returning.
    pub fn handled_error(&self) -> Option<&ArgError> {
        self.handled_error.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Run the specified action's handler, blocking until it completes.
    ///
    /// Async handlers get a fresh current-thread runtime; called from inside
    /// another runtime this fails with [`Error::Runtime`].
    pub fn invoke(mut self) -> Result<Self> {
        let Some((mut pending, args)) = self.begin()? else {
            return Ok(self);
        };
        let outcome = match &pending.handler {
            Handler::Sync(f) => f(&args, &self.bound).map_err(Error::Handler),
            Handler::Async(f) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    return Err(Error::Runtime(std::io::Error::other(
                        "blocking invoke called from inside an async runtime; use invoke_async",
                    )));
                }
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(Error::Runtime)?;
                runtime
                    .block_on(f(args, self.bound.clone()))
                    .map_err(Error::Handler)
            }
        };
        outcome?;
        self.finish(&mut pending)
    }

    pub async fn invoke_async(mut self) -> Result<Self> {
        let Some((mut pending, args)) = self.begin()? else {
            return Ok(self);
        };
        match &pending.handler {
            Handler::Sync(f) => f(&args, &self.bound).map_err(Error::Handler)?,
            Handler::Async(f) => f(args, self.bound.clone()).await.map_err(Error::Handler)?,
        }
        self.finish(&mut pending)
    }

    /// Before-invoke phase. `None` when there is nothing to run.
    fn begin(&mut self) -> Result<Option<(Pending<T>, T)>> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(None);
        };
        let Some(args) = self.args.clone() else {
            return Ok(None);
        };
        let action = pending.action().map(|a| a.name().to_string());
        let flow = match pending.phase(HookPhase::BeforeInvoke) {
            Ok(flow) => flow,
            Err(err) => return self.absorb(err).map(|()| None),
        };
        if flow == Flow::Cancel {
            if let Err(err) = pending.phase(HookPhase::AfterCancel) {
                return self.absorb(err).map(|()| None);
            }
            tracing::debug!(action = ?action, "invocation cancelled");
            self.args = None;
            self.cancelled = true;
            return Ok(None);
        }
        tracing::debug!(action = ?action, "invoking action");
        Ok(Some((pending, args)))
    }

    fn finish(mut self, pending: &mut Pending<T>) -> Result<Self> {
        match pending.phase(HookPhase::AfterInvoke) {
            Ok(_) => Ok(self),
            Err(err) => {
                self.absorb(err)?;
                Ok(self)
            }
        }
    }

    fn absorb(&mut self, err: Error) -> Result<()> {
        let err = intercept(self.policy, err)?;
        self.args = None;
        self.handled_error = Some(err);
        Ok(())
    }
}
