//! Lifecycle hooks.
//!
//! Phases, in order: before-parse, before-populate and after-populate (once
//! per argument), after-populate-all, before-invoke, after-invoke. A hook may
//! call [`HookContext::cancel_all_processing`]; the remaining phases are
//! skipped and after-cancel hooks run instead.
//!
//! Within a phase hooks run by descending [`ArgHook::priority`], ties in
//! declaration order.

use std::any::Any;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use crate::bind::ParseState;
use crate::definition::{ActionDefinition, ArgumentDefinition, ArgumentsDefinition};
use crate::error::Result;
use crate::lexer::RawValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeParse,
    BeforePopulate,
    AfterPopulate,
    AfterPopulateAll,
    BeforeInvoke,
    AfterInvoke,
    AfterCancel,
}

/// Outcome of one pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Cancel,
}

pub trait ArgHook: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    fn before_parse(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    /// May supply or replace the current argument's raw value.
    fn before_populate(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_populate(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_populate_all(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn before_invoke(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_invoke(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_cancel(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// What a hook can see and change.
pub struct HookContext<'a> {
    phase: HookPhase,
    definition: &'a ArgumentsDefinition,
    argument: Option<&'a ArgumentDefinition>,
    state: &'a mut ParseState,
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("phase", &self.phase)
            .field("argument", &self.argument.map(|a| a.name()))
            .field("cancelled", &self.state.cancelled)
            .finish()
    }
}

impl<'a> HookContext<'a> {
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    pub fn definition(&self) -> &'a ArgumentsDefinition {
        self.definition
    }

    pub fn argv(&self) -> &[String] {
        &self.state.argv
    }

    /// Rewriting `argv` only has an effect during before-parse.
    pub fn argv_mut(&mut self) -> &mut Vec<String> {
        &mut self.state.argv
    }

    /// The argument being populated (per-argument phases only).
    pub fn argument(&self) -> Option<&'a ArgumentDefinition> {
        self.argument
    }

    pub fn raw_value(&self) -> Option<&RawValue> {
        self.argument.and_then(|a| self.state.raw.get(a.name()))
    }

    /// Replace the current argument's raw value. Ignored outside the
    /// per-argument phases.
    pub fn set_raw_value(&mut self, raw: impl Into<String>) {
        match self.argument {
            Some(arg) => {
                self.state
                    .raw
                    .insert(arg.name().to_string(), RawValue::One(raw.into()));
            }
            None => tracing::warn!(phase = ?self.phase, "set_raw_value called outside an argument phase"),
        }
    }

    /// Revived value of any argument in scope.
    pub fn value<T: Any>(&self, name: &str) -> Option<&T> {
        self.state.values.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn current_value<T: Any>(&self) -> Option<&T> {
        self.argument.and_then(|a| self.value::<T>(a.name()))
    }

    pub fn specified_action(&self) -> Option<&'a ActionDefinition> {
        self.state.action.and_then(|idx| self.definition.actions().get(idx))
    }

    pub fn cancel_all_processing(&mut self) {
        tracing::debug!(phase = ?self.phase, "processing cancelled by hook");
        self.state.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled
    }
}

fn dispatch(phase: HookPhase, hook: &dyn ArgHook, ctx: &mut HookContext<'_>) -> Result<()> {
    match phase {
        HookPhase::BeforeParse => hook.before_parse(ctx),
        HookPhase::BeforePopulate => hook.before_populate(ctx),
        HookPhase::AfterPopulate => hook.after_populate(ctx),
        HookPhase::AfterPopulateAll => hook.after_populate_all(ctx),
        HookPhase::BeforeInvoke => hook.before_invoke(ctx),
        HookPhase::AfterInvoke => hook.after_invoke(ctx),
        HookPhase::AfterCancel => hook.after_cancel(ctx),
    }
}

/// Run `phase` over `hooks`. Stops at the first cancellation, except
/// after-cancel which always runs every hook.
pub(crate) fn run_phase(
    phase: HookPhase,
    mut hooks: Vec<Arc<dyn ArgHook>>,
    definition: &ArgumentsDefinition,
    argument: Option<&ArgumentDefinition>,
    state: &mut ParseState,
) -> Result<Flow> {
    hooks.sort_by_key(|h| Reverse(h.priority()));
    for hook in &hooks {
        let mut ctx = HookContext {
            phase,
            definition,
            argument,
            state: &mut *state,
        };
        dispatch(phase, hook.as_ref(), &mut ctx)?;
        if state.cancelled && phase != HookPhase::AfterCancel {
            return Ok(Flow::Cancel);
        }
    }
    Ok(if state.cancelled && phase != HookPhase::AfterCancel {
        Flow::Cancel
    } else {
        Flow::Continue
    })
}

/// Fills in a raw value when nothing else did. Runs last.
#[derive(Debug, Clone)]
pub struct DefaultValue {
    raw: String,
}

impl DefaultValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl ArgHook for DefaultValue {
    fn priority(&self) -> i32 {
        -100
    }

    fn before_populate(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if ctx.raw_value().is_none() {
            ctx.set_raw_value(self.raw.clone());
        }
        Ok(())
    }
}

/// Reads the raw value from an environment variable when the command line
/// has none. Runs before [`DefaultValue`], so argv beats env beats default.
#[derive(Debug, Clone)]
pub struct EnvDefault {
    var: String,
}

impl EnvDefault {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl ArgHook for EnvDefault {
    fn priority(&self) -> i32 {
        -50
    }

    fn before_populate(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if ctx.raw_value().is_some() {
            return Ok(());
        }
        if let Ok(value) = std::env::var(&self.var) {
            tracing::trace!(var = %self.var, "argument value taken from environment");
            ctx.set_raw_value(value);
        }
        Ok(())
    }
}

type HelpCallback = Arc<dyn Fn(&ArgumentsDefinition) + Send + Sync>;

/// Attach to a `bool` argument: when it is set, hands the definition to the
/// callback and cancels processing, so required arguments are not checked.
#[derive(Clone)]
pub struct HelpHook {
    callback: HelpCallback,
}

impl HelpHook {
    pub fn new(callback: impl Fn(&ArgumentsDefinition) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for HelpHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HelpHook")
    }
}

impl ArgHook for HelpHook {
    fn priority(&self) -> i32 {
        100
    }

    fn after_populate(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if ctx.current_value::<bool>() == Some(&true) {
            (self.callback)(ctx.definition());
            ctx.cancel_all_processing();
        }
        Ok(())
    }
}
