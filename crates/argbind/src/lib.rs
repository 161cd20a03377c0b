//! Declarative command-line argument binding.
//!
//! A type describes its arguments (and, optionally, its actions) through
//! [`ArgShape`]; an [`ArgParser`] lexes `argv`, revives every raw value into
//! its declared type, runs validators and hooks, and binds the result.
//!
//! ```ignore
//! #[derive(Clone)]
//! struct Opts { verbose: bool, count: i32 }
//!
//! impl ArgShape for Opts {
//!     fn describe(d: &mut ShapeBuilder<Self>) {
//!         d.arg::<bool>("Verbose");
//!         d.arg::<i32>("Count").default_value("1").range(1.0, 10.0);
//!     }
//!
//!     fn bind(v: &BoundValues) -> argbind::Result<Self> {
//!         Ok(Self { verbose: v.value("Verbose")?, count: v.value("Count")? })
//!     }
//! }
//!
//! let opts: Option<Opts> = argbind::parse(&["-v", "-c", "3"])?;
//! ```

mod bind;
pub mod definition;
mod engine;
pub mod error;
pub mod expr;
pub mod hooks;
pub mod lexer;
pub mod revive;
pub mod tokenizer;
pub mod validate;

use std::sync::OnceLock;

pub use bind::BoundValues;
pub use definition::{
    ActionBuilder, ActionDefinition, ActionParameter, ActionProvider, ActionResolver, ActionSource, Alias,
    AliasKind, ArgBuilder, ArgMetadata, ArgShape, ArgumentDefinition, ArgumentsDefinition, DefinitionOptions,
    ErrorPolicy, ShapeBuilder, ShapeParam, ValidationMode,
};
pub use engine::{ArgAction, ArgParser, LenientResult};
pub use error::{ArgError, ArgErrorKind, DefinitionError, Error, Result};
pub use expr::{BooleanExpression, ExpressionError, VariableResolver};
pub use hooks::{ArgHook, DefaultValue, EnvDefault, HelpHook, HookContext, HookPhase};
pub use lexer::{ArgStyle, RawValue};
pub use revive::{ArgEnum, ArgFlags, ArgType, ArgValue, EnumVariant, ReviverRegistry, ValueKind, ValueType};
pub use validate::{ArgValidator, DefinitionScope, ValidationContext};

pub use argbind_schema as schema;

fn default_parser() -> &'static ArgParser {
    static PARSER: OnceLock<ArgParser> = OnceLock::new();
    PARSER.get_or_init(ArgParser::new)
}

/// [`ArgParser::parse`] on the process-wide parser.
pub fn parse<T: ArgShape, S: AsRef<str>>(argv: &[S]) -> Result<Option<T>> {
    default_parser().parse(argv)
}

pub fn parse_action<T: ArgShape, S: AsRef<str>>(argv: &[S]) -> Result<ArgAction<T>> {
    default_parser().parse_action(argv)
}

pub fn invoke_action<T: ArgShape, S: AsRef<str>>(argv: &[S]) -> Result<ArgAction<T>> {
    default_parser().invoke_action(argv)
}

pub async fn invoke_action_async<T: ArgShape, S: AsRef<str>>(argv: &[S]) -> Result<ArgAction<T>> {
    default_parser().invoke_action_async(argv).await
}

pub fn parse_lenient<T: ArgShape, S: AsRef<str>>(argv: &[S]) -> Result<LenientResult<T>> {
    default_parser().parse_lenient(argv)
}

/// The last value the process-wide parser produced for `T`.
pub fn last_parsed<T: ArgShape>() -> Option<T> {
    default_parser().last_parsed()
}

pub fn definition<T: ArgShape>() -> Result<ArgumentsDefinition> {
    default_parser().definition::<T>()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct PushArgs {
        remote: String,
        branch: String,
    }

    impl ArgShape for PushArgs {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.arg::<String>("Remote").position(1).required();
            d.arg::<String>("Branch").position(2).default_value("main");
        }

        fn bind(v: &BoundValues) -> Result<Self> {
            Ok(Self {
                remote: v.required("Remote")?,
                branch: v.value("Branch")?,
            })
        }
    }

    static PUSHED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone)]
    struct Git {
        action: String,
        push: Option<PushArgs>,
        verbose: bool,
    }

    impl ArgShape for Git {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.exe_name("git");
            d.action_arg("Action");
            d.arg::<bool>("Verbose");
            d.action("push")
                .description("Push a branch")
                .run_args(|_, push: &PushArgs| {
                    assert_eq!(push.remote, "github");
                    PUSHED.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            let mut fetch = d.action("fetch");
            fetch.param::<String>("Origin").position(1);
            fetch.run_params(|_, params| {
                anyhow::ensure!(params.value::<String>("Origin")? != "nowhere", "cannot fetch from nowhere");
                Ok(())
            });
        }

        fn bind(v: &BoundValues) -> Result<Self> {
            Ok(Self {
                action: v.required("Action")?,
                push: v.action_args(),
                verbose: v.value("Verbose")?,
            })
        }
    }

    #[test]
    fn push_github_master() {
        let parser = ArgParser::new();
        let before = PUSHED.load(Ordering::SeqCst);
        let result = parser
            .invoke_action::<Git, _>(&["push", "github", "master"])
            .unwrap();
        assert_eq!(PUSHED.load(Ordering::SeqCst), before + 1);
        assert_eq!(result.action_name(), Some("push"));
        assert!(format!("{result:?}").contains(r#"action: Some("push")"#));

        let push: PushArgs = result.action_args().unwrap();
        assert_eq!((push.remote.as_str(), push.branch.as_str()), ("github", "master"));
        let git = result.args().unwrap();
        assert_eq!(git.action, "push");
        assert!(!git.verbose);
        assert_eq!(git.push.as_ref().map(|p| p.branch.as_str()), Some("master"));
    }

    #[test]
    fn action_defaults_and_unknown_actions() {
        let parser = ArgParser::new();
        let result = parser.parse_action::<Git, _>(&["PUSH", "github", "-v"]).unwrap();
        let push: PushArgs = result.action_args().unwrap();
        assert_eq!(push.branch, "main");
        assert!(result.args().unwrap().verbose);

        let err = parser.parse_action::<Git, _>(&["pull"]).unwrap_err();
        assert!(matches!(err.as_arg_error(), Some(ArgError::UnknownAction { token }) if token == "pull"));
        assert_eq!(err.to_string(), "Unknown action: 'pull'");

        let err = parser.parse_action::<Git, _>(&["push"]).unwrap_err();
        assert_eq!(err.to_string(), "The argument 'Remote' is required");

        let err = parser.parse_action::<Git, _>(&[] as &[&str]).unwrap_err();
        assert_eq!(err.to_string(), "The argument 'Action' is required");
    }

    #[test]
    fn handler_errors_pass_through() {
        let err = ArgParser::new()
            .invoke_action::<Git, _>(&["fetch", "nowhere"])
            .unwrap_err();
        let handler = err.into_handler_error().unwrap();
        assert_eq!(handler.to_string(), "cannot fetch from nowhere");
    }

    #[test]
    fn named_selector_picks_the_action() {
        let parser = ArgParser::new();
        let result = parser
            .parse_action::<Git, _>(&["-Action", "push", "github", "master"])
            .unwrap();
        assert_eq!(result.action_name(), Some("push"));
        let push: PushArgs = result.action_args().unwrap();
        assert_eq!((push.remote.as_str(), push.branch.as_str()), ("github", "master"));

        let err = parser
            .invoke_action::<Git, _>(&["-action", "fetch", "nowhere"])
            .unwrap_err();
        assert_eq!(err.into_handler_error().unwrap().to_string(), "cannot fetch from nowhere");

        let err = parser.parse_action::<Git, _>(&["-Action", "pull"]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: 'pull'");
    }

    #[derive(Debug, Clone)]
    struct Defaulted;

    impl ArgShape for Defaulted {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.action_arg("Action").default_value("go");
            d.action("go").run(|_| anyhow::bail!("must not run"));
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn selector_filled_without_a_token_selects_nothing() {
        let err = ArgParser::new()
            .invoke_action::<Defaulted, _>(&[] as &[&str])
            .unwrap_err();
        assert_eq!(err.as_arg_error().map(ArgError::kind), Some(ArgErrorKind::Missing));
        assert_eq!(err.to_string(), "No action was specified");
    }

    static AFTER_CANCEL: AtomicBool = AtomicBool::new(false);

    struct Veto;

    impl ArgHook for Veto {
        fn before_invoke(&self, ctx: &mut HookContext<'_>) -> Result<()> {
            ctx.cancel_all_processing();
            Ok(())
        }

        fn after_cancel(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
            AFTER_CANCEL.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct Vetoed;

    impl ArgShape for Vetoed {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.action_arg("Action");
            d.action("launch").hook(Veto).run(|_| {
                anyhow::bail!("must not run")
            });
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn before_invoke_cancellation() {
        let result = ArgParser::new().invoke_action::<Vetoed, _>(&["launch"]).unwrap();
        assert!(result.is_cancelled());
        assert!(result.args().is_none());
        assert!(AFTER_CANCEL.load(Ordering::SeqCst));
    }

    #[derive(Debug, Clone)]
    struct WithHelp {
        name: String,
    }

    impl ArgShape for WithHelp {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.arg::<bool>("Help").alias("?").hook(HelpHook::new(|def| {
                assert_eq!(def.shape_name(), "WithHelp");
            }));
            d.arg::<String>("Name").required();
        }

        fn bind(v: &BoundValues) -> Result<Self> {
            Ok(Self {
                name: v.required("Name")?,
            })
        }
    }

    #[test]
    fn help_flag_cancels_before_validation() {
        let parser = ArgParser::new();
        assert!(parser.parse::<WithHelp, _>(&["-?"]).unwrap().is_none());
        let parsed: WithHelp = parser.parse(&["-n", "x"]).unwrap().unwrap();
        assert_eq!(parsed.name, "x");
    }

    #[derive(Debug, Clone)]
    struct Layered {
        level: u8,
    }

    impl ArgShape for Layered {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.arg::<u8>("Level")
                .env("ARGBIND_TEST_LEVEL")
                .default_value("1");
        }

        fn bind(v: &BoundValues) -> Result<Self> {
            Ok(Self {
                level: v.value("Level")?,
            })
        }
    }

    #[test]
    fn argv_beats_env_beats_default() {
        let parser = ArgParser::new();
        let level = |argv: &[&str]| parser.parse::<Layered, _>(argv).unwrap().unwrap().level;

        assert_eq!(level(&[]), 1);
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ARGBIND_TEST_LEVEL", "5") };
        assert_eq!(level(&[]), 5);
        assert_eq!(level(&["-l", "9"]), 9);
        unsafe { std::env::remove_var("ARGBIND_TEST_LEVEL") };
    }

    #[derive(Debug, Clone)]
    struct Conditional;

    impl ArgShape for Conditional {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.validation_mode(ValidationMode::Aggregate);
            d.arg::<Option<String>>("User").required_if("Password");
            d.arg::<Option<String>>("Password");
            d.arg::<Option<String>>("Token").cant_be_combined_with("User | Password");
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn conditional_validators_and_aggregation() {
        let parser = ArgParser::new();
        assert!(parser.parse::<Conditional, _>(&["-u", "me", "-p", "pw"]).unwrap().is_some());
        assert!(parser.parse::<Conditional, _>(&["-t", "abc"]).unwrap().is_some());

        let err = parser.parse::<Conditional, _>(&["-p", "pw"]).unwrap_err();
        assert_eq!(err.as_arg_error().map(ArgError::kind), Some(ArgErrorKind::Missing));

        let err = parser
            .parse::<Conditional, _>(&["-p", "pw", "-t", "abc"])
            .unwrap_err();
        match err.as_arg_error() {
            Some(ArgError::Aggregate { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected an aggregate error, got {other:?}"),
        }
    }

    #[derive(Debug, Clone)]
    struct Sleepy;

    impl ArgShape for Sleepy {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.action_arg("Action");
            let mut wait = d.action("wait");
            wait.param::<u64>("Millis").position(1);
            wait.run_params_async(|_, params| async move {
                let ms: u64 = params.value("Millis")?;
                tokio::task::yield_now().await;
                anyhow::ensure!(ms < 1000, "too long");
                Ok::<_, anyhow::Error>(())
            });
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn async_invocation() {
        let parser = ArgParser::new();
        let ok = parser
            .invoke_action_async::<Sleepy, _>(&["wait", "10"])
            .await
            .unwrap();
        assert_eq!(ok.action_name(), Some("wait"));

        let err = parser
            .invoke_action_async::<Sleepy, _>(&["wait", "5000"])
            .await
            .unwrap_err();
        assert_eq!(err.into_handler_error().unwrap().to_string(), "too long");
    }

    #[test]
    fn blocking_invoke_drives_async_handlers() {
        let ok = ArgParser::new().invoke_action::<Sleepy, _>(&["wait", "1"]).unwrap();
        assert!(!ok.is_cancelled());
    }

    #[tokio::test]
    async fn blocking_invoke_inside_a_runtime_fails() {
        let err = ArgParser::new()
            .invoke_action::<Sleepy, _>(&["wait", "1"])
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(_)), "{err:?}");
    }

    static TAG_HOOK_RAN: AtomicBool = AtomicBool::new(false);

    struct SeesTag;

    impl ArgHook for SeesTag {
        fn after_populate_all(&self, ctx: &mut HookContext<'_>) -> Result<()> {
            if ctx.value::<String>("Tag").is_some() {
                TAG_HOOK_RAN.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct TagArgs {
        tag: String,
    }

    impl ArgShape for TagArgs {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.ignore_case(false).description("Tag a commit").hook(SeesTag);
            d.arg::<String>("Tag").position(1).required();
        }

        fn bind(v: &BoundValues) -> Result<Self> {
            Ok(Self {
                tag: v.required("Tag")?,
            })
        }
    }

    #[derive(Debug, Clone)]
    struct Tagger;

    impl ArgShape for Tagger {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.action_arg("Action");
            d.action("tag").run_args(|_, args: &TagArgs| {
                anyhow::ensure!(args.tag == "v1", "unexpected tag {}", args.tag);
                Ok(())
            });
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn action_shapes_keep_hooks_case_policy_and_description() {
        let parser = ArgParser::new();
        parser.invoke_action::<Tagger, _>(&["TAG", "-Tag", "v1"]).unwrap();
        assert!(TAG_HOOK_RAN.load(Ordering::SeqCst));

        let err = parser.parse_action::<Tagger, _>(&["tag", "-tag", "v1"]).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected named argument: tag");

        let schema = definition::<Tagger>().unwrap().schema();
        assert_eq!(schema.action("tag").unwrap().description, "Tag a commit");
    }

    #[derive(Debug, Clone)]
    struct SlashArgs;

    impl ArgShape for SlashArgs {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.style(ArgStyle::SlashColon);
            d.arg::<String>("Name");
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[derive(Debug, Clone)]
    struct MixedStyles;

    impl ArgShape for MixedStyles {
        fn describe(d: &mut ShapeBuilder<Self>) {
            d.action_arg("Action");
            d.action("go").run_args(|_, _: &SlashArgs| Ok(()));
        }

        fn bind(_: &BoundValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn action_shapes_cannot_set_command_line_options() {
        let err = definition::<MixedStyles>().unwrap_err();
        let message = err.as_definition_error().unwrap().message().to_string();
        assert!(message.contains("SlashArgs cannot set style"), "{message}");
    }

    #[test]
    fn schema_export() {
        let schema = definition::<Git>().unwrap().schema();
        assert_eq!(schema.exe_name, "git");
        let push = schema.action("push").unwrap();
        assert_eq!(push.description, "Push a branch");
        assert_eq!(push.args.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), ["Remote", "Branch"]);

        let json = schema.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["actions"][1]["name"], "fetch");
    }

    #[test]
    fn last_parsed_tracks_the_global_parser() {
        let parsed: Option<WithHelp> = parse(&["-Name", "global"]).unwrap();
        assert!(parsed.is_some());
        assert_eq!(last_parsed::<WithHelp>().map(|w| w.name), Some("global".to_string()));
    }

    #[test]
    fn custom_registry_revivers_replace_builtins() {
        let registry = ReviverRegistry::builder()
            .register::<u8, _>(|_name: &str, raw: &str| Ok(raw.len() as u8))
            .build();
        let parser = ArgParser::with_revivers(registry);
        let parsed: Layered = parser.parse(&["-Level", "abc"]).unwrap().unwrap();
        assert_eq!(parsed.level, 3);
    }
}
