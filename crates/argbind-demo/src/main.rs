mod repo;
mod usage;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use argbind::{ArgShape, BoundValues, Error, ErrorPolicy, HelpHook, ShapeBuilder};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use crate::repo::PushRecord;

/// Top-level arguments shared by every action.
#[derive(Debug, Clone)]
struct Gitlike {
    action: String,
    dir: PathBuf,
    verbose: bool,
}

impl ArgShape for Gitlike {
    fn describe(d: &mut ShapeBuilder<Self>) {
        d.exe_name("gitlike")
            .description("Records remotes and pushes in a .gitlike.json file")
            .error_policy(ErrorPolicy::PrintAndReturn);

        d.action_arg("Action").description("The action to run");
        d.arg::<bool>("Help")
            .alias("h")
            .alias("?")
            .description("Show this help")
            .hook(HelpHook::new(|def| print!("{}", usage::render(&def.schema()))));
        d.arg::<PathBuf>("Dir")
            .alias("C")
            .env("GITLIKE_DIR")
            .default_value(".")
            .existing_directory()
            .description("Repository directory");
        d.arg::<bool>("Verbose").description("Print more detail");

        d.action("init")
            .description("Create an empty repository")
            .run(|g| {
                let path = repo::init(&g.dir)?;
                println!("Initialized {}", path.display());
                Ok(())
            });

        d.action("remote")
            .description("Add a named remote")
            .run_args(add_remote);

        d.action("push")
            .alias("p")
            .description("Record a push of a branch to a remote")
            .run_args(push);

        let mut log = d.action("log");
        log.description("List recorded pushes, newest first");
        log.param::<usize>("Limit")
            .alias("n")
            .default_value("10")
            .range(1.0, 1000.0)
            .description("How many pushes to show");
        log.param::<Option<String>>("Remote")
            .position(1)
            .description("Only show pushes to this remote");
        log.run_params(show_log);

        let mut fetch = d.action("fetch");
        fetch.description("Contact a remote");
        fetch
            .param::<String>("Remote")
            .position(1)
            .env("GITLIKE_REMOTE")
            .default_value("origin");
        fetch.run_params_async(|g, params| async move {
            let name: String = params.value("Remote")?;
            tokio::task::yield_now().await;
            let state = repo::load(&g.dir)?;
            let remote = state
                .remote(&name)
                .with_context(|| format!("no such remote '{name}'"))?;
            println!("Fetched {} from {}", remote.name, remote.url);
            Ok::<_, anyhow::Error>(())
        });

        d.action("schema")
            .description("Print the argument schema as JSON")
            .run(|_| {
                let definition = argbind::definition::<Gitlike>()?;
                println!("{}", definition.schema().to_json_pretty()?);
                Ok(())
            });
    }

    fn bind(v: &BoundValues) -> argbind::Result<Self> {
        Ok(Self {
            action: v.required("Action")?,
            dir: v.value("Dir")?,
            verbose: v.value("Verbose")?,
        })
    }
}

#[derive(Debug, Clone)]
struct RemoteArgs {
    name: String,
    url: Url,
}

impl ArgShape for RemoteArgs {
    fn describe(d: &mut ShapeBuilder<Self>) {
        d.arg::<String>("Name")
            .position(1)
            .required()
            .pattern("[A-Za-z][A-Za-z0-9_-]*", "Remote names start with a letter")
            .description("Remote name");
        d.arg::<Url>("Url").position(2).required().description("Remote URL");
    }

    fn bind(v: &BoundValues) -> argbind::Result<Self> {
        Ok(Self {
            name: v.required("Name")?,
            url: v.required("Url")?,
        })
    }
}

#[derive(Debug, Clone)]
struct PushArgs {
    remote: String,
    branch: String,
    force: bool,
    tags: Vec<String>,
}

impl ArgShape for PushArgs {
    fn describe(d: &mut ShapeBuilder<Self>) {
        d.arg::<String>("Remote")
            .position(1)
            .env("GITLIKE_REMOTE")
            .default_value("origin")
            .description("Remote to push to");
        d.arg::<String>("Branch")
            .position(2)
            .default_value("main")
            .description("Branch to push");
        d.arg::<bool>("Force").long_form("force").description("Overwrite the remote branch");
        d.arg::<Vec<String>>("Tags").description("Tags to push along");
    }

    fn bind(v: &BoundValues) -> argbind::Result<Self> {
        Ok(Self {
            remote: v.value("Remote")?,
            branch: v.value("Branch")?,
            force: v.value("Force")?,
            tags: v.value("Tags")?,
        })
    }
}

fn add_remote(g: &Gitlike, args: &RemoteArgs) -> anyhow::Result<()> {
    let mut state = repo::load(&g.dir)?;
    state.add_remote(&args.name, args.url.as_str())?;
    repo::save(&g.dir, &state)?;
    tracing::debug!(remote = %args.name, url = %args.url, "added remote");
    println!("Added remote {} ({})", args.name, args.url);
    Ok(())
}

fn push(g: &Gitlike, args: &PushArgs) -> anyhow::Result<()> {
    let mut state = repo::load(&g.dir)?;
    let Some(remote) = state.remote(&args.remote).cloned() else {
        bail!("no such remote '{}'", args.remote);
    };
    state.pushes.push(PushRecord {
        remote: remote.name.clone(),
        branch: args.branch.clone(),
        force: args.force,
        tags: args.tags.clone(),
    });
    repo::save(&g.dir, &state)?;

    let forced = if args.force { " (forced)" } else { "" };
    println!("Pushed {} to {}{forced}", args.branch, remote.name);
    if g.verbose {
        println!("  url: {}", remote.url);
        for tag in &args.tags {
            println!("  tag: {tag}");
        }
    }
    Ok(())
}

fn show_log(g: &Gitlike, params: &BoundValues) -> anyhow::Result<()> {
    let limit: usize = params.value("Limit")?;
    let only: Option<String> = params.value("Remote")?;
    let state = repo::load(&g.dir)?;

    let pushes = state
        .pushes
        .iter()
        .rev()
        .filter(|p| only.as_deref().is_none_or(|r| r == p.remote))
        .take(limit);
    for p in pushes {
        let mut line = format!("{} -> {}", p.branch, p.remote);
        if p.force {
            line.push_str(" (forced)");
        }
        if !p.tags.is_empty() {
            line.push_str(&format!(" [{}]", p.tags.join(", ")));
        }
        println!("{line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    match argbind::invoke_action::<Gitlike, _>(&argv) {
        Ok(result) if result.handled_error().is_some() => {
            eprintln!("Run `gitlike -help` for usage.");
            ExitCode::from(2)
        }
        Ok(result) => {
            if let Some(g) = result.args() {
                tracing::debug!(action = %g.action, "done");
            }
            ExitCode::SUCCESS
        }
        Err(Error::Handler(err)) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
        Err(err @ Error::Arg(_)) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
