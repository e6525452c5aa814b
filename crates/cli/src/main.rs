//! jsindex command-line front end
//!
//! ```text
//! jsindex index <ROOT> [--format text|json]   one-shot index and report
//! jsindex watch <ROOT>                        keep the index current
//! ```
//!
//! Both commands read `<ROOT>/.jsindex.toml` unless `--config` is given.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jsindex_indexer::{IndexJob, IndexRegistry, IndexWatcher, Locator, WatcherConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod progress_bar;
mod report;
mod workspace;

use config::CliConfig;
use progress_bar::BarListener;
use report::IndexSummary;
use workspace::{DirectoryContributor, ExcludeFilter};

#[derive(Parser)]
#[command(name = "jsindex", version)]
#[command(about = "Index JavaScript globals, requires and lint problems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a directory once and print the result
    Index(IndexArgs),
    /// Index a directory and re-index files as they change
    Watch(ProjectArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root
    root: PathBuf,

    /// Config file to use instead of `<ROOT>/.jsindex.toml`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip lint diagnostics
    #[arg(long)]
    no_lint: bool,

    /// Override a lint option, e.g. `maxerr=20` or `predef=Ti,require`
    #[arg(long = "lint-option", value_name = "NAME=VALUE")]
    lint_options: Vec<String>,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    project: ProjectArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

struct Project {
    root: PathBuf,
    container: Locator,
    registry: Arc<IndexRegistry>,
}

impl Project {
    fn open(args: &ProjectArgs) -> Result<Self> {
        let root = std::fs::canonicalize(&args.root)
            .with_context(|| format!("Project root {} not found", args.root.display()))?;
        let mut config = CliConfig::load(&root, args.config.as_deref())?;
        config.apply_overrides(args.no_lint, &args.lint_options)?;

        let container = Locator::from_path(&root);
        let registry = Arc::new(IndexRegistry::new());
        jsindex_js::register(&registry, &config.js_config())
            .context("Failed to register JavaScript support")?;
        registry.add_contributor(Arc::new(DirectoryContributor::new(
            container.clone(),
            &root,
            &config.index.include,
        )?));
        if !config.index.exclude.is_empty() {
            registry.add_filter(Arc::new(ExcludeFilter::new(&root, &config.index.exclude)?));
        }

        Ok(Self {
            root,
            container,
            registry,
        })
    }

    async fn index(&self) -> Result<IndexSummary> {
        let listener = Arc::new(BarListener::new());
        let job = IndexJob::for_container(Arc::clone(&self.registry), Some(self.container.clone()))
            .with_listener(Arc::clone(&listener) as Arc<dyn jsindex_indexer::ProgressListener>);
        let outcome = Arc::new(job).spawn().await.context("Index job panicked")?;
        listener.finish();

        if outcome.is_cancelled() {
            log::warn!("Indexing of {} was cancelled", self.root.display());
        }
        Ok(IndexSummary::collect(
            &self.registry,
            &self.container,
            outcome.report(),
        ))
    }
}

async fn run_index(args: IndexArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let summary = project.index().await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => summary.write_text(&mut out)?,
        OutputFormat::Json => summary.write_json(&mut out)?,
    }
    out.flush()?;
    Ok(())
}

async fn run_watch(args: ProjectArgs) -> Result<()> {
    let project = Project::open(&args)?;
    let summary = project.index().await?;
    log::info!(
        "Indexed {} files with {} problems",
        summary.files_processed,
        summary.problems.len()
    );

    let watcher = IndexWatcher::start(
        Arc::clone(&project.registry),
        project.container.clone(),
        &project.root,
        WatcherConfig::default(),
    )?;
    let mut updates = watcher.subscribe_updates();
    log::info!("Watching {} (Ctrl-C to stop)", project.root.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(update) => {
                    let problems = project.registry.problems().all().len();
                    log::info!(
                        "Re-indexed {} files, removed {} in {} ms ({} problems)",
                        update.indexed,
                        update.removed,
                        update.duration_ms,
                        problems
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {skipped} watch updates");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Err(err) = watcher.shutdown().await {
        log::debug!("Watcher already stopped: {err}");
    }
    log::info!("Stopped watching {}", project.root.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match Cli::parse().command {
        Command::Index(args) => run_index(args).await,
        Command::Watch(args) => run_watch(args).await,
    }
}
