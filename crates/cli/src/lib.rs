//! `codequery` command line: index a git repository, keep it in sync, and
//! search it by meaning.

pub mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use codequery_code_chunker::Document;
use codequery_indexer::{
    Collaborators, FileScanner, GitRepository, RepositorySource, SyncReport, Synchronizer,
};
use codequery_vector_store::{
    Embedder, FlatIndex, HttpEmbedder, SearchHit, StateLayout, StubEmbedder,
};
use config::{Config, EmbedMode};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "codequery")]
#[command(about = "Semantic search over a git codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: <config dir>/codequery/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding indexes and caches
    #[arg(long, global = true, env = "CODEQUERY_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Override the embedding backend
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index of a repository from scratch
    Index(RepoArgs),
    /// Re-embed files changed since the last run
    Sync(RepoArgs),
    /// Search the index
    Search(SearchArgs),
    /// Show index size and check it against its cache
    Status(RepoArgs),
}

#[derive(Args)]
struct RepoArgs {
    /// Any path inside the repository
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text; prompts interactively when omitted
    query: Option<String>,

    /// Any path inside the repository
    #[arg(long, short = 'p', default_value = ".")]
    path: PathBuf,

    /// Number of results
    #[arg(long, short = 'k')]
    k: Option<usize>,

    /// Re-rank results for diversity
    #[arg(long, conflicts_with = "no_mmr")]
    mmr: bool,

    /// Plain nearest neighbours
    #[arg(long)]
    no_mmr: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(mode) = cli.embed_mode {
        config.embeddings.mode = mode;
    }
    if let Some(dir) = cli.state_dir {
        config.state_dir = Some(dir);
    }

    let app = App {
        config,
        show_progress: !cli.quiet,
    };
    match cli.command {
        Commands::Index(args) => app.run_index(args).await,
        Commands::Sync(args) => app.run_sync(args).await,
        Commands::Search(args) => app.run_search(args).await,
        Commands::Status(args) => app.run_status(args).await,
    }
}

struct App {
    config: Config,
    show_progress: bool,
}

/// A repository plus everything needed to open its index
struct Workspace {
    git: GitRepository,
    layout: StateLayout,
    collaborators: Collaborators,
}

impl Workspace {
    fn files(&self) -> Vec<String> {
        FileScanner::new(self.git.root()).scan()
    }
}

impl App {
    async fn workspace(&self, path: &Path) -> Result<Workspace> {
        let git = GitRepository::discover(path)
            .await
            .with_context(|| format!("{} is not a git repository", path.display()))?;
        let layout = match &self.config.state_dir {
            Some(dir) => StateLayout::new(dir),
            None => StateLayout::from_env()?,
        };
        let collaborators = Collaborators {
            embedder: self.embedder()?,
            source: Arc::new(RepositorySource::new(
                git.root(),
                self.config.parser.clone(),
            )?),
            hashes: Arc::new(git.clone()),
        };
        log::debug!(
            "Repository {} at {}, state in {}",
            git.name(),
            git.root().display(),
            layout.dir().display()
        );
        Ok(Workspace {
            git,
            layout,
            collaborators,
        })
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embeddings = &self.config.embeddings;
        let embedder: Arc<dyn Embedder> = match embeddings.mode {
            EmbedMode::Stub => Arc::new(StubEmbedder::new(embeddings.dimension())),
            EmbedMode::Http => Arc::new(HttpEmbedder::new(embeddings.http_config()?)?),
        };
        log::debug!("Embedding with {}", embedder.model_id());
        Ok(embedder)
    }

    fn spinner(&self, message: String) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg} [{elapsed}]")?
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        Ok(spinner)
    }

    async fn run_index(&self, args: RepoArgs) -> Result<()> {
        let workspace = self.workspace(&args.path).await?;
        let files = workspace.files();
        let dimension = workspace.collaborators.embedder.dimension();
        let mut sync = Synchronizer::new(
            workspace.git.name(),
            workspace.layout,
            Box::new(FlatIndex::new(dimension)),
            workspace.collaborators,
        )?;

        let spinner = self.spinner(format!("Indexing {} files", files.len()))?;
        let report = sync.rebuild(&files).await;
        spinner.finish_and_clear();

        print_report(&report?, args.json)
    }

    async fn run_sync(&self, args: RepoArgs) -> Result<()> {
        let workspace = self.workspace(&args.path).await?;
        let files = workspace.files();

        let spinner = self.spinner(format!("Syncing {} files", files.len()))?;
        let result = async {
            let mut sync = Synchronizer::open_or_build(
                workspace.git.name(),
                workspace.layout,
                workspace.collaborators,
                &files,
            )
            .await?;
            sync.sync(&files).await
        }
        .await;
        spinner.finish_and_clear();

        print_report(&result?, args.json)
    }

    async fn run_search(&self, args: SearchArgs) -> Result<()> {
        let workspace = self.workspace(&args.path).await?;
        let sync = open_existing(workspace).await?;

        let k = args.k.unwrap_or(self.config.search.k);
        let mmr = if args.mmr {
            true
        } else if args.no_mmr {
            false
        } else {
            self.config.search.mmr
        };

        if let Some(query) = args.query {
            let hits = self.search(&sync, &query, k, mmr).await?;
            print_hits(&hits);
            return Ok(());
        }

        loop {
            let query: String = dialoguer::Input::with_theme(
                &dialoguer::theme::ColorfulTheme::default(),
            )
            .with_prompt("Query (empty to quit)")
            .allow_empty(true)
            .interact_text()?;
            if query.trim().is_empty() {
                return Ok(());
            }
            let hits = self.search(&sync, &query, k, mmr).await?;
            print_hits(&hits);
        }
    }

    async fn search(
        &self,
        sync: &Synchronizer,
        query: &str,
        k: usize,
        mmr: bool,
    ) -> Result<Vec<SearchHit>> {
        let search = &self.config.search;
        let hits = if mmr {
            sync.max_marginal_relevance_search(query, k, search.fetch_k, search.lambda)
                .await?
        } else {
            sync.similarity_search(query, k).await?
        };
        Ok(hits)
    }

    async fn run_status(&self, args: RepoArgs) -> Result<()> {
        let workspace = self.workspace(&args.path).await?;
        let sync = open_existing(workspace).await?;
        let problems = sync.check_invariants();

        if args.json {
            let status = serde_json::json!({
                "name": sync.name(),
                "files": sync.cache().len(),
                "vectors": sync.index().len(),
                "dimension": sync.index().dimension(),
                "problems": problems.iter().map(ToString::to_string).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("{}", style(sync.name()).bold());
            println!("  files:   {}", sync.cache().len());
            println!("  vectors: {}", sync.index().len());
            for problem in &problems {
                println!("  {} {problem}", style("!").red().bold());
            }
        }

        if !problems.is_empty() {
            anyhow::bail!(
                "{} inconsistencies between index and cache; run `codequery index` to rebuild",
                problems.len()
            );
        }
        Ok(())
    }
}

async fn open_existing(workspace: Workspace) -> Result<Synchronizer> {
    let name = workspace.git.name();
    match Synchronizer::open(name.clone(), workspace.layout, workspace.collaborators).await {
        Ok(sync) => Ok(sync),
        Err(e) if e.is_not_found() => {
            anyhow::bail!("{name} has not been indexed yet; run `codequery index` first")
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("{}", style("no matches").dim());
        return;
    }
    for hit in hits {
        let header = hit_header(&hit.document);
        println!(
            "{} {}",
            style(header).bold(),
            style(format!("({:.3})", hit.score)).dim()
        );
        println!("{}\n", hit.document.content);
    }
}

/// `filename:line -> method`, dropping the parts a document lacks
fn hit_header(document: &Document) -> String {
    let location = match document.start_line() {
        Some(line) => format!("{}:{line}", document.filename()),
        None => document.filename().to_string(),
    };
    match document.method_name() {
        Some(method) => format!("{location} -> {method}"),
        None => location,
    }
}
