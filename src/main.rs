//! ctxpack - pack selected files into one LLM prompt
//!
//! Entry point for the command-line tool.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ctxpack::config::{default_workers, DEFAULT_BUFFER_SIZE, DEFAULT_TOKEN_LIMIT};
use ctxpack::delivery::sink_for;
use ctxpack::logging::{config_from_env, init_tracing, spans};
use ctxpack::preferences::{JsonPreferenceStore, PreferenceStore, Preferences};
use ctxpack::tokens::{estimate_tokens, TokenBudget, TokenCounter, TokenizerCounter};
use ctxpack::{
    AggregationPipeline, Config, DirectoryScanner, FileTree, FilterConfig, OutputFormat,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// ctxpack - pack selected files into one LLM prompt
#[derive(Parser, Debug)]
#[command(name = "ctxpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overrides `CTXPACK_LOG_LEVEL`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging output. `CTXPACK_LOG_JSON=1` does the same
    #[arg(long, global = true)]
    log_json: bool,

    /// Do not read or write saved preferences
    #[arg(long, global = true, env = "CTXPACK_NO_PREFS")]
    no_prefs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the scanned tree with token estimates
    Tree {
        #[command(flatten)]
        scan: ScanArgs,

        /// Tokenizer model file for precise counts
        #[arg(long, env = "CTXPACK_TOKENIZER")]
        tokenizer: Option<PathBuf>,

        /// Model token limit used for the total estimate
        #[arg(long, env = "CTXPACK_TOKEN_LIMIT", default_value_t = DEFAULT_TOKEN_LIMIT)]
        token_limit: usize,
    },

    /// Scan, select and aggregate files into a prompt document
    Generate {
        #[command(flatten)]
        scan: ScanArgs,

        /// Paths to include, relative to the root. Defaults to every scanned file
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,

        /// Instructions placed after the files
        #[arg(short, long, conflicts_with = "instructions_file")]
        instructions: Option<String>,

        /// Read instructions from a file
        #[arg(long)]
        instructions_file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, env = "CTXPACK_FORMAT", default_value_t = OutputFormat::Xml)]
        format: OutputFormat,

        /// Write the prompt to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of reader threads
        #[arg(long, env = "CTXPACK_WORKERS", default_value_t = default_workers())]
        workers: usize,

        /// Model token limit used for the size warning
        #[arg(long, env = "CTXPACK_TOKEN_LIMIT", default_value_t = DEFAULT_TOKEN_LIMIT)]
        token_limit: usize,

        /// Tokenizer model file for precise counts
        #[arg(long, env = "CTXPACK_TOKENIZER")]
        tokenizer: Option<PathBuf>,
    },
}

/// Root and filter options shared by both subcommands.
#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory to scan. Defaults to the last scanned directory, then `.`
    root: Option<PathBuf>,

    /// Allowed extensions, e.g. `.rs,.toml`
    #[arg(short, long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Glob matched against file names
    #[arg(short, long)]
    name: Option<String>,

    /// Globs matched against names; matches are pruned
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Do not honor the root `.gitignore`
    #[arg(long)]
    no_gitignore: bool,

    /// Scan only this directory below the root
    #[arg(long)]
    sub_path: Option<PathBuf>,

    /// Maximum depth to scan; deeper directories load on selection
    #[arg(long)]
    max_depth: Option<usize>,
}

impl ScanArgs {
    fn has_filters(&self) -> bool {
        !self.extensions.is_empty()
            || self.name.is_some()
            || !self.ignore.is_empty()
            || self.no_gitignore
    }

    /// Filters from the command line, or the saved ones if none were given.
    fn filters(&self, prefs: &Preferences) -> FilterConfig {
        let mut filters = if self.has_filters() {
            let mut filters = FilterConfig::new()
                .with_extensions(self.extensions.iter().cloned())
                .with_ignore_patterns(self.ignore.iter().cloned())
                .with_ignore_file(!self.no_gitignore);
            if let Some(name) = &self.name {
                filters = filters.with_name_pattern(name.clone());
            }
            filters
        } else {
            prefs.filter_config()
        };

        if let Some(sub) = &self.sub_path {
            filters = filters.with_sub_path(sub.clone());
        }
        if let Some(depth) = self.max_depth {
            filters = filters.with_max_depth(depth);
        }
        filters
    }

    fn root(&self, prefs: &Preferences) -> PathBuf {
        self.root
            .clone()
            .or_else(|| prefs.last_directory().filter(|p| p.is_dir()))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Saved preferences, or nothing when disabled or unavailable.
struct PrefsSession {
    store: Option<JsonPreferenceStore>,
    prefs: Preferences,
}

impl PrefsSession {
    fn open(disabled: bool) -> Self {
        if disabled {
            return Self {
                store: None,
                prefs: Preferences::default(),
            };
        }

        let store = match JsonPreferenceStore::default_location() {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "Preferences unavailable");
                return Self {
                    store: None,
                    prefs: Preferences::default(),
                };
            }
        };
        let prefs = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable preferences");
            Preferences::default()
        });
        Self {
            store: Some(store),
            prefs,
        }
    }

    fn remember(&mut self, root: &Path, filters: &FilterConfig) {
        let Some(store) = &self.store else {
            return;
        };
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        self.prefs.set_last_directory(&root);
        self.prefs.remember_filters(filters);
        if let Err(e) = store.save(&self.prefs) {
            tracing::warn!(error = %e, "Failed to save preferences");
        }
    }
}

fn load_counter(path: Option<&Path>) -> Option<Box<dyn TokenCounter>> {
    let path = path?;
    match TokenizerCounter::from_file(path) {
        Ok(counter) => Some(Box::new(counter)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Using heuristic token counts");
            None
        }
    }
}

fn read_instructions(inline: Option<String>, file: Option<&Path>) -> Result<String> {
    match (inline, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read instructions from {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

fn run_tree(
    scan: &ScanArgs,
    tokenizer: Option<&Path>,
    token_limit: usize,
    session: &mut PrefsSession,
) -> Result<()> {
    let root = scan.root(&session.prefs);
    let filters = scan.filters(&session.prefs);

    let scanner = DirectoryScanner::new(&root, filters.clone())?;
    let (entries, stats) = spans::scan_span(&root).in_scope(|| scanner.scan_with_stats())?;
    tracing::info!(
        entries = stats.entries_found,
        filtered = stats.files_filtered,
        pruned = stats.subtrees_pruned,
        "Scan complete"
    );

    let tree = FileTree::build(entries);
    let mut total = tree.total_tokens();
    if let Some(counter) = load_counter(tokenizer) {
        total = tree
            .flatten()
            .iter()
            .filter(|e| !e.is_dir)
            .filter_map(|e| std::fs::read_to_string(&e.path).ok())
            .map(|text| estimate_tokens(&text, Some(counter.as_ref())))
            .sum();
    }

    print!("{}", tree.render());
    println!("Total: {}", TokenBudget::new(token_limit).describe(total));

    session.remember(&root, &filters);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_generate(
    scan: &ScanArgs,
    select: &[String],
    instructions: String,
    format: OutputFormat,
    output: Option<&Path>,
    workers: usize,
    token_limit: usize,
    tokenizer: Option<&Path>,
    log_level: String,
    session: &mut PrefsSession,
) -> Result<()> {
    let root = scan.root(&session.prefs);
    let config = Config {
        root: root.clone(),
        filters: scan.filters(&session.prefs),
        instructions,
        format,
        workers,
        buffer_size: DEFAULT_BUFFER_SIZE,
        token_limit,
        log_level,
    };
    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let scanner = DirectoryScanner::new(&config.root, config.filters.clone())?;
    let entries = spans::scan_span(&config.root).in_scope(|| scanner.scan())?;

    let mut tree = FileTree::build(entries);
    if select.is_empty() {
        tree.select_all();
    } else {
        let found = tree.select_paths(select);
        if found == 0 {
            anyhow::bail!("none of the selected paths were found under {}", root.display());
        }
    }
    let selection = tree.freeze_selection(&scanner);
    tracing::info!(
        files = selection.len(),
        bytes = selection.total_size(),
        "Selection frozen"
    );

    let cancel = CancellationToken::new();
    let pipeline = AggregationPipeline::from_config(&config).with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling aggregation");
            cancel.cancel();
        }
    });

    let span = spans::aggregate_span(selection.len(), pipeline.workers());
    let aggregation = pipeline
        .generate_async(selection, config.instructions.clone(), config.root.clone())
        .instrument(span)
        .await?;
    let (document, partial) = aggregation.into_parts();

    let text = document.render(config.format)?;
    let counter = load_counter(tokenizer);
    let tokens = estimate_tokens(&text, counter.as_deref());
    let budget = TokenBudget::new(config.token_limit);
    let bytes = document.content_len();
    if budget.exceeds(tokens) {
        tracing::warn!(tokens = %budget.describe(tokens), bytes, "Prompt may not fit the model context");
    } else {
        tracing::info!(tokens = %budget.describe(tokens), bytes, "Prompt size");
    }

    let sink = sink_for(output);
    sink.deliver(&text)
        .with_context(|| format!("failed to deliver prompt to {}", sink.describe()))?;

    if let Some(err) = partial {
        return Err(err).context("prompt delivered without some files");
    }

    session.remember(&config.root, &config.filters);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut tracing_config = config_from_env();
    if let Some(level) = cli.log_level {
        tracing_config.level = level;
    }
    tracing_config.json |= cli.log_json;
    init_tracing(&tracing_config)?;

    tracing::debug!("ctxpack v{} starting", env!("CARGO_PKG_VERSION"));

    let mut session = PrefsSession::open(cli.no_prefs);

    match cli.command {
        Command::Tree {
            scan,
            tokenizer,
            token_limit,
        } => run_tree(&scan, tokenizer.as_deref(), token_limit, &mut session),
        Command::Generate {
            scan,
            select,
            instructions,
            instructions_file,
            format,
            output,
            workers,
            token_limit,
            tokenizer,
        } => {
            let instructions = read_instructions(instructions, instructions_file.as_deref())?;
            run_generate(
                &scan,
                &select,
                instructions,
                format,
                output.as_deref(),
                workers,
                token_limit,
                tokenizer.as_deref(),
                tracing_config.level,
                &mut session,
            )
            .await
        }
    }
}
