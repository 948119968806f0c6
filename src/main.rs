//! # hakcer
//!
//! Command-line front end for the prompt compressor: analyze text, manage
//! rules, refresh the remote catalog and inspect history.

#![deny(unsafe_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hakcer_core::{AnalysisResult, Disposition, RuleDraft};
use hakcer_engine::{
    http_source, CategoryFilter, Engine, EngineConfig, FileManifestSource, ManifestSource,
    RefreshOutcome,
};
use hakcer_settings::HakcerSettings;
use hakcer_store::SqliteStore;
use hakcer_telemetry::{init_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "hakcer", version, about = "Rule-based prompt compressor")]
struct Cli {
    /// Path to the SQLite database (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Settings file (defaults to ~/.hakcer/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a prompt with the enabled rules.
    Analyze(AnalyzeArgs),
    /// List and edit rules.
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Fetch the remote rule catalog.
    Refresh(RefreshArgs),
    /// Lifetime savings counters.
    Stats,
    /// Recorded analyses.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Prompt text. Read from stdin when omitted.
    text: Option<String>,

    /// Read the prompt from a file.
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Record the analysis in history.
    #[arg(long)]
    record: bool,

    /// Record as applied rather than previewed. Implies --record.
    #[arg(long)]
    applied: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// List rules, optionally for one category.
    List {
        #[arg(long, default_value = "all")]
        category: String,
        #[arg(long)]
        json: bool,
    },
    /// Add a custom rule.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        pattern: String,
        /// Flag letters, default "gi".
        #[arg(long)]
        flags: Option<String>,
        #[arg(long, default_value = "")]
        replace: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Turn a rule on or off.
    Toggle { id: String, state: Switch },
    /// Delete a custom rule.
    Remove { id: String },
    /// Drop custom rules, overrides and the fetched catalog.
    Reset {
        /// Required; the reset cannot be undone.
        #[arg(long)]
        yes: bool,
    },
    /// Enable every rule.
    EnableAll,
    /// Catalog version information.
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Args, Debug)]
struct RefreshArgs {
    /// Read the manifest from a local file instead of the configured URL.
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Keep running and refresh on the configured interval.
    #[arg(long)]
    watch: bool,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// Show recent entries, newest first.
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Write history as a JSON array.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge a JSON array of entries into history.
    Import { path: PathBuf },
    /// Delete history and reset counters.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Wipe all stored data, rules included.
    ResetAll {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => hakcer_settings::load_settings_from_path(path),
        None => hakcer_settings::load_settings(),
    }
    .context("Failed to load settings")?;

    init_telemetry(&TelemetryConfig::from_level_name(
        &settings.logging.level,
        settings.logging.json,
    ));

    let source: Arc<dyn ManifestSource> = match &cli.command {
        Command::Refresh(RefreshArgs {
            from_file: Some(path),
            ..
        }) => Arc::new(FileManifestSource::new(
            path.clone(),
            settings.sync.max_manifest_bytes,
        )),
        _ => http_source(&settings).context("Failed to build HTTP client")?,
    };

    let engine = open_engine(&cli, &settings, source).await?;

    match cli.command {
        Command::Analyze(args) => analyze(&engine, args).await,
        Command::Rules(cmd) => rules(&engine, cmd).await,
        Command::Refresh(args) => refresh(&engine, args).await,
        Command::Stats => print_json(&engine.stats().stats().await?),
        Command::History(cmd) => history(&engine, cmd).await,
    }
}

async fn open_engine(
    cli: &Cli,
    settings: &HakcerSettings,
    source: Arc<dyn ManifestSource>,
) -> Result<Engine> {
    let db_path = cli
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.storage.db_path));
    ensure_parent_dir(&db_path)?;

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");

    Engine::open(Arc::new(store), source, EngineConfig::from_settings(settings))
        .await
        .context("Failed to load rule catalog")
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

async fn analyze(engine: &Engine, args: AnalyzeArgs) -> Result<()> {
    let text = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let result = engine.analyze(&text);

    if args.record || args.applied {
        let disposition = if args.applied {
            Disposition::Applied
        } else {
            Disposition::Optimized
        };
        engine.stats().record(&result, &text, disposition).await?;
    }

    if args.json {
        return print_json(&result);
    }
    println!("{}", result.optimized_text);
    eprintln!("{}", summary_line(&result));
    Ok(())
}

fn summary_line(result: &AnalysisResult) -> String {
    let stats = &result.stats;
    format!(
        "{} rule(s) applied, {} chars saved ({:.1}%), ~{} tokens saved",
        result.applied_rules.len(),
        stats.characters_saved,
        stats.percent_saved,
        stats.tokens_saved
    )
}

async fn rules(engine: &Engine, cmd: RulesCommand) -> Result<()> {
    let store = engine.rules();
    match cmd {
        RulesCommand::List { category, json } => {
            let rules = store.list_rules(&CategoryFilter::parse(&category));
            if json {
                let summaries: Vec<_> = rules.iter().map(|r| r.summary()).collect();
                return print_json(&summaries);
            }
            for rule in rules {
                println!(
                    "[{}] {:<36} {:<11} {}{}",
                    if rule.is_enabled() { "x" } else { " " },
                    rule.id(),
                    rule.category(),
                    rule.name(),
                    if rule.is_custom() { " (custom)" } else { "" }
                );
            }
        }
        RulesCommand::Add {
            name,
            pattern,
            flags,
            replace,
            category,
            description,
        } => {
            let draft = RuleDraft {
                name,
                description,
                category,
                pattern_string: pattern,
                pattern_flags: flags,
                replace_string: replace,
            };
            let rule = store.add_custom_rule(draft).await?;
            println!("{}", rule.id());
        }
        RulesCommand::Toggle { id, state } => {
            let enabled = matches!(state, Switch::On);
            if !store.toggle(&id, enabled).await? {
                bail!("no rule with id {id}");
            }
        }
        RulesCommand::Remove { id } => {
            if !store.remove_custom_rule(&id).await? {
                bail!("no custom rule with id {id}");
            }
        }
        RulesCommand::Reset { yes } => {
            require_confirmation(yes, "rules reset")?;
            store.reset_to_defaults().await?;
        }
        RulesCommand::EnableAll => {
            let count = store.enable_all().await?;
            println!("{count} rules enabled");
        }
        RulesCommand::Info => print_json(&store.version_info())?,
    }
    Ok(())
}

async fn refresh(engine: &Engine, args: RefreshArgs) -> Result<()> {
    let cancel = CancellationToken::new();

    if args.watch {
        let scheduler = engine.scheduler();
        let handle = tokio::spawn(scheduler.start(cancel.clone()));
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl+c")?;
        tracing::info!("shutting down");
        cancel.cancel();
        handle.await.context("Refresh scheduler panicked")?;
        return Ok(());
    }

    let result = tokio::select! {
        r = engine.refresh(&cancel) => r,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            bail!("refresh interrupted");
        }
    };
    print_json(&RefreshOutcome::from(&result))?;
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn history(engine: &Engine, cmd: HistoryCommand) -> Result<()> {
    let stats = engine.stats();
    match cmd {
        HistoryCommand::List { limit } => {
            let entries: Vec<_> = stats.history().await?.into_iter().take(limit).collect();
            print_json(&entries)?;
        }
        HistoryCommand::Export { output } => {
            let json = stats.export_json().await?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        HistoryCommand::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let added = stats.import_json(&json).await?;
            println!("{added} new entries imported");
        }
        HistoryCommand::Clear { yes } => {
            require_confirmation(yes, "history clear")?;
            stats.clear().await?;
        }
        HistoryCommand::ResetAll { yes } => {
            require_confirmation(yes, "history reset-all")?;
            engine.reset_all().await?;
        }
    }
    Ok(())
}

fn require_confirmation(yes: bool, command: &str) -> Result<()> {
    if !yes {
        bail!("{command} cannot be undone; pass --yes to confirm");
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
