//! Ripple - cross-repository impact analysis for pull requests
//!
//! The `ripple` command administers the relationship graph and runs the
//! analysis pipeline over pull-request events stored as JSON files.
//!
//! ## Commands
//!
//! - `relationship add|remove|list`: maintain the repository graph
//! - `impact`: map an event's change set without calling external services
//! - `handle`: run events through the full pipeline and publish comments
//! - `config`: print the effective configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ripple_core::metrics::METRICS;
use ripple_core::telemetry::{init_tracing, level_for};
use ripple_core::{
    ChangedFile, DependencyMapper, EventOutcome, GitHubCommentHost, HttpReasoningBackend,
    Orchestrator, PrEvent, PublicationClient, ReasoningClient, RelationshipKind, RelationshipStore,
    RepoId, RippleConfig,
};
use ripple_state::{SurrealHandle, SurrealReceiptLedger, SurrealRelationshipStore};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "ripple")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-repository impact analysis for pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: ./ripple.toml when present)
    #[arg(short, long, global = true, env = "RIPPLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage repository relationships
    Relationship {
        #[command(subcommand)]
        action: RelationshipAction,
    },

    /// Map an event's change set onto the relationship graph
    Impact {
        /// Event file (PrEvent JSON or GitHub pull_request payload)
        #[arg(short, long)]
        event: PathBuf,
    },

    /// Run events through the full pipeline
    Handle {
        /// Event files, processed concurrently
        #[arg(required = true)]
        events: Vec<PathBuf>,
    },

    /// Print the effective configuration (secrets omitted)
    Config,
}

#[derive(Subcommand)]
enum RelationshipAction {
    /// Declare that SOURCE relates to TARGET
    Add {
        source: String,
        target: String,

        /// Relationship kind (depends-on, shared-library, same-domain, consumer-of-api)
        #[arg(short, long)]
        kind: String,

        /// Metadata entry, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Delete a relationship
    Remove {
        source: String,
        target: String,

        #[arg(short, long)]
        kind: String,
    },

    /// List relationships
    List {
        /// Only relationships touching this repository
        #[arg(short, long)]
        repo: Option<String>,

        /// Edge direction relative to --repo
        #[arg(short, long, value_enum, default_value = "both")]
        direction: Direction,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let config = RippleConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Relationship { action } => {
            let handle = connect(&config).await?;
            let store = SurrealRelationshipStore::new(handle);
            match action {
                RelationshipAction::Add {
                    source,
                    target,
                    kind,
                    meta,
                } => cmd_relationship_add(&store, &source, &target, &kind, &meta).await,
                RelationshipAction::Remove {
                    source,
                    target,
                    kind,
                } => cmd_relationship_remove(&store, &source, &target, &kind).await,
                RelationshipAction::List { repo, direction } => {
                    cmd_relationship_list(&store, repo.as_deref(), direction).await
                }
            }
        }
        Commands::Impact { event } => cmd_impact(&config, &event).await,
        Commands::Handle { events } => cmd_handle(&config, &events).await,
        Commands::Config => cmd_config(&config),
    };

    METRICS.flush();
    result
}

async fn connect(config: &RippleConfig) -> Result<SurrealHandle> {
    SurrealHandle::connect(&config.store_config())
        .await
        .with_context(|| format!("Failed to connect to relationship store at {}", config.store.url))
}

fn parse_kind(kind: &str) -> Result<RelationshipKind> {
    kind.parse()
        .with_context(|| format!("Invalid relationship kind '{}'", kind))
}

fn parse_meta(entries: &[String]) -> Result<BTreeMap<String, String>> {
    entries
        .iter()
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("Metadata '{}' is not KEY=VALUE", entry))?;
            let key = key.trim();
            if key.is_empty() {
                bail!("Metadata '{}' has an empty key", entry);
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

async fn cmd_relationship_add(
    store: &dyn RelationshipStore,
    source: &str,
    target: &str,
    kind: &str,
    meta: &[String],
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let metadata = parse_meta(meta)?;
    let rel = store
        .add(&RepoId::from(source), &RepoId::from(target), kind, metadata)
        .await
        .with_context(|| format!("Failed to add {} -[{}]-> {}", source, kind, target))?;

    println!("Added {} -[{}]-> {}", rel.source, rel.kind, rel.target);
    Ok(())
}

async fn cmd_relationship_remove(
    store: &dyn RelationshipStore,
    source: &str,
    target: &str,
    kind: &str,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let removed = store
        .remove(&RepoId::from(source), &RepoId::from(target), kind)
        .await
        .context("Failed to remove relationship")?;

    if removed {
        println!("Removed {} -[{}]-> {}", source, kind, target);
    } else {
        println!("No relationship {} -[{}]-> {}", source, kind, target);
    }
    Ok(())
}

async fn cmd_relationship_list(
    store: &dyn RelationshipStore,
    repo: Option<&str>,
    direction: Direction,
) -> Result<()> {
    let relationships = match repo {
        None => store.list().await?,
        Some(repo) => {
            let repo = RepoId::from(repo);
            let mut rels = Vec::new();
            if direction != Direction::Incoming {
                rels.extend(store.outgoing(&repo).await?);
            }
            if direction != Direction::Outgoing {
                rels.extend(store.incoming(&repo).await?);
            }
            rels.sort_by(|a, b| a.key().cmp(&b.key()));
            rels.dedup_by(|a, b| a.key() == b.key());
            rels
        }
    };

    if relationships.is_empty() {
        println!("No relationships found.");
        return Ok(());
    }

    for rel in relationships {
        let meta = if rel.metadata.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = rel
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("  ({})", pairs.join(", "))
        };
        println!("{} -[{}]-> {}{}", rel.source, rel.kind, rel.target, meta);
    }
    Ok(())
}

/// Read an event file: either a serialized `PrEvent` or a GitHub
/// `pull_request` payload with optional `files` and `delivery_id` fields.
fn load_event(path: &Path) -> Result<PrEvent> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Event file {} is not JSON", path.display()))?;
    event_from_value(&value).with_context(|| format!("Invalid event in {}", path.display()))
}

fn event_from_value(value: &Value) -> Result<PrEvent> {
    if value.get("pull_request").is_none() {
        return Ok(serde_json::from_value(value.clone())?);
    }

    let files = value
        .get("files")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .map(ChangedFile::from_github_file)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let delivery_id = value.get("delivery_id").and_then(Value::as_str);
    Ok(PrEvent::from_pull_request_payload(value, delivery_id, files)?)
}

fn mapper(config: &RippleConfig, handle: SurrealHandle) -> DependencyMapper {
    DependencyMapper::new(
        Arc::new(SurrealRelationshipStore::new(handle)),
        config.classifier(),
        Arc::new(config.test_index()),
    )
    .with_policy(config.policy())
    .with_follow_outgoing(config.impact.follow_outgoing)
}

async fn cmd_impact(config: &RippleConfig, path: &Path) -> Result<()> {
    let event = load_event(path)?;
    let handle = connect(config).await?;
    let report = mapper(config, handle)
        .map(&event.repo, &event.change_set)
        .await
        .context("Impact mapping failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_handle(config: &RippleConfig, paths: &[PathBuf]) -> Result<()> {
    let events = paths
        .iter()
        .map(|p| load_event(p))
        .collect::<Result<Vec<_>>>()?;

    let handle = connect(config).await?;
    let backend = HttpReasoningBackend::from_settings(&config.reasoning)
        .context("Failed to configure reasoning backend")?;
    let host = GitHubCommentHost::from_settings(&config.github)
        .context("Failed to configure GitHub client")?;

    let reasoning = ReasoningClient::new(Arc::new(backend))
        .with_policy(config.reasoning.retry.clone())
        .with_bounds(config.reasoning.bounds.clone());
    let publisher = PublicationClient::new(
        Arc::new(host),
        Arc::new(SurrealReceiptLedger::new(handle.clone())),
    )
    .with_policy(config.github.retry.clone());
    let orchestrator = Orchestrator::new(
        mapper(config, handle),
        reasoning,
        publisher,
        config.context.budget_bytes,
    )
    .with_config(config.orchestrator_config());

    info!(events = events.len(), "handling events");
    let outcomes = orchestrator.handle_batch(events).await;
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let failed: Vec<&EventOutcome> = outcomes.iter().filter(|o| o.failure().is_some()).collect();
    if !failed.is_empty() {
        bail!("{} of {} events failed", failed.len(), outcomes.len());
    }
    Ok(())
}

fn cmd_config(config: &RippleConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
    Ok(())
}
