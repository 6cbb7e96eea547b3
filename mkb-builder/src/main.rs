//! Media Kit Builder (mkb-builder) - command-line entry point
//!
//! Offline tooling around the builder core: render a saved state to HTML,
//! check a state for broken invariants, apply a mutation script, and move
//! state to and from WordPress.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mkb_builder::bridge::{PersistenceBridge, WordPressBridge};
use mkb_builder::state::Mutation;
use mkb_builder::{Builder, ComponentRegistry};
use mkb_common::config::BuilderConfig;
use mkb_common::model::{decode_wordpress_state, MediaKitState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mkb-builder
#[derive(Parser, Debug)]
#[command(name = "mkb-builder")]
#[command(about = "Media kit builder core tools")]
#[command(version)]
struct Args {
    /// Config file (overrides MKB_CONFIG and the per-user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a saved state file to HTML
    Render {
        state: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Report broken invariants in a saved state file
    Check { state: PathBuf },
    /// Apply a JSON array of mutations to a state file
    Apply {
        state: PathBuf,
        script: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Download the saved state of the configured post
    Pull {
        /// Post to load (defaults to wordpress.post_id)
        #[arg(long, env = "MKB_POST_ID")]
        post_id: Option<u64>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Upload a state file to the configured post
    Push { state: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = BuilderConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Render { state, out } => {
            let state = read_state(&state)?;
            let mut builder = Builder::with_state(&config, ComponentRegistry::with_builtin(), state);
            let pass = builder.flush().context("Render failed")?;
            if let Some(pass) = pass {
                if pass.render.placeholders > 0 {
                    warn!("{} components rendered as error placeholders", pass.render.placeholders);
                }
            }
            write_output(out.as_deref(), &builder.html())?;
        }
        Command::Check { state } => {
            let raw = read_json(&state)?;
            let Some((state, repairs)) = decode_wordpress_state(raw).context("Invalid state file")? else {
                println!("No saved state");
                return Ok(());
            };
            println!(
                "{} components, {} sections, version {}",
                state.components.len(),
                state.sections.len(),
                state.version
            );
            if repairs.is_empty() {
                println!("OK");
            } else {
                for violation in &repairs {
                    println!("- {}", violation);
                }
                bail!("{} invariant violations", repairs.len());
            }
        }
        Command::Apply { state, script, out } => {
            let mut builder = Builder::with_state(&config, ComponentRegistry::with_builtin(), read_state(&state)?);
            let mutations: Vec<Mutation> = serde_json::from_value(read_json(&script)?)
                .with_context(|| format!("Invalid mutation script {}", script.display()))?;

            let count = mutations.len();
            builder
                .apply(Mutation::Batch { mutations })
                .context("Mutation script failed; nothing was applied")?;
            info!("Applied {} mutations", count);

            let json = serde_json::to_string_pretty(builder.snapshot().as_ref())?;
            write_output(out.as_deref(), &json)?;
        }
        Command::Pull { post_id, out } => {
            let bridge = WordPressBridge::new(&config.wordpress)?;
            let post_id = post_id.unwrap_or(bridge.post_id());
            let state = bridge
                .load(post_id)
                .await
                .with_context(|| format!("Failed to load post {}", post_id))?;
            write_output(out.as_deref(), &serde_json::to_string_pretty(&state)?)?;
        }
        Command::Push { state } => {
            let bridge = WordPressBridge::new(&config.wordpress)?;
            let state = read_state(&state)?;
            let receipt = bridge.save(&state).await.context("Failed to save to WordPress")?;
            println!(
                "{} ({} components, {} sections)",
                receipt.message, receipt.components_count, receipt.sections_count
            );
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_state(path: &Path) -> Result<MediaKitState> {
    let (state, repairs) = decode_wordpress_state(read_json(path)?)
        .with_context(|| format!("Invalid state file {}", path.display()))?
        .unwrap_or_default();
    if !repairs.is_empty() {
        warn!("{} needed {} repairs", path.display(), repairs.len());
    }
    Ok(state)
}

fn write_output(out: Option<&Path>, content: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
