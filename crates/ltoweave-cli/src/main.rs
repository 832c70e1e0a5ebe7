//! ltoweave CLI - plan LTO variants for a build dependency graph.

mod check;
mod plan;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ltoweave_core::{GraphManifest, LtoPolicy};

#[derive(Parser)]
#[command(name = "ltoweave")]
#[command(about = "Decide LTO modes and variants for a build dependency graph")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run propagation and variant synthesis, then print the plan
    Plan {
        /// Path to the graph manifest (.json)
        manifest: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Resolve and validate every module without creating variants
    Check {
        /// Path to the graph manifest (.json)
        manifest: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Policy overrides; they win over the manifest and the environment.
#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Disable LTO for every module
    #[arg(long)]
    disable_lto: bool,

    /// Only apply thin LTO where it is explicitly requested
    #[arg(long)]
    no_global_thin: bool,

    /// Emit ThinLTO cache flags
    #[arg(long)]
    thin_cache: bool,

    /// Build output directory (hosts the ThinLTO cache)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

impl PolicyArgs {
    /// Environment first, then the manifest's policy block, then these flags.
    pub fn resolve(&self, manifest: &GraphManifest) -> LtoPolicy {
        let mut policy = manifest.policy.clone().unwrap_or_else(LtoPolicy::from_env);
        if self.disable_lto {
            policy.disable_lto = true;
        }
        if self.no_global_thin {
            policy.global_thin_default = false;
        }
        if self.thin_cache {
            policy.thin_cache = true;
        }
        if let Some(dir) = &self.out_dir {
            policy.output_dir = dir.clone();
        }
        policy
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format ltoweave-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<ltoweave_core::Error>() {
            // Keep context added on top of the core error, e.g. the manifest path.
            if err.to_string() == core_err.to_string() {
                anyhow::anyhow!("{}", core_err.with_hint())
            } else {
                anyhow::anyhow!("{err}: {}", core_err.with_hint())
            }
        } else {
            err
        }
    };

    match cli.command {
        Commands::Plan {
            manifest,
            format,
            policy,
        } => plan::execute(&manifest, format, &policy).map_err(format_error)?,

        Commands::Check { manifest, policy } => {
            check::execute(&manifest, &policy).map_err(format_error)?;
        }
    }

    Ok(())
}
