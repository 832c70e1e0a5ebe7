//! `ltoweave plan` - run both LTO passes and print the result.

use std::path::Path;

use anyhow::Context;
use ltoweave_core::{GraphManifest, run_lto_passes};

use crate::{OutputFormat, PolicyArgs};

/// Load the manifest, run the passes and print the plan.
pub fn execute(manifest_path: &Path, format: OutputFormat, args: &PolicyArgs) -> anyhow::Result<()> {
    let manifest = GraphManifest::from_path(manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;
    let policy = args.resolve(&manifest);
    let mut graph = manifest.build_graph()?;

    tracing::info!(
        manifest = %manifest_path.display(),
        modules = graph.len(),
        "planning LTO variants"
    );

    let plan = run_lto_passes(&mut graph, &policy)?;

    match format {
        OutputFormat::Text => println!("{plan}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }

    Ok(())
}
