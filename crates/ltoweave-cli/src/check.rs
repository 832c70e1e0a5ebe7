//! `ltoweave check` - validate a manifest without creating variants.

use std::path::Path;

use anyhow::Context;
use ltoweave_core::{GraphManifest, check_graph};

use crate::PolicyArgs;

pub fn execute(manifest_path: &Path, args: &PolicyArgs) -> anyhow::Result<()> {
    let manifest = GraphManifest::from_path(manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;
    let policy = args.resolve(&manifest);
    let graph = manifest.build_graph()?;

    let plan = check_graph(&graph, &policy)?;
    for module in &plan.modules {
        println!("{}: {}", module.name, module.mode);
    }
    println!("{} modules OK", plan.modules.len());

    Ok(())
}
