//! JSON graph manifests.
//!
//! A manifest describes the modules of a build graph, their declared LTO
//! properties and their dependencies, optionally together with a policy block:
//!
//! ```json
//! {
//!   "policy": { "global_thin_default": false },
//!   "modules": [
//!     { "name": "app", "lto": { "full": true }, "deps": [{ "target": "liba" }] },
//!     { "name": "liba" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{DepKind, LtoProperties, Module, ModuleGraph, ModuleTraits};
use crate::error::{Error, Result};
use crate::policy::LtoPolicy;

/// A module entry in a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(default)]
    pub lto: LtoProperties,
    #[serde(default)]
    pub traits: ModuleTraits,
    #[serde(default)]
    pub deps: Vec<DepSpec>,
}

/// A dependency entry in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepSpec {
    pub target: String,
    #[serde(default)]
    pub kind: DepKind,
}

/// Parsed graph manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphManifest {
    /// Policy overrides; `None` leaves the caller's policy untouched.
    #[serde(default)]
    pub policy: Option<LtoPolicy>,
    pub modules: Vec<ModuleSpec>,
}

impl GraphManifest {
    /// Parse a manifest from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Build the module graph (first pass: modules, second pass: edges).
    pub fn build_graph(&self) -> Result<ModuleGraph> {
        let mut graph = ModuleGraph::new();

        for spec in &self.modules {
            let module = Module::new(spec.name.clone())
                .with_lto(spec.lto.clone())
                .with_traits(spec.traits.clone());
            graph.add_module(module)?;
        }

        for spec in &self.modules {
            let Some(from) = graph.find(&spec.name) else {
                return Err(Error::ModuleNotFound(spec.name.clone()));
            };
            for dep in &spec.deps {
                let to = graph.find(&dep.target).ok_or_else(|| {
                    Error::ModuleNotFound(format!(
                        "'{}' depends on '{}', but no such module exists",
                        spec.name, dep.target
                    ))
                })?;
                graph.add_dependency(from, to, dep.kind)?;
            }
        }

        tracing::debug!(modules = graph.len(), "built module graph from manifest");
        Ok(graph)
    }
}
