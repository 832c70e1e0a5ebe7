//! Pass coordination and the resulting LTO plan.

use std::fmt;

use serde::Serialize;

use super::flags::{LtoFlags, lto_flags};
use super::propagate::{PropagationReport, propagate};
use super::resolve::ResolvedGraph;
use super::synthesize::{SynthesisReport, synthesize};
use crate::error::{Error, Result};
use crate::graph::{LtoMode, ModuleGraph};
use crate::policy::LtoPolicy;

/// Final decision for one node of the rewritten graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedModule {
    pub name: String,
    /// Name of the default module this node was cloned from (itself otherwise).
    pub base: String,
    /// Variation name (`lto-full`, ...) or `None` for default modules.
    pub variation: Option<&'static str>,
    pub mode: LtoMode,
    pub explicit: bool,
    pub never: bool,
    pub installable: bool,
    pub packaged: bool,
    pub flags: LtoFlags,
    /// Targets of the module's dependency edges, in edge order.
    pub deps: Vec<String>,
    /// Modules with an edge onto this one, in arena order.
    pub consumers: Vec<String>,
}

/// Resolved modes, variants and flags for a whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LtoPlan {
    pub modules: Vec<PlannedModule>,
    pub annotated: usize,
    pub clones_created: usize,
    pub clones_reused: usize,
    pub edges_retargeted: usize,
}

impl LtoPlan {
    /// Build a plan from the current state of the graph.
    pub fn from_graph(graph: &ModuleGraph, policy: &LtoPolicy) -> Self {
        let resolved = ResolvedGraph::compute(graph, policy);
        let modules = graph
            .module_ids()
            .into_iter()
            .filter_map(|id| {
                let module = graph.module(id)?;
                let resolution = resolved.get(id)?;
                Some(PlannedModule {
                    name: module.name.clone(),
                    base: graph.name_of(graph.base_of(id)),
                    variation: module.variant.map(LtoMode::variation_name),
                    mode: resolution.mode,
                    explicit: resolution.explicit,
                    never: resolution.never,
                    installable: !module.prevent_install,
                    packaged: !module.hide_from_packaging,
                    flags: lto_flags(module, resolution, policy),
                    deps: graph
                        .dependencies(id)
                        .into_iter()
                        .map(|dep| graph.name_of(dep.target))
                        .collect(),
                    consumers: graph
                        .dependents(id)
                        .into_iter()
                        .map(|consumer| graph.name_of(consumer))
                        .collect(),
                })
            })
            .collect();

        Self {
            modules,
            ..Self::default()
        }
    }

    /// Look up a planned module by name.
    pub fn module(&self, name: &str) -> Option<&PlannedModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    fn with_reports(mut self, propagation: &PropagationReport, synthesis: &SynthesisReport) -> Self {
        self.annotated = propagation.annotated;
        self.clones_created = synthesis.clones_created;
        self.clones_reused = synthesis.clones_reused;
        self.edges_retargeted = synthesis.edges_retargeted;
        self
    }
}

impl fmt::Display for LtoPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.modules {
            let origin = if module.mode != LtoMode::None && !module.explicit {
                " (default)"
            } else {
                ""
            };
            write!(f, "{}: {}{}", module.name, module.mode, origin)?;
            if module.never {
                write!(f, " [never]")?;
            }
            if !module.installable {
                write!(f, " [not installed]")?;
            }
            writeln!(f)?;
            for dep in &module.deps {
                writeln!(f, "  -> {dep}")?;
            }
        }
        write!(
            f,
            "{} annotated, {} variants created, {} reused, {} edges retargeted",
            self.annotated, self.clones_created, self.clones_reused, self.edges_retargeted
        )
    }
}

/// Run propagation over the whole graph, then synthesis.
///
/// Configuration errors do not stop the unaffected modules from being
/// processed, but are returned as [`Error::Configuration`] once both passes ran.
pub fn run_lto_passes(graph: &mut ModuleGraph, policy: &LtoPolicy) -> Result<LtoPlan> {
    tracing::debug!(modules = graph.len(), ?policy, "running LTO passes");

    let propagation = propagate(graph, policy);
    let synthesis = synthesize(graph, policy)?;

    if !propagation.errors.is_empty() {
        return Err(Error::Configuration(propagation.errors));
    }

    Ok(LtoPlan::from_graph(graph, policy).with_reports(&propagation, &synthesis))
}

/// Resolve and validate every module without mutating the graph.
pub fn check_graph(graph: &ModuleGraph, policy: &LtoPolicy) -> Result<LtoPlan> {
    let resolved = ResolvedGraph::compute(graph, policy);
    if !resolved.errors().is_empty() {
        return Err(Error::Configuration(resolved.errors().to_vec()));
    }
    Ok(LtoPlan::from_graph(graph, policy))
}
