//! Bottom-up creation of LTO variants and dependency rewiring.

use super::resolve::{Resolution, ResolvedGraph};
use crate::error::Result;
use crate::graph::{LtoMode, LtoRequests, ModuleGraph};
use crate::policy::LtoPolicy;

/// Outcome of a synthesis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Variants created by this pass.
    pub clones_created: usize,
    /// Required variants that already existed from an earlier pass.
    pub clones_reused: usize,
    /// Dependency edges pointed at a different variant.
    pub edges_retargeted: usize,
}

/// Modes a module must additionally be built in to satisfy its consumers.
pub fn needed_modes(
    requests: &LtoRequests,
    resolution: &Resolution,
    policy: &LtoPolicy,
) -> Vec<LtoMode> {
    let mut modes = Vec::with_capacity(3);
    if requests.full && !resolution.is_full() {
        modes.push(LtoMode::Full);
    }
    if !policy.global_thin_default && requests.thin && !resolution.is_explicit_thin() {
        modes.push(LtoMode::Thin);
    }
    if policy.global_thin_default && requests.no_lto && !resolution.never {
        modes.push(LtoMode::None);
    }
    modes
}

/// Variation a module selects for its LTO-transparent dependencies.
///
/// `None` keeps the dependencies' default modules.
pub fn dependency_variation(resolution: &Resolution, policy: &LtoPolicy) -> Option<LtoMode> {
    let mut variation = None;
    if resolution.is_full() {
        variation = Some(LtoMode::Full);
    }
    if !policy.global_thin_default && resolution.is_explicit_thin() {
        variation = Some(LtoMode::Thin);
    }
    // Must come last: no-LTO overrides full and thin.
    if policy.global_thin_default && resolution.never {
        variation = Some(LtoMode::None);
    }
    variation
}

/// Clone every module once per mode its consumers asked for, then point each
/// module's LTO-transparent edges at the variant matching its own mode.
///
/// Re-running on an already synthesized graph creates no clones and moves no
/// edges. Request sets are cleared once consumed.
pub fn synthesize(graph: &mut ModuleGraph, policy: &LtoPolicy) -> Result<SynthesisReport> {
    let mut report = SynthesisReport::default();
    let order = graph.bottom_up_order();
    let resolved = ResolvedGraph::compute(graph, policy);

    for &id in &order {
        let Some(module) = graph.module_mut(id) else {
            continue;
        };
        let requests = std::mem::take(&mut module.requests);
        if module.is_variant() || requests.is_empty() {
            continue;
        }
        let Some(resolution) = resolved.get(id) else {
            continue;
        };

        for mode in needed_modes(&requests, resolution, policy) {
            if graph.variant_of(id, mode).is_some() {
                report.clones_reused += 1;
                continue;
            }
            let clone = graph.clone_variant(id, mode)?;
            report.clones_created += 1;
            tracing::debug!(
                module = %graph.name_of(id),
                variant = %graph.name_of(clone),
                %mode,
                "created LTO variant"
            );
        }
    }

    // Variants resolve through their pins, so resolve again with them in place.
    let resolved = ResolvedGraph::compute(graph, policy);
    for id in graph.bottom_up_order() {
        let Some(resolution) = resolved.get(id) else {
            continue;
        };
        let variation = dependency_variation(resolution, policy);

        for dep in graph.dependencies(id) {
            if !dep.kind.is_lto_transparent() {
                continue;
            }
            let base = graph.base_of(dep.target);
            let desired = variation
                .and_then(|mode| graph.variant_of(base, mode))
                .unwrap_or(base);
            if desired != dep.target {
                graph.retarget(dep.edge, desired)?;
                report.edges_retargeted += 1;
            }
        }
    }

    tracing::info!(
        created = report.clones_created,
        reused = report.clones_reused,
        retargeted = report.edges_retargeted,
        "LTO variant synthesis complete"
    );
    Ok(report)
}
