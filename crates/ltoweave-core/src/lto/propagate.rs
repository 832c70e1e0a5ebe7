//! Top-down propagation of LTO requirements to static dependencies.
//!
//! A module built with LTO needs every transitive static dependency compiled
//! in the same mode. This pass records that need on each dependency as an
//! [`LtoRequests`] entry; [`synthesize`](super::synthesize) later turns the
//! requests into variants.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::resolve::{Resolution, ResolvedGraph};
use crate::error::ConfigError;
use crate::graph::{LtoRequests, ModuleGraph, ModuleId};
use crate::policy::LtoPolicy;

/// A requirement a root pushes down to its static dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Full,
    Thin,
    NoLto,
}

impl Requirement {
    /// Requirements a module with `resolution` imposes on its dependencies.
    fn imposed_by(resolution: &Resolution, policy: &LtoPolicy) -> Vec<Requirement> {
        let mut imposed = Vec::new();
        if resolution.is_full() {
            imposed.push(Requirement::Full);
        }
        // With thin-default on, thin is ambient and needs no request.
        if !policy.global_thin_default && resolution.is_explicit_thin() {
            imposed.push(Requirement::Thin);
        }
        // With thin-default on, dependencies of a no-LTO module would
        // otherwise silently get auto-thin.
        if policy.global_thin_default && resolution.never {
            imposed.push(Requirement::NoLto);
        }
        imposed
    }

    fn satisfied_by(self, resolution: &Resolution) -> bool {
        match self {
            Requirement::Full => resolution.is_full(),
            Requirement::Thin => resolution.is_explicit_thin(),
            Requirement::NoLto => resolution.never,
        }
    }

    fn record(self, requests: &mut LtoRequests) {
        match self {
            Requirement::Full => requests.full = true,
            Requirement::Thin => requests.thin = true,
            Requirement::NoLto => requests.no_lto = true,
        }
    }
}

/// Outcome of a propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Modules whose request set gained at least one entry.
    pub annotated: usize,
    /// Modules with an invalid LTO configuration.
    pub errors: Vec<ConfigError>,
}

/// Record LTO requests on every module reachable over LTO-transparent edges
/// from a module that is built with (or explicitly without) LTO.
///
/// Must complete for the whole graph before synthesis starts: a module's
/// request set is only final once all of its ancestors have been walked.
pub fn propagate(graph: &mut ModuleGraph, policy: &LtoPolicy) -> PropagationReport {
    let resolved = ResolvedGraph::compute(graph, policy);
    for err in resolved.errors() {
        tracing::warn!(module = %err.module, "{}", err.message);
    }

    // Walks only read the graph; their results are OR-ed in afterwards.
    let view: &ModuleGraph = graph;
    let walks: Vec<FxHashMap<ModuleId, LtoRequests>> = view
        .module_ids()
        .into_par_iter()
        .filter_map(|root| {
            let resolution = resolved.get(root)?;
            let imposed = Requirement::imposed_by(resolution, policy);
            if imposed.is_empty() {
                return None;
            }
            Some(walk_from(view, &resolved, root, &imposed))
        })
        .collect();

    let mut merged: FxHashMap<ModuleId, LtoRequests> = FxHashMap::default();
    for walk in walks {
        for (id, requests) in walk {
            merged.entry(id).or_default().merge(requests);
        }
    }

    let mut targets: Vec<_> = merged.into_iter().collect();
    targets.sort_by_key(|(id, _)| *id);

    let mut annotated = 0;
    for (id, requests) in targets {
        let Some(module) = graph.module_mut(id) else {
            continue;
        };
        if module.is_variant() {
            tracing::debug!(module = %module.name, "dropping LTO requests on variant");
            continue;
        }
        let before = module.requests;
        module.requests.merge(requests);
        if module.requests != before {
            annotated += 1;
            tracing::debug!(
                module = %module.name,
                full = module.requests.full,
                thin = module.requests.thin,
                no_lto = module.requests.no_lto,
                "recorded LTO requests"
            );
        }
    }

    tracing::info!(
        annotated,
        errors = resolved.errors().len(),
        "LTO propagation complete"
    );

    PropagationReport {
        annotated,
        errors: resolved.errors().to_vec(),
    }
}

/// Depth-first walk from `root` for each imposed requirement.
///
/// A walk does not cross non-transparent edges and does not descend past a
/// dependency that already satisfies the requirement: that dependency is a
/// root for the same requirement and covers its own subtree.
fn walk_from(
    graph: &ModuleGraph,
    resolved: &ResolvedGraph,
    root: ModuleId,
    imposed: &[Requirement],
) -> FxHashMap<ModuleId, LtoRequests> {
    let mut found: FxHashMap<ModuleId, LtoRequests> = FxHashMap::default();

    for &requirement in imposed {
        let mut visited = FxHashSet::default();
        visited.insert(root);
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            for dep in graph.dependencies(current) {
                if !dep.kind.is_lto_transparent() || !visited.insert(dep.target) {
                    continue;
                }
                if resolved
                    .get(dep.target)
                    .is_some_and(|res| requirement.satisfied_by(res))
                {
                    continue;
                }
                requirement.record(found.entry(dep.target).or_default());
                stack.push(dep.target);
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DepKind, LtoProperties, Module};

    fn chain(kinds: &[DepKind], lto: &[LtoProperties]) -> (ModuleGraph, Vec<ModuleId>) {
        let mut graph = ModuleGraph::new();
        let ids: Vec<_> = lto
            .iter()
            .enumerate()
            .map(|(i, props)| {
                graph
                    .add_module(Module::new(format!("m{i}")).with_lto(props.clone()))
                    .unwrap()
            })
            .collect();
        for (i, kind) in kinds.iter().enumerate() {
            graph.add_dependency(ids[i], ids[i + 1], *kind).unwrap();
        }
        (graph, ids)
    }

    fn requests(graph: &ModuleGraph, id: ModuleId) -> LtoRequests {
        graph.module(id).unwrap().requests
    }

    #[test]
    fn test_full_reaches_transitive_static_deps() {
        let (mut graph, ids) = chain(
            &[DepKind::StaticLink, DepKind::StaticLink],
            &[LtoProperties::full(), LtoProperties::default(), LtoProperties::default()],
        );
        let report = propagate(&mut graph, &LtoPolicy::explicit_only());

        assert_eq!(report.annotated, 2);
        assert!(requests(&graph, ids[1]).full);
        assert!(requests(&graph, ids[2]).full);
        assert!(requests(&graph, ids[0]).is_empty());
    }

    #[test]
    fn test_other_edge_blocks_propagation() {
        let (mut graph, ids) = chain(
            &[DepKind::Other, DepKind::StaticLink],
            &[LtoProperties::full(), LtoProperties::default(), LtoProperties::default()],
        );
        let report = propagate(&mut graph, &LtoPolicy::explicit_only());

        assert_eq!(report.annotated, 0);
        assert!(requests(&graph, ids[1]).is_empty());
        assert!(requests(&graph, ids[2]).is_empty());
    }

    #[test]
    fn test_object_inputs_are_transparent() {
        let (mut graph, ids) = chain(
            &[DepKind::ObjectInput, DepKind::ReuseObjectInput],
            &[LtoProperties::full(), LtoProperties::default(), LtoProperties::default()],
        );
        propagate(&mut graph, &LtoPolicy::explicit_only());
        assert!(requests(&graph, ids[2]).full);
    }

    #[test]
    fn test_thin_requests_only_without_thin_default() {
        let lto = [LtoProperties::thin(), LtoProperties::default()];
        let (mut graph, ids) = chain(&[DepKind::StaticLink], &lto);
        propagate(&mut graph, &LtoPolicy::explicit_only());
        assert!(requests(&graph, ids[1]).thin);

        let (mut graph, ids) = chain(&[DepKind::StaticLink], &lto);
        propagate(&mut graph, &LtoPolicy::default());
        assert!(requests(&graph, ids[1]).is_empty());
    }

    #[test]
    fn test_never_requests_only_with_thin_default() {
        let lto = [LtoProperties::never(), LtoProperties::default()];
        let (mut graph, ids) = chain(&[DepKind::StaticLink], &lto);
        propagate(&mut graph, &LtoPolicy::default());
        assert!(requests(&graph, ids[1]).no_lto);

        let (mut graph, ids) = chain(&[DepKind::StaticLink], &lto);
        propagate(&mut graph, &LtoPolicy::explicit_only());
        assert!(requests(&graph, ids[1]).is_empty());
    }

    #[test]
    fn test_walk_stops_at_satisfied_dependency() {
        // m1 is already full; it covers m2 itself, so m0's walk stops there.
        let (mut graph, ids) = chain(
            &[DepKind::StaticLink, DepKind::StaticLink],
            &[LtoProperties::full(), LtoProperties::full(), LtoProperties::default()],
        );
        propagate(&mut graph, &LtoPolicy::explicit_only());
        assert!(requests(&graph, ids[1]).is_empty());
        assert!(requests(&graph, ids[2]).full);
    }

    #[test]
    fn test_independent_consumers_accumulate() {
        let mut graph = ModuleGraph::new();
        let full = graph.add_module(Module::new("full").with_lto(LtoProperties::full())).unwrap();
        let thin = graph.add_module(Module::new("thin").with_lto(LtoProperties::thin())).unwrap();
        let lib = graph.add_module(Module::new("lib")).unwrap();
        graph.add_dependency(full, lib, DepKind::StaticLink).unwrap();
        graph.add_dependency(thin, lib, DepKind::StaticLink).unwrap();

        propagate(&mut graph, &LtoPolicy::explicit_only());
        let req = requests(&graph, lib);
        assert!(req.full && req.thin && !req.no_lto);
    }

    #[test]
    fn test_conflicting_module_is_reported_and_isolated() {
        let mut graph = ModuleGraph::new();
        let bad = graph
            .add_module(Module::new("bad").with_lto(LtoProperties {
                full: true,
                thin: true,
                ..LtoProperties::default()
            }))
            .unwrap();
        let app = graph.add_module(Module::new("app").with_lto(LtoProperties::full())).unwrap();
        let lib_bad = graph.add_module(Module::new("lib_bad")).unwrap();
        let lib = graph.add_module(Module::new("lib")).unwrap();
        graph.add_dependency(bad, lib_bad, DepKind::StaticLink).unwrap();
        graph.add_dependency(app, lib, DepKind::StaticLink).unwrap();

        let report = propagate(&mut graph, &LtoPolicy::explicit_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].module, "bad");
        assert!(requests(&graph, lib_bad).is_empty());
        assert!(requests(&graph, lib).full);
    }

    #[test]
    fn test_cycle_terminates() {
        let (mut graph, ids) = chain(
            &[DepKind::StaticLink, DepKind::StaticLink],
            &[LtoProperties::full(), LtoProperties::default(), LtoProperties::default()],
        );
        graph.add_dependency(ids[2], ids[1], DepKind::StaticLink).unwrap();
        graph.add_dependency(ids[2], ids[0], DepKind::StaticLink).unwrap();

        propagate(&mut graph, &LtoPolicy::explicit_only());
        assert!(requests(&graph, ids[1]).full);
        assert!(requests(&graph, ids[2]).full);
        assert!(requests(&graph, ids[0]).is_empty());
    }
}
