//! petgraph-based dependency graph over task × variant pairs.
//!
//! Nodes are every concrete `(variant, task)` combination a build would
//! schedule, with task groups expanded to their members. Edges carry the
//! declared dependency's status requirement and patch-optional flag.
//! Dependency targets that name an unknown pair cannot become edges; they
//! are kept aside so the searches can report them.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::types::{BuildVariantTaskUnit, Project, TaskUnitDependency};
use crate::model::{ALL_DEPENDENCIES, ALL_VARIANTS, TASK_SUCCEEDED};

/// A node of the dependency graph: one task on one build variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TVPair {
    pub variant: String,
    pub task_name: String,
}

impl TVPair {
    pub fn new(variant: impl Into<String>, task_name: impl Into<String>) -> Self {
        TVPair {
            variant: variant.into(),
            task_name: task_name.into(),
        }
    }
}

impl std::fmt::Display for TVPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' in build variant '{}'", self.task_name, self.variant)
    }
}

/// Dependency attributes carried on each graph edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub status: String,
    pub patch_optional: bool,
}

impl DepEdge {
    /// Whether traversing this edge demands the dependency to succeed.
    /// An explicit `failed` (or any-status) requirement does not.
    pub fn needs_success(&self) -> bool {
        self.status.is_empty() || self.status == TASK_SUCCEEDED
    }
}

/// Mode constraints a reachability search must honor, derived from the
/// source task's skip predicates.
#[derive(Debug, Clone, Copy)]
pub struct DependencyRequirements {
    pub last_dep_needs_success: bool,
    pub require_on_patches: bool,
    pub require_on_non_patches: bool,
    pub require_on_git_tag: bool,
}

pub struct DependencyGraph {
    graph: DiGraph<TVPair, DepEdge>,
    node_indices: HashMap<TVPair, NodeIndex>,
    units: HashMap<TVPair, BuildVariantTaskUnit>,
    /// Dependency targets that resolved to no known node, keyed by the
    /// depending pair. Order follows the declaration order.
    missing: HashMap<TVPair, Vec<(DepEdge, TVPair)>>,
    /// Node insertion order, for deterministic iteration and reporting.
    order: Vec<TVPair>,
}

impl DependencyGraph {
    /// Builds the graph for a project: expands task groups, populates every
    /// unit from its task spec, pins variants, and expands each declared
    /// dependency to its concrete targets.
    pub fn build(project: &Project) -> DependencyGraph {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut units: HashMap<TVPair, BuildVariantTaskUnit> = HashMap::new();
        let mut order = Vec::new();

        for bv in &project.build_variants {
            let mut expanded = Vec::new();
            for unit in &bv.tasks {
                let mut unit = unit.clone();
                unit.variant = bv.name.clone();
                if project.find_task_group(&unit.name).is_some() {
                    expanded.extend(project.tasks_from_group(&unit));
                } else {
                    expanded.push(unit);
                }
            }
            for mut unit in expanded {
                unit.populate(&project.get_spec_for_task(&unit.name));
                unit.variant = bv.name.clone();
                let pair = TVPair::new(&bv.name, &unit.name);
                if !units.contains_key(&pair) {
                    let idx = graph.add_node(pair.clone());
                    node_indices.insert(pair.clone(), idx);
                    order.push(pair.clone());
                }
                // a duplicate listing overwrites the earlier unit; the
                // duplicate itself is reported by a dedicated check
                units.insert(pair, unit);
            }
        }

        let mut missing: HashMap<TVPair, Vec<(DepEdge, TVPair)>> = HashMap::new();
        for pair in &order {
            let unit = &units[pair];
            let from = node_indices[pair];
            for (dep, targets) in dependencies_for_task_unit(pair, unit, &order) {
                let edge = DepEdge {
                    status: dep.status.clone(),
                    patch_optional: dep.patch_optional,
                };
                for target in targets {
                    match node_indices.get(&target) {
                        Some(&to) => {
                            graph.add_edge(from, to, edge.clone());
                        }
                        None => missing
                            .entry(pair.clone())
                            .or_default()
                            .push((edge.clone(), target)),
                    }
                }
            }
        }

        DependencyGraph {
            graph,
            node_indices,
            units,
            missing,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, pair: &TVPair) -> bool {
        self.node_indices.contains_key(pair)
    }

    /// Outgoing dependency edges of a node in declaration order, with the
    /// unresolved targets appended.
    fn edges_of(&self, pair: &TVPair) -> Vec<(DepEdge, TVPair)> {
        let mut edges = Vec::new();
        if let Some(&idx) = self.node_indices.get(pair) {
            for edge in self.graph.edges(idx) {
                let target = self.graph[edge.target()].clone();
                edges.push((edge.weight().clone(), target));
            }
            // petgraph iterates most-recently-added first
            edges.reverse();
        }
        if let Some(unresolved) = self.missing.get(pair) {
            edges.extend(unresolved.iter().cloned());
        }
        edges
    }

    /// Runs a cycle scan from every node. Each start whose reachable
    /// region contains a cycle or an unresolved dependency yields one
    /// `(start, description)` entry.
    pub fn cycle_errors(&self) -> Vec<(TVPair, String)> {
        let mut findings = Vec::new();
        // nodes whose entire reachable region has been verified clean
        let mut done = HashSet::new();
        for start in &self.order {
            let mut stack = Vec::new();
            if let Err(description) = self.scan_for_cycles(start, &mut stack, &mut done) {
                findings.push((start.clone(), description));
            }
        }
        findings
    }

    fn scan_for_cycles(
        &self,
        current: &TVPair,
        stack: &mut Vec<TVPair>,
        done: &mut HashSet<TVPair>,
    ) -> Result<(), String> {
        if done.contains(current) {
            return Ok(());
        }
        stack.push(current.clone());
        for (_, target) in self.edges_of(current) {
            if !self.contains(&target) {
                return Err(format!(
                    "dependency {} is not present in the project configuration",
                    target
                ));
            }
            if let Some(pos) = stack.iter().position(|p| *p == target) {
                let mut route: Vec<String> = stack[pos..]
                    .iter()
                    .map(|p| format!("'{}' ({})", p.task_name, p.variant))
                    .collect();
                route.push(format!("'{}' ({})", target.task_name, target.variant));
                return Err(format!(
                    "dependency cycle detected: {}",
                    route.join(" depends on ")
                ));
            }
            self.scan_for_cycles(&target, stack, done)?;
        }
        stack.pop();
        done.insert(current.clone());
        Ok(())
    }

    /// Verifies that `source` transitively depends on `target` through
    /// edges that guarantee the target ran and succeeded, in every runtime
    /// mode the source itself runs in.
    pub fn depends_on(&self, source: &TVPair, target: &TVPair) -> Result<(), String> {
        if source == target {
            return Err(format!(
                "task '{}' in build variant '{}' cannot depend on itself",
                source.task_name, source.variant
            ));
        }
        let Some(source_unit) = self.units.get(source) else {
            return Err(format!(
                "could not find task '{}' in build variant '{}'",
                source.task_name, source.variant
            ));
        };

        // Patches and mainline builds must not rely on git-tag-only tasks,
        // and git-tag builds must not rely on patch-only tasks. The
        // non-git-tag case is the patch and non-patch cases combined, so it
        // needs no requirement of its own.
        let dep_reqs = DependencyRequirements {
            last_dep_needs_success: true,
            require_on_patches: !source_unit.skip_on_patch_build()
                && !source_unit.skip_on_non_git_tag_build(),
            require_on_non_patches: !source_unit.skip_on_non_patch_build()
                && !source_unit.skip_on_non_git_tag_build(),
            require_on_git_tag: !source_unit.skip_on_non_patch_build(),
        };

        let mut on_stack = HashSet::new();
        let found = self
            .dependency_must_run(target, source, dep_reqs, &mut on_stack)
            .map_err(|err| {
                format!(
                    "error searching for dependency of task '{}' in build variant '{}' \
                     on task '{}' in build variant '{}': {}",
                    source.task_name, source.variant, target.task_name, target.variant, err
                )
            })?;

        if !found {
            let mut message = format!(
                "task '{}' in build variant '{}' must depend on task '{}' in build variant '{}' \
                 running and succeeding",
                source.task_name, source.variant, target.task_name, target.variant
            );
            if dep_reqs.require_on_patches && dep_reqs.require_on_non_patches {
                message.push_str(" for both patches and non-patches");
            } else if dep_reqs.require_on_patches {
                message.push_str(" for patches");
            } else if dep_reqs.require_on_non_patches {
                message.push_str(" for non-patches");
            } else if dep_reqs.require_on_git_tag {
                message.push_str(" for git-tag builds");
            }
            return Err(message);
        }
        Ok(())
    }

    fn dependency_must_run(
        &self,
        target: &TVPair,
        current: &TVPair,
        dep_reqs: DependencyRequirements,
        on_stack: &mut HashSet<TVPair>,
    ) -> Result<bool, String> {
        let Some(unit) = self.units.get(current) else {
            return Err(format!(
                "dependency '{}' in build variant '{}' is not defined",
                current.task_name, current.variant
            ));
        };
        if on_stack.contains(current) {
            return Err(format!(
                "dependency '{}' in build variant '{}' is in a dependency cycle",
                current.task_name, current.variant
            ));
        }

        // A branch is dead as soon as one node on it would not run in a
        // mode the source runs in.
        if dep_reqs.require_on_patches
            && (unit.skip_on_patch_build() || unit.skip_on_non_git_tag_build())
        {
            return Ok(false);
        }
        if dep_reqs.require_on_non_patches
            && (unit.skip_on_non_patch_build() || unit.skip_on_non_git_tag_build())
        {
            return Ok(false);
        }
        if dep_reqs.require_on_git_tag && unit.skip_on_non_patch_build() {
            return Ok(false);
        }

        if current == target {
            return Ok(dep_reqs.last_dep_needs_success);
        }

        on_stack.insert(current.clone());

        for (edge, next) in self.edges_of(current) {
            // An edge that is optional on patches cannot witness a
            // dependency that must hold for patches.
            if dep_reqs.require_on_patches && edge.patch_optional {
                continue;
            }
            let mut next_reqs = dep_reqs;
            next_reqs.last_dep_needs_success = edge.needs_success();
            if self.dependency_must_run(target, &next, next_reqs, on_stack)? {
                return Ok(true);
            }
        }

        on_stack.remove(current);
        Ok(false)
    }
}

/// Expands one task unit's declared dependencies to concrete graph
/// targets, preserving declaration order:
///
/// - a specific task on a specific (or defaulted) variant is itself;
/// - the all-dependencies sentinel covers every other task on the
///   dependency's variant;
/// - the all-variants sentinel covers the named task on every other
///   variant;
/// - both sentinels together cover every node but the current one.
pub fn dependencies_for_task_unit(
    tv: &TVPair,
    unit: &BuildVariantTaskUnit,
    all_nodes: &[TVPair],
) -> Vec<(TaskUnitDependency, Vec<TVPair>)> {
    let mut deps_to_nodes = Vec::new();
    for dep in &unit.depends_on {
        let mut nodes = Vec::new();
        if dep.variant != ALL_VARIANTS {
            let dep_variant = if dep.variant.is_empty() {
                tv.variant.clone()
            } else {
                dep.variant.clone()
            };
            if dep.name == ALL_DEPENDENCIES {
                for node in all_nodes {
                    if node.task_name != tv.task_name && node.variant == dep_variant {
                        nodes.push(node.clone());
                    }
                }
            } else {
                nodes.push(TVPair::new(dep_variant, &dep.name));
            }
        } else if dep.name != ALL_DEPENDENCIES {
            for node in all_nodes {
                if node.task_name == dep.name && node != tv {
                    nodes.push(node.clone());
                }
            }
        } else {
            for node in all_nodes {
                if node != tv {
                    nodes.push(node.clone());
                }
            }
        }
        deps_to_nodes.push((dep.clone(), nodes));
    }
    deps_to_nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{BuildVariant, ProjectTask};

    fn dep(name: &str, variant: &str) -> TaskUnitDependency {
        TaskUnitDependency {
            name: name.into(),
            variant: variant.into(),
            ..Default::default()
        }
    }

    fn nodes() -> Vec<TVPair> {
        vec![
            TVPair::new("v1", "a"),
            TVPair::new("v1", "b"),
            TVPair::new("v2", "a"),
            TVPair::new("v2", "b"),
        ]
    }

    #[test]
    fn expansion_defaults_to_current_variant() {
        let tv = TVPair::new("v1", "b");
        let unit = BuildVariantTaskUnit {
            name: "b".into(),
            depends_on: vec![dep("a", "")],
            ..Default::default()
        };
        let expanded = dependencies_for_task_unit(&tv, &unit, &nodes());
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].1, vec![TVPair::new("v1", "a")]);
    }

    #[test]
    fn expansion_all_dependencies_covers_other_tasks_on_variant() {
        let tv = TVPair::new("v1", "b");
        let unit = BuildVariantTaskUnit {
            name: "b".into(),
            depends_on: vec![dep(ALL_DEPENDENCIES, "v2")],
            ..Default::default()
        };
        let expanded = dependencies_for_task_unit(&tv, &unit, &nodes());
        assert_eq!(expanded[0].1, vec![TVPair::new("v2", "a")]);
    }

    #[test]
    fn expansion_all_variants_covers_other_variants() {
        let tv = TVPair::new("v1", "a");
        let unit = BuildVariantTaskUnit {
            name: "a".into(),
            depends_on: vec![dep("a", ALL_VARIANTS)],
            ..Default::default()
        };
        let expanded = dependencies_for_task_unit(&tv, &unit, &nodes());
        assert_eq!(expanded[0].1, vec![TVPair::new("v2", "a")]);
    }

    #[test]
    fn expansion_both_sentinels_cover_everything_else() {
        let tv = TVPair::new("v1", "a");
        let unit = BuildVariantTaskUnit {
            name: "a".into(),
            depends_on: vec![dep(ALL_DEPENDENCIES, ALL_VARIANTS)],
            ..Default::default()
        };
        let expanded = dependencies_for_task_unit(&tv, &unit, &nodes());
        assert_eq!(
            expanded[0].1,
            vec![
                TVPair::new("v1", "b"),
                TVPair::new("v2", "a"),
                TVPair::new("v2", "b"),
            ]
        );
    }

    fn two_task_project(extra_dep_on_a: bool) -> Project {
        let mut a = ProjectTask {
            name: "a".into(),
            ..Default::default()
        };
        if extra_dep_on_a {
            a.depends_on = vec![dep("b", "")];
        }
        let b = ProjectTask {
            name: "b".into(),
            depends_on: vec![dep("a", "")],
            ..Default::default()
        };
        Project {
            identifier: "p".into(),
            tasks: vec![a, b],
            build_variants: vec![BuildVariant {
                name: "v1".into(),
                tasks: vec![
                    BuildVariantTaskUnit {
                        name: "a".into(),
                        ..Default::default()
                    },
                    BuildVariantTaskUnit {
                        name: "b".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn acyclic_graph_scans_clean() {
        let graph = DependencyGraph::build(&two_task_project(false));
        assert_eq!(graph.len(), 2);
        assert!(graph.cycle_errors().is_empty());
    }

    #[test]
    fn two_task_cycle_is_reported_for_each_entry_point() {
        let graph = DependencyGraph::build(&two_task_project(true));
        let findings = graph.cycle_errors();
        assert_eq!(findings.len(), 2);
        for (_, description) in findings {
            assert!(description.contains("dependency cycle"), "{}", description);
        }
    }

    #[test]
    fn unresolved_dependency_target_is_reported() {
        let mut project = two_task_project(false);
        project.tasks[1].depends_on = vec![dep("ghost", "")];
        let graph = DependencyGraph::build(&project);
        let findings = graph.cycle_errors();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].1.contains("'ghost'"));
        assert!(findings[0].1.contains("not present"));
    }

    #[test]
    fn depends_on_follows_transitive_chain() {
        let mut project = two_task_project(false);
        // c -> b -> a
        project.tasks.push(ProjectTask {
            name: "c".into(),
            depends_on: vec![dep("b", "")],
            ..Default::default()
        });
        project.build_variants[0].tasks.push(BuildVariantTaskUnit {
            name: "c".into(),
            ..Default::default()
        });
        let graph = DependencyGraph::build(&project);
        assert!(graph
            .depends_on(&TVPair::new("v1", "c"), &TVPair::new("v1", "a"))
            .is_ok());
        assert!(graph
            .depends_on(&TVPair::new("v1", "a"), &TVPair::new("v1", "c"))
            .is_err());
    }

    #[test]
    fn depends_on_rejects_failed_status_edges() {
        let mut project = two_task_project(false);
        project.tasks[1].depends_on[0].status = crate::model::TASK_FAILED.into();
        let graph = DependencyGraph::build(&project);
        let err = graph
            .depends_on(&TVPair::new("v1", "b"), &TVPair::new("v1", "a"))
            .unwrap_err();
        assert!(err.contains("running and succeeding"), "{}", err);
    }

    #[test]
    fn depends_on_honors_patch_optional_edges() {
        let mut project = two_task_project(false);
        project.tasks[1].depends_on[0].patch_optional = true;
        let graph = DependencyGraph::build(&project);
        // b runs on patches, so a patch-optional edge cannot witness it
        assert!(graph
            .depends_on(&TVPair::new("v1", "b"), &TVPair::new("v1", "a"))
            .is_err());
        // a source excluded from patch builds does not need the edge on patches
        project.tasks[1].patchable = Some(false);
        let graph = DependencyGraph::build(&project);
        assert!(graph
            .depends_on(&TVPair::new("v1", "b"), &TVPair::new("v1", "a"))
            .is_ok());
    }

    #[test]
    fn depends_on_rejects_mode_mismatch() {
        let mut project = two_task_project(false);
        // dependency target only runs in git-tag builds
        project.tasks[0].git_tag_only = Some(true);
        let graph = DependencyGraph::build(&project);
        let err = graph
            .depends_on(&TVPair::new("v1", "b"), &TVPair::new("v1", "a"))
            .unwrap_err();
        assert!(err.contains("for both patches and non-patches"), "{}", err);
    }
}
