//! Dependency graph with transitive dirty propagation.
//!
//! Tracks one node per artifact identifier with a per-node dirty flag,
//! import edges between artifacts, and a graph-wide ambient-types flag.
//! Staleness propagates through imports: an artifact is transitively
//! dirty when any artifact reachable through its imports has been
//! recomputed this session.

use std::collections::{HashMap, HashSet, VecDeque};

/// Directed dependency graph over artifact identifiers.
///
/// Nodes are created implicitly on first edge registration or
/// dirty-marking, with the dirty flag defaulting to `false`. Graph state
/// is additive for the owner's lifetime; nothing here resets it.
#[derive(Debug, Default)]
pub struct DepGraph {
    /// Per-node own-dirty flag.
    dirty: HashMap<String, bool>,

    /// Import edge sets: importer id -> the ids it imports.
    ///
    /// A set, not a multiset: re-registering an edge collapses.
    imports: HashMap<String, HashSet<String>>,

    /// Set when the ambient declaration set changed this session; makes
    /// every known node transitively dirty.
    ambient_dirty: bool,
}

impl DepGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the edge "a change to `importee` can dirty `importer`".
    ///
    /// Creates either node if absent, clean by default.
    pub fn set_dependency(&mut self, importee: &str, importer: &str) {
        self.dirty.entry(importee.to_string()).or_insert(false);
        self.dirty.entry(importer.to_string()).or_insert(false);
        self.imports
            .entry(importer.to_string())
            .or_default()
            .insert(importee.to_string());
    }

    /// Marks a node's own flag dirty, creating the node if absent.
    ///
    /// Called exactly when a fresh (non-cache-hit) computation occurs.
    pub fn mark_dirty(&mut self, id: &str) {
        self.dirty.insert(id.to_string(), true);
    }

    /// Sets the ambient-types flag for the remainder of the session.
    pub fn set_ambient_dirty(&mut self) {
        self.ambient_dirty = true;
    }

    /// Returns whether the ambient-types flag has been set.
    pub fn ambient_dirty(&self) -> bool {
        self.ambient_dirty
    }

    /// Reports whether `id`'s cached results are known-stale.
    ///
    /// A never-before-seen id is assumed clean. A node's own flag wins
    /// regardless of `transitive`. Non-transitive queries stop there
    /// (correctness depends only on the artifact's own content).
    /// Transitive queries are additionally dirty when the ambient flag is
    /// set, or when any node reachable through the import edges has its
    /// own flag set.
    pub fn is_dirty(&self, id: &str, transitive: bool) -> bool {
        let Some(&own) = self.dirty.get(id) else {
            return false;
        };
        if own {
            return true;
        }
        if !transitive {
            return false;
        }
        if self.ambient_dirty {
            return true;
        }

        // BFS over imports from `id`.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(id);
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            if let Some(importees) = self.imports.get(current) {
                for next in importees {
                    if !seen.insert(next) {
                        continue;
                    }
                    if self.dirty.get(next.as_str()).copied().unwrap_or(false) {
                        return true;
                    }
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Visits every node exactly once, dependencies before dependents.
    ///
    /// Kahn's algorithm over the import edges. If the graph contains a
    /// cycle, topological order is undefined: the condition is logged and
    /// the remaining nodes are visited in arbitrary order. Never fails or
    /// loops.
    pub fn walk(&self, mut visit: impl FnMut(&str)) {
        // In-degree in the importee-before-importer orientation is the
        // number of ids a node imports.
        let mut indegree: HashMap<&str, usize> = HashMap::with_capacity(self.dirty.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for id in self.dirty.keys() {
            indegree.insert(id, 0);
        }
        for (importer, importees) in &self.imports {
            *indegree.entry(importer).or_insert(0) += importees.len();
            for importee in importees {
                dependents.entry(importee).or_default().push(importer);
            }
        }

        // Sorted roots for deterministic ordering in tests.
        let mut roots: Vec<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        roots.sort_unstable();

        let mut queue: VecDeque<&str> = roots.into();
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            visit(id);
            if let Some(importers) = dependents.get(id) {
                for &importer in importers {
                    let deg = indegree.get_mut(importer).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(importer);
                    }
                }
            }
        }

        if visited.len() < self.dirty.len() {
            tracing::info!(
                "dependency graph contains a cycle; visiting {} remaining nodes unordered",
                self.dirty.len() - visited.len()
            );
            let mut remaining: Vec<&str> = self
                .dirty
                .keys()
                .map(String::as_str)
                .filter(|id| !visited.contains(id))
                .collect();
            remaining.sort_unstable();
            for id in remaining {
                visit(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_node_reports_clean() {
        let graph = DepGraph::new();
        assert!(!graph.is_dirty("never-seen", false));
        assert!(!graph.is_dirty("never-seen", true));
    }

    #[test]
    fn unknown_node_clean_even_when_ambient_dirty() {
        let mut graph = DepGraph::new();
        graph.set_ambient_dirty();
        assert!(!graph.is_dirty("never-seen", true));
    }

    #[test]
    fn own_flag_wins_regardless_of_mode() {
        let mut graph = DepGraph::new();
        graph.mark_dirty("a");
        assert!(graph.is_dirty("a", false));
        assert!(graph.is_dirty("a", true));
    }

    #[test]
    fn transitive_dirtiness_through_one_edge() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.mark_dirty("a");

        assert!(graph.is_dirty("b", true));
        assert!(!graph.is_dirty("b", false));
    }

    #[test]
    fn transitive_dirtiness_through_a_chain() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("b", "c");
        graph.mark_dirty("a");

        assert!(graph.is_dirty("c", true));
        assert!(!graph.is_dirty("c", false));
    }

    #[test]
    fn dirt_does_not_flow_downstream() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.mark_dirty("b");

        // b imports a; dirtying b says nothing about a.
        assert!(!graph.is_dirty("a", true));
    }

    #[test]
    fn ambient_flag_dirties_known_nodes_transitively() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_ambient_dirty();

        assert!(graph.is_dirty("a", true));
        assert!(graph.is_dirty("b", true));
        assert!(!graph.is_dirty("a", false), "non-transitive ignores ambient");
    }

    #[test]
    fn cyclic_reachability_terminates() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("b", "a");
        graph.mark_dirty("a");

        assert!(graph.is_dirty("b", true));
        assert!(!graph.is_dirty("b", false));
    }

    #[test]
    fn walk_visits_dependencies_first() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("b", "c");
        graph.set_dependency("a", "c");

        let mut order = Vec::new();
        graph.walk(|id| order.push(id.to_string()));

        assert_eq!(order.len(), 3);
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn walk_on_cycle_visits_each_node_once() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("b", "a");

        let mut order = Vec::new();
        graph.walk(|id| order.push(id.to_string()));

        order.sort();
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn walk_mixed_cycle_and_dag() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("c", "d");
        graph.set_dependency("d", "c");

        let mut order = Vec::new();
        graph.walk(|id| order.push(id.to_string()));

        assert_eq!(order.len(), 4, "every node exactly once");
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("a") < pos("b"));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = DepGraph::new();
        graph.set_dependency("a", "b");
        graph.set_dependency("a", "b");

        let mut count = 0;
        graph.walk(|_| count += 1);
        assert_eq!(count, 2);

        graph.mark_dirty("a");
        assert!(graph.is_dirty("b", true));
    }
}
