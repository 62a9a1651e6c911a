//! Lazy union of source graphs.
use std::collections::HashSet;
use std::sync::Arc;

use crate::merge_tree::ClusterId;
use crate::source::{SourceGraph, SourceId, Triple};

/// The working graph of one cluster.
///
/// Holds shared handles to its member sources rather than a copy of their
/// triples; entity identifiers are shared across sources, so the union needs
/// no renaming.
#[derive(Debug, Clone)]
pub struct ClusterGraph {
    id: ClusterId,
    members: Vec<SourceId>,
    graphs: Vec<Arc<SourceGraph>>,
}

impl ClusterGraph {
    /// The singleton cluster of source `id`.
    pub fn singleton(id: SourceId, graph: Arc<SourceGraph>) -> Self {
        Self {
            id,
            members: vec![id],
            graphs: vec![graph],
        }
    }

    /// Union of `a` and `b` under the new id `id`. Members stay sorted.
    pub fn union(id: ClusterId, a: &ClusterGraph, b: &ClusterGraph) -> Self {
        let mut pairs: Vec<(SourceId, Arc<SourceGraph>)> = a
            .members
            .iter()
            .copied()
            .zip(a.graphs.iter().cloned())
            .chain(b.members.iter().copied().zip(b.graphs.iter().cloned()))
            .collect();
        pairs.sort_by_key(|(m, _)| *m);
        let (members, graphs) = pairs.into_iter().unzip();
        Self {
            id,
            members,
            graphs,
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Member source indices, ascending.
    pub fn members(&self) -> &[SourceId] {
        &self.members
    }

    /// Member graphs, in member order.
    pub fn sources(&self) -> &[Arc<SourceGraph>] {
        &self.graphs
    }

    /// All triples of all members.
    pub fn triples(&self) -> impl Iterator<Item = &Triple> + '_ {
        self.graphs.iter().flat_map(|g| g.triples.iter())
    }

    pub fn triple_count(&self) -> usize {
        self.graphs.iter().map(|g| g.len()).sum()
    }

    /// Entities of all members.
    pub fn entities(&self) -> HashSet<&str> {
        let mut out = HashSet::new();
        for graph in &self.graphs {
            out.extend(graph.entities());
        }
        out
    }

    /// Labels of the member sources joined with `+`.
    pub fn label(&self) -> String {
        self.graphs
            .iter()
            .map(|g| g.label.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ex_source;

    #[test]
    fn union_keeps_members_sorted_and_shares_graphs() {
        let a = Arc::new(ex_source("a", 2));
        let b = Arc::new(ex_source("b", 3));
        let c = Arc::new(ex_source("c", 1));
        let ca = ClusterGraph::union(
            3,
            &ClusterGraph::singleton(2, c),
            &ClusterGraph::singleton(0, Arc::clone(&a)),
        );
        let all = ClusterGraph::union(4, &ca, &ClusterGraph::singleton(1, b));
        assert_eq!(all.members(), &[0, 1, 2]);
        assert_eq!(all.id(), 4);
        assert_eq!(all.label(), "a+b+c");
        assert!(Arc::ptr_eq(&all.sources()[0], &a), "no copy of member graphs");
        assert_eq!(all.triple_count(), all.triples().count());
    }

    #[test]
    fn entities_span_all_members() {
        let a = ClusterGraph::singleton(0, Arc::new(ex_source("a", 2)));
        let b = ClusterGraph::singleton(1, Arc::new(ex_source("b", 2)));
        let ab = ClusterGraph::union(2, &a, &b);
        assert_eq!(ab.entities().len(), a.entities().len() + b.entities().len());
    }
}
