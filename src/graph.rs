//! Subsumption graph: the explored state space, indexed by an arena of
//! nodes, with a hash-bucketed index keyed on each node's discrete
//! signature for fast cover-candidate lookup.
//!
//! Nodes and edges are referenced by `(owner-index, other-index)` pairs into
//! flat `Vec`s rather than shared pointers, per the design note in
//! SPEC_FULL.md §9: this makes compaction (dropping GC'd nodes and re-
//! packing) a matter of rewriting one index table, not chasing pointers.

use rustc_hash::FxHashMap;

use crate::ts::State;

/// Index of a node in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub usize);

/// Whether an edge corresponds to an actual fired transition, or a synthetic
/// "covered by" link recorded when a node was subsumed instead of expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Actual,
    Abstract,
}

/// One edge of the subsumption graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src: NodeIdx,
    pub tgt: NodeIdx,
    pub kind: EdgeKind,
}

/// A node: its full state plus bookkeeping for covering-reachability.
pub struct Node {
    pub state: State,
    /// `false` once this node has been subsumed by another and is no longer
    /// a candidate for expansion (but is kept for output unless compacted).
    pub active: bool,
    /// POR memory carried alongside the state (see `src/por.rs`).
    pub por_memory: crate::por::PorMemory,
}

/// The discrete signature used to bucket nodes for cover-candidate lookup:
/// hashing only `(vloc, intvars)` groups together nodes whose zones are the
/// only thing that could differ, which is exactly the set a cover check
/// needs to scan.
pub type BucketKey = (Vec<usize>, Vec<i64>, Option<u64>);

/// The subsumption graph.
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Maps a bucket key to the node indices sharing it.
    buckets: FxHashMap<BucketKey, Vec<NodeIdx>>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph { nodes: Vec::new(), edges: Vec::new(), buckets: FxHashMap::default() }
    }

    /// Number of nodes ever allocated (including later-subsumed ones still
    /// present in the arena).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn bucket_key(state: &State, memory: &crate::por::PorMemory, fold_memory: bool) -> BucketKey {
        let memory_hash = if fold_memory {
            use std::hash::{Hash, Hasher};
            let mut h = rustc_hash::FxHasher::default();
            memory.visited_processes.ones().for_each(|b| b.hash(&mut h));
            Some(h.finish())
        } else {
            None
        };
        (state.vloc.clone(), state.intvars.clone(), memory_hash)
    }

    /// Inserts a new node unconditionally and returns its index. Callers
    /// wanting subsumption-aware insertion should call
    /// [`Graph::find_cover`] first.
    pub fn insert_node(&mut self, state: State, por_memory: crate::por::PorMemory, fold_memory: bool) -> NodeIdx {
        let key = Self::bucket_key(&state, &por_memory, fold_memory);
        let idx = NodeIdx(self.nodes.len());
        self.nodes.push(Node { state, active: true, por_memory });
        self.buckets.entry(key).or_default().push(idx);
        idx
    }

    /// Looks up candidate covering nodes sharing `state`'s discrete
    /// signature (and POR memory, if `fold_memory`).
    pub fn candidates(&self, state: &State, memory: &crate::por::PorMemory, fold_memory: bool) -> &[NodeIdx] {
        let key = Self::bucket_key(state, memory, fold_memory);
        self.buckets.get(&key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Read access to a node.
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.0]
    }

    /// Marks a node inactive (subsumed), without removing it from the arena.
    pub fn deactivate(&mut self, idx: NodeIdx) {
        self.nodes[idx.0].active = false;
    }

    /// Records an edge between two existing nodes.
    pub fn add_edge(&mut self, src: NodeIdx, tgt: NodeIdx, kind: EdgeKind) {
        self.edges.push(Edge { src, tgt, kind });
    }

    /// All edges, for output (`src/sink.rs`).
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// All nodes, for output.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIdx(i), n))
    }

    /// Compacts the arena, dropping inactive nodes and any edge touching
    /// one, and returns the old-to-new index mapping (`None` for dropped
    /// nodes) so callers holding external `NodeIdx` values can re-key.
    pub fn compact(&mut self) -> Vec<Option<NodeIdx>> {
        let mut mapping = vec![None; self.nodes.len()];
        let mut new_nodes = Vec::new();
        for (old_idx, node) in self.nodes.drain(..).enumerate() {
            if node.active {
                mapping[old_idx] = Some(NodeIdx(new_nodes.len()));
                new_nodes.push(node);
            }
        }
        self.nodes = new_nodes;
        self.edges.retain_mut(|e| {
            match (mapping[e.src.0], mapping[e.tgt.0]) {
                (Some(s), Some(t)) => {
                    e.src = s;
                    e.tgt = t;
                    true
                }
                _ => false,
            }
        });
        self.buckets.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            let key = Self::bucket_key(&node.state, &node.por_memory, false);
            self.buckets.entry(key).or_default().push(NodeIdx(i));
        }
        mapping
    }
}

impl Default for Graph {
    fn default() -> Graph {
        Graph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;

    fn dummy_state(vloc: Vec<usize>) -> State {
        State { vloc, intvars: vec![], zone: Zone::zero(1) }
    }

    #[test]
    fn insert_and_lookup_candidates_by_bucket() {
        let mut g = Graph::new();
        let s0 = dummy_state(vec![0]);
        let idx = g.insert_node(s0.clone(), Default::default(), false);
        let candidates = g.candidates(&s0, &Default::default(), false);
        assert_eq!(candidates, &[idx]);
    }

    #[test]
    fn compact_drops_inactive_nodes_and_rekeys_edges() {
        let mut g = Graph::new();
        let a = g.insert_node(dummy_state(vec![0]), Default::default(), false);
        let b = g.insert_node(dummy_state(vec![1]), Default::default(), false);
        g.add_edge(a, b, EdgeKind::Actual);
        g.deactivate(a);
        let mapping = g.compact();
        assert_eq!(mapping[a.0], None);
        assert!(mapping[b.0].is_some());
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
    }
}
