//! Contributor networks built from posts.
//!
//! * co-contributor: undirected, one edge per pair of contributors that posted in the same
//!   topic, weighted by the number of shared topics;
//! * commenter: directed, commenter -> topic initiator (author of the earliest post),
//!   weighted by the number of comments.
//!
//! Every contributor with at least one post in the input is a node, isolated or not.

use crate::community::PostRow;
use crate::value::Key;
use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

const EIGENVECTOR_MAX_ITER: usize = 100;
const EIGENVECTOR_TOL: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphKind {
    CoContributor,
    Commenter,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GraphKind::CoContributor => "co_contributor",
            GraphKind::Commenter => "commenter",
        })
    }
}

#[derive(Debug)]
enum Inner {
    Undirected(UnGraph<Key, u32>),
    Directed(DiGraph<Key, u32>),
}

/// Contributor network with a `Key -> NodeIndex` mapping.
#[derive(Debug)]
pub struct ContributorGraph {
    inner: Inner,
    node_to_index: AHashMap<Key, NodeIndex>,
}

impl ContributorGraph {
    pub fn build(kind: GraphKind, posts: &[PostRow]) -> Self {
        match kind {
            GraphKind::CoContributor => Self::co_contributor(posts),
            GraphKind::Commenter => Self::commenter(posts),
        }
    }

    fn co_contributor(posts: &[PostRow]) -> Self {
        let mut graph = UnGraph::<Key, u32>::with_capacity(posts.len(), posts.len());
        let mut node_to_index: AHashMap<Key, NodeIndex> = AHashMap::new();
        let mut by_topic: BTreeMap<&Key, Vec<NodeIndex>> = BTreeMap::new();
        for p in posts {
            let idx = *node_to_index
                .entry(p.contributor.clone())
                .or_insert_with(|| graph.add_node(p.contributor.clone()));
            let authors = by_topic.entry(&p.topic).or_default();
            if !authors.contains(&idx) {
                authors.push(idx);
            }
        }
        for authors in by_topic.values() {
            for (i, a) in authors.iter().enumerate() {
                for b in &authors[i + 1..] {
                    match graph.find_edge(*a, *b) {
                        Some(e) => graph[e] += 1,
                        None => { graph.add_edge(*a, *b, 1); }
                    }
                }
            }
        }
        Self { inner: Inner::Undirected(graph), node_to_index }
    }

    fn commenter(posts: &[PostRow]) -> Self {
        let mut graph = DiGraph::<Key, u32>::with_capacity(posts.len(), posts.len());
        let mut node_to_index: AHashMap<Key, NodeIndex> = AHashMap::new();
        let mut initiators: AHashMap<&Key, (&PostRow, NodeIndex)> = AHashMap::new();
        for p in posts {
            let idx = *node_to_index
                .entry(p.contributor.clone())
                .or_insert_with(|| graph.add_node(p.contributor.clone()));
            let slot = initiators.entry(&p.topic).or_insert((p, idx));
            if p.date < slot.0.date {
                *slot = (p, idx);
            }
        }
        for p in posts {
            let Some((first, target)) = initiators.get(&p.topic) else { continue };
            if std::ptr::eq(*first, p) { continue; }
            let Some(&source) = node_to_index.get(&p.contributor) else { continue };
            if source == *target { continue; }
            match graph.find_edge(source, *target) {
                Some(e) => graph[e] += 1,
                None => { graph.add_edge(source, *target, 1); }
            }
        }
        Self { inner: Inner::Directed(graph), node_to_index }
    }

    pub fn node_count(&self) -> usize {
        match &self.inner {
            Inner::Undirected(g) => g.node_count(),
            Inner::Directed(g) => g.node_count(),
        }
    }

    pub fn edge_count(&self) -> usize {
        match &self.inner {
            Inner::Undirected(g) => g.edge_count(),
            Inner::Directed(g) => g.edge_count(),
        }
    }

    pub fn is_directed(&self) -> bool { matches!(self.inner, Inner::Directed(_)) }
    pub fn contains(&self, node: &Key) -> bool { self.node_to_index.contains_key(node) }

    /// Weight of the edge between two contributors (directed graphs: `a -> b`).
    pub fn weight(&self, a: &Key, b: &Key) -> Option<u32> {
        let (ia, ib) = (*self.node_to_index.get(a)?, *self.node_to_index.get(b)?);
        match &self.inner {
            Inner::Undirected(g) => g.find_edge(ia, ib).map(|e| g[e]),
            Inner::Directed(g) => g.find_edge(ia, ib).map(|e| g[e]),
        }
    }

    /// Number of incident edges (in + out for directed graphs), unweighted.
    pub fn degree(&self, node: &Key) -> Option<usize> {
        let idx = *self.node_to_index.get(node)?;
        Some(match &self.inner {
            Inner::Undirected(g) => g.edges(idx).count(),
            Inner::Directed(g) => {
                g.edges_directed(idx, Direction::Incoming).count() + g.edges_directed(idx, Direction::Outgoing).count()
            }
        })
    }

    fn directed_degree(&self, node: &Key, dir: Direction) -> Option<usize> {
        let idx = *self.node_to_index.get(node)?;
        Some(match &self.inner {
            Inner::Undirected(g) => g.edges(idx).count(),
            Inner::Directed(g) => g.edges_directed(idx, dir).count(),
        })
    }

    /// All nodes with their degree, sorted by key.
    pub fn degrees(&self) -> Vec<(Key, usize)> {
        self.sorted_nodes().into_iter().filter_map(|k| self.degree(&k).map(|d| (k, d))).collect()
    }

    /// Degree divided by `n - 1`; every node of a single-node graph gets 1.
    pub fn degree_centrality(&self) -> Vec<(Key, f64)> {
        self.normalized(|k| self.degree(k))
    }

    /// Directed graphs only use incoming edges; undirected graphs fall back to degree.
    pub fn in_degree_centrality(&self) -> Vec<(Key, f64)> {
        self.normalized(|k| self.directed_degree(k, Direction::Incoming))
    }

    pub fn out_degree_centrality(&self) -> Vec<(Key, f64)> {
        self.normalized(|k| self.directed_degree(k, Direction::Outgoing))
    }

    fn normalized(&self, deg: impl Fn(&Key) -> Option<usize>) -> Vec<(Key, f64)> {
        let n = self.node_count();
        if n <= 1 {
            return self.sorted_nodes().into_iter().map(|k| (k, 1.0)).collect();
        }
        let scale = 1.0 / (n as f64 - 1.0);
        self.sorted_nodes()
            .into_iter()
            .filter_map(|k| deg(&k).map(|d| (k, d as f64 * scale)))
            .collect()
    }

    /// Brandes betweenness over unweighted shortest paths, scaled by `1 / ((n - 1)(n - 2))`
    /// when there are more than two nodes.
    pub fn betweenness_centrality(&self) -> Vec<(Key, f64)> {
        let (keys, adj) = self.adjacency();
        let n = keys.len();
        let mut betweenness = vec![0.0; n];
        for s in 0..n {
            let mut stack = Vec::with_capacity(n);
            let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0f64; n];
            let mut dist = vec![-1i64; n];
            sigma[s] = 1.0;
            dist[s] = 0;
            let mut queue = VecDeque::from([s]);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in &adj[v] {
                    if dist[w] < 0 {
                        dist[w] = dist[v] + 1;
                        queue.push_back(w);
                    }
                    if dist[w] == dist[v] + 1 {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                }
            }
            let mut delta = vec![0.0f64; n];
            while let Some(w) = stack.pop() {
                for &v in &preds[w] {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
                if w != s {
                    betweenness[w] += delta[w];
                }
            }
        }
        // undirected paths are counted from both ends, which the shared scale absorbs
        let scale = if n > 2 { 1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0)) } else { 1.0 };
        keys.into_iter().zip(betweenness).map(|(k, b)| (k, b * scale)).collect()
    }

    /// Unweighted eigenvector centrality by shifted power iteration; directed graphs score
    /// nodes by their incoming edges. `None` when the iteration does not converge.
    pub fn eigenvector_centrality(&self) -> Option<Vec<(Key, f64)>> {
        let (keys, adj) = self.adjacency();
        let n = keys.len();
        if n == 0 {
            return Some(Vec::new());
        }
        let mut x = vec![1.0 / n as f64; n];
        for _ in 0..EIGENVECTOR_MAX_ITER {
            let last = x.clone();
            for (v, targets) in adj.iter().enumerate() {
                for &w in targets {
                    x[w] += last[v];
                }
            }
            let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
            let norm = if norm == 0.0 { 1.0 } else { norm };
            x.iter_mut().for_each(|v| *v /= norm);
            let change: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
            if change < n as f64 * EIGENVECTOR_TOL {
                return Some(keys.into_iter().zip(x).collect());
            }
        }
        None
    }

    /// Sorted node keys and, per node, the positions of its neighbours (successors when directed).
    fn adjacency(&self) -> (Vec<Key>, Vec<Vec<usize>>) {
        let keys = self.sorted_nodes();
        let position: AHashMap<NodeIndex, usize> =
            keys.iter().enumerate().filter_map(|(i, k)| self.node_to_index.get(k).map(|idx| (*idx, i))).collect();
        let adj = keys
            .iter()
            .map(|k| {
                let Some(&idx) = self.node_to_index.get(k) else { return Vec::new() };
                let neighbors: Vec<NodeIndex> = match &self.inner {
                    Inner::Undirected(g) => g.neighbors(idx).collect(),
                    Inner::Directed(g) => g.neighbors_directed(idx, Direction::Outgoing).collect(),
                };
                neighbors.iter().filter_map(|n| position.get(n).copied()).collect()
            })
            .collect();
        (keys, adj)
    }

    fn sorted_nodes(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.node_to_index.keys().cloned().collect();
        keys.sort();
        keys
    }
}
