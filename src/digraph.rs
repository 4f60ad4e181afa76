//! Weighted [directed
//! graphs](https://en.wikipedia.org/wiki/Directed_graph) with caller-chosen
//! vertex labels, represented as a growable [adjacency
//! matrix](https://en.wikipedia.org/wiki/Adjacency_matrix).
//!
//! Every vertex label `V` is mapped to a small integer *handle* which doubles
//! as the row and column of that vertex in the matrix.  The only requirement
//! on `V` is `Eq + Hash + Clone`.
//!
//! Useful properties:
//! * **Encapsulation**: [`DirectedGraph::vertices`] and
//!   [`DirectedGraph::edges`] return owned snapshots.  Nothing handed out by
//!   the graph aliases its internal storage.
//! * **No dangling edges**: removing a vertex clears its whole row and column
//!   before its handle can be handed out again.
//! * **Compactness**: occupied cells are bits in a roaring bitmap, so a graph
//!   with few edges stays small irrespective of how many vertices it has.
//! * **Amortized growth**: the matrix doubles when it runs out of handles and
//!   only the occupied cells get remapped.
//!
//! ## Anti-features
//!
//! * No traversals, path finding or cycle detection.
//! * No parallel edges: there is at most one edge per ordered pair of vertices.
//! * No internal synchronization.
//!
//! # Entry points
//!
//! See either [`DirectedGraph::new`], [`DirectedGraph::with_capacity`] or
//! [`DirectedGraph::from_edges_iter`].

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::io::Write;
use std::ops::Range;

use proptest::prelude::*;
use proptest::strategy::{NewTree, ValueTree};
use proptest::test_runner::TestRunner;
use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};
use roaring::RoaringBitmap;

use crate::adjacency_matrix::WeightedAdjacencyMatrix;
use crate::error::{GraphError, Result};
use crate::Weight;

/// Number of vertices a graph built with [`DirectedGraph::new`] holds before
/// its adjacency matrix has to grow.
pub const DEFAULT_CAPACITY: u32 = 10;

/// An owned `(source, destination, weight)` triple as returned by
/// [`DirectedGraph::edges`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge<V> {
    source: V,
    destination: V,
    weight: Weight,
}

impl<V> Edge<V> {
    pub fn new(source: V, destination: V, weight: Weight) -> Self {
        Self {
            source,
            destination,
            weight,
        }
    }

    pub fn source(&self) -> &V {
        &self.source
    }

    pub fn destination(&self) -> &V {
        &self.destination
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }
}

/// A mutable, single-threaded, weighted directed graph.
#[derive(Clone)]
pub struct DirectedGraph<V> {
    handles: HashMap<V, u32>,
    labels: Vec<Option<V>>,
    free_handles: Vec<u32>,
    adjacency_matrix: WeightedAdjacencyMatrix,
}

impl<V: Debug + Eq + Hash + Clone> Debug for DirectedGraph<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vertices: Vec<&V> = self.iter_vertices().collect();
        let edges: Vec<(&V, &V, Weight)> = self.iter_edges().collect();
        f.debug_struct("DirectedGraph")
            .field("vertices", &vertices)
            .field("edges", &edges)
            .finish()
    }
}

impl<V: Eq + Hash + Clone> Default for DirectedGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Eq + Hash + Clone> DirectedGraph<V> {
    /// Constructs an empty graph with room for [`DEFAULT_CAPACITY`] vertices.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Constructs an empty graph whose adjacency matrix has room for
    /// `capacity` vertices before it needs to grow.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            handles: HashMap::new(),
            labels: Vec::new(),
            free_handles: Vec::new(),
            adjacency_matrix: WeightedAdjacencyMatrix::with_capacity(capacity),
        }
    }

    /// Constructs a graph from `(source, destination, weight)` triples,
    /// inserting endpoints as they are first seen.  Repeated pairs keep the
    /// weight of their first occurrence.
    ///
    /// Fails on the first non-positive weight.
    pub fn from_edges_iter<I: IntoIterator<Item = (V, V, Weight)>>(edges: I) -> Result<Self> {
        let mut graph = Self::new();
        for (source, destination, weight) in edges {
            if weight <= 0 {
                return Err(GraphError::InvalidWeight { weight });
            }
            graph.add_vertex(source.clone());
            graph.add_vertex(destination.clone());
            graph.insert_edge(&source, &destination, weight);
        }
        Ok(graph)
    }

    /// Number of vertices the graph holds before its adjacency matrix has to
    /// grow again.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.adjacency_matrix.capacity()
    }

    #[inline]
    pub fn vertex_size(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn edge_size(&self) -> usize {
        self.adjacency_matrix.edge_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn handle(&self, label: &V) -> Option<u32> {
        self.handles.get(label).copied()
    }

    fn label(&self, handle: u32) -> Option<&V> {
        self.labels.get(usize::try_from(handle).ok()?)?.as_ref()
    }

    fn endpoints(&self, source: &V, destination: &V) -> Option<(u32, u32)> {
        Some((self.handle(source)?, self.handle(destination)?))
    }

    fn allocate_handle(&mut self) -> u32 {
        if let Some(handle) = self.free_handles.pop() {
            cov_mark::hit!(vertex_handle_reused);
            debug_assert_eq!(self.adjacency_matrix.iter_ones_at_row(handle).count(), 0);
            debug_assert_eq!(self.adjacency_matrix.iter_ones_at_column(handle).count(), 0);
            tracing::trace!(handle, "reusing vertex handle");
            return handle;
        }
        // Handles below the matrix capacity always fit in a u32.
        let handle = self.labels.len() as u32;
        if handle >= self.capacity() {
            let new_capacity = self.capacity().saturating_mul(2).max(1);
            cov_mark::hit!(digraph_grows);
            self.adjacency_matrix.grow(new_capacity);
        }
        self.labels.push(None);
        handle
    }

    /// Returns `true` if `label` was not present and has been inserted.
    pub fn add_vertex(&mut self, label: V) -> bool {
        if self.handles.contains_key(&label) {
            return false;
        }
        let handle = self.allocate_handle();
        self.labels[handle as usize] = Some(label.clone());
        self.handles.insert(label, handle);
        true
    }

    /// Removes `label` together with every edge it is an endpoint of.
    /// Returns `false` if there was no such vertex.
    pub fn remove_vertex(&mut self, label: &V) -> bool {
        let Some(handle) = self.handles.remove(label) else {
            return false;
        };
        let incident_edges = self.adjacency_matrix.clear_row_and_column(handle);
        self.labels[handle as usize] = None;
        self.free_handles.push(handle);
        tracing::trace!(handle, incident_edges, "removed vertex");
        true
    }

    /// Adds the edge `source -> destination`.
    ///
    /// Returns `Ok(false)` if either endpoint is missing or the edge already
    /// exists, in which case its weight is left untouched.  Fails with
    /// [`GraphError::InvalidWeight`] if `weight <= 0`, whether or not the
    /// endpoints exist.
    pub fn add_edge(&mut self, source: &V, destination: &V, weight: Weight) -> Result<bool> {
        if weight <= 0 {
            tracing::debug!(weight, "rejected edge weight");
            return Err(GraphError::InvalidWeight { weight });
        }
        Ok(self.insert_edge(source, destination, weight))
    }

    /// Requires `weight > 0`.
    pub(crate) fn insert_edge(&mut self, source: &V, destination: &V, weight: Weight) -> bool {
        debug_assert!(weight > 0);
        let Some((u, v)) = self.endpoints(source, destination) else {
            return false;
        };
        if self.adjacency_matrix.contains(u, v) {
            return false;
        }
        self.adjacency_matrix.insert(u, v, weight);
        true
    }

    /// Returns `false` if either endpoint or the edge itself is missing.
    pub fn remove_edge(&mut self, source: &V, destination: &V) -> bool {
        match self.endpoints(source, destination) {
            Some((u, v)) => self.adjacency_matrix.remove(u, v).is_some(),
            None => false,
        }
    }

    pub fn contains_vertex(&self, label: &V) -> bool {
        self.handles.contains_key(label)
    }

    pub fn contains_edge(&self, source: &V, destination: &V) -> bool {
        self.endpoints(source, destination)
            .is_some_and(|(u, v)| self.adjacency_matrix.contains(u, v))
    }

    /// Fails with [`GraphError::EdgeNotFound`] unless the edge
    /// `source -> destination` exists.
    pub fn edge_weight(&self, source: &V, destination: &V) -> Result<Weight> {
        self.endpoints(source, destination)
            .and_then(|(u, v)| self.adjacency_matrix.get(u, v))
            .ok_or(GraphError::EdgeNotFound)
    }

    /// Iterates over vertices in handle order.  The order is stable as long
    /// as the graph is not mutated.
    pub fn iter_vertices(&self) -> impl Iterator<Item = &V> + '_ {
        self.labels.iter().flatten()
    }

    /// Iterates over `(source, destination, weight)` ordered by the handles of
    /// `source` and then `destination`.
    pub fn iter_edges(&self) -> impl Iterator<Item = (&V, &V, Weight)> + '_ {
        self.adjacency_matrix
            .iter_ones()
            .filter_map(move |(u, v, weight)| Some((self.label(u)?, self.label(v)?, weight)))
    }

    /// Returns a snapshot of the vertex set.
    pub fn vertices(&self) -> HashSet<V> {
        self.iter_vertices().cloned().collect()
    }

    /// Returns a snapshot of the edge set.
    pub fn edges(&self) -> HashSet<Edge<V>> {
        self.iter_edges()
            .map(|(source, destination, weight)| {
                Edge::new(source.clone(), destination.clone(), weight)
            })
            .collect()
    }

    /// Iterates over vertices `v` such that there's an edge `(label, v)`.
    /// Empty if `label` is not in the graph.
    pub fn successors(&self, label: &V) -> impl Iterator<Item = &V> + '_ {
        self.handle(label)
            .into_iter()
            .flat_map(move |u| self.adjacency_matrix.iter_ones_at_row(u))
            .filter_map(move |v| self.label(v))
    }

    /// Iterates over vertices `u` such that there's an edge `(u, label)`.
    /// Empty if `label` is not in the graph.
    pub fn predecessors(&self, label: &V) -> impl Iterator<Item = &V> + '_ {
        self.handle(label)
            .into_iter()
            .flat_map(move |v| self.adjacency_matrix.iter_ones_at_column(v))
            .filter_map(move |u| self.label(u))
    }

    pub fn out_degree(&self, label: &V) -> usize {
        self.successors(label).count()
    }

    pub fn in_degree(&self, label: &V) -> usize {
        self.predecessors(label).count()
    }

    /// Removes all vertices and edges.  The capacity is retained.
    pub fn clear(&mut self) {
        self.handles.clear();
        self.labels.clear();
        self.free_handles.clear();
        self.adjacency_matrix.clear();
    }
}

impl<V: Display + Eq + Hash + Clone> DirectedGraph<V> {
    /// Outputs the graph in the [Graphviz DOT](https://graphviz.org/) format,
    /// labelling every edge with its weight.
    pub fn to_dot<W: Write>(&self, output: &mut W) -> std::result::Result<(), std::io::Error> {
        writeln!(output, "digraph digraph_{} {{", self.vertex_size())?;

        for (handle, label) in self.labels.iter().enumerate() {
            if let Some(label) = label {
                let label = escape_dot_label(&label.to_string());
                writeln!(output, "\t_{}[label=\"{}\"];", handle, label)?;
            }
        }

        writeln!(output, "\n")?;

        for (left, right, weight) in self.adjacency_matrix.iter_ones() {
            writeln!(output, "\t_{} -> _{}[label=\"{}\"];", left, right, weight)?;
        }

        writeln!(output, "}}")?;
        Ok(())
    }
}

// Backslashes first, so the ones introduced for quotes and newlines stay
// single.
fn escape_dot_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Upper bound (inclusive) of the weights [`arb_digraph`] assigns.
pub const MAX_ARB_WEIGHT: Weight = 100;

/// A proptest strategy for graphs over vertices `0..n` where `n` is drawn from
/// `vertex_count` and every ordered pair (self loops included) is connected
/// with probability `edge_probability`.
pub fn arb_digraph(
    vertex_count: impl Into<Range<u32>>,
    edge_probability: f64,
) -> DirectedGraphStrategy {
    DirectedGraphStrategy {
        vertex_count: vertex_count.into(),
        edge_probability,
    }
}

#[derive(Debug)]
pub struct DirectedGraphStrategy {
    vertex_count: Range<u32>,
    edge_probability: f64,
}

/// Shrinks by dropping edges one at a time.  Vertices are never dropped.
#[derive(Debug)]
pub struct DirectedGraphValueTree {
    vertex_count: u32,
    edges: Vec<(u32, u32, Weight)>,
    removed: RoaringBitmap,
    next_candidate: u32,
    last_removed: Option<u32>,
}

impl Strategy for DirectedGraphStrategy {
    type Tree = DirectedGraphValueTree;

    type Value = DirectedGraph<u32>;

    fn new_tree(&self, runner: &mut TestRunner) -> NewTree<Self> {
        // Copied out of self.vertex_count.assert_nonempty(), because that's private to proptest
        if self.vertex_count.is_empty() {
            panic!(
                "Invalid use of empty size range. (hint: did you \
                 accidentally write {}..{} where you meant {}..={} \
                 somewhere?)",
                self.vertex_count.start,
                self.vertex_count.end,
                self.vertex_count.start,
                self.vertex_count.end
            );
        }
        if !(0.0..=1.0).contains(&self.edge_probability) {
            panic!(
                "Invalid propability set for generating edges. \
                 Needs to be a number between 0 and 1, but got {}",
                self.edge_probability
            );
        }
        // Seeded from the runner so that failures stay reproducible.
        let mut rng = StdRng::seed_from_u64(runner.rng().next_u64());
        let vertex_count =
            Uniform::new(self.vertex_count.start, self.vertex_count.end).sample(&mut rng);
        let weights = Uniform::new_inclusive(1, MAX_ARB_WEIGHT);
        let mut edges = Vec::new();
        for u in 0..vertex_count {
            for v in 0..vertex_count {
                if rng.gen_bool(self.edge_probability) {
                    edges.push((u, v, weights.sample(&mut rng)));
                }
            }
        }

        Ok(DirectedGraphValueTree {
            vertex_count,
            edges,
            removed: RoaringBitmap::new(),
            next_candidate: 0,
            last_removed: None,
        })
    }
}

impl ValueTree for DirectedGraphValueTree {
    type Value = DirectedGraph<u32>;

    fn current(&self) -> Self::Value {
        let mut graph = DirectedGraph::with_capacity(self.vertex_count);
        for vertex in 0..self.vertex_count {
            graph.add_vertex(vertex);
        }
        for (position, (u, v, weight)) in (0u32..).zip(&self.edges) {
            if !self.removed.contains(position) {
                graph.insert_edge(u, v, *weight);
            }
        }
        graph
    }

    fn simplify(&mut self) -> bool {
        if self.next_candidate as usize >= self.edges.len() {
            return false;
        }
        self.removed.insert(self.next_candidate);
        self.last_removed = Some(self.next_candidate);
        self.next_candidate += 1;
        true
    }

    fn complicate(&mut self) -> bool {
        match self.last_removed.take() {
            Some(position) => {
                self.removed.remove(position);
                true
            }
            None => false,
        }
    }
}
