// In-memory road network: an arena of nodes keyed by their map id, each
// holding its own adjacency list. Mutable while the loader populates it;
// after `cleanup` it is queried read-only and is safe to share across
// concurrent routing requests.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use log::info;

/// A road intersection or dead end.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub name: Option<String>,
    adj: Vec<Edge>,
}

/// Directed half of a road segment: target node id plus precomputed length.
/// `connect` always creates these in mirrored pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub to: i64,
    pub length: f64,
}

#[derive(Debug, Default)]
pub struct StreetGraph {
    nodes: HashMap<i64, Node>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Last write wins on a duplicate id; deduplication is the
    /// loader's contract.
    pub fn add_node(&mut self, id: i64, lon: f64, lat: f64) {
        self.nodes.insert(
            id,
            Node {
                id,
                lon,
                lat,
                name: None,
                adj: Vec::new(),
            },
        );
    }

    /// Attach a display name to an existing node.
    pub fn set_name(&mut self, id: i64, name: &str) {
        self.node_mut(id).name = Some(name.to_string());
    }

    /// Connect two nodes with a road segment. Stores one directed edge in
    /// each adjacency list, both carrying the same Euclidean length. No
    /// self-loop or duplicate guard: a segment loaded twice yields parallel
    /// edges of equal weight, which shortest paths are indifferent to.
    pub fn connect(&mut self, a: i64, b: i64) {
        let length = self.distance(a, b);
        self.node_mut(a).adj.push(Edge { to: b, length });
        self.node_mut(b).adj.push(Edge { to: a, length });
    }

    /// Drop every node with no edges. Isolated nodes can never appear on a
    /// route but would still win nearest-vertex lookups, so this must run
    /// after loading and before the first query. Idempotent.
    pub fn cleanup(&mut self) {
        let before = self.nodes.len();
        self.nodes.retain(|_, node| !node.adj.is_empty());
        let dropped = before - self.nodes.len();
        if dropped > 0 {
            info!(
                "Dropped {} isolated nodes, {} routable nodes remain",
                dropped,
                self.nodes.len()
            );
        }
    }

    /// All surviving node ids, in no particular order.
    pub fn vertices(&self) -> impl Iterator<Item = i64> + '_ {
        self.nodes.keys().copied()
    }

    /// Distinct neighbors one edge away from `id`.
    pub fn adjacent(&self, id: i64) -> HashSet<i64> {
        self.node(id).adj.iter().map(|e| e.to).collect()
    }

    /// Raw adjacency of `id`, parallel edges included.
    pub fn edges(&self, id: i64) -> &[Edge] {
        &self.node(id).adj
    }

    /// Euclidean distance between two nodes in degree space, not
    /// great-circle distance. Edge weights and the A* heuristic share this
    /// exact metric.
    pub fn distance(&self, a: i64, b: i64) -> f64 {
        let (na, nb) = (self.node(a), self.node(b));
        euclidean(na.lon, na.lat, nb.lon, nb.lat)
    }

    /// The node closest to the query point, by exhaustive linear scan.
    /// O(V) per call. `None` only when the graph is empty.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<i64> {
        let mut best: Option<(i64, f64)> = None;
        for node in self.nodes.values() {
            let d = euclidean(lon, lat, node.lon, node.lat);
            match best {
                Some((_, best_d)) if best_d <= d => {}
                _ => best = Some((node.id, d)),
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn lon(&self, id: i64) -> f64 {
        self.node(id).lon
    }

    pub fn lat(&self, id: i64) -> f64 {
        self.node(id).lat
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Normalized form of a display name for matching: lowercase, everything
    /// but letters and spaces stripped.
    pub fn clean_name(raw: &str) -> String {
        raw.chars()
            .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    // Passing an id that is not in the graph is a construction bug, not bad
    // user input. Index panics are the contract.
    fn node(&self, id: i64) -> &Node {
        &self.nodes[&id]
    }

    fn node_mut(&mut self, id: i64) -> &mut Node {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown node id {}", id))
    }
}

pub(crate) fn euclidean(lon_a: f64, lat_a: f64, lon_b: f64, lat_b: f64) -> f64 {
    ((lon_a - lon_b).powi(2) + (lat_a - lat_b).powi(2)).sqrt()
}
