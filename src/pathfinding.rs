// A* shortest path over a finalized StreetGraph. All per-query state
// (g-scores, predecessors, finalized set, frontier) lives in this call
// frame, so any number of searches may run concurrently over one graph.

use crate::street_graph::StreetGraph;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use log::debug;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: OrderedFloat<f64>,
    node: i64,
}

// The priority queue depends on `Ord`.
// Explicitly implement the trait so the queue becomes a min-heap instead of
// a max-heap. Ties on cost fall back to the node id, which keeps equal-cost
// searches deterministic and keeps `PartialEq` and `Ord` consistent.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest path between two geographic points: each endpoint resolves to
/// its nearest graph node first. `None` when the graph is empty or the
/// endpoints sit in disconnected components.
pub fn route(
    graph: &StreetGraph,
    start_lon: f64,
    start_lat: f64,
    dest_lon: f64,
    dest_lat: f64,
) -> Option<Vec<i64>> {
    let start = graph.nearest(start_lon, start_lat)?;
    let dest = graph.nearest(dest_lon, dest_lat)?;
    debug!("Routing from node {} to node {}", start, dest);
    shortest_path(graph, start, dest)
}

/// A* between two existing node ids. Heuristic is the straight-line distance
/// to the destination, which never overestimates the remaining cost because
/// edge weights are exact straight-line lengths.
pub fn shortest_path(graph: &StreetGraph, start: i64, dest: i64) -> Option<Vec<i64>> {
    shortest_path_bounded(graph, start, dest, f64::INFINITY)
}

/// A* with a cost ceiling: nodes whose accumulated cost exceeds `max_cost`
/// are never expanded, and a route longer than `max_cost` comes back as
/// `None`.
pub fn shortest_path_bounded(
    graph: &StreetGraph,
    start: i64,
    dest: i64,
    max_cost: f64,
) -> Option<Vec<i64>> {
    if start == dest {
        return Some(vec![start]);
    }

    let mut g_score: HashMap<i64, f64> = HashMap::new();
    let mut came_from: HashMap<i64, i64> = HashMap::new();
    let mut finalized: HashSet<i64> = HashSet::new();
    let mut heap = BinaryHeap::new();

    g_score.insert(start, 0.0);
    heap.push(State {
        cost: OrderedFloat(graph.distance(start, dest)),
        node: start,
    });

    while let Some(State { cost: _, node: u }) = heap.pop() {
        if u == dest {
            // The first pop of the destination carries the optimal cost.
            if g_score[&u] > max_cost {
                return None;
            }
            return Some(reconstruct(&came_from, start, dest));
        }

        // Stale entries are never removed from the heap; a node that was
        // already expanded just gets skipped here.
        if !finalized.insert(u) {
            continue;
        }

        let g_u = g_score[&u];
        if g_u > max_cost {
            continue;
        }
        for edge in graph.edges(u) {
            let v = edge.to;
            if finalized.contains(&v) {
                continue;
            }

            let tentative = g_u + edge.length;
            if let Some(&g_v) = g_score.get(&v) {
                if tentative >= g_v {
                    continue;
                }
            }

            g_score.insert(v, tentative);
            came_from.insert(v, u);
            heap.push(State {
                cost: OrderedFloat(tentative + graph.distance(v, dest)),
                node: v,
            });
        }
    }

    // Frontier exhausted: no route, not a partial path.
    None
}

/// Total length of a path, summed edge by edge.
pub fn path_cost(graph: &StreetGraph, path: &[i64]) -> f64 {
    path.windows(2).map(|pair| graph.distance(pair[0], pair[1])).sum()
}

fn reconstruct(came_from: &HashMap<i64, i64>, start: i64, dest: i64) -> Vec<i64> {
    let mut path = vec![dest];
    let mut current = dest;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}
