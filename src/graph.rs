//! Density-sharing graph and its approximate minimum vertex cover.
//!
//! Ported from `Graph.hpp`: vertices are density indices, edges come
//! from requested integrals' two canonical endpoints. `compute_vertex_cover`
//! reproduces the degree-priority heuristic exactly (self-loops forced
//! in, degree-1 pendants replaced by their neighbour, otherwise the
//! max-degree vertex is taken instead of the min-degree one), since §8
//! pins down its exact output on five small graphs.

use std::collections::{BTreeSet, HashSet};

pub type VertexIndex = usize;
pub type Edge = (VertexIndex, VertexIndex);

/// An undirected graph over `0..vertex_count`, built by adding one edge
/// per requested integral (self-loops allowed).
pub struct Graph {
    vertex_count: usize,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new(vertex_count: usize) -> Self {
        Graph {
            vertex_count,
            edges: Vec::new(),
        }
    }

    pub fn add_edge(&mut self, a: VertexIndex, b: VertexIndex) {
        self.edges.push((a, b));
    }

    /// Approximate minimum vertex cover: a set `C` such that every edge
    /// has at least one endpoint in `C`.
    ///
    /// Algorithm (ported verbatim from `Graph::computeVertexCover`):
    /// 1. Every self-loop endpoint enters the cover immediately.
    /// 2. Build an adjacency list over the remaining (non-self-loop,
    ///    non-covered) edges.
    /// 3. Repeatedly take the minimum-degree vertex; if its degree is
    ///    exactly 1, cover its single neighbour instead (covering the
    ///    neighbour removes at least as many edges); otherwise cover
    ///    the maximum-degree vertex instead of the minimum-degree one.
    ///    Update neighbours' degrees and repeat until no vertices with
    ///    edges remain.
    pub fn compute_vertex_cover(&self) -> HashSet<VertexIndex> {
        let mut cover: HashSet<VertexIndex> = HashSet::new();
        let mut neighbors: Vec<BTreeSet<VertexIndex>> = vec![BTreeSet::new(); self.vertex_count];

        for &(a, b) in &self.edges {
            if a == b {
                cover.insert(a);
            }
        }
        for &(a, b) in &self.edges {
            if a == b {
                continue;
            }
            if cover.contains(&a) || cover.contains(&b) {
                continue;
            }
            neighbors[a].insert(b);
            neighbors[b].insert(a);
        }

        // Priority ordering: (degree ascending, index ascending).
        let mut queue: BTreeSet<(usize, VertexIndex)> = BTreeSet::new();
        for v in 0..self.vertex_count {
            if !neighbors[v].is_empty() {
                queue.insert((neighbors[v].len(), v));
            }
        }

        let mut requeue =
            |queue: &mut BTreeSet<(usize, VertexIndex)>, neighbors: &[BTreeSet<VertexIndex>], v: VertexIndex, old_degree: usize| {
                queue.remove(&(old_degree, v));
                if !neighbors[v].is_empty() {
                    queue.insert((neighbors[v].len(), v));
                }
            };

        while let Some(&(min_degree, min_vertex)) = queue.iter().next() {
            let chosen = if min_degree == 1 {
                *neighbors[min_vertex].iter().next().unwrap()
            } else {
                queue.iter().next_back().unwrap().1
            };

            let chosen_degree = neighbors[chosen].len();
            queue.remove(&(chosen_degree, chosen));
            // If `chosen` isn't `min_vertex` (the pendant case, or the
            // max-degree case coinciding with a different vertex), make
            // sure any stale entry for it is gone; BTreeSet::remove is a
            // no-op if absent.
            cover.insert(chosen);

            let chosen_neighbors: Vec<VertexIndex> = neighbors[chosen].iter().copied().collect();
            for w in chosen_neighbors {
                let old_degree = neighbors[w].len();
                neighbors[w].remove(&chosen);
                neighbors[chosen].remove(&w);
                requeue(&mut queue, &neighbors, w, old_degree);
            }
            neighbors[chosen].clear();
        }

        cover
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_clique_needs_three() {
        let mut g = Graph::new(4);
        for a in 0..4 {
            for b in (a + 1)..4 {
                g.add_edge(a, b);
            }
        }
        assert_eq!(g.compute_vertex_cover().len(), 3);
    }

    #[test]
    fn edgeless_graph_needs_none() {
        let g = Graph::new(3);
        assert!(g.compute_vertex_cover().is_empty());
    }

    #[test]
    fn three_self_loops_cover_all() {
        let mut g = Graph::new(3);
        g.add_edge(0, 0);
        g.add_edge(1, 1);
        g.add_edge(2, 2);
        let cover = g.compute_vertex_cover();
        assert_eq!(cover, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn path_of_two_edges_covers_middle() {
        let mut g = Graph::new(3);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        let cover = g.compute_vertex_cover();
        assert_eq!(cover, HashSet::from([1]));
    }

    #[test]
    fn triangle_with_two_self_loops() {
        let mut g = Graph::new(3);
        g.add_edge(0, 0);
        g.add_edge(1, 1);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 0);
        let cover = g.compute_vertex_cover();
        assert_eq!(cover, HashSet::from([0, 1]));
    }
}
