//! All-sources shortest paths on the travel-time adjacency matrix.
use std::cmp::Reverse;

use hashbrown::hash_map::DefaultHashBuilder;
use num_traits::Zero;
use petgraph::graph::{node_index, NodeIndex};
use priority_queue::PriorityQueue;

use crate::units::Time;

/// Wrapper implementing a total order on a partially ordered type.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct ImplOrd<T>(pub T);

impl<T: PartialEq> Eq for ImplOrd<T> {}

#[allow(clippy::derive_ord_xor_partial_ord)]
impl<T: PartialOrd> Ord for ImplOrd<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other).expect("Invalid comparison")
    }
}

/// A priority queue of (key, value) items sorted in increasing order of their values.
type MinPQ<I, P> = PriorityQueue<I, Reverse<ImplOrd<P>>, DefaultHashBuilder>;

/// Distance and next-hop tables between all pairs of nodes.
///
/// `next_hop[i][j]` is the immediate neighbour of `i` on a shortest path from `i` to
/// `j`; it is `i` itself when `i == j` and `None` when `j` cannot be reached from `i`.
#[derive(Clone, Debug, Default)]
pub struct NetworkSkim {
    dist: Vec<Vec<Time>>,
    next_hop: Vec<Vec<Option<NodeIndex>>>,
}

impl NetworkSkim {
    /// Runs Dijkstra's algorithm from every node of the travel-time adjacency matrix.
    ///
    /// Entry `[i][j]` of the matrix is the travel time of the link from `i` to `j`, or
    /// zero if there is no such link.
    pub fn compute(adj_time: &[Vec<Time>]) -> Self {
        let n = adj_time.len();
        let mut adj_list: Vec<Vec<(usize, Time)>> = vec![Vec::new(); n];
        for (i, row) in adj_time.iter().enumerate() {
            for (j, &weight) in row.iter().enumerate() {
                if weight > Time::zero() {
                    adj_list[i].push((j, weight));
                }
            }
        }

        let mut dist = vec![vec![Time(f64::INFINITY); n]; n];
        let mut next_hop: Vec<Vec<Option<NodeIndex>>> = vec![vec![None; n]; n];
        for start in 0..n {
            dist[start][start] = Time::zero();
            next_hop[start][start] = Some(node_index(start));
            let mut queue: MinPQ<usize, Time> = MinPQ::with_default_hasher();
            queue.push(start, Reverse(ImplOrd(Time::zero())));
            while let Some((current, _)) = queue.pop() {
                for &(next, weight) in &adj_list[current] {
                    let new_dist = dist[start][current] + weight;
                    if new_dist < dist[start][next] {
                        dist[start][next] = new_dist;
                        let hop = if current == start {
                            Some(node_index(next))
                        } else {
                            next_hop[start][current]
                        };
                        next_hop[start][next] = hop;
                        // Decreasing the value = increasing the priority.
                        queue.push_increase(next, Reverse(ImplOrd(new_dist)));
                    }
                }
            }
        }
        NetworkSkim { dist, next_hop }
    }

    /// Returns `true` if the skim has not been computed yet.
    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }

    /// Returns the shortest-path travel time between two nodes.
    ///
    /// The travel time is infinite if the target cannot be reached from the source.
    pub fn dist(&self, from: NodeIndex, to: NodeIndex) -> Time {
        self.dist[from.index()][to.index()]
    }

    /// Returns the immediate neighbour of `from` on a shortest path towards `to`.
    pub fn next_hop(&self, from: NodeIndex, to: NodeIndex) -> Option<NodeIndex> {
        self.next_hop[from.index()][to.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(entries: &[(usize, usize, f64)], n: usize) -> Vec<Vec<Time>> {
        let mut adj = vec![vec![Time(0.0); n]; n];
        for &(i, j, w) in entries {
            adj[i][j] = Time(w);
        }
        adj
    }

    #[test]
    fn diamond_test() {
        // Two routes from 0 to 3: via 1 (cost 4) and via 2 (cost 6).
        let adj = matrix(&[(0, 1, 2.0), (1, 3, 2.0), (0, 2, 1.0), (2, 3, 5.0)], 4);
        let skim = NetworkSkim::compute(&adj);
        assert_eq!(skim.dist(node_index(0), node_index(3)), Time(4.0));
        assert_eq!(skim.dist(node_index(0), node_index(2)), Time(1.0));
        assert_eq!(
            skim.next_hop(node_index(0), node_index(3)),
            Some(node_index(1))
        );
        assert_eq!(
            skim.next_hop(node_index(0), node_index(2)),
            Some(node_index(2))
        );
        // The self-hop is the node itself.
        assert_eq!(
            skim.next_hop(node_index(2), node_index(2)),
            Some(node_index(2))
        );
        assert_eq!(skim.dist(node_index(1), node_index(1)), Time(0.0));
    }

    #[test]
    fn unreachable_test() {
        let adj = matrix(&[(0, 1, 1.0)], 3);
        let skim = NetworkSkim::compute(&adj);
        assert_eq!(skim.next_hop(node_index(0), node_index(2)), None);
        assert_eq!(skim.next_hop(node_index(1), node_index(0)), None);
        assert!(!skim.dist(node_index(0), node_index(2)).is_finite());
    }

    #[test]
    fn chain_next_hop_test() {
        // On a chain, the next hop from the first node is always its direct neighbour.
        let adj = matrix(&[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)], 4);
        let skim = NetworkSkim::compute(&adj);
        assert_eq!(
            skim.next_hop(node_index(0), node_index(3)),
            Some(node_index(1))
        );
        assert_eq!(
            skim.next_hop(node_index(1), node_index(3)),
            Some(node_index(2))
        );
        assert_eq!(skim.dist(node_index(0), node_index(3)), Time(3.0));
    }

    #[test]
    fn shorter_route_wins_test() {
        // A direct link exists but the two-leg route is faster.
        let adj = matrix(&[(0, 2, 10.0), (0, 1, 3.0), (1, 2, 3.0)], 3);
        let skim = NetworkSkim::compute(&adj);
        assert_eq!(skim.dist(node_index(0), node_index(2)), Time(6.0));
        assert_eq!(
            skim.next_hop(node_index(0), node_index(2)),
            Some(node_index(1))
        );
    }
}
