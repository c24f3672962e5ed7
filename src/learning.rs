// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Dynamic-user-optimum learning of route preferences.
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::network::Network;
use crate::skim::NetworkSkim;

/// Per-destination link preferences used to sample the next link of a route.
///
/// Entry `[k][ln]` is the weight of link `ln` for vehicles heading to destination `k`.
/// The weights are damped averages of shortest-path indicators: on each update, links
/// lying on the current shortest path towards `k` move towards one, all other links
/// decay towards zero.
#[derive(Clone, Debug, Default)]
pub struct RoutePreferences {
    weights: Vec<Vec<f64>>,
}

impl RoutePreferences {
    /// Creates a preference table with zero weights.
    pub fn new(nb_nodes: usize, nb_links: usize) -> Self {
        RoutePreferences {
            weights: vec![vec![0.0; nb_links]; nb_nodes],
        }
    }

    /// Returns the preference weight of a link for the given destination.
    pub fn weight(&self, destination: NodeIndex, link: EdgeIndex) -> f64 {
        self.weights[destination.index()][link.index()]
    }

    #[cfg(test)]
    pub(crate) fn set_weight(&mut self, destination: NodeIndex, link: EdgeIndex, weight: f64) {
        self.weights[destination.index()][link.index()] = weight;
    }

    fn total(&self, destination: usize) -> f64 {
        self.weights[destination].iter().sum()
    }

    /// Updates the preferences from the current shortest paths.
    ///
    /// For each destination `k` and each link `i -> j`, the preference becomes
    /// `(1 - w) * pref + w` if `j` is the next hop from `i` towards `k`, and
    /// `(1 - w) * pref` otherwise. A destination whose weights are all zero is updated
    /// with `w = 1`, so that the first update seeds the deterministic shortest path.
    pub fn duo_update(&mut self, network: &Network, skim: &NetworkSkim, update_weight: f64) {
        for destination in network.graph().node_indices() {
            let k = destination.index();
            let w = if self.total(k) == 0.0 {
                1.0
            } else {
                update_weight
            };
            for edge in network.graph().edge_references() {
                let on_shortest_path =
                    skim.next_hop(edge.source(), destination) == Some(edge.target());
                let pref = &mut self.weights[k][edge.id().index()];
                if on_shortest_path {
                    *pref = (1.0 - w) * *pref + w;
                } else {
                    *pref = (1.0 - w) * *pref;
                }
            }
        }
    }
}
