// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Description of the road network: nodes, links and the directed graph
//! connecting them.
pub mod state;

use anyhow::{anyhow, bail, Result};
use hashbrown::HashMap;
use num_traits::Zero;
use petgraph::graph::{edge_index, DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::units::{Density, Flow, Length, Speed, Time};

/// An intersection of the road network.
///
/// A node can carry a traffic signal, described by the green duration of each phase.
/// A single-phase (or empty) signal plan means that the node is not signalised.
#[derive(Clone, Debug)]
pub struct Node {
    name: String,
    x: f64,
    y: f64,
    signal_intervals: Vec<Time>,
    signal_offset: Time,
    in_links: Vec<EdgeIndex>,
    out_links: Vec<EdgeIndex>,
}

impl Node {
    fn new(name: &str, x: f64, y: f64, signal_intervals: Vec<Time>, signal_offset: Time) -> Self {
        Node {
            name: name.to_owned(),
            x,
            y,
            signal_intervals,
            signal_offset,
            in_links: Vec::new(),
            out_links: Vec::new(),
        }
    }

    /// Returns the name of the node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the coordinates of the node.
    pub const fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Returns the green duration of each signal phase.
    pub fn signal_intervals(&self) -> &[Time] {
        &self.signal_intervals
    }

    /// Returns the offset of the signal plan.
    pub const fn signal_offset(&self) -> Time {
        self.signal_offset
    }

    /// Returns `true` if the node runs a traffic signal.
    pub fn is_signalised(&self) -> bool {
        self.signal_intervals.len() > 1
    }

    /// Returns the links entering the node, in declaration order.
    pub fn in_links(&self) -> &[EdgeIndex] {
        &self.in_links
    }

    /// Returns the links leaving the node, in declaration order.
    pub fn out_links(&self) -> &[EdgeIndex] {
        &self.out_links
    }
}

/// A directed road segment connecting two nodes.
///
/// The traffic-flow constants are derived from the triangular fundamental diagram:
/// free-flow speed `vmax`, jam density `kappa` and reaction time `tau` give the jam
/// spacing `delta = 1 / kappa`, the backward wave speed `w = 1 / (tau * kappa)` and the
/// capacity `vmax * w * kappa / (vmax + w)`.
#[derive(Clone, Debug)]
pub struct Link {
    name: String,
    length: Length,
    vmax: Speed,
    kappa: Density,
    tau: Time,
    delta: Length,
    backward_wave_speed: Speed,
    capacity: Flow,
    merge_priority: f64,
    capacity_out: Flow,
    signal_group: Vec<usize>,
}

impl Link {
    fn new(
        name: &str,
        vmax: Speed,
        kappa: Density,
        length: Length,
        merge_priority: f64,
        capacity_out: Flow,
        signal_group: Vec<usize>,
        tau: Time,
    ) -> Self {
        let kappa = if kappa.0 <= 0.0 { Density(0.2) } else { kappa };
        let delta = kappa.spacing();
        let backward_wave_speed = Speed(1.0 / (tau.0 * kappa.0));
        let capacity =
            Flow(vmax.0 * backward_wave_speed.0 * kappa.0 / (vmax.0 + backward_wave_speed.0));
        // A negative outflow capacity means that the outflow is not constrained.
        let capacity_out = if capacity_out.0 < 0.0 {
            Flow::infinity()
        } else {
            capacity_out
        };
        Link {
            name: name.to_owned(),
            length,
            vmax,
            kappa,
            tau,
            delta,
            backward_wave_speed,
            capacity,
            merge_priority,
            capacity_out,
            signal_group,
        }
    }

    /// Returns the name of the link.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the length of the link.
    pub const fn length(&self) -> Length {
        self.length
    }

    /// Returns the free-flow speed of the link.
    pub const fn vmax(&self) -> Speed {
        self.vmax
    }

    /// Returns the jam density of the link.
    pub const fn kappa(&self) -> Density {
        self.kappa
    }

    /// Returns the reaction time of the link.
    pub const fn tau(&self) -> Time {
        self.tau
    }

    /// Returns the jam spacing of the link.
    pub const fn delta(&self) -> Length {
        self.delta
    }

    /// Returns the backward wave speed of the link.
    pub const fn backward_wave_speed(&self) -> Speed {
        self.backward_wave_speed
    }

    /// Returns the capacity of the link.
    pub const fn capacity(&self) -> Flow {
        self.capacity
    }

    /// Returns the weight of the link when merging at its downstream node.
    pub const fn merge_priority(&self) -> f64 {
        self.merge_priority
    }

    /// Returns the outflow capacity of the link.
    pub const fn capacity_out(&self) -> Flow {
        self.capacity_out
    }

    /// Returns the signal phases during which the link may release vehicles.
    pub fn signal_group(&self) -> &[usize] {
        &self.signal_group
    }

    /// Returns `true` if the link may release vehicles during the given signal phase.
    pub fn admits_in_phase(&self, phase: usize) -> bool {
        self.signal_group.contains(&phase)
    }

    /// Returns the time to traverse the link at free-flow speed.
    pub fn free_flow_time(&self) -> Time {
        self.length / self.vmax
    }
}

/// The directed graph of [Node]s and [Link]s, with by-name lookup maps and the
/// travel-time adjacency matrix used by the shortest-path engine.
///
/// The network is built incrementally and then frozen by [Network::initialize_adjacency];
/// nodes and links cannot be added afterwards.
#[derive(Clone, Debug, Default)]
pub struct Network {
    graph: DiGraph<Node, Link>,
    nodes_by_name: HashMap<String, NodeIndex>,
    links_by_name: HashMap<String, EdgeIndex>,
    /// Entry `[i][j]` is the current travel time from node `i` to node `j`, or zero if
    /// there is no link from `i` to `j`.
    adj_time: Vec<Vec<Time>>,
    frozen: bool,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the network and returns its index.
    pub fn add_node(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        signal_intervals: Vec<Time>,
        signal_offset: Time,
    ) -> Result<NodeIndex> {
        if self.frozen {
            bail!("Cannot add node `{name}`: the network is frozen");
        }
        if self.nodes_by_name.contains_key(name) {
            bail!("A node named `{name}` already exists");
        }
        if signal_intervals.len() > 1 && signal_intervals.iter().any(|i| i.0 <= 0.0) {
            bail!("Signal intervals of node `{name}` must be positive");
        }
        let index = self
            .graph
            .add_node(Node::new(name, x, y, signal_intervals, signal_offset));
        self.nodes_by_name.insert(name.to_owned(), index);
        Ok(index)
    }

    /// Adds a link between two nodes and returns its index.
    #[allow(clippy::too_many_arguments)]
    pub fn add_link(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        vmax: Speed,
        kappa: Density,
        length: Length,
        merge_priority: f64,
        capacity_out: Flow,
        signal_group: Vec<usize>,
        tau: Time,
    ) -> Result<EdgeIndex> {
        if self.frozen {
            bail!("Cannot add link `{name}`: the network is frozen");
        }
        if self.links_by_name.contains_key(name) {
            bail!("A link named `{name}` already exists");
        }
        if vmax.0 <= 0.0 || length.0 <= 0.0 {
            bail!("Link `{name}` must have positive free-flow speed and length");
        }
        let start = self.get_node(from)?;
        let end = self.get_node(to)?;
        let link = Link::new(
            name,
            vmax,
            kappa,
            length,
            merge_priority,
            capacity_out,
            signal_group,
            tau,
        );
        let index = self.graph.add_edge(start, end, link);
        self.graph[start].out_links.push(index);
        self.graph[end].in_links.push(index);
        self.links_by_name.insert(name.to_owned(), index);
        Ok(index)
    }

    /// Builds the travel-time adjacency matrix from free-flow times and freezes the
    /// network.
    ///
    /// Calling this function again has no effect.
    pub fn initialize_adjacency(&mut self) {
        if self.frozen {
            return;
        }
        let n = self.graph.node_count();
        self.adj_time = vec![vec![Time::zero(); n]; n];
        for edge in self.graph.edge_references() {
            self.adj_time[edge.source().index()][edge.target().index()] =
                edge.weight().free_flow_time();
        }
        self.frozen = true;
    }

    /// Refreshes the travel-time adjacency matrix.
    ///
    /// The closure gives the observed travel time of each link; zero observations fall
    /// back to the free-flow time.
    pub fn refresh_adjacency<F: Fn(EdgeIndex) -> Time>(&mut self, travel_time: F) {
        for edge in self.graph.edge_references() {
            let tt = travel_time(edge.id());
            let tt = if tt.is_zero() {
                edge.weight().free_flow_time()
            } else {
                tt
            };
            self.adj_time[edge.source().index()][edge.target().index()] = tt;
        }
    }

    /// Returns the travel-time adjacency matrix.
    pub fn adj_time(&self) -> &[Vec<Time>] {
        &self.adj_time
    }

    /// Returns `true` if [Network::initialize_adjacency] has been called.
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns a reference to the graph of the network.
    pub const fn graph(&self) -> &DiGraph<Node, Link> {
        &self.graph
    }

    /// Returns the number of nodes in the network.
    pub fn nb_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of links in the network.
    pub fn nb_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns a reference to a node of the network.
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    /// Returns a reference to a link of the network.
    pub fn link(&self, index: EdgeIndex) -> &Link {
        &self.graph[index]
    }

    /// Returns the start and end node of a link.
    pub fn endpoints(&self, index: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(index)
            .expect("Link is not in the graph")
    }

    /// Returns the index of the node with the given name.
    pub fn get_node(&self, name: &str) -> Result<NodeIndex> {
        self.nodes_by_name
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("No node named `{name}` in the network"))
    }

    /// Returns the index of the link with the given name.
    pub fn get_link(&self, name: &str) -> Result<EdgeIndex> {
        self.links_by_name
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("No link named `{name}` in the network"))
    }

    /// Returns the index of the link with the given id.
    pub fn get_link_by_id(&self, id: usize) -> Result<EdgeIndex> {
        if id < self.graph.edge_count() {
            Ok(edge_index(id))
        } else {
            Err(anyhow!("No link with id `{id}` in the network"))
        }
    }
}
