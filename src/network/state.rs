// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Mutable per-tick state of the network: traffic on the links and queues and signal
//! phases at the nodes.
use std::collections::VecDeque;

use num_traits::Zero;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};

use super::{Link, Network, Node};
use crate::units::{Speed, Time};
use crate::vehicle::{Vehicle, VehicleIndex};

/// Traffic state of a [Link].
///
/// Vehicles are kept in FIFO order: the front of the queue is the most downstream
/// vehicle and the back is the most recent entrant. Cumulative curves and travel-time
/// series have one entry per simulation timestep.
#[derive(Clone, Debug)]
pub struct LinkState {
    vehicles: VecDeque<VehicleIndex>,
    arrival_curve: Vec<f64>,
    departure_curve: Vec<f64>,
    traveltime_real: Vec<Time>,
    traveltime_instant: Vec<Time>,
    /// Completed traversal times, in order of completion.
    traveltime_tt: Vec<Time>,
    /// Times at which the traversals completed.
    traveltime_t: Vec<Time>,
    /// Outflow budget for the current tick, in vehicles.
    capacity_out_remain: f64,
}

impl LinkState {
    fn new(link: &Link, total_timesteps: usize, delta_t: Time) -> Self {
        let capacity_out_remain = if link.capacity_out().is_finite() {
            link.capacity_out() * delta_t
        } else {
            f64::INFINITY
        };
        LinkState {
            vehicles: VecDeque::new(),
            arrival_curve: vec![0.0; total_timesteps],
            departure_curve: vec![0.0; total_timesteps],
            traveltime_real: vec![Time::zero(); total_timesteps],
            traveltime_instant: vec![Time::zero(); total_timesteps],
            traveltime_tt: Vec::new(),
            traveltime_t: Vec::new(),
            capacity_out_remain,
        }
    }

    /// Advances the link state by one tick.
    ///
    /// Refreshes the travel-time signals, carries the cumulative curves forward and
    /// refills the outflow budget. Unused outflow tokens carry over from tick to tick
    /// until a transfer is possible.
    pub(crate) fn update(
        &mut self,
        link: &Link,
        vehicles: &[Vehicle],
        timestep: usize,
        delta_n: f64,
        delta_t: Time,
    ) {
        self.set_travel_time(link, vehicles, timestep);

        if timestep != 0 {
            self.arrival_curve[timestep] = self.arrival_curve[timestep - 1];
            self.departure_curve[timestep] = self.departure_curve[timestep - 1];
        }

        if link.capacity_out().is_finite() {
            if self.capacity_out_remain < delta_n {
                self.capacity_out_remain += link.capacity_out() * delta_t;
            }
        } else {
            self.capacity_out_remain = f64::INFINITY;
        }
    }

    fn set_travel_time(&mut self, link: &Link, vehicles: &[Vehicle], timestep: usize) {
        // Most recently completed traversal, as long as the link is non-empty.
        self.traveltime_real[timestep] =
            if let (Some(&tt), false) = (self.traveltime_tt.last(), self.vehicles.is_empty()) {
                tt
            } else {
                link.free_flow_time()
            };

        self.traveltime_instant[timestep] = if self.vehicles.is_empty() {
            link.free_flow_time()
        } else {
            let speed_sum: f64 = self
                .vehicles
                .iter()
                .map(|i| vehicles[i.index()].v().0)
                .sum();
            let mean_speed = Speed(speed_sum / self.vehicles.len() as f64);
            let speed_floor = link.vmax() / 10.0;
            if mean_speed > speed_floor {
                link.length() / mean_speed
            } else {
                link.length() / speed_floor
            }
        };
    }

    /// Returns `true` if there is room for one platoon at the upstream end.
    pub(crate) fn has_entry_room(&self, link: &Link, vehicles: &[Vehicle], delta_n: f64) -> bool {
        match self.vehicles.back() {
            None => true,
            Some(&last) => vehicles[last.index()].x() > link.delta() * delta_n,
        }
    }

    /// Records a completed traversal of the link.
    pub(crate) fn record_travel_time(&mut self, t: Time, tt: Time) {
        self.traveltime_t.push(t);
        self.traveltime_tt.push(tt);
    }

    pub(crate) fn push_vehicle(&mut self, vehicle: VehicleIndex) {
        self.vehicles.push_back(vehicle);
    }

    pub(crate) fn pop_front_vehicle(&mut self) -> Option<VehicleIndex> {
        self.vehicles.pop_front()
    }

    /// Returns the most recent entrant, i.e. the leader of the next vehicle to enter.
    pub(crate) fn last_vehicle(&self) -> Option<VehicleIndex> {
        self.vehicles.back().copied()
    }

    pub(crate) fn add_arrival(&mut self, timestep: usize, delta_n: f64) {
        self.arrival_curve[timestep] += delta_n;
    }

    pub(crate) fn add_departure(&mut self, timestep: usize, delta_n: f64) {
        self.departure_curve[timestep] += delta_n;
    }

    pub(crate) fn consume_outflow(&mut self, delta_n: f64) {
        self.capacity_out_remain -= delta_n;
    }

    /// Returns the outflow budget available for the current tick, in vehicles.
    pub fn capacity_out_remain(&self) -> f64 {
        self.capacity_out_remain
    }

    /// Returns the vehicles on the link, from most downstream to most upstream.
    pub fn vehicles(&self) -> &VecDeque<VehicleIndex> {
        &self.vehicles
    }

    /// Returns the cumulative arrival curve, in vehicles per timestep.
    pub fn arrival_curve(&self) -> &[f64] {
        &self.arrival_curve
    }

    /// Returns the cumulative departure curve, in vehicles per timestep.
    pub fn departure_curve(&self) -> &[f64] {
        &self.departure_curve
    }

    /// Returns the per-timestep series of most recently completed traversal times.
    pub fn traveltime_real(&self) -> &[Time] {
        &self.traveltime_real
    }

    /// Returns the per-timestep series of instantaneous travel times.
    pub fn traveltime_instant(&self) -> &[Time] {
        &self.traveltime_instant
    }

    /// Returns the completed traversal times, in order of completion.
    pub fn traveltime_tt(&self) -> &[Time] {
        &self.traveltime_tt
    }

    /// Returns the times at which traversals completed.
    pub fn traveltime_t(&self) -> &[Time] {
        &self.traveltime_t
    }

    pub(crate) fn traveltime_real_at(&self, timestep: usize) -> Time {
        self.traveltime_real[timestep]
    }
}

/// Per-tick state of a [Node]: the generation queue, the vehicles waiting to transfer
/// and the signal state machine.
#[derive(Clone, Debug)]
pub struct NodeState {
    generation_queue: VecDeque<VehicleIndex>,
    incoming_vehicles: Vec<VehicleIndex>,
    signal_t: Time,
    signal_phase: usize,
}

impl NodeState {
    fn new(node: &Node) -> Self {
        NodeState {
            generation_queue: VecDeque::new(),
            incoming_vehicles: Vec::new(),
            signal_t: node.signal_offset(),
            signal_phase: 0,
        }
    }

    /// Advances the signal state machine by one tick.
    ///
    /// Does nothing on unsignalised nodes.
    pub(crate) fn signal_update(&mut self, node: &Node, delta_t: Time) {
        if node.is_signalised() {
            let intervals = node.signal_intervals();
            while self.signal_t > intervals[self.signal_phase] {
                self.signal_t -= intervals[self.signal_phase];
                self.signal_phase += 1;
                if self.signal_phase >= intervals.len() {
                    self.signal_phase = 0;
                }
            }
            self.signal_t += delta_t;
        }
    }

    /// Returns the current signal phase.
    pub fn signal_phase(&self) -> usize {
        self.signal_phase
    }

    /// Returns the vehicles waiting to be generated at the node.
    pub fn generation_queue(&self) -> &VecDeque<VehicleIndex> {
        &self.generation_queue
    }

    pub(crate) fn front_queued(&self) -> Option<VehicleIndex> {
        self.generation_queue.front().copied()
    }

    pub(crate) fn pop_queued(&mut self) -> Option<VehicleIndex> {
        self.generation_queue.pop_front()
    }

    pub(crate) fn push_queued(&mut self, vehicle: VehicleIndex) {
        self.generation_queue.push_back(vehicle);
    }

    /// Returns the vehicles that reached the node and wait to transfer.
    pub fn incoming_vehicles(&self) -> &[VehicleIndex] {
        &self.incoming_vehicles
    }

    pub(crate) fn push_incoming(&mut self, vehicle: VehicleIndex) {
        self.incoming_vehicles.push(vehicle);
    }

    pub(crate) fn remove_incoming(&mut self, vehicle: VehicleIndex) {
        self.incoming_vehicles.retain(|&v| v != vehicle);
    }

    pub(crate) fn clear_incoming(&mut self) {
        self.incoming_vehicles.clear();
    }
}

/// The state of a [Network] at a given time, as a graph parallel to the static one.
#[derive(Clone, Debug, Default)]
pub struct NetworkState {
    graph: DiGraph<NodeState, LinkState>,
}

impl NetworkState {
    /// Creates an empty state for the given network.
    pub fn from_network(network: &Network, total_timesteps: usize, delta_t: Time) -> Self {
        let graph = network.graph().map(
            |_node_id, node| NodeState::new(node),
            |_edge_id, link| LinkState::new(link, total_timesteps, delta_t),
        );
        NetworkState { graph }
    }

    /// Returns the state of a link.
    pub fn link(&self, index: EdgeIndex) -> &LinkState {
        &self.graph[index]
    }

    pub(crate) fn link_mut(&mut self, index: EdgeIndex) -> &mut LinkState {
        &mut self.graph[index]
    }

    /// Returns the state of a node.
    pub fn node(&self, index: NodeIndex) -> &NodeState {
        &self.graph[index]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut NodeState {
        &mut self.graph[index]
    }
}
