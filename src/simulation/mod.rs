// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Everything related to simulations.
pub mod results;

use std::io::Write;

use anyhow::{bail, Result};
use hashbrown::HashMap;
use log::{debug, info};
use num_traits::Zero;
use petgraph::graph::{EdgeIndex, NodeIndex};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::choice::random_choice;
use crate::demand;
use crate::learning::RoutePreferences;
use crate::network::state::{LinkState, NetworkState, NodeState};
use crate::network::{Link, Network, Node};
use crate::parameters::Parameters;
use crate::skim::NetworkSkim;
use crate::units::{Density, Flow, Length, Speed, Time};
use crate::vehicle::{vehicle_index, Vehicle, VehicleIndex, VehicleState};

/// A scenario and its simulation clock.
///
/// A simulation owns the [Network], the [Vehicle]s and all the per-tick state. It is
/// built incrementally ([Simulation::add_node], [Simulation::add_link],
/// [Simulation::add_demand]), frozen with [Simulation::initialize_adj_matrix] and run
/// with [Simulation::main_loop].
///
/// The main loop is resumable: it can be invoked several times with partial durations
/// and produces the same trajectory as a single full run.
pub struct Simulation {
    name: String,
    parameters: Parameters,
    delta_t: Time,
    total_timesteps: usize,
    timestep_for_route_update: usize,
    network: Network,
    state: NetworkState,
    vehicles: Vec<Vehicle>,
    vehicles_by_name: HashMap<String, VehicleIndex>,
    /// Vehicles that have not completed their trip, in creation order.
    vehicles_living: Vec<VehicleIndex>,
    /// Vehicles currently on a link, in the order they started running.
    vehicles_running: Vec<VehicleIndex>,
    preferences: RoutePreferences,
    skim: NetworkSkim,
    node_order: Vec<NodeIndex>,
    edge_order: Vec<EdgeIndex>,
    timestep: usize,
    time: Time,
    rng: XorShiftRng,
    writer: Box<dyn Write>,
    initialized: bool,
}

impl Simulation {
    /// Creates an empty simulation with the given scenario name and [Parameters].
    pub fn new(name: &str, parameters: Parameters) -> Self {
        let delta_t = parameters.delta_t();
        let total_timesteps = parameters.total_timesteps();
        let timestep_for_route_update = parameters.timestep_for_route_update();
        let rng = XorShiftRng::seed_from_u64(parameters.random_seed);
        Simulation {
            name: name.to_owned(),
            parameters,
            delta_t,
            total_timesteps,
            timestep_for_route_update,
            network: Network::new(),
            state: NetworkState::default(),
            vehicles: Vec::new(),
            vehicles_by_name: HashMap::new(),
            vehicles_living: Vec::new(),
            vehicles_running: Vec::new(),
            preferences: RoutePreferences::default(),
            skim: NetworkSkim::default(),
            node_order: Vec::new(),
            edge_order: Vec::new(),
            timestep: 0,
            time: Time::zero(),
            rng,
            writer: Box::new(std::io::stdout()),
            initialized: false,
        }
    }

    /// Replaces the sink on which progress and reports are written.
    pub fn with_writer(mut self, writer: Box<dyn Write>) -> Self {
        self.writer = writer;
        self
    }

    /// Returns the name of the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the [Parameters] of the simulation.
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the [Network] of the simulation.
    pub const fn network(&self) -> &Network {
        &self.network
    }

    /// Returns the width of a simulation timestep.
    pub const fn delta_t(&self) -> Time {
        self.delta_t
    }

    /// Returns the total number of simulation timesteps.
    pub const fn total_timesteps(&self) -> usize {
        self.total_timesteps
    }

    /// Returns the current timestep.
    pub const fn timestep(&self) -> usize {
        self.timestep
    }

    /// Returns the time of the most recently executed tick.
    pub const fn time(&self) -> Time {
        self.time
    }

    /// Adds an unsignalised node to the network.
    pub fn add_node(&mut self, name: &str, x: f64, y: f64) -> Result<NodeIndex> {
        self.network
            .add_node(name, x, y, vec![Time::zero()], Time::zero())
    }

    /// Adds a signalised node to the network.
    ///
    /// The signal cycles through the given phases; each link entering the node may
    /// release vehicles only during the phases of its signal group.
    pub fn add_signal_node(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        signal_intervals: Vec<Time>,
        signal_offset: Time,
    ) -> Result<NodeIndex> {
        self.network
            .add_node(name, x, y, signal_intervals, signal_offset)
    }

    /// Adds a link with unlimited outflow capacity, belonging to signal group 0.
    pub fn add_link(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        vmax: Speed,
        kappa: Density,
        length: Length,
        merge_priority: f64,
    ) -> Result<EdgeIndex> {
        self.add_link_with_constraints(
            name,
            from,
            to,
            vmax,
            kappa,
            length,
            merge_priority,
            Flow(-1.0),
            vec![0],
        )
    }

    /// Adds a link with an outflow capacity and a signal group.
    ///
    /// A negative outflow capacity means that the outflow is not constrained.
    #[allow(clippy::too_many_arguments)]
    pub fn add_link_with_constraints(
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
    ) -> Result<EdgeIndex> {
        self.network.add_link(
            name,
            from,
            to,
            vmax,
            kappa,
            length,
            merge_priority,
            capacity_out,
            signal_group,
            self.parameters.tau,
        )
    }

    /// Adds a constant origin-destination flow over the interval `[t_start, t_end)`.
    ///
    /// The flow is converted into platoons of `delta_n` vehicles named
    /// `"<orig>-<dest>-<t>"` where `t` is the departure time. When `links_preferred` is
    /// non-empty, the vehicles favour those links whenever one of them is a candidate.
    pub fn add_demand(
        &mut self,
        orig: &str,
        dest: &str,
        t_start: Time,
        t_end: Time,
        flow: Flow,
        links_preferred: &[&str],
    ) -> Result<()> {
        let orig_index = self.network.get_node(orig)?;
        let dest_index = self.network.get_node(dest)?;
        let preferred: Vec<EdgeIndex> = links_preferred
            .iter()
            .map(|name| self.network.get_link(name))
            .collect::<Result<_>>()?;
        for t in demand::departure_times(
            t_start,
            t_end,
            flow,
            self.delta_t,
            self.parameters.delta_n,
        ) {
            let name = format!("{orig}-{dest}-{}", t.0);
            let index = vehicle_index(self.vehicles.len());
            let mut vehicle = Vehicle::new(&name, t, orig_index, dest_index);
            vehicle.links_preferred = preferred.clone();
            self.vehicles.push(vehicle);
            self.vehicles_by_name.insert(name, index);
            self.vehicles_living.push(index);
        }
        Ok(())
    }

    /// Freezes the network and allocates the routing structures.
    ///
    /// Must be called after all links have been added; calling it again has no effect.
    pub fn initialize_adj_matrix(&mut self) {
        if self.initialized {
            return;
        }
        self.network.initialize_adjacency();
        self.state = NetworkState::from_network(&self.network, self.total_timesteps, self.delta_t);
        self.preferences = RoutePreferences::new(self.network.nb_nodes(), self.network.nb_links());
        self.node_order = self.network.graph().node_indices().collect();
        self.edge_order = self.network.graph().edge_indices().collect();
        self.initialized = true;
        debug!(
            "Initialized scenario `{}`: {} nodes, {} links, {} platoons",
            self.name,
            self.network.nb_nodes(),
            self.network.nb_links(),
            self.vehicles.len()
        );
    }

    /// Runs the main simulation loop.
    ///
    /// Without arguments, the loop runs to the end of the simulated period. A duration
    /// bounds the loop relative to the current time, an end time bounds it in absolute
    /// time; giving both is an error. The loop can be invoked again to resume a
    /// partially run simulation.
    pub fn main_loop(&mut self, duration_t: Option<Time>, end_t: Option<Time>) -> Result<()> {
        self.initialize_adj_matrix();
        let start_timestep = self.timestep;
        let end_timestep = match (duration_t, end_t) {
            (None, None) => self.total_timesteps,
            (Some(duration), None) => ((duration + self.time) / self.delta_t).floor() as usize + 1,
            (None, Some(end)) => (end / self.delta_t).floor() as usize + 1,
            (Some(_), Some(_)) => {
                bail!("Cannot specify both `duration_t` and `end_t` parameters for `main_loop`")
            }
        };
        let end_timestep = end_timestep.min(self.total_timesteps);
        if end_timestep <= start_timestep {
            return Ok(());
        }
        info!(
            "Simulating `{}` from timestep {} to {}",
            self.name, start_timestep, end_timestep
        );

        for timestep in start_timestep..end_timestep {
            self.timestep = timestep;
            self.time = self.delta_t * timestep as f64;

            self.update_links();

            for i in 0..self.node_order.len() {
                let node = self.node_order[i];
                self.generate_at(node);
                let delta_t = self.delta_t;
                let node_data = self.network.node(node);
                self.state.node_mut(node).signal_update(node_data, delta_t);
            }

            for i in 0..self.node_order.len() {
                let node = self.node_order[i];
                self.transfer_at(node);
            }

            let (vehicle_count, average_speed) = self.car_follow_all();

            self.update_vehicles();

            if self.timestep_for_route_update > 0
                && timestep % self.timestep_for_route_update == 0
            {
                self.update_route_choice();
            }

            self.report_progress(vehicle_count, average_speed)?;
        }
        self.timestep = end_timestep;
        Ok(())
    }

    /// Returns `true` if the simulated period has not been fully run yet.
    pub fn check_simulation_ongoing(&self) -> bool {
        self.timestep < self.total_timesteps
    }

    /// Advances every link by one tick.
    fn update_links(&mut self) {
        for i in 0..self.edge_order.len() {
            let edge = self.edge_order[i];
            let link = self.network.link(edge);
            self.state.link_mut(edge).update(
                link,
                &self.vehicles,
                self.timestep,
                self.parameters.delta_n,
                self.delta_t,
            );
        }
    }

    /// Moves the front vehicle of the node's generation queue onto an outgoing link,
    /// if one is chosen and has room at its upstream end.
    fn generate_at(&mut self, node: NodeIndex) {
        let Some(vehicle_id) = self.state.node(node).front_queued() else {
            return;
        };
        let out_links = self.network.node(node).out_links().to_vec();
        self.vehicles[vehicle_id.index()].choose_next_link(
            &out_links,
            &self.preferences,
            &mut self.rng,
        );
        let Some(outlink) = self.vehicles[vehicle_id.index()].route_next_link else {
            return;
        };
        let link = self.network.link(outlink);
        if !self
            .state
            .link(outlink)
            .has_entry_room(link, &self.vehicles, self.parameters.delta_n)
        {
            return;
        }

        self.state.node_mut(node).pop_queued();
        let leader = self.state.link(outlink).last_vehicle();
        let time = self.time;
        {
            let vehicle = &mut self.vehicles[vehicle_id.index()];
            vehicle.state = VehicleState::Run;
            vehicle.link = Some(outlink);
            vehicle.x = Length::zero();
            vehicle.note_link_entry(time);
            vehicle.leader = leader;
        }
        if let Some(leader) = leader {
            self.vehicles[leader.index()].follower = Some(vehicle_id);
        }
        self.state.link_mut(outlink).push_vehicle(vehicle_id);
        self.state
            .link_mut(outlink)
            .add_arrival(self.timestep, self.parameters.delta_n);
        self.vehicles_running.push(vehicle_id);
    }

    /// Transfers vehicles waiting at the node onto their requested outgoing links.
    ///
    /// For each outgoing link with room at its upstream end, one vehicle is drawn among
    /// the admissible candidates with probability proportional to the merge priority of
    /// its current link. Candidates must have a sufficient outflow budget and, on
    /// signalised nodes, belong to a signal group containing the current phase.
    fn transfer_at(&mut self, node: NodeIndex) {
        let delta_n = self.parameters.delta_n;
        let out_links = self.network.node(node).out_links().to_vec();
        let signalised = self.network.node(node).is_signalised();
        for outlink in out_links {
            let link_out = self.network.link(outlink);
            if !self
                .state
                .link(outlink)
                .has_entry_room(link_out, &self.vehicles, delta_n)
            {
                continue;
            }
            let phase = self.state.node(node).signal_phase();
            let mut candidates = Vec::new();
            let mut priorities = Vec::new();
            for &vehicle_id in self.state.node(node).incoming_vehicles() {
                let vehicle = &self.vehicles[vehicle_id.index()];
                if vehicle.route_next_link != Some(outlink) {
                    continue;
                }
                let Some(current) = vehicle.link else {
                    continue;
                };
                if self.state.link(current).capacity_out_remain() < delta_n {
                    continue;
                }
                let current_link = self.network.link(current);
                if signalised && !current_link.admits_in_phase(phase) {
                    continue;
                }
                candidates.push(vehicle_id);
                priorities.push(current_link.merge_priority());
            }
            if candidates.is_empty() {
                continue;
            }
            let Some(&chosen) = random_choice(&candidates, &priorities, &mut self.rng) else {
                continue;
            };
            let Some(old_link) = self.vehicles[chosen.index()].link else {
                continue;
            };

            self.state.link_mut(old_link).consume_outflow(delta_n);
            self.state
                .link_mut(old_link)
                .add_departure(self.timestep, delta_n);
            self.state
                .link_mut(outlink)
                .add_arrival(self.timestep, delta_n);

            let time = self.time;
            let anchor = self.vehicles[chosen.index()].arrival_time_link;
            self.state
                .link_mut(old_link)
                .record_travel_time(time, time - anchor);

            self.state.link_mut(old_link).pop_front_vehicle();

            let old_follower = self.vehicles[chosen.index()].follower;
            if let Some(follower) = old_follower {
                self.vehicles[follower.index()].leader = None;
            }
            let new_leader = self.state.link(outlink).last_vehicle();
            {
                let vehicle = &mut self.vehicles[chosen.index()];
                vehicle.follower = None;
                vehicle.link = Some(outlink);
                vehicle.x = Length::zero();
                vehicle.x_next = Length::zero();
                vehicle.note_link_entry(time);
                vehicle.leader = new_leader;
            }
            if let Some(leader) = new_leader {
                self.vehicles[leader.index()].follower = Some(chosen);
            }
            self.state.link_mut(outlink).push_vehicle(chosen);
            self.state.node_mut(node).remove_incoming(chosen);
        }
        self.state.node_mut(node).clear_incoming();
    }

    /// Computes the candidate position of every running vehicle.
    ///
    /// All candidates are computed from the pre-tick positions of the leaders: the
    /// leader-first order of the link queues guarantees that a follower reads its
    /// leader's still-unmoved position.
    ///
    /// Returns the number of running vehicles and their average speed.
    fn car_follow_all(&mut self) -> (usize, Speed) {
        let mut count = 0usize;
        let mut average_speed = 0.0;
        for i in 0..self.vehicles_running.len() {
            let vehicle_id = self.vehicles_running[i];
            let Some(edge) = self.vehicles[vehicle_id.index()].link else {
                continue;
            };
            let link = self.network.link(edge);
            let leader_x = self.vehicles[vehicle_id.index()]
                .leader
                .map(|leader| self.vehicles[leader.index()].x());
            let delta_n = self.parameters.delta_n;
            let delta_t = self.delta_t;
            self.vehicles[vehicle_id.index()].car_follow_newell(link, leader_x, delta_n, delta_t);
            count += 1;
            average_speed = average_speed * (count - 1) as f64 / count as f64
                + self.vehicles[vehicle_id.index()].v().0 / count as f64;
        }
        (count, Speed(average_speed))
    }

    /// Advances every living vehicle by one tick, then drops the completed trips from
    /// the living and running indices.
    fn update_vehicles(&mut self) {
        for i in 0..self.vehicles_living.len() {
            let vehicle_id = self.vehicles_living[i];
            self.update_vehicle(vehicle_id);
        }
        let vehicles = &self.vehicles;
        self.vehicles_living
            .retain(|v| !vehicles[v.index()].state().is_end());
        self.vehicles_running
            .retain(|v| vehicles[v.index()].state().is_run());
    }

    fn update_vehicle(&mut self, vehicle_id: VehicleIndex) {
        let log_mode = self.parameters.vehicle_log_mode;
        let time = self.time;
        match self.vehicles[vehicle_id.index()].state {
            VehicleState::Home => {
                self.vehicles[vehicle_id.index()].log_tick(time, log_mode);
                if time >= self.vehicles[vehicle_id.index()].departure_time {
                    let origin = self.vehicles[vehicle_id.index()].orig;
                    self.vehicles[vehicle_id.index()].state = VehicleState::Wait;
                    self.state.node_mut(origin).push_queued(vehicle_id);
                }
            }
            VehicleState::Wait => {
                self.vehicles[vehicle_id.index()].log_tick(time, log_mode);
            }
            VehicleState::Run => {
                self.vehicles[vehicle_id.index()].log_tick(time, log_mode);
                let delta_t = self.delta_t;
                {
                    let vehicle = &mut self.vehicles[vehicle_id.index()];
                    if vehicle.x.is_zero() {
                        vehicle.route_choice_flag_on_link = false;
                    }
                    vehicle.v = (vehicle.x_next - vehicle.x) / delta_t;
                    vehicle.x = vehicle.x_next;
                }
                let Some(edge) = self.vehicles[vehicle_id.index()].link else {
                    return;
                };
                let length = self.network.link(edge).length();
                if (self.vehicles[vehicle_id.index()].x() - length).0.abs() < 1e-9 {
                    let (_, end_node) = self.network.endpoints(edge);
                    if end_node == self.vehicles[vehicle_id.index()].dest {
                        self.end_trip(vehicle_id);
                        self.vehicles[vehicle_id.index()].log_tick(time, log_mode);
                    } else {
                        let out_links = self.network.node(end_node).out_links().to_vec();
                        self.vehicles[vehicle_id.index()].choose_next_link(
                            &out_links,
                            &self.preferences,
                            &mut self.rng,
                        );
                        self.state.node_mut(end_node).push_incoming(vehicle_id);
                    }
                }
            }
            VehicleState::End => {}
        }
    }

    /// Completes the trip of a vehicle standing at the downstream end of its link.
    fn end_trip(&mut self, vehicle_id: VehicleIndex) {
        let delta_n = self.parameters.delta_n;
        let time = self.time;
        let Some(edge) = self.vehicles[vehicle_id.index()].link else {
            return;
        };
        self.vehicles[vehicle_id.index()].state = VehicleState::End;
        self.state
            .link_mut(edge)
            .add_departure(self.timestep, delta_n);
        let anchor = self.vehicles[vehicle_id.index()].arrival_time_link;
        self.state
            .link_mut(edge)
            .record_travel_time(time, time - anchor);
        self.state.link_mut(edge).pop_front_vehicle();

        let follower = self.vehicles[vehicle_id.index()].follower;
        if let Some(follower) = follower {
            // The ex-follower is left without a leader and proceeds in free flow.
            self.vehicles[follower.index()].leader = None;
        }
        let vehicle = &mut self.vehicles[vehicle_id.index()];
        vehicle.arrival_time = Some(time);
        vehicle.travel_time = Some(time - vehicle.departure_time);
        vehicle.note_link_entry(time);
        vehicle.link = None;
        vehicle.x = Length::zero();
    }

    /// Recomputes the shortest paths on the current travel times and updates the route
    /// preferences.
    fn update_route_choice(&mut self) {
        let timestep = self.timestep;
        let state = &self.state;
        self.network
            .refresh_adjacency(|edge| state.link(edge).traveltime_real_at(timestep));
        self.skim = NetworkSkim::compute(self.network.adj_time());
        self.preferences.duo_update(
            &self.network,
            &self.skim,
            self.parameters.duo_update_weight,
        );
    }

    fn report_progress(&mut self, vehicle_count: usize, average_speed: Speed) -> Result<()> {
        if !self.parameters.print_mode || self.total_timesteps == 0 {
            return Ok(());
        }
        let checkpoint = (self.total_timesteps / 10).max(1);
        if self.timestep % checkpoint != 0 {
            return Ok(());
        }
        if self.timestep == 0 {
            writeln!(self.writer, "Simulating...")?;
            writeln!(
                self.writer,
                "{:>10}|{:>14}|{:>11}",
                "time", "# of vehicles", " ave speed"
            )?;
        }
        writeln!(
            self.writer,
            "{:>8.0} s|{:>10.0} veh|{:>7.2} m/s",
            self.time.0,
            vehicle_count as f64 * self.parameters.delta_n,
            average_speed.0
        )?;
        Ok(())
    }

    /// Returns the index of the node with the given name.
    pub fn get_node(&self, name: &str) -> Result<NodeIndex> {
        self.network.get_node(name)
    }

    /// Returns the index of the link with the given name.
    pub fn get_link(&self, name: &str) -> Result<EdgeIndex> {
        self.network.get_link(name)
    }

    /// Returns the index of the link with the given id.
    pub fn get_link_by_id(&self, id: usize) -> Result<EdgeIndex> {
        self.network.get_link_by_id(id)
    }

    /// Returns the index of the vehicle with the given name.
    pub fn get_vehicle(&self, name: &str) -> Result<VehicleIndex> {
        self.vehicles_by_name
            .get(name)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("No vehicle named `{name}` in the simulation"))
    }

    /// Returns a reference to a node of the network.
    pub fn node(&self, index: NodeIndex) -> &Node {
        self.network.node(index)
    }

    /// Returns a reference to a link of the network.
    pub fn link(&self, index: EdgeIndex) -> &Link {
        self.network.link(index)
    }

    /// Returns a reference to a vehicle of the simulation.
    pub fn vehicle(&self, index: VehicleIndex) -> &Vehicle {
        &self.vehicles[index.index()]
    }

    /// Returns the vehicles of the simulation, in creation order.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Returns the traffic state of a link.
    pub fn link_state(&self, index: EdgeIndex) -> &LinkState {
        self.state.link(index)
    }

    /// Returns the per-tick state of a node.
    pub fn node_state(&self, index: NodeIndex) -> &NodeState {
        self.state.node(index)
    }

    /// Returns the current shortest-path tables.
    pub const fn skim(&self) -> &NetworkSkim {
        &self.skim
    }

    /// Returns the current route preferences.
    pub const fn preferences(&self) -> &RoutePreferences {
        &self.preferences
    }
}
