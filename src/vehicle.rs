// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Description of the vehicles (platoons) travelling on the network.
use num_traits::Zero;
use petgraph::graph::{EdgeIndex, NodeIndex};
use rand::Rng;

use crate::choice::random_choice;
use crate::learning::RoutePreferences;
use crate::network::Link;
use crate::units::{Length, Speed, Time};

/// Position of a vehicle in its life cycle.
///
/// A vehicle starts at home, waits in the generation queue of its origin once its
/// departure time is reached, runs over the links of the network and ends when it
/// reaches its destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VehicleState {
    /// The departure time has not been reached yet.
    Home,
    /// The vehicle waits in the generation queue of its origin.
    Wait,
    /// The vehicle travels on a link of the network.
    Run,
    /// The trip is completed.
    End,
}

impl VehicleState {
    /// Returns `true` if the vehicle travels on a link.
    pub fn is_run(&self) -> bool {
        *self == VehicleState::Run
    }

    /// Returns `true` if the trip is completed.
    pub fn is_end(&self) -> bool {
        *self == VehicleState::End
    }
}

/// Per-tick log of a vehicle, recorded when vehicle logging is enabled.
#[derive(Clone, Debug, Default)]
pub struct VehicleLog {
    times: Vec<Time>,
    states: Vec<VehicleState>,
    links: Vec<Option<EdgeIndex>>,
    positions: Vec<Length>,
    speeds: Vec<Speed>,
}

impl VehicleLog {
    fn record(
        &mut self,
        time: Time,
        state: VehicleState,
        link: Option<EdgeIndex>,
        x: Length,
        v: Speed,
    ) {
        self.times.push(time);
        self.states.push(state);
        self.links.push(link);
        self.positions.push(x);
        // Vehicles outside the network have no meaningful speed.
        self.speeds.push(if link.is_some() { v } else { Speed::zero() });
    }

    /// Returns the logged times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Returns the logged states.
    pub fn states(&self) -> &[VehicleState] {
        &self.states
    }

    /// Returns the logged links.
    pub fn links(&self) -> &[Option<EdgeIndex>] {
        &self.links
    }

    /// Returns the logged positions.
    pub fn positions(&self) -> &[Length] {
        &self.positions
    }

    /// Returns the logged speeds.
    pub fn speeds(&self) -> &[Speed] {
        &self.speeds
    }

    /// Returns the number of logged ticks.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns `true` if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A platoon of vehicles moving as a single unit through the network.
#[derive(Clone, Debug)]
pub struct Vehicle {
    pub(crate) name: String,
    pub(crate) departure_time: Time,
    pub(crate) orig: NodeIndex,
    pub(crate) dest: NodeIndex,
    pub(crate) state: VehicleState,
    /// Link the vehicle is currently on, if any.
    pub(crate) link: Option<EdgeIndex>,
    /// Position on the current link.
    pub(crate) x: Length,
    /// Position the vehicle will move to at the end of the tick.
    pub(crate) x_next: Length,
    pub(crate) v: Speed,
    pub(crate) leader: Option<VehicleIndex>,
    pub(crate) follower: Option<VehicleIndex>,
    /// Time at which the vehicle entered its current link.
    pub(crate) arrival_time_link: Time,
    pub(crate) arrival_time: Option<Time>,
    pub(crate) travel_time: Option<Time>,
    pub(crate) route_next_link: Option<EdgeIndex>,
    pub(crate) route_choice_flag_on_link: bool,
    pub(crate) links_preferred: Vec<EdgeIndex>,
    pub(crate) log: VehicleLog,
}

impl Vehicle {
    pub(crate) fn new(name: &str, departure_time: Time, orig: NodeIndex, dest: NodeIndex) -> Self {
        Vehicle {
            name: name.to_owned(),
            departure_time,
            orig,
            dest,
            state: VehicleState::Home,
            link: None,
            x: Length::zero(),
            x_next: Length::zero(),
            v: Speed::zero(),
            leader: None,
            follower: None,
            arrival_time_link: Time::zero(),
            arrival_time: None,
            travel_time: None,
            route_next_link: None,
            route_choice_flag_on_link: false,
            links_preferred: Vec::new(),
            log: VehicleLog::default(),
        }
    }

    /// Returns the name of the vehicle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the state of the vehicle.
    pub const fn state(&self) -> VehicleState {
        self.state
    }

    /// Returns the scheduled departure time of the vehicle.
    pub const fn departure_time(&self) -> Time {
        self.departure_time
    }

    /// Returns the origin node of the trip.
    pub const fn origin(&self) -> NodeIndex {
        self.orig
    }

    /// Returns the destination node of the trip.
    pub const fn destination(&self) -> NodeIndex {
        self.dest
    }

    /// Returns the link the vehicle is currently on.
    pub const fn link(&self) -> Option<EdgeIndex> {
        self.link
    }

    /// Returns the position of the vehicle on its current link.
    pub const fn x(&self) -> Length {
        self.x
    }

    /// Returns the speed of the vehicle.
    pub const fn v(&self) -> Speed {
        self.v
    }

    /// Returns the next link requested by the vehicle.
    pub const fn route_next_link(&self) -> Option<EdgeIndex> {
        self.route_next_link
    }

    /// Returns `true` if the vehicle has chosen its next link since entering its
    /// current link.
    pub const fn route_choice_flag_on_link(&self) -> bool {
        self.route_choice_flag_on_link
    }

    /// Returns the arrival time at destination, once the trip is completed.
    pub const fn arrival_time(&self) -> Option<Time> {
        self.arrival_time
    }

    /// Returns the total travel time, once the trip is completed.
    pub const fn travel_time(&self) -> Option<Time> {
        self.travel_time
    }

    /// Returns the per-tick log of the vehicle.
    pub const fn log(&self) -> &VehicleLog {
        &self.log
    }

    /// Applies Newell's car-following rule and stores the candidate position.
    ///
    /// The position is bounded by the free-flow displacement, the jam spacing behind
    /// the leader, the current position (movement is non-decreasing) and the link
    /// length. The leader position must be its pre-tick value.
    pub(crate) fn car_follow_newell(
        &mut self,
        link: &Link,
        leader_x: Option<Length>,
        delta_n: f64,
        delta_t: Time,
    ) {
        let mut x_next = self.x + link.vmax() * delta_t;
        if let Some(leader_x) = leader_x {
            let gap = leader_x - link.delta() * delta_n;
            if x_next >= gap {
                x_next = gap;
            }
        }
        if x_next < self.x {
            x_next = self.x;
        }
        if x_next >= link.length() {
            x_next = link.length();
        }
        self.x_next = x_next;
    }

    /// Chooses the next link among the given candidates and stores it.
    ///
    /// Preferred links take precedence when at least one of them is a candidate;
    /// otherwise the candidates are weighted by the destination's route preferences.
    pub(crate) fn choose_next_link<R: Rng>(
        &mut self,
        candidates: &[EdgeIndex],
        preferences: &RoutePreferences,
        rng: &mut R,
    ) {
        if candidates.is_empty() {
            self.route_next_link = None;
            self.route_choice_flag_on_link = true;
            return;
        }
        let mut weights = Vec::with_capacity(candidates.len());
        let mut prefer_flag = false;
        if !self.links_preferred.is_empty() {
            for candidate in candidates {
                if self.links_preferred.contains(candidate) {
                    weights.push(1.0);
                    prefer_flag = true;
                } else {
                    weights.push(0.0);
                }
            }
        }
        if !prefer_flag {
            weights.clear();
            weights.extend(
                candidates
                    .iter()
                    .map(|&candidate| preferences.weight(self.dest, candidate)),
            );
        }
        self.route_next_link = random_choice(candidates, &weights, rng).copied();
        self.route_choice_flag_on_link = true;
    }

    /// Anchors the link-entry time used for travel-time recording.
    pub(crate) fn note_link_entry(&mut self, t: Time) {
        self.arrival_time_link = Time(t.0 + 1.0);
    }

    pub(crate) fn log_tick(&mut self, time: Time, enabled: bool) {
        if enabled {
            self.log
                .record(time, self.state, self.link, self.x, self.v);
        }
    }
}

/// Vehicle identifier.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct VehicleIndex(usize);

impl VehicleIndex {
    /// Creates a new VehicleIndex.
    pub const fn new(x: usize) -> Self {
        VehicleIndex(x)
    }

    /// Returns the index of the VehicleIndex.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Short version of `VehicleIndex::new`.
pub const fn vehicle_index(x: usize) -> VehicleIndex {
    VehicleIndex::new(x)
}
