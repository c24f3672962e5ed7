// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Aggregate results of a simulation.
use std::io::Write;

use anyhow::Result;
use serde_derive::Serialize;

use super::Simulation;
use crate::units::Speed;

/// Network-level averages and trip totals.
///
/// Speed statistics are means over the logged running ticks of all vehicles and are
/// only available when vehicle logging is enabled. Trip totals are expressed in
/// vehicles (platoons times `delta_n`).
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SimpleResults {
    /// Average speed over all running vehicle ticks.
    pub ave_v: Speed,
    /// Average ratio of speed to the free-flow speed of the travelled link.
    pub ave_vratio: f64,
    /// Number of completed trips, in vehicles.
    pub trips_completed: f64,
    /// Number of trips in the scenario, in vehicles.
    pub trips_total: f64,
}

impl Simulation {
    /// Computes the network-level averages and trip totals.
    pub fn compute_simple_results(&self) -> SimpleResults {
        let delta_n = self.parameters.delta_n;
        let mut results = SimpleResults::default();
        let mut n = 0.0;
        for vehicle in &self.vehicles {
            results.trips_total += delta_n;
            if vehicle.state().is_end() {
                results.trips_completed += delta_n;
            }
            let log = vehicle.log();
            for i in 0..log.len() {
                if !log.states()[i].is_run() {
                    continue;
                }
                let v = log.speeds()[i].0;
                results.ave_v.0 += (v - results.ave_v.0) / (n + 1.0);
                let vmax = log.links()[i]
                    .map(|edge| self.network.link(edge).vmax().0)
                    .unwrap_or(1.0);
                results.ave_vratio += (v / vmax - results.ave_vratio) / (n + 1.0);
                n += 1.0;
            }
        }
        results
    }

    /// Writes the summary of the simulation results on the writer sink.
    pub fn print_simple_results(&mut self) -> Result<()> {
        let results = self.compute_simple_results();
        writeln!(self.writer, "Stats:")?;
        writeln!(self.writer, "    Average speed: {}", results.ave_v)?;
        writeln!(
            self.writer,
            "    Average speed ratio: {}",
            results.ave_vratio
        )?;
        writeln!(
            self.writer,
            "    Trips completion: {} / {}",
            results.trips_completed, results.trips_total
        )?;
        Ok(())
    }

    /// Writes the description of the scenario on the writer sink.
    ///
    /// Does nothing when printing is disabled.
    pub fn print_scenario_stats(&mut self) -> Result<()> {
        if !self.parameters.print_mode {
            return Ok(());
        }
        writeln!(self.writer, "Scenario statistics:")?;
        writeln!(self.writer, "    duration: {} s", self.parameters.t_max)?;
        writeln!(self.writer, "    timesteps: {}", self.total_timesteps)?;
        writeln!(self.writer, "    nodes: {}", self.network.nb_nodes())?;
        writeln!(self.writer, "    links: {}", self.network.nb_links())?;
        writeln!(
            self.writer,
            "    platoon size: {} veh",
            self.parameters.delta_n
        )?;
        writeln!(self.writer, "    platoons: {}", self.vehicles.len())?;
        writeln!(
            self.writer,
            "    vehicles: {} veh",
            self.vehicles.len() as f64 * self.parameters.delta_n
        )?;
        Ok(())
    }
}
