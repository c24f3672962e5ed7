// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Mesonet: a mesoscopic dynamic traffic-network simulator.
//!
//! A scenario is a directed road graph with time-varying origin-destination demand,
//! optional traffic signals and outflow-capacity constraints. The simulation produces
//! a discrete-time evolution of vehicle positions and cumulative flows on each link,
//! per-trip travel times and network-level averages.
//!
//! Link dynamics follow Newell's car-following rule with constants derived from the
//! triangular fundamental diagram. Vehicles transfer between links under
//! merge-priority, signal-phase and outflow-capacity constraints, and choose their
//! routes from per-destination link preferences updated towards the current shortest
//! paths (a damped dynamic user optimum).
#![doc(html_no_source)]

pub mod choice;
pub mod demand;
pub mod learning;
pub mod logging;
pub mod network;
pub mod parameters;
pub mod simulation;
pub mod skim;
pub mod units;
pub mod vehicle;

// Re-exports.
pub use parameters::Parameters;
pub use simulation::results::SimpleResults;
pub use simulation::Simulation;
