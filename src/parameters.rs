//! Scalar configuration of a simulation.
use anyhow::{bail, Result};
use serde_derive::{Deserialize, Serialize};

use crate::units::Time;

/// Scalar configuration of a simulation.
///
/// The simulation timestep is `delta_t = tau * delta_n`: a platoon of `delta_n`
/// vehicles reacts as a single unit with reaction time `tau` per vehicle.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Parameters {
    /// Duration of the simulated period, in seconds.
    pub t_max: Time,
    /// Platoon size, in vehicles.
    pub delta_n: f64,
    /// Reaction time per vehicle, in seconds.
    pub tau: Time,
    /// Interval between two route-preference updates, in seconds.
    pub duo_update_time: Time,
    /// Weight of the current shortest path in the route-preference update.
    pub duo_update_weight: f64,
    /// Noise level of the route choice.
    pub route_choice_uncertainty: f64,
    /// Whether progress and reports are printed.
    pub print_mode: bool,
    /// Seed of the random number generator.
    pub random_seed: u64,
    /// Whether per-tick vehicle logs are recorded.
    pub vehicle_log_mode: bool,
}

impl Parameters {
    /// Creates a new set of parameters, validating their ranges.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        t_max: Time,
        delta_n: f64,
        tau: Time,
        duo_update_time: Time,
        duo_update_weight: f64,
        route_choice_uncertainty: f64,
        print_mode: bool,
        random_seed: u64,
        vehicle_log_mode: bool,
    ) -> Result<Self> {
        if t_max.0 <= 0.0 {
            bail!("The value of `t_max` must be positive, got {t_max}");
        }
        if delta_n <= 0.0 {
            bail!("The value of `delta_n` must be positive, got {delta_n}");
        }
        if tau.0 <= 0.0 {
            bail!("The value of `tau` must be positive, got {tau}");
        }
        if !(0.0..=1.0).contains(&duo_update_weight) {
            bail!("The value of `duo_update_weight` must be between 0 and 1, got {duo_update_weight}");
        }
        Ok(Parameters {
            t_max,
            delta_n,
            tau,
            duo_update_time,
            duo_update_weight,
            route_choice_uncertainty,
            print_mode,
            random_seed,
            vehicle_log_mode,
        })
    }

    /// Returns the width of a simulation timestep.
    pub fn delta_t(&self) -> Time {
        self.tau * self.delta_n
    }

    /// Returns the total number of simulation timesteps.
    pub fn total_timesteps(&self) -> usize {
        (self.t_max / self.delta_t()).floor() as usize
    }

    /// Returns the number of timesteps between two route-preference updates.
    pub fn timestep_for_route_update(&self) -> usize {
        (self.duo_update_time / self.delta_t()).floor() as usize
    }
}
