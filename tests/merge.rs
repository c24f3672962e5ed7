use mesonet::units::{Density, Flow, Length, Speed, Time};
use mesonet::{Parameters, Simulation};

/// Two origins merging into a single downstream link.
///
/// Joint demand peaks at 1.05 veh/s while the merge can transfer at most one platoon
/// (1 veh/s) per tick, so a small queue builds up and drains after the demand ends.
fn get_simulation() -> Simulation {
    // Repeated initialization attempts are fine, only the first one takes effect.
    let _ = mesonet::logging::initialize_logging();
    let parameters = Parameters::new(
        Time(1200.0),
        5.0,
        Time(1.0),
        Time(300.0),
        0.25,
        0.5,
        false,
        42,
        true,
    )
    .unwrap();
    let mut simulation = Simulation::new("merge", parameters);
    simulation.add_node("orig1", 0.0, 0.0).unwrap();
    simulation.add_node("orig2", 0.0, 2.0).unwrap();
    simulation.add_node("merge", 1.0, 1.0).unwrap();
    simulation.add_node("dest", 2.0, 1.0).unwrap();
    simulation
        .add_link(
            "link1",
            "orig1",
            "merge",
            Speed(20.0),
            Density(0.2),
            Length(1000.0),
            0.5,
        )
        .unwrap();
    simulation
        .add_link(
            "link2",
            "orig2",
            "merge",
            Speed(20.0),
            Density(0.2),
            Length(1000.0),
            2.0,
        )
        .unwrap();
    simulation
        .add_link(
            "link3",
            "merge",
            "dest",
            Speed(20.0),
            Density(0.2),
            Length(1000.0),
            1.0,
        )
        .unwrap();
    simulation
        .add_demand("orig1", "dest", Time(0.0), Time(1000.0), Flow(0.45), &[])
        .unwrap();
    simulation
        .add_demand("orig2", "dest", Time(400.0), Time(1000.0), Flow(0.6), &[])
        .unwrap();
    simulation
}

fn curves(simulation: &Simulation, link: &str) -> (Vec<f64>, Vec<f64>) {
    let edge = simulation.get_link(link).unwrap();
    let state = simulation.link_state(edge);
    (
        state.arrival_curve().to_vec(),
        state.departure_curve().to_vec(),
    )
}

#[test]
fn scenario_stats_test() {
    let simulation = get_simulation();
    assert_eq!(simulation.total_timesteps(), 240);
    assert_eq!(simulation.network().nb_nodes(), 4);
    assert_eq!(simulation.network().nb_links(), 3);
    // 0.45 veh/s over 1000 s emits 89 platoons, 0.6 veh/s over 600 s emits 71.
    assert_eq!(simulation.vehicles().len(), 160);
    let results = simulation.compute_simple_results();
    assert_eq!(results.trips_total, 800.0);
    assert_eq!(results.trips_completed, 0.0);
}

#[test]
fn vehicle_names_test() {
    let simulation = get_simulation();
    // The first platoon of the first demand departs once 5 veh have accumulated at
    // 2.25 veh per tick, i.e. at t = 15.
    assert_eq!(simulation.vehicles()[0].name(), "orig1-dest-15");
    assert!(simulation.get_vehicle("orig1-dest-15").is_ok());
    assert!(simulation.get_vehicle("nobody").is_err());
    assert!(simulation.get_node("nowhere").is_err());
    assert!(simulation.get_link("ghost").is_err());
}

#[test]
fn main_loop_argument_test() {
    let mut simulation = get_simulation();
    assert!(simulation
        .main_loop(Some(Time(100.0)), Some(Time(100.0)))
        .is_err());
    // The failed call must not have advanced the clock.
    assert_eq!(simulation.timestep(), 0);
}

#[test]
fn merge_invariants_test() {
    let mut simulation = get_simulation();
    simulation.main_loop(None, None).unwrap();
    assert!(!simulation.check_simulation_ongoing());

    let total_timesteps = simulation.total_timesteps();
    let mut final_on_links = 0.0;
    for link in ["link1", "link2", "link3"] {
        let (arrivals, departures) = curves(&simulation, link);
        assert_eq!(arrivals.len(), total_timesteps);
        for t in 0..total_timesteps {
            if t > 0 {
                assert!(
                    arrivals[t] >= arrivals[t - 1],
                    "arrival curve of {link} decreases at tick {t}"
                );
                assert!(
                    departures[t] >= departures[t - 1],
                    "departure curve of {link} decreases at tick {t}"
                );
            }
            assert!(
                arrivals[t] >= departures[t],
                "departures of {link} exceed arrivals at tick {t}"
            );
        }
        final_on_links += arrivals[total_timesteps - 1] - departures[total_timesteps - 1];
    }

    // Conservation: vehicles still on the links, vehicles awaiting departure and
    // completed trips must add up to the scenario total.
    let results = simulation.compute_simple_results();
    let delta_n = simulation.parameters().delta_n;
    let awaiting: f64 = simulation
        .vehicles()
        .iter()
        .filter(|v| !v.state().is_run() && !v.state().is_end())
        .count() as f64
        * delta_n;
    assert_eq!(
        final_on_links + awaiting + results.trips_completed,
        results.trips_total
    );

    // The queue drains before the end of the period: most trips complete.
    assert!(
        results.trips_completed >= 700.0,
        "only {} veh completed",
        results.trips_completed
    );
    assert!(results.trips_completed <= results.trips_total);
    assert!(
        results.ave_v.0 > 5.0 && results.ave_v.0 < 20.0,
        "implausible average speed {}",
        results.ave_v
    );
    assert!(results.ave_vratio > 0.25 && results.ave_vratio <= 1.0);
}

#[test]
fn spacing_and_clamp_test() {
    let mut simulation = get_simulation();
    let delta_n = simulation.parameters().delta_n;
    // Inspect the traffic mid-run, while the links are loaded.
    for _ in 0..6 {
        simulation.main_loop(Some(Time(100.0)), None).unwrap();
        for link in ["link1", "link2", "link3"] {
            let edge = simulation.get_link(link).unwrap();
            let length = simulation.link(edge).length();
            let min_spacing = simulation.link(edge).delta() * delta_n;
            let on_link: Vec<_> = simulation
                .link_state(edge)
                .vehicles()
                .iter()
                .map(|&v| simulation.vehicle(v).x())
                .collect();
            for x in &on_link {
                assert!(x.0 >= 0.0 && *x <= length, "position {x} outside {link}");
            }
            // The queue runs from the most downstream vehicle to the most recent
            // entrant; consecutive vehicles keep at least one platoon of jam spacing.
            for pair in on_link.windows(2) {
                assert!(
                    pair[0].0 - pair[1].0 >= min_spacing.0 - 1e-9,
                    "spacing violation on {link}: {} behind {}",
                    pair[1],
                    pair[0]
                );
            }
        }
    }
}

#[test]
fn deterministic_replay_test() {
    let mut first = get_simulation();
    first.main_loop(None, None).unwrap();
    let mut second = get_simulation();
    second.main_loop(None, None).unwrap();

    for link in ["link1", "link2", "link3"] {
        assert_eq!(curves(&first, link), curves(&second, link));
    }
    let first_results = first.compute_simple_results();
    let second_results = second.compute_simple_results();
    assert_eq!(first_results.trips_completed, second_results.trips_completed);
    assert_eq!(first_results.ave_v.0, second_results.ave_v.0);
    for (a, b) in first.vehicles().iter().zip(second.vehicles().iter()) {
        assert_eq!(a.state(), b.state());
        assert_eq!(a.arrival_time(), b.arrival_time());
    }
}

#[test]
fn resumability_test() {
    let mut full = get_simulation();
    full.main_loop(None, None).unwrap();

    let mut chunked = get_simulation();
    while chunked.check_simulation_ongoing() {
        chunked.main_loop(Some(Time(100.0)), None).unwrap();
    }

    assert_eq!(chunked.timestep(), full.timestep());
    for link in ["link1", "link2", "link3"] {
        assert_eq!(
            curves(&full, link),
            curves(&chunked, link),
            "running in chunks changed the curves of {link}"
        );
    }
    assert_eq!(
        full.compute_simple_results().trips_completed,
        chunked.compute_simple_results().trips_completed
    );
}
