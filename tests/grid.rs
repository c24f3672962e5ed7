use mesonet::units::{Density, Flow, Length, Speed, Time};
use mesonet::{Parameters, Simulation};

const IMAX: usize = 8;

fn node_name(i: usize, j: usize) -> String {
    format!("node{i}-{j}")
}

fn link_name(i: usize, j: usize, k: usize, l: usize, suffix: &str) -> String {
    format!("link{i}-{j}-{k}-{l}{suffix}")
}

/// An 8x8 grid with bidirectional links and four perimeter-to-perimeter demand
/// patterns of 0.05 veh/s each.
fn get_simulation() -> Simulation {
    let parameters = Parameters::new(
        Time(10000.0),
        5.0,
        Time(1.0),
        Time(300.0),
        0.5,
        0.5,
        false,
        42,
        true,
    )
    .unwrap();
    let mut simulation = Simulation::new("grid", parameters);

    for i in 0..IMAX {
        for j in 0..IMAX {
            simulation
                .add_node(&node_name(i, j), i as f64, j as f64)
                .unwrap();
        }
    }
    for i in 0..IMAX {
        for j in 0..IMAX {
            let mut neighbours = Vec::new();
            if i > 0 {
                neighbours.push((i - 1, j, "a"));
            }
            if i < IMAX - 1 {
                neighbours.push((i + 1, j, "b"));
            }
            if j > 0 {
                neighbours.push((i, j - 1, "c"));
            }
            if j < IMAX - 1 {
                neighbours.push((i, j + 1, "d"));
            }
            for (k, l, suffix) in neighbours {
                simulation
                    .add_link(
                        &link_name(i, j, k, l, suffix),
                        &node_name(i, j),
                        &node_name(k, l),
                        Speed(10.0),
                        Density(0.2),
                        Length(1000.0),
                        1.0,
                    )
                    .unwrap();
            }
        }
    }
    for i in 0..IMAX {
        for j in 0..IMAX {
            for (orig, dest) in [
                (node_name(0, i), node_name(IMAX - 1, j)),
                (node_name(i, 0), node_name(j, IMAX - 1)),
                (node_name(IMAX - 1, i), node_name(0, j)),
                (node_name(i, IMAX - 1), node_name(j, 0)),
            ] {
                simulation
                    .add_demand(&orig, &dest, Time(0.0), Time(3000.0), Flow(0.05), &[])
                    .unwrap();
            }
        }
    }
    simulation
}

#[test]
fn grid_network_test() {
    let mut simulation = get_simulation();
    assert_eq!(simulation.network().nb_nodes(), 64);
    // Interior nodes have 4 neighbours, edges 3, corners 2: 4 * 36 + 3 * 24 + 2 * 4
    // links leaving the 64 cells.
    assert_eq!(simulation.network().nb_links(), 224);

    simulation.main_loop(None, None).unwrap();
    let results = simulation.compute_simple_results();

    // 256 origin-destination pairs, each emitting 29 platoons of 5 veh.
    assert_eq!(results.trips_total, 37120.0);
    assert!(
        results.trips_completed > 35000.0,
        "only {} / {} veh completed",
        results.trips_completed,
        results.trips_total
    );
    assert!(results.trips_completed <= results.trips_total);

    // Network-level averages: moderate congestion at 10 m/s free-flow speed.
    assert!(
        results.ave_v.0 > 4.5 && results.ave_v.0 < 6.5,
        "average speed {} out of range",
        results.ave_v
    );
    assert!(
        results.ave_vratio > 0.45 && results.ave_vratio < 0.65,
        "average speed ratio {} out of range",
        results.ave_vratio
    );
}

#[test]
fn grid_conservation_test() {
    let mut simulation = get_simulation();
    simulation.main_loop(None, None).unwrap();

    let last = simulation.total_timesteps() - 1;
    let mut on_links = 0.0;
    for id in 0..simulation.network().nb_links() {
        let edge = simulation.get_link_by_id(id).unwrap();
        let state = simulation.link_state(edge);
        assert!(state.arrival_curve()[last] >= state.departure_curve()[last]);
        on_links += state.arrival_curve()[last] - state.departure_curve()[last];
    }
    let delta_n = simulation.parameters().delta_n;
    let awaiting: f64 = simulation
        .vehicles()
        .iter()
        .filter(|v| !v.state().is_run() && !v.state().is_end())
        .count() as f64
        * delta_n;
    let results = simulation.compute_simple_results();
    assert_eq!(
        on_links + awaiting + results.trips_completed,
        results.trips_total
    );
}
