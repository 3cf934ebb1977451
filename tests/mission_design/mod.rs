use erebus::cosmic::{twobody, Body, FixedEphemeris, KeplerianEphemeris, System};
use erebus::dynamics::PointMassDynamics;
use erebus::md::prelude::*;
use na::Vector6;
use std::sync::Arc;

const SUN_MU: f64 = 1.327_124_400_18e11;
const EARTH_MU: f64 = 3.986_004_33e5;
const MARS_MU: f64 = 4.282_837_36e4;
const AU_KM: f64 = 1.495_978_707e8;

fn departure_epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2024, 6, 1)
}

/// Circular coplanar state at the provided radius and phase angle.
fn circular_state(radius_km: f64, phase_rad: f64, mu: f64) -> Vector6<f64> {
    let speed = (mu / radius_km).sqrt();
    let (sin_phase, cos_phase) = phase_rad.sin_cos();
    Vector6::new(
        radius_km * cos_phase,
        radius_km * sin_phase,
        0.0,
        -speed * sin_phase,
        speed * cos_phase,
        0.0,
    )
}

/// Sun at the origin, Earth and Mars on circular coplanar Keplerian orbits.
fn solar_system() -> System {
    System::new()
        .with_body(Body::new("Sun", SUN_MU, Arc::new(FixedEphemeris::origin())))
        .with_body(Body::new(
            "Earth",
            EARTH_MU,
            Arc::new(KeplerianEphemeris {
                reference_epoch: departure_epoch(),
                reference_state: circular_state(AU_KM, 0.0, SUN_MU),
                mu_km3_s2: SUN_MU,
            }),
        ))
        .with_body(Body::new(
            "Mars",
            MARS_MU,
            Arc::new(KeplerianEphemeris {
                reference_epoch: departure_epoch(),
                reference_state: circular_state(1.524 * AU_KM, 0.8, SUN_MU),
                mu_km3_s2: SUN_MU,
            }),
        ))
}

fn earth_mars_trajectory<'a>(
    system: &'a System,
    leg_kinds: Vec<TransferLegKind>,
    free_variables: Vec<f64>,
) -> PatchedConicTrajectory<'a> {
    PatchedConicTrajectory::new(
        system,
        "Sun",
        vec!["Earth".to_string(), "Mars".to_string()],
        leg_kinds,
        departure_epoch(),
        free_variables,
        None,
        (f64::INFINITY, 0.0),
    )
    .unwrap()
}

#[test]
fn free_variable_packing_is_validated() {
    let system = solar_system();
    let result = PatchedConicTrajectory::new(
        &system,
        "Sun",
        vec!["Earth".to_string(), "Mars".to_string()],
        vec![TransferLegKind::DepartureVelocityDsm],
        departure_epoch(),
        vec![150.0 * 86_400.0], // missing the DSM 4-tuple
        None,
        (f64::INFINITY, 0.0),
    );
    assert!(matches!(
        result,
        Err(TrajectoryError::FreeVariableSize {
            expected: 5,
            got: 1
        })
    ));
}

#[test]
fn missing_ephemeris_is_fatal() {
    let system = System::new()
        .with_body(Body::new("Sun", SUN_MU, Arc::new(FixedEphemeris::origin())))
        .with_body(Body::without_ephemeris("Earth", EARTH_MU))
        .with_body(Body::without_ephemeris("Mars", MARS_MU));

    let trajectory = earth_mars_trajectory(
        &system,
        vec![TransferLegKind::Departure],
        vec![150.0 * 86_400.0],
    );
    assert!(matches!(
        trajectory.solve(),
        Err(TrajectoryError::TrajAstro { .. })
    ));
}

#[test]
fn unknown_minimum_periapse_body_is_fatal() {
    let system = solar_system()
        .with_body(Body::new("Xanadu", 1.0, Arc::new(FixedEphemeris::origin())));
    let result = PatchedConicTrajectory::new(
        &system,
        "Sun",
        vec!["Earth".to_string(), "Xanadu".to_string()],
        vec![TransferLegKind::Departure],
        departure_epoch(),
        vec![150.0 * 86_400.0],
        None,
        (f64::INFINITY, 0.0),
    );
    assert!(matches!(result, Err(TrajectoryError::TrajAstro { .. })));
}

/// With only the exact two-body term, the full problem degenerates to the
/// analytic case: the comparison maps must agree at every sampled epoch.
#[test]
fn departure_leg_two_body_comparison_is_exact() {
    let _ = pretty_env_logger::try_init();

    let system = solar_system();
    let tof_s = 150.0 * 86_400.0;
    let trajectory = earth_mars_trajectory(
        &system,
        vec![TransferLegKind::Departure],
        vec![tof_s],
    );

    let dynamics = PointMassDynamics::two_body(system.clone(), "Sun");
    let comparator = TrajectoryComparator {
        system: &system,
        dynamics: &dynamics,
        settings: IntegratorSettings::from_step(12.hours()),
        central_body: "Sun".to_string(),
        terminate_on_sphere_of_influence: false,
    };

    let results = comparator.compare(&trajectory).unwrap();
    assert_eq!(results.tokens, vec!["Earth".to_string(), "Mars".to_string()]);
    assert_eq!(results.per_leg.len(), 1);

    let comparison = &results.per_leg[&0];
    assert_eq!(
        comparison.analytic.keys().collect::<Vec<_>>(),
        comparison.numerical.keys().collect::<Vec<_>>(),
        "both maps must be sampled at the integrator's epochs"
    );

    // The leg spans the full flight time.
    let (first, last) = (
        *comparison.numerical.first_key_value().unwrap().0,
        *comparison.numerical.last_key_value().unwrap().0,
    );
    assert_eq!(first, departure_epoch());
    assert_eq!((last - first).to_seconds(), tof_s);

    for (epoch, difference) in comparison.difference() {
        let relative = difference.norm() / comparison.analytic[&epoch].norm();
        assert!(
            relative < 1e-6,
            "state difference at {epoch} is {relative:e} relative"
        );
    }

    let boundaries = results.boundary_differences();
    let (at_departure, at_arrival) = boundaries[&0];
    assert!(at_departure.norm() < 1e-3);
    assert!(at_arrival.norm() / (1.524 * AU_KM) < 1e-6);
}

/// A DSM leg splits into two sub-legs: a Keplerian coast integrated outward
/// from its midpoint, and a Lambert arc from the maneuver to the arrival body.
#[test]
fn velocity_dsm_leg_produces_two_sub_legs() {
    let system = solar_system();
    let tof_s = 200.0 * 86_400.0;
    let trajectory = earth_mars_trajectory(
        &system,
        vec![TransferLegKind::DepartureVelocityDsm],
        vec![tof_s, 0.4, 1.5, 0.3, 0.0],
    );

    let dynamics = PointMassDynamics::two_body(system.clone(), "Sun");
    let comparator = TrajectoryComparator {
        system: &system,
        dynamics: &dynamics,
        settings: IntegratorSettings::from_step(12.hours()),
        central_body: "Sun".to_string(),
        terminate_on_sphere_of_influence: false,
    };

    let results = comparator.compare(&trajectory).unwrap();
    assert_eq!(
        results.tokens,
        vec![
            "Earth".to_string(),
            "DSM_1".to_string(),
            "Mars".to_string()
        ]
    );
    assert_eq!(results.per_leg.len(), 2);

    for (counter, comparison) in &results.per_leg {
        assert_eq!(
            comparison.analytic.keys().collect::<Vec<_>>(),
            comparison.numerical.keys().collect::<Vec<_>>(),
        );
        for (epoch, difference) in comparison.difference() {
            let relative = difference.norm() / comparison.analytic[&epoch].norm();
            assert!(
                relative < 1e-6,
                "sub-leg {counter} state difference at {epoch} is {relative:e} relative"
            );
        }
    }

    // The first sub-leg starts at departure; the second ends at arrival.
    let first_leg = &results.per_leg[&0];
    let second_leg = &results.per_leg[&1];
    assert_eq!(
        *first_leg.numerical.first_key_value().unwrap().0,
        departure_epoch()
    );
    let arrival = *second_leg.numerical.last_key_value().unwrap().0;
    assert_eq!((arrival - departure_epoch()).to_seconds(), tof_s);
    // The sub-legs meet at the maneuver epoch.
    assert_eq!(
        *first_leg.numerical.last_key_value().unwrap().0,
        *second_leg.numerical.first_key_value().unwrap().0,
    );
}

#[test]
fn soi_termination_bounds_the_leg() {
    let system = solar_system();
    let tof_s = 150.0 * 86_400.0;
    let arrival_epoch = departure_epoch() + Duration::from_seconds(tof_s);

    let pair = erebus::md::comparison::single_leg_soi_termination(
        &system,
        "Sun",
        "Earth",
        "Mars",
        departure_epoch(),
        arrival_epoch,
    )
    .unwrap();

    match &pair.forward {
        TerminationCondition::Hybrid {
            body, distance_km, ..
        } => {
            assert_eq!(body, "Mars");
            // Mars SOI is around 0.58e6 km at 1.524 AU.
            assert!((*distance_km - 5.8e5).abs() < 5e4, "Mars SOI was {distance_km} km");
        }
        _ => panic!("expected a hybrid termination condition"),
    }
    match &pair.backward {
        TerminationCondition::Hybrid { body, distance_km, .. } => {
            assert_eq!(body, "Earth");
            assert!((*distance_km - 9.2e5).abs() < 5e4, "Earth SOI was {distance_km} km");
        }
        _ => panic!("expected a hybrid termination condition"),
    }

    // A no-DSM leg propagated with SOI termination stops inside the arrival
    // sphere of influence, before the arrival epoch.
    let trajectory = earth_mars_trajectory(
        &system,
        vec![TransferLegKind::Departure],
        vec![tof_s],
    );
    let dynamics = PointMassDynamics::two_body(system.clone(), "Sun");
    let comparator = TrajectoryComparator {
        system: &system,
        dynamics: &dynamics,
        settings: IntegratorSettings::from_step(6.hours()),
        central_body: "Sun".to_string(),
        terminate_on_sphere_of_influence: true,
    };
    let results = comparator.compare(&trajectory).unwrap();
    let comparison = &results.per_leg[&0];
    let (last_epoch, last_state) = comparison.numerical.last_key_value().unwrap();
    assert!(*last_epoch <= arrival_epoch);

    let mars_state = system.state_of("Mars", *last_epoch).unwrap();
    let distance = ((last_state[0] - mars_state[0]).powi(2)
        + (last_state[1] - mars_state[1]).powi(2)
        + (last_state[2] - mars_state[2]).powi(2))
    .sqrt();
    assert!(
        distance < 6.5e5,
        "propagation stopped {distance} km from Mars"
    );
}

/// Sphere-of-influence termination with DSM legs degrades to time-bounded
/// termination (with a warning) instead of failing.
#[test]
fn soi_termination_with_dsm_degrades_gracefully() {
    let _ = pretty_env_logger::try_init();

    let system = solar_system();
    let tof_s = 200.0 * 86_400.0;
    let trajectory = earth_mars_trajectory(
        &system,
        vec![TransferLegKind::DepartureVelocityDsm],
        vec![tof_s, 0.4, 1.5, 0.3, 0.0],
    );

    let dynamics = PointMassDynamics::two_body(system.clone(), "Sun");
    let comparator = TrajectoryComparator {
        system: &system,
        dynamics: &dynamics,
        settings: IntegratorSettings::from_step(1.days()),
        central_body: "Sun".to_string(),
        terminate_on_sphere_of_influence: true,
    };

    let results = comparator.compare(&trajectory).unwrap();
    assert_eq!(results.per_leg.len(), 2);
    // Time-bounded: the last sub-leg ends exactly at the arrival epoch.
    let arrival = *results.per_leg[&1].numerical.last_key_value().unwrap().0;
    assert_eq!(
        (arrival - departure_epoch()).to_seconds(),
        tof_s
    );
}

#[test]
fn kepler_leg_comparison_midpoint_split() {
    // Directly exercise the midpoint scheme on a circular heliocentric coast.
    let system = solar_system();
    let dynamics = PointMassDynamics::two_body(system.clone(), "Sun");

    let state = circular_state(AU_KM, 0.0, SUN_MU);
    let tof_s = 30.0 * 86_400.0;

    let comparison = erebus::md::comparison::compare_kepler_leg(
        &dynamics,
        IntegratorSettings::from_step(6.hours()),
        SUN_MU,
        departure_epoch(),
        tof_s,
        na::Vector3::new(state[0], state[1], state[2]),
        na::Vector3::new(state[3], state[4], state[5]),
        &erebus::md::comparison::TerminationPair {
            backward: TerminationCondition::Epoch(departure_epoch()),
            forward: TerminationCondition::Epoch(
                departure_epoch() + Duration::from_seconds(tof_s),
            ),
        },
    )
    .unwrap();

    // Covers the full leg: from departure to arrival through the midpoint.
    assert_eq!(
        *comparison.numerical.first_key_value().unwrap().0,
        departure_epoch()
    );
    assert_eq!(
        (*comparison.numerical.last_key_value().unwrap().0 - departure_epoch()).to_seconds(),
        tof_s
    );

    for (epoch, difference) in comparison.difference() {
        assert!(
            difference.norm() / AU_KM < 1e-8,
            "difference at {epoch} is {:e} km",
            difference.norm()
        );
    }

    // The analytic reference at departure is the departure state itself.
    let analytic_departure = comparison.analytic[&departure_epoch()];
    assert!((analytic_departure - state).norm() < 1e-3);
}

#[test]
fn lambert_vs_kepler_cross_check() {
    // The Lambert solution for a coast geometry reproduces the coast itself.
    let state = circular_state(AU_KM, 0.0, SUN_MU);
    let tof_s = 45.0 * 86_400.0;
    let arrival = twobody::propagate_kepler(&state, tof_s, SUN_MU);

    let solution = erebus::tools::lambert::standard(
        na::Vector3::new(state[0], state[1], state[2]),
        na::Vector3::new(arrival[0], arrival[1], arrival[2]),
        tof_s,
        SUN_MU,
        erebus::tools::lambert::TransferKind::Auto,
    )
    .unwrap();

    let v_expected = na::Vector3::new(state[3], state[4], state[5]);
    assert!(
        (solution.v_init - v_expected).norm() < 1e-3,
        "Lambert departure velocity off by {:e} km/s",
        (solution.v_init - v_expected).norm()
    );
}
