/*
    Erebus, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Leg-by-leg comparison of the analytic patched-conic trajectory against the
//! fully numerically integrated problem.

use super::trajectory::PatchedConicTrajectory;
use super::TrajectoryError;
use crate::cosmic::twobody::{
    cartesian_to_keplerian, orbital_period_s, propagate_kepler, sphere_of_influence,
    synodic_period_s,
};
use crate::cosmic::System;
use crate::dynamics::Dynamics;
use crate::linalg::{Vector3, Vector6};
use crate::propagators::{IntegratorSettings, Propagator, TerminationCondition};
use crate::time::{Duration, Epoch};
use std::collections::BTreeMap;

/// The time-aligned comparison of one (sub-)leg: the analytic reference and
/// the numerically integrated states, keyed by the same sampled epochs.
#[derive(Clone, Debug, Default)]
pub struct LegComparison {
    pub analytic: BTreeMap<Epoch, Vector6<f64>>,
    pub numerical: BTreeMap<Epoch, Vector6<f64>>,
}

impl LegComparison {
    /// The (analytic - numerical) state difference at every sampled epoch.
    pub fn difference(&self) -> BTreeMap<Epoch, Vector6<f64>> {
        self.analytic
            .iter()
            .map(|(epoch, analytic)| (*epoch, analytic - self.numerical[epoch]))
            .collect()
    }

    /// The (analytic - numerical) differences at the first and last sampled
    /// epochs, i.e. at the leg departure and arrival.
    pub fn boundary_difference(&self) -> Option<(Vector6<f64>, Vector6<f64>)> {
        let (first_epoch, first_analytic) = self.analytic.first_key_value()?;
        let (last_epoch, last_analytic) = self.analytic.last_key_value()?;
        Some((
            first_analytic - self.numerical[first_epoch],
            last_analytic - self.numerical[last_epoch],
        ))
    }
}

/// Backward and forward termination conditions of one leg propagation.
#[derive(Clone)]
pub struct TerminationPair {
    pub backward: TerminationCondition,
    pub forward: TerminationCondition,
}

/// Compares a Lambert transfer arc against the full problem, propagating the
/// dynamics once from the departure epoch with the Lambert departure velocity.
///
/// The analytic reference is the two-body coast of the same initial state,
/// evaluated at every epoch the integrator sampled.
#[allow(clippy::too_many_arguments)]
pub fn compare_lambert_leg<D: Dynamics>(
    dynamics: &D,
    settings: IntegratorSettings,
    mu_central: f64,
    departure_epoch: Epoch,
    time_of_flight_s: f64,
    departure_position: Vector3<f64>,
    arrival_position: Vector3<f64>,
    termination: &TerminationCondition,
) -> Result<LegComparison, TrajectoryError> {
    let arc = crate::tools::lambert::standard(
        departure_position,
        arrival_position,
        time_of_flight_s,
        mu_central,
        crate::tools::lambert::TransferKind::Auto,
    )
    .map_err(|source| TrajectoryError::TrajLambert { source })?;

    let initial_state = Vector6::new(
        departure_position[0],
        departure_position[1],
        departure_position[2],
        arc.v_init[0],
        arc.v_init[1],
        arc.v_init[2],
    );

    let forward_settings = if settings.step.to_seconds() < 0.0 {
        settings.reversed()
    } else {
        settings
    };
    let propagator: Propagator<'_, D> = Propagator::new(dynamics, forward_settings);
    let numerical = propagator
        .propagate(departure_epoch, initial_state, termination)
        .map_err(|source| TrajectoryError::TrajProp { source })?;

    let analytic = numerical
        .keys()
        .map(|epoch| {
            (
                *epoch,
                propagate_kepler(
                    &initial_state,
                    (*epoch - departure_epoch).to_seconds(),
                    mu_central,
                ),
            )
        })
        .collect();

    Ok(LegComparison { analytic, numerical })
}

/// Compares a Keplerian coast against the full problem using the midpoint
/// split: the analytic coast is evaluated at the temporal midpoint of the leg,
/// and the full dynamics are integrated forward from the midpoint to the leg
/// end and backward from the midpoint to the leg start.
///
/// The only well-defined boundary condition of such a leg is the departure
/// state, so propagating outward from an interior reference point avoids
/// re-deriving the far boundary independently.
#[allow(clippy::too_many_arguments)]
pub fn compare_kepler_leg<D: Dynamics>(
    dynamics: &D,
    settings: IntegratorSettings,
    mu_central: f64,
    departure_epoch: Epoch,
    time_of_flight_s: f64,
    departure_position: Vector3<f64>,
    velocity_after_departure: Vector3<f64>,
    termination: &TerminationPair,
) -> Result<LegComparison, TrajectoryError> {
    let departure_state = Vector6::new(
        departure_position[0],
        departure_position[1],
        departure_position[2],
        velocity_after_departure[0],
        velocity_after_departure[1],
        velocity_after_departure[2],
    );

    let halved_tof_s = time_of_flight_s / 2.0;
    let midpoint_epoch = departure_epoch + Duration::from_seconds(halved_tof_s);
    let midpoint_state = propagate_kepler(&departure_state, halved_tof_s, mu_central);

    let forward_settings = if settings.step.to_seconds() < 0.0 {
        settings.reversed()
    } else {
        settings
    };

    let forward: Propagator<'_, D> = Propagator::new(dynamics, forward_settings);
    let mut numerical = forward
        .propagate(midpoint_epoch, midpoint_state, &termination.forward)
        .map_err(|source| TrajectoryError::TrajProp { source })?;

    let backward: Propagator<'_, D> = Propagator::new(dynamics, forward_settings.reversed());
    numerical.extend(
        backward
            .propagate(midpoint_epoch, midpoint_state, &termination.backward)
            .map_err(|source| TrajectoryError::TrajProp { source })?,
    );

    let analytic = numerical
        .keys()
        .map(|epoch| {
            (
                *epoch,
                propagate_kepler(
                    &midpoint_state,
                    (*epoch - midpoint_epoch).to_seconds(),
                    mu_central,
                ),
            )
        })
        .collect();

    Ok(LegComparison { analytic, numerical })
}

/// Builds the backward and forward termination conditions of one leg from the
/// sphere-of-influence radii of its departure and arrival bodies, bounded by
/// twice the synodic period of the two orbits.
pub fn single_leg_soi_termination(
    system: &System,
    central_body: &str,
    departure_body: &str,
    arrival_body: &str,
    leg_start: Epoch,
    leg_end: Epoch,
) -> Result<TerminationPair, TrajectoryError> {
    let departure_ephemeris = system
        .ephemeris(departure_body)
        .map_err(|source| TrajectoryError::TrajAstro { source })?
        .clone();
    let arrival_ephemeris = system
        .ephemeris(arrival_body)
        .map_err(|source| TrajectoryError::TrajAstro { source })?
        .clone();

    let mu_central = system
        .mu(central_body)
        .map_err(|source| TrajectoryError::TrajAstro { source })?;
    let mu_departure = system
        .mu(departure_body)
        .map_err(|source| TrajectoryError::TrajAstro { source })?;
    let mu_arrival = system
        .mu(arrival_body)
        .map_err(|source| TrajectoryError::TrajAstro { source })?;

    let central_at_start = system
        .state_of(central_body, leg_start)
        .map_err(|source| TrajectoryError::TrajAstro { source })?;
    let central_at_end = system
        .state_of(central_body, leg_end)
        .map_err(|source| TrajectoryError::TrajAstro { source })?;
    let departure_state = departure_ephemeris.state_at(leg_start) - central_at_start;
    let arrival_state = arrival_ephemeris.state_at(leg_end) - central_at_end;

    let departure_distance =
        Vector3::new(departure_state[0], departure_state[1], departure_state[2]).norm();
    let arrival_distance =
        Vector3::new(arrival_state[0], arrival_state[1], arrival_state[2]).norm();

    let soi_departure = sphere_of_influence(departure_distance, mu_departure, mu_central);
    let soi_arrival = sphere_of_influence(arrival_distance, mu_arrival, mu_central);

    let departure_period = orbital_period_s(
        cartesian_to_keplerian(&departure_state, mu_central)[0],
        mu_central + mu_departure,
    );
    let arrival_period = orbital_period_s(
        cartesian_to_keplerian(&arrival_state, mu_central)[0],
        mu_central + mu_arrival,
    );
    let synodic_s = synodic_period_s(departure_period, arrival_period);
    let max_elapsed = Duration::from_seconds(2.0 * synodic_s);

    Ok(TerminationPair {
        backward: TerminationCondition::Hybrid {
            body: departure_body.to_string(),
            ephemeris: departure_ephemeris,
            distance_km: soi_departure,
            max_elapsed,
        },
        forward: TerminationCondition::Hybrid {
            body: arrival_body.to_string(),
            ephemeris: arrival_ephemeris,
            distance_km: soi_arrival,
            max_elapsed,
        },
    })
}

/// The per-sub-leg comparison maps of one itinerary, keyed by the sub-leg
/// counter (a DSM leg contributes two consecutive keys).
pub struct TrajectoryComparisonResults {
    pub per_leg: BTreeMap<usize, LegComparison>,
    /// The expanded (body, DSM) token order matching the maneuver points
    pub tokens: Vec<String>,
}

impl TrajectoryComparisonResults {
    /// The (departure, arrival) boundary state differences of every sub-leg.
    pub fn boundary_differences(&self) -> BTreeMap<usize, (Vector6<f64>, Vector6<f64>)> {
        self.per_leg
            .iter()
            .filter_map(|(counter, comparison)| {
                comparison
                    .boundary_difference()
                    .map(|diff| (*counter, diff))
            })
            .collect()
    }
}

/// Walks an itinerary leg by leg, comparing every analytic (sub-)leg against
/// the full numerically integrated problem.
pub struct TrajectoryComparator<'a, D: Dynamics> {
    pub system: &'a System,
    pub dynamics: &'a D,
    pub settings: IntegratorSettings,
    pub central_body: String,
    /// Terminate leg propagations on the sphere-of-influence crossing of the
    /// boundary bodies instead of at the leg boundary epochs.
    pub terminate_on_sphere_of_influence: bool,
}

impl<D: Dynamics> TrajectoryComparator<'_, D> {
    /// Evaluates the patched-conic trajectory once and compares every leg
    /// (splitting DSM legs in two at the maneuver epoch) against the full
    /// problem.
    pub fn compare(
        &self,
        trajectory: &PatchedConicTrajectory,
    ) -> Result<TrajectoryComparisonResults, TrajectoryError> {
        let solution = trajectory.solve()?;
        let kinds = trajectory.leg_kinds();
        let body_order = trajectory.body_order();

        let any_dsm = kinds.iter().any(|kind| kind.has_dsm());
        let terminate_on_soi = if self.terminate_on_sphere_of_influence && any_dsm {
            warn!(
                "sphere-of-influence termination is not available for itineraries with DSM legs: \
                 propagations stop at the leg boundary epochs instead"
            );
            false
        } else {
            self.terminate_on_sphere_of_influence
        };

        // Insert a maneuver token between a leg's bodies whenever it embeds a
        // DSM, keeping the token order aligned with the maneuver-point list.
        let mut tokens = Vec::new();
        let mut dsm_counter = 1_usize;
        for (i, kind) in kinds.iter().enumerate() {
            tokens.push(body_order[i].clone());
            if kind.has_dsm() {
                tokens.push(format!("DSM_{dsm_counter}"));
                dsm_counter += 1;
            }
        }
        tokens.push(body_order[body_order.len() - 1].clone());

        let mu_central = self
            .system
            .mu(&self.central_body)
            .map_err(|source| TrajectoryError::TrajAstro { source })?;

        let maneuvers = &solution.maneuvers;
        let mut per_leg = BTreeMap::new();
        let mut leg_counter = 0_usize;

        for (i, kind) in kinds.iter().enumerate() {
            let leg = &solution.legs[i];

            if !kind.has_dsm() {
                let departure = &maneuvers[leg_counter];
                let arrival = &maneuvers[leg_counter + 1];

                let termination = if terminate_on_soi {
                    single_leg_soi_termination(
                        self.system,
                        &self.central_body,
                        &body_order[i],
                        &body_order[i + 1],
                        departure.epoch,
                        arrival.epoch,
                    )?
                    .forward
                } else {
                    TerminationCondition::Epoch(arrival.epoch)
                };

                let comparison = compare_lambert_leg(
                    self.dynamics,
                    self.settings,
                    mu_central,
                    departure.epoch,
                    (arrival.epoch - departure.epoch).to_seconds(),
                    departure.position,
                    arrival.position,
                    &termination,
                )?;
                per_leg.insert(leg_counter, comparison);
                leg_counter += 1;
            } else {
                let departure = &maneuvers[leg_counter];
                let dsm = &maneuvers[leg_counter + 1];
                let arrival = &maneuvers[leg_counter + 2];

                let (_, _, velocity_after_departure) = leg.departure_variables()?;

                // First sub-leg: Keplerian coast, integrated outward from its
                // temporal midpoint in both directions.
                let first = compare_kepler_leg(
                    self.dynamics,
                    self.settings,
                    mu_central,
                    departure.epoch,
                    (dsm.epoch - departure.epoch).to_seconds(),
                    departure.position,
                    velocity_after_departure,
                    &TerminationPair {
                        backward: TerminationCondition::Epoch(departure.epoch),
                        forward: TerminationCondition::Epoch(dsm.epoch),
                    },
                )?;
                per_leg.insert(leg_counter, first);

                // Second sub-leg: direct Lambert comparison from the DSM to
                // the arrival body.
                let second = compare_lambert_leg(
                    self.dynamics,
                    self.settings,
                    mu_central,
                    dsm.epoch,
                    (arrival.epoch - dsm.epoch).to_seconds(),
                    dsm.position,
                    arrival.position,
                    &TerminationCondition::Epoch(arrival.epoch),
                )?;
                per_leg.insert(leg_counter + 1, second);
                leg_counter += 2;
            }
        }

        Ok(TrajectoryComparisonResults { per_leg, tokens })
    }
}
