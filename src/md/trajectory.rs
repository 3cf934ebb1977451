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

use super::legs::{BoundaryKind, DsmFormulation, LegGeometry, TransferLeg, TransferLegKind};
use super::TrajectoryError;
use crate::cosmic::{default_minimum_periapse_radii, System};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};

/// One burn of the patched-conic itinerary: a departure, swingby or arrival
/// body passage, or a deep-space maneuver between bodies.
#[derive(Clone, Debug)]
pub struct ManeuverPoint {
    pub position: Vector3<f64>,
    pub epoch: Epoch,
    pub delta_v: f64,
}

/// The evaluated patched-conic trajectory: every maneuver point in itinerary
/// order and the solved legs they came from.
#[derive(Clone, Debug)]
pub struct TrajectorySolution {
    pub maneuvers: Vec<ManeuverPoint>,
    pub total_delta_v: f64,
    pub legs: Vec<TransferLeg>,
}

/// A multi-gravity-assist patched-conic trajectory, built from an ordered body
/// itinerary, the per-leg variant kinds and the packed free-variable vector.
///
/// The free variables are `[tof_1 .. tof_N]` in seconds, followed by one
/// 4-tuple per DSM leg in itinerary order.
pub struct PatchedConicTrajectory<'a> {
    system: &'a System,
    central_body: String,
    body_order: Vec<String>,
    leg_kinds: Vec<TransferLegKind>,
    departure_epoch: Epoch,
    free_variables: Vec<f64>,
    minimum_periapse_radii: Vec<f64>,
    departure_orbit: (f64, f64),
}

impl<'a> PatchedConicTrajectory<'a> {
    /// Builds the trajectory, validating the itinerary shape and the packing
    /// of the free-variable vector.
    ///
    /// When no minimum periapse radii are provided, the default per-body radii
    /// are looked up; an unknown body name is fatal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        system: &'a System,
        central_body: &str,
        body_order: Vec<String>,
        leg_kinds: Vec<TransferLegKind>,
        departure_epoch: Epoch,
        free_variables: Vec<f64>,
        minimum_periapse_radii: Option<Vec<f64>>,
        departure_orbit: (f64, f64),
    ) -> Result<Self, TrajectoryError> {
        if body_order.len() != leg_kinds.len() + 1 {
            return Err(TrajectoryError::ItineraryShape {
                bodies: body_order.len(),
                legs: leg_kinds.len(),
            });
        }

        let dsm_legs = leg_kinds.iter().filter(|kind| kind.has_dsm()).count();
        let expected = leg_kinds.len() + 4 * dsm_legs;
        if free_variables.len() != expected {
            return Err(TrajectoryError::FreeVariableSize {
                expected,
                got: free_variables.len(),
            });
        }

        let minimum_periapse_radii = match minimum_periapse_radii {
            Some(radii) => {
                if radii.len() < leg_kinds.len() {
                    return Err(TrajectoryError::MinimumRadiiSize {
                        expected: leg_kinds.len(),
                        got: radii.len(),
                    });
                }
                radii
            }
            None => default_minimum_periapse_radii(&body_order)
                .map_err(|source| TrajectoryError::TrajAstro { source })?,
        };

        Ok(Self {
            system,
            central_body: central_body.to_string(),
            body_order,
            leg_kinds,
            departure_epoch,
            free_variables,
            minimum_periapse_radii,
            departure_orbit,
        })
    }

    pub fn body_order(&self) -> &[String] {
        &self.body_order
    }

    pub fn leg_kinds(&self) -> &[TransferLegKind] {
        &self.leg_kinds
    }

    /// The epochs of every body passage, from the per-leg flight times.
    pub fn body_epochs(&self) -> Vec<Epoch> {
        let mut epochs = Vec::with_capacity(self.body_order.len());
        let mut epoch = self.departure_epoch;
        epochs.push(epoch);
        for tof_s in &self.free_variables[..self.leg_kinds.len()] {
            epoch += Duration::from_seconds(*tof_s);
            epochs.push(epoch);
        }
        epochs
    }

    /// Evaluates every leg once and returns the maneuver points (position,
    /// epoch, delta-v) in itinerary order, the total delta-v, and the solved
    /// legs.
    pub fn solve(&self) -> Result<TrajectorySolution, TrajectoryError> {
        let epochs = self.body_epochs();
        let mu_central = self
            .system
            .mu(&self.central_body)
            .map_err(|source| TrajectoryError::TrajAstro { source })?;

        let mut maneuvers = Vec::new();
        let mut legs = Vec::with_capacity(self.leg_kinds.len());
        let mut total_delta_v = 0.0;
        let mut incoming_velocity = None;
        let mut dsm_cursor = self.leg_kinds.len();

        for (i, kind) in self.leg_kinds.iter().enumerate() {
            let departure_state = self
                .system
                .state_of(&self.body_order[i], epochs[i])
                .map_err(|source| TrajectoryError::TrajAstro { source })?;
            let arrival_state = self
                .system
                .state_of(&self.body_order[i + 1], epochs[i + 1])
                .map_err(|source| TrajectoryError::TrajAstro { source })?;

            let geometry = LegGeometry {
                departure_position: Vector3::new(
                    departure_state[0],
                    departure_state[1],
                    departure_state[2],
                ),
                arrival_position: Vector3::new(
                    arrival_state[0],
                    arrival_state[1],
                    arrival_state[2],
                ),
                time_of_flight_s: self.free_variables[i],
                departure_body_velocity: Vector3::new(
                    departure_state[3],
                    departure_state[4],
                    departure_state[5],
                ),
                mu_central,
                mu_departure_body: self
                    .system
                    .mu(&self.body_order[i])
                    .map_err(|source| TrajectoryError::TrajAstro { source })?,
            };

            let boundary = if kind.is_departure() {
                BoundaryKind::Departure {
                    parking_sma_km: self.departure_orbit.0,
                    parking_ecc: self.departure_orbit.1,
                }
            } else {
                BoundaryKind::Swingby {
                    incoming_velocity: incoming_velocity
                        .ok_or(TrajectoryError::LeadingSwingby)?,
                    minimum_periapse_radius_km: self.minimum_periapse_radii[i],
                }
            };

            let dsm = if kind.has_dsm() {
                let parameters = [
                    self.free_variables[dsm_cursor],
                    self.free_variables[dsm_cursor + 1],
                    self.free_variables[dsm_cursor + 2],
                    self.free_variables[dsm_cursor + 3],
                ];
                dsm_cursor += 4;
                match kind {
                    TransferLegKind::DepartureVelocityDsm | TransferLegKind::SwingbyVelocityDsm => {
                        DsmFormulation::Velocity { parameters }
                    }
                    _ => DsmFormulation::Position { parameters },
                }
            } else {
                DsmFormulation::None
            };

            let mut leg = TransferLeg::new(geometry, boundary, dsm);
            let (velocity_before_arrival, leg_delta_v) = leg.calculate()?;
            total_delta_v += leg_delta_v;
            incoming_velocity = Some(velocity_before_arrival);

            maneuvers.push(ManeuverPoint {
                position: leg.geometry().departure_position,
                epoch: epochs[i],
                delta_v: leg.boundary_delta_v()?,
            });
            if let Some(dsm_point) = leg.dsm()? {
                maneuvers.push(ManeuverPoint {
                    position: dsm_point.position,
                    epoch: epochs[i] + Duration::from_seconds(dsm_point.time_offset_s),
                    delta_v: dsm_point.delta_v,
                });
            }

            legs.push(leg);
        }

        // Arrival passage: no capture burn is modeled.
        let arrival_state = self
            .system
            .state_of(
                &self.body_order[self.body_order.len() - 1],
                epochs[epochs.len() - 1],
            )
            .map_err(|source| TrajectoryError::TrajAstro { source })?;
        maneuvers.push(ManeuverPoint {
            position: Vector3::new(arrival_state[0], arrival_state[1], arrival_state[2]),
            epoch: epochs[epochs.len() - 1],
            delta_v: 0.0,
        });

        Ok(TrajectorySolution {
            maneuvers,
            total_delta_v,
            legs,
        })
    }
}
