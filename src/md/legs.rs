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

use super::TrajectoryError;
use crate::cosmic::twobody::propagate_kepler;
use crate::linalg::{Vector3, Vector6};
use crate::tools::lambert::{self, TransferKind};

/// The closed set of interplanetary transfer leg variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferLegKind {
    Departure,
    Swingby,
    DepartureVelocityDsm,
    SwingbyVelocityDsm,
    DeparturePositionDsm,
    SwingbyPositionDsm,
}

impl TransferLegKind {
    /// Whether this leg embeds a deep-space maneuver, splitting it into two
    /// sub-legs.
    pub const fn has_dsm(self) -> bool {
        !matches!(self, Self::Departure | Self::Swingby)
    }

    pub const fn is_departure(self) -> bool {
        matches!(
            self,
            Self::Departure | Self::DepartureVelocityDsm | Self::DeparturePositionDsm
        )
    }
}

/// The geometry every leg variant shares: boundary positions, flight time,
/// the departure body's heliocentric velocity and the relevant gravitational
/// parameters. Positions in km, velocities in km/s, mu in km^3/s^2.
#[derive(Clone, Debug)]
pub struct LegGeometry {
    pub departure_position: Vector3<f64>,
    pub arrival_position: Vector3<f64>,
    pub time_of_flight_s: f64,
    pub departure_body_velocity: Vector3<f64>,
    pub mu_central: f64,
    pub mu_departure_body: f64,
}

/// What happens at the departure end of the leg.
#[derive(Clone, Debug)]
pub enum BoundaryKind {
    /// Escape burn from a parking orbit around the departure body. A
    /// non-finite semi-major axis counts the hyperbolic excess velocity
    /// directly (no parking orbit).
    Departure {
        parking_sma_km: f64,
        parking_ecc: f64,
    },
    /// Powered swingby of the departure body, fed by the incoming velocity
    /// before arrival of the preceding leg.
    Swingby {
        incoming_velocity: Vector3<f64>,
        minimum_periapse_radius_km: f64,
    },
}

/// The deep-space-maneuver formulation of the leg, with its four free
/// parameters.
#[derive(Clone, Debug)]
pub enum DsmFormulation {
    /// Single conic arc, no maneuver between the bodies.
    None,
    /// `[tof fraction, v_inf_km_s, in-plane angle, out-of-plane angle]`: the
    /// post-departure excess velocity is a free variable and the DSM location
    /// follows from the Keplerian coast.
    Velocity { parameters: [f64; 4] },
    /// `[tof fraction, dimensionless radius, in-plane angle, out-of-plane
    /// angle]`: the DSM location is a free variable and both halves of the leg
    /// are Lambert arcs.
    Position { parameters: [f64; 4] },
}

/// A solved deep-space maneuver point.
#[derive(Clone, Debug)]
pub struct DsmPoint {
    pub position: Vector3<f64>,
    /// Maneuver time past leg departure, in seconds
    pub time_offset_s: f64,
    pub velocity_before: Vector3<f64>,
    pub velocity_after: Vector3<f64>,
    pub delta_v: f64,
}

#[derive(Clone, Debug)]
struct LegSolution {
    velocity_after_departure: Vector3<f64>,
    velocity_before_arrival: Vector3<f64>,
    boundary_delta_v: f64,
    dsm: Option<DsmPoint>,
}

/// One interplanetary transfer leg, solved once via [`TransferLeg::calculate`].
///
/// The departure variables depend on results computed while solving for the
/// arrival velocity (both come out of one coupled leg solve), hence the
/// two-call protocol: `calculate` first, then `departure_variables`.
#[derive(Clone, Debug)]
pub struct TransferLeg {
    geometry: LegGeometry,
    boundary: BoundaryKind,
    dsm: DsmFormulation,
    solution: Option<LegSolution>,
}

impl TransferLeg {
    pub fn new(geometry: LegGeometry, boundary: BoundaryKind, dsm: DsmFormulation) -> Self {
        Self {
            geometry,
            boundary,
            dsm,
            solution: None,
        }
    }

    pub fn kind(&self) -> TransferLegKind {
        match (&self.boundary, &self.dsm) {
            (BoundaryKind::Departure { .. }, DsmFormulation::None) => TransferLegKind::Departure,
            (BoundaryKind::Departure { .. }, DsmFormulation::Velocity { .. }) => {
                TransferLegKind::DepartureVelocityDsm
            }
            (BoundaryKind::Departure { .. }, DsmFormulation::Position { .. }) => {
                TransferLegKind::DeparturePositionDsm
            }
            (BoundaryKind::Swingby { .. }, DsmFormulation::None) => TransferLegKind::Swingby,
            (BoundaryKind::Swingby { .. }, DsmFormulation::Velocity { .. }) => {
                TransferLegKind::SwingbyVelocityDsm
            }
            (BoundaryKind::Swingby { .. }, DsmFormulation::Position { .. }) => {
                TransferLegKind::SwingbyPositionDsm
            }
        }
    }

    pub fn geometry(&self) -> &LegGeometry {
        &self.geometry
    }

    /// Solves the leg and returns the velocity before arrival and the total
    /// delta-v of this leg (boundary burn plus any deep-space maneuver).
    pub fn calculate(&mut self) -> Result<(Vector3<f64>, f64), TrajectoryError> {
        let geom = &self.geometry;

        let (velocity_after_departure, velocity_before_arrival, dsm) = match &self.dsm {
            DsmFormulation::None => {
                let arc = lambert::standard(
                    geom.departure_position,
                    geom.arrival_position,
                    geom.time_of_flight_s,
                    geom.mu_central,
                    TransferKind::Auto,
                )
                .map_err(|source| TrajectoryError::TrajLambert { source })?;
                (arc.v_init, arc.v_final, None)
            }

            DsmFormulation::Velocity { parameters } => {
                let [fraction, v_inf, in_plane, out_of_plane] = *parameters;
                let dsm_time_s = fraction * geom.time_of_flight_s;

                // Excess velocity in the frame tied to the departure body's
                // velocity and the orbital plane.
                let unit1 = geom.departure_body_velocity.normalize();
                let unit3 = geom
                    .departure_position
                    .cross(&geom.departure_body_velocity)
                    .normalize();
                let unit2 = unit3.cross(&unit1);

                let (sin_in, cos_in) = in_plane.sin_cos();
                let (sin_out, cos_out) = out_of_plane.sin_cos();
                let excess =
                    v_inf * (cos_in * cos_out * unit1 + sin_in * cos_out * unit2 + sin_out * unit3);
                let velocity_after_departure = geom.departure_body_velocity + excess;

                let departure_state = stack_state(&geom.departure_position, &velocity_after_departure);
                let dsm_state = propagate_kepler(&departure_state, dsm_time_s, geom.mu_central);
                let dsm_position = Vector3::new(dsm_state[0], dsm_state[1], dsm_state[2]);
                let velocity_before_dsm = Vector3::new(dsm_state[3], dsm_state[4], dsm_state[5]);

                let second_arc = lambert::standard(
                    dsm_position,
                    geom.arrival_position,
                    geom.time_of_flight_s - dsm_time_s,
                    geom.mu_central,
                    TransferKind::Auto,
                )
                .map_err(|source| TrajectoryError::TrajLambert { source })?;

                let dsm = DsmPoint {
                    position: dsm_position,
                    time_offset_s: dsm_time_s,
                    velocity_before: velocity_before_dsm,
                    velocity_after: second_arc.v_init,
                    delta_v: (second_arc.v_init - velocity_before_dsm).norm(),
                };
                (velocity_after_departure, second_arc.v_final, Some(dsm))
            }

            DsmFormulation::Position { parameters } => {
                let [fraction, dimensionless_radius, in_plane, out_of_plane] = *parameters;
                let dsm_time_s = fraction * geom.time_of_flight_s;

                // DSM location in the frame tied to the departure position and
                // the orbital plane.
                let unit1 = geom.departure_position.normalize();
                let unit3 = geom
                    .departure_position
                    .cross(&geom.departure_body_velocity)
                    .normalize();
                let unit2 = unit3.cross(&unit1);

                let (sin_in, cos_in) = in_plane.sin_cos();
                let (sin_out, cos_out) = out_of_plane.sin_cos();
                let dsm_position = dimensionless_radius
                    * geom.departure_position.norm()
                    * (cos_in * cos_out * unit1 + sin_in * cos_out * unit2 + sin_out * unit3);

                let first_arc = lambert::standard(
                    geom.departure_position,
                    dsm_position,
                    dsm_time_s,
                    geom.mu_central,
                    TransferKind::Auto,
                )
                .map_err(|source| TrajectoryError::TrajLambert { source })?;
                let second_arc = lambert::standard(
                    dsm_position,
                    geom.arrival_position,
                    geom.time_of_flight_s - dsm_time_s,
                    geom.mu_central,
                    TransferKind::Auto,
                )
                .map_err(|source| TrajectoryError::TrajLambert { source })?;

                let dsm = DsmPoint {
                    position: dsm_position,
                    time_offset_s: dsm_time_s,
                    velocity_before: first_arc.v_final,
                    velocity_after: second_arc.v_init,
                    delta_v: (second_arc.v_init - first_arc.v_final).norm(),
                };
                (first_arc.v_init, second_arc.v_final, Some(dsm))
            }
        };

        let boundary_delta_v = match &self.boundary {
            BoundaryKind::Departure {
                parking_sma_km,
                parking_ecc,
            } => escape_delta_v(
                (velocity_after_departure - geom.departure_body_velocity).norm(),
                geom.mu_departure_body,
                *parking_sma_km,
                *parking_ecc,
            ),
            BoundaryKind::Swingby {
                incoming_velocity,
                minimum_periapse_radius_km,
            } => powered_swingby_delta_v(
                geom.mu_departure_body,
                incoming_velocity - geom.departure_body_velocity,
                velocity_after_departure - geom.departure_body_velocity,
                *minimum_periapse_radius_km,
                self.kind(),
            )?,
        };

        let total_delta_v =
            boundary_delta_v + dsm.as_ref().map(|point| point.delta_v).unwrap_or(0.0);

        self.solution = Some(LegSolution {
            velocity_after_departure,
            velocity_before_arrival,
            boundary_delta_v,
            dsm,
        });

        Ok((velocity_before_arrival, total_delta_v))
    }

    /// The departure-side variables: departure body position, departure body
    /// velocity, and the velocity after departure.
    ///
    /// Only available once [`Self::calculate`] ran.
    pub fn departure_variables(
        &self,
    ) -> Result<(Vector3<f64>, Vector3<f64>, Vector3<f64>), TrajectoryError> {
        let solution = self.solution.as_ref().ok_or(TrajectoryError::Sequencing)?;
        Ok((
            self.geometry.departure_position,
            self.geometry.departure_body_velocity,
            solution.velocity_after_departure,
        ))
    }

    /// The solved deep-space maneuver, if this leg has one.
    pub fn dsm(&self) -> Result<Option<&DsmPoint>, TrajectoryError> {
        let solution = self.solution.as_ref().ok_or(TrajectoryError::Sequencing)?;
        Ok(solution.dsm.as_ref())
    }

    pub fn velocity_before_arrival(&self) -> Result<Vector3<f64>, TrajectoryError> {
        let solution = self.solution.as_ref().ok_or(TrajectoryError::Sequencing)?;
        Ok(solution.velocity_before_arrival)
    }

    /// The delta-v of the boundary burn alone (escape or swingby).
    pub fn boundary_delta_v(&self) -> Result<f64, TrajectoryError> {
        let solution = self.solution.as_ref().ok_or(TrajectoryError::Sequencing)?;
        Ok(solution.boundary_delta_v)
    }
}

fn stack_state(position: &Vector3<f64>, velocity: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(
        position[0],
        position[1],
        position[2],
        velocity[0],
        velocity[1],
        velocity[2],
    )
}

/// Delta-v to reach the provided hyperbolic excess velocity from the periapse
/// of a parking orbit around the departure body.
fn escape_delta_v(v_inf_km_s: f64, mu_body: f64, parking_sma_km: f64, parking_ecc: f64) -> f64 {
    if !parking_sma_km.is_finite() {
        return v_inf_km_s;
    }
    let r_p = parking_sma_km * (1.0 - parking_ecc);
    let v_periapse_orbit = (mu_body * (1.0 + parking_ecc) / r_p).sqrt();
    let v_periapse_escape = (v_inf_km_s.powi(2) + 2.0 * mu_body / r_p).sqrt();
    v_periapse_escape - v_periapse_orbit
}

/// Delta-v of a powered swingby: finds the periapse radius at which the
/// hyperbolic bending of the incoming and outgoing excess velocities matches
/// the required turn angle, and burns the velocity difference at periapse.
fn powered_swingby_delta_v(
    mu_body: f64,
    v_inf_incoming: Vector3<f64>,
    v_inf_outgoing: Vector3<f64>,
    minimum_periapse_radius_km: f64,
    kind: TransferLegKind,
) -> Result<f64, TrajectoryError> {
    const MAX_RADIUS_KM: f64 = 1e12;
    const MAX_BISECTIONS: usize = 200;

    let v_in = v_inf_incoming.norm();
    let v_out = v_inf_outgoing.norm();
    let turn_required = (v_inf_incoming.dot(&v_inf_outgoing) / (v_in * v_out))
        .clamp(-1.0, 1.0)
        .acos();

    // Total bending achievable with both hyperbolic arcs at a common periapse.
    let bending = |r_p: f64| -> f64 {
        let ecc_in = 1.0 + r_p * v_in.powi(2) / mu_body;
        let ecc_out = 1.0 + r_p * v_out.powi(2) / mu_body;
        (1.0 / ecc_in).asin() + (1.0 / ecc_out).asin()
    };

    if bending(minimum_periapse_radius_km) < turn_required {
        return Err(TrajectoryError::LegSolveDiverged {
            kind: format!("{kind:?}"),
            reason: format!(
                "required turn angle of {:.4} rad exceeds the {:.4} rad achievable at the minimum periapse radius of {minimum_periapse_radius_km} km",
                turn_required,
                bending(minimum_periapse_radius_km)
            ),
        });
    }

    // Bracket the periapse radius: bending decreases monotonically with r_p.
    let mut lower = minimum_periapse_radius_km;
    let mut upper = minimum_periapse_radius_km;
    while bending(upper) > turn_required {
        upper *= 2.0;
        if upper > MAX_RADIUS_KM {
            // Bending requirement is negligible: burn far from the body.
            return Ok((v_out - v_in).abs());
        }
    }

    let mut r_p = 0.5 * (lower + upper);
    let mut converged = false;
    for _ in 0..MAX_BISECTIONS {
        let excess = bending(r_p) - turn_required;
        if excess.abs() < 1e-12 || (upper - lower) / upper < 1e-14 {
            converged = true;
            break;
        }
        if excess > 0.0 {
            lower = r_p;
        } else {
            upper = r_p;
        }
        r_p = 0.5 * (lower + upper);
    }

    if !converged {
        return Err(TrajectoryError::LegSolveDiverged {
            kind: format!("{kind:?}"),
            reason: format!("periapse radius iteration did not converge (last value {r_p} km)"),
        });
    }

    let v_p_in = (v_in.powi(2) + 2.0 * mu_body / r_p).sqrt();
    let v_p_out = (v_out.powi(2) + 2.0 * mu_body / r_p).sqrt();
    Ok((v_p_out - v_p_in).abs())
}
