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

use crate::cosmic::{AstroError, System};
use crate::linalg::{Vector3, Vector6};
use crate::time::Epoch;
use snafu::prelude::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    #[snafu(display("dynamics evaluation failed: {source}"))]
    DynamicsAstro { source: AstroError },
}

/// Equations of motion of the full problem.
///
/// The state is the Cartesian position and velocity of the propagated body
/// with respect to the central body of the problem, in km and km/s.
pub trait Dynamics {
    fn eom(&self, epoch: Epoch, state: &Vector6<f64>) -> Result<Vector6<f64>, DynamicsError>;
}

/// Central two-body gravity plus optional third-body point-mass perturbations.
///
/// Third-body states are read from the system ephemerides at every call, so
/// the acceleration is deterministic in (epoch, state).
pub struct PointMassDynamics {
    pub system: System,
    pub central_body: String,
    pub third_bodies: Vec<String>,
}

impl PointMassDynamics {
    pub fn two_body(system: System, central_body: &str) -> Self {
        Self {
            system,
            central_body: central_body.to_string(),
            third_bodies: Vec::new(),
        }
    }

    pub fn with_third_bodies(system: System, central_body: &str, third_bodies: &[&str]) -> Self {
        Self {
            system,
            central_body: central_body.to_string(),
            third_bodies: third_bodies.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl Dynamics for PointMassDynamics {
    fn eom(&self, epoch: Epoch, state: &Vector6<f64>) -> Result<Vector6<f64>, DynamicsError> {
        let r = Vector3::new(state[0], state[1], state[2]);
        let mu_central = self
            .system
            .mu(&self.central_body)
            .map_err(|source| DynamicsError::DynamicsAstro { source })?;

        let mut accel = -mu_central / r.norm().powi(3) * r;

        let r_central = if self.third_bodies.is_empty() {
            Vector3::zeros()
        } else {
            let central_state = self
                .system
                .state_of(&self.central_body, epoch)
                .map_err(|source| DynamicsError::DynamicsAstro { source })?;
            Vector3::new(central_state[0], central_state[1], central_state[2])
        };

        for body in &self.third_bodies {
            let mu_third = self
                .system
                .mu(body)
                .map_err(|source| DynamicsError::DynamicsAstro { source })?;
            let third_state = self
                .system
                .state_of(body, epoch)
                .map_err(|source| DynamicsError::DynamicsAstro { source })?;
            // Third-body position with respect to the central body.
            let r_third =
                Vector3::new(third_state[0], third_state[1], third_state[2]) - r_central;
            let r_rel = r_third - r;
            accel += mu_third * (r_rel / r_rel.norm().powi(3) - r_third / r_third.norm().powi(3));
        }

        Ok(Vector6::new(
            state[3], state[4], state[5], accel[0], accel[1], accel[2],
        ))
    }
}
