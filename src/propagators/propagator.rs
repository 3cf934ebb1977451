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

use super::{PropagationError, RK, RK4Fixed};
use crate::cosmic::Ephemeris;
use crate::dynamics::Dynamics;
use crate::linalg::{Vector3, Vector6};
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Fixed-step integrator settings. A negative step propagates backward in time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    pub step: Duration,
}

impl IntegratorSettings {
    pub fn from_step(step: Duration) -> Self {
        Self { step }
    }

    /// The same settings with the step direction reversed.
    pub fn reversed(self) -> Self {
        Self { step: -self.step }
    }
}

/// When to stop a propagation.
#[derive(Clone)]
pub enum TerminationCondition {
    /// Propagate until the provided epoch, landing on it exactly with a final
    /// partial step. The step direction must point at the target.
    Epoch(Epoch),
    /// Stop at the first of: the distance to the tracked body dropping below
    /// `distance_km`, or the elapsed time exceeding `max_elapsed`.
    Hybrid {
        body: String,
        ephemeris: Arc<dyn Ephemeris>,
        distance_km: f64,
        max_elapsed: Duration,
    },
}

/// A fixed-step propagator tying a dynamics model to an RK method.
///
/// Every accepted step is recorded, so the returned history is keyed by the
/// exact epochs the integrator visited.
pub struct Propagator<'a, D: Dynamics, M: RK = RK4Fixed> {
    pub dynamics: &'a D,
    pub settings: IntegratorSettings,
    _method: PhantomData<M>,
}

impl<'a, D: Dynamics, M: RK> Propagator<'a, D, M> {
    pub fn new(dynamics: &'a D, settings: IntegratorSettings) -> Self {
        Self {
            dynamics,
            settings,
            _method: PhantomData,
        }
    }

    /// Propagates the state from the provided epoch until the termination
    /// condition triggers, and returns the full time-ordered state history.
    pub fn propagate(
        &self,
        epoch: Epoch,
        state: Vector6<f64>,
        termination: &TerminationCondition,
    ) -> Result<BTreeMap<Epoch, Vector6<f64>>, PropagationError> {
        let step_s = self.settings.step.to_seconds();
        if step_s == 0.0 {
            return Err(PropagationError::ZeroStepSize);
        }

        let mut t = epoch;
        let mut y = state;
        let mut history = BTreeMap::new();
        history.insert(t, y);

        loop {
            let h = match termination {
                TerminationCondition::Epoch(target) => {
                    let remaining = *target - t;
                    if remaining == Duration::ZERO
                        || remaining.to_seconds() * step_s <= 0.0
                    {
                        break;
                    }
                    if remaining.abs() < self.settings.step.abs() {
                        remaining
                    } else {
                        self.settings.step
                    }
                }
                TerminationCondition::Hybrid { .. } => self.settings.step,
            };

            y = self.single_step(t, &y, h.to_seconds())?;
            t += h;
            history.insert(t, y);

            if let TerminationCondition::Hybrid {
                body,
                ephemeris,
                distance_km,
                max_elapsed,
            } = termination
            {
                let body_state = ephemeris.state_at(t);
                let relative = Vector3::new(
                    y[0] - body_state[0],
                    y[1] - body_state[1],
                    y[2] - body_state[2],
                );
                if relative.norm() <= *distance_km {
                    debug!(
                        "propagation stopped at {t}: within {distance_km} km of {body}"
                    );
                    break;
                }
                if (t - epoch).abs() >= *max_elapsed {
                    debug!("propagation stopped at {t}: {max_elapsed} elapsed");
                    break;
                }
            }
        }

        Ok(history)
    }

    fn single_step(
        &self,
        epoch: Epoch,
        state: &Vector6<f64>,
        h_s: f64,
    ) -> Result<Vector6<f64>, PropagationError> {
        let a_coeffs = M::a_coeffs();
        let b_coeffs = M::b_coeffs();

        let mut k: Vec<Vector6<f64>> = Vec::with_capacity(M::stages());
        k.push(
            self.dynamics
                .eom(epoch, state)
                .map_err(|source| PropagationError::PropDynamics { source })?,
        );

        let mut a_idx = 0;
        for i in 1..M::stages() {
            let mut y = *state;
            let mut ci = 0.0;
            for kj in k.iter().take(i) {
                let coeff = a_coeffs[a_idx];
                ci += coeff;
                y += *kj * (coeff * h_s);
                a_idx += 1;
            }
            let stage_epoch = epoch + Duration::from_seconds(ci * h_s);
            k.push(
                self.dynamics
                    .eom(stage_epoch, &y)
                    .map_err(|source| PropagationError::PropDynamics { source })?,
            );
        }

        let mut next = *state;
        for (ki, bi) in k.iter().zip(b_coeffs.iter()) {
            next += *ki * (*bi * h_s);
        }
        Ok(next)
    }
}
