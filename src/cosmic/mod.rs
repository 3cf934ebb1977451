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

use crate::linalg::Vector6;
use crate::time::Epoch;
use indexmap::IndexMap;
use snafu::prelude::Snafu;
use std::fmt;
use std::sync::Arc;

pub mod twobody;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("no ephemeris defined for body {body}"))]
    MissingEphemeris { body: String },
    #[snafu(display("body {body} is not defined in this system"))]
    UnknownBody { body: String },
}

/// Narrow read-only ephemeris interface: a Cartesian state at any epoch.
///
/// Position in km, velocity in km/s, with respect to the system barycenter or
/// the central body of the trajectory problem (the caller picks the convention
/// and must be consistent).
pub trait Ephemeris: Send + Sync {
    fn state_at(&self, epoch: Epoch) -> Vector6<f64>;
}

/// An ephemeris returning the same state at every epoch, typically used for
/// the central body pinned at the origin.
pub struct FixedEphemeris {
    pub state: Vector6<f64>,
}

impl FixedEphemeris {
    pub fn origin() -> Self {
        Self {
            state: Vector6::zeros(),
        }
    }
}

impl Ephemeris for FixedEphemeris {
    fn state_at(&self, _epoch: Epoch) -> Vector6<f64> {
        self.state
    }
}

/// A two-body coast from a reference state, e.g. a planet on its heliocentric
/// orbit for patched-conic work.
pub struct KeplerianEphemeris {
    pub reference_epoch: Epoch,
    pub reference_state: Vector6<f64>,
    /// Gravitational parameter of the body this ephemeris orbits, in km^3/s^2
    pub mu_km3_s2: f64,
}

impl Ephemeris for KeplerianEphemeris {
    fn state_at(&self, epoch: Epoch) -> Vector6<f64> {
        twobody::propagate_kepler(
            &self.reference_state,
            (epoch - self.reference_epoch).to_seconds(),
            self.mu_km3_s2,
        )
    }
}

/// A named body: a gravitational parameter and, optionally, an ephemeris.
#[derive(Clone)]
pub struct Body {
    pub name: String,
    pub mu_km3_s2: f64,
    pub ephemeris: Option<Arc<dyn Ephemeris>>,
}

impl Body {
    pub fn new(name: &str, mu_km3_s2: f64, ephemeris: Arc<dyn Ephemeris>) -> Self {
        Self {
            name: name.to_string(),
            mu_km3_s2,
            ephemeris: Some(ephemeris),
        }
    }

    /// A body without any ephemeris, e.g. the spacecraft itself.
    pub fn without_ephemeris(name: &str, mu_km3_s2: f64) -> Self {
        Self {
            name: name.to_string(),
            mu_km3_s2,
            ephemeris: None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Body {} (mu = {:.3} km^3/s^2, ephemeris: {})",
            self.name,
            self.mu_km3_s2,
            self.ephemeris.is_some()
        )
    }
}

/// The environment of a trajectory problem: named bodies in insertion order.
///
/// This owns no mutable state once assembled; every consumer reads it through
/// the accessors below.
#[derive(Clone, Default)]
pub struct System {
    bodies: IndexMap<String, Body>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.add(body);
        self
    }

    pub fn add(&mut self, body: Body) {
        self.bodies.insert(body.name.clone(), body);
    }

    pub fn body(&self, name: &str) -> Result<&Body, AstroError> {
        self.bodies.get(name).ok_or_else(|| AstroError::UnknownBody {
            body: name.to_string(),
        })
    }

    /// Gravitational parameter of the named body, in km^3/s^2.
    pub fn mu(&self, name: &str) -> Result<f64, AstroError> {
        Ok(self.body(name)?.mu_km3_s2)
    }

    pub fn ephemeris(&self, name: &str) -> Result<&Arc<dyn Ephemeris>, AstroError> {
        self.body(name)?
            .ephemeris
            .as_ref()
            .ok_or_else(|| AstroError::MissingEphemeris {
                body: name.to_string(),
            })
    }

    /// Cartesian state of the named body at the provided epoch.
    pub fn state_of(&self, name: &str, epoch: Epoch) -> Result<Vector6<f64>, AstroError> {
        Ok(self.ephemeris(name)?.state_at(epoch))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Default minimum periapse radii for swingby legs, in km.
///
/// These are the planetary radii padded with a safe flyby altitude. Any body
/// outside this table must have its radius provided explicitly.
pub fn default_minimum_periapse_radii(body_names: &[String]) -> Result<Vec<f64>, AstroError> {
    let mut radii = Vec::with_capacity(body_names.len());
    for name in body_names {
        radii.push(match name.as_str() {
            "Mercury" => 2_639.7,
            "Venus" => 6_251.8,
            "Earth" => 6_578.1,
            "Mars" => 3_596.2,
            "Jupiter" => 72_000.0,
            "Saturn" => 61_000.0,
            "Uranus" => 26_000.0,
            "Neptune" => 25_000.0,
            "Pluto" => 1_395.0,
            _ => {
                return Err(AstroError::UnknownBody {
                    body: name.clone(),
                })
            }
        });
    }
    Ok(radii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_periapse_radii_lookup() {
        let radii =
            default_minimum_periapse_radii(&["Earth".to_string(), "Jupiter".to_string()]).unwrap();
        assert_eq!(radii, vec![6_578.1, 72_000.0]);

        assert!(default_minimum_periapse_radii(&["Vulcan".to_string()]).is_err());
    }

    #[test]
    fn system_accessors() {
        let system = System::new()
            .with_body(Body::new(
                "Sun",
                1.327_124_400_18e11,
                Arc::new(FixedEphemeris::origin()),
            ))
            .with_body(Body::without_ephemeris("sc", 0.0));

        assert!(system.mu("Sun").is_ok());
        assert!(matches!(
            system.ephemeris("sc"),
            Err(AstroError::MissingEphemeris { .. })
        ));
        assert!(matches!(
            system.mu("Moon"),
            Err(AstroError::UnknownBody { .. })
        ));
    }
}
