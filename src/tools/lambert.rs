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

use crate::linalg::Vector3;
use snafu::prelude::Snafu;
use std::f64::consts::{PI, TAU};

const LAMBERT_EPSILON: f64 = 1e-4; // General epsilon
const LAMBERT_EPSILON_TIME: f64 = 1e-4; // Time epsilon
const LAMBERT_EPSILON_RAD: f64 = (5e-5 / 180.0) * PI; // 0.00005 degrees
/// Maximum number of iterations allowed in the Lambert problem solver.
/// This is a safety measure to prevent infinite loops in case a solution cannot be found.
const MAX_ITERATIONS: usize = 1000;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LambertError {
    #[snafu(display("targeted positions are too close to define a transfer plane"))]
    TargetsTooClose,
    #[snafu(display("multi-revolution transfers are not supported"))]
    MultiRevNotSupported,
    #[snafu(display("Lambert solver failed to converge after {iterations} iterations"))]
    MaxIterations { iterations: usize },
    #[snafu(display("could not find a reasonable phi for this transfer geometry"))]
    NotReasonablePhi,
}

/// Define the transfer kind for a Lambert solve
#[derive(Copy, Clone, Debug)]
pub enum TransferKind {
    Auto,
    ShortWay,
    LongWay,
    NRevs(u8),
}

impl TransferKind {
    /// Direction of motion multiplier for this transfer kind, derived from the
    /// in-plane sweep angle when set to `Auto`.
    fn direction_of_motion(
        self,
        r_init: &Vector3<f64>,
        r_final: &Vector3<f64>,
    ) -> Result<f64, LambertError> {
        match self {
            TransferKind::Auto => {
                let mut dnu = r_final[1].atan2(r_final[0]) - r_init[1].atan2(r_init[0]);
                if dnu > TAU {
                    dnu -= TAU;
                } else if dnu < 0.0 {
                    dnu += TAU;
                }
                if dnu > PI {
                    Ok(-1.0)
                } else {
                    Ok(1.0)
                }
            }
            TransferKind::ShortWay => Ok(1.0),
            TransferKind::LongWay => Ok(-1.0),
            TransferKind::NRevs(_) => Err(LambertError::MultiRevNotSupported),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LambertSolution {
    pub v_init: Vector3<f64>,
    pub v_final: Vector3<f64>,
    pub phi: f64,
}

/// Solves the Lambert boundary-value problem connecting two position vectors
/// in the provided time of flight.
///
/// Bisection on the universal variable phi (the square of the difference in
/// eccentric anomaly), following Vallado's formulation. Returns the velocities
/// at both boundaries.
///
/// # Arguments
///
/// * `r_init` - initial position vector, km.
/// * `r_final` - final position vector, km.
/// * `tof_s` - time of flight in seconds.
/// * `mu_km3_s2` - gravitational parameter of the central body.
/// * `kind` - short way, long way, or automatic direction of motion.
pub fn standard(
    r_init: Vector3<f64>,
    r_final: Vector3<f64>,
    tof_s: f64,
    mu_km3_s2: f64,
    kind: TransferKind,
) -> Result<LambertSolution, LambertError> {
    let r_init_norm = r_init.norm();
    let r_final_norm = r_final.norm();
    let r_norm_product = r_init_norm * r_final_norm;
    let cos_dnu = r_init.dot(&r_final) / r_norm_product;

    let dm = kind.direction_of_motion(&r_init, &r_final)?;

    let nu_init = r_init[1].atan2(r_init[0]);
    let nu_final = r_final[1].atan2(r_final[0]);

    let a = dm * (r_norm_product * (1.0 + cos_dnu)).sqrt();

    if nu_final - nu_init < LAMBERT_EPSILON_RAD && a.abs() < LAMBERT_EPSILON {
        return Err(LambertError::TargetsTooClose);
    }

    let mut phi_upper = 4.0 * PI.powi(2);
    let mut phi_lower = -4.0 * PI.powi(2);
    let mut phi = 0.0;

    let mut c2: f64 = 1.0 / 2.0;
    let mut c3: f64 = 1.0 / 6.0;
    let mut iter: usize = 0;
    let mut cur_tof: f64 = 0.0;
    let mut y = 0.0;

    while (cur_tof - tof_s).abs() > LAMBERT_EPSILON_TIME {
        if iter > MAX_ITERATIONS {
            return Err(LambertError::MaxIterations {
                iterations: MAX_ITERATIONS,
            });
        }
        iter += 1;

        y = r_init_norm + r_final_norm + a * (phi * c3 - 1.0) / c2.sqrt();
        if a > 0.0 && y < 0.0 {
            // Walk phi up until y becomes positive.
            for _ in 0..500 {
                phi += 0.1;
                y = r_init_norm + r_final_norm + a * (phi * c3 - 1.0) / c2.sqrt();
                if y >= 0.0 {
                    break;
                }
            }
            if y < 0.0 {
                return Err(LambertError::NotReasonablePhi);
            }
        }

        let chi = (y / c2).sqrt();
        cur_tof = (chi.powi(3) * c3 + a * y.sqrt()) / mu_km3_s2.sqrt();

        if cur_tof < tof_s {
            phi_lower = phi;
        } else {
            phi_upper = phi;
        }
        phi = (phi_upper + phi_lower) / 2.0;

        if phi > LAMBERT_EPSILON {
            let sqrt_phi = phi.sqrt();
            let (s_sphi, c_sphi) = sqrt_phi.sin_cos();
            c2 = (1.0 - c_sphi) / phi;
            c3 = (sqrt_phi - s_sphi) / phi.powi(3).sqrt();
        } else if phi < -LAMBERT_EPSILON {
            let sqrt_phi = (-phi).sqrt();
            c2 = (1.0 - sqrt_phi.cosh()) / phi;
            c3 = (sqrt_phi.sinh() - sqrt_phi) / (-phi).powi(3).sqrt();
        } else {
            c2 = 0.5;
            c3 = 1.0 / 6.0;
        }
    }

    let f = 1.0 - y / r_init_norm;
    let g_dot = 1.0 - y / r_final_norm;
    let g = a * (y / mu_km3_s2).sqrt();

    Ok(LambertSolution {
        v_init: (r_final - f * r_init) / g,
        v_final: (1.0 / g) * (g_dot * r_final - r_init),
        phi,
    })
}

#[cfg(test)]
mod ut_lambert {
    use super::*;

    #[test]
    fn vallado_short_way() {
        let ri = Vector3::new(15945.34, 0.0, 0.0);
        let rf = Vector3::new(12214.83899, 10249.46731, 0.0);
        let tof_s = 76.0 * 60.0;
        let mu_km3_s2 = 3.98600433e5;

        let exp_vi = Vector3::new(2.058913, 2.915965, 0.0);
        let exp_vf = Vector3::new(-3.451565, 0.910315, 0.0);

        let sol = standard(ri, rf, tof_s, mu_km3_s2, TransferKind::ShortWay).unwrap();

        assert!((sol.v_init - exp_vi).norm() < 1e-6);
        assert!((sol.v_final - exp_vf).norm() < 1e-6);
    }

    #[test]
    fn multi_rev_unsupported() {
        let ri = Vector3::new(15945.34, 0.0, 0.0);
        let rf = Vector3::new(12214.83899, 10249.46731, 0.0);
        assert!(matches!(
            standard(ri, rf, 4560.0, 3.98600433e5, TransferKind::NRevs(2)),
            Err(LambertError::MultiRevNotSupported)
        ));
    }
}
