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

//! Analytic two-body utilities: element conversions, Kepler-orbit propagation
//! and the patched-conic geometry formulas. All functions here are pure.

use crate::linalg::{Vector3, Vector6};
use std::f64::consts::TAU;

/// Keplerian orbital elements: `[sma_km, ecc, inc_rad, raan_rad, aop_rad, ta_rad]`.
pub type KeplerianElements = [f64; 6];

/// Converts a Cartesian state (km, km/s) into Keplerian orbital elements.
///
/// The angles are returned in radians in `[0, 2pi)`. For hyperbolic orbits the
/// semi-major axis is negative.
pub fn cartesian_to_keplerian(state: &Vector6<f64>, mu_km3_s2: f64) -> KeplerianElements {
    let r = Vector3::new(state[0], state[1], state[2]);
    let v = Vector3::new(state[3], state[4], state[5]);
    let r_mag = r.norm();
    let v_mag = v.norm();

    let hvec = r.cross(&v);
    let h_mag = hvec.norm();
    let nvec = Vector3::new(-hvec[1], hvec[0], 0.0);
    let n_mag = nvec.norm();

    let evec = ((v_mag.powi(2) - mu_km3_s2 / r_mag) * r - r.dot(&v) * v) / mu_km3_s2;
    let ecc = evec.norm();

    let energy = v_mag.powi(2) / 2.0 - mu_km3_s2 / r_mag;
    let sma = -mu_km3_s2 / (2.0 * energy);

    let inc = (hvec[2] / h_mag).acos();

    let mut raan = (nvec[0] / n_mag).acos();
    if n_mag < f64::EPSILON {
        raan = 0.0;
    } else if nvec[1] < 0.0 {
        raan = TAU - raan;
    }

    let mut aop = if n_mag < f64::EPSILON || ecc < f64::EPSILON {
        0.0
    } else {
        (nvec.dot(&evec) / (n_mag * ecc)).clamp(-1.0, 1.0).acos()
    };
    if evec[2] < 0.0 {
        aop = TAU - aop;
    }

    let mut ta = if ecc < f64::EPSILON {
        // Circular: use the argument of latitude as the anomaly origin.
        (r[0] / r_mag).clamp(-1.0, 1.0).acos()
    } else {
        (evec.dot(&r) / (ecc * r_mag)).clamp(-1.0, 1.0).acos()
    };
    if r.dot(&v) < 0.0 {
        ta = TAU - ta;
    }

    [sma, ecc, inc, raan, aop, ta]
}

/// Converts Keplerian orbital elements back into a Cartesian state (km, km/s).
pub fn keplerian_to_cartesian(elements: &KeplerianElements, mu_km3_s2: f64) -> Vector6<f64> {
    let [sma, ecc, inc, raan, aop, ta] = *elements;
    let p = sma * (1.0 - ecc.powi(2));
    let radius = p / (1.0 + ecc * ta.cos());

    let (sin_aop_ta, cos_aop_ta) = (aop + ta).sin_cos();
    let (sin_inc, cos_inc) = inc.sin_cos();
    let (sin_raan, cos_raan) = raan.sin_cos();
    let (sin_aop, cos_aop) = aop.sin_cos();

    let x = radius * (cos_aop_ta * cos_raan - cos_inc * sin_aop_ta * sin_raan);
    let y = radius * (cos_aop_ta * sin_raan + cos_inc * sin_aop_ta * cos_raan);
    let z = radius * sin_aop_ta * sin_inc;

    let sqrt_mu_p = (mu_km3_s2 / p).sqrt();
    let cos_ta_ecc = ta.cos() + ecc;
    let sin_ta = ta.sin();

    let vx = sqrt_mu_p * cos_ta_ecc * (-sin_aop * cos_raan - cos_inc * sin_raan * cos_aop)
        - sqrt_mu_p * sin_ta * (cos_aop * cos_raan - cos_inc * sin_raan * sin_aop);
    let vy = sqrt_mu_p * cos_ta_ecc * (-sin_aop * sin_raan + cos_inc * cos_raan * cos_aop)
        - sqrt_mu_p * sin_ta * (cos_aop * sin_raan + cos_inc * cos_raan * sin_aop);
    let vz = sqrt_mu_p * (cos_ta_ecc * sin_inc * cos_aop - sin_ta * sin_inc * sin_aop);

    Vector6::new(x, y, z, vx, vy, vz)
}

/// Propagates a Cartesian state by `dt_s` seconds of two-body motion.
///
/// Universal-variable formulation with Stumpff functions, valid for elliptic
/// and hyperbolic orbits, forward and backward in time.
pub fn propagate_kepler(state: &Vector6<f64>, dt_s: f64, mu_km3_s2: f64) -> Vector6<f64> {
    if dt_s == 0.0 {
        return *state;
    }
    let r0 = Vector3::new(state[0], state[1], state[2]);
    let v0 = Vector3::new(state[3], state[4], state[5]);
    let r0_mag = r0.norm();
    let rdotv = r0.dot(&v0);
    let sqrt_mu = mu_km3_s2.sqrt();

    let energy = v0.norm_squared() / 2.0 - mu_km3_s2 / r0_mag;
    let alpha = -2.0 * energy / mu_km3_s2; // 1/sma

    let mut chi = if alpha > 1e-12 {
        sqrt_mu * dt_s * alpha
    } else if alpha < -1e-12 {
        let a = 1.0 / alpha;
        let sign_dt = dt_s.signum();
        sign_dt
            * (-a).sqrt()
            * ((-2.0 * mu_km3_s2 * alpha * dt_s * dt_s)
                / (rdotv + sign_dt * (-mu_km3_s2 * a).sqrt() * (1.0 - r0_mag * alpha)))
                .ln()
    } else {
        sqrt_mu * dt_s / r0_mag
    };

    let tol = 1e-14 * dt_s.abs().max(1.0);
    let mut r_mag = r0_mag;
    for _ in 0..50 {
        let chi2 = chi * chi;
        let psi = alpha * chi2;
        let (c2, c3) = stumpff(psi);

        r_mag = chi2 * c2 + rdotv / sqrt_mu * chi * (1.0 - psi * c3) + r0_mag * (1.0 - psi * c2);

        let f_val = r0_mag * chi * (1.0 - psi * c3) + rdotv / sqrt_mu * chi2 * c2
            + chi2 * chi * c3
            - sqrt_mu * dt_s;

        let delta = f_val / r_mag;
        chi -= delta;
        if delta.abs() < tol {
            break;
        }
    }

    let chi2 = chi * chi;
    let psi = alpha * chi2;
    let (c2, c3) = stumpff(psi);

    let f = 1.0 - chi2 / r0_mag * c2;
    let g = dt_s - chi2 * chi / sqrt_mu * c3;
    let g_dot = 1.0 - chi2 / r_mag * c2;
    let f_dot = sqrt_mu / (r_mag * r0_mag) * chi * (psi * c3 - 1.0);

    let r_new = f * r0 + g * v0;
    let v_new = f_dot * r0 + g_dot * v0;

    Vector6::new(r_new[0], r_new[1], r_new[2], v_new[0], v_new[1], v_new[2])
}

/// Stumpff functions c2(psi) and c3(psi), with a series expansion near zero.
fn stumpff(psi: f64) -> (f64, f64) {
    if psi > 1e-6 {
        let sqrt_psi = psi.sqrt();
        (
            (1.0 - sqrt_psi.cos()) / psi,
            (sqrt_psi - sqrt_psi.sin()) / (psi * sqrt_psi),
        )
    } else if psi < -1e-6 {
        let sqrt_neg_psi = (-psi).sqrt();
        (
            (1.0 - sqrt_neg_psi.cosh()) / psi,
            (sqrt_neg_psi.sinh() - sqrt_neg_psi) / ((-psi) * sqrt_neg_psi),
        )
    } else {
        (
            1.0 / 2.0 - psi / 24.0 + psi * psi / 720.0,
            1.0 / 6.0 - psi / 120.0 + psi * psi / 5040.0,
        )
    }
}

/// Keplerian orbital period in seconds, for an elliptic orbit.
pub fn orbital_period_s(sma_km: f64, mu_km3_s2: f64) -> f64 {
    TAU * (sma_km.powi(3) / mu_km3_s2).sqrt()
}

/// Synodic period of two orbits given their periods in seconds.
pub fn synodic_period_s(period_a_s: f64, period_b_s: f64) -> f64 {
    1.0 / (1.0 / period_a_s - 1.0 / period_b_s).abs()
}

/// Sphere-of-influence radius of a minor body orbiting a major one at the
/// provided distance, in the units of `distance`.
pub fn sphere_of_influence(distance: f64, mu_minor: f64, mu_major: f64) -> f64 {
    distance * (mu_minor / mu_major).powf(2.0 / 5.0)
}
