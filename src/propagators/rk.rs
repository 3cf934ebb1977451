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

/// A fixed-step Runge Kutta method defined by its Butcher tableau.
///
/// `a_coeffs` is the lower triangle of the tableau flattened row by row; the
/// node coefficients are derived as the row sums. `b_coeffs` holds one weight
/// per stage.
pub trait RK {
    fn order() -> usize;
    fn a_coeffs() -> &'static [f64];
    fn b_coeffs() -> &'static [f64];

    fn stages() -> usize {
        Self::b_coeffs().len()
    }
}

/// The classic fourth-order Runge Kutta method.
pub struct RK4Fixed {}

impl RK for RK4Fixed {
    fn order() -> usize {
        4
    }

    fn a_coeffs() -> &'static [f64] {
        &[0.5, 0.0, 0.5, 0.0, 0.0, 1.0]
    }

    fn b_coeffs() -> &'static [f64] {
        &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0]
    }
}
