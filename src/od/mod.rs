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

//! Orbit determination support: indexed tracking-observation collections,
//! residual computation, arc segmentation and outlier filtering.
//!
//! The flat buffers and index tables of [`msr::ObservationCollection`] are the
//! canonical input to a weighted least-squares estimator; the estimator itself
//! lives outside this crate.

/// Provides all of the observation set and collection models.
pub mod msr;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::msr::*;
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}
