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

/*! # erebus

Tracking-observation bookkeeping and patched-conic versus full-problem
trajectory comparison, for orbit determination and interplanetary trajectory
design.

The `od` module aggregates heterogeneous tracking observations into indexed,
query-able collections (the canonical input to a weighted least-squares
estimator). The `md` module stitches analytic transfer legs (Lambert arcs,
deep-space-maneuver splits, Keplerian coasts) to their fully numerically
integrated counterparts and reports the per-leg state differences.
*/

/// Provides the fixed-step propagators / integrators available in `erebus`.
pub mod propagators;

/// Provides the dynamics models consumed by the propagators.
pub mod dynamics;

/// Provides the body/environment model and the analytic two-body utilities.
pub mod cosmic;

/// All the observation collection and residual handling for orbit determination.
pub mod od;

/// All of the trajectory design and patched-conic comparison tools.
pub mod md;

/// Simple tools (e.g. Lambert solver)
pub mod tools;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}
