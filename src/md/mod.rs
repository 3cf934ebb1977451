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

//! Interplanetary trajectory design: patched-conic transfer legs, their
//! assembly into a full itinerary, and the comparison of every analytic leg
//! against the fully numerically integrated problem.

use crate::cosmic::AstroError;
use crate::propagators::PropagationError;
use crate::tools::lambert::LambertError;
use snafu::prelude::Snafu;

pub mod comparison;
pub mod legs;
pub mod trajectory;

pub use comparison::{LegComparison, TrajectoryComparator, TrajectoryComparisonResults};
pub use legs::{BoundaryKind, DsmFormulation, DsmPoint, TransferLeg, TransferLegKind};
pub use trajectory::{ManeuverPoint, PatchedConicTrajectory, TrajectorySolution};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrajectoryError {
    #[snafu(display(
        "the leg must be calculated before its departure variables are available"
    ))]
    Sequencing,
    #[snafu(display("the {kind} leg solve diverged: {reason}"))]
    LegSolveDiverged { kind: String, reason: String },
    #[snafu(display("trajectory assembly failed: {source}"))]
    TrajAstro { source: AstroError },
    #[snafu(display("the Lambert targeter failed: {source}"))]
    TrajLambert { source: LambertError },
    #[snafu(display("full problem propagation failed: {source}"))]
    TrajProp { source: PropagationError },
    #[snafu(display(
        "free variable vector has {got} entries but this itinerary needs {expected}"
    ))]
    FreeVariableSize { expected: usize, got: usize },
    #[snafu(display("itinerary needs one leg kind per transfer (got {legs} kinds for {bodies} bodies)"))]
    ItineraryShape { bodies: usize, legs: usize },
    #[snafu(display("a swingby leg cannot start the itinerary"))]
    LeadingSwingby,
    #[snafu(display(
        "need at least {expected} minimum periapse radii for this itinerary, got {got}"
    ))]
    MinimumRadiiSize { expected: usize, got: usize },
}

#[allow(unused_imports)]
pub mod prelude {
    pub use super::comparison::*;
    pub use super::legs::*;
    pub use super::trajectory::*;
    pub use super::TrajectoryError;
    pub use crate::cosmic::{Body, Ephemeris, System};
    pub use crate::propagators::{IntegratorSettings, TerminationCondition};
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}
