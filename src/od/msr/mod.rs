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

use crate::time::{Duration, Epoch};
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::Snafu;
use std::collections::BTreeMap;
use std::fmt;

mod collection;
mod filter;
mod set;

pub use collection::*;
pub use filter::*;
pub use set::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MsrError {
    #[snafu(display("inconsistent sizes when {action}: expected {expected}, got {got}"))]
    InconsistentSize {
        action: &'static str,
        expected: usize,
        got: usize,
    },
    #[snafu(display("dependent variable calculator is incompatible with this set: {reason}"))]
    IncompatibleDependentVariableCalculator { reason: String },
    #[snafu(display(
        "weights vector of length {got} does not match the {expected} scalar observation entries"
    ))]
    WeightSizeMismatch { expected: usize, got: usize },
    #[snafu(display("no observations of type {observable} in this collection"))]
    UnknownObservable { observable: ObservableType },
    #[snafu(display("no observations of type {observable} for link ends [{link_ends}]"))]
    UnknownLinkEnds {
        observable: ObservableType,
        link_ends: LinkEnds,
    },
    #[snafu(display("structural mismatch: {what}"))]
    StructuralMismatch { what: String },
    #[snafu(display(
        "observed and computed observation times differ at index {index}: {observed} vs {computed}"
    ))]
    TimeMismatch {
        index: usize,
        observed: Epoch,
        computed: Epoch,
    },
    #[snafu(display("size mismatch when {action}: expected {expected}, got {got}"))]
    SizeMismatch {
        action: String,
        expected: usize,
        got: usize,
    },
    #[snafu(display("cannot compute {action} of an empty observation collection"))]
    EmptyCollection { action: &'static str },
    #[snafu(display("{what} is not implemented"))]
    NotImplemented { what: &'static str },
}

/// The physical quantity of a tracking observable. The associated vector size
/// is fixed per type.
#[derive(Copy, Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, Sequence)]
pub enum ObservableType {
    #[serde(rename = "range_km")]
    Range,
    #[serde(rename = "range_rate_km_s")]
    RangeRate,
    #[serde(rename = "avg_doppler_km_s")]
    AveragedDoppler,
    #[serde(rename = "angles_rad")]
    AngularPosition,
    #[serde(rename = "position_km")]
    CartesianPosition,
}

impl ObservableType {
    /// Number of scalar entries of a single observation of this type.
    pub const fn size(self) -> usize {
        match self {
            Self::Range | Self::RangeRate | Self::AveragedDoppler => 1,
            Self::AngularPosition => 2,
            Self::CartesianPosition => 3,
        }
    }

    /// Returns the expected unit of this observable type
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Range => "km",
            Self::RangeRate | Self::AveragedDoppler => "km/s",
            Self::AngularPosition => "rad",
            Self::CartesianPosition => "km",
        }
    }
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.unit())
    }
}

/// Role of one participant in a tracking link.
#[derive(
    Copy, Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Sequence,
)]
pub enum LinkEndRole {
    Transmitter,
    Reflector,
    Receiver,
    Observer,
    ObservedBody,
}

/// One participant of a link: a body, optionally refined to a station on it.
#[derive(Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkEndId {
    pub body: String,
    pub station: Option<String>,
}

impl LinkEndId {
    pub fn body(body: &str) -> Self {
        Self {
            body: body.to_string(),
            station: None,
        }
    }

    pub fn station(body: &str, station: &str) -> Self {
        Self {
            body: body.to_string(),
            station: Some(station.to_string()),
        }
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.station {
            Some(station) => write!(f, "{}/{}", self.body, station),
            None => write!(f, "{}", self.body),
        }
    }
}

/// The ordered set of named participants of one observation, keyed by role.
#[derive(Clone, Debug, Default, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkEnds(BTreeMap<LinkEndRole, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of one participant.
    pub fn with(mut self, role: LinkEndRole, id: LinkEndId) -> Self {
        self.0.insert(role, id);
        self
    }

    /// A two-way link between one station and one observed spacecraft.
    pub fn two_way(station: LinkEndId, spacecraft: LinkEndId) -> Self {
        Self::new()
            .with(LinkEndRole::Transmitter, station.clone())
            .with(LinkEndRole::Reflector, spacecraft)
            .with(LinkEndRole::Receiver, station)
    }

    pub fn get(&self, role: LinkEndRole) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkEndRole, &LinkEndId)> {
        self.0.iter()
    }
}

impl fmt::Display for LinkEnds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (role, id) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{role:?}: {id}")?;
            first = false;
        }
        Ok(())
    }
}

/// Ancillary settings shared by all samples of one observation set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AncillarySettings {
    /// Doppler integration (count) interval
    pub integration_interval: Option<Duration>,
    /// Reference frequency of the link
    pub reference_frequency_hz: Option<f64>,
    /// Retransmission delays, one entry per retransmitting link end
    pub retransmission_delays_s: Vec<f64>,
}

#[cfg(test)]
mod ut_msr {
    use super::*;

    #[test]
    fn observable_sizes() {
        assert_eq!(ObservableType::Range.size(), 1);
        assert_eq!(ObservableType::AveragedDoppler.size(), 1);
        assert_eq!(ObservableType::AngularPosition.size(), 2);
        assert_eq!(ObservableType::CartesianPosition.size(), 3);

        for observable in enum_iterator::all::<ObservableType>() {
            assert!(observable.size() >= 1);
            assert!(!observable.unit().is_empty());
        }
    }

    #[test]
    fn link_ends_display_and_order() {
        let link = LinkEnds::two_way(
            LinkEndId::station("Earth", "DSS-63"),
            LinkEndId::body("MRO"),
        );
        assert_eq!(link.len(), 3);
        assert_eq!(
            link.get(LinkEndRole::Receiver).unwrap(),
            &LinkEndId::station("Earth", "DSS-63")
        );
        // Roles print in their declaration order.
        assert_eq!(
            format!("{link}"),
            "Transmitter: Earth/DSS-63, Reflector: MRO, Receiver: Earth/DSS-63"
        );
    }
}
