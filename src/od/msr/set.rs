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

use super::{AncillarySettings, LinkEndRole, LinkEnds, MsrError, ObservableType};
use crate::linalg::DVector;
use crate::time::{Duration, Epoch};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Describes the dependent variables computed alongside the observations of
/// one set. The computation itself lives with the observation simulator; this
/// descriptor only carries what is needed to slice its output.
#[derive(Clone, Debug, PartialEq)]
pub struct DependentVariableCalculator {
    pub observable_type: ObservableType,
    pub link_ends: LinkEnds,
    /// Scalar size of each dependent variable slot, in slicing order.
    pub variable_sizes: Vec<usize>,
}

impl DependentVariableCalculator {
    pub fn total_size(&self) -> usize {
        self.variable_sizes.iter().sum()
    }

    /// Start offset and size of the nth dependent variable slot.
    pub fn variable_indices(&self, slot: usize) -> Option<(usize, usize)> {
        if slot >= self.variable_sizes.len() {
            return None;
        }
        let start = self.variable_sizes[..slot].iter().sum();
        Some((start, self.variable_sizes[slot]))
    }
}

/// One contiguous, time-ordered series of observations sharing one observable
/// type and one link-ends set.
///
/// The set is immutable after construction, except for the weights vector
/// which may be set (with size validation) once the estimation weights are
/// known. Every structural operation returns a new set.
#[derive(Clone, Debug)]
pub struct SingleObservationSet {
    observable_type: ObservableType,
    link_ends: LinkEnds,
    reference_link_end: LinkEndRole,
    observations: Vec<DVector<f64>>,
    times: Vec<Epoch>,
    dependent_variables: Vec<DVector<f64>>,
    dependent_variable_calculator: Option<DependentVariableCalculator>,
    ancillary: Option<AncillarySettings>,
    weights: Option<DVector<f64>>,
}

impl SingleObservationSet {
    /// Builds a new observation set, validating all size invariants.
    ///
    /// If the provided times are not already non-decreasing, the observations,
    /// times and dependent variables are re-ordered consistently by a stable
    /// sort on the time tags.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        observable_type: ObservableType,
        link_ends: LinkEnds,
        observations: Vec<DVector<f64>>,
        times: Vec<Epoch>,
        reference_link_end: LinkEndRole,
        dependent_variables: Vec<DVector<f64>>,
        dependent_variable_calculator: Option<DependentVariableCalculator>,
        ancillary: Option<AncillarySettings>,
    ) -> Result<Self, MsrError> {
        if let Some(calc) = &dependent_variable_calculator {
            if calc.observable_type != observable_type {
                return Err(MsrError::IncompatibleDependentVariableCalculator {
                    reason: format!(
                        "calculator observable {} but set observable {observable_type}",
                        calc.observable_type
                    ),
                });
            }
            if calc.link_ends != link_ends {
                return Err(MsrError::IncompatibleDependentVariableCalculator {
                    reason: format!(
                        "calculator link ends [{}] but set link ends [{link_ends}]",
                        calc.link_ends
                    ),
                });
            }
        }

        if observations.len() != times.len() {
            return Err(MsrError::InconsistentSize {
                action: "building an observation set from observations and times",
                expected: observations.len(),
                got: times.len(),
            });
        }

        for obs in &observations {
            if obs.len() != observable_type.size() {
                return Err(MsrError::InconsistentSize {
                    action: "checking per-observation vector sizes",
                    expected: observable_type.size(),
                    got: obs.len(),
                });
            }
        }

        if !dependent_variables.is_empty() && dependent_variables.len() != observations.len() {
            return Err(MsrError::InconsistentSize {
                action: "matching dependent variables to observations",
                expected: observations.len(),
                got: dependent_variables.len(),
            });
        }

        let mut set = Self {
            observable_type,
            link_ends,
            reference_link_end,
            observations,
            times,
            dependent_variables,
            dependent_variable_calculator,
            ancillary,
            weights: None,
        };

        if !set.times.windows(2).all(|pair| pair[0] <= pair[1]) {
            set.sort_by_time();
        }

        Ok(set)
    }

    /// Stable re-sort of (time, observation, dependent variable) triples by
    /// time, preserving the per-index correspondence of each triple.
    fn sort_by_time(&mut self) {
        let mut order: Vec<usize> = (0..self.times.len()).collect();
        order.sort_by(|&i, &j| self.times[i].cmp(&self.times[j]));

        self.times = order.iter().map(|&i| self.times[i]).collect();
        self.observations = order.iter().map(|&i| self.observations[i].clone()).collect();
        if !self.dependent_variables.is_empty() {
            self.dependent_variables = order
                .iter()
                .map(|&i| self.dependent_variables[i].clone())
                .collect();
        }
    }

    pub fn observable_type(&self) -> ObservableType {
        self.observable_type
    }

    pub fn link_ends(&self) -> &LinkEnds {
        &self.link_ends
    }

    pub fn reference_link_end(&self) -> LinkEndRole {
        self.reference_link_end
    }

    /// Number of observations (not scalar entries) in this set.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Scalar size of one observation of this set.
    pub fn observable_size(&self) -> usize {
        self.observable_type.size()
    }

    /// Total number of scalar observation entries.
    pub fn total_size(&self) -> usize {
        self.len() * self.observable_size()
    }

    pub fn observations(&self) -> &[DVector<f64>] {
        &self.observations
    }

    pub fn observation(&self, index: usize) -> Option<&DVector<f64>> {
        self.observations.get(index)
    }

    pub fn times(&self) -> &[Epoch] {
        &self.times
    }

    /// All scalar observation entries concatenated in time order.
    pub fn observations_vector(&self) -> DVector<f64> {
        let size = self.observable_size();
        let mut vector = DVector::zeros(self.total_size());
        for (i, obs) in self.observations.iter().enumerate() {
            vector.rows_mut(i * size, size).copy_from(obs);
        }
        vector
    }

    /// The observations as a time-ordered map.
    pub fn observations_history(&self) -> BTreeMap<Epoch, DVector<f64>> {
        self.times
            .iter()
            .copied()
            .zip(self.observations.iter().cloned())
            .collect()
    }

    pub fn dependent_variables(&self) -> &[DVector<f64>] {
        &self.dependent_variables
    }

    pub fn dependent_variable_history(&self) -> BTreeMap<Epoch, DVector<f64>> {
        self.times
            .iter()
            .copied()
            .zip(self.dependent_variables.iter().cloned())
            .collect()
    }

    pub fn dependent_variable_calculator(&self) -> Option<&DependentVariableCalculator> {
        self.dependent_variable_calculator.as_ref()
    }

    pub fn ancillary(&self) -> Option<&AncillarySettings> {
        self.ancillary.as_ref()
    }

    pub fn weights(&self) -> Option<&DVector<f64>> {
        self.weights.as_ref()
    }

    /// Sets the estimation weights of this set, one entry per scalar
    /// observation component.
    pub fn set_weights(&mut self, weights: DVector<f64>) -> Result<(), MsrError> {
        if weights.len() != self.total_size() {
            return Err(MsrError::WeightSizeMismatch {
                expected: self.total_size(),
                got: weights.len(),
            });
        }
        self.weights = Some(weights);
        Ok(())
    }

    /// Returns a new set with the provided zero-based sample indices removed.
    ///
    /// Duplicate indices are tolerated; the removals are applied in descending
    /// index order so earlier removals cannot shift later ones. The weights
    /// are not carried over.
    pub fn filtered(&self, indices: &[usize]) -> Result<Self, MsrError> {
        let mut observations = self.observations.clone();
        let mut times = self.times.clone();
        let mut dependent_variables = self.dependent_variables.clone();

        let mut descending = indices.to_vec();
        descending.sort_unstable_by(|a, b| b.cmp(a));
        descending.dedup();

        for &index in &descending {
            if index >= times.len() {
                return Err(MsrError::SizeMismatch {
                    action: format!(
                        "removing sample {index} from a {} set of [{}]",
                        self.observable_type, self.link_ends
                    ),
                    expected: times.len(),
                    got: index,
                });
            }
            times.remove(index);
            observations.remove(index);
            if !dependent_variables.is_empty() {
                dependent_variables.remove(index);
            }
        }

        Self::new(
            self.observable_type,
            self.link_ends.clone(),
            observations,
            times,
            self.reference_link_end,
            dependent_variables,
            self.dependent_variable_calculator.clone(),
            self.ancillary.clone(),
        )
    }

    /// Returns a new set spanning only the provided contiguous sample range,
    /// keeping all per-set metadata. Slicing preserves every construction
    /// invariant, so no re-validation happens.
    pub(crate) fn slice(&self, range: Range<usize>) -> Self {
        let dependent_variables = if self.dependent_variables.is_empty() {
            Vec::new()
        } else {
            self.dependent_variables[range.clone()].to_vec()
        };
        Self {
            observable_type: self.observable_type,
            link_ends: self.link_ends.clone(),
            reference_link_end: self.reference_link_end,
            observations: self.observations[range.clone()].to_vec(),
            times: self.times[range].to_vec(),
            dependent_variables,
            dependent_variable_calculator: self.dependent_variable_calculator.clone(),
            ancillary: self.ancillary.clone(),
            weights: None,
        }
    }
}

impl fmt::Display for SingleObservationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Empty {} observation set", self.observable_type)
        } else {
            write!(
                f,
                "{} set of {} observations over [{}] (from {} to {})",
                self.observable_type,
                self.len(),
                self.link_ends,
                self.times.first().unwrap(),
                self.times.last().unwrap(),
            )
        }
    }
}

/// Capability to transform raw observables into processed ones.
///
/// The default transformation is the identity; type-specific sets either
/// implement their transform fully or report it as unimplemented, never
/// silently return raw data under a processed name.
pub trait ProcessedObservables {
    fn processed_observables_vector(&self) -> Result<DVector<f64>, MsrError>;
}

impl ProcessedObservables for SingleObservationSet {
    fn processed_observables_vector(&self) -> Result<DVector<f64>, MsrError> {
        Ok(self.observations_vector())
    }
}

/// An averaged-Doppler observation set with the per-sample link bookkeeping
/// needed to convert raw counts into range-rate observables.
#[derive(Clone, Debug)]
pub struct RampedDopplerSet {
    set: SingleObservationSet,
    receiver_ramping_flags: Vec<bool>,
    reference_frequencies_hz: Vec<f64>,
    count_intervals: Vec<Duration>,
    transmitter_uplink_delays_s: Vec<f64>,
    receiver_downlink_delays_s: Vec<f64>,
}

impl RampedDopplerSet {
    pub fn new(
        set: SingleObservationSet,
        receiver_ramping_flags: Vec<bool>,
        reference_frequencies_hz: Vec<f64>,
        count_intervals: Vec<Duration>,
        transmitter_uplink_delays_s: Vec<f64>,
        receiver_downlink_delays_s: Vec<f64>,
    ) -> Result<Self, MsrError> {
        if set.observable_type() != ObservableType::AveragedDoppler {
            return Err(MsrError::StructuralMismatch {
                what: format!(
                    "ramped Doppler data requires {} sets, got {}",
                    ObservableType::AveragedDoppler,
                    set.observable_type()
                ),
            });
        }
        for (action, len) in [
            (
                "matching receiver ramping flags to observations",
                receiver_ramping_flags.len(),
            ),
            (
                "matching reference frequencies to observations",
                reference_frequencies_hz.len(),
            ),
            (
                "matching count intervals to observations",
                count_intervals.len(),
            ),
            (
                "matching transmitter uplink delays to observations",
                transmitter_uplink_delays_s.len(),
            ),
            (
                "matching receiver downlink delays to observations",
                receiver_downlink_delays_s.len(),
            ),
        ] {
            if len != set.len() {
                return Err(MsrError::InconsistentSize {
                    action,
                    expected: set.len(),
                    got: len,
                });
            }
        }

        Ok(Self {
            set,
            receiver_ramping_flags,
            reference_frequencies_hz,
            count_intervals,
            transmitter_uplink_delays_s,
            receiver_downlink_delays_s,
        })
    }

    pub fn set(&self) -> &SingleObservationSet {
        &self.set
    }

    pub fn receiver_ramping_flag_history(&self) -> BTreeMap<Epoch, bool> {
        self.set
            .times()
            .iter()
            .copied()
            .zip(self.receiver_ramping_flags.iter().copied())
            .collect()
    }

    pub fn reference_frequency_history(&self) -> BTreeMap<Epoch, f64> {
        self.set
            .times()
            .iter()
            .copied()
            .zip(self.reference_frequencies_hz.iter().copied())
            .collect()
    }

    pub fn count_interval_history(&self) -> BTreeMap<Epoch, Duration> {
        self.set
            .times()
            .iter()
            .copied()
            .zip(self.count_intervals.iter().copied())
            .collect()
    }

    pub fn transmitter_uplink_delays_s(&self) -> &[f64] {
        &self.transmitter_uplink_delays_s
    }

    pub fn receiver_downlink_delays_s(&self) -> &[f64] {
        &self.receiver_downlink_delays_s
    }
}

impl ProcessedObservables for RampedDopplerSet {
    fn processed_observables_vector(&self) -> Result<DVector<f64>, MsrError> {
        Err(MsrError::NotImplemented {
            what: "conversion of ramped Doppler counts to range-rate observables",
        })
    }
}

#[cfg(test)]
mod ut_set {
    use super::*;
    use crate::od::msr::LinkEndId;
    use crate::time::TimeUnits;

    fn link() -> LinkEnds {
        LinkEnds::two_way(
            LinkEndId::station("Earth", "DSS-63"),
            LinkEndId::body("MEX"),
        )
    }

    fn range_set(values: &[f64], times: Vec<Epoch>) -> SingleObservationSet {
        SingleObservationSet::new(
            ObservableType::Range,
            link(),
            values.iter().map(|&v| DVector::from_vec(vec![v])).collect(),
            times,
            LinkEndRole::Receiver,
            Vec::new(),
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn out_of_order_times_are_stably_sorted() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        let times = vec![t0 + 20.seconds(), t0, t0 + 10.seconds()];
        let set = range_set(&[3.0, 1.0, 2.0], times);

        assert_eq!(
            set.times(),
            &[t0, t0 + 10.seconds(), t0 + 20.seconds()],
            "times must be non-decreasing after construction"
        );
        // Each observation must still be paired with its own time tag.
        assert_eq!(set.observations()[0][0], 1.0);
        assert_eq!(set.observations()[1][0], 2.0);
        assert_eq!(set.observations()[2][0], 3.0);
    }

    #[test]
    fn size_mismatches_are_rejected() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        assert!(matches!(
            SingleObservationSet::new(
                ObservableType::Range,
                link(),
                vec![DVector::from_vec(vec![1.0])],
                vec![t0, t0 + 1.seconds()],
                LinkEndRole::Receiver,
                Vec::new(),
                None,
                None,
            ),
            Err(MsrError::InconsistentSize { .. })
        ));

        // A range observation must be a single scalar.
        assert!(matches!(
            SingleObservationSet::new(
                ObservableType::Range,
                link(),
                vec![DVector::from_vec(vec![1.0, 2.0])],
                vec![t0],
                LinkEndRole::Receiver,
                Vec::new(),
                None,
                None,
            ),
            Err(MsrError::InconsistentSize { .. })
        ));
    }

    #[test]
    fn incompatible_dependent_variable_calculator() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        let calc = DependentVariableCalculator {
            observable_type: ObservableType::RangeRate,
            link_ends: link(),
            variable_sizes: vec![1],
        };
        assert!(matches!(
            SingleObservationSet::new(
                ObservableType::Range,
                link(),
                vec![DVector::from_vec(vec![1.0])],
                vec![t0],
                LinkEndRole::Receiver,
                vec![DVector::from_vec(vec![0.5])],
                Some(calc),
                None,
            ),
            Err(MsrError::IncompatibleDependentVariableCalculator { .. })
        ));
    }

    #[test]
    fn weights_size_check() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        let mut set = range_set(&[1.0, 2.0, 3.0], vec![t0, t0 + 1.seconds(), t0 + 2.seconds()]);

        assert!(matches!(
            set.set_weights(DVector::from_vec(vec![1.0, 1.0])),
            Err(MsrError::WeightSizeMismatch {
                expected: 3,
                got: 2
            })
        ));

        let weights = DVector::from_vec(vec![0.1, 0.2, 0.3]);
        set.set_weights(weights.clone()).unwrap();
        assert_eq!(set.weights().unwrap(), &weights);
    }

    #[test]
    fn filtered_set_shrinkage() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        let times: Vec<Epoch> = (0..5).map(|i| t0 + (i as i64).seconds()).collect();
        let set = range_set(&[10.0, 11.0, 12.0, 13.0, 14.0], times);

        // Duplicated indices must not over-remove.
        let filtered = set.filtered(&[1, 3, 3]).unwrap();
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered.observations()[0][0], 10.0);
        assert_eq!(filtered.observations()[1][0], 12.0);
        assert_eq!(filtered.observations()[2][0], 14.0);
        assert_eq!(filtered.times()[1], t0 + 2.seconds());

        assert!(set.filtered(&[5]).is_err());
    }

    #[test]
    fn doppler_processed_observables_unimplemented() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 3, 1);
        let base = SingleObservationSet::new(
            ObservableType::AveragedDoppler,
            link(),
            vec![DVector::from_vec(vec![0.1])],
            vec![t0],
            LinkEndRole::Receiver,
            Vec::new(),
            None,
            Some(AncillarySettings {
                integration_interval: Some(60.seconds()),
                reference_frequency_hz: Some(7.2e9),
                retransmission_delays_s: vec![0.0],
            }),
        )
        .unwrap();

        assert!(base.processed_observables_vector().is_ok());

        let doppler = RampedDopplerSet::new(
            base,
            vec![true],
            vec![7.2e9],
            vec![60.seconds()],
            vec![0.0],
            vec![1.5e-6],
        )
        .unwrap();

        assert!(matches!(
            doppler.processed_observables_vector(),
            Err(MsrError::NotImplemented { .. })
        ));
    }
}
