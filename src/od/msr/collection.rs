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

use super::{
    AncillarySettings, LinkEndRole, LinkEnds, MsrError, ObservableType, SingleObservationSet,
};
use crate::linalg::DVector;
use crate::time::Epoch;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::OnceLock;

/// Nested mapping of observation sets: observable type (insertion order) to
/// link ends (insertion order) to the ordered list of sets.
pub type SortedObservationSets =
    IndexMap<ObservableType, IndexMap<LinkEnds, Vec<SingleObservationSet>>>;

/// `(start offset, length)` of one slice of the concatenated buffers.
pub type StartAndSize = (usize, usize);

/// Aggregates many single-link observation sets into one flat, concatenated
/// buffer of scalar observations with O(1) random access by
/// (type, link ends, set index).
///
/// All derived buffers and index tables are computed once at construction as a
/// pure function of the nested mapping and never mutated afterwards: every
/// structural operation (filtering, residuals, arc splitting) builds a new
/// collection. The concatenated weights are the one lazily memoized exception.
pub struct ObservationCollection {
    sets: SortedObservationSets,
    concatenated_observations: DVector<f64>,
    concatenated_times: Vec<Epoch>,
    concatenated_link_end_ids: Vec<usize>,
    concatenated_link_ends: Vec<LinkEnds>,
    link_end_ids: IndexMap<LinkEnds, usize>,
    set_start_and_size: IndexMap<ObservableType, IndexMap<LinkEnds, Vec<StartAndSize>>>,
    concatenated_set_start_and_size: Vec<StartAndSize>,
    type_and_link_ends_start_and_size: IndexMap<ObservableType, IndexMap<LinkEnds, StartAndSize>>,
    type_start_and_size: IndexMap<ObservableType, StartAndSize>,
    total_observable_size: usize,
    total_observation_count: usize,
    concatenated_weights: OnceLock<DVector<f64>>,
}

impl ObservationCollection {
    /// Builds a collection from a pre-sorted nested mapping.
    pub fn new(sets: SortedObservationSets) -> Self {
        let indices = derive_indices(&sets);
        let buffers = derive_buffers(&sets, &indices);

        Self {
            sets,
            concatenated_observations: buffers.observations,
            concatenated_times: buffers.times,
            concatenated_link_end_ids: buffers.link_end_ids,
            concatenated_link_ends: buffers.link_ends,
            link_end_ids: buffers.link_end_id_map,
            set_start_and_size: indices.set_start_and_size,
            concatenated_set_start_and_size: indices.concatenated_set_start_and_size,
            type_and_link_ends_start_and_size: indices.type_and_link_ends_start_and_size,
            type_start_and_size: indices.type_start_and_size,
            total_observable_size: indices.total_observable_size,
            total_observation_count: indices.total_observation_count,
            concatenated_weights: OnceLock::new(),
        }
    }

    /// Builds a collection from a flat list of sets, sorting them by
    /// (observable type, link ends) while preserving the insertion order of
    /// the first occurrence of each key.
    pub fn from_sets(list: Vec<SingleObservationSet>) -> Self {
        let mut sorted = SortedObservationSets::new();
        for set in list {
            sorted
                .entry(set.observable_type())
                .or_default()
                .entry(set.link_ends().clone())
                .or_default()
                .push(set);
        }
        Self::new(sorted)
    }

    /// Builds a collection holding a single observation set.
    #[allow(clippy::too_many_arguments)]
    pub fn from_single(
        observable_type: ObservableType,
        link_ends: LinkEnds,
        observations: Vec<DVector<f64>>,
        times: Vec<Epoch>,
        reference_link_end: LinkEndRole,
        ancillary: Option<AncillarySettings>,
    ) -> Result<Self, MsrError> {
        let set = SingleObservationSet::new(
            observable_type,
            link_ends,
            observations,
            times,
            reference_link_end,
            Vec::new(),
            None,
            ancillary,
        )?;
        Ok(Self::from_sets(vec![set]))
    }

    pub fn sets(&self) -> &SortedObservationSets {
        &self.sets
    }

    /// All scalar observation entries in the fixed traversal order.
    pub fn observation_vector(&self) -> &DVector<f64> {
        &self.concatenated_observations
    }

    /// Time tag of every scalar entry of the observation vector.
    pub fn concatenated_times(&self) -> &[Epoch] {
        &self.concatenated_times
    }

    /// Link-ends identifier of every scalar entry of the observation vector.
    pub fn concatenated_link_end_ids(&self) -> &[usize] {
        &self.concatenated_link_end_ids
    }

    /// Link-ends set of every scalar entry of the observation vector.
    pub fn concatenated_link_ends(&self) -> &[LinkEnds] {
        &self.concatenated_link_ends
    }

    /// The link-ends to identifier bijection, in first-encountered order.
    pub fn link_end_identifiers(&self) -> &IndexMap<LinkEnds, usize> {
        &self.link_end_ids
    }

    /// Inverse of [`Self::link_end_identifiers`]: identifiers are dense and
    /// assigned in first-encountered order.
    pub fn link_ends_for_identifier(&self, id: usize) -> Option<&LinkEnds> {
        self.link_end_ids.get_index(id).map(|(link_ends, _)| link_ends)
    }

    /// Total number of scalar observation entries.
    pub fn total_observable_size(&self) -> usize {
        self.total_observable_size
    }

    /// Total number of observations (one observation may span several scalar
    /// entries).
    pub fn total_observation_count(&self) -> usize {
        self.total_observation_count
    }

    /// Returns the (min, max) epochs over the concatenated time buffer.
    pub fn time_bounds(&self) -> Result<(Epoch, Epoch), MsrError> {
        // Minimum over an empty sequence is undefined, so guard explicitly.
        if self.concatenated_times.is_empty() {
            return Err(MsrError::EmptyCollection {
                action: "time bounds",
            });
        }
        let min = *self.concatenated_times.iter().min().unwrap();
        let max = *self.concatenated_times.iter().max().unwrap();
        Ok((min, max))
    }

    /// Per (type, link ends, set index) start and size table.
    pub fn set_start_and_size(
        &self,
    ) -> &IndexMap<ObservableType, IndexMap<LinkEnds, Vec<StartAndSize>>> {
        &self.set_start_and_size
    }

    /// Start and size of every set, in the fixed traversal order.
    pub fn concatenated_set_start_and_size(&self) -> &[StartAndSize] {
        &self.concatenated_set_start_and_size
    }

    /// Combined start and size per (type, link ends) pair.
    pub fn type_and_link_ends_start_and_size(
        &self,
    ) -> &IndexMap<ObservableType, IndexMap<LinkEnds, StartAndSize>> {
        &self.type_and_link_ends_start_and_size
    }

    /// Combined start and size per observable type.
    pub fn type_start_and_size(&self) -> &IndexMap<ObservableType, StartAndSize> {
        &self.type_start_and_size
    }

    /// The per-set start and size table keyed by link-ends identifier instead
    /// of the link-ends set itself.
    pub fn set_start_and_size_per_link_end_id(
        &self,
    ) -> IndexMap<ObservableType, IndexMap<usize, Vec<StartAndSize>>> {
        let mut rtn = IndexMap::new();
        for (observable, per_link) in &self.set_start_and_size {
            let mut inner = IndexMap::new();
            for (link_ends, entries) in per_link {
                inner.insert(self.link_end_ids[link_ends], entries.clone());
            }
            rtn.insert(*observable, inner);
        }
        rtn
    }

    /// The link-ends sets observed per observable type, in insertion order.
    pub fn link_ends_per_observable(&self) -> IndexMap<ObservableType, Vec<LinkEnds>> {
        self.sets
            .iter()
            .map(|(observable, per_link)| (*observable, per_link.keys().cloned().collect()))
            .collect()
    }

    /// The unique observable types of this collection.
    pub fn unique_types(&self) -> IndexSet<ObservableType> {
        self.sets.keys().copied().collect()
    }

    /// All sets of the provided observable type and link ends.
    pub fn single_link_and_type_sets(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
    ) -> Result<&Vec<SingleObservationSet>, MsrError> {
        let per_link = self
            .sets
            .get(&observable)
            .ok_or(MsrError::UnknownObservable { observable })?;
        per_link.get(link_ends).ok_or_else(|| MsrError::UnknownLinkEnds {
            observable,
            link_ends: link_ends.clone(),
        })
    }

    /// The contiguous slice of the observation vector spanning all sets of the
    /// provided observable type and link ends.
    ///
    /// The sets of one (type, link ends) pair are stored contiguously in the
    /// flat buffer, so the combined span runs from the first recorded start to
    /// the end of the last recorded entry.
    pub fn single_link_observations(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
    ) -> Result<DVector<f64>, MsrError> {
        let (start, size) = self.single_link_span(observable, link_ends)?;
        Ok(self.concatenated_observations.rows(start, size).into_owned())
    }

    /// The time tags matching [`Self::single_link_observations`].
    pub fn single_link_times(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
    ) -> Result<Vec<Epoch>, MsrError> {
        let (start, size) = self.single_link_span(observable, link_ends)?;
        Ok(self.concatenated_times[start..start + size].to_vec())
    }

    pub fn single_link_observations_and_times(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
    ) -> Result<(DVector<f64>, Vec<Epoch>), MsrError> {
        Ok((
            self.single_link_observations(observable, link_ends)?,
            self.single_link_times(observable, link_ends)?,
        ))
    }

    fn single_link_span(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
    ) -> Result<StartAndSize, MsrError> {
        let per_link = self
            .set_start_and_size
            .get(&observable)
            .ok_or(MsrError::UnknownObservable { observable })?;
        let entries = per_link.get(link_ends).ok_or_else(|| MsrError::UnknownLinkEnds {
            observable,
            link_ends: link_ends.clone(),
        })?;
        if entries.is_empty() {
            return Err(MsrError::UnknownLinkEnds {
                observable,
                link_ends: link_ends.clone(),
            });
        }
        let (first_start, _) = entries[0];
        let (last_start, last_size) = entries[entries.len() - 1];
        Ok((first_start, (last_start - first_start) + last_size))
    }

    /// The estimation weights of every scalar entry, assembled from the
    /// per-set weight vectors. Computed on first request and memoized.
    ///
    /// Sets without weights contribute zeros.
    pub fn concatenated_weights(&self) -> Result<&DVector<f64>, MsrError> {
        if let Some(weights) = self.concatenated_weights.get() {
            return Ok(weights);
        }
        let weights = self.weights_from_sets()?;
        Ok(self.concatenated_weights.get_or_init(|| weights))
    }

    fn weights_from_sets(&self) -> Result<DVector<f64>, MsrError> {
        let mut weights = DVector::zeros(self.total_observable_size);
        for (observable, per_link) in &self.sets {
            for (link_ends, set_list) in per_link {
                for (i, set) in set_list.iter().enumerate() {
                    let (start, size) = self.set_start_and_size[observable][link_ends][i];
                    if let Some(set_weights) = set.weights() {
                        if set_weights.len() != size {
                            return Err(MsrError::WeightSizeMismatch {
                                expected: size,
                                got: set_weights.len(),
                            });
                        }
                        weights.rows_mut(start, size).copy_from(set_weights);
                    }
                }
            }
        }
        Ok(weights)
    }
}

impl fmt::Display for ObservationCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time_bounds() {
            Err(_) => write!(f, "Empty observation collection"),
            Ok((start, end)) => write!(
                f,
                "Observation collection with {} observations ({} scalar entries) of types {:?} over {} (from {start} to {end}) with {} link ends",
                self.total_observation_count,
                self.total_observable_size,
                self.unique_types(),
                end - start,
                self.link_end_ids.len(),
            ),
        }
    }
}

struct DerivedIndices {
    set_start_and_size: IndexMap<ObservableType, IndexMap<LinkEnds, Vec<StartAndSize>>>,
    concatenated_set_start_and_size: Vec<StartAndSize>,
    type_and_link_ends_start_and_size: IndexMap<ObservableType, IndexMap<LinkEnds, StartAndSize>>,
    type_start_and_size: IndexMap<ObservableType, StartAndSize>,
    total_observable_size: usize,
    total_observation_count: usize,
}

/// Derives every start/size table from the nested mapping, in one pass over
/// the fixed traversal order. Consecutive entries satisfy
/// `start[k + 1] == start[k] + size[k]` and the sizes sum to the total.
fn derive_indices(sets: &SortedObservationSets) -> DerivedIndices {
    let mut set_start_and_size: IndexMap<ObservableType, IndexMap<LinkEnds, Vec<StartAndSize>>> =
        IndexMap::new();
    let mut concatenated_set_start_and_size = Vec::new();
    let mut type_and_link_ends_start_and_size: IndexMap<
        ObservableType,
        IndexMap<LinkEnds, StartAndSize>,
    > = IndexMap::new();
    let mut type_start_and_size = IndexMap::new();

    let mut current_start = 0_usize;
    let mut total_observation_count = 0_usize;

    for (observable, per_link) in sets {
        let observable_size = observable.size();
        let type_start = current_start;
        let mut type_size = 0_usize;

        for (link_ends, set_list) in per_link {
            let link_ends_start = current_start;
            let mut link_ends_size = 0_usize;

            for set in set_list {
                let set_size = set.len() * observable_size;
                set_start_and_size
                    .entry(*observable)
                    .or_default()
                    .entry(link_ends.clone())
                    .or_default()
                    .push((current_start, set_size));
                concatenated_set_start_and_size.push((current_start, set_size));

                current_start += set_size;
                type_size += set_size;
                link_ends_size += set_size;
                total_observation_count += set.len();
            }

            type_and_link_ends_start_and_size
                .entry(*observable)
                .or_default()
                .insert(link_ends.clone(), (link_ends_start, link_ends_size));
        }

        type_start_and_size.insert(*observable, (type_start, type_size));
    }

    DerivedIndices {
        set_start_and_size,
        concatenated_set_start_and_size,
        type_and_link_ends_start_and_size,
        type_start_and_size,
        total_observable_size: current_start,
        total_observation_count,
    }
}

struct DerivedBuffers {
    observations: DVector<f64>,
    times: Vec<Epoch>,
    link_end_ids: Vec<usize>,
    link_ends: Vec<LinkEnds>,
    link_end_id_map: IndexMap<LinkEnds, usize>,
}

/// Concatenates all observations, time tags and link-ends identifiers in the
/// fixed traversal order, assigning link-ends identifiers in first-encountered
/// order.
fn derive_buffers(sets: &SortedObservationSets, indices: &DerivedIndices) -> DerivedBuffers {
    let total = indices.total_observable_size;
    let mut observations = DVector::zeros(total);
    let mut times = Vec::with_capacity(total);
    let mut link_end_ids = Vec::with_capacity(total);
    let mut link_ends_buffer = Vec::with_capacity(total);
    let mut link_end_id_map: IndexMap<LinkEnds, usize> = IndexMap::new();

    for (observable, per_link) in sets {
        let observable_size = observable.size();

        for (link_ends, set_list) in per_link {
            let next_id = link_end_id_map.len();
            let current_id = *link_end_id_map.entry(link_ends.clone()).or_insert(next_id);

            for (i, set) in set_list.iter().enumerate() {
                let (start, size) = indices.set_start_and_size[observable][link_ends][i];
                observations
                    .rows_mut(start, size)
                    .copy_from(&set.observations_vector());

                for epoch in set.times() {
                    for _ in 0..observable_size {
                        times.push(*epoch);
                        link_end_ids.push(current_id);
                        link_ends_buffer.push(link_ends.clone());
                    }
                }
            }
        }
    }

    DerivedBuffers {
        observations,
        times,
        link_end_ids,
        link_ends: link_ends_buffer,
        link_end_id_map,
    }
}
