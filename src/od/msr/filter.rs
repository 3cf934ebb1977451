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

//! Residual computation, arc segmentation and outlier filtering. All
//! operations here build new sets and collections, never mutate in place.

use super::{
    LinkEnds, MsrError, ObservableType, ObservationCollection, SingleObservationSet,
    SortedObservationSets,
};
use crate::linalg::DVector;
use crate::time::Duration;
use indexmap::IndexMap;

/// Element-wise (observed - computed) residuals of two structurally identical
/// observation sets.
///
/// The paired sets must agree in observable type, reference link end, link
/// ends and observation count, and their sample time tags must be identical.
pub fn residual_set(
    observed: &SingleObservationSet,
    computed: &SingleObservationSet,
) -> Result<SingleObservationSet, MsrError> {
    if observed.observable_type() != computed.observable_type() {
        return Err(MsrError::StructuralMismatch {
            what: format!(
                "observable type ({} observed vs {} computed)",
                observed.observable_type(),
                computed.observable_type()
            ),
        });
    }
    if observed.reference_link_end() != computed.reference_link_end() {
        return Err(MsrError::StructuralMismatch {
            what: format!(
                "reference link end ({:?} observed vs {:?} computed)",
                observed.reference_link_end(),
                computed.reference_link_end()
            ),
        });
    }
    if observed.link_ends() != computed.link_ends() {
        return Err(MsrError::StructuralMismatch {
            what: format!(
                "link ends ([{}] observed vs [{}] computed)",
                observed.link_ends(),
                computed.link_ends()
            ),
        });
    }
    if observed.len() != computed.len() {
        return Err(MsrError::StructuralMismatch {
            what: format!(
                "observation count ({} observed vs {} computed)",
                observed.len(),
                computed.len()
            ),
        });
    }

    let mut residuals = Vec::with_capacity(observed.len());
    for (index, (obs_time, cmp_time)) in observed
        .times()
        .iter()
        .zip(computed.times().iter())
        .enumerate()
    {
        if obs_time != cmp_time {
            return Err(MsrError::TimeMismatch {
                index,
                observed: *obs_time,
                computed: *cmp_time,
            });
        }
        residuals.push(&observed.observations()[index] - &computed.observations()[index]);
    }

    SingleObservationSet::new(
        observed.observable_type(),
        observed.link_ends().clone(),
        residuals,
        observed.times().to_vec(),
        observed.reference_link_end(),
        Vec::new(),
        None,
        observed.ancillary().cloned(),
    )
}

/// Pairs every set of the observed collection with the set at the same
/// (type, link ends, index) of the computed collection and assembles the
/// residual collection.
pub fn residual_collection(
    observed: &ObservationCollection,
    computed: &ObservationCollection,
) -> Result<ObservationCollection, MsrError> {
    let mut residual_sets = SortedObservationSets::new();

    for (observable, per_link) in observed.sets() {
        for (link_ends, observed_list) in per_link {
            let computed_list = computed
                .sets()
                .get(observable)
                .and_then(|per_link| per_link.get(link_ends))
                .ok_or_else(|| MsrError::StructuralMismatch {
                    what: format!(
                        "computed collection has no {observable} sets for [{link_ends}]"
                    ),
                })?;
            if computed_list.len() != observed_list.len() {
                return Err(MsrError::StructuralMismatch {
                    what: format!(
                        "number of {observable} sets for [{link_ends}] ({} observed vs {} computed)",
                        observed_list.len(),
                        computed_list.len()
                    ),
                });
            }

            let residual_list = observed_list
                .iter()
                .zip(computed_list.iter())
                .map(|(obs, cmp)| residual_set(obs, cmp))
                .collect::<Result<Vec<_>, _>>()?;
            residual_sets
                .entry(*observable)
                .or_default()
                .insert(link_ends.clone(), residual_list);
        }
    }

    Ok(ObservationCollection::new(residual_sets))
}

/// Lazily yields the contiguous arcs of one time-ordered observation set.
///
/// A new arc starts wherever the gap between consecutive samples exceeds the
/// split interval; arcs whose sample count does not exceed (strictly) the
/// minimum are discarded. The iterator is finite and non-restartable.
pub struct ArcSplitIterator<'a> {
    set: &'a SingleObservationSet,
    gap_threshold: Duration,
    minimum_samples: usize,
    cursor: usize,
}

impl Iterator for ArcSplitIterator<'_> {
    type Item = SingleObservationSet;

    fn next(&mut self) -> Option<Self::Item> {
        let times = self.set.times();
        loop {
            if self.cursor >= times.len() {
                return None;
            }
            let start = self.cursor;
            let mut end = start + 1;
            while end < times.len() && times[end] - times[end - 1] <= self.gap_threshold {
                end += 1;
            }
            self.cursor = end;
            if end - start > self.minimum_samples {
                return Some(self.set.slice(start..end));
            }
        }
    }
}

/// Partitions a single observation set into arcs split at time gaps larger
/// than `gap_threshold`, keeping only arcs with more than `minimum_samples`
/// samples.
pub fn split_single_set_into_arcs(
    set: &SingleObservationSet,
    gap_threshold: Duration,
    minimum_samples: usize,
) -> ArcSplitIterator<'_> {
    ArcSplitIterator {
        set,
        gap_threshold,
        minimum_samples,
        cursor: 0,
    }
}

/// Applies [`split_single_set_into_arcs`] to every set of the collection and
/// rebuilds a new collection from the surviving arcs.
pub fn split_collection_into_arcs(
    collection: &ObservationCollection,
    gap_threshold: Duration,
    minimum_samples: usize,
) -> ObservationCollection {
    let mut split_sets = SortedObservationSets::new();
    for (observable, per_link) in collection.sets() {
        for (link_ends, set_list) in per_link {
            let arcs: Vec<SingleObservationSet> = set_list
                .iter()
                .flat_map(|set| split_single_set_into_arcs(set, gap_threshold, minimum_samples))
                .collect();
            if !arcs.is_empty() {
                split_sets
                    .entry(*observable)
                    .or_default()
                    .insert(link_ends.clone(), arcs);
            }
        }
    }
    ObservationCollection::new(split_sets)
}

/// The structured removal plan of an outlier filter: per observable type, per
/// link ends, per set index, the sample indices to remove.
pub type FilterPlan = IndexMap<ObservableType, Vec<(LinkEnds, Vec<Vec<usize>>)>>;

/// Builds the removal plan marking every sample with any scalar residual
/// component whose magnitude exceeds the per-observable-type cutoff.
///
/// The residual vector must span the full collection (one entry per scalar
/// observation component, in the fixed traversal order).
pub fn entries_to_filter(
    collection: &ObservationCollection,
    residuals: &DVector<f64>,
    cutoff_per_observable: &IndexMap<ObservableType, f64>,
) -> Result<FilterPlan, MsrError> {
    if residuals.len() != collection.total_observable_size() {
        return Err(MsrError::SizeMismatch {
            action: "matching the residual vector to the collection".to_string(),
            expected: collection.total_observable_size(),
            got: residuals.len(),
        });
    }

    let mut plan = FilterPlan::new();

    for (observable, per_link) in collection.sets() {
        let cutoff = *cutoff_per_observable.get(observable).ok_or_else(|| {
            MsrError::StructuralMismatch {
                what: format!("no residual cutoff provided for {observable}"),
            }
        })?;
        let observable_size = observable.size();

        let mut per_observable_entries = Vec::new();
        for (link_ends, set_list) in per_link {
            let mut per_set_indices = Vec::with_capacity(set_list.len());
            for (i, set) in set_list.iter().enumerate() {
                let (start, size) = collection.set_start_and_size()[observable][link_ends][i];
                if size != set.total_size() {
                    return Err(MsrError::SizeMismatch {
                        action: format!(
                            "slicing residuals of {observable} set {i} for [{link_ends}]"
                        ),
                        expected: set.total_size(),
                        got: size,
                    });
                }
                let set_residuals = residuals.rows(start, size);

                let mut indices_to_remove = Vec::new();
                for j in 0..set.len() {
                    let exceeds = (0..observable_size)
                        .any(|k| set_residuals[j * observable_size + k].abs() > cutoff);
                    if exceeds {
                        indices_to_remove.push(j);
                    }
                }
                per_set_indices.push(indices_to_remove);
            }
            per_observable_entries.push((link_ends.clone(), per_set_indices));
        }
        plan.insert(*observable, per_observable_entries);
    }

    Ok(plan)
}

/// Applies a removal plan, returning a new collection in which every affected
/// set was rebuilt without the marked samples and every unaffected set is
/// carried over untouched.
pub fn filter_data(
    collection: &ObservationCollection,
    plan: &FilterPlan,
) -> Result<ObservationCollection, MsrError> {
    // The plan may only reference data present in the target collection.
    for (observable, per_observable) in plan {
        for (link_ends, per_set_indices) in per_observable {
            let set_list = collection
                .sets()
                .get(observable)
                .and_then(|per_link| per_link.get(link_ends))
                .ok_or_else(|| MsrError::SizeMismatch {
                    action: format!(
                        "applying a filter plan for {observable} and [{link_ends}] absent from the collection"
                    ),
                    expected: 0,
                    got: per_set_indices.len(),
                })?;
            if per_set_indices.len() != set_list.len() {
                return Err(MsrError::SizeMismatch {
                    action: format!(
                        "matching the filter plan to the {observable} sets for [{link_ends}]"
                    ),
                    expected: set_list.len(),
                    got: per_set_indices.len(),
                });
            }
        }
    }

    let mut filtered_sets = SortedObservationSets::new();
    for (observable, per_link) in collection.sets() {
        for (link_ends, set_list) in per_link {
            let removals = plan.get(observable).and_then(|entries| {
                entries
                    .iter()
                    .find(|(plan_link_ends, _)| plan_link_ends == link_ends)
                    .map(|(_, per_set_indices)| per_set_indices)
            });

            let mut new_list = Vec::with_capacity(set_list.len());
            for (i, set) in set_list.iter().enumerate() {
                match removals {
                    Some(per_set_indices) if !per_set_indices[i].is_empty() => {
                        new_list.push(set.filtered(&per_set_indices[i])?)
                    }
                    _ => new_list.push(set.clone()),
                }
            }
            filtered_sets
                .entry(*observable)
                .or_default()
                .insert(link_ends.clone(), new_list);
        }
    }

    Ok(ObservationCollection::new(filtered_sets))
}

/// Composes residual computation and outlier filtering: builds the
/// (observed - computed) residual vector, derives one removal plan from it,
/// and applies that same plan to both collections so they remain index-aligned.
pub fn filter_observed_and_computed(
    observed: &ObservationCollection,
    computed: &ObservationCollection,
    cutoff_per_observable: &IndexMap<ObservableType, f64>,
) -> Result<(ObservationCollection, ObservationCollection), MsrError> {
    if observed.total_observable_size() != computed.total_observable_size() {
        return Err(MsrError::SizeMismatch {
            action: "pairing observed and computed collections for filtering".to_string(),
            expected: observed.total_observable_size(),
            got: computed.total_observable_size(),
        });
    }

    let residuals = observed.observation_vector() - computed.observation_vector();
    let plan = entries_to_filter(observed, &residuals, cutoff_per_observable)?;

    Ok((
        filter_data(observed, &plan)?,
        filter_data(computed, &plan)?,
    ))
}
