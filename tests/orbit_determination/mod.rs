use erebus::od::prelude::*;
use indexmap::IndexMap;
use na::DVector;
use rstest::rstest;

fn t0() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2024, 3, 1)
}

fn madrid_link() -> LinkEnds {
    LinkEnds::two_way(
        LinkEndId::station("Earth", "DSS-63"),
        LinkEndId::body("MEX"),
    )
}

fn goldstone_link() -> LinkEnds {
    LinkEnds::two_way(
        LinkEndId::station("Earth", "DSS-14"),
        LinkEndId::body("MEX"),
    )
}

fn range_set(link: LinkEnds, values: &[f64], start: Epoch, step_s: i64) -> SingleObservationSet {
    SingleObservationSet::new(
        ObservableType::Range,
        link,
        values.iter().map(|&v| DVector::from_vec(vec![v])).collect(),
        (0..values.len())
            .map(|i| start + ((i as i64) * step_s).seconds())
            .collect(),
        LinkEndRole::Receiver,
        Vec::new(),
        None,
        None,
    )
    .unwrap()
}

fn angles_set(link: LinkEnds, count: usize, start: Epoch) -> SingleObservationSet {
    SingleObservationSet::new(
        ObservableType::AngularPosition,
        link,
        (0..count)
            .map(|i| DVector::from_vec(vec![0.1 * i as f64, 0.2 * i as f64]))
            .collect(),
        (0..count).map(|i| start + (i as i64).minutes()).collect(),
        LinkEndRole::Receiver,
        Vec::new(),
        None,
        None,
    )
    .unwrap()
}

fn three_set_collection() -> ObservationCollection {
    ObservationCollection::from_sets(vec![
        range_set(madrid_link(), &[1.0e5, 1.1e5, 1.2e5], t0(), 60),
        range_set(goldstone_link(), &[2.0e5, 2.1e5], t0() + 1.hours(), 60),
        angles_set(madrid_link(), 4, t0() + 2.hours()),
    ])
}

#[test]
fn index_tables_are_consistent() {
    let collection = three_set_collection();

    // 3 + 2 range entries, 4 angle observations of size 2.
    assert_eq!(collection.total_observable_size(), 3 + 2 + 4 * 2);
    assert_eq!(collection.total_observation_count(), 9);

    let mut expected_start = 0;
    let mut summed = 0;
    for (start, size) in collection.concatenated_set_start_and_size() {
        assert_eq!(
            *start, expected_start,
            "every set must start where the previous one ended"
        );
        expected_start += size;
        summed += size;
    }
    assert_eq!(summed, collection.total_observable_size());

    // The parallel buffers span every scalar entry.
    assert_eq!(
        collection.concatenated_times().len(),
        collection.total_observable_size()
    );
    assert_eq!(
        collection.concatenated_link_end_ids().len(),
        collection.total_observable_size()
    );
    assert_eq!(collection.observation_vector().len(), collection.total_observable_size());
}

#[test]
fn link_end_identifiers_are_dense_and_stable() {
    let collection = three_set_collection();

    let ids = collection.link_end_identifiers();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[&madrid_link()], 0, "first-encountered link gets id 0");
    assert_eq!(ids[&goldstone_link()], 1);

    assert_eq!(collection.link_ends_for_identifier(0), Some(&madrid_link()));
    assert_eq!(collection.link_ends_for_identifier(1), Some(&goldstone_link()));
    assert_eq!(collection.link_ends_for_identifier(2), None);
}

#[test]
fn single_link_retrieval_and_errors() {
    let collection = three_set_collection();

    let (observations, times) = collection
        .single_link_observations_and_times(ObservableType::Range, &madrid_link())
        .unwrap();
    assert_eq!(observations.len(), 3);
    assert_eq!(times.len(), 3);
    assert_eq!(observations[0], 1.0e5);
    assert_eq!(times[0], t0());

    assert!(matches!(
        collection.single_link_observations(ObservableType::RangeRate, &madrid_link()),
        Err(MsrError::UnknownObservable { .. })
    ));

    let unknown_link = LinkEnds::two_way(
        LinkEndId::station("Earth", "DSS-43"),
        LinkEndId::body("MEX"),
    );
    assert!(matches!(
        collection.single_link_times(ObservableType::Range, &unknown_link),
        Err(MsrError::UnknownLinkEnds { .. })
    ));
}

#[test]
fn time_bounds_require_data() {
    let empty = ObservationCollection::from_sets(Vec::new());
    assert!(matches!(
        empty.time_bounds(),
        Err(MsrError::EmptyCollection { .. })
    ));

    let collection = three_set_collection();
    let (start, end) = collection.time_bounds().unwrap();
    assert_eq!(start, t0());
    assert_eq!(end, t0() + 2.hours() + 3.minutes());
}

#[test]
fn concatenated_weights_default_to_zero_and_follow_the_sets() {
    let mut weighted = range_set(madrid_link(), &[1.0e5, 1.1e5, 1.2e5], t0(), 60);
    weighted
        .set_weights(DVector::from_vec(vec![0.5, 0.5, 0.5]))
        .unwrap();
    let unweighted = range_set(goldstone_link(), &[2.0e5, 2.1e5], t0() + 1.hours(), 60);

    let collection = ObservationCollection::from_sets(vec![weighted, unweighted]);
    let weights = collection.concatenated_weights().unwrap();
    assert_eq!(weights.len(), 5);
    assert_eq!(weights.as_slice(), &[0.5, 0.5, 0.5, 0.0, 0.0]);

    // Memoized: same buffer on the second call.
    let again = collection.concatenated_weights().unwrap();
    assert_eq!(weights, again);
}

#[test]
fn residual_round_trip_is_zero() {
    let observed = three_set_collection();
    let computed = three_set_collection();

    let residuals = residual_collection(&observed, &computed).unwrap();

    assert_eq!(
        residuals.total_observable_size(),
        observed.total_observable_size()
    );
    assert!(residuals.observation_vector().iter().all(|&v| v == 0.0));
    assert_eq!(residuals.concatenated_times(), observed.concatenated_times());
    assert_eq!(
        residuals.link_end_identifiers(),
        observed.link_end_identifiers()
    );
}

#[test]
fn residual_mismatches_are_typed() {
    let observed = range_set(madrid_link(), &[1.0, 2.0], t0(), 60);

    let wrong_type = angles_set(madrid_link(), 2, t0());
    assert!(matches!(
        residual_set(&observed, &wrong_type),
        Err(MsrError::StructuralMismatch { .. })
    ));

    let shifted = range_set(madrid_link(), &[1.0, 2.0], t0() + 1.seconds(), 60);
    assert!(matches!(
        residual_set(&observed, &shifted),
        Err(MsrError::TimeMismatch { index: 0, .. })
    ));

    let shorter = range_set(madrid_link(), &[1.0], t0(), 60);
    assert!(matches!(
        residual_set(&observed, &shorter),
        Err(MsrError::StructuralMismatch { .. })
    ));
}

#[rstest]
#[case::keep_all(1, 2, 3)]
#[case::keep_both(2, 2, 3)]
#[case::drop_all(3, 0, 0)]
fn arc_splitting_boundaries(
    #[case] minimum_samples: usize,
    #[case] expected_arcs: usize,
    #[case] expected_len: usize,
) {
    // Samples at 0..2 s and 10..12 s: one 8 s gap, two 3-sample arcs.
    let set = SingleObservationSet::new(
        ObservableType::Range,
        madrid_link(),
        (0..6).map(|i| DVector::from_vec(vec![i as f64])).collect(),
        [0, 1, 2, 10, 11, 12]
            .iter()
            .map(|&s| t0() + (s as i64).seconds())
            .collect(),
        LinkEndRole::Receiver,
        Vec::new(),
        None,
        None,
    )
    .unwrap();

    let arcs: Vec<_> = split_single_set_into_arcs(&set, 5.seconds(), minimum_samples).collect();
    assert_eq!(arcs.len(), expected_arcs);
    for arc in &arcs {
        assert_eq!(arc.len(), expected_len);
        assert_eq!(arc.observable_type(), ObservableType::Range);
        assert_eq!(arc.link_ends(), set.link_ends());
    }
}

#[test]
fn collection_arc_splitting() {
    let set = range_set(madrid_link(), &[1.0, 2.0, 3.0], t0(), 60);
    let far = range_set(madrid_link(), &[4.0, 5.0, 6.0], t0() + 1.days(), 60);
    let collection = ObservationCollection::from_sets(vec![set, far]);

    let split = split_collection_into_arcs(&collection, 5.minutes(), 2);
    let arcs = split
        .single_link_and_type_sets(ObservableType::Range, &madrid_link())
        .unwrap();
    assert_eq!(arcs.len(), 2);
    assert_eq!(split.total_observation_count(), 6);
}

#[test]
fn empty_filter_plan_is_identity() {
    let collection = three_set_collection();
    let filtered = filter_data(&collection, &FilterPlan::new()).unwrap();

    assert_eq!(
        filtered.observation_vector(),
        collection.observation_vector()
    );
    assert_eq!(
        filtered.concatenated_times(),
        collection.concatenated_times()
    );
    assert_eq!(
        filtered.concatenated_set_start_and_size(),
        collection.concatenated_set_start_and_size()
    );
}

#[test]
fn outlier_filtering_keeps_observed_and_computed_aligned() {
    let observed = ObservationCollection::from_sets(vec![range_set(
        madrid_link(),
        &[1.0e5, 1.1e5, 1.2e5, 1.3e5],
        t0(),
        60,
    )]);
    // The computed data differs by 2 km on the second sample only.
    let computed = ObservationCollection::from_sets(vec![range_set(
        madrid_link(),
        &[1.0e5, 1.1e5 + 2.0, 1.2e5, 1.3e5],
        t0(),
        60,
    )]);

    let mut cutoffs = IndexMap::new();
    cutoffs.insert(ObservableType::Range, 1.0);

    let (observed_filtered, computed_filtered) =
        filter_observed_and_computed(&observed, &computed, &cutoffs).unwrap();

    assert_eq!(observed_filtered.total_observation_count(), 3);
    assert_eq!(computed_filtered.total_observation_count(), 3);
    assert_eq!(
        observed_filtered.concatenated_times(),
        computed_filtered.concatenated_times()
    );
    // The outlying sample is gone from both.
    assert!(observed_filtered
        .observation_vector()
        .iter()
        .all(|&v| (v - 1.1e5).abs() > 1.0));

    // The filtered pair still produces exact residuals.
    let residuals = residual_collection(&observed_filtered, &computed_filtered).unwrap();
    assert!(residuals.observation_vector().iter().all(|&v| v == 0.0));
}

#[test]
fn filter_plan_size_guards() {
    let collection = three_set_collection();

    let short_residuals = DVector::zeros(collection.total_observable_size() - 1);
    let mut cutoffs = IndexMap::new();
    cutoffs.insert(ObservableType::Range, 1.0);
    cutoffs.insert(ObservableType::AngularPosition, 1.0);
    assert!(matches!(
        entries_to_filter(&collection, &short_residuals, &cutoffs),
        Err(MsrError::SizeMismatch { .. })
    ));

    // A plan referencing data absent from the collection is rejected.
    let mut bogus_plan = FilterPlan::new();
    bogus_plan.insert(
        ObservableType::RangeRate,
        vec![(madrid_link(), vec![vec![0]])],
    );
    assert!(matches!(
        filter_data(&collection, &bogus_plan),
        Err(MsrError::SizeMismatch { .. })
    ));
}

#[test]
fn sorted_construction_from_interleaved_sets() {
    // Sets arrive interleaved by type; the collection groups them by
    // (type, link ends) while preserving first-occurrence order.
    let collection = ObservationCollection::from_sets(vec![
        range_set(madrid_link(), &[1.0], t0(), 60),
        angles_set(goldstone_link(), 1, t0()),
        range_set(madrid_link(), &[2.0], t0() + 1.hours(), 60),
        range_set(goldstone_link(), &[3.0], t0() + 2.hours(), 60),
    ]);

    let types: Vec<_> = collection.unique_types().into_iter().collect();
    assert_eq!(
        types,
        vec![ObservableType::Range, ObservableType::AngularPosition]
    );

    // Both Madrid range sets are contiguous in the flat buffer.
    let madrid = collection
        .single_link_observations(ObservableType::Range, &madrid_link())
        .unwrap();
    assert_eq!(madrid.as_slice(), &[1.0, 2.0]);
}
