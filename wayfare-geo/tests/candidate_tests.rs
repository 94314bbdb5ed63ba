use proptest::prelude::*;
use wayfare_core::OVERPASS_AREA_OFFSET;
use wayfare_geo::{rank_candidates, CandidateSearch, CountryFilter, CountryScope};
use wayfare_test_utils::assertions::{assert_transport_error, assert_validation_error};
use wayfare_test_utils::fixtures::{candidate_options, luna_towns, memory_cache, place_node};
use wayfare_test_utils::generators::arb_place_candidate;
use wayfare_test_utils::{AreaCall, ScriptedAreaSearch};

const PH_RELATION: u64 = 443174;

#[tokio::test]
async fn candidates_ranked_by_population_then_detail() {
    let backend = ScriptedAreaSearch::new().with_places("Luna", luna_towns());
    let search = CandidateSearch::new(backend, memory_cache(), candidate_options());

    let read = search.search("Luna", None).await.unwrap();
    let ids: Vec<u64> = read.value().iter().map(|c| c.osm_id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
    assert_eq!(read.value()[0].population, Some(35802));
}

#[tokio::test]
async fn ranking_example_from_three_places() {
    let backend = ScriptedAreaSearch::new().with_places(
        "Luna",
        vec![
            place_node(10, "A", None, 1),
            place_node(11, "B", Some("1000"), 0),
            place_node(12, "C", None, 4),
        ],
    );
    let search = CandidateSearch::new(backend, memory_cache(), candidate_options());
    let read = search.search("Luna", None).await.unwrap();
    let names: Vec<&str> = read.value().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

#[tokio::test]
async fn scoped_search_resolves_country_once() {
    let backend = ScriptedAreaSearch::new()
        .with_places("Luna", luna_towns())
        .with_country(CountryFilter::IsoCode("PH".to_string()), PH_RELATION);
    let cache = memory_cache();
    let search = CandidateSearch::new(backend, cache.clone(), candidate_options());
    let scope = CountryScope::new("ph");

    let best = search.best_candidate("Luna", Some(&scope)).await.unwrap().unwrap();
    assert_eq!(best.osm_id, 2);
    assert_eq!(best.country_scope.as_deref(), Some("PH"));

    // Cached area is reused by a different name in the same country.
    search.search("San Juan", Some(&scope)).await.unwrap();
    assert_eq!(search.backend().country_calls().len(), 1);
    assert_eq!(
        search.backend().place_calls(),
        vec![
            AreaCall::Places {
                name: "Luna".to_string(),
                area_id: Some(OVERPASS_AREA_OFFSET + PH_RELATION),
            },
            AreaCall::Places {
                name: "San Juan".to_string(),
                area_id: Some(OVERPASS_AREA_OFFSET + PH_RELATION),
            },
        ]
    );
    assert!(cache.stats().hits >= 1);
}

#[tokio::test]
async fn country_name_fallback() {
    let backend = ScriptedAreaSearch::new()
        .with_places("Luna", luna_towns())
        .with_country(CountryFilter::Name("Philippines".to_string()), PH_RELATION);
    let search = CandidateSearch::new(backend, memory_cache(), candidate_options());
    let scope = CountryScope::new("RP").with_name("Philippines");

    let read = search.search("Luna", Some(&scope)).await.unwrap();
    assert_eq!(read.value().len(), 3);
    assert_eq!(
        search.backend().country_calls(),
        vec![
            AreaCall::Country(CountryFilter::IsoCode("RP".to_string())),
            AreaCall::Country(CountryFilter::Name("Philippines".to_string())),
        ]
    );
}

#[tokio::test]
async fn scope_name_is_part_of_the_cache_key() {
    let backend = ScriptedAreaSearch::new()
        .with_places("Luna", luna_towns())
        .with_country(CountryFilter::Name("Philippines".to_string()), PH_RELATION);
    let search = CandidateSearch::new(backend, memory_cache(), candidate_options());

    let code_only = search
        .search("Luna", Some(&CountryScope::new("RP")))
        .await
        .unwrap();
    assert!(code_only.value().iter().all(|c| c.country_scope.is_none()));

    let named = search
        .search(
            "Luna",
            Some(&CountryScope::new("RP").with_name("Philippines")),
        )
        .await
        .unwrap();
    assert!(!named.was_cache_hit());
    assert!(named
        .value()
        .iter()
        .all(|c| c.country_scope.as_deref() == Some("RP")));
    assert_eq!(
        search.backend().place_calls(),
        vec![
            AreaCall::Places {
                name: "Luna".to_string(),
                area_id: None,
            },
            AreaCall::Places {
                name: "Luna".to_string(),
                area_id: Some(OVERPASS_AREA_OFFSET + PH_RELATION),
            },
        ]
    );

    let again = search
        .search(
            "Luna",
            Some(&CountryScope::new("rp").with_name(" Philippines ")),
        )
        .await
        .unwrap();
    assert!(again.was_cache_hit());
    assert_eq!(search.backend().place_calls().len(), 2);
}

#[tokio::test]
async fn unknown_country_searches_everywhere() {
    let backend = ScriptedAreaSearch::new().with_places("Luna", luna_towns());
    let search = CandidateSearch::new(backend, memory_cache(), candidate_options());

    let read = search
        .search("Luna", Some(&CountryScope::new("ZZ")))
        .await
        .unwrap();
    assert_eq!(read.value().len(), 3);
    assert!(read.value().iter().all(|c| c.country_scope.is_none()));
    assert_eq!(
        search.backend().place_calls(),
        vec![AreaCall::Places {
            name: "Luna".to_string(),
            area_id: None,
        }]
    );
}

#[tokio::test]
async fn backend_failures_propagate() {
    let places_down = CandidateSearch::new(
        ScriptedAreaSearch::new().failing_places("Luna", 429),
        memory_cache(),
        candidate_options(),
    );
    assert_transport_error(&places_down.search("Luna", None).await);
    assert_transport_error(&places_down.search("Luna", None).await);
    assert_eq!(places_down.backend().place_calls().len(), 2);

    let countries_down = CandidateSearch::new(
        ScriptedAreaSearch::new()
            .with_places("Luna", luna_towns())
            .failing_countries(504),
        memory_cache(),
        candidate_options(),
    );
    assert_transport_error(
        &countries_down
            .search("Luna", Some(&CountryScope::new("PH")))
            .await,
    );
    assert!(countries_down.backend().place_calls().is_empty());
}

#[tokio::test]
async fn zero_results_is_empty_and_blank_name_is_rejected() {
    let search = CandidateSearch::new(ScriptedAreaSearch::new(), memory_cache(), candidate_options());
    let read = search.search("Atlantis", None).await.unwrap();
    assert!(read.value().is_empty());
    assert!(search.search("Atlantis", None).await.unwrap().was_cache_hit());

    assert_validation_error(&search.search(" ", None).await);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Ranking is a stable permutation ordered by population, then attributes.
    #[test]
    fn prop_ranking_order(candidates in prop::collection::vec(arb_place_candidate(), 0..20)) {
        let mut ranked = candidates.clone();
        rank_candidates(&mut ranked);
        prop_assert_eq!(ranked.len(), candidates.len());

        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let key_a = (a.ranking_population(), a.attribute_count());
            let key_b = (b.ranking_population(), b.attribute_count());
            prop_assert!(key_a >= key_b);
            if key_a == key_b {
                let pos_a = candidates.iter().position(|c| c == a).unwrap();
                let pos_b = candidates.iter().rposition(|c| c == b).unwrap();
                prop_assert!(pos_a <= pos_b);
            }
        }
    }
}
