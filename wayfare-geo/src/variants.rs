//! Progressive relaxation of comma-delimited place queries.

/// Candidate queries for `query`, most specific first.
///
/// Components are split on commas and trimmed; empty components are
/// dropped. Trailing components are removed one at a time, and the
/// sequence always ends with the first component alone:
///
/// ```
/// use wayfare_geo::query_variants;
///
/// assert_eq!(
///     query_variants("General Luna, Siargao, Philippines"),
///     vec!["General Luna, Siargao, Philippines", "General Luna, Siargao", "General Luna"],
/// );
/// ```
pub fn query_variants(query: &str) -> Vec<String> {
    let components: Vec<&str> = query
        .split(',')
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .collect();

    // The last variant is the first component alone.
    (1..=components.len())
        .rev()
        .map(|len| components[..len].join(", "))
        .collect()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One variant per component, shrinking, ending on the first component
        #[test]
        fn prop_variant_shape(components in prop::collection::vec("[A-Za-z ]{0,6}[A-Za-z][A-Za-z ]{0,6}", 1..6)) {
            let query = components.join(",");
            let variants = query_variants(&query);
            prop_assert_eq!(variants.len(), components.len());
            prop_assert_eq!(variants.last().unwrap().as_str(), components[0].trim());
            for pair in variants.windows(2) {
                prop_assert!(pair[0].len() > pair[1].len());
                prop_assert!(pair[0].starts_with(pair[1].as_str()));
            }
        }
    }
}
