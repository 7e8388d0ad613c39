//! Property tests for `RelPath`/`CasePolicy`/`PolicyKey` invariants that are
//! awkward to pin down with a handful of example-based cases: round-tripping
//! through components, parent/ancestor chains, and case-policy equivalence
//! classes.

use std::cmp::Ordering;

use proptest::prelude::*;

use crate::path::{CasePolicy, PolicyKey, RelPath};

fn component() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,12}"
}

fn components() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(component(), 1..6)
}

proptest! {
    #[test]
    fn join_then_parent_recovers_original(cs in components(), child in component()) {
        let base = RelPath::from_components(cs.clone());
        let joined = base.join(&child);
        prop_assert_eq!(joined.parent().unwrap(), base);
        prop_assert_eq!(joined.leaf(), Some(child.as_str()));
    }

    #[test]
    fn display_and_parse_round_trip(cs in components()) {
        let original = RelPath::from_components(cs);
        let parsed = RelPath::parse(&original.display_string());
        prop_assert_eq!(parsed, original);
    }

    #[test]
    fn ancestor_count_equals_depth_minus_one(cs in components()) {
        let path = RelPath::from_components(cs.clone());
        prop_assert_eq!(path.ancestors().len(), cs.len() - 1);
    }

    #[test]
    fn ancestors_are_strictly_shrinking(cs in components()) {
        let path = RelPath::from_components(cs);
        let ancestors = path.ancestors();
        for window in ancestors.windows(2) {
            prop_assert!(window[0].components().len() > window[1].components().len());
        }
    }

    #[test]
    fn case_insensitive_equals_is_reflexive_and_case_blind(cs in components()) {
        let lower = RelPath::from_components(cs.iter().map(|c| c.to_lowercase()).collect());
        let upper = RelPath::from_components(cs.iter().map(|c| c.to_uppercase()).collect());
        prop_assert!(lower.equals(&lower, CasePolicy::CaseInsensitive));
        prop_assert!(lower.equals(&upper, CasePolicy::CaseInsensitive));
    }

    #[test]
    fn case_sensitive_compare_agrees_with_component_order(a in components(), b in components()) {
        let pa = RelPath::from_components(a.clone());
        let pb = RelPath::from_components(b.clone());
        let expected = a.cmp(&b);
        prop_assert_eq!(pa.compare(&pb, CasePolicy::CaseSensitive), expected);
    }

    #[test]
    fn policy_key_ordering_matches_rel_path_compare(a in components(), b in components()) {
        let ka = PolicyKey::new(RelPath::from_components(a.clone()), CasePolicy::CaseSensitive);
        let kb = PolicyKey::new(RelPath::from_components(b.clone()), CasePolicy::CaseSensitive);
        let direct = RelPath::from_components(a).compare(&RelPath::from_components(b), CasePolicy::CaseSensitive);
        prop_assert_eq!(ka.cmp(&kb), direct);
    }

    #[test]
    fn policy_key_case_insensitive_collision_is_symmetric(cs in components()) {
        let lower = PolicyKey::new(RelPath::from_components(cs.iter().map(|c| c.to_lowercase()).collect()), CasePolicy::CaseInsensitive);
        let upper = PolicyKey::new(RelPath::from_components(cs.iter().map(|c| c.to_uppercase()).collect()), CasePolicy::CaseInsensitive);
        prop_assert_eq!(lower.cmp(&upper), Ordering::Equal);
        prop_assert_eq!(upper.cmp(&lower), Ordering::Equal);
    }

    #[test]
    fn compare_is_antisymmetric_under_any_policy(a in components(), b in components(), policy in any::<CasePolicy>()) {
        let pa = RelPath::from_components(a);
        let pb = RelPath::from_components(b);
        prop_assert_eq!(pa.compare(&pb, policy).reverse(), pb.compare(&pa, policy));
    }
}
