//! Gold-star override detection.

use std::collections::BTreeSet;

use labelvault_shared::types::AnnotationId;

use super::uncertainty::KeyGroup;

/// Finds reviewer overrides under a contested key.
pub struct GoldStarDetector;

impl GoldStarDetector {
    /// Returns the gold-star annotations of the key, or `None` if there are none.
    ///
    /// When present, these are exactly the valid annotations of the key. Several
    /// gold stars (e.g. two reviewers promoting) are all returned.
    #[must_use]
    pub fn valid_set(group: &KeyGroup<'_>) -> Option<BTreeSet<AnnotationId>> {
        let gold: BTreeSet<AnnotationId> = group
            .annotations
            .iter()
            .filter(|a| a.is_gold_star())
            .map(|a| a.id)
            .collect();

        (!gold.is_empty()).then_some(gold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::fixtures::Fixture;
    use crate::consensus::uncertainty::Grouping;

    #[test]
    fn test_no_gold_star() {
        let mut fx = Fixture::classification();
        let (a, b) = (fx.user(), fx.user());
        fx.classify(a, fx.label_a);
        fx.classify(b, fx.label_b);

        let grouping = Grouping::manual(&fx.annotations, &fx.metadata);

        assert!(GoldStarDetector::valid_set(&grouping.groups[&fx.key()]).is_none());
    }

    #[test]
    fn test_gold_star_rows_are_the_valid_set() {
        let mut fx = Fixture::classification();
        let (a, b, reviewer) = (fx.user(), fx.user(), fx.user());
        fx.classify(a, fx.label_a);
        fx.classify(b, fx.label_b);
        let gold = fx.gold_star(reviewer, fx.label_b);

        let grouping = Grouping::manual(&fx.annotations, &fx.metadata);
        let valid = GoldStarDetector::valid_set(&grouping.groups[&fx.key()]).unwrap();

        assert_eq!(valid, BTreeSet::from([gold]));
    }

    #[test]
    fn test_multiple_gold_stars_all_valid() {
        let mut fx = Fixture::classification();
        let (a, first, second) = (fx.user(), fx.user(), fx.user());
        fx.classify(a, fx.label_a);
        let g1 = fx.gold_star(first, fx.label_a);
        let g2 = fx.gold_star(second, fx.label_b);

        let grouping = Grouping::manual(&fx.annotations, &fx.metadata);
        let valid = GoldStarDetector::valid_set(&grouping.groups[&fx.key()]).unwrap();

        assert_eq!(valid, BTreeSet::from([g1, g2]));
    }
}
