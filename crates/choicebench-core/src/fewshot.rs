//! Few-shot exemplar selection.
//!
//! Exemplars come from the same subject as the question being asked:
//! - question `i < n`: the items before it, `[0, i)`
//! - question `i >= n`: the first `n` items
//!
//! Either way the question never appears among its own exemplars.

use std::ops::Range;

use crate::types::Item;

/// Index range of the exemplars used for item `index`.
pub fn exemplar_range(index: usize, n_fewshot: usize, len: usize) -> Range<usize> {
    if index < n_fewshot {
        0..index.min(len)
    } else {
        0..n_fewshot.min(len)
    }
}

/// Exemplars for the item at `index` within `items`.
pub fn select_exemplars(items: &[Item], index: usize, n_fewshot: usize) -> &[Item] {
    &items[exemplar_range(index, n_fewshot, items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(format!("q{i}"), ["a", "b", "c", "d"], i % 4))
            .collect()
    }

    #[test]
    fn test_first_item_has_no_exemplars() {
        let items = items(5);
        assert!(select_exemplars(&items, 0, 3).is_empty());
    }

    #[test]
    fn test_early_items_use_preceding_items() {
        let items = items(5);
        let exemplars = select_exemplars(&items, 2, 3);
        assert_eq!(exemplars, &items[0..2]);
    }

    #[test]
    fn test_later_items_use_first_n() {
        let items = items(10);
        assert_eq!(select_exemplars(&items, 7, 3), &items[0..3]);
        assert_eq!(select_exemplars(&items, 3, 3), &items[0..3]);
    }

    #[test]
    fn test_zero_shot() {
        let items = items(4);
        for i in 0..4 {
            assert!(select_exemplars(&items, i, 0).is_empty());
        }
    }

    #[test]
    fn test_fewshot_larger_than_subject() {
        let items = items(3);
        assert_eq!(select_exemplars(&items, 2, 10), &items[0..2]);
    }

    proptest! {
        #[test]
        fn prop_exemplars_never_include_target(
            len in 1usize..64,
            n in 0usize..16,
            seed in any::<usize>(),
        ) {
            let index = seed % len;
            let range = exemplar_range(index, n, len);
            prop_assert!(!range.contains(&index));
            if index < n {
                prop_assert_eq!(range, 0..index);
            } else {
                prop_assert_eq!(range, 0..n);
            }
        }
    }
}
