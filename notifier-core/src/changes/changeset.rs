/*
    changeset.rs - Per-collection diff between two snapshots

    Rows are matched by identity key:
    - key only in previous            -> deletion (previous coordinates)
    - key only in current             -> insertion (current coordinates)
    - key in both, digest differs     -> modification, recorded in both
                                         coordinate spaces

    Insertions and deletions shift positions, so a modified row's previous
    index and current index generally differ.
*/

use super::index_set::IndexSet;
use crate::store::{Collection, RowDigest};
use std::collections::HashMap;

/// Diff of one named collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Removed rows, in previous-snapshot coordinates
    pub deletions: IndexSet,

    /// Added rows, in current-snapshot coordinates
    pub insertions: IndexSet,

    /// Changed rows, in previous-snapshot coordinates
    pub modifications: IndexSet,

    /// Changed rows, in current-snapshot coordinates
    pub modifications_new: IndexSet,
}

impl ChangeSet {
    /// Diff two versions of the same collection.
    ///
    /// A missing side is treated as an empty collection, so a created
    /// collection yields insertions only and a dropped one deletions only.
    pub fn between(previous: Option<&Collection>, current: Option<&Collection>) -> Self {
        let mut changes = ChangeSet::default();

        let previous_rows: HashMap<&str, (usize, &RowDigest)> = previous
            .map(|collection| {
                collection
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(index, row)| (row.key(), (index, row.digest())))
                    .collect()
            })
            .unwrap_or_default();

        let mut surviving = vec![false; previous.map(Collection::len).unwrap_or(0)];

        if let Some(current) = current {
            for (index, row) in current.rows().iter().enumerate() {
                match previous_rows.get(row.key()) {
                    Some(&(old_index, old_digest)) => {
                        surviving[old_index] = true;
                        if old_digest != row.digest() {
                            changes.modifications.add(old_index);
                            changes.modifications_new.add(index);
                        }
                    }
                    None => changes.insertions.add(index),
                }
            }
        }

        changes.deletions.extend(
            surviving
                .iter()
                .enumerate()
                .filter(|(_, kept)| !**kept)
                .map(|(index, _)| index),
        );

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
            && self.insertions.is_empty()
            && self.modifications.is_empty()
            && self.modifications_new.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Row;
    use proptest::prelude::*;
    use serde_json::json;

    fn collection(keys: &[&str]) -> Collection {
        Collection::from_rows(keys.iter().map(|k| Row::new(*k, json!(k))).collect())
    }

    #[test]
    fn test_coordinate_spaces() {
        // [A, B, C] -> [A, C, D]
        let previous = collection(&["A", "B", "C"]);
        let current = collection(&["A", "C", "D"]);

        let changes = ChangeSet::between(Some(&previous), Some(&current));

        assert_eq!(changes.deletions.flatten(), vec![1]);
        assert_eq!(changes.insertions.flatten(), vec![2]);
        assert!(changes.modifications.is_empty());
        assert!(changes.modifications_new.is_empty());
        assert_eq!(previous.len(), 3);
        assert_eq!(current.len(), 3);
    }

    #[test]
    fn test_modification_recorded_in_both_spaces() {
        let previous = collection(&["A", "B", "C"]);
        let mut current = collection(&["B", "C"]);
        current.insert_at(0, Row::new("X", json!("x")));
        current.insert_at(1, Row::new("Y", json!("y")));
        current.upsert(Row::new("C", json!("changed")));

        // current = [X, Y, B, C']
        let changes = ChangeSet::between(Some(&previous), Some(&current));

        assert_eq!(changes.deletions.flatten(), vec![0]);
        assert_eq!(changes.insertions.flatten(), vec![0, 1]);
        assert_eq!(changes.modifications.flatten(), vec![2]);
        assert_eq!(changes.modifications_new.flatten(), vec![3]);
    }

    #[test]
    fn test_created_collection_is_insertions_only() {
        let current = collection(&["A", "B"]);
        let changes = ChangeSet::between(None, Some(&current));

        assert_eq!(changes.insertions.flatten(), vec![0, 1]);
        assert!(changes.deletions.is_empty());
        assert!(changes.modifications.is_empty());
    }

    #[test]
    fn test_dropped_collection_is_deletions_only() {
        let previous = collection(&["A", "B", "C"]);
        let changes = ChangeSet::between(Some(&previous), None);

        assert_eq!(changes.deletions.flatten(), vec![0, 1, 2]);
        assert!(changes.insertions.is_empty());
    }

    #[test]
    fn test_identical_collections_are_empty() {
        let rows = collection(&["A", "B"]);
        assert!(ChangeSet::between(Some(&rows), Some(&rows.clone())).is_empty());
        assert!(ChangeSet::between(None, None).is_empty());
    }

    fn keyed_rows() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..40, 0u8..3), 0..40)
    }

    fn build(rows: &[(u8, u8)]) -> Collection {
        Collection::from_rows(
            rows.iter()
                .map(|(key, value)| Row::new(format!("k{}", key), json!(value)))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn prop_counts_balance(before in keyed_rows(), after in keyed_rows()) {
            let previous = build(&before);
            let current = build(&after);
            let changes = ChangeSet::between(Some(&previous), Some(&current));

            // Every previous row is either deleted or survives; same for current
            let survivors = previous.len() - changes.deletions.count();
            prop_assert_eq!(survivors, current.len() - changes.insertions.count());
            prop_assert_eq!(changes.modifications.count(), changes.modifications_new.count());

            for index in [&changes.deletions, &changes.insertions, &changes.modifications, &changes.modifications_new] {
                let flat = index.flatten();
                prop_assert!(flat.windows(2).all(|w| w[0] < w[1]));
            }
        }

        #[test]
        fn prop_diff_is_deterministic(before in keyed_rows(), after in keyed_rows()) {
            let previous = build(&before);
            let current = build(&after);
            prop_assert_eq!(
                ChangeSet::between(Some(&previous), Some(&current)),
                ChangeSet::between(Some(&previous), Some(&current))
            );
        }
    }
}
