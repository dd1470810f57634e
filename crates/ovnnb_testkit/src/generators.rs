//! Property-based test generators using proptest.

use ovnnb_protocol::{FieldValue, RefSet, RowId};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for server-assigned row ids.
pub fn row_id_strategy() -> impl Strategy<Value = RowId> {
    "[0-9a-f]{8}-[0-9a-f]{4}".prop_map(RowId::new)
}

/// Strategy for entity names such as switch and port names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

/// Strategy for small string maps such as `external_ids`.
pub fn string_map_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..5)
}

/// Strategy for ACL priorities, including the negative "any" value.
pub fn priority_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![Just(-1i64), 0i64..=32767]
}

/// Strategy for a reference set together with one wire encoding of it.
///
/// One-element sets are sometimes encoded as a bare reference and empty
/// sets sometimes as an empty untyped set, so both shapes show up.
pub fn ref_shape_strategy() -> impl Strategy<Value = (RefSet, FieldValue)> {
    (prop::collection::btree_set(row_id_strategy(), 0..4), any::<bool>()).prop_map(
        |(ids, bare)| {
            let refs: RefSet = ids.into_iter().collect();
            let encoded = match (refs.len(), bare) {
                (0, true) => FieldValue::StringSet(Vec::new()),
                (1, true) => refs
                    .iter()
                    .next()
                    .map_or_else(|| FieldValue::ReferenceSet(refs.clone()), |id| {
                        FieldValue::Reference(id.clone())
                    }),
                _ => FieldValue::ReferenceSet(refs.clone()),
            };
            (refs, encoded)
        },
    )
}

/// Strategy for a string list together with one wire encoding of it.
pub fn string_shape_strategy() -> impl Strategy<Value = (Vec<String>, FieldValue)> {
    (prop::collection::vec("[a-z0-9:. ]{1,12}", 0..4), any::<bool>()).prop_map(
        |(items, bare)| {
            let encoded = if bare && items.len() == 1 {
                FieldValue::String(items[0].clone())
            } else {
                FieldValue::StringSet(items.clone())
            };
            (items, encoded)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn encodings_collapse_to_their_set((refs, encoded) in ref_shape_strategy()) {
            prop_assert_eq!(encoded.references(), Some(refs));
        }

        #[test]
        fn string_encodings_collapse((items, encoded) in string_shape_strategy()) {
            prop_assert_eq!(encoded.strings(), Some(items));
        }

        #[test]
        fn names_are_non_empty(name in name_strategy()) {
            prop_assert!(!name.is_empty());
        }
    }
}
