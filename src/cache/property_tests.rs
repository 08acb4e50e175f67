//! Property-Based Tests for the Cache Facade
//!
//! Uses proptest to check the facade contract against native, restricted and
//! interceptor-wrapped backends.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::cache::{CacheFacade, SimpleCache, MAX_KEY_LENGTH, RESERVED_KEY_CHARS};
use crate::hooks::InterceptedBackend;
use crate::serializer::SerializerInterceptor;
use crate::storage::{MemoryBackend, ValueMap};

// == Strategies ==
/// Generates valid cache keys (within length limit, no reserved characters)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:.é]{1,64}".prop_map(|s| s)
}

/// Generates JSON values, nested up to three levels. Floats are left out so
/// equality after a text round trip is exact.
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generates keys containing at least one reserved character
fn reserved_key_strategy() -> impl Strategy<Value = String> {
    let reserved: Vec<char> = RESERVED_KEY_CHARS.chars().collect();
    ("[a-z]{0,8}", prop::sample::select(reserved), "[a-z]{0,8}")
        .prop_map(|(head, c, tail)| format!("{head}{c}{tail}"))
}

/// The three backend setups the facade has to behave identically on.
fn facades() -> (
    CacheFacade<MemoryBackend>,
    CacheFacade<MemoryBackend>,
    CacheFacade<InterceptedBackend<MemoryBackend>>,
) {
    let intercepted = Arc::new(SerializerInterceptor::new()).wrap(MemoryBackend::string_only(), 1);
    (
        CacheFacade::new(MemoryBackend::new()).unwrap(),
        CacheFacade::new(MemoryBackend::string_only()).unwrap(),
        CacheFacade::new(intercepted).unwrap(),
    )
}

/// What `get(key, None)` returns after storing `value`.
fn expected_read(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Property 1: Round-trip
    // Storing any value then reading it back returns the same value, on every
    // backend setup. A stored null reads back as the caller's default.
    #[test]
    fn prop_roundtrip(key in valid_key_strategy(), value in value_strategy()) {
        let (native, restricted, intercepted) = facades();
        let expected = expected_read(&value);

        prop_assert!(native.set(&key, value.clone(), None).unwrap());
        prop_assert_eq!(native.get(&key, None).unwrap(), expected.clone());

        prop_assert!(restricted.set(&key, value.clone(), None).unwrap());
        prop_assert_eq!(restricted.get(&key, None).unwrap(), expected.clone());

        prop_assert!(intercepted.set(&key, value.clone(), None).unwrap());
        prop_assert_eq!(intercepted.get(&key, None).unwrap(), expected);
    }

    // Property 2: Batch reads agree across backend setups
    // Every stored key comes back, stored nulls included, and single reads
    // agree with the batch.
    #[test]
    fn prop_batch_same_on_every_backend(
        entries in prop::collection::btree_map(valid_key_strategy(), value_strategy(), 1..8),
        default in prop::option::of(value_strategy())
    ) {
        let (native, restricted, intercepted) = facades();
        let values: ValueMap = entries.clone().into_iter().collect();
        prop_assert!(native.set_multiple(values.clone(), Some(60)).unwrap());
        prop_assert!(restricted.set_multiple(values.clone(), Some(60)).unwrap());
        prop_assert!(intercepted.set_multiple(values, Some(60)).unwrap());

        let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        let batch = native.get_multiple(&keys, default.clone()).unwrap();
        prop_assert_eq!(&restricted.get_multiple(&keys, default.clone()).unwrap(), &batch);
        prop_assert_eq!(&intercepted.get_multiple(&keys, default.clone()).unwrap(), &batch);

        prop_assert_eq!(batch.len(), entries.len());
        for (key, value) in &entries {
            let expected = if value.is_null() {
                default.clone().unwrap_or(Value::Null)
            } else {
                value.clone()
            };
            prop_assert_eq!(batch.get(key), Some(&expected));
            prop_assert_eq!(restricted.get(key, None).unwrap(), expected_read(value));
        }
    }

    // Property 3: Non-positive TTL behaves like delete
    #[test]
    fn prop_non_positive_ttl_is_delete(
        key in valid_key_strategy(),
        value in value_strategy(),
        ttl in -1000i64..=0,
        present in any::<bool>()
    ) {
        let (via_set, via_delete, _) = facades();
        if present {
            via_set.set(&key, json!("old"), None).unwrap();
            via_delete.set(&key, json!("old"), None).unwrap();
        }

        let set_result = via_set.set(&key, value, Some(ttl)).unwrap();
        let delete_result = via_delete.delete(&key).unwrap();

        prop_assert_eq!(set_result, delete_result);
        prop_assert!(!via_set.has(&key).unwrap());
    }

    // Property 4: Non-positive TTL on a batch behaves like delete_multiple
    #[test]
    fn prop_non_positive_batch_ttl_is_delete_multiple(
        entries in prop::collection::btree_map(valid_key_strategy(), value_strategy(), 1..6),
        ttl in -1000i64..=0,
        preload in any::<bool>()
    ) {
        let (via_set, via_delete, _) = facades();
        let values: ValueMap = entries.into_iter().collect();
        if preload {
            via_set.set_multiple(values.clone(), None).unwrap();
            via_delete.set_multiple(values.clone(), None).unwrap();
        }

        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        let delete_result = via_delete.delete_multiple(&keys).unwrap();
        let set_result = via_set.set_multiple(values.clone(), Some(ttl)).unwrap();

        prop_assert_eq!(set_result, delete_result);
        for key in &keys {
            prop_assert!(!via_set.has(key).unwrap());
        }
    }

    // Property 5: Reserved characters are rejected by writes only
    #[test]
    fn prop_reserved_keys_rejected_on_write(key in reserved_key_strategy()) {
        let (native, _, _) = facades();

        prop_assert!(native.set(&key, json!(1), None).unwrap_err().is_invalid_argument());

        let mut values = ValueMap::new();
        values.insert("fine".to_string(), json!(1));
        values.insert(key.clone(), json!(2));
        prop_assert!(native.set_multiple(values, None).unwrap_err().is_invalid_argument());
        prop_assert!(!native.has("fine").unwrap(), "batch must fail before writing");

        prop_assert!(native.get(&key, None).is_ok());
        prop_assert!(native.has(&key).is_ok());
        prop_assert!(native.delete(&key).is_ok());
        prop_assert!(native.get_multiple(&[key.as_str()], None).is_ok());
        prop_assert!(native.delete_multiple(&[key.as_str()]).is_ok());
    }

    // Property 6: Keys longer than the limit are rejected by writes only
    #[test]
    fn prop_long_keys_rejected_on_write(extra in 1usize..16, c in prop::sample::select(vec!['a', 'é', '日'])) {
        let (native, _, _) = facades();
        let key: String = std::iter::repeat(c).take(MAX_KEY_LENGTH + extra).collect();

        prop_assert!(native.set(&key, json!(1), None).unwrap_err().is_invalid_argument());
        prop_assert!(native.get(&key, None).is_ok());
        prop_assert!(native.has(&key).is_ok());
    }

    // Property 7: Missing keys take the default, or are omitted without one
    #[test]
    fn prop_default_synthesis(
        stored in valid_key_strategy(),
        missing in valid_key_strategy(),
        value in value_strategy(),
        default in value_strategy()
    ) {
        prop_assume!(stored != missing);
        prop_assume!(!value.is_null() && !default.is_null());
        let (_, restricted, _) = facades();
        restricted.set(&stored, value.clone(), None).unwrap();

        let keys = [stored.as_str(), missing.as_str()];
        let with_default = restricted.get_multiple(&keys, Some(default.clone())).unwrap();
        prop_assert_eq!(with_default.get(&stored), Some(&value));
        prop_assert_eq!(with_default.get(&missing), Some(&default));

        let without = restricted.get_multiple(&keys, None).unwrap();
        prop_assert_eq!(without.get(&stored), Some(&value));
        prop_assert!(!without.contains_key(&missing));
    }
}
