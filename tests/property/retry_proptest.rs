//! Property-based tests for the retry policy

use fieldsync::client::offline::RetryPolicy;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn test_delay_never_exceeds_cap(
        base_secs in 1u64..60,
        max_secs in 1u64..3600,
        attempts in 0u32..10_000,
    ) {
        let policy = RetryPolicy::new(Duration::from_secs(base_secs), Duration::from_secs(max_secs), None);
        prop_assert!(policy.delay_for(attempts) <= Duration::from_secs(max_secs.max(base_secs)));
    }

    #[test]
    fn test_delay_is_monotonic(attempts in 0u32..1_000) {
        let policy = RetryPolicy::default();
        prop_assert!(policy.delay_for(attempts) <= policy.delay_for(attempts + 1));
    }

    #[test]
    fn test_exhaustion_is_sticky(limit in 1u32..50, attempts in 0u32..100) {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60), Some(limit));
        if policy.is_exhausted(attempts) {
            prop_assert!(policy.is_exhausted(attempts + 1));
        }
        prop_assert_eq!(policy.is_exhausted(attempts), attempts >= limit);
    }
}
