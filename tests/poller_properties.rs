//! Property-based tests for readiness polling bounds.

use std::cell::Cell;
use std::time::Duration;

use proptest::prelude::*;
use sentiview::{PollOptions, PollOutcome, ReadinessPoller};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn prop_never_ready_checks_exactly_max_checks(
        max_checks in 1u32..60,
        interval_ms in 1u64..2_000,
    ) {
        let runtime = paused_runtime();
        let calls = Cell::new(0u32);
        let reported = Cell::new(0u32);

        let outcome = runtime.block_on(ReadinessPoller::new().wait_until_ready(
            || {
                calls.set(calls.get() + 1);
                false
            },
            &PollOptions::new(Duration::from_millis(interval_ms), max_checks),
            |progress| {
                assert!(progress.check_count <= progress.max_checks);
                assert_eq!(progress.check_count, reported.get() + 1);
                reported.set(progress.check_count);
            },
        ));

        prop_assert_eq!(outcome, PollOutcome::TimedOut { checks: max_checks });
        prop_assert_eq!(calls.get(), max_checks);
        prop_assert_eq!(reported.get(), max_checks);
    }

    #[test]
    fn prop_ready_on_check_k_stops_at_k(
        max_checks in 2u32..60,
        k_seed in any::<u32>(),
    ) {
        let k = 1 + k_seed % (max_checks - 1);
        let runtime = paused_runtime();
        let calls = Cell::new(0u32);

        let outcome = runtime.block_on(ReadinessPoller::new().wait_until_ready(
            || {
                calls.set(calls.get() + 1);
                calls.get() == k
            },
            &PollOptions::new(Duration::from_millis(500), max_checks),
            |_| {},
        ));

        prop_assert_eq!(outcome, PollOutcome::Ready { checks: k });
        prop_assert_eq!(calls.get(), k);
    }

    #[test]
    fn prop_poll_never_outlives_its_budget(
        max_checks in 1u32..40,
        interval_ms in 1u64..1_000,
        initial_ms in 0u64..3_000,
    ) {
        let runtime = paused_runtime();
        let options = PollOptions::new(Duration::from_millis(interval_ms), max_checks)
            .with_initial_delay(Duration::from_millis(initial_ms));

        let elapsed = runtime.block_on(async {
            let start = tokio::time::Instant::now();
            ReadinessPoller::new()
                .wait_until_ready(|| false, &options, |_| {})
                .await;
            start.elapsed()
        });

        prop_assert!(elapsed >= options.budget());
        // One millisecond of timer rounding per sleep at most.
        let slack = Duration::from_millis(u64::from(max_checks) + 1);
        prop_assert!(elapsed <= options.budget() + slack);
    }
}
