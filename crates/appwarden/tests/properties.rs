//! Property-based tests for the scroll search, swipe geometry and
//! artifact naming.

use appwarden::{
    AutomationDriver, CapabilityConfig, FailureCapture, Locator, MockDriver, MockElement,
    ResilientLocator, ScrollDirection, ScrollGesture, WindowSize,
};
use proptest::prelude::*;
use std::time::Duration;

// ===== Strategy definitions =====

fn direction_strategy() -> impl Strategy<Value = ScrollDirection> {
    prop_oneof![
        Just(ScrollDirection::Down),
        Just(ScrollDirection::Up),
        Just(ScrollDirection::Left),
        Just(ScrollDirection::Right),
    ]
}

fn gesture_strategy() -> impl Strategy<Value = ScrollGesture> {
    (direction_strategy(), 0.05f64..0.95, 0.05f64..0.95)
        .prop_filter("fractions must differ", |(_, a, b)| (a - b).abs() > 0.01)
        .prop_map(|(direction, start, end)| ScrollGesture {
            direction,
            start_fraction: start,
            end_fraction: end,
            ..ScrollGesture::default()
        })
}

proptest! {
    #[test]
    fn prop_scroll_budget_is_respected(scrolls_needed in 0u32..8, max_attempts in 0u32..8) {
        let locator = Locator::id("target");
        let mut driver = MockDriver::new()
            .with_element(MockElement::new("target", locator.clone()).after_scrolls(scrolls_needed));
        let session = driver.open_session(&CapabilityConfig::android("pkg")).unwrap();
        let finder = ResilientLocator::new(ScrollGesture::default(), Duration::ZERO);

        let budget = max_attempts.max(1);
        let result = finder.find(&mut driver, &session, &locator, max_attempts);

        if scrolls_needed < budget {
            let found = result.unwrap();
            prop_assert_eq!(found.scrolls, scrolls_needed);
            prop_assert_eq!(found.attempts, scrolls_needed + 1);
        } else {
            let err = result.unwrap_err();
            prop_assert!(err.is_not_found());
        }
        prop_assert!(driver.swipes() <= budget - 1);
        prop_assert!(driver.count_calls("find:") <= budget as usize);
    }

    #[test]
    fn prop_swipe_stays_inside_window(
        gesture in gesture_strategy(),
        width in 100u32..4000,
        height in 100u32..4000,
    ) {
        prop_assert!(gesture.validate().is_ok());
        let swipe = gesture.swipe_for(WindowSize::new(width, height));
        for p in [swipe.from, swipe.to] {
            prop_assert!(p.x >= 0 && p.x <= width as i32);
            prop_assert!(p.y >= 0 && p.y <= height as i32);
        }
        prop_assert_ne!(swipe.from, swipe.to);
    }

    #[test]
    fn prop_artifact_names_are_file_safe(test_id in ".{0,40}", ts in 0i64..4_000_000_000) {
        let stem = FailureCapture::artifact_stem(&test_id, ts);
        prop_assert!(!stem.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
        let suffix = format!("_{ts}");
        prop_assert!(stem.ends_with(&suffix));
    }
}
