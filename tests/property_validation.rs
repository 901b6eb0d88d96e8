// tests/property_validation.rs

use proptest::prelude::*;

use procward::config::{ProcessDefinition, RawProcessDefinition};
use procward::config::model::{MAX_DELAY_SECONDS, MAX_GUARD_DELAY_SECONDS};
use procward::exec::split_args;

fn raw(path: &str, delay: i64, guard_delay: i64) -> RawProcessDefinition {
    RawProcessDefinition {
        name: Some("p".to_string()),
        path: Some(path.to_string()),
        delay_seconds: Some(delay),
        guard_delay_seconds: Some(guard_delay),
        ..RawProcessDefinition::default()
    }
}

proptest! {
    #[test]
    fn delays_are_accepted_exactly_within_bounds(
        delay in -1000i64..1000,
        guard_delay in -200i64..200,
    ) {
        let result = ProcessDefinition::try_from(raw("/bin/true", delay, guard_delay));
        let in_range = (0..=i64::from(MAX_DELAY_SECONDS)).contains(&delay)
            && (0..=i64::from(MAX_GUARD_DELAY_SECONDS)).contains(&guard_delay);

        prop_assert_eq!(result.is_ok(), in_range);
        if let Ok(def) = result {
            prop_assert_eq!(i64::from(def.delay_seconds), delay);
            prop_assert_eq!(i64::from(def.guard_delay_seconds), guard_delay);
        }
    }

    #[test]
    fn whitespace_only_paths_are_rejected(path in "[ \t]{0,8}") {
        let result = ProcessDefinition::try_from(raw(&path, 0, 3));
        prop_assert!(result.is_err());
    }

    #[test]
    fn plain_words_split_like_whitespace(words in proptest::collection::vec("[a-zA-Z0-9_./-]{1,12}", 0..8)) {
        let joined = words.join("  ");
        prop_assert_eq!(split_args(&joined), words);
    }
}
