//! Property-based tests for rust_app_logger using proptest

use proptest::prelude::*;
use rust_app_logger::core::{should_deliver, strip_ansi};
use rust_app_logger::prelude::*;
use std::fs;
use tempfile::TempDir;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// The gate passes exactly when the level reaches the threshold and the
    /// condition is not false
    #[test]
    fn test_level_gate(
        level in any_level(),
        threshold in any_level(),
        condition in proptest::option::of(any::<bool>()),
    ) {
        let expected = (level as u8) >= (threshold as u8) && condition != Some(false);
        prop_assert_eq!(should_deliver(level, threshold, condition), expected);
    }

    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
        prop_assert_eq!(LogLevel::try_from(level as u8).unwrap(), level);
    }
}

// ============================================================================
// LogRecord Tests
// ============================================================================

proptest! {
    /// Removing escape codes from the console variant yields the file variant
    #[test]
    fn test_colored_strips_to_plain(
        level in any_level(),
        message in "[a-zA-Z0-9 .,:;!?\\n\\t-]{0,64}",
        timestamp in proptest::option::of("[0-9:T.Z-]{10,24}"),
    ) {
        colored::control::set_override(true);
        let mut record = LogRecord::new(level, &message);
        if let Some(ts) = timestamp {
            record = record.with_timestamp(ts);
        }

        prop_assert_eq!(strip_ansi(&record.render_colored()), record.render_plain());
        prop_assert_eq!(record.render_plain().lines().count().max(1), 1);
    }
}

// ============================================================================
// RotatingFileStore Tests
// ============================================================================

fn write_all(records: &[String], options: StoreOptions) -> (TempDir, RotatingFileStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut store = RotatingFileStore::open(dir.path().join("prop.log"), options).unwrap();
    for record in records {
        store.append(record.as_bytes()).unwrap();
    }
    (dir, store)
}

fn records_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,40}", 1..120).prop_map(|bodies| {
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| format!("{:04} {}\n", i, body))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Concatenating rotated files (oldest first) and the active file gives
    /// back every record in order
    #[test]
    fn test_order_preserved_across_rotation(
        records in records_strategy(),
        max_size in 32u64..512,
    ) {
        let options = StoreOptions::new()
            .with_max_size(max_size)
            .with_max_retained(usize::MAX)
            .with_header(false);
        let (_dir, mut store) = write_all(&records, options);

        let mut content = String::new();
        for path in store.retained_files() {
            content.push_str(&fs::read_to_string(path).unwrap());
        }
        content.push_str(&fs::read_to_string(store.path()).unwrap());
        store.close().unwrap();

        prop_assert_eq!(content, records.concat());
    }

    /// Never more rotated files than allowed, and the ones kept are the newest
    #[test]
    fn test_retention_bound(
        records in records_strategy(),
        max_size in 32u64..256,
        max_retained in 0usize..4,
    ) {
        let options = StoreOptions::new()
            .with_max_size(max_size)
            .with_max_retained(max_retained)
            .with_header(false);
        let (dir, store) = write_all(&records, options);

        let on_disk = fs::read_dir(dir.path()).unwrap().count() - 1;
        prop_assert!(on_disk <= max_retained);
        prop_assert_eq!(store.retained_files().count(), on_disk);

        let mut tail = String::new();
        for path in store.retained_files() {
            tail.push_str(&fs::read_to_string(path).unwrap());
        }
        tail.push_str(&fs::read_to_string(store.path()).unwrap());
        prop_assert!(records.concat().ends_with(&tail));
    }

    /// Below the threshold nothing ever rotates and the cached size is exact
    #[test]
    fn test_no_rotation_under_threshold(records in records_strategy()) {
        let total: usize = records.iter().map(String::len).sum();
        let options = StoreOptions::new()
            .with_max_size(total as u64 + 1)
            .with_header(false);
        let (_dir, store) = write_all(&records, options);

        prop_assert_eq!(store.retained_files().count(), 0);
        prop_assert_eq!(store.current_size(), total as u64);
        prop_assert_eq!(fs::metadata(store.path()).unwrap().len(), total as u64);
    }
}
