//! Tests for time_utils module

use commutematch::time_utils::{hour_gap, hour_to_time, time_to_hour, within_half_day_after};
use commutematch::CommuteFlowError;

#[test]
fn test_time_round_trip() {
    let hour = time_to_hour("08:20:00").unwrap();
    assert_eq!(hour_to_time(hour), "08:20:00");
}

#[test]
fn test_time_to_hour_values() {
    assert_eq!(time_to_hour("00:00:00").unwrap(), 0.0);
    assert_eq!(time_to_hour("12:30:00").unwrap(), 12.5);
    assert!((time_to_hour("23:59:59").unwrap() - 23.999722).abs() < 1e-5);
}

#[test]
fn test_time_to_hour_rejects_malformed() {
    for value in ["", "8:20", "24:00:00", "08:61:00", "08:20:60", "abc", "08:20:00:00"] {
        let result = time_to_hour(value);
        assert!(
            matches!(result, Err(CommuteFlowError::MalformedTime { .. })),
            "expected rejection for {value:?}"
        );
    }
}

#[test]
fn test_hour_to_time_wraps_negative() {
    assert_eq!(hour_to_time(-0.5), "23:30:00");
    assert_eq!(hour_to_time(0.0), "00:00:00");
}

#[test]
fn test_hour_gap_is_circular() {
    assert_eq!(hour_gap(8.0, 18.0), 10.0);
    assert_eq!(hour_gap(23.0, 1.0), 2.0);
    assert_eq!(hour_gap(1.0, 23.0), 2.0);
    assert_eq!(hour_gap(6.0, 6.0), 0.0);
    // Opposite sides of the clock
    assert_eq!(hour_gap(0.0, 12.0), 12.0);
}

#[test]
fn test_within_half_day_after() {
    assert!(within_half_day_after(9.0, 8.0));
    assert!(!within_half_day_after(8.0, 9.0));
    // 01:00 follows 23:00 across midnight
    assert!(within_half_day_after(1.0, 23.0));
    assert!(!within_half_day_after(23.0, 1.0));
    // A point follows itself trivially
    assert!(within_half_day_after(8.0, 8.0));
}
