use std::time::Duration;

use mirador::BackoffPolicy;

#[test]
fn delay_grows_exponentially_with_retry_count() {
    let policy = BackoffPolicy::new(Duration::from_millis(100), 2.0);
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    assert_eq!(policy.delay_for(3), Duration::from_millis(800));
}

#[test]
fn fractional_base_is_honored() {
    let policy = BackoffPolicy::new(Duration::from_millis(250), 1.5);
    assert_eq!(policy.delay_for(1), Duration::from_millis(375));
    assert_eq!(policy.delay_for(2), Duration::from_micros(562_500));
}

#[test]
fn large_retry_counts_do_not_overflow() {
    let policy = BackoffPolicy::new(Duration::from_secs(1), 10.0);
    let delay = policy.delay_for(10_000);
    assert!(delay >= policy.delay_for(100));
}
