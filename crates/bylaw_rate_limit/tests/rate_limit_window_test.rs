//! Tests for quota windows, day rollover and wait computation.

use bylaw_rate_limit::{Clock, ManualClock, RateLimiter, RpdWaitPolicy, TierConfig, tiers::GeminiTier};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;

fn at(day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, min, sec)
        .unwrap()
}

fn build(tier: TierConfig, clock: &ManualClock) -> RateLimiter {
    RateLimiter::new(&tier, Arc::new(clock.clone())).unwrap()
}

#[test]
fn test_counts_without_elapsed_time_are_never_purged() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::new("Open", None, None, None), &clock);

    let tokens = [0, 120, 0, 4_000, 75];
    for (recorded, &count) in tokens.iter().enumerate() {
        limiter.record_request(count);
        let info = limiter.check_limits();
        assert_eq!(info.rpm().current, recorded as u64 + 1);
        assert_eq!(info.rpd().current, recorded as u64 + 1);
        assert_eq!(
            info.tpm().current,
            tokens[..=recorded].iter().sum::<u64>()
        );
    }
}

#[test]
fn test_minute_windows_expire_but_day_window_keeps_counting() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::from_tier(&GeminiTier::Free), &clock);

    limiter.record_request(500);
    clock.advance(Duration::from_secs(61));

    let info = limiter.check_limits();
    assert_eq!(info.rpm().current, 0);
    assert_eq!(info.tpm().current, 0);
    assert_eq!(info.rpd().current, 1);
}

#[test]
fn test_day_rollover_clears_recent_entries() {
    let clock = ManualClock::new(at(4, 23, 59, 30));
    let limiter = build(TierConfig::from_tier(&GeminiTier::Free), &clock);

    for _ in 0..3 {
        limiter.record_request(0);
    }
    clock.set(at(5, 0, 0, 1));

    let info = limiter.check_limits();
    assert_eq!(info.rpd().current, 0);
    // Minute windows are unaffected by the calendar.
    assert_eq!(info.rpm().current, 3);
}

#[test]
fn test_reaching_rpm_exactly_blocks_until_oldest_expires() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::new("Tight", Some(3), None, None), &clock);

    limiter.record_request(0);
    clock.advance(Duration::from_secs(20));
    limiter.record_request(0);
    limiter.record_request(0);

    let info = limiter.check_limits();
    assert!(!info.is_allowed());
    assert!(info.rpm().exceeded);

    clock.advance(Duration::from_secs(41));
    let info = limiter.check_limits();
    assert!(info.is_allowed());
    assert_eq!(info.rpm().current, 2);
}

#[test]
fn test_scenario_rpm_two_requests_reset_after_a_minute() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::new("Pair", Some(2), None, None), &clock);

    limiter.record_request(0);
    limiter.record_request(0);
    let info = limiter.check_limits();
    assert!(!info.is_allowed());
    assert_eq!(info.rpm().current, 2);

    clock.advance(Duration::from_secs(61));
    let info = limiter.check_limits();
    assert!(info.is_allowed());
    assert_eq!(info.rpm().current, 0);
}

#[test]
fn test_scenario_daily_quota_resets_at_midnight() {
    let clock = ManualClock::new(at(4, 8, 0, 0));
    let limiter = build(TierConfig::new("Daily", None, None, Some(1_500)), &clock);

    clock.set(at(4, 23, 59, 50));
    for _ in 0..1_500 {
        limiter.record_request(0);
    }
    assert!(!limiter.check_limits().is_allowed());

    clock.set(at(5, 0, 0, 5));
    let info = limiter.check_limits();
    assert_eq!(info.rpd().current, 0);
    assert!(info.is_allowed());
}

#[test]
fn test_day_window_holds_entries_for_the_rest_of_the_date() {
    let clock = ManualClock::new(at(4, 0, 0, 10));
    let limiter = build(TierConfig::new("Daily", None, None, Some(10)), &clock);

    limiter.record_request(0);
    clock.set(at(4, 23, 0, 0));
    assert_eq!(limiter.check_limits().rpd().current, 1);
}

#[tokio::test]
async fn test_wait_returns_immediately_when_allowed() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::from_tier(&GeminiTier::Free), &clock);

    assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_wait_sleeps_until_binding_quota_frees() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::new("Pair", Some(2), None, None), &clock);

    limiter.record_request(0);
    limiter.record_request(0);

    let waited = limiter.wait_if_needed().await;

    // First sleep is capped at a minute; the entries are exactly 60s old
    // then and still count, so a floor-sized second sleep follows.
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(60), Duration::from_secs(6)]
    );
    assert_eq!(waited, clock.total_slept());
    assert!(waited >= Duration::from_secs(60));
    assert!(limiter.check_limits().is_allowed());
}

#[tokio::test]
async fn test_token_quota_wait() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = build(TierConfig::new("Tokens", None, Some(10_000), None), &clock);

    limiter.record_request(6_000);
    clock.advance(Duration::from_secs(30));
    limiter.record_request(4_000);

    let waited = limiter.wait_if_needed().await;
    assert_eq!(waited, Duration::from_secs(31));
    assert_eq!(limiter.check_limits().tpm().current, 4_000);
}

#[tokio::test]
async fn test_chunked_daily_wait_rechecks_every_minute() {
    let clock = ManualClock::new(at(4, 23, 57, 0));
    let limiter = build(TierConfig::new("Daily", None, None, Some(1)), &clock);
    limiter.record_request(0);

    limiter.wait_if_needed().await;

    let sleeps = clock.sleeps();
    assert_eq!(sleeps, vec![Duration::from_secs(60); 3]);
    assert_eq!(clock.now(), at(5, 0, 0, 0));
}

#[tokio::test]
async fn test_until_midnight_daily_wait_is_one_sleep() {
    let clock = ManualClock::new(at(4, 21, 0, 0));
    let limiter = build(TierConfig::new("Daily", None, None, Some(1)), &clock)
        .with_rpd_wait(RpdWaitPolicy::UntilMidnight);
    limiter.record_request(0);

    let waited = limiter.wait_if_needed().await;

    assert_eq!(waited, Duration::from_secs(3 * 3600 + 1));
    assert_eq!(clock.sleeps().len(), 1);
    assert_eq!(limiter.check_limits().rpd().current, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_limiter_counts_concurrent_records() {
    let clock = ManualClock::new(at(4, 10, 0, 0));
    let limiter = Arc::new(build(TierConfig::new("Open", None, None, None), &clock));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                for _ in 0..25 {
                    limiter.record_request(10);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let info = limiter.check_limits();
    assert_eq!(info.rpm().current, 200);
    assert_eq!(info.tpm().current, 2_000);
}
