use std::env;

use verigate::models::{PolicyConfig, PolicyError};

#[test]
fn production_defaults_validate() {
    PolicyConfig::default().validate().unwrap();
}

#[test]
fn warn_thresholds_must_sit_below_hard_limits() {
    let policy = PolicyConfig {
        warn_consecutive_at: 4,
        max_consecutive_failures: 4,
        ..PolicyConfig::default()
    };
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::Constraint(_))
    ));

    let policy = PolicyConfig {
        warn_daily_at: 12,
        max_daily_attempts: 12,
        ..PolicyConfig::default()
    };
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::Constraint(_))
    ));
}

#[test]
fn zero_or_negative_thresholds_are_rejected() {
    let policy = PolicyConfig {
        max_consecutive_failures: 0,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());

    let policy = PolicyConfig {
        min_interval_seconds: -1,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());

    let policy = PolicyConfig {
        consecutive_failure_wait_minutes: 0,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn environment_overrides_are_parsed_and_validated() {
    // A single test mutates the process environment to avoid interference
    // between parallel test threads.
    unsafe {
        env::set_var("THROTTLE_MAX_DAILY_ATTEMPTS", "20");
        env::set_var("THROTTLE_MIN_INTERVAL_SECONDS", "120");
    }
    let policy = PolicyConfig::from_env().unwrap();
    assert_eq!(policy.max_daily_attempts, 20);
    assert_eq!(policy.min_interval_seconds, 120);
    // Anything unset keeps the production default.
    assert_eq!(policy.retention_days, 30);

    unsafe {
        env::set_var("THROTTLE_MIN_INTERVAL_SECONDS", "not-a-number");
    }
    assert!(matches!(
        PolicyConfig::from_env(),
        Err(PolicyError::Invalid { .. })
    ));

    unsafe {
        env::remove_var("THROTTLE_MAX_DAILY_ATTEMPTS");
        env::remove_var("THROTTLE_MIN_INTERVAL_SECONDS");
    }
}
