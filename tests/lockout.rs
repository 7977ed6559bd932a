use anyhow::Result;
use chrono::{Duration, Utc};
use facegate::auth::{
    AdminDirectory, AuthError, CredentialVerifier, LockoutPolicy, NewAdmin,
};

struct Plain;

impl CredentialVerifier for Plain {
    fn verify(&self, presented: &str, stored_hash: &str) -> bool {
        presented == stored_hash
    }
}

const EMAIL: &str = "warden@example.edu";
const PASSWORD: &str = "correct-horse";

fn directory() -> (tempfile::TempDir, AdminDirectory) {
    let dir = tempfile::tempdir().unwrap();
    let admins = AdminDirectory::open(dir.path());
    admins
        .create(NewAdmin {
            email: EMAIL.into(),
            name: "Warden".into(),
            password_hash: PASSWORD.into(),
        })
        .unwrap();
    (dir, admins)
}

#[test]
fn test_three_failures_lock_for_five_minutes() -> Result<()> {
    env_logger::try_init().ok();
    let (_dir, admins) = directory();
    let policy = LockoutPolicy::default();
    let t0 = Utc::now();

    // Two warnings first, with the remaining attempts counting down.
    for attempt in 1u32..=2 {
        let err = admins
            .login_at(EMAIL, "nope", &Plain, &policy, t0)
            .unwrap_err();
        match err {
            AuthError::InvalidCredentials { remaining } => {
                assert_eq!(remaining, Some(3 - attempt));
            }
            other => panic!("expected invalid credentials, got {other}"),
        }
    }

    // The third consecutive failure trips the lock.
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, t0)
        .unwrap_err();
    let until = match err {
        AuthError::AccountLocked { until } => until,
        other => panic!("expected lock, got {other}"),
    };
    assert_eq!(until, t0 + Duration::minutes(5));

    // While locked even the correct password is refused, unconsumed.
    let err = admins
        .login_at(EMAIL, PASSWORD, &Plain, &policy, t0 + Duration::minutes(4))
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));

    // At expiry the account is active again with a clean counter.
    let admin = admins.login_at(EMAIL, PASSWORD, &Plain, &policy, t0 + Duration::minutes(5))?;
    assert_eq!(admin.failed_attempts, 0);
    assert!(admin.locked_until.is_none());
    Ok(())
}

#[test]
fn test_successful_login_resets_the_counter() -> Result<()> {
    env_logger::try_init().ok();
    let (_dir, admins) = directory();
    let policy = LockoutPolicy::default();
    let now = Utc::now();

    admins.login_at(EMAIL, "nope", &Plain, &policy, now).unwrap_err();
    admins.login_at(EMAIL, "nope", &Plain, &policy, now).unwrap_err();
    admins.login_at(EMAIL, PASSWORD, &Plain, &policy, now)?;

    // Two more failures after the reset only warn; number three locks.
    admins.login_at(EMAIL, "nope", &Plain, &policy, now).unwrap_err();
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, now)
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { remaining: Some(1) }
    ));
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, now)
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));
    Ok(())
}

#[test]
fn test_expired_lock_still_counts_fresh_failures() -> Result<()> {
    env_logger::try_init().ok();
    let (_dir, admins) = directory();
    let policy = LockoutPolicy::default();
    let t0 = Utc::now();

    for _ in 0..3 {
        admins.login_at(EMAIL, "nope", &Plain, &policy, t0).unwrap_err();
    }

    // Past expiry a wrong password is a fresh first failure, not a lock.
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, t0 + Duration::minutes(6))
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { remaining: Some(2) }
    ));
    Ok(())
}

#[test]
fn test_file_configured_lockout_drives_login() -> Result<()> {
    env_logger::try_init().ok();
    let (_dir, admins) = directory();
    let cfg_dir = tempfile::tempdir()?;
    let path = cfg_dir.path().join("config.toml");
    std::fs::write(&path, "max_login_attempts = 2\nlockout_secs = 60\n")?;
    let policy = facegate::config::load_config(Some(&path))?.lockout_policy();
    let t0 = Utc::now();

    admins.login_at(EMAIL, "nope", &Plain, &policy, t0).unwrap_err();
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, t0)
        .unwrap_err();
    assert!(
        matches!(err, AuthError::AccountLocked { until } if until == t0 + Duration::seconds(60))
    );
    Ok(())
}

#[test]
fn test_lock_duration_follows_policy() -> Result<()> {
    env_logger::try_init().ok();
    let (_dir, admins) = directory();
    let policy = LockoutPolicy::new(2, 60);
    let t0 = Utc::now();

    admins.login_at(EMAIL, "nope", &Plain, &policy, t0).unwrap_err();
    let err = admins
        .login_at(EMAIL, "nope", &Plain, &policy, t0)
        .unwrap_err();
    let until = match err {
        AuthError::AccountLocked { until } => until,
        other => panic!("expected lock, got {other}"),
    };
    assert_eq!(until, t0 + Duration::seconds(60));
    Ok(())
}
