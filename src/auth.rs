use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{self, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown email; the two are indistinguishable on
    /// purpose. `remaining` is reported only for real accounts.
    #[error("invalid credentials")]
    InvalidCredentials { remaining: Option<u32> },
    #[error("account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },
    #[error("account is disabled")]
    AccountDisabled,
    #[error("email {0} is already registered")]
    EmailTaken(String),
    #[error("administrator {0} not found")]
    AdminNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks a presented password against a stored hash. Hashing itself lives
/// outside this crate; the directory only stores the opaque hash string.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, presented: &str, stored_hash: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lock_secs: u64) -> Self {
        // chrono durations are bounded; clamp instead of panicking on an
        // absurd configured value.
        let secs = lock_secs.min(i64::MAX as u64 / 1000) as i64;
        Self {
            max_attempts,
            lock_duration: Duration::seconds(secs),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(3, 300)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub password_hash: String,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AdminState {
    admins: Vec<AdminAccount>,
}

/// Administrator accounts with per-account login lockout.
pub struct AdminDirectory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AdminDirectory {
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join("admins.bin"),
            lock: Mutex::new(()),
        }
    }

    pub fn create(&self, new: NewAdmin) -> Result<AdminAccount, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: AdminState = store::load_state(&self.path)?;
        if state.admins.iter().any(|a| a.email == new.email) {
            return Err(AuthError::EmailTaken(new.email));
        }
        let admin = AdminAccount {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            active: true,
            password_hash: new.password_hash,
            failed_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        };
        state.admins.push(admin.clone());
        store::save_state(&self.path, &state)?;
        Ok(admin)
    }

    pub fn list(&self) -> Result<Vec<AdminAccount>, AuthError> {
        let state: AdminState = store::load_state(&self.path)?;
        Ok(state.admins)
    }

    pub fn deactivate(&self, email: &str) -> Result<AdminAccount, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: AdminState = store::load_state(&self.path)?;
        let admin = state
            .admins
            .iter_mut()
            .find(|a| a.email == email)
            .ok_or_else(|| AuthError::AdminNotFound(email.to_string()))?;
        admin.active = false;
        let updated = admin.clone();
        store::save_state(&self.path, &state)?;
        Ok(updated)
    }

    pub fn login(
        &self,
        email: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        policy: &LockoutPolicy,
    ) -> Result<AdminAccount, AuthError> {
        self.login_at(email, password, verifier, policy, Utc::now())
    }

    /// Login with an explicit clock, so the lockout timeline is testable.
    ///
    /// Per account: each wrong password bumps a counter; hitting
    /// `policy.max_attempts` locks the account for `policy.lock_duration`
    /// and resets the counter. While locked every attempt is refused
    /// without being counted. Once the lock expires the account is active
    /// again, counter at zero, and the attempt is evaluated as normal.
    pub fn login_at(
        &self,
        email: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AdminAccount, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: AdminState = store::load_state(&self.path)?;
        let Some(admin) = state.admins.iter_mut().find(|a| a.email == email) else {
            return Err(AuthError::InvalidCredentials { remaining: None });
        };

        if let Some(until) = admin.locked_until {
            if now < until {
                return Err(AuthError::AccountLocked { until });
            }
            admin.locked_until = None;
            admin.failed_attempts = 0;
        }

        if !admin.active {
            return Err(AuthError::AccountDisabled);
        }

        if !verifier.verify(password, &admin.password_hash) {
            admin.failed_attempts += 1;
            if admin.failed_attempts >= policy.max_attempts {
                let until = now + policy.lock_duration;
                admin.locked_until = Some(until);
                admin.failed_attempts = 0;
                store::save_state(&self.path, &state)?;
                return Err(AuthError::AccountLocked { until });
            }
            let remaining = policy.max_attempts - admin.failed_attempts;
            store::save_state(&self.path, &state)?;
            return Err(AuthError::InvalidCredentials {
                remaining: Some(remaining),
            });
        }

        admin.failed_attempts = 0;
        admin.locked_until = None;
        let authenticated = admin.clone();
        store::save_state(&self.path, &state)?;
        Ok(authenticated)
    }
}
